// Copyright 2025 bgpcore Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! IPv4 and IPv6 prefix types.
//!
//! A prefix orders partially: among prefixes with identical network bits the
//! shorter (broader) one is the greater. Prefixes with different network bits
//! do not compare.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::net::{AddrParseError, Ipv4Addr, Ipv6Addr};

/// Network mask for a prefix length, zero for length 0.
pub fn cidr_to_mask(length: u8) -> u32 {
    if length == 0 {
        0
    } else {
        u32::MAX << (32 - length as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Prefix4 {
    pub prefix: Ipv4Addr,
    pub length: u8,
}

impl Prefix4 {
    /// Host bits below `length` are masked off so equality and containment
    /// work on the network part alone.
    pub fn new(prefix: Ipv4Addr, length: u8) -> Self {
        let masked = u32::from(prefix) & cidr_to_mask(length.min(32));
        Prefix4 {
            prefix: Ipv4Addr::from(masked),
            length: length.min(32),
        }
    }

    pub fn from_str(prefix: &str, length: u8) -> Result<Self, AddrParseError> {
        Ok(Self::new(prefix.parse()?, length))
    }

    /// Test if `address` falls inside this prefix.
    pub fn includes_addr(&self, address: Ipv4Addr) -> bool {
        let mask = cidr_to_mask(self.length);
        (u32::from(address) & mask) == (u32::from(self.prefix) & mask)
    }

    /// Test if `other` is this prefix or one of its sub-prefixes.
    pub fn includes(&self, other: &Prefix4) -> bool {
        self.length <= other.length && self.includes_addr(other.prefix)
    }

    /// On-wire NLRI form: length byte followed by `ceil(length/8)` prefix
    /// octets, MSB first, trailing host bits zeroed.
    pub fn to_bytes(&self) -> Vec<u8> {
        let num_octets = self.length.div_ceil(8) as usize;
        let mut bytes = Vec::with_capacity(1 + num_octets);
        bytes.push(self.length);
        let octets = self.prefix.octets();
        bytes.extend_from_slice(&octets[..num_octets]);
        bytes
    }
}

impl PartialOrd for Prefix4 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        if self.prefix == other.prefix {
            // shorter length covers more addresses, treated as greater
            return Some(other.length.cmp(&self.length));
        }
        None
    }
}

impl std::fmt::Display for Prefix4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.prefix, self.length)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Prefix6 {
    pub prefix: [u8; 16],
    pub length: u8,
}

impl Prefix6 {
    pub fn new(prefix: Ipv6Addr, length: u8) -> Self {
        let length = length.min(128);
        let mut masked = prefix.octets();
        mask_v6(&mut masked, length);
        Prefix6 {
            prefix: masked,
            length,
        }
    }

    pub fn from_str(prefix: &str, length: u8) -> Result<Self, AddrParseError> {
        Ok(Self::new(prefix.parse()?, length))
    }

    pub fn addr(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.prefix)
    }

    pub fn includes_addr(&self, address: Ipv6Addr) -> bool {
        let mut masked = address.octets();
        mask_v6(&mut masked, self.length);
        masked == self.prefix
    }

    pub fn includes(&self, other: &Prefix6) -> bool {
        self.length <= other.length && self.includes_addr(other.addr())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let num_octets = self.length.div_ceil(8) as usize;
        let mut bytes = Vec::with_capacity(1 + num_octets);
        bytes.push(self.length);
        bytes.extend_from_slice(&self.prefix[..num_octets]);
        bytes
    }
}

impl PartialOrd for Prefix6 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        if self.prefix == other.prefix {
            return Some(other.length.cmp(&self.length));
        }
        None
    }
}

impl std::fmt::Display for Prefix6 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr(), self.length)
    }
}

fn mask_v6(octets: &mut [u8; 16], length: u8) {
    let full = (length / 8) as usize;
    let rem = length % 8;
    if full < 16 {
        if rem > 0 {
            octets[full] &= 0xffu8 << (8 - rem);
            for byte in octets.iter_mut().skip(full + 1) {
                *byte = 0;
            }
        } else {
            for byte in octets.iter_mut().skip(full) {
                *byte = 0;
            }
        }
    }
}
