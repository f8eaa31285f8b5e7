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

use super::msg_notification::{BgpError, UpdateMessageError};
use super::utils::ParserError;
use std::net::Ipv4Addr;

/// Maximum number of ASNs one path segment can carry (its length field is a
/// single byte).
pub const MAX_SEGMENT_LEN: usize = 255;

#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash)]
pub struct PathAttrFlag(pub u8);

impl PathAttrFlag {
    pub const OPTIONAL: u8 = 1 << 7;
    pub const TRANSITIVE: u8 = 1 << 6;
    pub const PARTIAL: u8 = 1 << 5;
    pub const EXTENDED_LENGTH: u8 = 1 << 4;

    pub fn optional(&self) -> bool {
        self.0 & Self::OPTIONAL != 0
    }

    pub fn transitive(&self) -> bool {
        self.0 & Self::TRANSITIVE != 0
    }

    pub fn partial(&self) -> bool {
        self.0 & Self::PARTIAL != 0
    }

    pub fn extended_len(&self) -> bool {
        self.0 & Self::EXTENDED_LENGTH != 0
    }

    /// Attribute header size: flags + type + one or two length bytes.
    pub fn header_len(&self) -> usize {
        if self.extended_len() {
            4
        } else {
            3
        }
    }
}

pub mod attr_type_code {
    pub const ORIGIN: u8 = 1;
    pub const AS_PATH: u8 = 2;
    pub const NEXT_HOP: u8 = 3;
    pub const MULTI_EXIT_DISC: u8 = 4;
    pub const LOCAL_PREF: u8 = 5;
    pub const ATOMIC_AGGREGATE: u8 = 6;
    pub const AGGREGATOR: u8 = 7;
    pub const COMMUNITY: u8 = 8;
    pub const AS4_PATH: u8 = 17;
    pub const AS4_AGGREGATOR: u8 = 18;
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttrType {
    Origin = 1,
    AsPath = 2,
    NextHop = 3,
    MultiExitDisc = 4,
    LocalPref = 5,
    AtomicAggregate = 6,
    Aggregator = 7,
    Community = 8,
    As4Path = 17,
    As4Aggregator = 18,
}

impl TryFrom<u8> for AttrType {
    type Error = ParserError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AttrType::Origin),
            2 => Ok(AttrType::AsPath),
            3 => Ok(AttrType::NextHop),
            4 => Ok(AttrType::MultiExitDisc),
            5 => Ok(AttrType::LocalPref),
            6 => Ok(AttrType::AtomicAggregate),
            7 => Ok(AttrType::Aggregator),
            8 => Ok(AttrType::Community),
            17 => Ok(AttrType::As4Path),
            18 => Ok(AttrType::As4Aggregator),
            _ => Err(ParserError::BgpError {
                error: BgpError::UpdateMessageError(UpdateMessageError::Unspecific),
                data: Vec::new(),
            }),
        }
    }
}

impl AttrType {
    /// Canonical Optional/Transitive bits for the type (RFC 4271 Section 5,
    /// RFC 6793 Section 3).
    pub(super) fn expected_flags(&self) -> u8 {
        match self {
            AttrType::Origin => PathAttrFlag::TRANSITIVE,
            AttrType::AsPath => PathAttrFlag::TRANSITIVE,
            AttrType::NextHop => PathAttrFlag::TRANSITIVE,
            AttrType::MultiExitDisc => PathAttrFlag::OPTIONAL,
            AttrType::LocalPref => PathAttrFlag::TRANSITIVE,
            AttrType::AtomicAggregate => PathAttrFlag::TRANSITIVE,
            AttrType::Aggregator => PathAttrFlag::OPTIONAL | PathAttrFlag::TRANSITIVE,
            AttrType::Community => PathAttrFlag::OPTIONAL | PathAttrFlag::TRANSITIVE,
            AttrType::As4Path => PathAttrFlag::OPTIONAL | PathAttrFlag::TRANSITIVE,
            AttrType::As4Aggregator => PathAttrFlag::OPTIONAL | PathAttrFlag::TRANSITIVE,
        }
    }

    pub(super) fn is_well_known(&self) -> bool {
        matches!(
            self,
            AttrType::Origin
                | AttrType::AsPath
                | AttrType::NextHop
                | AttrType::LocalPref
                | AttrType::AtomicAggregate
        )
    }
}

#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Origin {
    IGP = 0,
    EGP = 1,
    INCOMPLETE = 2,
}

impl TryFrom<u8> for Origin {
    type Error = ParserError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Origin::IGP),
            1 => Ok(Origin::EGP),
            2 => Ok(Origin::INCOMPLETE),
            _ => Err(ParserError::BgpError {
                error: BgpError::UpdateMessageError(UpdateMessageError::InvalidOriginAttribute),
                data: Vec::new(),
            }),
        }
    }
}

#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AsPathSegmentType {
    AsSet = 1,
    AsSequence = 2,
}

impl TryFrom<u8> for AsPathSegmentType {
    type Error = ParserError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AsPathSegmentType::AsSet),
            2 => Ok(AsPathSegmentType::AsSequence),
            _ => Err(ParserError::BgpError {
                error: BgpError::UpdateMessageError(UpdateMessageError::MalformedASPath),
                data: Vec::new(),
            }),
        }
    }
}

/// An AS_PATH or AS4_PATH segment. The segment length byte is derived from
/// `asn_list` at serialization time.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct AsPathSegment {
    pub segment_type: AsPathSegmentType,
    pub is_4b: bool,
    pub asn_list: Vec<u32>,
}

impl AsPathSegment {
    pub fn new(segment_type: AsPathSegmentType, is_4b: bool) -> Self {
        AsPathSegment {
            segment_type,
            is_4b,
            asn_list: Vec::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.asn_list.len()
    }

    /// Insert at the front. Fails when the segment is already full.
    pub fn prepend(&mut self, asn: u32) -> bool {
        if self.asn_list.len() >= MAX_SEGMENT_LEN {
            return false;
        }
        self.asn_list.insert(0, asn);
        true
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct AsPath {
    pub segments: Vec<AsPathSegment>,
    /// Are ASNs in this attribute four octets on the wire?
    pub is_4b: bool,
}

impl AsPath {
    pub fn empty(is_4b: bool) -> Self {
        AsPath {
            segments: vec![],
            is_4b,
        }
    }

    /// The leftmost AS in the path (first AS of the first segment).
    /// Per RFC 4271, this is the AS that most recently added itself.
    pub fn leftmost_asn(&self) -> Option<u32> {
        self.segments
            .first()
            .and_then(|seg| seg.asn_list.first().copied())
    }

    /// Path length for best path selection per RFC 4271 Section 9.1.2.2:
    /// an AS_SET counts as one hop regardless of size.
    pub fn path_length(&self) -> usize {
        self.segments
            .iter()
            .map(|segment| match segment.segment_type {
                AsPathSegmentType::AsSequence => segment.asn_list.len(),
                AsPathSegmentType::AsSet => 1,
            })
            .sum()
    }

    /// Total number of ASNs across all segments.
    pub fn asn_count(&self) -> usize {
        self.segments.iter().map(|s| s.asn_list.len()).sum()
    }

    /// Prepend an ASN per RFC 4271 Section 5.1.2: extend a leading
    /// AS_SEQUENCE with room, otherwise open a fresh one in front (also the
    /// mandated behavior when the path starts with an AS_SET).
    pub fn prepend(&mut self, asn: u32) {
        if let Some(first) = self.segments.first_mut() {
            if first.segment_type == AsPathSegmentType::AsSequence
                && first.asn_list.len() < MAX_SEGMENT_LEN
            {
                first.prepend(asn);
                return;
            }
        }
        let mut seg = AsPathSegment::new(AsPathSegmentType::AsSequence, self.is_4b);
        seg.prepend(asn);
        self.segments.insert(0, seg);
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Aggregator {
    pub asn: u32,
    pub ip_addr: Ipv4Addr,
    /// Is the ASN four octets on the wire?
    pub is_4b: bool,
}

#[derive(Debug, PartialEq, Clone, Eq, Hash)]
pub enum PathAttrValue {
    Origin(Origin),
    AsPath(AsPath),
    NextHop(Ipv4Addr),
    MultiExitDisc(u32),
    LocalPref(u32),
    AtomicAggregate,
    Aggregator(Aggregator),
    Community(u32),
    As4Path(AsPath),
    As4Aggregator { asn4: u32, ip_addr: Ipv4Addr },
    Unknown {
        type_code: u8,
        flags: u8,
        data: Vec<u8>,
    },
}

#[derive(Debug, PartialEq, Clone, Eq, Hash)]
pub struct PathAttribute {
    pub flags: PathAttrFlag,
    pub value: PathAttrValue,
}

impl PathAttribute {
    /// Wrap a value with the canonical flags for its type.
    pub fn new(value: PathAttrValue) -> Self {
        let flags = match &value {
            PathAttrValue::Origin(_) => AttrType::Origin.expected_flags(),
            PathAttrValue::AsPath(_) => AttrType::AsPath.expected_flags(),
            PathAttrValue::NextHop(_) => AttrType::NextHop.expected_flags(),
            PathAttrValue::MultiExitDisc(_) => AttrType::MultiExitDisc.expected_flags(),
            PathAttrValue::LocalPref(_) => AttrType::LocalPref.expected_flags(),
            PathAttrValue::AtomicAggregate => AttrType::AtomicAggregate.expected_flags(),
            PathAttrValue::Aggregator(_) => AttrType::Aggregator.expected_flags(),
            PathAttrValue::Community(_) => AttrType::Community.expected_flags(),
            PathAttrValue::As4Path(_) => AttrType::As4Path.expected_flags(),
            PathAttrValue::As4Aggregator { .. } => AttrType::As4Aggregator.expected_flags(),
            PathAttrValue::Unknown { flags, .. } => *flags,
        };
        PathAttribute {
            flags: PathAttrFlag(flags),
            value,
        }
    }

    pub fn type_code(&self) -> u8 {
        match &self.value {
            PathAttrValue::Origin(_) => attr_type_code::ORIGIN,
            PathAttrValue::AsPath(_) => attr_type_code::AS_PATH,
            PathAttrValue::NextHop(_) => attr_type_code::NEXT_HOP,
            PathAttrValue::MultiExitDisc(_) => attr_type_code::MULTI_EXIT_DISC,
            PathAttrValue::LocalPref(_) => attr_type_code::LOCAL_PREF,
            PathAttrValue::AtomicAggregate => attr_type_code::ATOMIC_AGGREGATE,
            PathAttrValue::Aggregator(_) => attr_type_code::AGGREGATOR,
            PathAttrValue::Community(_) => attr_type_code::COMMUNITY,
            PathAttrValue::As4Path(_) => attr_type_code::AS4_PATH,
            PathAttrValue::As4Aggregator { .. } => attr_type_code::AS4_AGGREGATOR,
            PathAttrValue::Unknown { type_code, .. } => *type_code,
        }
    }

    /// An unrecognized optional attribute that must be forwarded untouched.
    pub fn is_unknown_transitive(&self) -> bool {
        if let PathAttrValue::Unknown { flags, .. } = &self.value {
            flags & PathAttrFlag::TRANSITIVE != 0
        } else {
            false
        }
    }

    pub fn print(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        match &self.value {
            PathAttrValue::Origin(origin) => format!("{}Origin {{ {:?} }}\n", pad, origin),
            PathAttrValue::AsPath(path) | PathAttrValue::As4Path(path) => {
                let name = if matches!(self.value, PathAttrValue::As4Path(_)) {
                    "As4Path"
                } else {
                    "AsPath"
                };
                let mut out = format!("{}{} {{\n", pad, name);
                for seg in &path.segments {
                    let asns: Vec<String> =
                        seg.asn_list.iter().map(|a| a.to_string()).collect();
                    out.push_str(&format!(
                        "{}    {:?}: {}\n",
                        pad,
                        seg.segment_type,
                        asns.join(" ")
                    ));
                }
                out.push_str(&format!("{}}}\n", pad));
                out
            }
            PathAttrValue::NextHop(addr) => format!("{}NextHop {{ {} }}\n", pad, addr),
            PathAttrValue::MultiExitDisc(med) => format!("{}Med {{ {} }}\n", pad, med),
            PathAttrValue::LocalPref(pref) => format!("{}LocalPref {{ {} }}\n", pad, pref),
            PathAttrValue::AtomicAggregate => format!("{}AtomicAggregate {{}}\n", pad),
            PathAttrValue::Aggregator(agg) => {
                format!("{}Aggregator {{ asn: {}, addr: {} }}\n", pad, agg.asn, agg.ip_addr)
            }
            PathAttrValue::Community(community) => {
                format!(
                    "{}Community {{ {}:{} }}\n",
                    pad,
                    community >> 16,
                    community & 0xffff
                )
            }
            PathAttrValue::As4Aggregator { asn4, ip_addr } => {
                format!("{}As4Aggregator {{ asn: {}, addr: {} }}\n", pad, asn4, ip_addr)
            }
            PathAttrValue::Unknown { type_code, data, .. } => {
                format!(
                    "{}Unknown {{ type: {}, length: {} }}\n",
                    pad,
                    type_code,
                    data.len()
                )
            }
        }
    }
}
