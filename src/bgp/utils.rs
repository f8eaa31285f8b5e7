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

//! Wire primitives: bounds-checked big-endian readers and writers with an
//! advancing cursor, plus variable-length NLRI packing.

use super::msg_notification::{BgpError, UpdateMessageError};
use crate::net::{Prefix4, Prefix6};
use std::net::Ipv4Addr;
use thiserror::Error;

/// Codec-level error. `BgpError` carries the NOTIFICATION code/subcode plus
/// the offending bytes so the FSM can echo them to the peer verbatim.
#[derive(Debug, PartialEq, Error)]
pub enum ParserError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("BGP error: {error:?}")]
    BgpError { error: BgpError, data: Vec<u8> },
}

fn truncated(what: &str) -> ParserError {
    ParserError::IoError(format!("unexpected end of buffer reading {}", what))
}

pub fn read_u8(bytes: &[u8], cursor: &mut usize) -> Result<u8, ParserError> {
    let value = *bytes.get(*cursor).ok_or_else(|| truncated("u8"))?;
    *cursor += 1;
    Ok(value)
}

pub fn read_u16(bytes: &[u8], cursor: &mut usize) -> Result<u16, ParserError> {
    let end = cursor.checked_add(2).ok_or_else(|| truncated("u16"))?;
    let slice = bytes.get(*cursor..end).ok_or_else(|| truncated("u16"))?;
    *cursor = end;
    Ok(u16::from_be_bytes([slice[0], slice[1]]))
}

pub fn read_u32(bytes: &[u8], cursor: &mut usize) -> Result<u32, ParserError> {
    let end = cursor.checked_add(4).ok_or_else(|| truncated("u32"))?;
    let slice = bytes.get(*cursor..end).ok_or_else(|| truncated("u32"))?;
    *cursor = end;
    Ok(u32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

pub fn read_u64(bytes: &[u8], cursor: &mut usize) -> Result<u64, ParserError> {
    let end = cursor.checked_add(8).ok_or_else(|| truncated("u64"))?;
    let slice = bytes.get(*cursor..end).ok_or_else(|| truncated("u64"))?;
    *cursor = end;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(slice);
    Ok(u64::from_be_bytes(buf))
}

pub fn write_u8(buf: &mut Vec<u8>, value: u8) {
    buf.push(value);
}

pub fn write_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn write_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Exactly four bytes, used by fixed-width u32 attribute values.
pub fn read_exact_u32(bytes: &[u8]) -> Result<u32, ParserError> {
    match bytes.len() {
        4 => Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        _ => Err(ParserError::BgpError {
            error: BgpError::UpdateMessageError(UpdateMessageError::AttributeLengthError),
            data: bytes.to_vec(),
        }),
    }
}

fn invalid_network_field() -> ParserError {
    ParserError::BgpError {
        error: BgpError::UpdateMessageError(UpdateMessageError::InvalidNetworkField),
        data: Vec::new(),
    }
}

/// Read a single IPv4 NLRI entry: length byte followed by `ceil(length/8)`
/// prefix octets, zero-extended to a full address.
pub fn read_prefix4(bytes: &[u8], cursor: &mut usize) -> Result<Prefix4, ParserError> {
    let length = read_u8(bytes, cursor)?;
    if length > 32 {
        return Err(invalid_network_field());
    }

    let byte_len = length.div_ceil(8) as usize;
    let end = *cursor + byte_len;
    let slice = bytes.get(*cursor..end).ok_or_else(|| invalid_network_field())?;
    *cursor = end;

    let mut ip_buffer = [0u8; 4];
    ip_buffer[..byte_len].copy_from_slice(slice);
    Ok(Prefix4::new(Ipv4Addr::from(ip_buffer), length))
}

/// Read a single IPv6 NLRI entry, zero-extended the same way.
pub fn read_prefix6(bytes: &[u8], cursor: &mut usize) -> Result<Prefix6, ParserError> {
    let length = read_u8(bytes, cursor)?;
    if length > 128 {
        return Err(invalid_network_field());
    }

    let byte_len = length.div_ceil(8) as usize;
    let end = *cursor + byte_len;
    let slice = bytes.get(*cursor..end).ok_or_else(|| invalid_network_field())?;
    *cursor = end;

    let mut ip_buffer = [0u8; 16];
    ip_buffer[..byte_len].copy_from_slice(slice);
    Ok(Prefix6 {
        prefix: ip_buffer,
        length,
    })
}

pub fn parse_nlri_list(bytes: &[u8]) -> Result<Vec<Prefix4>, ParserError> {
    let mut cursor = 0;
    let mut nlri_list = Vec::new();

    while cursor < bytes.len() {
        nlri_list.push(read_prefix4(bytes, &mut cursor)?);
    }

    Ok(nlri_list)
}

pub fn write_nlri_list(nlri_list: &[Prefix4]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for nlri in nlri_list {
        bytes.extend_from_slice(&nlri.to_bytes());
    }
    bytes
}

/// Validates if an IPv4 address is a valid unicast host address.
/// Returns false for 0.0.0.0, 255.255.255.255, or multicast (224.0.0.0/4).
pub fn is_valid_unicast_ipv4(ip: u32) -> bool {
    !(ip == 0 || ip == 0xFFFFFFFF || (ip & 0xF0000000) == 0xE0000000)
}
