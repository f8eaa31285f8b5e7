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

//! Path attribute parse and serialize.
//!
//! Malformed attributes are session errors: the parser fails with the BGP
//! code/subcode and the offending attribute bytes, which the FSM echoes into
//! a NOTIFICATION (RFC 4271 Section 6.3).

use super::msg_notification::{BgpError, UpdateMessageError};
use super::msg_update_types::{
    Aggregator, AsPath, AsPathSegment, AsPathSegmentType, AttrType, Origin, PathAttrFlag,
    PathAttrValue, PathAttribute,
};
use super::utils::{is_valid_unicast_ipv4, read_exact_u32, ParserError};
use std::collections::HashSet;
use std::net::Ipv4Addr;

fn update_error(error: UpdateMessageError, data: &[u8]) -> ParserError {
    ParserError::BgpError {
        error: BgpError::UpdateMessageError(error),
        data: data.to_vec(),
    }
}

pub(super) fn validate_attribute_flags(
    flags: u8,
    attr_type: &AttrType,
    attr_bytes: &[u8],
) -> Result<(), ParserError> {
    let expected = attr_type.expected_flags();
    let mask = PathAttrFlag::OPTIONAL | PathAttrFlag::TRANSITIVE;

    // Optional and Transitive bits must match the attribute type
    if (flags & mask) != expected {
        return Err(update_error(
            UpdateMessageError::AttributeFlagsError,
            attr_bytes,
        ));
    }

    // Partial bit must be 0 for well-known attributes
    if attr_type.is_well_known() && (flags & PathAttrFlag::PARTIAL != 0) {
        return Err(update_error(
            UpdateMessageError::AttributeFlagsError,
            attr_bytes,
        ));
    }

    Ok(())
}

pub(super) fn validate_attribute_length(
    attr_type: &AttrType,
    attr_len: u16,
    attr_bytes: &[u8],
    use_4b_asn: bool,
) -> Result<(), ParserError> {
    let valid = match attr_type {
        AttrType::Origin => attr_len == 1,
        AttrType::NextHop => attr_len == 4, // Only IPv4 per RFC 4271
        AttrType::MultiExitDisc => attr_len == 4,
        AttrType::LocalPref => attr_len == 4,
        AttrType::AtomicAggregate => attr_len == 0,
        // RFC 6793: 6 bytes without the four-octet capability, 8 with
        AttrType::Aggregator if use_4b_asn => attr_len == 8,
        AttrType::Aggregator => attr_len == 6,
        AttrType::AsPath => true, // Variable length
        AttrType::Community => attr_len == 4,
        // RFC 6793: at least one four-octet ASN plus a segment header
        AttrType::As4Path => attr_len == 0 || attr_len >= 6,
        AttrType::As4Aggregator => attr_len == 8,
    };

    if !valid {
        return Err(update_error(
            UpdateMessageError::AttributeLengthError,
            attr_bytes,
        ));
    }

    Ok(())
}

pub(super) fn read_attr_as_path(bytes: &[u8], is_4b: bool) -> Result<AsPath, ParserError> {
    // Empty AS_PATH is valid (locally originated routes)
    let asn_size = if is_4b { 4 } else { 2 };
    let mut segments = vec![];
    let mut cursor = 0;

    while cursor < bytes.len() {
        if cursor + 2 > bytes.len() {
            return Err(update_error(UpdateMessageError::MalformedASPath, bytes));
        }

        let segment_type = AsPathSegmentType::try_from(bytes[cursor])?;
        let segment_len = bytes[cursor + 1] as usize;

        // Path segment length cannot be zero
        if segment_len == 0 {
            return Err(update_error(UpdateMessageError::MalformedASPath, bytes));
        }

        let segment_total_size = 2 + segment_len * asn_size;
        if cursor + segment_total_size > bytes.len() {
            return Err(update_error(UpdateMessageError::MalformedASPath, bytes));
        }

        let asn_list = (0..segment_len)
            .map(|i| {
                let pos = cursor + 2 + (i * asn_size);
                if asn_size == 4 {
                    u32::from_be_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
                } else {
                    u16::from_be_bytes([bytes[pos], bytes[pos + 1]]) as u32
                }
            })
            .collect();

        segments.push(AsPathSegment {
            segment_type,
            is_4b,
            asn_list,
        });

        cursor += segment_total_size;
    }

    Ok(AsPath { segments, is_4b })
}

pub(super) fn read_attr_aggregator(bytes: &[u8]) -> Aggregator {
    // Length already validated: 8 bytes in 4-byte mode, 6 otherwise
    if bytes.len() == 8 {
        Aggregator {
            asn: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            ip_addr: Ipv4Addr::new(bytes[4], bytes[5], bytes[6], bytes[7]),
            is_4b: true,
        }
    } else {
        Aggregator {
            asn: u16::from_be_bytes([bytes[0], bytes[1]]) as u32,
            ip_addr: Ipv4Addr::new(bytes[2], bytes[3], bytes[4], bytes[5]),
            is_4b: false,
        }
    }
}

fn parse_attr_value(
    attr_type: &AttrType,
    attr_data: &[u8],
    attr_bytes: &[u8],
    use_4b_asn: bool,
) -> Result<PathAttrValue, ParserError> {
    let value = match attr_type {
        AttrType::Origin => match Origin::try_from(attr_data[0]) {
            Ok(origin) => PathAttrValue::Origin(origin),
            Err(_) => {
                return Err(update_error(
                    UpdateMessageError::InvalidOriginAttribute,
                    attr_bytes,
                ));
            }
        },
        AttrType::AsPath => PathAttrValue::AsPath(read_attr_as_path(attr_data, use_4b_asn)?),
        AttrType::NextHop => {
            let mut octets = [0u8; 4];
            octets.copy_from_slice(&attr_data[0..4]);
            let addr = Ipv4Addr::from(octets);
            if !is_valid_unicast_ipv4(u32::from(addr)) {
                return Err(update_error(
                    UpdateMessageError::InvalidNextHopAttribute,
                    attr_bytes,
                ));
            }
            PathAttrValue::NextHop(addr)
        }
        AttrType::MultiExitDisc => PathAttrValue::MultiExitDisc(read_exact_u32(attr_data)?),
        AttrType::LocalPref => PathAttrValue::LocalPref(read_exact_u32(attr_data)?),
        AttrType::AtomicAggregate => PathAttrValue::AtomicAggregate,
        AttrType::Aggregator => PathAttrValue::Aggregator(read_attr_aggregator(attr_data)),
        AttrType::Community => PathAttrValue::Community(read_exact_u32(attr_data)?),
        AttrType::As4Path => {
            // AS4_PATH always carries four-octet ASNs (RFC 6793)
            PathAttrValue::As4Path(read_attr_as_path(attr_data, true)?)
        }
        AttrType::As4Aggregator => PathAttrValue::As4Aggregator {
            asn4: u32::from_be_bytes([attr_data[0], attr_data[1], attr_data[2], attr_data[3]]),
            ip_addr: Ipv4Addr::new(attr_data[4], attr_data[5], attr_data[6], attr_data[7]),
        },
    };

    Ok(value)
}

/// Parse a single path attribute. Returns the attribute and the bytes it
/// occupied, or the session error mandated for its defect.
pub(super) fn read_path_attribute(
    bytes: &[u8],
    use_4b_asn: bool,
) -> Result<(PathAttribute, u16), ParserError> {
    let attribute_flag = PathAttrFlag(bytes[0]);
    let header_len = attribute_flag.header_len();

    if bytes.len() < header_len {
        return Err(update_error(UpdateMessageError::AttributeLengthError, bytes));
    }

    let attr_type_code = bytes[1];
    let attr_len = match attribute_flag.extended_len() {
        true => u16::from_be_bytes([bytes[2], bytes[3]]),
        false => bytes[2] as u16,
    };

    let total_offset = header_len + attr_len as usize;
    if total_offset > bytes.len() {
        return Err(update_error(UpdateMessageError::AttributeLengthError, bytes));
    }

    let attr_bytes = &bytes[..total_offset];
    let attr_data = &bytes[header_len..total_offset];

    let attribute = match AttrType::try_from(attr_type_code) {
        Ok(attr_type) => {
            validate_attribute_flags(bytes[0], &attr_type, attr_bytes)?;
            validate_attribute_length(&attr_type, attr_len, attr_bytes, use_4b_asn)?;
            let value = parse_attr_value(&attr_type, attr_data, attr_bytes, use_4b_asn)?;
            PathAttribute {
                flags: attribute_flag,
                value,
            }
        }
        Err(_) => {
            // Unrecognized well-known mandatory attribute (OPTIONAL clear,
            // TRANSITIVE set): fail with the full attribute bytes
            // (RFC 4271 Section 6.3)
            if !attribute_flag.optional() && attribute_flag.transitive() {
                return Err(update_error(
                    UpdateMessageError::UnrecognizedWellKnownAttribute,
                    attr_bytes,
                ));
            }
            // Unrecognized discretionary or optional attribute: retained
            // untouched
            PathAttribute {
                flags: attribute_flag,
                value: PathAttrValue::Unknown {
                    type_code: attr_type_code,
                    flags: attribute_flag.0,
                    data: attr_data.to_vec(),
                },
            }
        }
    };

    Ok((attribute, total_offset as u16))
}

/// Parse all path attributes. Duplicate attribute type codes are a
/// malformed attribute list.
pub(super) fn read_path_attributes(
    bytes: &[u8],
    use_4b_asn: bool,
) -> Result<Vec<PathAttribute>, ParserError> {
    let mut cursor = 0;
    let mut path_attributes: Vec<PathAttribute> = Vec::new();
    let mut seen_type_codes: HashSet<u8> = HashSet::new();

    while cursor < bytes.len() {
        let (attribute, offset) = read_path_attribute(&bytes[cursor..], use_4b_asn)?;

        if !seen_type_codes.insert(attribute.type_code()) {
            return Err(update_error(
                UpdateMessageError::MalformedAttributeList,
                &[],
            ));
        }

        path_attributes.push(attribute);
        cursor += offset as usize;
    }

    Ok(path_attributes)
}

fn encode_asn(buf: &mut Vec<u8>, asn: u32, is_4b: bool) {
    if is_4b {
        buf.extend_from_slice(&asn.to_be_bytes());
    } else {
        buf.extend_from_slice(&(asn as u16).to_be_bytes());
    }
}

fn write_as_path(path: &AsPath, is_4b: bool) -> Vec<u8> {
    let mut path_bytes = Vec::new();
    for segment in &path.segments {
        path_bytes.push(segment.segment_type as u8);
        path_bytes.push(segment.asn_list.len() as u8);
        for asn in &segment.asn_list {
            encode_asn(&mut path_bytes, *asn, is_4b);
        }
    }
    path_bytes
}

pub(super) fn write_path_attribute(attr: &PathAttribute) -> Vec<u8> {
    let mut bytes = Vec::new();

    // Serialize attribute value first to determine length
    let attr_value_bytes = match &attr.value {
        PathAttrValue::Origin(origin) => vec![*origin as u8],
        PathAttrValue::AsPath(as_path) => write_as_path(as_path, as_path.is_4b),
        PathAttrValue::NextHop(next_hop) => next_hop.octets().to_vec(),
        PathAttrValue::MultiExitDisc(value) => value.to_be_bytes().to_vec(),
        PathAttrValue::LocalPref(value) => value.to_be_bytes().to_vec(),
        PathAttrValue::AtomicAggregate => vec![],
        PathAttrValue::Aggregator(agg) => {
            let mut agg_bytes = Vec::new();
            encode_asn(&mut agg_bytes, agg.asn, agg.is_4b);
            agg_bytes.extend_from_slice(&agg.ip_addr.octets());
            agg_bytes
        }
        PathAttrValue::Community(community) => community.to_be_bytes().to_vec(),
        // AS4_PATH / AS4_AGGREGATOR always use 4-byte ASN encoding (RFC 6793)
        PathAttrValue::As4Path(as_path) => write_as_path(as_path, true),
        PathAttrValue::As4Aggregator { asn4, ip_addr } => {
            let mut agg_bytes = asn4.to_be_bytes().to_vec();
            agg_bytes.extend_from_slice(&ip_addr.octets());
            agg_bytes
        }
        PathAttrValue::Unknown { data, .. } => data.clone(),
    };

    // Unknown attributes keep their received flags byte
    let flags = match &attr.value {
        PathAttrValue::Unknown { flags, .. } => *flags,
        _ => attr.flags.0,
    };
    bytes.push(flags);
    bytes.push(attr.type_code());

    let attr_len = attr_value_bytes.len();
    if flags & PathAttrFlag::EXTENDED_LENGTH != 0 {
        bytes.extend_from_slice(&(attr_len as u16).to_be_bytes());
    } else {
        bytes.push(attr_len as u8);
    }

    bytes.extend_from_slice(&attr_value_bytes);

    bytes
}

pub(super) fn write_path_attributes(path_attributes: &[PathAttribute]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for attr in path_attributes {
        bytes.extend_from_slice(&write_path_attribute(attr));
    }
    bytes
}
