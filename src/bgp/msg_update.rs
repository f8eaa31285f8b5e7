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

//! UPDATE message (RFC 4271 Section 4.3) and the RFC 6793 two/four-byte ASN
//! compatibility operations.

use super::msg::{Message, MessageType};
use super::msg_notification::{BgpError, UpdateMessageError};
use super::msg_update_codec::{read_path_attributes, write_path_attributes};
use super::msg_update_types::{
    attr_type_code, AsPath, AsPathSegment, AsPathSegmentType, PathAttrValue, PathAttribute,
};
use super::utils::{parse_nlri_list, write_nlri_list, ParserError};
use super::AS_TRANS;
use crate::net::Prefix4;
use std::net::Ipv4Addr;

pub const WITHDRAWN_ROUTES_LENGTH_SIZE: usize = 2;
pub const TOTAL_ATTR_LENGTH_SIZE: usize = 2;

#[derive(Debug, PartialEq, Clone)]
pub struct UpdateMessage {
    pub withdrawn_routes: Vec<Prefix4>,
    pub path_attributes: Vec<PathAttribute>,
    pub nlri: Vec<Prefix4>,
    /// Session encoding for AS_PATH and AGGREGATOR (RFC 6793).
    pub use_4b_asn: bool,
}

impl UpdateMessage {
    pub fn new(use_4b_asn: bool) -> Self {
        UpdateMessage {
            withdrawn_routes: vec![],
            path_attributes: vec![],
            nlri: vec![],
            use_4b_asn,
        }
    }

    pub fn new_withdraw(routes: Vec<Prefix4>, use_4b_asn: bool) -> Self {
        UpdateMessage {
            withdrawn_routes: routes,
            path_attributes: vec![],
            nlri: vec![],
            use_4b_asn,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>, use_4b_asn: bool) -> Result<Self, ParserError> {
        let body_len = bytes.len();
        if body_len < WITHDRAWN_ROUTES_LENGTH_SIZE + TOTAL_ATTR_LENGTH_SIZE {
            return Err(ParserError::BgpError {
                error: BgpError::UpdateMessageError(UpdateMessageError::Unspecific),
                data: Vec::new(),
            });
        }

        let withdrawn_len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        // -4: the two length fields
        if withdrawn_len > body_len - 4 {
            return Err(ParserError::BgpError {
                error: BgpError::UpdateMessageError(UpdateMessageError::Unspecific),
                data: Vec::new(),
            });
        }
        let mut cursor = 2;
        let withdrawn_routes = parse_nlri_list(&bytes[cursor..cursor + withdrawn_len])?;
        cursor += withdrawn_len;

        let attr_len = u16::from_be_bytes([bytes[cursor], bytes[cursor + 1]]) as usize;
        cursor += 2;
        if attr_len > body_len - cursor {
            return Err(ParserError::BgpError {
                error: BgpError::UpdateMessageError(UpdateMessageError::Unspecific),
                data: Vec::new(),
            });
        }
        let path_attributes = read_path_attributes(&bytes[cursor..cursor + attr_len], use_4b_asn)?;
        cursor += attr_len;

        let nlri = parse_nlri_list(&bytes[cursor..])?;

        Ok(UpdateMessage {
            withdrawn_routes,
            path_attributes,
            nlri,
            use_4b_asn,
        })
    }

    // ----- attribute accessors -----

    pub fn has_attrib(&self, type_code: u8) -> bool {
        self.path_attributes
            .iter()
            .any(|attr| attr.type_code() == type_code)
    }

    pub fn get_attrib(&self, type_code: u8) -> Option<&PathAttribute> {
        self.path_attributes
            .iter()
            .find(|attr| attr.type_code() == type_code)
    }

    fn get_attrib_mut(&mut self, type_code: u8) -> Option<&mut PathAttribute> {
        self.path_attributes
            .iter_mut()
            .find(|attr| attr.type_code() == type_code)
    }

    /// Replace an attribute of the same type or append a new one.
    pub fn set_attrib(&mut self, attrib: PathAttribute) {
        let type_code = attrib.type_code();
        let existing = self
            .path_attributes
            .iter()
            .position(|attr| attr.type_code() == type_code);
        match existing {
            Some(pos) => self.path_attributes[pos] = attrib,
            None => self.path_attributes.push(attrib),
        }
    }

    pub fn drop_attrib(&mut self, type_code: u8) {
        self.path_attributes
            .retain(|attr| attr.type_code() != type_code);
    }

    pub fn get_origin(&self) -> Option<super::msg_update_types::Origin> {
        match self.get_attrib(attr_type_code::ORIGIN) {
            Some(PathAttribute {
                value: PathAttrValue::Origin(origin),
                ..
            }) => Some(*origin),
            _ => None,
        }
    }

    pub fn get_as_path(&self) -> Option<&AsPath> {
        match self.get_attrib(attr_type_code::AS_PATH) {
            Some(PathAttribute {
                value: PathAttrValue::AsPath(path),
                ..
            }) => Some(path),
            _ => None,
        }
    }

    fn get_as_path_mut(&mut self) -> Option<&mut AsPath> {
        match self.get_attrib_mut(attr_type_code::AS_PATH) {
            Some(PathAttribute {
                value: PathAttrValue::AsPath(path),
                ..
            }) => Some(path),
            _ => None,
        }
    }

    pub fn get_as4_path(&self) -> Option<&AsPath> {
        match self.get_attrib(attr_type_code::AS4_PATH) {
            Some(PathAttribute {
                value: PathAttrValue::As4Path(path),
                ..
            }) => Some(path),
            _ => None,
        }
    }

    pub fn get_next_hop(&self) -> Option<Ipv4Addr> {
        match self.get_attrib(attr_type_code::NEXT_HOP) {
            Some(PathAttribute {
                value: PathAttrValue::NextHop(addr),
                ..
            }) => Some(*addr),
            _ => None,
        }
    }

    pub fn set_next_hop(&mut self, nexthop: Ipv4Addr) {
        self.set_attrib(PathAttribute::new(PathAttrValue::NextHop(nexthop)));
    }

    pub fn get_med(&self) -> Option<u32> {
        match self.get_attrib(attr_type_code::MULTI_EXIT_DISC) {
            Some(PathAttribute {
                value: PathAttrValue::MultiExitDisc(med),
                ..
            }) => Some(*med),
            _ => None,
        }
    }

    pub fn get_local_pref(&self) -> Option<u32> {
        match self.get_attrib(attr_type_code::LOCAL_PREF) {
            Some(PathAttribute {
                value: PathAttrValue::LocalPref(pref),
                ..
            }) => Some(*pref),
            _ => None,
        }
    }

    // ----- validation -----

    /// RFC 4271 Section 6.3 attribute list validation: no duplicate type
    /// codes, and ORIGIN, AS_PATH and NEXT_HOP all present. Callers invoke
    /// this only when the UPDATE carries NLRI.
    pub fn validate_attribs(&self) -> Result<(), ParserError> {
        let mut typecode_bitmap: u64 = 0;
        let mut has_origin = false;
        let mut has_as_path = false;
        let mut has_nexthop = false;

        for attr in &self.path_attributes {
            let type_code = attr.type_code();

            match type_code {
                attr_type_code::ORIGIN => has_origin = true,
                attr_type_code::AS_PATH => has_as_path = true,
                attr_type_code::NEXT_HOP => has_nexthop = true,
                _ => {}
            }

            if type_code < 64 {
                if (typecode_bitmap >> type_code) & 1 != 0 {
                    return Err(ParserError::BgpError {
                        error: BgpError::UpdateMessageError(
                            UpdateMessageError::MalformedAttributeList,
                        ),
                        data: Vec::new(),
                    });
                }
                typecode_bitmap |= 1 << type_code;
            }
        }

        if !(has_origin && has_as_path && has_nexthop) {
            return Err(ParserError::BgpError {
                error: BgpError::UpdateMessageError(UpdateMessageError::MissingWellKnownAttribute),
                data: Vec::new(),
            });
        }

        Ok(())
    }

    // ----- RFC 6793 operations -----

    /// Prepend an ASN to the AS_PATH in the session's encoding. In 2-byte
    /// mode ASNs that do not fit become AS_TRANS and an existing AS4_PATH is
    /// kept in sync with the real value. Returns false on an encoding
    /// mismatch (e.g. a 2-byte AS_PATH in a 4-byte session), which callers
    /// log; it does not tear the session down.
    pub fn prepend(&mut self, asn: u32) -> bool {
        if self.use_4b_asn {
            // AS4_PATH must not exist in 4-byte mode; restore first.
            if self.has_attrib(attr_type_code::AS4_PATH) {
                return false;
            }

            if !self.has_attrib(attr_type_code::AS_PATH) {
                let mut path = AsPath::empty(true);
                path.prepend(asn);
                self.path_attributes
                    .push(PathAttribute::new(PathAttrValue::AsPath(path)));
                return true;
            }

            match self.get_as_path_mut() {
                Some(path) => {
                    if !path.is_4b {
                        return false;
                    }
                    path.prepend(asn);
                    true
                }
                None => false,
            }
        } else {
            let prep_asn = if asn >= 0xffff { AS_TRANS as u32 } else { asn };

            if !self.has_attrib(attr_type_code::AS_PATH) {
                let mut path = AsPath::empty(false);
                path.prepend(prep_asn);
                self.path_attributes
                    .push(PathAttribute::new(PathAttrValue::AsPath(path)));
            } else {
                match self.get_as_path_mut() {
                    Some(path) => {
                        if path.is_4b {
                            return false;
                        }
                        path.prepend(prep_asn);
                    }
                    None => return false,
                }
            }

            // Keep AS4_PATH aligned with the real four-byte value.
            if let Some(PathAttribute {
                value: PathAttrValue::As4Path(path4),
                ..
            }) = self.get_attrib_mut(attr_type_code::AS4_PATH)
            {
                path4.prepend(asn);
            }

            true
        }
    }

    /// Reconstruct the four-byte AS_PATH after receiving from a 2-byte-only
    /// peer (RFC 6793 Section 4.2.3). AS_TRANS placeholders are replaced
    /// from the flattened AS4_PATH; other entries are cross-checked (a
    /// mismatch is reported to the caller as a warning flag, not a failure).
    /// AS4_PATH is removed afterwards.
    ///
    /// Returns `Ok(mismatch_seen)`; `Err(())` on an encoding inconsistency.
    pub fn restore_as_path(&mut self) -> Result<bool, ()> {
        let path = match self.get_as_path() {
            None => return Ok(false),
            Some(path) => path,
        };
        if path.is_4b {
            return Ok(false);
        }

        // No AS4_PATH: widen in place.
        if !self.has_attrib(attr_type_code::AS4_PATH) {
            let mut warned = false;
            let path = self.get_as_path_mut().ok_or(())?;
            for seg in &mut path.segments {
                if seg.is_4b {
                    return Err(());
                }
                if seg.asn_list.contains(&(AS_TRANS as u32)) {
                    // AS_TRANS with nothing to restore from
                    warned = true;
                }
                seg.is_4b = true;
            }
            path.is_4b = true;
            return Ok(warned);
        }

        // Flatten AS4_PATH AS_SEQUENCE segments into one four-byte list.
        let mut full_as_path: Vec<u32> = Vec::new();
        {
            let as4_path = self.get_as4_path().ok_or(())?;
            for seg4 in &as4_path.segments {
                if !seg4.is_4b {
                    return Err(());
                }
                if seg4.segment_type == AsPathSegmentType::AsSequence {
                    full_as_path.extend_from_slice(&seg4.asn_list);
                }
            }
        }

        self.drop_attrib(attr_type_code::AS4_PATH);

        // The substitution pointer starts at the first four-byte-only value
        // and advances only once the first AS_TRANS has been replaced; each
        // segment walks with its own pointer.
        let has_4b = !full_as_path.is_empty();
        let iter_4b = full_as_path
            .iter()
            .position(|asn| *asn > 0xffff)
            .unwrap_or(full_as_path.len());

        let mut warned = false;
        let path = self.get_as_path_mut().ok_or(())?;
        let mut new_segs: Vec<AsPathSegment> = Vec::new();

        for seg2 in &path.segments {
            if seg2.is_4b {
                return Err(());
            }

            let mut local_iter = iter_4b;
            let mut incr_iter = false;
            let mut new_seg = AsPathSegment::new(seg2.segment_type, true);

            for asn in &seg2.asn_list {
                let mut new_asn = *asn;

                if has_4b && local_iter < full_as_path.len() {
                    if new_asn == AS_TRANS as u32 {
                        // first AS_TRANS: the pointer moves with us from
                        // here on
                        incr_iter = true;
                        new_asn = full_as_path[local_iter];
                    } else if new_asn != full_as_path[local_iter] {
                        warned = true;
                    }

                    if incr_iter {
                        local_iter += 1;
                    }
                }

                new_seg.asn_list.push(new_asn);
            }

            new_segs.push(new_seg);
        }

        path.is_4b = true;
        path.segments = new_segs;
        Ok(warned)
    }

    /// Inverse of [`restore_as_path`]: copy the four-byte AS_PATH into
    /// AS4_PATH and squash ASNs that do not fit to AS_TRANS.
    pub fn downgrade_as_path(&mut self) -> Result<(), ()> {
        let path = match self.get_as_path() {
            None => return Ok(()),
            Some(path) => path,
        };
        if !path.is_4b {
            return Ok(());
        }

        let mut new_segs: Vec<AsPathSegment> = Vec::new();
        let mut path4 = AsPath::empty(true);

        for seg4 in &path.segments {
            if !seg4.is_4b {
                return Err(());
            }

            let mut new_seg = AsPathSegment::new(seg4.segment_type, false);
            for asn in &seg4.asn_list {
                let new_as = if *asn >= 0xffff { AS_TRANS as u32 } else { *asn };
                new_seg.asn_list.push(new_as);
            }

            path4.segments.push(seg4.clone());
            new_segs.push(new_seg);
        }

        self.set_attrib(PathAttribute::new(PathAttrValue::As4Path(path4)));

        let path = self.get_as_path_mut().ok_or(())?;
        path.is_4b = false;
        path.segments = new_segs;
        Ok(())
    }

    /// Restore the four-byte AGGREGATOR from AS4_AGGREGATOR and drop the
    /// shim attribute.
    pub fn restore_aggregator(&mut self) {
        let as4 = match self.get_attrib(attr_type_code::AS4_AGGREGATOR) {
            Some(PathAttribute {
                value: PathAttrValue::As4Aggregator { asn4, ip_addr },
                ..
            }) => Some((*asn4, *ip_addr)),
            _ => None,
        };

        if let Some(PathAttribute {
            value: PathAttrValue::Aggregator(aggr),
            ..
        }) = self.get_attrib_mut(attr_type_code::AGGREGATOR)
        {
            aggr.is_4b = true;
            if let Some((asn4, ip_addr)) = as4 {
                aggr.asn = asn4;
                aggr.ip_addr = ip_addr;
            }
        }

        self.drop_attrib(attr_type_code::AS4_AGGREGATOR);
    }

    /// Inverse of [`restore_aggregator`]: emit AS4_AGGREGATOR and squash the
    /// 2-byte AGGREGATOR ASN to AS_TRANS when needed.
    pub fn downgrade_aggregator(&mut self) {
        let original = match self.get_attrib(attr_type_code::AGGREGATOR) {
            Some(PathAttribute {
                value: PathAttrValue::Aggregator(aggr),
                ..
            }) => (aggr.asn, aggr.ip_addr),
            _ => return,
        };

        if let Some(PathAttribute {
            value: PathAttrValue::Aggregator(aggr),
            ..
        }) = self.get_attrib_mut(attr_type_code::AGGREGATOR)
        {
            aggr.is_4b = false;
            if aggr.asn >= 0xffff {
                aggr.asn = AS_TRANS as u32;
            }
        }

        self.set_attrib(PathAttribute::new(PathAttrValue::As4Aggregator {
            asn4: original.0,
            ip_addr: original.1,
        }));
    }

    /// Drop attributes that must not be re-advertised: unrecognized
    /// non-transitive optional attributes (RFC 4271 Section 5).
    pub fn drop_non_transitive_unknowns(&mut self) {
        self.path_attributes.retain(|attr| match &attr.value {
            PathAttrValue::Unknown { flags, .. } => {
                flags & super::msg_update_types::PathAttrFlag::TRANSITIVE != 0
            }
            _ => true,
        });
    }

    pub fn print(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let mut out = format!("{}UpdateMessage {{\n", pad);
        if !self.withdrawn_routes.is_empty() {
            out.push_str(&format!("{}    withdrawn:\n", pad));
            for route in &self.withdrawn_routes {
                out.push_str(&format!("{}        {}\n", pad, route));
            }
        }
        if !self.path_attributes.is_empty() {
            out.push_str(&format!("{}    attributes:\n", pad));
            for attr in &self.path_attributes {
                out.push_str(&attr.print(indent + 8));
            }
        }
        if !self.nlri.is_empty() {
            out.push_str(&format!("{}    nlri:\n", pad));
            for route in &self.nlri {
                out.push_str(&format!("{}        {}\n", pad, route));
            }
        }
        out.push_str(&format!("{}}}\n", pad));
        out
    }
}

impl Message for UpdateMessage {
    fn kind(&self) -> MessageType {
        MessageType::UPDATE
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        let withdrawn = write_nlri_list(&self.withdrawn_routes);
        bytes.extend_from_slice(&(withdrawn.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&withdrawn);

        let attrs = write_path_attributes(&self.path_attributes);
        bytes.extend_from_slice(&(attrs.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&attrs);

        bytes.extend_from_slice(&write_nlri_list(&self.nlri));

        bytes
    }
}
