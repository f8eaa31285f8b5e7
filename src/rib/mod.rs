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

//! Routing Information Base: per-family prefix stores with tie-break
//! selection and update-group assignment.

pub mod rib4;
pub mod rib6;

pub use rib4::{Rib, RibEntry};
pub use rib6::{Rib6, Rib6Entry};

use crate::bgp::msg_update_types::{PathAttrValue, PathAttribute};
use std::cmp::Ordering;

/// Scope value designating a locally-injected route.
pub const LOCAL_SCOPE: u32 = 0;

fn local_pref(attribs: &[PathAttribute]) -> u32 {
    for attr in attribs {
        if let PathAttrValue::LocalPref(pref) = &attr.value {
            return *pref;
        }
    }
    100 // default degree of preference
}

fn as_path_length(attribs: &[PathAttribute]) -> usize {
    for attr in attribs {
        if let PathAttrValue::AsPath(path) = &attr.value {
            return path.path_length();
        }
    }
    0
}

fn origin_value(attribs: &[PathAttribute]) -> u8 {
    for attr in attribs {
        if let PathAttrValue::Origin(origin) = &attr.value {
            return *origin as u8;
        }
    }
    2 // INCOMPLETE when absent
}

fn med(attribs: &[PathAttribute]) -> u32 {
    for attr in attribs {
        if let PathAttrValue::MultiExitDisc(med) = &attr.value {
            return *med;
        }
    }
    0
}

fn leftmost_asn(attribs: &[PathAttribute]) -> Option<u32> {
    attribs.iter().find_map(|attr| match &attr.value {
        PathAttrValue::AsPath(path) => path.leftmost_asn(),
        _ => None,
    })
}

/// Tie-break comparison shared by both families. `Greater` means `a` is
/// preferred. Applied in sequence; the first differing criterion decides:
///
/// 1. higher weight
/// 2. higher LOCAL_PREF (default 100)
/// 3. shorter AS_PATH (AS_SET counts as one)
/// 4. lower ORIGIN (IGP < EGP < INCOMPLETE)
/// 5. lower MED, compared only between paths from the same leftmost AS
/// 6. lower source router id
pub(crate) fn compare_preference(
    a_weight: i32,
    a_attribs: &[PathAttribute],
    a_src: u32,
    b_weight: i32,
    b_attribs: &[PathAttribute],
    b_src: u32,
) -> Ordering {
    match a_weight.cmp(&b_weight) {
        Ordering::Equal => {}
        ord => return ord,
    }

    match local_pref(a_attribs).cmp(&local_pref(b_attribs)) {
        Ordering::Equal => {}
        ord => return ord,
    }

    match as_path_length(b_attribs).cmp(&as_path_length(a_attribs)) {
        Ordering::Equal => {}
        ord => return ord,
    }

    match origin_value(b_attribs).cmp(&origin_value(a_attribs)) {
        Ordering::Equal => {}
        ord => return ord,
    }

    if leftmost_asn(a_attribs) == leftmost_asn(b_attribs) {
        match med(b_attribs).cmp(&med(a_attribs)) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }

    b_src.cmp(&a_src)
}
