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

//! The IPv4 Routing Information Base.

use super::{compare_preference, LOCAL_SCOPE};
use crate::bgp::msg_update_types::{AsPath, Origin, PathAttrValue, PathAttribute};
use crate::log::Logger;
use crate::net::Prefix4;
use crate::{debug, info};
use std::cmp::Ordering;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};

/// One table entry. At most one entry exists per `(route, src_router_id)`
/// pair; the attribute vector is shared by every entry of an update group.
#[derive(Debug, Clone, PartialEq)]
pub struct RibEntry {
    pub route: Prefix4,
    /// Originating speaker's BGP ID in host byte order; zero for local routes.
    pub src_router_id: u32,
    pub nexthop: Ipv4Addr,
    pub attribs: Arc<Vec<PathAttribute>>,
    pub weight: i32,
    /// Entries sharing a nexthop and attribute vector share an update id and
    /// can be packed into a single outbound UPDATE.
    pub update_id: u64,
}

impl RibEntry {
    /// `Greater` means self is preferred under the tie-break chain.
    pub fn compare(&self, other: &RibEntry) -> Ordering {
        compare_preference(
            self.weight,
            &self.attribs,
            self.src_router_id,
            other.weight,
            &other.attribs,
            other.src_router_id,
        )
    }
}

pub struct Rib {
    entries: RwLock<Vec<RibEntry>>,
    update_id: AtomicU64,
    logger: Logger,
}

impl Rib {
    pub fn new(logger: Logger) -> Self {
        Rib {
            entries: RwLock::new(Vec::new()),
            update_id: AtomicU64::new(1),
            logger,
        }
    }

    fn attribs_for_local(nexthop: Ipv4Addr) -> Arc<Vec<PathAttribute>> {
        Arc::new(vec![
            PathAttribute::new(PathAttrValue::Origin(Origin::IGP)),
            PathAttribute::new(PathAttrValue::AsPath(AsPath::empty(true))),
            PathAttribute::new(PathAttrValue::NextHop(nexthop)),
        ])
    }

    /// Insert a locally originated route (scope 0) with attributes
    /// `{ORIGIN=IGP, AS_PATH=empty 4b, NEXT_HOP=nexthop}`. Local routes with
    /// the same nexthop form one update group. Returns the inserted entry,
    /// or None if `(route, 0)` is already present.
    pub fn insert_local(
        &self,
        route: Prefix4,
        nexthop: Ipv4Addr,
        weight: i32,
    ) -> Option<RibEntry> {
        let mut entries = self.entries.write().unwrap();

        if entries
            .iter()
            .any(|e| e.src_router_id == LOCAL_SCOPE && e.route == route)
        {
            return None;
        }

        // reuse the group of an existing local route with this nexthop
        let group = entries
            .iter()
            .find(|e| e.src_router_id == LOCAL_SCOPE && e.nexthop == nexthop)
            .map(|e| (e.update_id, Arc::clone(&e.attribs)));

        let (update_id, attribs) = match group {
            Some(found) => found,
            None => (
                self.update_id.fetch_add(1, AtomicOrdering::SeqCst),
                Self::attribs_for_local(nexthop),
            ),
        };

        let entry = RibEntry {
            route,
            src_router_id: LOCAL_SCOPE,
            nexthop,
            attribs,
            weight,
            update_id,
        };

        info!(self.logger, "rib insert local route",
            "group" => update_id,
            "route" => route.to_string(),
            "nexthop" => nexthop.to_string());

        entries.push(entry.clone());
        Some(entry)
    }

    /// Insert several local routes under one update group (one outbound
    /// UPDATE). Routes already present are skipped.
    pub fn insert_local_many(
        &self,
        routes: &[Prefix4],
        nexthop: Ipv4Addr,
        weight: i32,
    ) -> Vec<RibEntry> {
        routes
            .iter()
            .filter_map(|route| self.insert_local(*route, nexthop, weight))
            .collect()
    }

    /// Insert or update a route learned from a peer. An existing entry for
    /// `(route, src)` is replaced only when the new one wins the tie-break.
    /// Returns whether the table changed.
    pub fn insert_peer(
        &self,
        src_router_id: u32,
        route: Prefix4,
        nexthop: Ipv4Addr,
        attribs: Arc<Vec<PathAttribute>>,
        weight: i32,
    ) -> bool {
        let mut entries = self.entries.write().unwrap();

        // entries sharing this attribute vector and nexthop form one group
        let update_id = entries
            .iter()
            .find(|e| Arc::ptr_eq(&e.attribs, &attribs) && e.nexthop == nexthop)
            .map(|e| e.update_id)
            .unwrap_or_else(|| self.update_id.fetch_add(1, AtomicOrdering::SeqCst));

        let new_entry = RibEntry {
            route,
            src_router_id,
            nexthop,
            attribs,
            weight,
            update_id,
        };

        if let Some(pos) = entries
            .iter()
            .position(|e| e.route == route && e.src_router_id == src_router_id)
        {
            if new_entry.compare(&entries[pos]) == Ordering::Greater {
                info!(self.logger, "rib replace route",
                    "group" => update_id,
                    "scope" => Ipv4Addr::from(src_router_id).to_string(),
                    "route" => route.to_string());
                entries[pos] = new_entry;
                return true;
            }
            debug!(self.logger, "rib keep existing route",
                "scope" => Ipv4Addr::from(src_router_id).to_string(),
                "route" => route.to_string());
            return false;
        }

        info!(self.logger, "rib insert route",
            "group" => update_id,
            "scope" => Ipv4Addr::from(src_router_id).to_string(),
            "route" => route.to_string());
        entries.push(new_entry);
        true
    }

    /// Remove the entry for `(route, src)`. Returns whether one was removed.
    pub fn withdraw(&self, src_router_id: u32, route: Prefix4) -> bool {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|e| !(e.route == route && e.src_router_id == src_router_id));
        let removed = entries.len() != before;

        if removed {
            info!(self.logger, "rib withdraw route",
                "scope" => Ipv4Addr::from(src_router_id).to_string(),
                "route" => route.to_string());
        }
        removed
    }

    /// Remove every entry from a source, returning the withdrawn prefixes.
    pub fn discard(&self, src_router_id: u32) -> Vec<Prefix4> {
        let mut entries = self.entries.write().unwrap();
        let mut withdrawn = Vec::new();

        entries.retain(|e| {
            if e.src_router_id == src_router_id {
                withdrawn.push(e.route);
                false
            } else {
                true
            }
        });

        if !withdrawn.is_empty() {
            info!(self.logger, "rib discard scope",
                "scope" => Ipv4Addr::from(src_router_id).to_string(),
                "routes" => withdrawn.len());
        }
        withdrawn
    }

    /// Select the best entry covering `dest` by tie-break, or None.
    pub fn lookup(&self, dest: Ipv4Addr) -> Option<RibEntry> {
        let entries = self.entries.read().unwrap();
        Self::select(entries.iter().filter(|e| e.route.includes_addr(dest)))
    }

    /// As [`lookup`], ignoring routes learned from the given speaker. Used
    /// on egress so a route is never offered back to the peer it came from.
    pub fn lookup_excluding(&self, src_router_id: u32, dest: Ipv4Addr) -> Option<RibEntry> {
        let entries = self.entries.read().unwrap();
        Self::select(
            entries
                .iter()
                .filter(|e| e.src_router_id != src_router_id && e.route.includes_addr(dest)),
        )
    }

    fn select<'a, I: Iterator<Item = &'a RibEntry>>(candidates: I) -> Option<RibEntry> {
        let mut best: Option<&RibEntry> = None;
        for entry in candidates {
            best = match best {
                None => Some(entry),
                Some(cur) => {
                    if entry.compare(cur) == Ordering::Greater {
                        Some(entry)
                    } else {
                        Some(cur)
                    }
                }
            };
        }
        best.cloned()
    }

    /// Read-only snapshot of the whole table. The lock is released before
    /// the caller sees the data.
    pub fn get(&self) -> Vec<RibEntry> {
        self.entries.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

impl Default for Rib {
    fn default() -> Self {
        Self::new(Logger::default())
    }
}
