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

//! The IPv6 Routing Information Base. Structurally the IPv4 store with a
//! dual nexthop: a global address plus an optional link-local one, carried
//! beside the entry instead of inside the attribute vector.

use super::{compare_preference, LOCAL_SCOPE};
use crate::bgp::msg_update_types::{AsPath, Origin, PathAttrValue, PathAttribute};
use crate::log::Logger;
use crate::net::Prefix6;
use crate::{debug, info};
use std::cmp::Ordering;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq)]
pub struct Rib6Entry {
    pub route: Prefix6,
    /// Originating speaker's BGP ID; zero for local routes.
    pub src_router_id: u32,
    pub nexthop_global: Ipv6Addr,
    /// Unspecified (::) when the nexthop has no link-local address.
    pub nexthop_linklocal: Ipv6Addr,
    pub attribs: Arc<Vec<PathAttribute>>,
    pub weight: i32,
    pub update_id: u64,
}

impl Rib6Entry {
    pub fn compare(&self, other: &Rib6Entry) -> Ordering {
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

pub struct Rib6 {
    entries: RwLock<Vec<Rib6Entry>>,
    update_id: AtomicU64,
    logger: Logger,
}

impl Rib6 {
    pub fn new(logger: Logger) -> Self {
        Rib6 {
            entries: RwLock::new(Vec::new()),
            update_id: AtomicU64::new(1),
            logger,
        }
    }

    fn attribs_for_local() -> Arc<Vec<PathAttribute>> {
        Arc::new(vec![
            PathAttribute::new(PathAttrValue::Origin(Origin::IGP)),
            PathAttribute::new(PathAttrValue::AsPath(AsPath::empty(true))),
        ])
    }

    /// Insert a locally originated route (scope 0). `nexthop_global` first,
    /// then the optional link-local nexthop.
    pub fn insert_local(
        &self,
        route: Prefix6,
        nexthop_global: Ipv6Addr,
        nexthop_linklocal: Option<Ipv6Addr>,
        weight: i32,
    ) -> Option<Rib6Entry> {
        let nexthop_linklocal = nexthop_linklocal.unwrap_or(Ipv6Addr::UNSPECIFIED);
        let mut entries = self.entries.write().unwrap();

        if entries
            .iter()
            .any(|e| e.src_router_id == LOCAL_SCOPE && e.route == route)
        {
            return None;
        }

        let group = entries
            .iter()
            .find(|e| {
                e.src_router_id == LOCAL_SCOPE
                    && e.nexthop_global == nexthop_global
                    && e.nexthop_linklocal == nexthop_linklocal
            })
            .map(|e| (e.update_id, Arc::clone(&e.attribs)));

        let (update_id, attribs) = match group {
            Some(found) => found,
            None => (
                self.update_id.fetch_add(1, AtomicOrdering::SeqCst),
                Self::attribs_for_local(),
            ),
        };

        let entry = Rib6Entry {
            route,
            src_router_id: LOCAL_SCOPE,
            nexthop_global,
            nexthop_linklocal,
            attribs,
            weight,
            update_id,
        };

        info!(self.logger, "rib6 insert local route",
            "group" => update_id,
            "route" => route.to_string(),
            "nexthop" => nexthop_global.to_string());

        entries.push(entry.clone());
        Some(entry)
    }

    /// Insert several local routes under one update group. The nexthop
    /// argument order is global first, link-local second, for every route.
    pub fn insert_local_many(
        &self,
        routes: &[Prefix6],
        nexthop_global: Ipv6Addr,
        nexthop_linklocal: Option<Ipv6Addr>,
        weight: i32,
    ) -> Vec<Rib6Entry> {
        routes
            .iter()
            .filter_map(|route| self.insert_local(*route, nexthop_global, nexthop_linklocal, weight))
            .collect()
    }

    /// Insert or update a route learned from a peer; replace only on a
    /// tie-break win. Returns whether the table changed.
    pub fn insert_peer(
        &self,
        src_router_id: u32,
        route: Prefix6,
        nexthop_global: Ipv6Addr,
        nexthop_linklocal: Option<Ipv6Addr>,
        attribs: Arc<Vec<PathAttribute>>,
        weight: i32,
    ) -> bool {
        let nexthop_linklocal = nexthop_linklocal.unwrap_or(Ipv6Addr::UNSPECIFIED);
        let mut entries = self.entries.write().unwrap();

        let update_id = entries
            .iter()
            .find(|e| Arc::ptr_eq(&e.attribs, &attribs) && e.nexthop_global == nexthop_global)
            .map(|e| e.update_id)
            .unwrap_or_else(|| self.update_id.fetch_add(1, AtomicOrdering::SeqCst));

        let new_entry = Rib6Entry {
            route,
            src_router_id,
            nexthop_global,
            nexthop_linklocal,
            attribs,
            weight,
            update_id,
        };

        if let Some(pos) = entries
            .iter()
            .position(|e| e.route == route && e.src_router_id == src_router_id)
        {
            if new_entry.compare(&entries[pos]) == Ordering::Greater {
                info!(self.logger, "rib6 replace route",
                    "group" => update_id,
                    "scope" => Ipv4Addr::from(src_router_id).to_string(),
                    "route" => route.to_string());
                entries[pos] = new_entry;
                return true;
            }
            debug!(self.logger, "rib6 keep existing route",
                "scope" => Ipv4Addr::from(src_router_id).to_string(),
                "route" => route.to_string());
            return false;
        }

        info!(self.logger, "rib6 insert route",
            "group" => update_id,
            "scope" => Ipv4Addr::from(src_router_id).to_string(),
            "route" => route.to_string());
        entries.push(new_entry);
        true
    }

    pub fn withdraw(&self, src_router_id: u32, route: Prefix6) -> bool {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|e| !(e.route == route && e.src_router_id == src_router_id));
        let removed = entries.len() != before;

        if removed {
            info!(self.logger, "rib6 withdraw route",
                "scope" => Ipv4Addr::from(src_router_id).to_string(),
                "route" => route.to_string());
        }
        removed
    }

    pub fn discard(&self, src_router_id: u32) -> Vec<Prefix6> {
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
            info!(self.logger, "rib6 discard scope",
                "scope" => Ipv4Addr::from(src_router_id).to_string(),
                "routes" => withdrawn.len());
        }
        withdrawn
    }

    pub fn lookup(&self, dest: Ipv6Addr) -> Option<Rib6Entry> {
        let entries = self.entries.read().unwrap();
        Self::select(entries.iter().filter(|e| e.route.includes_addr(dest)))
    }

    pub fn lookup_excluding(&self, src_router_id: u32, dest: Ipv6Addr) -> Option<Rib6Entry> {
        let entries = self.entries.read().unwrap();
        Self::select(
            entries
                .iter()
                .filter(|e| e.src_router_id != src_router_id && e.route.includes_addr(dest)),
        )
    }

    fn select<'a, I: Iterator<Item = &'a Rib6Entry>>(candidates: I) -> Option<Rib6Entry> {
        let mut best: Option<&Rib6Entry> = None;
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

    pub fn get(&self) -> Vec<Rib6Entry> {
        self.entries.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

impl Default for Rib6 {
    fn default() -> Self {
        Self::new(Logger::default())
    }
}
