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

//! OpenConfirm: the peer's KEEPALIVE completes the handshake. On entering
//! Established the whole RIB is offered to the peer, one UPDATE per update
//! group.

use super::{Action, BgpState, Fsm, Session};
use crate::info;
use std::collections::BTreeMap;

impl Fsm {
    pub(crate) fn handle_keepalive_confirm(&self, s: &mut Session, actions: &mut Vec<Action>) {
        let now = self.config.clock.now_ms();
        s.timers.reset_hold_timer(now);
        self.set_state(s, BgpState::Established);

        info!(self.logger, "session established",
            "peer_asn" => s.peer_asn,
            "peer_bgp_id" => std::net::Ipv4Addr::from(s.peer_bgp_id).to_string());

        self.sync_rib_to_peer(s, actions);
    }

    /// Send the current table to the freshly established peer. Entries
    /// sharing an update group (same attribute vector and nexthop) travel in
    /// one UPDATE; entries learned from this very peer are skipped.
    fn sync_rib_to_peer(&self, s: &mut Session, actions: &mut Vec<Action>) {
        let entries = self.config.rib.get();

        let mut groups: BTreeMap<u64, Vec<&crate::rib::RibEntry>> = BTreeMap::new();
        for entry in &entries {
            if entry.src_router_id == s.peer_bgp_id {
                continue;
            }
            if !self.config.egress_filters.accepts(&entry.route) {
                continue;
            }
            groups.entry(entry.update_id).or_default().push(entry);
        }

        for group in groups.values() {
            let first = match group.first() {
                Some(first) => first,
                None => continue,
            };
            let attribs = (*first.attribs).clone();
            let nexthop = first.nexthop;
            let nlri = group.iter().map(|e| e.route).collect();

            if let Some(update) = self.compose_egress_update(s, attribs, Some(nexthop), nlri) {
                self.queue_message(s, &update, actions);
            }
        }
    }
}
