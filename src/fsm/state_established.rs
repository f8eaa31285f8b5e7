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

//! Established: UPDATE ingest into the RIB, egress of bus route events, and
//! collision resolution.

use super::{Action, Fsm, Session};
use crate::bgp::msg_notification::{
    BgpError, CeaseSubcode, NotificationMessage, UpdateMessageError,
};
use crate::bgp::msg_update::UpdateMessage;
use crate::bgp::msg_update_types::PathAttribute;
use crate::event_bus::{RouteAddEvent, RouteEvent, RouteWithdrawEvent};
use crate::net::Prefix4;
use crate::{debug, error, info, warn};
use std::net::Ipv4Addr;
use std::sync::Arc;

impl Fsm {
    /// Ingest an UPDATE: validate, restore 4-byte paths when the peer is a
    /// 2-byte speaker, apply ingress policy, mutate the RIB and forward the
    /// changes onto the event bus.
    pub(crate) fn handle_update(
        &self,
        s: &mut Session,
        mut update: UpdateMessage,
        actions: &mut Vec<Action>,
    ) {
        let now = self.config.clock.now_ms();
        s.timers.reset_hold_timer(now);

        if !update.nlri.is_empty() {
            if let Err(err) = update.validate_attribs() {
                error!(self.logger, "update attribute validation failed");
                if let Some(notify) = NotificationMessage::from_parser_error(&err) {
                    self.queue_message(s, &notify, actions);
                }
                self.close_session(s, actions);
                return;
            }
        }

        // We speak 4-byte ASNs but this session negotiated 2-byte: bring
        // AS_TRANS placeholders back to their real values (RFC 6793).
        if self.config.use_4b_asn && !s.use_4b {
            match update.restore_as_path() {
                Ok(false) => {}
                Ok(true) => {
                    warn!(self.logger, "as_path and as4_path disagree, using as4_path values");
                }
                Err(()) => {
                    // internal encoding inconsistency; the update is dropped
                    // but the session stays up
                    error!(self.logger, "as_path restore failed, update ignored");
                    return;
                }
            }
            update.restore_aggregator();
        }

        if !update.nlri.is_empty()
            && !self.config.no_nexthop_check
            && self.config.peering_lan.is_some()
        {
            let lan = self.config.peering_lan.as_ref().cloned();
            let valid = match (update.get_next_hop(), lan) {
                (Some(nexthop), Some(lan)) => lan.includes_addr(nexthop),
                _ => false,
            };
            if !valid {
                error!(self.logger, "update rejected: nexthop outside peering lan");
                let notify = NotificationMessage::new(
                    BgpError::UpdateMessageError(UpdateMessageError::InvalidNextHopAttribute),
                    vec![],
                );
                self.queue_message(s, &notify, actions);
                self.close_session(s, actions);
                return;
            }
        }

        // withdrawals first (RFC 4271 Section 3.1)
        let mut withdrawn = Vec::new();
        for route in &update.withdrawn_routes {
            if self.config.rib.withdraw(s.peer_bgp_id, *route) {
                withdrawn.push(*route);
            }
        }
        if !withdrawn.is_empty() {
            actions.push(Action::Publish(RouteEvent::Withdraw(RouteWithdrawEvent {
                routes: withdrawn,
            })));
        }

        if update.nlri.is_empty() {
            return;
        }

        let nexthop = match update.get_next_hop() {
            Some(nexthop) => nexthop,
            None => return, // cannot happen past validate_attribs
        };

        let attribs = Arc::new(update.path_attributes.clone());
        let mut added = Vec::new();
        for route in &update.nlri {
            if !self.config.ingress_filters.accepts(route) {
                debug!(self.logger, "route rejected by ingress filter",
                    "route" => route.to_string());
                continue;
            }
            if self.config.rib.insert_peer(
                s.peer_bgp_id,
                *route,
                nexthop,
                Arc::clone(&attribs),
                self.config.weight,
            ) {
                added.push(*route);
            }
        }

        if !added.is_empty() {
            actions.push(Action::Publish(RouteEvent::Add(RouteAddEvent {
                attribs,
                routes: added,
            })));
        }
    }

    /// Another session (or the host) added routes: advertise them to our
    /// peer, subject to egress policy.
    pub(crate) fn on_route_add(
        &self,
        s: &mut Session,
        event: &RouteAddEvent,
        actions: &mut Vec<Action>,
    ) {
        let nlri: Vec<Prefix4> = event
            .routes
            .iter()
            .filter(|route| self.config.egress_filters.accepts(route))
            .copied()
            .collect();
        if nlri.is_empty() {
            return;
        }

        let attribs = (*event.attribs).clone();
        if let Some(update) = self.compose_egress_update(s, attribs, None, nlri) {
            self.queue_message(s, &update, actions);
        }
    }

    pub(crate) fn on_route_withdraw(
        &self,
        s: &mut Session,
        event: &RouteWithdrawEvent,
        actions: &mut Vec<Action>,
    ) {
        let withdrawn: Vec<Prefix4> = event
            .routes
            .iter()
            .filter(|route| self.config.egress_filters.accepts(route))
            .copied()
            .collect();
        if withdrawn.is_empty() {
            return;
        }

        let update = UpdateMessage::new_withdraw(withdrawn, s.use_4b);
        self.queue_message(s, &update, actions);
    }

    /// Collision probe from the bus. The probe matches when it names our
    /// peer; the session attached to the higher-numbered speaker survives.
    /// Returning true reports the collision handled (this side ceased).
    pub(crate) fn on_collision(
        &self,
        s: &mut Session,
        peer_bgp_id: u32,
        actions: &mut Vec<Action>,
    ) -> bool {
        if self.config.no_collision_detection {
            return false;
        }
        if s.peer_bgp_id == 0 || peer_bgp_id != s.peer_bgp_id {
            return false;
        }

        if self.own_bgp_id() > peer_bgp_id {
            info!(self.logger, "connection collision: clearing session",
                "own_bgp_id" => self.own_bgp_id(),
                "peer_bgp_id" => peer_bgp_id);
            let notify = NotificationMessage::new(
                BgpError::Cease(CeaseSubcode::CollisionResolution),
                vec![],
            );
            self.queue_message(s, &notify, actions);
            self.close_session(s, actions);
            true
        } else {
            debug!(self.logger, "connection collision: session kept",
                "own_bgp_id" => self.own_bgp_id(),
                "peer_bgp_id" => peer_bgp_id);
            false
        }
    }

    /// Build an outbound UPDATE from an attribute vector and a route list:
    /// drop attributes that must not propagate, refuse paths that would loop
    /// through the peer, prepend our ASN, apply the nexthop policy, and
    /// downgrade the encoding for 2-byte sessions.
    pub(crate) fn compose_egress_update(
        &self,
        s: &Session,
        attribs: Vec<PathAttribute>,
        nexthop_hint: Option<Ipv4Addr>,
        nlri: Vec<Prefix4>,
    ) -> Option<UpdateMessage> {
        // compose in 4-byte form; the wire encoding is settled last
        let mut update = UpdateMessage::new(true);
        update.path_attributes = attribs;
        update.drop_non_transitive_unknowns();

        // a vector stored by a 2-byte session carries a 2-byte AS_PATH;
        // widen it (consuming any AS4_PATH) before working on it
        if update.get_as_path().map(|p| !p.is_4b).unwrap_or(false)
            && update.restore_as_path().is_err()
        {
            error!(self.logger, "as_path restore failed, routes not advertised");
            return None;
        }

        // loop prevention: never hand a route back towards its first hop
        if let Some(path) = update.get_as_path() {
            if path.leftmost_asn() == Some(s.peer_asn) {
                debug!(self.logger, "route suppressed: peer is first hop of as_path");
                return None;
            }
        }

        if !update.prepend(self.config.asn) {
            error!(self.logger, "as_path prepend failed, routes not advertised");
            return None;
        }

        let current = update.get_next_hop().or(nexthop_hint);
        update.set_next_hop(self.egress_nexthop(current));

        if !s.use_4b {
            update.use_4b_asn = false;
            if update.downgrade_as_path().is_err() {
                error!(self.logger, "as_path downgrade failed, routes not advertised");
                return None;
            }
            update.downgrade_aggregator();
            self.trim_unneeded_shims(&mut update);
        }

        update.nlri = nlri;
        Some(update)
    }

    /// AS4_PATH and AS4_AGGREGATOR only belong on the wire when an AS_TRANS
    /// placeholder actually hides a four-byte value (RFC 6793 Section 4.2.2).
    fn trim_unneeded_shims(&self, update: &mut UpdateMessage) {
        use crate::bgp::msg_update_types::{attr_type_code, PathAttrValue};
        use crate::bgp::AS_TRANS;

        let path_has_trans = update
            .get_as_path()
            .map(|path| {
                path.segments
                    .iter()
                    .any(|seg| seg.asn_list.contains(&(AS_TRANS as u32)))
            })
            .unwrap_or(false);
        if !path_has_trans {
            update.drop_attrib(attr_type_code::AS4_PATH);
        }

        let aggregator_has_trans = matches!(
            update.get_attrib(attr_type_code::AGGREGATOR),
            Some(PathAttribute {
                value: PathAttrValue::Aggregator(aggr),
                ..
            }) if aggr.asn == AS_TRANS as u32
        );
        if !aggregator_has_trans {
            update.drop_attrib(attr_type_code::AS4_AGGREGATOR);
        }
    }

    /// Egress nexthop policy: forced value wins; otherwise a nexthop inside
    /// the peering LAN is advertised unchanged and anything else is
    /// rewritten to the configured default.
    fn egress_nexthop(&self, current: Option<Ipv4Addr>) -> Ipv4Addr {
        if self.config.forced_default_nexthop {
            return self.config.nexthop;
        }
        match (current, &self.config.peering_lan) {
            (Some(nexthop), Some(lan)) => {
                if lan.includes_addr(nexthop) {
                    nexthop
                } else {
                    self.config.nexthop
                }
            }
            (Some(nexthop), None) => nexthop,
            (None, _) => self.config.nexthop,
        }
    }
}
