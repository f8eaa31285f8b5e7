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

//! OPEN evaluation: validation, capability negotiation and the transition
//! into OpenConfirm, for both the active and the passive open.

use super::{Action, BgpState, Fsm, Session};
use crate::bgp::msg_keepalive::KeepAliveMessage;
use crate::bgp::msg_notification::{BgpError, NotificationMessage, OpenMessageError};
use crate::bgp::msg_open::{OpenMessage, CAP_FOUR_OCTET_ASN};
use crate::event_bus::{RouteCollisionEvent, RouteEvent};
use crate::{debug, error, info};

impl Fsm {
    /// OPEN received in OpenSent (we spoke first). On success reply with a
    /// KEEPALIVE and wait for the peer's in OpenConfirm.
    pub(crate) fn handle_open_active(
        &self,
        s: &mut Session,
        open: OpenMessage,
        actions: &mut Vec<Action>,
    ) {
        if !self.evaluate_open(s, &open, actions) {
            return;
        }

        self.queue_message(s, &KeepAliveMessage {}, actions);
        self.enter_open_confirm(s);
    }

    /// OPEN received in Idle (peer spoke first). Reply with our OPEN and a
    /// KEEPALIVE, then wait for the peer's KEEPALIVE in OpenConfirm.
    pub(crate) fn handle_open_passive(
        &self,
        s: &mut Session,
        open: OpenMessage,
        actions: &mut Vec<Action>,
    ) {
        if !self.evaluate_open(s, &open, actions) {
            return;
        }

        let own_open = self.make_open();
        self.queue_message(s, &own_open, actions);
        self.queue_message(s, &KeepAliveMessage {}, actions);
        self.enter_open_confirm(s);
    }

    fn enter_open_confirm(&self, s: &mut Session) {
        let now = self.config.clock.now_ms();
        s.timers.start_hold_timer(now);
        s.timers.start_keepalive_timer(now);
        s.timers.connect_retry_started = None;
        self.set_state(s, BgpState::OpenConfirm);
    }

    /// Validate the peer's OPEN and adopt the negotiated session
    /// parameters. On failure the proper NOTIFICATION is queued and the
    /// session returns to Idle.
    fn evaluate_open(
        &self,
        s: &mut Session,
        open: &OpenMessage,
        actions: &mut Vec<Action>,
    ) -> bool {
        // 4-byte mode requires both sides to advertise the capability
        let use_4b = self.config.use_4b_asn && open.has_capability(CAP_FOUR_OCTET_ASN);
        let peer_asn = if use_4b { open.negotiated_asn() } else { open.asn as u32 };

        if peer_asn != self.config.peer_asn {
            error!(self.logger, "open rejected: bad peer asn",
                "expected" => self.config.peer_asn,
                "got" => peer_asn);
            return self.reject_open(s, OpenMessageError::BadPeerAs, actions);
        }

        if open.bgp_identifier == 0 || open.bgp_identifier == self.own_bgp_id() {
            error!(self.logger, "open rejected: bad bgp identifier",
                "bgp_id" => open.bgp_identifier);
            return self.reject_open(s, OpenMessageError::BadBgpIdentifier, actions);
        }

        // 0 disables keepalives entirely; 1 and 2 were rejected by the parser
        let negotiated_hold = self.config.hold_timer.min(open.hold_time);

        s.peer_bgp_id = open.bgp_identifier;
        s.peer_asn = peer_asn;
        s.use_4b = use_4b;
        s.timers.set_negotiated_hold_time(negotiated_hold);

        info!(self.logger, "open accepted",
            "peer_asn" => peer_asn,
            "peer_bgp_id" => std::net::Ipv4Addr::from(open.bgp_identifier).to_string(),
            "hold_time" => negotiated_hold,
            "four_byte_asn" => use_4b);

        // Probe the bus so a competing session to the same peer can resolve
        // the collision (RFC 4271 Section 6.8). A handled probe means the
        // loser already ceased; either way this session proceeds.
        if !self.config.no_collision_detection && self.config.rev_bus.is_some() {
            debug!(self.logger, "publishing collision probe",
                "peer_bgp_id" => open.bgp_identifier);
            actions.push(Action::Publish(RouteEvent::Collision(RouteCollisionEvent {
                peer_bgp_id: open.bgp_identifier,
            })));
        }

        true
    }

    fn reject_open(
        &self,
        s: &mut Session,
        subcode: OpenMessageError,
        actions: &mut Vec<Action>,
    ) -> bool {
        let notify = NotificationMessage::new(BgpError::OpenMessageError(subcode), vec![]);
        self.queue_message(s, &notify, actions);
        self.close_session(s, actions);
        false
    }
}
