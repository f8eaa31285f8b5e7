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

//! The per-peer BGP finite state machine.
//!
//! One [`Fsm`] drives one peering session. The host feeds inbound bytes to
//! [`Fsm::run`] and the clock to [`Fsm::tick`]; outbound messages leave
//! through the configured output sink. Outbound writes and bus publishes are
//! queued while the session state is locked and flushed afterwards, so two
//! FSMs may be piped back to back (the output of one feeding `run` of the
//! other) without deadlocking.

mod state_established;
mod state_openconfirm;
mod state_opensent;

use crate::bgp::msg::{pull_message, BgpMessage, Message};
use crate::bgp::msg_keepalive::KeepAliveMessage;
use crate::bgp::msg_notification::{
    BgpError, CeaseSubcode, FsmErrorSubcode, NotificationMessage,
};
use crate::bgp::msg_open::OpenMessage;
use crate::config::BgpPeerConfig;
use crate::event_bus::{ReceiverId, RouteEvent};
use crate::log::Logger;
use crate::bgp::utils::ParserError;
use crate::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex};

/// Session states. `Broken` is a terminal fault state: the FSM refuses all
/// input until the host calls [`Fsm::stop`] to reset it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BgpState {
    Idle,
    Active,
    Connect,
    OpenSent,
    OpenConfirm,
    Established,
    Broken,
}

impl BgpState {
    fn as_str(&self) -> &str {
        match self {
            BgpState::Idle => "idle",
            BgpState::Active => "active",
            BgpState::Connect => "connect",
            BgpState::OpenSent => "open sent",
            BgpState::OpenConfirm => "open confirm",
            BgpState::Established => "established",
            BgpState::Broken => "broken",
        }
    }
}

impl Display for BgpState {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FsmError {
    #[error("operation not valid in state {0}")]
    InvalidState(BgpState),
    #[error("output handler failed")]
    OutputFailed,
}

/// Session timers, sampled against the host clock's milliseconds.
#[derive(Debug, Clone)]
pub struct FsmTimers {
    /// Negotiated hold time in seconds; 0 disables hold and keepalive.
    pub hold_time: u16,
    /// Keepalive interval, one third of the hold time.
    pub keepalive_time: u16,
    /// Interval between OPEN retransmissions in OpenSent.
    pub connect_retry_time: u16,
    pub hold_timer_started: Option<u64>,
    pub keepalive_timer_started: Option<u64>,
    pub connect_retry_started: Option<u64>,
}

impl FsmTimers {
    pub fn new(hold_time: u16, connect_retry_time: u16) -> Self {
        FsmTimers {
            hold_time,
            keepalive_time: hold_time / 3,
            connect_retry_time,
            hold_timer_started: None,
            keepalive_timer_started: None,
            connect_retry_started: None,
        }
    }

    /// Adopt the negotiated hold time (min of both proposals); keepalive is
    /// one third of it (RFC 4271 Section 4.4).
    pub fn set_negotiated_hold_time(&mut self, hold_time: u16) {
        self.hold_time = hold_time;
        self.keepalive_time = hold_time / 3;
    }

    pub fn start_hold_timer(&mut self, now_ms: u64) {
        if self.hold_time > 0 {
            self.hold_timer_started = Some(now_ms);
        }
    }

    pub fn reset_hold_timer(&mut self, now_ms: u64) {
        if self.hold_timer_started.is_some() {
            self.hold_timer_started = Some(now_ms);
        }
    }

    pub fn start_keepalive_timer(&mut self, now_ms: u64) {
        if self.keepalive_time > 0 {
            self.keepalive_timer_started = Some(now_ms);
        }
    }

    pub fn start_connect_retry(&mut self, now_ms: u64) {
        if self.connect_retry_time > 0 {
            self.connect_retry_started = Some(now_ms);
        }
    }

    pub fn stop_all(&mut self) {
        self.hold_timer_started = None;
        self.keepalive_timer_started = None;
        self.connect_retry_started = None;
    }

    pub fn hold_timer_expired(&self, now_ms: u64) -> bool {
        match self.hold_timer_started {
            Some(started) if self.hold_time > 0 => {
                now_ms >= started + self.hold_time as u64 * 1000
            }
            _ => false,
        }
    }

    pub fn keepalive_timer_expired(&self, now_ms: u64) -> bool {
        match self.keepalive_timer_started {
            Some(started) if self.keepalive_time > 0 => {
                now_ms >= started + self.keepalive_time as u64 * 1000
            }
            _ => false,
        }
    }

    pub fn connect_retry_expired(&self, now_ms: u64) -> bool {
        match self.connect_retry_started {
            Some(started) if self.connect_retry_time > 0 => {
                now_ms >= started + self.connect_retry_time as u64 * 1000
            }
            _ => false,
        }
    }
}

/// Mutable session state, guarded by the FSM's lock.
pub(crate) struct Session {
    pub(crate) state: BgpState,
    pub(crate) in_buffer: Vec<u8>,
    pub(crate) timers: FsmTimers,
    /// Peer identity learned from its OPEN. Zero until negotiation.
    pub(crate) peer_bgp_id: u32,
    pub(crate) peer_asn: u32,
    /// Both sides advertised the Four-Octet AS capability.
    pub(crate) use_4b: bool,
}

impl Session {
    fn new(config: &BgpPeerConfig) -> Self {
        Session {
            state: BgpState::Idle,
            in_buffer: Vec::new(),
            timers: FsmTimers::new(config.hold_timer, config.connect_retry),
            peer_bgp_id: 0,
            peer_asn: 0,
            use_4b: false,
        }
    }
}

/// Deferred side effect, flushed once the session lock is released.
pub(crate) enum Action {
    Send(Vec<u8>),
    Publish(RouteEvent),
}

pub struct Fsm {
    pub(crate) config: BgpPeerConfig,
    pub(crate) logger: Logger,
    session: Mutex<Session>,
    bus_id: Mutex<Option<ReceiverId>>,
}

impl Fsm {
    /// Build a session FSM and subscribe it to the configured route event
    /// bus. Unsubscribing (when tearing the peer down for good) is the
    /// host's job: `bus.unsubscribe(fsm.bus_id().unwrap())`.
    pub fn new(config: BgpPeerConfig) -> Arc<Fsm> {
        let logger = Logger::new(config.log_level, config.log_handler.clone());
        let session = Mutex::new(Session::new(&config));
        let fsm = Arc::new(Fsm {
            config,
            logger,
            session,
            bus_id: Mutex::new(None),
        });

        if let Some(bus) = fsm.config.rev_bus.clone() {
            let id = bus.subscribe(fsm.clone());
            *fsm.bus_id.lock().unwrap() = Some(id);
        }

        fsm
    }

    pub fn state(&self) -> BgpState {
        self.session.lock().unwrap().state
    }

    /// The peer's BGP identifier once an OPEN has been accepted.
    pub fn peer_bgp_id(&self) -> u32 {
        self.session.lock().unwrap().peer_bgp_id
    }

    pub fn bus_id(&self) -> Option<ReceiverId> {
        *self.bus_id.lock().unwrap()
    }

    /// The RIB this session feeds.
    pub fn rib(&self) -> Arc<crate::rib::Rib> {
        Arc::clone(&self.config.rib)
    }

    pub(crate) fn own_bgp_id(&self) -> u32 {
        u32::from(self.config.router_id)
    }

    /// Begin an active open: emit OPEN and wait for the peer's.
    pub fn start(&self) -> Result<(), FsmError> {
        let mut actions = Vec::new();
        {
            let mut s = self.session.lock().unwrap();
            if s.state != BgpState::Idle {
                return Err(FsmError::InvalidState(s.state));
            }

            self.set_state(&mut s, BgpState::Connect);

            let open = self.make_open();
            self.queue_message(&mut s, &open, &mut actions);

            let now = self.config.clock.now_ms();
            s.timers.start_connect_retry(now);
            self.set_state(&mut s, BgpState::OpenSent);
        }

        self.flush(actions)
    }

    /// Shut the session down: CEASE/SHUTDOWN notification, drop the peer's
    /// routes, return to Idle. Idempotent; also the reset path out of
    /// `Broken`.
    pub fn stop(&self) -> Result<(), FsmError> {
        let mut actions = Vec::new();
        {
            let mut s = self.session.lock().unwrap();
            match s.state {
                BgpState::Idle => return Ok(()),
                BgpState::Broken => {
                    // external reset: nothing can be sent on a dead sink,
                    // but the peer's routes still go
                    self.close_session(&mut s, &mut actions);
                }
                _ => {
                    let notify = NotificationMessage::new(
                        BgpError::Cease(CeaseSubcode::AdministrativeShutdown),
                        vec![],
                    );
                    self.queue_message(&mut s, &notify, &mut actions);
                    self.close_session(&mut s, &mut actions);
                }
            }
        }

        self.flush(actions)
    }

    /// Feed inbound bytes. Complete messages are processed immediately;
    /// an incomplete tail is buffered for the next call. Returns the number
    /// of bytes accepted, or a negative value after an unrecoverable fault.
    pub fn run(&self, bytes: &[u8]) -> i32 {
        let mut actions = Vec::new();
        {
            let mut s = self.session.lock().unwrap();
            if s.state == BgpState::Broken {
                return -1;
            }

            s.in_buffer.extend_from_slice(bytes);

            loop {
                let pulled = pull_message(&s.in_buffer, s.use_4b);
                match pulled {
                    Ok(None) => break,
                    Ok(Some((message, consumed))) => {
                        s.in_buffer.drain(..consumed);
                        if self.config.verbose {
                            debug!(self.logger, "message received",
                                "dump" => message.print(0));
                        }
                        self.dispatch_message(&mut s, message, &mut actions);
                        if s.state == BgpState::Idle || s.state == BgpState::Broken {
                            s.in_buffer.clear();
                            break;
                        }
                    }
                    Err(ParserError::BgpError { error, data }) => {
                        error!(self.logger, "message parse error",
                            "code" => error.error_code(),
                            "subcode" => error.error_subcode());
                        let notify = NotificationMessage::new(error, data);
                        self.queue_message(&mut s, &notify, &mut actions);
                        self.close_session(&mut s, &mut actions);
                        break;
                    }
                    Err(ParserError::IoError(err)) => {
                        // parser state is beyond recovery
                        error!(self.logger, "unrecoverable parse error", "error" => err);
                        self.set_state(&mut s, BgpState::Broken);
                        break;
                    }
                }
            }

            if s.state == BgpState::Broken {
                drop(s);
                let _ = self.flush(actions);
                return -1;
            }
        }

        match self.flush(actions) {
            Ok(()) => bytes.len() as i32,
            Err(_) => -1,
        }
    }

    /// Advance the timers against the host clock.
    pub fn tick(&self) {
        let mut actions = Vec::new();
        {
            let mut s = self.session.lock().unwrap();
            let now = self.config.clock.now_ms();

            match s.state {
                BgpState::Idle | BgpState::Broken | BgpState::Active | BgpState::Connect => {}
                BgpState::OpenSent => {
                    if s.timers.connect_retry_expired(now) {
                        debug!(self.logger, "connect retry timer fired, resending open");
                        let open = self.make_open();
                        self.queue_message(&mut s, &open, &mut actions);
                        s.timers.start_connect_retry(now);
                    }
                }
                BgpState::OpenConfirm | BgpState::Established => {
                    if s.timers.hold_timer_expired(now) {
                        error!(self.logger, "hold timer expired",
                            "hold_time" => s.timers.hold_time);
                        let notify =
                            NotificationMessage::new(BgpError::HoldTimerExpired, vec![]);
                        self.queue_message(&mut s, &notify, &mut actions);
                        self.close_session(&mut s, &mut actions);
                    } else if s.timers.keepalive_timer_expired(now) {
                        self.queue_message(&mut s, &KeepAliveMessage {}, &mut actions);
                    }
                }
            }
        }

        let _ = self.flush(actions);
    }

    // ----- internals -----

    pub(crate) fn make_open(&self) -> OpenMessage {
        if self.config.use_4b_asn {
            OpenMessage::new_4b(self.config.asn, self.config.hold_timer, self.own_bgp_id())
        } else {
            OpenMessage::new_2b(
                self.config.asn as u16,
                self.config.hold_timer,
                self.own_bgp_id(),
            )
        }
    }

    pub(crate) fn set_state(&self, s: &mut Session, new_state: BgpState) {
        if s.state != new_state {
            info!(self.logger, "state change",
                "from" => s.state.to_string(),
                "to" => new_state.to_string());
            s.state = new_state;
        }
    }

    /// Serialize and queue a message; any send refreshes the keepalive
    /// timer since it proves liveness to the peer.
    pub(crate) fn queue_message<M: Message>(
        &self,
        s: &mut Session,
        message: &M,
        actions: &mut Vec<Action>,
    ) {
        let bytes = message.serialize();
        if self.config.verbose {
            debug!(self.logger, "message queued", "length" => bytes.len());
        }
        let now = self.config.clock.now_ms();
        if s.timers.keepalive_timer_started.is_some() {
            s.timers.keepalive_timer_started = Some(now);
        }
        actions.push(Action::Send(bytes));
    }

    /// Tear the session state down to Idle: stop timers, drop buffered
    /// bytes, discard the peer's RIB scope and publish the withdrawals.
    pub(crate) fn close_session(&self, s: &mut Session, actions: &mut Vec<Action>) {
        s.timers.stop_all();
        s.in_buffer.clear();

        if s.peer_bgp_id != 0 {
            let withdrawn = self.config.rib.discard(s.peer_bgp_id);
            if !withdrawn.is_empty() {
                actions.push(Action::Publish(RouteEvent::Withdraw(
                    crate::event_bus::RouteWithdrawEvent { routes: withdrawn },
                )));
            }
        }

        s.peer_bgp_id = 0;
        s.peer_asn = 0;
        s.use_4b = false;
        s.timers.set_negotiated_hold_time(self.config.hold_timer);
        self.set_state(s, BgpState::Idle);
    }

    fn dispatch_message(&self, s: &mut Session, message: BgpMessage, actions: &mut Vec<Action>) {
        match s.state {
            BgpState::Idle | BgpState::Active => match message {
                BgpMessage::Open(open) => {
                    // passive open: the peer spoke first
                    self.set_state(s, BgpState::Active);
                    self.handle_open_passive(s, open, actions);
                }
                _ => {
                    warn!(self.logger, "dropping message received while idle");
                }
            },
            BgpState::Connect => {
                // transient; messages are not expected here
                warn!(self.logger, "dropping message received while connecting");
            }
            BgpState::OpenSent => match message {
                BgpMessage::Open(open) => self.handle_open_active(s, open, actions),
                BgpMessage::Notification(notify) => {
                    self.handle_notification(s, notify, actions)
                }
                _ => self.fsm_error(s, FsmErrorSubcode::InOpenSentState, actions),
            },
            BgpState::OpenConfirm => match message {
                BgpMessage::KeepAlive(_) => self.handle_keepalive_confirm(s, actions),
                BgpMessage::Notification(notify) => {
                    self.handle_notification(s, notify, actions)
                }
                _ => self.fsm_error(s, FsmErrorSubcode::InOpenConfirmState, actions),
            },
            BgpState::Established => match message {
                BgpMessage::Update(update) => self.handle_update(s, update, actions),
                BgpMessage::KeepAlive(_) => {
                    let now = self.config.clock.now_ms();
                    s.timers.reset_hold_timer(now);
                }
                BgpMessage::Notification(notify) => {
                    self.handle_notification(s, notify, actions)
                }
                BgpMessage::Open(_) => {
                    self.fsm_error(s, FsmErrorSubcode::InEstablishedState, actions)
                }
            },
            BgpState::Broken => {}
        }
    }

    fn handle_notification(
        &self,
        s: &mut Session,
        notify: NotificationMessage,
        actions: &mut Vec<Action>,
    ) {
        warn!(self.logger, "notification received",
            "code" => notify.error().error_code(),
            "subcode" => notify.error().error_subcode());
        self.close_session(s, actions);
    }

    /// Unexpected message for the current state: NOTIFICATION with the
    /// matching FSM error subcode, back to Idle.
    fn fsm_error(&self, s: &mut Session, subcode: FsmErrorSubcode, actions: &mut Vec<Action>) {
        error!(self.logger, "unexpected message for state",
            "state" => s.state.to_string());
        let notify =
            NotificationMessage::new(BgpError::FiniteStateMachineError(subcode), vec![]);
        self.queue_message(s, &notify, actions);
        self.close_session(s, actions);
    }

    /// Run the deferred side effects with the session unlocked. A failed
    /// write parks the FSM in Broken.
    fn flush(&self, actions: Vec<Action>) -> Result<(), FsmError> {
        for action in actions {
            match action {
                Action::Send(bytes) => {
                    if !self.config.out_handler.write(&bytes) {
                        error!(self.logger, "output handler failed, session broken");
                        let mut s = self.session.lock().unwrap();
                        s.timers.stop_all();
                        self.set_state(&mut s, BgpState::Broken);
                        return Err(FsmError::OutputFailed);
                    }
                }
                Action::Publish(event) => {
                    if let Some(bus) = &self.config.rev_bus {
                        let handled = bus.publish(self.bus_id(), &event);
                        debug!(self.logger, "event published", "handled" => handled);
                    }
                }
            }
        }
        Ok(())
    }
}

impl crate::event_bus::RouteEventReceiver for Fsm {
    fn handle_route_event(&self, event: &RouteEvent) -> bool {
        let mut actions = Vec::new();
        let handled = {
            let mut s = self.session.lock().unwrap();
            match event {
                RouteEvent::Add(add) => {
                    if s.state == BgpState::Established {
                        self.on_route_add(&mut s, add, &mut actions);
                    }
                    false
                }
                RouteEvent::Withdraw(withdraw) => {
                    if s.state == BgpState::Established {
                        self.on_route_withdraw(&mut s, withdraw, &mut actions);
                    }
                    false
                }
                RouteEvent::Collision(collision) => {
                    self.on_collision(&mut s, collision.peer_bgp_id, &mut actions)
                }
            }
        };
        let _ = self.flush(actions);
        handled
    }
}
