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

//! End-to-end session scenarios: two speakers wired back to back through
//! their output sinks, driven by a manual clock.

use bgpcore::bgp::msg::{pull_message, BgpMessage, Message};
use bgpcore::bgp::msg_keepalive::KeepAliveMessage;
use bgpcore::bgp::msg_open::OpenMessage;
use bgpcore::bgp::msg_update_types::{AsPathSegmentType, Origin, PathAttrValue};
use bgpcore::bgp::AS_TRANS;
use bgpcore::event_bus::{RouteAddEvent, RouteEvent, RouteEventBus, RouteWithdrawEvent};
use bgpcore::event_bus::RouteCollisionEvent;
use bgpcore::fsm::{BgpState, Fsm};
use bgpcore::handlers::{Clock, LogHandler, OutHandler};
use bgpcore::net::Prefix4;
use bgpcore::rib::{Rib, LOCAL_SCOPE};
use bgpcore::BgpPeerConfig;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

/// Collects outbound messages for inspection.
#[derive(Default)]
struct CaptureOut {
    frames: Mutex<Vec<Vec<u8>>>,
}

impl CaptureOut {
    fn messages(&self, use_4b: bool) -> Vec<BgpMessage> {
        let frames = self.frames.lock().unwrap();
        let mut out = Vec::new();
        for frame in frames.iter() {
            let (message, consumed) = pull_message(frame, use_4b)
                .expect("captured frame parses")
                .expect("captured frame complete");
            assert_eq!(consumed, frame.len(), "one message per write");
            out.push(message);
        }
        out
    }

    fn clear(&self) {
        self.frames.lock().unwrap().clear();
    }
}

impl OutHandler for CaptureOut {
    fn write(&self, bytes: &[u8]) -> bool {
        self.frames.lock().unwrap().push(bytes.to_vec());
        true
    }
}

/// Feeds everything written by one FSM straight into the other.
#[derive(Default)]
struct PipedOut {
    other: Mutex<Option<Arc<Fsm>>>,
}

impl PipedOut {
    fn set_peer(&self, other: Arc<Fsm>) {
        *self.other.lock().unwrap() = Some(other);
    }
}

impl OutHandler for PipedOut {
    fn write(&self, bytes: &[u8]) -> bool {
        let other = self.other.lock().unwrap().clone();
        match other {
            Some(fsm) => fsm.run(bytes) >= 0,
            None => false,
        }
    }
}

struct ManualClock(Mutex<u64>);

impl ManualClock {
    fn new() -> Arc<Self> {
        Arc::new(ManualClock(Mutex::new(0)))
    }

    fn advance(&self, ms: u64) {
        *self.0.lock().unwrap() += ms;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        *self.0.lock().unwrap()
    }
}

/// Keeps test output quiet.
struct NullLog;

impl LogHandler for NullLog {
    fn stdout(&self, _line: &str) {}
    fn stderr(&self, _line: &str) {}
}

fn prefix(s: &str, len: u8) -> Prefix4 {
    Prefix4::from_str(s, len).unwrap()
}

fn base_config(
    asn: u32,
    peer_asn: u32,
    router_id: Ipv4Addr,
    out: Arc<dyn OutHandler>,
) -> BgpPeerConfig {
    let mut config = BgpPeerConfig::new(
        asn,
        peer_asn,
        router_id,
        router_id,
        Arc::new(Rib::default()),
        out,
    );
    config.log_handler = Arc::new(NullLog);
    config
}

/// S1 fixture: local speaker 65000/10.0.0.1, peer 65001/10.0.0.2, 4-byte
/// capable on both ends, 180s hold.
fn s1_fsm() -> (Arc<Fsm>, Arc<CaptureOut>, Arc<ManualClock>, Arc<RouteEventBus>) {
    let out = Arc::new(CaptureOut::default());
    let clock = ManualClock::new();
    let bus = Arc::new(RouteEventBus::new());

    let mut config = base_config(65000, 65001, Ipv4Addr::new(10, 0, 0, 1), out.clone());
    config.use_4b_asn = true;
    config.hold_timer = 180;
    config.clock = clock.clone();
    config.rev_bus = Some(bus.clone());

    (Fsm::new(config), out, clock, bus)
}

fn peer_open(asn: u32, hold: u16, bgp_id: Ipv4Addr) -> Vec<u8> {
    OpenMessage::new_4b(asn, hold, u32::from(bgp_id)).serialize()
}

fn establish(fsm: &Arc<Fsm>, out: &CaptureOut) {
    let open = peer_open(65001, 180, Ipv4Addr::new(10, 0, 0, 2));
    assert!(fsm.run(&open) >= 0);
    assert!(fsm.run(&KeepAliveMessage {}.serialize()) >= 0);
    assert_eq!(fsm.state(), BgpState::Established);
    out.clear();
}

#[test]
fn s1_open_negotiation() {
    let (fsm, out, _clock, _bus) = s1_fsm();

    let open = peer_open(65001, 180, Ipv4Addr::new(10, 0, 0, 2));
    let accepted = fsm.run(&open);
    assert_eq!(accepted, open.len() as i32);

    assert_eq!(fsm.state(), BgpState::OpenConfirm);
    assert_eq!(fsm.peer_bgp_id(), u32::from(Ipv4Addr::new(10, 0, 0, 2)));

    let sent = out.messages(true);
    assert_eq!(sent.len(), 2, "expect OPEN followed by KEEPALIVE");
    match &sent[0] {
        BgpMessage::Open(open) => {
            assert_eq!(open.negotiated_asn(), 65000);
            assert_eq!(open.hold_time, 180);
            assert_eq!(open.bgp_identifier, u32::from(Ipv4Addr::new(10, 0, 0, 1)));
        }
        other => panic!("expected OPEN first, got {:?}", other),
    }
    assert!(matches!(sent[1], BgpMessage::KeepAlive(_)));
}

#[test]
fn s1_open_split_across_chunks() {
    let (fsm, out, _clock, _bus) = s1_fsm();

    let open = peer_open(65001, 180, Ipv4Addr::new(10, 0, 0, 2));
    let (head, tail) = open.split_at(13);

    assert_eq!(fsm.run(head), head.len() as i32);
    assert_eq!(fsm.state(), BgpState::Idle, "incomplete frame buffered");
    assert_eq!(fsm.run(tail), tail.len() as i32);

    assert_eq!(fsm.state(), BgpState::OpenConfirm);
    assert_eq!(out.messages(true).len(), 2);
}

#[test]
fn s2_asn_mismatch() {
    let (fsm, out, _clock, _bus) = s1_fsm();

    // peer advertises 65002 where 65001 is configured
    let open = peer_open(65002, 180, Ipv4Addr::new(10, 0, 0, 2));
    assert!(fsm.run(&open) >= 0);

    assert_eq!(fsm.state(), BgpState::Idle);

    let sent = out.messages(true);
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        BgpMessage::Notification(notify) => {
            assert_eq!(notify.error().error_code(), 2);
            assert_eq!(notify.error().error_subcode(), 2);
        }
        other => panic!("expected NOTIFICATION, got {:?}", other),
    }
}

#[test]
fn s3_local_route_advertisement() {
    let (fsm, out, _clock, bus) = s1_fsm();
    establish(&fsm, &out);

    let route = prefix("172.30.0.0", 24);
    let entry = fsm_rib(&fsm)
        .insert_local(route, Ipv4Addr::new(10, 0, 0, 1), 0)
        .expect("insert");

    bus.publish(
        None,
        &RouteEvent::Add(RouteAddEvent {
            attribs: entry.attribs.clone(),
            routes: vec![route],
        }),
    );

    let sent = out.messages(true);
    assert_eq!(sent.len(), 1);
    let update = match &sent[0] {
        BgpMessage::Update(update) => update,
        other => panic!("expected UPDATE, got {:?}", other),
    };

    assert_eq!(update.nlri, vec![route]);
    assert!(update.withdrawn_routes.is_empty());
    assert_eq!(update.get_origin(), Some(Origin::IGP));
    assert_eq!(update.get_next_hop(), Some(Ipv4Addr::new(10, 0, 0, 1)));

    let path = update.get_as_path().expect("as_path present");
    assert_eq!(path.segments.len(), 1);
    assert_eq!(path.segments[0].segment_type, AsPathSegmentType::AsSequence);
    assert_eq!(path.segments[0].asn_list, vec![65000]);
}

#[test]
fn s4_withdraw() {
    let (fsm, out, _clock, bus) = s1_fsm();
    establish(&fsm, &out);

    let route = prefix("172.30.0.0", 24);
    let entry = fsm_rib(&fsm)
        .insert_local(route, Ipv4Addr::new(10, 0, 0, 1), 0)
        .expect("insert");
    bus.publish(
        None,
        &RouteEvent::Add(RouteAddEvent {
            attribs: entry.attribs.clone(),
            routes: vec![route],
        }),
    );
    out.clear();

    assert!(fsm_rib(&fsm).withdraw(LOCAL_SCOPE, route));
    bus.publish(
        None,
        &RouteEvent::Withdraw(RouteWithdrawEvent {
            routes: vec![route],
        }),
    );

    let sent = out.messages(true);
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        BgpMessage::Update(update) => {
            assert_eq!(update.withdrawn_routes, vec![route]);
            assert!(update.path_attributes.is_empty());
            assert!(update.nlri.is_empty());
        }
        other => panic!("expected UPDATE, got {:?}", other),
    }
}

#[test]
fn s5_collision_resolution() {
    let bus = Arc::new(RouteEventBus::new());
    let out_a = Arc::new(CaptureOut::default());
    let out_b = Arc::new(CaptureOut::default());

    // speaker A: own id 10.0.0.1, session to 10.0.0.2
    let mut config_a = base_config(65000, 65001, Ipv4Addr::new(10, 0, 0, 1), out_a.clone());
    config_a.use_4b_asn = true;
    config_a.rev_bus = Some(bus.clone());
    let fsm_a = Fsm::new(config_a);

    // speaker B: own id 10.0.0.2, session to 10.0.0.1
    let mut config_b = base_config(65001, 65000, Ipv4Addr::new(10, 0, 0, 2), out_b.clone());
    config_b.use_4b_asn = true;
    config_b.rev_bus = Some(bus.clone());
    let fsm_b = Fsm::new(config_b);

    // both reach OpenConfirm via a passive open
    assert!(fsm_a.run(&peer_open(65001, 180, Ipv4Addr::new(10, 0, 0, 2))) >= 0);
    assert!(fsm_b.run(&peer_open(65000, 180, Ipv4Addr::new(10, 0, 0, 1))) >= 0);
    assert_eq!(fsm_a.state(), BgpState::OpenConfirm);
    assert_eq!(fsm_b.state(), BgpState::OpenConfirm);
    out_a.clear();
    out_b.clear();

    // A's peer (10.0.0.2) outranks A's own id: the session survives
    let handled = bus.publish(
        None,
        &RouteEvent::Collision(RouteCollisionEvent {
            peer_bgp_id: u32::from(Ipv4Addr::new(10, 0, 0, 2)),
        }),
    );
    assert!(!handled);
    assert_eq!(fsm_a.state(), BgpState::OpenConfirm);
    assert!(out_a.messages(true).is_empty());

    // B's peer (10.0.0.1) is outranked by B's own id: B cedes the session
    let handled = bus.publish(
        None,
        &RouteEvent::Collision(RouteCollisionEvent {
            peer_bgp_id: u32::from(Ipv4Addr::new(10, 0, 0, 1)),
        }),
    );
    assert!(handled);
    assert_eq!(fsm_b.state(), BgpState::Idle);

    let sent = out_b.messages(true);
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        BgpMessage::Notification(notify) => {
            assert_eq!(notify.error().error_code(), 6); // CEASE
            assert_eq!(notify.error().error_subcode(), 7); // collision resolution
        }
        other => panic!("expected NOTIFICATION, got {:?}", other),
    }
}

#[test]
fn s6_hold_timer_expiry() {
    let out = Arc::new(CaptureOut::default());
    let clock = ManualClock::new();

    let mut config = base_config(65000, 65001, Ipv4Addr::new(10, 0, 0, 1), out.clone());
    config.use_4b_asn = true;
    config.hold_timer = 90;
    config.clock = clock.clone();
    let fsm = Fsm::new(config);

    assert!(fsm.run(&peer_open(65001, 90, Ipv4Addr::new(10, 0, 0, 2))) >= 0);
    assert!(fsm.run(&KeepAliveMessage {}.serialize()) >= 0);
    assert_eq!(fsm.state(), BgpState::Established);
    out.clear();

    // nothing heard for the whole hold interval
    clock.advance(90_000);
    fsm.tick();

    assert_eq!(fsm.state(), BgpState::Idle);
    let sent = out.messages(true);
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        BgpMessage::Notification(notify) => {
            assert_eq!(notify.error().error_code(), 4); // hold timer expired
        }
        other => panic!("expected NOTIFICATION, got {:?}", other),
    }
}

#[test]
fn keepalives_sent_on_schedule() {
    let out = Arc::new(CaptureOut::default());
    let clock = ManualClock::new();

    let mut config = base_config(65000, 65001, Ipv4Addr::new(10, 0, 0, 1), out.clone());
    config.use_4b_asn = true;
    config.hold_timer = 90;
    config.clock = clock.clone();
    let fsm = Fsm::new(config);

    assert!(fsm.run(&peer_open(65001, 90, Ipv4Addr::new(10, 0, 0, 2))) >= 0);
    assert!(fsm.run(&KeepAliveMessage {}.serialize()) >= 0);
    out.clear();

    // keepalive due at hold/3 = 30s
    clock.advance(30_000);
    fsm.tick();

    let sent = out.messages(true);
    assert_eq!(sent.len(), 1);
    assert!(matches!(sent[0], BgpMessage::KeepAlive(_)));
    assert_eq!(fsm.state(), BgpState::Established);

    // peer keeps talking: hold timer stays quiet
    assert!(fsm.run(&KeepAliveMessage {}.serialize()) >= 0);
    clock.advance(60_000);
    fsm.tick();
    assert_eq!(fsm.state(), BgpState::Established);
}

#[test]
fn stop_sends_cease_and_discards_scope() {
    let (fsm, out, _clock, _bus) = s1_fsm();
    establish(&fsm, &out);

    // learn one route from the peer
    let mut update = bgpcore::bgp::msg_update::UpdateMessage::new(true);
    update.set_attrib(bgpcore::bgp::msg_update_types::PathAttribute::new(
        PathAttrValue::Origin(Origin::IGP),
    ));
    assert!(update.prepend(65001));
    update.set_next_hop(Ipv4Addr::new(10, 0, 0, 2));
    update.nlri = vec![prefix("198.51.100.0", 24)];
    assert!(fsm.run(&update.serialize()) >= 0);
    assert_eq!(fsm_rib(&fsm).len(), 1);
    out.clear();

    fsm.stop().expect("stop");
    assert_eq!(fsm.state(), BgpState::Idle);

    let sent = out.messages(true);
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        BgpMessage::Notification(notify) => {
            assert_eq!(notify.error().error_code(), 6); // CEASE
            assert_eq!(notify.error().error_subcode(), 2); // administrative shutdown
        }
        other => panic!("expected NOTIFICATION, got {:?}", other),
    }

    // peer scope dropped with the session
    assert!(fsm_rib(&fsm).is_empty());

    // idempotent
    fsm.stop().expect("second stop");
    assert_eq!(fsm.state(), BgpState::Idle);
}

#[test]
fn piped_speakers_full_exchange() {
    let clock = ManualClock::new();

    let pipe_a = Arc::new(PipedOut::default());
    let pipe_b = Arc::new(PipedOut::default());
    let bus_a = Arc::new(RouteEventBus::new());
    let bus_b = Arc::new(RouteEventBus::new());
    let rib_a = Arc::new(Rib::default());
    let rib_b = Arc::new(Rib::default());

    let mut config_a = base_config(65000, 65001, Ipv4Addr::new(10, 0, 0, 1), pipe_a.clone());
    config_a.use_4b_asn = true;
    config_a.rib = rib_a.clone();
    config_a.rev_bus = Some(bus_a.clone());
    config_a.clock = clock.clone();
    config_a.forced_default_nexthop = true;
    config_a.no_nexthop_check = true;
    config_a.no_collision_detection = true;

    let mut config_b = base_config(65001, 65000, Ipv4Addr::new(10, 0, 0, 2), pipe_b.clone());
    config_b.use_4b_asn = true;
    config_b.rib = rib_b.clone();
    config_b.rev_bus = Some(bus_b.clone());
    config_b.clock = clock.clone();
    config_b.forced_default_nexthop = true;
    config_b.no_nexthop_check = true;
    config_b.no_collision_detection = true;

    let fsm_a = Fsm::new(config_a);
    let fsm_b = Fsm::new(config_b);
    pipe_a.set_peer(fsm_b.clone());
    pipe_b.set_peer(fsm_a.clone());

    // one call cascades the whole handshake through the pipes
    fsm_a.start().expect("start");
    assert_eq!(fsm_a.state(), BgpState::Established);
    assert_eq!(fsm_b.state(), BgpState::Established);

    // advertise a route from A
    let route = prefix("172.30.0.0", 24);
    let entry = rib_a
        .insert_local(route, Ipv4Addr::new(10, 0, 0, 1), 0)
        .expect("insert");
    bus_a.publish(
        None,
        &RouteEvent::Add(RouteAddEvent {
            attribs: entry.attribs.clone(),
            routes: vec![route],
        }),
    );

    // B learned it, scoped to A's router id
    let learned = rib_b
        .lookup(Ipv4Addr::new(172, 30, 0, 7))
        .expect("route learned");
    assert_eq!(learned.route, route);
    assert_eq!(learned.src_router_id, u32::from(Ipv4Addr::new(10, 0, 0, 1)));
    assert_eq!(learned.nexthop, Ipv4Addr::new(10, 0, 0, 1));

    // and A's ASN leads the learned path
    let path = learned
        .attribs
        .iter()
        .find_map(|attr| match &attr.value {
            PathAttrValue::AsPath(path) => Some(path),
            _ => None,
        })
        .expect("as_path stored");
    assert_eq!(path.leftmost_asn(), Some(65000));

    // withdraw it again
    assert!(rib_a.withdraw(LOCAL_SCOPE, route));
    bus_a.publish(
        None,
        &RouteEvent::Withdraw(RouteWithdrawEvent {
            routes: vec![route],
        }),
    );
    assert!(rib_b.lookup(Ipv4Addr::new(172, 30, 0, 7)).is_none());
}

#[test]
fn piped_speakers_two_byte_interop() {
    let clock = ManualClock::new();

    let pipe_a = Arc::new(PipedOut::default());
    let pipe_b = Arc::new(PipedOut::default());
    let rib_a = Arc::new(Rib::default());
    let rib_b = Arc::new(Rib::default());
    let bus_a = Arc::new(RouteEventBus::new());
    let bus_b = Arc::new(RouteEventBus::new());

    // A holds a 4-byte ASN; B is a 2-byte-only speaker and sees AS_TRANS
    let mut config_a = base_config(396982, 65001, Ipv4Addr::new(10, 0, 0, 1), pipe_a.clone());
    config_a.use_4b_asn = true;
    config_a.rib = rib_a.clone();
    config_a.rev_bus = Some(bus_a.clone());
    config_a.clock = clock.clone();
    config_a.forced_default_nexthop = true;
    config_a.no_nexthop_check = true;
    config_a.no_collision_detection = true;

    let mut config_b = base_config(
        65001,
        AS_TRANS as u32,
        Ipv4Addr::new(10, 0, 0, 2),
        pipe_b.clone(),
    );
    config_b.use_4b_asn = false;
    config_b.rib = rib_b.clone();
    config_b.rev_bus = Some(bus_b.clone());
    config_b.clock = clock.clone();
    config_b.forced_default_nexthop = true;
    config_b.no_nexthop_check = true;
    config_b.no_collision_detection = true;

    let fsm_a = Fsm::new(config_a);
    let fsm_b = Fsm::new(config_b);
    pipe_a.set_peer(fsm_b.clone());
    pipe_b.set_peer(fsm_a.clone());

    fsm_a.start().expect("start");
    assert_eq!(fsm_a.state(), BgpState::Established);
    assert_eq!(fsm_b.state(), BgpState::Established);

    // A advertises; B stores the 2-byte view with the AS4_PATH shim
    let route = prefix("172.30.0.0", 24);
    let entry = rib_a
        .insert_local(route, Ipv4Addr::new(10, 0, 0, 1), 0)
        .expect("insert");
    bus_a.publish(
        None,
        &RouteEvent::Add(RouteAddEvent {
            attribs: entry.attribs.clone(),
            routes: vec![route],
        }),
    );

    let learned = rib_b
        .lookup(Ipv4Addr::new(172, 30, 0, 7))
        .expect("route learned");

    let as_path = learned
        .attribs
        .iter()
        .find_map(|attr| match &attr.value {
            PathAttrValue::AsPath(path) => Some(path),
            _ => None,
        })
        .expect("as_path stored");
    assert!(!as_path.is_4b);
    assert_eq!(as_path.leftmost_asn(), Some(AS_TRANS as u32));

    let as4_path = learned
        .attribs
        .iter()
        .find_map(|attr| match &attr.value {
            PathAttrValue::As4Path(path) => Some(path),
            _ => None,
        })
        .expect("as4_path stored");
    assert_eq!(as4_path.leftmost_asn(), Some(396982));

    // B advertises back; A restores the clean 4-byte path
    let route_b = prefix("198.51.100.0", 24);
    let entry_b = rib_b
        .insert_local(route_b, Ipv4Addr::new(10, 0, 0, 2), 0)
        .expect("insert");
    bus_b.publish(
        None,
        &RouteEvent::Add(RouteAddEvent {
            attribs: entry_b.attribs.clone(),
            routes: vec![route_b],
        }),
    );

    let learned_a = rib_a
        .lookup(Ipv4Addr::new(198, 51, 100, 9))
        .expect("route learned");
    let path_a = learned_a
        .attribs
        .iter()
        .find_map(|attr| match &attr.value {
            PathAttrValue::AsPath(path) => Some(path),
            _ => None,
        })
        .expect("as_path stored");
    assert!(path_a.is_4b);
    assert_eq!(path_a.leftmost_asn(), Some(65001));
}

#[test]
fn established_entry_syncs_rib() {
    let (fsm, out, _clock, _bus) = s1_fsm();

    // routes present before the session comes up
    let rib = fsm_rib(&fsm);
    rib.insert_local_many(
        &[prefix("172.30.0.0", 24), prefix("172.30.1.0", 24)],
        Ipv4Addr::new(10, 0, 0, 1),
        0,
    );
    rib.insert_local(prefix("10.99.0.0", 16), Ipv4Addr::new(10, 0, 0, 9), 0);

    assert!(fsm.run(&peer_open(65001, 180, Ipv4Addr::new(10, 0, 0, 2))) >= 0);
    out.clear();
    assert!(fsm.run(&KeepAliveMessage {}.serialize()) >= 0);
    assert_eq!(fsm.state(), BgpState::Established);

    // two update groups -> two UPDATEs
    let sent = out.messages(true);
    let updates: Vec<_> = sent
        .iter()
        .filter_map(|m| match m {
            BgpMessage::Update(u) => Some(u),
            _ => None,
        })
        .collect();
    assert_eq!(updates.len(), 2);

    let mut nlri_counts: Vec<usize> = updates.iter().map(|u| u.nlri.len()).collect();
    nlri_counts.sort();
    assert_eq!(nlri_counts, vec![1, 2]);
}

#[test]
fn egress_filter_blocks_advertisement() {
    use bgpcore::policy::{BgpFilterRule, FilterOp};

    let out = Arc::new(CaptureOut::default());
    let bus = Arc::new(RouteEventBus::new());

    let mut config = base_config(65000, 65001, Ipv4Addr::new(10, 0, 0, 1), out.clone());
    config.use_4b_asn = true;
    config.rev_bus = Some(bus.clone());
    config
        .egress_filters
        .append(BgpFilterRule {
            prefix: prefix("172.16.0.0", 12),
            op: FilterOp::Reject,
        });
    let fsm = Fsm::new(config);
    establish(&fsm, &out);

    let blocked = prefix("172.30.0.0", 24);
    let allowed = prefix("10.1.0.0", 16);
    let rib = fsm_rib(&fsm);
    let blocked_entry = rib
        .insert_local(blocked, Ipv4Addr::new(10, 0, 0, 1), 0)
        .expect("insert");
    let allowed_entry = rib
        .insert_local(allowed, Ipv4Addr::new(10, 0, 0, 1), 0)
        .expect("insert");

    bus.publish(
        None,
        &RouteEvent::Add(RouteAddEvent {
            attribs: blocked_entry.attribs.clone(),
            routes: vec![blocked],
        }),
    );
    assert!(out.messages(true).is_empty(), "filtered route not sent");

    bus.publish(
        None,
        &RouteEvent::Add(RouteAddEvent {
            attribs: allowed_entry.attribs.clone(),
            routes: vec![allowed],
        }),
    );
    let sent = out.messages(true);
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        BgpMessage::Update(update) => assert_eq!(update.nlri, vec![allowed]),
        other => panic!("expected UPDATE, got {:?}", other),
    }
}

fn fsm_rib(fsm: &Arc<Fsm>) -> Arc<Rib> {
    // the config holds the only handle the tests need
    fsm.rib()
}
