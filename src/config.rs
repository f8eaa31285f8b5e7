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

use crate::event_bus::RouteEventBus;
use crate::handlers::{Clock, LogHandler, OutHandler, StdioLogHandler, SystemClock};
use crate::log::LogLevel;
use crate::net::Prefix4;
use crate::policy::BgpFilterRules;
use crate::rib::{Rib, Rib6};
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Proposed hold time when the host does not override it.
pub const DEFAULT_HOLD_TIME: u16 = 120;

/// RFC suggests 120s, but 30s is more practical.
pub const DEFAULT_CONNECT_RETRY: u16 = 30;

/// Per-peer session configuration. Built once by the host and consumed by
/// [`crate::fsm::Fsm::new`]; collaborator handles (RIB, bus, clock, sinks)
/// are shared with the host through `Arc`s.
#[derive(Clone)]
pub struct BgpPeerConfig {
    /// Local ASN. Values above 65535 require `use_4b_asn`.
    pub asn: u32,
    /// ASN the peer must present in its OPEN.
    pub peer_asn: u32,
    /// Advertise the Four-Octet AS capability (RFC 6793).
    pub use_4b_asn: bool,
    /// Proposed hold time in seconds; 0 disables hold and keepalive.
    pub hold_timer: u16,
    /// Interval between OPEN retransmissions while waiting for the peer.
    pub connect_retry: u16,
    /// Local BGP identifier.
    pub router_id: Ipv4Addr,
    /// Default nexthop for egress routes.
    pub nexthop: Ipv4Addr,
    /// Always rewrite NEXT_HOP to `nexthop` on egress.
    pub forced_default_nexthop: bool,
    /// The shared peering LAN; governs nexthop rewriting and validation.
    pub peering_lan: Option<Prefix4>,
    /// Skip the ingress NEXT_HOP-in-peering-LAN check.
    pub no_nexthop_check: bool,
    /// Do not publish or act on collision probes.
    pub no_collision_detection: bool,
    /// Weight assigned to routes learned from this peer.
    pub weight: i32,
    /// Log full message dumps.
    pub verbose: bool,
    pub log_level: LogLevel,
    pub ingress_filters: BgpFilterRules,
    pub egress_filters: BgpFilterRules,

    pub rib: Arc<Rib>,
    pub rib6: Option<Arc<Rib6>>,
    pub rev_bus: Option<Arc<RouteEventBus>>,
    pub clock: Arc<dyn Clock>,
    pub out_handler: Arc<dyn OutHandler>,
    pub log_handler: Arc<dyn LogHandler>,
}

impl BgpPeerConfig {
    /// A config with library defaults for everything except the identities
    /// and the output sink, which have no sensible defaults.
    pub fn new(
        asn: u32,
        peer_asn: u32,
        router_id: Ipv4Addr,
        nexthop: Ipv4Addr,
        rib: Arc<Rib>,
        out_handler: Arc<dyn OutHandler>,
    ) -> Self {
        BgpPeerConfig {
            asn,
            peer_asn,
            use_4b_asn: false,
            hold_timer: DEFAULT_HOLD_TIME,
            connect_retry: DEFAULT_CONNECT_RETRY,
            router_id,
            nexthop,
            forced_default_nexthop: false,
            peering_lan: None,
            no_nexthop_check: false,
            no_collision_detection: false,
            weight: 0,
            verbose: false,
            log_level: LogLevel::Info,
            ingress_filters: BgpFilterRules::default(),
            egress_filters: BgpFilterRules::default(),
            rib,
            rib6: None,
            rev_bus: None,
            clock: Arc::new(SystemClock),
            out_handler,
            log_handler: Arc::new(StdioLogHandler),
        }
    }
}
