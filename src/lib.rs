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

//! An embeddable BGP-4 speaker.
//!
//! The crate owns no sockets, threads or wall clock: the host feeds inbound
//! bytes to a per-peer [`fsm::Fsm`], drives timers through its clock
//! capability, and receives outbound bytes through an output sink. Sessions
//! share routes through a [`rib::Rib`] and coordinate through a
//! [`event_bus::RouteEventBus`].

pub mod bgp;
pub mod config;
pub mod event_bus;
pub mod fsm;
pub mod handlers;
pub mod log;
pub mod net;
pub mod policy;
pub mod rib;

pub use config::BgpPeerConfig;
pub use event_bus::{RouteEvent, RouteEventBus, RouteEventReceiver};
pub use fsm::{BgpState, Fsm};
pub use net::{Prefix4, Prefix6};
pub use rib::{Rib, Rib6, RibEntry};
