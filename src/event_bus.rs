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

//! In-process route event bus.
//!
//! FSMs handle one session each and do not know about each other; the bus
//! lets them share route changes and probe for OPEN collisions. Delivery is
//! synchronous, in subscription order, on the publisher's thread. Receivers
//! are identified by the token handed out at subscribe time; the publisher's
//! own token is skipped. Subscribing or unsubscribing from inside a handler
//! is not supported.

use crate::bgp::msg_update_types::PathAttribute;
use crate::net::Prefix4;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
pub struct RouteAddEvent {
    /// Path attributes shared by all routes in the event.
    pub attribs: Arc<Vec<PathAttribute>>,
    pub routes: Vec<Prefix4>,
}

#[derive(Debug, Clone)]
pub struct RouteWithdrawEvent {
    pub routes: Vec<Prefix4>,
}

/// Probe for collision detection. A session whose peer BGP ID equals the
/// carried value resolves the collision when it receives this.
#[derive(Debug, Clone)]
pub struct RouteCollisionEvent {
    pub peer_bgp_id: u32,
}

#[derive(Debug, Clone)]
pub enum RouteEvent {
    Add(RouteAddEvent),
    Withdraw(RouteWithdrawEvent),
    Collision(RouteCollisionEvent),
}

/// Bus participant. Returns true if it considers the event handled.
pub trait RouteEventReceiver: Send + Sync {
    fn handle_route_event(&self, event: &RouteEvent) -> bool;
}

/// Stable receiver identity assigned at subscribe time.
pub type ReceiverId = usize;

#[derive(Default)]
pub struct RouteEventBus {
    subscribers: RwLock<Vec<(ReceiverId, Arc<dyn RouteEventReceiver>)>>,
    next_id: RwLock<ReceiverId>,
}

impl RouteEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, receiver: Arc<dyn RouteEventReceiver>) -> ReceiverId {
        let mut next_id = self.next_id.write().unwrap();
        *next_id += 1;
        let id = *next_id;
        self.subscribers.write().unwrap().push((id, receiver));
        id
    }

    pub fn unsubscribe(&self, id: ReceiverId) {
        self.subscribers
            .write()
            .unwrap()
            .retain(|(sub_id, _)| *sub_id != id);
    }

    /// Deliver `event` to every subscriber except `sender`, in subscription
    /// order, on the calling thread. Returns the logical OR of the handler
    /// results. The subscriber list is snapshotted first so no lock is held
    /// while handlers run.
    pub fn publish(&self, sender: Option<ReceiverId>, event: &RouteEvent) -> bool {
        let subscribers: Vec<(ReceiverId, Arc<dyn RouteEventReceiver>)> =
            self.subscribers.read().unwrap().clone();

        let mut handled = false;
        for (id, receiver) in subscribers {
            if Some(id) == sender {
                continue;
            }
            handled |= receiver.handle_route_event(event);
        }
        handled
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap().len()
    }
}
