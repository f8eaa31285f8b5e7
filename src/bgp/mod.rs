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

//! BGP-4 message codec: framing, OPEN, UPDATE, KEEPALIVE and NOTIFICATION.

pub mod msg;
pub mod msg_keepalive;
pub mod msg_notification;
pub mod msg_open;
pub mod msg_update;
pub mod msg_update_codec;
pub mod msg_update_types;
pub mod utils;

/// The reserved 2-byte ASN standing in for 4-byte ASNs when talking to a
/// 2-byte-only speaker (RFC 6793).
pub const AS_TRANS: u16 = 23456;

/// BGP-4 protocol version.
pub const BGP_VERSION: u8 = 4;
