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

//! Capability interfaces the host provides to the library.
//!
//! The library owns no sockets, no threads and no wall clock. Outbound bytes
//! go through an [`OutHandler`], log lines through a [`LogHandler`], and time
//! is sampled from a [`Clock`] so FSM timers are deterministic under test.

use std::io::Write;
use std::time::SystemTime;

/// Output sink for serialized BGP messages.
///
/// Returns false if the bytes could not be delivered; the FSM treats a failed
/// write as an unrecoverable fault and enters the Broken state.
pub trait OutHandler: Send + Sync {
    fn write(&self, bytes: &[u8]) -> bool;
}

/// Log sink. Rendered lines arrive already formatted (one JSON object per
/// line); the handler only decides where they go.
pub trait LogHandler: Send + Sync {
    fn stdout(&self, line: &str);
    fn stderr(&self, line: &str);
}

/// Millisecond clock. The FSM never reads wall time directly.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Default log handler writing to the process stdio.
#[derive(Debug, Default)]
pub struct StdioLogHandler;

impl LogHandler for StdioLogHandler {
    fn stdout(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", line);
    }

    fn stderr(&self, line: &str) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", line);
    }
}

/// Default clock backed by `SystemTime`.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
