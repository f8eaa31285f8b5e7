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

//! Prefix filter rules applied to ingress and egress routes.

use crate::net::Prefix4;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Accept,
    Reject,
}

/// A rule matches a route equal to or contained in its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BgpFilterRule {
    pub prefix: Prefix4,
    pub op: FilterOp,
}

impl BgpFilterRule {
    pub fn matches(&self, route: &Prefix4) -> bool {
        self.prefix.includes(route)
    }
}

/// Ordered rule set. Rules are evaluated in order and the last matching rule
/// wins; routes matching no rule get the default op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgpFilterRules {
    default_op: FilterOp,
    rules: Vec<BgpFilterRule>,
}

impl BgpFilterRules {
    pub fn new(default_op: FilterOp) -> Self {
        BgpFilterRules {
            default_op,
            rules: Vec::new(),
        }
    }

    pub fn append(&mut self, rule: BgpFilterRule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn apply(&self, route: &Prefix4) -> FilterOp {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matches(route))
            .map(|rule| rule.op)
            .unwrap_or(self.default_op)
    }

    pub fn accepts(&self, route: &Prefix4) -> bool {
        self.apply(route) == FilterOp::Accept
    }
}

impl Default for BgpFilterRules {
    fn default() -> Self {
        Self::new(FilterOp::Accept)
    }
}
