// SPDX-License-Identifier: Apache-2.0 OR MIT
//! PIM-SM upstream state machine core (RFC 4601 section 4.5)
//!
//! This crate implements the upstream (S,G)/(*,G) half of a PIM Sparse-Mode
//! routing engine: the reference-counted upstream entry repository, the
//! NotJoined/Joined Join/Prune state machine with its timer rules, the
//! first-hop-router Register state machine, SPT switchover policy, and the
//! activity wheel that polls per-flow traffic counters.
//!
//! ## Architecture
//!
//! State machines here are event-driven and synchronous: every mutating
//! operation takes the current `Instant` and returns the timer reschedules
//! it wants as a `Vec<TimerRequest>`. The tokio-based
//! [`timers::UpstreamTimerManager`] schedules those requests and feeds
//! expiries back in as [`timers::UpstreamEvent`]s, so the whole core runs
//! to completion on one logical thread with no locks.
//!
//! Everything the core does not own is reached through a narrow
//! collaborator trait (see [`collab`]): RPF resolution, Join/Prune
//! aggregation and transport, per-interface channel state, the forwarding
//! plane, MSDP, and RP mapping.
//!
//! ## Entry points
//!
//! | Operation | Method |
//! |-----------|--------|
//! | Find-or-create an upstream entry | [`upstream::UpstreamContext::find_or_create`] |
//! | Drop a reference / tear down | [`upstream::UpstreamContext::release`] |
//! | Re-evaluate JoinDesired | [`upstream::UpstreamContext::update_join_desired`] |
//! | Timer expiry dispatch | [`upstream::UpstreamContext::handle_timer`] |

use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

pub mod collab;
pub mod config;
pub mod logging;
pub mod timers;
pub mod upstream;

pub use config::{ConfigError, PimConfig, StaticRpMap};
pub use timers::{TimerRequest, TimerType, UpstreamEvent, UpstreamTimerManager};
pub use upstream::{
    JoinState, RegisterState, UpstreamContext, UpstreamError, UpstreamFlags, UpstreamStats,
};

/// The wildcard ("any") address used for the source of a (*,G) entry and
/// both halves of a (*,*) entry.
pub const ANY_ADDR: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

/// Key of an upstream entry: a (source, group) pair where either half may
/// be the wildcard address.
///
/// Ordering is by group first, then source (numeric), which is the
/// iteration order the repository guarantees for full scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceGroup {
    /// Source address, or [`ANY_ADDR`] for (*,G)/(*,*)
    pub source: Ipv4Addr,
    /// Group address, or [`ANY_ADDR`] for (*,*)
    pub group: Ipv4Addr,
}

impl SourceGroup {
    /// Source-specific (S,G) key
    pub fn sg(source: Ipv4Addr, group: Ipv4Addr) -> Self {
        Self { source, group }
    }

    /// Shared-tree (*,G) key
    pub fn star_g(group: Ipv4Addr) -> Self {
        Self {
            source: ANY_ADDR,
            group,
        }
    }

    /// Aggregate (*,*) key
    pub fn star_star() -> Self {
        Self {
            source: ANY_ADDR,
            group: ANY_ADDR,
        }
    }

    /// True for a fully-specified (S,G) key
    pub fn is_sg(&self) -> bool {
        self.source != ANY_ADDR && self.group != ANY_ADDR
    }

    /// True for a (*,G) key
    pub fn is_star_g(&self) -> bool {
        self.source == ANY_ADDR && self.group != ANY_ADDR
    }

    /// True for the (*,*) key
    pub fn is_star_star(&self) -> bool {
        self.source == ANY_ADDR && self.group == ANY_ADDR
    }

    /// The (*,G) key sharing this key's group
    pub fn to_star_g(&self) -> Self {
        Self::star_g(self.group)
    }
}

impl Ord for SourceGroup {
    fn cmp(&self, other: &Self) -> Ordering {
        u32::from(self.group)
            .cmp(&u32::from(other.group))
            .then_with(|| u32::from(self.source).cmp(&u32::from(other.source)))
    }
}

impl PartialOrd for SourceGroup {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SourceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.source == ANY_ADDR, self.group == ANY_ADDR) {
            (true, true) => write!(f, "(*,*)"),
            (true, false) => write!(f, "(*,{})", self.group),
            (false, true) => write!(f, "({},*)", self.source),
            (false, false) => write!(f, "({},{})", self.source, self.group),
        }
    }
}
