// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Upstream entry repository and lifecycle
//!
//! One [`UpstreamEntry`] exists per distinct (S,G), (*,G) or (*,*) key. The
//! [`UpstreamContext`] owns them all in a hash arena plus a
//! (group, source)-ordered key set, maintains the parent/child links
//! between wildcard entries and their (S,G) dependents, and drives the
//! state machines in the sibling modules:
//!
//! - [`join_prune`]: NotJoined/Joined transitions and the join timer rules
//! - [`register`]: first-hop-router Register encapsulation state
//! - [`policy`]: inherited outgoing-interface list and SPT-bit rules
//! - [`wheel`]: periodic traffic-activity polling
//!
//! Entries are reference counted. Creation hands out one reference;
//! [`UpstreamContext::release`] drops one and runs the full teardown
//! checklist when the count reaches zero.

pub mod join_prune;
pub mod policy;
pub mod register;
pub mod wheel;

#[cfg(test)]
pub(crate) mod testutil;

use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::collab::{Collaborators, OilHandle};
use crate::config::PimConfig;
use crate::logging::{Facility, Logger};
use crate::timers::{TimerRequest, TimerType};
use crate::{log_debug, log_error, log_info, SourceGroup, ANY_ADDR};

use self::wheel::ActivityWheel;

/// Upstream Join/Prune state (RFC 4601 4.5.7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinState {
    /// Not joined toward the upstream neighbor
    NotJoined,
    /// Joined toward the upstream neighbor
    Joined,
}

impl JoinState {
    pub const fn as_str(self) -> &'static str {
        match self {
            JoinState::NotJoined => "NotJoined",
            JoinState::Joined => "Joined",
        }
    }
}

impl std::fmt::Display for JoinState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// First-hop-router Register state (RFC 4601 4.4.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisterState {
    /// Not registering
    NoInfo,
    /// Encapsulating traffic to the RP
    Join,
    /// Probing the RP before resuming encapsulation
    JoinPending,
    /// Suppressed by a Register-Stop
    Prune,
}

impl RegisterState {
    pub const fn as_str(self) -> &'static str {
        match self {
            RegisterState::NoInfo => "RegNoInfo",
            RegisterState::Join => "RegJoined",
            RegisterState::JoinPending => "RegJoinPend",
            RegisterState::Prune => "RegPrune",
        }
    }
}

impl std::fmt::Display for RegisterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Independent per-entry condition bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamFlags {
    fhr: bool,
    src_stream: bool,
    dr_join_desired: bool,
}

impl UpstreamFlags {
    /// No flags set
    pub const fn new() -> Self {
        Self {
            fhr: false,
            src_stream: false,
            dr_join_desired: false,
        }
    }

    /// Builder: mark as first-hop router
    pub const fn with_first_hop_router(mut self) -> Self {
        self.fhr = true;
        self
    }

    /// Builder: mark as holding a source-stream reference
    pub const fn with_source_stream(mut self) -> Self {
        self.src_stream = true;
        self
    }

    /// True if the entry is acting as first-hop router for its source
    pub const fn is_first_hop_router(self) -> bool {
        self.fhr
    }

    pub fn set_first_hop_router(&mut self) {
        self.fhr = true;
    }

    pub fn clear_first_hop_router(&mut self) {
        self.fhr = false;
    }

    /// True if the entry holds a reference created by local stream activity
    pub const fn is_source_stream(self) -> bool {
        self.src_stream
    }

    pub fn set_source_stream(&mut self) {
        self.src_stream = true;
    }

    pub fn clear_source_stream(&mut self) {
        self.src_stream = false;
    }

    /// Last evaluated JoinDesired value
    pub const fn is_dr_join_desired(self) -> bool {
        self.dr_join_desired
    }

    pub fn set_dr_join_desired(&mut self) {
        self.dr_join_desired = true;
    }

    pub fn clear_dr_join_desired(&mut self) {
        self.dr_join_desired = false;
    }

    /// Merge every set bit of `other` into self
    pub fn merge(&mut self, other: UpstreamFlags) {
        self.fhr |= other.fhr;
        self.src_stream |= other.src_stream;
        self.dr_join_desired |= other.dr_join_desired;
    }
}

/// Resolved reverse-path binding toward the entry's upstream address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpfBinding {
    /// Interface toward the upstream address
    pub interface: Option<String>,
    /// Resolved upstream neighbor address
    pub rpf_addr: Option<Ipv4Addr>,
    /// Unicast route metric
    pub route_metric: u32,
    /// Metric preference (administrative distance)
    pub metric_preference: u32,
}

impl Default for RpfBinding {
    fn default() -> Self {
        // Metric fields start at the infinite assert metric
        Self {
            interface: None,
            rpf_addr: None,
            route_metric: u32::MAX,
            metric_preference: u32::MAX,
        }
    }
}

impl RpfBinding {
    /// True when both bindings name the same interface and neighbor
    pub fn is_same(&self, other: &RpfBinding) -> bool {
        self.interface == other.interface && self.rpf_addr == other.rpf_addr
    }
}

/// Cached forwarding counters from the last wheel visit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityCounters {
    /// Packet count at the last refresh
    pub pktcnt: u64,
    /// Packet count at the refresh before that
    pub oldpktcnt: u64,
    /// Time since the flow last carried a packet
    pub last_used: Duration,
}

/// One upstream (S,G)/(*,G)/(*,*) entry
#[derive(Debug)]
pub struct UpstreamEntry {
    /// The entry's key
    pub sg: SourceGroup,
    /// Address Joins are sent toward: the source for (S,G), the RP for (*,G)
    pub upstream_addr: Ipv4Addr,
    pub join_state: JoinState,
    pub reg_state: RegisterState,
    /// Set once traffic is confirmed on the shortest-path tree; never cleared
    pub spt_bit: bool,
    pub ref_count: u32,
    pub flags: UpstreamFlags,
    pub rpf: RpfBinding,
    /// The (*,G) entry this (S,G) hangs off, if one exists
    pub parent: Option<SourceGroup>,
    /// Dependent (S,G) entries, ordered by (group, source)
    pub children: BTreeSet<SourceGroup>,
    /// Handle to installed forwarding state, once created
    pub oil: Option<OilHandle>,
    /// When join_state last changed
    pub state_transition: Instant,
    /// Join retransmission deadline (None when not armed or aggregated)
    pub join_timer: Option<Instant>,
    /// Keepalive deadline
    pub ka_timer: Option<Instant>,
    /// Register-stop deadline
    pub rs_timer: Option<Instant>,
    /// MSDP registration deadline
    pub msdp_reg_timer: Option<Instant>,
    /// Counters cache maintained by the activity wheel
    pub counters: ActivityCounters,
}

impl UpstreamEntry {
    fn new(sg: SourceGroup, upstream_addr: Ipv4Addr, flags: UpstreamFlags, now: Instant) -> Self {
        Self {
            sg,
            upstream_addr,
            join_state: JoinState::NotJoined,
            reg_state: RegisterState::NoInfo,
            spt_bit: false,
            ref_count: 1,
            flags,
            rpf: RpfBinding::default(),
            parent: None,
            children: BTreeSet::new(),
            oil: None,
            state_transition: now,
            join_timer: None,
            ka_timer: None,
            rs_timer: None,
            msdp_reg_timer: None,
            counters: ActivityCounters::default(),
        }
    }

    /// Time left on the join timer, if armed
    pub fn join_timer_remaining(&self, now: Instant) -> Option<Duration> {
        self.join_timer.map(|d| d.saturating_duration_since(now))
    }
}

/// Errors from entry creation
#[derive(Debug, PartialEq, Eq)]
pub enum UpstreamError {
    /// A (*,G) was requested for a group with no RP mapping
    NoRpConfigured { group: Ipv4Addr },
    /// No unicast route toward the upstream address
    RpfResolutionFailure {
        sg: SourceGroup,
        upstream_addr: Ipv4Addr,
    },
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamError::NoRpConfigured { group } => {
                write!(f, "no RP configured for group {}", group)
            }
            UpstreamError::RpfResolutionFailure { sg, upstream_addr } => {
                write!(f, "unable to RPF {} toward {}", sg, upstream_addr)
            }
        }
    }
}

impl std::error::Error for UpstreamError {}

/// Repository summary for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamStats {
    /// Total entries
    pub entries: usize,
    /// Source-specific entries
    pub sg_entries: usize,
    /// Shared-tree entries
    pub star_g_entries: usize,
    /// Entries currently Joined
    pub joined: usize,
    /// Entries with active register state
    pub registering: usize,
}

/// Owner of all upstream state: entry arena, ordered index, activity wheel,
/// configuration and the collaborator seams
pub struct UpstreamContext {
    pub(crate) config: PimConfig,
    pub(crate) logger: Logger,
    pub(crate) entries: HashMap<SourceGroup, UpstreamEntry>,
    pub(crate) ordered: BTreeSet<SourceGroup>,
    pub(crate) wheel: ActivityWheel,
    /// External subsystems; public so a driver can reach its own objects
    pub collab: Collaborators,
}

impl UpstreamContext {
    /// Create an empty context
    pub fn new(config: PimConfig, logger: Logger, collab: Collaborators) -> Self {
        let wheel = ActivityWheel::new(config.wheel_slots);
        Self {
            config,
            logger,
            entries: HashMap::new(),
            ordered: BTreeSet::new(),
            wheel,
            collab,
        }
    }

    /// Arm the wheel tick; call once when the event loop starts
    pub fn start(&self, now: Instant) -> Vec<TimerRequest> {
        vec![TimerRequest::replace(
            TimerType::WheelTick,
            now + self.wheel_tick_interval(),
        )]
    }

    pub(crate) fn wheel_tick_interval(&self) -> Duration {
        self.config.wheel_period() / self.config.wheel_slots as u32
    }

    /// Exact-key lookup
    pub fn find(&self, sg: SourceGroup) -> Option<&UpstreamEntry> {
        self.entries.get(&sg)
    }

    /// The active configuration
    pub fn config(&self) -> &PimConfig {
        &self.config
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries exist
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys in (group, source) order
    pub fn keys_ordered(&self) -> Vec<SourceGroup> {
        self.ordered.iter().copied().collect()
    }

    /// Repository summary for diagnostics
    pub fn stats(&self) -> UpstreamStats {
        let mut stats = UpstreamStats {
            entries: self.entries.len(),
            ..Default::default()
        };
        for e in self.entries.values() {
            if e.sg.is_sg() {
                stats.sg_entries += 1;
            } else if e.sg.is_star_g() {
                stats.star_g_entries += 1;
            }
            if e.join_state == JoinState::Joined {
                stats.joined += 1;
            }
            if e.reg_state != RegisterState::NoInfo {
                stats.registering += 1;
            }
        }
        stats
    }

    /// Return the existing entry for `sg` with one more reference and the
    /// given flags merged, or create it: resolve the upstream address (RP
    /// for wildcard-source keys), link the tree, resolve RPF and install
    /// forwarding state. Creation failure leaves no partial state behind.
    pub fn find_or_create(
        &mut self,
        sg: SourceGroup,
        incoming_interface: &str,
        flags: UpstreamFlags,
        now: Instant,
    ) -> Result<SourceGroup, UpstreamError> {
        debug_assert!(
            !(sg.group == ANY_ADDR && sg.source != ANY_ADDR),
            "source-specific key with wildcard group"
        );

        if let Some(e) = self.entries.get_mut(&sg) {
            e.flags.merge(flags);
            e.ref_count += 1;
            log_debug!(
                self.logger,
                Facility::Upstream,
                &format!("{}: found, ref_count: {}", sg, e.ref_count)
            );
            return Ok(sg);
        }

        self.create_entry(sg, incoming_interface, flags, now)
    }

    fn create_entry(
        &mut self,
        sg: SourceGroup,
        incoming_interface: &str,
        flags: UpstreamFlags,
        now: Instant,
    ) -> Result<SourceGroup, UpstreamError> {
        let upstream_addr = if sg.source == ANY_ADDR {
            match self.collab.rp.rp_for_group(sg.group) {
                Some(rp) => rp,
                None => {
                    log_debug!(
                        self.logger,
                        Facility::Upstream,
                        &format!("received a {} with no RP configured", sg)
                    );
                    return Err(UpstreamError::NoRpConfigured { group: sg.group });
                }
            }
        } else {
            sg.source
        };

        self.entries
            .insert(sg, UpstreamEntry::new(sg, upstream_addr, flags, now));
        self.ordered.insert(sg);

        self.link_parent(sg);
        self.adopt_children(sg);

        if sg.is_sg() {
            self.wheel.add(sg);
        }

        self.collab.rpf.track(upstream_addr, sg);
        let nexthop = self.collab.rpf.resolve(upstream_addr);
        match nexthop {
            Some(nh) => {
                let e = self.entries.get_mut(&sg).expect("entry just inserted");
                e.rpf.interface = Some(nh.interface.clone());
                e.rpf.rpf_addr = Some(nh.nexthop);
                e.rpf.route_metric = nh.route_metric;
                e.rpf.metric_preference = nh.metric_preference;

                let handle = self.collab.fwd.install(sg, &nh.interface);
                self.entries.get_mut(&sg).expect("entry just inserted").oil = Some(handle);

                log_info!(
                    self.logger,
                    Facility::Upstream,
                    &format!(
                        "created upstream {} upstream_addr {} (iif request {})",
                        sg, upstream_addr, incoming_interface
                    )
                );
                Ok(sg)
            }
            None => {
                log_debug!(
                    self.logger,
                    Facility::Upstream,
                    &format!("attempting to create upstream {}, unable to RPF for source", sg)
                );
                // Unwind everything the partial creation touched
                self.collab.rpf.untrack(upstream_addr, sg);
                self.unlink_parent(sg);
                if sg.is_sg() {
                    self.wheel.remove(sg);
                }
                self.orphan_children(sg);
                self.ordered.remove(&sg);
                self.entries.remove(&sg);
                Err(UpstreamError::RpfResolutionFailure { sg, upstream_addr })
            }
        }
    }

    /// Drop one reference. At zero the entry is torn down in order:
    /// timers, forwarding state, tree links, MSDP notification, repository
    /// and RPF tracking. Returns true if the entry was destroyed.
    pub fn release(&mut self, sg: SourceGroup) -> bool {
        let Some(e) = self.entries.get_mut(&sg) else {
            log_error!(
                self.logger,
                Facility::Upstream,
                &format!("release of unknown upstream {}", sg)
            );
            return false;
        };

        e.ref_count -= 1;
        log_debug!(
            self.logger,
            Facility::Upstream,
            &format!("delete {} ref count: {}", sg, e.ref_count)
        );
        if e.ref_count >= 1 {
            return false;
        }

        // Teardown checklist; order matters and is executed unconditionally.
        // 1. Timers
        e.ka_timer = None;
        e.rs_timer = None;
        e.msdp_reg_timer = None;
        let joined = e.join_state == JoinState::Joined;
        let rpf_addr = e.rpf.rpf_addr;
        let mut notify_msdp = false;
        if joined {
            if let Some(addr) = rpf_addr {
                self.collab.jp.send_single(addr, sg, false);
            }
            if sg.source == ANY_ADDR {
                // A joined (*,G) going away must be withdrawn from MSDP
                notify_msdp = true;
            }
        }
        self.join_timer_stop(sg);
        if let Some(e) = self.entries.get_mut(&sg) {
            e.rpf.interface = None;
        }
        if sg.is_sg() {
            self.wheel.remove(sg);
            notify_msdp = true;
        }

        // 2. Forwarding state
        if let Some(handle) = self.entries.get_mut(&sg).and_then(|e| e.oil.take()) {
            self.collab.fwd.uninstall(handle);
        }

        // 3. Tree links: children survive but lose their parent
        self.orphan_children(sg);
        self.unlink_parent(sg);

        // 4. MSDP (best-effort)
        if notify_msdp {
            self.collab.msdp.source_active_withdraw(sg);
        }

        // 5. Repository and RPF tracking
        let e = self.entries.remove(&sg).expect("entry present above");
        self.ordered.remove(&sg);
        self.collab.rpf.untrack(e.upstream_addr, sg);

        log_info!(
            self.logger,
            Facility::Upstream,
            &format!("deleted upstream {}", sg)
        );
        true
    }

    /// A (S,G) being created finds the (*,G) with its group; a (*,G)
    /// finds the (*,*). The (*,*) itself has no parent.
    fn link_parent(&mut self, sg: SourceGroup) {
        let parent_key = if sg.is_sg() {
            sg.to_star_g()
        } else if sg.is_star_g() {
            SourceGroup::star_star()
        } else {
            return;
        };
        if !self.entries.contains_key(&parent_key) {
            return;
        }
        if let Some(p) = self.entries.get_mut(&parent_key) {
            p.children.insert(sg);
        }
        if let Some(e) = self.entries.get_mut(&sg) {
            e.parent = Some(parent_key);
        }
    }

    fn unlink_parent(&mut self, sg: SourceGroup) {
        let parent_key = match self.entries.get_mut(&sg).and_then(|e| e.parent.take()) {
            Some(p) => p,
            None => return,
        };
        if let Some(p) = self.entries.get_mut(&parent_key) {
            p.children.remove(&sg);
        }
    }

    /// A (*,G) being created adopts every existing (S,G) with its group;
    /// a (*,*) adopts every existing (*,G)
    fn adopt_children(&mut self, sg: SourceGroup) {
        if sg.is_sg() {
            return;
        }
        let kids: Vec<SourceGroup> = if sg.is_star_g() {
            self.ordered
                .iter()
                .filter(|k| k.group == sg.group && k.is_sg())
                .copied()
                .collect()
        } else {
            self.ordered
                .iter()
                .filter(|k| k.is_star_g())
                .copied()
                .collect()
        };
        for kid in kids {
            if let Some(c) = self.entries.get_mut(&kid) {
                c.parent = Some(sg);
            }
            if let Some(p) = self.entries.get_mut(&sg) {
                p.children.insert(kid);
            }
        }
    }

    /// A wildcard entry going away orphans its children without
    /// destroying them
    fn orphan_children(&mut self, sg: SourceGroup) {
        let kids: Vec<SourceGroup> = match self.entries.get_mut(&sg) {
            Some(e) => {
                let kids = e.children.iter().copied().collect();
                e.children.clear();
                kids
            }
            None => return,
        };
        for kid in kids {
            if let Some(c) = self.entries.get_mut(&kid) {
                c.parent = None;
            }
        }
    }

    /// Re-resolve the RPF binding of every entry that has none; called by
    /// the RPF collaborator when neighbor or topology state changes
    pub fn find_new_rpf(&mut self) {
        for sg in self.keys_ordered() {
            let unresolved = self
                .entries
                .get(&sg)
                .map(|e| e.rpf.rpf_addr.is_none())
                .unwrap_or(false);
            if unresolved {
                log_debug!(
                    self.logger,
                    Facility::Rpf,
                    &format!("upstream {} without a path to send join, checking", sg)
                );
                self.rpf_update(sg);
            }
        }
    }

    /// Resolve and store the entry's RPF binding; true if a binding now
    /// exists
    pub(crate) fn rpf_update(&mut self, sg: SourceGroup) -> bool {
        let addr = match self.entries.get(&sg) {
            Some(e) => e.upstream_addr,
            None => return false,
        };
        match self.collab.rpf.resolve(addr) {
            Some(nh) => {
                let install = {
                    let e = self.entries.get_mut(&sg).expect("entry present above");
                    e.rpf.interface = Some(nh.interface.clone());
                    e.rpf.rpf_addr = Some(nh.nexthop);
                    e.rpf.route_metric = nh.route_metric;
                    e.rpf.metric_preference = nh.metric_preference;
                    e.oil.is_none()
                };
                if install {
                    let handle = self.collab.fwd.install(sg, &nh.interface);
                    if let Some(e) = self.entries.get_mut(&sg) {
                        e.oil = Some(handle);
                    }
                }
                true
            }
            None => false,
        }
    }

    /// The RPF neighbor `neigh_addr` announced a new generation ID: every
    /// Joined entry whose upstream neighbor it is gets its join timer
    /// clamped to the override interval
    pub fn rpf_genid_changed(&mut self, neigh_addr: Ipv4Addr, now: Instant) -> Vec<TimerRequest> {
        let mut timers = Vec::new();
        for sg in self.keys_ordered() {
            let matches = self
                .entries
                .get(&sg)
                .map(|e| {
                    e.join_state == JoinState::Joined && e.rpf.rpf_addr == Some(neigh_addr)
                })
                .unwrap_or(false);
            if matches {
                timers.extend(self.join_timer_decrease_to_t_override(sg, now));
            }
        }
        timers
    }

    /// The entry's RPF interface moved from `old_interface`: channels that
    /// lost an Assert on the old interface are told, and every bound
    /// channel re-derives AssertTrackingDesired
    pub fn rpf_interface_changed(&mut self, sg: SourceGroup, old_interface: &str) {
        let new_iface = match self.entries.get(&sg) {
            Some(e) => e.rpf.interface.clone(),
            None => return,
        };
        for binding in self.collab.channels.channels() {
            if binding.upstream != sg {
                continue;
            }
            let ch = binding.channel;
            if self.collab.channels.lost_assert(&ch)
                && ch.interface == old_interface
                && new_iface.as_deref() != Some(ch.interface.as_str())
            {
                self.collab.channels.assert_loser_rpf_changed(&ch);
            }
            self.collab.channels.update_assert_tracking_desired(&ch);
        }
    }

    /// The upstream's forwarding role changed; every bound channel
    /// re-derives CouldAssert
    pub fn update_could_assert(&mut self, sg: SourceGroup) {
        for binding in self.collab.channels.channels() {
            if binding.upstream == sg {
                self.collab.channels.update_could_assert(&binding.channel);
            }
        }
    }

    /// The upstream's RPF metric changed; every bound channel re-derives
    /// its assert metric
    pub fn update_my_assert_metric(&mut self, sg: SourceGroup) {
        for binding in self.collab.channels.channels() {
            if binding.upstream == sg {
                self.collab
                    .channels
                    .update_my_assert_metric(&binding.channel);
            }
        }
    }

    /// Dispatch a fired timer into the owning state machine. Expiries whose
    /// deadline is no longer armed (cancelled or rescheduled) are dropped.
    pub fn handle_timer(&mut self, timer: TimerType, now: Instant) -> Vec<TimerRequest> {
        match timer {
            TimerType::WheelTick => self.on_wheel_tick(now),
            TimerType::JoinTimer { sg } => {
                if self.timer_due(sg, |e| e.join_timer, now) {
                    self.on_join_timer(sg, now)
                } else {
                    Vec::new()
                }
            }
            TimerType::KeepaliveTimer { sg } => {
                if self.timer_due(sg, |e| e.ka_timer, now) {
                    self.on_keep_alive_timer(sg)
                } else {
                    Vec::new()
                }
            }
            TimerType::RegisterStopTimer { sg } => {
                if self.timer_due(sg, |e| e.rs_timer, now) {
                    self.on_register_stop_timer(sg, now)
                } else {
                    Vec::new()
                }
            }
            TimerType::MsdpRegTimer { sg } => {
                if self.timer_due(sg, |e| e.msdp_reg_timer, now) {
                    self.on_msdp_reg_timer(sg)
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn timer_due(
        &self,
        sg: SourceGroup,
        deadline: impl Fn(&UpstreamEntry) -> Option<Instant>,
        now: Instant,
    ) -> bool {
        self.entries
            .get(&sg)
            .and_then(deadline)
            .map(|d| d <= now)
            .unwrap_or(false)
    }
}
