// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Upstream Join/Prune state machine (RFC 4601 4.5.7)
//!
//! Transitions between NotJoined and Joined are driven exclusively by the
//! JoinDesired predicate; the transition function owes forwarding, MSDP and
//! register-state side effects on each edge. The join timer rides the
//! per-neighbor aggregation list when an upstream neighbor is known and
//! falls back to a private periodic timer otherwise. Suppression and
//! override both clamp the private timer downward toward their bound,
//! never upward.

use std::cmp::min;
use std::time::{Duration, Instant};

use crate::collab::ChannelBinding;
use crate::logging::Facility;
use crate::timers::{TimerRequest, TimerType};
use crate::{log_debug, log_notice, SourceGroup};

use super::{JoinState, RegisterState, UpstreamContext};

impl UpstreamContext {
    /// Apply the Join/Prune transition function.
    ///
    /// Same-state calls are no-ops apart from a forwarding refresh when
    /// already Joined; AssertTrackingDesired is re-derived on every call.
    pub fn switch(
        &mut self,
        sg: SourceGroup,
        new_state: JoinState,
        now: Instant,
    ) -> Vec<TimerRequest> {
        let mut timers = Vec::new();
        let old_state = match self.entries.get_mut(&sg) {
            Some(e) => {
                let old = e.join_state;
                e.join_state = new_state;
                if old != new_state {
                    e.state_transition = now;
                }
                old
            }
            None => return timers,
        };

        log_notice!(
            self.logger,
            Facility::JoinPrune,
            &format!(
                "upstream {} state: {} -> {}",
                sg,
                old_state.as_str(),
                new_state.as_str()
            )
        );

        self.update_assert_tracking_desired(sg);

        if new_state == JoinState::Joined {
            if old_state != JoinState::Joined {
                let old_fhr = self
                    .entries
                    .get(&sg)
                    .map(|e| e.flags.is_first_hop_router())
                    .unwrap_or(false);
                self.forward_on(sg);
                self.collab.msdp.join_state_changed(sg, true);
                if self.could_register(sg) {
                    let src_stream = {
                        let e = self.entries.get_mut(&sg).expect("entry present above");
                        e.flags.set_first_hop_router();
                        e.flags.is_source_stream()
                    };
                    if !old_fhr && src_stream {
                        // Register instead of joining: program the
                        // encapsulation interface and let the keepalive
                        // carry the stream
                        if let Some(e) = self.entries.get_mut(&sg) {
                            e.reg_state = RegisterState::Join;
                        }
                        let keepalive = self.config.keepalive_period();
                        timers.extend(self.keep_alive_timer_start(sg, keepalive, now));
                        let regif = self.config.register_interface.clone();
                        if let Some(handle) = self.entries.get(&sg).and_then(|e| e.oil) {
                            self.collab
                                .fwd
                                .add_oif(handle, &regif, crate::collab::OifFlag::Pim);
                        }
                    }
                } else {
                    self.send_join(sg);
                    timers.extend(self.join_timer_start(sg, now));
                }
            } else {
                self.forward_on(sg);
            }
        } else if old_state == JoinState::Joined {
            self.forward_off(sg);
            self.collab.msdp.join_state_changed(sg, false);
            if let Some(addr) = self.entries.get(&sg).and_then(|e| e.rpf.rpf_addr) {
                self.collab.jp.send_single(addr, sg, false);
            }
            self.join_timer_stop(sg);
        }

        timers
    }

    /// Send an immediate Join toward the current upstream neighbor
    pub(crate) fn send_join(&mut self, sg: SourceGroup) {
        let (rpf_addr, state) = match self.entries.get(&sg) {
            Some(e) => (e.rpf.rpf_addr, e.join_state),
            None => return,
        };
        match rpf_addr {
            Some(addr) => {
                log_debug!(
                    self.logger,
                    Facility::JoinPrune,
                    &format!("RPF'{}={} ({})", sg, addr, state.as_str())
                );
                self.collab.jp.send_single(addr, sg, true);
            }
            None => {
                log_debug!(
                    self.logger,
                    Facility::JoinPrune,
                    &format!("can't send join upstream: RPF'{} unresolved", sg)
                );
            }
        }
    }

    /// Arm the periodic join: through the neighbor aggregation list when
    /// the upstream neighbor exists, else a private timer at t_periodic
    pub(crate) fn join_timer_start(&mut self, sg: SourceGroup, now: Instant) -> Vec<TimerRequest> {
        let mut timers = Vec::new();
        let (iface, rpf_addr) = match self.entries.get(&sg) {
            Some(e) => (e.rpf.interface.clone(), e.rpf.rpf_addr),
            None => return timers,
        };

        let neighbor = match (iface, rpf_addr) {
            (Some(ifc), Some(addr)) if self.collab.jp.neighbor_exists(&ifc, addr) => Some(addr),
            _ => None,
        };

        if let Some(addr) = neighbor {
            self.collab.jp.add_group(addr, sg, true);
        } else {
            let t_periodic = self.config.t_periodic();
            log_debug!(
                self.logger,
                Facility::JoinPrune,
                &format!(
                    "starting {}s periodic timer for upstream {}",
                    t_periodic.as_secs(),
                    sg
                )
            );
            if let Some(e) = self.entries.get_mut(&sg) {
                e.join_timer = Some(now + t_periodic);
            }
            timers.push(TimerRequest::replace(
                TimerType::JoinTimer { sg },
                now + t_periodic,
            ));
        }
        timers
    }

    /// Stop the periodic join: leave the neighbor aggregation and disarm
    /// the private timer
    pub(crate) fn join_timer_stop(&mut self, sg: SourceGroup) {
        let (iface, rpf_addr) = match self.entries.get(&sg) {
            Some(e) => (e.rpf.interface.clone(), e.rpf.rpf_addr),
            None => return,
        };
        if let (Some(ifc), Some(addr)) = (iface, rpf_addr) {
            if self.collab.jp.neighbor_exists(&ifc, addr) {
                self.collab.jp.remove_group(addr, sg);
            }
        }
        if let Some(e) = self.entries.get_mut(&sg) {
            e.join_timer = None;
        }
    }

    /// The upstream Join/Prune moved to a different neighbor: leave the
    /// old neighbor's aggregation list and re-arm against the new one
    pub fn join_timer_restart(
        &mut self,
        sg: SourceGroup,
        old_interface: &str,
        old_rpf_addr: std::net::Ipv4Addr,
        now: Instant,
    ) -> Vec<TimerRequest> {
        if self.collab.jp.neighbor_exists(old_interface, old_rpf_addr) {
            self.collab.jp.remove_group(old_rpf_addr, sg);
        }
        self.join_timer_start(sg, now)
    }

    fn join_timer_restart_to(
        &mut self,
        sg: SourceGroup,
        interval: Duration,
        now: Instant,
    ) -> Vec<TimerRequest> {
        log_debug!(
            self.logger,
            Facility::JoinPrune,
            &format!(
                "restarting {} msec timer for upstream {}",
                interval.as_millis(),
                sg
            )
        );
        if let Some(e) = self.entries.get_mut(&sg) {
            e.join_timer = Some(now + interval);
        }
        vec![TimerRequest::replace(
            TimerType::JoinTimer { sg },
            now + interval,
        )]
    }

    /// A matching Join from another router was overheard: clamp the join
    /// timer so it never exceeds min(t_suppressed, holdtime)
    pub fn join_suppress(
        &mut self,
        sg: SourceGroup,
        holdtime: Duration,
        now: Instant,
    ) -> Vec<TimerRequest> {
        let iface = match self.entries.get(&sg).and_then(|e| e.rpf.interface.clone()) {
            Some(i) => i,
            None => return Vec::new(),
        };
        let bound = min(self.config.t_suppressed(&iface), holdtime);
        let remain = match self.entries.get(&sg).and_then(|e| e.join_timer_remaining(now)) {
            Some(r) => r,
            // Nothing privately scheduled to clamp
            None => return Vec::new(),
        };

        log_debug!(
            self.logger,
            Facility::JoinPrune,
            &format!(
                "detected Join to RPF'{}: join_timer={} msec bound={} msec",
                sg,
                remain.as_millis(),
                bound.as_millis()
            )
        );

        if remain > bound {
            log_debug!(
                self.logger,
                Facility::JoinPrune,
                &format!("suppressing Join{} to {} msec", sg, bound.as_millis())
            );
            self.join_timer_restart_to(sg, bound, now)
        } else {
            Vec::new()
        }
    }

    /// RPF'(S,G) changed (GenID or neighbor): if the join timer would fire
    /// later than the interface override interval, clamp it to exactly
    /// that interval
    pub fn join_timer_decrease_to_t_override(
        &mut self,
        sg: SourceGroup,
        now: Instant,
    ) -> Vec<TimerRequest> {
        let iface = match self.entries.get(&sg).and_then(|e| e.rpf.interface.clone()) {
            Some(i) => i,
            None => return Vec::new(),
        };
        let t_override = self.config.t_override(&iface);
        let remain = self
            .entries
            .get(&sg)
            .and_then(|e| e.join_timer_remaining(now));

        // An unarmed timer counts as infinitely far away: the override
        // must guarantee a join within t_override
        let exceeds = remain.map(|r| r > t_override).unwrap_or(true);
        if exceeds {
            log_debug!(
                self.logger,
                Facility::JoinPrune,
                &format!(
                    "decreasing {} join timer to t_override={} msec",
                    sg,
                    t_override.as_millis()
                )
            );
            self.join_timer_restart_to(sg, t_override, now)
        } else {
            Vec::new()
        }
    }

    /// Periodic join expiry: retransmit and re-arm (first-hop-router-only
    /// entries have nobody upstream to talk to)
    pub(crate) fn on_join_timer(&mut self, sg: SourceGroup, now: Instant) -> Vec<TimerRequest> {
        let (is_fhr, iface) = match self.entries.get_mut(&sg) {
            Some(e) => {
                e.join_timer = None;
                (e.flags.is_first_hop_router(), e.rpf.interface.clone())
            }
            None => return Vec::new(),
        };

        if is_fhr {
            return Vec::new();
        }

        // Don't send the join if the outgoing interface is a loopback,
        // but since this might change leave the timer running
        let sendable = iface
            .as_deref()
            .map(|i| !self.collab.channels.is_loopback(i))
            .unwrap_or(false);
        if sendable {
            self.send_join(sg);
        }
        self.join_timer_start(sg, now)
    }

    /// One channel's contribution to JoinDesired for this entry: direct
    /// joins-or-include on the entry itself (unless (S,G,rpt) pruned), or
    /// (*,G) joins flowing down through the parent
    pub(crate) fn evaluate_join_desired_interface(
        &self,
        sg: SourceGroup,
        binding: &ChannelBinding,
    ) -> bool {
        let ch = &binding.channel;
        if binding.upstream == sg {
            if !self.collab.channels.lost_assert(ch)
                && self.collab.channels.in_joins_or_include(ch)
            {
                return true;
            }
            if self.collab.channels.is_sg_rpt(ch) {
                return false;
            }
        }

        let parent = self.entries.get(&sg).and_then(|e| e.parent);
        if let Some(p) = parent {
            if binding.upstream == p
                && !self.collab.channels.lost_assert(ch)
                && self.collab.channels.in_joins_or_include(ch)
            {
                return true;
            }
        }

        false
    }

    /// Evaluate JoinDesired across every bound channel
    pub fn evaluate_join_desired(&self, sg: SourceGroup) -> bool {
        self.collab
            .channels
            .channels()
            .iter()
            .any(|b| self.evaluate_join_desired_interface(sg, b))
    }

    /// Re-evaluate JoinDesired and transition on an edge; stable input
    /// never causes a transition
    pub fn update_join_desired(&mut self, sg: SourceGroup, now: Instant) -> Vec<TimerRequest> {
        let was = match self.entries.get(&sg) {
            Some(e) => e.flags.is_dr_join_desired(),
            None => return Vec::new(),
        };
        let is = self.evaluate_join_desired(sg);

        if let Some(e) = self.entries.get_mut(&sg) {
            if is {
                e.flags.set_dr_join_desired();
            } else {
                e.flags.clear_dr_join_desired();
            }
        }

        if is && !was {
            self.switch(sg, JoinState::Joined, now)
        } else if !is && was {
            self.switch(sg, JoinState::NotJoined, now)
        } else {
            Vec::new()
        }
    }

    /// Enable forwarding on every channel currently in the entry's
    /// outgoing-interface set
    pub(crate) fn forward_on(&mut self, sg: SourceGroup) {
        for binding in self.collab.channels.channels() {
            if binding.upstream != sg {
                continue;
            }
            let ch = binding.channel;
            if !self.collab.channels.lost_assert(&ch)
                && self.collab.channels.in_joins_or_include(&ch)
            {
                self.collab.fwd.forward_start(&ch);
            }
        }
    }

    /// Disable forwarding on every bound channel
    pub(crate) fn forward_off(&mut self, sg: SourceGroup) {
        for binding in self.collab.channels.channels() {
            if binding.upstream == sg {
                self.collab.fwd.forward_stop(&binding.channel);
            }
        }
    }

    /// JoinDesired feeds AssertTrackingDesired on every bound channel
    pub(crate) fn update_assert_tracking_desired(&mut self, sg: SourceGroup) {
        for binding in self.collab.channels.channels() {
            if binding.upstream == sg {
                self.collab
                    .channels
                    .update_assert_tracking_desired(&binding.channel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{channel, fixture, sg, star_g};
    use super::super::{JoinState, RegisterState, UpstreamFlags};
    use crate::timers::TimerType;
    use std::time::{Duration, Instant};

    #[test]
    fn test_switch_to_joined_sends_join_and_arms_timer() {
        let (mut ctx, h) = fixture();
        let now = Instant::now();
        let key = sg("10.0.0.1", "224.1.1.1");
        ctx.find_or_create(key, "eth0", UpstreamFlags::new(), now)
            .unwrap();

        let timers = ctx.switch(key, JoinState::Joined, now);

        let jp = h.jp.lock().unwrap();
        assert_eq!(jp.singles.len(), 1);
        assert!(jp.singles[0].2, "transition must send a join");
        drop(jp);
        assert!(timers
            .iter()
            .any(|t| matches!(t.timer_type, TimerType::JoinTimer { .. })));
        assert_eq!(ctx.find(key).unwrap().join_state, JoinState::Joined);
        let msdp = h.msdp.lock().unwrap();
        assert_eq!(msdp.join_changes.last(), Some(&(key, true)));
    }

    #[test]
    fn test_switch_joined_to_notjoined_prunes() {
        let (mut ctx, h) = fixture();
        let now = Instant::now();
        let key = sg("10.0.0.1", "224.1.1.1");
        ctx.find_or_create(key, "eth0", UpstreamFlags::new(), now)
            .unwrap();
        ctx.switch(key, JoinState::Joined, now);
        h.jp.lock().unwrap().singles.clear();

        ctx.switch(key, JoinState::NotJoined, now);

        let jp = h.jp.lock().unwrap();
        assert_eq!(jp.singles.len(), 1);
        assert!(!jp.singles[0].2, "leaving Joined must send a prune");
        assert_eq!(ctx.find(key).unwrap().join_state, JoinState::NotJoined);
        assert!(ctx.find(key).unwrap().join_timer.is_none());
    }

    #[test]
    fn test_switch_notjoined_to_notjoined_is_noop() {
        let (mut ctx, h) = fixture();
        let now = Instant::now();
        let key = sg("10.0.0.1", "224.1.1.1");
        ctx.find_or_create(key, "eth0", UpstreamFlags::new(), now)
            .unwrap();

        ctx.switch(key, JoinState::NotJoined, now);

        assert!(h.jp.lock().unwrap().singles.is_empty());
        assert!(h.msdp.lock().unwrap().join_changes.is_empty());
    }

    #[test]
    fn test_fhr_with_stream_registers_instead_of_joining() {
        let (mut ctx, h) = fixture();
        let now = Instant::now();
        let key = sg("10.0.0.1", "224.1.1.1");
        ctx.find_or_create(
            key,
            "eth0",
            UpstreamFlags::new().with_source_stream(),
            now,
        )
        .unwrap();
        // DR and directly connected: CouldRegister holds
        {
            let mut channels = h.channels.lock().unwrap();
            channels.dr_interfaces.insert("eth0".to_string());
            channels.connected_sources.insert("10.0.0.1".parse().unwrap());
        }

        let timers = ctx.switch(key, JoinState::Joined, now);

        let e = ctx.find(key).unwrap();
        assert!(e.flags.is_first_hop_router());
        assert_eq!(e.reg_state, RegisterState::Join);
        assert!(e.ka_timer.is_some());
        assert!(timers
            .iter()
            .any(|t| matches!(t.timer_type, TimerType::KeepaliveTimer { .. })));
        // No protocol join toward the source
        assert!(h.jp.lock().unwrap().singles.is_empty());
        // Encapsulation interface entered the OIL
        let fwd = h.fwd.lock().unwrap();
        assert!(fwd.oifs_of(e.oil.unwrap()).contains(&"pimreg".to_string()));
    }

    #[test]
    fn test_join_desired_edge_transitions() {
        let (mut ctx, h) = fixture();
        let now = Instant::now();
        let key = sg("10.0.0.1", "224.1.1.1");
        ctx.find_or_create(key, "eth0", UpstreamFlags::new(), now)
            .unwrap();

        // No channels: stays NotJoined
        ctx.update_join_desired(key, now);
        assert_eq!(ctx.find(key).unwrap().join_state, JoinState::NotJoined);

        // A joined channel appears
        {
            let mut channels = h.channels.lock().unwrap();
            channels.bindings.push((channel("eth1", key), key));
            channels.joined.insert(channel("eth1", key).sg);
        }
        ctx.update_join_desired(key, now);
        assert_eq!(ctx.find(key).unwrap().join_state, JoinState::Joined);

        // Unchanged input: no new transition, state_transition stays
        let stamp = ctx.find(key).unwrap().state_transition;
        ctx.update_join_desired(key, now + Duration::from_secs(5));
        assert_eq!(ctx.find(key).unwrap().state_transition, stamp);

        // Channel goes away
        {
            let mut channels = h.channels.lock().unwrap();
            channels.bindings.clear();
            channels.joined.clear();
        }
        ctx.update_join_desired(key, now);
        assert_eq!(ctx.find(key).unwrap().join_state, JoinState::NotJoined);
    }

    #[test]
    fn test_join_desired_via_wildcard_parent() {
        let (mut ctx, h) = fixture();
        let now = Instant::now();
        let parent = star_g("224.1.1.1");
        let child = sg("10.0.0.1", "224.1.1.1");
        ctx.find_or_create(parent, "eth0", UpstreamFlags::new(), now)
            .unwrap();
        ctx.find_or_create(child, "eth0", UpstreamFlags::new(), now)
            .unwrap();

        // A (*,G) channel joined under the parent pulls the child up too
        {
            let mut channels = h.channels.lock().unwrap();
            channels
                .bindings
                .push((channel("eth1", parent), parent));
            channels.joined.insert(channel("eth1", parent).sg);
        }
        assert!(ctx.evaluate_join_desired(child));

        // Unless the channel lost its assert
        h.channels
            .lock()
            .unwrap()
            .assert_losers
            .insert(channel("eth1", parent).sg);
        assert!(!ctx.evaluate_join_desired(child));
    }

    #[test]
    fn test_sg_rpt_channel_contributes_nothing() {
        let (mut ctx, h) = fixture();
        let now = Instant::now();
        let key = sg("10.0.0.1", "224.1.1.1");
        ctx.find_or_create(key, "eth0", UpstreamFlags::new(), now)
            .unwrap();
        {
            let mut channels = h.channels.lock().unwrap();
            channels.bindings.push((channel("eth1", key), key));
            // Not in joins/include, flagged (S,G,rpt)
            channels.sg_rpt.insert(channel("eth1", key).sg);
        }
        assert!(!ctx.evaluate_join_desired(key));
    }

    #[test]
    fn test_suppression_clamps_but_never_extends() {
        let (mut ctx, _h) = fixture();
        let now = Instant::now();
        let key = sg("10.0.0.1", "224.1.1.1");
        ctx.find_or_create(key, "eth0", UpstreamFlags::new(), now)
            .unwrap();

        // Timer armed far out: suppression pulls it to the bound
        ctx.entries.get_mut(&key).unwrap().join_timer = Some(now + Duration::from_secs(120));
        let holdtime = Duration::from_secs(210);
        ctx.join_suppress(key, holdtime, now);
        let remain = ctx.find(key).unwrap().join_timer_remaining(now).unwrap();
        let bound = ctx.config.t_suppressed("eth0").min(holdtime);
        assert_eq!(remain, bound);

        // Timer already below the bound: left alone
        ctx.entries.get_mut(&key).unwrap().join_timer = Some(now + Duration::from_secs(3));
        let reqs = ctx.join_suppress(key, holdtime, now);
        assert!(reqs.is_empty());
        assert_eq!(
            ctx.find(key).unwrap().join_timer_remaining(now).unwrap(),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_override_clamps_to_interface_interval() {
        let (mut ctx, _h) = fixture();
        let now = Instant::now();
        let key = sg("10.0.0.1", "224.1.1.1");
        ctx.find_or_create(key, "eth0", UpstreamFlags::new(), now)
            .unwrap();

        ctx.entries.get_mut(&key).unwrap().join_timer = Some(now + Duration::from_secs(50));
        ctx.join_timer_decrease_to_t_override(key, now);
        let remain = ctx.find(key).unwrap().join_timer_remaining(now).unwrap();
        assert_eq!(remain, ctx.config.t_override("eth0"));

        // Already below: untouched
        ctx.entries.get_mut(&key).unwrap().join_timer = Some(now + Duration::from_millis(100));
        let reqs = ctx.join_timer_decrease_to_t_override(key, now);
        assert!(reqs.is_empty());
    }

    #[test]
    fn test_genid_change_only_touches_joined_matches() {
        let (mut ctx, _h) = fixture();
        let now = Instant::now();
        let joined = sg("10.0.0.1", "224.1.1.1");
        let idle = sg("10.0.0.2", "224.1.1.1");
        for k in [joined, idle] {
            ctx.find_or_create(k, "eth0", UpstreamFlags::new(), now)
                .unwrap();
        }
        ctx.switch(joined, JoinState::Joined, now);
        ctx.entries.get_mut(&joined).unwrap().join_timer = Some(now + Duration::from_secs(50));
        ctx.entries.get_mut(&idle).unwrap().join_timer = Some(now + Duration::from_secs(50));

        let neigh = ctx.find(joined).unwrap().rpf.rpf_addr.unwrap();
        ctx.rpf_genid_changed(neigh, now);

        let t_override = ctx.config.t_override("eth0");
        assert_eq!(
            ctx.find(joined).unwrap().join_timer_remaining(now).unwrap(),
            t_override
        );
        // NotJoined entry untouched
        assert_eq!(
            ctx.find(idle).unwrap().join_timer_remaining(now).unwrap(),
            Duration::from_secs(50)
        );
    }

    #[test]
    fn test_join_timer_expiry_resends_and_rearms() {
        let (mut ctx, h) = fixture();
        let now = Instant::now();
        let key = sg("10.0.0.1", "224.1.1.1");
        ctx.find_or_create(key, "eth0", UpstreamFlags::new(), now)
            .unwrap();
        ctx.entries.get_mut(&key).unwrap().join_timer = Some(now);
        h.jp.lock().unwrap().singles.clear();

        let timers = ctx.handle_timer(TimerType::JoinTimer { sg: key }, now);

        assert_eq!(h.jp.lock().unwrap().singles.len(), 1);
        assert!(timers
            .iter()
            .any(|t| matches!(t.timer_type, TimerType::JoinTimer { .. })));
    }

    #[test]
    fn test_join_timer_expiry_fhr_does_not_resend() {
        let (mut ctx, h) = fixture();
        let now = Instant::now();
        let key = sg("10.0.0.1", "224.1.1.1");
        ctx.find_or_create(key, "eth0", UpstreamFlags::new().with_first_hop_router(), now)
            .unwrap();
        ctx.entries.get_mut(&key).unwrap().join_timer = Some(now);
        h.jp.lock().unwrap().singles.clear();

        let timers = ctx.handle_timer(TimerType::JoinTimer { sg: key }, now);
        assert!(h.jp.lock().unwrap().singles.is_empty());
        assert!(timers.is_empty());
    }

    #[test]
    fn test_join_timer_restart_leaves_old_neighbor() {
        let (mut ctx, h) = fixture();
        let now = Instant::now();
        let key = sg("10.0.0.1", "224.1.1.1");
        ctx.find_or_create(key, "eth0", UpstreamFlags::new(), now)
            .unwrap();
        let old_addr = "192.168.9.9".parse().unwrap();
        h.jp.lock()
            .unwrap()
            .neighbors
            .insert(("eth1".to_string(), old_addr));

        // Upstream neighbor moved from eth1/old_addr to the current RPF
        let timers = ctx.join_timer_restart(key, "eth1", old_addr, now);

        let jp = h.jp.lock().unwrap();
        assert_eq!(jp.removed, vec![(old_addr, key)]);
        // New neighbor unknown: falls back to the private periodic timer
        assert!(timers
            .iter()
            .any(|t| matches!(t.timer_type, TimerType::JoinTimer { .. })));
        assert!(ctx.find(key).unwrap().join_timer.is_some());
    }

    #[test]
    fn test_aggregation_used_when_neighbor_known() {
        let (mut ctx, h) = fixture();
        let now = Instant::now();
        let key = sg("10.0.0.1", "224.1.1.1");
        ctx.find_or_create(key, "eth0", UpstreamFlags::new(), now)
            .unwrap();
        let neigh = ctx.find(key).unwrap().rpf.rpf_addr.unwrap();
        h.jp.lock().unwrap().neighbors.insert(("eth0".to_string(), neigh));

        let timers = ctx.join_timer_start(key, now);
        assert!(timers.is_empty(), "aggregated join needs no private timer");
        let jp = h.jp.lock().unwrap();
        assert_eq!(jp.agg.len(), 1);
    }
}
