// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Activity timer wheel (traffic polling for (S,G) entries)
//!
//! One OS timer per flow would not scale; instead every (S,G) entry is
//! hashed into a fixed bucket and the wheel advances one bucket per tick
//! (wheel period / bucket count). A full rotation therefore visits each
//! entry exactly once per wheel period, refreshing its forwarding counters
//! and restarting the keepalive while traffic is flowing.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::time::Instant;

use crate::logging::Facility;
use crate::timers::{TimerRequest, TimerType};
use crate::{log_debug, SourceGroup};

use super::{JoinState, UpstreamContext};

/// Fixed-bucket wheel of (S,G) keys
pub(crate) struct ActivityWheel {
    slots: Vec<BTreeSet<SourceGroup>>,
    current: usize,
}

impl ActivityWheel {
    pub(crate) fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![BTreeSet::new(); slot_count.max(1)],
            current: 0,
        }
    }

    fn slot_of(&self, sg: SourceGroup) -> usize {
        let mut hasher = DefaultHasher::new();
        sg.hash(&mut hasher);
        (hasher.finish() as usize) % self.slots.len()
    }

    pub(crate) fn add(&mut self, sg: SourceGroup) {
        let slot = self.slot_of(sg);
        self.slots[slot].insert(sg);
    }

    pub(crate) fn remove(&mut self, sg: SourceGroup) {
        let slot = self.slot_of(sg);
        self.slots[slot].remove(&sg);
    }

    pub(crate) fn contains(&self, sg: SourceGroup) -> bool {
        self.slots[self.slot_of(sg)].contains(&sg)
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Advance one bucket and return its members in (group, source) order
    pub(crate) fn tick(&mut self) -> Vec<SourceGroup> {
        self.current = (self.current + 1) % self.slots.len();
        self.slots[self.current].iter().copied().collect()
    }
}

impl UpstreamContext {
    /// One wheel tick: re-evaluate every entry in the next bucket, then
    /// re-arm the tick
    pub(crate) fn on_wheel_tick(&mut self, now: Instant) -> Vec<TimerRequest> {
        let mut timers = Vec::new();
        for sg in self.wheel.tick() {
            timers.extend(self.sg_running(sg, now));
        }
        timers.push(TimerRequest::replace(
            TimerType::WheelTick,
            now + self.wheel_tick_interval(),
        ));
        timers
    }

    /// Check whether packets arrived on a (S,G) since the last visit and
    /// keep its keepalive and SPT bit up to date
    fn sg_running(&mut self, sg: SourceGroup, now: Instant) -> Vec<TimerRequest> {
        let mut timers = Vec::new();

        let oil = match self.entries.get(&sg).and_then(|e| e.oil) {
            Some(handle) => handle,
            None => {
                log_debug!(
                    self.logger,
                    Facility::Wheel,
                    &format!("{} is not installed in mroute", sg)
                );
                return timers;
            }
        };
        // No packet can have arrived if the kernel never took the route
        if !self.collab.fwd.is_installed(oil) {
            log_debug!(
                self.logger,
                Facility::Wheel,
                &format!("{} is not installed in mroute", sg)
            );
            return timers;
        }

        // An external rescan notification was missed; recover here
        if self.collab.fwd.take_rescan_flag(oil) {
            log_debug!(
                self.logger,
                Facility::Wheel,
                &format!("handling unscanned inherited olist for {}", sg)
            );
            self.inherited_olist_decide(sg);
        }

        let fresh = self.collab.fwd.counters(oil);
        let idle_threshold = self.config.stream_idle_threshold();
        let (has_new_packets, idle) = match self.entries.get_mut(&sg) {
            Some(e) => {
                e.counters.oldpktcnt = e.counters.pktcnt;
                e.counters.pktcnt = fresh.pkt_count;
                e.counters.last_used = fresh.last_used;
                (
                    e.counters.pktcnt > e.counters.oldpktcnt,
                    e.counters.last_used > idle_threshold,
                )
            }
            None => return timers,
        };

        if !has_new_packets && idle {
            log_debug!(
                self.logger,
                Facility::Wheel,
                &format!("{} no new packets and flow is idle", sg)
            );
            return timers;
        }

        if self.kat_start_ok(sg) {
            let has_stream = self
                .entries
                .get(&sg)
                .map(|e| e.flags.is_source_stream())
                .unwrap_or(false);
            if !has_stream {
                // Traffic holds its own reference on the entry
                log_debug!(
                    self.logger,
                    Facility::Wheel,
                    &format!("source reference created on kat restart {}", sg)
                );
                if let Some(e) = self.entries.get_mut(&sg) {
                    e.flags.set_source_stream();
                    e.ref_count += 1;
                }
                self.fhr_kat_start(sg);
            }
            let keepalive = self.config.keepalive_period();
            timers.extend(self.keep_alive_timer_start(sg, keepalive, now));
        }

        let spt_pending = self
            .entries
            .get(&sg)
            .map(|e| !e.spt_bit)
            .unwrap_or(false);
        if spt_pending {
            if let Some(iface) = self.entries.get(&sg).and_then(|e| e.rpf.interface.clone()) {
                self.set_sptbit(sg, &iface);
            }
        }

        timers
    }

    /// The keepalive restarts on traffic only for routers that own the
    /// flow: the first hop (directly connected) or the RP with receivers
    fn kat_start_ok(&self, sg: SourceGroup) -> bool {
        let e = match self.entries.get(&sg) {
            Some(e) => e,
            None => return false,
        };
        if let Some(iface) = e.rpf.interface.as_deref() {
            if self.collab.channels.connected_to_source(iface, sg.source) {
                return true;
            }
        }

        e.join_state == JoinState::Joined
            && !self.empty_inherited_olist(sg)
            && self.collab.rp.i_am_rp(sg.group)
    }
}
