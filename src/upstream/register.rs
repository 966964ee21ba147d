// SPDX-License-Identifier: Apache-2.0 OR MIT
//! First-hop-router Register state machine (RFC 4601 4.4.1)
//!
//! Applies to an (S,G) entry while the router is DR on the interface the
//! source is attached to. While registering, traffic is encapsulated to
//! the RP through the register interface instead of flowing down a
//! protocol join. Register-Stops from the RP push the machine to Prune;
//! the register-stop timer then alternates probe cycles until the RP
//! wants the traffic again or the keepalive expires.

use std::time::{Duration, Instant};

use crate::collab::OifFlag;
use crate::logging::Facility;
use crate::timers::{TimerRequest, TimerType};
use crate::{log_debug, log_warning, SourceGroup};

use super::{RegisterState, UpstreamContext};

impl UpstreamContext {
    /// CouldRegister(S,G): DR on the source-connected interface and
    /// directly connected to the source
    pub(crate) fn could_register(&self, sg: SourceGroup) -> bool {
        let iface = match self.entries.get(&sg).and_then(|e| e.rpf.interface.clone()) {
            Some(i) => i,
            None => return false,
        };
        self.collab.channels.i_am_dr(&iface)
            && self.collab.channels.connected_to_source(&iface, sg.source)
    }

    /// Keepalive came up and CouldRegister may now hold: move the (S,G)
    /// to register-Join and add the encapsulation interface to the OIL
    pub(crate) fn fhr_kat_start(&mut self, sg: SourceGroup) {
        if !self.could_register(sg) {
            return;
        }
        log_debug!(
            self.logger,
            Facility::Register,
            &format!("kat started on {}; set fhr reg state to joined", sg)
        );
        let (enter_join, oil) = match self.entries.get_mut(&sg) {
            Some(e) => {
                e.flags.set_first_hop_router();
                (e.reg_state == RegisterState::NoInfo, e.oil)
            }
            None => return,
        };
        if enter_join {
            let regif = self.config.register_interface.clone();
            if let Some(handle) = oil {
                self.collab.fwd.add_oif(handle, &regif, OifFlag::Pim);
            }
            if let Some(e) = self.entries.get_mut(&sg) {
                e.reg_state = RegisterState::Join;
            }
        }
    }

    /// Keepalive expired, so CouldRegister went false: clear register
    /// state, pull the encapsulation interface and drop the FHR flag
    pub(crate) fn fhr_kat_expiry(&mut self, sg: SourceGroup) {
        let oil = match self.entries.get_mut(&sg) {
            Some(e) if e.flags.is_first_hop_router() => {
                e.rs_timer = None;
                e.oil
            }
            _ => return,
        };
        log_debug!(
            self.logger,
            Facility::Register,
            &format!("kat expired on {}; clear fhr reg state", sg)
        );
        let regif = self.config.register_interface.clone();
        if let Some(handle) = oil {
            self.collab.fwd.del_oif(handle, &regif, OifFlag::Pim);
        }
        if let Some(e) = self.entries.get_mut(&sg) {
            e.reg_state = RegisterState::NoInfo;
            e.flags.clear_first_hop_router();
        }
    }

    /// A Register-Stop from the RP arrived for this (S,G)
    pub fn register_stop_received(&mut self, sg: SourceGroup, now: Instant) -> Vec<TimerRequest> {
        let (state, oil) = match self.entries.get(&sg) {
            Some(e) => (e.reg_state, e.oil),
            None => return Vec::new(),
        };
        match state {
            RegisterState::Join | RegisterState::JoinPending => {
                log_debug!(
                    self.logger,
                    Facility::Register,
                    &format!("{} register suppressed by Register-Stop", sg)
                );
                let regif = self.config.register_interface.clone();
                if let Some(handle) = oil {
                    self.collab.fwd.del_oif(handle, &regif, OifFlag::Pim);
                }
                if let Some(e) = self.entries.get_mut(&sg) {
                    e.reg_state = RegisterState::Prune;
                }
                self.start_register_stop_timer(sg, false, now)
            }
            _ => Vec::new(),
        }
    }

    /// Arm the register-stop timer: randomized suppression interval after
    /// a Register-Stop, exact probe period before a null-register probe
    pub(crate) fn start_register_stop_timer(
        &mut self,
        sg: SourceGroup,
        null_register: bool,
        now: Instant,
    ) -> Vec<TimerRequest> {
        let interval = if null_register {
            self.config.register_probe()
        } else {
            let suppress_ms = self.config.register_suppress().as_millis() as u64;
            let probe_ms = self.config.register_probe().as_millis() as u64;
            let lower = suppress_ms / 2;
            let upper = suppress_ms + suppress_ms / 2;
            let jittered = lower + u64::from(rand::random()) % (upper - lower + 1);
            Duration::from_millis(jittered.saturating_sub(probe_ms))
        };

        log_debug!(
            self.logger,
            Facility::Register,
            &format!(
                "{} starting register stop timer {} msec",
                sg,
                interval.as_millis()
            )
        );
        if let Some(e) = self.entries.get_mut(&sg) {
            e.rs_timer = Some(now + interval);
        }
        vec![TimerRequest::replace(
            TimerType::RegisterStopTimer { sg },
            now + interval,
        )]
    }

    /// Register-stop timer expiry
    pub(crate) fn on_register_stop_timer(
        &mut self,
        sg: SourceGroup,
        now: Instant,
    ) -> Vec<TimerRequest> {
        let (state, oil) = match self.entries.get_mut(&sg) {
            Some(e) => {
                e.rs_timer = None;
                (e.reg_state, e.oil)
            }
            None => return Vec::new(),
        };

        log_debug!(
            self.logger,
            Facility::Register,
            &format!("{} register stop timer {}", sg, state.as_str())
        );

        match state {
            RegisterState::JoinPending => {
                // The RP stayed quiet through the probe: resume
                // encapsulation
                if let Some(e) = self.entries.get_mut(&sg) {
                    e.reg_state = RegisterState::Join;
                }
                let regif = self.config.register_interface.clone();
                if let Some(handle) = oil {
                    self.collab.fwd.add_oif(handle, &regif, OifFlag::Pim);
                }
                Vec::new()
            }
            RegisterState::Prune => {
                if let Some(e) = self.entries.get_mut(&sg) {
                    e.reg_state = RegisterState::JoinPending;
                }
                let timers = self.start_register_stop_timer(sg, true, now);

                let idle = self
                    .entries
                    .get(&sg)
                    .map(|e| e.counters.last_used > self.config.keepalive_period())
                    .unwrap_or(false);
                if idle && self.collab.rp.i_am_rp(sg.group) {
                    log_debug!(
                        self.logger,
                        Facility::Register,
                        "stop sending the register, local RP and no recent packets"
                    );
                    return timers;
                }

                if let Some(rp_addr) = self.collab.rp.rp_for_group(sg.group) {
                    self.collab.jp.send_null_register(sg, rp_addr);
                }
                timers
            }
            RegisterState::Join | RegisterState::NoInfo => Vec::new(),
        }
    }

    /// (Re)start the keepalive; any keepalive start re-evaluates the MSDP
    /// active-source database
    pub(crate) fn keep_alive_timer_start(
        &mut self,
        sg: SourceGroup,
        period: Duration,
        now: Instant,
    ) -> Vec<TimerRequest> {
        let has_stream = self
            .entries
            .get(&sg)
            .map(|e| e.flags.is_source_stream())
            .unwrap_or(false);
        if !has_stream {
            log_warning!(
                self.logger,
                Facility::Wheel,
                &format!("kat start on {} with no stream reference", sg)
            );
        }
        if let Some(e) = self.entries.get_mut(&sg) {
            e.ka_timer = Some(now + period);
        }
        self.collab.msdp.source_active_update(sg);
        vec![TimerRequest::replace(
            TimerType::KeepaliveTimer { sg },
            now + period,
        )]
    }

    /// Keepalive expiry: the flow is inactive. On the RP the per-RP
    /// active-source cache entry is cleared; MSDP drops the source-active
    /// advertisement; a stream-created reference is released, which may
    /// destroy the entry.
    pub(crate) fn on_keep_alive_timer(&mut self, sg: SourceGroup) -> Vec<TimerRequest> {
        let has_stream = match self.entries.get_mut(&sg) {
            Some(e) => {
                e.ka_timer = None;
                e.flags.is_source_stream()
            }
            None => return Vec::new(),
        };

        if self.collab.rp.i_am_rp(sg.group) {
            self.collab.rp.clear_source_cache(sg);
        }

        self.collab.msdp.source_active_withdraw(sg);

        if has_stream {
            self.fhr_kat_expiry(sg);
            log_debug!(
                self.logger,
                Facility::Wheel,
                &format!("kat expired on {}; remove stream reference", sg)
            );
            if let Some(e) = self.entries.get_mut(&sg) {
                e.flags.clear_source_stream();
            }
            self.release(sg);
        }
        Vec::new()
    }

    /// MSDP needs to know a source remains registerable to this RP
    pub fn msdp_reg_timer_start(&mut self, sg: SourceGroup, now: Instant) -> Vec<TimerRequest> {
        let period = self.config.msdp_reg_period();
        if let Some(e) = self.entries.get_mut(&sg) {
            e.msdp_reg_timer = Some(now + period);
        }
        self.collab.msdp.source_active_update(sg);
        vec![TimerRequest::replace(
            TimerType::MsdpRegTimer { sg },
            now + period,
        )]
    }

    /// MSDP registration expiry: the source stopped registering
    pub(crate) fn on_msdp_reg_timer(&mut self, sg: SourceGroup) -> Vec<TimerRequest> {
        if let Some(e) = self.entries.get_mut(&sg) {
            e.msdp_reg_timer = None;
        }
        self.collab.msdp.source_active_withdraw(sg);
        Vec::new()
    }
}

/// Helper to generate pseudo-random jitter without an RNG dependency
mod rand {
    use std::time::SystemTime;

    /// Generate a pseudo-random u32
    pub fn random() -> u32 {
        let duration = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        // Mix nanoseconds to get pseudo-randomness
        (duration.subsec_nanos()) ^ (duration.as_secs() as u32).wrapping_mul(2654435769)
    }
}
