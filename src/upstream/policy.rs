// SPDX-License-Identifier: Apache-2.0 OR MIT
//! SPT switchover and forwarding policy (RFC 4601 4.2)
//!
//! The inherited outgoing-interface list decides which interfaces a flow is
//! distributed onto; a non-empty list drives the entry Joined. An empty
//! list does NOT withdraw forwarding: the traffic is still accepted and
//! delivered locally so directly-attached receivers on the incoming branch
//! are not starved.
//!
//! The SPT bit records that traffic has been seen arriving over the
//! shortest-path tree. It only ever moves False -> True.

use std::time::Instant;

use crate::collab::OifFlag;
use crate::logging::Facility;
use crate::timers::TimerRequest;
use crate::{log_debug, SourceGroup, ANY_ADDR};

use super::{JoinState, UpstreamContext};

impl UpstreamContext {
    /// Recompute the inherited outgoing-interface list and program it into
    /// the forwarding plane. Returns the number of outgoing interfaces.
    pub fn inherited_olist_decide(&mut self, sg: SourceGroup) -> usize {
        // Forwarding state may not exist yet if RPF came up late
        let (oil, iface) = match self.entries.get(&sg) {
            Some(e) => (e.oil, e.rpf.interface.clone()),
            None => return 0,
        };
        let oil = match (oil, iface) {
            (Some(handle), _) => Some(handle),
            (None, Some(iface)) => {
                let handle = self.collab.fwd.install(sg, &iface);
                if let Some(e) = self.entries.get_mut(&sg) {
                    e.oil = Some(handle);
                }
                Some(handle)
            }
            (None, None) => None,
        };

        let mut output_intf = 0;
        for binding in self.collab.channels.channels() {
            if self.evaluate_join_desired_interface(sg, &binding) {
                // Tag contributions inherited through the wildcard parent
                let flag = if binding.channel.sg.source == ANY_ADDR && binding.upstream != sg {
                    OifFlag::Star
                } else {
                    OifFlag::Pim
                };
                if let Some(handle) = oil {
                    self.collab
                        .fwd
                        .add_oif(handle, &binding.channel.interface, flag);
                }
                output_intf += 1;
            }
        }

        output_intf
    }

    /// Apply the inherited outgoing-interface list: a non-empty list joins
    /// the entry upstream; an empty one leaves the flow locally forwarded
    /// for leaf receivers
    pub fn inherited_olist(&mut self, sg: SourceGroup, now: Instant) -> (usize, Vec<TimerRequest>) {
        let output_intf = self.inherited_olist_decide(sg);

        if output_intf > 0 {
            let timers = self.switch(sg, JoinState::Joined, now);
            (output_intf, timers)
        } else {
            self.forward_on(sg);
            (0, Vec::new())
        }
    }

    /// True when the installed outgoing-interface list is empty
    pub fn empty_inherited_olist(&self, sg: SourceGroup) -> bool {
        match self.entries.get(&sg).and_then(|e| e.oil) {
            Some(handle) => self.collab.fwd.oil_is_empty(handle),
            None => true,
        }
    }

    /// True if any bound channel carries (S,G,rpt) prune state
    pub fn is_sg_rpt(&self, sg: SourceGroup) -> bool {
        self.collab
            .channels
            .channels()
            .iter()
            .any(|b| b.upstream == sg && self.collab.channels.is_sg_rpt(&b.channel))
    }

    /// Update_SPTbit(S,G, iif): evaluated when a packet arrives on
    /// `incoming`; the bit is set once any qualifying condition holds and
    /// is never cleared again
    pub fn set_sptbit(&mut self, sg: SourceGroup, incoming: &str) {
        let (rpf_iface, parent) = match self.entries.get(&sg) {
            Some(e) => (e.rpf.interface.clone(), e.parent),
            None => return,
        };

        // iif == RPF_interface(S)
        if rpf_iface.as_deref() != Some(incoming) {
            log_debug!(
                self.logger,
                Facility::Upstream,
                &format!(
                    "{}: incoming interface {} is not the RPF interface",
                    sg, incoming
                )
            );
            return;
        }

        // DirectlyConnected(S) == TRUE
        if self.collab.channels.connected_to_source(incoming, sg.source) {
            log_debug!(
                self.logger,
                Facility::Upstream,
                &format!("{} is directly connected to the source", sg)
            );
            self.mark_sptbit(sg);
            return;
        }

        // RPF_interface(S) != RPF_interface(RP(G))
        let rp_addr = self.collab.rp.rp_for_group(sg.group);
        let rp_iface = match rp_addr {
            Some(rp) => self.collab.rpf.resolve(rp).map(|nh| nh.interface),
            None => None,
        };
        if rp_iface.as_deref() != Some(incoming) {
            log_debug!(
                self.logger,
                Facility::Upstream,
                &format!("{} source and RP diverge at this router", sg)
            );
            self.mark_sptbit(sg);
            return;
        }

        // inherited_olist(S,G,rpt) == NULL
        if self.is_sg_rpt(sg) && self.empty_inherited_olist(sg) {
            log_debug!(
                self.logger,
                Facility::Upstream,
                &format!("{} inherited rpt olist is empty", sg)
            );
            self.mark_sptbit(sg);
            return;
        }

        // RPF'(S,G) == RPF'(*,G) and RPF'(S,G) != NULL
        if let Some(parent_key) = parent {
            let same = match (self.entries.get(&sg), self.entries.get(&parent_key)) {
                (Some(e), Some(p)) => e.rpf.rpf_addr.is_some() && e.rpf.is_same(&p.rpf),
                _ => false,
            };
            if same {
                log_debug!(
                    self.logger,
                    Facility::Upstream,
                    &format!("{} shares its upstream neighbor with the shared tree", sg)
                );
                self.mark_sptbit(sg);
            }
        }
    }

    fn mark_sptbit(&mut self, sg: SourceGroup) {
        if let Some(e) = self.entries.get_mut(&sg) {
            e.spt_bit = true;
        }
    }

    /// SwitchToSptDesired(S,G): the RP-only policy; the RP switches to the
    /// source tree as soon as it learns of the source
    pub fn switch_to_spt_desired(&self, sg: SourceGroup) -> bool {
        self.collab.rp.i_am_rp(sg.group)
    }
}
