// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Collaborator interfaces consumed by the upstream core
//!
//! The upstream state machines own nothing but upstream entries. Everything
//! else they touch - unicast route lookups, Join/Prune transport,
//! per-interface (S,G) channel state, the kernel forwarding plane, MSDP and
//! RP mapping - lives behind the narrow traits in this module. Production
//! code wires in the real subsystems; tests install mocks.
//!
//! All calls are fire-and-forget or synchronous queries; none may block.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::SourceGroup;

/// Result of resolving an upstream address against the unicast RIB
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpfNextHop {
    /// Interface toward the address
    pub interface: String,
    /// Next-hop neighbor address
    pub nexthop: Ipv4Addr,
    /// Route metric of the unicast route used
    pub route_metric: u32,
    /// Administrative distance / metric preference
    pub metric_preference: u32,
}

/// Reverse-path resolution against the unicast RIB, with asynchronous
/// re-resolution tracking
pub trait RpfResolver {
    /// Resolve the RPF next hop toward `address`, or None if unreachable
    fn resolve(&mut self, address: Ipv4Addr) -> Option<RpfNextHop>;

    /// Register interest in future route changes affecting `address`
    fn track(&mut self, address: Ipv4Addr, owner: SourceGroup);

    /// Drop a previously registered interest
    fn untrack(&mut self, address: Ipv4Addr, owner: SourceGroup);
}

/// Group-to-RP mapping queries
pub trait RpMap {
    /// The Rendezvous Point address for `group`, or None if unconfigured
    fn rp_for_group(&self, group: Ipv4Addr) -> Option<Ipv4Addr>;

    /// True if the local router is the RP for `group`
    fn i_am_rp(&self, group: Ipv4Addr) -> bool;

    /// Clear the per-RP active-source cache entry for `sg` (keepalive
    /// expiry on the RP)
    fn clear_source_cache(&mut self, sg: SourceGroup);
}

/// Join/Prune signaling toward upstream neighbors
///
/// Periodic Joins ride a per-neighbor aggregation list when the upstream
/// neighbor is known; `send_single` is the unaggregated fallback used for
/// immediate sends (state transitions, final Prune at teardown).
pub trait JpAggregation {
    /// True if a PIM neighbor with `addr` exists on `interface`
    fn neighbor_exists(&self, interface: &str, addr: Ipv4Addr) -> bool;

    /// Add `sg` to the neighbor's periodic Join (or Prune) aggregation
    fn add_group(&mut self, neighbor: Ipv4Addr, sg: SourceGroup, join: bool);

    /// Remove `sg` from the neighbor's aggregation
    fn remove_group(&mut self, neighbor: Ipv4Addr, sg: SourceGroup);

    /// Send one immediate, unaggregated Join or Prune toward `rpf_addr`
    fn send_single(&mut self, rpf_addr: Ipv4Addr, sg: SourceGroup, join: bool);

    /// Send one null Register probe for `sg` to the RP
    fn send_null_register(&mut self, sg: SourceGroup, rp_addr: Ipv4Addr);
}

/// Identity of a per-interface (S,G) channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    /// Interface the channel lives on
    pub interface: String,
    /// The channel's own (source, group) key
    pub sg: SourceGroup,
}

/// A channel together with the upstream entry it is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBinding {
    pub channel: ChannelRef,
    /// Key of the upstream entry this channel hangs off
    pub upstream: SourceGroup,
}

/// Per-interface downstream channel state (ifchannel)
pub trait IfChannels {
    /// All channels currently bound to any upstream entry
    fn channels(&self) -> Vec<ChannelBinding>;

    /// True if the channel's interface lost the Assert election
    fn lost_assert(&self, ch: &ChannelRef) -> bool;

    /// True if the channel is in the joins-or-local-include set
    fn in_joins_or_include(&self, ch: &ChannelRef) -> bool;

    /// True if the channel carries (S,G,rpt) prune state
    fn is_sg_rpt(&self, ch: &ChannelRef) -> bool;

    /// JoinDesired changed for the channel's upstream; re-derive
    /// AssertTrackingDesired
    fn update_assert_tracking_desired(&mut self, ch: &ChannelRef);

    /// The upstream's forwarding role changed; re-derive CouldAssert
    fn update_could_assert(&mut self, ch: &ChannelRef);

    /// The upstream's RPF metric changed; re-derive my_assert_metric
    fn update_my_assert_metric(&mut self, ch: &ChannelRef);

    /// The upstream's RPF interface moved off this assert-loser channel
    fn assert_loser_rpf_changed(&mut self, ch: &ChannelRef);

    /// True if the local router is DR on `interface`
    fn i_am_dr(&self, interface: &str) -> bool;

    /// True if `source` is directly attached on `interface`
    fn connected_to_source(&self, interface: &str, source: Ipv4Addr) -> bool;

    /// True if `interface` is a loopback
    fn is_loopback(&self, interface: &str) -> bool;
}

/// Handle to an installed forwarding-plane entry (channel OIL)
pub type OilHandle = u64;

/// Why an interface is in an outgoing-interface list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OifFlag {
    /// Added by this entry's own protocol state
    Pim,
    /// Inherited from the wildcard (*,G) parent
    Star,
}

/// Forwarding counters snapshot for one installed entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OilCounters {
    /// Packets forwarded so far
    pub pkt_count: u64,
    /// Bytes forwarded so far
    pub byte_count: u64,
    /// Time since the entry last carried a packet
    pub last_used: std::time::Duration,
}

/// Kernel/forwarding-plane multicast route programming
pub trait ForwardingPlane {
    /// Install forwarding state for `sg` with the given incoming interface
    fn install(&mut self, sg: SourceGroup, incoming_interface: &str) -> OilHandle;

    /// Remove the installed state entirely
    fn uninstall(&mut self, handle: OilHandle);

    /// Add an interface to the outgoing-interface list
    fn add_oif(&mut self, handle: OilHandle, interface: &str, flag: OifFlag);

    /// Remove an interface from the outgoing-interface list
    fn del_oif(&mut self, handle: OilHandle, interface: &str, flag: OifFlag);

    /// True once the kernel actually holds the route
    fn is_installed(&self, handle: OilHandle) -> bool;

    /// True if the outgoing-interface list is empty
    fn oil_is_empty(&self, handle: OilHandle) -> bool;

    /// Take-and-clear the deferred inherited-olist rescan flag
    fn take_rescan_flag(&mut self, handle: OilHandle) -> bool;

    /// Fresh traffic counters for the installed entry
    fn counters(&mut self, handle: OilHandle) -> OilCounters;

    /// Start local forwarding on one downstream channel
    fn forward_start(&mut self, ch: &ChannelRef);

    /// Stop local forwarding on one downstream channel
    fn forward_stop(&mut self, ch: &ChannelRef);
}

/// The full set of collaborator objects wired into an upstream context
pub struct Collaborators {
    pub rpf: Box<dyn RpfResolver>,
    pub rp: Box<dyn RpMap>,
    pub jp: Box<dyn JpAggregation>,
    pub channels: Box<dyn IfChannels>,
    pub fwd: Box<dyn ForwardingPlane>,
    pub msdp: Box<dyn Msdp>,
}

/// MSDP notifications (best-effort, never block teardown)
pub trait Msdp {
    /// A local source-active entry should be created or refreshed
    fn source_active_update(&mut self, sg: SourceGroup);

    /// The local source-active entry for `sg` is withdrawn
    fn source_active_withdraw(&mut self, sg: SourceGroup);

    /// The upstream entry's join state flipped
    fn join_state_changed(&mut self, sg: SourceGroup, joined: bool);
}
