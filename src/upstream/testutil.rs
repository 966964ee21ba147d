// SPDX-License-Identifier: Apache-2.0 OR MIT
// Mock collaborators and fixtures shared by the upstream unit tests

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use crate::collab::{
    ChannelBinding, ChannelRef, Collaborators, ForwardingPlane, IfChannels, JpAggregation, Msdp,
    OifFlag, OilCounters, OilHandle, RpMap, RpfNextHop, RpfResolver,
};
use crate::config::PimConfig;
use crate::logging::{Logger, MemorySink};
use crate::SourceGroup;

use super::UpstreamContext;

/// RP address handed out by the default fixture mapping
pub const RP_ADDR: &str = "10.1.0.250";

pub fn sg(s: &str, g: &str) -> SourceGroup {
    SourceGroup::sg(s.parse().unwrap(), g.parse().unwrap())
}

pub fn star_g(g: &str) -> SourceGroup {
    SourceGroup::star_g(g.parse().unwrap())
}

/// Channel for `upstream`'s own key on `interface`
pub fn channel(interface: &str, upstream: SourceGroup) -> ChannelRef {
    ChannelRef {
        interface: interface.to_string(),
        sg: upstream,
    }
}

#[derive(Debug)]
pub struct MockRpfState {
    /// Explicit per-address resolutions
    pub routes: HashMap<Ipv4Addr, RpfNextHop>,
    /// Fabricate a resolution for any address not in `routes`
    pub resolve_all: bool,
    /// Interface used for fabricated resolutions
    pub default_interface: String,
    /// Neighbor used for fabricated resolutions
    pub nexthop: Ipv4Addr,
    /// Currently tracked (address, owner) pairs
    pub tracked: HashSet<(Ipv4Addr, SourceGroup)>,
}

impl Default for MockRpfState {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
            resolve_all: true,
            default_interface: "eth0".to_string(),
            nexthop: "192.168.1.2".parse().unwrap(),
            tracked: HashSet::new(),
        }
    }
}

struct MockRpf(Arc<Mutex<MockRpfState>>);

impl RpfResolver for MockRpf {
    fn resolve(&mut self, address: Ipv4Addr) -> Option<RpfNextHop> {
        let state = self.0.lock().unwrap();
        if let Some(nh) = state.routes.get(&address) {
            return Some(nh.clone());
        }
        if state.resolve_all {
            return Some(RpfNextHop {
                interface: state.default_interface.clone(),
                nexthop: state.nexthop,
                route_metric: 10,
                metric_preference: 10,
            });
        }
        None
    }

    fn track(&mut self, address: Ipv4Addr, owner: SourceGroup) {
        self.0.lock().unwrap().tracked.insert((address, owner));
    }

    fn untrack(&mut self, address: Ipv4Addr, owner: SourceGroup) {
        self.0.lock().unwrap().tracked.remove(&(address, owner));
    }
}

#[derive(Debug, Default)]
pub struct MockRpState {
    /// group (or first-octet prefix) -> RP
    pub mappings: HashMap<Ipv4Addr, Ipv4Addr>,
    /// Whether the local router is the RP for every mapped group
    pub local_rp: bool,
    /// Source caches cleared on keepalive expiry
    pub cleared: Vec<SourceGroup>,
}

struct MockRp(Arc<Mutex<MockRpState>>);

impl MockRpState {
    fn lookup(&self, group: Ipv4Addr) -> Option<Ipv4Addr> {
        self.mappings
            .iter()
            .filter(|(prefix, _)| **prefix == group || group.octets()[0] == prefix.octets()[0])
            .map(|(_, rp)| *rp)
            .next()
    }
}

impl RpMap for MockRp {
    fn rp_for_group(&self, group: Ipv4Addr) -> Option<Ipv4Addr> {
        self.0.lock().unwrap().lookup(group)
    }

    fn i_am_rp(&self, group: Ipv4Addr) -> bool {
        let state = self.0.lock().unwrap();
        state.local_rp && state.lookup(group).is_some()
    }

    fn clear_source_cache(&mut self, sg: SourceGroup) {
        self.0.lock().unwrap().cleared.push(sg);
    }
}

#[derive(Debug, Default)]
pub struct MockJpState {
    /// Known neighbors as (interface, address)
    pub neighbors: HashSet<(String, Ipv4Addr)>,
    /// Aggregated (neighbor, sg, join) adds
    pub agg: Vec<(Ipv4Addr, SourceGroup, bool)>,
    /// Aggregation removals
    pub removed: Vec<(Ipv4Addr, SourceGroup)>,
    /// Unaggregated sends as (rpf, sg, join)
    pub singles: Vec<(Ipv4Addr, SourceGroup, bool)>,
    /// Null-register probes as (sg, rp)
    pub null_registers: Vec<(SourceGroup, Ipv4Addr)>,
}

struct MockJp(Arc<Mutex<MockJpState>>);

impl JpAggregation for MockJp {
    fn neighbor_exists(&self, interface: &str, addr: Ipv4Addr) -> bool {
        self.0
            .lock()
            .unwrap()
            .neighbors
            .contains(&(interface.to_string(), addr))
    }

    fn add_group(&mut self, neighbor: Ipv4Addr, sg: SourceGroup, join: bool) {
        self.0.lock().unwrap().agg.push((neighbor, sg, join));
    }

    fn remove_group(&mut self, neighbor: Ipv4Addr, sg: SourceGroup) {
        self.0.lock().unwrap().removed.push((neighbor, sg));
    }

    fn send_single(&mut self, rpf_addr: Ipv4Addr, sg: SourceGroup, join: bool) {
        self.0.lock().unwrap().singles.push((rpf_addr, sg, join));
    }

    fn send_null_register(&mut self, sg: SourceGroup, rp_addr: Ipv4Addr) {
        self.0.lock().unwrap().null_registers.push((sg, rp_addr));
    }
}

#[derive(Debug, Default)]
pub struct MockChannelsState {
    /// (channel, upstream key) bindings
    pub bindings: Vec<(ChannelRef, SourceGroup)>,
    /// Channel keys that lost their Assert election
    pub assert_losers: HashSet<SourceGroup>,
    /// Channel keys in the joins-or-include set
    pub joined: HashSet<SourceGroup>,
    /// Channel keys with (S,G,rpt) prune state
    pub sg_rpt: HashSet<SourceGroup>,
    /// Interfaces where the local router is DR
    pub dr_interfaces: HashSet<String>,
    /// Directly attached sources
    pub connected_sources: HashSet<Ipv4Addr>,
    /// Loopback interfaces
    pub loopbacks: HashSet<String>,
    pub updated_assert_tracking: Vec<ChannelRef>,
    pub updated_could_assert: Vec<ChannelRef>,
    pub updated_assert_metric: Vec<ChannelRef>,
    pub loser_rpf_changed: Vec<ChannelRef>,
}

struct MockChannels(Arc<Mutex<MockChannelsState>>);

impl IfChannels for MockChannels {
    fn channels(&self) -> Vec<ChannelBinding> {
        self.0
            .lock()
            .unwrap()
            .bindings
            .iter()
            .map(|(ch, up)| ChannelBinding {
                channel: ch.clone(),
                upstream: *up,
            })
            .collect()
    }

    fn lost_assert(&self, ch: &ChannelRef) -> bool {
        self.0.lock().unwrap().assert_losers.contains(&ch.sg)
    }

    fn in_joins_or_include(&self, ch: &ChannelRef) -> bool {
        self.0.lock().unwrap().joined.contains(&ch.sg)
    }

    fn is_sg_rpt(&self, ch: &ChannelRef) -> bool {
        self.0.lock().unwrap().sg_rpt.contains(&ch.sg)
    }

    fn update_assert_tracking_desired(&mut self, ch: &ChannelRef) {
        self.0
            .lock()
            .unwrap()
            .updated_assert_tracking
            .push(ch.clone());
    }

    fn update_could_assert(&mut self, ch: &ChannelRef) {
        self.0.lock().unwrap().updated_could_assert.push(ch.clone());
    }

    fn update_my_assert_metric(&mut self, ch: &ChannelRef) {
        self.0
            .lock()
            .unwrap()
            .updated_assert_metric
            .push(ch.clone());
    }

    fn assert_loser_rpf_changed(&mut self, ch: &ChannelRef) {
        self.0.lock().unwrap().loser_rpf_changed.push(ch.clone());
    }

    fn i_am_dr(&self, interface: &str) -> bool {
        self.0.lock().unwrap().dr_interfaces.contains(interface)
    }

    fn connected_to_source(&self, _interface: &str, source: Ipv4Addr) -> bool {
        self.0.lock().unwrap().connected_sources.contains(&source)
    }

    fn is_loopback(&self, interface: &str) -> bool {
        self.0.lock().unwrap().loopbacks.contains(interface)
    }
}

#[derive(Debug, Default)]
pub struct MockFwdState {
    next_handle: OilHandle,
    /// handle -> (sg, incoming interface)
    pub installed: HashMap<OilHandle, (SourceGroup, String)>,
    /// handle -> outgoing interfaces with their flags
    pub oifs: HashMap<OilHandle, Vec<(String, OifFlag)>>,
    /// Handles flagged for a deferred inherited-olist rescan
    pub rescan: HashSet<OilHandle>,
    /// Counters returned on refresh
    pub counters: HashMap<OilHandle, OilCounters>,
    pub started: Vec<ChannelRef>,
    pub stopped: Vec<ChannelRef>,
    pub uninstalled: Vec<OilHandle>,
}

impl MockFwdState {
    pub fn oifs_of(&self, handle: OilHandle) -> Vec<String> {
        self.oifs
            .get(&handle)
            .map(|v| v.iter().map(|(i, _)| i.clone()).collect())
            .unwrap_or_default()
    }
}

struct MockFwd(Arc<Mutex<MockFwdState>>);

impl ForwardingPlane for MockFwd {
    fn install(&mut self, sg: SourceGroup, incoming_interface: &str) -> OilHandle {
        let mut state = self.0.lock().unwrap();
        state.next_handle += 1;
        let handle = state.next_handle;
        state
            .installed
            .insert(handle, (sg, incoming_interface.to_string()));
        state.oifs.insert(handle, Vec::new());
        handle
    }

    fn uninstall(&mut self, handle: OilHandle) {
        let mut state = self.0.lock().unwrap();
        state.installed.remove(&handle);
        state.oifs.remove(&handle);
        state.uninstalled.push(handle);
    }

    fn add_oif(&mut self, handle: OilHandle, interface: &str, flag: OifFlag) {
        let mut state = self.0.lock().unwrap();
        let oifs = state.oifs.entry(handle).or_default();
        if !oifs.iter().any(|(i, _)| i == interface) {
            oifs.push((interface.to_string(), flag));
        }
    }

    fn del_oif(&mut self, handle: OilHandle, interface: &str, _flag: OifFlag) {
        let mut state = self.0.lock().unwrap();
        if let Some(oifs) = state.oifs.get_mut(&handle) {
            oifs.retain(|(i, _)| i != interface);
        }
    }

    fn is_installed(&self, handle: OilHandle) -> bool {
        self.0.lock().unwrap().installed.contains_key(&handle)
    }

    fn oil_is_empty(&self, handle: OilHandle) -> bool {
        self.0
            .lock()
            .unwrap()
            .oifs
            .get(&handle)
            .map(|v| v.is_empty())
            .unwrap_or(true)
    }

    fn take_rescan_flag(&mut self, handle: OilHandle) -> bool {
        self.0.lock().unwrap().rescan.remove(&handle)
    }

    fn counters(&mut self, handle: OilHandle) -> OilCounters {
        self.0
            .lock()
            .unwrap()
            .counters
            .get(&handle)
            .copied()
            .unwrap_or_default()
    }

    fn forward_start(&mut self, ch: &ChannelRef) {
        self.0.lock().unwrap().started.push(ch.clone());
    }

    fn forward_stop(&mut self, ch: &ChannelRef) {
        self.0.lock().unwrap().stopped.push(ch.clone());
    }
}

#[derive(Debug, Default)]
pub struct MockMsdpState {
    pub updates: Vec<SourceGroup>,
    pub withdrawn: Vec<SourceGroup>,
    pub join_changes: Vec<(SourceGroup, bool)>,
}

struct MockMsdp(Arc<Mutex<MockMsdpState>>);

impl Msdp for MockMsdp {
    fn source_active_update(&mut self, sg: SourceGroup) {
        self.0.lock().unwrap().updates.push(sg);
    }

    fn source_active_withdraw(&mut self, sg: SourceGroup) {
        self.0.lock().unwrap().withdrawn.push(sg);
    }

    fn join_state_changed(&mut self, sg: SourceGroup, joined: bool) {
        self.0.lock().unwrap().join_changes.push((sg, joined));
    }
}

/// Shared handles into every mock's recorded state
pub struct Handles {
    pub rpf: Arc<Mutex<MockRpfState>>,
    pub rp: Arc<Mutex<MockRpState>>,
    pub jp: Arc<Mutex<MockJpState>>,
    pub channels: Arc<Mutex<MockChannelsState>>,
    pub fwd: Arc<Mutex<MockFwdState>>,
    pub msdp: Arc<Mutex<MockMsdpState>>,
    pub log: Arc<MemorySink>,
}

/// Context wired to fresh mocks: every address resolves via eth0, the
/// 224/8 range maps to [`RP_ADDR`], and nothing is DR or directly
/// connected until a test says so
pub fn fixture() -> (UpstreamContext, Handles) {
    fixture_with_config(PimConfig::default())
}

pub fn fixture_with_config(config: PimConfig) -> (UpstreamContext, Handles) {
    let rpf = Arc::new(Mutex::new(MockRpfState::default()));
    let rp = Arc::new(Mutex::new(MockRpState::default()));
    rp.lock().unwrap().mappings.insert(
        "224.0.0.0".parse().unwrap(),
        RP_ADDR.parse().unwrap(),
    );
    let jp = Arc::new(Mutex::new(MockJpState::default()));
    let channels = Arc::new(Mutex::new(MockChannelsState::default()));
    let fwd = Arc::new(Mutex::new(MockFwdState::default()));
    let msdp = Arc::new(Mutex::new(MockMsdpState::default()));

    let collab = Collaborators {
        rpf: Box::new(MockRpf(Arc::clone(&rpf))),
        rp: Box::new(MockRp(Arc::clone(&rp))),
        jp: Box::new(MockJp(Arc::clone(&jp))),
        channels: Box::new(MockChannels(Arc::clone(&channels))),
        fwd: Box::new(MockFwd(Arc::clone(&fwd))),
        msdp: Box::new(MockMsdp(Arc::clone(&msdp))),
    };

    let (logger, log) = Logger::memory();
    let ctx = UpstreamContext::new(config, logger, collab);
    (
        ctx,
        Handles {
            rpf,
            rp,
            jp,
            channels,
            fwd,
            msdp,
            log,
        },
    )
}
