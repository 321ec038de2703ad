//! End-to-end test harness: a stateful in-memory IPAM double
//! (`FakeGateway`) plus a one-call constructor for the full
//! Store/Validator/Engine stack over it, so scenario tests exercise the
//! real allocation algorithm against a real (if in-memory) backing store
//! instead of per-call mock expectations.

pub mod fake_gateway;

pub use fake_gateway::{FakeGateway, FakeIpamSeed};

use segment_engine::AllocationEngine;
use segment_store::SegmentStore;
use segment_validate::{PoolConfig, Validator};
use std::collections::HashMap;
use std::sync::Arc;

/// Wires a full `AllocationEngine` over a fresh `FakeGateway`, configured
/// with the given `(vrf, site) -> first octet` pool map and site list.
pub fn engine_harness(tenant: &str, seed: FakeIpamSeed, sites: Vec<String>, site_prefixes: HashMap<(String, String), String>) -> (Arc<AllocationEngine>, Arc<FakeGateway>) {
    let gateway = Arc::new(FakeGateway::new(seed));
    let dyn_gateway: Arc<dyn segment_core::gateway::IpamGateway> = gateway.clone();
    let store = Arc::new(SegmentStore::new(dyn_gateway.clone(), tenant.to_string()));
    let config = PoolConfig::new(sites, site_prefixes);
    let validator = Arc::new(Validator::new(config, dyn_gateway));
    (Arc::new(AllocationEngine::new(store, validator)), gateway)
}
