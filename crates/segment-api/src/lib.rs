//! The thin Request Surface (spec.md §2 item 6 / §6): a process bootstrap
//! (`AppContext::bootstrap`) wiring the Gateway, Store, Validator and
//! Allocation Engine together, then a set of plain async functions an HTTP
//! handler would call directly (`net-api`'s `NetworkAPI`/`SdnApiState`
//! play the analogous role between `AppContext` and its, here out-of-scope,
//! router).

pub mod config;
pub mod error;

pub use config::EngineConfig;
pub use error::ApiError;

use segment_core::query::Query;
use segment_core::gateway::IpamGateway;
use segment_engine::{Allocation, AllocationEngine, ReleaseOutcome};
use segment_gateway::NetBoxGateway;
use segment_store::{NewSegment, SegmentStore};
use segment_types::{Segment, SegmentUpdate};
use segment_validate::Validator;
use std::sync::Arc;

/// Initializes the `log`/`env_logger` facade once at process start, the
/// way `net-api`'s binary does (`env_logger::init()`).
pub fn init_logging() {
    let _ = env_logger::try_init();
}

pub struct AppContext {
    engine: Arc<AllocationEngine>,
    store: Arc<SegmentStore>,
}

impl AppContext {
    /// The startup contract (spec.md §6): verify IPAM reachability, warm
    /// the Reference Cache (failure here is not fatal — demand-fill takes
    /// over), then scan all prefixes for the tenant, logging (not
    /// deleting) any that fail projection.
    pub async fn bootstrap(config: EngineConfig) -> Result<Self, ApiError> {
        let gateway: Arc<dyn IpamGateway> = Arc::new(NetBoxGateway::new(config.ipam_url.clone(), config.ipam_token.clone(), config.ipam_ssl_verify));

        gateway.ping().await.map_err(segment_engine::EngineError::from)?;

        if let Err(e) = gateway.get_tenant_by_name(&config.tenant_name).await {
            log::warn!("warm start: could not pre-fetch tenant '{}': {e}", config.tenant_name);
        }
        if let Err(e) = gateway.get_role_by_name("Data").await {
            log::warn!("warm start: could not pre-fetch role 'Data': {e}");
        }
        if let Err(e) = gateway.list_site_groups().await {
            log::warn!("warm start: could not pre-fetch site groups: {e}");
        }
        if let Err(e) = gateway.list_vrfs().await {
            log::warn!("warm start: could not pre-fetch VRFs: {e}");
        }

        let store = Arc::new(SegmentStore::new(gateway.clone(), config.tenant_name.clone()));
        let validator = Arc::new(Validator::new(config.pool_config.clone(), gateway));
        let engine = Arc::new(AllocationEngine::new(store.clone(), validator));

        if let Err(e) = store.find(&[]).await {
            log::warn!("startup prefix scan failed: {e}");
        }

        Ok(Self { engine, store })
    }

    pub async fn allocate(&self, cluster: &str, site: &str, vrf: &str) -> Result<Allocation, ApiError> {
        Ok(self.engine.allocate(cluster, site, vrf).await?)
    }

    pub async fn release(&self, cluster: &str, site: &str, vrf: &str) -> Result<ReleaseOutcome, ApiError> {
        Ok(self.engine.release(cluster, site, vrf).await?)
    }

    pub async fn create_segment(&self, new: NewSegment) -> Result<Segment, ApiError> {
        Ok(self.engine.create_segment(new).await?)
    }

    pub async fn update_segment(&self, id: &str, update: SegmentUpdate) -> Result<Segment, ApiError> {
        Ok(self.engine.update_segment(id, update).await?)
    }

    pub async fn delete_segment(&self, id: &str) -> Result<(), ApiError> {
        Ok(self.engine.delete_segment(id).await?)
    }

    pub async fn find_segments(&self, query: &[Query]) -> Result<Vec<Segment>, ApiError> {
        Ok(self.engine.find_segments(query).await?)
    }

    /// Exposed for diagnostics/admin tooling sitting above the Request
    /// Surface (e.g. a health endpoint) that needs direct Store access
    /// without going through the engine.
    pub fn store(&self) -> &Arc<SegmentStore> {
        &self.store
    }
}
