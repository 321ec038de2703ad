//! The seam between `segment-store` (and, transitively, the allocation
//! engine) and whatever backs the remote IPAM. `segment-gateway` is the
//! only crate that implements this trait today (against NetBox), following
//! the shape of `sdn-core::ipam::IpamPlugin` but narrowed to the single
//! IPAM-of-record this spec assumes — no multi-backend registry.

use async_trait::async_trait;
use segment_types::ipam::{NetBoxPrefix, NetBoxRole, NetBoxSiteGroup, NetBoxTenant, NetBoxVlan, NetBoxVlanGroup, NetBoxVrf};
use thiserror::Error;

/// Semantic failure taxonomy for IPAM calls (spec.md §4.1). `Network`/
/// `Serialization` carry the underlying transport error for the retry
/// combinator to inspect; everything else is a classified HTTP outcome.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("server error: {0}")]
    ServerError(String),
    #[error("timed out calling IPAM: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl GatewayError {
    /// Idempotent network-class failures are the only ones the retry
    /// combinator is allowed to replay (spec.md §4.1/§7).
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Network(_) | GatewayError::Timeout(_))
    }
}

/// Fields needed to create or update a prefix. `cluster` mirrors the
/// `Cluster` custom field; `status` drives `active`/`reserved`.
#[derive(Debug, Clone)]
pub struct PrefixWrite {
    pub prefix: String,
    pub vrf_id: u64,
    pub tenant_id: u64,
    pub role_id: u64,
    pub site_group_id: u64,
    pub vlan_id: Option<u64>,
    pub dhcp: bool,
    pub cluster: Option<String>,
    pub reserved: bool,
    /// User-facing free text (`Segment::description`), written to the
    /// prefix's `comments` field — never to `description`, which is a
    /// machine-owned mirror of `cluster` presentation (spec.md §6).
    pub user_comment: String,
    pub allocated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub released_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone)]
pub struct VlanWrite {
    pub vid: u16,
    pub name: String,
    pub group_id: u64,
    pub tenant_id: u64,
    pub role_id: u64,
}

#[async_trait]
pub trait IpamGateway: Send + Sync {
    async fn list_prefixes(&self, tenant_id: u64) -> Result<Vec<NetBoxPrefix>, GatewayError>;
    async fn list_vlans(&self, tenant_id: u64) -> Result<Vec<NetBoxVlan>, GatewayError>;
    async fn get_prefix(&self, id: u64) -> Result<NetBoxPrefix, GatewayError>;
    async fn create_prefix(&self, write: PrefixWrite) -> Result<NetBoxPrefix, GatewayError>;
    async fn update_prefix(&self, id: u64, write: PrefixWrite) -> Result<NetBoxPrefix, GatewayError>;
    async fn delete_prefix(&self, id: u64) -> Result<(), GatewayError>;

    async fn find_vlan_by_vid_in_group(&self, group_id: u64, vid: u16) -> Result<Option<NetBoxVlan>, GatewayError>;
    async fn find_vlan_by_vid(&self, vid: u16) -> Result<Option<NetBoxVlan>, GatewayError>;
    async fn get_vlan(&self, id: u64) -> Result<NetBoxVlan, GatewayError>;
    async fn create_vlan(&self, write: VlanWrite) -> Result<NetBoxVlan, GatewayError>;
    async fn update_vlan(&self, id: u64, write: VlanWrite) -> Result<NetBoxVlan, GatewayError>;
    async fn delete_vlan(&self, id: u64) -> Result<(), GatewayError>;
    /// Whether any prefix still references this VLAN (used for GC).
    async fn vlan_is_referenced(&self, vlan_id: u64) -> Result<bool, GatewayError>;

    async fn get_or_create_vlan_group(&self, name: &str) -> Result<NetBoxVlanGroup, GatewayError>;

    async fn get_tenant_by_name(&self, name: &str) -> Result<NetBoxTenant, GatewayError>;
    async fn get_role_by_name(&self, name: &str) -> Result<NetBoxRole, GatewayError>;
    async fn get_site_group_by_slug(&self, slug: &str) -> Result<NetBoxSiteGroup, GatewayError>;
    async fn get_vrf_by_name(&self, name: &str) -> Result<NetBoxVrf, GatewayError>;
    async fn list_vrfs(&self) -> Result<Vec<NetBoxVrf>, GatewayError>;
    async fn list_site_groups(&self) -> Result<Vec<NetBoxSiteGroup>, GatewayError>;

    /// IPAM reachability probe used by the startup contract (spec.md §6).
    async fn ping(&self) -> Result<(), GatewayError>;
}
