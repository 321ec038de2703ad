//! NetBox REST adapter, grounded on `sdn-drivers/src/ipam/netbox.rs`'s
//! `NetBoxIpam`: a `reqwest::Client`, a generic `api_request<T>` helper, and
//! one method per IPAM object kind. Extended here with the bounded
//! read/write pools, timing, and retry combinators spec.md §4.1 calls for.

use crate::pool::WorkerPools;
use crate::retry::{with_retry, RetryPolicy};
use crate::timing::with_timing;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use segment_cache::{ttl, ReferenceCache};
use segment_core::gateway::{GatewayError, IpamGateway, PrefixWrite, VlanWrite};
use segment_types::ipam::{NetBoxPrefix, NetBoxResponse, NetBoxRole, NetBoxSiteGroup, NetBoxTenant, NetBoxVlan, NetBoxVlanGroup, NetBoxVrf};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

pub struct NetBoxGateway {
    client: Client,
    base_url: String,
    token: String,
    pools: WorkerPools,
    tenant_cache: ReferenceCache<NetBoxTenant, GatewayError>,
    role_cache: ReferenceCache<NetBoxRole, GatewayError>,
    vrf_cache: ReferenceCache<NetBoxVrf, GatewayError>,
    site_group_cache: ReferenceCache<NetBoxSiteGroup, GatewayError>,
    vlan_group_cache: ReferenceCache<NetBoxVlanGroup, GatewayError>,
}

impl NetBoxGateway {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, ssl_verify: bool) -> Self {
        let client = Client::builder()
            .danger_accept_invalid_certs(!ssl_verify)
            .build()
            .expect("reqwest client builds with static config");
        Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
            pools: WorkerPools::default(),
            tenant_cache: ReferenceCache::new(),
            role_cache: ReferenceCache::new(),
            vrf_cache: ReferenceCache::new(),
            site_group_cache: ReferenceCache::new(),
            vlan_group_cache: ReferenceCache::new(),
        }
    }

    fn status_to_error(status: StatusCode, body: String) -> GatewayError {
        match status {
            StatusCode::UNAUTHORIZED => GatewayError::Unauthorized,
            StatusCode::FORBIDDEN => GatewayError::Forbidden(body),
            StatusCode::NOT_FOUND => GatewayError::NotFound(body),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => GatewayError::BadRequest(body),
            s if s.is_server_error() => GatewayError::ServerError(body),
            s => GatewayError::ServerError(format!("unexpected status {s}: {body}")),
        }
    }

    async fn api_request<T: DeserializeOwned>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, GatewayError> {
        let url = format!("{}/api{}", self.base_url, path);
        let mut req = self.client.request(method, &url).header("Authorization", format!("Token {}", self.token));
        if let Some(body) = &body {
            req = req.json(body);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout(e.to_string())
            } else {
                GatewayError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::status_to_error(status, text));
        }
        response.json::<T>().await.map_err(|e| GatewayError::Serialization(e.to_string()))
    }

    async fn get_read<T: DeserializeOwned>(&self, name: &str, path: &str) -> Result<T, GatewayError> {
        let _permit = self.pools.acquire_read().await;
        with_retry(RetryPolicy::default(), || with_timing(name, || self.api_request(Method::GET, path, None))).await
    }

    async fn write<T: DeserializeOwned>(&self, name: &str, method: Method, path: &str, body: Value) -> Result<T, GatewayError> {
        let _permit = self.pools.acquire_write().await;
        with_timing(name, || self.api_request(method, path, Some(body))).await
    }

    /// `write`, but retried on the same idempotent-network-failure budget as
    /// `get_read` (spec.md §4.1: "the pure-create of a VLAN/VLAN-group that
    /// checks 'exists' first"). Only the two call sites that check existence
    /// before creating go through this path; every other write stays
    /// unretried since it may have already changed state.
    async fn write_idempotent_create<T: DeserializeOwned + Clone>(&self, name: &str, path: &str, body: Value) -> Result<T, GatewayError> {
        with_retry(RetryPolicy::default(), || async {
            let body = body.clone();
            let _permit = self.pools.acquire_write().await;
            with_timing(name, || self.api_request(Method::POST, path, Some(body))).await
        })
        .await
    }

    fn prefix_body(write: &PrefixWrite) -> Value {
        let mut custom_fields = json!({ "DHCP": write.dhcp });
        custom_fields["Cluster"] = write.cluster.as_ref().map(|c| json!(c)).unwrap_or(Value::Null);
        custom_fields["AllocatedAt"] = write.allocated_at.map(|t| json!(t.to_rfc3339())).unwrap_or(Value::Null);
        custom_fields["ReleasedAt"] = write.released_at.map(|t| json!(t.to_rfc3339())).unwrap_or(Value::Null);
        let description_mirror = match &write.cluster {
            Some(cluster) if write.reserved => format!("Cluster: {cluster}"),
            _ => String::new(),
        };
        json!({
            "prefix": write.prefix,
            "vrf": write.vrf_id,
            "tenant": write.tenant_id,
            "role": write.role_id,
            "scope_type": "dcim.sitegroup",
            "scope_id": write.site_group_id,
            "vlan": write.vlan_id,
            "status": if write.reserved { "reserved" } else { "active" },
            "comments": write.user_comment,
            "description": description_mirror,
            "custom_fields": custom_fields,
        })
    }
}

#[async_trait]
impl IpamGateway for NetBoxGateway {
    async fn list_prefixes(&self, tenant_id: u64) -> Result<Vec<NetBoxPrefix>, GatewayError> {
        let path = format!("/ipam/prefixes/?tenant_id={tenant_id}&limit=0");
        let resp: NetBoxResponse<NetBoxPrefix> = self.get_read("list_prefixes", &path).await?;
        Ok(resp.results.unwrap_or_default())
    }

    async fn get_prefix(&self, id: u64) -> Result<NetBoxPrefix, GatewayError> {
        self.get_read("get_prefix", &format!("/ipam/prefixes/{id}/")).await
    }

    async fn list_vlans(&self, tenant_id: u64) -> Result<Vec<NetBoxVlan>, GatewayError> {
        let path = format!("/ipam/vlans/?tenant_id={tenant_id}&limit=0");
        let resp: NetBoxResponse<NetBoxVlan> = self.get_read("list_vlans", &path).await?;
        Ok(resp.results.unwrap_or_default())
    }

    async fn create_prefix(&self, write: PrefixWrite) -> Result<NetBoxPrefix, GatewayError> {
        let body = Self::prefix_body(&write);
        self.write("create_prefix", Method::POST, "/ipam/prefixes/", body).await
    }

    async fn update_prefix(&self, id: u64, write: PrefixWrite) -> Result<NetBoxPrefix, GatewayError> {
        let body = Self::prefix_body(&write);
        self.write("update_prefix", Method::PATCH, &format!("/ipam/prefixes/{id}/"), body).await
    }

    async fn delete_prefix(&self, id: u64) -> Result<(), GatewayError> {
        let _permit = self.pools.acquire_write().await;
        with_timing("delete_prefix", || async {
            self.api_request::<Value>(Method::DELETE, &format!("/ipam/prefixes/{id}/"), None).await.or_else(|e| match e {
                GatewayError::Serialization(_) => Ok(Value::Null),
                other => Err(other),
            })
        })
        .await?;
        Ok(())
    }

    async fn find_vlan_by_vid_in_group(&self, group_id: u64, vid: u16) -> Result<Option<NetBoxVlan>, GatewayError> {
        let path = format!("/ipam/vlans/?group_id={group_id}&vid={vid}");
        let resp: NetBoxResponse<NetBoxVlan> = self.get_read("find_vlan_in_group", &path).await?;
        Ok(resp.results.unwrap_or_default().into_iter().next())
    }

    async fn find_vlan_by_vid(&self, vid: u16) -> Result<Option<NetBoxVlan>, GatewayError> {
        let path = format!("/ipam/vlans/?vid={vid}");
        let resp: NetBoxResponse<NetBoxVlan> = self.get_read("find_vlan_by_vid", &path).await?;
        Ok(resp.results.unwrap_or_default().into_iter().next())
    }

    async fn get_vlan(&self, id: u64) -> Result<NetBoxVlan, GatewayError> {
        self.get_read("get_vlan", &format!("/ipam/vlans/{id}/")).await
    }

    async fn create_vlan(&self, write: VlanWrite) -> Result<NetBoxVlan, GatewayError> {
        let body = json!({
            "vid": write.vid,
            "name": write.name,
            "group": write.group_id,
            "tenant": write.tenant_id,
            "role": write.role_id,
            "status": "active",
        });
        self.write_idempotent_create("create_vlan", "/ipam/vlans/", body).await
    }

    async fn update_vlan(&self, id: u64, write: VlanWrite) -> Result<NetBoxVlan, GatewayError> {
        let body = json!({
            "vid": write.vid,
            "name": write.name,
            "group": write.group_id,
            "tenant": write.tenant_id,
            "role": write.role_id,
        });
        self.write("update_vlan", Method::PATCH, &format!("/ipam/vlans/{id}/"), body).await
    }

    async fn delete_vlan(&self, id: u64) -> Result<(), GatewayError> {
        let _permit = self.pools.acquire_write().await;
        with_timing("delete_vlan", || async {
            self.api_request::<Value>(Method::DELETE, &format!("/ipam/vlans/{id}/"), None).await.or_else(|e| match e {
                GatewayError::Serialization(_) => Ok(Value::Null),
                other => Err(other),
            })
        })
        .await?;
        Ok(())
    }

    async fn vlan_is_referenced(&self, vlan_id: u64) -> Result<bool, GatewayError> {
        let path = format!("/ipam/prefixes/?vlan_id={vlan_id}&limit=1");
        let resp: NetBoxResponse<NetBoxPrefix> = self.get_read("vlan_is_referenced", &path).await?;
        Ok(resp.count.unwrap_or(0) > 0)
    }

    async fn get_or_create_vlan_group(&self, name: &str) -> Result<NetBoxVlanGroup, GatewayError> {
        let key = name.to_string();
        self.vlan_group_cache
            .get_or_fetch(&key, ttl::LONG, || async {
                let slug = segment_core::sanitize_slug(name);
                let path = format!("/ipam/vlan-groups/?name={}", urlencoding::encode(name));
                let resp: NetBoxResponse<NetBoxVlanGroup> = with_retry(RetryPolicy::default(), || self.get_read("find_vlan_group", &path)).await?;
                if let Some(existing) = resp.results.and_then(|mut r| r.pop()) {
                    return Ok(existing);
                }
                let body = json!({ "name": name, "slug": slug });
                self.write_idempotent_create("create_vlan_group", "/ipam/vlan-groups/", body).await
            })
            .await
    }

    async fn get_tenant_by_name(&self, name: &str) -> Result<NetBoxTenant, GatewayError> {
        let key = name.to_string();
        self.tenant_cache
            .get_or_fetch(&key, ttl::LONG, || async {
                let path = format!("/tenancy/tenants/?name={}", urlencoding::encode(name));
                let resp: NetBoxResponse<NetBoxTenant> = self.get_read("get_tenant", &path).await?;
                resp.results
                    .and_then(|mut r| r.pop())
                    .ok_or_else(|| GatewayError::NotFound(format!("tenant {name}")))
            })
            .await
    }

    async fn get_role_by_name(&self, name: &str) -> Result<NetBoxRole, GatewayError> {
        let key = name.to_string();
        self.role_cache
            .get_or_fetch(&key, ttl::LONG, || async {
                let path = format!("/ipam/roles/?name={}", urlencoding::encode(name));
                let resp: NetBoxResponse<NetBoxRole> = self.get_read("get_role", &path).await?;
                resp.results
                    .and_then(|mut r| r.pop())
                    .ok_or_else(|| GatewayError::NotFound(format!("role {name}")))
            })
            .await
    }

    async fn get_site_group_by_slug(&self, slug: &str) -> Result<NetBoxSiteGroup, GatewayError> {
        let key = slug.to_string();
        self.site_group_cache
            .get_or_fetch(&key, ttl::LONG, || async {
                let path = format!("/dcim/site-groups/?slug={}", urlencoding::encode(slug));
                let resp: NetBoxResponse<NetBoxSiteGroup> = self.get_read("get_site_group", &path).await?;
                resp.results
                    .and_then(|mut r| r.pop())
                    .ok_or_else(|| GatewayError::BadRequest(format!("unknown site-group {slug}")))
            })
            .await
    }

    async fn get_vrf_by_name(&self, name: &str) -> Result<NetBoxVrf, GatewayError> {
        let key = name.to_string();
        self.vrf_cache
            .get_or_fetch(&key, ttl::LONG, || async {
                let path = format!("/ipam/vrfs/?name={}", urlencoding::encode(name));
                let resp: NetBoxResponse<NetBoxVrf> = self.get_read("get_vrf", &path).await?;
                resp.results
                    .and_then(|mut r| r.pop())
                    .ok_or_else(|| GatewayError::BadRequest(format!("unknown vrf {name}")))
            })
            .await
    }

    async fn list_vrfs(&self) -> Result<Vec<NetBoxVrf>, GatewayError> {
        let resp: NetBoxResponse<NetBoxVrf> = self.get_read("list_vrfs", "/ipam/vrfs/?limit=0").await?;
        Ok(resp.results.unwrap_or_default())
    }

    async fn list_site_groups(&self) -> Result<Vec<NetBoxSiteGroup>, GatewayError> {
        let resp: NetBoxResponse<NetBoxSiteGroup> = self.get_read("list_site_groups", "/dcim/site-groups/?limit=0").await?;
        Ok(resp.results.unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        match self.get_read::<Value>("ping", "/status/").await {
            Ok(_) => Ok(()),
            Err(GatewayError::Serialization(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
