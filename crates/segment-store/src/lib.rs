//! Higher-level view over the IPAM Gateway exposing find / find-one /
//! insert / update / delete against *Segments* (spec.md §4.3), grounded on
//! `netbox_query_ops.py` and `netbox_crud_ops.py`.
//!
//! Owns two short-TTL list caches ("all prefixes for this tenant", "all
//! VLANs for this tenant") and the per-(site, vrf) mutex that realizes the
//! atomic-claim primitive the Allocation Engine calls into (spec.md §5).

pub mod error;
pub mod patch;
pub mod projection;

pub use error::StoreError;
pub use patch::{NewSegment, SegmentPatch};

use chrono::{DateTime, Utc};
use segment_cache::{ttl, ReferenceCache};
use segment_core::gateway::{GatewayError, IpamGateway, PrefixWrite, VlanWrite};
use segment_core::query::{matches_all, Query, SegmentField};
use segment_core::vlan_naming::vlan_group_name;
use segment_types::ipam::{NetBoxPrefix, NetBoxStatus, NetBoxVlan};
use segment_types::Segment;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Fixed IPAM role every prefix/VLAN this engine manages is tagged with
/// (spec.md §6's IPAM object model: "role (fixed: `Data`)").
const DATA_ROLE: &str = "Data";

fn parse_ts(raw: &Option<String>) -> Option<DateTime<Utc>> {
    raw.as_ref().and_then(|s| DateTime::parse_from_rfc3339(s).ok()).map(|dt| dt.with_timezone(&Utc))
}

fn vlan_lookup(vlans: &[NetBoxVlan]) -> HashMap<u64, NetBoxVlan> {
    vlans.iter().cloned().map(|v| (v.id, v)).collect()
}

fn build_segment(prefix: &NetBoxPrefix, vlans_by_id: &HashMap<u64, NetBoxVlan>) -> Option<Segment> {
    let vlan = prefix.vlan.as_ref().and_then(|v| vlans_by_id.get(&v.id));
    let site_slug = prefix.scope.as_ref().and_then(|s| s.slug.as_deref());
    let allocated_at = parse_ts(&prefix.custom_fields.allocated_at);
    let released_at = parse_ts(&prefix.custom_fields.released_at);
    projection::project(prefix, vlan, site_slug, allocated_at, released_at)
}

pub struct SegmentStore {
    gateway: Arc<dyn IpamGateway>,
    tenant_name: String,
    prefixes: ReferenceCache<Vec<NetBoxPrefix>, GatewayError>,
    vlans: ReferenceCache<Vec<NetBoxVlan>, GatewayError>,
    /// Per-(site, vrf) single-flight lock realizing the atomic-claim
    /// critical section (spec.md §5): claims on distinct pools never wait
    /// on each other, claims on the same pool are fully serialized.
    claim_locks: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl SegmentStore {
    pub fn new(gateway: Arc<dyn IpamGateway>, tenant_name: impl Into<String>) -> Self {
        Self {
            gateway,
            tenant_name: tenant_name.into(),
            prefixes: ReferenceCache::new(),
            vlans: ReferenceCache::new(),
            claim_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn tenant_id(&self) -> Result<u64, StoreError> {
        Ok(self.gateway.get_tenant_by_name(&self.tenant_name).await?.id)
    }

    async fn cached_prefixes(&self) -> Result<Vec<NetBoxPrefix>, StoreError> {
        let tenant_id = self.tenant_id().await?;
        let gateway = self.gateway.clone();
        Ok(self.prefixes.get_or_fetch("prefixes", ttl::MEDIUM, || async move { gateway.list_prefixes(tenant_id).await }).await?)
    }

    async fn cached_vlans(&self) -> Result<Vec<NetBoxVlan>, StoreError> {
        let tenant_id = self.tenant_id().await?;
        let gateway = self.gateway.clone();
        Ok(self.vlans.get_or_fetch("vlans", ttl::MEDIUM, || async move { gateway.list_vlans(tenant_id).await }).await?)
    }

    async fn invalidate_prefixes(&self) {
        self.prefixes.invalidate("prefixes").await;
    }

    async fn invalidate_vlans(&self) {
        self.vlans.invalidate("vlans").await;
    }

    /// `find(query) -> [Segment]`: checks the cached prefix list first; on
    /// miss, fetches with the tenant scope, caches, and projects. Segments
    /// whose site or vrf cannot be resolved are silently skipped (spec.md
    /// §4.3) — logged once, never surfaced as an error.
    pub async fn find(&self, query: &[Query]) -> Result<Vec<Segment>, StoreError> {
        let prefixes = self.cached_prefixes().await?;
        let vlans = self.cached_vlans().await?;
        let by_id = vlan_lookup(&vlans);

        let mut out = Vec::with_capacity(prefixes.len());
        for prefix in &prefixes {
            match build_segment(prefix, &by_id) {
                Some(segment) if matches_all(query, &segment) => out.push(segment),
                Some(_) => {}
                None => log::warn!("skipping prefix {} with unresolved site-group or vrf", prefix.id),
            }
        }
        Ok(out)
    }

    pub async fn find_one(&self, query: &[Query]) -> Result<Option<Segment>, StoreError> {
        Ok(self.find(query).await?.into_iter().next())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Segment, StoreError> {
        self.find_one(&[Query::Eq(SegmentField::Id, id.to_string())]).await?.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// `insert_one(doc)`: validates (caller's job, see `segment-validate`),
    /// materializes the backing prefix and VLAN, then persists and
    /// invalidates the prefix list cache (spec.md §4.3).
    pub async fn insert_one(&self, new: NewSegment) -> Result<Segment, StoreError> {
        let (tenant, role, site_group, vrf) = tokio::try_join!(
            self.gateway.get_tenant_by_name(&self.tenant_name),
            self.gateway.get_role_by_name(DATA_ROLE),
            self.gateway.get_site_group_by_slug(&new.site),
            self.gateway.get_vrf_by_name(&new.vrf),
        )?;

        let group = self.gateway.get_or_create_vlan_group(&vlan_group_name(&new.vrf, &new.site)).await?;
        let vlan = match self.gateway.find_vlan_by_vid_in_group(group.id, new.vlan_id).await? {
            Some(existing) => existing,
            None => {
                self.gateway
                    .create_vlan(VlanWrite {
                        vid: new.vlan_id,
                        name: new.epg_name.clone(),
                        group_id: group.id,
                        tenant_id: tenant.id,
                        role_id: role.id,
                    })
                    .await?
            }
        };

        let write = PrefixWrite {
            prefix: new.prefix.clone(),
            vrf_id: vrf.id,
            tenant_id: tenant.id,
            role_id: role.id,
            site_group_id: site_group.id,
            vlan_id: Some(vlan.id),
            dhcp: new.dhcp,
            cluster: None,
            reserved: false,
            user_comment: new.description.clone(),
            allocated_at: None,
            released_at: None,
        };
        let prefix = self.gateway.create_prefix(write).await?;
        self.invalidate_prefixes().await;
        self.invalidate_vlans().await;

        let mut by_id = HashMap::new();
        by_id.insert(vlan.id, vlan);
        build_segment(&prefix, &by_id).ok_or_else(|| StoreError::Internal(format!("could not project newly created prefix {}", prefix.id)))
    }

    /// `update_one(id, patch)`: mutates the backing prefix, routing
    /// `vlan_id`/`epg_name`/`vrf` changes through the VLAN↔Segment coupling
    /// rule (spec.md §4.4) before writing the prefix.
    pub async fn update_one(&self, id: &str, patch: SegmentPatch) -> Result<Segment, StoreError> {
        let prefix_id: u64 = id.parse().map_err(|_| StoreError::BadRequest(format!("invalid segment id {id}")))?;
        let current_prefix = self.gateway.get_prefix(prefix_id).await?;
        let current = self.find_by_id(id).await?;

        let new_vrf = patch.vrf.clone().unwrap_or_else(|| current.vrf.clone());
        let new_vlan_id = patch.vlan_id.unwrap_or(current.vlan_id);
        let new_epg = patch.epg_name.clone().unwrap_or_else(|| current.epg_name.clone());
        let new_cidr = patch.prefix.clone().unwrap_or_else(|| current.prefix.clone());
        let new_dhcp = patch.dhcp.unwrap_or(current.dhcp);
        let new_description = patch.description.clone().unwrap_or_else(|| current.description.clone());
        let new_cluster = patch.cluster_name.clone().unwrap_or_else(|| current.cluster_name.clone());
        let new_allocated_at = patch.allocated_at.unwrap_or(current.allocated_at);
        let new_released_at = patch.released_at.unwrap_or(current.released_at);
        let reserved = new_cluster.is_some();

        let (tenant, role) = tokio::try_join!(self.gateway.get_tenant_by_name(&self.tenant_name), self.gateway.get_role_by_name(DATA_ROLE))?;

        let current_vlan_id = current_prefix.vlan.as_ref().map(|v| v.id);
        let vlan_changed = new_vlan_id != current.vlan_id || new_vrf != current.vrf || new_epg != current.epg_name;

        let target_vlan: Option<NetBoxVlan> = if vlan_changed {
            let target_group = self.gateway.get_or_create_vlan_group(&vlan_group_name(&new_vrf, &current.site)).await?;
            let target_vlan = match self.gateway.find_vlan_by_vid_in_group(target_group.id, new_vlan_id).await? {
                Some(existing) if existing.name == new_epg => existing,
                Some(existing) => {
                    self.gateway
                        .update_vlan(
                            existing.id,
                            VlanWrite {
                                vid: new_vlan_id,
                                name: new_epg.clone(),
                                group_id: target_group.id,
                                tenant_id: tenant.id,
                                role_id: role.id,
                            },
                        )
                        .await?
                }
                None => match current_vlan_id {
                    Some(vid) => {
                        self.gateway
                            .update_vlan(
                                vid,
                                VlanWrite {
                                    vid: new_vlan_id,
                                    name: new_epg.clone(),
                                    group_id: target_group.id,
                                    tenant_id: tenant.id,
                                    role_id: role.id,
                                },
                            )
                            .await?
                    }
                    None => {
                        self.gateway
                            .create_vlan(VlanWrite {
                                vid: new_vlan_id,
                                name: new_epg.clone(),
                                group_id: target_group.id,
                                tenant_id: tenant.id,
                                role_id: role.id,
                            })
                            .await?
                    }
                },
            };
            Some(target_vlan)
        } else {
            None
        };
        let target_vlan_id = target_vlan.as_ref().map(|v| v.id).or(current_vlan_id);

        let (site_group, vrf_obj) = tokio::try_join!(self.gateway.get_site_group_by_slug(&current.site), self.gateway.get_vrf_by_name(&new_vrf))?;

        let write = PrefixWrite {
            prefix: new_cidr,
            vrf_id: vrf_obj.id,
            tenant_id: tenant.id,
            role_id: role.id,
            site_group_id: site_group.id,
            vlan_id: target_vlan_id,
            dhcp: new_dhcp,
            cluster: new_cluster,
            reserved,
            user_comment: new_description,
            allocated_at: new_allocated_at,
            released_at: new_released_at,
        };
        let updated_prefix = self.gateway.update_prefix(prefix_id, write).await?;
        self.invalidate_prefixes().await;

        if vlan_changed {
            if let (Some(old_vid), Some(new_vid)) = (current_vlan_id, target_vlan_id) {
                if old_vid != new_vid && !self.gateway.vlan_is_referenced(old_vid).await? {
                    self.gateway.delete_vlan(old_vid).await?;
                }
            }
            self.invalidate_vlans().await;
        }

        // Project off the VLAN object this call itself just wrote/reused
        // rather than re-reading the list cache, which may not yet reflect
        // a rename this same request just made.
        let mut by_id = HashMap::new();
        match target_vlan {
            Some(v) => {
                by_id.insert(v.id, v);
            }
            None => {
                if let Some(id) = current_vlan_id {
                    by_id.insert(id, self.gateway.get_vlan(id).await?);
                }
            }
        }
        build_segment(&updated_prefix, &by_id).ok_or_else(|| StoreError::Internal(format!("could not project updated prefix {}", updated_prefix.id)))
    }

    /// `delete_one(query)`: deletes the prefix first, then the VLAN it
    /// pointed to if no other prefix references it (spec.md §4.3 — order
    /// matters, a VLAN delete while still referenced is rejected by IPAM).
    pub async fn delete_one(&self, id: &str) -> Result<(), StoreError> {
        let prefix_id: u64 = id.parse().map_err(|_| StoreError::BadRequest(format!("invalid segment id {id}")))?;
        let prefix = self.gateway.get_prefix(prefix_id).await?;
        let vlan_id = prefix.vlan.as_ref().map(|v| v.id);

        self.gateway.delete_prefix(prefix_id).await?;
        self.invalidate_prefixes().await;

        if let Some(vid) = vlan_id {
            if !self.gateway.vlan_is_referenced(vid).await? {
                self.gateway.delete_vlan(vid).await?;
                self.invalidate_vlans().await;
            }
        }
        Ok(())
    }

    async fn pool_lock(&self, site: &str, vrf: &str) -> Arc<Mutex<()>> {
        let key = (site.to_string(), vrf.to_string());
        let mut locks = self.claim_locks.lock().await;
        locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// The atomic-claim primitive (spec.md §4.5 step 3 / §5): serialize
    /// per (site, vrf) through a local mutex, pick the smallest-`vlan_id`
    /// available candidate, and attempt to mark it reserved. A post-lock
    /// refetch catches a writer outside this process that won the race;
    /// on that conflict, invalidate and retry up to 3 times.
    pub async fn claim_first_available(&self, site: &str, vrf: &str, cluster: &str, now: DateTime<Utc>) -> Result<Segment, StoreError> {
        let lock = self.pool_lock(site, vrf).await;
        let _guard = lock.lock().await;

        let (tenant, role) = tokio::try_join!(self.gateway.get_tenant_by_name(&self.tenant_name), self.gateway.get_role_by_name(DATA_ROLE))?;

        for attempt in 1..=3 {
            let pool = self.find(&[Query::Eq(SegmentField::Site, site.to_string()), Query::Eq(SegmentField::Vrf, vrf.to_string())]).await?;
            let mut available: Vec<Segment> = pool.into_iter().filter(|s| s.cluster_name.is_none()).collect();
            available.sort_by_key(|s| s.vlan_id);

            let Some(candidate) = available.into_iter().next() else {
                return Err(StoreError::PoolExhausted);
            };

            match self.try_claim(&candidate, cluster, now, tenant.id, role.id).await {
                Ok(segment) => return Ok(segment),
                Err(StoreError::Conflict) => {
                    log::warn!("claim conflict on segment {} ({site}/{vrf}), attempt {attempt}/3", candidate.id);
                    self.invalidate_prefixes().await;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::Conflict)
    }

    async fn try_claim(&self, candidate: &Segment, cluster: &str, now: DateTime<Utc>, tenant_id: u64, role_id: u64) -> Result<Segment, StoreError> {
        let prefix_id: u64 = candidate.id.parse().map_err(|_| StoreError::Internal(format!("non-numeric segment id {}", candidate.id)))?;
        let fresh = self.gateway.get_prefix(prefix_id).await?;

        let already_taken = fresh.custom_fields.cluster.as_ref().map(|c| !c.is_empty()).unwrap_or(false) || fresh.status == NetBoxStatus::Reserved;
        if already_taken {
            return Err(StoreError::Conflict);
        }

        let write = PrefixWrite {
            prefix: fresh.prefix.clone(),
            vrf_id: fresh.vrf.as_ref().map(|v| v.id).ok_or_else(|| StoreError::Internal("prefix missing vrf".into()))?,
            tenant_id,
            role_id,
            site_group_id: fresh.scope.as_ref().map(|s| s.id).ok_or_else(|| StoreError::Internal("prefix missing scope".into()))?,
            vlan_id: fresh.vlan.as_ref().map(|v| v.id),
            dhcp: fresh.custom_fields.dhcp,
            cluster: Some(cluster.to_string()),
            reserved: true,
            user_comment: fresh.comments.clone(),
            allocated_at: Some(now),
            released_at: None,
        };
        let updated = self.gateway.update_prefix(prefix_id, write).await?;
        self.invalidate_prefixes().await;

        let vlans = self.cached_vlans().await?;
        let by_id = vlan_lookup(&vlans);
        build_segment(&updated, &by_id).ok_or_else(|| StoreError::Internal(format!("could not project claimed prefix {}", updated.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use segment_types::ipam::{NetBoxNested, NetBoxRole, NetBoxSiteGroup, NetBoxTenant, NetBoxVlanGroup, NetBoxVrf, PrefixCustomFields};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex as StdMutex;

    mockall::mock! {
        Gateway {}

        #[async_trait]
        impl IpamGateway for Gateway {
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
            async fn vlan_is_referenced(&self, vlan_id: u64) -> Result<bool, GatewayError>;
            async fn get_or_create_vlan_group(&self, name: &str) -> Result<NetBoxVlanGroup, GatewayError>;
            async fn get_tenant_by_name(&self, name: &str) -> Result<NetBoxTenant, GatewayError>;
            async fn get_role_by_name(&self, name: &str) -> Result<NetBoxRole, GatewayError>;
            async fn get_site_group_by_slug(&self, slug: &str) -> Result<NetBoxSiteGroup, GatewayError>;
            async fn get_vrf_by_name(&self, name: &str) -> Result<NetBoxVrf, GatewayError>;
            async fn list_vrfs(&self) -> Result<Vec<NetBoxVrf>, GatewayError>;
            async fn list_site_groups(&self) -> Result<Vec<NetBoxSiteGroup>, GatewayError>;
            async fn ping(&self) -> Result<(), GatewayError>;
        }
    }

    fn nested(id: u64, name: &str, slug: &str) -> NetBoxNested {
        NetBoxNested { id, name: Some(name.to_string()), slug: Some(slug.to_string()) }
    }

    fn base_prefix(id: u64, vlan_id: u64, vid: u16, cluster: Option<&str>) -> NetBoxPrefix {
        NetBoxPrefix {
            id,
            prefix: format!("10.0.{id}.0/24"),
            status: if cluster.is_some() { NetBoxStatus::Reserved } else { NetBoxStatus::Active },
            vrf: Some(nested(1, "Network1", "network1")),
            tenant: Some(nested(1, "acme", "acme")),
            role: Some(nested(1, "Data", "data")),
            scope_type: Some("dcim.sitegroup".into()),
            scope_id: Some(1),
            scope: Some(nested(1, "Site1", "site1")),
            vlan: Some(NetBoxNested { id: vlan_id, name: None, slug: None }),
            comments: String::new(),
            description: String::new(),
            custom_fields: PrefixCustomFields { dhcp: false, cluster: cluster.map(|s| s.to_string()), allocated_at: None, released_at: None },
        }
    }

    fn base_vlan(id: u64, vid: u16, name: &str) -> NetBoxVlan {
        NetBoxVlan { id, vid, name: name.to_string(), group: Some(nested(1, "g", "g")), tenant: Some(nested(1, "acme", "acme")), role: Some(nested(1, "Data", "data")), status: NetBoxStatus::Active }
    }

    fn common_refs(gateway: &mut MockGateway) {
        gateway.expect_get_tenant_by_name().returning(|_| Ok(NetBoxTenant { id: 1, name: "acme".into(), slug: "acme".into() }));
        gateway.expect_get_role_by_name().returning(|_| Ok(NetBoxRole { id: 1, name: "Data".into(), slug: "data".into() }));
        gateway.expect_get_site_group_by_slug().returning(|_| Ok(NetBoxSiteGroup { id: 1, name: "Site1".into(), slug: "site1".into() }));
        gateway.expect_get_vrf_by_name().returning(|_| Ok(NetBoxVrf { id: 1, name: "Network1".into() }));
    }

    #[tokio::test]
    async fn find_skips_unresolvable_and_applies_query() {
        let mut gateway = MockGateway::new();
        gateway.expect_list_prefixes().returning(|_| {
            Ok(vec![
                base_prefix(1, 10, 100, None),
                base_prefix(2, 11, 101, Some("web-01")),
                NetBoxPrefix { scope: None, ..base_prefix(3, 12, 102, None) },
            ])
        });
        gateway.expect_list_vlans().returning(|_| Ok(vec![base_vlan(10, 100, "a"), base_vlan(11, 101, "b"), base_vlan(12, 102, "c")]));

        let store = SegmentStore::new(Arc::new(gateway), "acme");
        let all = store.find(&[]).await.unwrap();
        assert_eq!(all.len(), 2, "the unresolvable-site prefix must be silently skipped");

        let available = store.find(&[Query::Eq(SegmentField::ClusterName, "web-01".into())]).await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].vlan_id, 101);
    }

    #[tokio::test]
    async fn claim_first_available_picks_smallest_vlan_id() {
        let mut gateway = MockGateway::new();
        common_refs(&mut gateway);
        gateway.expect_list_prefixes().returning(|_| Ok(vec![base_prefix(2, 11, 101, None), base_prefix(1, 10, 100, None)]));
        gateway.expect_list_vlans().returning(|_| Ok(vec![base_vlan(10, 100, "a"), base_vlan(11, 101, "b")]));
        gateway.expect_get_prefix().withf(|id| *id == 1).returning(|_| Ok(base_prefix(1, 10, 100, None)));
        gateway
            .expect_update_prefix()
            .withf(|id, write| *id == 1 && write.cluster.as_deref() == Some("web-01"))
            .returning(|_, _| Ok(base_prefix(1, 10, 100, Some("web-01"))));

        let store = SegmentStore::new(Arc::new(gateway), "acme");
        let now = Utc::now();
        let claimed = store.claim_first_available("site1", "Network1", "web-01", now).await.unwrap();
        assert_eq!(claimed.vlan_id, 100);
    }

    #[tokio::test]
    async fn claim_retries_on_conflict_then_succeeds_on_next_candidate() {
        let mut gateway = MockGateway::new();
        common_refs(&mut gateway);
        let call_count = Arc::new(AtomicU64::new(0));
        let call_count_clone = call_count.clone();
        gateway.expect_list_prefixes().returning(move |_| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(vec![base_prefix(1, 10, 100, None), base_prefix(2, 11, 101, None)])
        });
        gateway.expect_list_vlans().returning(|_| Ok(vec![base_vlan(10, 100, "a"), base_vlan(11, 101, "b")]));
        // Segment 1 looked "available" from the cache but was already claimed by another process.
        gateway.expect_get_prefix().withf(|id| *id == 1).returning(|_| Ok(base_prefix(1, 10, 100, Some("other"))));
        gateway.expect_get_prefix().withf(|id| *id == 2).returning(|_| Ok(base_prefix(2, 11, 101, None)));
        gateway.expect_update_prefix().withf(|id, _| *id == 2).returning(|_, _| Ok(base_prefix(2, 11, 101, Some("web-01"))));

        let store = SegmentStore::new(Arc::new(gateway), "acme");
        let claimed = store.claim_first_available("site1", "Network1", "web-01", Utc::now()).await.unwrap();
        assert_eq!(claimed.vlan_id, 101);
        assert!(call_count.load(Ordering::SeqCst) >= 2, "a conflict must force a prefix-list refetch");
    }

    #[tokio::test]
    async fn claim_exhausted_pool_returns_pool_exhausted() {
        let mut gateway = MockGateway::new();
        common_refs(&mut gateway);
        gateway.expect_list_prefixes().returning(|_| Ok(vec![base_prefix(1, 10, 100, Some("x"))]));
        gateway.expect_list_vlans().returning(|_| Ok(vec![base_vlan(10, 100, "a")]));

        let store = SegmentStore::new(Arc::new(gateway), "acme");
        let err = store.claim_first_available("site1", "Network1", "web-01", Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::PoolExhausted));
    }

    #[tokio::test]
    async fn update_one_relabels_vlan_without_creating_a_new_one() {
        let mut gateway = MockGateway::new();
        common_refs(&mut gateway);
        gateway.expect_list_prefixes().returning(|_| Ok(vec![base_prefix(1, 10, 22, Some("c"))]));
        gateway.expect_list_vlans().returning(|_| Ok(vec![base_vlan(10, 22, "A")]));
        gateway.expect_get_prefix().returning(|_| Ok(base_prefix(1, 10, 22, Some("c"))));
        gateway.expect_get_or_create_vlan_group().returning(|name| Ok(NetBoxVlanGroup { id: 1, name: name.to_string(), slug: "g".into() }));
        gateway.expect_find_vlan_by_vid_in_group().returning(|_, _| Ok(Some(base_vlan(10, 22, "A"))));
        gateway.expect_update_vlan().withf(|id, write| *id == 10 && write.name == "B").returning(|_, w| Ok(base_vlan(10, w.vid, &w.name)));
        gateway.expect_update_prefix().returning(|_, w| Ok(base_prefix(1, 10, 22, w.cluster.as_deref())));

        let store = SegmentStore::new(Arc::new(gateway), "acme");
        let patch = SegmentPatch { epg_name: Some("B".to_string()), ..Default::default() };
        let updated = store.update_one("1", patch).await.unwrap();
        assert_eq!(updated.epg_name, "B");
        assert_eq!(updated.vlan_id, 22);
    }

    #[tokio::test]
    async fn delete_one_removes_prefix_then_gcs_unreferenced_vlan() {
        let mut gateway = MockGateway::new();
        gateway.expect_get_prefix().returning(|_| Ok(base_prefix(1, 10, 100, None)));
        let deleted_prefix = Arc::new(StdMutex::new(false));
        let dp = deleted_prefix.clone();
        gateway.expect_delete_prefix().returning(move |_| {
            *dp.lock().unwrap() = true;
            Ok(())
        });
        gateway.expect_vlan_is_referenced().returning(|_| Ok(false));
        gateway.expect_delete_vlan().withf(|id| *id == 10).returning(|_| Ok(()));

        let store = SegmentStore::new(Arc::new(gateway), "acme");
        store.delete_one("1").await.unwrap();
        assert!(*deleted_prefix.lock().unwrap());
    }
}
