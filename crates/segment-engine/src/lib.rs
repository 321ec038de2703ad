//! The core algorithm (spec.md §4.5): idempotent allocation, atomic claim
//! of the smallest free VLAN in a pool, shared-lease-aware release, and the
//! admin CRUD paths layered over `segment-validate` + `segment-store`.
//! Grounded on `allocation_service.py` (request-level flow) and
//! `allocation_utils.py` (`find_existing_allocation`,
//! `find_and_allocate_segment`, `release_segment`).

pub mod allocation;
pub mod error;

pub use allocation::{Allocation, ReleaseOutcome};
pub use error::EngineError;

use chrono::Utc;
use segment_core::query::{cluster_membership_query, Query, SegmentField};
use segment_store::{NewSegment, SegmentPatch, SegmentStore};
use segment_types::{Segment, SegmentUpdate};
use segment_validate::Validator;
use std::sync::Arc;

pub struct AllocationEngine {
    store: Arc<SegmentStore>,
    validator: Arc<Validator>,
}

impl AllocationEngine {
    pub fn new(store: Arc<SegmentStore>, validator: Arc<Validator>) -> Self {
        Self { store, validator }
    }

    fn active_lease_query(cluster: &str, site: &str, vrf: &str) -> Vec<Query> {
        vec![
            Query::Eq(SegmentField::Site, site.to_string()),
            Query::Eq(SegmentField::Vrf, vrf.to_string()),
            Query::Eq(SegmentField::Released, false.to_string()),
            cluster_membership_query(cluster),
        ]
    }

    /// Step 1-5 of spec.md §4.5. An existing lease for `cluster` at
    /// `(site, vrf)` is returned unchanged, without touching IPAM
    /// (edge-case policy iv: re-allocating a held cluster is a no-op).
    pub async fn allocate(&self, cluster: &str, site: &str, vrf: &str) -> Result<Allocation, EngineError> {
        self.validator.validate_site(site)?;
        self.validator.validate_cluster_token(cluster)?;
        self.validator.validate_vrf(vrf).await?;

        if let Some(existing) = self.store.find_one(&Self::active_lease_query(cluster, site, vrf)).await? {
            return Ok(Allocation::from_segment(existing, cluster));
        }

        let claimed = self.store.claim_first_available(site, vrf, cluster, Utc::now()).await?;
        Ok(Allocation::from_segment(claimed, cluster))
    }

    /// spec.md §4.5 `release`: remove `cluster` from the lease's token
    /// list; a full release (the last token) stamps `released_at` and
    /// returns the segment to the pool, a shared lease just shrinks.
    pub async fn release(&self, cluster: &str, site: &str, vrf: &str) -> Result<ReleaseOutcome, EngineError> {
        self.validator.validate_site(site)?;
        self.validator.validate_cluster_token(cluster)?;

        let segment = self
            .store
            .find_one(&Self::active_lease_query(cluster, site, vrf))
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("no active lease for cluster '{cluster}' in {vrf}/{site}")))?;

        let tokens = segment.cluster_tokens();
        if tokens.len() <= 1 {
            self.store.update_one(&segment.id, SegmentPatch::full_release(Utc::now())).await?;
            Ok(ReleaseOutcome::FullyReleased)
        } else {
            let remaining: Vec<String> = tokens.into_iter().filter(|t| t != cluster).collect();
            self.store.update_one(&segment.id, SegmentPatch::partial_release(&remaining.join(","))).await?;
            Ok(ReleaseOutcome::PartiallyReleased { remaining })
        }
    }

    /// Admin CRUD: create. Runs the full validation pipeline (spec.md
    /// §4.6) against the current inventory before materializing anything
    /// in IPAM.
    pub async fn create_segment(&self, new: NewSegment) -> Result<Segment, EngineError> {
        self.validator.validate_vrf(&new.vrf).await?;
        let existing = self.store.find(&[]).await?;
        self.validator.validate_new_segment(&new.site, &new.vrf, new.vlan_id, &new.epg_name, &new.prefix, &new.description, &existing, None)?;
        Ok(self.store.insert_one(new).await?)
    }

    /// Admin CRUD: update. Revalidates the segment's prospective final
    /// state (unknown fields inherited from the current record), excluding
    /// its own id from the overlap/uniqueness checks.
    pub async fn update_segment(&self, id: &str, update: SegmentUpdate) -> Result<Segment, EngineError> {
        let current = self.store.find_by_id(id).await?;

        let new_vrf = update.vrf.clone().unwrap_or_else(|| current.vrf.clone());
        let new_vlan_id = update.vlan_id.unwrap_or(current.vlan_id);
        let new_epg = update.epg_name.clone().unwrap_or_else(|| current.epg_name.clone());
        let new_prefix = update.prefix.clone().unwrap_or_else(|| current.prefix.clone());
        let new_description = update.description.clone().unwrap_or_else(|| current.description.clone());

        if let Some(vrf) = &update.vrf {
            self.validator.validate_vrf(vrf).await?;
        }

        let existing = self.store.find(&[]).await?;
        self.validator
            .validate_new_segment(&current.site, &new_vrf, new_vlan_id, &new_epg, &new_prefix, &new_description, &existing, Some(id))?;

        Ok(self.store.update_one(id, SegmentPatch::from(update)).await?)
    }

    /// Admin CRUD: delete. Only permitted while the segment is available
    /// (spec.md §3 "Lifecycle" — "Delete: admin-only and only while
    /// available").
    pub async fn delete_segment(&self, id: &str) -> Result<(), EngineError> {
        let current = self.store.find_by_id(id).await?;
        if let Some(cluster) = &current.cluster_name {
            return Err(EngineError::BadRequest(format!("cannot delete segment {id}: reserved by '{cluster}'")));
        }
        Ok(self.store.delete_one(id).await?)
    }

    pub async fn find_segments(&self, query: &[Query]) -> Result<Vec<Segment>, EngineError> {
        Ok(self.store.find(query).await?)
    }
}
