//! Write-shaped payloads the Store accepts: a closed `NewSegment` for
//! `insert_one` and a closed `SegmentPatch` for `update_one`, replacing the
//! source's untyped `$set` map (spec.md §9's "untyped mapping-based
//! queries" note applies equally to updates — `validate_update_data`'s
//! key blocklist in `original_source/src/validators.py` becomes unnecessary
//! once writers can only construct these two shapes).

use chrono::{DateTime, Utc};
use segment_types::SegmentUpdate;

/// Fields required to admit a brand-new, available segment (admin CRUD
/// create, spec.md §3 "Create").
#[derive(Debug, Clone)]
pub struct NewSegment {
    pub site: String,
    pub vrf: String,
    pub vlan_id: u16,
    pub epg_name: String,
    pub prefix: String,
    pub dhcp: bool,
    pub description: String,
}

/// Closed update payload, a superset of the admin-facing `SegmentUpdate`
/// plus the internal fields the Allocation Engine writes (`cluster_name`,
/// `allocated_at`, `released_at`). `Option<Option<T>>`: outer `None` means
/// "leave unchanged", inner `None` means "clear the field".
#[derive(Debug, Clone, Default)]
pub struct SegmentPatch {
    pub vrf: Option<String>,
    pub vlan_id: Option<u16>,
    pub epg_name: Option<String>,
    pub prefix: Option<String>,
    pub dhcp: Option<bool>,
    pub description: Option<String>,
    pub cluster_name: Option<Option<String>>,
    pub allocated_at: Option<Option<DateTime<Utc>>>,
    pub released_at: Option<Option<DateTime<Utc>>>,
}

impl From<SegmentUpdate> for SegmentPatch {
    fn from(update: SegmentUpdate) -> Self {
        Self {
            vrf: update.vrf,
            vlan_id: update.vlan_id,
            epg_name: update.epg_name,
            prefix: update.prefix,
            dhcp: update.dhcp,
            description: update.description,
            cluster_name: None,
            allocated_at: None,
            released_at: None,
        }
    }
}

impl SegmentPatch {
    /// The patch `claim_first_available` writes to move a segment from
    /// available to reserved (spec.md §4.5 step 3).
    pub fn claim(cluster: &str, now: DateTime<Utc>) -> Self {
        Self {
            cluster_name: Some(Some(cluster.to_string())),
            allocated_at: Some(Some(now)),
            released_at: Some(None),
            ..Self::default()
        }
    }

    /// The patch a full release writes (spec.md §4.5 step 3's "otherwise"
    /// branch, full-release case).
    pub fn full_release(now: DateTime<Utc>) -> Self {
        Self {
            cluster_name: Some(None),
            released_at: Some(Some(now)),
            ..Self::default()
        }
    }

    /// The patch a partial release of a shared lease writes: remaining
    /// tokens rejoined, lease stays held.
    pub fn partial_release(remaining: &str) -> Self {
        Self {
            cluster_name: Some(Some(remaining.to_string())),
            ..Self::default()
        }
    }
}
