use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The unit of allocation: one (vrf, site, vlan_id, prefix) tuple.
///
/// Mirrors the projection rules a gateway builds from a NetBox prefix + its
/// linked VLAN: `status` and `released` are kept in sync by construction
/// (I5), and `cluster_name == ""` never appears here — it is normalized to
/// `None` by the gateway on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub site: String,
    pub vrf: String,
    pub vlan_id: u16,
    pub epg_name: String,
    pub prefix: String,
    pub dhcp: bool,
    pub description: String,
    pub cluster_name: Option<String>,
    pub status: SegmentStatus,
    pub allocated_at: Option<DateTime<Utc>>,
    pub released: bool,
    pub released_at: Option<DateTime<Utc>>,
}

impl Segment {
    /// Parsed, whitespace-trimmed list of cluster tokens sharing this lease.
    /// Empty when the segment is available.
    pub fn cluster_tokens(&self) -> Vec<String> {
        match &self.cluster_name {
            None => Vec::new(),
            Some(s) if s.is_empty() => Vec::new(),
            Some(s) => s.split(',').map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect(),
        }
    }

    /// True if `cluster` is a member of this segment's (possibly shared)
    /// lease, per the `(^|,)cluster(,|$)` membership rule in the source.
    pub fn holds_cluster(&self, cluster: &str) -> bool {
        self.cluster_tokens().iter().any(|t| t == cluster)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStatus {
    Available,
    Reserved,
}

/// Closed update payload for admin CRUD. Replaces the source's untyped
/// `$set` map: fields a caller must not touch (`id`, `status`, `released`,
/// `released_at`) simply have no place to be written through here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentUpdate {
    pub vrf: Option<String>,
    pub vlan_id: Option<u16>,
    pub epg_name: Option<String>,
    pub prefix: Option<String>,
    pub dhcp: Option<bool>,
    pub description: Option<String>,
}
