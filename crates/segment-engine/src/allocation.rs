//! Result shapes returned by the two core operations (spec.md §4.5).

use chrono::{DateTime, Utc};
use segment_types::Segment;

/// The outcome of a successful `allocate` call, whether freshly claimed or
/// an idempotent repeat of an existing lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub vlan_id: u16,
    pub epg_name: String,
    pub prefix: String,
    pub site: String,
    pub vrf: String,
    pub cluster: String,
    pub allocated_at: Option<DateTime<Utc>>,
}

impl Allocation {
    /// `cluster` is the requester's own token, not the segment's (possibly
    /// shared) full `cluster_name` list.
    pub(crate) fn from_segment(segment: Segment, cluster: &str) -> Self {
        Self {
            vlan_id: segment.vlan_id,
            epg_name: segment.epg_name,
            prefix: segment.prefix,
            site: segment.site,
            vrf: segment.vrf,
            cluster: cluster.to_string(),
            allocated_at: segment.allocated_at,
        }
    }
}

/// Whether a `release` call emptied the lease back into the pool or merely
/// shrank a shared lease's token list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The segment's `cluster_name` list is now empty; it is back in the
    /// available pool and `released_at` was stamped.
    FullyReleased,
    /// Other clusters still hold this lease.
    PartiallyReleased { remaining: Vec<String> },
}
