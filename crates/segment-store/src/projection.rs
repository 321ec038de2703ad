//! Prefix(+VLAN) → `Segment` projection, wire-exact per spec.md §6.
//! Grounded on `netbox_query_ops.py`'s `prefix_to_segment`.

use chrono::{DateTime, Utc};
use segment_types::ipam::{NetBoxPrefix, NetBoxStatus, NetBoxVlan};
use segment_types::segment::SegmentStatus;
use segment_types::Segment;

/// Segments whose site or vrf cannot be resolved are silently skipped by
/// the caller (spec.md §4.3) — this returns `None` in that case rather than
/// erroring, leaving the skip decision to `find`.
pub fn project(prefix: &NetBoxPrefix, vlan: Option<&NetBoxVlan>, site_slug: Option<&str>, allocated_at: Option<DateTime<Utc>>, released_at: Option<DateTime<Utc>>) -> Option<Segment> {
    let site = site_slug?.to_lowercase();
    let vrf = prefix.vrf.as_ref()?.name.clone()?;

    let cluster_name = resolve_cluster_name(prefix);
    let released = prefix.status == NetBoxStatus::Active;
    let status = if released { SegmentStatus::Available } else { SegmentStatus::Reserved };

    Some(Segment {
        id: prefix.id.to_string(),
        site,
        vrf,
        vlan_id: vlan.map(|v| v.vid).unwrap_or(0),
        epg_name: vlan.map(|v| v.name.clone()).unwrap_or_default(),
        prefix: prefix.prefix.clone(),
        dhcp: prefix.custom_fields.dhcp,
        description: prefix.comments.clone(),
        cluster_name,
        status,
        allocated_at,
        released,
        released_at,
    })
}

/// Prefer the `Cluster` custom field; fall back to parsing a legacy
/// `"Cluster: <name>"` prefix `description` for reserved prefixes that
/// predate the custom field. Blank values normalize to `None`.
fn resolve_cluster_name(prefix: &NetBoxPrefix) -> Option<String> {
    if let Some(cluster) = &prefix.custom_fields.cluster {
        if !cluster.is_empty() {
            return Some(cluster.clone());
        }
    }
    if prefix.status == NetBoxStatus::Reserved {
        if let Some(rest) = prefix.description.strip_prefix("Cluster: ") {
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use segment_types::ipam::{NetBoxNested, PrefixCustomFields};

    fn prefix(status: NetBoxStatus, cluster: Option<&str>, description: &str) -> NetBoxPrefix {
        NetBoxPrefix {
            id: 1,
            prefix: "10.0.0.0/24".into(),
            status,
            vrf: Some(NetBoxNested { id: 1, name: Some("Network1".into()), slug: None }),
            tenant: None,
            role: None,
            scope_type: Some("dcim.sitegroup".into()),
            scope_id: Some(1),
            scope: Some(NetBoxNested { id: 1, name: Some("Site1".into()), slug: Some("site1".into()) }),
            vlan: None,
            comments: "user text".into(),
            description: description.into(),
            custom_fields: PrefixCustomFields {
                dhcp: false,
                cluster: cluster.map(|s| s.to_string()),
                allocated_at: None,
                released_at: None,
            },
        }
    }

    #[test]
    fn prefers_custom_field_cluster() {
        let p = prefix(NetBoxStatus::Reserved, Some("web-01"), "");
        assert_eq!(resolve_cluster_name(&p), Some("web-01".to_string()));
    }

    #[test]
    fn falls_back_to_legacy_description_when_reserved() {
        let p = prefix(NetBoxStatus::Reserved, None, "Cluster: legacy-01");
        assert_eq!(resolve_cluster_name(&p), Some("legacy-01".to_string()));
    }

    #[test]
    fn active_prefix_has_no_cluster() {
        let p = prefix(NetBoxStatus::Active, None, "");
        assert_eq!(resolve_cluster_name(&p), None);
    }

    #[test]
    fn released_matches_active_status() {
        let p = prefix(NetBoxStatus::Active, None, "");
        let seg = project(&p, None, Some("Site1"), None, None).unwrap();
        assert!(seg.released);
        assert_eq!(seg.site, "site1");
    }
}
