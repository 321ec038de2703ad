//! Closed, typed replacement for the source's untyped mapping-based query
//! language (`$ne`, `$regex`, `$or`, `_id`) — see `netbox_query_ops.py::find`.
//! The evaluator below matches spec.md §4.3's in-memory evaluation rules
//! exactly: `$ne` matches absent-or-different, `$regex` requires the field
//! to be non-null, `$or` is short-circuit, `_id` is string-normalized.

use regex::Regex;
use segment_types::Segment;

/// Fields a `Query` can predicate on. Closed on purpose: a typo here is a
/// compile error, not a silently-never-matching filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentField {
    Id,
    Site,
    Vrf,
    VlanId,
    EpgName,
    ClusterName,
    Released,
}

/// A single predicate or a disjunction of conjunctions of predicates.
#[derive(Debug, Clone)]
pub enum Query {
    Eq(SegmentField, String),
    Ne(SegmentField, String),
    Regex {
        field: SegmentField,
        pattern: String,
        case_insensitive: bool,
    },
    /// `$or` of conjunctions: each inner `Vec<Query>` is AND-ed, the outer
    /// list is OR-ed, matching `find_one`'s `{"$or": [{...}, {...}]}` usage.
    Or(Vec<Vec<Query>>),
}

impl Query {
    fn field_value(field: SegmentField, segment: &Segment) -> Option<String> {
        match field {
            SegmentField::Id => Some(segment.id.clone()),
            SegmentField::Site => Some(segment.site.clone()),
            SegmentField::Vrf => Some(segment.vrf.clone()),
            SegmentField::VlanId => Some(segment.vlan_id.to_string()),
            SegmentField::EpgName => Some(segment.epg_name.clone()),
            SegmentField::ClusterName => segment.cluster_name.clone(),
            SegmentField::Released => Some(segment.released.to_string()),
        }
    }

    /// Evaluate this predicate against a segment.
    pub fn matches(&self, segment: &Segment) -> bool {
        match self {
            Query::Eq(field, expected) => {
                let normalize = matches!(field, SegmentField::Id);
                match Self::field_value(*field, segment) {
                    Some(actual) if normalize => actual.trim() == expected.trim(),
                    Some(actual) => &actual == expected,
                    None => false,
                }
            }
            Query::Ne(field, other) => match Self::field_value(*field, segment) {
                None => true,
                Some(actual) => &actual != other,
            },
            Query::Regex {
                field,
                pattern,
                case_insensitive,
            } => match Self::field_value(*field, segment) {
                None => false,
                Some(actual) => {
                    let built = if *case_insensitive {
                        Regex::new(&format!("(?i){pattern}"))
                    } else {
                        Regex::new(pattern)
                    };
                    built.map(|re| re.is_match(&actual)).unwrap_or(false)
                }
            },
            Query::Or(branches) => branches
                .iter()
                .any(|conjunction| conjunction.iter().all(|q| q.matches(segment))),
        }
    }
}

/// Evaluate a full conjunction of predicates, the shape `find`/`find_one`
/// build for most of their call sites.
pub fn matches_all(predicates: &[Query], segment: &Segment) -> bool {
    predicates.iter().all(|q| q.matches(segment))
}

/// The membership test used throughout `allocation_utils.py`:
/// `cluster_name =~ (^|,)cluster(,|$)`.
pub fn cluster_membership_query(cluster: &str) -> Query {
    let escaped = regex::escape(cluster);
    Query::Regex {
        field: SegmentField::ClusterName,
        pattern: format!("(^|,)\\s*{escaped}\\s*(,|$)"),
        case_insensitive: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use segment_types::segment::SegmentStatus;

    fn seg(cluster: Option<&str>, released: bool) -> Segment {
        Segment {
            id: "1".into(),
            site: "site1".into(),
            vrf: "Network1".into(),
            vlan_id: 100,
            epg_name: "web".into(),
            prefix: "10.0.0.0/24".into(),
            dhcp: false,
            description: String::new(),
            cluster_name: cluster.map(|s| s.to_string()),
            status: if released { SegmentStatus::Available } else { SegmentStatus::Reserved },
            allocated_at: Some(Utc::now()),
            released,
            released_at: None,
        }
    }

    #[test]
    fn ne_matches_absent_field() {
        let s = seg(None, true);
        assert!(Query::Ne(SegmentField::ClusterName, "web-01".into()).matches(&s));
    }

    #[test]
    fn ne_matches_different_value() {
        let s = seg(Some("web-02"), false);
        assert!(Query::Ne(SegmentField::ClusterName, "web-01".into()).matches(&s));
        assert!(!Query::Ne(SegmentField::ClusterName, "web-02".into()).matches(&s));
    }

    #[test]
    fn regex_requires_non_null_field() {
        let s = seg(None, true);
        assert!(!cluster_membership_query("web-01").matches(&s));
    }

    #[test]
    fn membership_matches_shared_lease() {
        let s = seg(Some("web-01,web-02"), false);
        assert!(cluster_membership_query("web-01").matches(&s));
        assert!(cluster_membership_query("web-02").matches(&s));
        assert!(!cluster_membership_query("web-03").matches(&s));
    }

    #[test]
    fn or_is_short_circuit_disjunction() {
        let s = seg(Some("web-01"), false);
        let q = Query::Or(vec![
            vec![Query::Eq(SegmentField::Site, "wrong".into())],
            vec![Query::Eq(SegmentField::ClusterName, "web-01".into())],
        ]);
        assert!(q.matches(&s));
    }
}
