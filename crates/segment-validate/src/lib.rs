//! Pure, synchronous checks on allocator input (spec.md §4.6), plus the one
//! check that isn't pure: `validate_vrf`, which consults the IPAM Gateway's
//! own reference cache. Grounded on `src/utils/validators/` in
//! `original_source` (`input_validators.py`, `network_validators.py`,
//! `security_validators.py`, `data_validators.py`), re-expressed as a
//! single ordered pipeline instead of scattered `HTTPException` raises.

pub mod error;
pub mod pool_config;

pub use error::ValidationError;
pub use pool_config::PoolConfig;

use ipnet::Ipv4Net;
use regex::Regex;
use segment_core::gateway::IpamGateway;
use segment_types::Segment;
use std::str::FromStr;
use std::sync::Arc;

const EPG_NAME_RE: &str = r"^[A-Za-z0-9_-]{1,64}$";
const CLUSTER_TOKEN_RE: &str = r"^[A-Za-z0-9_.-]{1,100}$";
const MIN_PREFIX_LEN: u8 = 16;
const MAX_PREFIX_LEN: u8 = 29;
const MAX_DESCRIPTION_LEN: usize = 500;

/// Case-insensitive XSS/script-injection patterns, lifted verbatim from
/// `security_validators.py::validate_no_script_injection`.
const SCRIPT_INJECTION_PATTERNS: &[&str] = &["<script", "javascript:", "onerror=", "onload=", "onclick=", "<iframe", "<embed", "<object", "eval(", "expression("];

pub struct Validator {
    config: PoolConfig,
    gateway: Arc<dyn IpamGateway>,
}

impl Validator {
    pub fn new(config: PoolConfig, gateway: Arc<dyn IpamGateway>) -> Self {
        Self { config, gateway }
    }

    pub fn pool_config(&self) -> &PoolConfig {
        &self.config
    }

    // -- identity fields --------------------------------------------------

    pub fn validate_site(&self, site: &str) -> Result<(), ValidationError> {
        if !self.config.contains_site(site) {
            return Err(ValidationError::BadRequest(format!("invalid site '{site}'; must be one of: {:?}", self.config.sites())));
        }
        Ok(())
    }

    /// The one check that isn't pure: existence of a VRF is only known to
    /// the remote IPAM, resolved (and cached) through the Reference Cache
    /// (spec.md §4.6).
    pub async fn validate_vrf(&self, vrf: &str) -> Result<(), ValidationError> {
        self.gateway.get_vrf_by_name(vrf).await.map_err(|e| ValidationError::BadRequest(format!("unknown vrf '{vrf}': {e}")))?;
        Ok(())
    }

    pub fn validate_epg_name(&self, epg_name: &str) -> Result<(), ValidationError> {
        let re = Regex::new(EPG_NAME_RE).expect("static regex compiles");
        if !re.is_match(epg_name) {
            return Err(ValidationError::BadRequest(format!(
                "EPG name '{epg_name}' must match {EPG_NAME_RE} (letters, numbers, underscores, hyphens, 1-64 chars)"
            )));
        }
        Ok(())
    }

    pub fn validate_cluster_token(&self, cluster: &str) -> Result<(), ValidationError> {
        let re = Regex::new(CLUSTER_TOKEN_RE).expect("static regex compiles");
        if !re.is_match(cluster) {
            return Err(ValidationError::BadRequest(format!("cluster '{cluster}' must match {CLUSTER_TOKEN_RE}")));
        }
        Ok(())
    }

    // -- VLAN range ---------------------------------------------------------

    pub fn validate_vlan_range(&self, vlan_id: u16) -> Result<(), ValidationError> {
        if vlan_id < 1 || vlan_id > 4094 {
            return Err(ValidationError::BadRequest(format!("VLAN ID must be between 1 and 4094 (got {vlan_id})")));
        }
        if vlan_id == 1 {
            log::warn!("VLAN 1 requested; it is the reserved default VLAN");
        }
        Ok(())
    }

    // -- CIDR well-formed + canonical form -----------------------------------

    /// Parses `prefix`; rejects a well-formed-but-non-canonical CIDR
    /// (`192.168.1.5/24`) with the canonical form suggested in the error
    /// (spec.md §4.6's strict-format rule).
    pub fn parse_canonical_cidr(&self, prefix: &str) -> Result<Ipv4Net, ValidationError> {
        let net = Ipv4Net::from_str(prefix).map_err(|_| ValidationError::BadRequest(format!("invalid network format: '{prefix}'")))?;
        let canonical = net.trunc();
        if net.addr() != canonical.addr() {
            return Err(ValidationError::NonCanonicalCidr {
                given: prefix.to_string(),
                suggested: canonical.to_string(),
            });
        }
        Ok(net)
    }

    // -- subnet mask bounds ---------------------------------------------------

    pub fn validate_subnet_mask(&self, net: &Ipv4Net) -> Result<(), ValidationError> {
        let len = net.prefix_len();
        if len < MIN_PREFIX_LEN || len > MAX_PREFIX_LEN {
            return Err(ValidationError::BadRequest(format!(
                "subnet mask /{len} is outside the allowed range (/{MIN_PREFIX_LEN} to /{MAX_PREFIX_LEN})"
            )));
        }
        Ok(())
    }

    // -- reserved-range exclusion ---------------------------------------------

    pub fn validate_not_reserved_range(&self, net: &Ipv4Net) -> Result<(), ValidationError> {
        let octets = net.network().octets();
        match octets[0] {
            0 => Err(ValidationError::BadRequest("cannot use 0.0.0.0/8 (current-network identifier)".into())),
            127 => Err(ValidationError::BadRequest("cannot use 127.0.0.0/8 (loopback)".into())),
            169 if octets[1] == 254 => Err(ValidationError::BadRequest("cannot use 169.254.0.0/16 (link-local)".into())),
            o if o >= 224 => Err(ValidationError::BadRequest(format!("cannot use {o}.0.0.0/8 (multicast/reserved range)"))),
            _ => Ok(()),
        }
    }

    // -- prefix / (vrf, site) match --------------------------------------------

    pub fn validate_prefix_site_match(&self, net: &Ipv4Net, vrf: &str, site: &str) -> Result<(), ValidationError> {
        let expected = self
            .config
            .expected_first_octet(vrf, site)
            .ok_or_else(|| ValidationError::BadRequest(format!("network '{vrf}' at site '{site}' is not configured")))?;
        let actual = net.network().octets()[0].to_string();
        if actual != expected {
            return Err(ValidationError::BadRequest(format!(
                "invalid IP prefix for network '{vrf}' at site '{site}': expected to start with '{expected}', got '{actual}'"
            )));
        }
        Ok(())
    }

    // -- usable-host count -------------------------------------------------

    pub fn validate_usable_hosts(&self, net: &Ipv4Net) -> Result<(), ValidationError> {
        let usable = (net.hosts().count()) as i64 - 0; // hosts() already excludes network/broadcast for ipv4
        if usable < 2 {
            return Err(ValidationError::BadRequest(format!("network {net} has only {usable} usable host address(es), minimum is 2")));
        }
        Ok(())
    }

    // -- overlap against existing segments -----------------------------------

    /// I3: for any two segments sharing a `vrf`, their prefixes must not
    /// overlap. Overlap is scoped per-vrf (spec.md end-to-end scenario 5).
    pub fn validate_no_overlap(&self, net: &Ipv4Net, vrf: &str, existing: &[Segment], exclude_id: Option<&str>) -> Result<(), ValidationError> {
        for seg in existing {
            if seg.vrf != vrf {
                continue;
            }
            if exclude_id.is_some_and(|id| id == seg.id) {
                continue;
            }
            let Ok(other) = Ipv4Net::from_str(&seg.prefix) else {
                log::warn!("skipping unparsable existing prefix '{}' during overlap check", seg.prefix);
                continue;
            };
            if net.trunc().overlaps(&other.trunc()) {
                return Err(ValidationError::BadRequest(format!("prefix {net} overlaps with existing segment {} (vrf={vrf}, vlan={})", seg.prefix, seg.vlan_id)));
            }
        }
        Ok(())
    }

    // -- (vrf, site) label/VLAN uniqueness -----------------------------------

    /// I4: within a (vrf, site), no two segments share `epg_name` with
    /// different `vlan_id`, and no two share `vlan_id` with different
    /// `epg_name`.
    pub fn validate_uniqueness(&self, vrf: &str, site: &str, vlan_id: u16, epg_name: &str, existing: &[Segment], exclude_id: Option<&str>) -> Result<(), ValidationError> {
        for seg in existing {
            if seg.vrf != vrf || seg.site != site {
                continue;
            }
            if exclude_id.is_some_and(|id| id == seg.id) {
                continue;
            }
            if seg.epg_name == epg_name && seg.vlan_id != vlan_id {
                return Err(ValidationError::BadRequest(format!("EPG name '{epg_name}' is already in use with a different VLAN ({}) in {vrf}/{site}", seg.vlan_id)));
            }
            if seg.vlan_id == vlan_id && seg.epg_name != epg_name {
                return Err(ValidationError::BadRequest(format!("VLAN {vlan_id} is already in use with a different EPG name ('{}') in {vrf}/{site}", seg.epg_name)));
            }
        }
        Ok(())
    }

    // -- script-injection scan ------------------------------------------------

    /// Grounded verbatim on `security_validators.py::validate_no_script_injection`.
    pub fn validate_no_script_injection(&self, field_name: &str, text: &str) -> Result<(), ValidationError> {
        if text.is_empty() {
            return Ok(());
        }
        let lowered = text.to_lowercase();
        for pattern in SCRIPT_INJECTION_PATTERNS {
            if lowered.contains(pattern) {
                log::warn!("potential script injection detected in {field_name}: {pattern}");
                return Err(ValidationError::BadRequest(format!("field '{field_name}' contains potentially dangerous content: {pattern}")));
            }
        }
        Ok(())
    }

    // -- description length/control-char --------------------------------------

    pub fn validate_description(&self, description: &str) -> Result<(), ValidationError> {
        if description.is_empty() {
            return Ok(());
        }
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(ValidationError::BadRequest(format!("description too long (max {MAX_DESCRIPTION_LEN} characters, got {})", description.len())));
        }
        if description.chars().any(|c| c.is_control() && c != '\n' && c != '\t' && c != '\r') {
            return Err(ValidationError::BadRequest("description contains invalid control characters".into()));
        }
        Ok(())
    }

    /// Full ordered pipeline for admitting a new or updated segment
    /// (spec.md §4.6): identity fields -> VLAN range -> CIDR well-formed ->
    /// subnet-mask bounds -> reserved-range -> prefix/site match -> usable
    /// hosts -> overlap -> uniqueness -> script-injection -> description
    /// checks. `validate_vrf` is the caller's responsibility (it's async);
    /// this synchronous pipeline assumes the vrf has already been confirmed
    /// to exist. `exclude_id` should be the segment's own id on an update,
    /// so it doesn't collide with itself in the overlap/uniqueness checks.
    #[allow(clippy::too_many_arguments)]
    pub fn validate_new_segment(&self, site: &str, vrf: &str, vlan_id: u16, epg_name: &str, prefix: &str, description: &str, existing: &[Segment], exclude_id: Option<&str>) -> Result<Ipv4Net, ValidationError> {
        self.validate_site(site)?;
        self.validate_epg_name(epg_name)?;
        self.validate_vlan_range(vlan_id)?;
        let net = self.parse_canonical_cidr(prefix)?;
        self.validate_subnet_mask(&net)?;
        self.validate_not_reserved_range(&net)?;
        self.validate_prefix_site_match(&net, vrf, site)?;
        self.validate_usable_hosts(&net)?;
        self.validate_no_overlap(&net, vrf, existing, exclude_id)?;
        self.validate_uniqueness(vrf, site, vlan_id, epg_name, existing, exclude_id)?;
        self.validate_no_script_injection("epg_name", epg_name)?;
        self.validate_no_script_injection("description", description)?;
        self.validate_description(description)?;
        Ok(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use segment_core::gateway::{GatewayError, PrefixWrite, VlanWrite};
    use segment_types::ipam::*;
    use segment_types::segment::SegmentStatus;
    use std::collections::HashMap as Map;

    struct StubGateway;

    #[async_trait]
    impl IpamGateway for StubGateway {
        async fn list_prefixes(&self, _tenant_id: u64) -> Result<Vec<NetBoxPrefix>, GatewayError> {
            unimplemented!()
        }
        async fn list_vlans(&self, _tenant_id: u64) -> Result<Vec<NetBoxVlan>, GatewayError> {
            unimplemented!()
        }
        async fn get_prefix(&self, _id: u64) -> Result<NetBoxPrefix, GatewayError> {
            unimplemented!()
        }
        async fn create_prefix(&self, _write: PrefixWrite) -> Result<NetBoxPrefix, GatewayError> {
            unimplemented!()
        }
        async fn update_prefix(&self, _id: u64, _write: PrefixWrite) -> Result<NetBoxPrefix, GatewayError> {
            unimplemented!()
        }
        async fn delete_prefix(&self, _id: u64) -> Result<(), GatewayError> {
            unimplemented!()
        }
        async fn find_vlan_by_vid_in_group(&self, _group_id: u64, _vid: u16) -> Result<Option<NetBoxVlan>, GatewayError> {
            unimplemented!()
        }
        async fn find_vlan_by_vid(&self, _vid: u16) -> Result<Option<NetBoxVlan>, GatewayError> {
            unimplemented!()
        }
        async fn get_vlan(&self, _id: u64) -> Result<NetBoxVlan, GatewayError> {
            unimplemented!()
        }
        async fn create_vlan(&self, _write: VlanWrite) -> Result<NetBoxVlan, GatewayError> {
            unimplemented!()
        }
        async fn update_vlan(&self, _id: u64, _write: VlanWrite) -> Result<NetBoxVlan, GatewayError> {
            unimplemented!()
        }
        async fn delete_vlan(&self, _id: u64) -> Result<(), GatewayError> {
            unimplemented!()
        }
        async fn vlan_is_referenced(&self, _vlan_id: u64) -> Result<bool, GatewayError> {
            unimplemented!()
        }
        async fn get_or_create_vlan_group(&self, _name: &str) -> Result<NetBoxVlanGroup, GatewayError> {
            unimplemented!()
        }
        async fn get_tenant_by_name(&self, _name: &str) -> Result<NetBoxTenant, GatewayError> {
            unimplemented!()
        }
        async fn get_role_by_name(&self, _name: &str) -> Result<NetBoxRole, GatewayError> {
            unimplemented!()
        }
        async fn get_site_group_by_slug(&self, _slug: &str) -> Result<NetBoxSiteGroup, GatewayError> {
            unimplemented!()
        }
        async fn get_vrf_by_name(&self, name: &str) -> Result<NetBoxVrf, GatewayError> {
            if name == "Network1" {
                Ok(NetBoxVrf { id: 1, name: name.to_string() })
            } else {
                Err(GatewayError::BadRequest(format!("unknown vrf {name}")))
            }
        }
        async fn list_vrfs(&self) -> Result<Vec<NetBoxVrf>, GatewayError> {
            unimplemented!()
        }
        async fn list_site_groups(&self) -> Result<Vec<NetBoxSiteGroup>, GatewayError> {
            unimplemented!()
        }
        async fn ping(&self) -> Result<(), GatewayError> {
            unimplemented!()
        }
    }

    fn validator() -> Validator {
        let mut prefixes = Map::new();
        prefixes.insert(("Network1".to_string(), "site1".to_string()), "192".to_string());
        let config = PoolConfig::new(vec!["site1".to_string()], prefixes);
        Validator::new(config, Arc::new(StubGateway))
    }

    fn seg(vrf: &str, site: &str, vlan_id: u16, epg: &str, prefix: &str) -> Segment {
        Segment {
            id: "1".into(),
            site: site.into(),
            vrf: vrf.into(),
            vlan_id,
            epg_name: epg.into(),
            prefix: prefix.into(),
            dhcp: false,
            description: String::new(),
            cluster_name: None,
            status: SegmentStatus::Available,
            allocated_at: None,
            released: true,
            released_at: None,
        }
    }

    #[tokio::test]
    async fn validate_vrf_consults_gateway() {
        let v = validator();
        assert!(v.validate_vrf("Network1").await.is_ok());
        assert!(v.validate_vrf("Unknown").await.is_err());
    }

    #[test]
    fn vlan_range_boundaries() {
        let v = validator();
        assert!(v.validate_vlan_range(0).is_err());
        assert!(v.validate_vlan_range(4095).is_err());
        assert!(v.validate_vlan_range(1).is_ok());
        assert!(v.validate_vlan_range(4094).is_ok());
    }

    #[test]
    fn non_canonical_cidr_suggests_correction() {
        let v = validator();
        let err = v.parse_canonical_cidr("192.168.1.5/24").unwrap_err();
        match err {
            ValidationError::NonCanonicalCidr { suggested, .. } => assert_eq!(suggested, "192.168.1.0/24"),
            other => panic!("expected NonCanonicalCidr, got {other:?}"),
        }
        assert!(v.parse_canonical_cidr("192.168.1.0/24").is_ok());
    }

    #[test]
    fn subnet_mask_bounds() {
        let v = validator();
        let too_big = Ipv4Net::from_str("10.0.0.0/15").unwrap();
        let too_small = Ipv4Net::from_str("10.0.0.0/30").unwrap();
        let ok = Ipv4Net::from_str("10.0.0.0/24").unwrap();
        assert!(v.validate_subnet_mask(&too_big).is_err());
        assert!(v.validate_subnet_mask(&too_small).is_err());
        assert!(v.validate_subnet_mask(&ok).is_ok());
    }

    #[test]
    fn reserved_ranges_rejected() {
        let v = validator();
        assert!(v.validate_not_reserved_range(&Ipv4Net::from_str("127.0.0.0/24").unwrap()).is_err());
        assert!(v.validate_not_reserved_range(&Ipv4Net::from_str("169.254.0.0/24").unwrap()).is_err());
        assert!(v.validate_not_reserved_range(&Ipv4Net::from_str("240.0.0.0/24").unwrap()).is_err());
        assert!(v.validate_not_reserved_range(&Ipv4Net::from_str("192.168.0.0/24").unwrap()).is_ok());
    }

    #[test]
    fn prefix_must_match_configured_site_octet() {
        let v = validator();
        let net = Ipv4Net::from_str("10.0.0.0/24").unwrap();
        assert!(v.validate_prefix_site_match(&net, "Network1", "site1").is_err());
        let net_ok = Ipv4Net::from_str("192.168.0.0/24").unwrap();
        assert!(v.validate_prefix_site_match(&net_ok, "Network1", "site1").is_ok());
    }

    #[test]
    fn overlap_is_scoped_per_vrf() {
        let v = validator();
        let existing = vec![seg("Network1", "site1", 10, "a", "192.168.0.0/23")];
        let overlapping = Ipv4Net::from_str("192.168.1.0/24").unwrap();
        assert!(v.validate_no_overlap(&overlapping, "Network1", &existing, None).is_err());
        assert!(v.validate_no_overlap(&overlapping, "Network2", &existing, None).is_ok());
    }

    #[test]
    fn uniqueness_catches_both_directions() {
        let v = validator();
        let existing = vec![seg("Network1", "site1", 10, "web", "192.168.2.0/24")];
        assert!(v.validate_uniqueness("Network1", "site1", 11, "web", &existing, None).is_err());
        assert!(v.validate_uniqueness("Network1", "site1", 10, "other", &existing, None).is_err());
        assert!(v.validate_uniqueness("Network1", "site1", 10, "web", &existing, None).is_ok());
        assert!(v.validate_uniqueness("Network1", "site1", 10, "renamed", &existing, Some("1")).is_ok());
    }

    #[test]
    fn script_injection_scan_is_case_insensitive() {
        let v = validator();
        assert!(v.validate_no_script_injection("description", "hello <SCRIPT>alert(1)</script>").is_err());
        assert!(v.validate_no_script_injection("description", "a perfectly normal comment").is_ok());
    }

    #[test]
    fn description_length_and_control_chars() {
        let v = validator();
        assert!(v.validate_description(&"x".repeat(501)).is_err());
        assert!(v.validate_description("line one\nline two").is_ok());
        assert!(v.validate_description("bad\x07bell").is_err());
    }
}
