//! A stateful, in-process stand-in for the NetBox-backed Gateway
//! (`segment-gateway::NetBoxGateway`), built for scenario tests that need to
//! round-trip real reads and writes — create, claim, relabel, move, GC —
//! against one coherent pool rather than per-call `mockall` expectations.
//!
//! Grounded the same way `segment-store`'s and `segment-engine`'s own test
//! doubles are (`mockall::mock! { ... impl IpamGateway ... }`), just made
//! stateful and shared across an entire scenario instead of per-test.

use async_trait::async_trait;
use segment_core::gateway::{GatewayError, IpamGateway, PrefixWrite, VlanWrite};
use segment_core::vlan_naming::sanitize_slug;
use segment_types::ipam::{NetBoxNested, NetBoxPrefix, NetBoxRole, NetBoxSiteGroup, NetBoxStatus, NetBoxTenant, NetBoxVlan, NetBoxVlanGroup, NetBoxVrf, PrefixCustomFields};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

fn nested(id: u64, name: &str, slug: &str) -> NetBoxNested {
    NetBoxNested { id, name: Some(name.to_string()), slug: Some(slug.to_string()) }
}

/// One configured (vrf, site) reference pair the fake IPAM already knows
/// about, mirroring what a real deployment's NetBox instance would have
/// provisioned ahead of time (tenant, role, site groups, VRFs).
pub struct FakeIpamSeed {
    pub tenant: NetBoxTenant,
    pub role: NetBoxRole,
    pub site_groups: Vec<NetBoxSiteGroup>,
    pub vrfs: Vec<NetBoxVrf>,
}

impl FakeIpamSeed {
    /// A single tenant/role/site/vrf combination, enough for most scenarios.
    pub fn single(tenant: &str, site_slug: &str, vrf: &str) -> Self {
        Self {
            tenant: NetBoxTenant { id: 1, name: tenant.to_string(), slug: sanitize_slug(tenant) },
            role: NetBoxRole { id: 1, name: "Data".to_string(), slug: "data".to_string() },
            site_groups: vec![NetBoxSiteGroup { id: 1, name: site_slug.to_string(), slug: site_slug.to_string() }],
            vrfs: vec![NetBoxVrf { id: 1, name: vrf.to_string() }],
        }
    }

    pub fn with_vrf(mut self, name: &str) -> Self {
        let id = self.vrfs.len() as u64 + 1;
        self.vrfs.push(NetBoxVrf { id, name: name.to_string() });
        self
    }

    pub fn with_site(mut self, slug: &str) -> Self {
        let id = self.site_groups.len() as u64 + 1;
        self.site_groups.push(NetBoxSiteGroup { id, name: slug.to_string(), slug: slug.to_string() });
        self
    }
}

struct State {
    prefixes: HashMap<u64, NetBoxPrefix>,
    vlans: HashMap<u64, NetBoxVlan>,
    vlan_groups: HashMap<String, NetBoxVlanGroup>,
}

/// In-memory `IpamGateway`, seeded with fixed reference data and starting
/// with an empty prefix/VLAN pool that callers populate through
/// `create_prefix`/`create_vlan` the same way `segment-store::insert_one`
/// would against a real NetBox.
pub struct FakeGateway {
    seed: FakeIpamSeed,
    state: Mutex<State>,
    next_prefix_id: AtomicU64,
    next_vlan_id: AtomicU64,
    next_group_id: AtomicU64,
}

impl FakeGateway {
    pub fn new(seed: FakeIpamSeed) -> Self {
        Self {
            seed,
            state: Mutex::new(State { prefixes: HashMap::new(), vlans: HashMap::new(), vlan_groups: HashMap::new() }),
            next_prefix_id: AtomicU64::new(1),
            next_vlan_id: AtomicU64::new(1),
            next_group_id: AtomicU64::new(1),
        }
    }

    fn vrf_by_id(&self, id: u64) -> Result<&NetBoxVrf, GatewayError> {
        self.seed.vrfs.iter().find(|v| v.id == id).ok_or_else(|| GatewayError::NotFound(format!("vrf {id}")))
    }

    fn site_group_by_id(&self, id: u64) -> Result<&NetBoxSiteGroup, GatewayError> {
        self.seed.site_groups.iter().find(|s| s.id == id).ok_or_else(|| GatewayError::NotFound(format!("site group {id}")))
    }

    /// Seeds one available (unreserved) prefix directly, bypassing
    /// `create_prefix`, the way a test fixture populates a starting pool
    /// without going through the full insert path.
    pub fn seed_available_prefix(&self, vrf: &str, site_slug: &str, vlan_id: u16, epg_name: &str, cidr: &str) -> u64 {
        self.seed_prefix(vrf, site_slug, vlan_id, epg_name, cidr, PrefixCustomFields::default(), NetBoxStatus::Active)
    }

    /// Seeds a prefix that already carries an active lease, the way a
    /// fixture recreates a reserved segment without round-tripping through
    /// `claim_first_available`.
    pub fn seed_leased_prefix(&self, vrf: &str, site_slug: &str, vlan_id: u16, epg_name: &str, cidr: &str, cluster: &str, allocated_at: chrono::DateTime<chrono::Utc>) -> u64 {
        let custom_fields = PrefixCustomFields { dhcp: false, cluster: Some(cluster.to_string()), allocated_at: Some(allocated_at.to_rfc3339()), released_at: None };
        self.seed_prefix(vrf, site_slug, vlan_id, epg_name, cidr, custom_fields, NetBoxStatus::Reserved)
    }

    fn seed_prefix(&self, vrf: &str, site_slug: &str, vlan_id: u16, epg_name: &str, cidr: &str, custom_fields: PrefixCustomFields, status: NetBoxStatus) -> u64 {
        let vrf_obj = self.seed.vrfs.iter().find(|v| v.name == vrf).expect("seeded vrf");
        let site_obj = self.seed.site_groups.iter().find(|s| s.slug == site_slug).expect("seeded site group");

        let vlan_numeric_id = self.next_vlan_id.fetch_add(1, Ordering::SeqCst);
        let group_name = segment_core::vlan_naming::vlan_group_name(vrf, site_slug);
        let group = self.group_for(&group_name);
        let vlan = NetBoxVlan {
            id: vlan_numeric_id,
            vid: vlan_id,
            name: epg_name.to_string(),
            group: Some(nested(group.id, &group.name, &group.slug)),
            tenant: Some(nested(self.seed.tenant.id, &self.seed.tenant.name, &self.seed.tenant.slug)),
            role: Some(nested(self.seed.role.id, &self.seed.role.name, &self.seed.role.slug)),
            status: NetBoxStatus::Active,
        };

        let prefix_numeric_id = self.next_prefix_id.fetch_add(1, Ordering::SeqCst);
        let prefix = NetBoxPrefix {
            id: prefix_numeric_id,
            prefix: cidr.to_string(),
            status,
            vrf: Some(nested(vrf_obj.id, &vrf_obj.name, &vrf_obj.name)),
            tenant: Some(nested(self.seed.tenant.id, &self.seed.tenant.name, &self.seed.tenant.slug)),
            role: Some(nested(self.seed.role.id, &self.seed.role.name, &self.seed.role.slug)),
            scope_type: Some("dcim.sitegroup".into()),
            scope_id: Some(site_obj.id),
            scope: Some(nested(site_obj.id, &site_obj.name, &site_obj.slug)),
            vlan: Some(nested(vlan.id, &vlan.name, "")),
            comments: String::new(),
            description: String::new(),
            custom_fields,
        };

        let mut state = self.state.lock().unwrap();
        state.vlans.insert(vlan.id, vlan);
        state.prefixes.insert(prefix.id, prefix);
        prefix_numeric_id
    }

    /// Seeds a VLAN sitting in a (vrf, site) group with nothing pointing at
    /// it yet, the way a fixture recreates a pre-existing but orphaned VLAN
    /// a move is expected to reuse.
    pub fn seed_vlan_in_group(&self, vrf: &str, site_slug: &str, vid: u16, name: &str) -> u64 {
        let group_name = segment_core::vlan_naming::vlan_group_name(vrf, site_slug);
        let group = self.group_for(&group_name);
        let id = self.next_vlan_id.fetch_add(1, Ordering::SeqCst);
        let vlan = NetBoxVlan {
            id,
            vid,
            name: name.to_string(),
            group: Some(nested(group.id, &group.name, &group.slug)),
            tenant: Some(nested(self.seed.tenant.id, &self.seed.tenant.name, &self.seed.tenant.slug)),
            role: Some(nested(self.seed.role.id, &self.seed.role.name, &self.seed.role.slug)),
            status: NetBoxStatus::Active,
        };
        self.state.lock().unwrap().vlans.insert(id, vlan);
        id
    }

    fn group_for(&self, name: &str) -> NetBoxVlanGroup {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.vlan_groups.get(name) {
            return existing.clone();
        }
        let id = self.next_group_id.fetch_add(1, Ordering::SeqCst);
        let group = NetBoxVlanGroup { id, name: name.to_string(), slug: sanitize_slug(name) };
        state.vlan_groups.insert(name.to_string(), group.clone());
        group
    }

    fn build_prefix(&self, id: u64, write: &PrefixWrite) -> Result<NetBoxPrefix, GatewayError> {
        let vrf = self.vrf_by_id(write.vrf_id)?;
        let site_group = self.site_group_by_id(write.site_group_id)?;
        let vlan = match write.vlan_id {
            Some(vid) => {
                let state = self.state.lock().unwrap();
                state.vlans.get(&vid).map(|v| nested(v.id, &v.name, ""))
            }
            None => None,
        };
        Ok(NetBoxPrefix {
            id,
            prefix: write.prefix.clone(),
            status: if write.reserved { NetBoxStatus::Reserved } else { NetBoxStatus::Active },
            vrf: Some(nested(vrf.id, &vrf.name, &vrf.name)),
            tenant: Some(nested(self.seed.tenant.id, &self.seed.tenant.name, &self.seed.tenant.slug)),
            role: Some(nested(write.role_id, &self.seed.role.name, &self.seed.role.slug)),
            scope_type: Some("dcim.sitegroup".into()),
            scope_id: Some(site_group.id),
            scope: Some(nested(site_group.id, &site_group.name, &site_group.slug)),
            vlan,
            comments: write.user_comment.clone(),
            description: String::new(),
            custom_fields: PrefixCustomFields {
                dhcp: write.dhcp,
                cluster: write.cluster.clone(),
                allocated_at: write.allocated_at.map(|t| t.to_rfc3339()),
                released_at: write.released_at.map(|t| t.to_rfc3339()),
            },
        })
    }
}

#[async_trait]
impl IpamGateway for FakeGateway {
    async fn list_prefixes(&self, _tenant_id: u64) -> Result<Vec<NetBoxPrefix>, GatewayError> {
        Ok(self.state.lock().unwrap().prefixes.values().cloned().collect())
    }

    async fn list_vlans(&self, _tenant_id: u64) -> Result<Vec<NetBoxVlan>, GatewayError> {
        Ok(self.state.lock().unwrap().vlans.values().cloned().collect())
    }

    async fn get_prefix(&self, id: u64) -> Result<NetBoxPrefix, GatewayError> {
        self.state.lock().unwrap().prefixes.get(&id).cloned().ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    async fn create_prefix(&self, write: PrefixWrite) -> Result<NetBoxPrefix, GatewayError> {
        let id = self.next_prefix_id.fetch_add(1, Ordering::SeqCst);
        let prefix = self.build_prefix(id, &write)?;
        self.state.lock().unwrap().prefixes.insert(id, prefix.clone());
        Ok(prefix)
    }

    async fn update_prefix(&self, id: u64, write: PrefixWrite) -> Result<NetBoxPrefix, GatewayError> {
        if !self.state.lock().unwrap().prefixes.contains_key(&id) {
            return Err(GatewayError::NotFound(id.to_string()));
        }
        let prefix = self.build_prefix(id, &write)?;
        self.state.lock().unwrap().prefixes.insert(id, prefix.clone());
        Ok(prefix)
    }

    async fn delete_prefix(&self, id: u64) -> Result<(), GatewayError> {
        self.state.lock().unwrap().prefixes.remove(&id).ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        Ok(())
    }

    async fn find_vlan_by_vid_in_group(&self, group_id: u64, vid: u16) -> Result<Option<NetBoxVlan>, GatewayError> {
        Ok(self.state.lock().unwrap().vlans.values().find(|v| v.vid == vid && v.group.as_ref().map(|g| g.id) == Some(group_id)).cloned())
    }

    async fn find_vlan_by_vid(&self, vid: u16) -> Result<Option<NetBoxVlan>, GatewayError> {
        Ok(self.state.lock().unwrap().vlans.values().find(|v| v.vid == vid).cloned())
    }

    async fn get_vlan(&self, id: u64) -> Result<NetBoxVlan, GatewayError> {
        self.state.lock().unwrap().vlans.get(&id).cloned().ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    async fn create_vlan(&self, write: VlanWrite) -> Result<NetBoxVlan, GatewayError> {
        let id = self.next_vlan_id.fetch_add(1, Ordering::SeqCst);
        let group = {
            let state = self.state.lock().unwrap();
            state.vlan_groups.values().find(|g| g.id == write.group_id).cloned().ok_or_else(|| GatewayError::NotFound(format!("vlan group {}", write.group_id)))?
        };
        let vlan = NetBoxVlan {
            id,
            vid: write.vid,
            name: write.name,
            group: Some(nested(group.id, &group.name, &group.slug)),
            tenant: Some(nested(write.tenant_id, &self.seed.tenant.name, &self.seed.tenant.slug)),
            role: Some(nested(write.role_id, &self.seed.role.name, &self.seed.role.slug)),
            status: NetBoxStatus::Active,
        };
        self.state.lock().unwrap().vlans.insert(id, vlan.clone());
        Ok(vlan)
    }

    async fn update_vlan(&self, id: u64, write: VlanWrite) -> Result<NetBoxVlan, GatewayError> {
        let mut state = self.state.lock().unwrap();
        let group = state.vlan_groups.values().find(|g| g.id == write.group_id).cloned().ok_or_else(|| GatewayError::NotFound(format!("vlan group {}", write.group_id)))?;
        let existing = state.vlans.get_mut(&id).ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        existing.vid = write.vid;
        existing.name = write.name;
        existing.group = Some(nested(group.id, &group.name, &group.slug));
        Ok(existing.clone())
    }

    async fn delete_vlan(&self, id: u64) -> Result<(), GatewayError> {
        self.state.lock().unwrap().vlans.remove(&id).ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        Ok(())
    }

    async fn vlan_is_referenced(&self, vlan_id: u64) -> Result<bool, GatewayError> {
        Ok(self.state.lock().unwrap().prefixes.values().any(|p| p.vlan.as_ref().map(|v| v.id) == Some(vlan_id)))
    }

    async fn get_or_create_vlan_group(&self, name: &str) -> Result<NetBoxVlanGroup, GatewayError> {
        Ok(self.group_for(name))
    }

    async fn get_tenant_by_name(&self, name: &str) -> Result<NetBoxTenant, GatewayError> {
        if self.seed.tenant.name == name {
            Ok(self.seed.tenant.clone())
        } else {
            Err(GatewayError::NotFound(format!("tenant {name}")))
        }
    }

    async fn get_role_by_name(&self, name: &str) -> Result<NetBoxRole, GatewayError> {
        if self.seed.role.name == name {
            Ok(self.seed.role.clone())
        } else {
            Err(GatewayError::NotFound(format!("role {name}")))
        }
    }

    async fn get_site_group_by_slug(&self, slug: &str) -> Result<NetBoxSiteGroup, GatewayError> {
        self.seed.site_groups.iter().find(|s| s.slug == slug).cloned().ok_or_else(|| GatewayError::NotFound(format!("site group {slug}")))
    }

    async fn get_vrf_by_name(&self, name: &str) -> Result<NetBoxVrf, GatewayError> {
        self.seed.vrfs.iter().find(|v| v.name == name).cloned().ok_or_else(|| GatewayError::NotFound(format!("vrf {name}")))
    }

    async fn list_vrfs(&self) -> Result<Vec<NetBoxVrf>, GatewayError> {
        Ok(self.seed.vrfs.clone())
    }

    async fn list_site_groups(&self) -> Result<Vec<NetBoxSiteGroup>, GatewayError> {
        Ok(self.seed.site_groups.clone())
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}
