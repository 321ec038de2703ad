//! IPAM (NetBox) object model, grounded on the response shapes consumed in
//! `sdn-drivers/src/ipam/netbox.rs` and the fields the original Python layer
//! reads off prefixes/VLANs (`netbox_helpers.py`, `netbox_crud_ops.py`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Envelope NetBox wraps every list response in.
#[derive(Debug, Clone, Deserialize)]
pub struct NetBoxResponse<T> {
    pub count: Option<u32>,
    pub results: Option<Vec<T>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetBoxNested {
    pub id: u64,
    pub name: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PrefixCustomFields {
    #[serde(rename = "DHCP", default)]
    pub dhcp: bool,
    #[serde(rename = "Cluster", default)]
    pub cluster: Option<String>,
    #[serde(rename = "AllocatedAt", default)]
    pub allocated_at: Option<String>,
    #[serde(rename = "ReleasedAt", default)]
    pub released_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetBoxPrefix {
    pub id: u64,
    pub prefix: String,
    pub status: NetBoxStatus,
    pub vrf: Option<NetBoxNested>,
    pub tenant: Option<NetBoxNested>,
    pub role: Option<NetBoxNested>,
    pub scope_type: Option<String>,
    pub scope_id: Option<u64>,
    pub scope: Option<NetBoxNested>,
    pub vlan: Option<NetBoxNested>,
    #[serde(default)]
    pub comments: String,
    /// Machine-owned legacy mirror of cluster presentation; never sourced
    /// from user input. See `netbox_client.py`'s status/description pairing.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub custom_fields: PrefixCustomFields,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetBoxVlan {
    pub id: u64,
    pub vid: u16,
    pub name: String,
    pub group: Option<NetBoxNested>,
    pub tenant: Option<NetBoxNested>,
    pub role: Option<NetBoxNested>,
    pub status: NetBoxStatus,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetBoxVlanGroup {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetBoxTenant {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetBoxRole {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetBoxSiteGroup {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetBoxVrf {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetBoxStatus {
    Active,
    Reserved,
}

impl NetBoxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetBoxStatus::Active => "active",
            NetBoxStatus::Reserved => "reserved",
        }
    }
}

/// Free-form custom-field bag, used when building request bodies where the
/// fixed `PrefixCustomFields` shape doesn't apply (e.g. VLAN payloads have
/// no custom fields today, but the write path is shared).
pub type CustomFieldMap = HashMap<String, Value>;
