//! Core domain logic shared by the gateway, store, and engine crates:
//! the in-memory query AST, the `IpamGateway` seam, and the VLAN/VLAN-group
//! naming rules that couple a Segment to its backing IPAM objects.

pub mod gateway;
pub mod query;
pub mod vlan_naming;

pub use gateway::{GatewayError, IpamGateway, VlanWrite, PrefixWrite};
pub use query::{Query, SegmentField};
pub use vlan_naming::{sanitize_slug, vlan_group_name};
