//! Shared domain types for the VLAN pool allocator.
//!
//! These types are the wire-level contract between `segment-gateway` (the
//! NetBox adapter), `segment-store` (the Segment-shaped view over it), and
//! every consumer above. Nothing in here talks to the network.

pub mod ipam;
pub mod segment;

pub use ipam::{NetBoxPrefix, NetBoxRole, NetBoxSiteGroup, NetBoxStatus, NetBoxTenant, NetBoxVlan, NetBoxVlanGroup, NetBoxVrf};
pub use segment::{Segment, SegmentUpdate};
