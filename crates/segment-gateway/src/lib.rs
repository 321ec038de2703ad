//! NetBox-backed implementation of the `IpamGateway` seam defined in
//! `segment-core`. Grounded on `sdn-drivers/src/ipam/netbox.rs`, extended
//! with bounded worker pools, per-call timing bands, and a retry combinator
//! restricted to idempotent operations (spec.md §4.1).

pub mod netbox;
pub mod pool;
pub mod retry;
pub mod timing;

pub use netbox::NetBoxGateway;
pub use pool::WorkerPools;
pub use retry::{with_retry, RetryPolicy};
pub use segment_core::gateway::GatewayError;
