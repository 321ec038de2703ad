//! Error taxonomy for the Segment Store, composing `GatewayError` the way
//! `net-core::error::NetworkError` composes its layer errors (spec.md §7 /
//! SPEC_FULL.md §8).

use segment_core::gateway::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("segment not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("concurrent modification conflict")]
    Conflict,

    #[error("pool exhausted")]
    PoolExhausted,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, StoreError::Gateway(GatewayError::Unauthorized))
    }
}
