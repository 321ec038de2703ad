//! Error taxonomy surfaced by the Allocation Engine (spec.md §7), the
//! outermost layer a caller (the Request Surface, or a test) sees. Composed
//! from `StoreError`/`GatewayError`/`ValidationError` the way
//! `net-core::error::NetworkError` composes its layer errors.

use segment_store::StoreError;
use segment_validate::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("pool exhausted")]
    PoolExhausted,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("IPAM unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<segment_core::gateway::GatewayError> for EngineError {
    fn from(e: segment_core::gateway::GatewayError) -> Self {
        use segment_core::gateway::GatewayError as G;
        match e {
            G::Unauthorized => EngineError::Unauthorized(e.to_string()),
            G::Forbidden(_) => EngineError::Unauthorized(e.to_string()),
            G::Timeout(_) | G::Network(_) => EngineError::Unavailable(e.to_string()),
            G::ServerError(_) => EngineError::Unavailable(e.to_string()),
            G::NotFound(msg) => EngineError::NotFound(msg),
            G::BadRequest(msg) => EngineError::BadRequest(msg),
            G::Serialization(msg) => EngineError::Internal(msg),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            StoreError::BadRequest(msg) => EngineError::BadRequest(msg),
            StoreError::Conflict => EngineError::Conflict("claim retry budget exhausted".into()),
            StoreError::PoolExhausted => EngineError::PoolExhausted,
            StoreError::Internal(msg) => EngineError::Internal(msg),
            StoreError::Gateway(g) => g.into(),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::Gateway(g) => g.into(),
            other => EngineError::BadRequest(other.to_string()),
        }
    }
}
