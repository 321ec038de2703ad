//! Outermost error type a caller of the Request Surface sees, composing
//! `EngineError` and configuration failures the way `net-core::error::NetworkError`
//! composes its layer errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Engine(#[from] segment_engine::EngineError),
}
