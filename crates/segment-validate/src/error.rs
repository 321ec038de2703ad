use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0}")]
    BadRequest(String),

    /// CIDR was well-formed but not in canonical network form (spec.md §4.6:
    /// "strict format... non-canonical input is rejected with the
    /// canonicalized form suggested").
    #[error("invalid network format: '{given}' is not in canonical form, use '{suggested}' instead")]
    NonCanonicalCidr { given: String, suggested: String },

    #[error(transparent)]
    Gateway(#[from] segment_core::gateway::GatewayError),
}
