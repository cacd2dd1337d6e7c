/// Engine errors.
///
/// `InvalidInput` is always surfaced to the caller. `InvariantViolation`
/// means a state vector failed validation and the operation must stop before
/// anything is persisted. `EnrichmentUnavailable` is recovered inside the
/// confirmation pass by dropping the affected candidate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("enrichment unavailable for {subject}: {reason}")]
    EnrichmentUnavailable { subject: String, reason: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
