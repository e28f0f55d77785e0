//! Unified Error Model
use std::time::Duration;
use thiserror::Error;

/// Failure reported by (or on behalf of) the generation oracle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("ORACLE/TIMEOUT: no response within {0:?}")]
    Timeout(Duration),

    #[error("ORACLE/PROVIDER: {0}")]
    Provider(String),

    #[error("ORACLE/MALFORMED: {0}")]
    Malformed(String),

    #[error("ORACLE/TRANSPORT: {0}")]
    Transport(String),
}

/// Errors surfaced by a refinement attempt. Both are retryable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RefineError {
    /// The oracle could not produce a usable response; nothing was applied.
    #[error("refinement not applied: {0}")]
    OracleFailure(#[from] OracleError),

    /// Raised by [`crate::refiner::validate_request`] before the orchestrator runs.
    #[error("REQUEST/EMPTY: refinement request is blank")]
    EmptyRequest,
}

#[derive(Error, Debug)]
pub enum TrendpostError {
    #[error(transparent)]
    Refine(#[from] RefineError),

    #[error("SNAPSHOT/{0}")]
    Snapshot(String),

    #[error("CONFIG/{0}")]
    Config(String),

    #[error("SESSION/{0}")]
    Session(String),

    #[error("SERIALIZE/{0}")]
    Serialize(String),
}

impl From<OracleError> for TrendpostError {
    fn from(err: OracleError) -> Self {
        TrendpostError::Refine(RefineError::OracleFailure(err))
    }
}
