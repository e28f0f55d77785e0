//! Trendpost Core: step log, refinable posts and refinement orchestration
//!
//! A generation run records each stage in a [`PipelineStepLog`]. Every post
//! produced by the run becomes a [`RefinablePostContext`] holding its
//! provenance and a [`SharedLog`] handle to that one log. User follow-ups go
//! through the [`RefinementOrchestrator`], which replays the log to a
//! [`GenerationOracle`] and folds the answer back in.

pub mod config;
pub mod context;
pub mod error;
pub mod log;
pub mod oracle;
pub mod preservation;
pub mod refiner;
pub mod session;
pub mod snapshot;
pub mod step;

pub use config::{OracleConfig, TrendpostConfig};
pub use context::{PostId, PostSnapshot, Provenance, RefinablePostContext, RefinementRecord, VoiceProfile};
pub use error::{OracleError, RefineError, TrendpostError};
pub use log::{PipelineStepLog, SharedLog};
pub use oracle::{GenerationOracle, OracleRequest, OracleResponse, ScriptedOracle};
pub use preservation::PreservationReport;
pub use refiner::{build_constraints, validate_request, RefinementOrchestrator, RefinementOutcome};
pub use session::{Session, SessionId};
pub use snapshot::ArtifactStore;
pub use step::{fields, PipelineStep, StepFields, StepKind, StepValue};

/// Crate version
pub const TRENDPOST_VERSION: &str = env!("CARGO_PKG_VERSION");
