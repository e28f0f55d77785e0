//! Refinement Orchestrator: apply one user request to a post.
//!
//! # Flow
//!
//! ```text
//! context ─┬─> constraints ─┐
//!          └─> log text ────┼─> oracle (timeout) ─> validate ─> commit
//! request ──────────────────┘                                    │
//!                                     log + current_post + history
//! ```
//!
//! Nothing is written before the oracle answers with a valid response, so a
//! failed or abandoned call leaves the context and the log untouched.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::context::{Provenance, RefinablePostContext, RefinementRecord};
use crate::error::{OracleError, RefineError};
use crate::oracle::{GenerationOracle, OracleRequest};
use crate::preservation::PreservationReport;

/// Characters of the hook quoted in the constraints block.
pub const HOOK_EXCERPT_CHARS: usize = 50;

pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Reject blank refinement requests before they reach the orchestrator.
pub fn validate_request(request: &str) -> Result<&str, RefineError> {
    let trimmed = request.trim();
    if trimmed.is_empty() {
        return Err(RefineError::EmptyRequest);
    }
    Ok(trimmed)
}

/// The six preservation rules sent with every refinement, followed by
/// what the oracle may change.
pub fn build_constraints(provenance: &Provenance) -> String {
    let hook_excerpt: String = provenance.viral_hook.chars().take(HOOK_EXCERPT_CHARS).collect();

    format!(
        "CRITICAL CONSTRAINTS - MUST BE PRESERVED:\n\
         1. Keep the viral hook as the opening: \"{hook}...\"\n\
         2. Keep the trendjacking connection to: {trend}\n\
         3. Keep the business connection to: {business}\n\
         4. Keep the company voice characteristics from the voice profile\n\
         5. Keep a professional LinkedIn tone and credibility\n\
         6. Keep the {approach} approach structure\n\
         \n\
         REFINEMENT FLEXIBILITY:\n\
         - Adjust wording, tone and emphasis within the constraints\n\
         - Reorganize the content structure if requested\n\
         - Add or modify details as requested\n\
         - Change hashtags, formatting or style elements\n",
        hook = hook_excerpt,
        trend = provenance.trending_topic,
        business = provenance.business_topic,
        approach = provenance.original_approach,
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementOutcome {
    pub refined_post: String,
    pub changes_made: Vec<String>,
    pub preserved_elements: Vec<String>,
    pub rationale: String,
    /// History fragments the oracle says it used. Not verified.
    pub context_references_used: Vec<String>,
    pub preservation: PreservationReport,
}

/// Applies refinements through a shared oracle handle.
#[derive(Clone)]
pub struct RefinementOrchestrator {
    oracle: Arc<dyn GenerationOracle>,
    timeout: Duration,
}

impl RefinementOrchestrator {
    pub fn new(oracle: Arc<dyn GenerationOracle>) -> Self {
        Self {
            oracle,
            timeout: DEFAULT_ORACLE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    /// Build the oracle request for `context` without touching it.
    pub fn build_request(&self, context: &RefinablePostContext, user_request: &str) -> OracleRequest {
        OracleRequest {
            current_post: context.current_post().to_string(),
            user_request: user_request.to_string(),
            pipeline_history: context.log().render_text(),
            trending_topic: context.trending_topic().to_string(),
            business_topic: context.business_topic().to_string(),
            viral_hook: context.viral_hook().to_string(),
            original_approach: context.original_approach().to_string(),
            voice_profile: context.voice_profile().to_json(),
            constraints: build_constraints(context.provenance()),
        }
    }

    /// Refine the current post of `context` according to `user_request`.
    ///
    /// On success the shared log gains one `UserRefinement` step, the
    /// context's current post is replaced and a record is appended. On any
    /// oracle failure (error, timeout, malformed output) nothing changes.
    #[instrument(
        name = "refine",
        skip_all,
        fields(post = %context.id(), oracle = self.oracle.name(), request_len = user_request.len())
    )]
    pub async fn refine(
        &self,
        context: &mut RefinablePostContext,
        user_request: &str,
    ) -> Result<RefinementOutcome, RefineError> {
        let request = self.build_request(context, user_request);
        info!(
            post_chars = request.current_post.chars().count(),
            history_chars = request.pipeline_history.len(),
            "requesting refinement"
        );

        let response = match tokio::time::timeout(self.timeout, self.oracle.refine(&request)).await {
            Ok(Ok(response)) => response.validate(),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(OracleError::Timeout(self.timeout)),
        }
        .map_err(|e| {
            warn!(error = %e, "refinement failed, post left unchanged");
            RefineError::OracleFailure(e)
        })?;

        let preservation = PreservationReport::check(context.provenance(), &response.refined_post);
        if !preservation.all_preserved() {
            warn!(missing = ?preservation.missing(), "refined post may have lost provenance");
        }

        // Commit. No await from here on.
        context.log().write().record_user_refinement(
            context.id(),
            user_request,
            context.current_post(),
            &response.refined_post,
            &response.changes_made,
        );
        context.commit_refinement(
            response.refined_post.clone(),
            RefinementRecord {
                request: user_request.to_string(),
                changes_made: response.changes_made.clone(),
                preserved_elements: response.preserved_elements.clone(),
                rationale: response.refinement_reasoning.clone(),
                timestamp: Utc::now(),
            },
        );

        info!(
            changes = response.changes_made.len(),
            preserved = response.preserved_elements.len(),
            references = response.context_references_used.len(),
            refinements = context.refinement_count(),
            "refinement applied"
        );

        Ok(RefinementOutcome {
            refined_post: response.refined_post,
            changes_made: response.changes_made,
            preserved_elements: response.preserved_elements,
            rationale: response.refinement_reasoning,
            context_references_used: response.context_references_used,
            preservation,
        })
    }
}
