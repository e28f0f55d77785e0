//! Generation Oracle: the boundary to the external language model.
//!
//! Requests and responses are explicit records. A response without a usable
//! `refined_post` is malformed and must never be applied.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::error::OracleError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub current_post: String,
    pub user_request: String,
    pub pipeline_history: String,
    pub trending_topic: String,
    pub business_topic: String,
    pub viral_hook: String,
    pub original_approach: String,
    /// Voice profile as a JSON document
    pub voice_profile: String,
    pub constraints: String,
}

/// Every field is required; a reply missing any of them is malformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleResponse {
    pub refined_post: String,
    pub changes_made: Vec<String>,
    pub preserved_elements: Vec<String>,
    #[serde(alias = "rationale")]
    pub refinement_reasoning: String,
    pub context_references_used: Vec<String>,
}

impl OracleResponse {
    pub fn validate(self) -> Result<Self, OracleError> {
        if self.refined_post.trim().is_empty() {
            return Err(OracleError::Malformed("refined_post is empty".to_string()));
        }
        Ok(self)
    }
}

#[async_trait]
pub trait GenerationOracle: Send + Sync {
    /// Short name used in logs (e.g. "openrouter:openai/gpt-4o")
    fn name(&self) -> &str {
        "oracle"
    }

    async fn refine(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError>;
}

/// Oracle that replays a queue of canned results and records every request.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Result<OracleResponse, OracleError>>>,
    requests: Mutex<Vec<OracleRequest>>,
    delay: Option<Duration>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every answer, e.g. to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn then_refine(self, refined_post: impl Into<String>, changes: &[&str]) -> Self {
        self.then_respond(OracleResponse {
            refined_post: refined_post.into(),
            changes_made: changes.iter().map(|c| c.to_string()).collect(),
            preserved_elements: vec!["viral hook".to_string()],
            refinement_reasoning: "scripted".to_string(),
            context_references_used: vec![],
        })
    }

    pub fn then_respond(self, response: OracleResponse) -> Self {
        self.push(Ok(response));
        self
    }

    pub fn then_fail(self, error: OracleError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn push(&self, result: Result<OracleResponse, OracleError>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl GenerationOracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn refine(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Provider("script exhausted".to_string())))
    }
}
