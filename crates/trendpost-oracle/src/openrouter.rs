//! OpenRouter oracle: refinement over an OpenAI-compatible chat endpoint.
//!
//! API key: `OPENROUTER_API_KEY` (a `.env` file is honoured). The model is
//! asked for a JSON object; its content is parsed into an [`OracleResponse`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use trendpost_core::config::ENV_API_KEY;
use trendpost_core::{GenerationOracle, OracleConfig, OracleError, OracleRequest, OracleResponse};

use crate::prompts::{PromptError, PromptRenderer};

const REFERER: &str = "https://trendpost.local";
const TITLE: &str = "Trendpost-Refiner";
const ERROR_BODY_LIMIT: usize = 300;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("SETUP/API_KEY: {0} is not set")]
    MissingApiKey(&'static str),

    #[error("SETUP/CLIENT: {0}")]
    Client(String),

    #[error(transparent)]
    Prompt(#[from] PromptError),
}

// OpenAI-compatible request/response
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenRouterOracle {
    api_key: String,
    api_base: String,
    model: String,
    name: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    prompts: PromptRenderer,
    client: reqwest::Client,
}

impl OpenRouterOracle {
    pub fn new(api_key: impl Into<String>, config: &OracleConfig) -> Result<Self, SetupError> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(SetupError::MissingApiKey(ENV_API_KEY));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SetupError::Client(e.to_string()))?;

        Ok(Self {
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            name: format!("openrouter:{}", config.model),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
            prompts: PromptRenderer::builtin()?,
            client,
        })
    }

    /// Key from `OPENROUTER_API_KEY`, after loading `.env` if present.
    pub fn from_env(config: &OracleConfig) -> Result<Self, SetupError> {
        let _ = dotenvy::dotenv();
        let key = std::env::var(ENV_API_KEY).map_err(|_| SetupError::MissingApiKey(ENV_API_KEY))?;
        Self::new(key, config)
    }

    pub fn with_prompts(mut self, prompts: PromptRenderer) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn transport_error(&self, err: reqwest::Error) -> OracleError {
        if err.is_timeout() {
            OracleError::Timeout(self.timeout)
        } else {
            OracleError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl GenerationOracle for OpenRouterOracle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn refine(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        let messages = self
            .prompts
            .render(request)
            .map_err(|e| OracleError::Provider(e.to_string()))?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: messages.system },
                ChatMessage { role: "user", content: messages.user },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat { kind: "json_object" },
        };

        debug!(model = %self.model, "sending refinement request");

        let res = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "openrouter rejected refinement request");
            return Err(OracleError::Provider(format!(
                "{}: {}",
                status,
                truncate(&body, ERROR_BODY_LIMIT)
            )));
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| OracleError::Malformed(format!("chat response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::Malformed("no message content in response".to_string()))?;

        parse_oracle_content(&content)
    }
}

/// Parse a model reply into a validated response.
///
/// Accepts a bare object, an object inside a ``` fence, or an object with
/// prose around it.
pub fn parse_oracle_content(content: &str) -> Result<OracleResponse, OracleError> {
    let json = extract_json_object(content)
        .ok_or_else(|| OracleError::Malformed("reply contains no JSON object".to_string()))?;

    let response: OracleResponse =
        serde_json::from_str(json).map_err(|e| OracleError::Malformed(e.to_string()))?;
    response.validate()
}

fn extract_json_object(content: &str) -> Option<&str> {
    let trimmed = content.trim();
    let unfenced = match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.trim_start_matches("json");
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    };

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    (start < end).then(|| &unfenced[start..=end])
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_REPLY: &str = r#"{"refined_post": "Hi #AI", "changes_made": ["shortened"], "preserved_elements": ["hook"], "refinement_reasoning": "asked for brevity", "context_references_used": ["Post Generation"]}"#;

    #[test]
    fn test_parse_bare_object() {
        let response = parse_oracle_content(FULL_REPLY).unwrap();

        assert_eq!(response.refined_post, "Hi #AI");
        assert_eq!(response.changes_made, vec!["shortened".to_string()]);
        assert_eq!(response.context_references_used, vec!["Post Generation".to_string()]);
    }

    #[test]
    fn test_parse_fenced_object() {
        let content = format!("```json\n{}\n```", FULL_REPLY);
        assert_eq!(parse_oracle_content(&content).unwrap().refined_post, "Hi #AI");
    }

    #[test]
    fn test_parse_object_with_prose() {
        let content = "Here you go:\n{\"refined_post\": \"Hi #AI\", \"changes_made\": [], \"preserved_elements\": [], \"rationale\": \"short\", \"context_references_used\": []}\nHope it helps.";
        let response = parse_oracle_content(content).unwrap();
        assert_eq!(response.refinement_reasoning, "short");
    }

    #[test]
    fn test_parse_rejects_missing_post() {
        let err = parse_oracle_content(r#"{"changes_made": []}"#).unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));
    }

    #[test]
    fn test_parse_rejects_partial_reply() {
        let err = parse_oracle_content(r#"{"refined_post": "Hi #AI"}"#).unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));

        let fenced = "```json\n{\"refined_post\": \"Hi #AI\", \"changes_made\": []}\n```";
        assert!(matches!(parse_oracle_content(fenced), Err(OracleError::Malformed(_))));
    }

    #[test]
    fn test_parse_rejects_blank_post() {
        let blank = FULL_REPLY.replace("\"Hi #AI\"", "\"   \"");
        let err = parse_oracle_content(&blank).unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));
    }

    #[test]
    fn test_parse_rejects_plain_text() {
        let err = parse_oracle_content("Sure, here is a shorter post: Hi #AI").unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));
    }

    #[test]
    fn test_empty_key_rejected() {
        let result = OpenRouterOracle::new("  ", &OracleConfig::default());
        assert!(matches!(result, Err(SetupError::MissingApiKey(ENV_API_KEY))));
    }

    #[test]
    fn test_name_includes_model() {
        let oracle = OpenRouterOracle::new("sk-test", &OracleConfig::default()).unwrap();
        assert_eq!(oracle.name(), "openrouter:openai/gpt-4o");
        assert_eq!(oracle.endpoint(), "https://openrouter.ai/api/v1/chat/completions");
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
