//! Prompt templates for the refinement call.
//!
//! Templates live in a YAML file (`refinement-prompts.yaml`) and are
//! rendered with Handlebars against the [`OracleRequest`] fields. HTML
//! escaping is off: the output is a chat message, not markup.

use handlebars::Handlebars;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use trendpost_core::OracleRequest;

pub const SYSTEM_TEMPLATE: &str = "refine_system";
pub const USER_TEMPLATE: &str = "refine_user";

const BUILTIN_PROMPTS: &str = include_str!("../templates/refinement-prompts.yaml");

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("PROMPT/PARSE: {0}")]
    Parse(String),

    #[error("PROMPT/MISSING: template {0:?} not defined")]
    Missing(&'static str),

    #[error("PROMPT/TEMPLATE: {name}: {message}")]
    Template { name: String, message: String },

    #[error("PROMPT/RENDER: {0}")]
    Render(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptsFile {
    pub version: String,
    pub templates: HashMap<String, PromptTemplate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplate {
    pub description: String,
    pub template: String,
}

/// Rendered chat messages for one refinement.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptMessages {
    pub system: String,
    pub user: String,
}

pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl PromptRenderer {
    /// Templates shipped with the crate.
    pub fn builtin() -> Result<Self, PromptError> {
        Self::from_yaml(BUILTIN_PROMPTS)
    }

    pub fn load(path: &str) -> Result<Self, PromptError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PromptError::Parse(format!("{}: {}", path, e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, PromptError> {
        let file: PromptsFile =
            serde_yaml::from_str(yaml).map_err(|e| PromptError::Parse(e.to_string()))?;

        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);

        for required in [SYSTEM_TEMPLATE, USER_TEMPLATE] {
            if !file.templates.contains_key(required) {
                return Err(PromptError::Missing(required));
            }
        }

        for (name, template) in &file.templates {
            handlebars
                .register_template_string(name, &template.template)
                .map_err(|e| PromptError::Template {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
        }

        Ok(Self { handlebars })
    }

    pub fn render(&self, request: &OracleRequest) -> Result<PromptMessages, PromptError> {
        Ok(PromptMessages {
            system: self.render_one(SYSTEM_TEMPLATE, request)?,
            user: self.render_one(USER_TEMPLATE, request)?,
        })
    }

    fn render_one(&self, name: &str, request: &OracleRequest) -> Result<String, PromptError> {
        self.handlebars
            .render(name, request)
            .map_err(|e| PromptError::Render(e.to_string()))
    }
}
