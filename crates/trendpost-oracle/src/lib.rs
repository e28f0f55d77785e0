//! Trendpost Oracle: the production [`GenerationOracle`] backed by OpenRouter.
//!
//! [`GenerationOracle`]: trendpost_core::GenerationOracle

pub mod openrouter;
pub mod prompts;

pub use openrouter::{parse_oracle_content, OpenRouterOracle, SetupError};
pub use prompts::{PromptError, PromptMessages, PromptRenderer};
