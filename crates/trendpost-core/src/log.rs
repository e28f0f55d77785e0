//! Pipeline Step Log: ordered record of how a batch of posts was produced.
//!
//! The log is replayed as plain text into the refinement prompt, so the
//! rendering must be deterministic and must never fail. A run owns exactly
//! one log; every post context of the run holds a [`SharedLog`] handle to it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::context::{PostId, VoiceProfile};
use crate::error::TrendpostError;
use crate::step::{fields, PipelineStep, StepFields, StepKind, StepValue};

/// Maximum characters of a scalar value kept when rendering.
pub const VALUE_RENDER_LIMIT: usize = 200;

const HISTORY_HEADER: &str = "COMPLETE PIPELINE CONVERSATION HISTORY:";
const DIVIDER_WIDTH: usize = 60;

#[derive(Debug, Clone, Default)]
pub struct PipelineStepLog {
    steps: Vec<PipelineStep>,
}

#[derive(Serialize)]
struct SavedHistory<'a> {
    messages: &'a [PipelineStep],
    saved_at: DateTime<Utc>,
}

impl PipelineStepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step at the end of the log. Always succeeds.
    pub fn append_step(
        &mut self,
        kind: StepKind,
        inputs: StepFields,
        outputs: StepFields,
        rationale: impl Into<String>,
    ) -> &PipelineStep {
        self.push(kind, inputs, outputs, rationale.into(), None)
    }

    fn push(
        &mut self,
        kind: StepKind,
        inputs: StepFields,
        outputs: StepFields,
        rationale: String,
        owner: Option<PostId>,
    ) -> &PipelineStep {
        // Clamp so timestamps never go backwards if the wall clock does.
        let now = Utc::now();
        let timestamp = match self.steps.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };

        debug!(step = %kind, position = self.steps.len() + 1, "pipeline step appended");
        self.steps.push(PipelineStep {
            kind,
            timestamp,
            inputs,
            outputs,
            rationale,
            owner,
        });
        &self.steps[self.steps.len() - 1]
    }

    /// Remove every step of `kind`, keeping the rest in order.
    /// Returns how many steps were dropped.
    pub fn remove_steps_of_kind(&mut self, kind: &StepKind) -> usize {
        let before = self.steps.len();
        self.steps.retain(|step| &step.kind != kind);
        before - self.steps.len()
    }

    /// Remove the user refinements recorded on behalf of one post.
    pub fn remove_refinements_of(&mut self, owner: PostId) -> usize {
        let before = self.steps.len();
        self.steps.retain(|step| {
            !(step.kind == StepKind::UserRefinement && step.owner == Some(owner))
        });
        before - self.steps.len()
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn count_of(&self, kind: &StepKind) -> usize {
        self.steps.iter().filter(|step| &step.kind == kind).count()
    }

    /// Serialize the log as prompt context. Total and deterministic.
    pub fn render_text(&self) -> String {
        let mut text = format!("{}\n\n", HISTORY_HEADER);

        for (i, step) in self.steps.iter().enumerate() {
            text.push_str(&format!("=== STEP {}: {} ===\n", i + 1, step.kind));
            text.push_str(&format!("Timestamp: {}\n\n", step.timestamp.to_rfc3339()));

            text.push_str("INPUTS:\n");
            render_fields(&mut text, &step.inputs);

            text.push_str("\nOUTPUTS:\n");
            render_fields(&mut text, &step.outputs);

            if !step.rationale.is_empty() {
                text.push_str(&format!("\nRATIONALE: {}\n", step.rationale));
            }

            text.push('\n');
            text.push_str(&"=".repeat(DIVIDER_WIDTH));
            text.push_str("\n\n");
        }

        text
    }

    /// `blake3:` digest of the rendered history.
    pub fn fingerprint(&self) -> String {
        format!("blake3:{}", blake3::hash(self.render_text().as_bytes()))
    }

    /// Write the log as `{messages, saved_at}` JSON. Opaque values are
    /// stored as their debug strings. Returns the path written.
    pub fn save_json(&self, path: &Path) -> Result<PathBuf, TrendpostError> {
        let saved = SavedHistory {
            messages: &self.steps,
            saved_at: Utc::now(),
        };

        let body = serde_json::to_string_pretty(&saved)
            .map_err(|e| TrendpostError::Serialize(e.to_string()))?;
        std::fs::write(path, body)
            .map_err(|e| TrendpostError::Snapshot(format!("{}: {}", path.display(), e)))?;
        Ok(path.to_path_buf())
    }

    // ------------------------------------------------------------------
    // Typed recorders for the generation stages
    // ------------------------------------------------------------------

    pub fn record_trend_analysis(
        &mut self,
        trending_urls: &[String],
        extracted_content: Value,
        primary_topic: &str,
    ) -> &PipelineStep {
        self.append_step(
            StepKind::TrendAnalysis,
            fields([("trending_urls", StepValue::from(trending_urls))]),
            fields([
                ("extracted_content", StepValue::from(extracted_content)),
                ("primary_trending_topic", StepValue::from(primary_topic)),
            ]),
            "Analyzed the trending URLs and picked the primary topic to trendjack",
        )
    }

    pub fn record_viral_hooks(
        &mut self,
        trending_topic: &str,
        business_topic: &str,
        hooks: &BTreeMap<String, String>,
    ) -> &PipelineStep {
        let hooks: serde_json::Map<String, Value> = hooks
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        self.append_step(
            StepKind::ViralHookGeneration,
            fields([
                ("trending_topic", StepValue::from(trending_topic)),
                ("business_topic", StepValue::from(business_topic)),
            ]),
            fields([("hooks", StepValue::from(Value::Object(hooks)))]),
            "Generated viral hooks from proven short-form patterns to open each post",
        )
    }

    pub fn record_post_generation(
        &mut self,
        approach: &str,
        viral_hook: &str,
        content: &str,
        hashtags: &str,
    ) -> &PipelineStep {
        self.append_step(
            StepKind::PostGeneration,
            fields([
                ("approach", StepValue::from(approach)),
                ("viral_hook", StepValue::from(viral_hook)),
            ]),
            fields([
                ("content", StepValue::from(content)),
                ("hashtags", StepValue::from(hashtags)),
            ]),
            format!("Generated a {} post with the viral hook as its opening line", approach),
        )
    }

    pub fn record_voice_adaptation(
        &mut self,
        original_post: &str,
        voice_profile: &VoiceProfile,
        adapted_post: &str,
        voice_changes: &[String],
    ) -> &PipelineStep {
        self.append_step(
            StepKind::VoiceAdaptation,
            fields([
                ("original_post", StepValue::from(original_post)),
                ("voice_profile", StepValue::from(voice_profile.to_value())),
            ]),
            fields([
                ("adapted_post", StepValue::from(adapted_post)),
                ("voice_changes", StepValue::from(voice_changes)),
            ]),
            "Rewrote the post in the company voice, keeping the hook and the trend reference",
        )
    }

    pub fn record_user_refinement(
        &mut self,
        owner: PostId,
        user_request: &str,
        previous_post: &str,
        refined_post: &str,
        changes_made: &[String],
    ) -> &PipelineStep {
        self.push(
            StepKind::UserRefinement,
            fields([
                ("user_request", StepValue::from(user_request)),
                ("previous_post", StepValue::from(previous_post)),
            ]),
            fields([
                ("refined_post", StepValue::from(refined_post)),
                ("changes_made", StepValue::from(changes_made)),
            ]),
            "Applied the user's refinement while keeping pipeline context and constraints".to_string(),
            Some(owner),
        )
    }
}

fn render_fields(text: &mut String, fields: &StepFields) {
    for (key, value) in fields {
        text.push_str(&format!("  {}: {}\n", key, render_value(value)));
    }
}

/// Render one value: structures pretty-printed, scalars truncated.
pub fn render_value(value: &StepValue) -> String {
    match value {
        StepValue::Json(structured @ (Value::Array(_) | Value::Object(_))) => format!("{:#}", structured),
        StepValue::Json(Value::String(s)) => truncate_for_render(s),
        StepValue::Json(scalar) => truncate_for_render(&scalar.to_string()),
        StepValue::Opaque(handle) => truncate_for_render(&format!("{:?}", handle)),
    }
}

fn truncate_for_render(text: &str) -> String {
    match text.char_indices().nth(VALUE_RENDER_LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Shared handle to the one log of a generation run.
///
/// Clones point at the same log; mutations through any handle are visible
/// to all of them.
#[derive(Debug, Clone, Default)]
pub struct SharedLog(Arc<RwLock<PipelineStepLog>>);

impl SharedLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_log(log: PipelineStepLog) -> Self {
        SharedLog(Arc::new(RwLock::new(log)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, PipelineStepLog> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, PipelineStepLog> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn render_text(&self) -> String {
        self.read().render_text()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// True when both handles refer to the same log.
    pub fn same_log(&self, other: &SharedLog) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
