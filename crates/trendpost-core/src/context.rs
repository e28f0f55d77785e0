//! Refinable Post Context: one generated post plus the provenance that
//! later refinements must stay faithful to.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use crate::log::SharedLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(Uuid);

impl PostId {
    pub fn new() -> Self {
        PostId(Uuid::new_v4())
    }
}

impl Default for PostId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PostId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(PostId)
    }
}

/// A company's characteristic communication habits, extracted from a
/// transcript. Unknown fields are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    #[serde(default)]
    pub communication_style: String,
    #[serde(default)]
    pub vocabulary_preferences: Vec<String>,
    #[serde(default)]
    pub sentence_structure: String,
    #[serde(default)]
    pub personality_traits: Vec<String>,
    #[serde(default)]
    pub professional_tone_markers: Vec<String>,
    #[serde(default)]
    pub speaking_patterns: Vec<String>,
    #[serde(default)]
    pub expertise_demonstration: String,
    #[serde(default)]
    pub engagement_approach: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl VoiceProfile {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Fixed facts about how a post was first generated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub trending_topic: String,
    pub business_topic: String,
    pub viral_hook: String,
    pub original_approach: String,
    #[serde(default)]
    pub voice_profile: VoiceProfile,
    pub original_post: String,
}

/// One accepted refinement. Never edited after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementRecord {
    pub request: String,
    pub changes_made: Vec<String>,
    pub preserved_elements: Vec<String>,
    pub rationale: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RefinablePostContext {
    id: PostId,
    provenance: Provenance,
    current_post: String,
    refinement_history: Vec<RefinementRecord>,
    log: SharedLog,
}

/// Serializable view of a context, without the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSnapshot {
    pub id: PostId,
    #[serde(flatten)]
    pub provenance: Provenance,
    pub current_post: String,
    pub refinement_history: Vec<RefinementRecord>,
}

impl RefinablePostContext {
    /// Bind a generated post to its provenance and the run's log.
    /// Empty strings are accepted.
    pub fn initialize(
        trending_topic: impl Into<String>,
        business_topic: impl Into<String>,
        viral_hook: impl Into<String>,
        original_approach: impl Into<String>,
        voice_profile: VoiceProfile,
        final_post: impl Into<String>,
        shared_log: SharedLog,
    ) -> Self {
        Self::from_provenance(
            Provenance {
                trending_topic: trending_topic.into(),
                business_topic: business_topic.into(),
                viral_hook: viral_hook.into(),
                original_approach: original_approach.into(),
                voice_profile,
                original_post: final_post.into(),
            },
            shared_log,
        )
    }

    pub fn from_provenance(provenance: Provenance, shared_log: SharedLog) -> Self {
        Self {
            id: PostId::new(),
            current_post: provenance.original_post.clone(),
            provenance,
            refinement_history: Vec::new(),
            log: shared_log,
        }
    }

    pub fn id(&self) -> PostId {
        self.id
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn trending_topic(&self) -> &str {
        &self.provenance.trending_topic
    }

    pub fn business_topic(&self) -> &str {
        &self.provenance.business_topic
    }

    pub fn viral_hook(&self) -> &str {
        &self.provenance.viral_hook
    }

    pub fn original_approach(&self) -> &str {
        &self.provenance.original_approach
    }

    pub fn voice_profile(&self) -> &VoiceProfile {
        &self.provenance.voice_profile
    }

    pub fn original_post(&self) -> &str {
        &self.provenance.original_post
    }

    pub fn current_post(&self) -> &str {
        &self.current_post
    }

    pub fn refinement_history(&self) -> &[RefinementRecord] {
        &self.refinement_history
    }

    pub fn refinement_count(&self) -> usize {
        self.refinement_history.len()
    }

    pub fn is_refined(&self) -> bool {
        !self.refinement_history.is_empty()
    }

    pub fn log(&self) -> &SharedLog {
        &self.log
    }

    /// Restore the original post, drop its refinement history and remove
    /// this post's user refinements from the shared log. Calling it again
    /// changes nothing. Returns the number of log steps removed.
    pub fn reset(&mut self) -> usize {
        self.current_post.clone_from(&self.provenance.original_post);
        self.refinement_history.clear();
        let removed = self.log.write().remove_refinements_of(self.id);
        debug!(post = %self.id, removed, "post reset to original");
        removed
    }

    pub fn snapshot(&self) -> PostSnapshot {
        PostSnapshot {
            id: self.id,
            provenance: self.provenance.clone(),
            current_post: self.current_post.clone(),
            refinement_history: self.refinement_history.clone(),
        }
    }

    pub(crate) fn commit_refinement(&mut self, refined_post: String, record: RefinementRecord) {
        self.current_post = refined_post;
        self.refinement_history.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepKind;
    use serde_json::json;

    fn context(log: &SharedLog) -> RefinablePostContext {
        RefinablePostContext::initialize(
            "Super Bowl blackout",
            "Prompt Engineering",
            "Superbowl organizers just made a HUGE mistake",
            "Question/Discussion",
            VoiceProfile::default(),
            "Hello world #AI",
            log.clone(),
        )
    }

    #[test]
    fn test_initialize_sets_current_to_original() {
        let ctx = context(&SharedLog::new());
        assert_eq!(ctx.current_post(), "Hello world #AI");
        assert_eq!(ctx.original_post(), ctx.current_post());
        assert!(ctx.refinement_history().is_empty());
        assert!(!ctx.is_refined());
    }

    #[test]
    fn test_initialize_accepts_empty_fields() {
        let ctx = RefinablePostContext::initialize("", "", "", "", VoiceProfile::default(), "", SharedLog::new());
        assert_eq!(ctx.current_post(), "");
    }

    #[test]
    fn test_contexts_share_one_log() {
        let log = SharedLog::new();
        let a = context(&log);
        let b = context(&log);
        assert!(a.log().same_log(b.log()));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let log = SharedLog::new();
        let mut ctx = context(&log);
        log.write().record_post_generation("Question/Discussion", "hook", "Hello world #AI", "#AI");
        log.write().record_user_refinement(ctx.id(), "shorter", "Hello world #AI", "Hi #AI", &[]);
        ctx.commit_refinement(
            "Hi #AI".to_string(),
            RefinementRecord {
                request: "shorter".to_string(),
                changes_made: vec![],
                preserved_elements: vec![],
                rationale: String::new(),
                timestamp: Utc::now(),
            },
        );

        assert_eq!(ctx.reset(), 1);
        let after_first = (ctx.current_post().to_string(), ctx.refinement_count(), log.len());
        assert_eq!(ctx.reset(), 0);
        let after_second = (ctx.current_post().to_string(), ctx.refinement_count(), log.len());

        assert_eq!(after_first, after_second);
        assert_eq!(ctx.current_post(), "Hello world #AI");
        assert_eq!(log.read().count_of(&StepKind::UserRefinement), 0);
    }

    #[test]
    fn test_voice_profile_keeps_unknown_fields() {
        let profile: VoiceProfile = serde_json::from_value(json!({
            "communication_style": "technical expert",
            "personality_traits": ["innovative", "analytical"],
            "signature_sign_off": "Stay curious"
        }))
        .unwrap();

        assert_eq!(profile.communication_style, "technical expert");
        assert_eq!(profile.extra["signature_sign_off"], json!("Stay curious"));
        assert!(profile.to_json().contains("signature_sign_off"));
    }

    #[test]
    fn test_post_id_parses() {
        let id = PostId::new();
        assert_eq!(id.to_string().parse::<PostId>().unwrap(), id);
        assert!("not-a-uuid".parse::<PostId>().is_err());
    }
}
