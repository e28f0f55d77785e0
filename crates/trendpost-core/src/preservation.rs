//! Advisory check that a refined post still carries its provenance.
//!
//! The oracle is only instructed to keep the hook, trend and business topic;
//! this report tells the caller whether the returned text visibly does. It
//! never blocks a refinement.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::Provenance;

/// Words of the hook that must survive for it to count as kept.
const HOOK_KEY_WORDS: usize = 4;
/// Shorter topic words ("the", "of", "AI") are not used for fuzzy matching.
const MIN_TOPIC_WORD_LEN: usize = 4;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreservationReport {
    pub hook_phrase: bool,
    pub trending_topic: bool,
    pub business_topic: bool,
}

impl PreservationReport {
    pub fn check(provenance: &Provenance, text: &str) -> Self {
        let haystack = normalize(text);
        Self {
            hook_phrase: hook_kept(&provenance.viral_hook, &haystack),
            trending_topic: topic_mentioned(&provenance.trending_topic, &haystack),
            business_topic: topic_mentioned(&provenance.business_topic, &haystack),
        }
    }

    pub fn all_preserved(&self) -> bool {
        self.hook_phrase && self.trending_topic && self.business_topic
    }

    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.hook_phrase {
            missing.push("viral hook");
        }
        if !self.trending_topic {
            missing.push("trending topic");
        }
        if !self.business_topic {
            missing.push("business topic");
        }
        missing
    }
}

/// Lowercase, punctuation collapsed to single spaces, padded with spaces so
/// that phrase lookups only match whole words.
fn normalize(text: &str) -> String {
    let collapsed = NON_WORD.replace_all(&text.to_lowercase(), " ").trim().to_string();
    format!(" {} ", collapsed)
}

fn hook_kept(hook: &str, haystack: &str) -> bool {
    let hook = normalize(hook);
    let words: Vec<&str> = hook.split_whitespace().take(HOOK_KEY_WORDS).collect();
    if words.is_empty() {
        return true;
    }
    haystack.contains(&format!(" {} ", words.join(" ")))
}

fn topic_mentioned(topic: &str, haystack: &str) -> bool {
    let normalized = normalize(topic);
    if normalized.trim().is_empty() || haystack.contains(&normalized) {
        return true;
    }

    let significant: Vec<&str> = normalized
        .split_whitespace()
        .filter(|w| w.chars().count() >= MIN_TOPIC_WORD_LEN)
        .collect();
    if significant.is_empty() {
        return false;
    }

    let hits = significant
        .iter()
        .filter(|w| haystack.contains(&format!(" {} ", w)))
        .count();
    hits * 2 >= significant.len()
}
