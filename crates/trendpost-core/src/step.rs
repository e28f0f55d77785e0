//! Pipeline Step: one recorded event of a generation run
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::context::PostId;

/// Which pipeline stage produced a step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    TrendAnalysis,
    ViralHookGeneration,
    PostGeneration,
    VoiceAdaptation,
    UserRefinement,
    /// Stage named by the caller (e.g. "Concise Structure Generation")
    Custom(String),
}

impl StepKind {
    pub fn label(&self) -> &str {
        match self {
            StepKind::TrendAnalysis => "Trend Analysis",
            StepKind::ViralHookGeneration => "Viral Hook Generation",
            StepKind::PostGeneration => "Post Generation",
            StepKind::VoiceAdaptation => "Voice Adaptation",
            StepKind::UserRefinement => "User Refinement",
            StepKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single input or output value of a step.
///
/// `Opaque` holds handles with no structural serialization; they are
/// rendered and serialized through their `Debug` form.
#[derive(Debug, Clone)]
pub enum StepValue {
    Json(Value),
    Opaque(Arc<dyn fmt::Debug + Send + Sync>),
}

impl StepValue {
    pub fn opaque<T>(value: T) -> Self
    where
        T: fmt::Debug + Send + Sync + 'static,
    {
        StepValue::Opaque(Arc::new(value))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            StepValue::Json(value) => Some(value),
            StepValue::Opaque(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Value::as_str)
    }

    /// Best-effort JSON form: opaque handles become their debug string.
    pub fn coerce(&self) -> Value {
        match self {
            StepValue::Json(value) => value.clone(),
            StepValue::Opaque(handle) => Value::String(format!("{:?}", handle)),
        }
    }
}

impl Serialize for StepValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StepValue::Json(value) => value.serialize(serializer),
            StepValue::Opaque(handle) => serializer.serialize_str(&format!("{:?}", handle)),
        }
    }
}

impl<'de> Deserialize<'de> for StepValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(StepValue::Json)
    }
}

impl From<Value> for StepValue {
    fn from(value: Value) -> Self {
        StepValue::Json(value)
    }
}

impl From<&str> for StepValue {
    fn from(value: &str) -> Self {
        StepValue::Json(Value::String(value.to_string()))
    }
}

impl From<String> for StepValue {
    fn from(value: String) -> Self {
        StepValue::Json(Value::String(value))
    }
}

impl From<Vec<String>> for StepValue {
    fn from(value: Vec<String>) -> Self {
        StepValue::Json(Value::from(value))
    }
}

impl From<&[String]> for StepValue {
    fn from(value: &[String]) -> Self {
        StepValue::Json(Value::from(value.to_vec()))
    }
}

impl From<bool> for StepValue {
    fn from(value: bool) -> Self {
        StepValue::Json(Value::Bool(value))
    }
}

impl From<i64> for StepValue {
    fn from(value: i64) -> Self {
        StepValue::Json(Value::from(value))
    }
}

impl From<f64> for StepValue {
    fn from(value: f64) -> Self {
        StepValue::Json(Value::from(value))
    }
}

/// Named inputs or outputs of a step. Ordered by key so rendering is stable.
pub type StepFields = BTreeMap<String, StepValue>;

/// Build a [`StepFields`] map from `(name, value)` pairs.
pub fn fields<K, I>(pairs: I) -> StepFields
where
    K: Into<String>,
    I: IntoIterator<Item = (K, StepValue)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    #[serde(rename = "step")]
    pub kind: StepKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub inputs: StepFields,
    #[serde(default)]
    pub outputs: StepFields,
    #[serde(default)]
    pub rationale: String,
    /// Post that requested this step; set on user refinements only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<PostId>,
}
