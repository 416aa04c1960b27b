use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Token usage reported alongside a generated badge.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl TokenMetrics {
    /// Reads counts from an object using either `input_tokens`/`output_tokens`
    /// or `prompt_tokens`/`completion_tokens` naming. Returns `None` when no
    /// count is present.
    pub fn from_object(value: &Value) -> Option<Self> {
        let count = |keys: &[&str]| keys.iter().find_map(|key| value.get(*key)?.as_u64());
        let metrics = Self {
            input_tokens: count(&["input_tokens", "prompt_tokens", "inputTokens", "promptTokens"]),
            output_tokens: count(&[
                "output_tokens",
                "completion_tokens",
                "outputTokens",
                "completionTokens",
            ]),
            total_tokens: count(&["total_tokens", "totalTokens"]),
        };
        (metrics != Self::default()).then_some(metrics)
    }
}

/// An Open Badges skill alignment suggested for the credential.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    #[serde(default, alias = "title")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Fields not modelled above, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Skill {
    /// Parses a skill from a JSON object. Non-objects and objects with
    /// ill-typed fields yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}

/// Normalized badge suggestion, independent of the backend schema that
/// produced it.
///
/// Values are never edited in place; the `with_*` methods return a new value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BadgeSuggestion {
    title: String,
    description: String,
    criteria: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metrics: Option<TokenMetrics>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    skills: Vec<Skill>,
}

impl BadgeSuggestion {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        criteria: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            criteria: criteria.into(),
            ..Self::default()
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn criteria(&self) -> &str {
        &self.criteria
    }

    /// Image URI or data URI.
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn metrics(&self) -> Option<&TokenMetrics> {
        self.metrics.as_ref()
    }

    pub fn skills(&self) -> &[Skill] {
        &self.skills
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..self
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..self
        }
    }

    pub fn with_criteria(self, criteria: impl Into<String>) -> Self {
        Self {
            criteria: criteria.into(),
            ..self
        }
    }

    pub fn with_image(self, image: Option<String>) -> Self {
        Self { image, ..self }
    }

    pub fn with_metrics(self, metrics: Option<TokenMetrics>) -> Self {
        Self { metrics, ..self }
    }

    pub fn with_skills(self, skills: Vec<Skill>) -> Self {
        Self { skills, ..self }
    }

    /// Returns `true` when no text field was populated.
    pub fn is_blank(&self) -> bool {
        self.title.is_empty() && self.description.is_empty() && self.criteria.is_empty()
    }
}
