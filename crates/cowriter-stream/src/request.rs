use serde::{Deserialize, Serialize};

use crate::errors::GeneratorError;

/// Generation options describing the badge the backend should draft.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

/// Badge image generation settings forwarded to the backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageGenerationConfig {
    pub enable: bool,
    /// Backend-specific image options, passed through unchanged.
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// Body of a streaming generation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub course_content: String,
    #[serde(default)]
    pub configuration: GenerationConfig,
    #[serde(default)]
    pub enable_skill_extraction: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_generation: Option<ImageGenerationConfig>,
}

impl GenerationRequest {
    /// Creates a request for `course_content` with default configuration.
    pub fn new(course_content: impl Into<String>) -> Self {
        Self {
            course_content: course_content.into(),
            configuration: GenerationConfig::default(),
            enable_skill_extraction: false,
            image_generation: None,
        }
    }

    pub fn configuration(mut self, configuration: GenerationConfig) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn skill_extraction(mut self, enable: bool) -> Self {
        self.enable_skill_extraction = enable;
        self
    }

    pub fn image_generation(mut self, image: ImageGenerationConfig) -> Self {
        self.image_generation = Some(image);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), GeneratorError> {
        if self.course_content.trim().is_empty() {
            return Err(GeneratorError::Validation(
                "course content must not be empty".into(),
            ));
        }
        Ok(())
    }
}
