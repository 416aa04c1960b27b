use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use cowriter_stream::{GenerationConfig, GenerationOptions, GenerationRequest};

/// cowriter: draft credential badges from course content.
#[derive(Parser, Debug)]
#[command(name = "cowriter", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream a badge suggestion from the generation endpoint.
    Generate(GenerateArgs),
    /// Replay a recorded event stream through the card pipeline.
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// File holding the course content to draft a badge for.
    #[arg(long)]
    pub content_file: PathBuf,

    /// Writing style, e.g. "academic".
    #[arg(long)]
    pub style: Option<String>,

    /// Tone, e.g. "encouraging".
    #[arg(long)]
    pub tone: Option<String>,

    /// Criteria template name.
    #[arg(long)]
    pub criteria_template: Option<String>,

    /// Badge level, e.g. "beginner".
    #[arg(long = "level")]
    pub badge_level: Option<String>,

    /// Issuing institution.
    #[arg(long)]
    pub institution: Option<String>,

    /// Free-form instructions forwarded to the generator.
    #[arg(long = "instructions")]
    pub custom_instructions: Option<String>,

    /// Ask the backend to extract skills.
    #[arg(long)]
    pub skills: bool,

    /// Overall generation deadline in seconds.
    #[arg(long, env = "COWRITER_GENERATION_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// JSON file used to persist generated responses.
    #[arg(long)]
    pub store: Option<PathBuf>,
}

impl GenerateArgs {
    pub fn request(&self, course_content: String) -> GenerationRequest {
        GenerationRequest::new(course_content)
            .configuration(GenerationConfig {
                style: self.style.clone(),
                tone: self.tone.clone(),
                criteria_template: self.criteria_template.clone(),
                badge_level: self.badge_level.clone(),
                institution: self.institution.clone(),
                custom_instructions: self.custom_instructions.clone(),
            })
            .skill_extraction(self.skills)
    }

    pub fn options(&self) -> GenerationOptions {
        match self.timeout_secs {
            Some(secs) => GenerationOptions::default().timeout(Duration::from_secs(secs)),
            None => GenerationOptions::default(),
        }
    }
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Recorded response body (raw `data:` lines).
    pub file: PathBuf,

    /// Replay the body in chunks of this many bytes.
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// JSON file used to persist generated responses.
    #[arg(long)]
    pub store: Option<PathBuf>,
}

/// Reads the course content, rejecting empty files early.
pub async fn read_content(path: &Path) -> anyhow::Result<String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read course content from {}", path.display()))?;
    if content.trim().is_empty() {
        anyhow::bail!("course content file {} is empty", path.display());
    }
    Ok(content)
}
