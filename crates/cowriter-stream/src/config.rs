use std::time::Duration;

use crate::errors::GeneratorError;

const DEFAULT_GENERATE_PATH: &str = "/generate-stream";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Configuration for the HTTP generation endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the generation service.
    pub base_url: String,
    /// Path of the streaming generation route.
    pub generate_path: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Limit on establishing the connection.
    pub connect_timeout: Duration,
    /// Longest allowed gap between two body reads. `None` lets a quiet
    /// stream wait for as long as the generation deadline allows.
    pub read_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Creates a config for `base_url` with the default path and timeouts.
    ///
    /// No limit is placed on the total response time, so a live stream may
    /// run for as long as it keeps producing data.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            generate_path: DEFAULT_GENERATE_PATH.to_string(),
            api_key: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: None,
        }
    }

    /// Builds a config from `COWRITER_*` environment variables.
    ///
    /// - `COWRITER_API_URL` (required)
    /// - `COWRITER_GENERATE_PATH` (default `/generate-stream`)
    /// - `COWRITER_API_KEY`
    /// - `COWRITER_CONNECT_TIMEOUT_SECS` (default 10)
    /// - `COWRITER_READ_TIMEOUT_SECS` (unset by default)
    pub fn from_env() -> Result<Self, GeneratorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, GeneratorError> {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let base_url = non_blank("COWRITER_API_URL").ok_or_else(|| {
            GeneratorError::Config("missing COWRITER_API_URL for generation endpoint".into())
        })?;
        let mut config = Self::new(base_url.trim());
        if let Some(path) = non_blank("COWRITER_GENERATE_PATH") {
            config = config.generate_path(path.trim());
        }
        if let Some(key) = non_blank("COWRITER_API_KEY") {
            config = config.api_key(key.trim());
        }
        let secs = |key: &str| -> Result<Option<Duration>, GeneratorError> {
            non_blank(key)
                .map(|raw| {
                    raw.trim()
                        .parse::<u64>()
                        .map(Duration::from_secs)
                        .map_err(|_| GeneratorError::Config(format!("invalid {key}: {raw}")))
                })
                .transpose()
        };
        if let Some(timeout) = secs("COWRITER_CONNECT_TIMEOUT_SECS")? {
            config = config.connect_timeout(timeout);
        }
        if let Some(timeout) = secs("COWRITER_READ_TIMEOUT_SECS")? {
            config = config.read_timeout(timeout);
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the generation route.
    pub fn generate_path(mut self, path: impl Into<String>) -> Self {
        self.generate_path = path.into();
        self
    }

    /// Sets a bearer token.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Fails the stream when no bytes arrive for `timeout`.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), GeneratorError> {
        if self.base_url.trim().is_empty() {
            return Err(GeneratorError::Config(
                "generation endpoint base_url must not be empty".into(),
            ));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(GeneratorError::Config(format!(
                "generation endpoint base_url must be http(s): {}",
                self.base_url
            )));
        }
        Ok(())
    }

    pub(crate) fn generate_url(&self) -> String {
        let path = self.generate_path.trim();
        let path = path.strip_prefix('/').unwrap_or(path);
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Per-generation runtime options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerationOptions {
    /// Overall deadline for one generation. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl GenerationOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
