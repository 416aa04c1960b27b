//! Process-wide `tracing` subscriber setup.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_FILTER: &str = "info";
const DEFAULT_JSON_LOG_FILE: &str = "cowriter.logs.jsonl";

/// Console stream used when logs are not written to a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleStream {
    Stdout,
    Stderr,
}

/// Where log lines go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogTarget {
    /// Compact human-readable lines.
    Console(ConsoleStream),
    /// JSON lines appended to a file.
    JsonFile(PathBuf),
}

/// Resolved logging settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub enabled: bool,
    /// `EnvFilter` directive, e.g. `info` or `cowriter_stream=debug`.
    pub filter: String,
    pub target: LogTarget,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: DEFAULT_FILTER.to_string(),
            target: LogTarget::Console(ConsoleStream::Stdout),
        }
    }
}

impl ObservabilityConfig {
    /// Reads settings from the environment:
    ///
    /// - `COWRITER_OBSERVABILITY_ENABLED`: enable flag (default enabled).
    /// - `COWRITER_LOG_LEVEL`, then `RUST_LOG`: filter directive (default `info`).
    ///   Directives that fail to parse are skipped.
    /// - `COWRITER_JSON_LOG_PATH`: write JSON lines to this file instead of the console.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("COWRITER_OBSERVABILITY_ENABLED")
            .map(|value| parse_bool(&value).unwrap_or(true))
            .unwrap_or(true);
        let filter = ["COWRITER_LOG_LEVEL", "RUST_LOG"]
            .into_iter()
            .filter_map(|key| lookup(key))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty() && EnvFilter::try_new(value).is_ok())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let target = lookup("COWRITER_JSON_LOG_PATH")
            .filter(|path| !path.trim().is_empty())
            .map_or(LogTarget::Console(ConsoleStream::Stdout), |path| {
                LogTarget::JsonFile(PathBuf::from(path.trim()))
            });
        Self {
            enabled,
            filter,
            target,
        }
    }

    /// Picks the console stream. A JSON file target is left alone.
    pub fn console(mut self, stream: ConsoleStream) -> Self {
        if let LogTarget::Console(current) = &mut self.target {
            *current = stream;
        }
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_JSON_LOG_FILE)
        .to_string();
    (dir, file_name)
}

/// Initializes logging once per process from [`ObservabilityConfig::from_env`].
pub fn init_observability() -> bool {
    init_observability_with(ObservabilityConfig::from_env())
}

/// Initializes logging once per process. Returns `true` when this call
/// installed the global subscriber; later calls are no-ops.
pub fn init_observability_with(config: ObservabilityConfig) -> bool {
    if INIT.set(()).is_err() || !config.enabled {
        return false;
    }

    let env_filter = EnvFilter::new(&config.filter);
    let installed = match config.target {
        LogTarget::JsonFile(path) => {
            let (dir, file_name) = split_log_path(&path);
            let _ = std::fs::create_dir_all(&dir);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(false)
                .with_writer(tracing_appender::rolling::never(dir, file_name));
            tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init()
        }
        LogTarget::Console(ConsoleStream::Stdout) => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stdout),
            )
            .try_init(),
        LogTarget::Console(ConsoleStream::Stderr) => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    installed.is_ok()
}
