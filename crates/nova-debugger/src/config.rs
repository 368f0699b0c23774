use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;

use nova_jdwp::SuspendPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse debugger config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Engine configuration, usually the `[debugger]` part of a Nova config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebuggerConfig {
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub requests: RequestConfig,
    #[serde(default)]
    pub profiles: ProfileConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DebuggerConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Upper bound on a single event poll. Also bounds how long `stop` waits for
    /// an idle loop to notice cancellation.
    #[serde(default = "DispatchConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of undelivered consumer failure reports kept before new ones are
    /// dropped.
    #[serde(default = "DispatchConfig::default_failure_channel_capacity")]
    pub failure_channel_capacity: usize,
}

impl DispatchConfig {
    fn default_poll_interval_ms() -> u64 {
        50
    }

    fn default_failure_channel_capacity() -> usize {
        256
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval_ms(),
            failure_channel_capacity: Self::default_failure_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspendPolicyConfig {
    None,
    #[default]
    EventThread,
    All,
}

impl From<SuspendPolicyConfig> for SuspendPolicy {
    fn from(value: SuspendPolicyConfig) -> Self {
        match value {
            SuspendPolicyConfig::None => SuspendPolicy::None,
            SuspendPolicyConfig::EventThread => SuspendPolicy::EventThread,
            SuspendPolicyConfig::All => SuspendPolicy::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestConfig {
    /// Suspend policy for requests that do not specify one.
    #[serde(default)]
    pub default_suspend_policy: SuspendPolicyConfig,

    /// Keep breakpoints, watchpoints and class-scoped exception requests whose
    /// class is not loaded yet, and install them once it is prepared.
    #[serde(default = "RequestConfig::default_pending_enabled")]
    pub pending_enabled: bool,
}

impl RequestConfig {
    fn default_pending_enabled() -> bool {
        true
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            default_suspend_policy: SuspendPolicyConfig::default(),
            pending_enabled: Self::default_pending_enabled(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    /// Name the built-in profile is registered (and activated) under.
    #[serde(default = "ProfileConfig::default_name")]
    pub default: String,
}

impl ProfileConfig {
    fn default_name() -> String {
        crate::profile::PureDebugProfile::NAME.to_owned()
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            default: Self::default_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Either a simple level (`info`, `debug`, ...) or an `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,

    /// Write logs to stderr.
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// The effective filter: the configured level, with `RUST_LOG` merged in
    /// when it is set.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let config_directives = Self::normalize_level_directives(&self.level);

        match env_directives {
            Some(env_directives) => {
                let combined = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
        }
    }
}

static TRACING_INIT: Once = Once::new();

/// Install the global tracing subscriber for the debugger.
///
/// Only the first call has an effect. If another subscriber is already
/// installed (e.g. by an embedding binary) it is left in place.
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let make_writer = if !config.stderr {
            BoxMakeWriter::new(std::io::sink)
        } else if cfg!(debug_assertions) {
            // Plays well with `cargo test` output capture.
            BoxMakeWriter::new(tracing_subscriber::fmt::writer::TestWriter::with_stderr)
        } else {
            BoxMakeWriter::new(std::io::stderr)
        };

        let builder = tracing_subscriber::fmt()
            .with_env_filter(config.env_filter())
            .with_writer(make_writer)
            .with_ansi(false);

        let result = if config.json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
        if let Err(err) = result {
            tracing::debug!(target = "nova.debugger", error = %err, "tracing subscriber already installed");
        }
    });
}
