//! Deadline and service configuration.
//!
//! Configuration is read from a TOML file:
//!
//! ```toml
//! [gateway]
//! call_timeout = "15s"
//!
//! [gateway.overrides]
//! DeleteNetwork = "30s"
//!
//! [cns]
//! base_url = "http://localhost:10090"
//! request_timeout = "15s"
//! ```
//!
//! `HNSWRAP_CALL_TIMEOUT` in the environment replaces `gateway.call_timeout`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// Deadline applied to a host network call when nothing else is configured.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Default CNS endpoint.
pub const DEFAULT_CNS_URL: &str = "http://localhost:10090";

/// Default timeout for a single CNS request.
pub const DEFAULT_CNS_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Environment variable overriding the gateway call timeout.
pub const CALL_TIMEOUT_ENV: &str = "HNSWRAP_CALL_TIMEOUT";

/// Default configuration file location.
///
/// Callers choose any other path themselves; the plugin takes one from
/// `HNSWRAP_CONFIG` or `--config`.
pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    if cfg!(windows) {
        PathBuf::from(r"C:\k\hnswrap.toml")
    } else {
        PathBuf::from("/etc/hnswrap/config.toml")
    }
});

/// Deadlines for guarded host network calls.
///
/// Immutable once handed to a gateway; every invocation reads it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeadlineConfig {
    /// Maximum time a caller waits for any guarded call.
    #[serde(deserialize_with = "deserialize_duration")]
    pub call_timeout: Duration,
    /// Per-operation deadlines keyed by operation name (e.g. `"DeleteNetwork"`).
    #[serde(deserialize_with = "deserialize_duration_map")]
    pub overrides: BTreeMap<String, Duration>,
}

impl DeadlineConfig {
    /// Create a config applying `call_timeout` to every operation.
    #[must_use]
    pub const fn new(call_timeout: Duration) -> Self {
        Self {
            call_timeout,
            overrides: BTreeMap::new(),
        }
    }

    /// Use a different deadline for one operation.
    #[must_use]
    pub fn with_override(mut self, operation: &str, deadline: Duration) -> Self {
        self.overrides.insert(operation.to_string(), deadline);
        self
    }

    /// Deadline that applies to `operation`.
    #[must_use]
    pub fn timeout_for(&self, operation: &str) -> Duration {
        self.overrides
            .get(operation)
            .copied()
            .unwrap_or(self.call_timeout)
    }
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CALL_TIMEOUT)
    }
}

/// Connection settings for the Container Networking Service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CnsConfig {
    /// Base URL of the CNS HTTP API.
    pub base_url: String,
    /// Timeout for a single CNS request.
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
}

impl Default for CnsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CNS_URL.to_string(),
            request_timeout: DEFAULT_CNS_REQUEST_TIMEOUT,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HnswrapConfig {
    /// Host network call deadlines.
    pub gateway: DeadlineConfig,
    /// CNS client settings.
    pub cns: CnsConfig,
}

impl HnswrapConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a file, falling back to defaults when it
    /// does not exist. Environment overrides are applied afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed,
    /// or if an environment override is malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Like [`HnswrapConfig::load`], reading overrides through `lookup`
    /// instead of the process environment.
    ///
    /// # Errors
    ///
    /// See [`HnswrapConfig::load`].
    pub fn load_with<F>(path: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if path.exists() {
            tracing::debug!(path = %path.display(), "Loading configuration");
            Self::from_toml_str(&std::fs::read_to_string(path)?)?
        } else {
            tracing::debug!(path = %path.display(), "No configuration file, using defaults");
            Self::default()
        };
        config.apply_env(lookup)?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an override value is not a valid duration.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(CALL_TIMEOUT_ENV) {
            self.gateway.call_timeout = parse_duration(&value)?;
            tracing::debug!(
                call_timeout = ?self.gateway.call_timeout,
                "Call timeout overridden from environment"
            );
        }
        Ok(())
    }
}

/// Parse a duration string.
///
/// Formats:
/// - "250ms" -> 250 milliseconds
/// - "15s" -> 15 seconds
/// - "2m" -> 2 minutes
/// - "15" -> 15 seconds
///
/// # Errors
///
/// Returns [`ConfigError::InvalidDuration`] for anything else.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration {
        value: s.to_string(),
    };

    // "ms" must be tried before "m" and "s"
    let (number, unit_ms) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, 1)
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, 1000)
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, 60 * 1000)
    } else {
        (s, 1000)
    };

    let value: u64 = number.trim().parse().map_err(|_| invalid())?;
    let millis = value.checked_mul(unit_ms).ok_or_else(invalid)?;
    Ok(Duration::from_millis(millis))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

impl RawDuration {
    fn into_duration(self) -> Result<Duration, ConfigError> {
        match self {
            Self::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Self::Text(text) => parse_duration(&text),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    RawDuration::deserialize(deserializer)?
        .into_duration()
        .map_err(serde::de::Error::custom)
}

fn deserialize_duration_map<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<String, RawDuration>::deserialize(deserializer)?
        .into_iter()
        .map(|(operation, raw)| Ok((operation, raw.into_duration()?)))
        .collect::<Result<_, ConfigError>>()
        .map_err(serde::de::Error::custom)
}
