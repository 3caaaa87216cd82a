//! Error types shared across hnswrap.

use std::fmt;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for guarded host network calls.
pub type HnsResult<T> = Result<T, GatewayError>;

/// A failure reported by the native host network API.
///
/// The gateway never interprets this value; it is handed back to the
/// caller exactly as the native call produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HcnError {
    /// Native result code, when the API supplies one (an `HRESULT` on Windows).
    pub code: Option<u32>,
    /// Native error text.
    pub message: String,
}

impl HcnError {
    /// Create an error carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Create an error carrying a native result code.
    pub fn with_code(code: u32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

impl fmt::Display for HcnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {:#010x})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for HcnError {}

/// Errors returned by deadline-bounded calls.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The deadline elapsed before the native call reported an outcome.
    ///
    /// The call may still complete in the background; its effect is unknown.
    #[error("{operation} timed out calling hns, timeout value is {deadline:?}")]
    #[diagnostic(
        code(hnswrap::gateway::timeout),
        help("The native call may still complete; treat the resulting host state as unknown")
    )]
    Timeout {
        /// Name of the guarded operation.
        operation: &'static str,
        /// Deadline that was applied.
        deadline: Duration,
    },

    /// The native call itself failed.
    #[error(transparent)]
    #[diagnostic(code(hnswrap::gateway::underlying))]
    Underlying(#[from] HcnError),

    /// The native call unwound without producing an outcome.
    #[error("{operation} ended without reporting an outcome")]
    #[diagnostic(
        code(hnswrap::gateway::abandoned),
        help("The host network backend panicked while servicing this call")
    )]
    Abandoned {
        /// Name of the guarded operation.
        operation: &'static str,
    },

    /// No worker thread could be started for the call.
    #[error("{operation} could not start a worker thread: {message}")]
    #[diagnostic(
        code(hnswrap::gateway::spawn),
        help("The host is out of threads or memory; the native call was not made")
    )]
    Spawn {
        /// Name of the guarded operation.
        operation: &'static str,
        /// OS error text.
        message: String,
    },
}

impl GatewayError {
    /// Returns `true` if the call hit its deadline.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The native error, if the failure came from the host API.
    #[must_use]
    pub const fn underlying(&self) -> Option<&HcnError> {
        match self {
            Self::Underlying(err) => Some(err),
            _ => None,
        }
    }
}

/// Configuration errors.
#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    /// A duration string could not be parsed.
    #[error("Invalid duration: {value}")]
    #[diagnostic(
        code(hnswrap::config::invalid_duration),
        help("Use formats like '15s', '3000ms', '2m' or a plain number of seconds")
    )]
    InvalidDuration {
        /// The invalid value.
        value: String,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    #[diagnostic(code(hnswrap::config::parse))]
    Parse {
        /// Parser error message.
        message: String,
    },

    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    #[diagnostic(code(hnswrap::io))]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse {
            message: err.to_string(),
        }
    }
}
