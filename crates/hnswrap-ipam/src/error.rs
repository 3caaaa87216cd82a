//! IPAM plugin errors.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`IpamError`].
pub type IpamResult<T> = Result<T, IpamError>;

/// CNI well-known error code: incompatible CNI version.
pub const CNI_ERR_INCOMPATIBLE_VERSION: u32 = 1;
/// CNI well-known error code: invalid environment variables.
pub const CNI_ERR_INVALID_ENV: u32 = 4;
/// CNI well-known error code: I/O failure.
pub const CNI_ERR_IO: u32 = 5;
/// CNI well-known error code: invalid network config.
pub const CNI_ERR_INVALID_CONFIG: u32 = 7;
/// CNI well-known error code: try again later.
pub const CNI_ERR_TRY_AGAIN: u32 = 11;
/// Plugin-specific: CNS rejected or failed the request.
pub const CNI_ERR_CNS: u32 = 100;
/// Plugin-specific: CNS returned an unusable IP configuration.
pub const CNI_ERR_CNS_RESPONSE: u32 = 101;

/// Errors produced while servicing a CNI command.
#[derive(Error, Diagnostic, Debug)]
pub enum IpamError {
    /// A required CNI environment value was empty.
    #[error("Missing required environment variable {name}")]
    #[diagnostic(code(hnswrap::ipam::missing_env))]
    MissingEnv {
        /// Variable name.
        name: &'static str,
    },

    /// The invocation environment was rejected before any command ran,
    /// typically a missing or unknown `CNI_COMMAND`.
    #[error("Invalid invocation: {message}")]
    #[diagnostic(
        code(hnswrap::ipam::invalid_command),
        help("CNI_COMMAND must be one of ADD, DEL, CHECK or VERSION")
    )]
    InvalidCommand {
        /// Parser message.
        message: String,
    },

    /// `CNI_ARGS` could not be parsed.
    #[error("Invalid CNI_ARGS entry: {entry}")]
    #[diagnostic(
        code(hnswrap::ipam::invalid_args),
        help("CNI_ARGS must be a ';'-separated list of KEY=VALUE pairs")
    )]
    InvalidArgs {
        /// The malformed entry.
        entry: String,
    },

    /// A required `CNI_ARGS` key was absent.
    #[error("Missing CNI argument {key}")]
    #[diagnostic(code(hnswrap::ipam::missing_arg))]
    MissingArg {
        /// Argument key.
        key: &'static str,
    },

    /// The network configuration on stdin was not valid.
    #[error("Invalid network configuration: {message}")]
    #[diagnostic(code(hnswrap::ipam::invalid_config))]
    InvalidConfig {
        /// Decoder message.
        message: String,
    },

    /// The requested result version is not supported.
    #[error("Unsupported CNI version {version}")]
    #[diagnostic(
        code(hnswrap::ipam::unsupported_version),
        help("Supported versions are 0.3.0, 0.3.1, 0.4.0 and 1.0.0")
    )]
    UnsupportedVersion {
        /// Requested version.
        version: String,
    },

    /// Transport failure talking to CNS.
    #[error("CNS request to {url} failed: {message}")]
    #[diagnostic(code(hnswrap::ipam::http))]
    Http {
        /// Request URL.
        url: String,
        /// Transport error.
        message: String,
        /// Whether the request timed out.
        timed_out: bool,
    },

    /// CNS answered with a non-success return code.
    #[error("CNS returned code {code}: {message}")]
    #[diagnostic(code(hnswrap::ipam::cns))]
    Cns {
        /// CNS return code.
        code: i32,
        /// CNS message.
        message: String,
    },

    /// CNS answered with an address or gateway that does not parse.
    #[error("CNS returned an invalid IP configuration: {message}")]
    #[diagnostic(code(hnswrap::ipam::invalid_response))]
    InvalidResponse {
        /// What was wrong.
        message: String,
    },

    /// Configuration could not be loaded.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] hnswrap_common::ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(hnswrap::io))]
    Io(#[from] std::io::Error),
}

impl IpamError {
    /// The CNI error code reported for this failure.
    #[must_use]
    pub const fn cni_code(&self) -> u32 {
        match self {
            Self::UnsupportedVersion { .. } => CNI_ERR_INCOMPATIBLE_VERSION,
            Self::MissingEnv { .. }
            | Self::InvalidCommand { .. }
            | Self::InvalidArgs { .. }
            | Self::MissingArg { .. } => CNI_ERR_INVALID_ENV,
            Self::InvalidConfig { .. } | Self::Config(_) => CNI_ERR_INVALID_CONFIG,
            Self::Http {
                timed_out: true, ..
            } => CNI_ERR_TRY_AGAIN,
            Self::Http { .. } | Self::Cns { .. } => CNI_ERR_CNS,
            Self::InvalidResponse { .. } => CNI_ERR_CNS_RESPONSE,
            Self::Io(_) => CNI_ERR_IO,
        }
    }
}

impl From<serde_json::Error> for IpamError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig {
            message: err.to_string(),
        }
    }
}

impl From<clap::Error> for IpamError {
    fn from(err: clap::Error) -> Self {
        let rendered = err.to_string();
        let first = rendered.lines().next().unwrap_or_default();
        Self::InvalidCommand {
            message: first.trim_start_matches("error: ").to_string(),
        }
    }
}
