//! # hnswrap-common
//!
//! Shared types for the hnswrap workspace:
//! - Error types for guarded host network calls
//! - Deadline and CNS configuration

#![warn(missing_docs)]

pub mod config;
pub mod error;

pub use config::{CnsConfig, DeadlineConfig, HnswrapConfig, parse_duration};
pub use error::{ConfigError, GatewayError, HcnError, HnsResult};
