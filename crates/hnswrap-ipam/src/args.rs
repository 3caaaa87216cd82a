//! CNI invocation arguments.
//!
//! The runtime passes everything except the network configuration through
//! environment variables; the configuration arrives on stdin.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::error::{IpamError, IpamResult};

/// `CNI_ARGS` key carrying the pod name.
pub const K8S_POD_NAME: &str = "K8S_POD_NAME";
/// `CNI_ARGS` key carrying the pod namespace.
pub const K8S_POD_NAMESPACE: &str = "K8S_POD_NAMESPACE";

/// Characters of the container id kept in the endpoint id.
const ENDPOINT_ID_PREFIX_LEN: usize = 8;

/// CNI command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CniCommand {
    /// Allocate an address.
    #[value(name = "ADD")]
    Add,
    /// Release an address.
    #[value(name = "DEL")]
    Del,
    /// Verify an allocation.
    #[value(name = "CHECK")]
    Check,
    /// Report supported versions.
    #[value(name = "VERSION")]
    Version,
}

/// Arguments of one plugin invocation.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "CNI IPAM plugin backed by CNS", long_about = None)]
pub struct CmdArgs {
    /// CNI command to run
    #[arg(long, env = "CNI_COMMAND", value_enum)]
    pub command: CniCommand,

    /// Container id
    #[arg(long, env = "CNI_CONTAINERID", default_value = "")]
    pub container_id: String,

    /// Network namespace path
    #[arg(long, env = "CNI_NETNS", default_value = "")]
    pub netns: String,

    /// Interface name inside the container
    #[arg(long, env = "CNI_IFNAME", default_value = "")]
    pub ifname: String,

    /// Extra arguments, `KEY=VALUE;KEY=VALUE`
    #[arg(long, env = "CNI_ARGS", default_value = "")]
    pub args: String,

    /// Plugin search path
    #[arg(long, env = "CNI_PATH", default_value = "")]
    pub path: String,

    /// Configuration file
    #[arg(long, env = "HNSWRAP_CONFIG")]
    pub config: Option<PathBuf>,
}

impl CmdArgs {
    /// Ensure the values ADD and DEL depend on are present.
    ///
    /// # Errors
    ///
    /// Returns [`IpamError::MissingEnv`] naming the first empty variable.
    pub fn require_container(&self) -> IpamResult<()> {
        if self.container_id.is_empty() {
            return Err(IpamError::MissingEnv {
                name: "CNI_CONTAINERID",
            });
        }
        if self.ifname.is_empty() {
            return Err(IpamError::MissingEnv { name: "CNI_IFNAME" });
        }
        Ok(())
    }

    /// Endpoint id for this container interface.
    #[must_use]
    pub fn endpoint_id(&self) -> String {
        endpoint_id(&self.container_id, &self.ifname)
    }

    /// Pod identity from `CNI_ARGS`.
    ///
    /// # Errors
    ///
    /// Returns an error if `CNI_ARGS` is malformed or lacks the pod keys.
    pub fn pod(&self) -> IpamResult<PodArgs> {
        PodArgs::parse(&self.args)
    }
}

/// Build the endpoint id: the first eight characters of the container id,
/// a dash, then the interface name.
#[must_use]
pub fn endpoint_id(container_id: &str, ifname: &str) -> String {
    let prefix: String = container_id.chars().take(ENDPOINT_ID_PREFIX_LEN).collect();
    format!("{prefix}-{ifname}")
}

/// Pod identity carried in `CNI_ARGS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodArgs {
    /// Pod name.
    pub name: String,
    /// Pod namespace.
    pub namespace: String,
}

impl PodArgs {
    /// Parse `KEY=VALUE;KEY=VALUE`. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`IpamError::InvalidArgs`] for an entry without `=` and
    /// [`IpamError::MissingArg`] if either pod key is absent.
    pub fn parse(raw: &str) -> IpamResult<Self> {
        let mut name = None;
        let mut namespace = None;

        for entry in raw.split(';').filter(|e| !e.trim().is_empty()) {
            let (key, value) = entry.split_once('=').ok_or_else(|| IpamError::InvalidArgs {
                entry: entry.to_string(),
            })?;

            match key.trim() {
                K8S_POD_NAME => name = Some(value.to_string()),
                K8S_POD_NAMESPACE => namespace = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            name: name.ok_or(IpamError::MissingArg { key: K8S_POD_NAME })?,
            namespace: namespace.ok_or(IpamError::MissingArg {
                key: K8S_POD_NAMESPACE,
            })?,
        })
    }
}
