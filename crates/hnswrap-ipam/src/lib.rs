//! # hnswrap-ipam
//!
//! CNI IPAM plugin that asks the Container Networking Service (CNS) for
//! a pod's IP configuration and returns it as a CNI result.

#![warn(missing_docs)]

pub mod args;
pub mod cns;
pub mod error;
pub mod plugin;
pub mod result;

pub use args::{CmdArgs, CniCommand, PodArgs};
pub use cns::{CnsClient, IpConfigRequest, IpConfigResponse, IpamClient};
pub use error::{IpamError, IpamResult};
pub use plugin::IpamPlugin;
pub use result::{CniError, CniResult, NetConf, PodAddressing};
