//! # hnswrap-network
//!
//! Host network control with a hard deadline on every call.
//!
//! The native host network API is synchronous and cannot be cancelled;
//! a wedged call would otherwise hang its caller forever. This crate
//! provides:
//! - [`Gateway`]: races blocking work against a deadline
//! - [`HnsWithTimeout`]: every [`HnsApi`] operation routed through the gateway
//! - [`InMemoryHns`]: a map-backed [`HnsApi`] with fault injection

#![warn(missing_docs)]

pub mod api;
pub mod gateway;
pub mod memory;
pub mod surface;
pub mod types;

pub use api::{CallOutcome, HnsApi};
pub use gateway::Gateway;
pub use memory::InMemoryHns;
pub use surface::{HnsWithTimeout, operation};
pub use types::{
    HostComputeEndpoint, HostComputeNamespace, HostComputeNetwork, ModifyNetworkSettingRequest,
    NetworkResourceType, PolicyEndpointRequest, PolicyNetworkRequest, RequestType, SchemaVersion,
};

pub use hnswrap_common::{DeadlineConfig, GatewayError, HcnError, HnsResult};
