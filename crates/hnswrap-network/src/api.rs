//! The native host network API.
//!
//! Implementors perform the real call against the host networking
//! service. Every method is synchronous and may block for an arbitrary
//! time; none of them can be cancelled once started. Wrap an
//! implementation in [`HnsWithTimeout`](crate::HnsWithTimeout) to bound
//! how long callers wait.

use hnswrap_common::HcnError;

use crate::types::{
    HostComputeEndpoint, HostComputeNamespace, HostComputeNetwork, ModifyNetworkSettingRequest,
    PolicyEndpointRequest, PolicyNetworkRequest, RequestType,
};

/// Result of a native host network call.
pub type CallOutcome<T> = Result<T, HcnError>;

/// Synchronous host network operations (HNS v2).
pub trait HnsApi: Send + Sync + 'static {
    /// Create a network.
    fn create_network(&self, network: &HostComputeNetwork) -> CallOutcome<HostComputeNetwork>;

    /// Delete a network.
    fn delete_network(&self, network: &HostComputeNetwork) -> CallOutcome<()>;

    /// Modify settings of an existing network.
    fn modify_network_settings(
        &self,
        network: &HostComputeNetwork,
        request: &ModifyNetworkSettingRequest,
    ) -> CallOutcome<()>;

    /// Add policies to a network.
    fn add_network_policy(
        &self,
        network: &HostComputeNetwork,
        policy: &PolicyNetworkRequest,
    ) -> CallOutcome<()>;

    /// Remove policies from a network.
    fn remove_network_policy(
        &self,
        network: &HostComputeNetwork,
        policy: &PolicyNetworkRequest,
    ) -> CallOutcome<()>;

    /// Create an endpoint.
    fn create_endpoint(&self, endpoint: &HostComputeEndpoint) -> CallOutcome<HostComputeEndpoint>;

    /// Delete an endpoint.
    fn delete_endpoint(&self, endpoint: &HostComputeEndpoint) -> CallOutcome<()>;

    /// Look up an endpoint by GUID.
    fn get_endpoint_by_id(&self, endpoint_id: &str) -> CallOutcome<HostComputeEndpoint>;

    /// Look up an endpoint by name.
    fn get_endpoint_by_name(&self, endpoint_name: &str) -> CallOutcome<HostComputeEndpoint>;

    /// List the endpoints attached to a network.
    fn list_endpoints_of_network(&self, network_id: &str)
    -> CallOutcome<Vec<HostComputeEndpoint>>;

    /// Apply policies to an endpoint.
    fn apply_endpoint_policy(
        &self,
        endpoint: &HostComputeEndpoint,
        request_type: RequestType,
        policy: &PolicyEndpointRequest,
    ) -> CallOutcome<()>;

    /// Look up a namespace by GUID.
    fn get_namespace_by_id(&self, namespace_id: &str) -> CallOutcome<HostComputeNamespace>;

    /// Attach an endpoint to a namespace.
    fn add_namespace_endpoint(&self, namespace_id: &str, endpoint_id: &str) -> CallOutcome<()>;

    /// Detach an endpoint from a namespace.
    fn remove_namespace_endpoint(&self, namespace_id: &str, endpoint_id: &str)
    -> CallOutcome<()>;

    /// Look up a network by GUID.
    fn get_network_by_id(&self, network_id: &str) -> CallOutcome<HostComputeNetwork>;

    /// Look up a network by name.
    fn get_network_by_name(&self, network_name: &str) -> CallOutcome<HostComputeNetwork>;
}
