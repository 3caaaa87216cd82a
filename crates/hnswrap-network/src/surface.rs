//! Deadline-bounded host network operations.
//!
//! [`HnsWithTimeout`] mirrors [`HnsApi`] one-to-one. Each method clones
//! its arguments into a closure over the wrapped API and hands it to the
//! [`Gateway`]; the native result comes back untouched. The only new
//! failure is [`GatewayError::Timeout`](hnswrap_common::GatewayError::Timeout),
//! which means the outcome is unknown: a create or delete may still take
//! effect after the caller has been told it timed out.

use std::sync::Arc;

use hnswrap_common::{DeadlineConfig, HnsResult};

use crate::api::HnsApi;
use crate::gateway::Gateway;
use crate::types::{
    HostComputeEndpoint, HostComputeNamespace, HostComputeNetwork, ModifyNetworkSettingRequest,
    PolicyEndpointRequest, PolicyNetworkRequest, RequestType,
};

/// Operation names, as reported in timeouts and used for deadline overrides.
pub mod operation {
    /// Create a network.
    pub const CREATE_NETWORK: &str = "CreateNetwork";
    /// Delete a network.
    pub const DELETE_NETWORK: &str = "DeleteNetwork";
    /// Modify network settings.
    pub const MODIFY_NETWORK_SETTINGS: &str = "ModifyNetworkSettings";
    /// Add a network policy.
    pub const ADD_NETWORK_POLICY: &str = "AddNetworkPolicy";
    /// Remove a network policy.
    pub const REMOVE_NETWORK_POLICY: &str = "RemoveNetworkPolicy";
    /// Create an endpoint.
    pub const CREATE_ENDPOINT: &str = "CreateEndpoint";
    /// Delete an endpoint.
    pub const DELETE_ENDPOINT: &str = "DeleteEndpoint";
    /// Look up an endpoint by id.
    pub const GET_ENDPOINT_BY_ID: &str = "GetEndpointByID";
    /// Look up an endpoint by name.
    pub const GET_ENDPOINT_BY_NAME: &str = "GetEndpointByName";
    /// List endpoints of a network.
    pub const LIST_ENDPOINTS_OF_NETWORK: &str = "ListEndpointsOfNetwork";
    /// Apply an endpoint policy.
    pub const APPLY_ENDPOINT_POLICY: &str = "ApplyEndpointPolicy";
    /// Look up a namespace by id.
    pub const GET_NAMESPACE_BY_ID: &str = "GetNamespaceByID";
    /// Attach an endpoint to a namespace.
    pub const ADD_NAMESPACE_ENDPOINT: &str = "AddNamespaceEndpoint";
    /// Detach an endpoint from a namespace.
    pub const REMOVE_NAMESPACE_ENDPOINT: &str = "RemoveNamespaceEndpoint";
    /// Look up a network by id.
    pub const GET_NETWORK_BY_ID: &str = "GetNetworkByID";
    /// Look up a network by name.
    pub const GET_NETWORK_BY_NAME: &str = "GetNetworkByName";

    /// Every guarded operation.
    pub const ALL: [&str; 16] = [
        CREATE_NETWORK,
        DELETE_NETWORK,
        MODIFY_NETWORK_SETTINGS,
        ADD_NETWORK_POLICY,
        REMOVE_NETWORK_POLICY,
        CREATE_ENDPOINT,
        DELETE_ENDPOINT,
        GET_ENDPOINT_BY_ID,
        GET_ENDPOINT_BY_NAME,
        LIST_ENDPOINTS_OF_NETWORK,
        APPLY_ENDPOINT_POLICY,
        GET_NAMESPACE_BY_ID,
        ADD_NAMESPACE_ENDPOINT,
        REMOVE_NAMESPACE_ENDPOINT,
        GET_NETWORK_BY_ID,
        GET_NETWORK_BY_NAME,
    ];
}

/// Host network API with a deadline on every call.
///
/// Stateless apart from the shared gateway; clone freely and use from
/// any number of tasks.
pub struct HnsWithTimeout<A> {
    api: Arc<A>,
    gateway: Gateway,
}

impl<A> Clone for HnsWithTimeout<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            gateway: self.gateway.clone(),
        }
    }
}

impl<A: HnsApi> HnsWithTimeout<A> {
    /// Wrap `api`, bounding calls with `config`.
    pub fn new(api: A, config: DeadlineConfig) -> Self {
        Self::from_parts(Arc::new(api), Gateway::new(config))
    }

    /// Wrap a shared API with an existing gateway.
    pub const fn from_parts(api: Arc<A>, gateway: Gateway) -> Self {
        Self { api, gateway }
    }

    /// The wrapped API.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// The gateway bounding each call.
    pub const fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Create a network.
    pub async fn create_network(
        &self,
        network: &HostComputeNetwork,
    ) -> HnsResult<HostComputeNetwork> {
        let (api, network) = (Arc::clone(&self.api), network.clone());
        self.gateway
            .execute(operation::CREATE_NETWORK, move || {
                api.create_network(&network)
            })
            .await
    }

    /// Delete a network.
    pub async fn delete_network(&self, network: &HostComputeNetwork) -> HnsResult<()> {
        let (api, network) = (Arc::clone(&self.api), network.clone());
        self.gateway
            .execute(operation::DELETE_NETWORK, move || {
                api.delete_network(&network)
            })
            .await
    }

    /// Modify settings of an existing network.
    pub async fn modify_network_settings(
        &self,
        network: &HostComputeNetwork,
        request: &ModifyNetworkSettingRequest,
    ) -> HnsResult<()> {
        let (api, network, request) = (Arc::clone(&self.api), network.clone(), request.clone());
        self.gateway
            .execute(operation::MODIFY_NETWORK_SETTINGS, move || {
                api.modify_network_settings(&network, &request)
            })
            .await
    }

    /// Add policies to a network.
    pub async fn add_network_policy(
        &self,
        network: &HostComputeNetwork,
        policy: &PolicyNetworkRequest,
    ) -> HnsResult<()> {
        let (api, network, policy) = (Arc::clone(&self.api), network.clone(), policy.clone());
        self.gateway
            .execute(operation::ADD_NETWORK_POLICY, move || {
                api.add_network_policy(&network, &policy)
            })
            .await
    }

    /// Remove policies from a network.
    pub async fn remove_network_policy(
        &self,
        network: &HostComputeNetwork,
        policy: &PolicyNetworkRequest,
    ) -> HnsResult<()> {
        let (api, network, policy) = (Arc::clone(&self.api), network.clone(), policy.clone());
        self.gateway
            .execute(operation::REMOVE_NETWORK_POLICY, move || {
                api.remove_network_policy(&network, &policy)
            })
            .await
    }

    /// Create an endpoint.
    pub async fn create_endpoint(
        &self,
        endpoint: &HostComputeEndpoint,
    ) -> HnsResult<HostComputeEndpoint> {
        let (api, endpoint) = (Arc::clone(&self.api), endpoint.clone());
        self.gateway
            .execute(operation::CREATE_ENDPOINT, move || {
                api.create_endpoint(&endpoint)
            })
            .await
    }

    /// Delete an endpoint.
    pub async fn delete_endpoint(&self, endpoint: &HostComputeEndpoint) -> HnsResult<()> {
        let (api, endpoint) = (Arc::clone(&self.api), endpoint.clone());
        self.gateway
            .execute(operation::DELETE_ENDPOINT, move || {
                api.delete_endpoint(&endpoint)
            })
            .await
    }

    /// Look up an endpoint by GUID.
    pub async fn get_endpoint_by_id(&self, endpoint_id: &str) -> HnsResult<HostComputeEndpoint> {
        let (api, endpoint_id) = (Arc::clone(&self.api), endpoint_id.to_string());
        self.gateway
            .execute(operation::GET_ENDPOINT_BY_ID, move || {
                api.get_endpoint_by_id(&endpoint_id)
            })
            .await
    }

    /// Look up an endpoint by name.
    pub async fn get_endpoint_by_name(
        &self,
        endpoint_name: &str,
    ) -> HnsResult<HostComputeEndpoint> {
        let (api, endpoint_name) = (Arc::clone(&self.api), endpoint_name.to_string());
        self.gateway
            .execute(operation::GET_ENDPOINT_BY_NAME, move || {
                api.get_endpoint_by_name(&endpoint_name)
            })
            .await
    }

    /// List the endpoints attached to a network.
    pub async fn list_endpoints_of_network(
        &self,
        network_id: &str,
    ) -> HnsResult<Vec<HostComputeEndpoint>> {
        let (api, network_id) = (Arc::clone(&self.api), network_id.to_string());
        self.gateway
            .execute(operation::LIST_ENDPOINTS_OF_NETWORK, move || {
                api.list_endpoints_of_network(&network_id)
            })
            .await
    }

    /// Apply policies to an endpoint.
    pub async fn apply_endpoint_policy(
        &self,
        endpoint: &HostComputeEndpoint,
        request_type: RequestType,
        policy: &PolicyEndpointRequest,
    ) -> HnsResult<()> {
        let (api, endpoint, policy) = (Arc::clone(&self.api), endpoint.clone(), policy.clone());
        self.gateway
            .execute(operation::APPLY_ENDPOINT_POLICY, move || {
                api.apply_endpoint_policy(&endpoint, request_type, &policy)
            })
            .await
    }

    /// Look up a namespace by GUID.
    pub async fn get_namespace_by_id(&self, namespace_id: &str) -> HnsResult<HostComputeNamespace> {
        let (api, namespace_id) = (Arc::clone(&self.api), namespace_id.to_string());
        self.gateway
            .execute(operation::GET_NAMESPACE_BY_ID, move || {
                api.get_namespace_by_id(&namespace_id)
            })
            .await
    }

    /// Attach an endpoint to a namespace.
    pub async fn add_namespace_endpoint(
        &self,
        namespace_id: &str,
        endpoint_id: &str,
    ) -> HnsResult<()> {
        let api = Arc::clone(&self.api);
        let (namespace_id, endpoint_id) = (namespace_id.to_string(), endpoint_id.to_string());
        self.gateway
            .execute(operation::ADD_NAMESPACE_ENDPOINT, move || {
                api.add_namespace_endpoint(&namespace_id, &endpoint_id)
            })
            .await
    }

    /// Detach an endpoint from a namespace.
    pub async fn remove_namespace_endpoint(
        &self,
        namespace_id: &str,
        endpoint_id: &str,
    ) -> HnsResult<()> {
        let api = Arc::clone(&self.api);
        let (namespace_id, endpoint_id) = (namespace_id.to_string(), endpoint_id.to_string());
        self.gateway
            .execute(operation::REMOVE_NAMESPACE_ENDPOINT, move || {
                api.remove_namespace_endpoint(&namespace_id, &endpoint_id)
            })
            .await
    }

    /// Look up a network by GUID.
    pub async fn get_network_by_id(&self, network_id: &str) -> HnsResult<HostComputeNetwork> {
        let (api, network_id) = (Arc::clone(&self.api), network_id.to_string());
        self.gateway
            .execute(operation::GET_NETWORK_BY_ID, move || {
                api.get_network_by_id(&network_id)
            })
            .await
    }

    /// Look up a network by name.
    pub async fn get_network_by_name(&self, network_name: &str) -> HnsResult<HostComputeNetwork> {
        let (api, network_name) = (Arc::clone(&self.api), network_name.to_string());
        self.gateway
            .execute(operation::GET_NETWORK_BY_NAME, move || {
                api.get_network_by_name(&network_name)
            })
            .await
    }
}
