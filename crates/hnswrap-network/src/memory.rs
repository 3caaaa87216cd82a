//! In-memory host network backend.
//!
//! [`InMemoryHns`] keeps networks, endpoints and namespaces in maps and
//! lets callers inject latency and failures per operation. It stands in
//! for the native API in tests and on hosts without HNS.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hnswrap_common::HcnError;
use parking_lot::{Mutex, RwLock};

use crate::api::{CallOutcome, HnsApi};
use crate::surface::operation;
use crate::types::{
    HostComputeEndpoint, HostComputeNamespace, HostComputeNetwork, ModifyNetworkSettingRequest,
    NetworkResourceType, PolicyEndpointRequest, PolicyNetworkRequest, RequestType,
};

/// `HCN_E_NETWORK_NOT_FOUND`.
pub const NETWORK_NOT_FOUND: u32 = 0x803b_0001;
/// `HCN_E_ENDPOINT_NOT_FOUND`.
pub const ENDPOINT_NOT_FOUND: u32 = 0x803b_0002;

/// Computes the delay for a call from its key argument (a name or id).
pub type LatencyFn = Arc<dyn Fn(&str) -> Duration + Send + Sync>;

#[derive(Default)]
struct State {
    networks: HashMap<String, HostComputeNetwork>,
    endpoints: HashMap<String, HostComputeEndpoint>,
    namespaces: HashMap<String, HostComputeNamespace>,
}

#[derive(Default)]
struct Faults {
    latency: HashMap<&'static str, LatencyFn>,
    failures: HashMap<&'static str, HcnError>,
}

/// An [`HnsApi`] backed by in-process maps.
#[derive(Default)]
pub struct InMemoryHns {
    state: RwLock<State>,
    faults: Mutex<Faults>,
    started: Mutex<HashMap<&'static str, usize>>,
    completed: Mutex<HashMap<&'static str, usize>>,
}

impl InMemoryHns {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call to `operation` by `delay`.
    #[must_use]
    pub fn with_latency(self, operation: &'static str, delay: Duration) -> Self {
        self.set_latency(operation, Arc::new(move |_| delay));
        self
    }

    /// Make every call to `operation` fail with `error`.
    #[must_use]
    pub fn with_failure(self, operation: &'static str, error: HcnError) -> Self {
        self.faults.lock().failures.insert(operation, error);
        self
    }

    /// Delay calls to `operation` by a duration derived from the call's key.
    pub fn set_latency(&self, operation: &'static str, latency: LatencyFn) {
        self.faults.lock().latency.insert(operation, latency);
    }

    /// Stop injecting faults.
    pub fn clear_faults(&self) {
        let mut faults = self.faults.lock();
        faults.latency.clear();
        faults.failures.clear();
    }

    /// Register a namespace so endpoints can be attached to it.
    pub fn create_namespace(&self) -> HostComputeNamespace {
        let namespace = HostComputeNamespace {
            id: new_guid(),
            ..Default::default()
        };
        self.state
            .write()
            .namespaces
            .insert(namespace.id.clone(), namespace.clone());
        namespace
    }

    /// Number of calls to `operation` that have started.
    pub fn started(&self, operation: &str) -> usize {
        self.started.lock().get(operation).copied().unwrap_or(0)
    }

    /// Number of calls to `operation` that have returned.
    pub fn completed(&self, operation: &str) -> usize {
        self.completed.lock().get(operation).copied().unwrap_or(0)
    }

    /// Run `body` for `operation` after applying injected latency and failures.
    fn call<T>(
        &self,
        operation: &'static str,
        key: &str,
        body: impl FnOnce() -> CallOutcome<T>,
    ) -> CallOutcome<T> {
        *self.started.lock().entry(operation).or_default() += 1;

        let (latency, failure) = {
            let faults = self.faults.lock();
            (
                faults.latency.get(operation).cloned(),
                faults.failures.get(operation).cloned(),
            )
        };

        if let Some(latency) = latency {
            std::thread::sleep(latency(key));
        }

        let result = failure.map_or_else(body, Err);
        *self.completed.lock().entry(operation).or_default() += 1;
        tracing::trace!(operation, key, ok = result.is_ok(), "In-memory HNS call");
        result
    }

    fn network(&self, network_id: &str) -> CallOutcome<HostComputeNetwork> {
        self.state
            .read()
            .networks
            .get(network_id)
            .cloned()
            .ok_or_else(|| network_not_found(network_id))
    }

    fn endpoint(&self, endpoint_id: &str) -> CallOutcome<HostComputeEndpoint> {
        self.state
            .read()
            .endpoints
            .get(endpoint_id)
            .cloned()
            .ok_or_else(|| endpoint_not_found(endpoint_id))
    }

    fn update_network(
        &self,
        network_id: &str,
        update: impl FnOnce(&mut HostComputeNetwork),
    ) -> CallOutcome<()> {
        let mut state = self.state.write();
        let network = state
            .networks
            .get_mut(network_id)
            .ok_or_else(|| network_not_found(network_id))?;
        update(network);
        Ok(())
    }
}

fn new_guid() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn network_not_found(key: &str) -> HcnError {
    HcnError::with_code(NETWORK_NOT_FOUND, format!("Network {key} not found"))
}

fn endpoint_not_found(key: &str) -> HcnError {
    HcnError::with_code(ENDPOINT_NOT_FOUND, format!("Endpoint {key} not found"))
}

fn namespace_not_found(key: &str) -> HcnError {
    HcnError::new(format!("Namespace {key} not found"))
}

impl HnsApi for InMemoryHns {
    fn create_network(&self, network: &HostComputeNetwork) -> CallOutcome<HostComputeNetwork> {
        self.call(operation::CREATE_NETWORK, &network.name, || {
            let mut state = self.state.write();
            if state.networks.values().any(|n| n.name == network.name) {
                return Err(HcnError::new(format!(
                    "Network {} already exists",
                    network.name
                )));
            }

            let mut created = network.clone();
            if created.id.is_empty() {
                created.id = new_guid();
            }
            state.networks.insert(created.id.clone(), created.clone());
            Ok(created)
        })
    }

    fn delete_network(&self, network: &HostComputeNetwork) -> CallOutcome<()> {
        self.call(operation::DELETE_NETWORK, &network.id, || {
            let mut state = self.state.write();
            state
                .networks
                .remove(&network.id)
                .ok_or_else(|| network_not_found(&network.id))?;
            state.endpoints.retain(|_, ep| ep.network_id != network.id);
            Ok(())
        })
    }

    fn modify_network_settings(
        &self,
        network: &HostComputeNetwork,
        request: &ModifyNetworkSettingRequest,
    ) -> CallOutcome<()> {
        self.call(operation::MODIFY_NETWORK_SETTINGS, &network.id, || {
            self.update_network(&network.id, |stored| {
                if request.resource_type == NetworkResourceType::IpSubnet {
                    match request.request_type {
                        RequestType::Add | RequestType::Update | RequestType::Refresh => {
                            stored.ipams.push(request.settings.clone());
                        }
                        RequestType::Remove => stored.ipams.retain(|i| *i != request.settings),
                    }
                }
            })
        })
    }

    fn add_network_policy(
        &self,
        network: &HostComputeNetwork,
        policy: &PolicyNetworkRequest,
    ) -> CallOutcome<()> {
        self.call(operation::ADD_NETWORK_POLICY, &network.id, || {
            self.update_network(&network.id, |stored| {
                stored.policies.extend(policy.policies.iter().cloned());
            })
        })
    }

    fn remove_network_policy(
        &self,
        network: &HostComputeNetwork,
        policy: &PolicyNetworkRequest,
    ) -> CallOutcome<()> {
        self.call(operation::REMOVE_NETWORK_POLICY, &network.id, || {
            self.update_network(&network.id, |stored| {
                stored.policies.retain(|p| !policy.policies.contains(p));
            })
        })
    }

    fn create_endpoint(&self, endpoint: &HostComputeEndpoint) -> CallOutcome<HostComputeEndpoint> {
        self.call(operation::CREATE_ENDPOINT, &endpoint.name, || {
            let mut state = self.state.write();
            if !state.networks.contains_key(&endpoint.network_id) {
                return Err(network_not_found(&endpoint.network_id));
            }

            let mut created = endpoint.clone();
            if created.id.is_empty() {
                created.id = new_guid();
            }
            state.endpoints.insert(created.id.clone(), created.clone());
            Ok(created)
        })
    }

    fn delete_endpoint(&self, endpoint: &HostComputeEndpoint) -> CallOutcome<()> {
        self.call(operation::DELETE_ENDPOINT, &endpoint.id, || {
            self.state
                .write()
                .endpoints
                .remove(&endpoint.id)
                .map(|_| ())
                .ok_or_else(|| endpoint_not_found(&endpoint.id))
        })
    }

    fn get_endpoint_by_id(&self, endpoint_id: &str) -> CallOutcome<HostComputeEndpoint> {
        self.call(operation::GET_ENDPOINT_BY_ID, endpoint_id, || {
            self.endpoint(endpoint_id)
        })
    }

    fn get_endpoint_by_name(&self, endpoint_name: &str) -> CallOutcome<HostComputeEndpoint> {
        self.call(operation::GET_ENDPOINT_BY_NAME, endpoint_name, || {
            self.state
                .read()
                .endpoints
                .values()
                .find(|ep| ep.name == endpoint_name)
                .cloned()
                .ok_or_else(|| endpoint_not_found(endpoint_name))
        })
    }

    fn list_endpoints_of_network(
        &self,
        network_id: &str,
    ) -> CallOutcome<Vec<HostComputeEndpoint>> {
        self.call(operation::LIST_ENDPOINTS_OF_NETWORK, network_id, || {
            let state = self.state.read();
            let mut endpoints: Vec<_> = state
                .endpoints
                .values()
                .filter(|ep| ep.network_id == network_id)
                .cloned()
                .collect();
            endpoints.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(endpoints)
        })
    }

    fn apply_endpoint_policy(
        &self,
        endpoint: &HostComputeEndpoint,
        request_type: RequestType,
        policy: &PolicyEndpointRequest,
    ) -> CallOutcome<()> {
        self.call(operation::APPLY_ENDPOINT_POLICY, &endpoint.id, || {
            let mut state = self.state.write();
            let stored = state
                .endpoints
                .get_mut(&endpoint.id)
                .ok_or_else(|| endpoint_not_found(&endpoint.id))?;

            match request_type {
                RequestType::Add => stored.policies.extend(policy.policies.iter().cloned()),
                RequestType::Remove => stored.policies.retain(|p| !policy.policies.contains(p)),
                RequestType::Update | RequestType::Refresh => {
                    stored.policies.clone_from(&policy.policies);
                }
            }
            Ok(())
        })
    }

    fn get_namespace_by_id(&self, namespace_id: &str) -> CallOutcome<HostComputeNamespace> {
        self.call(operation::GET_NAMESPACE_BY_ID, namespace_id, || {
            self.state
                .read()
                .namespaces
                .get(namespace_id)
                .cloned()
                .ok_or_else(|| namespace_not_found(namespace_id))
        })
    }

    fn add_namespace_endpoint(&self, namespace_id: &str, endpoint_id: &str) -> CallOutcome<()> {
        self.call(operation::ADD_NAMESPACE_ENDPOINT, namespace_id, || {
            let mut state = self.state.write();
            let State {
                endpoints,
                namespaces,
                ..
            } = &mut *state;

            let namespace = namespaces
                .get_mut(namespace_id)
                .ok_or_else(|| namespace_not_found(namespace_id))?;
            let endpoint = endpoints
                .get_mut(endpoint_id)
                .ok_or_else(|| endpoint_not_found(endpoint_id))?;

            endpoint.namespace_id = namespace_id.to_string();
            let resource = serde_json::json!({ "Type": "Endpoint", "Data": { "Id": endpoint_id } });
            if !namespace.resources.contains(&resource) {
                namespace.resources.push(resource);
            }
            Ok(())
        })
    }

    fn remove_namespace_endpoint(&self, namespace_id: &str, endpoint_id: &str) -> CallOutcome<()> {
        self.call(operation::REMOVE_NAMESPACE_ENDPOINT, namespace_id, || {
            let mut state = self.state.write();
            let State {
                endpoints,
                namespaces,
                ..
            } = &mut *state;

            let namespace = namespaces
                .get_mut(namespace_id)
                .ok_or_else(|| namespace_not_found(namespace_id))?;
            namespace
                .resources
                .retain(|r| r["Data"]["Id"].as_str() != Some(endpoint_id));

            if let Some(endpoint) = endpoints.get_mut(endpoint_id) {
                endpoint.namespace_id.clear();
            }
            Ok(())
        })
    }

    fn get_network_by_id(&self, network_id: &str) -> CallOutcome<HostComputeNetwork> {
        self.call(operation::GET_NETWORK_BY_ID, network_id, || {
            self.network(network_id)
        })
    }

    fn get_network_by_name(&self, network_name: &str) -> CallOutcome<HostComputeNetwork> {
        self.call(operation::GET_NETWORK_BY_NAME, network_name, || {
            self.state
                .read()
                .networks
                .values()
                .find(|n| n.name == network_name)
                .cloned()
                .ok_or_else(|| network_not_found(network_name))
        })
    }
}
