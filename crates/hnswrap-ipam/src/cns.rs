//! Container Networking Service (CNS) client.
//!
//! CNS owns the pod IP pool on the node. The plugin asks it for an IP
//! configuration on ADD and hands the address back on DEL.

use std::time::Duration;

use async_trait::async_trait;
use hnswrap_common::CnsConfig;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{IpamError, IpamResult};

/// Path of the IP request endpoint.
pub const REQUEST_IP_CONFIG_PATH: &str = "/network/requestipconfig";
/// Path of the IP release endpoint.
pub const RELEASE_IP_CONFIG_PATH: &str = "/network/releaseipconfig";

/// CNS return code for success.
pub const RETURN_CODE_SUCCESS: i32 = 0;
/// CNS return code when the allocation is unknown.
pub const RETURN_CODE_NOT_FOUND: i32 = 14;

/// Pod identity sent to CNS as the orchestrator context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KubernetesPodInfo {
    /// Pod name.
    pub pod_name: String,
    /// Pod namespace.
    pub pod_namespace: String,
}

/// Request body for IP allocation and release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpConfigRequest {
    /// Specific address to allocate, empty for any.
    #[serde(rename = "desiredIPAddress", default)]
    pub desired_ip_address: String,
    /// Interface the address is for.
    #[serde(rename = "podInterfaceID")]
    pub pod_interface_id: String,
    /// Infra (pause) container id.
    #[serde(rename = "infraContainerID")]
    pub infra_container_id: String,
    /// Orchestrator-specific pod identity.
    pub orchestrator_context: serde_json::Value,
}

/// An address and prefix length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IpSubnet {
    /// IP address text.
    #[serde(rename = "IPAddress")]
    pub ip_address: String,
    /// Prefix length.
    pub prefix_length: u8,
}

/// Network container IP configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IpConfiguration {
    /// Subnet of the network container's primary address.
    #[serde(rename = "IPSubnet", default)]
    pub ip_subnet: IpSubnet,
    /// DNS servers for pods on this network container.
    #[serde(rename = "DNSServers", default)]
    pub dns_servers: Vec<String>,
    /// Gateway address.
    #[serde(rename = "GatewayIPAddress", default)]
    pub gateway_ip_address: String,
}

/// Host addressing, informational.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostIpInfo {
    /// Host gateway.
    #[serde(default)]
    pub gateway: String,
    /// Host primary IP.
    #[serde(rename = "PrimaryIP", default)]
    pub primary_ip: String,
    /// Host subnet.
    #[serde(default)]
    pub subnet: String,
}

/// IP information assigned to a pod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PodIpInfo {
    /// Pod address.
    #[serde(rename = "PodIPConfig")]
    pub pod_ip_config: IpSubnet,
    /// Network container configuration the pod address belongs to.
    #[serde(rename = "NetworkContainerPrimaryIPConfig")]
    pub network_container_primary_ip_config: IpConfiguration,
    /// Host addressing.
    #[serde(rename = "HostPrimaryIPInfo", default)]
    pub host_primary_ip_info: HostIpInfo,
}

/// CNS status block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CnsResponse {
    /// Return code, zero on success.
    pub return_code: i32,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

impl CnsResponse {
    fn into_result(self) -> IpamResult<()> {
        if self.return_code == RETURN_CODE_SUCCESS {
            Ok(())
        } else {
            Err(IpamError::Cns {
                code: self.return_code,
                message: self.message,
            })
        }
    }
}

/// Response to an IP request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IpConfigResponse {
    /// Assigned addressing.
    #[serde(rename = "PodIpInfo", default)]
    pub pod_ip_info: PodIpInfo,
    /// Status.
    pub response: CnsResponse,
}

/// Source of pod IP configurations.
#[async_trait]
pub trait IpamClient: Send + Sync {
    /// Allocate an IP configuration for a pod interface.
    async fn request_ip_address(&self, request: &IpConfigRequest) -> IpamResult<IpConfigResponse>;

    /// Release the IP configuration held by a pod interface.
    async fn release_ip_address(&self, request: &IpConfigRequest) -> IpamResult<()>;
}

/// HTTP client for the CNS API.
#[derive(Debug, Clone)]
pub struct CnsClient {
    client: Client,
    base_url: String,
}

impl CnsClient {
    /// Create a client for the CNS instance at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> IpamResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| IpamError::Http {
                url: base_url.clone(),
                message: format!("Failed to build HTTP client: {e}"),
                timed_out: false,
            })?;

        Ok(Self { client, base_url })
    }

    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// See [`CnsClient::new`].
    pub fn from_config(config: &CnsConfig) -> IpamResult<Self> {
        Self::new(config.base_url.clone(), config.request_timeout)
    }

    /// The CNS base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &IpConfigRequest) -> IpamResult<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, pod_interface_id = %body.pod_interface_id, "Calling CNS");

        let http_err = |e: reqwest::Error| IpamError::Http {
            url: url.clone(),
            message: e.to_string(),
            timed_out: e.is_timeout(),
        };

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(http_err)?;

        if !response.status().is_success() {
            return Err(IpamError::Http {
                url,
                message: format!("unexpected status {}", response.status()),
                timed_out: false,
            });
        }

        response.json::<T>().await.map_err(|e| IpamError::InvalidResponse {
            message: format!("undecodable CNS response: {e}"),
        })
    }
}

#[async_trait]
impl IpamClient for CnsClient {
    async fn request_ip_address(&self, request: &IpConfigRequest) -> IpamResult<IpConfigResponse> {
        let response: IpConfigResponse = self.post(REQUEST_IP_CONFIG_PATH, request).await?;
        response.response.clone().into_result()?;
        Ok(response)
    }

    async fn release_ip_address(&self, request: &IpConfigRequest) -> IpamResult<()> {
        let response: CnsResponse = self.post(RELEASE_IP_CONFIG_PATH, request).await?;
        response.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_cns_field_names() {
        let request = IpConfigRequest {
            desired_ip_address: String::new(),
            pod_interface_id: "01234567-eth0".to_string(),
            infra_container_id: "0123456789".to_string(),
            orchestrator_context: serde_json::json!({"PodName": "web-0", "PodNamespace": "default"}),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["podInterfaceID"], "01234567-eth0");
        assert_eq!(json["infraContainerID"], "0123456789");
        assert_eq!(json["desiredIPAddress"], "");
        assert_eq!(json["orchestratorContext"]["PodName"], "web-0");
    }

    #[test]
    fn response_decodes_from_cns_json() {
        let response: IpConfigResponse = serde_json::from_str(
            r#"{
                "PodIpInfo": {
                    "PodIPConfig": {"IPAddress": "10.240.0.7", "PrefixLength": 32},
                    "NetworkContainerPrimaryIPConfig": {
                        "IPSubnet": {"IPAddress": "10.240.0.0", "PrefixLength": 16},
                        "DNSServers": ["168.63.129.16"],
                        "GatewayIPAddress": "10.240.0.1"
                    },
                    "HostPrimaryIPInfo": {"Gateway": "10.0.0.1", "PrimaryIP": "10.0.0.4", "Subnet": "10.0.0.0/24"}
                },
                "Response": {"ReturnCode": 0, "Message": ""}
            }"#,
        )
        .unwrap();

        let info = &response.pod_ip_info;
        assert_eq!(info.pod_ip_config.ip_address, "10.240.0.7");
        assert_eq!(info.network_container_primary_ip_config.ip_subnet.prefix_length, 16);
        assert_eq!(info.network_container_primary_ip_config.gateway_ip_address, "10.240.0.1");
        assert_eq!(info.host_primary_ip_info.primary_ip, "10.0.0.4");
        assert!(response.response.into_result().is_ok());
    }

    #[test]
    fn non_zero_return_code_is_an_error() {
        let status = CnsResponse {
            return_code: 5,
            message: "no free addresses".to_string(),
        };
        assert!(matches!(
            status.into_result().unwrap_err(),
            IpamError::Cns { code: 5, .. }
        ));
    }

    #[test]
    fn base_url_is_normalised() {
        let client = CnsClient::new("http://localhost:10090/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:10090");
    }
}
