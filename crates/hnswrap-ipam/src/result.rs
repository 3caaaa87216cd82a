//! CNI network configuration and result types.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::cns::IpConfigResponse;
use crate::error::{IpamError, IpamResult};

/// Result versions this plugin can produce.
pub const SUPPORTED_VERSIONS: [&str; 4] = ["0.3.0", "0.3.1", "0.4.0", "1.0.0"];

/// Version used when the configuration does not name one.
pub const DEFAULT_CNI_VERSION: &str = "1.0.0";

/// The parts of the network configuration the plugin reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetConf {
    /// Requested result version.
    #[serde(default = "default_cni_version")]
    pub cni_version: String,
    /// Network name.
    #[serde(default)]
    pub name: String,
    /// Plugin type.
    #[serde(rename = "type", default)]
    pub plugin_type: String,
}

fn default_cni_version() -> String {
    DEFAULT_CNI_VERSION.to_string()
}

impl NetConf {
    /// Parse the configuration read from stdin.
    ///
    /// # Errors
    ///
    /// Returns [`IpamError::InvalidConfig`] if the bytes are not valid JSON.
    pub fn parse(stdin: &[u8]) -> IpamResult<Self> {
        Ok(serde_json::from_slice(stdin)?)
    }
}

/// An address with its prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpNetwork {
    /// Address.
    pub addr: IpAddr,
    /// Prefix length.
    pub prefix: u8,
}

impl IpNetwork {
    /// Combine an address and prefix, validating the prefix for the family.
    ///
    /// # Errors
    ///
    /// Returns [`IpamError::InvalidResponse`] for an unparseable address or
    /// an out-of-range prefix.
    pub fn new(addr: &str, prefix: u8) -> IpamResult<Self> {
        let addr: IpAddr = addr.parse().map_err(|_| IpamError::InvalidResponse {
            message: format!("invalid pod address {addr:?}"),
        })?;

        let max = if addr.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(IpamError::InvalidResponse {
                message: format!("invalid pod CIDR {addr}/{prefix}"),
            });
        }
        Ok(Self { addr, prefix })
    }

    /// Default route destination for this address family.
    #[must_use]
    pub const fn default_route(&self) -> &'static str {
        match self.addr {
            IpAddr::V4(_) => "0.0.0.0/0",
            IpAddr::V6(_) => "::/0",
        }
    }
}

impl fmt::Display for IpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

/// Addressing extracted from a CNS response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodAddressing {
    /// Pod address and prefix.
    pub address: IpNetwork,
    /// Gateway.
    pub gateway: IpAddr,
    /// DNS servers.
    pub nameservers: Vec<String>,
}

impl PodAddressing {
    /// Interpret a CNS response.
    ///
    /// The pod address takes its prefix length from the network container's
    /// primary subnet.
    ///
    /// # Errors
    ///
    /// Returns [`IpamError::InvalidResponse`] if the address or gateway is
    /// not valid.
    pub fn from_response(response: &IpConfigResponse) -> IpamResult<Self> {
        let info = &response.pod_ip_info;
        let nc = &info.network_container_primary_ip_config;

        let address = IpNetwork::new(&info.pod_ip_config.ip_address, nc.ip_subnet.prefix_length)?;
        let gateway: IpAddr =
            nc.gateway_ip_address
                .parse()
                .map_err(|_| IpamError::InvalidResponse {
                    message: format!("invalid gateway address {:?}", nc.gateway_ip_address),
                })?;

        if gateway.is_ipv4() != address.addr.is_ipv4() {
            return Err(IpamError::InvalidResponse {
                message: format!("gateway {gateway} does not match pod address {address}"),
            });
        }

        Ok(Self {
            address,
            gateway,
            nameservers: nc.dns_servers.clone(),
        })
    }
}

/// A CNI ADD result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CniResult {
    /// Pod addressing.
    pub addressing: PodAddressing,
}

impl CniResult {
    /// Serialize for the requested result version.
    ///
    /// # Errors
    ///
    /// Returns [`IpamError::UnsupportedVersion`] for versions this plugin
    /// cannot produce.
    pub fn to_version(&self, cni_version: &str) -> IpamResult<Value> {
        if !SUPPORTED_VERSIONS.contains(&cni_version) {
            return Err(IpamError::UnsupportedVersion {
                version: cni_version.to_string(),
            });
        }

        let addressing = &self.addressing;
        let mut ip = json!({
            "address": addressing.address.to_string(),
            "gateway": addressing.gateway.to_string(),
        });
        // Pre-1.0 results tag each IP with its family.
        if cni_version != "1.0.0" {
            ip["version"] = json!(if addressing.address.addr.is_ipv4() { "4" } else { "6" });
        }

        let mut result = json!({
            "cniVersion": cni_version,
            "ips": [ip],
            "routes": [{
                "dst": addressing.address.default_route(),
                "gw": addressing.gateway.to_string(),
            }],
        });
        if !addressing.nameservers.is_empty() {
            result["dns"] = json!({ "nameservers": addressing.nameservers });
        }
        Ok(result)
    }
}

/// Output of the VERSION command.
#[must_use]
pub fn version_info(cni_version: &str) -> Value {
    json!({
        "cniVersion": cni_version,
        "supportedVersions": SUPPORTED_VERSIONS,
    })
}

/// A CNI error object, printed on stdout when a command fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CniError {
    /// Version of the error format.
    pub cni_version: String,
    /// CNI error code.
    pub code: u32,
    /// Message.
    pub msg: String,
}

impl CniError {
    /// Describe `err` in the CNI error format.
    #[must_use]
    pub fn from_error(cni_version: &str, err: &IpamError) -> Self {
        Self {
            cni_version: cni_version.to_string(),
            code: err.cni_code(),
            msg: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cns::{IpConfiguration, IpSubnet, PodIpInfo};

    fn response(pod_ip: &str, prefix: u8, gateway: &str) -> IpConfigResponse {
        IpConfigResponse {
            pod_ip_info: PodIpInfo {
                pod_ip_config: IpSubnet {
                    ip_address: pod_ip.to_string(),
                    prefix_length: 32,
                },
                network_container_primary_ip_config: IpConfiguration {
                    ip_subnet: IpSubnet {
                        ip_address: "10.240.0.0".to_string(),
                        prefix_length: prefix,
                    },
                    dns_servers: vec!["168.63.129.16".to_string()],
                    gateway_ip_address: gateway.to_string(),
                },
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn interprets_cns_response() {
        let addressing =
            PodAddressing::from_response(&response("10.240.0.7", 16, "10.240.0.1")).unwrap();
        assert_eq!(addressing.address.to_string(), "10.240.0.7/16");
        assert_eq!(addressing.gateway.to_string(), "10.240.0.1");
        assert_eq!(addressing.nameservers, vec!["168.63.129.16"]);
    }

    #[test]
    fn rejects_bad_address_gateway_and_prefix() {
        assert!(PodAddressing::from_response(&response("10.240.0.300", 16, "10.240.0.1")).is_err());
        assert!(PodAddressing::from_response(&response("10.240.0.7", 16, "")).is_err());
        assert!(PodAddressing::from_response(&response("10.240.0.7", 33, "10.240.0.1")).is_err());
        assert!(PodAddressing::from_response(&response("10.240.0.7", 16, "fe80::1")).is_err());
    }

    #[test]
    fn result_for_v1() {
        let result = CniResult {
            addressing: PodAddressing::from_response(&response("10.240.0.7", 16, "10.240.0.1"))
                .unwrap(),
        };

        assert_eq!(
            result.to_version("1.0.0").unwrap(),
            json!({
                "cniVersion": "1.0.0",
                "ips": [{"address": "10.240.0.7/16", "gateway": "10.240.0.1"}],
                "routes": [{"dst": "0.0.0.0/0", "gw": "10.240.0.1"}],
                "dns": {"nameservers": ["168.63.129.16"]},
            })
        );
    }

    #[test]
    fn result_for_legacy_versions_tags_family() {
        let result = CniResult {
            addressing: PodAddressing {
                address: IpNetwork::new("fd00::7", 64).unwrap(),
                gateway: "fd00::1".parse().unwrap(),
                nameservers: Vec::new(),
            },
        };

        let value = result.to_version("0.3.1").unwrap();
        assert_eq!(value["ips"][0]["version"], "6");
        assert_eq!(value["routes"][0]["dst"], "::/0");
        assert!(value.get("dns").is_none());
    }

    #[test]
    fn unsupported_version() {
        let result = CniResult {
            addressing: PodAddressing::from_response(&response("10.240.0.7", 16, "10.240.0.1"))
                .unwrap(),
        };
        assert!(matches!(
            result.to_version("0.2.0").unwrap_err(),
            IpamError::UnsupportedVersion { .. }
        ));
    }

    #[test]
    fn netconf_defaults_version() {
        let conf = NetConf::parse(br#"{"name":"azure","type":"hnswrap-ipam"}"#).unwrap();
        assert_eq!(conf.cni_version, DEFAULT_CNI_VERSION);
        assert_eq!(conf.plugin_type, "hnswrap-ipam");
        assert!(NetConf::parse(b"not json").is_err());
    }

    #[test]
    fn error_object() {
        let err = IpamError::MissingArg {
            key: "K8S_POD_NAME",
        };
        let obj = CniError::from_error("1.0.0", &err);
        assert_eq!(
            serde_json::to_value(&obj).unwrap(),
            json!({"cniVersion": "1.0.0", "code": 4, "msg": "Missing CNI argument K8S_POD_NAME"})
        );
    }
}
