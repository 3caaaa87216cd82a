//! Host network handles.
//!
//! These mirror the HNS v2 schema closely enough to be forwarded to the
//! native API. The gateway and surface never look inside them.

use serde::{Deserialize, Serialize};

/// HNS schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchemaVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self { major: 2, minor: 0 }
    }
}

/// A host compute network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostComputeNetwork {
    /// Network GUID, assigned by the host on creation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Network name.
    pub name: String,
    /// Network type (`NAT`, `L2Bridge`, `Overlay`, ...).
    #[serde(rename = "Type")]
    pub network_type: String,
    /// Network policies, as raw HNS JSON.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<serde_json::Value>,
    /// IPAM settings, as raw HNS JSON.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ipams: Vec<serde_json::Value>,
    /// Network flags.
    #[serde(default)]
    pub flags: u32,
    /// Schema version.
    #[serde(default)]
    pub schema_version: SchemaVersion,
}

/// A host compute endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostComputeEndpoint {
    /// Endpoint GUID, assigned by the host on creation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Endpoint name.
    pub name: String,
    /// GUID of the network the endpoint belongs to.
    #[serde(rename = "HostComputeNetwork")]
    pub network_id: String,
    /// GUID of the namespace the endpoint is attached to.
    #[serde(
        rename = "HostComputeNamespace",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub namespace_id: String,
    /// Endpoint policies, as raw HNS JSON.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<serde_json::Value>,
    /// IP configurations, as raw HNS JSON.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_configurations: Vec<serde_json::Value>,
    /// MAC address.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mac_address: String,
    /// Endpoint flags.
    #[serde(default)]
    pub flags: u32,
    /// Schema version.
    #[serde(default)]
    pub schema_version: SchemaVersion,
}

/// A host compute namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostComputeNamespace {
    /// Namespace GUID.
    pub id: String,
    /// Namespace numeric id.
    #[serde(default)]
    pub namespace_id: u32,
    /// Resources (endpoints, containers) attached to the namespace, as raw HNS JSON.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<serde_json::Value>,
    /// Schema version.
    #[serde(default)]
    pub schema_version: SchemaVersion,
}

/// Kind of modification requested against a host object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    /// Add a setting.
    Add,
    /// Remove a setting.
    Remove,
    /// Replace a setting.
    Update,
    /// Re-apply a setting.
    Refresh,
}

/// Resource targeted by a network settings modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkResourceType {
    /// DNS settings.
    #[serde(rename = "DNS")]
    Dns,
    /// An extension.
    Extension,
    /// A network policy.
    Policy,
    /// A subnet.
    Subnet,
    /// IPAM settings.
    #[serde(rename = "IPSubnet")]
    IpSubnet,
}

/// Request to modify network settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyNetworkSettingRequest {
    /// Resource being modified.
    pub resource_type: NetworkResourceType,
    /// Add, remove, update or refresh.
    pub request_type: RequestType,
    /// Resource-specific settings, as raw HNS JSON.
    #[serde(default)]
    pub settings: serde_json::Value,
}

/// Network policies to add or remove.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyNetworkRequest {
    /// Policies, as raw HNS JSON.
    pub policies: Vec<serde_json::Value>,
}

/// Endpoint policies to apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyEndpointRequest {
    /// Policies, as raw HNS JSON.
    pub policies: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_serializes_with_hns_field_names() {
        let endpoint = HostComputeEndpoint {
            name: "eth0".to_string(),
            network_id: "net-1".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_value(&endpoint).unwrap();
        assert_eq!(json["Name"], "eth0");
        assert_eq!(json["HostComputeNetwork"], "net-1");
        assert_eq!(json["SchemaVersion"]["Major"], 2);
        assert!(json.get("Id").is_none());
    }

    #[test]
    fn network_deserializes_from_hns_json() {
        let network: HostComputeNetwork = serde_json::from_str(
            r#"{"Id":"abc","Name":"azure","Type":"L2Bridge","Flags":8}"#,
        )
        .unwrap();
        assert_eq!(network.id, "abc");
        assert_eq!(network.network_type, "L2Bridge");
        assert_eq!(network.flags, 8);
        assert_eq!(network.schema_version, SchemaVersion::default());
    }
}
