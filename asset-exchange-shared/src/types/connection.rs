//! Property bags for connections, connector types, endpoints and the
//! relationships between them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::element::{impl_element_properties, CorrelatedElement};

/// A connection as returned to an asset manager.
pub type ConnectionElement = CorrelatedElement<ConnectionProperties>;

/// A connector type as returned to an asset manager.
pub type ConnectorTypeElement = CorrelatedElement<ConnectorTypeProperties>;

/// An endpoint as returned to an asset manager.
pub type EndpointElement = CorrelatedElement<EndpointProperties>;

/// Properties of a Connection: the information a connector needs to reach
/// an asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionProperties {
    pub qualified_name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub user_id: Option<String>,
    pub encrypted_password: Option<String>,
    pub clear_password: Option<String>,
    pub secured_properties: BTreeMap<String, String>,
    pub configuration_properties: BTreeMap<String, Value>,
    pub additional_properties: BTreeMap<String, String>,
    #[serde(skip)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub effective_to: Option<DateTime<Utc>>,
}

impl_element_properties!(ConnectionProperties);

/// Properties of a ConnectorType: describes the connector implementation
/// that a connection is configured for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorTypeProperties {
    pub qualified_name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub supported_asset_type_name: Option<String>,
    pub expected_data_format: Option<String>,
    pub connector_provider_class_name: Option<String>,
    pub connector_framework_name: Option<String>,
    pub connector_interface_language: Option<String>,
    pub connector_interfaces: Vec<String>,
    pub target_technology_source: Option<String>,
    pub target_technology_name: Option<String>,
    pub recognized_configuration_properties: Vec<String>,
    pub additional_properties: BTreeMap<String, String>,
    #[serde(skip)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub effective_to: Option<DateTime<Utc>>,
}

impl_element_properties!(ConnectorTypeProperties);

/// Properties of an Endpoint: the network address of a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointProperties {
    pub qualified_name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub network_address: Option<String>,
    pub protocol: Option<String>,
    pub encryption_method: Option<String>,
    pub additional_properties: BTreeMap<String, String>,
    #[serde(skip)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub effective_to: Option<DateTime<Utc>>,
}

impl_element_properties!(EndpointProperties);

/// Values overlaid on a copy of a template element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateProperties {
    pub qualified_name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_address: Option<String>,
}

/// Properties for relationships that only carry effectivity dates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipProperties {
    #[serde(skip)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub effective_to: Option<DateTime<Utc>>,
}

impl_element_properties!(RelationshipProperties, unnamed);

/// Properties of the EmbeddedConnection relationship between a virtual
/// connection and one of the connections it wraps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedConnectionProperties {
    pub position: i32,
    pub display_name: Option<String>,
    pub arguments: BTreeMap<String, Value>,
    #[serde(skip)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub effective_to: Option<DateTime<Utc>>,
}

impl_element_properties!(EmbeddedConnectionProperties, unnamed);

/// Properties of the ConnectionToAsset relationship.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConnectionProperties {
    pub asset_summary: Option<String>,
    #[serde(skip)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub effective_to: Option<DateTime<Utc>>,
}

impl_element_properties!(AssetConnectionProperties, unnamed);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::element::ElementProperties;

    #[test]
    fn test_effectivity_is_not_serialized() {
        let properties = ConnectionProperties {
            qualified_name: Some("conn-1".to_string()),
            effective_from: Some(Utc::now()),
            ..Default::default()
        };

        let json = serde_json::to_value(&properties).unwrap();
        assert!(json.get("effective_from").is_none());
        assert_eq!(json["qualified_name"], "conn-1");
    }

    #[test]
    fn test_partial_map_deserializes() {
        let properties: EndpointProperties =
            serde_json::from_str(r#"{"network_address":"https://host:8080"}"#).unwrap();

        assert_eq!(properties.network_address.as_deref(), Some("https://host:8080"));
        assert!(properties.qualified_name().is_none());
    }

    #[test]
    fn test_relationship_properties_have_no_name() {
        let properties = EmbeddedConnectionProperties {
            position: 2,
            ..Default::default()
        };
        assert!(properties.qualified_name().is_none());
    }
}
