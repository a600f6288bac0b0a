//! Correlation types linking an asset manager's native identifiers to open
//! metadata GUIDs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the asset manager allocates its identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyPattern {
    /// Unique key allocated and used within the scope of a single system.
    #[default]
    LocalKey,
    /// Unique key that may be reused after the original element is deleted.
    RecycledKey,
    /// Key derived from an attribute of the element.
    NaturalKey,
    /// Key value copied from another system.
    MirrorKey,
    /// Key formed by combining keys from multiple systems.
    AggregateKey,
    /// Key supplied by the caller of the system.
    CallersKey,
    /// Key that never changes, even when the element is copied.
    StableKey,
    Other,
}

/// Direction in which metadata flows between the asset manager and open
/// metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SynchronizationDirection {
    #[default]
    BothDirections,
    FromThirdParty,
    ToThirdParty,
    Other,
}

/// Identifies the calling asset manager and, optionally, its native
/// identifier for the element being maintained.
///
/// Supplied on create, update and remove requests. When an
/// `external_identifier` is present it must already be correlated with the
/// element being updated or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataCorrelationProperties {
    pub asset_manager_guid: Option<String>,
    pub asset_manager_name: Option<String>,
    pub external_identifier: Option<String>,
    pub external_identifier_name: Option<String>,
    pub external_identifier_usage: Option<String>,
    pub external_identifier_source: Option<String>,
    pub key_pattern: KeyPattern,
    pub mapping_properties: BTreeMap<String, String>,
    pub synchronization_direction: SynchronizationDirection,
    pub synchronization_description: Option<String>,
}

impl MetadataCorrelationProperties {
    /// Correlation naming only the asset manager.
    pub fn for_asset_manager(guid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            asset_manager_guid: Some(guid.into()),
            asset_manager_name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Add the asset manager's native identifier for the element.
    pub fn with_external_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.external_identifier = Some(identifier.into());
        self
    }
}

/// Correlation properties as stored against an element, with the time the
/// asset manager last confirmed the element was in step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataCorrelationHeader {
    pub asset_manager_guid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_manager_name: Option<String>,
    pub external_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_identifier_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_identifier_usage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_identifier_source: Option<String>,
    pub key_pattern: KeyPattern,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mapping_properties: BTreeMap<String, String>,
    pub synchronization_direction: SynchronizationDirection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synchronization_description: Option<String>,
    pub last_synchronized: DateTime<Utc>,
}
