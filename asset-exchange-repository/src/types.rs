//! Request and response types exchanged with the generic metadata layer.

use asset_exchange_shared::{
    ElementHeader, ElementOrigin, InstanceStatus, MetadataCorrelationProperties,
    RelationshipHeader,
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Names of the entity and relationship types maintained through the
/// exchange handlers.
pub mod type_names {
    pub const CONNECTION: &str = "Connection";
    pub const CONNECTOR_TYPE: &str = "ConnectorType";
    pub const ENDPOINT: &str = "Endpoint";
    pub const EXTERNAL_REFERENCE: &str = "ExternalReference";
    pub const PROCESS: &str = "Process";
    pub const PORT: &str = "Port";

    /// Any entity type; used where an element of any kind may appear.
    pub const REFERENCEABLE: &str = "Referenceable";

    pub const CONNECTION_CONNECTOR_TYPE: &str = "ConnectionConnectorType";
    pub const CONNECTION_ENDPOINT: &str = "ConnectionEndpoint";
    pub const EMBEDDED_CONNECTION: &str = "EmbeddedConnection";
    pub const CONNECTION_TO_ASSET: &str = "ConnectionToAsset";
    pub const EXTERNAL_REFERENCE_LINK: &str = "ExternalReferenceLink";
    pub const PROCESS_HIERARCHY: &str = "ProcessHierarchy";
    pub const PORT_DELEGATION: &str = "PortDelegation";
    pub const PORT_SCHEMA: &str = "PortSchema";
    pub const DATA_FLOW: &str = "DataFlow";
    pub const CONTROL_FLOW: &str = "ControlFlow";
    pub const PROCESS_CALL: &str = "ProcessCall";
    pub const LINEAGE_MAPPING: &str = "LineageMapping";

    /// Relationships that must survive the deletion of their ends so that
    /// lineage can still be traced.
    pub const LINEAGE_RELATIONSHIPS: &[&str] = &[DATA_FLOW, CONTROL_FLOW, PROCESS_CALL, LINEAGE_MAPPING];
}

/// Options shared by every request that reads or changes stored elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Only elements effective at this time are visible. `None` means any time.
    pub effective_time: Option<DateTime<Utc>>,
    /// Include elements that were deleted but retained for lineage.
    pub for_lineage: bool,
    /// The caller is resolving duplicates and wants the raw elements.
    pub for_duplicate_processing: bool,
}

impl RequestOptions {
    /// Options restricted to elements effective at `time`.
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            effective_time: Some(time),
            ..Default::default()
        }
    }

    /// Options that include elements retained for lineage.
    pub fn lineage() -> Self {
        Self {
            for_lineage: true,
            ..Default::default()
        }
    }
}

/// Who is recorded as the owner of an element or relationship.
///
/// Computed once per request from the caller's correlation properties and
/// passed down to the generic layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    /// Owned by the local server; any authorized caller may maintain it.
    LocalOwned,
    /// Owned by an asset manager; only that asset manager may maintain it.
    ExternallyOwned {
        source_guid: String,
        source_name: Option<String>,
    },
}

impl Ownership {
    /// Ownership for a new element. The asset manager only becomes the
    /// owner when it asks to be home for the element.
    pub fn for_create(
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
    ) -> Self {
        if !asset_manager_is_home {
            return Self::LocalOwned;
        }
        Self::for_update(correlation)
    }

    /// Ownership claimed by a request that changes an existing element.
    pub fn for_update(correlation: Option<&MetadataCorrelationProperties>) -> Self {
        match correlation.and_then(|c| c.asset_manager_guid.as_ref().map(|guid| (guid, c))) {
            Some((guid, correlation)) => Self::ExternallyOwned {
                source_guid: guid.clone(),
                source_name: correlation.asset_manager_name.clone(),
            },
            None => Self::LocalOwned,
        }
    }

    /// The origin recorded on elements created with this ownership.
    pub fn origin(&self) -> ElementOrigin {
        match self {
            Self::LocalOwned => ElementOrigin::local(),
            Self::ExternallyOwned {
                source_guid,
                source_name,
            } => ElementOrigin::external(source_guid.clone(), source_name.clone()),
        }
    }

    /// Whether a request with this ownership may change an element with the
    /// given origin.
    pub fn permits(&self, origin: &ElementOrigin) -> bool {
        match (&origin.external_source_guid, self) {
            (None, _) => true,
            (Some(owner), Self::ExternallyOwned { source_guid, .. }) => owner == source_guid,
            (Some(_), Self::LocalOwned) => false,
        }
    }
}

/// A validated page request. `page_size` of zero means no limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Paging {
    pub start_from: usize,
    pub page_size: usize,
}

impl Paging {
    /// Every result from the beginning.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(start_from: usize, page_size: usize) -> Self {
        Self {
            start_from,
            page_size,
        }
    }

    /// Select the requested page from an ordered sequence.
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let items = items.into_iter().skip(self.start_from);
        if self.page_size == 0 {
            items.collect()
        } else {
            items.take(self.page_size).collect()
        }
    }
}

/// Request to create an entity.
#[derive(Debug, Clone)]
pub struct NewEntity {
    pub type_name: String,
    pub ownership: Ownership,
    pub properties: Map<String, Value>,
    pub status: InstanceStatus,
    pub zones: Vec<String>,
    pub anchor_guid: Option<String>,
    pub effective_from: Option<DateTime<Utc>>,
    pub effective_to: Option<DateTime<Utc>>,
}

impl NewEntity {
    /// An active entity with no zones, anchor or effectivity dates.
    pub fn new(type_name: &str, ownership: Ownership, properties: Map<String, Value>) -> Self {
        Self {
            type_name: type_name.to_string(),
            ownership,
            properties,
            status: InstanceStatus::Active,
            zones: Vec::new(),
            anchor_guid: None,
            effective_from: None,
            effective_to: None,
        }
    }

    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_zones(mut self, zones: Vec<String>) -> Self {
        self.zones = zones;
        self
    }

    pub fn with_anchor(mut self, anchor_guid: Option<String>) -> Self {
        self.anchor_guid = anchor_guid;
        self
    }

    pub fn with_effectivity(
        mut self,
        effective_from: Option<DateTime<Utc>>,
        effective_to: Option<DateTime<Utc>>,
    ) -> Self {
        self.effective_from = effective_from;
        self.effective_to = effective_to;
        self
    }
}

/// Request to change the properties of an entity or relationship.
///
/// A merge update only overwrites the properties (and effectivity dates)
/// that are present; a replace update swaps the whole property map.
#[derive(Debug, Clone)]
pub struct PropertiesUpdate {
    pub ownership: Ownership,
    pub properties: Map<String, Value>,
    pub is_merge_update: bool,
    pub effective_from: Option<DateTime<Utc>>,
    pub effective_to: Option<DateTime<Utc>>,
}

/// A stored entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDetail {
    pub header: ElementHeader,
    pub properties: Map<String, Value>,
    /// Deleted but retained because lineage relationships still refer to it.
    pub memento: bool,
}

impl EntityDetail {
    /// String value of a property, if present.
    pub fn string_property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }
}

/// How entities are selected by a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitySearch {
    /// Any string property matches the regular expression.
    Regex(String),
    /// One of the named properties equals the value exactly.
    ExactValue {
        value: String,
        property_names: Vec<&'static str>,
    },
    /// The entity is anchored to the given element.
    Anchored(String),
}

/// Request to create a relationship between two entities.
#[derive(Debug, Clone)]
pub struct NewRelationship {
    pub type_name: String,
    pub ownership: Ownership,
    pub end1_guid: String,
    pub end2_guid: String,
    pub properties: Map<String, Value>,
    pub effective_from: Option<DateTime<Utc>>,
    pub effective_to: Option<DateTime<Utc>>,
}

/// A stored relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipDetail {
    pub header: RelationshipHeader,
    pub end1_guid: String,
    pub end2_guid: String,
    pub properties: Map<String, Value>,
}

impl RelationshipDetail {
    /// String value of a property, if present.
    pub fn string_property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }

    /// The end opposite `guid`.
    pub fn other_end(&self, guid: &str) -> &str {
        if self.end1_guid == guid {
            &self.end2_guid
        } else {
            &self.end1_guid
        }
    }
}

/// Which end of a relationship the starting element must be at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipEnd {
    End1,
    End2,
    Either,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correlation() -> MetadataCorrelationProperties {
        MetadataCorrelationProperties::for_asset_manager("am-guid", "catalog")
    }

    #[test]
    fn test_create_ownership_requires_home() {
        let correlation = correlation();
        assert_eq!(
            Ownership::for_create(Some(&correlation), false),
            Ownership::LocalOwned
        );
        assert_eq!(
            Ownership::for_create(Some(&correlation), true),
            Ownership::ExternallyOwned {
                source_guid: "am-guid".to_string(),
                source_name: Some("catalog".to_string()),
            }
        );
        assert_eq!(Ownership::for_create(None, true), Ownership::LocalOwned);
    }

    #[test]
    fn test_ownership_permits() {
        let owner = Ownership::for_update(Some(&correlation()));
        let other = Ownership::ExternallyOwned {
            source_guid: "other".to_string(),
            source_name: None,
        };

        assert!(owner.permits(&ElementOrigin::local()));
        assert!(Ownership::LocalOwned.permits(&ElementOrigin::local()));
        assert!(owner.permits(&owner.origin()));
        assert!(!other.permits(&owner.origin()));
        assert!(!Ownership::LocalOwned.permits(&owner.origin()));
    }

    #[test]
    fn test_paging_apply() {
        let items = vec![1, 2, 3, 4, 5];
        assert_eq!(Paging::new(1, 2).apply(items.clone()), vec![2, 3]);
        assert_eq!(Paging::new(3, 0).apply(items.clone()), vec![4, 5]);
        assert_eq!(Paging::new(10, 2).apply(items), Vec::<i32>::new());
    }
}
