//! Element and relationship headers, plus the wrappers that pair them with
//! a family-specific property bag.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::correlation::MetadataCorrelationHeader;

/// Implements [`ElementProperties`] for a property bag that carries
/// `effective_from` / `effective_to` fields and, unless marked `unnamed`,
/// a `qualified_name` field.
macro_rules! impl_element_properties {
    ($ty:ty) => {
        impl $crate::types::element::ElementProperties for $ty {
            fn qualified_name(&self) -> Option<&str> {
                self.qualified_name.as_deref()
            }

            fn effective_from(&self) -> Option<chrono::DateTime<chrono::Utc>> {
                self.effective_from
            }

            fn effective_to(&self) -> Option<chrono::DateTime<chrono::Utc>> {
                self.effective_to
            }

            fn set_effectivity(
                &mut self,
                from: Option<chrono::DateTime<chrono::Utc>>,
                to: Option<chrono::DateTime<chrono::Utc>>,
            ) {
                self.effective_from = from;
                self.effective_to = to;
            }
        }
    };
    ($ty:ty, unnamed) => {
        impl $crate::types::element::ElementProperties for $ty {
            fn qualified_name(&self) -> Option<&str> {
                None
            }

            fn effective_from(&self) -> Option<chrono::DateTime<chrono::Utc>> {
                self.effective_from
            }

            fn effective_to(&self) -> Option<chrono::DateTime<chrono::Utc>> {
                self.effective_to
            }

            fn set_effectivity(
                &mut self,
                from: Option<chrono::DateTime<chrono::Utc>>,
                to: Option<chrono::DateTime<chrono::Utc>>,
            ) {
                self.effective_from = from;
                self.effective_to = to;
            }
        }
    };
}

pub(crate) use impl_element_properties;

/// Common behaviour of every property bag that is stored on an entity or
/// relationship.
///
/// Effectivity dates are not part of the serialized form: they travel on
/// the element header instead, so the stored property map only holds the
/// descriptive attributes.
pub trait ElementProperties: Serialize + DeserializeOwned + Default + Clone + Send + Sync {
    /// The unique name of the element, when the property bag has one.
    fn qualified_name(&self) -> Option<&str>;

    /// Start of the period during which the element is effective.
    fn effective_from(&self) -> Option<DateTime<Utc>>;

    /// End of the period during which the element is effective.
    fn effective_to(&self) -> Option<DateTime<Utc>>;

    /// Restore the effectivity dates after the bag is rebuilt from storage.
    fn set_effectivity(&mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>);
}

/// Lifecycle status of a stored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    #[default]
    Unknown,
    Draft,
    Proposed,
    Approved,
    Active,
    Deleted,
}

/// Which software capability owns an element.
///
/// Elements without an external source are home to the local server and
/// may be maintained by any caller with access.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementOrigin {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_source_guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_source_name: Option<String>,
}

impl ElementOrigin {
    /// Origin of an element owned by the local server.
    pub fn local() -> Self {
        Self::default()
    }

    /// Origin of an element owned by the named external source.
    pub fn external(source_guid: impl Into<String>, source_name: Option<String>) -> Self {
        Self {
            external_source_guid: Some(source_guid.into()),
            external_source_name: source_name,
        }
    }

    /// Whether the element is owned by the local server.
    pub fn is_home(&self) -> bool {
        self.external_source_guid.is_none()
    }
}

/// Header describing a stored entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementHeader {
    pub guid: String,
    pub type_name: String,
    pub status: InstanceStatus,
    pub origin: ElementOrigin,
    pub version: u64,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    pub create_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
    /// The element whose lifetime this element is tied to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_to: Option<DateTime<Utc>>,
}

impl ElementHeader {
    /// Whether the entity is effective at `time`. `None` matches any time.
    pub fn is_effective_at(&self, time: Option<DateTime<Utc>>) -> bool {
        is_within(self.effective_from, self.effective_to, time)
    }
}

/// Header describing a stored relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipHeader {
    pub guid: String,
    pub type_name: String,
    pub origin: ElementOrigin,
    pub version: u64,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    pub create_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_to: Option<DateTime<Utc>>,
}

impl RelationshipHeader {
    /// Whether the relationship is effective at `time`. `None` matches any time.
    pub fn is_effective_at(&self, time: Option<DateTime<Utc>>) -> bool {
        is_within(self.effective_from, self.effective_to, time)
    }
}

fn is_within(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    time: Option<DateTime<Utc>>,
) -> bool {
    let Some(time) = time else {
        return true;
    };
    from.map_or(true, |from| from <= time) && to.map_or(true, |to| time < to)
}

/// An entity returned to an asset manager, decorated with the correlation
/// headers that map it back to the asset manager's own identifiers.
///
/// `correlation_headers` is only populated when the request named an asset
/// manager; it may then be empty if the element has never been correlated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedElement<P> {
    pub header: ElementHeader,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_headers: Option<Vec<MetadataCorrelationHeader>>,
    pub properties: P,
}

impl<P> CorrelatedElement<P> {
    /// GUID of the underlying entity.
    pub fn guid(&self) -> &str {
        &self.header.guid
    }
}

/// A relationship between two elements together with its properties.
///
/// The meaning of each end depends on the relationship type; the family
/// aliases (for example `DataFlowElement`) document it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipElement<P> {
    pub header: RelationshipHeader,
    pub end1_guid: String,
    pub end2_guid: String,
    pub properties: P,
}

impl<P> RelationshipElement<P> {
    /// GUID of the underlying relationship.
    pub fn guid(&self) -> &str {
        &self.header.guid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn header(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> ElementHeader {
        ElementHeader {
            guid: "550e8400-e29b-41d4-a716-446655440000".to_string(),
            type_name: "Connection".to_string(),
            status: InstanceStatus::Active,
            origin: ElementOrigin::local(),
            version: 1,
            created_by: "erinoverview".to_string(),
            updated_by: None,
            create_time: Utc::now(),
            update_time: None,
            zones: vec![],
            anchor_guid: None,
            effective_from: from,
            effective_to: to,
        }
    }

    #[test]
    fn test_effective_without_time_matches_everything() {
        let now = Utc::now();
        let header = header(Some(now + Duration::days(1)), Some(now + Duration::days(2)));
        assert!(header.is_effective_at(None));
    }

    #[test]
    fn test_effectivity_window_is_half_open() {
        let now = Utc::now();
        let later = now + Duration::hours(1);
        let header = header(Some(now), Some(later));

        assert!(header.is_effective_at(Some(now)));
        assert!(!header.is_effective_at(Some(later)));
        assert!(!header.is_effective_at(Some(now - Duration::seconds(1))));
    }

    #[test]
    fn test_origin_home() {
        assert!(ElementOrigin::local().is_home());
        assert!(!ElementOrigin::external("am-guid", Some("catalog".to_string())).is_home());
    }

    #[test]
    fn test_instance_status_serialization() {
        let json = serde_json::to_string(&InstanceStatus::Proposed).unwrap();
        assert_eq!(json, "\"PROPOSED\"");
    }
}
