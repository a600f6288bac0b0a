//! Property bags for external references and the links that attach them to
//! other elements.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::element::{impl_element_properties, CorrelatedElement, RelationshipElement};

/// An external reference as returned to an asset manager.
pub type ExternalReferenceElement = CorrelatedElement<ExternalReferenceProperties>;

/// An ExternalReferenceLink relationship. `end1_guid` is the element the
/// reference is attached to, `end2_guid` the external reference.
pub type ExternalReferenceLinkElement = RelationshipElement<ExternalReferenceLinkProperties>;

/// Properties of an ExternalReference: a pointer to a resource held outside
/// open metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalReferenceProperties {
    pub qualified_name: Option<String>,
    pub reference_id: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub reference_version: Option<String>,
    pub organization: Option<String>,
    pub additional_properties: BTreeMap<String, String>,
    #[serde(skip)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub effective_to: Option<DateTime<Utc>>,
}

impl_element_properties!(ExternalReferenceProperties);

/// Properties of the ExternalReferenceLink relationship.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalReferenceLinkProperties {
    pub link_id: Option<String>,
    pub link_description: Option<String>,
    pub pages: Option<String>,
    #[serde(skip)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub effective_to: Option<DateTime<Utc>>,
}

impl_element_properties!(ExternalReferenceLinkProperties, unnamed);
