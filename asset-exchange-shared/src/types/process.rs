//! Property bags for processes, ports and the lineage relationships that
//! connect them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::element::{
    impl_element_properties, CorrelatedElement, InstanceStatus, RelationshipElement,
};

/// A process as returned to an asset manager.
pub type ProcessElement = CorrelatedElement<ProcessProperties>;

/// A port as returned to an asset manager.
pub type PortElement = CorrelatedElement<PortProperties>;

/// A DataFlow relationship: `end1_guid` supplies data to `end2_guid`.
pub type DataFlowElement = RelationshipElement<DataFlowProperties>;

/// A ControlFlow relationship: `end1_guid` is the current step, `end2_guid`
/// the next step.
pub type ControlFlowElement = RelationshipElement<ControlFlowProperties>;

/// A ProcessCall relationship: `end1_guid` calls `end2_guid`.
pub type ProcessCallElement = RelationshipElement<ProcessCallProperties>;

/// A LineageMapping relationship: `end1_guid` is the source, `end2_guid`
/// the destination.
pub type LineageMappingElement = RelationshipElement<LineageMappingProperties>;

/// Lifecycle status of a process.
///
/// Any status may follow any other; no transition order is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    #[default]
    Unknown,
    Draft,
    Proposed,
    Approved,
    Active,
}

impl From<ProcessStatus> for InstanceStatus {
    fn from(status: ProcessStatus) -> Self {
        match status {
            ProcessStatus::Unknown => InstanceStatus::Unknown,
            ProcessStatus::Draft => InstanceStatus::Draft,
            ProcessStatus::Proposed => InstanceStatus::Proposed,
            ProcessStatus::Approved => InstanceStatus::Approved,
            ProcessStatus::Active => InstanceStatus::Active,
        }
    }
}

impl From<InstanceStatus> for ProcessStatus {
    fn from(status: InstanceStatus) -> Self {
        match status {
            InstanceStatus::Draft => ProcessStatus::Draft,
            InstanceStatus::Proposed => ProcessStatus::Proposed,
            InstanceStatus::Approved => ProcessStatus::Approved,
            InstanceStatus::Active => ProcessStatus::Active,
            InstanceStatus::Unknown | InstanceStatus::Deleted => ProcessStatus::Unknown,
        }
    }
}

/// Properties of a Process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessProperties {
    pub qualified_name: Option<String>,
    pub technical_name: Option<String>,
    pub version_identifier: Option<String>,
    pub technical_description: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub formula: Option<String>,
    pub formula_type: Option<String>,
    pub implementation_language: Option<String>,
    pub additional_properties: BTreeMap<String, String>,
    #[serde(skip)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub effective_to: Option<DateTime<Utc>>,
}

impl_element_properties!(ProcessProperties);

/// How a child process relates to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessContainmentType {
    /// The child only exists as part of the parent.
    Owned,
    /// The child is shared and used by the parent.
    Used,
    #[default]
    Other,
}

/// Properties of the ProcessHierarchy relationship.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessContainmentProperties {
    pub containment_type: Option<ProcessContainmentType>,
    #[serde(skip)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub effective_to: Option<DateTime<Utc>>,
}

impl_element_properties!(ProcessContainmentProperties, unnamed);

/// Direction of data through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortType {
    InIn,
    OutIn,
    InOut,
    OutOut,
    #[default]
    Other,
}

/// Properties of a Port. A port belongs to exactly one process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortProperties {
    pub qualified_name: Option<String>,
    pub display_name: Option<String>,
    pub identifier: Option<String>,
    pub port_type: Option<PortType>,
    pub additional_properties: BTreeMap<String, String>,
    #[serde(skip)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub effective_to: Option<DateTime<Utc>>,
}

impl_element_properties!(PortProperties);

/// Properties of the DataFlow relationship.
///
/// `qualified_name` only needs to be set when more than one data flow links
/// the same pair of elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataFlowProperties {
    pub qualified_name: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub formula: Option<String>,
    pub formula_type: Option<String>,
    #[serde(skip)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub effective_to: Option<DateTime<Utc>>,
}

impl_element_properties!(DataFlowProperties);

/// Properties of the ControlFlow relationship.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlFlowProperties {
    pub qualified_name: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub guard: Option<String>,
    #[serde(skip)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub effective_to: Option<DateTime<Utc>>,
}

impl_element_properties!(ControlFlowProperties);

/// Properties of the ProcessCall relationship.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessCallProperties {
    pub qualified_name: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub formula: Option<String>,
    pub formula_type: Option<String>,
    #[serde(skip)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub effective_to: Option<DateTime<Utc>>,
}

impl_element_properties!(ProcessCallProperties);

/// Properties of the LineageMapping relationship.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageMappingProperties {
    pub qualified_name: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    #[serde(skip)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub effective_to: Option<DateTime<Utc>>,
}

impl_element_properties!(LineageMappingProperties);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_status_maps_to_instance_status() {
        assert_eq!(InstanceStatus::from(ProcessStatus::Draft), InstanceStatus::Draft);
        assert_eq!(InstanceStatus::from(ProcessStatus::Proposed), InstanceStatus::Proposed);
        assert_eq!(InstanceStatus::from(ProcessStatus::Approved), InstanceStatus::Approved);
        assert_eq!(InstanceStatus::from(ProcessStatus::Active), InstanceStatus::Active);
        assert_eq!(InstanceStatus::from(ProcessStatus::Unknown), InstanceStatus::Unknown);
    }

    #[test]
    fn test_deleted_instance_reports_unknown_process_status() {
        assert_eq!(ProcessStatus::from(InstanceStatus::Deleted), ProcessStatus::Unknown);
        assert_eq!(ProcessStatus::from(InstanceStatus::Active), ProcessStatus::Active);
    }

    #[test]
    fn test_port_defaults() {
        let port: PortProperties = serde_json::from_str(r#"{"qualified_name":"p1"}"#).unwrap();
        assert_eq!(port.port_type, None);

        let port: PortProperties =
            serde_json::from_str(r#"{"qualified_name":"p1","port_type":"OUT_IN"}"#).unwrap();
        assert_eq!(port.port_type, Some(PortType::OutIn));

        let containment = ProcessContainmentProperties::default();
        assert_eq!(containment.containment_type, None);
        assert_eq!(ProcessContainmentType::default(), ProcessContainmentType::Other);
    }
}
