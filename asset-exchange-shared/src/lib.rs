//! # Asset Exchange Shared
//!
//! This crate defines the value types exchanged between an external asset
//! manager and the exchange handlers: element headers, correlation
//! properties that map open metadata GUIDs to the asset manager's own
//! identifiers, and the property bags for each element family.

pub mod types;

pub use types::correlation::{
    KeyPattern, MetadataCorrelationHeader, MetadataCorrelationProperties,
    SynchronizationDirection,
};
pub use types::element::{
    CorrelatedElement, ElementHeader, ElementOrigin, ElementProperties, InstanceStatus,
    RelationshipElement, RelationshipHeader,
};
pub use types::connection::{
    AssetConnectionProperties, ConnectionElement, ConnectionProperties, ConnectorTypeElement,
    ConnectorTypeProperties, EmbeddedConnectionProperties, EndpointElement, EndpointProperties,
    RelationshipProperties, TemplateProperties,
};
pub use types::external_reference::{
    ExternalReferenceElement, ExternalReferenceLinkElement, ExternalReferenceLinkProperties,
    ExternalReferenceProperties,
};
pub use types::process::{
    ControlFlowElement, ControlFlowProperties, DataFlowElement, DataFlowProperties,
    LineageMappingElement, LineageMappingProperties, PortElement, PortProperties, PortType,
    ProcessCallElement, ProcessCallProperties, ProcessContainmentProperties,
    ProcessContainmentType, ProcessElement, ProcessProperties, ProcessStatus,
};
