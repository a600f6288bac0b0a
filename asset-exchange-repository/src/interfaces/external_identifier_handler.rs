//! External identifier (correlation) handler trait definition.

use async_trait::async_trait;
use asset_exchange_shared::{MetadataCorrelationHeader, MetadataCorrelationProperties};

use crate::errors::Result;
use crate::types::Paging;

/// A relationship change reported for lineage and audit purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipEvent {
    pub asset_manager_guid: Option<String>,
    pub asset_manager_name: Option<String>,
    pub relationship_type: String,
    pub relationship_guid: Option<String>,
    pub end1_guid: String,
    pub end2_guid: String,
}

/// Maintains the mapping between an asset manager's native identifiers and
/// open metadata GUIDs.
///
/// Each mapping is scoped to an asset manager: the same native identifier
/// may appear in different asset managers for unrelated elements.
#[async_trait]
pub trait ExternalIdentifierHandler: Send + Sync {
    /// Record that `correlation.external_identifier` identifies the element
    /// within the asset manager named by the correlation.
    async fn create_external_identifier(
        &self,
        user_id: &str,
        element_guid: &str,
        element_type: &str,
        correlation: &MetadataCorrelationProperties,
    ) -> Result<()>;

    /// Confirm the correlation supplied with an update or remove refers to
    /// the element, and record that the asset manager is in step with it.
    ///
    /// Passes when the correlation carries no external identifier.
    async fn validate_external_identifier(
        &self,
        user_id: &str,
        element_guid: &str,
        element_type: &str,
        correlation: &MetadataCorrelationProperties,
    ) -> Result<()>;

    /// Forget every mapping for a removed element.
    async fn remove_external_identifiers(&self, user_id: &str, element_guid: &str) -> Result<()>;

    /// The mappings between the element and the given asset manager.
    async fn get_correlation_headers(
        &self,
        user_id: &str,
        element_guid: &str,
        element_type: &str,
        asset_manager_guid: &str,
        asset_manager_name: Option<&str>,
    ) -> Result<Vec<MetadataCorrelationHeader>>;

    /// GUIDs of the elements of a type correlated with an asset manager, in
    /// the order they were first correlated.
    async fn get_elements_for_scope(
        &self,
        user_id: &str,
        scope_guid: &str,
        element_type: &str,
        paging: Paging,
    ) -> Result<Vec<String>>;

    /// Report that a relationship was created.
    async fn log_relationship_creation(&self, user_id: &str, event: RelationshipEvent)
        -> Result<()>;

    /// Report that a relationship's properties changed.
    async fn log_relationship_update(&self, user_id: &str, event: RelationshipEvent) -> Result<()>;

    /// Report that a relationship was removed.
    async fn log_relationship_removal(&self, user_id: &str, event: RelationshipEvent)
        -> Result<()>;
}
