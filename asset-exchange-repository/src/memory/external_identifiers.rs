//! In-memory external identifier handler.

use std::collections::BTreeMap;

use async_trait::async_trait;
use asset_exchange_shared::{
    KeyPattern, MetadataCorrelationHeader, MetadataCorrelationProperties, SynchronizationDirection,
};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::{ExchangeError, Result};
use crate::interfaces::{ExternalIdentifierHandler, RelationshipEvent};
use crate::types::{type_names, Paging};

/// Kind of relationship change recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipChange {
    Created,
    Updated,
    Removed,
}

#[derive(Debug, Clone)]
struct ExternalIdRecord {
    sequence: u64,
    identifier: String,
    scope_guid: String,
    scope_name: Option<String>,
    element_guid: String,
    element_type: String,
    identifier_name: Option<String>,
    usage: Option<String>,
    source: Option<String>,
    key_pattern: KeyPattern,
    mapping_properties: BTreeMap<String, String>,
    synchronization_direction: SynchronizationDirection,
    synchronization_description: Option<String>,
    last_synchronized: DateTime<Utc>,
}

impl ExternalIdRecord {
    fn refresh(&mut self, correlation: &MetadataCorrelationProperties) {
        if correlation.asset_manager_name.is_some() {
            self.scope_name = correlation.asset_manager_name.clone();
        }
        if correlation.external_identifier_name.is_some() {
            self.identifier_name = correlation.external_identifier_name.clone();
        }
        if correlation.external_identifier_usage.is_some() {
            self.usage = correlation.external_identifier_usage.clone();
        }
        if correlation.external_identifier_source.is_some() {
            self.source = correlation.external_identifier_source.clone();
        }
        if !correlation.mapping_properties.is_empty() {
            self.mapping_properties = correlation.mapping_properties.clone();
        }
        if correlation.synchronization_description.is_some() {
            self.synchronization_description = correlation.synchronization_description.clone();
        }
        self.synchronization_direction = correlation.synchronization_direction;
        self.last_synchronized = Utc::now();
    }

    fn header(&self, asset_manager_name: Option<&str>) -> MetadataCorrelationHeader {
        MetadataCorrelationHeader {
            asset_manager_guid: self.scope_guid.clone(),
            asset_manager_name: self
                .scope_name
                .clone()
                .or_else(|| asset_manager_name.map(str::to_string)),
            external_identifier: self.identifier.clone(),
            external_identifier_name: self.identifier_name.clone(),
            external_identifier_usage: self.usage.clone(),
            external_identifier_source: self.source.clone(),
            key_pattern: self.key_pattern,
            mapping_properties: self.mapping_properties.clone(),
            synchronization_direction: self.synchronization_direction,
            synchronization_description: self.synchronization_description.clone(),
            last_synchronized: self.last_synchronized,
        }
    }
}

#[derive(Default)]
struct IdentifierState {
    next_sequence: u64,
    records: Vec<ExternalIdRecord>,
    audit_log: Vec<(RelationshipChange, RelationshipEvent)>,
}

/// Correlation store held in process memory.
///
/// Relationship events reported by the handlers are kept in an audit log
/// that tests can inspect with [`audit_events`](Self::audit_events).
#[derive(Default)]
pub struct InMemoryExternalIdentifierHandler {
    state: RwLock<IdentifierState>,
}

impl InMemoryExternalIdentifierHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relationship events in the order they were reported.
    pub async fn audit_events(&self) -> Vec<(RelationshipChange, RelationshipEvent)> {
        self.state.read().await.audit_log.clone()
    }

    async fn record_event(
        &self,
        user_id: &str,
        change: RelationshipChange,
        event: RelationshipEvent,
    ) -> Result<()> {
        info!(
            user_id = %user_id,
            change = ?change,
            relationship_type = %event.relationship_type,
            end1_guid = %event.end1_guid,
            end2_guid = %event.end2_guid,
            asset_manager_guid = ?event.asset_manager_guid,
            "Relationship change"
        );
        self.state.write().await.audit_log.push((change, event));
        Ok(())
    }
}

fn scope_of(correlation: &MetadataCorrelationProperties) -> Result<&str> {
    correlation
        .asset_manager_guid
        .as_deref()
        .ok_or_else(|| {
            ExchangeError::invalid_parameter(
                "assetManagerGUID",
                "an external identifier must be scoped to an asset manager",
            )
        })
}

#[async_trait]
impl ExternalIdentifierHandler for InMemoryExternalIdentifierHandler {
    async fn create_external_identifier(
        &self,
        _user_id: &str,
        element_guid: &str,
        element_type: &str,
        correlation: &MetadataCorrelationProperties,
    ) -> Result<()> {
        let Some(identifier) = correlation.external_identifier.as_deref() else {
            return Ok(());
        };
        let scope_guid = scope_of(correlation)?;

        let mut state = self.state.write().await;

        if let Some(existing) = state
            .records
            .iter_mut()
            .find(|r| r.scope_guid == scope_guid && r.identifier == identifier && r.element_guid == element_guid)
        {
            existing.refresh(correlation);
            debug!(identifier = %identifier, element_guid = %element_guid, "Refreshed external identifier");
            return Ok(());
        }

        let clash = state.records.iter().any(|r| {
            r.scope_guid == scope_guid
                && r.identifier == identifier
                && r.key_pattern == KeyPattern::LocalKey
        });
        if clash && correlation.key_pattern == KeyPattern::LocalKey {
            return Err(ExchangeError::invalid_parameter(
                "externalIdentifier",
                format!(
                    "{} already identifies another element in asset manager {}",
                    identifier, scope_guid
                ),
            ));
        }

        state.next_sequence += 1;
        let record = ExternalIdRecord {
            sequence: state.next_sequence,
            identifier: identifier.to_string(),
            scope_guid: scope_guid.to_string(),
            scope_name: correlation.asset_manager_name.clone(),
            element_guid: element_guid.to_string(),
            element_type: element_type.to_string(),
            identifier_name: correlation.external_identifier_name.clone(),
            usage: correlation.external_identifier_usage.clone(),
            source: correlation.external_identifier_source.clone(),
            key_pattern: correlation.key_pattern,
            mapping_properties: correlation.mapping_properties.clone(),
            synchronization_direction: correlation.synchronization_direction,
            synchronization_description: correlation.synchronization_description.clone(),
            last_synchronized: Utc::now(),
        };
        state.records.push(record);

        info!(
            identifier = %identifier,
            scope_guid = %scope_guid,
            element_guid = %element_guid,
            element_type = %element_type,
            "Created external identifier"
        );
        Ok(())
    }

    async fn validate_external_identifier(
        &self,
        _user_id: &str,
        element_guid: &str,
        element_type: &str,
        correlation: &MetadataCorrelationProperties,
    ) -> Result<()> {
        let Some(identifier) = correlation.external_identifier.as_deref() else {
            return Ok(());
        };
        let scope_guid = scope_of(correlation)?;

        let mut state = self.state.write().await;
        let record = state
            .records
            .iter_mut()
            .find(|r| r.scope_guid == scope_guid && r.identifier == identifier && r.element_guid == element_guid)
            .ok_or_else(|| {
                ExchangeError::invalid_parameter(
                    "externalIdentifier",
                    format!(
                        "{} does not identify {} {} in asset manager {}",
                        identifier, element_type, element_guid, scope_guid
                    ),
                )
            })?;
        record.refresh(correlation);

        debug!(identifier = %identifier, element_guid = %element_guid, "Validated external identifier");
        Ok(())
    }

    async fn remove_external_identifiers(&self, _user_id: &str, element_guid: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.records.len();
        state.records.retain(|r| r.element_guid != element_guid);

        debug!(
            element_guid = %element_guid,
            removed = before - state.records.len(),
            "Removed external identifiers"
        );
        Ok(())
    }

    async fn get_correlation_headers(
        &self,
        _user_id: &str,
        element_guid: &str,
        _element_type: &str,
        asset_manager_guid: &str,
        asset_manager_name: Option<&str>,
    ) -> Result<Vec<MetadataCorrelationHeader>> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .filter(|r| r.element_guid == element_guid && r.scope_guid == asset_manager_guid)
            .map(|r| r.header(asset_manager_name))
            .collect())
    }

    async fn get_elements_for_scope(
        &self,
        _user_id: &str,
        scope_guid: &str,
        element_type: &str,
        paging: Paging,
    ) -> Result<Vec<String>> {
        let state = self.state.read().await;
        let mut records: Vec<&ExternalIdRecord> = state
            .records
            .iter()
            .filter(|r| {
                r.scope_guid == scope_guid
                    && (element_type == type_names::REFERENCEABLE || r.element_type == element_type)
            })
            .collect();
        records.sort_by_key(|r| r.sequence);

        let mut guids: Vec<String> = Vec::new();
        for record in records {
            if !guids.contains(&record.element_guid) {
                guids.push(record.element_guid.clone());
            }
        }
        Ok(paging.apply(guids))
    }

    async fn log_relationship_creation(
        &self,
        user_id: &str,
        event: RelationshipEvent,
    ) -> Result<()> {
        self.record_event(user_id, RelationshipChange::Created, event).await
    }

    async fn log_relationship_update(&self, user_id: &str, event: RelationshipEvent) -> Result<()> {
        self.record_event(user_id, RelationshipChange::Updated, event).await
    }

    async fn log_relationship_removal(
        &self,
        user_id: &str,
        event: RelationshipEvent,
    ) -> Result<()> {
        self.record_event(user_id, RelationshipChange::Removed, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn correlation(identifier: &str) -> MetadataCorrelationProperties {
        MetadataCorrelationProperties::for_asset_manager("am-guid", "catalog")
            .with_external_identifier(identifier)
    }

    #[tokio::test]
    async fn test_create_and_read_headers() {
        let handler = InMemoryExternalIdentifierHandler::new();
        handler
            .create_external_identifier("erinoverview", "guid-1", "Connection", &correlation("c-1"))
            .await
            .unwrap();

        let headers = handler
            .get_correlation_headers("erinoverview", "guid-1", "Connection", "am-guid", None)
            .await
            .unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].external_identifier, "c-1");
        assert_eq!(headers[0].asset_manager_name.as_deref(), Some("catalog"));

        let other_scope = handler
            .get_correlation_headers("erinoverview", "guid-1", "Connection", "other", None)
            .await
            .unwrap();
        assert!(other_scope.is_empty());
    }

    #[tokio::test]
    async fn test_local_key_cannot_be_reused() {
        let handler = InMemoryExternalIdentifierHandler::new();
        handler
            .create_external_identifier("erinoverview", "guid-1", "Connection", &correlation("c-1"))
            .await
            .unwrap();

        handler
            .create_external_identifier("erinoverview", "guid-1", "Connection", &correlation("c-1"))
            .await
            .unwrap();

        let err = handler
            .create_external_identifier("erinoverview", "guid-2", "Connection", &correlation("c-1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[tokio::test]
    async fn test_validate_external_identifier() {
        let handler = InMemoryExternalIdentifierHandler::new();
        handler
            .create_external_identifier("erinoverview", "guid-1", "Process", &correlation("p-1"))
            .await
            .unwrap();

        handler
            .validate_external_identifier("erinoverview", "guid-1", "Process", &correlation("p-1"))
            .await
            .unwrap();

        let no_identifier = MetadataCorrelationProperties::for_asset_manager("am-guid", "catalog");
        handler
            .validate_external_identifier("erinoverview", "guid-9", "Process", &no_identifier)
            .await
            .unwrap();

        let err = handler
            .validate_external_identifier("erinoverview", "guid-2", "Process", &correlation("p-1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        let err = handler
            .validate_external_identifier("erinoverview", "guid-1", "Process", &correlation("p-9"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[tokio::test]
    async fn test_elements_for_scope_in_creation_order() {
        let handler = InMemoryExternalIdentifierHandler::new();
        for (guid, id) in [("guid-b", "b"), ("guid-a", "a"), ("guid-c", "c")] {
            handler
                .create_external_identifier("erinoverview", guid, "Endpoint", &correlation(id))
                .await
                .unwrap();
        }
        handler
            .create_external_identifier("erinoverview", "guid-p", "Process", &correlation("p"))
            .await
            .unwrap();

        let guids = handler
            .get_elements_for_scope("erinoverview", "am-guid", "Endpoint", Paging::all())
            .await
            .unwrap();
        assert_eq!(guids, vec!["guid-b", "guid-a", "guid-c"]);

        let page = handler
            .get_elements_for_scope("erinoverview", "am-guid", "Endpoint", Paging::new(1, 1))
            .await
            .unwrap();
        assert_eq!(page, vec!["guid-a"]);

        handler
            .remove_external_identifiers("erinoverview", "guid-a")
            .await
            .unwrap();
        let guids = handler
            .get_elements_for_scope("erinoverview", "am-guid", "Endpoint", Paging::all())
            .await
            .unwrap();
        assert_eq!(guids, vec!["guid-b", "guid-c"]);
    }

    #[tokio::test]
    async fn test_audit_log() {
        let handler = InMemoryExternalIdentifierHandler::new();
        let event = RelationshipEvent {
            asset_manager_guid: Some("am-guid".to_string()),
            asset_manager_name: None,
            relationship_type: type_names::EXTERNAL_REFERENCE_LINK.to_string(),
            relationship_guid: None,
            end1_guid: "guid-1".to_string(),
            end2_guid: "guid-2".to_string(),
        };
        handler
            .log_relationship_creation("erinoverview", event.clone())
            .await
            .unwrap();
        handler
            .log_relationship_removal("erinoverview", event.clone())
            .await
            .unwrap();

        let events = handler.audit_events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], (RelationshipChange::Created, event.clone()));
        assert_eq!(events[1].0, RelationshipChange::Removed);
    }
}
