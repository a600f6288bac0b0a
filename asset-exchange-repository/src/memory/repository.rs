//! In-memory metadata repository.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use asset_exchange_shared::{ElementHeader, ElementOrigin, InstanceStatus, RelationshipHeader};
use chrono::Utc;
use regex::Regex;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{ExchangeError, Result};
use crate::interfaces::{AllowAllSecurityVerifier, MetadataRepository, SecurityVerifier};
use crate::types::{
    type_names, EntityDetail, EntitySearch, NewEntity, NewRelationship, Ownership, Paging,
    PropertiesUpdate, RelationshipDetail, RelationshipEnd, RequestOptions,
};

struct StoredEntity {
    sequence: u64,
    detail: EntityDetail,
}

struct StoredRelationship {
    sequence: u64,
    detail: RelationshipDetail,
}

#[derive(Default)]
struct RepositoryState {
    next_sequence: u64,
    entities: HashMap<String, StoredEntity>,
    relationships: HashMap<String, StoredRelationship>,
}

impl RepositoryState {
    fn next_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    /// Look up an entity the request is allowed to see.
    fn visible_entity(
        &self,
        guid: &str,
        type_name: &str,
        parameter_name: &str,
        supported_zones: &[String],
        options: &RequestOptions,
    ) -> Result<&StoredEntity> {
        self.entities
            .get(guid)
            .filter(|stored| {
                type_matches(&stored.detail.header.type_name, type_name)
                    && is_visible(&stored.detail, supported_zones, options)
            })
            .ok_or_else(|| ExchangeError::unknown_guid(parameter_name, guid, type_name))
    }

    fn visible_relationship(
        &self,
        guid: &str,
        type_name: &str,
        options: &RequestOptions,
    ) -> Result<&StoredRelationship> {
        self.relationships
            .get(guid)
            .filter(|stored| {
                stored.detail.header.type_name == type_name
                    && stored.detail.header.is_effective_at(options.effective_time)
            })
            .ok_or_else(|| ExchangeError::unknown_guid("relationshipGUID", guid, type_name))
    }

    fn is_memento(&self, guid: &str) -> bool {
        self.entities
            .get(guid)
            .is_some_and(|stored| stored.detail.memento)
    }

    /// The entity and everything anchored to it, directly or indirectly.
    fn anchored_closure(&self, guid: &str) -> Vec<String> {
        let mut closure = vec![guid.to_string()];
        let mut seen: HashSet<String> = closure.iter().cloned().collect();
        let mut index = 0;
        while index < closure.len() {
            let anchor = closure[index].clone();
            for (dependent, stored) in &self.entities {
                if stored.detail.header.anchor_guid.as_deref() == Some(anchor.as_str())
                    && seen.insert(dependent.clone())
                {
                    closure.push(dependent.clone());
                }
            }
            index += 1;
        }
        closure
    }
}

fn type_matches(actual: &str, requested: &str) -> bool {
    requested == type_names::REFERENCEABLE || actual == requested
}

/// Entities without zones are visible to everyone; otherwise they must
/// share a zone with the caller's supported zones.
fn zones_permit(zones: &[String], supported_zones: &[String]) -> bool {
    supported_zones.is_empty()
        || zones.is_empty()
        || zones.iter().any(|zone| supported_zones.contains(zone))
}

fn is_visible(detail: &EntityDetail, supported_zones: &[String], options: &RequestOptions) -> bool {
    (!detail.memento || options.for_lineage)
        && detail.header.is_effective_at(options.effective_time)
        && zones_permit(&detail.header.zones, supported_zones)
}

fn any_string(value: &Value, predicate: &dyn Fn(&str) -> bool) -> bool {
    match value {
        Value::String(s) => predicate(s),
        Value::Array(items) => items.iter().any(|item| any_string(item, predicate)),
        Value::Object(map) => map.values().any(|item| any_string(item, predicate)),
        _ => false,
    }
}

fn apply_update(
    properties: &mut Map<String, Value>,
    effective_from: &mut Option<chrono::DateTime<Utc>>,
    effective_to: &mut Option<chrono::DateTime<Utc>>,
    update: PropertiesUpdate,
) {
    if update.is_merge_update {
        properties.extend(update.properties);
        if update.effective_from.is_some() {
            *effective_from = update.effective_from;
        }
        if update.effective_to.is_some() {
            *effective_to = update.effective_to;
        }
    } else {
        *properties = update.properties;
        *effective_from = update.effective_from;
        *effective_to = update.effective_to;
    }
}

fn owner_denied(user_id: &str, guid: &str, owner: Option<&str>) -> ExchangeError {
    ExchangeError::not_authorized(
        user_id,
        format!(
            "{} is owned by external source {} and may only be changed by it",
            guid,
            owner.unwrap_or("unknown")
        ),
    )
}

/// Metadata repository held in process memory.
///
/// Results are returned in creation order. Duplicate processing is not
/// modelled: `for_duplicate_processing` has no effect.
pub struct InMemoryMetadataRepository {
    state: RwLock<RepositoryState>,
    security_verifier: Arc<dyn SecurityVerifier>,
}

impl InMemoryMetadataRepository {
    /// Create an empty repository that allows every request.
    pub fn new() -> Self {
        Self::with_security_verifier(Arc::new(AllowAllSecurityVerifier))
    }

    /// Create an empty repository guarded by the given verifier.
    pub fn with_security_verifier(security_verifier: Arc<dyn SecurityVerifier>) -> Self {
        Self {
            state: RwLock::new(RepositoryState::default()),
            security_verifier,
        }
    }

    /// Number of live entities, excluding mementos.
    pub async fn entity_count(&self) -> usize {
        self.state
            .read()
            .await
            .entities
            .values()
            .filter(|stored| !stored.detail.memento)
            .count()
    }

    /// Number of stored relationships.
    pub async fn relationship_count(&self) -> usize {
        self.state.read().await.relationships.len()
    }

    fn insert_entity(
        &self,
        state: &mut RepositoryState,
        user_id: &str,
        request: NewEntity,
    ) -> Result<String> {
        self.security_verifier
            .validate_user_for_entity_create(user_id, &request.type_name)?;

        if let Some(anchor_guid) = &request.anchor_guid {
            state.visible_entity(
                anchor_guid,
                type_names::REFERENCEABLE,
                "anchorGUID",
                &[],
                &RequestOptions::default(),
            )?;
        }

        let guid = Uuid::new_v4().to_string();
        let header = ElementHeader {
            guid: guid.clone(),
            type_name: request.type_name,
            status: request.status,
            origin: request.ownership.origin(),
            version: 1,
            created_by: user_id.to_string(),
            updated_by: None,
            create_time: Utc::now(),
            update_time: None,
            zones: request.zones,
            anchor_guid: request.anchor_guid,
            effective_from: request.effective_from,
            effective_to: request.effective_to,
        };

        info!(guid = %guid, type_name = %header.type_name, user_id = %user_id, "Created entity");

        let sequence = state.next_sequence();
        state.entities.insert(
            guid.clone(),
            StoredEntity {
                sequence,
                detail: EntityDetail {
                    header,
                    properties: request.properties,
                    memento: false,
                },
            },
        );
        Ok(guid)
    }

    /// Locate an entity for a change and run the ownership and security
    /// checks against it.
    fn entity_for_update<'a>(
        &self,
        state: &'a mut RepositoryState,
        user_id: &str,
        guid: &str,
        type_name: &str,
        ownership: &Ownership,
        options: &RequestOptions,
    ) -> Result<&'a mut EntityDetail> {
        let stored = state.visible_entity(guid, type_name, "guid", &[], options)?;
        let origin = &stored.detail.header.origin;
        if !ownership.permits(origin) {
            return Err(owner_denied(
                user_id,
                guid,
                origin.external_source_guid.as_deref(),
            ));
        }
        self.security_verifier
            .validate_user_for_entity_update(user_id, &stored.detail)?;

        state
            .entities
            .get_mut(guid)
            .map(|stored| &mut stored.detail)
            .ok_or_else(|| ExchangeError::unknown_guid("guid", guid, type_name))
    }

    fn relationship_for_update<'a>(
        state: &'a mut RepositoryState,
        user_id: &str,
        guid: &str,
        type_name: &str,
        ownership: &Ownership,
        options: &RequestOptions,
    ) -> Result<&'a mut RelationshipDetail> {
        let stored = state.visible_relationship(guid, type_name, options)?;
        let origin = &stored.detail.header.origin;
        if !ownership.permits(origin) {
            return Err(owner_denied(
                user_id,
                guid,
                origin.external_source_guid.as_deref(),
            ));
        }

        state
            .relationships
            .get_mut(guid)
            .map(|stored| &mut stored.detail)
            .ok_or_else(|| ExchangeError::unknown_guid("relationshipGUID", guid, type_name))
    }
}

impl Default for InMemoryMetadataRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataRepository for InMemoryMetadataRepository {
    async fn create_entity(&self, user_id: &str, request: NewEntity) -> Result<String> {
        let mut state = self.state.write().await;
        self.insert_entity(&mut state, user_id, request)
    }

    async fn create_entity_from_template(
        &self,
        user_id: &str,
        template_guid: &str,
        mut request: NewEntity,
    ) -> Result<String> {
        let mut state = self.state.write().await;
        let template = state.visible_entity(
            template_guid,
            &request.type_name,
            "templateGUID",
            &[],
            &RequestOptions::default(),
        )?;

        let mut properties = template.detail.properties.clone();
        properties.extend(request.properties);
        request.properties = properties;

        debug!(template_guid = %template_guid, type_name = %request.type_name, "Copying template");
        self.insert_entity(&mut state, user_id, request)
    }

    async fn update_entity(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        update: PropertiesUpdate,
        options: &RequestOptions,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let detail =
            self.entity_for_update(&mut state, user_id, guid, type_name, &update.ownership, options)?;

        let header = &mut detail.header;
        apply_update(
            &mut detail.properties,
            &mut header.effective_from,
            &mut header.effective_to,
            update,
        );
        header.version += 1;
        header.updated_by = Some(user_id.to_string());
        header.update_time = Some(Utc::now());

        debug!(guid = %guid, version = header.version, "Updated entity");
        Ok(())
    }

    async fn update_entity_status(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        ownership: &Ownership,
        status: InstanceStatus,
        options: &RequestOptions,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let detail = self.entity_for_update(&mut state, user_id, guid, type_name, ownership, options)?;

        let header = &mut detail.header;
        header.status = status;
        header.version += 1;
        header.updated_by = Some(user_id.to_string());
        header.update_time = Some(Utc::now());

        debug!(guid = %guid, status = ?status, "Updated entity status");
        Ok(())
    }

    async fn update_entity_zones(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        ownership: &Ownership,
        zones: Vec<String>,
        options: &RequestOptions,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let detail = self.entity_for_update(&mut state, user_id, guid, type_name, ownership, options)?;

        let header = &mut detail.header;
        debug!(guid = %guid, zones = ?zones, "Updated entity zones");
        header.zones = zones;
        header.version += 1;
        header.updated_by = Some(user_id.to_string());
        header.update_time = Some(Utc::now());
        Ok(())
    }

    async fn remove_entity(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        ownership: &Ownership,
        options: &RequestOptions,
    ) -> Result<Vec<String>> {
        let mut state = self.state.write().await;
        self.entity_for_update(&mut state, user_id, guid, type_name, ownership, options)?;

        let closure = state.anchored_closure(guid);
        for removed in &closure {
            let removed = removed.as_str();
            let has_lineage = state.relationships.values().any(|stored| {
                let detail = &stored.detail;
                type_names::LINEAGE_RELATIONSHIPS.contains(&detail.header.type_name.as_str())
                    && (detail.end1_guid == removed || detail.end2_guid == removed)
            });

            state.relationships.retain(|_, stored| {
                let detail = &stored.detail;
                let touches = detail.end1_guid == removed || detail.end2_guid == removed;
                !touches
                    || (has_lineage
                        && type_names::LINEAGE_RELATIONSHIPS
                            .contains(&detail.header.type_name.as_str()))
            });

            if has_lineage {
                if let Some(stored) = state.entities.get_mut(removed) {
                    stored.detail.memento = true;
                    stored.detail.header.status = InstanceStatus::Deleted;
                    stored.detail.header.updated_by = Some(user_id.to_string());
                    stored.detail.header.update_time = Some(Utc::now());
                }
                info!(guid = %removed, "Retained removed entity as lineage memento");
            } else {
                state.entities.remove(removed);
                info!(guid = %removed, "Removed entity");
            }
        }
        Ok(closure)
    }

    async fn get_entity(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        supported_zones: &[String],
        options: &RequestOptions,
    ) -> Result<EntityDetail> {
        let state = self.state.read().await;
        let stored = state.visible_entity(guid, type_name, "guid", supported_zones, options)?;
        self.security_verifier
            .validate_user_for_entity_read(user_id, &stored.detail)?;
        Ok(stored.detail.clone())
    }

    async fn find_entities(
        &self,
        user_id: &str,
        type_name: &str,
        search: &EntitySearch,
        supported_zones: &[String],
        paging: Paging,
        options: &RequestOptions,
    ) -> Result<Vec<EntityDetail>> {
        let regex = match search {
            EntitySearch::Regex(pattern) => Some(Regex::new(pattern).map_err(|e| {
                ExchangeError::invalid_parameter("searchString", e.to_string())
            })?),
            _ => None,
        };

        let state = self.state.read().await;
        let mut matches: Vec<&StoredEntity> = state
            .entities
            .values()
            .filter(|stored| {
                let detail = &stored.detail;
                type_matches(&detail.header.type_name, type_name)
                    && is_visible(detail, supported_zones, options)
            })
            .filter(|stored| {
                let detail = &stored.detail;
                match search {
                    EntitySearch::Regex(_) => regex.as_ref().is_some_and(|regex| {
                        detail
                            .properties
                            .values()
                            .any(|value| any_string(value, &|s: &str| regex.is_match(s)))
                    }),
                    EntitySearch::ExactValue {
                        value,
                        property_names,
                    } => property_names
                        .iter()
                        .any(|name| detail.string_property(name) == Some(value.as_str())),
                    EntitySearch::Anchored(anchor_guid) => {
                        detail.header.anchor_guid.as_deref() == Some(anchor_guid.as_str())
                    }
                }
            })
            .filter(|stored| {
                self.security_verifier
                    .validate_user_for_entity_read(user_id, &stored.detail)
                    .is_ok()
            })
            .collect();
        matches.sort_by_key(|stored| stored.sequence);

        debug!(type_name = %type_name, count = matches.len(), "Found entities");
        Ok(paging.apply(matches.into_iter().map(|stored| stored.detail.clone())))
    }

    async fn create_relationship(
        &self,
        user_id: &str,
        request: NewRelationship,
        options: &RequestOptions,
    ) -> Result<String> {
        let mut state = self.state.write().await;
        state.visible_entity(
            &request.end1_guid,
            type_names::REFERENCEABLE,
            "end1GUID",
            &[],
            options,
        )?;
        state.visible_entity(
            &request.end2_guid,
            type_names::REFERENCEABLE,
            "end2GUID",
            &[],
            options,
        )?;

        let guid = Uuid::new_v4().to_string();
        let header = RelationshipHeader {
            guid: guid.clone(),
            type_name: request.type_name,
            origin: request.ownership.origin(),
            version: 1,
            created_by: user_id.to_string(),
            updated_by: None,
            create_time: Utc::now(),
            update_time: None,
            effective_from: request.effective_from,
            effective_to: request.effective_to,
        };

        info!(
            guid = %guid,
            type_name = %header.type_name,
            end1_guid = %request.end1_guid,
            end2_guid = %request.end2_guid,
            "Created relationship"
        );

        let sequence = state.next_sequence();
        state.relationships.insert(
            guid.clone(),
            StoredRelationship {
                sequence,
                detail: RelationshipDetail {
                    header,
                    end1_guid: request.end1_guid,
                    end2_guid: request.end2_guid,
                    properties: request.properties,
                },
            },
        );
        Ok(guid)
    }

    async fn update_relationship(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        update: PropertiesUpdate,
        options: &RequestOptions,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let detail = Self::relationship_for_update(
            &mut state,
            user_id,
            guid,
            type_name,
            &update.ownership,
            options,
        )?;

        let header = &mut detail.header;
        apply_update(
            &mut detail.properties,
            &mut header.effective_from,
            &mut header.effective_to,
            update,
        );
        header.version += 1;
        header.updated_by = Some(user_id.to_string());
        header.update_time = Some(Utc::now());

        debug!(guid = %guid, version = header.version, "Updated relationship");
        Ok(())
    }

    async fn remove_relationship(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        ownership: &Ownership,
        options: &RequestOptions,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        Self::relationship_for_update(&mut state, user_id, guid, type_name, ownership, options)?;
        state.relationships.remove(guid);

        info!(guid = %guid, type_name = %type_name, "Removed relationship");
        Ok(())
    }

    async fn remove_relationships_between(
        &self,
        user_id: &str,
        type_name: &str,
        end1_guid: &str,
        end2_guid: &str,
        ownership: &Ownership,
        options: &RequestOptions,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let targets: Vec<(String, ElementOrigin)> = state
            .relationships
            .values()
            .map(|stored| &stored.detail)
            .filter(|detail| {
                detail.header.type_name == type_name
                    && detail.end1_guid == end1_guid
                    && detail.end2_guid == end2_guid
                    && detail.header.is_effective_at(options.effective_time)
            })
            .map(|detail| (detail.header.guid.clone(), detail.header.origin.clone()))
            .collect();

        for (guid, origin) in &targets {
            if !ownership.permits(origin) {
                return Err(owner_denied(
                    user_id,
                    guid,
                    origin.external_source_guid.as_deref(),
                ));
            }
        }

        for (guid, _) in &targets {
            state.relationships.remove(guid);
        }

        info!(
            type_name = %type_name,
            end1_guid = %end1_guid,
            end2_guid = %end2_guid,
            removed = targets.len(),
            "Removed relationships"
        );
        Ok(())
    }

    async fn get_relationship(
        &self,
        _user_id: &str,
        guid: &str,
        type_name: &str,
        options: &RequestOptions,
    ) -> Result<RelationshipDetail> {
        let state = self.state.read().await;
        let stored = state.visible_relationship(guid, type_name, options)?;
        Ok(stored.detail.clone())
    }

    async fn get_relationships(
        &self,
        _user_id: &str,
        guid: &str,
        type_name: &str,
        end: RelationshipEnd,
        paging: Paging,
        options: &RequestOptions,
    ) -> Result<Vec<RelationshipDetail>> {
        let state = self.state.read().await;
        state.visible_entity(guid, type_names::REFERENCEABLE, "guid", &[], options)?;

        let mut matches: Vec<&StoredRelationship> = state
            .relationships
            .values()
            .filter(|stored| {
                let detail = &stored.detail;
                let at_end = match end {
                    RelationshipEnd::End1 => detail.end1_guid == guid,
                    RelationshipEnd::End2 => detail.end2_guid == guid,
                    RelationshipEnd::Either => detail.end1_guid == guid || detail.end2_guid == guid,
                };
                at_end
                    && detail.header.type_name == type_name
                    && detail.header.is_effective_at(options.effective_time)
                    && (options.for_lineage || !state.is_memento(detail.other_end(guid)))
            })
            .collect();
        matches.sort_by_key(|stored| stored.sequence);

        Ok(paging.apply(matches.into_iter().map(|stored| stored.detail.clone())))
    }

    async fn get_relationships_between(
        &self,
        _user_id: &str,
        type_name: &str,
        end1_guid: &str,
        end2_guid: &str,
        options: &RequestOptions,
    ) -> Result<Vec<RelationshipDetail>> {
        let state = self.state.read().await;
        let mut matches: Vec<&StoredRelationship> = state
            .relationships
            .values()
            .filter(|stored| {
                let detail = &stored.detail;
                detail.header.type_name == type_name
                    && detail.end1_guid == end1_guid
                    && detail.end2_guid == end2_guid
                    && detail.header.is_effective_at(options.effective_time)
            })
            .collect();
        matches.sort_by_key(|stored| stored.sequence);

        Ok(matches.into_iter().map(|stored| stored.detail.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use chrono::Duration;
    use serde_json::json;

    fn properties(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn external() -> Ownership {
        Ownership::ExternallyOwned {
            source_guid: "am-guid".to_string(),
            source_name: Some("catalog".to_string()),
        }
    }

    async fn create(repository: &InMemoryMetadataRepository, type_name: &str, name: &str) -> String {
        repository
            .create_entity(
                "erinoverview",
                NewEntity::new(
                    type_name,
                    Ownership::LocalOwned,
                    properties(json!({ "qualified_name": name })),
                ),
            )
            .await
            .unwrap()
    }

    fn link(type_name: &str, end1: &str, end2: &str) -> NewRelationship {
        NewRelationship {
            type_name: type_name.to_string(),
            ownership: Ownership::LocalOwned,
            end1_guid: end1.to_string(),
            end2_guid: end2.to_string(),
            properties: Map::new(),
            effective_from: None,
            effective_to: None,
        }
    }

    #[tokio::test]
    async fn test_get_entity_checks_type() {
        let repository = InMemoryMetadataRepository::new();
        let guid = create(&repository, "Connection", "conn-1").await;
        let options = RequestOptions::default();

        let detail = repository
            .get_entity("erinoverview", &guid, "Connection", &[], &options)
            .await
            .unwrap();
        assert_eq!(detail.string_property("qualified_name"), Some("conn-1"));

        assert!(repository
            .get_entity("erinoverview", &guid, type_names::REFERENCEABLE, &[], &options)
            .await
            .is_ok());

        let err = repository
            .get_entity("erinoverview", &guid, "Endpoint", &[], &options)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[tokio::test]
    async fn test_merge_and_replace_update() {
        let repository = InMemoryMetadataRepository::new();
        let guid = create(&repository, "Endpoint", "ep-1").await;
        let options = RequestOptions::default();

        let merge = PropertiesUpdate {
            ownership: Ownership::LocalOwned,
            properties: properties(json!({ "network_address": "host:1" })),
            is_merge_update: true,
            effective_from: None,
            effective_to: None,
        };
        repository
            .update_entity("erinoverview", &guid, "Endpoint", merge, &options)
            .await
            .unwrap();

        let detail = repository
            .get_entity("erinoverview", &guid, "Endpoint", &[], &options)
            .await
            .unwrap();
        assert_eq!(detail.string_property("qualified_name"), Some("ep-1"));
        assert_eq!(detail.string_property("network_address"), Some("host:1"));
        assert_eq!(detail.header.version, 2);

        let replace = PropertiesUpdate {
            ownership: Ownership::LocalOwned,
            properties: properties(json!({ "qualified_name": "ep-2" })),
            is_merge_update: false,
            effective_from: None,
            effective_to: None,
        };
        repository
            .update_entity("erinoverview", &guid, "Endpoint", replace, &options)
            .await
            .unwrap();

        let detail = repository
            .get_entity("erinoverview", &guid, "Endpoint", &[], &options)
            .await
            .unwrap();
        assert_eq!(detail.string_property("qualified_name"), Some("ep-2"));
        assert!(detail.string_property("network_address").is_none());
    }

    #[tokio::test]
    async fn test_externally_owned_entity_rejects_other_sources() {
        let repository = InMemoryMetadataRepository::new();
        let guid = repository
            .create_entity(
                "erinoverview",
                NewEntity::new("Connection", external(), properties(json!({ "qualified_name": "c" }))),
            )
            .await
            .unwrap();
        let options = RequestOptions::default();

        let err = repository
            .update_entity_status(
                "erinoverview",
                &guid,
                "Connection",
                &Ownership::LocalOwned,
                InstanceStatus::Draft,
                &options,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);

        repository
            .update_entity_status(
                "erinoverview",
                &guid,
                "Connection",
                &external(),
                InstanceStatus::Draft,
                &options,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_find_by_regex_exact_value_and_anchor() {
        let repository = InMemoryMetadataRepository::new();
        let process = create(&repository, "Process", "proc-1").await;
        create(&repository, "Process", "proc-2").await;
        let port = repository
            .create_entity(
                "erinoverview",
                NewEntity::new("Port", Ownership::LocalOwned, properties(json!({ "qualified_name": "port-1" })))
                    .with_anchor(Some(process.clone())),
            )
            .await
            .unwrap();
        let options = RequestOptions::default();

        let found = repository
            .find_entities(
                "erinoverview",
                "Process",
                &EntitySearch::Regex("proc-.*".to_string()),
                &[],
                Paging::all(),
                &options,
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].header.guid, process);

        let found = repository
            .find_entities(
                "erinoverview",
                "Process",
                &EntitySearch::ExactValue {
                    value: "proc-2".to_string(),
                    property_names: vec!["qualified_name"],
                },
                &[],
                Paging::all(),
                &options,
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let found = repository
            .find_entities(
                "erinoverview",
                "Port",
                &EntitySearch::Anchored(process),
                &[],
                Paging::all(),
                &options,
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].header.guid, port);
    }

    #[tokio::test]
    async fn test_invalid_regex() {
        let repository = InMemoryMetadataRepository::new();
        let err = repository
            .find_entities(
                "erinoverview",
                "Process",
                &EntitySearch::Regex("(".to_string()),
                &[],
                Paging::all(),
                &RequestOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[tokio::test]
    async fn test_zone_visibility() {
        let repository = InMemoryMetadataRepository::new();
        let guid = repository
            .create_entity(
                "erinoverview",
                NewEntity::new("Process", Ownership::LocalOwned, Map::new())
                    .with_zones(vec!["quarantine".to_string()]),
            )
            .await
            .unwrap();
        let supported = vec!["data-lake".to_string()];
        let options = RequestOptions::default();

        assert!(repository
            .get_entity("erinoverview", &guid, "Process", &supported, &options)
            .await
            .is_err());
        assert!(repository
            .get_entity("erinoverview", &guid, "Process", &[], &options)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_effective_time_filters_entities() {
        let repository = InMemoryMetadataRepository::new();
        let now = Utc::now();
        let guid = repository
            .create_entity(
                "erinoverview",
                NewEntity::new("Connection", Ownership::LocalOwned, Map::new())
                    .with_effectivity(Some(now + Duration::days(1)), None),
            )
            .await
            .unwrap();

        assert!(repository
            .get_entity("erinoverview", &guid, "Connection", &[], &RequestOptions::at(now))
            .await
            .is_err());
        assert!(repository
            .get_entity(
                "erinoverview",
                &guid,
                "Connection",
                &[],
                &RequestOptions::at(now + Duration::days(2))
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_remove_cascades_to_anchored_entities() {
        let repository = InMemoryMetadataRepository::new();
        let anchor = create(&repository, "Process", "proc-1").await;
        repository
            .create_entity(
                "erinoverview",
                NewEntity::new("Port", Ownership::LocalOwned, Map::new()).with_anchor(Some(anchor.clone())),
            )
            .await
            .unwrap();
        assert_eq!(repository.entity_count().await, 2);

        let removed = repository
            .remove_entity(
                "erinoverview",
                &anchor,
                "Process",
                &Ownership::LocalOwned,
                &RequestOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0], anchor);
        assert_eq!(repository.entity_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_keeps_lineage_memento() {
        let repository = InMemoryMetadataRepository::new();
        let supplier = create(&repository, "Process", "proc-1").await;
        let consumer = create(&repository, "Process", "proc-2").await;
        let other = create(&repository, "Endpoint", "ep-1").await;
        let options = RequestOptions::default();

        repository
            .create_relationship("erinoverview", link(type_names::DATA_FLOW, &supplier, &consumer), &options)
            .await
            .unwrap();
        repository
            .create_relationship("erinoverview", link(type_names::CONNECTION_ENDPOINT, &other, &supplier), &options)
            .await
            .unwrap();

        repository
            .remove_entity("erinoverview", &supplier, "Process", &Ownership::LocalOwned, &options)
            .await
            .unwrap();

        assert!(repository
            .get_entity("erinoverview", &supplier, "Process", &[], &options)
            .await
            .is_err());
        let memento = repository
            .get_entity("erinoverview", &supplier, "Process", &[], &RequestOptions::lineage())
            .await
            .unwrap();
        assert!(memento.memento);
        assert_eq!(memento.header.status, InstanceStatus::Deleted);

        let flows = repository
            .get_relationships(
                "erinoverview",
                &consumer,
                type_names::DATA_FLOW,
                RelationshipEnd::End2,
                Paging::all(),
                &options,
            )
            .await
            .unwrap();
        assert!(flows.is_empty());

        let flows = repository
            .get_relationships(
                "erinoverview",
                &consumer,
                type_names::DATA_FLOW,
                RelationshipEnd::End2,
                Paging::all(),
                &RequestOptions::lineage(),
            )
            .await
            .unwrap();
        assert_eq!(flows.len(), 1);
        assert_eq!(repository.relationship_count().await, 1);
    }

    #[tokio::test]
    async fn test_relationship_requires_known_ends() {
        let repository = InMemoryMetadataRepository::new();
        let end1 = create(&repository, "Connection", "conn-1").await;
        let err = repository
            .create_relationship(
                "erinoverview",
                link(
                    type_names::CONNECTION_CONNECTOR_TYPE,
                    &end1,
                    "550e8400-e29b-41d4-a716-446655440000",
                ),
                &RequestOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::InvalidParameter { ref parameter, .. } if parameter == "end2GUID"
        ));
    }

    #[tokio::test]
    async fn test_remove_relationships_between() {
        let repository = InMemoryMetadataRepository::new();
        let end1 = create(&repository, "Connection", "conn-1").await;
        let end2 = create(&repository, "ConnectorType", "ct-1").await;
        let options = RequestOptions::default();
        repository
            .create_relationship("erinoverview", link(type_names::CONNECTION_CONNECTOR_TYPE, &end1, &end2), &options)
            .await
            .unwrap();

        repository
            .remove_relationships_between(
                "erinoverview",
                type_names::CONNECTION_CONNECTOR_TYPE,
                &end1,
                &end2,
                &Ownership::LocalOwned,
                &options,
            )
            .await
            .unwrap();
        assert_eq!(repository.relationship_count().await, 0);
    }

    struct DenyReads;

    impl SecurityVerifier for DenyReads {
        fn validate_user_for_entity_read(&self, user_id: &str, _entity: &EntityDetail) -> Result<()> {
            Err(ExchangeError::not_authorized(user_id, "reads are disabled"))
        }
    }

    #[tokio::test]
    async fn test_security_verifier_is_consulted() {
        let repository = InMemoryMetadataRepository::with_security_verifier(Arc::new(DenyReads));
        let guid = create(&repository, "Connection", "conn-1").await;
        let options = RequestOptions::default();

        let err = repository
            .get_entity("garygeeke", &guid, "Connection", &[], &options)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);

        let found = repository
            .find_entities(
                "garygeeke",
                "Connection",
                &EntitySearch::Regex(".*".to_string()),
                &[],
                Paging::all(),
                &options,
            )
            .await
            .unwrap();
        assert!(found.is_empty());
    }
}
