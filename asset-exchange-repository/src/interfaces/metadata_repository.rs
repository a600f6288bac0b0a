//! Generic metadata repository trait definition.
//!
//! This is the entity and relationship layer that every exchange handler
//! delegates to. It owns storage, search, ownership enforcement, anchors,
//! zone visibility and effective-time filtering.

use async_trait::async_trait;
use asset_exchange_shared::InstanceStatus;

use crate::errors::Result;
use crate::types::{
    EntityDetail, EntitySearch, NewEntity, NewRelationship, Ownership, Paging, PropertiesUpdate,
    RelationshipDetail, RelationshipEnd, RequestOptions,
};

/// Abstracts the generic entity and relationship handlers of the metadata
/// server.
///
/// Entity lookups take a `type_name`; an entity of a different type is
/// treated as unknown, except that `Referenceable` matches any entity.
/// Unknown GUIDs, including those hidden by zones or effective time, are
/// reported as `ExchangeError::InvalidParameter`.
///
/// Changes made with an [`Ownership`] that does not own an externally
/// owned element fail with `ExchangeError::NotAuthorized`.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Create an entity and return its GUID.
    async fn create_entity(&self, user_id: &str, request: NewEntity) -> Result<String>;

    /// Create an entity whose properties start as a copy of the template's.
    ///
    /// The request's properties are overlaid on the copy. The template must
    /// be of the requested type.
    async fn create_entity_from_template(
        &self,
        user_id: &str,
        template_guid: &str,
        request: NewEntity,
    ) -> Result<String>;

    /// Change the properties of an entity.
    async fn update_entity(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        update: PropertiesUpdate,
        options: &RequestOptions,
    ) -> Result<()>;

    /// Change the status of an entity.
    async fn update_entity_status(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        ownership: &Ownership,
        status: InstanceStatus,
        options: &RequestOptions,
    ) -> Result<()>;

    /// Replace the zones an entity belongs to.
    async fn update_entity_zones(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        ownership: &Ownership,
        zones: Vec<String>,
        options: &RequestOptions,
    ) -> Result<()>;

    /// Remove an entity, every entity anchored to it and its relationships.
    ///
    /// Entities still referenced by lineage relationships are kept as
    /// mementos, visible only to lineage requests. Returns the GUIDs of
    /// every entity removed, starting with `guid`.
    async fn remove_entity(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        ownership: &Ownership,
        options: &RequestOptions,
    ) -> Result<Vec<String>>;

    /// Retrieve a single entity.
    async fn get_entity(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        supported_zones: &[String],
        options: &RequestOptions,
    ) -> Result<EntityDetail>;

    /// Retrieve the entities of a type that match a search, in creation
    /// order.
    async fn find_entities(
        &self,
        user_id: &str,
        type_name: &str,
        search: &EntitySearch,
        supported_zones: &[String],
        paging: Paging,
        options: &RequestOptions,
    ) -> Result<Vec<EntityDetail>>;

    /// Link two entities and return the relationship GUID.
    async fn create_relationship(
        &self,
        user_id: &str,
        request: NewRelationship,
        options: &RequestOptions,
    ) -> Result<String>;

    /// Change the properties of a relationship.
    async fn update_relationship(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        update: PropertiesUpdate,
        options: &RequestOptions,
    ) -> Result<()>;

    /// Remove a relationship by GUID.
    async fn remove_relationship(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        ownership: &Ownership,
        options: &RequestOptions,
    ) -> Result<()>;

    /// Remove every relationship of a type from `end1_guid` to `end2_guid`.
    async fn remove_relationships_between(
        &self,
        user_id: &str,
        type_name: &str,
        end1_guid: &str,
        end2_guid: &str,
        ownership: &Ownership,
        options: &RequestOptions,
    ) -> Result<()>;

    /// Retrieve a single relationship.
    async fn get_relationship(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        options: &RequestOptions,
    ) -> Result<RelationshipDetail>;

    /// Retrieve the relationships of a type attached to an entity, in
    /// creation order.
    async fn get_relationships(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        end: RelationshipEnd,
        paging: Paging,
        options: &RequestOptions,
    ) -> Result<Vec<RelationshipDetail>>;

    /// Retrieve the relationships of a type from `end1_guid` to `end2_guid`.
    async fn get_relationships_between(
        &self,
        user_id: &str,
        type_name: &str,
        end1_guid: &str,
        end2_guid: &str,
        options: &RequestOptions,
    ) -> Result<Vec<RelationshipDetail>>;
}
