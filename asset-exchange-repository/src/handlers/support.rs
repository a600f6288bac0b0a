//! Plumbing shared by the exchange handlers.
//!
//! Each handler operation validates its parameters, works out who owns the
//! element, makes one call into the metadata repository and, for reads,
//! decorates the result with the caller's correlation headers. The steps
//! that are the same for every element family live here.

use std::sync::Arc;

use asset_exchange_shared::{
    CorrelatedElement, ElementProperties, MetadataCorrelationProperties, RelationshipElement,
    TemplateProperties,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::ExchangeServiceConfig;
use crate::context::ExchangeContext;
use crate::errors::{ExchangeError, Result};
use crate::interfaces::{ExternalIdentifierHandler, MetadataRepository, RelationshipEvent};
use crate::types::{
    EntityDetail, EntitySearch, NewEntity, NewRelationship, Ownership, Paging, PropertiesUpdate,
    RelationshipDetail, RelationshipEnd, RequestOptions,
};
use crate::validation::InvalidParameterHandler;

pub(crate) struct ExchangeSupport {
    pub(crate) config: Arc<ExchangeServiceConfig>,
    pub(crate) repository: Arc<dyn MetadataRepository>,
    pub(crate) external_identifiers: Arc<dyn ExternalIdentifierHandler>,
    pub(crate) invalid_parameters: InvalidParameterHandler,
}

impl ExchangeSupport {
    pub(crate) fn new(context: &ExchangeContext) -> Self {
        debug!(
            service_name = %context.config.service_name,
            server_name = %context.config.server_name,
            max_page_size = context.config.max_page_size,
            "Initializing exchange handler"
        );
        Self {
            config: Arc::clone(&context.config),
            repository: Arc::clone(&context.repository),
            external_identifiers: Arc::clone(&context.external_identifiers),
            invalid_parameters: InvalidParameterHandler::new(context.config.max_page_size),
        }
    }

    /// Creates need a qualified name; so do replace updates.
    pub(crate) fn validate_qualified_name<P: ElementProperties>(
        &self,
        properties: &P,
        is_merge_update: bool,
    ) -> Result<()> {
        if is_merge_update {
            return Ok(());
        }
        self.invalid_parameters
            .validate_name(properties.qualified_name(), "qualifiedName")
    }

    pub(crate) fn paging(&self, start_from: usize, page_size: usize) -> Result<Paging> {
        self.invalid_parameters.validate_paging(start_from, page_size)
    }

    /// Build a create request for an element family, owned according to the
    /// caller's correlation.
    pub(crate) fn new_entity<P: ElementProperties>(
        &self,
        type_name: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        properties: &P,
    ) -> Result<NewEntity> {
        Ok(NewEntity::new(
            type_name,
            Ownership::for_create(correlation, asset_manager_is_home),
            property_map(properties)?,
        )
        .with_effectivity(properties.effective_from(), properties.effective_to()))
    }

    /// Create the entity and record the caller's identifier for it.
    pub(crate) async fn create_entity(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        request: NewEntity,
    ) -> Result<String> {
        let type_name = request.type_name.clone();
        let ownership = request.ownership.clone();
        let guid = self.repository.create_entity(user_id, request).await?;
        self.register_or_roll_back(user_id, &guid, &type_name, &ownership, correlation)
            .await?;
        Ok(guid)
    }

    /// Create the entity from a template and record the caller's identifier
    /// for it.
    pub(crate) async fn create_entity_from_template(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        template_guid: &str,
        request: NewEntity,
    ) -> Result<String> {
        let type_name = request.type_name.clone();
        let ownership = request.ownership.clone();
        let guid = self
            .repository
            .create_entity_from_template(user_id, template_guid, request)
            .await?;
        self.register_or_roll_back(user_id, &guid, &type_name, &ownership, correlation)
            .await?;
        Ok(guid)
    }

    /// A create whose identifier is rejected must not leave the new entity
    /// behind.
    async fn register_or_roll_back(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        ownership: &Ownership,
        correlation: Option<&MetadataCorrelationProperties>,
    ) -> Result<()> {
        let error = match self
            .register_external_identifier(user_id, guid, type_name, correlation)
            .await
        {
            Ok(()) => return Ok(()),
            Err(error) => error,
        };
        if let Err(cleanup) = self
            .repository
            .remove_entity(
                user_id,
                guid,
                type_name,
                ownership,
                &RequestOptions::default(),
            )
            .await
        {
            warn!(guid, type_name, error = %cleanup, "Unable to remove entity after rejected create");
        }
        debug!(guid, type_name, error = %error, "Rolled back create");
        Err(error)
    }

    pub(crate) async fn register_external_identifier(
        &self,
        user_id: &str,
        element_guid: &str,
        element_type: &str,
        correlation: Option<&MetadataCorrelationProperties>,
    ) -> Result<()> {
        match correlation {
            Some(c) if c.asset_manager_guid.is_some() && c.external_identifier.is_some() => {
                self.external_identifiers
                    .create_external_identifier(user_id, element_guid, element_type, c)
                    .await
            }
            _ => Ok(()),
        }
    }

    /// Check the caller's external identifier, when one is supplied, refers
    /// to the element being changed.
    pub(crate) async fn confirm_correlation(
        &self,
        user_id: &str,
        element_guid: &str,
        element_type: &str,
        correlation: Option<&MetadataCorrelationProperties>,
    ) -> Result<()> {
        match correlation {
            Some(c) => {
                self.external_identifiers
                    .validate_external_identifier(user_id, element_guid, element_type, c)
                    .await
            }
            None => Ok(()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn update_entity<P: ElementProperties>(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        guid: &str,
        type_name: &str,
        is_merge_update: bool,
        properties: &P,
        options: &RequestOptions,
    ) -> Result<()> {
        self.confirm_correlation(user_id, guid, type_name, correlation)
            .await?;
        let update = PropertiesUpdate {
            ownership: Ownership::for_update(correlation),
            properties: property_map(properties)?,
            is_merge_update,
            effective_from: properties.effective_from(),
            effective_to: properties.effective_to(),
        };
        self.repository
            .update_entity(user_id, guid, type_name, update, options)
            .await
    }

    pub(crate) async fn remove_entity(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        guid: &str,
        type_name: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.confirm_correlation(user_id, guid, type_name, correlation)
            .await?;
        let removed = self
            .repository
            .remove_entity(
                user_id,
                guid,
                type_name,
                &Ownership::for_update(correlation),
                options,
            )
            .await?;
        for removed_guid in &removed {
            self.external_identifiers
                .remove_external_identifiers(user_id, removed_guid)
                .await?;
        }
        Ok(())
    }

    /// Retrieve an entity, reporting an unknown GUID against the named
    /// parameter.
    pub(crate) async fn entity(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        parameter_name: &str,
        options: &RequestOptions,
    ) -> Result<EntityDetail> {
        self.repository
            .get_entity(user_id, guid, type_name, &self.config.supported_zones, options)
            .await
            .map_err(|e| match e {
                ExchangeError::InvalidParameter { .. } => {
                    ExchangeError::unknown_guid(parameter_name, guid, type_name)
                }
                other => other,
            })
    }

    pub(crate) async fn element<P: ElementProperties>(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        guid: &str,
        type_name: &str,
        parameter_name: &str,
        options: &RequestOptions,
    ) -> Result<CorrelatedElement<P>> {
        let detail = self
            .entity(user_id, guid, type_name, parameter_name, options)
            .await?;
        self.correlate(user_id, correlation, detail).await
    }

    pub(crate) async fn find_elements<P: ElementProperties>(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        type_name: &str,
        search: &EntitySearch,
        paging: Paging,
        options: &RequestOptions,
    ) -> Result<Vec<CorrelatedElement<P>>> {
        let details = self
            .repository
            .find_entities(
                user_id,
                type_name,
                search,
                &self.config.supported_zones,
                paging,
                options,
            )
            .await?;
        debug!(type_name = %type_name, count = details.len(), "Found elements");
        self.correlate_all(user_id, correlation, details).await
    }

    /// Validate a free-text search and run it as a regular expression over
    /// the string properties of every element of the type.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn find_by_search_string<P: ElementProperties>(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        type_name: &str,
        search_string: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<CorrelatedElement<P>>> {
        self.invalid_parameters.validate_user_id(user_id)?;
        self.invalid_parameters
            .validate_search_string(search_string, "searchString")?;
        let paging = self.paging(start_from, page_size)?;

        debug!(type_name = %type_name, search_string = %search_string, "Finding elements");
        self.find_elements(
            user_id,
            correlation,
            type_name,
            &EntitySearch::Regex(search_string.to_string()),
            paging,
            options,
        )
        .await
    }

    /// Elements of the type where one of the named properties equals
    /// `value` exactly.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn find_by_value<P: ElementProperties>(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        type_name: &str,
        value: &str,
        parameter_name: &str,
        property_names: &[&'static str],
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<CorrelatedElement<P>>> {
        self.invalid_parameters.validate_user_id(user_id)?;
        self.invalid_parameters
            .validate_name(Some(value), parameter_name)?;
        let paging = self.paging(start_from, page_size)?;

        let search = EntitySearch::ExactValue {
            value: value.to_string(),
            property_names: property_names.to_vec(),
        };
        self.find_elements(user_id, correlation, type_name, &search, paging, options)
            .await
    }

    pub(crate) async fn element_by_guid<P: ElementProperties>(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        type_name: &str,
        guid: &str,
        parameter_name: &str,
        options: &RequestOptions,
    ) -> Result<CorrelatedElement<P>> {
        self.invalid_parameters.validate_user_id(user_id)?;
        self.invalid_parameters.validate_guid(guid, parameter_name)?;

        self.element(user_id, correlation, guid, type_name, parameter_name, options)
            .await
    }

    /// Validate the request, then remove the element and forget its
    /// external identifiers.
    pub(crate) async fn remove_element(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        type_name: &str,
        guid: &str,
        parameter_name: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.invalid_parameters.validate_user_id(user_id)?;
        self.invalid_parameters.validate_guid(guid, parameter_name)?;

        self.remove_entity(user_id, correlation, guid, type_name, options)
            .await?;

        info!(
            server_name = %self.config.server_name,
            guid = %guid,
            type_name = %type_name,
            "Removed element"
        );
        Ok(())
    }

    /// Validate the request, then create an element of the type by copying
    /// the template and overlaying the template properties.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn create_from_template(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        type_name: &str,
        template_guid: &str,
        template_properties: &TemplateProperties,
        zones: Vec<String>,
    ) -> Result<String> {
        self.invalid_parameters.validate_user_id(user_id)?;
        self.invalid_parameters
            .validate_guid(template_guid, "templateGUID")?;
        self.invalid_parameters
            .validate_name(template_properties.qualified_name.as_deref(), "qualifiedName")?;

        let request = NewEntity::new(
            type_name,
            Ownership::for_create(correlation, asset_manager_is_home),
            property_map(template_properties)?,
        )
        .with_zones(zones);
        let guid = self
            .create_entity_from_template(user_id, correlation, template_guid, request)
            .await?;

        info!(
            server_name = %self.config.server_name,
            guid = %guid,
            type_name = %type_name,
            template_guid = %template_guid,
            "Created element from template"
        );
        Ok(guid)
    }

    /// Elements of a type that the calling asset manager has correlated.
    ///
    /// Returns `None`, not an empty list, when there are none.
    pub(crate) async fn elements_for_asset_manager<P: ElementProperties>(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        type_name: &str,
        paging: Paging,
        options: &RequestOptions,
    ) -> Result<Option<Vec<CorrelatedElement<P>>>> {
        let correlation = self
            .invalid_parameters
            .validate_object(correlation, "correlationProperties")?;
        let scope_guid = correlation.asset_manager_guid.as_deref();
        self.invalid_parameters
            .validate_name(scope_guid, "assetManagerGUID")?;
        let scope_guid = scope_guid.unwrap_or_default();

        let guids = self
            .external_identifiers
            .get_elements_for_scope(user_id, scope_guid, type_name, Paging::all())
            .await?;

        let mut visible = Vec::with_capacity(guids.len());
        for guid in guids {
            match self
                .repository
                .get_entity(user_id, &guid, type_name, &self.config.supported_zones, options)
                .await
            {
                Ok(detail) => visible.push(detail),
                // Correlated elements hidden by zones or effectivity are left out.
                Err(ExchangeError::InvalidParameter { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        let mut elements = Vec::new();
        for detail in paging.apply(visible) {
            elements.push(self.correlate(user_id, Some(correlation), detail).await?);
        }
        debug!(
            server_name = %self.config.server_name,
            scope_guid,
            type_name,
            count = elements.len(),
            "Retrieved elements for asset manager"
        );

        if elements.is_empty() {
            Ok(None)
        } else {
            Ok(Some(elements))
        }
    }

    pub(crate) async fn correlate<P: ElementProperties>(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        detail: EntityDetail,
    ) -> Result<CorrelatedElement<P>> {
        let correlation_headers = match correlation.and_then(|c| {
            c.asset_manager_guid
                .as_deref()
                .map(|guid| (guid, c.asset_manager_name.as_deref()))
        }) {
            Some((asset_manager_guid, asset_manager_name)) => Some(
                self.external_identifiers
                    .get_correlation_headers(
                        user_id,
                        &detail.header.guid,
                        &detail.header.type_name,
                        asset_manager_guid,
                        asset_manager_name,
                    )
                    .await?,
            ),
            None => None,
        };

        let mut properties: P = serde_json::from_value(Value::Object(detail.properties))?;
        properties.set_effectivity(detail.header.effective_from, detail.header.effective_to);

        Ok(CorrelatedElement {
            header: detail.header,
            correlation_headers,
            properties,
        })
    }

    pub(crate) async fn correlate_all<P: ElementProperties>(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        details: Vec<EntityDetail>,
    ) -> Result<Vec<CorrelatedElement<P>>> {
        let mut elements = Vec::with_capacity(details.len());
        for detail in details {
            elements.push(self.correlate(user_id, correlation, detail).await?);
        }
        Ok(elements)
    }

    /// Create a relationship between two elements and return its GUID.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn relate<P: ElementProperties>(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        type_name: &str,
        end1_guid: &str,
        end2_guid: &str,
        properties: Option<&P>,
        options: &RequestOptions,
    ) -> Result<String> {
        let (map, effective_from, effective_to) = match properties {
            Some(properties) => (
                property_map(properties)?,
                properties.effective_from(),
                properties.effective_to(),
            ),
            None => (Map::new(), None, None),
        };

        let request = NewRelationship {
            type_name: type_name.to_string(),
            ownership: Ownership::for_create(correlation, asset_manager_is_home),
            end1_guid: end1_guid.to_string(),
            end2_guid: end2_guid.to_string(),
            properties: map,
            effective_from,
            effective_to,
        };
        self.repository
            .create_relationship(user_id, request, options)
            .await
    }

    /// Create the relationship unless the pair is already linked by one.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn relate_once<P: ElementProperties>(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        type_name: &str,
        end1_guid: &str,
        end2_guid: &str,
        properties: Option<&P>,
        options: &RequestOptions,
    ) -> Result<String> {
        let existing = self
            .repository
            .get_relationships_between(user_id, type_name, end1_guid, end2_guid, options)
            .await?;
        if let Some(relationship) = existing.into_iter().next() {
            debug!(
                type_name = %type_name,
                guid = %relationship.header.guid,
                "Relationship already exists"
            );
            return Ok(relationship.header.guid);
        }
        self.relate(
            user_id,
            correlation,
            asset_manager_is_home,
            type_name,
            end1_guid,
            end2_guid,
            properties,
            options,
        )
        .await
    }

    pub(crate) async fn unrelate(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        type_name: &str,
        end1_guid: &str,
        end2_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.repository
            .remove_relationships_between(
                user_id,
                type_name,
                end1_guid,
                end2_guid,
                &Ownership::for_update(correlation),
                options,
            )
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn update_relationship<P: ElementProperties>(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        guid: &str,
        type_name: &str,
        is_merge_update: bool,
        properties: &P,
        options: &RequestOptions,
    ) -> Result<()> {
        let update = PropertiesUpdate {
            ownership: Ownership::for_update(correlation),
            properties: property_map(properties)?,
            is_merge_update,
            effective_from: properties.effective_from(),
            effective_to: properties.effective_to(),
        };
        self.repository
            .update_relationship(user_id, guid, type_name, update, options)
            .await
    }

    pub(crate) async fn remove_relationship(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        guid: &str,
        type_name: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.repository
            .remove_relationship(
                user_id,
                guid,
                type_name,
                &Ownership::for_update(correlation),
                options,
            )
            .await
    }

    /// Relationships of a type with `guid` at the given end.
    pub(crate) async fn relationships<P: ElementProperties>(
        &self,
        user_id: &str,
        guid: &str,
        type_name: &str,
        end: RelationshipEnd,
        paging: Paging,
        options: &RequestOptions,
    ) -> Result<Vec<RelationshipElement<P>>> {
        self.repository
            .get_relationships(user_id, guid, type_name, end, paging, options)
            .await?
            .into_iter()
            .map(relationship_element)
            .collect()
    }

    /// The relationship of a type linking the pair. When several link the
    /// pair, `qualified_name` picks one out; otherwise the oldest is
    /// returned.
    pub(crate) async fn relationship_between<P: ElementProperties>(
        &self,
        user_id: &str,
        type_name: &str,
        end1_guid: &str,
        end2_guid: &str,
        qualified_name: Option<&str>,
        options: &RequestOptions,
    ) -> Result<Option<RelationshipElement<P>>> {
        let candidates = self
            .repository
            .get_relationships_between(user_id, type_name, end1_guid, end2_guid, options)
            .await?;
        candidates
            .into_iter()
            .find(|detail| {
                qualified_name.map_or(true, |name| detail.string_property("qualified_name") == Some(name))
            })
            .map(relationship_element)
            .transpose()
    }

    /// Entities at the other end of the relationships of a type attached to
    /// `guid`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn related_elements<P: ElementProperties>(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        guid: &str,
        relationship_type: &str,
        end: RelationshipEnd,
        element_type: &str,
        paging: Paging,
        options: &RequestOptions,
    ) -> Result<Vec<CorrelatedElement<P>>> {
        let relationships = self
            .repository
            .get_relationships(user_id, guid, relationship_type, end, paging, options)
            .await?;

        let mut elements = Vec::with_capacity(relationships.len());
        for relationship in relationships {
            let other_end = relationship.other_end(guid);
            match self
                .repository
                .get_entity(user_id, other_end, element_type, &self.config.supported_zones, options)
                .await
            {
                Ok(detail) => elements.push(self.correlate(user_id, correlation, detail).await?),
                Err(ExchangeError::InvalidParameter { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(elements)
    }
}

/// Serialize a property bag into the map stored by the repository, leaving
/// out absent and empty values so that merge updates only touch the
/// properties the caller set.
pub(crate) fn property_map<P: Serialize>(properties: &P) -> Result<Map<String, Value>> {
    match serde_json::to_value(properties)? {
        Value::Object(map) => Ok(map
            .into_iter()
            .filter(|(_, value)| !is_empty_value(value))
            .collect()),
        other => Err(ExchangeError::property_server(format!(
            "element properties must map to an object, found {}",
            other
        ))),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

pub(crate) fn relationship_element<P: ElementProperties>(
    detail: RelationshipDetail,
) -> Result<RelationshipElement<P>> {
    let mut properties: P = serde_json::from_value(Value::Object(detail.properties))?;
    properties.set_effectivity(detail.header.effective_from, detail.header.effective_to);
    Ok(RelationshipElement {
        header: detail.header,
        end1_guid: detail.end1_guid,
        end2_guid: detail.end2_guid,
        properties,
    })
}

pub(crate) fn relationship_event(
    correlation: Option<&MetadataCorrelationProperties>,
    relationship_type: &str,
    relationship_guid: Option<&str>,
    end1_guid: &str,
    end2_guid: &str,
) -> RelationshipEvent {
    RelationshipEvent {
        asset_manager_guid: correlation.and_then(|c| c.asset_manager_guid.clone()),
        asset_manager_name: correlation.and_then(|c| c.asset_manager_name.clone()),
        relationship_type: relationship_type.to_string(),
        relationship_guid: relationship_guid.map(str::to_string),
        end1_guid: end1_guid.to_string(),
        end2_guid: end2_guid.to_string(),
    }
}
