//! Exchange handler for external references.

use asset_exchange_shared::{
    ExternalReferenceElement, ExternalReferenceLinkElement, ExternalReferenceLinkProperties,
    ExternalReferenceProperties, MetadataCorrelationProperties,
};
use tracing::{debug, info, instrument};

use crate::context::ExchangeContext;
use crate::errors::Result;
use crate::handlers::support::{relationship_event, ExchangeSupport};
use crate::types::{type_names, RelationshipEnd, RequestOptions};

/// Maintains ExternalReference entities, which point at resources held
/// outside open metadata, and the ExternalReferenceLink relationships that
/// attach them to other elements.
///
/// Link changes are reported to the external identifier handler so they
/// appear in the asset manager's audit trail.
pub struct ExternalReferenceExchangeHandler {
    support: ExchangeSupport,
}

impl ExternalReferenceExchangeHandler {
    pub fn new(context: &ExchangeContext) -> Self {
        Self {
            support: ExchangeSupport::new(context),
        }
    }

    /// Create an external reference and return its GUID.
    ///
    /// A reference created with an anchor is removed when its anchor is.
    #[instrument(skip_all, fields(user_id = %user_id, anchor_guid = ?anchor_guid))]
    pub async fn create_external_reference(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        anchor_guid: Option<&str>,
        properties: &ExternalReferenceProperties,
    ) -> Result<String> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        if let Some(anchor_guid) = anchor_guid {
            self.support
                .invalid_parameters
                .validate_guid(anchor_guid, "anchorGUID")?;
        }
        self.support.validate_qualified_name(properties, false)?;

        let request = self
            .support
            .new_entity(
                type_names::EXTERNAL_REFERENCE,
                correlation,
                asset_manager_is_home,
                properties,
            )?
            .with_anchor(anchor_guid.map(str::to_string));
        let guid = self
            .support
            .create_entity(user_id, correlation, request)
            .await?;

        info!(guid = %guid, url = ?properties.url, "Created external reference");
        Ok(guid)
    }

    #[instrument(skip_all, fields(user_id = %user_id, external_reference_guid = %external_reference_guid))]
    pub async fn update_external_reference(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        external_reference_guid: &str,
        is_merge_update: bool,
        properties: &ExternalReferenceProperties,
        options: &RequestOptions,
    ) -> Result<()> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(external_reference_guid, "externalReferenceGUID")?;
        self.support
            .validate_qualified_name(properties, is_merge_update)?;

        self.support
            .update_entity(
                user_id,
                correlation,
                external_reference_guid,
                type_names::EXTERNAL_REFERENCE,
                is_merge_update,
                properties,
                options,
            )
            .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, external_reference_guid = %external_reference_guid))]
    pub async fn remove_external_reference(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        external_reference_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.support
            .remove_element(
                user_id,
                correlation,
                type_names::EXTERNAL_REFERENCE,
                external_reference_guid,
                "externalReferenceGUID",
                options,
            )
            .await
    }

    /// Attach an external reference to an element and return the GUID of
    /// the link.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(user_id = %user_id, attach_to_guid = %attach_to_guid, external_reference_guid = %external_reference_guid))]
    pub async fn link_external_reference_to_element(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        attach_to_guid: &str,
        external_reference_guid: &str,
        properties: Option<&ExternalReferenceLinkProperties>,
        options: &RequestOptions,
    ) -> Result<String> {
        self.validate_link_ends(user_id, attach_to_guid, external_reference_guid)?;

        // The reference end must really be an external reference.
        self.support
            .entity(
                user_id,
                external_reference_guid,
                type_names::EXTERNAL_REFERENCE,
                "externalReferenceGUID",
                options,
            )
            .await?;

        let link_guid = self
            .support
            .relate(
                user_id,
                correlation,
                asset_manager_is_home,
                type_names::EXTERNAL_REFERENCE_LINK,
                attach_to_guid,
                external_reference_guid,
                properties,
                options,
            )
            .await?;

        self.support
            .external_identifiers
            .log_relationship_creation(
                user_id,
                relationship_event(
                    correlation,
                    type_names::EXTERNAL_REFERENCE_LINK,
                    Some(link_guid.as_str()),
                    attach_to_guid,
                    external_reference_guid,
                ),
            )
            .await?;
        Ok(link_guid)
    }

    /// Change the properties of the link between an element and an
    /// external reference.
    #[instrument(skip_all, fields(user_id = %user_id, link_guid = %link_guid))]
    pub async fn update_external_reference_to_element_link(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        is_merge_update: bool,
        link_guid: &str,
        properties: &ExternalReferenceLinkProperties,
        options: &RequestOptions,
    ) -> Result<()> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(link_guid, "externalReferenceLinkGUID")?;

        let link = self
            .support
            .repository
            .get_relationship(user_id, link_guid, type_names::EXTERNAL_REFERENCE_LINK, options)
            .await?;

        self.support
            .update_relationship(
                user_id,
                correlation,
                link_guid,
                type_names::EXTERNAL_REFERENCE_LINK,
                is_merge_update,
                properties,
                options,
            )
            .await?;

        self.support
            .external_identifiers
            .log_relationship_update(
                user_id,
                relationship_event(
                    correlation,
                    type_names::EXTERNAL_REFERENCE_LINK,
                    Some(link_guid),
                    &link.end1_guid,
                    &link.end2_guid,
                ),
            )
            .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, attached_to_guid = %attached_to_guid, external_reference_guid = %external_reference_guid))]
    pub async fn unlink_external_reference_from_element(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        attached_to_guid: &str,
        external_reference_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.validate_link_ends(user_id, attached_to_guid, external_reference_guid)?;

        self.support
            .unrelate(
                user_id,
                correlation,
                type_names::EXTERNAL_REFERENCE_LINK,
                attached_to_guid,
                external_reference_guid,
                options,
            )
            .await?;

        self.support
            .external_identifiers
            .log_relationship_removal(
                user_id,
                relationship_event(
                    correlation,
                    type_names::EXTERNAL_REFERENCE_LINK,
                    None,
                    attached_to_guid,
                    external_reference_guid,
                ),
            )
            .await
    }

    /// External references attached to an element.
    pub async fn retrieve_attached_external_references(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        attached_to_guid: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<ExternalReferenceElement>> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(attached_to_guid, "attachedToGUID")?;
        let paging = self.support.paging(start_from, page_size)?;

        let references = self
            .support
            .related_elements(
                user_id,
                correlation,
                attached_to_guid,
                type_names::EXTERNAL_REFERENCE_LINK,
                RelationshipEnd::End1,
                type_names::EXTERNAL_REFERENCE,
                paging,
                options,
            )
            .await?;

        debug!(attached_to_guid = %attached_to_guid, count = references.len(), "Retrieved attached external references");
        Ok(references)
    }

    /// Links attaching external references to an element.
    pub async fn get_external_reference_links(
        &self,
        user_id: &str,
        attached_to_guid: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<ExternalReferenceLinkElement>> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(attached_to_guid, "attachedToGUID")?;
        let paging = self.support.paging(start_from, page_size)?;

        self.support
            .relationships(
                user_id,
                attached_to_guid,
                type_names::EXTERNAL_REFERENCE_LINK,
                RelationshipEnd::End1,
                paging,
                options,
            )
            .await
    }

    pub async fn find_external_references(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        search_string: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<ExternalReferenceElement>> {
        self.support
            .find_by_search_string(
                user_id,
                correlation,
                type_names::EXTERNAL_REFERENCE,
                search_string,
                start_from,
                page_size,
                options,
            )
            .await
    }

    /// External references correlated with the calling asset manager, or
    /// `None` when it has none.
    pub async fn get_external_references_for_asset_manager(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Option<Vec<ExternalReferenceElement>>> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        let paging = self.support.paging(start_from, page_size)?;

        self.support
            .elements_for_asset_manager(
                user_id,
                correlation,
                type_names::EXTERNAL_REFERENCE,
                paging,
                options,
            )
            .await
    }

    pub async fn get_external_references_by_name(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        name: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<ExternalReferenceElement>> {
        self.support
            .find_by_value(
                user_id,
                correlation,
                type_names::EXTERNAL_REFERENCE,
                name,
                "name",
                &["qualified_name", "display_name"],
                start_from,
                page_size,
                options,
            )
            .await
    }

    pub async fn get_external_references_by_reference_id(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        reference_id: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<ExternalReferenceElement>> {
        self.support
            .find_by_value(
                user_id,
                correlation,
                type_names::EXTERNAL_REFERENCE,
                reference_id,
                "referenceId",
                &["reference_id"],
                start_from,
                page_size,
                options,
            )
            .await
    }

    pub async fn get_external_references_by_url(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        url: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<ExternalReferenceElement>> {
        self.support
            .find_by_value(
                user_id,
                correlation,
                type_names::EXTERNAL_REFERENCE,
                url,
                "url",
                &["url"],
                start_from,
                page_size,
                options,
            )
            .await
    }

    pub async fn get_external_reference_by_guid(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        external_reference_guid: &str,
        options: &RequestOptions,
    ) -> Result<ExternalReferenceElement> {
        self.support
            .element_by_guid(
                user_id,
                correlation,
                type_names::EXTERNAL_REFERENCE,
                external_reference_guid,
                "externalReferenceGUID",
                options,
            )
            .await
    }

    fn validate_link_ends(
        &self,
        user_id: &str,
        attached_to_guid: &str,
        external_reference_guid: &str,
    ) -> Result<()> {
        let validator = &self.support.invalid_parameters;
        validator.validate_user_id(user_id)?;
        validator.validate_guid(attached_to_guid, "attachedToGUID")?;
        validator.validate_guid(external_reference_guid, "externalReferenceGUID")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::ExchangeServiceConfig;
    use crate::errors::{ErrorKind, ExchangeError};
    use crate::memory::{
        InMemoryExternalIdentifierHandler, InMemoryMetadataRepository, RelationshipChange,
    };

    struct Fixture {
        handler: ExternalReferenceExchangeHandler,
        external_identifiers: Arc<InMemoryExternalIdentifierHandler>,
    }

    fn fixture() -> Fixture {
        let external_identifiers = Arc::new(InMemoryExternalIdentifierHandler::new());
        let context = ExchangeContext::new(
            ExchangeServiceConfig::default(),
            Arc::new(InMemoryMetadataRepository::new()),
            external_identifiers.clone(),
        );
        Fixture {
            handler: ExternalReferenceExchangeHandler::new(&context),
            external_identifiers,
        }
    }

    fn reference(name: &str, url: &str) -> ExternalReferenceProperties {
        ExternalReferenceProperties {
            qualified_name: Some(name.to_string()),
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_link_update_and_unlink_are_audited() {
        let f = fixture();
        let options = RequestOptions::default();
        let correlation = MetadataCorrelationProperties::for_asset_manager(
            "7b1b1ec4-5a0f-4d6d-9d0b-6c1c2f1f0a11",
            "catalog",
        );

        let element = f
            .handler
            .create_external_reference("erinoverview", None, false, None, &reference("ref-a", "https://a"))
            .await
            .unwrap();
        let target = f
            .handler
            .create_external_reference("erinoverview", None, false, None, &reference("ref-b", "https://b"))
            .await
            .unwrap();

        let link_guid = f
            .handler
            .link_external_reference_to_element(
                "erinoverview",
                Some(&correlation),
                false,
                &element,
                &target,
                None,
                &options,
            )
            .await
            .unwrap();

        let link = ExternalReferenceLinkProperties {
            link_id: Some("chapter-3".to_string()),
            ..Default::default()
        };
        f.handler
            .update_external_reference_to_element_link(
                "erinoverview",
                Some(&correlation),
                true,
                &link_guid,
                &link,
                &options,
            )
            .await
            .unwrap();

        let links = f
            .handler
            .get_external_reference_links("erinoverview", &element, 0, 0, &options)
            .await
            .unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].properties.link_id.as_deref(), Some("chapter-3"));

        f.handler
            .unlink_external_reference_from_element(
                "erinoverview",
                Some(&correlation),
                &element,
                &target,
                &options,
            )
            .await
            .unwrap();

        let events = f.external_identifiers.audit_events().await;
        let kinds: Vec<RelationshipChange> = events.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(
            kinds,
            vec![
                RelationshipChange::Created,
                RelationshipChange::Updated,
                RelationshipChange::Removed
            ]
        );
        assert_eq!(events[0].1.relationship_guid.as_deref(), Some(link_guid.as_str()));
        assert_eq!(events[1].1.end2_guid, target);
    }

    #[tokio::test]
    async fn test_link_requires_an_external_reference() {
        let f = fixture();
        let element = f
            .handler
            .create_external_reference("erinoverview", None, false, None, &reference("ref-a", "https://a"))
            .await
            .unwrap();

        let err = f
            .handler
            .link_external_reference_to_element(
                "erinoverview",
                None,
                false,
                &element,
                "550e8400-e29b-41d4-a716-446655440000",
                None,
                &RequestOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::InvalidParameter { ref parameter, .. } if parameter == "externalReferenceGUID"
        ));
        assert!(f.external_identifiers.audit_events().await.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_by_url_and_reference_id() {
        let f = fixture();
        let options = RequestOptions::default();
        let mut properties = reference("ref-a", "https://example.com/spec");
        properties.reference_id = Some("RFC-9110".to_string());
        f.handler
            .create_external_reference("erinoverview", None, false, None, &properties)
            .await
            .unwrap();

        let by_url = f
            .handler
            .get_external_references_by_url("erinoverview", None, "https://example.com/spec", 0, 0, &options)
            .await
            .unwrap();
        assert_eq!(by_url.len(), 1);

        let by_id = f
            .handler
            .get_external_references_by_reference_id("erinoverview", None, "RFC-9110", 0, 0, &options)
            .await
            .unwrap();
        assert_eq!(by_id[0].properties.qualified_name.as_deref(), Some("ref-a"));

        let err = f
            .handler
            .get_external_references_by_url("erinoverview", None, " ", 0, 0, &options)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }
}
