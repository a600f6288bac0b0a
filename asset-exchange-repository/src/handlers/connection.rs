//! Exchange handler for connections, connector types and endpoints.

use asset_exchange_shared::{
    AssetConnectionProperties, ConnectionElement, ConnectionProperties, ConnectorTypeElement,
    ConnectorTypeProperties, EmbeddedConnectionProperties, EndpointElement, EndpointProperties,
    MetadataCorrelationProperties, RelationshipProperties, TemplateProperties,
};
use tracing::{info, instrument};

use crate::context::ExchangeContext;
use crate::errors::Result;
use crate::handlers::support::ExchangeSupport;
use crate::types::{type_names, RequestOptions};

const NAME_PROPERTIES: &[&str] = &["qualified_name", "display_name"];

/// Maintains Connection, ConnectorType and Endpoint entities on behalf of
/// asset managers, along with the relationships that wire them together:
///
/// * `ConnectionConnectorType`: connection to connector type
/// * `ConnectionEndpoint`: endpoint to connection
/// * `EmbeddedConnection`: virtual connection to embedded connection
/// * `ConnectionToAsset`: connection to the asset it reaches
pub struct ConnectionExchangeHandler {
    support: ExchangeSupport,
}

impl ConnectionExchangeHandler {
    pub fn new(context: &ExchangeContext) -> Self {
        Self {
            support: ExchangeSupport::new(context),
        }
    }

    // ---- Connections ----

    /// Create a connection and return its GUID.
    ///
    /// When the correlation carries an external identifier it is recorded
    /// against the new connection.
    #[instrument(skip_all, fields(user_id = %user_id, asset_manager_is_home))]
    pub async fn create_connection(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        properties: &ConnectionProperties,
    ) -> Result<String> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support.validate_qualified_name(properties, false)?;

        let request = self.support.new_entity(
            type_names::CONNECTION,
            correlation,
            asset_manager_is_home,
            properties,
        )?;
        let guid = self
            .support
            .create_entity(user_id, correlation, request)
            .await?;

        info!(guid = %guid, qualified_name = ?properties.qualified_name, "Created connection");
        Ok(guid)
    }

    /// Create a connection by copying a template connection.
    #[instrument(skip_all, fields(user_id = %user_id, template_guid = %template_guid))]
    pub async fn create_connection_from_template(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        template_guid: &str,
        template_properties: &TemplateProperties,
    ) -> Result<String> {
        self.support
            .create_from_template(
                user_id,
                correlation,
                asset_manager_is_home,
                type_names::CONNECTION,
                template_guid,
                template_properties,
                Vec::new(),
            )
            .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, connection_guid = %connection_guid))]
    pub async fn update_connection(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        connection_guid: &str,
        is_merge_update: bool,
        properties: &ConnectionProperties,
        options: &RequestOptions,
    ) -> Result<()> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(connection_guid, "connectionGUID")?;
        self.support
            .validate_qualified_name(properties, is_merge_update)?;

        self.support
            .update_entity(
                user_id,
                correlation,
                connection_guid,
                type_names::CONNECTION,
                is_merge_update,
                properties,
                options,
            )
            .await
    }

    /// Link a connection to the connector type that implements it.
    ///
    /// Absent relationship properties mean the link is always effective.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(user_id = %user_id, connection_guid = %connection_guid))]
    pub async fn setup_connector_type(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        connection_guid: &str,
        connector_type_guid: &str,
        properties: Option<&RelationshipProperties>,
        options: &RequestOptions,
    ) -> Result<()> {
        self.validate_pair(
            user_id,
            connection_guid,
            "connectionGUID",
            connector_type_guid,
            "connectorTypeGUID",
        )?;

        self.support
            .relate_once(
                user_id,
                correlation,
                asset_manager_is_home,
                type_names::CONNECTION_CONNECTOR_TYPE,
                connection_guid,
                connector_type_guid,
                properties,
                options,
            )
            .await?;
        Ok(())
    }

    #[instrument(skip_all, fields(user_id = %user_id, connection_guid = %connection_guid))]
    pub async fn clear_connector_type(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        connection_guid: &str,
        connector_type_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.validate_pair(
            user_id,
            connection_guid,
            "connectionGUID",
            connector_type_guid,
            "connectorTypeGUID",
        )?;

        self.support
            .unrelate(
                user_id,
                correlation,
                type_names::CONNECTION_CONNECTOR_TYPE,
                connection_guid,
                connector_type_guid,
                options,
            )
            .await
    }

    /// Link a connection to the endpoint it connects through.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(user_id = %user_id, connection_guid = %connection_guid))]
    pub async fn setup_endpoint(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        connection_guid: &str,
        endpoint_guid: &str,
        properties: Option<&RelationshipProperties>,
        options: &RequestOptions,
    ) -> Result<()> {
        self.validate_pair(user_id, connection_guid, "connectionGUID", endpoint_guid, "endpointGUID")?;

        self.support
            .relate_once(
                user_id,
                correlation,
                asset_manager_is_home,
                type_names::CONNECTION_ENDPOINT,
                endpoint_guid,
                connection_guid,
                properties,
                options,
            )
            .await?;
        Ok(())
    }

    #[instrument(skip_all, fields(user_id = %user_id, connection_guid = %connection_guid))]
    pub async fn clear_endpoint(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        connection_guid: &str,
        endpoint_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.validate_pair(user_id, connection_guid, "connectionGUID", endpoint_guid, "endpointGUID")?;

        self.support
            .unrelate(
                user_id,
                correlation,
                type_names::CONNECTION_ENDPOINT,
                endpoint_guid,
                connection_guid,
                options,
            )
            .await
    }

    /// Add a connection to a virtual connection.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(user_id = %user_id, connection_guid = %connection_guid))]
    pub async fn setup_embedded_connection(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        connection_guid: &str,
        embedded_connection_guid: &str,
        properties: Option<&EmbeddedConnectionProperties>,
        options: &RequestOptions,
    ) -> Result<()> {
        self.validate_pair(
            user_id,
            connection_guid,
            "connectionGUID",
            embedded_connection_guid,
            "embeddedConnectionGUID",
        )?;

        self.support
            .relate_once(
                user_id,
                correlation,
                asset_manager_is_home,
                type_names::EMBEDDED_CONNECTION,
                connection_guid,
                embedded_connection_guid,
                properties,
                options,
            )
            .await?;
        Ok(())
    }

    #[instrument(skip_all, fields(user_id = %user_id, connection_guid = %connection_guid))]
    pub async fn clear_embedded_connection(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        connection_guid: &str,
        embedded_connection_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.validate_pair(
            user_id,
            connection_guid,
            "connectionGUID",
            embedded_connection_guid,
            "embeddedConnectionGUID",
        )?;

        self.support
            .unrelate(
                user_id,
                correlation,
                type_names::EMBEDDED_CONNECTION,
                connection_guid,
                embedded_connection_guid,
                options,
            )
            .await
    }

    /// Record that a connection provides access to an asset.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(user_id = %user_id, connection_guid = %connection_guid, asset_guid = %asset_guid))]
    pub async fn setup_asset_connection(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        asset_guid: &str,
        connection_guid: &str,
        properties: Option<&AssetConnectionProperties>,
        options: &RequestOptions,
    ) -> Result<()> {
        self.validate_pair(user_id, asset_guid, "assetGUID", connection_guid, "connectionGUID")?;

        self.support
            .relate_once(
                user_id,
                correlation,
                asset_manager_is_home,
                type_names::CONNECTION_TO_ASSET,
                connection_guid,
                asset_guid,
                properties,
                options,
            )
            .await?;
        Ok(())
    }

    #[instrument(skip_all, fields(user_id = %user_id, connection_guid = %connection_guid, asset_guid = %asset_guid))]
    pub async fn clear_asset_connection(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_guid: &str,
        connection_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.validate_pair(user_id, asset_guid, "assetGUID", connection_guid, "connectionGUID")?;

        self.support
            .unrelate(
                user_id,
                correlation,
                type_names::CONNECTION_TO_ASSET,
                connection_guid,
                asset_guid,
                options,
            )
            .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, connection_guid = %connection_guid))]
    pub async fn remove_connection(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        connection_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.support
            .remove_element(
                user_id,
                correlation,
                type_names::CONNECTION,
                connection_guid,
                "connectionGUID",
                options,
            )
            .await
    }

    /// Connections with any property matching the regular expression.
    pub async fn find_connections(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        search_string: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<ConnectionElement>> {
        self.support
            .find_by_search_string(
                user_id,
                correlation,
                type_names::CONNECTION,
                search_string,
                start_from,
                page_size,
                options,
            )
            .await
    }

    /// Connections correlated with the calling asset manager, or `None`
    /// when it has none.
    pub async fn get_connections_for_asset_manager(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Option<Vec<ConnectionElement>>> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        let paging = self.support.paging(start_from, page_size)?;

        self.support
            .elements_for_asset_manager(user_id, correlation, type_names::CONNECTION, paging, options)
            .await
    }

    pub async fn get_connections_by_name(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        name: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<ConnectionElement>> {
        self.support
            .find_by_value(
                user_id,
                correlation,
                type_names::CONNECTION,
                name,
                "name",
                NAME_PROPERTIES,
                start_from,
                page_size,
                options,
            )
            .await
    }

    pub async fn get_connection_by_guid(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        connection_guid: &str,
        options: &RequestOptions,
    ) -> Result<ConnectionElement> {
        self.support
            .element_by_guid(
                user_id,
                correlation,
                type_names::CONNECTION,
                connection_guid,
                "connectionGUID",
                options,
            )
            .await
    }

    // ---- Connector types ----

    #[instrument(skip_all, fields(user_id = %user_id, asset_manager_is_home))]
    pub async fn create_connector_type(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        properties: &ConnectorTypeProperties,
    ) -> Result<String> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support.validate_qualified_name(properties, false)?;

        let request = self.support.new_entity(
            type_names::CONNECTOR_TYPE,
            correlation,
            asset_manager_is_home,
            properties,
        )?;
        let guid = self
            .support
            .create_entity(user_id, correlation, request)
            .await?;

        info!(guid = %guid, qualified_name = ?properties.qualified_name, "Created connector type");
        Ok(guid)
    }

    #[instrument(skip_all, fields(user_id = %user_id, template_guid = %template_guid))]
    pub async fn create_connector_type_from_template(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        template_guid: &str,
        template_properties: &TemplateProperties,
    ) -> Result<String> {
        self.support
            .create_from_template(
                user_id,
                correlation,
                asset_manager_is_home,
                type_names::CONNECTOR_TYPE,
                template_guid,
                template_properties,
                Vec::new(),
            )
            .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, connector_type_guid = %connector_type_guid))]
    pub async fn update_connector_type(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        connector_type_guid: &str,
        is_merge_update: bool,
        properties: &ConnectorTypeProperties,
        options: &RequestOptions,
    ) -> Result<()> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(connector_type_guid, "connectorTypeGUID")?;
        self.support
            .validate_qualified_name(properties, is_merge_update)?;

        self.support
            .update_entity(
                user_id,
                correlation,
                connector_type_guid,
                type_names::CONNECTOR_TYPE,
                is_merge_update,
                properties,
                options,
            )
            .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, connector_type_guid = %connector_type_guid))]
    pub async fn remove_connector_type(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        connector_type_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.support
            .remove_element(
                user_id,
                correlation,
                type_names::CONNECTOR_TYPE,
                connector_type_guid,
                "connectorTypeGUID",
                options,
            )
            .await
    }

    pub async fn find_connector_types(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        search_string: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<ConnectorTypeElement>> {
        self.support
            .find_by_search_string(
                user_id,
                correlation,
                type_names::CONNECTOR_TYPE,
                search_string,
                start_from,
                page_size,
                options,
            )
            .await
    }

    pub async fn get_connector_types_for_asset_manager(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Option<Vec<ConnectorTypeElement>>> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        let paging = self.support.paging(start_from, page_size)?;

        self.support
            .elements_for_asset_manager(
                user_id,
                correlation,
                type_names::CONNECTOR_TYPE,
                paging,
                options,
            )
            .await
    }

    pub async fn get_connector_types_by_name(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        name: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<ConnectorTypeElement>> {
        self.support
            .find_by_value(
                user_id,
                correlation,
                type_names::CONNECTOR_TYPE,
                name,
                "name",
                NAME_PROPERTIES,
                start_from,
                page_size,
                options,
            )
            .await
    }

    pub async fn get_connector_type_by_guid(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        connector_type_guid: &str,
        options: &RequestOptions,
    ) -> Result<ConnectorTypeElement> {
        self.support
            .element_by_guid(
                user_id,
                correlation,
                type_names::CONNECTOR_TYPE,
                connector_type_guid,
                "connectorTypeGUID",
                options,
            )
            .await
    }

    // ---- Endpoints ----

    #[instrument(skip_all, fields(user_id = %user_id, asset_manager_is_home))]
    pub async fn create_endpoint(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        properties: &EndpointProperties,
    ) -> Result<String> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support.validate_qualified_name(properties, false)?;

        let request = self.support.new_entity(
            type_names::ENDPOINT,
            correlation,
            asset_manager_is_home,
            properties,
        )?;
        let guid = self
            .support
            .create_entity(user_id, correlation, request)
            .await?;

        info!(
            guid = %guid,
            network_address = ?properties.network_address,
            "Created endpoint"
        );
        Ok(guid)
    }

    #[instrument(skip_all, fields(user_id = %user_id, template_guid = %template_guid))]
    pub async fn create_endpoint_from_template(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        template_guid: &str,
        template_properties: &TemplateProperties,
    ) -> Result<String> {
        self.support
            .create_from_template(
                user_id,
                correlation,
                asset_manager_is_home,
                type_names::ENDPOINT,
                template_guid,
                template_properties,
                Vec::new(),
            )
            .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, endpoint_guid = %endpoint_guid))]
    pub async fn update_endpoint(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        endpoint_guid: &str,
        is_merge_update: bool,
        properties: &EndpointProperties,
        options: &RequestOptions,
    ) -> Result<()> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(endpoint_guid, "endpointGUID")?;
        self.support
            .validate_qualified_name(properties, is_merge_update)?;

        self.support
            .update_entity(
                user_id,
                correlation,
                endpoint_guid,
                type_names::ENDPOINT,
                is_merge_update,
                properties,
                options,
            )
            .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, endpoint_guid = %endpoint_guid))]
    pub async fn remove_endpoint(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        endpoint_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.support
            .remove_element(
                user_id,
                correlation,
                type_names::ENDPOINT,
                endpoint_guid,
                "endpointGUID",
                options,
            )
            .await
    }

    pub async fn find_endpoints(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        search_string: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<EndpointElement>> {
        self.support
            .find_by_search_string(
                user_id,
                correlation,
                type_names::ENDPOINT,
                search_string,
                start_from,
                page_size,
                options,
            )
            .await
    }

    pub async fn get_endpoints_for_asset_manager(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Option<Vec<EndpointElement>>> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        let paging = self.support.paging(start_from, page_size)?;

        self.support
            .elements_for_asset_manager(user_id, correlation, type_names::ENDPOINT, paging, options)
            .await
    }

    pub async fn get_endpoints_by_name(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        name: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<EndpointElement>> {
        self.support
            .find_by_value(
                user_id,
                correlation,
                type_names::ENDPOINT,
                name,
                "name",
                NAME_PROPERTIES,
                start_from,
                page_size,
                options,
            )
            .await
    }

    /// Endpoints whose network address matches exactly.
    pub async fn get_endpoints_by_network_address(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        network_address: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<EndpointElement>> {
        self.support
            .find_by_value(
                user_id,
                correlation,
                type_names::ENDPOINT,
                network_address,
                "networkAddress",
                &["network_address"],
                start_from,
                page_size,
                options,
            )
            .await
    }

    pub async fn get_endpoint_by_guid(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        endpoint_guid: &str,
        options: &RequestOptions,
    ) -> Result<EndpointElement> {
        self.support
            .element_by_guid(
                user_id,
                correlation,
                type_names::ENDPOINT,
                endpoint_guid,
                "endpointGUID",
                options,
            )
            .await
    }

    fn validate_pair(
        &self,
        user_id: &str,
        first_guid: &str,
        first_parameter: &str,
        second_guid: &str,
        second_parameter: &str,
    ) -> Result<()> {
        let validator = &self.support.invalid_parameters;
        validator.validate_user_id(user_id)?;
        validator.validate_guid(first_guid, first_parameter)?;
        validator.validate_guid(second_guid, second_parameter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use asset_exchange_shared::InstanceStatus;
    use tokio::sync::Mutex;

    use crate::config::ExchangeServiceConfig;
    use crate::errors::{ErrorKind, ExchangeError};
    use crate::interfaces::MetadataRepository;
    use crate::memory::InMemoryExternalIdentifierHandler;
    use crate::types::{
        EntityDetail, EntitySearch, NewEntity, NewRelationship, Ownership, Paging,
        PropertiesUpdate, RelationshipDetail, RelationshipEnd,
    };

    /// Repository that records every call and fails them all.
    #[derive(Default)]
    struct MockRepository {
        calls: Mutex<Vec<&'static str>>,
    }

    impl MockRepository {
        async fn record(&self, call: &'static str) -> ExchangeError {
            self.calls.lock().await.push(call);
            ExchangeError::property_server("repository offline")
        }
    }

    #[async_trait]
    impl MetadataRepository for MockRepository {
        async fn create_entity(&self, _user_id: &str, _request: NewEntity) -> Result<String> {
            Err(self.record("create_entity").await)
        }

        async fn create_entity_from_template(
            &self,
            _user_id: &str,
            _template_guid: &str,
            _request: NewEntity,
        ) -> Result<String> {
            Err(self.record("create_entity_from_template").await)
        }

        async fn update_entity(
            &self,
            _user_id: &str,
            _guid: &str,
            _type_name: &str,
            _update: PropertiesUpdate,
            _options: &RequestOptions,
        ) -> Result<()> {
            Err(self.record("update_entity").await)
        }

        async fn update_entity_status(
            &self,
            _user_id: &str,
            _guid: &str,
            _type_name: &str,
            _ownership: &Ownership,
            _status: InstanceStatus,
            _options: &RequestOptions,
        ) -> Result<()> {
            Err(self.record("update_entity_status").await)
        }

        async fn update_entity_zones(
            &self,
            _user_id: &str,
            _guid: &str,
            _type_name: &str,
            _ownership: &Ownership,
            _zones: Vec<String>,
            _options: &RequestOptions,
        ) -> Result<()> {
            Err(self.record("update_entity_zones").await)
        }

        async fn remove_entity(
            &self,
            _user_id: &str,
            _guid: &str,
            _type_name: &str,
            _ownership: &Ownership,
            _options: &RequestOptions,
        ) -> Result<Vec<String>> {
            Err(self.record("remove_entity").await)
        }

        async fn get_entity(
            &self,
            _user_id: &str,
            _guid: &str,
            _type_name: &str,
            _supported_zones: &[String],
            _options: &RequestOptions,
        ) -> Result<EntityDetail> {
            Err(self.record("get_entity").await)
        }

        async fn find_entities(
            &self,
            _user_id: &str,
            _type_name: &str,
            _search: &EntitySearch,
            _supported_zones: &[String],
            _paging: Paging,
            _options: &RequestOptions,
        ) -> Result<Vec<EntityDetail>> {
            Err(self.record("find_entities").await)
        }

        async fn create_relationship(
            &self,
            _user_id: &str,
            _request: NewRelationship,
            _options: &RequestOptions,
        ) -> Result<String> {
            Err(self.record("create_relationship").await)
        }

        async fn update_relationship(
            &self,
            _user_id: &str,
            _guid: &str,
            _type_name: &str,
            _update: PropertiesUpdate,
            _options: &RequestOptions,
        ) -> Result<()> {
            Err(self.record("update_relationship").await)
        }

        async fn remove_relationship(
            &self,
            _user_id: &str,
            _guid: &str,
            _type_name: &str,
            _ownership: &Ownership,
            _options: &RequestOptions,
        ) -> Result<()> {
            Err(self.record("remove_relationship").await)
        }

        async fn remove_relationships_between(
            &self,
            _user_id: &str,
            _type_name: &str,
            _end1_guid: &str,
            _end2_guid: &str,
            _ownership: &Ownership,
            _options: &RequestOptions,
        ) -> Result<()> {
            Err(self.record("remove_relationships_between").await)
        }

        async fn get_relationship(
            &self,
            _user_id: &str,
            _guid: &str,
            _type_name: &str,
            _options: &RequestOptions,
        ) -> Result<RelationshipDetail> {
            Err(self.record("get_relationship").await)
        }

        async fn get_relationships(
            &self,
            _user_id: &str,
            _guid: &str,
            _type_name: &str,
            _end: RelationshipEnd,
            _paging: Paging,
            _options: &RequestOptions,
        ) -> Result<Vec<RelationshipDetail>> {
            Err(self.record("get_relationships").await)
        }

        async fn get_relationships_between(
            &self,
            _user_id: &str,
            _type_name: &str,
            _end1_guid: &str,
            _end2_guid: &str,
            _options: &RequestOptions,
        ) -> Result<Vec<RelationshipDetail>> {
            Err(self.record("get_relationships_between").await)
        }
    }

    fn handler_with_mock() -> (ConnectionExchangeHandler, Arc<MockRepository>) {
        let repository = Arc::new(MockRepository::default());
        let context = ExchangeContext::new(
            ExchangeServiceConfig::default(),
            repository.clone(),
            Arc::new(InMemoryExternalIdentifierHandler::new()),
        );
        (ConnectionExchangeHandler::new(&context), repository)
    }

    const GUID: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[tokio::test]
    async fn test_create_without_qualified_name_never_reaches_repository() {
        let (handler, repository) = handler_with_mock();

        let err = handler
            .create_connection("erinoverview", None, false, &ConnectionProperties::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::InvalidParameter { ref parameter, .. } if parameter == "qualifiedName"
        ));

        let blank = EndpointProperties {
            qualified_name: Some("   ".to_string()),
            ..Default::default()
        };
        let err = handler
            .create_endpoint("erinoverview", None, false, &blank)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        assert!(repository.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_replace_update_needs_qualified_name() {
        let (handler, repository) = handler_with_mock();

        let err = handler
            .update_connector_type(
                "erinoverview",
                None,
                GUID,
                false,
                &ConnectorTypeProperties::default(),
                &RequestOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert!(repository.calls.lock().await.is_empty());

        // A merge update goes through to the repository.
        let err = handler
            .update_connector_type(
                "erinoverview",
                None,
                GUID,
                true,
                &ConnectorTypeProperties::default(),
                &RequestOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PropertyServer);
        assert_eq!(*repository.calls.lock().await, vec!["update_entity"]);
    }

    #[tokio::test]
    async fn test_repository_errors_propagate() {
        let (handler, _) = handler_with_mock();

        let err = handler
            .get_connection_by_guid("erinoverview", None, GUID, &RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, ExchangeError::property_server("repository offline"));
    }

    #[tokio::test]
    async fn test_malformed_guids_are_rejected() {
        let (handler, repository) = handler_with_mock();

        let err = handler
            .setup_endpoint(
                "erinoverview",
                None,
                false,
                GUID,
                "not-a-guid",
                None,
                &RequestOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::InvalidParameter { ref parameter, .. } if parameter == "endpointGUID"
        ));

        let err = handler
            .remove_connection("", None, GUID, &RequestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::InvalidParameter { ref parameter, .. } if parameter == "userId"
        ));
        assert!(repository.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_page_size_above_maximum() {
        let (handler, _) = handler_with_mock();

        let err = handler
            .find_connections("erinoverview", None, ".*", 0, 5000, &RequestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::InvalidParameter { ref parameter, .. } if parameter == "pageSize"
        ));
    }
}
