//! Exchange handler for processes, ports and lineage relationships.

use asset_exchange_shared::{
    ControlFlowElement, ControlFlowProperties, DataFlowElement, DataFlowProperties,
    ElementProperties, InstanceStatus, LineageMappingElement, LineageMappingProperties,
    MetadataCorrelationProperties, PortElement, PortProperties, ProcessCallElement,
    ProcessCallProperties, ProcessContainmentProperties, ProcessElement, ProcessProperties,
    ProcessStatus, RelationshipElement, RelationshipProperties, TemplateProperties,
};
use tracing::{debug, info, instrument};

use crate::context::ExchangeContext;
use crate::errors::Result;
use crate::handlers::support::{relationship_event, ExchangeSupport};
use crate::types::{type_names, EntitySearch, Ownership, Paging, RelationshipEnd, RequestOptions};

const NAME_PROPERTIES: &[&str] = &["qualified_name", "display_name"];

/// The two ends of a lineage relationship, with the parameter names used
/// when reporting a bad GUID.
struct LineageEnds<'a> {
    end1_guid: &'a str,
    end1_parameter: &'a str,
    end2_guid: &'a str,
    end2_parameter: &'a str,
}

/// Maintains processes and their ports, and the relationships used to
/// trace lineage through them.
///
/// Lineage relationships (DataFlow, ControlFlow, ProcessCall and
/// LineageMapping) may link any two elements, and several may link the same
/// pair; their optional qualified name tells them apart. Each is created
/// and looked up by its ends but updated and cleared by its own GUID.
pub struct ProcessExchangeHandler {
    support: ExchangeSupport,
}

impl ProcessExchangeHandler {
    pub fn new(context: &ExchangeContext) -> Self {
        Self {
            support: ExchangeSupport::new(context),
        }
    }

    // ---- Processes ----

    /// Create a process in the default zones and return its GUID.
    ///
    /// Without an initial status the process starts active.
    #[instrument(skip_all, fields(user_id = %user_id, asset_manager_is_home, initial_status = ?initial_status))]
    pub async fn create_process(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        initial_status: Option<ProcessStatus>,
        properties: &ProcessProperties,
    ) -> Result<String> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support.validate_qualified_name(properties, false)?;

        let status = initial_status
            .map(InstanceStatus::from)
            .unwrap_or(InstanceStatus::Active);
        let request = self
            .support
            .new_entity(type_names::PROCESS, correlation, asset_manager_is_home, properties)?
            .with_status(status)
            .with_zones(self.support.config.default_zones.clone());
        let guid = self
            .support
            .create_entity(user_id, correlation, request)
            .await?;

        info!(guid = %guid, qualified_name = ?properties.qualified_name, "Created process");
        Ok(guid)
    }

    #[instrument(skip_all, fields(user_id = %user_id, template_guid = %template_guid))]
    pub async fn create_process_from_template(
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
                type_names::PROCESS,
                template_guid,
                template_properties,
                self.support.config.default_zones.clone(),
            )
            .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, process_guid = %process_guid))]
    pub async fn update_process(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        process_guid: &str,
        is_merge_update: bool,
        properties: &ProcessProperties,
        options: &RequestOptions,
    ) -> Result<()> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(process_guid, "processGUID")?;
        self.support
            .validate_qualified_name(properties, is_merge_update)?;

        self.support
            .update_entity(
                user_id,
                correlation,
                process_guid,
                type_names::PROCESS,
                is_merge_update,
                properties,
                options,
            )
            .await
    }

    /// Set the status of a process. Any status may follow any other; an
    /// absent status is recorded as unknown.
    #[instrument(skip_all, fields(user_id = %user_id, process_guid = %process_guid, process_status = ?process_status))]
    pub async fn update_process_status(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        process_guid: &str,
        process_status: Option<ProcessStatus>,
        options: &RequestOptions,
    ) -> Result<()> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(process_guid, "processGUID")?;

        self.support
            .confirm_correlation(user_id, process_guid, type_names::PROCESS, correlation)
            .await?;
        self.support
            .repository
            .update_entity_status(
                user_id,
                process_guid,
                type_names::PROCESS,
                &Ownership::for_update(correlation),
                InstanceStatus::from(process_status.unwrap_or_default()),
                options,
            )
            .await
    }

    /// Make `child_process_guid` a sub-process of `parent_process_guid`.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(user_id = %user_id, parent_process_guid = %parent_process_guid, child_process_guid = %child_process_guid))]
    pub async fn setup_process_parent(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        parent_process_guid: &str,
        child_process_guid: &str,
        properties: Option<&ProcessContainmentProperties>,
        options: &RequestOptions,
    ) -> Result<()> {
        self.validate_pair(
            user_id,
            parent_process_guid,
            "parentProcessGUID",
            child_process_guid,
            "childProcessGUID",
        )?;

        self.support
            .relate_once(
                user_id,
                correlation,
                asset_manager_is_home,
                type_names::PROCESS_HIERARCHY,
                parent_process_guid,
                child_process_guid,
                properties,
                options,
            )
            .await?;
        Ok(())
    }

    #[instrument(skip_all, fields(user_id = %user_id, parent_process_guid = %parent_process_guid, child_process_guid = %child_process_guid))]
    pub async fn clear_process_parent(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        parent_process_guid: &str,
        child_process_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.validate_pair(
            user_id,
            parent_process_guid,
            "parentProcessGUID",
            child_process_guid,
            "childProcessGUID",
        )?;

        self.support
            .unrelate(
                user_id,
                correlation,
                type_names::PROCESS_HIERARCHY,
                parent_process_guid,
                child_process_guid,
                options,
            )
            .await
    }

    /// Move a process into the publish zones.
    #[instrument(skip_all, fields(user_id = %user_id, process_guid = %process_guid))]
    pub async fn publish_process(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        process_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        let zones = self.support.config.publish_zones.clone();
        self.change_zones(user_id, correlation, process_guid, zones, options)
            .await
    }

    /// Move a process back into the default zones.
    #[instrument(skip_all, fields(user_id = %user_id, process_guid = %process_guid))]
    pub async fn withdraw_process(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        process_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        let zones = self.support.config.default_zones.clone();
        self.change_zones(user_id, correlation, process_guid, zones, options)
            .await
    }

    /// Remove a process together with its ports.
    #[instrument(skip_all, fields(user_id = %user_id, process_guid = %process_guid))]
    pub async fn remove_process(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        process_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.support
            .remove_element(
                user_id,
                correlation,
                type_names::PROCESS,
                process_guid,
                "processGUID",
                options,
            )
            .await
    }

    pub async fn find_processes(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        search_string: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<ProcessElement>> {
        self.support
            .find_by_search_string(
                user_id,
                correlation,
                type_names::PROCESS,
                search_string,
                start_from,
                page_size,
                options,
            )
            .await
    }

    /// Processes correlated with the calling asset manager, or `None` when
    /// it has none.
    pub async fn get_processes_for_asset_manager(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Option<Vec<ProcessElement>>> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        let paging = self.support.paging(start_from, page_size)?;

        self.support
            .elements_for_asset_manager(user_id, correlation, type_names::PROCESS, paging, options)
            .await
    }

    pub async fn get_processes_by_name(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        name: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<ProcessElement>> {
        self.support
            .find_by_value(
                user_id,
                correlation,
                type_names::PROCESS,
                name,
                "name",
                NAME_PROPERTIES,
                start_from,
                page_size,
                options,
            )
            .await
    }

    pub async fn get_process_by_guid(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        process_guid: &str,
        options: &RequestOptions,
    ) -> Result<ProcessElement> {
        self.support
            .element_by_guid(
                user_id,
                correlation,
                type_names::PROCESS,
                process_guid,
                "processGUID",
                options,
            )
            .await
    }

    /// The process that `process_guid` is a sub-process of, if any.
    pub async fn get_process_parent(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        process_guid: &str,
        options: &RequestOptions,
    ) -> Result<Option<ProcessElement>> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(process_guid, "processGUID")?;

        let parents = self
            .support
            .related_elements(
                user_id,
                correlation,
                process_guid,
                type_names::PROCESS_HIERARCHY,
                RelationshipEnd::End2,
                type_names::PROCESS,
                Paging::new(0, 1),
                options,
            )
            .await?;
        Ok(parents.into_iter().next())
    }

    pub async fn get_sub_processes(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        process_guid: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<ProcessElement>> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(process_guid, "processGUID")?;
        let paging = self.support.paging(start_from, page_size)?;

        self.support
            .related_elements(
                user_id,
                correlation,
                process_guid,
                type_names::PROCESS_HIERARCHY,
                RelationshipEnd::End1,
                type_names::PROCESS,
                paging,
                options,
            )
            .await
    }

    // ---- Ports ----

    /// Create a port belonging to a process. The port is removed with the
    /// process.
    #[instrument(skip_all, fields(user_id = %user_id, process_guid = %process_guid))]
    pub async fn create_port(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        process_guid: &str,
        properties: &PortProperties,
    ) -> Result<String> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(process_guid, "processGUID")?;
        self.support.validate_qualified_name(properties, false)?;

        self.support
            .entity(
                user_id,
                process_guid,
                type_names::PROCESS,
                "processGUID",
                &RequestOptions::default(),
            )
            .await?;

        let request = self
            .support
            .new_entity(type_names::PORT, correlation, asset_manager_is_home, properties)?
            .with_anchor(Some(process_guid.to_string()));
        let guid = self
            .support
            .create_entity(user_id, correlation, request)
            .await?;

        info!(guid = %guid, port_type = ?properties.port_type, "Created port");
        Ok(guid)
    }

    #[instrument(skip_all, fields(user_id = %user_id, port_guid = %port_guid))]
    pub async fn update_port(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        port_guid: &str,
        is_merge_update: bool,
        properties: &PortProperties,
        options: &RequestOptions,
    ) -> Result<()> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(port_guid, "portGUID")?;
        self.support
            .validate_qualified_name(properties, is_merge_update)?;

        self.support
            .update_entity(
                user_id,
                correlation,
                port_guid,
                type_names::PORT,
                is_merge_update,
                properties,
                options,
            )
            .await
    }

    /// Record that `port_guid` delegates to `delegated_port_guid`.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(user_id = %user_id, port_guid = %port_guid, delegated_port_guid = %delegated_port_guid))]
    pub async fn setup_port_delegation(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        port_guid: &str,
        delegated_port_guid: &str,
        properties: Option<&RelationshipProperties>,
        options: &RequestOptions,
    ) -> Result<()> {
        self.validate_pair(user_id, port_guid, "portGUID", delegated_port_guid, "delegatedPortGUID")?;

        self.support
            .relate_once(
                user_id,
                correlation,
                asset_manager_is_home,
                type_names::PORT_DELEGATION,
                port_guid,
                delegated_port_guid,
                properties,
                options,
            )
            .await?;
        Ok(())
    }

    #[instrument(skip_all, fields(user_id = %user_id, port_guid = %port_guid, delegated_port_guid = %delegated_port_guid))]
    pub async fn clear_port_delegation(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        port_guid: &str,
        delegated_port_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.validate_pair(user_id, port_guid, "portGUID", delegated_port_guid, "delegatedPortGUID")?;

        self.support
            .unrelate(
                user_id,
                correlation,
                type_names::PORT_DELEGATION,
                port_guid,
                delegated_port_guid,
                options,
            )
            .await
    }

    /// Link a port to the schema type describing the data passing through
    /// it.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(user_id = %user_id, port_guid = %port_guid, schema_type_guid = %schema_type_guid))]
    pub async fn setup_port_schema_type(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        port_guid: &str,
        schema_type_guid: &str,
        properties: Option<&RelationshipProperties>,
        options: &RequestOptions,
    ) -> Result<()> {
        self.validate_pair(user_id, port_guid, "portGUID", schema_type_guid, "schemaTypeGUID")?;

        self.support
            .relate_once(
                user_id,
                correlation,
                asset_manager_is_home,
                type_names::PORT_SCHEMA,
                port_guid,
                schema_type_guid,
                properties,
                options,
            )
            .await?;
        Ok(())
    }

    #[instrument(skip_all, fields(user_id = %user_id, port_guid = %port_guid, schema_type_guid = %schema_type_guid))]
    pub async fn clear_port_schema_type(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        port_guid: &str,
        schema_type_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.validate_pair(user_id, port_guid, "portGUID", schema_type_guid, "schemaTypeGUID")?;

        self.support
            .unrelate(
                user_id,
                correlation,
                type_names::PORT_SCHEMA,
                port_guid,
                schema_type_guid,
                options,
            )
            .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, port_guid = %port_guid))]
    pub async fn remove_port(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        port_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.support
            .remove_element(user_id, correlation, type_names::PORT, port_guid, "portGUID", options)
            .await
    }

    pub async fn find_ports(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        search_string: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<PortElement>> {
        self.support
            .find_by_search_string(
                user_id,
                correlation,
                type_names::PORT,
                search_string,
                start_from,
                page_size,
                options,
            )
            .await
    }

    /// Ports belonging to a process.
    pub async fn get_ports_for_process(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        process_guid: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<PortElement>> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(process_guid, "processGUID")?;
        let paging = self.support.paging(start_from, page_size)?;

        self.support
            .find_elements(
                user_id,
                correlation,
                type_names::PORT,
                &EntitySearch::Anchored(process_guid.to_string()),
                paging,
                options,
            )
            .await
    }

    /// Ports that delegate to `port_guid`.
    pub async fn get_port_uses(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        port_guid: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<PortElement>> {
        self.ports_by_delegation(
            user_id,
            correlation,
            port_guid,
            RelationshipEnd::End2,
            start_from,
            page_size,
            options,
        )
        .await
    }

    /// Ports that `port_guid` delegates to.
    pub async fn get_port_delegations(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        port_guid: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<PortElement>> {
        self.ports_by_delegation(
            user_id,
            correlation,
            port_guid,
            RelationshipEnd::End1,
            start_from,
            page_size,
            options,
        )
        .await
    }

    pub async fn get_ports_by_name(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        name: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<PortElement>> {
        self.support
            .find_by_value(
                user_id,
                correlation,
                type_names::PORT,
                name,
                "name",
                NAME_PROPERTIES,
                start_from,
                page_size,
                options,
            )
            .await
    }

    pub async fn get_port_by_guid(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        port_guid: &str,
        options: &RequestOptions,
    ) -> Result<PortElement> {
        self.support
            .element_by_guid(user_id, correlation, type_names::PORT, port_guid, "portGUID", options)
            .await
    }

    // ---- Data flow ----

    /// Record that data flows from `data_supplier_guid` to
    /// `data_consumer_guid`, returning the relationship GUID.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(user_id = %user_id, data_supplier_guid = %data_supplier_guid, data_consumer_guid = %data_consumer_guid))]
    pub async fn setup_data_flow(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        data_supplier_guid: &str,
        data_consumer_guid: &str,
        properties: Option<&DataFlowProperties>,
        options: &RequestOptions,
    ) -> Result<String> {
        self.setup_lineage(
            user_id,
            correlation,
            asset_manager_is_home,
            type_names::DATA_FLOW,
            Self::data_flow_ends(data_supplier_guid, data_consumer_guid),
            properties,
            options,
        )
        .await
    }

    pub async fn get_data_flow(
        &self,
        user_id: &str,
        data_supplier_guid: &str,
        data_consumer_guid: &str,
        qualified_name: Option<&str>,
        options: &RequestOptions,
    ) -> Result<Option<DataFlowElement>> {
        self.lineage_between(
            user_id,
            type_names::DATA_FLOW,
            Self::data_flow_ends(data_supplier_guid, data_consumer_guid),
            qualified_name,
            options,
        )
        .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, data_flow_guid = %data_flow_guid))]
    pub async fn update_data_flow(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        data_flow_guid: &str,
        is_merge_update: bool,
        properties: &DataFlowProperties,
        options: &RequestOptions,
    ) -> Result<()> {
        self.update_lineage(
            user_id,
            correlation,
            type_names::DATA_FLOW,
            data_flow_guid,
            "dataFlowGUID",
            is_merge_update,
            properties,
            options,
        )
        .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, data_flow_guid = %data_flow_guid))]
    pub async fn clear_data_flow(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        data_flow_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.clear_lineage(
            user_id,
            correlation,
            type_names::DATA_FLOW,
            data_flow_guid,
            "dataFlowGUID",
            options,
        )
        .await
    }

    /// Data flows leaving a supplier.
    pub async fn get_data_flow_consumers(
        &self,
        user_id: &str,
        data_supplier_guid: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<DataFlowElement>> {
        self.lineage_from(
            user_id,
            type_names::DATA_FLOW,
            data_supplier_guid,
            "dataSupplierGUID",
            RelationshipEnd::End1,
            start_from,
            page_size,
            options,
        )
        .await
    }

    /// Data flows arriving at a consumer.
    pub async fn get_data_flow_suppliers(
        &self,
        user_id: &str,
        data_consumer_guid: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<DataFlowElement>> {
        self.lineage_from(
            user_id,
            type_names::DATA_FLOW,
            data_consumer_guid,
            "dataConsumerGUID",
            RelationshipEnd::End2,
            start_from,
            page_size,
            options,
        )
        .await
    }

    // ---- Control flow ----

    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(user_id = %user_id, current_step_guid = %current_step_guid, next_step_guid = %next_step_guid))]
    pub async fn setup_control_flow(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        current_step_guid: &str,
        next_step_guid: &str,
        properties: Option<&ControlFlowProperties>,
        options: &RequestOptions,
    ) -> Result<String> {
        self.setup_lineage(
            user_id,
            correlation,
            asset_manager_is_home,
            type_names::CONTROL_FLOW,
            Self::control_flow_ends(current_step_guid, next_step_guid),
            properties,
            options,
        )
        .await
    }

    pub async fn get_control_flow(
        &self,
        user_id: &str,
        current_step_guid: &str,
        next_step_guid: &str,
        qualified_name: Option<&str>,
        options: &RequestOptions,
    ) -> Result<Option<ControlFlowElement>> {
        self.lineage_between(
            user_id,
            type_names::CONTROL_FLOW,
            Self::control_flow_ends(current_step_guid, next_step_guid),
            qualified_name,
            options,
        )
        .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, control_flow_guid = %control_flow_guid))]
    pub async fn update_control_flow(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        control_flow_guid: &str,
        is_merge_update: bool,
        properties: &ControlFlowProperties,
        options: &RequestOptions,
    ) -> Result<()> {
        self.update_lineage(
            user_id,
            correlation,
            type_names::CONTROL_FLOW,
            control_flow_guid,
            "controlFlowGUID",
            is_merge_update,
            properties,
            options,
        )
        .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, control_flow_guid = %control_flow_guid))]
    pub async fn clear_control_flow(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        control_flow_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.clear_lineage(
            user_id,
            correlation,
            type_names::CONTROL_FLOW,
            control_flow_guid,
            "controlFlowGUID",
            options,
        )
        .await
    }

    pub async fn get_control_flow_next_steps(
        &self,
        user_id: &str,
        current_step_guid: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<ControlFlowElement>> {
        self.lineage_from(
            user_id,
            type_names::CONTROL_FLOW,
            current_step_guid,
            "currentStepGUID",
            RelationshipEnd::End1,
            start_from,
            page_size,
            options,
        )
        .await
    }

    pub async fn get_control_flow_previous_steps(
        &self,
        user_id: &str,
        current_step_guid: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<ControlFlowElement>> {
        self.lineage_from(
            user_id,
            type_names::CONTROL_FLOW,
            current_step_guid,
            "currentStepGUID",
            RelationshipEnd::End2,
            start_from,
            page_size,
            options,
        )
        .await
    }

    // ---- Process call ----

    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(user_id = %user_id, caller_guid = %caller_guid, called_guid = %called_guid))]
    pub async fn setup_process_call(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        caller_guid: &str,
        called_guid: &str,
        properties: Option<&ProcessCallProperties>,
        options: &RequestOptions,
    ) -> Result<String> {
        self.setup_lineage(
            user_id,
            correlation,
            asset_manager_is_home,
            type_names::PROCESS_CALL,
            Self::process_call_ends(caller_guid, called_guid),
            properties,
            options,
        )
        .await
    }

    pub async fn get_process_call(
        &self,
        user_id: &str,
        caller_guid: &str,
        called_guid: &str,
        qualified_name: Option<&str>,
        options: &RequestOptions,
    ) -> Result<Option<ProcessCallElement>> {
        self.lineage_between(
            user_id,
            type_names::PROCESS_CALL,
            Self::process_call_ends(caller_guid, called_guid),
            qualified_name,
            options,
        )
        .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, process_call_guid = %process_call_guid))]
    pub async fn update_process_call(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        process_call_guid: &str,
        is_merge_update: bool,
        properties: &ProcessCallProperties,
        options: &RequestOptions,
    ) -> Result<()> {
        self.update_lineage(
            user_id,
            correlation,
            type_names::PROCESS_CALL,
            process_call_guid,
            "processCallGUID",
            is_merge_update,
            properties,
            options,
        )
        .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, process_call_guid = %process_call_guid))]
    pub async fn clear_process_call(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        process_call_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.clear_lineage(
            user_id,
            correlation,
            type_names::PROCESS_CALL,
            process_call_guid,
            "processCallGUID",
            options,
        )
        .await
    }

    /// Calls made by `caller_guid`.
    pub async fn get_processes_called(
        &self,
        user_id: &str,
        caller_guid: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<ProcessCallElement>> {
        self.lineage_from(
            user_id,
            type_names::PROCESS_CALL,
            caller_guid,
            "callerGUID",
            RelationshipEnd::End1,
            start_from,
            page_size,
            options,
        )
        .await
    }

    /// Calls received by `called_guid`.
    pub async fn get_process_callers(
        &self,
        user_id: &str,
        called_guid: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<ProcessCallElement>> {
        self.lineage_from(
            user_id,
            type_names::PROCESS_CALL,
            called_guid,
            "calledGUID",
            RelationshipEnd::End2,
            start_from,
            page_size,
            options,
        )
        .await
    }

    // ---- Lineage mapping ----

    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(user_id = %user_id, source_element_guid = %source_element_guid, destination_element_guid = %destination_element_guid))]
    pub async fn setup_lineage_mapping(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        source_element_guid: &str,
        destination_element_guid: &str,
        properties: Option<&LineageMappingProperties>,
        options: &RequestOptions,
    ) -> Result<String> {
        self.setup_lineage(
            user_id,
            correlation,
            asset_manager_is_home,
            type_names::LINEAGE_MAPPING,
            Self::lineage_mapping_ends(source_element_guid, destination_element_guid),
            properties,
            options,
        )
        .await
    }

    pub async fn get_lineage_mapping(
        &self,
        user_id: &str,
        source_element_guid: &str,
        destination_element_guid: &str,
        qualified_name: Option<&str>,
        options: &RequestOptions,
    ) -> Result<Option<LineageMappingElement>> {
        self.lineage_between(
            user_id,
            type_names::LINEAGE_MAPPING,
            Self::lineage_mapping_ends(source_element_guid, destination_element_guid),
            qualified_name,
            options,
        )
        .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, lineage_mapping_guid = %lineage_mapping_guid))]
    pub async fn update_lineage_mapping(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        lineage_mapping_guid: &str,
        is_merge_update: bool,
        properties: &LineageMappingProperties,
        options: &RequestOptions,
    ) -> Result<()> {
        self.update_lineage(
            user_id,
            correlation,
            type_names::LINEAGE_MAPPING,
            lineage_mapping_guid,
            "lineageMappingGUID",
            is_merge_update,
            properties,
            options,
        )
        .await
    }

    #[instrument(skip_all, fields(user_id = %user_id, lineage_mapping_guid = %lineage_mapping_guid))]
    pub async fn clear_lineage_mapping(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        lineage_mapping_guid: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.clear_lineage(
            user_id,
            correlation,
            type_names::LINEAGE_MAPPING,
            lineage_mapping_guid,
            "lineageMappingGUID",
            options,
        )
        .await
    }

    /// Mappings from `source_element_guid` to its destinations.
    pub async fn get_destination_lineage_mappings(
        &self,
        user_id: &str,
        source_element_guid: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<LineageMappingElement>> {
        self.lineage_from(
            user_id,
            type_names::LINEAGE_MAPPING,
            source_element_guid,
            "sourceElementGUID",
            RelationshipEnd::End1,
            start_from,
            page_size,
            options,
        )
        .await
    }

    /// Mappings into `destination_element_guid` from its sources.
    pub async fn get_source_lineage_mappings(
        &self,
        user_id: &str,
        destination_element_guid: &str,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<LineageMappingElement>> {
        self.lineage_from(
            user_id,
            type_names::LINEAGE_MAPPING,
            destination_element_guid,
            "destinationElementGUID",
            RelationshipEnd::End2,
            start_from,
            page_size,
            options,
        )
        .await
    }

    // ---- Shared steps ----

    fn data_flow_ends<'a>(supplier: &'a str, consumer: &'a str) -> LineageEnds<'a> {
        LineageEnds {
            end1_guid: supplier,
            end1_parameter: "dataSupplierGUID",
            end2_guid: consumer,
            end2_parameter: "dataConsumerGUID",
        }
    }

    fn control_flow_ends<'a>(current_step: &'a str, next_step: &'a str) -> LineageEnds<'a> {
        LineageEnds {
            end1_guid: current_step,
            end1_parameter: "currentStepGUID",
            end2_guid: next_step,
            end2_parameter: "nextStepGUID",
        }
    }

    fn process_call_ends<'a>(caller: &'a str, called: &'a str) -> LineageEnds<'a> {
        LineageEnds {
            end1_guid: caller,
            end1_parameter: "callerGUID",
            end2_guid: called,
            end2_parameter: "calledGUID",
        }
    }

    fn lineage_mapping_ends<'a>(source: &'a str, destination: &'a str) -> LineageEnds<'a> {
        LineageEnds {
            end1_guid: source,
            end1_parameter: "sourceElementGUID",
            end2_guid: destination,
            end2_parameter: "destinationElementGUID",
        }
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

    async fn change_zones(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        process_guid: &str,
        zones: Vec<String>,
        options: &RequestOptions,
    ) -> Result<()> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(process_guid, "processGUID")?;

        self.support
            .confirm_correlation(user_id, process_guid, type_names::PROCESS, correlation)
            .await?;

        info!(process_guid = %process_guid, zones = ?zones, "Changing process zones");
        self.support
            .repository
            .update_entity_zones(
                user_id,
                process_guid,
                type_names::PROCESS,
                &Ownership::for_update(correlation),
                zones,
                options,
            )
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn ports_by_delegation(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        port_guid: &str,
        end: RelationshipEnd,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<PortElement>> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(port_guid, "portGUID")?;
        let paging = self.support.paging(start_from, page_size)?;

        self.support
            .related_elements(
                user_id,
                correlation,
                port_guid,
                type_names::PORT_DELEGATION,
                end,
                type_names::PORT,
                paging,
                options,
            )
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn setup_lineage<P: ElementProperties>(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        asset_manager_is_home: bool,
        type_name: &str,
        ends: LineageEnds<'_>,
        properties: Option<&P>,
        options: &RequestOptions,
    ) -> Result<String> {
        self.validate_pair(
            user_id,
            ends.end1_guid,
            ends.end1_parameter,
            ends.end2_guid,
            ends.end2_parameter,
        )?;

        let guid = self
            .support
            .relate(
                user_id,
                correlation,
                asset_manager_is_home,
                type_name,
                ends.end1_guid,
                ends.end2_guid,
                properties,
                options,
            )
            .await?;

        self.support
            .external_identifiers
            .log_relationship_creation(
                user_id,
                relationship_event(correlation, type_name, Some(guid.as_str()), ends.end1_guid, ends.end2_guid),
            )
            .await?;
        Ok(guid)
    }

    async fn lineage_between<P: ElementProperties>(
        &self,
        user_id: &str,
        type_name: &str,
        ends: LineageEnds<'_>,
        qualified_name: Option<&str>,
        options: &RequestOptions,
    ) -> Result<Option<RelationshipElement<P>>> {
        self.validate_pair(
            user_id,
            ends.end1_guid,
            ends.end1_parameter,
            ends.end2_guid,
            ends.end2_parameter,
        )?;

        self.support
            .relationship_between(
                user_id,
                type_name,
                ends.end1_guid,
                ends.end2_guid,
                qualified_name,
                options,
            )
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn update_lineage<P: ElementProperties>(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        type_name: &str,
        guid: &str,
        parameter_name: &str,
        is_merge_update: bool,
        properties: &P,
        options: &RequestOptions,
    ) -> Result<()> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(guid, parameter_name)?;

        let relationship = self
            .support
            .repository
            .get_relationship(user_id, guid, type_name, options)
            .await?;
        self.support
            .update_relationship(
                user_id,
                correlation,
                guid,
                type_name,
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
                    type_name,
                    Some(guid),
                    &relationship.end1_guid,
                    &relationship.end2_guid,
                ),
            )
            .await
    }

    async fn clear_lineage(
        &self,
        user_id: &str,
        correlation: Option<&MetadataCorrelationProperties>,
        type_name: &str,
        guid: &str,
        parameter_name: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(guid, parameter_name)?;

        let relationship = self
            .support
            .repository
            .get_relationship(user_id, guid, type_name, options)
            .await?;
        self.support
            .remove_relationship(user_id, correlation, guid, type_name, options)
            .await?;

        self.support
            .external_identifiers
            .log_relationship_removal(
                user_id,
                relationship_event(
                    correlation,
                    type_name,
                    Some(guid),
                    &relationship.end1_guid,
                    &relationship.end2_guid,
                ),
            )
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn lineage_from<P: ElementProperties>(
        &self,
        user_id: &str,
        type_name: &str,
        guid: &str,
        parameter_name: &str,
        end: RelationshipEnd,
        start_from: usize,
        page_size: usize,
        options: &RequestOptions,
    ) -> Result<Vec<RelationshipElement<P>>> {
        self.support.invalid_parameters.validate_user_id(user_id)?;
        self.support
            .invalid_parameters
            .validate_guid(guid, parameter_name)?;
        let paging = self.support.paging(start_from, page_size)?;

        let relationships = self
            .support
            .relationships(user_id, guid, type_name, end, paging, options)
            .await?;
        debug!(type_name = %type_name, guid = %guid, count = relationships.len(), "Traversed lineage");
        Ok(relationships)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExchangeServiceConfig;
    use crate::errors::{ErrorKind, ExchangeError};

    fn handler(config: ExchangeServiceConfig) -> ProcessExchangeHandler {
        ProcessExchangeHandler::new(&ExchangeContext::in_memory(config))
    }

    fn process(name: &str) -> ProcessProperties {
        ProcessProperties {
            qualified_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn port(name: &str) -> PortProperties {
        PortProperties {
            qualified_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_process_status_has_no_transition_order() {
        let handler = handler(ExchangeServiceConfig::default());
        let options = RequestOptions::default();
        let guid = handler
            .create_process("erinoverview", None, false, Some(ProcessStatus::Draft), &process("p1"))
            .await
            .unwrap();

        for status in [
            ProcessStatus::Active,
            ProcessStatus::Draft,
            ProcessStatus::Approved,
            ProcessStatus::Proposed,
        ] {
            handler
                .update_process_status("erinoverview", None, &guid, Some(status), &options)
                .await
                .unwrap();
            let element = handler
                .get_process_by_guid("erinoverview", None, &guid, &options)
                .await
                .unwrap();
            assert_eq!(ProcessStatus::from(element.header.status), status);
        }

        handler
            .update_process_status("erinoverview", None, &guid, None, &options)
            .await
            .unwrap();
        let element = handler
            .get_process_by_guid("erinoverview", None, &guid, &options)
            .await
            .unwrap();
        assert_eq!(element.header.status, InstanceStatus::Unknown);
    }

    #[tokio::test]
    async fn test_publish_and_withdraw_move_zones() {
        let config = ExchangeServiceConfig::default().with_zones(
            Vec::new(),
            vec!["quarantine".to_string()],
            vec!["data-lake".to_string()],
        );
        let handler = handler(config);
        let options = RequestOptions::default();
        let guid = handler
            .create_process("erinoverview", None, false, None, &process("p1"))
            .await
            .unwrap();

        let element = handler
            .get_process_by_guid("erinoverview", None, &guid, &options)
            .await
            .unwrap();
        assert_eq!(element.header.zones, vec!["quarantine".to_string()]);
        assert_eq!(element.header.status, InstanceStatus::Active);

        handler
            .publish_process("erinoverview", None, &guid, &options)
            .await
            .unwrap();
        let element = handler
            .get_process_by_guid("erinoverview", None, &guid, &options)
            .await
            .unwrap();
        assert_eq!(element.header.zones, vec!["data-lake".to_string()]);

        handler
            .withdraw_process("erinoverview", None, &guid, &options)
            .await
            .unwrap();
        let element = handler
            .get_process_by_guid("erinoverview", None, &guid, &options)
            .await
            .unwrap();
        assert_eq!(element.header.zones, vec!["quarantine".to_string()]);
    }

    #[tokio::test]
    async fn test_port_needs_a_process() {
        let handler = handler(ExchangeServiceConfig::default());
        let err = handler
            .create_port(
                "erinoverview",
                None,
                false,
                "550e8400-e29b-41d4-a716-446655440000",
                &port("port-1"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::InvalidParameter { ref parameter, .. } if parameter == "processGUID"
        ));
    }

    #[tokio::test]
    async fn test_removing_process_removes_ports() {
        let handler = handler(ExchangeServiceConfig::default());
        let options = RequestOptions::default();
        let process_guid = handler
            .create_process("erinoverview", None, false, None, &process("p1"))
            .await
            .unwrap();
        let port_guid = handler
            .create_port("erinoverview", None, false, &process_guid, &port("port-1"))
            .await
            .unwrap();

        let ports = handler
            .get_ports_for_process("erinoverview", None, &process_guid, 0, 0, &options)
            .await
            .unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].guid(), port_guid);

        handler
            .remove_process("erinoverview", None, &process_guid, &options)
            .await
            .unwrap();
        let err = handler
            .get_port_by_guid("erinoverview", None, &port_guid, &options)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[tokio::test]
    async fn test_process_hierarchy() {
        let handler = handler(ExchangeServiceConfig::default());
        let options = RequestOptions::default();
        let parent = handler
            .create_process("erinoverview", None, false, None, &process("parent"))
            .await
            .unwrap();
        let child = handler
            .create_process("erinoverview", None, false, None, &process("child"))
            .await
            .unwrap();

        handler
            .setup_process_parent("erinoverview", None, false, &parent, &child, None, &options)
            .await
            .unwrap();
        // Linking the same pair twice keeps one relationship.
        handler
            .setup_process_parent("erinoverview", None, false, &parent, &child, None, &options)
            .await
            .unwrap();

        let subs = handler
            .get_sub_processes("erinoverview", None, &parent, 0, 0, &options)
            .await
            .unwrap();
        assert_eq!(subs.len(), 1);
        let found = handler
            .get_process_parent("erinoverview", None, &child, &options)
            .await
            .unwrap();
        assert_eq!(found.map(|p| p.header.guid), Some(parent.clone()));

        handler
            .clear_process_parent("erinoverview", None, &parent, &child, &options)
            .await
            .unwrap();
        assert!(handler
            .get_process_parent("erinoverview", None, &child, &options)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_port_delegation_both_directions() {
        let handler = handler(ExchangeServiceConfig::default());
        let options = RequestOptions::default();
        let process_guid = handler
            .create_process("erinoverview", None, false, None, &process("p1"))
            .await
            .unwrap();
        let outer = handler
            .create_port("erinoverview", None, false, &process_guid, &port("outer"))
            .await
            .unwrap();
        let inner = handler
            .create_port("erinoverview", None, false, &process_guid, &port("inner"))
            .await
            .unwrap();

        handler
            .setup_port_delegation("erinoverview", None, false, &outer, &inner, None, &options)
            .await
            .unwrap();

        let delegations = handler
            .get_port_delegations("erinoverview", None, &outer, 0, 0, &options)
            .await
            .unwrap();
        assert_eq!(delegations[0].guid(), inner);
        let uses = handler
            .get_port_uses("erinoverview", None, &inner, 0, 0, &options)
            .await
            .unwrap();
        assert_eq!(uses[0].guid(), outer);
    }
}
