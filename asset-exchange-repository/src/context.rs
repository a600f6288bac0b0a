//! Shared construction context for the exchange handlers.

use std::sync::Arc;

use crate::config::ExchangeServiceConfig;
use crate::interfaces::{ExternalIdentifierHandler, MetadataRepository};
use crate::memory::{InMemoryExternalIdentifierHandler, InMemoryMetadataRepository};

/// Configuration and collaborators handed to every exchange handler.
///
/// Cloning is cheap; all handlers built from the same context share the
/// same collaborators.
#[derive(Clone)]
pub struct ExchangeContext {
    pub config: Arc<ExchangeServiceConfig>,
    pub repository: Arc<dyn MetadataRepository>,
    pub external_identifiers: Arc<dyn ExternalIdentifierHandler>,
}

impl ExchangeContext {
    pub fn new(
        config: ExchangeServiceConfig,
        repository: Arc<dyn MetadataRepository>,
        external_identifiers: Arc<dyn ExternalIdentifierHandler>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            repository,
            external_identifiers,
        }
    }

    /// A context backed by fresh in-memory collaborators.
    pub fn in_memory(config: ExchangeServiceConfig) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryMetadataRepository::new()),
            Arc::new(InMemoryExternalIdentifierHandler::new()),
        )
    }
}
