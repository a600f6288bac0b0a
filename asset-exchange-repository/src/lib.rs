//! # Asset Exchange Repository
//!
//! This crate provides the exchange handlers an external asset manager uses
//! to synchronize connections, external references and processes with open
//! metadata. It includes definitions for errors, the collaborator
//! interfaces, and in-memory implementations of those collaborators.

pub mod config;
pub mod context;
pub mod errors;
pub mod handlers;
pub mod interfaces;
pub mod memory;
pub mod types;
pub mod validation;

pub use config::ExchangeServiceConfig;
pub use context::ExchangeContext;
pub use errors::{ErrorKind, ExchangeError, Result};
pub use handlers::{
    ConnectionExchangeHandler, ExternalReferenceExchangeHandler, ProcessExchangeHandler,
};
pub use interfaces::{
    AllowAllSecurityVerifier, ExternalIdentifierHandler, MetadataRepository, RelationshipEvent,
    SecurityVerifier,
};
pub use memory::{InMemoryExternalIdentifierHandler, InMemoryMetadataRepository, RelationshipChange};
pub use types::{
    type_names, EntityDetail, EntitySearch, NewEntity, NewRelationship, Ownership, Paging,
    PropertiesUpdate, RelationshipDetail, RelationshipEnd, RequestOptions,
};
pub use validation::InvalidParameterHandler;
