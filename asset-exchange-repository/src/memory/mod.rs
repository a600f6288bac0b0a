//! In-memory implementation of the exchange collaborators.
//!
//! This module provides concrete implementations of `MetadataRepository`
//! and `ExternalIdentifierHandler` that keep everything in process memory.
//! They back the test suites and can host a single-process exchange.

mod external_identifiers;
mod repository;

pub use external_identifiers::{InMemoryExternalIdentifierHandler, RelationshipChange};
pub use repository::InMemoryMetadataRepository;
