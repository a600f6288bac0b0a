//! Interface definitions for the collaborators of the exchange handlers.
//!
//! The exchange handlers never touch storage directly. They call through
//! these traits so the generic metadata layer, the correlation store and
//! the security checks can be swapped or mocked.

mod external_identifier_handler;
mod metadata_repository;
mod security_verifier;

pub use external_identifier_handler::{ExternalIdentifierHandler, RelationshipEvent};
pub use metadata_repository::MetadataRepository;
pub use security_verifier::{AllowAllSecurityVerifier, SecurityVerifier};
