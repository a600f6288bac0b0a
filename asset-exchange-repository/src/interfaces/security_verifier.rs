//! Security verifier trait definition.

use crate::errors::Result;
use crate::types::EntityDetail;

/// Authorization checks consulted by the generic metadata layer.
///
/// Every check allows the request unless overridden. A failing check
/// should return `ExchangeError::NotAuthorized`.
pub trait SecurityVerifier: Send + Sync {
    /// Check the user may create an entity of the given type.
    fn validate_user_for_entity_create(&self, _user_id: &str, _type_name: &str) -> Result<()> {
        Ok(())
    }

    /// Check the user may read the entity. Entities failing this check are
    /// left out of search results.
    fn validate_user_for_entity_read(&self, _user_id: &str, _entity: &EntityDetail) -> Result<()> {
        Ok(())
    }

    /// Check the user may change or remove the entity.
    fn validate_user_for_entity_update(
        &self,
        _user_id: &str,
        _entity: &EntityDetail,
    ) -> Result<()> {
        Ok(())
    }
}

/// Verifier that allows every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllSecurityVerifier;

impl SecurityVerifier for AllowAllSecurityVerifier {}
