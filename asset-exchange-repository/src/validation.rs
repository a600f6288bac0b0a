//! Parameter validation shared by the exchange handlers.

use regex::Regex;
use uuid::Uuid;

use crate::errors::{ExchangeError, Result};
use crate::types::Paging;

/// Validates request parameters before any collaborator is called.
///
/// Every failure is an `ExchangeError::InvalidParameter` naming the
/// offending parameter.
#[derive(Debug, Clone, Copy)]
pub struct InvalidParameterHandler {
    max_page_size: usize,
}

impl InvalidParameterHandler {
    /// Create a validator enforcing the given page size limit (0 = unlimited).
    pub fn new(max_page_size: usize) -> Self {
        Self { max_page_size }
    }

    /// The calling user must be named.
    pub fn validate_user_id(&self, user_id: &str) -> Result<()> {
        if user_id.trim().is_empty() {
            return Err(ExchangeError::invalid_parameter(
                "userId",
                "a user identifier is required",
            ));
        }
        Ok(())
    }

    /// The GUID must be present and well formed.
    pub fn validate_guid(&self, guid: &str, parameter_name: &str) -> Result<()> {
        if guid.trim().is_empty() {
            return Err(ExchangeError::invalid_parameter(
                parameter_name,
                "a unique identifier is required",
            ));
        }
        Uuid::parse_str(guid).map_err(|e| {
            ExchangeError::invalid_parameter(
                parameter_name,
                format!("{} is not a valid unique identifier: {}", guid, e),
            )
        })?;
        Ok(())
    }

    /// The name must be present and not blank.
    pub fn validate_name(&self, name: Option<&str>, parameter_name: &str) -> Result<()> {
        match name {
            Some(name) if !name.trim().is_empty() => Ok(()),
            _ => Err(ExchangeError::invalid_parameter(
                parameter_name,
                "a non-blank value is required",
            )),
        }
    }

    /// The object must be supplied.
    pub fn validate_object<'a, T>(&self, object: Option<&'a T>, parameter_name: &str) -> Result<&'a T> {
        object.ok_or_else(|| ExchangeError::invalid_parameter(parameter_name, "a value is required"))
    }

    /// The search string must be a non-blank regular expression.
    pub fn validate_search_string(&self, search_string: &str, parameter_name: &str) -> Result<()> {
        self.validate_name(Some(search_string), parameter_name)?;
        Regex::new(search_string).map_err(|e| {
            ExchangeError::invalid_parameter(
                parameter_name,
                format!("{} is not a valid regular expression: {}", search_string, e),
            )
        })?;
        Ok(())
    }

    /// Resolve a page request against the configured limit.
    ///
    /// A `page_size` of zero asks for the largest page allowed.
    pub fn validate_paging(&self, start_from: usize, page_size: usize) -> Result<Paging> {
        if self.max_page_size > 0 && page_size > self.max_page_size {
            return Err(ExchangeError::invalid_parameter(
                "pageSize",
                format!(
                    "page size {} exceeds the maximum of {}",
                    page_size, self.max_page_size
                ),
            ));
        }
        let page_size = if page_size == 0 {
            self.max_page_size
        } else {
            page_size
        };
        Ok(Paging::new(start_from, page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn handler() -> InvalidParameterHandler {
        InvalidParameterHandler::new(50)
    }

    #[test]
    fn test_validate_user_id() {
        assert!(handler().validate_user_id("peterprofile").is_ok());
        assert_eq!(
            handler().validate_user_id("  ").unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
    }

    #[test]
    fn test_validate_guid() {
        assert!(handler()
            .validate_guid("550e8400-e29b-41d4-a716-446655440000", "guid")
            .is_ok());
        assert!(handler().validate_guid("", "guid").is_err());

        let err = handler().validate_guid("not-a-guid", "connectionGUID").unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::InvalidParameter { ref parameter, .. } if parameter == "connectionGUID"
        ));
    }

    #[test]
    fn test_validate_name() {
        assert!(handler().validate_name(Some("conn-1"), "qualifiedName").is_ok());
        assert!(handler().validate_name(Some(" "), "qualifiedName").is_err());
        assert!(handler().validate_name(None, "qualifiedName").is_err());
    }

    #[test]
    fn test_validate_object() {
        let value = 7;
        assert_eq!(*handler().validate_object(Some(&value), "properties").unwrap(), 7);
        assert!(handler().validate_object::<i32>(None, "properties").is_err());
    }

    #[test]
    fn test_validate_search_string() {
        assert!(handler().validate_search_string("conn-.*", "searchString").is_ok());
        assert!(handler().validate_search_string("conn-(", "searchString").is_err());
        assert!(handler().validate_search_string("", "searchString").is_err());
    }

    #[test]
    fn test_validate_paging() {
        assert_eq!(handler().validate_paging(5, 10).unwrap(), Paging::new(5, 10));
        assert_eq!(handler().validate_paging(0, 0).unwrap(), Paging::new(0, 50));
        assert!(handler().validate_paging(0, 51).is_err());

        let unlimited = InvalidParameterHandler::new(0);
        assert_eq!(unlimited.validate_paging(0, 0).unwrap(), Paging::new(0, 0));
        assert_eq!(unlimited.validate_paging(0, 5000).unwrap(), Paging::new(0, 5000));
    }
}
