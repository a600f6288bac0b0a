//! Configuration types for the exchange handlers.

use std::env;

use tracing::warn;

/// Default maximum number of elements returned by a single request.
const DEFAULT_MAX_PAGE_SIZE: usize = 1000;

/// Default name reported for the exchange service.
const DEFAULT_SERVICE_NAME: &str = "asset-manager-exchange";

/// Default name reported for the hosting server.
const DEFAULT_SERVER_NAME: &str = "local-server";

/// Configuration shared by every exchange handler.
///
/// Zones control which assets are visible: `supported_zones` restricts
/// reads, `default_zones` is assigned to new assets and to withdrawn ones,
/// `publish_zones` is assigned when an asset is published. Empty lists
/// impose no restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeServiceConfig {
    /// Name of the access service, used in log output.
    pub service_name: String,
    /// Name of the server hosting the access service.
    pub server_name: String,
    pub supported_zones: Vec<String>,
    pub default_zones: Vec<String>,
    pub publish_zones: Vec<String>,
    /// Maximum number of elements returned by a single request.
    ///
    /// Set to `0` to disable the limit.
    pub max_page_size: usize,
}

impl Default for ExchangeServiceConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            server_name: DEFAULT_SERVER_NAME.to_string(),
            supported_zones: Vec::new(),
            default_zones: Vec::new(),
            publish_zones: Vec::new(),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

impl ExchangeServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `EXCHANGE_SERVICE_NAME`: Service name (default: asset-manager-exchange)
    /// - `EXCHANGE_SERVER_NAME`: Server name (default: local-server)
    /// - `EXCHANGE_SUPPORTED_ZONES`: Comma separated zones visible to callers
    /// - `EXCHANGE_DEFAULT_ZONES`: Comma separated zones for new assets
    /// - `EXCHANGE_PUBLISH_ZONES`: Comma separated zones for published assets
    /// - `EXCHANGE_MAX_PAGE_SIZE`: Maximum page size, 0 for unlimited (default: 1000)
    pub fn from_env() -> Self {
        let max_page_size = match env::var("EXCHANGE_MAX_PAGE_SIZE") {
            Ok(value) => value.parse::<usize>().unwrap_or_else(|_| {
                warn!(
                    value = %value,
                    default = DEFAULT_MAX_PAGE_SIZE,
                    "Invalid EXCHANGE_MAX_PAGE_SIZE, using default"
                );
                DEFAULT_MAX_PAGE_SIZE
            }),
            Err(_) => DEFAULT_MAX_PAGE_SIZE,
        };

        Self {
            service_name: env::var("EXCHANGE_SERVICE_NAME")
                .unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_string()),
            server_name: env::var("EXCHANGE_SERVER_NAME")
                .unwrap_or_else(|_| DEFAULT_SERVER_NAME.to_string()),
            supported_zones: zones_from_env("EXCHANGE_SUPPORTED_ZONES"),
            default_zones: zones_from_env("EXCHANGE_DEFAULT_ZONES"),
            publish_zones: zones_from_env("EXCHANGE_PUBLISH_ZONES"),
            max_page_size,
        }
    }

    /// Set the service and server names.
    pub fn with_names(mut self, service_name: impl Into<String>, server_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self.server_name = server_name.into();
        self
    }

    /// Set the supported, default and publish zones.
    pub fn with_zones(
        mut self,
        supported_zones: Vec<String>,
        default_zones: Vec<String>,
        publish_zones: Vec<String>,
    ) -> Self {
        self.supported_zones = supported_zones;
        self.default_zones = default_zones;
        self.publish_zones = publish_zones;
        self
    }

    /// Set a custom page size limit.
    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size;
        self
    }
}

fn zones_from_env(name: &str) -> Vec<String> {
    env::var(name)
        .map(|value| parse_zone_list(&value))
        .unwrap_or_default()
}

fn parse_zone_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|zone| !zone.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExchangeServiceConfig::default();
        assert_eq!(config.max_page_size, 1000);
        assert!(config.supported_zones.is_empty());
        assert_eq!(config.service_name, "asset-manager-exchange");
    }

    #[test]
    fn test_parse_zone_list() {
        assert_eq!(
            parse_zone_list(" quarantine, data-lake ,,"),
            vec!["quarantine".to_string(), "data-lake".to_string()]
        );
        assert!(parse_zone_list("").is_empty());
    }

    #[test]
    fn test_builders() {
        let config = ExchangeServiceConfig::default()
            .with_names("exchange", "cocoMDS1")
            .with_zones(vec!["a".into()], vec!["b".into()], vec!["c".into()])
            .with_max_page_size(0);

        assert_eq!(config.server_name, "cocoMDS1");
        assert_eq!(config.default_zones, vec!["b".to_string()]);
        assert_eq!(config.max_page_size, 0);
    }
}
