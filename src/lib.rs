pub mod catalog;
pub mod client;
pub mod convert;
pub mod datasource;
pub mod error;
pub mod model;
pub mod query;
pub mod time;
pub mod variables;

pub use datasource::{DatasourceStatus, MonascaDatasource, QueryOutcome, TargetFailure};
pub use error::{MonascaError, MonascaResult};
pub use model::{Element, RawResponse, Series};
pub use query::{Aggregator, DimensionFilter, QueryOptions, QueryString, TargetSpec, TimeRange};

#[derive(Debug, Clone)]
pub struct MonascaConfig {
    pub url: String,
    pub token: Option<String>,
    pub request_timeout_seconds: u64,
    // Gates the single-element flatten for multi-page merged-metric queries
    pub flatten_merged_pages: bool,
    pub bind_address: String,
}

impl Default for MonascaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8070".to_string(),
            token: None,
            request_timeout_seconds: 30,
            flatten_merged_pages: true,
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

impl MonascaConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("MONASCA_URL") {
            config.url = url;
        }

        if let Ok(token) = std::env::var("MONASCA_TOKEN") {
            config.token = Some(token).filter(|t| !t.is_empty());
        }

        if let Ok(timeout_str) = std::env::var("MONASCA_TIMEOUT_SECONDS") {
            config.request_timeout_seconds = timeout_str.parse().unwrap_or(30);
        }

        if let Ok(flatten_str) = std::env::var("MONASCA_FLATTEN_MERGED_PAGES") {
            config.flatten_merged_pages = flatten_str.parse().unwrap_or(true);
        }

        if let Ok(bind_addr) = std::env::var("BIND_ADDRESS") {
            config.bind_address = bind_addr;
        }

        config
    }

    pub fn validate(&self) -> MonascaResult<()> {
        if reqwest::Url::parse(&self.url).is_err() {
            return Err(MonascaError::Config {
                message: format!("Invalid Monasca url: {}", self.url),
            });
        }
        if self.request_timeout_seconds == 0 {
            return Err(MonascaError::Config {
                message: "Request timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MonascaConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MonascaConfig {
            url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(MonascaError::Config { .. })));

        let config = MonascaConfig {
            request_timeout_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
