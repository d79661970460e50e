pub mod executor;
pub mod http;
pub mod mock;

pub use executor::{MergeStrategy, RequestExecutor};
pub use http::HttpTransport;
pub use mock::MockTransport;

use crate::error::MonascaResult;
use crate::model::RawResponse;
use async_trait::async_trait;

pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: String,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(url: String) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            params: Vec::new(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// Url the request was sent to, without parameters.
    pub url: String,
    pub data: RawResponse,
}

/// The HTTP layer underneath every metrics API call.
///
/// Any non-success status or network failure comes back as
/// `MonascaError::Transport` carrying the upstream payload.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: ApiRequest) -> MonascaResult<ApiResponse>;
}
