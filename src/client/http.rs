use super::{ApiRequest, ApiResponse, Transport};
use crate::error::{MonascaError, MonascaResult};
use crate::model::RawResponse;
use async_trait::async_trait;
use reqwest::Method;
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> MonascaResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: ApiRequest) -> MonascaResult<ApiResponse> {
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            MonascaError::Query {
                message: format!("Invalid HTTP method {}: {}", request.method, e),
            }
        })?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .query(&request.params);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        debug!("{} {} {:?}", request.method, request.url, request.params);
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Request to {} failed with status {}", request.url, status);
            return Err(MonascaError::Transport {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let data = response.json::<RawResponse>().await?;
        Ok(ApiResponse {
            url: request.url,
            data,
        })
    }
}
