use super::{ApiRequest, ApiResponse, Transport};
use crate::error::{MonascaError, MonascaResult};
use crate::model::RawResponse;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

type Reply = Result<RawResponse, (Option<u16>, String)>;

struct Route {
    path: String,
    params: Vec<(String, String)>,
    reply: Reply,
}

impl Route {
    fn matches(&self, request: &ApiRequest) -> bool {
        request.url.ends_with(&self.path)
            && self
                .params
                .iter()
                .all(|(k, v)| request.param(k) == Some(v.as_str()))
    }
}

// In-memory metrics API that replays scripted pages for testing
#[derive(Clone, Default)]
pub struct MockTransport {
    routes: Arc<Mutex<Vec<Route>>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers requests to `path` carrying all of `params`. When several
    /// routes match, the one naming the most parameters wins.
    pub fn with_page(self, path: &str, params: &[(&str, &str)], page: RawResponse) -> Self {
        self.push_route(path, params, Ok(page));
        self
    }

    pub fn with_failure(self, path: &str, params: &[(&str, &str)], status: u16, body: &str) -> Self {
        self.push_route(path, params, Err((Some(status), body.to_string())));
        self
    }

    fn push_route(&self, path: &str, params: &[(&str, &str)], reply: Reply) {
        let mut routes = self.routes.lock().unwrap();
        routes.push(Route {
            path: path.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            reply,
        });
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, request: ApiRequest) -> MonascaResult<ApiResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let reply = {
            let routes = self.routes.lock().unwrap();
            routes
                .iter()
                .filter(|route| route.matches(&request))
                .max_by_key(|route| route.params.len())
                .map(|route| route.reply.clone())
        };

        match reply {
            Some(Ok(data)) => Ok(ApiResponse {
                url: request.url,
                data,
            }),
            Some(Err((status, message))) => Err(MonascaError::Transport { status, message }),
            None => Err(MonascaError::Transport {
                status: Some(404),
                message: format!("No mock route for {} {:?}", request.url, request.params),
            }),
        }
    }
}
