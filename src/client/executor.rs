use super::{ApiRequest, Transport, AUTH_TOKEN_HEADER};
use crate::error::MonascaResult;
use crate::model::{Element, RawResponse};
use crate::query::builder::PARAM_OFFSET;
use crate::query::QueryString;
use crate::MonascaConfig;
use reqwest::Url;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// How fragments from several pages are folded into one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Elements sharing an id have their rows concatenated in arrival order.
    ById,
    /// Every row of every element lands in the first element.
    ///
    /// Merged-metric queries come back with a different element id on each
    /// page upstream, so grouping by id would split one series in pieces.
    /// Drop this once the API keeps ids stable across pages.
    Flatten,
}

impl MergeStrategy {
    pub fn apply(self, elements: Vec<Element>) -> Vec<Element> {
        match self {
            MergeStrategy::ById => merge_by_id(elements),
            MergeStrategy::Flatten => flatten(elements),
        }
    }
}

fn merge_by_id(elements: Vec<Element>) -> Vec<Element> {
    let mut merged: Vec<Element> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for element in elements {
        // Elements without an id are never merged with anything.
        let Some(key) = element.id_key() else {
            merged.push(element);
            continue;
        };
        match positions.get(&key) {
            Some(&index) => merged[index].absorb_rows(element),
            None => {
                positions.insert(key, merged.len());
                merged.push(element);
            }
        }
    }

    merged
}

fn flatten(elements: Vec<Element>) -> Vec<Element> {
    let mut elements = elements.into_iter();
    let Some(mut first) = elements.next() else {
        return Vec::new();
    };
    for element in elements {
        first.absorb_rows(element);
    }
    vec![first]
}

/// Offset carried by a `next` link, percent-decoded.
fn next_offset(href: &str) -> Option<String> {
    let base = Url::parse("http://localhost/").ok()?;
    let url = base.join(href).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == PARAM_OFFSET)
        .map(|(_, value)| value.into_owned())
}

/// Issues metrics API calls and follows pagination to the end.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    base_url: String,
    token: Option<String>,
    flatten_merged_pages: bool,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, config: &MonascaConfig) -> Self {
        Self {
            transport,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
            flatten_merged_pages: config.flatten_merged_pages,
        }
    }

    fn build_request(&self, query: &QueryString) -> ApiRequest {
        let mut request = ApiRequest::get(format!("{}{}", self.base_url, query.path()));
        request.params = query.params().to_vec();
        if let Some(token) = &self.token {
            request
                .headers
                .push((AUTH_TOKEN_HEADER.to_string(), token.clone()));
        }
        request
    }

    pub fn merge_strategy_for(&self, query: &QueryString) -> MergeStrategy {
        if self.flatten_merged_pages && query.merges_metrics() {
            MergeStrategy::Flatten
        } else {
            MergeStrategy::ById
        }
    }

    /// Fetches every page of `query` and merges them into one response.
    ///
    /// A single page is returned untouched. Any transport failure aborts
    /// the whole chain and nothing fetched so far is returned.
    pub async fn fetch(&self, query: &QueryString) -> MonascaResult<RawResponse> {
        let mut current = query.clone();
        let mut elements = Vec::new();
        let mut pages = 0usize;
        let mut seen_offsets: HashSet<String> =
            query.get(PARAM_OFFSET).map(str::to_string).into_iter().collect();

        let links = loop {
            let response = self.transport.request(self.build_request(&current)).await?;
            pages += 1;

            let RawResponse {
                elements: page_elements,
                links,
            } = response.data;
            debug!(
                "Fetched page {} of {} ({} elements)",
                pages,
                query,
                page_elements.len()
            );
            elements.extend(page_elements);

            let next = links
                .iter()
                .find(|link| link.rel == "next")
                .and_then(|link| next_offset(&link.href));
            match next {
                Some(offset) if !seen_offsets.insert(offset.clone()) => {
                    warn!("Next link for {} revisits offset {}, stopping", query, offset);
                    break links;
                }
                Some(offset) => current.set(PARAM_OFFSET, &offset),
                None => break links,
            }
        };

        if pages > 1 {
            let strategy = self.merge_strategy_for(query);
            debug!(
                "Merging {} elements from {} pages with {:?}",
                elements.len(),
                pages,
                strategy
            );
            elements = strategy.apply(elements);
        }

        Ok(RawResponse { elements, links })
    }
}
