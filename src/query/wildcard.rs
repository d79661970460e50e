use super::builder::{PARAM_DIMENSIONS, PARAM_NAME, PARAM_START_TIME};
use super::{QueryString, METRICS_PATH, WILDCARD};
use crate::client::RequestExecutor;
use crate::error::MonascaResult;
use crate::model::Element;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

pub fn has_wildcard(query: &QueryString) -> bool {
    query.params().iter().any(|(_, value)| value.contains(WILDCARD))
}

/// Dimension keys bound to the wildcard, in filter order.
pub fn wildcard_keys(query: &QueryString) -> Vec<String> {
    let suffix = format!(":{}", WILDCARD);
    query
        .get(PARAM_DIMENSIONS)
        .map(|dimensions| {
            dimensions
                .split(',')
                .filter_map(|pair| pair.strip_suffix(suffix.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// The metric listing request used to discover concrete dimension values.
pub fn discovery_query(query: &QueryString) -> QueryString {
    let mut discovery = QueryString::new(METRICS_PATH);
    if let Some(name) = query.get(PARAM_NAME) {
        discovery.set(PARAM_NAME, name);
    }
    if let Some(start_time) = query.get(PARAM_START_TIME) {
        discovery.set(PARAM_START_TIME, start_time);
    }
    discovery
}

/// Distinct projections of `metrics` onto `keys`, first occurrence first.
///
/// A metric lacking any of the keys contributes nothing.
pub fn distinct_combinations(metrics: &[Element], keys: &[String]) -> Vec<BTreeMap<String, String>> {
    let mut seen = HashSet::new();
    let mut combinations = Vec::new();

    for metric in metrics {
        let combination: Option<BTreeMap<String, String>> = keys
            .iter()
            .map(|key| {
                metric
                    .dimensions
                    .get(key)
                    .map(|value| (key.clone(), value.clone()))
            })
            .collect();

        if let Some(combination) = combination {
            if seen.insert(combination.clone()) {
                combinations.push(combination);
            }
        }
    }

    combinations
}

/// Rewrites every `key:$all` with the concrete value for that key.
pub fn rewrite(query: &QueryString, combination: &BTreeMap<String, String>) -> QueryString {
    combination.iter().fold(query.clone(), |rewritten, (key, value)| {
        rewritten.replace_all(
            &format!("{}:{}", key, WILDCARD),
            &format!("{}:{}", key, value),
        )
    })
}

/// Resolves wildcard dimensions into one query per discovered combination.
///
/// Queries without the wildcard come back unchanged as a single entry.
/// Otherwise the metric listing for the query's name and start time is
/// fetched once, and an empty result yields no queries at all.
pub async fn resolve_wildcards(
    executor: &RequestExecutor,
    query: &QueryString,
) -> MonascaResult<Vec<QueryString>> {
    if !has_wildcard(query) {
        return Ok(vec![query.clone()]);
    }

    let keys = wildcard_keys(query);
    let discovery = discovery_query(query);
    let metrics = executor.fetch(&discovery).await?.elements;

    let combinations = distinct_combinations(&metrics, &keys);
    debug!(
        "Resolved {:?} for {} into {} combinations from {} metrics",
        keys,
        discovery,
        combinations.len(),
        metrics.len()
    );

    Ok(combinations
        .iter()
        .map(|combination| rewrite(query, combination))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockTransport;
    use crate::model::RawResponse;
    use crate::MonascaConfig;
    use std::sync::Arc;

    fn wildcard_query() -> QueryString {
        QueryString::new("/v2.0/metrics/measurements")
            .with_param("name", "cpu")
            .with_param("merge_metrics", "true")
            .with_param("start_time", "2024-01-01T00:00:00.000Z")
            .with_param("dimensions", "hostname:$all,service:compute,az:$all")
    }

    fn metric(dimensions: &[(&str, &str)]) -> Element {
        dimensions
            .iter()
            .fold(Element::new("cpu"), |element, (k, v)| element.with_dimension(k, v))
    }

    #[test]
    fn test_wildcard_keys_first_and_later_positions() {
        assert_eq!(wildcard_keys(&wildcard_query()), vec!["hostname", "az"]);
    }

    #[test]
    fn test_discovery_carries_only_name_and_start() {
        assert_eq!(
            discovery_query(&wildcard_query()).to_string(),
            "/v2.0/metrics?name=cpu&start_time=2024-01-01T00:00:00.000Z"
        );
    }

    #[test]
    fn test_distinct_combinations_skip_partial_and_duplicates() {
        let metrics = vec![
            metric(&[("hostname", "web1"), ("az", "1a"), ("extra", "x")]),
            metric(&[("hostname", "web1"), ("az", "1a"), ("extra", "y")]),
            metric(&[("hostname", "web2")]),
            metric(&[("hostname", "web2"), ("az", "1b")]),
        ];
        let keys = vec!["hostname".to_string(), "az".to_string()];

        let combinations = distinct_combinations(&metrics, &keys);
        assert_eq!(combinations.len(), 2);
        assert_eq!(combinations[0].get("hostname").map(String::as_str), Some("web1"));
        assert_eq!(combinations[1].get("az").map(String::as_str), Some("1b"));
    }

    #[test]
    fn test_rewrite_is_case_sensitive() {
        let query = QueryString::new("/p").with_param("dimensions", "Host:$all,host:$all");
        let combination = BTreeMap::from([("host".to_string(), "web1".to_string())]);
        assert_eq!(
            rewrite(&query, &combination).get("dimensions"),
            Some("Host:$all,host:web1")
        );
    }

    #[tokio::test]
    async fn test_passthrough_without_wildcard() {
        let transport = MockTransport::new();
        let executor = RequestExecutor::new(Arc::new(transport.clone()), &MonascaConfig::default());
        let query = QueryString::new("/p").with_param("dimensions", "hostname:web1");

        let resolved = resolve_wildcards(&executor, &query).await.unwrap();
        assert_eq!(resolved, vec![query]);
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_one_query_per_combination() {
        let transport = MockTransport::new().with_page(
            METRICS_PATH,
            &[("name", "cpu")],
            RawResponse::new(vec![
                metric(&[("hostname", "web1"), ("az", "1a"), ("service", "compute")]),
                metric(&[("hostname", "web2"), ("az", "1a"), ("service", "compute")]),
                metric(&[("hostname", "web2"), ("az", "1a"), ("service", "other")]),
            ]),
        );
        let executor = RequestExecutor::new(Arc::new(transport.clone()), &MonascaConfig::default());

        let resolved = resolve_wildcards(&executor, &wildcard_query()).await.unwrap();
        let dims: Vec<_> = resolved.iter().map(|q| q.get("dimensions").unwrap()).collect();
        assert_eq!(
            dims,
            vec![
                "hostname:web1,service:compute,az:1a",
                "hostname:web2,service:compute,az:1a"
            ]
        );

        let request = &transport.requests()[0];
        assert_eq!(request.param("dimensions"), None);
        assert_eq!(request.param("start_time"), Some("2024-01-01T00:00:00.000Z"));
    }

    #[tokio::test]
    async fn test_resolve_no_matches_yields_nothing() {
        let transport = MockTransport::new().with_page(
            METRICS_PATH,
            &[],
            RawResponse::new(vec![metric(&[("service", "compute")])]),
        );
        let executor = RequestExecutor::new(Arc::new(transport), &MonascaConfig::default());

        let resolved = resolve_wildcards(&executor, &wildcard_query()).await.unwrap();
        assert!(resolved.is_empty());
    }
}
