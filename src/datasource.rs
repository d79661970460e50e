use crate::catalog::{self, MetricCatalog};
use crate::client::{HttpTransport, RequestExecutor, Transport};
use crate::convert::convert;
use crate::error::MonascaResult;
use crate::model::{RawResponse, Series};
use crate::query::alias::auto_alias;
use crate::query::period::normalize_period;
use crate::query::wildcard::resolve_wildcards;
use crate::query::{build, expand, QueryOptions, QueryString, TargetSpec, METRICS_PATH};
use crate::time::{translate_time, DateMath, RelativeDateMath};
use crate::variables::{ScopedVars, StaticVariables, TemplateVariables};
use crate::MonascaConfig;
use chrono::{DateTime, Utc};
use futures::future::{join_all, try_join_all};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct TargetFailure {
    pub target: String,
    pub error: String,
}

/// Result of one dashboard query round.
///
/// Targets fail independently: a target whose discovery, fetch or
/// conversion fails contributes nothing to `data` and one entry to
/// `failures`, while its siblings are still returned.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryOutcome {
    pub data: Vec<Series>,
    pub failures: Vec<TargetFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasourceStatus {
    pub status: String,
    pub message: String,
    pub title: String,
}

pub struct MonascaDatasource {
    config: MonascaConfig,
    executor: RequestExecutor,
    variables: Arc<dyn TemplateVariables>,
    date_math: Arc<dyn DateMath>,
}

impl MonascaDatasource {
    pub fn new(config: MonascaConfig) -> MonascaResult<Self> {
        config.validate()?;
        let transport = HttpTransport::new(Duration::from_secs(config.request_timeout_seconds))?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: MonascaConfig, transport: Arc<dyn Transport>) -> Self {
        let executor = RequestExecutor::new(transport, &config);
        Self {
            config,
            executor,
            variables: Arc::new(StaticVariables::new()),
            date_math: Arc::new(RelativeDateMath),
        }
    }

    pub fn with_variables(mut self, variables: Arc<dyn TemplateVariables>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_date_math(mut self, date_math: Arc<dyn DateMath>) -> Self {
        self.date_math = date_math;
        self
    }

    pub fn config(&self) -> &MonascaConfig {
        &self.config
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn catalog(&self) -> MetricCatalog {
        MetricCatalog::new(self.executor.clone())
    }

    /// Runs every visible, valid target concurrently and flattens the series.
    pub async fn query(&self, options: &QueryOptions) -> QueryOutcome {
        let request_id = uuid::Uuid::new_v4().to_string();
        let from = translate_time(self.date_math.as_ref(), &options.range.from);
        let to = translate_time(self.date_math.as_ref(), &options.range.to);

        let targets: Vec<&TargetSpec> = options
            .targets
            .iter()
            .filter(|target| {
                if target.hide {
                    return false;
                }
                let issues = target.validate();
                if !issues.is_empty() {
                    warn!("Skipping target {}: {}", target.label(), issues.join(" "));
                }
                issues.is_empty()
            })
            .collect();
        info!(
            "Executing query round with {} targets ({})",
            targets.len(),
            request_id
        );

        let results = join_all(
            targets
                .iter()
                .map(|target| self.run_target(target, from, to, &options.scoped_vars)),
        )
        .await;

        let mut outcome = QueryOutcome::default();
        for (target, result) in targets.iter().zip(results) {
            match result {
                Ok(series) => outcome.data.extend(series),
                Err(e) => {
                    error!("Target {} failed ({}): {}", target.label(), request_id, e);
                    outcome.failures.push(TargetFailure {
                        target: target.label(),
                        error: e.to_string(),
                    });
                }
            }
        }

        debug!(
            "Query round {} produced {} series, {} failed targets",
            request_id,
            outcome.data.len(),
            outcome.failures.len()
        );
        outcome
    }

    /// All concrete queries for one target, ready for dispatch.
    pub async fn expand_target(
        &self,
        target: &TargetSpec,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        scope: &ScopedVars,
    ) -> MonascaResult<Vec<QueryString>> {
        let query = build(target, from, to).map_values(|value| self.variables.replace(value, scope));

        if target.group {
            return Ok(expand(&query));
        }

        let resolved = resolve_wildcards(&self.executor, &query).await?;
        Ok(auto_alias(resolved.iter().flat_map(expand).collect()))
    }

    async fn run_target(
        &self,
        target: &TargetSpec,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        scope: &ScopedVars,
    ) -> MonascaResult<Vec<Series>> {
        let queries = self.expand_target(target, from, to, scope).await?;
        debug!("Target {} expanded into {} queries", target.label(), queries.len());

        let fetched = try_join_all(queries.iter().map(|query| self.fetch_series(query))).await?;
        Ok(fetched
            .into_iter()
            .flatten()
            .filter(|series| !series.is_empty())
            .collect())
    }

    /// Fetches one concrete query and converts the response.
    pub async fn fetch_series(&self, query: &QueryString) -> MonascaResult<Vec<Series>> {
        let query = normalize_period(query);
        let response = self.executor.fetch(&query).await?;
        convert(&response, &query)
    }

    pub async fn names_query(&self) -> MonascaResult<Vec<String>> {
        self.catalog().names().await
    }

    pub async fn metrics_query(&self, params: &[(&str, &str)]) -> MonascaResult<RawResponse> {
        let query = params
            .iter()
            .fold(QueryString::new(METRICS_PATH), |query, (k, v)| query.with_param(k, v));
        self.executor.fetch(&query).await
    }

    /// Distinct values of dimension `key` across every metric.
    pub async fn metric_find_query(&self, key: &str) -> MonascaResult<Vec<String>> {
        let response = self.metrics_query(&[]).await?;
        Ok(catalog::dimension_values(&response.elements, key))
    }

    pub fn list_templates(&self) -> Vec<String> {
        self.variables
            .names()
            .into_iter()
            .map(|name| format!("${}", name))
            .collect()
    }

    pub async fn test_datasource(&self) -> MonascaResult<DatasourceStatus> {
        self.names_query().await?;
        Ok(DatasourceStatus {
            status: "success".to_string(),
            message: "Data source is working".to_string(),
            title: "Success".to_string(),
        })
    }
}
