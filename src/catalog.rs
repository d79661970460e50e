use crate::client::RequestExecutor;
use crate::error::MonascaResult;
use crate::model::Element;
use crate::query::builder::PARAM_NAME;
use crate::query::{QueryString, METRICS_PATH, NAMES_PATH};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Dimension keys and their observed values, both in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DimensionList {
    pub keys: Vec<String>,
    pub values: BTreeMap<String, Vec<String>>,
}

impl DimensionList {
    pub fn from_metrics(metrics: &[Element]) -> Self {
        let mut list = DimensionList::default();
        for metric in metrics {
            for (key, value) in &metric.dimensions {
                let values = list.values.entry(key.clone()).or_insert_with(|| {
                    list.keys.push(key.clone());
                    Vec::new()
                });
                if !values.contains(value) {
                    values.push(value.clone());
                }
            }
        }
        list
    }

    pub fn values_for(&self, key: &str) -> &[String] {
        self.values.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Distinct values of `key` across `metrics`, first occurrence first.
pub fn dimension_values(metrics: &[Element], key: &str) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for value in metrics.iter().filter_map(|m| m.dimensions.get(key)) {
        if !values.contains(value) {
            values.push(value.clone());
        }
    }
    values
}

/// Metric names and per-metric dimensions, cached between lookups.
///
/// The dimension list is kept for one metric name at a time; asking for a
/// different name refetches it.
pub struct MetricCatalog {
    executor: RequestExecutor,
    names: RwLock<Option<Vec<String>>>,
    dimensions: RwLock<Option<(String, DimensionList)>>,
}

impl MetricCatalog {
    pub fn new(executor: RequestExecutor) -> Self {
        Self {
            executor,
            names: RwLock::new(None),
            dimensions: RwLock::new(None),
        }
    }

    pub async fn names(&self) -> MonascaResult<Vec<String>> {
        if let Some(names) = self.names.read().await.as_ref() {
            return Ok(names.clone());
        }

        let response = self.executor.fetch(&QueryString::new(NAMES_PATH)).await?;
        let names: Vec<String> = response.elements.into_iter().map(|e| e.name).collect();
        debug!("Cached {} metric names", names.len());

        *self.names.write().await = Some(names.clone());
        Ok(names)
    }

    pub async fn dimensions(&self, metric: &str) -> MonascaResult<DimensionList> {
        if let Some((cached, list)) = self.dimensions.read().await.as_ref() {
            if cached == metric {
                return Ok(list.clone());
            }
        }

        let query = QueryString::new(METRICS_PATH).with_param(PARAM_NAME, metric);
        let response = self.executor.fetch(&query).await?;
        let list = DimensionList::from_metrics(&response.elements);
        debug!("Cached {} dimension keys for {}", list.keys.len(), metric);

        *self.dimensions.write().await = Some((metric.to_string(), list.clone()));
        Ok(list)
    }

    pub async fn invalidate(&self) {
        *self.names.write().await = None;
        *self.dimensions.write().await = None;
    }
}
