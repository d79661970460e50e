pub mod alias;
pub mod builder;
pub mod period;
pub mod template;
pub mod wildcard;

pub use builder::{build, QueryString};
pub use template::expand;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

pub const MEASUREMENTS_PATH: &str = "/v2.0/metrics/measurements";
pub const STATISTICS_PATH: &str = "/v2.0/metrics/statistics";
pub const METRICS_PATH: &str = "/v2.0/metrics";
pub const NAMES_PATH: &str = "/v2.0/metrics/names";

/// Dimension value meaning "every concrete value observed for this key".
pub const WILDCARD: &str = "$all";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Aggregator {
    None,
    Statistic(String),
}

impl Default for Aggregator {
    fn default() -> Self {
        Aggregator::Statistic("avg".to_string())
    }
}

impl From<String> for Aggregator {
    fn from(s: String) -> Self {
        if s == "none" {
            Aggregator::None
        } else {
            Aggregator::Statistic(s)
        }
    }
}

impl From<&str> for Aggregator {
    fn from(s: &str) -> Self {
        Aggregator::from(s.to_string())
    }
}

impl From<Aggregator> for String {
    fn from(aggregator: Aggregator) -> Self {
        match aggregator {
            Aggregator::None => "none".to_string(),
            Aggregator::Statistic(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionFilter {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl DimensionFilter {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.value == WILDCARD
    }
}

/// One panel target as the dashboard hands it over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    #[serde(default)]
    pub ref_id: Option<String>,
    #[serde(default)]
    pub metric: String,
    #[serde(default)]
    pub aggregator: Aggregator,
    #[serde(default)]
    pub group: bool,
    #[serde(default, deserialize_with = "string_or_number")]
    pub period: Option<String>,
    #[serde(default)]
    pub dimensions: Vec<DimensionFilter>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub hide: bool,
}

impl TargetSpec {
    pub fn new(metric: &str) -> Self {
        Self {
            metric: metric.to_string(),
            ..Default::default()
        }
    }

    pub fn with_aggregator(mut self, aggregator: impl Into<Aggregator>) -> Self {
        self.aggregator = aggregator.into();
        self
    }

    pub fn with_period(mut self, period: &str) -> Self {
        self.period = Some(period.to_string());
        self
    }

    pub fn with_dimension(mut self, key: &str, value: &str) -> Self {
        self.dimensions.push(DimensionFilter::new(key, value));
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn grouped(mut self) -> Self {
        self.group = true;
        self
    }

    pub fn label(&self) -> String {
        self.ref_id.clone().unwrap_or_else(|| self.metric.clone())
    }

    /// Problems that keep this target from being sent. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.metric.is_empty() {
            issues.push("You must supply a metric name.".to_string());
        }
        if self.aggregator != Aggregator::None
            && self.period.as_deref().map_or(true, str::is_empty)
        {
            issues.push("Group By Time must be set".to_string());
        }
        for dimension in &self.dimensions {
            if dimension.key.is_empty() {
                issues.push("You must supply a dimension key.".to_string());
            } else if dimension.value.is_empty() {
                issues.push(format!("You must supply a value for dimension {}.", dimension.key));
            }
        }

        issues
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: String,
    pub to: String,
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            from: "now-6h".to_string(),
            to: "now".to_string(),
        }
    }
}

/// A full dashboard query round: one time range, many targets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    #[serde(default)]
    pub range: TimeRange,
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
    #[serde(default)]
    pub scoped_vars: HashMap<String, String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_target_from_dashboard_json() {
        let target: TargetSpec = serde_json::from_value(json!({
            "refId": "A",
            "metric": "cpu.idle_perc",
            "aggregator": "none",
            "period": 300,
            "dimensions": [{"key": "hostname", "value": "$all"}],
            "alias": "@hostname"
        }))
        .unwrap();

        assert_eq!(target.aggregator, Aggregator::None);
        assert_eq!(target.period.as_deref(), Some("300"));
        assert!(target.dimensions[0].is_wildcard());
        assert!(!target.group);
        assert_eq!(target.label(), "A");
    }

    #[test]
    fn test_default_aggregator_is_avg() {
        let target: TargetSpec = serde_json::from_value(json!({"metric": "cpu"})).unwrap();
        assert_eq!(target.aggregator, Aggregator::Statistic("avg".to_string()));
    }

    #[test]
    fn test_validate_requires_metric_and_period() {
        let target = TargetSpec::default();
        let issues = target.validate();
        assert_eq!(issues.len(), 2);

        let target = TargetSpec::new("cpu").with_aggregator("none");
        assert!(target.validate().is_empty());

        let target = TargetSpec::new("cpu").with_period("60");
        assert!(target.validate().is_empty());
    }

    #[test]
    fn test_validate_rejects_empty_dimension_value() {
        let target = TargetSpec::new("cpu")
            .with_aggregator("none")
            .with_dimension("hostname", "");
        assert_eq!(target.validate().len(), 1);
    }
}
