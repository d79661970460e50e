use super::{Aggregator, TargetSpec, MEASUREMENTS_PATH, STATISTICS_PATH, WILDCARD};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

pub const PARAM_NAME: &str = "name";
pub const PARAM_GROUP_BY: &str = "group_by";
pub const PARAM_MERGE_METRICS: &str = "merge_metrics";
pub const PARAM_START_TIME: &str = "start_time";
pub const PARAM_END_TIME: &str = "end_time";
pub const PARAM_DIMENSIONS: &str = "dimensions";
pub const PARAM_ALIAS: &str = "alias";
pub const PARAM_STATISTICS: &str = "statistics";
pub const PARAM_PERIOD: &str = "period";
pub const PARAM_OFFSET: &str = "offset";

/// An API path plus its parameters in insertion order.
///
/// This is the unit of expansion and the unit of request. Parameters stay
/// unencoded until dispatch; `Display` renders the literal
/// `path?key=value&...` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryString {
    path: String,
    params: Vec<(String, String)>,
}

impl QueryString {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            params: Vec::new(),
        }
    }

    /// Splits a literal `path?key=value&...` string back into its parts.
    pub fn parse(text: &str) -> Self {
        let (path, query) = text.split_once('?').unwrap_or((text, ""));
        let params = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (key.to_string(), value.to_string())
            })
            .collect();
        Self {
            path: path.to_string(),
            params,
        }
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.iter().any(|(k, _)| k == key)
    }

    /// Replaces an existing parameter in place, or appends a new one.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.params.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.params.push((key.to_string(), value.to_string())),
        }
    }

    /// Returns a copy with `f` applied to every parameter value.
    pub fn map_values<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&str) -> String,
    {
        Self {
            path: self.path.clone(),
            params: self
                .params
                .iter()
                .map(|(k, v)| (k.clone(), f(v)))
                .collect(),
        }
    }

    /// Replaces every occurrence of `from` with `to` across all values.
    pub fn replace_all(&self, from: &str, to: &str) -> Self {
        self.map_values(|value| value.replace(from, to))
    }

    pub fn merges_metrics(&self) -> bool {
        self.contains(PARAM_MERGE_METRICS)
    }
}

impl fmt::Display for QueryString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            let separator = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", separator, key, value)?;
        }
        Ok(())
    }
}

pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Builds the measurements/statistics query for one target.
///
/// A `None` bound is left out entirely. Wildcard dimensions are dropped in
/// grouped mode and kept as `key:$all` otherwise so they can be resolved
/// later.
pub fn build(
    spec: &TargetSpec,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> QueryString {
    let path = match spec.aggregator {
        Aggregator::None => MEASUREMENTS_PATH,
        Aggregator::Statistic(_) => STATISTICS_PATH,
    };
    let mut query = QueryString::new(path).with_param(PARAM_NAME, &spec.metric);

    if spec.group {
        query.set(PARAM_GROUP_BY, "*");
    } else {
        query.set(PARAM_MERGE_METRICS, "true");
    }

    if let Some(from) = from {
        query.set(PARAM_START_TIME, &format_instant(&from));
    }
    if let Some(to) = to {
        query.set(PARAM_END_TIME, &format_instant(&to));
    }

    let dimensions = spec
        .dimensions
        .iter()
        .filter(|d| !(spec.group && d.value == WILDCARD))
        .map(|d| format!("{}:{}", d.key, d.value))
        .collect::<Vec<_>>()
        .join(",");
    if !dimensions.is_empty() {
        query.set(PARAM_DIMENSIONS, &dimensions);
    }

    if let Some(alias) = spec.alias.as_deref().filter(|a| !a.is_empty()) {
        query.set(PARAM_ALIAS, alias);
    }

    if let Aggregator::Statistic(statistic) = &spec.aggregator {
        query.set(PARAM_STATISTICS, statistic);
        if let Some(period) = spec.period.as_deref() {
            query.set(PARAM_PERIOD, period);
        }
    }

    query
}
