use crate::error::{MonascaError, MonascaResult};
use crate::model::{Element, RawResponse, Series};
use crate::query::alias;
use crate::query::builder::{PARAM_ALIAS, PARAM_STATISTICS};
use crate::query::QueryString;
use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const MEASUREMENT_COLUMN: &str = "value";

fn column_index(element: &Element, column: &str) -> MonascaResult<usize> {
    element
        .columns
        .iter()
        .position(|c| c == column)
        .ok_or_else(|| MonascaError::ColumnNotFound {
            column: column.to_string(),
            element: element.describe(),
        })
}

/// Parses a row timestamp into epoch milliseconds.
///
/// Strings are read as RFC 3339, or as a zone-less UTC instant; numbers are
/// taken as epoch milliseconds already.
pub fn parse_timestamp(value: &Value) -> MonascaResult<i64> {
    let invalid = || MonascaError::InvalidTimestamp {
        value: value.to_string(),
    };

    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.timestamp_millis())
            .or_else(|_| {
                NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|dt| dt.and_utc().timestamp_millis())
            })
            .map_err(|_| invalid()),
        Value::Number(n) => n.as_i64().ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn target_label(element: &Element, query: &QueryString) -> String {
    match query.get(PARAM_ALIAS) {
        Some(template) => alias::substitute(
            template,
            element
                .dimensions
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        ),
        None => element.name.clone(),
    }
}

/// Converts one element into a series, locating columns by name.
pub fn convert_element(element: &Element, query: &QueryString) -> MonascaResult<Series> {
    let value_column = if element.measurements.is_some() {
        MEASUREMENT_COLUMN
    } else {
        query.get(PARAM_STATISTICS).unwrap_or_default()
    };
    let time_index = column_index(element, TIMESTAMP_COLUMN)?;
    let value_index = column_index(element, value_column)?;

    let mut series = Series::new(target_label(element, query));
    for row in element.rows() {
        let timestamp = row
            .get(time_index)
            .ok_or_else(|| MonascaError::InvalidTimestamp {
                value: Value::Array(row.clone()).to_string(),
            })
            .and_then(parse_timestamp)?;
        let value = row.get(value_index).and_then(Value::as_f64);
        series.add_point(value, timestamp);
    }

    Ok(series)
}

/// One series per element of `response`, in element order.
///
/// A missing column fails the whole conversion.
pub fn convert(response: &RawResponse, query: &QueryString) -> MonascaResult<Vec<Series>> {
    response
        .elements
        .iter()
        .map(|element| convert_element(element, query))
        .collect()
}
