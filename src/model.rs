use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub type Row = Vec<Value>;

/// Payload of a metrics API listing: elements plus optional paging links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

impl RawResponse {
    pub fn new(elements: Vec<Element>) -> Self {
        Self {
            elements,
            links: Vec::new(),
        }
    }

    pub fn with_link(mut self, rel: &str, href: &str) -> Self {
        self.links.push(Link {
            rel: rel.to_string(),
            href: href.to_string(),
        });
        self
    }

    /// Href of the `next` relation, if the API has more pages.
    pub fn next_href(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.rel == "next")
            .map(|link| link.href.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
}

/// One row-group in a response, tagged with its dimension set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dimensions: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurements: Option<Vec<Row>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Vec<Row>>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_dimension(mut self, key: &str, value: &str) -> Self {
        self.dimensions.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_measurements(mut self, columns: &[&str], rows: Vec<Row>) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self.measurements = Some(rows);
        self
    }

    pub fn with_statistics(mut self, columns: &[&str], rows: Vec<Row>) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self.statistics = Some(rows);
        self
    }

    /// Identifier rendered as text, used as the merge key across pages.
    pub fn id_key(&self) -> Option<String> {
        self.id.as_ref().map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Row data, whichever of `measurements` or `statistics` is present.
    pub fn rows(&self) -> &[Row] {
        self.measurements
            .as_deref()
            .or(self.statistics.as_deref())
            .unwrap_or(&[])
    }

    pub fn row_count(&self) -> usize {
        self.rows().len()
    }

    /// Moves the rows of `other` onto the end of this element's rows.
    ///
    /// An element carrying no row list yet takes the kind and columns of
    /// the incoming one.
    pub fn absorb_rows(&mut self, other: Element) {
        let (incoming, statistics) = match (other.measurements, other.statistics) {
            (Some(rows), _) => (rows, false),
            (None, Some(rows)) => (rows, true),
            (None, None) => return,
        };
        if self.measurements.is_none() && self.statistics.is_none() {
            if self.columns.is_empty() {
                self.columns = other.columns;
            }
            if statistics {
                self.statistics = Some(incoming);
            } else {
                self.measurements = Some(incoming);
            }
        } else if let Some(measurements) = self.measurements.as_mut() {
            measurements.extend(incoming);
        } else if let Some(existing) = self.statistics.as_mut() {
            existing.extend(incoming);
        }
    }

    pub fn describe(&self) -> String {
        match self.id_key() {
            Some(id) => format!("{} ({})", self.name, id),
            None => self.name.clone(),
        }
    }
}

/// `[value, epoch-millis]`; value is `None` when the API reported null.
pub type Datapoint = (Option<f64>, i64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub target: String,
    pub datapoints: Vec<Datapoint>,
}

impl Series {
    pub fn new(target: String) -> Self {
        Self {
            target,
            datapoints: Vec::new(),
        }
    }

    pub fn add_point(&mut self, value: Option<f64>, timestamp_ms: i64) {
        self.datapoints.push((value, timestamp_ms));
    }

    pub fn len(&self) -> usize {
        self.datapoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datapoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_measurement_page() {
        let body = json!({
            "links": [
                {"rel": "self", "href": "http://api/v2.0/metrics/measurements?name=cpu"},
                {"rel": "next", "href": "http://api/v2.0/metrics/measurements?name=cpu&offset=10"}
            ],
            "elements": [{
                "id": "2024-01-01T00:00:00Z",
                "name": "cpu.idle_perc",
                "dimensions": {"hostname": "web1"},
                "columns": ["timestamp", "value", "value_meta"],
                "measurements": [["2024-01-01T00:00:00Z", 42.0, {}]]
            }]
        });

        let response: RawResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.elements.len(), 1);
        assert_eq!(
            response.next_href(),
            Some("http://api/v2.0/metrics/measurements?name=cpu&offset=10")
        );
        let element = &response.elements[0];
        assert_eq!(element.id_key().as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(element.dimensions.get("hostname").map(String::as_str), Some("web1"));
        assert_eq!(element.row_count(), 1);
        assert!(element.statistics.is_none());
    }

    #[test]
    fn test_numeric_id_key() {
        let element = Element::new("cpu").with_id(7);
        assert_eq!(element.id_key().as_deref(), Some("7"));
    }

    #[test]
    fn test_absorb_rows_targets_present_list() {
        let mut element = Element::new("cpu")
            .with_statistics(&["timestamp", "avg"], vec![vec![json!("t1"), json!(1.0)]]);
        element.absorb_rows(
            Element::new("cpu").with_statistics(&["timestamp", "avg"], vec![vec![json!("t2"), json!(2.0)]]),
        );
        assert_eq!(element.row_count(), 2);
        assert!(element.measurements.is_none());
    }

    #[test]
    fn test_absorb_rows_into_bare_element() {
        let mut element = Element::new("cpu").with_id("a");
        element.absorb_rows(
            Element::new("cpu").with_statistics(&["timestamp", "avg"], vec![vec![json!("t1"), json!(1.0)]]),
        );
        assert_eq!(element.row_count(), 1);
        assert_eq!(element.columns, vec!["timestamp", "avg"]);
        assert!(element.statistics.is_some());

        element.absorb_rows(Element::new("cpu"));
        assert_eq!(element.row_count(), 1);
    }

    #[test]
    fn test_series_serializes_as_pairs() {
        let mut series = Series::new("cpu".to_string());
        series.add_point(Some(1.5), 1704067200000);
        series.add_point(None, 1704067260000);

        let value = serde_json::to_value(&series).unwrap();
        assert_eq!(
            value,
            json!({"target": "cpu", "datapoints": [[1.5, 1704067200000i64], [null, 1704067260000i64]]})
        );
    }
}
