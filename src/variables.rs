use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashMap;

lazy_static! {
    static ref VARIABLE: Regex = Regex::new(r"\$(\w+)|\[\[(\w+)\]\]").unwrap();
}

pub type ScopedVars = HashMap<String, String>;

/// Dashboard template-variable lookup.
pub trait TemplateVariables: Send + Sync {
    /// Replaces `$name` tokens in `text`; `scope` wins over global values.
    fn replace(&self, text: &str, scope: &ScopedVars) -> String;

    /// Names of every known variable, without the `$` prefix.
    fn names(&self) -> Vec<String>;
}

/// Fixed set of variables, as configured on a dashboard.
///
/// Multi-value variables render as `{a,b}` so that the query expander fans
/// them out into one query per value. Unknown tokens such as `$all` are
/// left alone.
#[derive(Debug, Clone, Default)]
pub struct StaticVariables {
    variables: Vec<(String, Vec<String>)>,
}

impl StaticVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variable(mut self, name: &str, values: &[&str]) -> Self {
        let values = values.iter().map(|v| v.to_string()).collect();
        match self.variables.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = values,
            None => self.variables.push((name.to_string(), values)),
        }
        self
    }

    fn render(values: &[String]) -> Option<String> {
        match values {
            [] => None,
            [single] => Some(single.clone()),
            many => Some(format!("{{{}}}", many.join(","))),
        }
    }
}

impl TemplateVariables for StaticVariables {
    fn replace(&self, text: &str, scope: &ScopedVars) -> String {
        VARIABLE
            .replace_all(text, |captures: &Captures| {
                let name = captures
                    .get(1)
                    .or_else(|| captures.get(2))
                    .map_or("", |m| m.as_str());
                scope
                    .get(name)
                    .cloned()
                    .or_else(|| {
                        self.variables
                            .iter()
                            .find(|(n, _)| n == name)
                            .and_then(|(_, values)| Self::render(values))
                    })
                    .unwrap_or_else(|| captures[0].to_string())
            })
            .into_owned()
    }

    fn names(&self) -> Vec<String> {
        self.variables.iter().map(|(name, _)| name.clone()).collect()
    }
}
