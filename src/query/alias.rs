use super::builder::{PARAM_ALIAS, PARAM_DIMENSIONS};
use super::QueryString;

/// Replaces `@key` tokens in `template` with dimension values.
///
/// Keys are applied longest first so `@region` is never eaten by a shorter
/// `@reg`. Tokens without a matching key stay as written.
pub fn substitute<'a, I>(template: &str, dimensions: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut pairs: Vec<(&str, &str)> = dimensions.into_iter().collect();
    pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    pairs
        .into_iter()
        .fold(template.to_string(), |label, (key, value)| {
            label.replace(&format!("@{}", key), value)
        })
}

/// Dimension pairs embedded in the query's own `dimensions` parameter.
pub fn query_dimensions(query: &QueryString) -> Vec<(&str, &str)> {
    query
        .get(PARAM_DIMENSIONS)
        .map(|dimensions| {
            dimensions
                .split(',')
                .filter_map(|pair| {
                    let mut parts = pair.split(':');
                    Some((parts.next()?, parts.next()?))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Fills the alias of each fully-expanded query from its own dimensions.
pub fn auto_alias(queries: Vec<QueryString>) -> Vec<QueryString> {
    queries
        .into_iter()
        .map(|query| {
            let resolved = query
                .get(PARAM_ALIAS)
                .filter(|alias| alias.contains('@'))
                .and_then(|alias| {
                    let dimensions = query_dimensions(&query);
                    (!dimensions.is_empty()).then(|| substitute(alias, dimensions))
                });
            match resolved {
                Some(alias) => query.with_param(PARAM_ALIAS, &alias),
                None => query,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_longest_key_first() {
        let label = substitute("@region-@reg", vec![("reg", "r"), ("region", "us")]);
        assert_eq!(label, "us-r");
    }

    #[test]
    fn test_substitute_leaves_unknown_tokens() {
        let label = substitute("@region-@az", vec![("region", "us")]);
        assert_eq!(label, "us-@az");
    }

    #[test]
    fn test_auto_alias_uses_query_dimensions() {
        let query = QueryString::new("/v2.0/metrics/measurements")
            .with_param("name", "cpu")
            .with_param("dimensions", "hostname:web1,az:1a")
            .with_param("alias", "@hostname in @az");

        let aliased = auto_alias(vec![query]);
        assert_eq!(aliased[0].get("alias"), Some("web1 in 1a"));
    }

    #[test]
    fn test_auto_alias_skips_plain_alias() {
        let query = QueryString::new("/p")
            .with_param("dimensions", "hostname:web1")
            .with_param("alias", "cpu");
        assert_eq!(auto_alias(vec![query.clone()]), vec![query]);
    }

    #[test]
    fn test_auto_alias_without_dimensions() {
        let query = QueryString::new("/p").with_param("alias", "@hostname");
        assert_eq!(auto_alias(vec![query.clone()]), vec![query]);
    }
}
