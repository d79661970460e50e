use super::QueryString;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BRACE_GROUP: Regex = Regex::new(r"\{[^}]*\}").unwrap();
}

/// First `{a,b,...}` token found scanning parameter values in order.
fn first_brace_group(query: &QueryString) -> Option<String> {
    query
        .params()
        .iter()
        .find_map(|(_, value)| BRACE_GROUP.find(value))
        .map(|m| m.as_str().to_string())
}

/// Expands brace alternations into one query per combination.
///
/// The first group is resolved first; each option replaces every occurrence
/// of that exact token, and each branch is expanded again for the groups
/// that remain. A query without a group comes back as-is. Unbalanced braces
/// never match and are left in the output verbatim.
pub fn expand(query: &QueryString) -> Vec<QueryString> {
    let Some(token) = first_brace_group(query) else {
        return vec![query.clone()];
    };

    token[1..token.len() - 1]
        .split(',')
        .flat_map(|option| expand(&query.replace_all(&token, option)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(dimensions: &str) -> QueryString {
        QueryString::new("/v2.0/metrics/measurements")
            .with_param("name", "cpu")
            .with_param("dimensions", dimensions)
    }

    #[test]
    fn test_no_group_is_identity() {
        let q = query("hostname:web1");
        assert_eq!(expand(&q), vec![q]);
    }

    #[test]
    fn test_single_group_follows_option_order() {
        let expanded = expand(&query("hostname:{web1,web2,web3}"));
        let dims: Vec<_> = expanded.iter().map(|q| q.get("dimensions").unwrap()).collect();
        assert_eq!(dims, vec!["hostname:web1", "hostname:web2", "hostname:web3"]);
    }

    #[test]
    fn test_groups_expand_as_cartesian_product() {
        let expanded = expand(&query("hostname:{a,b},az:{1,2,3}"));
        assert_eq!(expanded.len(), 6);
        let dims: Vec<_> = expanded.iter().map(|q| q.get("dimensions").unwrap()).collect();
        assert_eq!(
            dims,
            vec![
                "hostname:a,az:1",
                "hostname:a,az:2",
                "hostname:a,az:3",
                "hostname:b,az:1",
                "hostname:b,az:2",
                "hostname:b,az:3",
            ]
        );
    }

    #[test]
    fn test_repeated_token_replaced_everywhere() {
        let q = query("hostname:{a,b}").with_param("alias", "host {a,b}");
        let expanded = expand(&q);
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[1].get("alias"), Some("host b"));
        assert_eq!(expanded[1].get("dimensions"), Some("hostname:b"));
    }

    #[test]
    fn test_group_in_metric_name() {
        let q = QueryString::new("/p").with_param("name", "cpu.{idle,user}_perc");
        let names: Vec<_> = expand(&q)
            .iter()
            .map(|q| q.get("name").unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["cpu.idle_perc", "cpu.user_perc"]);
    }

    #[test]
    fn test_unbalanced_brace_left_verbatim() {
        let q = query("hostname:{web1,web2");
        assert_eq!(expand(&q), vec![q]);
    }
}
