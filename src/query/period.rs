use super::builder::PARAM_PERIOD;
use super::QueryString;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref INTERVAL: Regex = Regex::new(r"^(\d+(?:\.\d+)?)(ms|[Mwdhmsy])$").unwrap();
}

/// Whole seconds for a human interval such as `1m` or `2h`.
///
/// The count is truncated to an integer before scaling; `ms` intervals are
/// floored to whole seconds. Counts too large for `u64` seconds are not
/// intervals.
pub fn interval_to_seconds(interval: &str) -> Option<u64> {
    let captures = INTERVAL.captures(interval)?;
    let count = captures[1].parse::<f64>().ok()?.trunc() as u64;

    let seconds = match &captures[2] {
        "ms" => return Some(count / 1000),
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "w" => 604_800,
        "M" => 2_592_000,
        "y" => 31_536_000,
        _ => return None,
    };
    count.checked_mul(seconds)
}

/// Rewrites `period` to seconds when it is a recognized interval.
pub fn normalize_period(query: &QueryString) -> QueryString {
    let mut normalized = query.clone();
    if let Some(seconds) = query.get(PARAM_PERIOD).and_then(interval_to_seconds) {
        normalized.set(PARAM_PERIOD, &seconds.to_string());
    }
    normalized
}
