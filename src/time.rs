use chrono::{DateTime, Months, TimeDelta, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RELATIVE: Regex = Regex::new(r"^now(?:([+-])(\d+)([smhdwMy]))?$").unwrap();
}

/// Turns dashboard date expressions into absolute instants.
pub trait DateMath: Send + Sync {
    fn parse(&self, expression: &str) -> Option<DateTime<Utc>>;
}

/// Understands `now`, `now-6h` style offsets, RFC 3339 and epoch millis.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelativeDateMath;

impl RelativeDateMath {
    pub fn parse_at(expression: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let expression = expression.trim();

        if let Some(captures) = RELATIVE.captures(expression) {
            let (Some(sign), Some(count), Some(unit)) =
                (captures.get(1), captures.get(2), captures.get(3))
            else {
                return Some(now);
            };
            let count: i64 = count.as_str().parse().ok()?;
            let negative = sign.as_str() == "-";

            return match unit.as_str() {
                "M" | "y" => {
                    let months = if unit.as_str() == "y" {
                        count.checked_mul(12)?
                    } else {
                        count
                    };
                    let months = Months::new(u32::try_from(months).ok()?);
                    if negative {
                        now.checked_sub_months(months)
                    } else {
                        now.checked_add_months(months)
                    }
                }
                unit => {
                    let offset = match unit {
                        "s" => TimeDelta::try_seconds(count),
                        "m" => TimeDelta::try_minutes(count),
                        "h" => TimeDelta::try_hours(count),
                        "d" => TimeDelta::try_days(count),
                        "w" => TimeDelta::try_weeks(count),
                        _ => None,
                    }?;
                    if negative {
                        now.checked_sub_signed(offset)
                    } else {
                        now.checked_add_signed(offset)
                    }
                }
            };
        }

        if let Ok(instant) = DateTime::parse_from_rfc3339(expression) {
            return Some(instant.with_timezone(&Utc));
        }

        expression
            .parse::<i64>()
            .ok()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
    }
}

impl DateMath for RelativeDateMath {
    fn parse(&self, expression: &str) -> Option<DateTime<Utc>> {
        Self::parse_at(expression, Utc::now())
    }
}

/// A range bound for the API; the literal `now` leaves the bound open.
pub fn translate_time(date_math: &dyn DateMath, expression: &str) -> Option<DateTime<Utc>> {
    if expression == "now" {
        return None;
    }
    date_math.parse(expression)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_relative_offsets() {
        assert_eq!(
            RelativeDateMath::parse_at("now-6h", noon()),
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 6, 0, 0).unwrap())
        );
        assert_eq!(
            RelativeDateMath::parse_at("now-1M", noon()),
            Some(Utc.with_ymd_and_hms(2024, 2, 15, 12, 0, 0).unwrap())
        );
        assert_eq!(
            RelativeDateMath::parse_at("now+1d", noon()),
            Some(Utc.with_ymd_and_hms(2024, 3, 16, 12, 0, 0).unwrap())
        );
        assert_eq!(RelativeDateMath::parse_at("now", noon()), Some(noon()));
    }

    #[test]
    fn test_out_of_range_offsets_are_unparseable() {
        assert_eq!(RelativeDateMath::parse_at("now-999999999d", noon()), None);
        assert_eq!(RelativeDateMath::parse_at("now+999999999d", noon()), None);
        assert_eq!(RelativeDateMath::parse_at("now-99999999999999999w", noon()), None);
        assert_eq!(RelativeDateMath::parse_at("now-999999999999999999y", noon()), None);
        assert_eq!(RelativeDateMath::parse_at("now-99999999999999999999s", noon()), None);
    }

    #[test]
    fn test_absolute_instants() {
        assert_eq!(
            RelativeDateMath::parse_at("2024-03-15T12:00:00Z", Utc::now()),
            Some(noon())
        );
        assert_eq!(
            RelativeDateMath::parse_at("1710504000000", Utc::now()),
            Some(noon())
        );
        assert_eq!(RelativeDateMath::parse_at("soon", Utc::now()), None);
    }

    #[test]
    fn test_now_leaves_bound_open() {
        assert_eq!(translate_time(&RelativeDateMath, "now"), None);
        assert!(translate_time(&RelativeDateMath, "now-1h").is_some());
    }
}
