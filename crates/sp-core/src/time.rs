//! UTC time helpers shared by decay, windows and retention.

use chrono::{DateTime, Utc};

use crate::constants::SECONDS_PER_DAY;

pub type Timestamp = DateTime<Utc>;

/// Elapsed time from `from` to `to` in fractional days, floored at 0.
pub fn elapsed_days(from: Timestamp, to: Timestamp) -> f64 {
    let millis = (to - from).num_milliseconds().max(0);
    millis as f64 / 1000.0 / SECONDS_PER_DAY
}

/// Whole calendar days between the UTC dates of `then` and `now`.
/// A timestamp later than `now` has age 0.
pub fn age_in_days(then: Timestamp, now: Timestamp) -> i64 {
    (now.date_naive() - then.date_naive()).num_days().max(0)
}

/// Render a timestamp in RFC 3339 with second precision and a `Z` suffix.
pub fn to_rfc3339(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_rfc3339(s: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_elapsed_fractional_days() {
        let t0 = at(2026, 3, 1, 0);
        assert!((elapsed_days(t0, t0 + Duration::hours(12)) - 0.5).abs() < 1e-12);
        assert!((elapsed_days(t0, t0 + Duration::days(3)) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_elapsed_floors_at_zero() {
        let t0 = at(2026, 3, 1, 0);
        assert_eq!(elapsed_days(t0, t0 - Duration::days(2)), 0.0);
    }

    #[test]
    fn test_age_uses_calendar_dates() {
        // 23:00 yesterday is one calendar day old even though only 2h elapsed
        let now = at(2026, 3, 2, 1);
        assert_eq!(age_in_days(at(2026, 3, 1, 23), now), 1);
        assert_eq!(age_in_days(now, now), 0);
        assert_eq!(age_in_days(now + Duration::days(1), now), 0);
    }

    #[test]
    fn test_rfc3339_roundtrip() {
        let ts = at(2026, 2, 21, 0);
        let s = to_rfc3339(ts);
        assert_eq!(s, "2026-02-21T00:00:00Z");
        assert_eq!(parse_rfc3339(&s), Some(ts));
        assert_eq!(parse_rfc3339("not a date"), None);
    }
}
