use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Weekday};
use std::collections::BTreeSet;

pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[must_use]
pub const fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// ISO week bucket such as `2024-W01`.
#[must_use]
pub fn week_bucket<Tz: TimeZone>(ts: &DateTime<Tz>) -> String {
    let week = ts.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

#[must_use]
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[must_use]
pub fn hour_of<Tz: TimeZone>(ts: &DateTime<Tz>) -> u32 {
    ts.hour()
}

/// Lengths of the maximal runs of consecutive days in `dates`.
fn streaks(dates: &BTreeSet<NaiveDate>) -> Vec<u32> {
    let mut lengths = Vec::new();
    let mut previous: Option<NaiveDate> = None;
    let mut current = 0;

    for &date in dates {
        match previous {
            Some(prev) if prev.succ_opt() == Some(date) => current += 1,
            Some(_) => {
                lengths.push(current);
                current = 1;
            }
            None => current = 1,
        }
        previous = Some(date);
    }

    if current > 0 {
        lengths.push(current);
    }

    lengths
}

/// Mean length of the streaks in `dates`, or 0.0 when there is no activity.
#[must_use]
#[expect(clippy::cast_precision_loss, reason = "streak counts are far below 2^52")]
pub fn average_streak(dates: &BTreeSet<NaiveDate>) -> f64 {
    let lengths = streaks(dates);
    if lengths.is_empty() {
        return 0.0;
    }

    let total: u32 = lengths.iter().sum();
    f64::from(total) / lengths.len() as f64
}

#[must_use]
pub fn longest_streak(dates: &BTreeSet<NaiveDate>) -> u32 {
    streaks(dates).into_iter().max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn dates(items: &[&str]) -> BTreeSet<NaiveDate> {
        items.iter().map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()).collect()
    }

    #[test]
    fn test_average_streak() {
        let set = dates(&["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-10"]);
        assert!((average_streak(&set) - 2.0).abs() < f64::EPSILON);
        assert_eq!(longest_streak(&set), 3);
    }

    #[test]
    fn test_average_streak_empty() {
        let set = BTreeSet::new();
        assert!(average_streak(&set).abs() < f64::EPSILON);
        assert_eq!(longest_streak(&set), 0);
    }

    #[test]
    fn test_isolated_days() {
        let set = dates(&["2024-01-01", "2024-01-03", "2024-01-05"]);
        assert!((average_streak(&set) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_streak_crosses_month_and_year() {
        let set = dates(&["2023-12-31", "2024-01-01", "2024-02-29", "2024-03-01"]);
        assert_eq!(streaks(&set), vec![2, 2]);
    }

    #[test]
    fn test_week_bucket_uses_iso_year() {
        let ts = DateTime::parse_from_rfc3339("2021-01-03T12:00:00Z").unwrap();
        assert_eq!(week_bucket(&ts), "2020-W53");

        let ts = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(week_bucket(&ts), "2024-W01");
    }

    #[test]
    fn test_features_use_local_offset() {
        // 23:30 on a Sunday in UTC-5 is already Monday in UTC
        let ts: DateTime<FixedOffset> = DateTime::parse_from_rfc3339("2024-01-07T23:30:00-05:00").unwrap();
        assert_eq!(hour_of(&ts), 23);
        assert_eq!(weekday_name(ts.weekday()), "Sunday");
        assert_eq!(date_key(ts.date_naive()), "2024-01-07");

        let utc = ts.with_timezone(&Utc);
        assert_eq!(weekday_name(utc.weekday()), "Monday");
    }
}
