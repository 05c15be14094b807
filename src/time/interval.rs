use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::grain::TimeGrain;

/// An inclusive `[date_from, date_to]` interval over UTC-normalized
/// datetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatetimeInterval {
    pub date_from: DateTime<Utc>,
    pub date_to: DateTime<Utc>,
}

impl DatetimeInterval {
    pub fn new(date_from: DateTime<Utc>, date_to: DateTime<Utc>) -> Self {
        Self { date_from, date_to }
    }

    pub fn days(&self) -> i64 {
        (self.date_to - self.date_from).num_days() + 1
    }

    pub fn generate_all_dates(&self, grain: TimeGrain) -> Vec<DateTime<Utc>> {
        let mut dates = Vec::new();
        let mut current = grain.truncate_datetime(self.date_from);
        while current <= self.date_to {
            dates.push(current);
            current = grain.next_datetime(current);
        }
        dates
    }

    pub fn clamp(&self, date_from: DateTime<Utc>, date_to: DateTime<Utc>) -> Option<Self> {
        if self.date_from > date_to || self.date_to < date_from {
            return None;
        }
        let date_from = date_from.max(self.date_from);
        let mut date_to = date_to.min(self.date_to);
        date_to = date_to.max(date_from);
        Some(Self { date_from, date_to })
    }

    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let latest_start = self.date_from.max(other.date_from);
        let earliest_end = self.date_to.min(other.date_to);
        if latest_start > earliest_end {
            return None;
        }
        Some(Self {
            date_from: latest_start,
            date_to: earliest_end,
        })
    }

    pub fn contains_date(&self, d: NaiveDate) -> bool {
        self.date_from.date_naive() <= d && d <= self.date_to.date_naive()
    }
}

/// An inclusive `[date_from, date_to]` interval over calendar dates, with no
/// time-of-day component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateInterval {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

impl DateInterval {
    pub fn new(date_from: NaiveDate, date_to: NaiveDate) -> Self {
        Self { date_from, date_to }
    }

    /// Widens to a `DatetimeInterval`. For grains finer than a day, the
    /// upper bound is pushed to one millisecond before the next day so that
    /// sub-day boundaries fall inside the interval.
    pub fn to_datetime_interval(&self, grain: Option<TimeGrain>) -> DatetimeInterval {
        let from = midnight(self.date_from);
        let needs_sub_day = grain
            .map(|g| g.to_minutes() < TimeGrain::Day.to_minutes())
            .unwrap_or(false);
        let to = if needs_sub_day {
            midnight(self.date_to) + Duration::days(1) - Duration::milliseconds(1)
        } else {
            midnight(self.date_to)
        };
        DatetimeInterval::new(from, to)
    }
}

fn midnight(d: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).expect("midnight is always valid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn days_counts_inclusively() {
        let interval = DatetimeInterval::new(midnight(date(2024, 1, 1)), midnight(date(2024, 1, 1)));
        assert_eq!(interval.days(), 1);
        let interval = DatetimeInterval::new(midnight(date(2024, 1, 1)), midnight(date(2024, 1, 3)));
        assert_eq!(interval.days(), 3);
    }

    #[test]
    fn clamp_returns_none_when_disjoint() {
        let interval = DatetimeInterval::new(midnight(date(2024, 1, 1)), midnight(date(2024, 1, 5)));
        assert!(interval
            .clamp(midnight(date(2024, 2, 1)), midnight(date(2024, 2, 5)))
            .is_none());
    }

    #[test]
    fn clamp_narrows_to_overlap() {
        let interval = DatetimeInterval::new(midnight(date(2024, 1, 1)), midnight(date(2024, 1, 10)));
        let clamped = interval
            .clamp(midnight(date(2024, 1, 5)), midnight(date(2024, 1, 20)))
            .unwrap();
        assert_eq!(clamped.date_from, midnight(date(2024, 1, 5)));
        assert_eq!(clamped.date_to, midnight(date(2024, 1, 10)));
    }

    #[test]
    fn intersection_is_symmetric() {
        let a = DatetimeInterval::new(midnight(date(2024, 1, 1)), midnight(date(2024, 1, 10)));
        let b = DatetimeInterval::new(midnight(date(2024, 1, 5)), midnight(date(2024, 1, 20)));
        assert_eq!(a.intersection(&b), b.intersection(&a));
    }

    #[test]
    fn date_interval_to_datetime_interval_without_grain_is_midnight_to_midnight() {
        let d = DateInterval::new(date(2024, 1, 1), date(2024, 1, 3));
        let dt = d.to_datetime_interval(None);
        assert_eq!(dt.date_from, midnight(date(2024, 1, 1)));
        assert_eq!(dt.date_to, midnight(date(2024, 1, 3)));
    }

    #[test]
    fn date_interval_to_datetime_interval_with_sub_day_grain_extends_to_end_of_day() {
        let d = DateInterval::new(date(2024, 1, 1), date(2024, 1, 3));
        let dt = d.to_datetime_interval(Some(TimeGrain::Hour));
        assert_eq!(dt.date_to, midnight(date(2024, 1, 4)) - Duration::milliseconds(1));
    }
}
