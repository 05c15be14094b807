use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeGrain {
    Min15,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeGrain {
    pub fn to_minutes(self) -> i64 {
        match self {
            TimeGrain::Min15 => 15,
            TimeGrain::Hour => TimeGrain::Min15.to_minutes() * 4,
            TimeGrain::Day => TimeGrain::Hour.to_minutes() * 24,
            TimeGrain::Week => TimeGrain::Day.to_minutes() * 7,
            TimeGrain::Month => TimeGrain::Day.to_minutes() * 30,
            TimeGrain::Quarter => TimeGrain::Month.to_minutes() * 3,
            TimeGrain::Year => TimeGrain::Month.to_minutes() * 12,
        }
    }

    pub fn next_datetime(self, dt: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TimeGrain::Min15 => dt + Duration::minutes(15),
            TimeGrain::Hour => dt + Duration::hours(1),
            TimeGrain::Day => dt + Duration::days(1),
            TimeGrain::Week => dt + Duration::days(7),
            TimeGrain::Month => add_months(dt, 1),
            TimeGrain::Quarter => add_months(dt, 3),
            TimeGrain::Year => add_months(dt, 12),
        }
    }

    /// Truncates (min15: rounds) `dt` down to a grain boundary. min15 rounds
    /// to the nearest 15-minute mark rather than truncating, matching the
    /// source behavior; a round-up into the 60-minute mark rolls into the
    /// next hour instead of producing an invalid minute field.
    pub fn truncate_datetime(self, dt: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TimeGrain::Min15 => {
                let rounded = ((dt.minute() as f64) / 15.0).round() as i64 * 15;
                let base = dt
                    .with_minute(0)
                    .unwrap()
                    .with_second(0)
                    .unwrap()
                    .with_nanosecond(0)
                    .unwrap();
                base + Duration::minutes(rounded)
            }
            TimeGrain::Hour => dt
                .with_minute(0)
                .unwrap()
                .with_second(0)
                .unwrap()
                .with_nanosecond(0)
                .unwrap(),
            TimeGrain::Day => dt
                .with_hour(0)
                .unwrap()
                .with_minute(0)
                .unwrap()
                .with_second(0)
                .unwrap()
                .with_nanosecond(0)
                .unwrap(),
            TimeGrain::Week => {
                let day = TimeGrain::Day.truncate_datetime(dt);
                day - Duration::days(day.weekday().num_days_from_monday() as i64)
            }
            TimeGrain::Month => TimeGrain::Day
                .truncate_datetime(dt)
                .with_day(1)
                .expect("day 1 is always valid"),
            TimeGrain::Quarter => {
                let quarter = (dt.month() - 1) / 3 + 1;
                TimeGrain::Month
                    .truncate_datetime(dt)
                    .with_month((quarter - 1) * 3 + 1)
                    .expect("quarter-start month is always valid")
            }
            TimeGrain::Year => TimeGrain::Month
                .truncate_datetime(dt)
                .with_month(1)
                .expect("month 1 is always valid"),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "min15" => Ok(TimeGrain::Min15),
            "hour" => Ok(TimeGrain::Hour),
            "day" => Ok(TimeGrain::Day),
            "week" => Ok(TimeGrain::Week),
            "month" => Ok(TimeGrain::Month),
            "quarter" => Ok(TimeGrain::Quarter),
            "year" => Ok(TimeGrain::Year),
            other => Err(EngineError::UnsupportedXAxis(format!(
                "not supported TimeGrain: {other}"
            ))),
        }
    }
}

impl PartialOrd for TimeGrain {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeGrain {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_minutes().cmp(&other.to_minutes())
    }
}

fn add_months(dt: DateTime<Utc>, months: i32) -> DateTime<Utc> {
    let total = dt.year() * 12 + dt.month() as i32 - 1 + months;
    let year = total.div_euclid(12);
    let month = (total.rem_euclid(12) + 1) as u32;
    let days_in_month = days_in_month(year, month);
    let day = dt.day().min(days_in_month);
    Utc.with_ymd_and_hms(
        year,
        month,
        day,
        dt.hour(),
        dt.minute(),
        dt.second(),
    )
    .single()
    .expect("valid calendar date")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next_month_first = if month == 12 {
        Utc.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).single()
    } else {
        Utc.with_ymd_and_hms(year, month + 1, 1, 0, 0, 0).single()
    }
    .expect("valid calendar date");
    let this_month_first = Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .expect("valid calendar date");
    (next_month_first - this_month_first).num_days() as u32
}
