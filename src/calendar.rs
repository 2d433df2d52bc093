//! Business-day arithmetic. Orders, workloads and date filters are bucketed in
//! the business timezone (a fixed UTC offset), not in UTC.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Offset, TimeDelta, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCalendar {
    offset: FixedOffset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DateBucket {
    Today,
    Yesterday,
    Week,
    Month,
    Quarter,
    Year,
}

/// Half-open `[start, end)` range; `end = None` means "up to now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl BusinessCalendar {
    pub fn new(utc_offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// UTC instant at which the given business date begins.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_midnight = date.and_time(NaiveTime::MIN);
        local_midnight.and_utc() - TimeDelta::seconds(i64::from(self.offset.local_minus_utc()))
    }

    pub fn today_range(&self, now: DateTime<Utc>) -> DateRange {
        let today = self.today(now);
        DateRange {
            start: self.start_of_day(today),
            end: Some(self.start_of_day(today + TimeDelta::days(1))),
        }
    }

    pub fn bucket_range(&self, bucket: DateBucket, now: DateTime<Utc>) -> DateRange {
        let today = self.today(now);
        match bucket {
            DateBucket::Today => self.today_range(now),
            DateBucket::Yesterday => DateRange {
                start: self.start_of_day(today - TimeDelta::days(1)),
                end: Some(self.start_of_day(today)),
            },
            DateBucket::Week => DateRange {
                start: self.start_of_day(today - TimeDelta::days(7)),
                end: None,
            },
            DateBucket::Month => {
                let first = first_of_month(today.year(), today.month());
                let next = if today.month() == 12 {
                    first_of_month(today.year() + 1, 1)
                } else {
                    first_of_month(today.year(), today.month() + 1)
                };
                DateRange {
                    start: self.start_of_day(first),
                    end: Some(self.start_of_day(next)),
                }
            }
            DateBucket::Quarter => {
                let quarter_month = ((today.month() - 1) / 3) * 3 + 1;
                DateRange {
                    start: self.start_of_day(first_of_month(today.year(), quarter_month)),
                    end: None,
                }
            }
            DateBucket::Year => DateRange {
                start: self.start_of_day(first_of_month(today.year(), 1)),
                end: Some(self.start_of_day(first_of_month(today.year() + 1, 1))),
            },
        }
    }
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self::new(4)
    }
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && self.end.is_none_or(|end| at < end)
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn business_day_starts_at_local_midnight() {
        let calendar = BusinessCalendar::new(4);
        // 21:30 UTC is already the next day at UTC+4.
        let now = Utc.with_ymd_and_hms(2025, 1, 21, 21, 30, 0).unwrap();
        let today = calendar.today(now);
        assert_eq!(today, NaiveDate::from_ymd_opt(2025, 1, 22).unwrap());
        assert_eq!(
            calendar.start_of_day(today),
            Utc.with_ymd_and_hms(2025, 1, 21, 20, 0, 0).unwrap()
        );
    }

    #[test]
    fn yesterday_ends_where_today_begins() {
        let calendar = BusinessCalendar::default();
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap();
        let today = calendar.bucket_range(DateBucket::Today, now);
        let yesterday = calendar.bucket_range(DateBucket::Yesterday, now);
        assert_eq!(yesterday.end, Some(today.start));
        assert!(today.contains(now));
        assert!(!yesterday.contains(now));
    }

    #[test]
    fn month_bucket_rolls_over_the_year() {
        let calendar = BusinessCalendar::utc();
        let now = Utc.with_ymd_and_hms(2024, 12, 15, 12, 0, 0).unwrap();
        let range = calendar.bucket_range(DateBucket::Month, now);
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(range.end, Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn open_ended_buckets_run_up_to_now() {
        let calendar = BusinessCalendar::utc();
        let now = Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).unwrap();
        let quarter = calendar.bucket_range(DateBucket::Quarter, now);
        assert_eq!(quarter.start, Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap());
        assert_eq!(quarter.end, None);
        assert!(quarter.contains(now + TimeDelta::days(365)));
    }
}
