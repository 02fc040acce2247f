use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Half-open calendar month `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MonthWindow {
    /// First day of the month
    pub start: NaiveDate,
    /// First day of the following month (exclusive)
    pub end: NaiveDate,
}

impl MonthWindow {
    /// Window of the month that contains `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let start = first_of_month(date);
        // Adding one month to the first day never overflows for chrono's supported range
        let end = start
            .checked_add_months(Months::new(1))
            .unwrap_or(NaiveDate::MAX);
        Self { start, end }
    }

    /// Start of the window as a UTC instant.
    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// End of the window as a UTC instant (exclusive).
    pub fn end_utc(&self) -> DateTime<Utc> {
        self.end.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start_utc() && instant < self.end_utc()
    }
}

/// Normalizes a date to the first day of its month.
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
