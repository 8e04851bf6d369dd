use chrono::{Datelike, Duration, NaiveDate};
use strum_macros::{Display, EnumString};

/// Inclusive calendar range used for list filters and weekly rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Monday through Saturday of the week containing `date`.
    /// A Sunday belongs to the week that started the previous Monday,
    /// which means it falls outside its own work week.
    pub fn work_week(date: NaiveDate) -> Self {
        let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
        Self::new(monday, monday + Duration::days(5))
    }

    /// Monday through Sunday.
    pub fn calendar_week(date: NaiveDate) -> Self {
        let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
        Self::new(monday, monday + Duration::days(6))
    }

    pub fn month(date: NaiveDate) -> Self {
        let start = date.with_day(1).unwrap_or(date);
        let next = if start.month() == 12 {
            NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
        };
        let end = next.map(|n| n - Duration::days(1)).unwrap_or(start);
        Self::new(start, end)
    }

    pub fn year(date: NaiveDate) -> Self {
        let start = NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date);
        let end = NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(date);
        Self::new(start, end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// The week / month / year pickers on the attendance and payroll screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PeriodFilter {
    Week,
    Month,
    Year,
}

impl PeriodFilter {
    pub fn range_for(self, date: NaiveDate) -> DateRange {
        match self {
            PeriodFilter::Week => DateRange::calendar_week(date),
            PeriodFilter::Month => DateRange::month(date),
            PeriodFilter::Year => DateRange::year(date),
        }
    }
}
