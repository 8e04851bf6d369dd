//! Client-side cash-advance rules.
//!
//! These checks exist so the form can fail fast; the backend remains the
//! authority and must enforce the same limits.

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::attendance::AttendanceRecord;
use crate::model::deduction::Deduction;
use crate::utils::money::format_peso;
use crate::utils::period::DateRange;

/// Multiple of the daily rate an employee may borrow.
pub const MAX_ADVANCE_MULTIPLIER: f64 = 2.0;

/// Full-day attendance records required in the current week.
pub const REQUIRED_FULL_DAYS: usize = 2;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Cash advance amount must be greater than zero")]
    AmountNotPositive,

    #[error("Employee has no daily rate on record")]
    MissingDailyRate,

    #[error("Cash advance can only be requested once per week")]
    AlreadyAdvancedThisWeek,

    #[error(
        "Cash advance amount cannot exceed {} (2× daily rate of {})",
        peso(.limit),
        peso(.daily_rate)
    )]
    AmountExceedsLimit { limit: f64, daily_rate: f64 },

    #[error(
        "Employee needs at least {required} full-day attendance records this week (found {found})"
    )]
    InsufficientAttendance { required: usize, found: usize },
}

fn peso(amount: &f64) -> String {
    format_peso(*amount)
}

pub fn max_cash_advance(daily_rate: f64) -> f64 {
    daily_rate * MAX_ADVANCE_MULTIPLIER
}

/// Everything the rules look at, gathered before any request is sent.
#[derive(Debug, Clone)]
pub struct CashAdvanceCheck<'a> {
    pub employee_id: &'a str,
    pub daily_rate: Option<f64>,
    pub amount: f64,
    pub on: NaiveDate,
    pub existing: &'a [Deduction],
    pub attendance: &'a [AttendanceRecord],
}

/// Runs the rules in the order the form reports them: amount sanity,
/// weekly cap, amount ceiling, attendance threshold.
pub fn validate(check: &CashAdvanceCheck<'_>) -> Result<(), ValidationError> {
    if !(check.amount > 0.0) {
        return Err(ValidationError::AmountNotPositive);
    }

    let daily_rate = check
        .daily_rate
        .filter(|rate| *rate > 0.0)
        .ok_or(ValidationError::MissingDailyRate)?;

    let week = DateRange::work_week(check.on);

    let advanced_this_week = check.existing.iter().any(|d| {
        d.is_advance() && d.employee_id() == Some(check.employee_id) && week.contains(d.date)
    });
    if advanced_this_week {
        return Err(ValidationError::AlreadyAdvancedThisWeek);
    }

    let limit = max_cash_advance(daily_rate);
    if check.amount > limit {
        return Err(ValidationError::AmountExceedsLimit { limit, daily_rate });
    }

    let full_days = check
        .attendance
        .iter()
        .filter(|r| r.employee_id() == Some(check.employee_id) && week.contains(r.date))
        .filter(|r| r.is_full_day())
        .count();
    if full_days < REQUIRED_FULL_DAYS {
        return Err(ValidationError::InsufficientAttendance {
            required: REQUIRED_FULL_DAYS,
            found: full_days,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::employee::EmployeeRef;

    // Wednesday
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 8).unwrap()
    }

    fn full_day(id: &str, date: NaiveDate) -> AttendanceRecord {
        AttendanceRecord {
            id: id.to_string(),
            employee: Some(EmployeeRef::Id("E1".into())),
            date,
            time_in: Some("08:00".into()),
            time_out: Some("17:00".into()),
            day_type: Some("Full Day".into()),
            status: None,
        }
    }

    fn advance(date: NaiveDate) -> Deduction {
        Deduction {
            id: "D1".into(),
            employee: Some(EmployeeRef::Id("E1".into())),
            amount: 500.0,
            date,
            kind: "Advance".into(),
            description: None,
            archived: false,
        }
    }

    fn two_full_days() -> Vec<AttendanceRecord> {
        vec![
            full_day("A1", NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()),
            full_day("A2", NaiveDate::from_ymd_opt(2024, 5, 7).unwrap()),
        ]
    }

    fn check<'a>(
        amount: f64,
        existing: &'a [Deduction],
        attendance: &'a [AttendanceRecord],
    ) -> CashAdvanceCheck<'a> {
        CashAdvanceCheck {
            employee_id: "E1",
            daily_rate: Some(550.0),
            amount,
            on: today(),
            existing,
            attendance,
        }
    }

    #[test]
    fn rows_without_an_employee_belong_to_nobody() {
        let orphan_advance = Deduction {
            employee: None,
            ..advance(today())
        };
        let mut attendance = vec![full_day("A1", NaiveDate::from_ymd_opt(2024, 5, 6).unwrap())];
        attendance.push(AttendanceRecord {
            employee: None,
            ..full_day("A2", NaiveDate::from_ymd_opt(2024, 5, 7).unwrap())
        });

        let err = validate(&check(500.0, &[orphan_advance], &attendance)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InsufficientAttendance {
                required: 2,
                found: 1
            }
        );
    }

    #[test]
    fn exactly_twice_the_daily_rate_is_allowed() {
        let attendance = two_full_days();
        assert_eq!(validate(&check(1100.0, &[], &attendance)), Ok(()));
    }

    #[test]
    fn one_cent_over_the_ceiling_is_rejected() {
        let attendance = two_full_days();
        let err = validate(&check(1100.01, &[], &attendance)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::AmountExceedsLimit {
                limit: 1100.0,
                daily_rate: 550.0
            }
        );
        assert!(err.to_string().contains("cannot exceed ₱1,100"));
    }

    #[test]
    fn second_advance_in_the_same_week_is_rejected_regardless_of_amount() {
        let attendance = two_full_days();
        let existing = [advance(NaiveDate::from_ymd_opt(2024, 5, 6).unwrap())];

        for amount in [1.0, 1100.0, 5000.0] {
            let err = validate(&check(amount, &existing, &attendance)).unwrap_err();
            assert_eq!(err, ValidationError::AlreadyAdvancedThisWeek);
            assert!(err.to_string().contains("once per week"));
        }
    }

    #[test]
    fn advance_from_last_week_does_not_count() {
        let attendance = two_full_days();
        let existing = [advance(NaiveDate::from_ymd_opt(2024, 5, 4).unwrap())];
        assert_eq!(validate(&check(800.0, &existing, &attendance)), Ok(()));
    }

    #[test]
    fn needs_two_full_days_this_week() {
        let mut attendance = two_full_days();
        attendance[1].day_type = Some("Half Day".into());

        let err = validate(&check(500.0, &[], &attendance)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InsufficientAttendance {
                required: 2,
                found: 1
            }
        );
    }

    #[test]
    fn rejects_non_positive_amounts_and_missing_rate() {
        let attendance = two_full_days();
        assert_eq!(
            validate(&check(0.0, &[], &attendance)),
            Err(ValidationError::AmountNotPositive)
        );

        let mut no_rate = check(100.0, &[], &attendance);
        no_rate.daily_rate = None;
        assert_eq!(validate(&no_rate), Err(ValidationError::MissingDailyRate));
    }
}
