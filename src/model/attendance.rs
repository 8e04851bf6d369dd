use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::model::employee::{EmployeeRef, EmployeeSummary};
use crate::utils::dates::{flexible_date, format_date};
use crate::utils::period::DateRange;

pub const FULL_DAY: &str = "Full Day";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(rename = "_id")]
    pub id: String,
    /// `None` once the referenced employee has been deleted.
    #[serde(default)]
    pub employee: Option<EmployeeRef>,
    #[serde(with = "flexible_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub time_in: Option<String>,
    #[serde(default)]
    pub time_out: Option<String>,
    #[serde(default)]
    pub day_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl AttendanceRecord {
    pub fn employee_id(&self) -> Option<&str> {
        self.employee.as_ref().map(EmployeeRef::id)
    }

    pub fn is_full_day(&self) -> bool {
        [&self.day_type, &self.status]
            .into_iter()
            .flatten()
            .any(|label| label.eq_ignore_ascii_case(FULL_DAY))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAttendance {
    pub employee: String,
    #[serde(with = "flexible_date")]
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_out: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttendanceStats {
    pub total_present: u32,
    pub full_day: u32,
    pub half_day: u32,
    pub absent: u32,
    pub invalid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScanAction {
    TimeIn,
    TimeOut,
}

/// Result of a fingerprint scan at the attendance terminal.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceScan {
    #[serde(default)]
    pub success: bool,
    pub action: ScanAction,
    #[serde(default)]
    pub employee: Option<EmployeeSummary>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Filters for `GET /attendance` and `GET /attendance/stats`. Either or
/// both of employee and date range may be set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceQuery {
    pub employee_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl AttendanceQuery {
    pub fn for_employee_in(employee_id: &str, range: DateRange) -> Self {
        Self {
            employee_id: Some(employee_id.to_string()),
            ..Self::default()
        }
        .within(range)
    }

    pub fn within(mut self, range: DateRange) -> Self {
        self.start_date = Some(range.start);
        self.end_date = Some(range.end);
        self
    }

    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = &self.employee_id {
            pairs.push(("employeeId".to_string(), id.clone()));
        }
        if let Some(start) = self.start_date {
            pairs.push(("startDate".to_string(), format_date(start)));
        }
        if let Some(end) = self.end_date {
            pairs.push(("endDate".to_string(), format_date(end)));
        }
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_day_reads_day_type_or_status() {
        let record: AttendanceRecord = serde_json::from_value(json!({
            "_id": "A1",
            "employee": "E1",
            "date": "2024-05-06T00:00:00.000Z",
            "timeIn": "08:00",
            "timeOut": "17:00",
            "status": "full day"
        }))
        .unwrap();
        assert!(record.is_full_day());

        let half = AttendanceRecord {
            day_type: Some("Half Day".into()),
            status: None,
            ..record
        };
        assert!(!half.is_full_day());
    }

    #[test]
    fn query_pairs_use_backend_names() {
        let range = DateRange::work_week(NaiveDate::from_ymd_opt(2024, 5, 8).unwrap());
        let pairs = AttendanceQuery::for_employee_in("E1", range).pairs();
        assert_eq!(
            pairs,
            vec![
                ("employeeId".to_string(), "E1".to_string()),
                ("startDate".to_string(), "2024-05-06".to_string()),
                ("endDate".to_string(), "2024-05-11".to_string()),
            ]
        );
    }

    #[test]
    fn orphaned_record_decodes_without_employee() {
        let record: AttendanceRecord = serde_json::from_value(json!({
            "_id": "A2",
            "employee": null,
            "date": "2024-05-07",
            "status": "Full Day"
        }))
        .unwrap();
        assert_eq!(record.employee, None);
        assert_eq!(record.employee_id(), None);
    }

    #[test]
    fn scan_action_is_snake_case() {
        let scan: AttendanceScan =
            serde_json::from_value(json!({ "success": true, "action": "time_out" })).unwrap();
        assert_eq!(scan.action, ScanAction::TimeOut);
        assert_eq!(scan.action.to_string(), "time_out");
    }
}
