use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::dates::flexible_date_opt;

/// Fingerprint enrollments allowed per employee.
pub const MAX_FINGERPRINT_ENROLLMENTS: u8 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    #[serde(rename = "_id")]
    pub id: String,

    /// Generated `EMP-####` code, immutable once assigned.
    #[serde(default)]
    pub employee_id: Option<String>,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub contact_number: Option<String>,

    #[serde(default)]
    pub position: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub employment_type: Option<String>,

    #[serde(default)]
    pub salary: Option<f64>,

    #[serde(default)]
    pub daily_rate: Option<f64>,

    #[serde(default, with = "flexible_date_opt")]
    pub hire_date: Option<NaiveDate>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub fingerprint_enrolled: bool,

    #[serde(default)]
    pub fingerprint_enrollment_count: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint_template: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fingerprint_templates: Vec<String>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Rate used for cash-advance limits. Falls back to `salary`, which
    /// the payroll screens treat as the daily rate when no explicit one
    /// is set.
    pub fn current_daily_rate(&self) -> Option<f64> {
        self.daily_rate.or(self.salary).filter(|rate| *rate > 0.0)
    }

    pub fn enrollments_remaining(&self) -> u8 {
        MAX_FINGERPRINT_ENROLLMENTS.saturating_sub(self.fingerprint_enrollment_count)
    }
}

/// Profile fields captured by the Add-Employee form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDraft {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<f64>,
    #[serde(
        default,
        with = "flexible_date_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub hire_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl EmployeeDraft {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Create payload: the form fields plus the generated credentials.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployee {
    #[serde(flatten)]
    pub profile: EmployeeDraft,
    pub employee_id: String,
    pub username: String,
    pub password: String,
    pub fingerprint_enrolled: bool,
    pub fingerprint_enrollment_count: u8,
}

/// Edit payload. Credentials are deliberately absent: `employeeId` and
/// `username` never change after creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint_enrolled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint_enrollment_count: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint_templates: Option<Vec<String>>,
}

/// Short form of an employee as embedded in attendance, payroll and
/// deduction records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Either a bare id or a populated employee document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmployeeRef {
    Id(String),
    Populated(EmployeeSummary),
}

impl EmployeeRef {
    pub fn id(&self) -> &str {
        match self {
            EmployeeRef::Id(id) => id,
            EmployeeRef::Populated(summary) => &summary.id,
        }
    }

    pub fn display_name(&self) -> Option<String> {
        match self {
            EmployeeRef::Id(_) => None,
            EmployeeRef::Populated(s) => Some(format!("{} {}", s.first_name, s.last_name).trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub search: Option<String>,
}

impl EmployeeQuery {
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(status) = &self.status {
            pairs.push(("status".to_string(), status.clone()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search".to_string(), search.clone()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_backend_document() {
        let employee: Employee = serde_json::from_value(json!({
            "_id": "664f1c",
            "employeeId": "EMP-0420",
            "firstName": "Maria",
            "lastName": "Santos",
            "email": "maria@company.ph",
            "dailyRate": 550,
            "hireDate": "2024-01-15T00:00:00.000Z",
            "fingerprintEnrolled": true,
            "fingerprintEnrollmentCount": 2,
            "__v": 0
        }))
        .unwrap();

        assert_eq!(employee.full_name(), "Maria Santos");
        assert_eq!(employee.current_daily_rate(), Some(550.0));
        assert_eq!(employee.hire_date, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(employee.enrollments_remaining(), 1);
    }

    #[test]
    fn update_payload_never_carries_credentials() {
        let update = EmployeeUpdate {
            first_name: Some("Jose".into()),
            ..Default::default()
        };
        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(body, json!({ "firstName": "Jose" }));
    }

    #[test]
    fn employee_ref_accepts_id_or_document() {
        let bare: EmployeeRef = serde_json::from_value(json!("E1")).unwrap();
        assert_eq!(bare.id(), "E1");

        let populated: EmployeeRef =
            serde_json::from_value(json!({ "_id": "E2", "firstName": "Ana", "lastName": "Cruz" }))
                .unwrap();
        assert_eq!(populated.id(), "E2");
        assert_eq!(populated.display_name().as_deref(), Some("Ana Cruz"));
    }
}
