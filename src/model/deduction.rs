use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::employee::EmployeeRef;
use crate::utils::dates::flexible_date;

pub const ADVANCE: &str = "Advance";

/// A cash advance (or other deduction) later subtracted from payroll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deduction {
    #[serde(rename = "_id")]
    pub id: String,
    /// `None` once the referenced employee has been deleted.
    #[serde(default)]
    pub employee: Option<EmployeeRef>,
    pub amount: f64,
    #[serde(with = "flexible_date")]
    pub date: NaiveDate,
    #[serde(rename = "type", default = "advance")]
    pub kind: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

fn advance() -> String {
    ADVANCE.to_string()
}

impl Deduction {
    pub fn is_advance(&self) -> bool {
        self.kind == ADVANCE
    }

    pub fn employee_id(&self) -> Option<&str> {
        self.employee.as_ref().map(EmployeeRef::id)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCashAdvance {
    pub employee: String,
    pub amount: f64,
    #[serde(with = "flexible_date")]
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeductionQuery {
    pub employee_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl DeductionQuery {
    pub fn for_employee(employee_id: &str) -> Self {
        Self {
            employee_id: Some(employee_id.to_string()),
            ..Self::default()
        }
    }

    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = &self.employee_id {
            pairs.push(("employeeId".to_string(), id.clone()));
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
