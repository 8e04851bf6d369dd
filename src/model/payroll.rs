use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::model::employee::EmployeeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Done,
}

impl PaymentStatus {
    /// Only a pending payroll can be settled, and only once.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Paid | PaymentStatus::Done)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub employee: Option<EmployeeRef>,
    #[serde(default)]
    pub employee_name: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub salary: f64,
    #[serde(default)]
    pub deductions: f64,
    #[serde(default)]
    pub net_salary: Option<f64>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub archived: bool,
}

impl PayrollRecord {
    /// Net pay as reported, or salary minus deductions when the backend
    /// left it out.
    pub fn net(&self) -> f64 {
        self.net_salary.unwrap_or(self.salary - self.deductions)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayroll {
    pub employee: String,
    pub period: String,
    pub salary: f64,
    pub deductions: f64,
    pub net_salary: f64,
}

impl NewPayroll {
    pub fn new(employee: &str, period: &str, salary: f64, deductions: f64) -> Self {
        Self {
            employee: employee.to_string(),
            period: period.to_string(),
            salary,
            deductions,
            net_salary: salary - deductions,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deductions: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_salary: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalaryQuery {
    pub archived: Option<bool>,
    pub employee_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl SalaryQuery {
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(archived) = self.archived {
            pairs.push(("archived".to_string(), archived.to_string()));
        }
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
