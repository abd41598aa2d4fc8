use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::utils::payroll_calc::PayComponent;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Payroll {
    pub id: u64,
    pub admin_id: u64,
    pub employee_id: u64,
    pub month: u32,
    pub year: u32,
    pub basic_salary: f64,
    pub total_working_days: u32,
    pub days_present: u32,
    pub days_leave_approved: u32,
    pub per_day_salary: f64,
    pub earned_basic: f64,
    pub allowances: Json<Vec<PayComponent>>,
    pub deductions: Json<Vec<PayComponent>>,
    pub total_allowances: f64,
    pub total_deductions: f64,
    pub net_salary: f64,
    pub status: String,
    pub generated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

pub const PAYROLL_COLUMNS: &str = "id, admin_id, employee_id, month, year, basic_salary, \
     total_working_days, days_present, days_leave_approved, per_day_salary, earned_basic, \
     allowances, deductions, total_allowances, total_deductions, net_salary, status, \
     generated_at, approved_at, paid_at";

#[derive(Debug, Serialize, ToSchema)]
pub struct PayrollResponse {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = 3)]
    pub month: u32,
    #[schema(example = 2026)]
    pub year: u32,
    #[schema(example = 30000.0)]
    pub basic_salary: f64,
    #[schema(example = 22)]
    pub total_working_days: u32,
    #[schema(example = 20)]
    pub days_present: u32,
    #[schema(example = 2)]
    pub days_leave_approved: u32,
    pub per_day_salary: f64,
    pub earned_basic: f64,
    pub allowances: Vec<PayComponent>,
    pub deductions: Vec<PayComponent>,
    pub total_allowances: f64,
    pub total_deductions: f64,
    #[schema(example = 31500.0)]
    pub net_salary: f64,
    #[schema(example = "pending")]
    pub status: String,
    #[schema(value_type = String, format = "date-time")]
    pub generated_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<Payroll> for PayrollResponse {
    fn from(p: Payroll) -> Self {
        Self {
            id: p.id,
            employee_id: p.employee_id,
            month: p.month,
            year: p.year,
            basic_salary: p.basic_salary,
            total_working_days: p.total_working_days,
            days_present: p.days_present,
            days_leave_approved: p.days_leave_approved,
            per_day_salary: p.per_day_salary,
            earned_basic: p.earned_basic,
            allowances: p.allowances.0,
            deductions: p.deductions.0,
            total_allowances: p.total_allowances,
            total_deductions: p.total_deductions,
            net_salary: p.net_salary,
            status: p.status,
            generated_at: p.generated_at,
            approved_at: p.approved_at,
            paid_at: p.paid_at,
        }
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PayrollStatus {
    Pending,
    Approved,
    Paid,
}

impl PayrollStatus {
    /// The status a payroll must be in before it can move to `self`.
    pub fn required_previous(self) -> Option<PayrollStatus> {
        match self {
            PayrollStatus::Pending => None,
            PayrollStatus::Approved => Some(PayrollStatus::Pending),
            PayrollStatus::Paid => Some(PayrollStatus::Approved),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_is_linear() {
        assert_eq!(PayrollStatus::Pending.required_previous(), None);
        assert_eq!(PayrollStatus::Approved.required_previous(), Some(PayrollStatus::Pending));
        assert_eq!(PayrollStatus::Paid.required_previous(), Some(PayrollStatus::Approved));
    }
}
