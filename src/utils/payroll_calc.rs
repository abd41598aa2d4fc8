//! Monthly payroll arithmetic.
//!
//! `net = basic / working_days * (present + approved_leave) + Σallowances − Σdeductions`
//!
//! Amounts travel as `f64` in JSON and MySQL `DOUBLE` columns; the arithmetic
//! runs on `Decimal` and is rounded to cents on the way out.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// A named flat amount added to or subtracted from the salary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PayComponent {
    #[schema(example = "Transport")]
    pub name: String,
    #[schema(example = 1500.0)]
    pub amount: f64,
}

#[derive(Debug)]
pub struct PayrollInput<'a> {
    pub basic_salary: f64,
    pub total_working_days: u32,
    pub days_present: u32,
    pub days_leave_approved: u32,
    pub allowances: &'a [PayComponent],
    pub deductions: &'a [PayComponent],
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayrollBreakdown {
    pub per_day_salary: f64,
    pub paid_days: u32,
    pub earned_basic: f64,
    pub total_allowances: f64,
    pub total_deductions: f64,
    pub net_salary: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum PayrollCalcError {
    #[error("total_working_days must be greater than zero")]
    NoWorkingDays,

    #[error("basic salary must be a non-negative number")]
    InvalidBasicSalary,

    #[error("amount of `{0}` must be a non-negative number")]
    InvalidComponent(String),
}

const CENTS: u32 = 2;

fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Half-cent amounts round away from zero.
fn to_cents(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(CENTS, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

fn sum_components(items: &[PayComponent]) -> Result<Decimal, PayrollCalcError> {
    items.iter().try_fold(Decimal::ZERO, |acc, c| {
        if !c.amount.is_finite() || c.amount < 0.0 {
            return Err(PayrollCalcError::InvalidComponent(c.name.clone()));
        }
        Ok(acc + to_decimal(c.amount))
    })
}

pub fn compute(input: &PayrollInput<'_>) -> Result<PayrollBreakdown, PayrollCalcError> {
    if input.total_working_days == 0 {
        return Err(PayrollCalcError::NoWorkingDays);
    }
    if !input.basic_salary.is_finite() || input.basic_salary < 0.0 {
        return Err(PayrollCalcError::InvalidBasicSalary);
    }

    let total_allowances = sum_components(input.allowances)?;
    let total_deductions = sum_components(input.deductions)?;

    let basic = to_decimal(input.basic_salary);
    let per_day_salary = basic / Decimal::from(input.total_working_days);
    let paid_days = input.days_present + input.days_leave_approved;
    let earned_basic = per_day_salary * Decimal::from(paid_days);
    let net_salary = earned_basic + total_allowances - total_deductions;

    Ok(PayrollBreakdown {
        per_day_salary: to_cents(per_day_salary),
        paid_days,
        earned_basic: to_cents(earned_basic),
        total_allowances: to_cents(total_allowances),
        total_deductions: to_cents(total_deductions),
        net_salary: to_cents(net_salary),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(name: &str, amount: f64) -> PayComponent {
        PayComponent { name: name.into(), amount }
    }

    #[test]
    fn full_attendance_pays_full_basic() {
        let out = compute(&PayrollInput {
            basic_salary: 22_000.0,
            total_working_days: 22,
            days_present: 22,
            days_leave_approved: 0,
            allowances: &[],
            deductions: &[],
        })
        .unwrap();

        assert_eq!(out.per_day_salary, 1_000.0);
        assert_eq!(out.earned_basic, 22_000.0);
        assert_eq!(out.net_salary, 22_000.0);
    }

    #[test]
    fn prorates_and_applies_components() {
        let allowances = [comp("Transport", 1_500.0), comp("Meal", 500.0)];
        let deductions = [comp("Tax", 1_200.0)];
        let out = compute(&PayrollInput {
            basic_salary: 30_000.0,
            total_working_days: 20,
            days_present: 15,
            days_leave_approved: 3,
            allowances: &allowances,
            deductions: &deductions,
        })
        .unwrap();

        // 30000 / 20 * 18 + 2000 - 1200
        assert_eq!(out.paid_days, 18);
        assert_eq!(out.earned_basic, 27_000.0);
        assert_eq!(out.total_allowances, 2_000.0);
        assert_eq!(out.total_deductions, 1_200.0);
        assert_eq!(out.net_salary, 27_800.0);
    }

    #[test]
    fn matches_formula_for_uneven_division() {
        let out = compute(&PayrollInput {
            basic_salary: 10_000.0,
            total_working_days: 23,
            days_present: 7,
            days_leave_approved: 1,
            allowances: &[comp("Bonus", 100.0)],
            deductions: &[comp("Loan", 50.5)],
        })
        .unwrap();

        let expected = 10_000.0 / 23.0 * 8.0 + 100.0 - 50.5;
        assert!((out.net_salary - expected).abs() < 0.005);
    }

    #[test]
    fn deductions_can_exceed_earnings() {
        let out = compute(&PayrollInput {
            basic_salary: 1_000.0,
            total_working_days: 10,
            days_present: 0,
            days_leave_approved: 0,
            allowances: &[],
            deductions: &[comp("Advance", 300.0)],
        })
        .unwrap();
        assert_eq!(out.net_salary, -300.0);
    }

    #[test]
    fn half_cents_round_away_from_zero() {
        let out = compute(&PayrollInput {
            basic_salary: 0.0,
            total_working_days: 22,
            days_present: 0,
            days_leave_approved: 0,
            allowances: &[comp("Meal", 1.005)],
            deductions: &[],
        })
        .unwrap();
        assert_eq!(out.total_allowances, 1.01);
        assert_eq!(out.net_salary, 1.01);

        let out = compute(&PayrollInput {
            basic_salary: 0.0,
            total_working_days: 22,
            days_present: 0,
            days_leave_approved: 0,
            allowances: &[],
            deductions: &[comp("Fine", 0.125)],
        })
        .unwrap();
        assert_eq!(out.net_salary, -0.13);
    }

    #[test]
    fn per_day_rate_is_not_rounded_before_multiplying() {
        // 10000 / 3 = 3333.33.. per day; three days must give back the full basic.
        let out = compute(&PayrollInput {
            basic_salary: 10_000.0,
            total_working_days: 3,
            days_present: 3,
            days_leave_approved: 0,
            allowances: &[],
            deductions: &[],
        })
        .unwrap();
        assert_eq!(out.per_day_salary, 3_333.33);
        assert_eq!(out.earned_basic, 10_000.0);
    }

    #[test]
    fn rejects_invalid_input() {
        let base = PayrollInput {
            basic_salary: 1_000.0,
            total_working_days: 0,
            days_present: 0,
            days_leave_approved: 0,
            allowances: &[],
            deductions: &[],
        };
        assert_eq!(compute(&base), Err(PayrollCalcError::NoWorkingDays));

        let negative_basic = PayrollInput { basic_salary: -1.0, total_working_days: 5, ..base };
        assert_eq!(compute(&negative_basic), Err(PayrollCalcError::InvalidBasicSalary));

        let bad = [comp("Refund", -10.0)];
        let negative_component = PayrollInput {
            basic_salary: 1_000.0,
            total_working_days: 5,
            days_present: 0,
            days_leave_approved: 0,
            allowances: &bad,
            deductions: &[],
        };
        assert_eq!(
            compute(&negative_component),
            Err(PayrollCalcError::InvalidComponent("Refund".into()))
        );
    }
}
