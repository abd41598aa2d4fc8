use crate::{
    api::employee::fetch_employee,
    auth::auth::AuthUser,
    bind_values,
    error::{ApiError, ApiResult},
    model::{
        leave::{LeaveStatus, LeaveType},
        payroll::{PAYROLL_COLUMNS, Payroll, PayrollResponse, PayrollStatus},
    },
    utils::{
        calendar::{month_bounds, paid_leave_days, working_days_in_month},
        db_utils::{Filters, SqlValue},
        pagination,
        payroll_calc::{self, PayComponent, PayrollInput},
    },
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{MySqlPool, types::Json};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};

const MIN_YEAR: u32 = 2000;
const MAX_YEAR: u32 = 2100;

#[derive(Debug, Deserialize, ToSchema)]
pub struct GeneratePayroll {
    #[schema(example = 7)]
    pub employee_id: u64,
    #[schema(example = 3)]
    pub month: u32,
    #[schema(example = 2026)]
    pub year: u32,
    /// Defaults to the Monday-Friday days of the month
    #[schema(example = 22)]
    pub total_working_days: Option<u32>,
    #[serde(default)]
    pub allowances: Vec<PayComponent>,
    #[serde(default)]
    pub deductions: Vec<PayComponent>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PayrollPeriod {
    /// 1-12
    pub month: u32,
    pub year: u32,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PayrollQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Admin only; employees always see their own payrolls
    pub employee_id: Option<u64>,
    pub month: Option<u32>,
    pub year: Option<u32>,
    pub status: Option<PayrollStatus>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedPayrollResponse {
    pub data: Vec<PayrollResponse>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// First and last day of a valid payroll period.
fn period_bounds(month: u32, year: u32) -> ApiResult<(NaiveDate, NaiveDate)> {
    if !(1..=12).contains(&month) {
        return Err(ApiError::bad_request("month must be between 1 and 12"));
    }
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(ApiError::bad_request(format!(
            "year must be between {MIN_YEAR} and {MAX_YEAR}"
        )));
    }
    month_bounds(year as i32, month).ok_or_else(|| ApiError::bad_request("Invalid payroll period"))
}

/// Trimmed components; unnamed entries are rejected.
fn clean_components(items: &[PayComponent], kind: &str) -> ApiResult<Vec<PayComponent>> {
    items
        .iter()
        .map(|c| {
            let name = c.name.trim();
            if name.is_empty() {
                return Err(ApiError::bad_request(format!("Every {kind} needs a name")));
            }
            Ok(PayComponent { name: name.to_string(), amount: c.amount })
        })
        .collect()
}

async fn fetch_payroll(pool: &MySqlPool, payroll_id: u64, admin_id: u64) -> ApiResult<Payroll> {
    let sql = format!("SELECT {PAYROLL_COLUMNS} FROM payrolls WHERE id = ? AND admin_id = ?");
    sqlx::query_as::<_, Payroll>(&sql)
        .bind(payroll_id)
        .bind(admin_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Payroll not found"))
}

/// Generate a monthly payroll from attendance and approved leave
#[utoipa::path(
    post,
    path = "/payrole/generate",
    request_body = GeneratePayroll,
    responses(
        (status = 201, description = "Payroll generated", body = PayrollResponse),
        (status = 400, description = "Invalid period, working days or components"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Payroll already generated for this period", body = Object, example = json!({
            "message": "Payroll already generated for this period"
        }))
    ),
    tag = "Payroll",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn generate_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<GeneratePayroll>,
) -> ApiResult<HttpResponse> {
    let admin_id = auth.require_admin()?;
    let (first, last) = period_bounds(payload.month, payload.year)?;
    let allowances = clean_components(&payload.allowances, "allowance")?;
    let deductions = clean_components(&payload.deductions, "deduction")?;

    let employee = fetch_employee(pool.get_ref(), payload.employee_id, admin_id).await?;

    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT EXISTS(SELECT 1 FROM payrolls WHERE employee_id = ? AND month = ? AND year = ?)",
    )
    .bind(employee.id)
    .bind(payload.month)
    .bind(payload.year)
    .fetch_one(pool.get_ref())
    .await?;
    if exists != 0 {
        return Err(ApiError::conflict("Payroll already generated for this period"));
    }

    let total_working_days = match payload.total_working_days {
        Some(days) => days,
        None => working_days_in_month(payload.year as i32, payload.month).unwrap_or_default(),
    };

    let present: HashSet<NaiveDate> = sqlx::query_scalar::<_, NaiveDate>(
        r#"
        SELECT date FROM attendance
        WHERE employee_id = ? AND date BETWEEN ? AND ? AND punch_in IS NOT NULL
        "#,
    )
    .bind(employee.id)
    .bind(first)
    .bind(last)
    .fetch_all(pool.get_ref())
    .await?
    .into_iter()
    .collect();

    let leaves: Vec<(LeaveType, NaiveDate, NaiveDate)> =
        sqlx::query_as::<_, (String, NaiveDate, NaiveDate)>(
            r#"
            SELECT leave_type, start_date, end_date FROM leave_requests
            WHERE employee_id = ? AND status = ? AND start_date <= ? AND end_date >= ?
            "#,
        )
        .bind(employee.id)
        .bind(LeaveStatus::Approved.as_ref())
        .bind(last)
        .bind(first)
        .fetch_all(pool.get_ref())
        .await?
        .into_iter()
        .filter_map(|(raw, start, end)| match raw.parse::<LeaveType>() {
            Ok(leave_type) => Some((leave_type, start, end)),
            Err(_) => {
                warn!(employee_id = employee.id, leave_type = %raw, "Skipping leave with unknown type");
                None
            }
        })
        .collect();

    let days_present = present.len() as u32;
    let days_leave_approved = paid_leave_days(&leaves, &present, first, last);
    debug!(
        employee_id = employee.id,
        total_working_days, days_present, days_leave_approved, "Payroll inputs collected"
    );

    let breakdown = payroll_calc::compute(&PayrollInput {
        basic_salary: employee.basic_salary,
        total_working_days,
        days_present,
        days_leave_approved,
        allowances: &allowances,
        deductions: &deductions,
    })
    .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let result = sqlx::query(
        r#"
        INSERT INTO payrolls
            (admin_id, employee_id, month, year, basic_salary, total_working_days, days_present,
             days_leave_approved, per_day_salary, earned_basic, allowances, deductions,
             total_allowances, total_deductions, net_salary, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(admin_id)
    .bind(employee.id)
    .bind(payload.month)
    .bind(payload.year)
    .bind(employee.basic_salary)
    .bind(total_working_days)
    .bind(days_present)
    .bind(days_leave_approved)
    .bind(breakdown.per_day_salary)
    .bind(breakdown.earned_basic)
    .bind(Json(&allowances))
    .bind(Json(&deductions))
    .bind(breakdown.total_allowances)
    .bind(breakdown.total_deductions)
    .bind(breakdown.net_salary)
    .bind(PayrollStatus::Pending.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| ApiError::on_insert(e, "Payroll already generated for this period"))?;

    let payroll_id = result.last_insert_id();
    info!(
        admin_id,
        employee_id = employee.id,
        payroll_id,
        net_salary = breakdown.net_salary,
        "Payroll generated"
    );

    let payroll = fetch_payroll(pool.get_ref(), payroll_id, admin_id).await?;
    Ok(HttpResponse::Created().json(PayrollResponse::from(payroll)))
}

/// Move a payroll one step along pending -> approved -> paid.
async fn advance(
    auth: &AuthUser,
    pool: &MySqlPool,
    payroll_id: u64,
    next: PayrollStatus,
) -> ApiResult<Payroll> {
    let admin_id = auth.require_admin()?;
    let current = fetch_payroll(pool, payroll_id, admin_id).await?;

    let status: PayrollStatus = current.status.parse().map_err(|_| ApiError::Internal)?;
    let Some(previous) = next.required_previous().filter(|p| *p == status) else {
        return Err(ApiError::conflict(format!(
            "Payroll is {status} and cannot be marked {next}"
        )));
    };

    let stamp_column = match next {
        PayrollStatus::Paid => "paid_at",
        _ => "approved_at",
    };
    let sql = format!(
        "UPDATE payrolls SET status = ?, {stamp_column} = ? WHERE id = ? AND admin_id = ? AND status = ?"
    );
    let result = sqlx::query(&sql)
        .bind(next.as_ref())
        .bind(Utc::now())
        .bind(payroll_id)
        .bind(admin_id)
        .bind(previous.as_ref())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Payroll was updated concurrently"));
    }

    info!(admin_id, payroll_id, status = %next, "Payroll status changed");
    fetch_payroll(pool, payroll_id, admin_id).await
}

/// Approve a pending payroll
#[utoipa::path(
    put,
    path = "/payrole/{payroll_id}/approve",
    params(
        ("payroll_id" = u64, Path, description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll approved", body = PayrollResponse),
        (status = 404, description = "Payroll not found"),
        (status = 409, description = "Payroll is not pending")
    ),
    tag = "Payroll",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn approve_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let payroll = advance(&auth, pool.get_ref(), path.into_inner(), PayrollStatus::Approved).await?;
    Ok(HttpResponse::Ok().json(PayrollResponse::from(payroll)))
}

/// Mark an approved payroll as paid
#[utoipa::path(
    put,
    path = "/payrole/{payroll_id}/paid",
    params(
        ("payroll_id" = u64, Path, description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll marked paid", body = PayrollResponse),
        (status = 404, description = "Payroll not found"),
        (status = 409, description = "Payroll is not approved", body = Object, example = json!({
            "message": "Payroll is pending and cannot be marked paid"
        }))
    ),
    tag = "Payroll",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn mark_paid(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let payroll = advance(&auth, pool.get_ref(), path.into_inner(), PayrollStatus::Paid).await?;
    Ok(HttpResponse::Ok().json(PayrollResponse::from(payroll)))
}

/// Own payroll for a month
#[utoipa::path(
    get,
    path = "/payrole/status",
    params(PayrollPeriod),
    responses(
        (status = 200, description = "Payroll for the period", body = PayrollResponse),
        (status = 404, description = "Payroll not generated yet", body = Object, example = json!({
            "message": "Payroll not generated for this period"
        }))
    ),
    tag = "Payroll",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn payroll_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollPeriod>,
) -> ApiResult<HttpResponse> {
    let employee_id = auth.require_employee()?;
    period_bounds(query.month, query.year)?;

    let sql = format!(
        "SELECT {PAYROLL_COLUMNS} FROM payrolls WHERE employee_id = ? AND month = ? AND year = ?"
    );
    let payroll = sqlx::query_as::<_, Payroll>(&sql)
        .bind(employee_id)
        .bind(query.month)
        .bind(query.year)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::not_found("Payroll not generated for this period"))?;

    Ok(HttpResponse::Ok().json(PayrollResponse::from(payroll)))
}

/// Payroll records
#[utoipa::path(
    get,
    path = "/payrole",
    params(PayrollQuery),
    responses(
        (status = 200, description = "Paginated payroll list", body = PaginatedPayrollResponse)
    ),
    tag = "Payroll",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> ApiResult<HttpResponse> {
    let (page, per_page, offset) = pagination::window(query.page, query.per_page);

    let mut filters = Filters::new();
    filters.push("admin_id = ?", [SqlValue::U64(auth.admin_id)]);

    let employee_filter = if auth.is_admin() {
        query.employee_id
    } else {
        Some(auth.require_employee()?)
    };
    if let Some(employee_id) = employee_filter {
        filters.push("employee_id = ?", [SqlValue::U64(employee_id)]);
    }
    if let Some(month) = query.month {
        filters.push("month = ?", [SqlValue::U64(month.into())]);
    }
    if let Some(year) = query.year {
        filters.push("year = ?", [SqlValue::U64(year.into())]);
    }
    if let Some(status) = query.status {
        filters.push("status = ?", [SqlValue::String(status.to_string())]);
    }
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM payrolls{where_clause}");
    let total = bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), filters.values.iter().cloned())
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT {PAYROLL_COLUMNS} FROM payrolls{where_clause} \
         ORDER BY year DESC, month DESC, id DESC LIMIT ? OFFSET ?"
    );
    let payrolls = bind_values!(sqlx::query_as::<_, Payroll>(&data_sql), filters.values)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(PaginatedPayrollResponse {
        data: payrolls.into_iter().map(PayrollResponse::from).collect(),
        page,
        per_page,
        total,
    }))
}
