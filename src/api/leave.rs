use crate::{
    auth::auth::AuthUser,
    bind_values,
    config::Config,
    error::{ApiError, ApiResult},
    model::leave::{LEAVE_COLUMNS, LeaveRequest, LeaveStatus, LeaveType},
    utils::{
        calendar::local_today,
        db_utils::{Filters, SqlValue},
        pagination,
    },
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const MAX_LEAVE_DAYS: i64 = 366;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyLeave {
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-07", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    pub leave_type: LeaveType,
    #[schema(example = "Flu")]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LeaveFilter {
    /// Filter by employee ID (admin only)
    pub employee_id: Option<u64>,
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

fn validate_range(start: NaiveDate, end: NaiveDate) -> ApiResult<()> {
    if start > end {
        return Err(ApiError::bad_request("start_date cannot be after end_date"));
    }
    if (end - start).num_days() >= MAX_LEAVE_DAYS {
        return Err(ApiError::bad_request("Leave cannot span more than a year"));
    }
    Ok(())
}

async fn fetch_leave(pool: &MySqlPool, leave_id: u64, admin_id: u64) -> ApiResult<LeaveRequest> {
    let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ? AND admin_id = ?");
    sqlx::query_as::<_, LeaveRequest>(&sql)
        .bind(leave_id)
        .bind(admin_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Leave request not found"))
}

/* =========================
Apply for leave
========================= */
#[utoipa::path(
    post,
    path = "/leave/apply",
    request_body(
        content = ApplyLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveRequest),
        (status = 400, description = "Invalid date range"),
        (status = 409, description = "Overlaps a pending or approved leave", body = Object, example = json!({
            "message": "Leave overlaps an existing pending or approved request"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn apply_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ApplyLeave>,
) -> ApiResult<HttpResponse> {
    let employee_id = auth.require_employee()?;

    // 1️⃣ validate dates
    validate_range(payload.start_date, payload.end_date)?;

    // 2️⃣ no overlap with anything still on the calendar
    let overlapping = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM leave_requests
            WHERE employee_id = ?
              AND status IN (?, ?)
              AND start_date <= ?
              AND end_date >= ?
        )
        "#,
    )
    .bind(employee_id)
    .bind(LeaveStatus::BLOCKING[0].as_ref())
    .bind(LeaveStatus::BLOCKING[1].as_ref())
    .bind(payload.end_date)
    .bind(payload.start_date)
    .fetch_one(pool.get_ref())
    .await?;

    if overlapping != 0 {
        return Err(ApiError::conflict(
            "Leave overlaps an existing pending or approved request",
        ));
    }

    // 3️⃣ insert request
    let reason = payload.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (admin_id, employee_id, start_date, end_date, leave_type, reason, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.admin_id)
    .bind(employee_id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.leave_type.as_ref())
    .bind(reason)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(pool.get_ref())
    .await?;

    let leave_id = result.last_insert_id();
    info!(employee_id, leave_id, "Leave request submitted");

    let leave = fetch_leave(pool.get_ref(), leave_id, auth.admin_id).await?;
    Ok(HttpResponse::Created().json(leave))
}

/// Leave applications; employees only see their own
#[utoipa::path(
    get,
    path = "/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> ApiResult<HttpResponse> {
    // -------------------------
    // Pagination
    // -------------------------
    let (page, per_page, offset) = pagination::window(query.page, query.per_page);

    // -------------------------
    // WHERE clause
    // -------------------------
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
    if let Some(status) = query.status {
        filters.push("status = ?", [SqlValue::String(status.to_string())]);
    }
    let where_clause = filters.where_clause();

    // -------------------------
    // COUNT query
    // -------------------------
    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{where_clause}");
    let total = bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), filters.values.iter().cloned())
        .fetch_one(pool.get_ref())
        .await?;

    // -------------------------
    // DATA query
    // -------------------------
    let data_sql = format!(
        r#"
        SELECT {LEAVE_COLUMNS}
        FROM leave_requests
        {where_clause}
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#
    );
    let leaves = bind_values!(sqlx::query_as::<_, LeaveRequest>(&data_sql), filters.values)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: leaves,
        page,
        per_page,
        total,
    }))
}

/// Admin review: pending -> approved | rejected
async fn review(
    auth: &AuthUser,
    pool: &MySqlPool,
    leave_id: u64,
    next: LeaveStatus,
) -> ApiResult<LeaveRequest> {
    let admin_id = auth.require_admin()?;
    let current = fetch_leave(pool, leave_id, admin_id).await?;

    let status: LeaveStatus = current.status.parse().map_err(|_| ApiError::Internal)?;
    if !status.can_review_to(next) {
        return Err(ApiError::conflict(format!("Leave request is already {status}")));
    }

    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?, reviewed_at = ?
        WHERE id = ? AND admin_id = ? AND status = ?
        "#,
    )
    .bind(next.as_ref())
    .bind(Utc::now())
    .bind(leave_id)
    .bind(admin_id)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Leave request was processed concurrently"));
    }

    info!(admin_id, leave_id, status = %next, "Leave reviewed");
    fetch_leave(pool, leave_id, admin_id).await
}

/* =========================
Approve leave (Admin)
========================= */
#[utoipa::path(
    put,
    path = "/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved", body = LeaveRequest),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already processed", body = Object, example = json!({
            "message": "Leave request is already rejected"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let leave = review(&auth, pool.get_ref(), path.into_inner(), LeaveStatus::Approved).await?;
    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Reject leave (Admin)
========================= */
#[utoipa::path(
    put,
    path = "/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    responses(
        (status = 200, description = "Leave rejected", body = LeaveRequest),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already processed")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let leave = review(&auth, pool.get_ref(), path.into_inner(), LeaveStatus::Rejected).await?;
    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Cancel own leave (Employee)
========================= */
#[utoipa::path(
    put,
    path = "/leave/{leave_id}/cancel",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to cancel")
    ),
    responses(
        (status = 200, description = "Leave cancelled", body = LeaveRequest),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave can no longer be cancelled", body = Object, example = json!({
            "message": "Approved leave can only be cancelled before it starts"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let employee_id = auth.require_employee()?;
    let leave_id = path.into_inner();

    let current = fetch_leave(pool.get_ref(), leave_id, auth.admin_id).await?;
    if current.employee_id != employee_id {
        return Err(ApiError::not_found("Leave request not found"));
    }

    let status: LeaveStatus = current.status.parse().map_err(|_| ApiError::Internal)?;
    let today = local_today(config.utc_offset_minutes);
    if !status.can_cancel(current.start_date, today) {
        return Err(ApiError::conflict(match status {
            LeaveStatus::Approved => "Approved leave can only be cancelled before it starts".to_string(),
            other => format!("Leave request is already {other}"),
        }));
    }

    let result = sqlx::query(
        "UPDATE leave_requests SET status = ? WHERE id = ? AND employee_id = ? AND status = ?",
    )
    .bind(LeaveStatus::Cancelled.as_ref())
    .bind(leave_id)
    .bind(employee_id)
    .bind(status.as_ref())
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Leave request was processed concurrently"));
    }

    info!(employee_id, leave_id, "Leave cancelled");
    let leave = fetch_leave(pool.get_ref(), leave_id, auth.admin_id).await?;
    Ok(HttpResponse::Ok().json(leave))
}
