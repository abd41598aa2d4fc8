use crate::{
    api::admin::load_admin,
    auth::auth::AuthUser,
    bind_values,
    config::Config,
    error::{ApiError, ApiResult},
    model::task::{TASK_COLUMNS, Task, TaskComment, TaskPriority, TaskStatus, is_overdue},
    utils::{
        calendar::local_today,
        db_utils::{ColumnKind, Filters, SqlValue, build_update_sql, execute_update},
        pagination,
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{MySqlConnection, MySqlPool};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const MAX_COMMENT_LEN: usize = 5_000;

const UPDATABLE: &[(&str, ColumnKind)] = &[
    ("title", ColumnKind::Text),
    ("description", ColumnKind::NullableText),
    ("priority", ColumnKind::Text),
    ("due_date", ColumnKind::NullableDate),
];

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTask {
    #[schema(example = "Prepare Q2 report")]
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    #[schema(example = "2026-04-30", format = "date", value_type = Option<String>)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    #[schema(example = json!([7, 9]))]
    pub assignee_ids: Vec<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignTask {
    /// Replaces the current assignee set
    #[schema(example = json!([7, 9]))]
    pub employee_ids: Vec<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTaskStatus {
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddComment {
    #[schema(example = "Draft shared in the team folder")]
    pub body: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TaskQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<TaskStatus>,
}

#[derive(Serialize, ToSchema)]
pub struct TaskListResponse {
    pub data: Vec<Task>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Assignee {
    pub id: u64,
    pub name: String,
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct TaskDetail {
    pub task: Task,
    pub assignees: Vec<Assignee>,
    pub comments: Vec<TaskComment>,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct TaskDashboard {
    pub total: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub cancelled: u64,
    /// Open tasks whose due date has passed
    pub overdue: u64,
}

impl TaskDashboard {
    fn tally<'a>(
        rows: impl IntoIterator<Item = &'a (String, Option<NaiveDate>)>,
        today: NaiveDate,
    ) -> Self {
        let mut dashboard = Self::default();
        for (raw, due_date) in rows {
            let Ok(status) = raw.parse::<TaskStatus>() else {
                continue;
            };
            dashboard.total += 1;
            match status {
                TaskStatus::Pending => dashboard.pending += 1,
                TaskStatus::InProgress => dashboard.in_progress += 1,
                TaskStatus::Completed => dashboard.completed += 1,
                TaskStatus::Cancelled => dashboard.cancelled += 1,
            }
            if is_overdue(status, *due_date, today) {
                dashboard.overdue += 1;
            }
        }
        dashboard
    }
}

/// Tasks are a premium feature.
async fn require_tasks(pool: &MySqlPool, auth: &AuthUser) -> ApiResult<()> {
    let plan = load_admin(pool, auth.admin_id).await?.plan();
    if !plan.allows_tasks() {
        return Err(ApiError::forbidden("Task management requires the premium plan"));
    }
    Ok(())
}

/// Task visible to the caller: any tenant task for admins, assigned tasks for employees.
async fn visible_task(pool: &MySqlPool, auth: &AuthUser, task_id: u64) -> ApiResult<Task> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ? AND admin_id = ?");
    let task = sqlx::query_as::<_, Task>(&sql)
        .bind(task_id)
        .bind(auth.admin_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    if let Some(employee_id) = auth.employee_id.filter(|_| !auth.is_admin()) {
        let assigned = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM task_assignees WHERE task_id = ? AND employee_id = ?)",
        )
        .bind(task_id)
        .bind(employee_id)
        .fetch_one(pool)
        .await?;
        if assigned == 0 {
            return Err(ApiError::not_found("Task not found"));
        }
    }

    Ok(task)
}

fn dedup_ids(ids: &[u64]) -> Vec<u64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Every id must be an employee of the tenant.
async fn check_assignees(pool: &MySqlPool, admin_id: u64, ids: &[u64]) -> ApiResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("SELECT COUNT(*) FROM employees WHERE admin_id = ? AND id IN ({placeholders})");

    let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(admin_id);
    for id in ids {
        query = query.bind(*id);
    }
    let found = query.fetch_one(pool).await?;

    if found != ids.len() as i64 {
        return Err(ApiError::bad_request("Assignees must be employees of this company"));
    }
    Ok(())
}

/// One multi-row INSERT for the whole assignee set.
fn assignee_insert_sql(count: usize) -> String {
    let rows = vec!["(?, ?)"; count].join(", ");
    format!("INSERT INTO task_assignees (task_id, employee_id) VALUES {rows}")
}

/// Writes the assignee set inside the caller's transaction.
async fn insert_assignees(
    conn: &mut MySqlConnection,
    task_id: u64,
    ids: &[u64],
) -> Result<(), sqlx::Error> {
    if ids.is_empty() {
        return Ok(());
    }
    let sql = assignee_insert_sql(ids.len());
    let mut query = sqlx::query(&sql);
    for employee_id in ids {
        query = query.bind(task_id).bind(*employee_id);
    }
    query.execute(conn).await?;
    Ok(())
}

async fn task_detail(pool: &MySqlPool, task: Task) -> ApiResult<TaskDetail> {
    let assignees = sqlx::query_as::<_, Assignee>(
        r#"
        SELECT e.id, e.name, e.email
        FROM task_assignees ta
        JOIN employees e ON e.id = ta.employee_id
        WHERE ta.task_id = ?
        ORDER BY e.name
        "#,
    )
    .bind(task.id)
    .fetch_all(pool)
    .await?;

    let comments = sqlx::query_as::<_, TaskComment>(
        r#"
        SELECT id, task_id, author_role, author_id, body, created_at
        FROM task_comments
        WHERE task_id = ?
        ORDER BY created_at, id
        "#,
    )
    .bind(task.id)
    .fetch_all(pool)
    .await?;

    Ok(TaskDetail { task, assignees, comments })
}

/// Create a task
#[utoipa::path(
    post,
    path = "/task",
    request_body = CreateTask,
    responses(
        (status = 201, description = "Task created", body = TaskDetail),
        (status = 400, description = "Invalid title or assignees"),
        (status = 403, description = "Plan without task management", body = Object, example = json!({
            "message": "Task management requires the premium plan"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Task"
)]
pub async fn create_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateTask>,
) -> ApiResult<HttpResponse> {
    let admin_id = auth.require_admin()?;
    require_tasks(pool.get_ref(), &auth).await?;

    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("title is required"));
    }
    let assignees = dedup_ids(&payload.assignee_ids);
    check_assignees(pool.get_ref(), admin_id, &assignees).await?;

    let description = payload.description.as_deref().map(str::trim).filter(|d| !d.is_empty());
    let priority = payload.priority.unwrap_or(TaskPriority::Medium);

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO tasks (admin_id, title, description, priority, status, due_date)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(admin_id)
    .bind(title)
    .bind(description)
    .bind(priority.as_ref())
    .bind(TaskStatus::Pending.as_ref())
    .bind(payload.due_date)
    .execute(&mut *tx)
    .await?;

    let task_id = result.last_insert_id();
    insert_assignees(&mut *tx, task_id, &assignees).await?;
    tx.commit().await?;
    info!(admin_id, task_id, assignees = assignees.len(), "Task created");

    let task = visible_task(pool.get_ref(), &auth, task_id).await?;
    Ok(HttpResponse::Created().json(task_detail(pool.get_ref(), task).await?))
}

/// List tasks; employees see the tasks assigned to them
#[utoipa::path(
    get,
    path = "/task",
    params(TaskQuery),
    responses(
        (status = 200, description = "Paginated task list", body = TaskListResponse),
        (status = 403, description = "Plan without task management")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Task"
)]
pub async fn list_tasks(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<TaskQuery>,
) -> ApiResult<HttpResponse> {
    require_tasks(pool.get_ref(), &auth).await?;
    let (page, per_page, offset) = pagination::window(query.page, query.per_page);

    let mut filters = scope_filters(&auth)?;
    if let Some(status) = query.status {
        filters.push("status = ?", [SqlValue::String(status.to_string())]);
    }
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM tasks{where_clause}");
    let total = bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), filters.values.iter().cloned())
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks{where_clause} \
         ORDER BY due_date IS NULL, due_date, id DESC LIMIT ? OFFSET ?"
    );
    let data = bind_values!(sqlx::query_as::<_, Task>(&data_sql), filters.values)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(TaskListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// Tenant tasks for admins, assigned tasks for employees.
fn scope_filters(auth: &AuthUser) -> ApiResult<Filters> {
    let mut filters = Filters::new();
    filters.push("admin_id = ?", [SqlValue::U64(auth.admin_id)]);
    if !auth.is_admin() {
        let employee_id = auth.require_employee()?;
        filters.push(
            "id IN (SELECT task_id FROM task_assignees WHERE employee_id = ?)",
            [SqlValue::U64(employee_id)],
        );
    }
    Ok(filters)
}

/// Task counts per status plus overdue
#[utoipa::path(
    get,
    path = "/task/dashboard",
    responses(
        (status = 200, description = "Task counters", body = TaskDashboard)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Task"
)]
pub async fn dashboard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    require_tasks(pool.get_ref(), &auth).await?;

    let filters = scope_filters(&auth)?;
    let sql = format!("SELECT status, due_date FROM tasks{}", filters.where_clause());
    let rows = bind_values!(
        sqlx::query_as::<_, (String, Option<NaiveDate>)>(&sql),
        filters.values
    )
    .fetch_all(pool.get_ref())
    .await?;

    let today = local_today(config.utc_offset_minutes);
    Ok(HttpResponse::Ok().json(TaskDashboard::tally(&rows, today)))
}

/// Task with assignees and comments
#[utoipa::path(
    get,
    path = "/task/{task_id}",
    params(
        ("task_id" = u64, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task detail", body = TaskDetail),
        (status = 404, description = "Task not found or not assigned to the caller")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Task"
)]
pub async fn get_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    require_tasks(pool.get_ref(), &auth).await?;
    let task = visible_task(pool.get_ref(), &auth, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(task_detail(pool.get_ref(), task).await?))
}

/// Update title, description, priority or due date
#[utoipa::path(
    put,
    path = "/task/{task_id}",
    params(
        ("task_id" = u64, Path, description = "Task ID")
    ),
    request_body(content = Object, example = json!({
        "priority": "high",
        "due_date": "2026-05-15"
    })),
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 400, description = "Unknown field or invalid value"),
        (status = 404, description = "Task not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Task"
)]
pub async fn update_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    let admin_id = auth.require_admin()?;
    require_tasks(pool.get_ref(), &auth).await?;
    let task_id = path.into_inner();

    validate_priority(&body)?;
    let update = build_update_sql("tasks", &body, UPDATABLE, task_id, admin_id)?;

    visible_task(pool.get_ref(), &auth, task_id).await?;
    if execute_update(pool.get_ref(), update).await? > 0 {
        info!(admin_id, task_id, "Task updated");
    }

    let task = visible_task(pool.get_ref(), &auth, task_id).await?;
    Ok(HttpResponse::Ok().json(task))
}

fn validate_priority(body: &Value) -> ApiResult<()> {
    match body.get("priority") {
        None => Ok(()),
        Some(Value::String(p)) if p.parse::<TaskPriority>().is_ok() => Ok(()),
        Some(_) => Err(ApiError::bad_request("priority must be one of low, medium, high")),
    }
}

/// Delete a task with its assignees and comments
#[utoipa::path(
    delete,
    path = "/task/{task_id}",
    params(
        ("task_id" = u64, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task deleted", body = Object, example = json!({
            "message": "Task deleted"
        })),
        (status = 404, description = "Task not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Task"
)]
pub async fn delete_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let admin_id = auth.require_admin()?;
    require_tasks(pool.get_ref(), &auth).await?;
    let task_id = path.into_inner();

    let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND admin_id = ?")
        .bind(task_id)
        .bind(admin_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Task not found"));
    }

    info!(admin_id, task_id, "Task deleted");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Task deleted"
    })))
}

/// Replace the assignees of a task
#[utoipa::path(
    put,
    path = "/task/{task_id}/assign",
    params(
        ("task_id" = u64, Path, description = "Task ID")
    ),
    request_body = AssignTask,
    responses(
        (status = 200, description = "Assignees replaced", body = TaskDetail),
        (status = 400, description = "Assignee outside the company"),
        (status = 404, description = "Task not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Task"
)]
pub async fn assign_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AssignTask>,
) -> ApiResult<HttpResponse> {
    let admin_id = auth.require_admin()?;
    require_tasks(pool.get_ref(), &auth).await?;
    let task_id = path.into_inner();

    let task = visible_task(pool.get_ref(), &auth, task_id).await?;
    let assignees = dedup_ids(&payload.employee_ids);
    check_assignees(pool.get_ref(), admin_id, &assignees).await?;

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM task_assignees WHERE task_id = ?")
        .bind(task_id)
        .execute(&mut *tx)
        .await?;
    insert_assignees(&mut *tx, task_id, &assignees).await?;
    tx.commit().await?;
    info!(admin_id, task_id, assignees = assignees.len(), "Task assignees replaced");

    Ok(HttpResponse::Ok().json(task_detail(pool.get_ref(), task).await?))
}

/// Move a task along its workflow
#[utoipa::path(
    put,
    path = "/task/{task_id}/status",
    params(
        ("task_id" = u64, Path, description = "Task ID")
    ),
    request_body = UpdateTaskStatus,
    responses(
        (status = 200, description = "Status changed", body = Task),
        (status = 404, description = "Task not found or not assigned to the caller"),
        (status = 409, description = "Transition not allowed", body = Object, example = json!({
            "message": "Cannot move task from completed to in-progress"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Task"
)]
pub async fn update_task_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateTaskStatus>,
) -> ApiResult<HttpResponse> {
    require_tasks(pool.get_ref(), &auth).await?;
    let task_id = path.into_inner();

    let task = visible_task(pool.get_ref(), &auth, task_id).await?;
    let current: TaskStatus = task.status.parse().map_err(|_| ApiError::Internal)?;
    let next = payload.status;
    if !current.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "Cannot move task from {current} to {next}"
        )));
    }

    let result = sqlx::query("UPDATE tasks SET status = ? WHERE id = ? AND admin_id = ? AND status = ?")
        .bind(next.as_ref())
        .bind(task_id)
        .bind(auth.admin_id)
        .bind(current.as_ref())
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Task was updated concurrently"));
    }

    info!(task_id, user_id = auth.user_id, from = %current, to = %next, "Task status changed");
    let task = visible_task(pool.get_ref(), &auth, task_id).await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Add a comment to a task
#[utoipa::path(
    post,
    path = "/task/{task_id}/comment",
    params(
        ("task_id" = u64, Path, description = "Task ID")
    ),
    request_body = AddComment,
    responses(
        (status = 201, description = "Comment added", body = TaskComment),
        (status = 400, description = "Empty or oversized comment"),
        (status = 404, description = "Task not found or not assigned to the caller")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Task"
)]
pub async fn add_comment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AddComment>,
) -> ApiResult<HttpResponse> {
    require_tasks(pool.get_ref(), &auth).await?;
    let task_id = path.into_inner();

    let body = payload.body.trim();
    if body.is_empty() {
        return Err(ApiError::bad_request("Comment cannot be empty"));
    }
    if body.chars().count() > MAX_COMMENT_LEN {
        return Err(ApiError::bad_request(format!(
            "Comment cannot exceed {MAX_COMMENT_LEN} characters"
        )));
    }

    visible_task(pool.get_ref(), &auth, task_id).await?;

    let result = sqlx::query(
        "INSERT INTO task_comments (task_id, author_role, author_id, body) VALUES (?, ?, ?, ?)",
    )
    .bind(task_id)
    .bind(auth.role.as_ref())
    .bind(auth.user_id)
    .bind(body)
    .execute(pool.get_ref())
    .await?;

    let comment = sqlx::query_as::<_, TaskComment>(
        "SELECT id, task_id, author_role, author_id, body, created_at FROM task_comments WHERE id = ?",
    )
    .bind(result.last_insert_id())
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Created().json(comment))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, day).unwrap()
    }

    #[test]
    fn dashboard_counts_statuses_and_overdue() {
        let rows = vec![
            ("pending".to_string(), Some(d(1))),
            ("in-progress".to_string(), Some(d(20))),
            ("in-progress".to_string(), Some(d(2))),
            ("completed".to_string(), Some(d(1))),
            ("cancelled".to_string(), None),
            ("archived".to_string(), None),
        ];
        let dashboard = TaskDashboard::tally(&rows, d(10));

        assert_eq!(
            dashboard,
            TaskDashboard {
                total: 5,
                pending: 1,
                in_progress: 2,
                completed: 1,
                cancelled: 1,
                overdue: 2,
            }
        );
    }

    #[test]
    fn assignee_ids_are_deduplicated() {
        assert_eq!(dedup_ids(&[9, 7, 9, 7, 1]), vec![1, 7, 9]);
        assert!(dedup_ids(&[]).is_empty());
    }

    #[test]
    fn assignees_are_written_in_one_statement() {
        assert_eq!(
            assignee_insert_sql(3),
            "INSERT INTO task_assignees (task_id, employee_id) VALUES (?, ?), (?, ?), (?, ?)"
        );
        assert_eq!(assignee_insert_sql(1).matches('?').count(), 2);
    }

    #[test]
    fn priority_must_be_known() {
        assert!(validate_priority(&json!({"title": "x"})).is_ok());
        assert!(validate_priority(&json!({"priority": "high"})).is_ok());
        assert!(validate_priority(&json!({"priority": "urgent"})).is_err());
        assert!(validate_priority(&json!({"priority": 3})).is_err());
    }

    #[test]
    fn status_and_assignment_fields_are_not_free_form_updates() {
        for field in ["status", "admin_id", "assignee_ids"] {
            let body = json!({ field: "x" });
            assert!(build_update_sql("tasks", &body, UPDATABLE, 1, 1).is_err());
        }
    }

    #[test]
    fn status_payload_uses_kebab_case() {
        let payload: UpdateTaskStatus =
            serde_json::from_value(json!({"status": "in-progress"})).unwrap();
        assert_eq!(payload.status, TaskStatus::InProgress);
    }
}
