use crate::{
    api::admin::load_admin,
    auth::{
        auth::AuthUser,
        handlers::{hash_or_500, validate_email, validate_new_password},
    },
    bind_values,
    error::{ApiError, ApiResult},
    model::employee::{EMPLOYEE_COLUMNS, Employee, EmployeeResponse},
    utils::{
        db_utils::{ColumnKind, Filters, SqlValue, build_update_sql, escape_like, execute_update},
        email_filter::{self, Account},
        gate_cache,
        pagination,
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

/// Columns an admin may change through `PUT /employees/{id}`.
const UPDATABLE: &[(&str, ColumnKind)] = &[
    ("name", ColumnKind::Text),
    ("phone", ColumnKind::NullableText),
    ("designation", ColumnKind::NullableText),
    ("department", ColumnKind::NullableText),
    ("basic_salary", ColumnKind::Number),
    ("joining_date", ColumnKind::NullableDate),
    ("is_active", ColumnKind::Bool),
];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "John Doe")]
    pub name: String,
    #[schema(example = "john.doe@company.com", format = "email")]
    pub email: String,
    #[schema(example = "s3cret-passw0rd")]
    pub password: String,
    #[schema(example = "+8801712345678")]
    pub phone: Option<String>,
    #[schema(example = "Engineer")]
    pub designation: Option<String>,
    #[schema(example = "R&D")]
    pub department: Option<String>,
    #[schema(example = 30000.0)]
    pub basic_salary: f64,
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub joining_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    /// Page number (starts at 1)
    pub page: Option<u32>,
    /// Items per page
    pub per_page: Option<u32>,
    /// Exact department name
    pub department: Option<String>,
    pub is_active: Option<bool>,
    /// Search by name or email
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<EmployeeResponse>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn validate_create(payload: &CreateEmployee) -> ApiResult<String> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    let email = validate_email(&payload.email)?;
    validate_new_password(&payload.password)?;
    if !payload.basic_salary.is_finite() || payload.basic_salary < 0.0 {
        return Err(ApiError::bad_request("basic_salary must be a non-negative number"));
    }
    Ok(email)
}

/// Employee of the given tenant, or 404.
pub(crate) async fn fetch_employee(
    pool: &MySqlPool,
    employee_id: u64,
    admin_id: u64,
) -> ApiResult<Employee> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ? AND admin_id = ?");
    sqlx::query_as::<_, Employee>(&sql)
        .bind(employee_id)
        .bind(admin_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = EmployeeResponse),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Plan employee limit reached", body = Object, example = json!({
            "message": "Plan free allows at most 10 employees"
        })),
        (status = 409, description = "Email already registered")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> ApiResult<HttpResponse> {
    let admin_id = auth.require_admin()?;
    let email = validate_create(&payload)?;

    let plan = load_admin(pool.get_ref(), admin_id).await?.plan();
    let current = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees WHERE admin_id = ?")
        .bind(admin_id)
        .fetch_one(pool.get_ref())
        .await?;
    if !plan.can_add_employee(current) {
        let max = plan.max_employees().unwrap_or_default();
        return Err(ApiError::forbidden(format!("Plan {plan} allows at most {max} employees")));
    }

    if !email_filter::is_email_available(pool.get_ref(), Account::Employee, &email).await? {
        return Err(ApiError::conflict("Email already registered"));
    }

    let hashed = hash_or_500(&payload.password)?;

    let result = sqlx::query(
        r#"
        INSERT INTO employees
            (admin_id, name, email, password, phone, designation, department, basic_salary, joining_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(admin_id)
    .bind(payload.name.trim())
    .bind(&email)
    .bind(&hashed)
    .bind(blank_to_none(&payload.phone))
    .bind(blank_to_none(&payload.designation))
    .bind(blank_to_none(&payload.department))
    .bind(payload.basic_salary)
    .bind(payload.joining_date)
    .execute(pool.get_ref())
    .await
    .map_err(|e| ApiError::on_insert(e, "Email already registered"))?;

    email_filter::insert(Account::Employee, &email);

    let employee_id = result.last_insert_id();
    info!(admin_id, employee_id, "Employee created");

    let employee = fetch_employee(pool.get_ref(), employee_id, admin_id).await?;
    Ok(HttpResponse::Created().json(EmployeeResponse::from(employee)))
}

/// List employees of the tenant
#[utoipa::path(
    get,
    path = "/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse)
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> ApiResult<HttpResponse> {
    let admin_id = auth.require_admin()?;
    let (page, per_page, offset) = pagination::window(query.page, query.per_page);

    // ---------- build WHERE clause dynamically ----------
    let mut filters = Filters::new();
    filters.push("admin_id = ?", [SqlValue::U64(admin_id)]);

    if let Some(department) = blank_to_none(&query.department) {
        filters.push("department = ?", [SqlValue::String(department.to_string())]);
    }
    if let Some(is_active) = query.is_active {
        filters.push("is_active = ?", [SqlValue::Bool(is_active)]);
    }
    if let Some(search) = blank_to_none(&query.search) {
        let like = format!("%{}%", escape_like(search));
        filters.push(
            r"(name LIKE ? ESCAPE '\\' OR email LIKE ? ESCAPE '\\')",
            [SqlValue::String(like.clone()), SqlValue::String(like)],
        );
    }
    let where_clause = filters.where_clause();

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) FROM employees{where_clause}");
    debug!(sql = %count_sql, bindings = ?filters.values, "Counting employees");

    let total = bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), filters.values.iter().cloned())
        .fetch_one(pool.get_ref())
        .await?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees{where_clause} ORDER BY id DESC LIMIT ? OFFSET ?"
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching employees");

    let employees = bind_values!(sqlx::query_as::<_, Employee>(&data_sql), filters.values)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees.into_iter().map(EmployeeResponse::from).collect(),
        page,
        per_page,
        total,
    }))
}

/// Own profile of the calling employee
#[utoipa::path(
    get,
    path = "/employees/me",
    responses(
        (status = 200, description = "Employee profile", body = EmployeeResponse),
        (status = 403, description = "Not an employee token")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    let employee_id = auth.require_employee()?;
    let employee = fetch_employee(pool.get_ref(), employee_id, auth.admin_id).await?;

    Ok(HttpResponse::Ok().json(EmployeeResponse::from(employee)))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/employees/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = EmployeeResponse),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let admin_id = auth.require_admin()?;
    let employee = fetch_employee(pool.get_ref(), path.into_inner(), admin_id).await?;

    Ok(HttpResponse::Ok().json(EmployeeResponse::from(employee)))
}

/// Update Employee
///
/// Accepts any subset of `name`, `phone`, `designation`, `department`,
/// `basic_salary`, `joining_date` and `is_active`.
#[utoipa::path(
    put,
    path = "/employees/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    request_body(content = Object, example = json!({
        "department": "Finance",
        "basic_salary": 42000.0,
        "is_active": true
    })),
    responses(
        (status = 200, description = "Employee updated", body = EmployeeResponse),
        (status = 400, description = "Unknown field or invalid value"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    let admin_id = auth.require_admin()?;
    let employee_id = path.into_inner();

    let update = build_update_sql("employees", &body, UPDATABLE, employee_id, admin_id)?;
    let affected = execute_update(pool.get_ref(), update).await?;

    // zero rows also means "nothing changed"; the fetch below decides 404
    let employee = fetch_employee(pool.get_ref(), employee_id, admin_id).await?;
    if affected > 0 {
        gate_cache::invalidate(employee_id).await;
        info!(admin_id, employee_id, "Employee updated");
    }

    Ok(HttpResponse::Ok().json(EmployeeResponse::from(employee)))
}

/// Clear the bound device so the next login binds a new one
#[utoipa::path(
    put,
    path = "/employees/{employee_id}/reset-device",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Device binding cleared", body = Object, example = json!({
            "message": "Device binding reset"
        })),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn reset_device(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let admin_id = auth.require_admin()?;
    let employee_id = path.into_inner();

    fetch_employee(pool.get_ref(), employee_id, admin_id).await?;

    sqlx::query("UPDATE employees SET device_id = NULL WHERE id = ? AND admin_id = ?")
        .bind(employee_id)
        .bind(admin_id)
        .execute(pool.get_ref())
        .await?;

    gate_cache::invalidate(employee_id).await;
    info!(admin_id, employee_id, "Device binding reset");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Device binding reset"
    })))
}
