use crate::{
    auth::{
        auth::{AUTH_COOKIE, extract_token},
        jwt::{TokenSubject, generate_token, verify_token},
        password::{MIN_PASSWORD_LEN, hash_password, verify_password},
    },
    config::Config,
    error::{ApiError, ApiResult},
    model::{admin::Admin, employee::EMPLOYEE_COLUMNS, employee::Employee, plan::Plan, role::Role},
    models::{AdminSignupReq, EmployeeLoginReq, LoginReqDto, LoginResponse},
    utils::{
        device_lock::{DeviceDecision, check_device},
        email_filter::{self, Account},
        gate_cache, revocation_cache,
    },
};
use actix_web::cookie::{Cookie, SameSite, time::Duration as CookieDuration};
use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};

fn auth_cookie(token: &str, config: &Config) -> Cookie<'static> {
    Cookie::build(AUTH_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(config.token_ttl as i64))
        .finish()
}

fn removal_cookie(config: &Config) -> Cookie<'static> {
    let mut cookie = Cookie::build(AUTH_COOKIE, "")
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .finish();
    cookie.make_removal();
    cookie
}

/// Issue a token and answer with it in the body and the `token` cookie.
fn issue(subject: &TokenSubject, config: &Config, created: bool) -> ApiResult<HttpResponse> {
    let (token, _) = generate_token(subject, &config.jwt_secret, config.token_ttl).map_err(|e| {
        error!(error = %e, "Failed to sign token");
        ApiError::Internal
    })?;

    let body = LoginResponse {
        token: token.clone(),
        expires_in: config.token_ttl,
        role: subject.role.to_string(),
    };

    let mut resp = if created {
        HttpResponse::Created()
    } else {
        HttpResponse::Ok()
    };
    Ok(resp.cookie(auth_cookie(&token, config)).json(body))
}

pub(crate) fn validate_email(email: &str) -> ApiResult<String> {
    let email = email_filter::normalize(email);
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !email.contains(' '));
    if !valid {
        return Err(ApiError::bad_request("A valid email is required"));
    }
    Ok(email)
}

pub(crate) fn validate_new_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub(crate) fn hash_or_500(password: &str) -> ApiResult<String> {
    hash_password(password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        ApiError::Internal
    })
}

/// Create a tenant (admin account)
#[utoipa::path(
    post,
    path = "/admin/signup",
    request_body = AdminSignupReq,
    responses(
        (status = 201, description = "Tenant created", body = LoginResponse),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Admin"
)]
#[instrument(name = "admin_signup", skip(payload, pool, config), fields(email = %payload.email))]
pub async fn admin_signup(
    payload: web::Json<AdminSignupReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let email = validate_email(&payload.email)?;
    let company_name = payload.company_name.trim();
    let name = payload.name.trim();
    if company_name.is_empty() || name.is_empty() {
        return Err(ApiError::bad_request("company_name and name are required"));
    }
    validate_new_password(&payload.password)?;

    if !email_filter::is_email_available(pool.get_ref(), Account::Admin, &email).await? {
        return Err(ApiError::conflict("Email already registered"));
    }

    let hashed = hash_or_500(&payload.password)?;
    let plan = payload.plan.unwrap_or(Plan::Free);

    let result = sqlx::query(
        r#"
        INSERT INTO admins (company_name, name, email, password, plan)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(company_name)
    .bind(name)
    .bind(&email)
    .bind(&hashed)
    .bind(plan.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| ApiError::on_insert(e, "Email already registered"))?;

    email_filter::insert(Account::Admin, &email);

    let admin_id = result.last_insert_id();
    info!(admin_id, "Tenant created");

    issue(&TokenSubject::admin(admin_id, email), &config, true)
}

/// Admin login
#[utoipa::path(
    post,
    path = "/admin/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Logged in; token also set as `token` cookie", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Admin"
)]
#[instrument(name = "admin_login", skip(payload, pool, config), fields(email = %payload.email))]
pub async fn admin_login(
    payload: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    info!("Login request received");

    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }
    let email = email_filter::normalize(&payload.email);

    debug!("Fetching admin from database");
    let admin = sqlx::query_as::<_, Admin>(
        r#"
        SELECT id, company_name, name, email, password, plan, office_latitude, office_longitude,
               allowed_radius_m, device_lock_enabled, location_check_enabled, created_at
        FROM admins
        WHERE email = ?
        "#,
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await?;

    let Some(admin) = admin else {
        info!("Invalid credentials: admin not found");
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    if let Err(e) = verify_password(&payload.password, &admin.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    info!(admin_id = admin.id, "Login successful");
    issue(&TokenSubject::admin(admin.id, admin.email), &config, false)
}

/// Employee login with device lock
#[utoipa::path(
    post,
    path = "/employees/login",
    request_body = EmployeeLoginReq,
    responses(
        (status = 200, description = "Logged in; token also set as `token` cookie", body = LoginResponse),
        (status = 400, description = "device_id required by device lock"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Deactivated account or unrecognised device")
    ),
    tag = "Employee"
)]
#[instrument(name = "employee_login", skip(payload, pool, config), fields(email = %payload.email))]
pub async fn employee_login(
    payload: web::Json<EmployeeLoginReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    info!("Login request received");

    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }
    let email = email_filter::normalize(&payload.email);

    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE email = ?");
    let employee = sqlx::query_as::<_, Employee>(&sql)
        .bind(&email)
        .fetch_optional(pool.get_ref())
        .await?;

    let Some(employee) = employee else {
        info!("Invalid credentials: employee not found");
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    if let Err(e) = verify_password(&payload.password, &employee.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    if !employee.is_active {
        return Err(ApiError::forbidden("Account is deactivated"));
    }

    let lock_enabled =
        sqlx::query_scalar::<_, bool>("SELECT device_lock_enabled FROM admins WHERE id = ?")
            .bind(employee.admin_id)
            .fetch_optional(pool.get_ref())
            .await?
            .unwrap_or(true);

    match check_device(lock_enabled, employee.device_id.as_deref(), payload.device_id.as_deref()) {
        DeviceDecision::Allowed => {}
        DeviceDecision::Bind => {
            let device = payload.device_id.as_deref().unwrap_or_default().trim();
            let bound = sqlx::query(
                "UPDATE employees SET device_id = ? WHERE id = ? AND device_id IS NULL",
            )
            .bind(device)
            .bind(employee.id)
            .execute(pool.get_ref())
            .await?;

            gate_cache::invalidate(employee.id).await;
            if bound.rows_affected() == 0 {
                warn!(employee_id = employee.id, "Device bound concurrently by another login");
                return Err(ApiError::forbidden("Device not recognised for this account"));
            }
            info!(employee_id = employee.id, "Device bound at login");
        }
        DeviceDecision::Missing => {
            return Err(ApiError::bad_request("device_id is required"));
        }
        DeviceDecision::Mismatch => {
            warn!(employee_id = employee.id, "Login from unrecognised device");
            return Err(ApiError::forbidden("Device not recognised for this account"));
        }
    }

    info!(employee_id = employee.id, "Login successful");
    issue(
        &TokenSubject::employee(employee.id, employee.admin_id, employee.email),
        &config,
        false,
    )
}

/// Logout (admin or employee)
#[utoipa::path(
    post,
    path = "/admin/logout",
    responses(
        (status = 200, description = "Token revoked (if valid) and cookie cleared", body = Object, example = json!({
            "message": "Logged out"
        }))
    ),
    tag = "Admin"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let resp = || {
        HttpResponse::Ok()
            .cookie(removal_cookie(&config))
            .json(json!({ "message": "Logged out" }))
    };

    let Some(token) = extract_token(&req) else {
        return resp();
    };
    let claims = match verify_token(&token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return resp(),
    };

    // idempotent: revoking twice just refreshes the row
    if let Err(e) = revocation_cache::revoke(pool.get_ref(), &claims.jti, claims.exp as i64).await {
        error!(error = %e, user_id = claims.user_id, "Failed to revoke token");
        return HttpResponse::InternalServerError().json(json!({
            "message": "Internal Server Error"
        }));
    }

    info!(
        user_id = claims.user_id,
        role = ?Role::from_id(claims.role),
        "Logged out"
    );
    resp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: "handler-test-secret".into(),
            server_addr: String::new(),
            token_ttl: 3600,
            cookie_secure: true,
            rate_login_per_min: 60,
            rate_signup_per_min: 60,
            rate_protected_per_min: 60,
            api_prefix: String::new(),
            utc_offset_minutes: 0,
            db_max_connections: 1,
            run_migrations: false,
            log_dir: "logs".into(),
        }
    }

    #[test]
    fn email_validation_normalizes() {
        assert_eq!(validate_email("  Owner@Acme.Test ").unwrap(), "owner@acme.test");
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@acme.test").is_err());
        assert!(validate_email("owner@localhost").is_err());
    }

    #[test]
    fn password_policy() {
        assert!(validate_new_password("short").is_err());
        assert!(validate_new_password("long-enough").is_ok());
    }

    #[test]
    fn auth_cookie_attributes() {
        let cookie = auth_cookie("abc", &config());
        assert_eq!(cookie.name(), AUTH_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(CookieDuration::seconds(3600)));
    }

    #[test]
    fn issue_sets_cookie_and_body() {
        let resp = issue(&TokenSubject::admin(1, "owner@acme.test"), &config(), true).unwrap();
        assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);
        let cookie = resp.cookies().find(|c| c.name() == AUTH_COOKIE).unwrap();
        assert!(verify_token(cookie.value(), "handler-test-secret").is_ok());
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let cookie = removal_cookie(&config());
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
    }
}
