use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::{
        admin::{Admin, AdminProfile},
        plan::Plan,
    },
    utils::{gate_cache, geo::GeoPoint},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

const ADMIN_COLUMNS: &str = "id, company_name, name, email, password, plan, office_latitude, \
     office_longitude, allowed_radius_m, device_lock_enabled, location_check_enabled, created_at";

/// Load the tenant row. A token for a deleted tenant is treated as unauthenticated.
pub(crate) async fn load_admin(pool: &MySqlPool, admin_id: u64) -> ApiResult<Admin> {
    let sql = format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE id = ?");
    sqlx::query_as::<_, Admin>(&sql)
        .bind(admin_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Account not found"))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateSettings {
    #[schema(example = 23.8103)]
    pub office_latitude: Option<f64>,
    #[schema(example = 90.4125)]
    pub office_longitude: Option<f64>,
    #[schema(example = 150.0)]
    pub allowed_radius_m: Option<f64>,
    pub device_lock_enabled: Option<bool>,
    pub location_check_enabled: Option<bool>,
    pub plan: Option<Plan>,
}

fn validate_settings(payload: &UpdateSettings) -> ApiResult<()> {
    match (payload.office_latitude, payload.office_longitude) {
        (None, None) => {}
        (Some(latitude), Some(longitude)) => {
            if !(GeoPoint { latitude, longitude }).is_valid() {
                return Err(ApiError::bad_request("Office coordinates are out of range"));
            }
        }
        _ => {
            return Err(ApiError::bad_request(
                "office_latitude and office_longitude must be set together",
            ));
        }
    }

    if let Some(radius) = payload.allowed_radius_m {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(ApiError::bad_request("allowed_radius_m must be positive"));
        }
    }

    Ok(())
}

/// Current tenant profile and settings
#[utoipa::path(
    get,
    path = "/admin/me",
    responses(
        (status = 200, description = "Tenant profile", body = AdminProfile),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Admin"
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    let admin_id = auth.require_admin()?;
    let admin = load_admin(pool.get_ref(), admin_id).await?;

    Ok(HttpResponse::Ok().json(AdminProfile::from(admin)))
}

/// Update office location, radius, device lock / location check flags and plan
#[utoipa::path(
    put,
    path = "/admin/settings",
    request_body = UpdateSettings,
    responses(
        (status = 200, description = "Updated tenant profile", body = AdminProfile),
        (status = 400, description = "Invalid settings"),
        (status = 409, description = "Plan limit below current employee count")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Admin"
)]
pub async fn update_settings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<UpdateSettings>,
) -> ApiResult<HttpResponse> {
    let admin_id = auth.require_admin()?;
    validate_settings(&payload)?;

    if let Some(plan) = payload.plan {
        if let Some(max) = plan.max_employees() {
            let current =
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees WHERE admin_id = ?")
                    .bind(admin_id)
                    .fetch_one(pool.get_ref())
                    .await?;
            if current > max {
                return Err(ApiError::conflict(format!(
                    "Plan {plan} allows {max} employees, tenant has {current}"
                )));
            }
        }
    }

    sqlx::query(
        r#"
        UPDATE admins
        SET office_latitude = COALESCE(?, office_latitude),
            office_longitude = COALESCE(?, office_longitude),
            allowed_radius_m = COALESCE(?, allowed_radius_m),
            device_lock_enabled = COALESCE(?, device_lock_enabled),
            location_check_enabled = COALESCE(?, location_check_enabled),
            plan = COALESCE(?, plan)
        WHERE id = ?
        "#,
    )
    .bind(payload.office_latitude)
    .bind(payload.office_longitude)
    .bind(payload.allowed_radius_m)
    .bind(payload.device_lock_enabled)
    .bind(payload.location_check_enabled)
    .bind(payload.plan.map(|p| p.to_string()))
    .bind(admin_id)
    .execute(pool.get_ref())
    .await?;

    // device lock flag is part of every cached employee gate
    gate_cache::invalidate_tenant(admin_id);
    info!(admin_id, "Tenant settings updated");

    let admin = load_admin(pool.get_ref(), admin_id).await?;
    Ok(HttpResponse::Ok().json(AdminProfile::from(admin)))
}
