use crate::{
    api::admin::load_admin,
    auth::auth::AuthUser,
    bind_values,
    config::Config,
    error::{ApiError, ApiResult},
    model::{
        admin::Admin,
        attendance::{ATTENDANCE_COLUMNS, Attendance, AttendanceState, worked_minutes},
    },
    utils::{
        calendar::local_today,
        db_utils::{Filters, SqlValue},
        geo::{GeoPoint, LocationVerdict, check_location},
        pagination,
    },
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

/// Photos are stored as-is (URL or data URI); anything larger is rejected.
const MAX_PHOTO_LEN: usize = 2 * 1024 * 1024;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PunchRequest {
    #[schema(example = 23.8103)]
    pub latitude: Option<f64>,
    #[schema(example = 90.4125)]
    pub longitude: Option<f64>,
    /// Selfie taken at punch time, as a URL or data URI
    #[schema(example = "https://cdn.example.com/punch/7/2026-03-02-in.jpg")]
    pub photo: Option<String>,
}

impl PunchRequest {
    fn point(&self) -> ApiResult<Option<GeoPoint>> {
        coordinates(self.latitude, self.longitude)
    }

    fn photo(&self) -> ApiResult<Option<&str>> {
        match self.photo.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) if p.len() > MAX_PHOTO_LEN => Err(ApiError::bad_request("photo is too large")),
            other => Ok(other),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyLocation {
    #[schema(example = 23.8103)]
    pub latitude: Option<f64>,
    #[schema(example = 90.4125)]
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    /// false when the tenant has no active geofence
    pub enforced: bool,
    pub allowed: bool,
    #[schema(example = 42.7)]
    pub distance_m: Option<f64>,
    #[schema(example = 150.0)]
    pub radius_m: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    #[schema(value_type = String, format = "date", example = "2026-03-02")]
    pub date: NaiveDate,
    pub state: AttendanceState,
    pub attendance: Option<Attendance>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AttendanceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Admin only; employees always see their own records
    pub employee_id: Option<u64>,
    /// Inclusive start date (YYYY-MM-DD)
    #[param(value_type = Option<String>, example = "2026-03-01")]
    pub from: Option<NaiveDate>,
    /// Inclusive end date (YYYY-MM-DD)
    #[param(value_type = Option<String>, example = "2026-03-31")]
    pub to: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<Attendance>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 22)]
    pub total: i64,
}

fn coordinates(latitude: Option<f64>, longitude: Option<f64>) -> ApiResult<Option<GeoPoint>> {
    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => {
            let point = GeoPoint { latitude, longitude };
            if !point.is_valid() {
                return Err(ApiError::bad_request("Coordinates are out of range"));
            }
            Ok(Some(point))
        }
        (None, None) => Ok(None),
        _ => Err(ApiError::bad_request("latitude and longitude must be sent together")),
    }
}

/// Reject the request unless the tenant's geofence admits `point`.
fn enforce_location(admin: &Admin, point: Option<&GeoPoint>) -> ApiResult<LocationVerdict> {
    let fence = admin.active_geofence();
    match check_location(fence.as_ref(), point) {
        LocationVerdict::Missing => Err(ApiError::bad_request(
            "latitude and longitude are required for this workplace",
        )),
        LocationVerdict::Outside { distance_m, radius_m } => Err(ApiError::forbidden(format!(
            "Outside the allowed area: {distance_m:.0} m from office, limit {radius_m:.0} m"
        ))),
        verdict => Ok(verdict),
    }
}

async fn record_for(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
) -> Result<Option<Attendance>, sqlx::Error> {
    let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? AND date = ?");
    sqlx::query_as::<_, Attendance>(&sql)
        .bind(employee_id)
        .bind(date)
        .fetch_optional(pool)
        .await
}

/// Punch-in endpoint
#[utoipa::path(
    post,
    path = "/attendence/punch-in",
    request_body = PunchRequest,
    responses(
        (status = 201, description = "Punched in", body = Attendance),
        (status = 400, description = "Coordinates required or invalid"),
        (status = 403, description = "Outside the office geofence", body = Object, example = json!({
            "message": "Outside the allowed area: 412 m from office, limit 150 m"
        })),
        (status = 409, description = "Already punched in today", body = Object, example = json!({
            "message": "Already punched in today"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn punch_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<PunchRequest>,
) -> ApiResult<HttpResponse> {
    let employee_id = auth.require_employee()?;
    let point = payload.point()?;
    let photo = payload.photo()?;

    let admin = load_admin(pool.get_ref(), auth.admin_id).await?;
    if let Err(e) = enforce_location(&admin, point.as_ref()) {
        warn!(employee_id, error = %e, "Punch-in rejected by geofence");
        return Err(e);
    }

    let today = local_today(config.utc_offset_minutes);
    if record_for(pool.get_ref(), employee_id, today).await?.is_some() {
        return Err(ApiError::conflict("Already punched in today"));
    }

    sqlx::query(
        r#"
        INSERT INTO attendance
            (admin_id, employee_id, date, punch_in, punch_in_latitude, punch_in_longitude, punch_in_photo)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.admin_id)
    .bind(employee_id)
    .bind(today)
    .bind(Utc::now())
    .bind(point.map(|p| p.latitude))
    .bind(point.map(|p| p.longitude))
    .bind(photo)
    .execute(pool.get_ref())
    .await
    .map_err(|e| ApiError::on_insert(e, "Already punched in today"))?;

    info!(employee_id, %today, "Punched in");

    let record = record_for(pool.get_ref(), employee_id, today)
        .await?
        .ok_or(ApiError::Internal)?;
    Ok(HttpResponse::Created().json(record))
}

/// Punch-out endpoint
#[utoipa::path(
    post,
    path = "/attendence/punch-out",
    request_body = PunchRequest,
    responses(
        (status = 200, description = "Punched out; worked_minutes computed", body = Attendance),
        (status = 400, description = "No open punch-in for today", body = Object, example = json!({
            "message": "No punch-in found for today"
        })),
        (status = 403, description = "Outside the office geofence")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn punch_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<PunchRequest>,
) -> ApiResult<HttpResponse> {
    let employee_id = auth.require_employee()?;
    let point = payload.point()?;
    let photo = payload.photo()?;

    let today = local_today(config.utc_offset_minutes);
    let record = record_for(pool.get_ref(), employee_id, today).await?;
    let (record_id, punched_in_at) = match record {
        Some(Attendance { punch_out: Some(_), .. }) => {
            return Err(ApiError::bad_request("Already punched out today"));
        }
        Some(Attendance { id, punch_in: Some(at), .. }) => (id, at),
        _ => return Err(ApiError::bad_request("No punch-in found for today")),
    };

    let admin = load_admin(pool.get_ref(), auth.admin_id).await?;
    if let Err(e) = enforce_location(&admin, point.as_ref()) {
        warn!(employee_id, error = %e, "Punch-out rejected by geofence");
        return Err(e);
    }

    let now = Utc::now();
    let minutes = worked_minutes(punched_in_at, now);

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET punch_out = ?, punch_out_latitude = ?, punch_out_longitude = ?,
            punch_out_photo = ?, worked_minutes = ?
        WHERE id = ? AND punch_out IS NULL
        "#,
    )
    .bind(now)
    .bind(point.map(|p| p.latitude))
    .bind(point.map(|p| p.longitude))
    .bind(photo)
    .bind(minutes)
    .bind(record_id)
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("Already punched out today"));
    }

    info!(employee_id, %today, worked_minutes = minutes, "Punched out");

    let record = record_for(pool.get_ref(), employee_id, today)
        .await?
        .ok_or(ApiError::Internal)?;
    Ok(HttpResponse::Ok().json(record))
}

/// Today's attendance state of the calling employee
#[utoipa::path(
    get,
    path = "/attendence/status",
    responses(
        (status = 200, description = "Today's state", body = StatusResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let employee_id = auth.require_employee()?;
    let today = local_today(config.utc_offset_minutes);
    let record = record_for(pool.get_ref(), employee_id, today).await?;

    Ok(HttpResponse::Ok().json(StatusResponse {
        date: today,
        state: AttendanceState::of(record.as_ref()),
        attendance: record,
    }))
}

/// Check a location against the office geofence without recording anything
#[utoipa::path(
    post,
    path = "/attendence/verify",
    request_body = VerifyLocation,
    responses(
        (status = 200, description = "Verdict", body = VerifyResponse),
        (status = 400, description = "Coordinates required or invalid")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn verify(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<VerifyLocation>,
) -> ApiResult<HttpResponse> {
    auth.require_employee()?;
    let point = coordinates(payload.latitude, payload.longitude)?;
    let admin = load_admin(pool.get_ref(), auth.admin_id).await?;

    Ok(HttpResponse::Ok().json(verdict_response(&admin, point.as_ref())?))
}

fn verdict_response(admin: &Admin, point: Option<&GeoPoint>) -> ApiResult<VerifyResponse> {
    let fence = admin.active_geofence();
    let verdict = check_location(fence.as_ref(), point);
    let (distance_m, radius_m) = match verdict {
        LocationVerdict::NotEnforced => (None, None),
        LocationVerdict::Inside { distance_m, radius_m }
        | LocationVerdict::Outside { distance_m, radius_m } => (Some(distance_m), Some(radius_m)),
        LocationVerdict::Missing => {
            return Err(ApiError::bad_request(
                "latitude and longitude are required for this workplace",
            ));
        }
    };
    Ok(VerifyResponse {
        enforced: fence.is_some(),
        allowed: verdict.is_allowed(),
        distance_m,
        radius_m,
    })
}

/// Attendance history
#[utoipa::path(
    get,
    path = "/attendence",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Paginated attendance list", body = AttendanceListResponse),
        (status = 400, description = "from is after to")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> ApiResult<HttpResponse> {
    let (page, per_page, offset) = pagination::window(query.page, query.per_page);

    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ApiError::bad_request("from must not be after to"));
        }
    }

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
    if let Some(from) = query.from {
        filters.push("date >= ?", [SqlValue::Date(from)]);
    }
    if let Some(to) = query.to {
        filters.push("date <= ?", [SqlValue::Date(to)]);
    }
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM attendance{where_clause}");
    let total = bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), filters.values.iter().cloned())
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance{where_clause} \
         ORDER BY date DESC, id DESC LIMIT ? OFFSET ?"
    );
    let data = bind_values!(sqlx::query_as::<_, Attendance>(&data_sql), filters.values)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::admin::sample_admin;

    // sample_admin's office is at (23.8103, 90.4125) with a 150 m radius
    fn near() -> GeoPoint {
        GeoPoint { latitude: 23.8108, longitude: 90.4125 }
    }

    fn far() -> GeoPoint {
        GeoPoint { latitude: 23.8203, longitude: 90.4125 }
    }

    #[test]
    fn geofence_admits_nearby_points() {
        let verdict = enforce_location(&sample_admin(), Some(&near())).unwrap();
        assert!(verdict.is_allowed());
    }

    #[test]
    fn geofence_rejects_far_and_missing_points() {
        let admin = sample_admin();
        assert!(matches!(enforce_location(&admin, Some(&far())), Err(ApiError::Forbidden(_))));
        assert!(matches!(enforce_location(&admin, None), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn disabled_location_check_lets_anything_through() {
        let admin = Admin { location_check_enabled: false, ..sample_admin() };
        assert_eq!(enforce_location(&admin, None).unwrap(), LocationVerdict::NotEnforced);
        assert_eq!(
            enforce_location(&admin, Some(&far())).unwrap(),
            LocationVerdict::NotEnforced
        );
    }

    #[test]
    fn verify_reports_distance_without_failing() {
        let outside = verdict_response(&sample_admin(), Some(&far())).unwrap();
        assert!(outside.enforced);
        assert!(!outside.allowed);
        assert!(outside.distance_m.unwrap() > 1_000.0);

        let free_plan = Admin { plan: "free".into(), ..sample_admin() };
        let not_enforced = verdict_response(&free_plan, None).unwrap();
        assert!(!not_enforced.enforced);
        assert!(not_enforced.allowed);
    }

    #[test]
    fn coordinates_must_be_paired_and_in_range() {
        assert!(coordinates(Some(10.0), None).is_err());
        assert!(coordinates(Some(91.0), Some(0.0)).is_err());
        assert_eq!(coordinates(None, None).unwrap(), None);
        assert!(coordinates(Some(10.0), Some(20.0)).unwrap().is_some());
    }

    #[test]
    fn blank_photo_is_ignored_and_huge_photo_rejected() {
        let blank = PunchRequest { photo: Some("   ".into()), ..Default::default() };
        assert_eq!(blank.photo().unwrap(), None);

        let huge = PunchRequest { photo: Some("x".repeat(MAX_PHOTO_LEN + 1)), ..Default::default() };
        assert!(huge.photo().is_err());
    }
}
