use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub id: u64,
    pub admin_id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub punch_in: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub punch_out: Option<DateTime<Utc>>,
    pub punch_in_latitude: Option<f64>,
    pub punch_in_longitude: Option<f64>,
    pub punch_out_latitude: Option<f64>,
    pub punch_out_longitude: Option<f64>,
    pub punch_in_photo: Option<String>,
    pub punch_out_photo: Option<String>,
    pub worked_minutes: Option<i64>,
}

pub const ATTENDANCE_COLUMNS: &str = "id, admin_id, employee_id, date, punch_in, punch_out, \
     punch_in_latitude, punch_in_longitude, punch_out_latitude, punch_out_longitude, \
     punch_in_photo, punch_out_photo, worked_minutes";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceState {
    NotPunchedIn,
    PunchedIn,
    PunchedOut,
}

impl AttendanceState {
    pub fn of(record: Option<&Attendance>) -> Self {
        match record {
            None => AttendanceState::NotPunchedIn,
            Some(r) if r.punch_in.is_none() => AttendanceState::NotPunchedIn,
            Some(r) if r.punch_out.is_none() => AttendanceState::PunchedIn,
            Some(_) => AttendanceState::PunchedOut,
        }
    }
}

/// Whole minutes between punch-in and punch-out; never negative.
pub fn worked_minutes(punch_in: DateTime<Utc>, punch_out: DateTime<Utc>) -> i64 {
    (punch_out - punch_in).num_minutes().max(0)
}
