use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "admin_id": 1,
    "employee_id": 7,
    "start_date": "2026-01-05",
    "end_date": "2026-01-07",
    "leave_type": "sick",
    "reason": "Flu",
    "status": "pending",
    "reviewed_at": null,
    "created_at": "2026-01-01T00:00:00Z"
}))]
pub struct LeaveRequest {
    pub id: u64,
    pub admin_id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub leave_type: String,
    pub reason: Option<String>,
    pub status: String,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

pub const LEAVE_COLUMNS: &str =
    "id, admin_id, employee_id, start_date, end_date, leave_type, reason, status, reviewed_at, created_at";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Annual,
    Sick,
    Casual,
    Unpaid,
}

impl LeaveType {
    /// Approved days of this type count towards payroll.
    pub fn is_paid(self) -> bool {
        self != LeaveType::Unpaid
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    /// Statuses that occupy the calendar and block overlapping requests.
    pub const BLOCKING: [LeaveStatus; 2] = [LeaveStatus::Pending, LeaveStatus::Approved];

    /// Whether an admin review may move `self` to `next`.
    pub fn can_review_to(self, next: LeaveStatus) -> bool {
        self == LeaveStatus::Pending && matches!(next, LeaveStatus::Approved | LeaveStatus::Rejected)
    }

    /// Whether the owner may cancel a leave in this status that starts on `start`.
    pub fn can_cancel(self, start: NaiveDate, today: NaiveDate) -> bool {
        match self {
            LeaveStatus::Pending => true,
            LeaveStatus::Approved => start > today,
            LeaveStatus::Rejected | LeaveStatus::Cancelled => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn review_only_from_pending() {
        assert!(LeaveStatus::Pending.can_review_to(LeaveStatus::Approved));
        assert!(LeaveStatus::Pending.can_review_to(LeaveStatus::Rejected));
        assert!(!LeaveStatus::Pending.can_review_to(LeaveStatus::Cancelled));
        assert!(!LeaveStatus::Approved.can_review_to(LeaveStatus::Rejected));
        assert!(!LeaveStatus::Rejected.can_review_to(LeaveStatus::Approved));
    }

    #[test]
    fn approved_leave_cancellable_only_before_it_starts() {
        let today = d(2026, 3, 10);
        assert!(LeaveStatus::Approved.can_cancel(d(2026, 3, 11), today));
        assert!(!LeaveStatus::Approved.can_cancel(d(2026, 3, 10), today));
        assert!(LeaveStatus::Pending.can_cancel(d(2026, 3, 1), today));
        assert!(!LeaveStatus::Cancelled.can_cancel(d(2026, 4, 1), today));
    }

    #[test]
    fn only_unpaid_leave_is_unpaid() {
        assert!(LeaveType::Annual.is_paid());
        assert!(LeaveType::Sick.is_paid());
        assert!(!LeaveType::Unpaid.is_paid());
        assert_eq!("unpaid".parse::<LeaveType>().unwrap(), LeaveType::Unpaid);
    }

    #[test]
    fn status_parses_from_storage() {
        assert_eq!("approved".parse::<LeaveStatus>().unwrap(), LeaveStatus::Approved);
        assert_eq!(LeaveStatus::Cancelled.to_string(), "cancelled");
        assert!("archived".parse::<LeaveStatus>().is_err());
    }
}
