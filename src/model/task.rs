use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Task {
    pub id: u64,
    pub admin_id: u64,
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub status: String,
    #[schema(value_type = Option<String>, format = "date")]
    pub due_date: Option<NaiveDate>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

pub const TASK_COLUMNS: &str =
    "id, admin_id, title, description, priority, status, due_date, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct TaskComment {
    pub id: u64,
    pub task_id: u64,
    pub author_role: String,
    pub author_id: u64,
    pub body: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (Pending, InProgress) | (Pending, Cancelled) => true,
            (InProgress, Completed) | (InProgress, Cancelled) | (InProgress, Pending) => true,
            _ => false,
        }
    }
}

/// A task is overdue when its due date has passed and it is still open.
pub fn is_overdue(status: TaskStatus, due_date: Option<NaiveDate>, today: NaiveDate) -> bool {
    match due_date {
        Some(due) => due < today && !status.is_terminal(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Cancelled.can_transition_to(Pending));
        for s in [Pending, InProgress, Completed, Cancelled] {
            assert!(!s.can_transition_to(s));
        }
    }

    #[test]
    fn kebab_case_on_the_wire() {
        assert_eq!(TaskStatus::InProgress.to_string(), "in-progress");
        assert_eq!("in-progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
    }

    #[test]
    fn overdue_ignores_closed_tasks() {
        let today = NaiveDate::from_ymd_opt(2026, 5, 10).unwrap();
        let past = NaiveDate::from_ymd_opt(2026, 5, 9);
        assert!(is_overdue(TaskStatus::InProgress, past, today));
        assert!(!is_overdue(TaskStatus::Completed, past, today));
        assert!(!is_overdue(TaskStatus::Pending, Some(today), today));
        assert!(!is_overdue(TaskStatus::Pending, None, today));
    }
}
