use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Employee {
    pub id: u64,
    pub admin_id: u64,
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub designation: Option<String>,
    pub department: Option<String>,
    pub basic_salary: f64,
    pub joining_date: Option<NaiveDate>,
    pub device_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Public view of an employee: no password hash, device binding as a flag.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "admin_id": 1,
        "name": "John Doe",
        "email": "john.doe@company.com",
        "phone": "+8801712345678",
        "designation": "Engineer",
        "department": "R&D",
        "basic_salary": 30000.0,
        "joining_date": "2024-01-01",
        "device_bound": true,
        "is_active": true,
        "created_at": "2024-01-01T09:00:00Z"
    })
)]
pub struct EmployeeResponse {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = 1)]
    pub admin_id: u64,

    #[schema(example = "John Doe")]
    pub name: String,

    #[schema(example = "john.doe@company.com")]
    pub email: String,

    #[schema(example = "+8801712345678", nullable = true)]
    pub phone: Option<String>,

    #[schema(example = "Engineer", nullable = true)]
    pub designation: Option<String>,

    #[schema(example = "R&D", nullable = true)]
    pub department: Option<String>,

    #[schema(example = 30000.0)]
    pub basic_salary: f64,

    #[schema(example = "2024-01-01", value_type = Option<String>, format = "date")]
    pub joining_date: Option<NaiveDate>,

    pub device_bound: bool,

    pub is_active: bool,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl From<Employee> for EmployeeResponse {
    fn from(e: Employee) -> Self {
        Self {
            id: e.id,
            admin_id: e.admin_id,
            name: e.name,
            email: e.email,
            phone: e.phone,
            designation: e.designation,
            department: e.department,
            basic_salary: e.basic_salary,
            joining_date: e.joining_date,
            device_bound: e.device_id.is_some(),
            is_active: e.is_active,
            created_at: e.created_at,
        }
    }
}

pub const EMPLOYEE_COLUMNS: &str = "id, admin_id, name, email, password, phone, designation, \
     department, basic_salary, joining_date, device_id, is_active, created_at";

#[cfg(test)]
pub(crate) fn sample_employee() -> Employee {
    Employee {
        id: 7,
        admin_id: 1,
        name: "John Doe".into(),
        email: "john.doe@company.com".into(),
        password: "hash".into(),
        phone: None,
        designation: Some("Engineer".into()),
        department: Some("R&D".into()),
        basic_salary: 30_000.0,
        joining_date: NaiveDate::from_ymd_opt(2024, 1, 1),
        device_id: Some("device-abc".into()),
        is_active: true,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_hides_secrets() {
        let json = serde_json::to_value(EmployeeResponse::from(sample_employee())).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("device_id").is_none());
        assert_eq!(json["device_bound"], true);
    }
}
