use crate::api::admin::UpdateSettings;
use crate::api::attendance::{
    AttendanceListResponse, PunchRequest, StatusResponse, VerifyLocation, VerifyResponse,
};
use crate::api::employee::{CreateEmployee, EmployeeListResponse};
use crate::api::leave::{ApplyLeave, LeaveListResponse};
use crate::api::payroll::{GeneratePayroll, PaginatedPayrollResponse};
use crate::api::task::{
    AddComment, AssignTask, Assignee, CreateTask, TaskDashboard, TaskDetail, TaskListResponse,
    UpdateTaskStatus,
};
use crate::model::admin::AdminProfile;
use crate::model::attendance::{Attendance, AttendanceState};
use crate::model::employee::EmployeeResponse;
use crate::model::leave::{LeaveRequest, LeaveStatus, LeaveType};
use crate::model::payroll::{PayrollResponse, PayrollStatus};
use crate::model::plan::Plan;
use crate::model::task::{Task, TaskComment, TaskPriority, TaskStatus};
use crate::models::{AdminSignupReq, EmployeeLoginReq, LoginReqDto, LoginResponse};
use crate::utils::payroll_calc::PayComponent;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "EmpowerHR API",
        version = "1.0.0",
        description = r#"
## Multi-tenant HR & payroll

Each company signs up as an **admin** (tenant) and manages its own employees.

### 🔹 Key Features
- **Employees**: create, list, update, reset the bound device
- **Attendance**: punch-in / punch-out with geofence, photo and device lock
- **Leave**: apply, approve / reject, cancel
- **Payroll**: monthly generation from attendance and approved leave, approve, mark paid
- **Tasks** (premium plan): assign, track status, comment, dashboard

### 🔐 Security
Protected endpoints take a **JWT** either as `Authorization: Bearer <token>` or in the
`token` cookie set at login. Employee requests also send `X-Device-Id` when the company
enforces device lock.

### 📦 Response Format
- JSON everywhere; errors are `{"message": "..."}`
- Pagination via `page` / `per_page` on list endpoints
"#,
    ),
    paths(
        crate::auth::handlers::admin_signup,
        crate::auth::handlers::admin_login,
        crate::auth::handlers::logout,
        crate::auth::handlers::employee_login,

        crate::api::admin::me,
        crate::api::admin::update_settings,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::me,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::reset_device,

        crate::api::attendance::punch_in,
        crate::api::attendance::punch_out,
        crate::api::attendance::status,
        crate::api::attendance::verify,
        crate::api::attendance::list_attendance,

        crate::api::leave::apply_leave,
        crate::api::leave::leave_list,
        crate::api::leave::approve_leave,
        crate::api::leave::reject_leave,
        crate::api::leave::cancel_leave,

        crate::api::payroll::generate_payroll,
        crate::api::payroll::approve_payroll,
        crate::api::payroll::mark_paid,
        crate::api::payroll::payroll_status,
        crate::api::payroll::list_payrolls,

        crate::api::task::create_task,
        crate::api::task::list_tasks,
        crate::api::task::dashboard,
        crate::api::task::get_task,
        crate::api::task::update_task,
        crate::api::task::delete_task,
        crate::api::task::assign_task,
        crate::api::task::update_task_status,
        crate::api::task::add_comment
    ),
    components(
        schemas(
            AdminSignupReq,
            LoginReqDto,
            EmployeeLoginReq,
            LoginResponse,
            Plan,
            AdminProfile,
            UpdateSettings,
            CreateEmployee,
            EmployeeResponse,
            EmployeeListResponse,
            PunchRequest,
            VerifyLocation,
            VerifyResponse,
            StatusResponse,
            Attendance,
            AttendanceState,
            AttendanceListResponse,
            ApplyLeave,
            LeaveRequest,
            LeaveType,
            LeaveStatus,
            LeaveListResponse,
            GeneratePayroll,
            PayComponent,
            PayrollResponse,
            PayrollStatus,
            PaginatedPayrollResponse,
            CreateTask,
            AssignTask,
            UpdateTaskStatus,
            AddComment,
            Task,
            TaskComment,
            TaskPriority,
            TaskStatus,
            Assignee,
            TaskDetail,
            TaskDashboard,
            TaskListResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Admin", description = "Tenant signup, login and settings"),
        (name = "Employee", description = "Employee management and login"),
        (name = "Attendance", description = "Punch-in / punch-out"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Payroll", description = "Payroll management APIs"),
        (name = "Task", description = "Task management (premium plan)"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "device_id",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Device-Id"))),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route_group() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for prefix in ["/admin", "/employees", "/attendence", "/leave", "/payrole", "/task"] {
            assert!(
                paths.iter().any(|p| p.starts_with(prefix)),
                "no documented path under {prefix}"
            );
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
