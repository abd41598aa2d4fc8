pub mod admin;
pub mod attendance;
pub mod employee;
pub mod leave;
pub mod payroll;
pub mod plan;
pub mod role;
pub mod task;
