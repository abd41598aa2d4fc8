use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::plan::Plan;

#[derive(Deserialize, ToSchema)]
pub struct AdminSignupReq {
    #[schema(example = "Acme Ltd")]
    pub company_name: String,
    #[schema(example = "Jane Owner")]
    pub name: String,
    #[schema(example = "owner@acme.test", format = "email")]
    pub email: String,
    #[schema(example = "s3cret-passw0rd")]
    pub password: String,
    pub plan: Option<Plan>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "owner@acme.test", format = "email")]
    pub email: String,
    #[schema(example = "s3cret-passw0rd")]
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct EmployeeLoginReq {
    #[schema(example = "john.doe@company.com", format = "email")]
    pub email: String,
    #[schema(example = "s3cret-passw0rd")]
    pub password: String,
    /// Stable identifier of the device the employee logs in from
    #[schema(example = "android-7f3c2a")]
    pub device_id: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    #[schema(example = 86400)]
    pub expires_in: usize,
    #[schema(example = "admin")]
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// login email
    pub sub: String,
    pub user_id: u64,
    pub role: u8, // role id
    /// Tenant the caller belongs to; equals `user_id` for admins
    pub admin_id: u64,
    /// Present only for employee tokens
    pub employee_id: Option<u64>,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
}
