use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

use crate::{error::ApiError, model::role::Role, models::Claims};

pub const AUTH_COOKIE: &str = "token";

/// Caller identity attached to the request by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
    pub admin_id: u64,
    /// Present only for employee tokens
    pub employee_id: Option<u64>,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Option<Self> {
        let role = Role::from_id(claims.role)?;
        if role == Role::Employee && claims.employee_id.is_none() {
            return None;
        }
        Some(Self {
            user_id: claims.user_id,
            email: claims.sub,
            role,
            admin_id: claims.admin_id,
            employee_id: claims.employee_id,
        })
    }

    /// Returns the tenant id when the caller is its admin.
    pub fn require_admin(&self) -> Result<u64, ApiError> {
        if self.role == Role::Admin {
            Ok(self.admin_id)
        } else {
            Err(ApiError::forbidden("Admin only"))
        }
    }

    /// Returns the employee id when the caller is an employee.
    pub fn require_employee(&self) -> Result<u64, ApiError> {
        match (self.role, self.employee_id) {
            (Role::Employee, Some(id)) => Ok(id),
            _ => Err(ApiError::forbidden("Employee only")),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Token from `Authorization: Bearer ...`, falling back to the `token` cookie.
pub fn extract_token(req: &HttpRequest) -> Option<String> {
    let from_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    from_header.or_else(|| {
        req.cookie(AUTH_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty())
    })
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ApiError::unauthorized("Not authenticated")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    fn claims(role: u8, employee_id: Option<u64>) -> Claims {
        Claims {
            sub: "john@acme.test".into(),
            user_id: 7,
            role,
            admin_id: 1,
            employee_id,
            iat: 0,
            exp: 100,
            jti: "jti".into(),
        }
    }

    #[test]
    fn employee_claims_need_employee_id() {
        assert!(AuthUser::from_claims(claims(Role::Employee.id(), None)).is_none());
        assert!(AuthUser::from_claims(claims(Role::Employee.id(), Some(7))).is_some());
        assert!(AuthUser::from_claims(claims(9, None)).is_none());
    }

    #[test]
    fn role_guards() {
        let admin = AuthUser::from_claims(claims(Role::Admin.id(), None)).unwrap();
        assert_eq!(admin.require_admin().unwrap(), 1);
        assert!(admin.require_employee().is_err());

        let employee = AuthUser::from_claims(claims(Role::Employee.id(), Some(7))).unwrap();
        assert_eq!(employee.require_employee().unwrap(), 7);
        assert!(matches!(employee.require_admin(), Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer header-token"))
            .cookie(Cookie::new(AUTH_COOKIE, "cookie-token"))
            .to_http_request();
        assert_eq!(extract_token(&req).as_deref(), Some("header-token"));
    }

    #[test]
    fn cookie_is_used_without_header() {
        let req = TestRequest::default()
            .cookie(Cookie::new(AUTH_COOKIE, "cookie-token"))
            .to_http_request();
        assert_eq!(extract_token(&req).as_deref(), Some("cookie-token"));

        let bare = TestRequest::default()
            .insert_header(("Authorization", "Basic abc"))
            .to_http_request();
        assert_eq!(extract_token(&bare), None);
    }

    #[actix_web::test]
    async fn extractor_requires_middleware_identity() {
        let req = TestRequest::default().to_http_request();
        let result = AuthUser::extract(&req).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));

        let user = AuthUser::from_claims(claims(Role::Admin.id(), None)).unwrap();
        req.extensions_mut().insert(user);
        let found = AuthUser::extract(&req).await.unwrap();
        assert_eq!(found.admin_id, 1);
    }
}
