use crate::auth::auth::{AuthUser, extract_token};
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::Role;
use crate::utils::device_lock::{DeviceDecision, check_device};
use crate::utils::{gate_cache, revocation_cache};
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;
use sqlx::MySqlPool;

pub const DEVICE_HEADER: &str = "X-Device-Id";

fn reject(req: ServiceRequest, resp: HttpResponse) -> Result<ServiceResponse<BoxBody>, Error> {
    Ok(req.into_response(resp.map_into_boxed_body()))
}

/// Verifies the JWT (bearer header or `token` cookie) and attaches `AuthUser`.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let token = match extract_token(req.request()) {
        Some(t) => t,
        None => {
            let resp = HttpResponse::Unauthorized().json(json!({"message": "Missing token"}));
            return reject(req, resp);
        }
    };

    let claims = match verify_token(&token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "Token rejected");
            let resp =
                HttpResponse::Unauthorized().json(json!({"message": "Invalid or expired token"}));
            return reject(req, resp);
        }
    };

    if revocation_cache::is_revoked(&claims.jti).await {
        let resp = HttpResponse::Unauthorized().json(json!({"message": "Token has been revoked"}));
        return reject(req, resp);
    }

    let auth_user = match AuthUser::from_claims(claims) {
        Some(user) => user,
        None => {
            let resp = HttpResponse::Unauthorized().json(json!({"message": "Invalid role"}));
            return reject(req, resp);
        }
    };

    tracing::debug!(user = %auth_user.email, role = %auth_user.role, "Authenticated");
    req.extensions_mut().insert(auth_user);

    next.call(req).await
}

/// For employee callers: the account must still exist and be active, and the
/// `X-Device-Id` header must match the bound device when the tenant enforces
/// device lock. Admin requests pass through untouched.
pub async fn employee_guard(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let auth = req
        .extensions()
        .get::<AuthUser>()
        .filter(|user| user.role == Role::Employee)
        .cloned();

    let Some(auth) = auth else {
        return next.call(req).await;
    };
    let Some(employee_id) = auth.employee_id else {
        return reject(req, HttpResponse::Unauthorized().json(json!({"message": "Invalid token"})));
    };

    let pool = req
        .app_data::<Data<MySqlPool>>()
        .cloned()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("Database pool missing"))?;

    let gate = match gate_cache::get(pool.get_ref(), employee_id).await {
        Ok(Some(gate)) if gate.admin_id == auth.admin_id => gate,
        Ok(_) => {
            return reject(req, HttpResponse::Unauthorized().json(json!({"message": "Account not found"})));
        }
        Err(e) => {
            tracing::error!(error = %e, employee_id, "Failed to load employee gate");
            return reject(
                req,
                HttpResponse::InternalServerError().json(json!({"message": "Internal Server Error"})),
            );
        }
    };

    if !gate.is_active {
        return reject(req, HttpResponse::Forbidden().json(json!({"message": "Account is deactivated"})));
    }

    let presented = req
        .headers()
        .get(DEVICE_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    match check_device(gate.device_lock_enabled, gate.device_id.as_deref(), presented.as_deref()) {
        DeviceDecision::Allowed => {}
        DeviceDecision::Bind => {
            // First device seen after a reset: bind it unless another request won the race.
            let device = presented.unwrap_or_default();
            let bound = sqlx::query(
                "UPDATE employees SET device_id = ? WHERE id = ? AND device_id IS NULL",
            )
            .bind(device.trim())
            .bind(employee_id)
            .execute(pool.get_ref())
            .await;

            gate_cache::invalidate(employee_id).await;
            match bound {
                Ok(r) if r.rows_affected() == 1 => {
                    tracing::info!(employee_id, "Device bound on first request");
                }
                Ok(_) => {
                    return reject(
                        req,
                        HttpResponse::Forbidden().json(json!({"message": "Device not recognised for this account"})),
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, employee_id, "Failed to bind device");
                    return reject(
                        req,
                        HttpResponse::InternalServerError().json(json!({"message": "Internal Server Error"})),
                    );
                }
            }
        }
        DeviceDecision::Missing => {
            return reject(
                req,
                HttpResponse::BadRequest().json(json!({"message": "X-Device-Id header is required"})),
            );
        }
        DeviceDecision::Mismatch => {
            tracing::warn!(employee_id, "Device lock mismatch");
            return reject(
                req,
                HttpResponse::Forbidden().json(json!({"message": "Device not recognised for this account"})),
            );
        }
    }

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::auth::AUTH_COOKIE;
    use crate::auth::jwt::{TokenSubject, generate_token};
    use actix_web::cookie::Cookie;
    use actix_web::http::StatusCode;
    use actix_web::middleware::from_fn;
    use actix_web::{App, test, web};

    fn test_config() -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: "middleware-test-secret".into(),
            server_addr: String::new(),
            token_ttl: 600,
            cookie_secure: false,
            rate_login_per_min: 60,
            rate_signup_per_min: 60,
            rate_protected_per_min: 60,
            api_prefix: String::new(),
            utc_offset_minutes: 0,
            db_max_connections: 1,
            run_migrations: false,
            log_dir: "logs".into(),
        }
    }

    async fn whoami(user: AuthUser) -> HttpResponse {
        HttpResponse::Ok().json(json!({"admin_id": user.admin_id, "role": user.role.to_string()}))
    }

    macro_rules! protected_app {
        ($config:expr) => {
            test::init_service(
                App::new().app_data(Data::new($config)).service(
                    web::scope("/p")
                        .wrap(from_fn(auth_middleware))
                        .route("/whoami", web::get().to(whoami)),
                ),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn missing_token_is_401() {
        let app = protected_app!(test_config());
        let req = test::TestRequest::get().uri("/p/whoami").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn bearer_token_is_accepted() {
        let config = test_config();
        let (token, _) =
            generate_token(&TokenSubject::admin(4, "owner@acme.test"), &config.jwt_secret, 600).unwrap();
        let app = protected_app!(config);

        let req = test::TestRequest::get()
            .uri("/p/whoami")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["admin_id"], 4);
        assert_eq!(body["role"], "admin");
    }

    #[actix_web::test]
    async fn cookie_token_is_accepted() {
        let config = test_config();
        let (token, _) =
            generate_token(&TokenSubject::employee(9, 4, "john@acme.test"), &config.jwt_secret, 600)
                .unwrap();
        let app = protected_app!(config);

        let req = test::TestRequest::get()
            .uri("/p/whoami")
            .cookie(Cookie::new(AUTH_COOKIE, token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn token_signed_with_other_secret_is_401() {
        let (token, _) =
            generate_token(&TokenSubject::admin(4, "owner@acme.test"), "some-other-secret-value", 600)
                .unwrap();
        let app = protected_app!(test_config());

        let req = test::TestRequest::get()
            .uri("/p/whoami")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn revoked_token_is_401() {
        let config = test_config();
        let (token, claims) =
            generate_token(&TokenSubject::admin(4, "owner@acme.test"), &config.jwt_secret, 600).unwrap();
        revocation_cache::remember(&claims.jti, claims.exp as i64).await;
        let app = protected_app!(config);

        let req = test::TestRequest::get()
            .uri("/p/whoami")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn guard_lets_admins_through_without_database() {
        let config = test_config();
        let (token, _) =
            generate_token(&TokenSubject::admin(4, "owner@acme.test"), &config.jwt_secret, 600).unwrap();
        let app = test::init_service(
            App::new().app_data(Data::new(config)).service(
                web::scope("/p")
                    .wrap(from_fn(employee_guard))
                    .wrap(from_fn(auth_middleware))
                    .route("/whoami", web::get().to(whoami)),
            ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/p/whoami")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
