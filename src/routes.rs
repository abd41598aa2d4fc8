use crate::{
    api::{admin, attendance, employee, leave, payroll, task},
    auth::{
        handlers,
        middleware::{auth_middleware, employee_guard},
    },
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{HttpRequest, HttpResponse, error, middleware::from_fn, web};
use serde_json::json;
use std::sync::Arc;

/// Extractor failures (bad JSON, query or path) answer 400 with the usual `{"message"}` body.
fn bad_input(err: impl std::fmt::Display) -> error::Error {
    let message = err.to_string();
    error::InternalError::from_response(
        message.clone(),
        HttpResponse::BadRequest().json(json!({ "message": message })),
    )
    .into()
}

pub fn extractor_configs(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _: &HttpRequest| bad_input(err)))
        .app_data(web::QueryConfig::default().error_handler(|err, _: &HttpRequest| bad_input(err)))
        .app_data(web::PathConfig::default().error_handler(|err, _: &HttpRequest| bad_input(err)));
}

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        // only fails on a zero period or burst, both clamped above
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let signup_limiter = Arc::new(build_limiter(config.rate_signup_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    extractor_configs(cfg);

    cfg.service(
        web::scope(&config.api_prefix)
            // Public routes
            .service(
                web::resource("/admin/signup")
                    .wrap(signup_limiter.clone())
                    .route(web::post().to(handlers::admin_signup)),
            )
            .service(
                web::resource("/admin/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::admin_login)),
            )
            .service(
                web::resource("/admin/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            )
            .service(
                web::resource("/employees/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::employee_login)),
            )
            .service(
                web::resource("/employees/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            )
            // Protected routes
            .service(
                web::scope("")
                    .wrap(from_fn(employee_guard)) // active + device lock
                    .wrap(from_fn(auth_middleware)) // authentication
                    .wrap(protected_limiter) // rate limiting
                    .service(
                        web::scope("/admin")
                            .service(web::resource("/me").route(web::get().to(admin::me)))
                            .service(
                                web::resource("/settings")
                                    .route(web::put().to(admin::update_settings)),
                            ),
                    )
                    .service(
                        web::scope("/employees")
                            // /employees
                            .service(
                                web::resource("")
                                    .route(web::post().to(employee::create_employee))
                                    .route(web::get().to(employee::list_employees)),
                            )
                            // /employees/me (before /{id})
                            .service(web::resource("/me").route(web::get().to(employee::me)))
                            // /employees/{id}
                            .service(
                                web::resource("/{id}")
                                    .route(web::get().to(employee::get_employee))
                                    .route(web::put().to(employee::update_employee)),
                            )
                            .service(
                                web::resource("/{id}/reset-device")
                                    .route(web::put().to(employee::reset_device)),
                            ),
                    )
                    .service(
                        web::scope("/attendence")
                            .service(
                                web::resource("")
                                    .route(web::get().to(attendance::list_attendance)),
                            )
                            .service(
                                web::resource("/punch-in")
                                    .route(web::post().to(attendance::punch_in)),
                            )
                            .service(
                                web::resource("/punch-out")
                                    .route(web::post().to(attendance::punch_out)),
                            )
                            .service(
                                web::resource("/status").route(web::get().to(attendance::status)),
                            )
                            .service(
                                web::resource("/verify").route(web::post().to(attendance::verify)),
                            ),
                    )
                    .service(
                        web::scope("/leave")
                            // /leave
                            .service(web::resource("").route(web::get().to(leave::leave_list)))
                            .service(
                                web::resource("/apply").route(web::post().to(leave::apply_leave)),
                            )
                            // /leave/{id}/approve
                            .service(
                                web::resource("/{id}/approve")
                                    .route(web::put().to(leave::approve_leave)),
                            )
                            // /leave/{id}/reject
                            .service(
                                web::resource("/{id}/reject")
                                    .route(web::put().to(leave::reject_leave)),
                            )
                            // /leave/{id}/cancel
                            .service(
                                web::resource("/{id}/cancel")
                                    .route(web::put().to(leave::cancel_leave)),
                            ),
                    )
                    .service(
                        web::scope("/payrole")
                            .service(
                                web::resource("").route(web::get().to(payroll::list_payrolls)),
                            )
                            .service(
                                web::resource("/generate")
                                    .route(web::post().to(payroll::generate_payroll)),
                            )
                            .service(
                                web::resource("/status")
                                    .route(web::get().to(payroll::payroll_status)),
                            )
                            .service(
                                web::resource("/{id}/approve")
                                    .route(web::put().to(payroll::approve_payroll)),
                            )
                            .service(
                                web::resource("/{id}/paid").route(web::put().to(payroll::mark_paid)),
                            ),
                    )
                    .service(
                        web::scope("/task")
                            .service(
                                web::resource("")
                                    .route(web::post().to(task::create_task))
                                    .route(web::get().to(task::list_tasks)),
                            )
                            // /task/dashboard (before /{id})
                            .service(
                                web::resource("/dashboard").route(web::get().to(task::dashboard)),
                            )
                            .service(
                                web::resource("/{id}")
                                    .route(web::get().to(task::get_task))
                                    .route(web::put().to(task::update_task))
                                    .route(web::delete().to(task::delete_task)),
                            )
                            .service(
                                web::resource("/{id}/assign")
                                    .route(web::put().to(task::assign_task)),
                            )
                            .service(
                                web::resource("/{id}/status")
                                    .route(web::put().to(task::update_task_status)),
                            )
                            .service(
                                web::resource("/{id}/comment")
                                    .route(web::post().to(task::add_comment)),
                            ),
                    ),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        #[allow(dead_code)]
        month: u32,
    }

    async fn probe(_: web::Query<Probe>, _: web::Path<u64>) -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[actix_web::test]
    async fn extractor_errors_render_as_json_400() {
        let app = test::init_service(
            App::new()
                .configure(extractor_configs)
                .route("/probe/{id}", web::get().to(probe)),
        )
        .await;

        let req = test::TestRequest::get().uri("/probe/abc?month=3").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["message"].is_string());

        let req = test::TestRequest::get().uri("/probe/1?month=march").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn protected_routes_require_a_token() {
        let config = Config {
            database_url: String::new(),
            jwt_secret: "routes-test-secret".into(),
            server_addr: String::new(),
            token_ttl: 600,
            cookie_secure: false,
            rate_login_per_min: 60,
            rate_signup_per_min: 60,
            rate_protected_per_min: 600,
            api_prefix: "/api".into(),
            utc_offset_minutes: 0,
            db_max_connections: 1,
            run_migrations: false,
            log_dir: "logs".into(),
        };
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config.clone()))
                .configure(|cfg| configure(cfg, config.clone())),
        )
        .await;

        for (method, uri) in [
            ("GET", "/api/employees/me"),
            ("GET", "/api/task/dashboard"),
            ("POST", "/api/attendence/punch-in"),
            ("GET", "/api/payrole/status?month=3&year=2026"),
        ] {
            let req = test::TestRequest::default()
                .method(method.parse().unwrap())
                .uri(uri)
                .peer_addr("127.0.0.1:9000".parse().unwrap())
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }
}
