pub mod auth;
pub mod health;
pub mod scoreboard;
pub mod swagger;
pub mod users;

use actix_web::{error, web, HttpRequest};

use crate::middleware::auth::AuthMiddleware;
use crate::utils::AppError;

fn json_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    log::warn!("❌ {} {} rejected body: {}", req.method(), req.path(), err);
    AppError::ValidationFailed(format!("Invalid request body: {}", err)).into()
}

fn query_error(err: error::QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    log::warn!("❌ {} {} rejected query: {}", req.method(), req.path(), err);
    AppError::ValidationFailed(format!("Invalid query string: {}", err)).into()
}

/// Registers every route; shared by the server and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error));

    cfg
        // Health check
        .route("/health", web::get().to(health::health_check))
        // Auth endpoints
        .service(
            web::scope("/api/v1/auth")
                .route("/login", web::post().to(auth::login))
                .route("/register", web::post().to(auth::register))
                .route("/refresh", web::post().to(auth::refresh_token))
                .service(
                    web::resource("/me")
                        .wrap(AuthMiddleware)
                        .route(web::get().to(auth::get_me)),
                ),
        )
        // Directory and reviews - Requires JWT
        .service(
            web::scope("/api/v1/users")
                .wrap(AuthMiddleware)
                .route("", web::get().to(users::list_users))
                .route("/{user_id}", web::get().to(users::get_user))
                .route("/{user_id}/reviews", web::get().to(users::get_reviews))
                .route("/{user_id}/reviews", web::put().to(users::submit_review))
                .route("/{user_id}/reviews/mine", web::get().to(users::get_my_review))
                .route("/{user_id}/stats", web::get().to(users::get_stats))
                .route("/{user_id}/stats/refresh", web::post().to(users::refresh_stats)),
        )
        // Scoreboard is public
        .route("/api/v1/scoreboard", web::get().to(scoreboard::get_scoreboard));
}
