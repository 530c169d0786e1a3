use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Roommate Review Service API",
        version = "1.0.0",
        description = "Roommate directory and peer reviews.\n\n**Authentication:** every endpoint except health, auth and the scoreboard requires a JWT Bearer access token.\n\n**Reviews:** one review per reviewer per user; submitting again replaces it. Average rating and count are recomputed on every write."
    ),
    paths(
        // Auth
        crate::api::auth::login,
        crate::api::auth::register,
        crate::api::auth::refresh_token,
        crate::api::auth::get_me,

        // Health
        crate::api::health::health_check,

        // Users
        crate::api::users::list_users,
        crate::api::users::get_user,

        // Reviews
        crate::api::users::get_reviews,
        crate::api::users::get_my_review,
        crate::api::users::submit_review,
        crate::api::users::get_stats,
        crate::api::users::refresh_stats,

        // Scoreboard
        crate::api::scoreboard::get_scoreboard,
    ),
    components(
        schemas(
            crate::services::auth_service::LoginRequest,
            crate::services::auth_service::RegisterRequest,
            crate::services::auth_service::RefreshTokenRequest,
            crate::services::auth_service::AuthResponse,
            crate::api::health::HealthResponse,
            crate::models::Address,
            crate::models::UserProfile,
            crate::models::DirectoryEntry,
            crate::models::ProfileWithReviews,
            crate::models::ScoreboardEntry,
            crate::models::Review,
            crate::models::ReviewAggregates,
            crate::models::ReviewDraft,
            crate::models::SubmitReviewResponse,
            crate::services::stats_service::StatsReport,
        )
    ),
    tags(
        (name = "Auth", description = "Email/password registration, login and token refresh."),
        (name = "Health", description = "Liveness and database connectivity."),
        (name = "Users", description = "Roommate directory and profiles."),
        (name = "Reviews", description = "Submitting and reading reviews, and keeping rating aggregates consistent."),
        (name = "Scoreboard", description = "Public ranking by average rating."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token from /api/v1/auth/login"))
                        .build(),
                ),
            );
        }
    }
}
