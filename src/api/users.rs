use actix_web::{web, HttpResponse, ResponseError};
use chrono::Utc;

use crate::middleware::auth::Claims;
use crate::models::{
    DirectoryEntry, ProfileWithReviews, Review, ReviewAggregates, ReviewDraft,
    SubmitReviewResponse,
};
use crate::services::{
    directory_service::{self, DirectoryQuery},
    review_service,
    stats_service::{self, StatsReport},
};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    params(DirectoryQuery),
    responses(
        (status = 200, description = "Users matching the filters", body = Vec<DirectoryEntry>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_users(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    query: web::Query<DirectoryQuery>,
) -> HttpResponse {
    log::info!(
        "👥 GET /users - viewer: {}, search: {:?}, gender: {:?}",
        claims.sub,
        query.search,
        query.gender
    );

    match directory_service::list_directory(state.store(), &claims.sub, &query).await {
        Ok(users) => {
            log::info!("✅ Directory returned {} users", users.len());
            HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "count": users.len(),
                "users": users
            }))
        }
        Err(e) => {
            log::error!("❌ Failed to list users: {}", e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "Users",
    params(("user_id" = String, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Profile with its reviews", body = ProfileWithReviews),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_user(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("👤 GET /users/{}", user_id);

    match directory_service::user_profile(state.store(), &user_id).await {
        Ok(profile) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "user": profile.user,
            "reviews": profile.reviews,
            "aggregates": profile.aggregates
        })),
        Err(e) => {
            log::warn!("❌ Failed to load user {}: {}", user_id, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/reviews",
    tag = "Reviews",
    params(("user_id" = String, Path, description = "Reviewed user")),
    responses(
        (status = 200, description = "Reviews received by the user", body = Vec<Review>),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_reviews(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("📝 GET /users/{}/reviews", user_id);

    match review_service::reviews_for(state.store(), &user_id).await {
        Ok(reviews) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "count": reviews.len(),
            "reviews": reviews
        })),
        Err(e) => {
            log::warn!("❌ Failed to load reviews for {}: {}", user_id, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/reviews/mine",
    tag = "Reviews",
    params(("user_id" = String, Path, description = "Reviewed user")),
    responses(
        (status = 200, description = "The caller's review, or null", body = Review),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_my_review(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("📝 GET /users/{}/reviews/mine - reviewer: {}", user_id, claims.sub);

    match review_service::my_review(state.store(), &claims.sub, &user_id).await {
        Ok(review) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "review": review
        })),
        Err(e) => {
            log::warn!("❌ Failed to load review on {}: {}", user_id, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}/reviews",
    tag = "Reviews",
    params(("user_id" = String, Path, description = "User being reviewed")),
    request_body = ReviewDraft,
    responses(
        (status = 200, description = "Review created or replaced", body = SubmitReviewResponse),
        (status = 400, description = "Invalid rating/text or reviewer not eligible"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found"),
        (status = 503, description = "Store unavailable, safe to retry")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn submit_review(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    draft: web::Json<ReviewDraft>,
) -> HttpResponse {
    let target_id = path.into_inner();
    log::info!(
        "⭐ PUT /users/{}/reviews - reviewer: {}, rating: {}",
        target_id,
        claims.sub,
        draft.rating
    );

    let now = Utc::now().timestamp();

    match review_service::submit_review(state.store(), &claims.sub, &target_id, &draft, now).await
    {
        Ok(submitted) => HttpResponse::Ok().json(SubmitReviewResponse {
            success: true,
            updated: submitted.was_update,
            review: submitted.review,
            aggregates: submitted.aggregates,
        }),
        Err(e) => {
            log::warn!("❌ Review on {} by {} failed: {}", target_id, claims.sub, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/stats",
    tag = "Reviews",
    params(("user_id" = String, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Aggregates from every source", body = StatsReport),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_stats(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("📊 GET /users/{}/stats", user_id);

    match stats_service::stats_report(state.store(), &user_id).await {
        Ok(report) => {
            if !report.stored_in_sync || !report.legacy_in_sync {
                log::warn!(
                    "⚠️  Aggregate drift for {}: stored_in_sync={}, legacy_in_sync={}",
                    user_id,
                    report.stored_in_sync,
                    report.legacy_in_sync
                );
            }
            HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "stats": report
            }))
        }
        Err(e) => {
            log::warn!("❌ Failed to build stats for {}: {}", user_id, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/stats/refresh",
    tag = "Reviews",
    params(("user_id" = String, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Stored aggregates rewritten", body = ReviewAggregates),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn refresh_stats(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("🔄 POST /users/{}/stats/refresh", user_id);

    match stats_service::refresh_user_stats(state.store(), &user_id).await {
        Ok(aggregates) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "aggregates": aggregates
        })),
        Err(e) => {
            log::warn!("❌ Failed to refresh stats for {}: {}", user_id, e);
            e.error_response()
        }
    }
}
