use actix_web::{web, HttpResponse, ResponseError};

use crate::models::ScoreboardEntry;
use crate::services::directory_service::{self, ScoreboardQuery};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/scoreboard",
    tag = "Scoreboard",
    params(ScoreboardQuery),
    responses(
        (status = 200, description = "Users ranked by average rating", body = Vec<ScoreboardEntry>),
        (status = 503, description = "Store unavailable")
    )
)]
pub async fn get_scoreboard(
    state: web::Data<AppState>,
    query: web::Query<ScoreboardQuery>,
) -> HttpResponse {
    log::info!("🏆 GET /scoreboard - limit: {:?}", query.limit);

    match directory_service::scoreboard(state.store(), query.limit).await {
        Ok(entries) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "count": entries.len(),
            "scoreboard": entries
        })),
        Err(e) => {
            log::error!("❌ Failed to build scoreboard: {}", e);
            e.error_response()
        }
    }
}
