use serde::Deserialize;

use crate::{
    models::{DirectoryEntry, ProfileWithReviews, ScoreboardEntry, UserProfile, UserRecord},
    services::{
        review_service::{can_review, ReviewParty},
        stats_service::recompute_aggregates,
    },
    store::UserStore,
    utils::AppError,
};

pub const MAX_SCOREBOARD_LIMIT: i64 = 100;

/// Query string of the directory listing
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct DirectoryQuery {
    /// Case-insensitive match on "first last" or email
    pub search: Option<String>,
    /// Comma-separated gender tags, e.g. `male,female` or `all`
    pub gender: Option<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ScoreboardQuery {
    pub limit: Option<i64>,
}

fn gender_tags(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn matches_search(user: &UserRecord, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    let full_name = format!("{} {}", user.first_name, user.last_name).to_lowercase();
    full_name.contains(&term) || user.email.to_lowercase().contains(&term)
}

fn matches_gender(user: &UserRecord, tags: &[String]) -> bool {
    if tags.is_empty() || tags.iter().any(|t| t == "all") {
        return true;
    }
    let gender = user.gender.trim().to_lowercase();
    tags.iter().any(|t| *t == gender)
}

/// Users matching the query, each flagged with whether the viewer may review them
pub async fn list_directory(
    store: &dyn UserStore,
    viewer_id: &str,
    query: &DirectoryQuery,
) -> Result<Vec<DirectoryEntry>, AppError> {
    let users = store.list_users().await?;
    let viewer = users.iter().find(|u| u.user_id == viewer_id);
    if viewer.is_none() {
        log::warn!("⚠️  Viewer {} has no profile, review actions disabled", viewer_id);
    }

    let tags = gender_tags(query.gender.as_deref());
    let search = query.search.as_deref().unwrap_or_default();

    let entries = users
        .iter()
        .filter(|u| matches_search(u, search))
        .filter(|u| matches_gender(u, &tags))
        .map(|u| DirectoryEntry {
            profile: UserProfile::from(u),
            is_self: u.user_id == viewer_id,
            can_review: viewer
                .map(|v| can_review(ReviewParty::from(v), ReviewParty::from(u)))
                .unwrap_or(false),
        })
        .collect();

    Ok(entries)
}

/// Public profile with its reviews; aggregates come from the embedded list
pub async fn user_profile(
    store: &dyn UserStore,
    user_id: &str,
) -> Result<ProfileWithReviews, AppError> {
    let user = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

    Ok(ProfileWithReviews {
        user: UserProfile::from(&user),
        aggregates: recompute_aggregates(&user.reviews),
        reviews: user.reviews,
    })
}

/// Top-rated users; `limit` is clamped to 1..=100
pub async fn scoreboard(
    store: &dyn UserStore,
    limit: Option<i64>,
) -> Result<Vec<ScoreboardEntry>, AppError> {
    let limit = limit.map(|l| l.clamp(1, MAX_SCOREBOARD_LIMIT));
    let users = store.top_rated(limit).await?;

    Ok(users
        .iter()
        .enumerate()
        .map(|(idx, u)| ScoreboardEntry {
            rank: idx + 1,
            id: u.user_id.clone(),
            name: u.display_name(),
            avg_rating: u.avg_rating,
            total_reviews: u.total_reviews,
        })
        .collect())
}
