use serde::{Deserialize, Serialize};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;
pub const MIN_REVIEW_CHARS: usize = 10;
pub const MAX_REVIEW_CHARS: usize = 500;

/// Review embedded in the target user's document (`users.reviews`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Review {
    pub reviewer_id: String,
    /// Name of the reviewer when the review was written; not kept in sync.
    pub reviewer_name: String,
    pub rating: i32,
    pub text: String,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub updated_at: Option<i64>,
}

/// Derived fields stored next to the review list for directory sorting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ReviewAggregates {
    pub avg_rating: f64,
    pub total_reviews: i64,
}

impl ReviewAggregates {
    pub const EMPTY: ReviewAggregates = ReviewAggregates {
        avg_rating: 0.0,
        total_reviews: 0,
    };
}

/// Review form payload, before validation.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct ReviewDraft {
    pub rating: i32,
    pub text: String,
}

impl ReviewDraft {
    /// Checks rating range and trimmed text length. Returns the trimmed text.
    pub fn validate(&self) -> Result<&str, String> {
        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            return Err(format!(
                "Rating must be between {} and {}",
                MIN_RATING, MAX_RATING
            ));
        }

        let text = self.text.trim();
        if text.is_empty() {
            return Err("Please write your review".to_string());
        }

        let chars = text.chars().count();
        if chars < MIN_REVIEW_CHARS {
            return Err(format!(
                "Review should be at least {} characters long",
                MIN_REVIEW_CHARS
            ));
        }
        if chars > MAX_REVIEW_CHARS {
            return Err(format!(
                "Review should be at most {} characters long",
                MAX_REVIEW_CHARS
            ));
        }

        Ok(text)
    }
}

/// Document of the old standalone `reviews` collection. Read-only: the
/// embedded list is the only writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyReview {
    pub from_user_id: String,
    pub to_user_id: String,
    pub rating: i32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reviewer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created_at: Option<i64>,
}

/// Response for a review submission
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SubmitReviewResponse {
    pub success: bool,
    pub updated: bool,
    pub review: Review,
    pub aggregates: ReviewAggregates,
}
