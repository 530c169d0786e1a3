//! Persistence port for user documents and their embedded reviews.
//!
//! Handlers and services only see `dyn UserStore`; `MongoDB` implements it
//! for production and `MemoryStore` backs the tests.

use async_trait::async_trait;

use crate::models::{LegacyReview, Review, ReviewAggregates, UserRecord};
use crate::utils::AppError;

mod mongo;

#[cfg(test)]
pub mod memory;

pub const USERS_COLLECTION: &str = "users";
pub const LEGACY_REVIEWS_COLLECTION: &str = "reviews";

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn ping(&self) -> bool;

    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError>;

    /// Fails with `Conflict` when the user id or email is already taken.
    async fn insert_user(&self, user: &UserRecord) -> Result<(), AppError>;

    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError>;

    /// Users by `avg_rating` desc, then `total_reviews` desc.
    async fn top_rated(&self, limit: Option<i64>) -> Result<Vec<UserRecord>, AppError>;

    /// Replaces the review list and aggregates only if the stored
    /// `review_version` still equals `expected_version`, bumping it by one.
    /// Returns `false` when another writer got there first.
    async fn write_reviews(
        &self,
        user_id: &str,
        expected_version: i64,
        reviews: &[Review],
        aggregates: ReviewAggregates,
        now: i64,
    ) -> Result<bool, AppError>;

    /// Overwrites the denormalized aggregate fields if `review_version` still
    /// equals `expected_version`. Returns `false` when the user is gone or
    /// its review list changed since it was read.
    async fn set_aggregates(
        &self,
        user_id: &str,
        expected_version: i64,
        aggregates: ReviewAggregates,
    ) -> Result<bool, AppError>;

    /// Sets `review_version` to zero where it is absent.
    /// Returns the number of documents touched.
    async fn backfill_missing_fields(&self) -> Result<u64, AppError>;

    /// Users stored without `avg_rating` or `total_reviews`.
    async fn users_missing_aggregates(&self) -> Result<Vec<UserRecord>, AppError>;

    async fn legacy_reviews_for(&self, target_id: &str) -> Result<Vec<LegacyReview>, AppError>;

    async fn all_legacy_reviews(&self) -> Result<Vec<LegacyReview>, AppError>;
}
