use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{self, doc, Document};
use mongodb::error::{ErrorKind, WriteFailure};

use super::{UserStore, LEGACY_REVIEWS_COLLECTION, USERS_COLLECTION};
use crate::database::MongoDB;
use crate::models::{LegacyReview, Review, ReviewAggregates, UserRecord};
use crate::utils::AppError;

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY
    )
}

/// Filter matching the given version; documents written before the field
/// existed count as version 0.
fn version_filter(user_id: &str, expected_version: i64) -> Document {
    if expected_version == 0 {
        doc! {
            "user_id": user_id,
            "$or": [
                { "review_version": 0_i64 },
                { "review_version": { "$exists": false } }
            ]
        }
    } else {
        doc! { "user_id": user_id, "review_version": expected_version }
    }
}

#[async_trait]
impl UserStore for MongoDB {
    async fn ping(&self) -> bool {
        self.ping_server().await
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, AppError> {
        let user = self
            .collection::<UserRecord>(USERS_COLLECTION)
            .find_one(doc! { "user_id": user_id })
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        let user = self
            .collection::<UserRecord>(USERS_COLLECTION)
            .find_one(doc! { "email": email })
            .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<(), AppError> {
        match self
            .collection::<UserRecord>(USERS_COLLECTION)
            .insert_one(user)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(AppError::Conflict("User already exists".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError> {
        let cursor = self
            .collection::<UserRecord>(USERS_COLLECTION)
            .find(doc! {})
            .sort(doc! { "first_name": 1, "last_name": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn top_rated(&self, limit: Option<i64>) -> Result<Vec<UserRecord>, AppError> {
        let users = self.collection::<UserRecord>(USERS_COLLECTION);
        let mut find = users
            .find(doc! {})
            .sort(doc! { "avg_rating": -1, "total_reviews": -1 });
        if let Some(limit) = limit {
            find = find.limit(limit);
        }
        let cursor = find.await?;
        Ok(cursor.try_collect().await?)
    }

    async fn write_reviews(
        &self,
        user_id: &str,
        expected_version: i64,
        reviews: &[Review],
        aggregates: ReviewAggregates,
        now: i64,
    ) -> Result<bool, AppError> {
        let reviews = bson::to_bson(reviews)
            .map_err(|e| AppError::Internal(format!("Failed to encode reviews: {}", e)))?;

        let update = doc! {
            "$set": {
                "reviews": reviews,
                "avg_rating": aggregates.avg_rating,
                "total_reviews": aggregates.total_reviews,
                "last_review_update": now,
                "updated_at": now,
            },
            "$inc": { "review_version": 1_i64 }
        };

        let result = self
            .collection::<Document>(USERS_COLLECTION)
            .update_one(version_filter(user_id, expected_version), update)
            .await?;

        Ok(result.matched_count == 1)
    }

    async fn set_aggregates(
        &self,
        user_id: &str,
        expected_version: i64,
        aggregates: ReviewAggregates,
    ) -> Result<bool, AppError> {
        let result = self
            .collection::<Document>(USERS_COLLECTION)
            .update_one(
                version_filter(user_id, expected_version),
                doc! { "$set": {
                    "avg_rating": aggregates.avg_rating,
                    "total_reviews": aggregates.total_reviews,
                } },
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn backfill_missing_fields(&self) -> Result<u64, AppError> {
        let result = self
            .collection::<Document>(USERS_COLLECTION)
            .update_many(
                doc! { "review_version": { "$exists": false } },
                doc! { "$set": { "review_version": 0_i64 } },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn users_missing_aggregates(&self) -> Result<Vec<UserRecord>, AppError> {
        let cursor = self
            .collection::<UserRecord>(USERS_COLLECTION)
            .find(doc! {
                "$or": [
                    { "avg_rating": { "$exists": false } },
                    { "total_reviews": { "$exists": false } }
                ]
            })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn legacy_reviews_for(&self, target_id: &str) -> Result<Vec<LegacyReview>, AppError> {
        let cursor = self
            .collection::<LegacyReview>(LEGACY_REVIEWS_COLLECTION)
            .find(doc! { "to_user_id": target_id })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn all_legacy_reviews(&self) -> Result<Vec<LegacyReview>, AppError> {
        let cursor = self
            .collection::<LegacyReview>(LEGACY_REVIEWS_COLLECTION)
            .find(doc! {})
            .sort(doc! { "created_at": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }
}
