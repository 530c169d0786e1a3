use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use super::UserStore;
use crate::models::{LegacyReview, Review, ReviewAggregates, UserRecord};
use crate::services::stats_service::recompute_aggregates;
use crate::utils::AppError;

/// In-process store for tests. `fail_writes` simulates an unreachable
/// database on every mutating call.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, UserRecord>>,
    legacy: RwLock<Vec<LegacyReview>>,
    fail_writes: AtomicBool,
    missing_aggregates: RwLock<HashSet<String>>,
    pending_review: Mutex<Option<(String, Review)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<UserRecord>) -> Self {
        let store = Self::new();
        {
            let mut map = store.users.write().unwrap();
            for user in users {
                map.insert(user.user_id.clone(), user);
            }
        }
        store
    }

    pub fn add_legacy_review(&self, review: LegacyReview) {
        self.legacy.write().unwrap().push(review);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self, user_id: &str) -> Option<UserRecord> {
        self.users.read().unwrap().get(user_id).cloned()
    }

    /// Bumps the stored version as if another writer had committed.
    pub fn bump_version(&self, user_id: &str) {
        if let Some(user) = self.users.write().unwrap().get_mut(user_id) {
            user.review_version += 1;
        }
    }

    /// Treats the user as stored without aggregate fields.
    pub fn mark_missing_aggregates(&self, user_id: &str) {
        self.missing_aggregates
            .write()
            .unwrap()
            .insert(user_id.to_string());
    }

    /// Commits `review` on `user_id` as another writer would, right before
    /// the next `set_aggregates` call applies.
    pub fn land_review_before_next_aggregates(&self, user_id: &str, review: Review) {
        *self.pending_review.lock().unwrap() = Some((user_id.to_string(), review));
    }

    fn apply_pending_review(&self) {
        let Some((user_id, review)) = self.pending_review.lock().unwrap().take() else {
            return;
        };
        if let Some(user) = self.users.write().unwrap().get_mut(&user_id) {
            user.reviews.push(review);
            let aggregates = recompute_aggregates(&user.reviews);
            user.avg_rating = aggregates.avg_rating;
            user.total_reviews = aggregates.total_reviews;
            user.review_version += 1;
        }
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::StoreFailure("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn ping(&self) -> bool {
        !self.fail_writes.load(Ordering::SeqCst)
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self.users.read().unwrap().get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<(), AppError> {
        self.check_writable()?;
        let mut users = self.users.write().unwrap();
        if users.contains_key(&user.user_id) || users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError> {
        let mut users: Vec<UserRecord> = self.users.read().unwrap().values().cloned().collect();
        users.sort_by(|a, b| {
            (&a.first_name, &a.last_name).cmp(&(&b.first_name, &b.last_name))
        });
        Ok(users)
    }

    async fn top_rated(&self, limit: Option<i64>) -> Result<Vec<UserRecord>, AppError> {
        let mut users: Vec<UserRecord> = self.users.read().unwrap().values().cloned().collect();
        users.sort_by(|a, b| {
            b.avg_rating
                .total_cmp(&a.avg_rating)
                .then(b.total_reviews.cmp(&a.total_reviews))
        });
        if let Some(limit) = limit {
            users.truncate(limit.max(0) as usize);
        }
        Ok(users)
    }

    async fn write_reviews(
        &self,
        user_id: &str,
        expected_version: i64,
        reviews: &[Review],
        aggregates: ReviewAggregates,
        now: i64,
    ) -> Result<bool, AppError> {
        self.check_writable()?;
        let mut users = self.users.write().unwrap();
        match users.get_mut(user_id) {
            Some(user) if user.review_version == expected_version => {
                user.reviews = reviews.to_vec();
                user.avg_rating = aggregates.avg_rating;
                user.total_reviews = aggregates.total_reviews;
                user.last_review_update = Some(now);
                user.updated_at = now;
                user.review_version += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_aggregates(
        &self,
        user_id: &str,
        expected_version: i64,
        aggregates: ReviewAggregates,
    ) -> Result<bool, AppError> {
        self.check_writable()?;
        self.apply_pending_review();
        let mut users = self.users.write().unwrap();
        match users.get_mut(user_id) {
            Some(user) if user.review_version == expected_version => {
                user.avg_rating = aggregates.avg_rating;
                user.total_reviews = aggregates.total_reviews;
                self.missing_aggregates.write().unwrap().remove(user_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn backfill_missing_fields(&self) -> Result<u64, AppError> {
        // Typed records always carry `review_version`.
        self.check_writable()?;
        Ok(0)
    }

    async fn users_missing_aggregates(&self) -> Result<Vec<UserRecord>, AppError> {
        let missing = self.missing_aggregates.read().unwrap();
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .filter(|u| missing.contains(&u.user_id))
            .cloned()
            .collect())
    }

    async fn legacy_reviews_for(&self, target_id: &str) -> Result<Vec<LegacyReview>, AppError> {
        Ok(self
            .legacy
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.to_user_id == target_id)
            .cloned()
            .collect())
    }

    async fn all_legacy_reviews(&self) -> Result<Vec<LegacyReview>, AppError> {
        Ok(self.legacy.read().unwrap().clone())
    }
}
