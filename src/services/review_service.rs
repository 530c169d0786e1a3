// ==================== REVIEWS ====================
// Eligibility, upsert into the embedded list, and the guarded write that
// persists it together with fresh aggregates.

use crate::{
    models::{Review, ReviewAggregates, ReviewDraft, UserRecord},
    services::stats_service::recompute_aggregates,
    store::UserStore,
    utils::AppError,
};

/// Attempts before a contended review write gives up with a retryable error.
pub const MAX_WRITE_ATTEMPTS: usize = 5;

const ANONYMOUS_REVIEWER: &str = "Anonymous User";

/// Identity and recorded gender of one side of a review.
#[derive(Debug, Clone, Copy)]
pub struct ReviewParty<'a> {
    pub id: &'a str,
    pub gender: &'a str,
}

impl<'a> From<&'a UserRecord> for ReviewParty<'a> {
    fn from(user: &'a UserRecord) -> Self {
        ReviewParty {
            id: &user.user_id,
            gender: &user.gender,
        }
    }
}

fn recognized_gender(raw: &str) -> Option<&'static str> {
    match raw.trim().to_lowercase().as_str() {
        "male" => Some("male"),
        "female" => Some("female"),
        _ => None,
    }
}

/// A viewer may review a target who is someone else and whose recognized
/// gender differs from the viewer's. Unrecognized genders never qualify.
pub fn can_review(viewer: ReviewParty<'_>, target: ReviewParty<'_>) -> bool {
    if viewer.id == target.id {
        return false;
    }
    match (recognized_gender(viewer.gender), recognized_gender(target.gender)) {
        (Some(v), Some(t)) => v != t,
        _ => false,
    }
}

/// Inserts or replaces the reviewer's entry. A replaced entry keeps its
/// position; a new one goes to the end. Returns the new list and whether an
/// existing entry was replaced.
///
/// Callers validate rating and text beforehand (`ReviewDraft::validate`).
pub fn upsert_review(
    existing: &[Review],
    reviewer_id: &str,
    reviewer_name: &str,
    rating: i32,
    text: &str,
    now: i64,
) -> (Vec<Review>, bool) {
    let mut reviews = existing.to_vec();

    if let Some(idx) = reviews.iter().position(|r| r.reviewer_id == reviewer_id) {
        let entry = &mut reviews[idx];
        entry.reviewer_name = reviewer_name.to_string();
        entry.rating = rating;
        entry.text = text.to_string();
        entry.created_at = now;
        entry.updated_at = Some(now);
        return (reviews, true);
    }

    reviews.push(Review {
        reviewer_id: reviewer_id.to_string(),
        reviewer_name: reviewer_name.to_string(),
        rating,
        text: text.to_string(),
        created_at: now,
        updated_at: None,
    });
    (reviews, false)
}

/// Loads the target, lets `apply` derive the new review list, and writes it
/// back guarded by the target's `review_version`. A lost race reloads and
/// re-applies. An unchanged list is not written.
pub(crate) async fn commit_reviews<T, F>(
    store: &dyn UserStore,
    target_id: &str,
    now: i64,
    mut apply: F,
) -> Result<(T, ReviewAggregates), AppError>
where
    F: FnMut(&UserRecord) -> Result<(Vec<Review>, T), AppError>,
{
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let target = store
            .find_user(target_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", target_id)))?;

        let (reviews, outcome) = apply(&target)?;
        let aggregates = recompute_aggregates(&reviews);

        if reviews == target.reviews {
            return Ok((outcome, aggregates));
        }

        if store
            .write_reviews(target_id, target.review_version, &reviews, aggregates, now)
            .await?
        {
            return Ok((outcome, aggregates));
        }

        log::warn!(
            "⚠️  Concurrent review write on {} (attempt {}/{})",
            target_id,
            attempt,
            MAX_WRITE_ATTEMPTS
        );
    }

    Err(AppError::StoreFailure(
        "Too many concurrent updates, please try again".to_string(),
    ))
}

#[derive(Debug, Clone)]
pub struct SubmittedReview {
    pub review: Review,
    pub was_update: bool,
    pub aggregates: ReviewAggregates,
}

/// Validates, checks eligibility, and upserts the caller's review on the target
pub async fn submit_review(
    store: &dyn UserStore,
    reviewer_id: &str,
    target_id: &str,
    draft: &ReviewDraft,
    now: i64,
) -> Result<SubmittedReview, AppError> {
    if reviewer_id.is_empty() {
        return Err(AppError::NotAuthenticated("User not authenticated".to_string()));
    }

    let text = draft.validate().map_err(AppError::ValidationFailed)?;

    let reviewer = store.find_user(reviewer_id).await?.ok_or_else(|| {
        AppError::NotAuthenticated("No profile for the current user".to_string())
    })?;

    let reviewer_name = match reviewer.display_name() {
        name if name.is_empty() => ANONYMOUS_REVIEWER.to_string(),
        name => name,
    };

    let ((review, was_update), aggregates) = commit_reviews(store, target_id, now, |target| {
        if !can_review(ReviewParty::from(&reviewer), ReviewParty::from(target)) {
            return Err(AppError::ValidationFailed(
                "You are not allowed to review this user".to_string(),
            ));
        }

        let (reviews, was_update) = upsert_review(
            &target.reviews,
            reviewer_id,
            &reviewer_name,
            draft.rating,
            text,
            now,
        );

        let review = reviews
            .iter()
            .find(|r| r.reviewer_id == reviewer_id)
            .cloned()
            .ok_or_else(|| AppError::Internal("Upserted review missing".to_string()))?;

        Ok((reviews, (review, was_update)))
    })
    .await?;

    log::info!(
        "✅ Review {} by {} on {} (avg {:.2}, {} reviews)",
        if was_update { "updated" } else { "created" },
        reviewer_id,
        target_id,
        aggregates.avg_rating,
        aggregates.total_reviews
    );

    Ok(SubmittedReview {
        review,
        was_update,
        aggregates,
    })
}

/// Embedded reviews of a user, in stored order
pub async fn reviews_for(store: &dyn UserStore, target_id: &str) -> Result<Vec<Review>, AppError> {
    let target = store
        .find_user(target_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", target_id)))?;
    Ok(target.reviews)
}

/// The caller's existing review on a target, if any
pub async fn my_review(
    store: &dyn UserStore,
    reviewer_id: &str,
    target_id: &str,
) -> Result<Option<Review>, AppError> {
    let reviews = reviews_for(store, target_id).await?;
    Ok(reviews.into_iter().find(|r| r.reviewer_id == reviewer_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn party<'a>(id: &'a str, gender: &'a str) -> ReviewParty<'a> {
        ReviewParty { id, gender }
    }

    fn review(reviewer_id: &str, rating: i32) -> Review {
        Review {
            reviewer_id: reviewer_id.to_string(),
            reviewer_name: format!("Reviewer {}", reviewer_id),
            rating,
            text: "Clean and quiet roommate".to_string(),
            created_at: 100,
            updated_at: None,
        }
    }

    fn draft(rating: i32, text: &str) -> ReviewDraft {
        ReviewDraft {
            rating,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_cannot_review_self() {
        assert!(!can_review(party("a", "male"), party("a", "female")));
        assert!(!can_review(party("a", "female"), party("a", "male")));
    }

    #[test]
    fn test_same_or_unrecognized_genders_are_ineligible() {
        assert!(!can_review(party("a", "male"), party("b", "male")));
        assert!(!can_review(party("a", "female"), party("b", "female")));
        assert!(!can_review(party("a", "other"), party("b", "male")));
        assert!(!can_review(party("a", ""), party("b", "female")));
        assert!(!can_review(party("a", "male"), party("b", "nonbinary")));
    }

    #[test]
    fn test_gender_comparison_ignores_case_and_whitespace() {
        assert!(can_review(party("a", "Male"), party("b", " female ")));
        assert!(can_review(party("a", "FEMALE"), party("b", "male")));
    }

    #[test]
    fn test_upsert_appends_new_reviewer() {
        let existing = vec![review("x", 4)];
        let (reviews, was_update) = upsert_review(&existing, "a", "Ana", 5, "Great roommate!", 200);

        assert!(!was_update);
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[1].reviewer_id, "a");
        assert_eq!(reviews[1].created_at, 200);
        assert_eq!(reviews[1].updated_at, None);
    }

    #[test]
    fn test_upsert_twice_keeps_length_and_reports_update() {
        let (once, first) = upsert_review(&[], "a", "Ana", 5, "Great roommate!", 200);
        let (twice, second) = upsert_review(&once, "a", "Ana", 5, "Great roommate!", 300);

        assert!(!first);
        assert!(second);
        assert_eq!(once.len(), twice.len());
        assert_eq!(twice[0].updated_at, Some(300));
    }

    #[test]
    fn test_upsert_preserves_position_and_other_entries() {
        let existing = vec![review("x", 4), review("a", 2), review("y", 3)];
        let (reviews, was_update) =
            upsert_review(&existing, "a", "Ana Renamed", 5, "Much better now", 500);

        assert!(was_update);
        assert_eq!(
            reviews.iter().map(|r| r.reviewer_id.as_str()).collect::<Vec<_>>(),
            vec!["x", "a", "y"]
        );
        assert_eq!(reviews[0], existing[0]);
        assert_eq!(reviews[2], existing[2]);
        assert_eq!(reviews[1].rating, 5);
        assert_eq!(reviews[1].reviewer_name, "Ana Renamed");
        assert_eq!(reviews[1].text, "Much better now");
    }

    #[tokio::test]
    async fn test_submit_then_resubmit_updates_in_place() {
        let store = MemoryStore::with_users(vec![
            UserRecord::sample("a", "Arun", "male"),
            UserRecord::sample("b", "Bela", "female"),
        ]);

        let first = submit_review(&store, "a", "b", &draft(5, "Great roommate!"), 1_000)
            .await
            .unwrap();
        assert!(!first.was_update);
        assert_eq!(first.aggregates, ReviewAggregates { avg_rating: 5.0, total_reviews: 1 });

        let b = store.snapshot("b").unwrap();
        assert_eq!(b.reviews.len(), 1);
        assert_eq!(b.reviews[0].reviewer_id, "a");
        assert_eq!(b.reviews[0].rating, 5);
        assert_eq!(b.reviews[0].text, "Great roommate!");
        assert_eq!(b.reviews[0].reviewer_name, "Arun Tester");

        let second = submit_review(&store, "a", "b", &draft(3, "Actually just okay."), 2_000)
            .await
            .unwrap();
        assert!(second.was_update);
        assert_eq!(second.aggregates, ReviewAggregates { avg_rating: 3.0, total_reviews: 1 });

        let b = store.snapshot("b").unwrap();
        assert_eq!(b.reviews.len(), 1);
        assert_eq!(b.reviews[0].rating, 3);
        assert_eq!(b.reviews[0].updated_at, Some(2_000));
        assert_eq!(b.avg_rating, 3.0);
        assert_eq!(b.total_reviews, 1);
        assert_eq!(b.last_review_update, Some(2_000));
    }

    #[tokio::test]
    async fn test_submit_trims_text() {
        let store = MemoryStore::with_users(vec![
            UserRecord::sample("a", "Arun", "male"),
            UserRecord::sample("b", "Bela", "female"),
        ]);

        let submitted = submit_review(&store, "a", "b", &draft(4, "   Very tidy person   "), 10)
            .await
            .unwrap();
        assert_eq!(submitted.review.text, "Very tidy person");
    }

    #[tokio::test]
    async fn test_invalid_draft_is_rejected_before_any_write() {
        let store = MemoryStore::with_users(vec![
            UserRecord::sample("a", "Arun", "male"),
            UserRecord::sample("b", "Bela", "female"),
        ]);
        // A write would fail loudly; validation must short-circuit first.
        store.set_fail_writes(true);

        let err = submit_review(&store, "a", "b", &draft(5, "too short"), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(_)));

        let err = submit_review(&store, "a", "b", &draft(9, "Long enough text"), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_ineligible_pair_is_rejected() {
        let store = MemoryStore::with_users(vec![
            UserRecord::sample("a", "Arun", "male"),
            UserRecord::sample("c", "Caio", "male"),
        ]);

        let err = submit_review(&store, "a", "c", &draft(5, "Great roommate!"), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(_)));
        assert!(store.snapshot("c").unwrap().reviews.is_empty());
    }

    #[tokio::test]
    async fn test_missing_target_and_missing_reviewer() {
        let store = MemoryStore::with_users(vec![UserRecord::sample("a", "Arun", "male")]);

        let err = submit_review(&store, "a", "ghost", &draft(5, "Great roommate!"), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = submit_review(&store, "ghost", "a", &draft(5, "Great roommate!"), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotAuthenticated(_)));

        let err = submit_review(&store, "", "a", &draft(5, "Great roommate!"), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotAuthenticated(_)));
    }

    #[tokio::test]
    async fn test_store_failure_is_retryable_and_leaves_state_intact() {
        let store = MemoryStore::with_users(vec![
            UserRecord::sample("a", "Arun", "male"),
            UserRecord::sample("b", "Bela", "female"),
        ]);
        store.set_fail_writes(true);

        let err = submit_review(&store, "a", "b", &draft(5, "Great roommate!"), 10)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(store.snapshot("b").unwrap().reviews.is_empty());

        store.set_fail_writes(false);
        let ok = submit_review(&store, "a", "b", &draft(5, "Great roommate!"), 20).await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_commit_retries_after_lost_race() {
        let store = MemoryStore::with_users(vec![UserRecord::sample("b", "Bela", "female")]);

        let mut calls = 0;
        let (outcome, aggregates) = commit_reviews(&store, "b", 10, |target| {
            calls += 1;
            if calls == 1 {
                // Another writer commits between our read and our write.
                store.bump_version("b");
            }
            let (reviews, _) =
                upsert_review(&target.reviews, "a", "Arun", 4, "Fine roommate", 10);
            Ok((reviews, calls))
        })
        .await
        .unwrap();

        assert_eq!(outcome, 2);
        assert_eq!(aggregates.total_reviews, 1);
        assert_eq!(store.snapshot("b").unwrap().review_version, 2);
    }

    #[tokio::test]
    async fn test_commit_gives_up_when_always_contended() {
        let store = MemoryStore::with_users(vec![UserRecord::sample("b", "Bela", "female")]);

        let result = commit_reviews(&store, "b", 10, |target| {
            store.bump_version("b");
            let (reviews, _) =
                upsert_review(&target.reviews, "a", "Arun", 4, "Fine roommate", 10);
            Ok((reviews, ()))
        })
        .await;

        assert!(matches!(result, Err(AppError::StoreFailure(_))));
    }

    #[tokio::test]
    async fn test_commit_skips_write_of_unchanged_list() {
        let store = MemoryStore::with_users(vec![UserRecord::sample("b", "Bela", "female")]);

        let (_, aggregates) = commit_reviews(&store, "b", 10, |target| {
            Ok((target.reviews.clone(), ()))
        })
        .await
        .unwrap();

        assert_eq!(aggregates, ReviewAggregates::EMPTY);
        let stored = store.snapshot("b").unwrap();
        assert_eq!(stored.review_version, 0);
        assert_eq!(stored.last_review_update, None);
    }

    #[tokio::test]
    async fn test_my_review() {
        let store = MemoryStore::with_users(vec![
            UserRecord::sample("a", "Arun", "male"),
            UserRecord::sample("b", "Bela", "female"),
        ]);
        assert_eq!(my_review(&store, "a", "b").await.unwrap(), None);

        submit_review(&store, "a", "b", &draft(4, "Pays rent on time"), 10)
            .await
            .unwrap();
        let mine = my_review(&store, "a", "b").await.unwrap().unwrap();
        assert_eq!(mine.rating, 4);
        assert_eq!(my_review(&store, "b", "b").await.unwrap(), None);
    }
}
