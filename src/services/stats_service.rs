// ==================== RATING AGGREGATES ====================
// The embedded `users.reviews` list is the source of truth. The old
// standalone `reviews` collection is read-only: it can be compared against
// the embedded list and imported into it, never written.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::{
    models::{LegacyReview, Review, ReviewAggregates, ReviewDraft, UserRecord},
    services::review_service::{
        can_review, commit_reviews, upsert_review, ReviewParty, MAX_WRITE_ATTEMPTS,
    },
    store::UserStore,
    utils::AppError,
};

/// Count and mean of the ratings, the mean rounded half-up to 2 decimals.
pub fn aggregate_ratings<I>(ratings: I) -> ReviewAggregates
where
    I: IntoIterator<Item = i32>,
{
    let (sum, count) = ratings
        .into_iter()
        .fold((0_i64, 0_i64), |(sum, count), r| (sum + r as i64, count + 1));

    if count == 0 {
        return ReviewAggregates::EMPTY;
    }

    // floor(sum * 100 / count + 1/2) in integers, so x.xx5 always rounds up
    let hundredths = (sum * 200 + count).div_euclid(2 * count);

    ReviewAggregates {
        avg_rating: hundredths as f64 / 100.0,
        total_reviews: count,
    }
}

pub fn recompute_aggregates(reviews: &[Review]) -> ReviewAggregates {
    aggregate_ratings(reviews.iter().map(|r| r.rating))
}

/// Same formula over the legacy collection's documents addressed to a user
pub async fn aggregates_from_legacy(
    store: &dyn UserStore,
    target_id: &str,
) -> Result<ReviewAggregates, AppError> {
    let docs = store.legacy_reviews_for(target_id).await?;
    Ok(aggregate_ratings(docs.iter().map(|d| d.rating)))
}

/// Rewrites the stored aggregate fields from the embedded list. The write is
/// refused if the list changed after it was read; the user is then reloaded.
pub async fn refresh_user_stats(
    store: &dyn UserStore,
    user_id: &str,
) -> Result<ReviewAggregates, AppError> {
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let user = store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        let aggregates = recompute_aggregates(&user.reviews);

        if store
            .set_aggregates(user_id, user.review_version, aggregates)
            .await?
        {
            log::info!(
                "📊 Stats refreshed for {}: avg {:.2}, {} reviews",
                user_id,
                aggregates.avg_rating,
                aggregates.total_reviews
            );
            return Ok(aggregates);
        }

        log::warn!(
            "⚠️  Reviews of {} changed during stats refresh (attempt {}/{})",
            user_id,
            attempt,
            MAX_WRITE_ATTEMPTS
        );
    }

    Err(AppError::StoreFailure(
        "Too many concurrent updates, please try again".to_string(),
    ))
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct StatsReport {
    pub user_id: String,
    /// Recomputed from the embedded review list
    pub canonical: ReviewAggregates,
    /// Denormalized fields currently stored on the user document
    pub stored: ReviewAggregates,
    /// Recomputed from the legacy reviews collection
    pub legacy: ReviewAggregates,
    pub stored_in_sync: bool,
    pub legacy_in_sync: bool,
}

/// Compares the three places an average can come from
pub async fn stats_report(store: &dyn UserStore, user_id: &str) -> Result<StatsReport, AppError> {
    let user = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

    let canonical = recompute_aggregates(&user.reviews);
    let stored = user.aggregates();
    let legacy = aggregates_from_legacy(store, user_id).await?;

    Ok(StatsReport {
        user_id: user.user_id,
        canonical,
        stored,
        legacy,
        stored_in_sync: stored == canonical,
        legacy_in_sync: legacy == canonical,
    })
}

/// Fills review fields on users created before they existed: a missing
/// `review_version` becomes 0 and missing aggregates are computed from the
/// embedded list.
pub async fn backfill_missing_fields(store: &dyn UserStore) -> Result<u64, AppError> {
    let mut touched = store.backfill_missing_fields().await?;

    for user in store.users_missing_aggregates().await? {
        match refresh_user_stats(store, &user.user_id).await {
            Ok(_) => touched += 1,
            Err(AppError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }

    if touched > 0 {
        log::info!("🧹 Backfilled missing review fields on {} documents", touched);
    } else {
        log::debug!("No user documents needed backfilling");
    }
    Ok(touched)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub users_touched: usize,
}

fn legacy_is_importable(
    doc: &LegacyReview,
    reviewer: Option<&UserRecord>,
    target: &UserRecord,
) -> Result<(), String> {
    let reviewer = reviewer.ok_or_else(|| format!("reviewer {} not found", doc.from_user_id))?;

    ReviewDraft {
        rating: doc.rating,
        text: doc.text.clone().unwrap_or_default(),
    }
    .validate()?;

    if !can_review(ReviewParty::from(reviewer), ReviewParty::from(target)) {
        return Err("reviewer is not eligible".to_string());
    }

    if target.reviews.iter().any(|r| r.reviewer_id == doc.from_user_id) {
        return Err("embedded review already present".to_string());
    }

    Ok(())
}

/// Folds the legacy collection into the embedded lists. Existing embedded
/// reviews win; invalid, ineligible, or orphaned documents are skipped.
pub async fn import_legacy_reviews(
    store: &dyn UserStore,
    now: i64,
) -> Result<ImportSummary, AppError> {
    let docs = store.all_legacy_reviews().await?;
    let mut summary = ImportSummary::default();

    if docs.is_empty() {
        return Ok(summary);
    }

    log::info!("📦 Importing {} legacy review documents...", docs.len());

    let mut by_target: BTreeMap<String, Vec<LegacyReview>> = BTreeMap::new();
    for doc in docs {
        by_target.entry(doc.to_user_id.clone()).or_default().push(doc);
    }

    let mut reviewers: HashMap<String, Option<UserRecord>> = HashMap::new();
    for doc in by_target.values().flatten() {
        if !reviewers.contains_key(&doc.from_user_id) {
            let reviewer = store.find_user(&doc.from_user_id).await?;
            reviewers.insert(doc.from_user_id.clone(), reviewer);
        }
    }

    for (target_id, group) in &by_target {
        let result = commit_reviews(store, target_id, now, |target| {
            let mut reviews = target.reviews.clone();
            let mut imported = 0;
            let mut skipped = 0;

            for doc in group {
                let reviewer = reviewers.get(&doc.from_user_id).and_then(|r| r.as_ref());

                // Check against the list built so far, so a reviewer with
                // several legacy documents is imported once.
                let current = UserRecord {
                    reviews: reviews.clone(),
                    ..target.clone()
                };
                if let Err(reason) = legacy_is_importable(doc, reviewer, &current) {
                    log::debug!(
                        "Skipping legacy review {} -> {}: {}",
                        doc.from_user_id,
                        target_id,
                        reason
                    );
                    skipped += 1;
                    continue;
                }

                let reviewer_name = doc
                    .reviewer_name
                    .clone()
                    .or_else(|| reviewer.map(|r| r.display_name()))
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| "Anonymous User".to_string());
                let text = doc.text.as_deref().unwrap_or_default().trim();

                let (next, _) = upsert_review(
                    &reviews,
                    &doc.from_user_id,
                    &reviewer_name,
                    doc.rating,
                    text,
                    doc.created_at.unwrap_or(now),
                );
                reviews = next;
                imported += 1;
            }

            Ok((reviews, (imported, skipped)))
        })
        .await;

        match result {
            Ok(((imported, skipped), aggregates)) => {
                summary.imported += imported;
                summary.skipped += skipped;
                if imported > 0 {
                    summary.users_touched += 1;
                    log::info!(
                        "   ✅ {}: imported {} (avg {:.2}, {} reviews)",
                        target_id,
                        imported,
                        aggregates.avg_rating,
                        aggregates.total_reviews
                    );
                }
            }
            Err(AppError::NotFound(_)) => {
                log::warn!("   ⚠️  Target {} not found, skipping {} documents", target_id, group.len());
                summary.skipped += group.len();
            }
            Err(e) => return Err(e),
        }
    }

    log::info!(
        "✅ Legacy import done: {} imported, {} skipped, {} users updated",
        summary.imported,
        summary.skipped,
        summary.users_touched
    );

    Ok(summary)
}
