// ==================== STARTUP MAINTENANCE ====================
// Runs once before the server accepts traffic: zero-fills review fields on
// older user documents and, when enabled, folds the legacy reviews
// collection into the embedded lists.

use chrono::Utc;

use crate::{
    config::AppConfig,
    services::stats_service::{self, ImportSummary},
    store::UserStore,
    utils::AppError,
};

#[derive(Debug, Default)]
pub struct MaintenanceReport {
    pub backfilled: u64,
    pub import: Option<ImportSummary>,
}

pub async fn run_startup_maintenance(
    store: &dyn UserStore,
    config: &AppConfig,
) -> Result<MaintenanceReport, AppError> {
    log::info!("🧹 Running startup maintenance...");

    let backfilled = stats_service::backfill_missing_fields(store).await?;

    let import = if config.import_legacy_reviews {
        let summary = stats_service::import_legacy_reviews(store, Utc::now().timestamp()).await?;
        log::info!(
            "📦 Legacy import: {} imported, {} skipped, {} users touched",
            summary.imported,
            summary.skipped,
            summary.users_touched
        );
        Some(summary)
    } else {
        log::debug!("Legacy review import disabled");
        None
    };

    log::info!("✅ Startup maintenance completed");

    Ok(MaintenanceReport { backfilled, import })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LegacyReview, UserRecord};
    use crate::store::memory::MemoryStore;

    fn store_with_legacy() -> MemoryStore {
        let store = MemoryStore::with_users(vec![
            UserRecord::sample("b", "Bela", "female"),
            UserRecord::sample("c", "Caio", "male"),
        ]);
        store.add_legacy_review(LegacyReview {
            from_user_id: "c".to_string(),
            to_user_id: "b".to_string(),
            rating: 4,
            text: Some("Always pays rent on time".to_string()),
            reviewer_name: None,
            created_at: Some(10),
        });
        store
    }

    #[tokio::test]
    async fn test_import_only_runs_when_enabled() {
        let store = store_with_legacy();
        let mut config = AppConfig::for_tests();

        let report = run_startup_maintenance(&store, &config).await.unwrap();
        assert!(report.import.is_none());
        assert!(store.snapshot("b").unwrap().reviews.is_empty());

        config.import_legacy_reviews = true;
        let report = run_startup_maintenance(&store, &config).await.unwrap();
        assert_eq!(report.import.unwrap().imported, 1);

        let bela = store.snapshot("b").unwrap();
        assert_eq!(bela.total_reviews, 1);
        assert_eq!(bela.avg_rating, 4.0);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let store = store_with_legacy();
        store.set_fail_writes(true);

        let err = run_startup_maintenance(&store, &AppConfig::for_tests())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
