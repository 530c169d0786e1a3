use mongodb::bson::{doc, Document};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use std::error::Error;

use crate::store::{LEGACY_REVIEWS_COLLECTION, USERS_COLLECTION};

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str, db_name: &str, max_pool_size: u32) -> Result<Self, Box<dyn Error>> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        client_options.max_pool_size = Some(max_pool_size);
        client_options.min_pool_size = Some(max_pool_size.min(5));
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));

        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));
        client_options.app_name = Some("roommate-review-service".to_string());

        let client = Client::with_options(client_options)?;
        let db = client.database(db_name);

        // Test connection
        db.list_collection_names().await?;

        let mongodb = Self { db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Creates the indexes the review flows query on
    async fn ensure_indexes(&self) -> Result<(), Box<dyn Error>> {
        log::info!("🔧 Creating database indexes...");

        let users = self.collection::<Document>(USERS_COLLECTION);
        let unique = || IndexOptions::builder().unique(true).build();

        let user_indexes = [
            (
                "users(user_id) unique",
                IndexModel::builder()
                    .keys(doc! { "user_id": 1 })
                    .options(unique())
                    .build(),
            ),
            (
                "users(email) unique",
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
            ),
            (
                "users(avg_rating, total_reviews)",
                IndexModel::builder()
                    .keys(doc! { "avg_rating": -1, "total_reviews": -1 })
                    .build(),
            ),
        ];

        for (name, index) in user_indexes {
            match users.create_index(index).await {
                Ok(_) => log::info!("   ✅ Index created: {}", name),
                Err(e) => log::debug!("   ℹ️  Index already exists: {} ({})", name, e),
            }
        }

        let legacy = self.collection::<Document>(LEGACY_REVIEWS_COLLECTION);
        let legacy_index = IndexModel::builder()
            .keys(doc! { "to_user_id": 1 })
            .build();

        match legacy.create_index(legacy_index).await {
            Ok(_) => log::info!("   ✅ Index created: reviews(to_user_id)"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    /// Check if the connection is healthy
    pub async fn ping_server(&self) -> bool {
        self.db.run_command(doc! { "ping": 1 }).await.is_ok()
    }
}
