use std::sync::Arc;

use crate::config::AppConfig;
use crate::store::UserStore;

/// Shared by every worker through `web::Data<AppState>`.
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn UserStore>, config: AppConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &dyn UserStore {
        self.store.as_ref()
    }
}
