use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::Config;
use crate::store::{PgStore, TaskStore, UserStore};

/// Shared per-application state, registered as `web::Data<AppState>`.
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub tokens: TokenService,
    pub bcrypt_cost: u32,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        tasks: Arc<dyn TaskStore>,
        tokens: TokenService,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            users,
            tasks,
            tokens,
            bcrypt_cost,
        }
    }

    /// State backed by a single PostgreSQL store for both users and tasks.
    pub fn with_pg_store(store: PgStore, config: &Config) -> Self {
        let store = Arc::new(store);
        Self::new(
            store.clone(),
            store,
            TokenService::from_config(config),
            config.bcrypt_cost,
        )
    }
}
