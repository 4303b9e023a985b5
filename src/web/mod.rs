//! Web module - HTTP server for the dashboard

mod error;
mod layout;
mod routes;

pub use routes::create_router;

use crate::config::Config;
use crate::data::Dashboard;
use std::sync::Arc;

/// Shared application state, read-only after start-up.
#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<Dashboard>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(dashboard: Dashboard, config: Config) -> Self {
        Self {
            dashboard: Arc::new(dashboard),
            config: Arc::new(config),
        }
    }
}
