pub mod config;
pub mod logging;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod upcoming;

use chrono::{DateTime, Local};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::state::StateStore;

pub use routes::router;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<StateStore>>,
    pub last_action_result: Arc<Mutex<Option<String>>>,
    pub started_at: DateTime<Local>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: StateStore, config: Config) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            last_action_result: Arc::new(Mutex::new(None)),
            started_at: Local::now(),
            config: Arc::new(config),
        }
    }
}
