//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::r#match::SessionSettings;
use crate::game::SessionRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let settings = SessionSettings {
            rounds_to_win: config.rounds_to_win,
            idle_timeout: config.session_idle_timeout(),
        };
        let sessions = Arc::new(SessionRegistry::new(config.max_sessions, settings));

        Self { config, sessions }
    }
}
