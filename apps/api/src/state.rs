use crate::config::Config;
use crate::preview::SessionRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Mounted previews, each owning its fit controller.
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let sessions = SessionRegistry::new(config.max_sessions);
        Self { config, sessions }
    }
}
