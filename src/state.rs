use crate::{config::Config, services::conversation::Dispatcher};
use std::sync::Arc;

/// Application state shared across all HTTP handlers
///
/// Holds the loaded configuration (webhook secrets, verify token) and the
/// dispatcher every inbound event is routed through.
#[derive(Clone)]
pub struct AppState {
    /// Loaded application configuration
    pub config: Arc<Config>,
    /// Routes inbound events to sessions and flow handlers
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// Create a new AppState instance
    ///
    /// # Arguments
    /// * `config` - Application configuration
    /// * `dispatcher` - Dispatcher shared with the background workers
    pub fn new(config: Config, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher,
        }
    }
}
