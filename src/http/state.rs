use crate::config::Config;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Number of live relay sessions, reported by /health
    pub active_sessions: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            active_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }
}
