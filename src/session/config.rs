use serde::{Deserialize, Serialize};

/// Configuration for a relay session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier
    pub session_id: String,

    /// Sample rate the client advertises (telemetry only; audio passes
    /// through unmodified)
    pub sample_rate: u32,

    /// Channel count the client advertises (telemetry only)
    pub channels: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            sample_rate: 16000,
            channels: 2,
        }
    }
}
