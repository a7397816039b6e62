use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Counters for one relay session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Total audio bytes accepted from the client
    pub bytes_ingested: usize,

    /// Number of buffer hand-offs to the upstream sender
    pub flushes: usize,

    /// Retries scheduled for failed upstream sends
    pub retries: usize,

    /// Buffers discarded after exhausting the retry budget
    pub dropped_buffers: usize,

    /// Finalized utterances emitted to the client
    pub utterances: usize,

    /// Errors reported by the recognition service
    pub upstream_errors: usize,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            bytes_ingested: 0,
            flushes: 0,
            retries: 0,
            dropped_buffers: 0,
            utterances: 0,
            upstream_errors: 0,
        }
    }
}

impl SessionStats {
    /// Log a one-line summary at session teardown
    pub fn log_summary(&self, session_id: &str) {
        let duration = Utc::now().signed_duration_since(self.started_at);

        info!(
            session_id,
            duration_secs = duration.num_milliseconds() as f64 / 1000.0,
            bytes_ingested = self.bytes_ingested,
            flushes = self.flushes,
            retries = self.retries,
            dropped_buffers = self.dropped_buffers,
            utterances = self.utterances,
            upstream_errors = self.upstream_errors,
            "session finished"
        );
    }
}
