use std::time::Duration;

/// Maximum number of retries for a single buffered send
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Fixed delay before retrying a failed send
pub const RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Outcome of consulting the retry policy after a failed send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the same buffer after the given delay
    Retry { after: Duration },
    /// Discard the buffer and start the next one clean
    GiveUp,
}

/// Retry policy for failed upstream sends
///
/// Fixed-delay retry with a bounded attempt count. This is pure decision
/// logic: scheduling and cancellation of the actual timer belong to the
/// sender.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRY_ATTEMPTS,
            delay: RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Decide what to do after a failed attempt
    ///
    /// `attempts` counts failures so far for the in-flight buffer, including
    /// the one that just happened.
    pub fn decide(&self, attempts: u32) -> RetryDecision {
        if attempts <= self.max_attempts {
            RetryDecision::Retry { after: self.delay }
        } else {
            RetryDecision::GiveUp
        }
    }
}
