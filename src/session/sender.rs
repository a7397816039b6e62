use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::retry::{RetryDecision, RetryPolicy};
use super::session::SessionCommand;
use crate::upstream::AudioSink;

/// Forwards buffered audio to the upstream sink, retrying failed sends
///
/// A failed send schedules a fixed-delay timer task that re-enqueues the
/// *same* buffer through the session command channel, keeping retries
/// serialized with ingest and finalize. Timers are cancellable; the session
/// aborts them at teardown so a late retry can never write to a closed
/// stream. Send failures never propagate past this component.
pub struct UpstreamSender {
    policy: RetryPolicy,
    attempts: u32,
    retries_scheduled: usize,
    buffers_dropped: usize,
    commands: mpsc::Sender<SessionCommand>,
    pending_retries: Vec<JoinHandle<()>>,
}

impl UpstreamSender {
    pub fn new(policy: RetryPolicy, commands: mpsc::Sender<SessionCommand>) -> Self {
        Self {
            policy,
            attempts: 0,
            retries_scheduled: 0,
            buffers_dropped: 0,
            commands,
            pending_retries: Vec::new(),
        }
    }

    /// Attempt to hand one buffer to the sink
    pub async fn flush(&mut self, data: Vec<u8>, sink: &mut dyn AudioSink) {
        match sink.send(&data).await {
            Ok(()) => {
                info!(bytes = data.len(), "sent buffered audio upstream");
                self.attempts = 0;
            }
            Err(e) => {
                self.attempts += 1;
                match self.policy.decide(self.attempts) {
                    RetryDecision::Retry { after } => {
                        warn!(
                            error = %e,
                            attempt = self.attempts,
                            bytes = data.len(),
                            "upstream send failed, scheduling retry"
                        );
                        self.retries_scheduled += 1;
                        self.pending_retries.retain(|task| !task.is_finished());

                        let commands = self.commands.clone();
                        self.pending_retries.push(tokio::spawn(async move {
                            tokio::time::sleep(after).await;
                            let _ = commands.send(SessionCommand::RetryFlush(data)).await;
                        }));
                    }
                    RetryDecision::GiveUp => {
                        error!(
                            error = %e,
                            attempts = self.attempts,
                            bytes = data.len(),
                            "max retry attempts reached, discarding buffered audio"
                        );
                        self.buffers_dropped += 1;
                        self.attempts = 0;
                    }
                }
            }
        }
    }

    /// Abort any scheduled retries, discarding their buffers
    pub fn cancel_pending(&mut self) {
        for task in self.pending_retries.drain(..) {
            if !task.is_finished() {
                debug!("cancelling pending retry");
            }
            task.abort();
        }
    }

    pub fn retries_scheduled(&self) -> usize {
        self.retries_scheduled
    }

    pub fn buffers_dropped(&self) -> usize {
        self.buffers_dropped
    }
}
