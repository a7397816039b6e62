use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::aggregator::{TranscriptAggregator, TranscriptEvent};
use super::audio::AudioIngestBuffer;
use super::config::SessionConfig;
use super::retry::RetryPolicy;
use super::sender::UpstreamSender;
use super::stats::SessionStats;
use crate::upstream::{AudioSink, TranscriptFragment, UpstreamEvent};

/// How long to wait for the upstream close after the client disconnects
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Inputs processed by the session task
#[derive(Debug)]
pub enum SessionCommand {
    /// Binary audio chunk from the client
    Audio(Vec<u8>),
    /// Text payload from the client (control messages)
    Control(String),
    /// A retry timer fired for a previously failed buffer
    RetryFlush(Vec<u8>),
    /// The client connection went away
    Shutdown,
}

/// Events republished to the boundary layer
#[derive(Debug)]
pub enum SessionEvent {
    /// A finalized utterance
    Transcription(TranscriptEvent),
    /// The recognition service reported an error; the session continues
    TranscriptionError(String),
    /// The upstream stream ended; the session is over
    Closed,
}

/// Client control message; only `start` is meaningful
#[derive(Debug, Deserialize)]
struct ControlMessage {
    #[serde(rename = "type")]
    kind: String,

    #[serde(rename = "sampleRate")]
    sample_rate: Option<u32>,

    channels: Option<u16>,
}

/// Handle for feeding commands into a running session task
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Enqueue a command; returns false once the session is gone
    pub async fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Signal shutdown without waiting for the session to wind down
    pub async fn shutdown(self) {
        let _ = self.commands.send(SessionCommand::Shutdown).await;
    }

    /// Wait for the session task to finish (used by tests)
    pub async fn closed(self) {
        let _ = self.commands.send(SessionCommand::Shutdown).await;
        let _ = self.task.await;
    }
}

/// One relay session: single owner of the ingest buffer, retry state,
/// per-channel accumulators, and the upstream sink
///
/// Runs as a spawned task. Audio arrivals, upstream events, and retry-timer
/// firings all enter through channels, so buffer mutation and finalization
/// are serialized without locks.
pub struct TranscriberSession {
    config: SessionConfig,
    sink: Box<dyn AudioSink>,
    buffer: AudioIngestBuffer,
    sender: UpstreamSender,
    aggregator: TranscriptAggregator,
    stats: SessionStats,
    events: mpsc::Sender<SessionEvent>,
}

impl TranscriberSession {
    /// Spawn the session task
    ///
    /// Returns a command handle and the stream of session events for the
    /// boundary layer to consume.
    pub fn spawn(
        config: SessionConfig,
        sink: Box<dyn AudioSink>,
        upstream_events: mpsc::Receiver<UpstreamEvent>,
    ) -> (SessionHandle, mpsc::Receiver<SessionEvent>) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(64);

        let session = Self {
            sender: UpstreamSender::new(RetryPolicy::default(), command_tx.clone()),
            config,
            sink,
            buffer: AudioIngestBuffer::new(),
            aggregator: TranscriptAggregator::default(),
            stats: SessionStats::default(),
            events: event_tx,
        };

        let task = tokio::spawn(session.run(command_rx, upstream_events));

        (
            SessionHandle {
                commands: command_tx,
                task,
            },
            event_rx,
        )
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut upstream: mpsc::Receiver<UpstreamEvent>,
    ) {
        info!(session_id = %self.config.session_id, "session started");

        let mut close_deadline: Option<tokio::time::Instant> = None;

        loop {
            tokio::select! {
                command = commands.recv(), if close_deadline.is_none() => match command {
                    Some(SessionCommand::Audio(chunk)) => self.on_audio(&chunk).await,
                    Some(SessionCommand::Control(text)) => self.on_control(&text),
                    Some(SessionCommand::RetryFlush(data)) => {
                        self.sender.flush(data, self.sink.as_mut()).await;
                    }
                    Some(SessionCommand::Shutdown) | None => {
                        self.begin_shutdown().await;
                        close_deadline = Some(tokio::time::Instant::now() + SHUTDOWN_GRACE);
                    }
                },
                event = upstream.recv() => match event {
                    Some(UpstreamEvent::Open) => {
                        info!(session_id = %self.config.session_id, "recognition stream open");
                    }
                    Some(UpstreamEvent::Metadata(metadata)) => {
                        debug!(?metadata, "recognition stream metadata");
                    }
                    Some(UpstreamEvent::Transcript(fragment)) => self.on_transcript(&fragment).await,
                    Some(UpstreamEvent::Error(e)) => {
                        error!(session_id = %self.config.session_id, error = %e, "recognition service error");
                        self.stats.upstream_errors += 1;
                        let _ = self.events.send(SessionEvent::TranscriptionError(e)).await;
                    }
                    Some(UpstreamEvent::Closed) | None => {
                        self.finish().await;
                        return;
                    }
                },
                _ = sleep_until_deadline(close_deadline), if close_deadline.is_some() => {
                    warn!(session_id = %self.config.session_id, "upstream close timed out");
                    self.finish().await;
                    return;
                }
            }
        }
    }

    /// Accept a binary chunk and flush the whole buffer if upstream is ready
    async fn on_audio(&mut self, chunk: &[u8]) {
        self.stats.bytes_ingested += chunk.len();
        self.buffer.ingest(chunk);
        debug!(
            bytes = chunk.len(),
            buffered = self.buffer.len(),
            "ingested audio chunk"
        );

        if self.sink.is_ready() && !self.buffer.is_empty() {
            let data = self.buffer.take();
            self.stats.flushes += 1;
            self.sender.flush(data, self.sink.as_mut()).await;
        }
    }

    /// Handle a text payload from the client
    ///
    /// The `start` message is logged for telemetry only; it does not alter
    /// buffering behavior. Anything unparseable is discarded with a warning.
    fn on_control(&mut self, text: &str) {
        match serde_json::from_str::<ControlMessage>(text) {
            Ok(message) if message.kind == "start" => {
                info!(
                    session_id = %self.config.session_id,
                    sample_rate = ?message.sample_rate,
                    channels = ?message.channels,
                    "received start message from client"
                );
            }
            Ok(message) => {
                debug!(kind = %message.kind, "ignoring client control message");
            }
            Err(e) => {
                warn!(error = %e, "malformed client control message, discarding");
            }
        }
    }

    async fn on_transcript(&mut self, fragment: &TranscriptFragment) {
        for event in self.aggregator.on_fragment(fragment) {
            self.emit(event).await;
        }
    }

    async fn emit(&mut self, event: TranscriptEvent) {
        self.stats.utterances += 1;
        if self
            .events
            .send(SessionEvent::Transcription(event))
            .await
            .is_err()
        {
            debug!("event receiver dropped, discarding transcription");
        }
    }

    /// Client went away: stop retries, ask the service to finish, then wait
    /// for its close event to run the final flush
    async fn begin_shutdown(&mut self) {
        info!(session_id = %self.config.session_id, "client disconnected, finishing upstream stream");
        self.sender.cancel_pending();

        if self.sink.is_ready() {
            if let Err(e) = self.sink.finish().await {
                warn!(error = %e, "failed to finish recognition stream");
            }
        }
    }

    /// Upstream ended: forced finalize pass, then teardown
    async fn finish(&mut self) {
        self.sender.cancel_pending();

        for event in self.aggregator.flush() {
            self.emit(event).await;
        }

        let _ = self.events.send(SessionEvent::Closed).await;

        self.stats.retries = self.sender.retries_scheduled();
        self.stats.dropped_buffers = self.sender.buffers_dropped();
        self.stats.log_summary(&self.config.session_id);
    }
}

async fn sleep_until_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
