use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::messages::TranscriptFragment;
use crate::config::UpstreamConfig;

/// Lifecycle and data events reported by the recognition stream
#[derive(Debug)]
pub enum UpstreamEvent {
    /// Connection established and writable
    Open,
    /// Service metadata payload
    Metadata(serde_json::Value),
    /// One incremental recognition result
    Transcript(TranscriptFragment),
    /// Service-reported error; the stream may still be alive
    Error(String),
    /// The stream ended; no further events will follow
    Closed,
}

/// Write surface of the upstream recognition stream
///
/// The session talks to this trait rather than the connection directly;
/// tests substitute a mock that records sends and fails on demand.
#[async_trait]
pub trait AudioSink: Send {
    /// Whether the stream is currently writable
    fn is_ready(&self) -> bool;

    /// Hand one audio buffer to the stream
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Signal end of audio and close the write half
    async fn finish(&mut self) -> Result<()>;
}

type WsWrite = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Live connection to the recognition service
///
/// Owns the WebSocket write half and a reader task that decodes service
/// messages into [`UpstreamEvent`]s on the channel given to `connect`.
pub struct UpstreamConnection {
    write: WsWrite,
    ready: Arc<AtomicBool>,
    reader_task: JoinHandle<()>,
}

impl UpstreamConnection {
    /// Connect to the recognition service and start the reader task
    pub async fn connect(
        config: &UpstreamConfig,
        events: mpsc::Sender<UpstreamEvent>,
    ) -> Result<Self> {
        info!(
            model = %config.model,
            sample_rate = config.sample_rate,
            channels = config.channels,
            "connecting to recognition service"
        );

        let mut request = config
            .listen_url()
            .into_client_request()
            .context("Invalid upstream URL")?;

        let auth = format!("Token {}", config.api_key);
        request.headers_mut().insert(
            "Authorization",
            HeaderValue::from_str(&auth).context("Invalid API key header value")?,
        );

        let (stream, _response) = connect_async(request)
            .await
            .context("Failed to connect to recognition service")?;

        info!("recognition stream opened");

        let (write, read) = stream.split();
        let ready = Arc::new(AtomicBool::new(true));

        let _ = events.send(UpstreamEvent::Open).await;

        let reader_task = tokio::spawn(run_reader(read, events, Arc::clone(&ready)));

        Ok(Self {
            write,
            ready,
            reader_task,
        })
    }
}

#[async_trait]
impl AudioSink for UpstreamConnection {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.write
            .send(Message::Binary(data.to_vec()))
            .await
            .context("Failed to send audio to recognition service")
    }

    async fn finish(&mut self) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);

        // The service finishes transcribing buffered audio, then closes
        // the stream from its side.
        self.write
            .send(Message::Text(r#"{"type":"CloseStream"}"#.to_string()))
            .await
            .context("Failed to finish recognition stream")?;

        self.write
            .close()
            .await
            .context("Failed to close recognition stream")
    }
}

impl Drop for UpstreamConnection {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

/// Decode incoming frames until the stream ends
async fn run_reader(
    mut read: WsRead,
    events: mpsc::Sender<UpstreamEvent>,
    ready: Arc<AtomicBool>,
) {
    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if let Some(event) = decode_service_message(&text) {
                    if events.send(event).await.is_err() {
                        debug!("event receiver dropped, stopping reader");
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) => {
                info!("recognition service closed the stream");
                break;
            }
            Ok(_) => {} // ping/pong/binary
            Err(e) => {
                warn!(error = %e, "recognition stream error");
                let _ = events.send(UpstreamEvent::Error(e.to_string())).await;
                break;
            }
        }
    }

    ready.store(false, Ordering::SeqCst);
    let _ = events.send(UpstreamEvent::Closed).await;
}

/// Parse one text frame into a typed event
///
/// Returns `None` for frames the relay has no use for; malformed frames are
/// logged and dropped here so invalid shapes never reach the session.
fn decode_service_message(text: &str) -> Option<UpstreamEvent> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "unparseable message from recognition service");
            return None;
        }
    };

    match value.get("type").and_then(|t| t.as_str()) {
        Some("Results") => match serde_json::from_value::<TranscriptFragment>(value) {
            Ok(fragment) => Some(UpstreamEvent::Transcript(fragment)),
            Err(e) => {
                warn!(error = %e, "malformed transcript fragment");
                None
            }
        },
        Some("Metadata") => Some(UpstreamEvent::Metadata(value)),
        Some(other) => {
            debug!(kind = other, "ignoring recognition service message");
            None
        }
        None => {
            warn!("recognition service message without a type");
            None
        }
    }
}
