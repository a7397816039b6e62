use super::state::AppState;
use crate::session::{Channel, SessionCommand, SessionConfig, SessionEvent, TranscriberSession};
use crate::upstream::UpstreamConnection;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

// ============================================================================
// Client wire types
// ============================================================================

/// Finalized utterance pushed to the client
#[derive(Debug, Serialize)]
pub struct TranscriberResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub transcription: String,
    pub channel: Channel,
}

impl TranscriberResponse {
    fn new(transcription: String, channel: Channel) -> Self {
        Self {
            kind: "transcriber-response",
            transcription,
            channel,
        }
    }
}

/// Error notification pushed to the client
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub error: String,
}

impl ErrorResponse {
    fn transcription_error() -> Self {
        Self {
            kind: "error",
            error: "Transcription service error".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_sessions: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /
/// Service banner
pub async fn root() -> impl IntoResponse {
    "Custom Transcriber Service is running"
}

/// GET /health
/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            active_sessions: state.active_sessions.load(Ordering::SeqCst),
        }),
    )
}

/// GET /api/custom-transcriber
/// Upgrade to the relay protocol: binary frames in, transcript JSON out
pub async fn transcriber_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_transcriber_socket(socket, state))
}

async fn handle_transcriber_socket(mut socket: WebSocket, state: AppState) {
    info!("client connected on /api/custom-transcriber");

    let (upstream_tx, upstream_rx) = mpsc::channel(64);
    let upstream = match UpstreamConnection::connect(&state.config.upstream, upstream_tx).await {
        Ok(connection) => connection,
        Err(e) => {
            error!(error = %e, "failed to open recognition stream");
            let _ = send_json(&mut socket, &ErrorResponse::transcription_error()).await;
            return;
        }
    };

    state.active_sessions.fetch_add(1, Ordering::SeqCst);

    let session_config = SessionConfig::default();
    let session_id = session_config.session_id.clone();
    let (session, mut events) =
        TranscriberSession::spawn(session_config, Box::new(upstream), upstream_rx);

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Binary(chunk))) => {
                    if !session.send(SessionCommand::Audio(chunk)).await {
                        break;
                    }
                }
                Some(Ok(Message::Text(text))) => {
                    if !session.send(SessionCommand::Control(text)).await {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!(session_id = %session_id, "client disconnected");
                    break;
                }
                Some(Ok(_)) => {} // ping/pong are answered by axum
                Some(Err(e)) => {
                    warn!(session_id = %session_id, error = %e, "client socket error");
                    break;
                }
            },
            event = events.recv() => match event {
                Some(SessionEvent::Transcription(utterance)) => {
                    info!(
                        session_id = %session_id,
                        channel = utterance.channel.as_str(),
                        text = %utterance.text,
                        "sent transcription to client"
                    );
                    let response = TranscriberResponse::new(utterance.text, utterance.channel);
                    if send_json(&mut socket, &response).await.is_err() {
                        break;
                    }
                }
                Some(SessionEvent::TranscriptionError(e)) => {
                    warn!(session_id = %session_id, error = %e, "relaying transcription error to client");
                    let _ = send_json(&mut socket, &ErrorResponse::transcription_error()).await;
                }
                Some(SessionEvent::Closed) | None => {
                    info!(session_id = %session_id, "session closed");
                    break;
                }
            },
        }
    }

    session.shutdown().await;
    state.active_sessions.fetch_sub(1, Ordering::SeqCst);
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, payload: &T) -> Result<(), ()> {
    match serde_json::to_string(payload) {
        Ok(text) => socket.send(Message::Text(text)).await.map_err(|e| {
            warn!(error = %e, "failed to push message to client");
        }),
        Err(e) => {
            warn!(error = %e, "failed to encode client message");
            Err(())
        }
    }
}
