pub mod config;
pub mod http;
pub mod session;
pub mod upstream;

pub use config::{Config, UpstreamConfig};
pub use http::{create_router, AppState};
pub use session::{
    AudioIngestBuffer, Channel, RetryDecision, RetryPolicy, SessionCommand, SessionConfig,
    SessionEvent, SessionHandle, SessionStats, TranscriberSession, TranscriptAggregator,
    TranscriptEvent,
};
pub use upstream::{AudioSink, TranscriptFragment, UpstreamConnection, UpstreamEvent};
