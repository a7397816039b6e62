//! Upstream recognition stream
//!
//! This module owns the WebSocket connection to the streaming
//! speech-recognition service: typed wire messages, the reader task that
//! turns service frames into [`UpstreamEvent`]s, and the [`AudioSink`]
//! write surface the session flushes audio through.

pub mod client;
pub mod messages;

pub use client::{AudioSink, UpstreamConnection, UpstreamEvent};
pub use messages::{Alternative, ChannelAlternatives, TranscriptFragment};
