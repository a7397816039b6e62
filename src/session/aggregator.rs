use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::upstream::TranscriptFragment;

/// Silence interval after which pending text is force-finalized
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(3000);

/// Speaker channel of a multichannel call
///
/// The recognition service reports a numeric channel index; index 0 is the
/// customer leg, anything else the assistant leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Customer,
    Assistant,
}

impl Channel {
    const ALL: [Channel; 2] = [Channel::Customer, Channel::Assistant];

    pub fn from_index(index: u32) -> Self {
        if index == 0 {
            Channel::Customer
        } else {
            Channel::Assistant
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Customer => "customer",
            Channel::Assistant => "assistant",
        }
    }
}

/// A finalized utterance for one speaker channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    pub channel: Channel,
    pub text: String,
}

/// Aggregates interleaved partial transcripts into finalized utterances
///
/// One pending text buffer per channel. A fragment the service flags as
/// final, or a debounce-length silence before the next fragment, finalizes
/// *all* channels holding text: the service's utterance boundary acts as a
/// clock shared across channels, so a boundary on either leg flushes both.
#[derive(Debug)]
pub struct TranscriptAggregator {
    pending: [String; 2],
    last_activity: Instant,
    debounce: Duration,
}

impl Default for TranscriptAggregator {
    fn default() -> Self {
        Self::new(DEBOUNCE_DELAY)
    }
}

impl TranscriptAggregator {
    pub fn new(debounce: Duration) -> Self {
        Self {
            pending: [String::new(), String::new()],
            last_activity: Instant::now(),
            debounce,
        }
    }

    /// Feed one fragment; returns any utterances it finalized
    ///
    /// Fragments without a usable alternative are logged and ignored
    /// without touching the debounce clock. Empty transcripts are ignored
    /// the same way.
    pub fn on_fragment(&mut self, fragment: &TranscriptFragment) -> Vec<TranscriptEvent> {
        let Some(alternative) = fragment.primary_alternative() else {
            warn!("transcript fragment without alternatives, ignoring");
            return Vec::new();
        };

        let text = alternative.transcript.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let channel = Channel::from_index(fragment.speaker_index());
        let now = Instant::now();
        let idle = now.duration_since(self.last_activity);

        let pending = &mut self.pending[channel as usize];
        if !pending.is_empty() {
            pending.push(' ');
        }
        pending.push_str(text);

        debug!(
            channel = channel.as_str(),
            text,
            is_final = fragment.is_final,
            speech_final = fragment.speech_final,
            "accumulated transcript fragment"
        );

        let events = if fragment.is_final || fragment.speech_final || idle >= self.debounce {
            self.finalize_all()
        } else {
            Vec::new()
        };

        self.last_activity = now;
        events
    }

    /// Force-finalize whatever is pending, regardless of flags or silence
    ///
    /// Used at stream close so a trailing unterminated utterance is not
    /// lost. Emitting is idempotent: a second pass with no new fragments
    /// returns nothing.
    pub fn flush(&mut self) -> Vec<TranscriptEvent> {
        self.finalize_all()
    }

    fn finalize_all(&mut self) -> Vec<TranscriptEvent> {
        let mut events = Vec::new();

        for channel in Channel::ALL {
            let pending = &mut self.pending[channel as usize];
            if pending.is_empty() {
                continue;
            }

            let text = std::mem::take(pending);
            info!(channel = channel.as_str(), text = %text, "finalized utterance");
            events.push(TranscriptEvent { channel, text });
        }

        events
    }
}
