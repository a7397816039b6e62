use serde::Deserialize;

/// One incremental recognition result from the live stream
///
/// The service interleaves fragments for all speaker channels on a single
/// connection; `channel_index` identifies the speaker, `is_final` and
/// `speech_final` mark utterance boundaries. Every field is defaulted so a
/// sparse message still parses; a fragment without alternatives is treated
/// as malformed downstream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptFragment {
    /// `[channel, total_channels]` pair reported by the service
    #[serde(default)]
    pub channel_index: Vec<u32>,

    /// The recognizer will not revise this fragment further
    #[serde(default)]
    pub is_final: bool,

    /// The recognizer detected the end of a spoken utterance
    #[serde(default)]
    pub speech_final: bool,

    /// Ranked transcription alternatives for the fragment's channel
    #[serde(default)]
    pub channel: ChannelAlternatives,
}

/// Container for the ranked alternatives of one channel
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelAlternatives {
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

/// A single transcription hypothesis
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Alternative {
    #[serde(default)]
    pub transcript: String,

    #[serde(default)]
    pub confidence: f64,
}

impl TranscriptFragment {
    /// The top-ranked alternative, if the service provided one
    pub fn primary_alternative(&self) -> Option<&Alternative> {
        self.channel.alternatives.first()
    }

    /// Speaker channel index (first entry of `channel_index`, 0 if absent)
    pub fn speaker_index(&self) -> u32 {
        self.channel_index.first().copied().unwrap_or(0)
    }
}
