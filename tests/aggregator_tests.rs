// Integration tests for transcript aggregation
//
// These tests verify channel separation, joint finalization, and the
// silence debounce that forces pending text out when the service never
// flags an utterance boundary.

use std::time::Duration;
use transcriber_relay::upstream::{Alternative, ChannelAlternatives, TranscriptFragment};
use transcriber_relay::{Channel, TranscriptAggregator, TranscriptEvent};

fn fragment(index: u32, text: &str, is_final: bool, speech_final: bool) -> TranscriptFragment {
    TranscriptFragment {
        channel_index: vec![index, 2],
        is_final,
        speech_final,
        channel: ChannelAlternatives {
            alternatives: vec![Alternative {
                transcript: text.to_string(),
                confidence: 0.95,
            }],
        },
    }
}

#[tokio::test]
async fn test_channels_accumulate_independently() {
    let mut aggregator = TranscriptAggregator::default();

    assert!(aggregator.on_fragment(&fragment(0, "one", false, false)).is_empty());
    assert!(aggregator.on_fragment(&fragment(1, "two", false, false)).is_empty());
    assert!(aggregator.on_fragment(&fragment(0, "three", false, false)).is_empty());

    let events = aggregator.on_fragment(&fragment(1, "done", true, false));

    assert_eq!(
        events,
        vec![
            TranscriptEvent {
                channel: Channel::Customer,
                text: "one three".to_string(),
            },
            TranscriptEvent {
                channel: Channel::Assistant,
                text: "two done".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_final_flag_on_one_channel_flushes_the_other() {
    let mut aggregator = TranscriptAggregator::default();

    assert!(aggregator.on_fragment(&fragment(0, "hello", false, false)).is_empty());

    // The assistant leg's utterance boundary flushes the customer leg too.
    let events = aggregator.on_fragment(&fragment(1, "how can I help", true, false));

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].channel, Channel::Customer);
    assert_eq!(events[0].text, "hello");
    assert_eq!(events[1].channel, Channel::Assistant);
    assert_eq!(events[1].text, "how can I help");
}

#[tokio::test(start_paused = true)]
async fn test_silence_forces_pending_text_to_emit() {
    let mut aggregator = TranscriptAggregator::default();

    assert!(aggregator.on_fragment(&fragment(0, "foo", false, false)).is_empty());

    tokio::time::advance(Duration::from_millis(3000)).await;

    // Neither fragment carries a final flag; the silence alone triggers
    // finalization of everything pending.
    let events = aggregator.on_fragment(&fragment(1, "bar", false, false));

    assert_eq!(
        events,
        vec![
            TranscriptEvent {
                channel: Channel::Customer,
                text: "foo".to_string(),
            },
            TranscriptEvent {
                channel: Channel::Assistant,
                text: "bar".to_string(),
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_short_silence_keeps_accumulating() {
    let mut aggregator = TranscriptAggregator::default();

    assert!(aggregator.on_fragment(&fragment(0, "foo", false, false)).is_empty());

    tokio::time::advance(Duration::from_millis(2999)).await;
    assert!(aggregator.on_fragment(&fragment(0, "bar", false, false)).is_empty());

    let events = aggregator.on_fragment(&fragment(0, "baz", true, false));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].text, "foo bar baz");
}

#[tokio::test(start_paused = true)]
async fn test_malformed_fragment_does_not_touch_debounce_clock() {
    let mut aggregator = TranscriptAggregator::default();

    assert!(aggregator.on_fragment(&fragment(0, "foo", false, false)).is_empty());

    tokio::time::advance(Duration::from_millis(3000)).await;

    // A fragment without alternatives is a no-op; the debounce window it
    // would have reset stays expired.
    assert!(aggregator.on_fragment(&TranscriptFragment::default()).is_empty());

    let events = aggregator.on_fragment(&fragment(1, "bar", false, false));
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn test_finalize_pass_emits_nothing_twice() {
    let mut aggregator = TranscriptAggregator::default();

    aggregator.on_fragment(&fragment(0, "text", false, false));
    assert_eq!(aggregator.flush().len(), 1);

    // Everything is back to idle; a second pass has nothing to emit.
    assert!(aggregator.flush().is_empty());
    assert!(aggregator.on_fragment(&fragment(0, "next", true, false)).len() == 1);
}
