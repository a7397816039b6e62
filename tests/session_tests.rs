// Integration tests for the relay session task
//
// A mock AudioSink stands in for the recognition stream so the tests can
// observe buffering, readiness gating, retry behavior, and teardown.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use transcriber_relay::upstream::{
    Alternative, AudioSink, ChannelAlternatives, TranscriptFragment, UpstreamEvent,
};
use transcriber_relay::{
    Channel, SessionCommand, SessionConfig, SessionEvent, SessionHandle, TranscriberSession,
};

/// Shared view into the mock sink, kept by the test after the session
/// takes ownership of the sink itself
#[derive(Clone, Default)]
struct SinkProbe {
    ready: Arc<AtomicBool>,
    fail_sends: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    finished: Arc<AtomicBool>,
}

struct MockSink {
    probe: SinkProbe,
}

#[async_trait]
impl AudioSink for MockSink {
    fn is_ready(&self) -> bool {
        self.probe.ready.load(Ordering::SeqCst)
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.probe.attempts.fetch_add(1, Ordering::SeqCst);
        if self.probe.fail_sends.load(Ordering::SeqCst) {
            return Err(anyhow!("simulated send failure"));
        }
        self.probe.sent.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.probe.ready.store(false, Ordering::SeqCst);
        self.probe.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn spawn_session(
    probe: &SinkProbe,
) -> (
    SessionHandle,
    mpsc::Receiver<SessionEvent>,
    mpsc::Sender<UpstreamEvent>,
) {
    let (upstream_tx, upstream_rx) = mpsc::channel(16);
    let sink = MockSink {
        probe: probe.clone(),
    };
    let (handle, events) =
        TranscriberSession::spawn(SessionConfig::default(), Box::new(sink), upstream_rx);
    (handle, events, upstream_tx)
}

fn fragment(index: u32, text: &str, is_final: bool) -> TranscriptFragment {
    TranscriptFragment {
        channel_index: vec![index, 2],
        is_final,
        speech_final: false,
        channel: ChannelAlternatives {
            alternatives: vec![Alternative {
                transcript: text.to_string(),
                confidence: 0.9,
            }],
        },
    }
}

/// Poll until `condition` holds; under a paused clock the sleeps advance
/// virtual time, so scheduled retries fire as a side effect of waiting
async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

#[tokio::test]
async fn test_chunks_buffer_until_upstream_is_ready() {
    let probe = SinkProbe::default(); // not ready
    let (session, _events, _upstream_tx) = spawn_session(&probe);

    assert!(session.send(SessionCommand::Audio(vec![1, 2, 3])).await);
    assert!(session.send(SessionCommand::Audio(vec![4, 5])).await);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(probe.sent.lock().unwrap().is_empty());

    // Once the stream is writable, the next ingest flushes the whole
    // buffer as a single send, in arrival order.
    probe.ready.store(true, Ordering::SeqCst);
    assert!(session.send(SessionCommand::Audio(Vec::new())).await);

    wait_until(|| !probe.sent.lock().unwrap().is_empty()).await;
    assert_eq!(*probe.sent.lock().unwrap(), vec![vec![1, 2, 3, 4, 5]]);

    // The buffer is empty again: new audio goes out on its own.
    assert!(session.send(SessionCommand::Audio(vec![9])).await);
    wait_until(|| probe.sent.lock().unwrap().len() == 2).await;
    assert_eq!(probe.sent.lock().unwrap()[1], vec![9]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_sends_retry_then_drop() {
    let probe = SinkProbe::default();
    probe.ready.store(true, Ordering::SeqCst);
    probe.fail_sends.store(true, Ordering::SeqCst);

    let (session, _events, _upstream_tx) = spawn_session(&probe);

    assert!(session.send(SessionCommand::Audio(vec![7; 32])).await);

    // One initial attempt plus three fixed-delay retries, then the buffer
    // is dropped.
    wait_until(|| probe.attempts.load(Ordering::SeqCst) == 4).await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(probe.attempts.load(Ordering::SeqCst), 4);
    assert!(probe.sent.lock().unwrap().is_empty());

    // The retry counter was reset: a later ingestion starts clean and
    // succeeds on its first attempt.
    probe.fail_sends.store(false, Ordering::SeqCst);
    assert!(session.send(SessionCommand::Audio(vec![1, 2])).await);

    wait_until(|| !probe.sent.lock().unwrap().is_empty()).await;
    assert_eq!(*probe.sent.lock().unwrap(), vec![vec![1, 2]]);
    assert_eq!(probe.attempts.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_retry() {
    let probe = SinkProbe::default();
    probe.ready.store(true, Ordering::SeqCst);
    probe.fail_sends.store(true, Ordering::SeqCst);

    let (session, _events, upstream_tx) = spawn_session(&probe);

    assert!(session.send(SessionCommand::Audio(vec![3; 16])).await);
    wait_until(|| probe.attempts.load(Ordering::SeqCst) == 1).await;

    // Shut down while the first retry timer is pending; the upstream
    // acknowledges with a close event.
    let closed = tokio::spawn(session.closed());
    let _ = upstream_tx.send(UpstreamEvent::Closed).await;
    closed.await.unwrap();

    // The cancelled timer never produces a late send attempt.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(probe.attempts.load(Ordering::SeqCst), 1);
    assert!(probe.finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_transcripts_republished_per_channel() {
    let probe = SinkProbe::default();
    let (_session, mut events, upstream_tx) = spawn_session(&probe);

    upstream_tx
        .send(UpstreamEvent::Transcript(fragment(0, "hello", false)))
        .await
        .unwrap();
    upstream_tx
        .send(UpstreamEvent::Transcript(fragment(1, "hi there", true)))
        .await
        .unwrap();

    // Joint finalization: both channels flush in one pass, customer first.
    match events.recv().await {
        Some(SessionEvent::Transcription(event)) => {
            assert_eq!(event.channel, Channel::Customer);
            assert_eq!(event.text, "hello");
        }
        other => panic!("expected customer transcription, got {:?}", other),
    }
    match events.recv().await {
        Some(SessionEvent::Transcription(event)) => {
            assert_eq!(event.channel, Channel::Assistant);
            assert_eq!(event.text, "hi there");
        }
        other => panic!("expected assistant transcription, got {:?}", other),
    }
}

#[tokio::test]
async fn test_upstream_close_flushes_trailing_utterance() {
    let probe = SinkProbe::default();
    let (_session, mut events, upstream_tx) = spawn_session(&probe);

    upstream_tx
        .send(UpstreamEvent::Transcript(fragment(0, "trailing words", false)))
        .await
        .unwrap();
    upstream_tx.send(UpstreamEvent::Closed).await.unwrap();

    match events.recv().await {
        Some(SessionEvent::Transcription(event)) => {
            assert_eq!(event.channel, Channel::Customer);
            assert_eq!(event.text, "trailing words");
        }
        other => panic!("expected trailing transcription, got {:?}", other),
    }
    assert!(matches!(events.recv().await, Some(SessionEvent::Closed)));
}

#[tokio::test]
async fn test_upstream_error_is_republished_and_nonfatal() {
    let probe = SinkProbe::default();
    let (_session, mut events, upstream_tx) = spawn_session(&probe);

    upstream_tx
        .send(UpstreamEvent::Error("bad frame".to_string()))
        .await
        .unwrap();

    match events.recv().await {
        Some(SessionEvent::TranscriptionError(e)) => assert_eq!(e, "bad frame"),
        other => panic!("expected transcription error, got {:?}", other),
    }

    // The session is still alive and keeps transcribing.
    upstream_tx
        .send(UpstreamEvent::Transcript(fragment(0, "still here", true)))
        .await
        .unwrap();

    match events.recv().await {
        Some(SessionEvent::Transcription(event)) => assert_eq!(event.text, "still here"),
        other => panic!("expected transcription, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_control_message_is_ignored() {
    let probe = SinkProbe::default();
    probe.ready.store(true, Ordering::SeqCst);
    let (session, _events, _upstream_tx) = spawn_session(&probe);

    assert!(session.send(SessionCommand::Control("not json".to_string())).await);
    assert!(
        session
            .send(SessionCommand::Control(
                r#"{"type":"start","sampleRate":16000,"channels":2}"#.to_string(),
            ))
            .await
    );

    // Control traffic never reaches the audio path.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(probe.sent.lock().unwrap().is_empty());
    assert_eq!(probe.attempts.load(Ordering::SeqCst), 0);
}
