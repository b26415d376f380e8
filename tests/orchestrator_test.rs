//! Voice orchestrator tests
//!
//! Drives the orchestrator against in-process synthesis fakes and checks
//! per-voice isolation, the request lifecycle and how replies map onto
//! each record.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use voicelab::backend::{
    CallResult, SynthesisBackend, SynthesisReply, SynthesisRequest, TransportError,
    TransportErrorKind,
};
use voicelab::catalog::VOICES;
use voicelab::orchestrator::{
    RequestState, Resolution, SubmitOutcome, VoiceOrchestrator, CONNECT_ERROR, EMPTY_TEXT_ERROR,
};

const ORIGIN: &str = "http://localhost:5000";
const WAIT: Duration = Duration::from_secs(5);

/// Answers every call with a fixed reply and counts the calls
struct FixedBackend {
    reply: CallResult<SynthesisReply>,
    calls: AtomicUsize,
    seen: Mutex<Vec<SynthesisRequest>>,
}

impl FixedBackend {
    fn new(reply: CallResult<SynthesisReply>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SynthesisBackend for FixedBackend {
    fn synthesize(&self, request: &SynthesisRequest) -> CallResult<SynthesisReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());
        self.reply.clone()
    }

    fn available_voices(&self) -> CallResult<Vec<String>> {
        Ok(VOICES.iter().map(|v| v.id.to_string()).collect())
    }
}

/// Holds each call until the test releases it with a reply
struct GatedBackend {
    started: Sender<String>,
    replies: Receiver<CallResult<SynthesisReply>>,
}

impl GatedBackend {
    fn new() -> (
        Arc<Self>,
        Receiver<String>,
        Sender<CallResult<SynthesisReply>>,
    ) {
        let (started_tx, started_rx) = unbounded();
        let (reply_tx, reply_rx) = unbounded();
        (
            Arc::new(Self {
                started: started_tx,
                replies: reply_rx,
            }),
            started_rx,
            reply_tx,
        )
    }
}

impl SynthesisBackend for GatedBackend {
    fn synthesize(&self, request: &SynthesisRequest) -> CallResult<SynthesisReply> {
        self.started.send(request.text.clone()).unwrap();
        self.replies
            .recv()
            .unwrap_or_else(|_| Err(TransportError::new(TransportErrorKind::Other, "gate closed")))
    }

    fn available_voices(&self) -> CallResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Like `GatedBackend`, but each request text has its own reply channel
struct KeyedBackend {
    started: Sender<String>,
    replies: HashMap<String, Receiver<CallResult<SynthesisReply>>>,
}

impl KeyedBackend {
    fn new(
        texts: &[&str],
    ) -> (
        Arc<Self>,
        Receiver<String>,
        HashMap<String, Sender<CallResult<SynthesisReply>>>,
    ) {
        let (started_tx, started_rx) = unbounded();
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for text in texts {
            let (tx, rx) = unbounded();
            senders.insert(text.to_string(), tx);
            receivers.insert(text.to_string(), rx);
        }
        (
            Arc::new(Self {
                started: started_tx,
                replies: receivers,
            }),
            started_rx,
            senders,
        )
    }
}

impl SynthesisBackend for KeyedBackend {
    fn synthesize(&self, request: &SynthesisRequest) -> CallResult<SynthesisReply> {
        self.started.send(request.text.clone()).unwrap();
        match self.replies.get(&request.text) {
            Some(replies) => replies.recv().unwrap_or_else(|_| {
                Err(TransportError::new(TransportErrorKind::Other, "gate closed"))
            }),
            None => Err(TransportError::new(
                TransportErrorKind::Other,
                "unexpected text",
            )),
        }
    }

    fn available_voices(&self) -> CallResult<Vec<String>> {
        Ok(Vec::new())
    }
}

fn settled(orchestrator: &mut VoiceOrchestrator) -> Resolution {
    orchestrator
        .wait_completion(WAIT)
        .expect("no completion arrived")
}

#[test]
fn test_every_voice_starts_empty() {
    let backend = FixedBackend::new(Ok(SynthesisReply::Audio("/audio/x.wav".to_string())));
    let orchestrator = VoiceOrchestrator::new(backend, ORIGIN);

    assert_eq!(orchestrator.states().count(), VOICES.len());
    for (_, state) in orchestrator.states() {
        assert_eq!(*state, RequestState::default());
    }
    assert_eq!(orchestrator.pending_count(), 0);
}

#[test]
fn test_blank_text_issues_no_call() {
    let backend = FixedBackend::new(Ok(SynthesisReply::Audio("/audio/x.wav".to_string())));
    let mut orchestrator = VoiceOrchestrator::new(backend.clone(), ORIGIN);

    orchestrator.set_input_text("walter_white", "   \t").unwrap();
    assert_eq!(
        orchestrator.submit("walter_white").unwrap(),
        SubmitOutcome::Rejected
    );

    let state = orchestrator.state("walter_white").unwrap();
    assert!(!state.is_pending);
    assert_eq!(state.last_error.as_deref(), Some(EMPTY_TEXT_ERROR));
    assert_eq!(state.result_ref, None);
    assert_eq!(backend.calls(), 0);
}

#[test]
fn test_success_resolves_against_origin() {
    let backend = FixedBackend::new(Ok(SynthesisReply::Audio("/audio/abc.wav".to_string())));
    let mut orchestrator = VoiceOrchestrator::new(backend.clone(), ORIGIN);

    orchestrator
        .set_input_text("peter_griffin", "Hello there!")
        .unwrap();
    let outcome = orchestrator.submit("peter_griffin").unwrap();
    assert_eq!(outcome, SubmitOutcome::Dispatched { seq: 1 });

    assert_eq!(
        settled(&mut orchestrator),
        Resolution::Applied("peter_griffin")
    );

    let state = orchestrator.state("peter_griffin").unwrap();
    assert!(!state.is_pending);
    assert_eq!(state.last_error, None);
    assert_eq!(
        state.result_ref.as_deref(),
        Some("http://localhost:5000/audio/abc.wav")
    );
    assert_eq!(state.input_text, "Hello there!");

    let seen = backend.seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![SynthesisRequest {
            text: "Hello there!".to_string(),
            voice: "peter_griffin".to_string(),
        }]
    );
}

#[test]
fn test_unreachable_server_sets_connect_error() {
    let backend = FixedBackend::new(Err(TransportError::new(
        TransportErrorKind::Connection,
        "connection refused",
    )));
    let mut orchestrator = VoiceOrchestrator::new(backend, ORIGIN);

    orchestrator.set_input_text("lois_griffin", "Victory!").unwrap();
    orchestrator.submit("lois_griffin").unwrap();
    settled(&mut orchestrator);

    let state = orchestrator.state("lois_griffin").unwrap();
    assert!(!state.is_pending);
    assert_eq!(state.last_error.as_deref(), Some(CONNECT_ERROR));
    assert_eq!(state.result_ref, None);
}

#[test]
fn test_server_error_shown_verbatim() {
    let backend = FixedBackend::new(Ok(SynthesisReply::Rejected(
        "Voice model not loaded".to_string(),
    )));
    let mut orchestrator = VoiceOrchestrator::new(backend, ORIGIN);

    orchestrator.set_input_text("tony_soprano", "Do or do not").unwrap();
    orchestrator.submit("tony_soprano").unwrap();
    settled(&mut orchestrator);

    let state = orchestrator.state("tony_soprano").unwrap();
    assert_eq!(state.last_error.as_deref(), Some("Voice model not loaded"));
    assert_eq!(state.result_ref, None);
}

#[test]
fn test_pending_voice_does_not_touch_others() {
    let (backend, started, replies) = GatedBackend::new();
    let mut orchestrator = VoiceOrchestrator::new(backend, ORIGIN);

    orchestrator.set_input_text("peter_griffin", "first").unwrap();
    orchestrator.set_input_text("walter_white", "second").unwrap();
    let before = orchestrator.state("walter_white").unwrap().clone();

    orchestrator.submit("peter_griffin").unwrap();
    assert_eq!(started.recv_timeout(WAIT).unwrap(), "first");

    let peter = orchestrator.state("peter_griffin").unwrap();
    assert!(peter.is_pending);
    assert_eq!(peter.last_error, None);
    assert_eq!(peter.result_ref, None);
    assert_eq!(orchestrator.state("walter_white").unwrap(), &before);
    assert_eq!(orchestrator.pending_count(), 1);

    replies
        .send(Ok(SynthesisReply::Audio("/audio/p.wav".to_string())))
        .unwrap();
    assert_eq!(
        settled(&mut orchestrator),
        Resolution::Applied("peter_griffin")
    );
    assert_eq!(orchestrator.state("walter_white").unwrap(), &before);
}

#[test]
fn test_voices_complete_out_of_order() {
    let (backend, started, replies) = GatedBackend::new();
    let mut orchestrator = VoiceOrchestrator::new(backend, ORIGIN);

    orchestrator.set_input_text("peter_griffin", "one").unwrap();
    orchestrator.set_input_text("walter_white", "two").unwrap();
    orchestrator.submit("peter_griffin").unwrap();
    started.recv_timeout(WAIT).unwrap();
    orchestrator.submit("walter_white").unwrap();
    started.recv_timeout(WAIT).unwrap();
    assert_eq!(orchestrator.pending_count(), 2);

    // Whichever worker takes the first reply settles first
    replies
        .send(Err(TransportError::new(TransportErrorKind::Timeout, "slow")))
        .unwrap();
    let first = settled(&mut orchestrator).voice();
    assert_eq!(orchestrator.pending_count(), 1);

    replies
        .send(Ok(SynthesisReply::Audio("/audio/ok.wav".to_string())))
        .unwrap();
    let second = settled(&mut orchestrator).voice();
    assert_ne!(first, second);

    let failed = orchestrator.state(first).unwrap();
    assert_eq!(failed.last_error.as_deref(), Some(CONNECT_ERROR));
    let done = orchestrator.state(second).unwrap();
    assert_eq!(
        done.result_ref.as_deref(),
        Some("http://localhost:5000/audio/ok.wav")
    );
}

#[test]
fn test_later_submission_wins_same_voice() {
    let (backend, started, replies) = KeyedBackend::new(&["old", "new"]);
    let mut orchestrator = VoiceOrchestrator::new(backend, ORIGIN);

    orchestrator.set_input_text("arthur_morgan", "old").unwrap();
    assert_eq!(
        orchestrator.submit("arthur_morgan").unwrap(),
        SubmitOutcome::Dispatched { seq: 1 }
    );
    assert_eq!(started.recv_timeout(WAIT).unwrap(), "old");

    orchestrator.set_input_text("arthur_morgan", "new").unwrap();
    assert_eq!(
        orchestrator.submit("arthur_morgan").unwrap(),
        SubmitOutcome::Dispatched { seq: 2 }
    );
    assert_eq!(started.recv_timeout(WAIT).unwrap(), "new");

    // The newer call answers first
    replies["new"]
        .send(Ok(SynthesisReply::Audio("/audio/new.wav".to_string())))
        .unwrap();
    assert_eq!(
        settled(&mut orchestrator),
        Resolution::Applied("arthur_morgan")
    );
    let after_new = orchestrator.state("arthur_morgan").unwrap().clone();
    assert!(!after_new.is_pending);
    assert_eq!(
        after_new.result_ref.as_deref(),
        Some("http://localhost:5000/audio/new.wav")
    );

    // The older call arriving last must not overwrite it
    replies["old"]
        .send(Ok(SynthesisReply::Audio("/audio/old.wav".to_string())))
        .unwrap();
    assert_eq!(
        settled(&mut orchestrator),
        Resolution::Stale("arthur_morgan")
    );

    let state = orchestrator.state("arthur_morgan").unwrap();
    assert_eq!(state, &after_new);
    assert_eq!(state.input_text, "new");
    assert_eq!(state.last_error, None);
}

#[test]
fn test_older_reply_does_not_settle_pending_voice() {
    let (backend, started, replies) = KeyedBackend::new(&["first", "second"]);
    let mut orchestrator = VoiceOrchestrator::new(backend, ORIGIN);

    orchestrator.set_input_text("rachel_green", "first").unwrap();
    orchestrator.submit("rachel_green").unwrap();
    started.recv_timeout(WAIT).unwrap();
    orchestrator.set_input_text("rachel_green", "second").unwrap();
    orchestrator.submit("rachel_green").unwrap();
    started.recv_timeout(WAIT).unwrap();

    replies["first"]
        .send(Ok(SynthesisReply::Rejected("first failed".to_string())))
        .unwrap();
    assert_eq!(
        settled(&mut orchestrator),
        Resolution::Stale("rachel_green")
    );

    let pending = orchestrator.state("rachel_green").unwrap();
    assert!(pending.is_pending);
    assert_eq!(pending.last_error, None);
    assert_eq!(pending.result_ref, None);

    replies["second"]
        .send(Ok(SynthesisReply::Rejected("second failed".to_string())))
        .unwrap();
    assert_eq!(
        settled(&mut orchestrator),
        Resolution::Applied("rachel_green")
    );

    let state = orchestrator.state("rachel_green").unwrap();
    assert!(!state.is_pending);
    assert_eq!(state.last_error.as_deref(), Some("second failed"));
}

#[test]
fn test_blank_text_after_success_clears_result() {
    let backend = FixedBackend::new(Ok(SynthesisReply::Audio("/audio/w.wav".to_string())));
    let mut orchestrator = VoiceOrchestrator::new(backend.clone(), ORIGIN);

    orchestrator.set_input_text("walter_white", "Say my name").unwrap();
    orchestrator.submit("walter_white").unwrap();
    settled(&mut orchestrator);
    assert!(orchestrator.state("walter_white").unwrap().result_ref.is_some());

    orchestrator.set_input_text("walter_white", "  ").unwrap();
    assert_eq!(
        orchestrator.submit("walter_white").unwrap(),
        SubmitOutcome::Rejected
    );

    let state = orchestrator.state("walter_white").unwrap();
    assert!(!state.is_pending);
    assert_eq!(state.last_error.as_deref(), Some(EMPTY_TEXT_ERROR));
    assert_eq!(state.result_ref, None);
    assert_eq!(backend.calls(), 1);
}

#[test]
fn test_blank_text_while_pending_leaves_record() {
    let (backend, started, replies) = KeyedBackend::new(&["Forget it, Jake"]);
    let mut orchestrator = VoiceOrchestrator::new(backend, ORIGIN);

    orchestrator
        .set_input_text("tony_soprano", "Forget it, Jake")
        .unwrap();
    orchestrator.submit("tony_soprano").unwrap();
    started.recv_timeout(WAIT).unwrap();

    orchestrator.set_input_text("tony_soprano", "").unwrap();
    assert_eq!(
        orchestrator.submit("tony_soprano").unwrap(),
        SubmitOutcome::Rejected
    );

    let pending = orchestrator.state("tony_soprano").unwrap();
    assert!(pending.is_pending);
    assert_eq!(pending.last_error, None);
    assert_eq!(pending.result_ref, None);

    // The call in flight still settles the record
    replies["Forget it, Jake"]
        .send(Ok(SynthesisReply::Rejected("boom".to_string())))
        .unwrap();
    assert_eq!(
        settled(&mut orchestrator),
        Resolution::Applied("tony_soprano")
    );

    let state = orchestrator.state("tony_soprano").unwrap();
    assert!(!state.is_pending);
    assert_eq!(state.last_error.as_deref(), Some("boom"));
    assert_eq!(state.input_text, "");
}

#[test]
fn test_resubmit_clears_previous_outcome() {
    let backend = FixedBackend::new(Ok(SynthesisReply::Audio("/audio/again.wav".to_string())));
    let mut orchestrator = VoiceOrchestrator::new(backend.clone(), ORIGIN);

    orchestrator.submit("tyler_durden").unwrap();
    assert_eq!(
        orchestrator.state("tyler_durden").unwrap().last_error.as_deref(),
        Some(EMPTY_TEXT_ERROR)
    );

    orchestrator
        .set_input_text("tyler_durden", "First rule")
        .unwrap();
    orchestrator.submit("tyler_durden").unwrap();
    let pending = orchestrator.state("tyler_durden").unwrap();
    assert!(pending.is_pending);
    assert_eq!(pending.last_error, None);

    settled(&mut orchestrator);
    orchestrator.submit("tyler_durden").unwrap();
    settled(&mut orchestrator);

    let state = orchestrator.state("tyler_durden").unwrap();
    assert_eq!(
        state.result_ref.as_deref(),
        Some("http://localhost:5000/audio/again.wav")
    );
    assert_eq!(backend.calls(), 2);
}

#[test]
fn test_settled_record_never_has_both_outcomes() {
    let replies = [
        Ok(SynthesisReply::Audio("/audio/a.wav".to_string())),
        Ok(SynthesisReply::Rejected("nope".to_string())),
        Err(TransportError::malformed("not json")),
    ];
    for reply in replies {
        let backend = FixedBackend::new(reply);
        let mut orchestrator = VoiceOrchestrator::new(backend, ORIGIN);
        orchestrator.set_input_text("patrick_bateman", "Yeah.").unwrap();
        orchestrator.submit("patrick_bateman").unwrap();
        settled(&mut orchestrator);

        let state = orchestrator.state("patrick_bateman").unwrap();
        assert!(!state.is_pending);
        assert!(state.last_error.is_some() != state.result_ref.is_some());
    }
}

#[test]
fn test_unknown_voice_is_an_error() {
    let backend = FixedBackend::new(Ok(SynthesisReply::Audio("/audio/x.wav".to_string())));
    let mut orchestrator = VoiceOrchestrator::new(backend.clone(), ORIGIN);

    assert!(orchestrator.set_input_text("bart_simpson", "Hi").is_err());
    assert!(orchestrator.submit("bart_simpson").is_err());
    assert!(orchestrator.state("bart_simpson").is_none());
    assert_eq!(backend.calls(), 0);
}

#[test]
fn test_notifier_fires_per_completion() {
    let backend = FixedBackend::new(Ok(SynthesisReply::Audio("/audio/x.wav".to_string())));
    let mut orchestrator = VoiceOrchestrator::new(backend, ORIGIN);

    let (tx, rx) = unbounded::<()>();
    orchestrator.set_notifier(Arc::new(move || {
        let _ = tx.send(());
    }));

    orchestrator.set_input_text("peter_griffin", "a").unwrap();
    orchestrator.set_input_text("walter_white", "b").unwrap();
    orchestrator.submit("peter_griffin").unwrap();
    orchestrator.submit("walter_white").unwrap();

    rx.recv_timeout(WAIT).unwrap();
    rx.recv_timeout(WAIT).unwrap();

    let resolutions = orchestrator.poll();
    assert_eq!(resolutions.len(), 2);
    assert_eq!(orchestrator.pending_count(), 0);
}
