//! Voice request orchestration
//!
//! Keeps one independent request record per roster voice and runs synthesis
//! calls for them concurrently. Calls for different voices never touch each
//! other's record. Each record is only ever replaced whole, on the owning
//! thread, when a submission starts or a completion is applied.
//!
//! Every submission is tagged with a per-voice sequence number. If the same
//! voice is submitted again before an earlier call has come back, only the
//! most recently issued call is allowed to settle the record; completions
//! from older calls are dropped as stale whenever they arrive.

use crate::backend::{
    resolve_audio_url, CallResult, SynthesisBackend, SynthesisReply, SynthesisRequest,
    TransportError, TransportErrorKind,
};
use crate::catalog::{self, VoiceIdentity, VOICES};
use crate::dispatch::{Completion, Dispatcher, Notifier};
use crate::{Result, VoicelabError};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Shown when submitting with nothing to say
pub const EMPTY_TEXT_ERROR: &str = "Please enter some text!";

/// Shown when no reply could be obtained from the server
pub const CONNECT_ERROR: &str = "Failed to connect to server.";

/// Per-voice request record
///
/// Invariants: a pending record has neither error nor result, and a
/// settled record never has both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestState {
    pub input_text: String,
    pub is_pending: bool,
    pub last_error: Option<String>,
    pub result_ref: Option<String>,
}

impl RequestState {
    fn pending(input_text: String) -> Self {
        Self {
            input_text,
            is_pending: true,
            last_error: None,
            result_ref: None,
        }
    }

    fn failed(input_text: String, message: String) -> Self {
        Self {
            input_text,
            is_pending: false,
            last_error: Some(message),
            result_ref: None,
        }
    }

    fn succeeded(input_text: String, url: String) -> Self {
        Self {
            input_text,
            is_pending: false,
            last_error: None,
            result_ref: Some(url),
        }
    }
}

/// Outcome a worker hands back
pub type SynthesisOutcome = CallResult<SynthesisReply>;

/// What `submit` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing to send; the record now carries the validation error
    Rejected,
    /// A call is in flight under this sequence number
    Dispatched { seq: u64 },
}

/// What happened to a completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The voice's record was settled
    Applied(&'static str),
    /// A newer call for the voice had been issued; nothing changed
    Stale(&'static str),
}

impl Resolution {
    pub fn voice(&self) -> &'static str {
        match self {
            Resolution::Applied(v) | Resolution::Stale(v) => *v,
        }
    }
}

struct Slot {
    state: RequestState,
    /// Highest sequence number handed out for this voice (0 = never)
    latest_seq: u64,
}

/// Owns the request records and the synthesis workers
pub struct VoiceOrchestrator {
    backend: Arc<dyn SynthesisBackend>,
    origin: String,
    slots: BTreeMap<&'static str, Slot>,
    dispatcher: Dispatcher<SynthesisOutcome>,
}

impl VoiceOrchestrator {
    /// Mount the orchestrator with an empty record for every voice
    ///
    /// `origin` is where relative audio paths from the server are resolved.
    pub fn new(backend: Arc<dyn SynthesisBackend>, origin: &str) -> Self {
        let slots = VOICES
            .iter()
            .map(|v| {
                (
                    v.id,
                    Slot {
                        state: RequestState::default(),
                        latest_seq: 0,
                    },
                )
            })
            .collect();

        info!("Orchestrator mounted with {} voices", VOICES.len());

        Self {
            backend,
            origin: origin.trim_end_matches('/').to_string(),
            slots,
            dispatcher: Dispatcher::new(),
        }
    }

    /// Wake the caller's event loop whenever a call finishes
    pub fn set_notifier(&mut self, notifier: Notifier) {
        self.dispatcher.set_notifier(notifier);
    }

    /// Current record for a voice
    pub fn state(&self, voice: &str) -> Option<&RequestState> {
        self.slots.get(voice).map(|slot| &slot.state)
    }

    /// Every voice with its record, in roster order
    pub fn states(&self) -> impl Iterator<Item = (&'static VoiceIdentity, &RequestState)> + '_ {
        VOICES
            .iter()
            .filter_map(move |v| self.slots.get(v.id).map(|slot| (v, &slot.state)))
    }

    /// Number of voices with a call in flight
    pub fn pending_count(&self) -> usize {
        self.slots.values().filter(|s| s.state.is_pending).count()
    }

    fn slot_mut(&mut self, voice: &str) -> Result<(&'static str, &mut Slot)> {
        let key = catalog::find(voice)
            .map(|v| v.id)
            .ok_or_else(|| VoicelabError::UnknownVoice(voice.to_string()))?;
        let slot = self
            .slots
            .get_mut(key)
            .ok_or_else(|| VoicelabError::UnknownVoice(voice.to_string()))?;
        Ok((key, slot))
    }

    /// Replace a voice's input text
    pub fn set_input_text(&mut self, voice: &str, text: &str) -> Result<()> {
        let (_, slot) = self.slot_mut(voice)?;
        slot.state.input_text = text.to_string();
        Ok(())
    }

    /// Start a synthesis call for a voice
    ///
    /// Blank input settles the record with a validation error and issues no
    /// call (a voice that is already pending is left alone). Otherwise the
    /// previous outcome is cleared, the voice goes pending, and a worker is
    /// spawned. Submitting a voice that is already pending is allowed; the
    /// newer call supersedes the older one.
    pub fn submit(&mut self, voice: &str) -> Result<SubmitOutcome> {
        let backend = Arc::clone(&self.backend);
        let (key, slot) = self.slot_mut(voice)?;

        if slot.state.input_text.trim().is_empty() {
            debug!("{}: nothing to say", key);
            if slot.state.is_pending {
                // The call in flight will settle the record
                return Ok(SubmitOutcome::Rejected);
            }
            slot.state.last_error = Some(EMPTY_TEXT_ERROR.to_string());
            slot.state.result_ref = None;
            return Ok(SubmitOutcome::Rejected);
        }

        slot.latest_seq += 1;
        let seq = slot.latest_seq;
        let text = slot.state.input_text.clone();
        slot.state = RequestState::pending(text.clone());

        info!("{}: submitting request #{} ({} chars)", key, seq, text.len());

        let request = SynthesisRequest {
            text,
            voice: key.to_string(),
        };
        let spawned = self
            .dispatcher
            .spawn(key, seq, move || backend.synthesize(&request));

        if let Err(e) = spawned {
            error!("{}: {}", key, e);
            self.apply(Completion {
                key,
                seq,
                outcome: Err(TransportError::new(
                    TransportErrorKind::Other,
                    e.to_string(),
                )),
            });
        }

        Ok(SubmitOutcome::Dispatched { seq })
    }

    /// Apply every completion that has arrived, without blocking
    pub fn poll(&mut self) -> Vec<Resolution> {
        self.dispatcher
            .drain()
            .into_iter()
            .map(|c| self.apply(c))
            .collect()
    }

    /// Wait for the next completion and apply it
    pub fn wait_completion(&mut self, timeout: Duration) -> Option<Resolution> {
        let completion = self.dispatcher.recv_timeout(timeout)?;
        Some(self.apply(completion))
    }

    fn apply(&mut self, completion: Completion<SynthesisOutcome>) -> Resolution {
        let Completion { key, seq, outcome } = completion;

        let Some(slot) = self.slots.get_mut(key) else {
            // Keys only ever come from the catalog
            error!("Completion for unknown voice {}", key);
            return Resolution::Stale(key);
        };

        if seq != slot.latest_seq {
            warn!(
                "{}: dropping reply #{} (latest issued is #{})",
                key, seq, slot.latest_seq
            );
            return Resolution::Stale(key);
        }

        let input = std::mem::take(&mut slot.state.input_text);
        slot.state = match outcome {
            Ok(SynthesisReply::Audio(path)) => {
                let url = resolve_audio_url(&self.origin, &path);
                info!("{}: request #{} ready at {}", key, seq, url);
                RequestState::succeeded(input, url)
            }
            Ok(SynthesisReply::Rejected(message)) => {
                info!("{}: request #{} rejected: {}", key, seq, message);
                RequestState::failed(input, message)
            }
            Err(e) => {
                warn!("{}: request #{} failed: {}", key, seq, e);
                RequestState::failed(input, CONNECT_ERROR.to_string())
            }
        };

        Resolution::Applied(key)
    }
}
