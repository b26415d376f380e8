//! Backend collaborators
//!
//! The client talks to two services: one that checks credentials and one that
//! turns text into audio in a given voice. Both are consumed only through the
//! traits here so the session gate and the orchestrator can be driven by
//! in-process fakes.

pub mod http;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use http::{resolve_audio_url, HttpBackend};

/// Body of a login call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of a synthesis call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
}

/// What the authentication service answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthReply {
    Accepted,
    /// Server-supplied message, shown verbatim
    Rejected(String),
}

/// What the synthesis service answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisReply {
    /// Audio location relative to the server origin
    Audio(String),
    /// Server-supplied message, shown verbatim
    Rejected(String),
}

/// Rough cause of a failed call, for logs only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Connection,
    Dns,
    Timeout,
    /// A reply arrived but could not be understood
    Malformed,
    Other,
}

/// No usable reply was obtained
///
/// Users see one generic connectivity message regardless of the kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub detail: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Malformed, detail)
    }

    /// Classify a transport failure from its description
    pub fn classify(raw: &str) -> TransportErrorKind {
        let lower = raw.to_ascii_lowercase();
        if lower.contains("timed out") || lower.contains("timeout") {
            TransportErrorKind::Timeout
        } else if lower.contains("dns") || lower.contains("resolve") {
            TransportErrorKind::Dns
        } else if lower.contains("connect") || lower.contains("refused") {
            TransportErrorKind::Connection
        } else {
            TransportErrorKind::Other
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.detail)
    }
}

impl std::error::Error for TransportError {}

/// Result of a single collaborator call
pub type CallResult<T> = std::result::Result<T, TransportError>;

/// Authentication collaborator
pub trait AuthBackend: Send + Sync {
    /// Make one login attempt
    fn login(&self, request: &LoginRequest) -> CallResult<AuthReply>;
}

/// Speech synthesis collaborator
pub trait SynthesisBackend: Send + Sync {
    /// Make one synthesis call
    fn synthesize(&self, request: &SynthesisRequest) -> CallResult<SynthesisReply>;

    /// Voice ids the server has loaded
    fn available_voices(&self) -> CallResult<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default, alias = "audioPath")]
    audio_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    voices: Vec<String>,
}

/// Non-empty error field, if any. An empty message counts as no error.
fn error_message(error: Option<String>) -> Option<String> {
    error.filter(|e| !e.is_empty())
}

/// Decode a login reply body
///
/// The error field wins over the success flag. A body with neither is
/// treated as malformed.
pub fn decode_login_reply(body: &str) -> CallResult<AuthReply> {
    let reply: LoginResponse = serde_json::from_str(body)
        .map_err(|e| TransportError::malformed(format!("login reply: {}", e)))?;

    if let Some(message) = error_message(reply.error) {
        Ok(AuthReply::Rejected(message))
    } else if reply.success {
        Ok(AuthReply::Accepted)
    } else {
        Err(TransportError::malformed(
            "login reply carries neither success nor error",
        ))
    }
}

/// Decode a synthesis reply body
pub fn decode_synthesis_reply(body: &str) -> CallResult<SynthesisReply> {
    let reply: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| TransportError::malformed(format!("generate reply: {}", e)))?;

    if let Some(message) = error_message(reply.error) {
        return Ok(SynthesisReply::Rejected(message));
    }

    match reply.audio_url.filter(|p| !p.is_empty()) {
        Some(path) => Ok(SynthesisReply::Audio(path)),
        None => Err(TransportError::malformed(
            "generate reply carries neither audio_url nor error",
        )),
    }
}

/// Decode the voice listing body
pub fn decode_voices_reply(body: &str) -> CallResult<Vec<String>> {
    let reply: VoicesResponse = serde_json::from_str(body)
        .map_err(|e| TransportError::malformed(format!("voices reply: {}", e)))?;
    Ok(reply.voices)
}
