//! Error types for voicelab

use std::io;
use thiserror::Error;

/// Main error type for voicelab
///
/// These are process-level failures. Backend outcomes (server-reported
/// errors, unreachable server) are not errors here: they become per-voice
/// or per-form state the user sees.
#[derive(Error, Debug)]
pub enum VoicelabError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Unknown voice: {0}")]
    UnknownVoice(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for voicelab operations
pub type Result<T> = std::result::Result<T, VoicelabError>;

impl From<String> for VoicelabError {
    fn from(s: String) -> Self {
        VoicelabError::Other(s)
    }
}

impl From<&str> for VoicelabError {
    fn from(s: &str) -> Self {
        VoicelabError::Other(s.to_string())
    }
}

impl From<nix::Error> for VoicelabError {
    fn from(e: nix::Error) -> Self {
        VoicelabError::Terminal(e.to_string())
    }
}
