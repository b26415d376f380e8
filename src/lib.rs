//! VoiceLab - terminal client for a character voice synthesis server
//!
//! Logs in against the server, then lets the user type a line of text for
//! any voice in the roster and have it spoken back. Every voice keeps its
//! own request record, so several voices can be generating at once.

pub mod backend;
pub mod catalog;
pub mod clipboard;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod orchestrator;
pub mod player;
pub mod render;
pub mod session;
pub mod state;
pub mod terminal;

pub use error::{Result, VoicelabError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "voicelab";
