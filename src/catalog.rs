//! Voice catalog
//!
//! The fixed roster of voices the client can generate speech for. The ids
//! are the keys the synthesis server knows the reference speakers by.

use crate::{Result, VoicelabError};

/// One entry in the roster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceIdentity {
    /// Stable key sent to the server as `voice`
    pub id: &'static str,
    /// Name shown on the card
    pub display_name: &'static str,
    /// Card artwork, relative to the asset directory
    pub image_ref: &'static str,
}

/// Every voice, in display order
pub const VOICES: &[VoiceIdentity] = &[
    VoiceIdentity {
        id: "peter_griffin",
        display_name: "Peter Griffin from Family Guy",
        image_ref: "assets/peter_griffin.png",
    },
    VoiceIdentity {
        id: "walter_white",
        display_name: "Walter White from Breaking Bad",
        image_ref: "assets/walter_white.png",
    },
    VoiceIdentity {
        id: "daenerys_targaryaen",
        display_name: "Daenerys Targaryen from Game of Thrones",
        image_ref: "assets/daenerys_targaryaen.png",
    },
    VoiceIdentity {
        id: "tony_soprano",
        display_name: "Tony Soprano from The Sopranos",
        image_ref: "assets/tony_soprano.png",
    },
    VoiceIdentity {
        id: "patrick_bateman",
        display_name: "Patrick Bateman from American Psycho",
        image_ref: "assets/patrick_bateman.png",
    },
    VoiceIdentity {
        id: "lois_griffin",
        display_name: "Lois Griffin from Family Guy",
        image_ref: "assets/lois_griffin.png",
    },
    VoiceIdentity {
        id: "arthur_morgan",
        display_name: "Arthur Morgan from Red Dead Redemption II",
        image_ref: "assets/arthur_morgan.png",
    },
    VoiceIdentity {
        id: "rachel_green",
        display_name: "Rachel Green from Friends",
        image_ref: "assets/rachel_green.png",
    },
    VoiceIdentity {
        id: "tyler_durden",
        display_name: "Tyler Durden from **** ****",
        image_ref: "assets/tyler_durden.png",
    },
];

/// Look up a voice by its stable id
pub fn find(id: &str) -> Option<&'static VoiceIdentity> {
    VOICES.iter().find(|v| v.id == id)
}

/// Resolve what the user typed to a voice
///
/// Accepts either the 1-based position on the roster or the id itself.
pub fn resolve(selector: &str) -> Result<&'static VoiceIdentity> {
    let selector = selector.trim();

    if let Ok(n) = selector.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|idx| VOICES.get(idx))
            .ok_or_else(|| VoicelabError::UnknownVoice(selector.to_string()));
    }

    let lower = selector.to_lowercase();
    find(&lower).ok_or_else(|| VoicelabError::UnknownVoice(selector.to_string()))
}
