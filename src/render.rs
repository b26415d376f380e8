//! Text rendering of the roster
//!
//! Each voice is drawn as a small card: a header with its roster number,
//! name and id, then its input text and whatever the last request left
//! behind (pending marker, error, or audio URL).

use crate::catalog::VoiceIdentity;
use crate::input::command::{create_default_commands, usage, CommandAction};
use crate::orchestrator::{RequestState, VoiceOrchestrator};
use std::collections::BTreeSet;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Column the voice id starts at in card headers
const NAME_COLUMN_WIDTH: usize = 44;

/// Longest input text shown on a card before eliding
const TEXT_PREVIEW_WIDTH: usize = 60;

/// Cut `s` to at most `width` display columns, marking the cut with `…`
pub fn truncate_to_width(s: &str, width: usize) -> String {
    if s.width() <= width {
        return s.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

/// Pad `s` with spaces to `width` display columns
pub fn pad_to_width(s: &str, width: usize) -> String {
    let current = s.width();
    if current >= width {
        return s.to_string();
    }
    format!("{}{}", s, " ".repeat(width - current))
}

/// One line summarising where a request stands
pub fn status_line(state: &RequestState) -> String {
    if state.is_pending {
        "Generating...".to_string()
    } else if let Some(error) = &state.last_error {
        format!("error: {}", error)
    } else if let Some(url) = &state.result_ref {
        format!("audio: {}", url)
    } else {
        "ready".to_string()
    }
}

/// Draw one voice card
pub fn render_card(
    index: usize,
    voice: &VoiceIdentity,
    state: &RequestState,
    unavailable: bool,
) -> String {
    let label = format!("[{}] {}", index + 1, voice.display_name);
    let mut header = format!(
        "{}{}",
        pad_to_width(&truncate_to_width(&label, NAME_COLUMN_WIDTH), NAME_COLUMN_WIDTH + 1),
        voice.id
    );
    if unavailable {
        header.push_str("  (not loaded on server)");
    }

    let text = if state.input_text.is_empty() {
        "-".to_string()
    } else {
        format!("\"{}\"", truncate_to_width(&state.input_text, TEXT_PREVIEW_WIDTH))
    };

    format!(
        "{}\n    text: {}\n    {}\n",
        header,
        text,
        status_line(state)
    )
}

/// Draw every card in roster order
pub fn render_roster(orchestrator: &VoiceOrchestrator, unavailable: &BTreeSet<&str>) -> String {
    orchestrator
        .states()
        .enumerate()
        .map(|(idx, (voice, state))| render_card(idx, voice, state, unavailable.contains(voice.id)))
        .collect()
}

/// Everything known about one voice
pub fn render_details(voice: &VoiceIdentity, state: &RequestState) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} ({})\n", voice.display_name, voice.id));
    out.push_str(&format!("  image:   {}\n", voice.image_ref));
    out.push_str(&format!("  text:    {}\n", state.input_text));
    out.push_str(&format!("  pending: {}\n", state.is_pending));
    if let Some(error) = &state.last_error {
        out.push_str(&format!("  error:   {}\n", error));
    }
    if let Some(url) = &state.result_ref {
        out.push_str(&format!("  audio:   {}\n", url));
    }
    out
}

/// Command summary
pub fn help_text() -> String {
    let commands = create_default_commands();
    let actions = [
        CommandAction::List,
        CommandAction::SetText,
        CommandAction::Generate,
        CommandAction::Say,
        CommandAction::Play,
        CommandAction::Copy,
        CommandAction::Show,
        CommandAction::Help,
        CommandAction::Quit,
    ];

    let mut out = String::from("Commands (<voice> is a roster number or id):\n");
    for action in actions {
        let mut words: Vec<&str> = commands
            .iter()
            .filter(|(_, a)| **a == action)
            .map(|(w, _)| *w)
            .collect();
        words.sort_by_key(|w| std::cmp::Reverse(w.len()));
        out.push_str(&format!(
            "  {}{}\n",
            pad_to_width(usage(action), 28),
            words.join(", ")
        ));
    }
    out
}
