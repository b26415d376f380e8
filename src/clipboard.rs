//! Clipboard integration

use crate::{Result, VoicelabError};
use arboard::Clipboard;
use log::debug;

/// Copy text to system clipboard
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    debug!("Copying {} chars to clipboard", text.len());

    let mut clipboard = Clipboard::new()
        .map_err(|e| VoicelabError::Clipboard(format!("Failed to open clipboard: {}", e)))?;

    clipboard
        .set_text(text)
        .map_err(|e| VoicelabError::Clipboard(format!("Failed to copy to clipboard: {}", e)))
}
