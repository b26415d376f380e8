//! Line assembly for stdin bytes

use log::debug;

/// Collects bytes until complete lines are available
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    /// Create a new empty line buffer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Add bytes and return every line they complete, without terminators
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }

        if !lines.is_empty() {
            debug!("LineBuffer: {} line(s) complete", lines.len());
        }
        lines
    }

    /// Take whatever is left (used at end of input)
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
