//! Terminal utilities

use crate::Result;
use log::debug;
use nix::sys::termios::{self, LocalFlags, SetArg, Termios};
use std::io::{self, IsTerminal};
use std::os::fd::AsFd;

/// Is stdin attached to a terminal?
pub fn stdin_is_tty() -> bool {
    io::stdin().is_terminal()
}

/// Turns off input echo while alive
///
/// Used while the password field is being typed. Restores the original
/// terminal attributes on drop, even on early return.
pub struct EchoGuard {
    original: Termios,
}

impl EchoGuard {
    /// Disable echo on stdin
    pub fn new() -> Result<Self> {
        let stdin = io::stdin();
        let original = termios::tcgetattr(stdin.as_fd())?;

        let mut silent = original.clone();
        silent.local_flags.remove(LocalFlags::ECHO);
        // Keep the newline visible so the cursor moves on after Enter
        silent.local_flags.insert(LocalFlags::ECHONL);
        termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &silent)?;

        debug!("Terminal echo disabled");
        Ok(Self { original })
    }
}

impl Drop for EchoGuard {
    fn drop(&mut self) {
        if let Err(e) = termios::tcsetattr(io::stdin().as_fd(), SetArg::TCSANOW, &self.original) {
            debug!("Failed to restore terminal echo: {}", e);
        } else {
            debug!("Terminal echo restored");
        }
    }
}
