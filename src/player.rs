//! Audio playback through an external player
//!
//! Clips are played by handing their URL to a command-line player (ffplay,
//! mpv, ...). Each voice gets at most one running player process: playing a
//! voice again stops its previous clip but leaves other voices alone.

use crate::{Result, VoicelabError};
use log::{debug, error, info};
use std::collections::HashMap;
use std::process::{Child, Command, Stdio};

/// Spawns and tracks player processes
pub struct AudioPlayer {
    /// Program followed by its fixed arguments
    argv: Vec<String>,

    /// Currently running player per voice
    children: HashMap<&'static str, Child>,
}

impl AudioPlayer {
    /// Create a player from a command line such as `mpv --no-video`
    pub fn new(command: &str) -> Result<Self> {
        let argv = split_command(command);
        if argv.is_empty() {
            return Err(VoicelabError::Playback(
                "Player command is empty; set [playback] command in the config".to_string(),
            ));
        }
        debug!("Audio player: {:?}", argv);

        Ok(Self {
            argv,
            children: HashMap::new(),
        })
    }

    /// Program that will be launched
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// Play a clip for a voice, stopping that voice's previous clip
    pub fn play(&mut self, voice: &'static str, url: &str) -> Result<()> {
        self.stop(voice);

        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..]);
        cmd.arg(url);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        match cmd.spawn() {
            Ok(child) => {
                info!("Playing {} for {}", url, voice);
                self.children.insert(voice, child);
                Ok(())
            }
            Err(e) => {
                error!("Failed to spawn {}: {}", self.argv[0], e);
                Err(VoicelabError::Playback(format!(
                    "Failed to start {}: {}",
                    self.argv[0], e
                )))
            }
        }
    }

    /// Stop a voice's clip if one is playing
    pub fn stop(&mut self, voice: &str) {
        if let Some(mut child) = self.children.remove(voice) {
            debug!("Stopping player for {}", voice);
            match child.kill() {
                Ok(_) => {
                    let _ = child.wait(); // Clean up zombie
                }
                Err(e) => {
                    debug!("Failed to kill player process: {}", e);
                }
            }
        }
    }

    /// Forget processes that have finished on their own
    pub fn reap(&mut self) {
        self.children
            .retain(|_, child| matches!(child.try_wait(), Ok(None)));
    }

    /// Number of clips currently playing
    pub fn playing(&mut self) -> usize {
        self.reap();
        self.children.len()
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        let voices: Vec<&'static str> = self.children.keys().copied().collect();
        for voice in voices {
            self.stop(voice);
        }
    }
}

/// Split a command line on whitespace, honouring double quotes
fn split_command(command: &str) -> Vec<String> {
    let mut argv = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut has_token = false;

    for ch in command.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                has_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_token {
                    argv.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        argv.push(current);
    }

    argv
}
