//! Main-view commands

use std::collections::HashMap;
use thiserror::Error;

/// Action identifier for command words
///
/// Each variant is one thing the user can do from the main view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    List,
    SetText,
    Generate,
    Say,
    Play,
    Copy,
    Show,
    Help,
    Quit,
}

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    /// Replace a voice's input text
    SetText { voice: String, text: String },
    /// Submit a voice's current text
    Generate { voice: String },
    /// Set text and submit in one go
    Say { voice: String, text: String },
    Play { voice: String },
    Copy { voice: String },
    Show { voice: String },
    Help,
    Quit,
}

/// Why a line did not parse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown command '{0}' (type 'help')")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// Create the default command table
pub fn create_default_commands() -> HashMap<&'static str, CommandAction> {
    let mut map = HashMap::new();

    map.insert("list", CommandAction::List);
    map.insert("ls", CommandAction::List);

    map.insert("text", CommandAction::SetText);
    map.insert("t", CommandAction::SetText);

    map.insert("gen", CommandAction::Generate);
    map.insert("generate", CommandAction::Generate);
    map.insert("g", CommandAction::Generate);

    map.insert("say", CommandAction::Say);

    map.insert("play", CommandAction::Play);
    map.insert("p", CommandAction::Play);

    map.insert("copy", CommandAction::Copy);
    map.insert("show", CommandAction::Show);

    map.insert("help", CommandAction::Help);
    map.insert("?", CommandAction::Help);

    map.insert("quit", CommandAction::Quit);
    map.insert("exit", CommandAction::Quit);
    map.insert("q", CommandAction::Quit);

    map
}

/// One-line usage per action, for `help`
pub fn usage(action: CommandAction) -> &'static str {
    match action {
        CommandAction::List => "list",
        CommandAction::SetText => "text <voice> <text...>",
        CommandAction::Generate => "gen <voice>",
        CommandAction::Say => "say <voice> <text...>",
        CommandAction::Play => "play <voice>",
        CommandAction::Copy => "copy <voice>",
        CommandAction::Show => "show <voice>",
        CommandAction::Help => "help",
        CommandAction::Quit => "quit",
    }
}

/// Turns lines into commands using a command table
pub struct CommandParser {
    commands: HashMap<&'static str, CommandAction>,
}

impl CommandParser {
    pub fn new(commands: HashMap<&'static str, CommandAction>) -> Self {
        Self { commands }
    }

    /// Number of command words known
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Parse one line; blank lines give `Ok(None)`
    ///
    /// A voice is the first argument. Everything after it, internal spacing
    /// included, is the text.
    pub fn parse(&self, line: &str) -> Result<Option<Command>, ParseError> {
        let line = line.trim_start();
        let (word, rest) = split_word(line);
        if word.is_empty() {
            return Ok(None);
        }

        let action = *self
            .commands
            .get(word.to_lowercase().as_str())
            .ok_or_else(|| ParseError::Unknown(word.to_string()))?;

        let (voice, text) = split_word(rest.trim_start());
        let voice = voice.to_string();
        let text = text.trim_start().trim_end_matches(['\r', '\n']).to_string();

        let needs_voice = || {
            if voice.is_empty() {
                Err(ParseError::Usage(usage(action)))
            } else {
                Ok(voice.clone())
            }
        };

        let command = match action {
            CommandAction::List => Command::List,
            CommandAction::Help => Command::Help,
            CommandAction::Quit => Command::Quit,
            CommandAction::SetText => Command::SetText {
                voice: needs_voice()?,
                text,
            },
            CommandAction::Say => Command::Say {
                voice: needs_voice()?,
                text,
            },
            CommandAction::Generate => Command::Generate {
                voice: needs_voice()?,
            },
            CommandAction::Play => Command::Play {
                voice: needs_voice()?,
            },
            CommandAction::Copy => Command::Copy {
                voice: needs_voice()?,
            },
            CommandAction::Show => Command::Show {
                voice: needs_voice()?,
            },
        };

        Ok(Some(command))
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new(create_default_commands())
    }
}

/// Split off the first whitespace-delimited word
fn split_word(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], &s[idx..]),
        None => (s, ""),
    }
}
