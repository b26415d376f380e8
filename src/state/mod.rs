//! Application state
//!
//! `State` is the central structure the event loop drives. It owns the
//! session gate, mounts the orchestrator once the gate opens, and turns
//! input lines and worker completions into text for the terminal.

pub mod config;

use crate::backend::{AuthBackend, CallResult, SynthesisBackend};
use crate::catalog::{self, VoiceIdentity, VOICES};
use crate::dispatch::{Dispatcher, Notifier};
use crate::input::{Command, CommandParser, FormStep, LoginForm};
use crate::orchestrator::{Resolution, SubmitOutcome, VoiceOrchestrator};
use crate::player::AudioPlayer;
use crate::render;
use crate::session::{GateEvent, GateSubmit, SessionGate};
use crate::{Result, VoicelabError};
use config::Config;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Which screen is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,
    Main,
}

/// What the terminal should do after an input line or a wake-up
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reaction {
    /// Text to print (may be empty)
    pub output: String,
    /// The user asked to leave
    pub quit: bool,
}

impl Reaction {
    fn say(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            quit: false,
        }
    }

    fn append(&mut self, text: &str) {
        self.output.push_str(text);
        if !text.ends_with('\n') {
            self.output.push('\n');
        }
    }
}

/// Main application state for the client
pub struct State {
    /// Configuration loaded from ~/.voicelab.cfg
    pub config: Config,

    /// Login form outcome and the authenticated flag
    gate: SessionGate,

    /// Collects the login fields line by line
    form: LoginForm,

    /// Per-voice requests; mounted when the gate opens
    orchestrator: Option<VoiceOrchestrator>,

    synthesis: Arc<dyn SynthesisBackend>,

    /// Where relative audio paths are resolved
    origin: String,

    parser: CommandParser,

    /// None when the configured player command is unusable
    player: Option<AudioPlayer>,

    /// Background check of which voices the server has loaded
    voice_check: Dispatcher<CallResult<Vec<String>>>,

    /// Roster voices the server reported as missing
    unavailable: BTreeSet<&'static str>,

    /// Wakes the event loop when a worker finishes
    notifier: Option<Notifier>,
}

impl State {
    /// Create the state with the login view showing
    pub fn new(
        config: Config,
        auth: Arc<dyn AuthBackend>,
        synthesis: Arc<dyn SynthesisBackend>,
    ) -> Self {
        let origin = config.server_origin();
        info!("Voice server at {}", origin);

        let player = match AudioPlayer::new(&config.player_command()) {
            Ok(player) => {
                info!("Playback via {}", player.program());
                Some(player)
            }
            Err(e) => {
                warn!("Playback disabled: {}", e);
                None
            }
        };

        Self {
            config,
            gate: SessionGate::new(auth),
            form: LoginForm::new(),
            orchestrator: None,
            synthesis,
            origin,
            parser: CommandParser::default(),
            player,
            voice_check: Dispatcher::new(),
            unavailable: BTreeSet::new(),
            notifier: None,
        }
    }

    /// Wake the event loop whenever any background call finishes
    pub fn set_notifier(&mut self, notifier: Notifier) {
        self.gate.set_notifier(Arc::clone(&notifier));
        self.voice_check.set_notifier(Arc::clone(&notifier));
        if let Some(orchestrator) = self.orchestrator.as_mut() {
            orchestrator.set_notifier(Arc::clone(&notifier));
        }
        self.notifier = Some(notifier);
    }

    pub fn view(&self) -> View {
        if self.orchestrator.is_some() {
            View::Main
        } else {
            View::Login
        }
    }

    pub fn gate(&self) -> &SessionGate {
        &self.gate
    }

    pub fn orchestrator(&self) -> Option<&VoiceOrchestrator> {
        self.orchestrator.as_ref()
    }

    /// Voices the server said it does not have
    pub fn unavailable_voices(&self) -> &BTreeSet<&'static str> {
        &self.unavailable
    }

    /// Prompt to show before reading the next line
    pub fn prompt(&self) -> &'static str {
        match self.view() {
            View::Main => "voicelab> ",
            View::Login if self.gate.is_pending() => "",
            View::Login => self.form.prompt(),
        }
    }

    /// Should the next line be read without echo?
    pub fn wants_secret_input(&self) -> bool {
        self.view() == View::Login && !self.gate.is_pending() && self.form.is_secret()
    }

    /// Text shown when the client starts
    pub fn greeting(&self) -> String {
        format!(
            "Fantasy VoiceLab {}\nServer: {}\nLog in to continue.\n",
            crate::VERSION,
            self.origin
        )
    }

    /// Handle one line typed by the user
    pub fn handle_line(&mut self, line: &str) -> Result<Reaction> {
        match self.view() {
            View::Login => self.handle_login_line(line),
            View::Main => self.handle_command_line(line),
        }
    }

    fn handle_login_line(&mut self, line: &str) -> Result<Reaction> {
        if self.gate.is_pending() {
            return Ok(Reaction::say("Logging in, please wait\n"));
        }

        match self.form.accept_line(line) {
            FormStep::NeedPassword => Ok(Reaction::default()),
            FormStep::Complete(credentials) => match self.gate.submit(credentials)? {
                GateSubmit::Invalid => {
                    let message = self.gate.error().unwrap_or_default().to_string();
                    Ok(Reaction::say(format!("{}\n", message)))
                }
                GateSubmit::Pending => Ok(Reaction::say("Logging in...\n")),
                GateSubmit::AlreadyPending => Ok(Reaction::say("Logging in, please wait\n")),
                GateSubmit::AlreadyAuthenticated => Ok(Reaction::default()),
            },
        }
    }

    fn handle_command_line(&mut self, line: &str) -> Result<Reaction> {
        let command = match self.parser.parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(Reaction::default()),
            Err(e) => return Ok(Reaction::say(format!("{}\n", e))),
        };
        debug!("Command: {:?}", command);

        match self.run_command(command) {
            Ok(reaction) => Ok(reaction),
            // Mistakes and local failures are shown, not fatal
            Err(VoicelabError::UnknownVoice(voice)) => Ok(Reaction::say(format!(
                "Unknown voice '{}' (use a number 1-{} or an id from 'list')\n",
                voice,
                VOICES.len()
            ))),
            Err(e @ VoicelabError::Playback(_)) | Err(e @ VoicelabError::Clipboard(_)) => {
                Ok(Reaction::say(format!("{}\n", e)))
            }
            Err(e) => Err(e),
        }
    }

    fn run_command(&mut self, command: Command) -> Result<Reaction> {
        match command {
            Command::List => Ok(Reaction::say(self.render_roster())),
            Command::Help => Ok(Reaction::say(render::help_text())),
            Command::Quit => Ok(Reaction {
                output: String::new(),
                quit: true,
            }),
            Command::SetText { voice, text } => {
                let voice = catalog::resolve(&voice)?;
                self.orchestrator_mut()?.set_input_text(voice.id, &text)?;
                Ok(Reaction::say(self.render_card(voice)))
            }
            Command::Generate { voice } => {
                let voice = catalog::resolve(&voice)?;
                self.generate(voice)
            }
            Command::Say { voice, text } => {
                let voice = catalog::resolve(&voice)?;
                if self.is_generating(voice)? {
                    return Ok(Self::still_generating(voice));
                }
                self.orchestrator_mut()?.set_input_text(voice.id, &text)?;
                self.generate(voice)
            }
            Command::Play { voice } => {
                let voice = catalog::resolve(&voice)?;
                self.play(voice)
            }
            Command::Copy { voice } => {
                let voice = catalog::resolve(&voice)?;
                match self.result_of(voice)? {
                    Some(url) => {
                        crate::clipboard::copy_to_clipboard(&url)?;
                        Ok(Reaction::say(format!("Copied {}\n", url)))
                    }
                    None => Ok(Reaction::say(format!(
                        "Nothing to copy for {} yet\n",
                        voice.display_name
                    ))),
                }
            }
            Command::Show { voice } => {
                let voice = catalog::resolve(&voice)?;
                let orchestrator = self.orchestrator_ref()?;
                let state = orchestrator
                    .state(voice.id)
                    .ok_or_else(|| VoicelabError::UnknownVoice(voice.id.to_string()))?;
                Ok(Reaction::say(render::render_details(voice, state)))
            }
        }
    }

    /// Submit a voice unless it is already generating
    ///
    /// The orchestrator itself accepts overlapping submissions; the trigger
    /// is disabled here while a voice is pending.
    fn generate(&mut self, voice: &'static VoiceIdentity) -> Result<Reaction> {
        if self.is_generating(voice)? {
            return Ok(Self::still_generating(voice));
        }

        if let SubmitOutcome::Dispatched { seq } = self.orchestrator_mut()?.submit(voice.id)? {
            debug!("{} dispatched as request {}", voice.id, seq);
        }
        Ok(Reaction::say(self.render_card(voice)))
    }

    fn is_generating(&self, voice: &VoiceIdentity) -> Result<bool> {
        Ok(self
            .orchestrator_ref()?
            .state(voice.id)
            .is_some_and(|s| s.is_pending))
    }

    fn still_generating(voice: &VoiceIdentity) -> Reaction {
        Reaction::say(format!("{} is still generating\n", voice.display_name))
    }

    fn play(&mut self, voice: &'static VoiceIdentity) -> Result<Reaction> {
        let Some(url) = self.result_of(voice)? else {
            return Ok(Reaction::say(format!(
                "Nothing to play for {} yet\n",
                voice.display_name
            )));
        };
        let Some(player) = self.player.as_mut() else {
            return Ok(Reaction::say(format!(
                "Playback is disabled; open {} yourself\n",
                url
            )));
        };
        player.play(voice.id, &url)?;
        Ok(Reaction::say(format!("Playing {}\n", voice.display_name)))
    }

    fn result_of(&self, voice: &VoiceIdentity) -> Result<Option<String>> {
        Ok(self
            .orchestrator_ref()?
            .state(voice.id)
            .and_then(|s| s.result_ref.clone()))
    }

    /// Apply everything background workers have finished
    pub fn pump(&mut self) -> Reaction {
        let mut reaction = Reaction::default();

        match self.gate.poll() {
            Some(GateEvent::Authenticated) => {
                if self.orchestrator.is_none() {
                    self.mount_main();
                    reaction.append("Logged in.\n");
                    reaction.append(&self.render_roster());
                    reaction.append("Type 'help' for commands.\n");
                }
            }
            Some(GateEvent::Failed) => {
                self.form.reset();
                let message = self.gate.error().unwrap_or_default().to_string();
                reaction.append(&message);
            }
            None => {}
        }

        for completion in self.voice_check.drain() {
            match completion.outcome {
                Ok(voices) => self.note_server_voices(&voices),
                Err(e) => warn!("Could not list server voices: {}", e),
            }
        }

        let resolutions = match self.orchestrator.as_mut() {
            Some(orchestrator) => orchestrator.poll(),
            None => Vec::new(),
        };
        for resolution in resolutions {
            if let Resolution::Applied(id) = resolution {
                if let Some(voice) = catalog::find(id) {
                    reaction.append(&self.render_card(voice));
                    self.autoplay(voice);
                }
            }
        }

        if let Some(player) = self.player.as_mut() {
            player.reap();
        }

        reaction
    }

    /// Swap to the main view
    fn mount_main(&mut self) {
        let mut orchestrator = VoiceOrchestrator::new(Arc::clone(&self.synthesis), &self.origin);
        if let Some(notifier) = &self.notifier {
            orchestrator.set_notifier(Arc::clone(notifier));
        }
        self.orchestrator = Some(orchestrator);

        let synthesis = Arc::clone(&self.synthesis);
        if let Err(e) = self
            .voice_check
            .spawn("voices", 1, move || synthesis.available_voices())
        {
            warn!("Skipping server voice check: {}", e);
        }
    }

    fn note_server_voices(&mut self, voices: &[String]) {
        self.unavailable = VOICES
            .iter()
            .filter(|v| !voices.iter().any(|s| s == v.id))
            .map(|v| v.id)
            .collect();
        for id in &self.unavailable {
            warn!("Server has not loaded voice {}", id);
        }
    }

    fn autoplay(&mut self, voice: &'static VoiceIdentity) {
        if !self.config.autoplay() {
            return;
        }
        let url = match self.result_of(voice) {
            Ok(Some(url)) => url,
            _ => return,
        };
        if let Some(player) = self.player.as_mut() {
            if let Err(e) = player.play(voice.id, &url) {
                warn!("Autoplay failed for {}: {}", voice.id, e);
            }
        }
    }

    fn orchestrator_ref(&self) -> Result<&VoiceOrchestrator> {
        self.orchestrator
            .as_ref()
            .ok_or_else(|| VoicelabError::Other("Not logged in".to_string()))
    }

    fn orchestrator_mut(&mut self) -> Result<&mut VoiceOrchestrator> {
        self.orchestrator
            .as_mut()
            .ok_or_else(|| VoicelabError::Other("Not logged in".to_string()))
    }

    fn render_roster(&self) -> String {
        match &self.orchestrator {
            Some(orchestrator) => render::render_roster(orchestrator, &self.unavailable),
            None => String::new(),
        }
    }

    fn render_card(&self, voice: &VoiceIdentity) -> String {
        let Some(orchestrator) = &self.orchestrator else {
            return String::new();
        };
        let index = VOICES.iter().position(|v| v.id == voice.id).unwrap_or(0);
        match orchestrator.state(voice.id) {
            Some(state) => {
                render::render_card(index, voice, state, self.unavailable.contains(voice.id))
            }
            None => String::new(),
        }
    }
}
