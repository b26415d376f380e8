//! Configuration management

use crate::{Result, VoicelabError};
use ini::Ini;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `server.origin`
pub const SERVER_ENV: &str = "VOICELAB_SERVER";

const DEFAULT_ORIGIN: &str = "http://localhost:5000";
const DEFAULT_PLAYER: &str = "ffplay -nodisp -autoexit -loglevel quiet";

/// Client configuration
///
/// Where the voice server lives and how finished clips get played.
pub struct Config {
    /// INI configuration storage
    ini: Ini,

    /// Config file path (~/.voicelab.cfg)
    path: PathBuf,
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific file, creating it if missing
    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(path)
                .map_err(|e| VoicelabError::IniParse(format!("Failed to load config: {}", e)))?
        } else {
            info!("Config file not found, creating default");
            let default = Self::default_config();
            default
                .write_to_file(path)
                .map_err(|e| VoicelabError::IniParse(format!("Failed to write config: {}", e)))?;
            default
        };

        Ok(Self {
            ini,
            path: path.to_path_buf(),
        })
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        debug!("Saving config to {:?}", self.path);
        self.ini
            .write_to_file(&self.path)
            .map_err(|e| VoicelabError::Config(format!("Failed to save config: {}", e)))
    }

    /// Get config file path (~/.voicelab.cfg)
    fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| VoicelabError::Config("Could not find home directory".to_string()))?;
        Ok(home.join(".voicelab.cfg"))
    }

    /// Expose the config file path for display
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Create default configuration
    fn default_config() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("server"))
            .set("origin", DEFAULT_ORIGIN)
            .set("connect_timeout_ms", "5000");

        ini.with_section(Some("playback"))
            .set("command", DEFAULT_PLAYER)
            .set("autoplay", "true");

        ini
    }

    /// Get a boolean value from config
    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Get a string value from config
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .unwrap_or(default)
            .to_string()
    }

    /// Get an integer value from config
    pub fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Set a value in config
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
    }

    /// Voice server origin, without trailing slash
    ///
    /// `VOICELAB_SERVER` wins over the file when set and non-empty.
    pub fn server_origin(&self) -> String {
        let origin = std::env::var(SERVER_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.get_string("server", "origin", DEFAULT_ORIGIN));
        origin.trim().trim_end_matches('/').to_string()
    }

    /// How long to wait for the server to accept a connection
    pub fn connect_timeout(&self) -> Duration {
        let ms = self.get_int("server", "connect_timeout_ms", 5000);
        Duration::from_millis(ms.clamp(100, 120_000) as u64)
    }

    /// Command line used to play a clip; the URL is appended
    pub fn player_command(&self) -> String {
        self.get_string("playback", "command", DEFAULT_PLAYER)
    }

    /// Play each clip as soon as it arrives?
    pub fn autoplay(&self) -> bool {
        self.get_bool("playback", "autoplay", true)
    }
}
