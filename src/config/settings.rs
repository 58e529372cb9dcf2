use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::replay::ReconciliationPolicy;
use crate::snapshot::{EncodeOptions, ScrubConfig};
use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Shell used to run each command line
    pub shell: String,
    /// Per-command timeout in milliseconds (0 = none)
    pub timeout_ms: u64,
    /// Working directory for dispatched commands
    pub working_dir: PathBuf,
    /// Persist timestamps in snapshot documents
    pub include_timing: bool,
    /// Scrub every snapshot written in this session
    pub shareable: bool,
    /// Patterns redacted on top of the built-in ones
    pub extra_redact_patterns: Vec<String>,
    /// Compare text results with trailing whitespace trimmed
    pub trim_text: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            timeout_ms: 30_000,
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            include_timing: false,
            shareable: false,
            extra_redact_patterns: Vec::new(),
            trim_text: false,
        }
    }
}

fn default_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "/bin/sh".to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlDispatchConfig {
    pub shell: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlSnapshotConfig {
    pub include_timing: Option<bool>,
    pub shareable: Option<bool>,
    pub extra_redact_patterns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlReplayConfig {
    pub trim_text: Option<bool>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Command execution
    pub dispatch: Option<TomlDispatchConfig>,
    /// Snapshot writing
    pub snapshot: Option<TomlSnapshotConfig>,
    /// Replay reconciliation
    pub replay: Option<TomlReplayConfig>,
}

impl Config {
    /// Load configuration from the data dir, merging with defaults
    pub fn load() -> Self {
        let config_file = config_path();

        // Create example config on first run
        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        Self::load_from(&config_file)
    }

    /// Load configuration from `path`, merging with defaults.
    ///
    /// A missing or unparsable file leaves the defaults in place.
    pub fn load_from(path: &Path) -> Self {
        let mut config = Config::default();

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "No config file loaded");
                return config;
            }
        };

        match toml::from_str::<TomlConfig>(&contents) {
            Ok(toml_config) => config.merge(toml_config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid config file");
            }
        }

        config
    }

    fn merge(&mut self, toml_config: TomlConfig) {
        if let Some(dispatch) = toml_config.dispatch {
            if let Some(shell) = dispatch.shell.filter(|s| !s.trim().is_empty()) {
                self.shell = shell;
            }
            if let Some(timeout_ms) = dispatch.timeout_ms {
                self.timeout_ms = timeout_ms;
            }
        }

        if let Some(snapshot) = toml_config.snapshot {
            if let Some(include_timing) = snapshot.include_timing {
                self.include_timing = include_timing;
            }
            if let Some(shareable) = snapshot.shareable {
                self.shareable = shareable;
            }
            if let Some(patterns) = snapshot.extra_redact_patterns {
                self.extra_redact_patterns = patterns;
            }
        }

        if let Some(replay) = toml_config.replay {
            if let Some(trim_text) = replay.trim_text {
                self.trim_text = trim_text;
            }
        }
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &PathBuf) {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    tracing::warn!(error = %e, "Failed to create config directory");
                    return;
                }
            }
        }

        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            tracing::warn!(error = %e, "Failed to write default config");
        }
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn dispatch_timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            include_timing: self.include_timing,
        }
    }

    pub fn reconciliation_policy(&self) -> ReconciliationPolicy {
        ReconciliationPolicy::new().with_trim_text(self.trim_text)
    }

    /// Scrubber for shareable snapshots, built-in patterns plus configured ones
    pub fn scrub_config(&self) -> Result<ScrubConfig, regex::Error> {
        ScrubConfig::with_extra_patterns(&self.extra_redact_patterns)
    }
}
