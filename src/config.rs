//! Configuration loading and types for sotto
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/sotto/config.toml)
//! 3. Environment variables (SOTTO_*)
//! 4. CLI arguments (highest priority)

use crate::bench::BenchThresholds;
use crate::budget::{BudgetGuard, Pricing};
use crate::error::SottoError;
use crate::lexicon::LexiconEntry;
use crate::profile::StyleProfile;
use crate::snippet::Snippet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Sotto Configuration
#
# Location: ~/.config/sotto/config.toml
# All settings can be overridden via CLI flags

# State file for external integrations (status bars, scripts).
# Use "auto" for default location ($XDG_RUNTIME_DIR/sotto/state),
# a custom path, or "disabled" to turn off. The daemon writes state
# ("idle", "recording", "transcribing") to this file whenever it changes.
state_file = "auto"

[capture]
# External recorder command. It is spawned when recording starts, receives
# the output WAV path as its final argument, and is terminated when the
# hotkey is released. whisper expects 16kHz mono.
# Examples:
#   command = "pw-record", args = ["--rate", "16000", "--channels", "1"]
#   command = "arecord",   args = ["-f", "S16_LE", "-r", "16000", "-c", "1"]
command = "pw-record"
args = ["--rate", "16000", "--channels", "1"]

[transcription]
# whisper.cpp CLI binary, resolved through PATH when not an absolute path
cli = "whisper-cli"

# Path to the GGML model file
model = "~/.local/share/sotto/models/ggml-base.en.bin"

# Language hints, first match wins ("en-US" and "en" both select English;
# leave empty for auto-detection)
language_hints = ["en-US"]

# Extra arguments appended to every whisper-cli invocation
# extra_args = ["-t", "4"]

[cleanup]
# Cleanup backend: "rules" (fully offline), "remote" (self-hosted cleanup
# endpoint) or "openai" (Chat Completions). The rule-based engine always
# remains available as the offline fallback.
backend = "rules"

# Remote/OpenAI settings; endpoint must be HTTPS. The API key is read from
# api_key, falling back to the api_key_env environment variable.
# endpoint = "https://cleanup.example.com/v1/clean"
# api_key = ""
api_key_env = "OPENAI_API_KEY"
premium_model = "gpt-5-mini"
economical_model = "gpt-5-nano"
timeout_secs = 30

[budget]
# Monthly cloud spend control. Crossing the soft cap degrades cleanup to the
# economical model; the hard cap disables cloud cleanup entirely until the
# month rolls over.
soft_cap_usd = 6.5
hard_cap_usd = 8.0
premium_per_1k_tokens_usd = 0.005
economical_per_1k_tokens_usd = 0.0012
# storage_file = "auto"

[insert]
# Typing command; the cleaned text is passed as the final argument.
# Example: command = "ydotool", args = ["type", "--"]
# Leave unset to deliver through the clipboard only.
# typer_command = "ydotool"
# typer_args = ["type", "--"]

# Clipboard command; text is piped to stdin
clipboard_command = "wl-copy"
clipboard_args = []

# Applications that should always receive text via clipboard first,
# in addition to the built-in terminal list
clipboard_first_apps = []

[history]
# Transcript history persistence ("disabled" turns history off)
# file = "auto"
max_entries = 500

# [profile.global]
# tone = "natural"             # natural | professional | concise
# structure_mode = "paragraph" # natural | paragraph | bullets | email | command
# filler_policy = "balanced"   # keep | balanced | aggressive
# command_policy = "transform" # transform | passthrough

# Per-application profile overrides, keyed by bundle identifier
# [profile.per_app."com.apple.mail"]
# structure_mode = "email"

# Term corrections applied after filler removal
# [[lexicon]]
# term = "kubernetes"
# preferred = "Kubernetes"

# Spoken triggers expanded verbatim before cleanup
# [[snippets]]
# trigger = "my email"
# expansion = "dev@example.com"

[bench]
# Regression gates for `sotto bench validate`
max_wer_delta = 0.0
max_cer_delta = 0.0
max_regressed_samples = 0
"#;

/// Transcript cleanup backend selection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CleanupBackend {
    /// Offline rule-based candidates plus local ranking (default)
    #[default]
    Rules,
    /// Self-hosted cleanup endpoint
    Remote,
    /// OpenAI Chat Completions
    Openai,
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub insert: InsertConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub lexicon: Vec<LexiconEntry>,
    #[serde(default)]
    pub snippets: Vec<Snippet>,
    #[serde(default)]
    pub bench: BenchThresholds,

    /// Optional path to state file for external integrations.
    /// "auto" resolves to $XDG_RUNTIME_DIR/sotto/state; "disabled" turns
    /// the file off.
    #[serde(default = "default_auto")]
    pub state_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            transcription: TranscriptionConfig::default(),
            cleanup: CleanupConfig::default(),
            budget: BudgetConfig::default(),
            insert: InsertConfig::default(),
            history: HistoryConfig::default(),
            profile: ProfileConfig::default(),
            lexicon: vec![],
            snippets: vec![],
            bench: BenchThresholds::default(),
            state_file: default_auto(),
        }
    }
}

/// Audio capture configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    /// External recorder command; receives the output WAV path as its final
    /// argument. None means capture is not configured on this machine.
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            command: Some("pw-record".to_string()),
            args: vec![
                "--rate".to_string(),
                "16000".to_string(),
                "--channels".to_string(),
                "1".to_string(),
            ],
        }
    }
}

/// whisper-cli transcription configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptionConfig {
    /// Binary name or absolute path
    #[serde(default = "default_whisper_cli")]
    pub cli: String,

    /// Path to the GGML model file
    pub model: String,

    /// BCP-47 language hints, first match wins; empty for auto-detection
    #[serde(default)]
    pub language_hints: Vec<String>,

    /// Extra arguments appended to every invocation
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            cli: default_whisper_cli(),
            model: "~/.local/share/sotto/models/ggml-base.en.bin".to_string(),
            language_hints: vec!["en-US".to_string()],
            extra_args: vec![],
        }
    }
}

/// Transcript cleanup configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CleanupConfig {
    #[serde(default)]
    pub backend: CleanupBackend,

    /// Remote cleanup endpoint; must be HTTPS. Ignored for the rules backend
    /// and defaulted to the OpenAI endpoint for the openai backend.
    pub endpoint: Option<String>,

    /// API key; when unset the environment variable named by `api_key_env`
    /// is consulted
    pub api_key: Option<String>,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_premium_model")]
    pub premium_model: String,

    #[serde(default = "default_economical_model")]
    pub economical_model: String,

    #[serde(default = "default_cleanup_timeout_secs")]
    pub timeout_secs: u64,
}

impl CleanupConfig {
    /// Configured key, falling back to the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok().filter(|key| !key.is_empty()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            backend: CleanupBackend::Rules,
            endpoint: None,
            api_key: None,
            api_key_env: default_api_key_env(),
            premium_model: default_premium_model(),
            economical_model: default_economical_model(),
            timeout_secs: default_cleanup_timeout_secs(),
        }
    }
}

/// Monthly cloud budget configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BudgetConfig {
    #[serde(default = "default_soft_cap")]
    pub soft_cap_usd: f64,

    #[serde(default = "default_hard_cap")]
    pub hard_cap_usd: f64,

    #[serde(default = "default_premium_rate")]
    pub premium_per_1k_tokens_usd: f64,

    #[serde(default = "default_economical_rate")]
    pub economical_per_1k_tokens_usd: f64,

    /// Spend ledger location: "auto", "disabled", or an explicit path
    #[serde(default = "default_auto")]
    pub storage_file: Option<String>,
}

impl BudgetConfig {
    pub fn pricing(&self) -> Pricing {
        Pricing {
            premium_per_1k_tokens_usd: self.premium_per_1k_tokens_usd,
            economical_per_1k_tokens_usd: self.economical_per_1k_tokens_usd,
        }
    }

    pub fn build_guard(&self) -> BudgetGuard {
        BudgetGuard::new(
            self.pricing(),
            self.soft_cap_usd,
            self.hard_cap_usd,
            0.0,
            resolve_optional_path(self.storage_file.as_deref(), || {
                Config::data_dir().join("budget.json")
            }),
        )
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            soft_cap_usd: default_soft_cap(),
            hard_cap_usd: default_hard_cap(),
            premium_per_1k_tokens_usd: default_premium_rate(),
            economical_per_1k_tokens_usd: default_economical_rate(),
            storage_file: default_auto(),
        }
    }
}

/// Text insertion configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InsertConfig {
    /// Typing command; the text is passed as the final argument.
    /// None delivers through the clipboard only.
    pub typer_command: Option<String>,

    #[serde(default)]
    pub typer_args: Vec<String>,

    #[serde(default = "default_clipboard_command")]
    pub clipboard_command: String,

    #[serde(default)]
    pub clipboard_args: Vec<String>,

    /// Bundle identifiers that should receive text via clipboard first,
    /// in addition to the built-in terminal list
    #[serde(default)]
    pub clipboard_first_apps: Vec<String>,
}

impl Default for InsertConfig {
    fn default() -> Self {
        Self {
            typer_command: None,
            typer_args: vec![],
            clipboard_command: default_clipboard_command(),
            clipboard_args: vec![],
            clipboard_first_apps: vec![],
        }
    }
}

/// Transcript history configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryConfig {
    /// Persistence location: "auto", "disabled", or an explicit path
    #[serde(default = "default_auto")]
    pub file: Option<String>,

    #[serde(default = "default_history_max")]
    pub max_entries: usize,
}

impl HistoryConfig {
    pub fn resolve_file(&self) -> Option<PathBuf> {
        resolve_optional_path(self.file.as_deref(), || {
            Config::data_dir().join("history.json")
        })
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            file: default_auto(),
            max_entries: default_history_max(),
        }
    }
}

/// Style profile configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProfileConfig {
    #[serde(default)]
    pub global: StyleProfile,

    /// Overrides keyed by bundle identifier
    #[serde(default)]
    pub per_app: HashMap<String, StyleProfile>,
}

fn default_auto() -> Option<String> {
    Some("auto".to_string())
}

fn default_whisper_cli() -> String {
    "whisper-cli".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_premium_model() -> String {
    "gpt-5-mini".to_string()
}

fn default_economical_model() -> String {
    "gpt-5-nano".to_string()
}

fn default_cleanup_timeout_secs() -> u64 {
    30
}

fn default_soft_cap() -> f64 {
    BudgetGuard::DEFAULT_SOFT_THRESHOLD_USD
}

fn default_hard_cap() -> f64 {
    BudgetGuard::DEFAULT_HARD_THRESHOLD_USD
}

fn default_premium_rate() -> f64 {
    Pricing::default().premium_per_1k_tokens_usd
}

fn default_economical_rate() -> f64 {
    Pricing::default().economical_per_1k_tokens_usd
}

fn default_clipboard_command() -> String {
    "wl-copy".to_string()
}

fn default_history_max() -> usize {
    crate::history::DEFAULT_MAX_ENTRIES
}

/// Resolves an "auto"/"disabled"/path setting against a default location.
fn resolve_optional_path(setting: Option<&str>, auto: impl FnOnce() -> PathBuf) -> Option<PathBuf> {
    match setting.map(|s| s.to_lowercase()) {
        None => None,
        Some(value) => match value.as_str() {
            "disabled" | "none" | "off" | "false" => None,
            "auto" => Some(auto()),
            _ => Some(PathBuf::from(setting.unwrap_or_default())),
        },
    }
}

/// Expands a leading `~/` against $HOME.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "sotto")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the runtime directory for ephemeral files (state files)
    pub fn runtime_dir() -> PathBuf {
        std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
            .join("sotto")
    }

    /// Get the data directory path (history, budget ledger, models)
    pub fn data_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "sotto")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "sotto")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Resolve the state file path from config.
    /// Returns None if state_file is not configured or explicitly disabled.
    pub fn resolve_state_file(&self) -> Option<PathBuf> {
        resolve_optional_path(self.state_file.as_deref(), || {
            Self::runtime_dir().join("state")
        })
    }

    /// Ensure config and data directories exist
    pub fn ensure_directories() -> std::io::Result<()> {
        if let Some(config_dir) = Self::config_dir() {
            std::fs::create_dir_all(&config_dir)?;
            tracing::debug!("Ensured config directory exists: {:?}", config_dir);
        }
        let data_dir = Self::data_dir();
        std::fs::create_dir_all(&data_dir)?;
        tracing::debug!("Ensured data directory exists: {:?}", data_dir);
        Ok(())
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, SottoError> {
    let mut config = Config::default();

    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| SottoError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| SottoError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    // Override from environment variables
    if let Ok(model) = std::env::var("SOTTO_MODEL") {
        config.transcription.model = model;
    }
    if let Ok(cli) = std::env::var("SOTTO_WHISPER_CLI") {
        config.transcription.cli = cli;
    }
    if let Ok(backend) = std::env::var("SOTTO_CLEANUP_BACKEND") {
        config.cleanup.backend = match backend.to_lowercase().as_str() {
            "remote" => CleanupBackend::Remote,
            "openai" => CleanupBackend::Openai,
            _ => CleanupBackend::Rules,
        };
    }

    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &Config, path: &Path) -> Result<(), SottoError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| SottoError::Config(format!("Failed to create config dir: {}", e)))?;
    }

    let contents = toml::to_string_pretty(config)
        .map_err(|e| SottoError::Config(format!("Failed to serialize config: {}", e)))?;

    std::fs::write(path, contents)
        .map_err(|e| SottoError::Config(format!("Failed to write config: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{CommandPolicy, StructureMode};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.capture.command.as_deref(), Some("pw-record"));
        assert_eq!(config.transcription.cli, "whisper-cli");
        assert_eq!(config.cleanup.backend, CleanupBackend::Rules);
        assert_eq!(config.budget.soft_cap_usd, 6.5);
        assert_eq!(config.budget.hard_cap_usd, 8.0);
        assert_eq!(config.insert.clipboard_command, "wl-copy");
        assert_eq!(config.history.max_entries, 500);
        assert_eq!(config.state_file.as_deref(), Some("auto"));
    }

    #[test]
    fn test_default_config_string_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.cleanup.backend, CleanupBackend::Rules);
        assert_eq!(config.transcription.language_hints, vec!["en-US"]);
        assert_eq!(config.bench.max_regressed_samples, 0);
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
            state_file = "disabled"

            [capture]
            command = "arecord"
            args = ["-r", "16000"]

            [transcription]
            model = "/models/ggml-small.en.bin"
            language_hints = []

            [cleanup]
            backend = "openai"
            api_key = "sk-test"

            [profile.global]
            structure_mode = "bullets"

            [profile.per_app."com.example.ide"]
            name = "IDE"
            command_policy = "passthrough"

            [[lexicon]]
            term = "kubernetes"
            preferred = "Kubernetes"

            [[snippets]]
            trigger = "my email"
            expansion = "dev@example.com"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.resolve_state_file(), None);
        assert_eq!(config.capture.command.as_deref(), Some("arecord"));
        assert_eq!(config.cleanup.backend, CleanupBackend::Openai);
        assert_eq!(config.cleanup.resolve_api_key().as_deref(), Some("sk-test"));
        assert_eq!(config.profile.global.structure_mode, StructureMode::Bullets);
        assert_eq!(
            config.profile.per_app["com.example.ide"].command_policy,
            CommandPolicy::Passthrough
        );
        assert_eq!(config.lexicon[0].preferred, "Kubernetes");
        assert_eq!(config.snippets[0].expansion, "dev@example.com");
    }

    #[test]
    fn test_resolve_optional_path() {
        let auto = || PathBuf::from("/data/history.json");
        assert_eq!(resolve_optional_path(None, auto), None);
        assert_eq!(resolve_optional_path(Some("disabled"), auto), None);
        assert_eq!(
            resolve_optional_path(Some("auto"), auto),
            Some(PathBuf::from("/data/history.json"))
        );
        assert_eq!(
            resolve_optional_path(Some("/tmp/h.json"), auto),
            Some(PathBuf::from("/tmp/h.json"))
        );
    }

    #[test]
    fn test_expand_tilde() {
        std::env::set_var("HOME", "/home/tester");
        assert_eq!(
            expand_tilde("~/models/ggml.bin"),
            PathBuf::from("/home/tester/models/ggml.bin")
        );
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.cleanup.backend = CleanupBackend::Remote;
        config.cleanup.endpoint = Some("https://cleanup.example.com/v1/clean".to_string());
        save_config(&config, &path).unwrap();

        let reloaded = load_config(Some(&path)).unwrap();
        assert_eq!(reloaded.cleanup.backend, CleanupBackend::Remote);
        assert_eq!(
            reloaded.cleanup.endpoint.as_deref(),
            Some("https://cleanup.example.com/v1/clean")
        );
    }
}
