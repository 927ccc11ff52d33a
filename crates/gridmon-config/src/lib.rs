//! Shared configuration for gridmon frontends.
//!
//! TOML host profiles, RPC password resolution (env + auth file +
//! plaintext), and translation to the engine's `ConnectTarget` and
//! `EngineConfig`. The engine itself never reads files; frontends load
//! a profile here and hand the result to `Monitor::connect`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gridmon_core::EngineConfig;
use gridmon_rpc::channel::{ConnectTarget, GUI_RPC_PORT};

/// File the daemon writes its RPC password to on startup.
pub const AUTH_FILE_NAME: &str = "gui_rpc_auth.cfg";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no host profile named '{profile}'")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when the frontend does not name one.
    pub default_host: Option<String>,

    /// Engine tuning shared by all hosts.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named daemon profiles.
    #[serde(default)]
    pub hosts: HashMap<String, HostProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_host: Some("local".into()),
            defaults: Defaults::default(),
            hosts: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Re-dial automatically after transport failures.
    #[serde(default)]
    pub reconnect_on_error: bool,

    /// Retained messages and notices per log.
    #[serde(default = "default_message_buffer")]
    pub message_buffer: usize,

    /// Bounded wait for commands and forced refreshes, seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout: u64,

    /// Language tag sent to the daemon after connecting.
    pub language: Option<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            reconnect_on_error: false,
            message_buffer: default_message_buffer(),
            command_timeout: default_command_timeout(),
            language: None,
        }
    }
}

fn default_message_buffer() -> usize {
    2000
}
fn default_command_timeout() -> u64 {
    30
}

/// One daemon to connect to.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HostProfile {
    /// Hostname or address; empty means the daemon on this machine.
    #[serde(default)]
    pub host: String,

    /// RPC port; defaults to the daemon's standard port.
    pub port: Option<u16>,

    /// RPC password (plaintext — prefer password_env or the auth file).
    pub password: Option<String>,

    /// Environment variable holding the RPC password.
    pub password_env: Option<String>,

    /// Explicit path to the daemon's RPC auth file.
    pub auth_file: Option<PathBuf>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "gridmon", "gridmon").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("gridmon");
    p
}

// ── Config loading / saving ─────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit path. Environment variables prefixed
/// `GRIDMON_` override file values.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("GRIDMON_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Password resolution ─────────────────────────────────────────────

/// What `Monitor::connect` needs for one daemon.
#[derive(Debug)]
pub struct ResolvedHost {
    pub target: ConnectTarget,
    pub password: SecretString,
    /// `true` when no password was configured anywhere; the daemon may
    /// still accept the connection if it runs without one.
    pub used_default_credential: bool,
}

/// Resolve the RPC password for a profile.
///
/// Chain: profile's `password_env` variable, then the daemon auth file
/// (explicit path, or `gui_rpc_auth.cfg` in the standard data
/// directories for local targets), then plaintext in the profile. An
/// empty result is valid; the engine flags it as the default
/// credential.
pub fn resolve_password(profile: &HostProfile) -> SecretString {
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return SecretString::from(val);
        }
    }

    if let Some(ref path) = profile.auth_file {
        if let Some(pw) = read_auth_file(path) {
            return pw;
        }
    } else if profile_is_local(profile) {
        for dir in local_data_dirs() {
            if let Some(pw) = read_auth_file(&dir.join(AUTH_FILE_NAME)) {
                return pw;
            }
        }
    }

    if let Some(ref pw) = profile.password {
        return SecretString::from(pw.clone());
    }

    SecretString::from(String::new())
}

/// Read a daemon auth file: the password is the first line, trimmed.
pub fn read_auth_file(path: &Path) -> Option<SecretString> {
    let contents = std::fs::read_to_string(path).ok()?;
    let password = contents.lines().next().unwrap_or("").trim();
    if password.is_empty() {
        None
    } else {
        Some(SecretString::from(password.to_owned()))
    }
}

fn profile_is_local(profile: &HostProfile) -> bool {
    ConnectTarget::new(profile.host.trim(), 0).is_local()
}

/// Where a local daemon keeps its data directory.
fn local_data_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from("/var/lib/gridmon")];
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    dirs
}

// ── Translation to engine types ─────────────────────────────────────

/// Build the connect parameters for a named profile.
pub fn resolve_host(config: &Config, name: Option<&str>) -> Result<ResolvedHost, ConfigError> {
    let name = name
        .or_else(|| config.default_host.as_deref())
        .unwrap_or("local");

    // The implicit "local" profile needs no config file at all.
    let default_local = HostProfile::default();
    let profile = match config.hosts.get(name) {
        Some(profile) => profile,
        None if name == "local" => &default_local,
        None => {
            return Err(ConfigError::UnknownProfile {
                profile: name.into(),
            });
        }
    };

    let port = profile.port.unwrap_or(GUI_RPC_PORT);
    if port == 0 {
        return Err(ConfigError::Validation {
            field: "port".into(),
            reason: "port must be non-zero".into(),
        });
    }

    let password = resolve_password(profile);
    let used_default_credential = secrecy::ExposeSecret::expose_secret(&password).is_empty();
    Ok(ResolvedHost {
        target: ConnectTarget::new(profile.host.trim(), port),
        password,
        used_default_credential,
    })
}

/// Engine tuning from the `[defaults]` section; everything not exposed
/// in the file keeps its built-in value.
pub fn engine_config(defaults: &Defaults) -> EngineConfig {
    EngineConfig {
        reconnect_on_error: defaults.reconnect_on_error,
        message_buffer_cap: defaults.message_buffer,
        command_timeout: Duration::from_secs(defaults.command_timeout),
        language: defaults.language.clone(),
        ..EngineConfig::default()
    }
}
