use std::{
    fs, io,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use latchkey_core::constants::DEFAULT_OPEN_SECONDS;
use serde::Deserialize;
use tracing::warn;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_VAR: &str = "LATCHKEY_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "latchkey.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub database_path: String,
    /// Remote peer; without one the access point runs standalone.
    pub remote_addr: Option<SocketAddr>,
    pub open_cycle_seconds: i64,
    pub confirmation_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: "latchkey.db".into(),
            remote_addr: None,
            open_cycle_seconds: DEFAULT_OPEN_SECONDS,
            confirmation_timeout_secs: 15,
        }
    }
}

impl Settings {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Read `path` (defaults when it does not exist) and apply the process
/// environment on top.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let settings = read_file(path)?;
    Ok(apply_env(settings, |key| std::env::var(key).ok()))
}

fn read_file(path: &Path) -> anyhow::Result<Settings> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Settings::default()),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read '{}'", path.display()));
        }
    };

    toml::from_str(&raw).with_context(|| format!("invalid configuration in '{}'", path.display()))
}

/// Apply `LATCHKEY__*` overrides. Values that do not parse are logged and
/// ignored.
fn apply_env(mut settings: Settings, var: impl Fn(&str) -> Option<String>) -> Settings {
    if let Some(v) = var("LATCHKEY__DATABASE_PATH") {
        settings.database_path = v;
    }

    if let Some(v) = var("LATCHKEY__REMOTE_ADDR") {
        if v.trim().is_empty() {
            settings.remote_addr = None;
        } else {
            match v.trim().parse() {
                Ok(addr) => settings.remote_addr = Some(addr),
                Err(_) => warn!(value = %v, "ignoring invalid LATCHKEY__REMOTE_ADDR"),
            }
        }
    }

    if let Some(v) = var("LATCHKEY__OPEN_CYCLE_SECONDS") {
        match v.trim().parse() {
            Ok(seconds) => settings.open_cycle_seconds = seconds,
            Err(_) => warn!(value = %v, "ignoring invalid LATCHKEY__OPEN_CYCLE_SECONDS"),
        }
    }

    if let Some(v) = var("LATCHKEY__CONFIRMATION_TIMEOUT_SECS") {
        match v.trim().parse() {
            Ok(secs) => settings.confirmation_timeout_secs = secs,
            Err(_) => warn!(value = %v, "ignoring invalid LATCHKEY__CONFIRMATION_TIMEOUT_SECS"),
        }
    }

    settings
}
