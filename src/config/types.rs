// config/types.rs
use crate::error::{KubiError, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

pub const SETTINGS_ENV: &str = "KUBI_SETTINGS";

/// Defaults for the exchange commands, read from `~/.kubi/settings.json`.
/// Command-line flags and their environment variables take precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub kubi_url: Option<String>,
    pub username: Option<String>,
    pub use_proxy: bool,
    pub insecure: bool,
}

impl Settings {
    pub fn location() -> Option<PathBuf> {
        match env::var_os(SETTINGS_ENV).filter(|v| !v.is_empty()) {
            Some(path) => Some(PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string())),
            None => dirs::home_dir().map(|home| home.join(".kubi").join("settings.json")),
        }
    }

    /// Missing settings are not an error; unreadable or invalid ones are.
    pub fn load() -> Result<Self> {
        match Self::location() {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let config_str = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(KubiError::file_io("read", path, e)),
        };
        serde_json::from_str(&config_str).map_err(|e| {
            KubiError::ValidationFailed(format!("invalid settings in {}: {}", path.display(), e))
        })
    }
}
