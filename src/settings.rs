//! Runtime settings, read from `settings.json`.
//!
//! The file is looked up at `$ROTA_SETTINGS` if set, otherwise
//! `settings.json` in the working directory, otherwise next to the executable
//! (build.rs copies one there). Every field is optional; missing ones take the
//! defaults below.

use crate::error::{Result, RotaError};
use crate::rotation::Rotation;
use crate::scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_FILENAME: &str = "settings.json";
const SETTINGS_ENV: &str = "ROTA_SETTINGS";

pub const DEFAULT_ROSTER: [&str; 4] = ["deepanshu", "sonu", "sachin", "sintu"];
pub const DEFAULT_CATALOG: [&str; 4] = ["Kitchen", "Bathroom", "Hall", "Trash"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterMember {
    pub username: String,
    #[serde(default)]
    pub mobile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_path: String,
    /// Starting password for every seeded roommate.
    pub default_password: String,
    pub roster: Vec<RosterMember>,
    pub catalog: Vec<String>,
    pub scheduler: SchedulerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_path: "rota.redb".to_string(),
            default_password: "password123".to_string(),
            roster: DEFAULT_ROSTER
                .iter()
                .map(|name| RosterMember { username: name.to_string(), mobile: None })
                .collect(),
            catalog: DEFAULT_CATALOG.iter().map(|name| name.to_string()).collect(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Settings {
    /// Load from `$ROTA_SETTINGS`, `./settings.json` or the copy beside the
    /// executable, in that order.
    pub fn load() -> Result<Settings> {
        let explicit = std::env::var_os(SETTINGS_ENV).map(PathBuf::from);
        let cwd = std::env::current_dir()
            .map_err(|e| RotaError::Config(format!("cannot read working directory: {e}")))?;
        let exe = std::env::current_exe().ok();
        let path = settings_path(explicit, &cwd, exe.as_deref());
        Settings::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Settings> {
        let content = fs::read_to_string(path).map_err(|e| {
            RotaError::Config(format!("cannot read settings file {}: {e}", path.display()))
        })?;
        Settings::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Settings> {
        let settings: Settings = serde_json::from_str(content)
            .map_err(|e| RotaError::Config(format!("cannot parse settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_path.trim().is_empty() {
            return Err(RotaError::Validation("database_path must not be empty".into()));
        }
        if self.default_password.trim().is_empty() {
            return Err(RotaError::Validation("default_password must not be empty".into()));
        }
        self.scheduler.validate()?;
        self.rotation().map(|_| ())
    }

    pub fn roster_usernames(&self) -> Vec<String> {
        self.roster.iter().map(|m| m.username.clone()).collect()
    }

    pub fn rotation(&self) -> Result<Rotation> {
        Rotation::new(self.roster_usernames(), self.catalog.clone())
    }
}

/// Where `load` reads from. An explicit path always wins; otherwise the
/// working directory's file, then the executable's sibling. Falls back to the
/// working directory path so the read error names it.
fn settings_path(explicit: Option<PathBuf>, cwd: &Path, exe: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    let local = cwd.join(SETTINGS_FILENAME);
    if local.is_file() {
        return local;
    }
    exe.and_then(Path::parent)
        .map(|dir| dir.join(SETTINGS_FILENAME))
        .filter(|beside_exe| beside_exe.is_file())
        .unwrap_or(local)
}
