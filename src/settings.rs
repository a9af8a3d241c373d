//! Persisted application settings.
//!
//! Front ends remember a few things between sessions: the colour theme, the last
//! window size, the last organized folder and an optional external category
//! definition. The organize engine never reads any of this; front ends resolve
//! settings into plain arguments before starting a run.
//!
//! # Configuration File Format
//!
//! ```toml
//! theme = "dark"
//! last_folder = "/home/user/Downloads"
//! categories_file = "/home/user/.config/springclean/categories.json"
//!
//! [window]
//! width = 600
//! height = 600
//! ```
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Settings file looked up in the working directory.
pub const LOCAL_SETTINGS_FILE: &str = ".springcleanrc.toml";

const SETTINGS_FILE_NAME: &str = "settings.toml";
const APP_NAME: &str = "springclean";

/// Errors raised while reading or writing settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading or writing the settings file failed.
    #[error("settings I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The settings file is not valid TOML for [`AppSettings`].
    #[error("invalid settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// No per-user configuration directory could be determined.
    #[error("could not determine a configuration directory")]
    NoConfigDirectory,
}

/// Result type for settings handling.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Colour theme of the front end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Follow the operating system.
    #[default]
    System,
    Light,
    Dark,
}

impl Theme {
    /// Switches between light and dark; `System` becomes `Light`.
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark | Theme::System => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::System => "system",
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

/// Last known window size, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowGeometry {
    fn default() -> Self {
        Self {
            width: 600,
            height: 600,
        }
    }
}

/// Everything the application persists between sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub theme: Theme,
    /// Folder most recently organized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_folder: Option<PathBuf>,
    /// External category definition; the built-in table is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories_file: Option<PathBuf>,
    pub window: WindowGeometry,
}

impl AppSettings {
    /// Finds the settings file to use.
    ///
    /// In order: `explicit` when given, [`LOCAL_SETTINGS_FILE`] in the working
    /// directory when it exists, otherwise the per-user file (which may not exist
    /// yet). Returns `None` only when no per-user directory is known.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        let local = PathBuf::from(LOCAL_SETTINGS_FILE);
        if local.exists() {
            return Some(local);
        }

        Self::user_settings_path()
    }

    /// Per-user settings file, e.g. `~/.config/springclean/settings.toml` on Linux.
    pub fn user_settings_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME)
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE_NAME))
    }

    /// Loads settings with fallback to defaults.
    ///
    /// A settings file that does not exist yet yields defaults; it is created on the
    /// first [`save_to`](Self::save_to) with the same `explicit` argument.
    ///
    /// # Errors
    ///
    /// Fails when the chosen file exists but cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> SettingsResult<Self> {
        match Self::locate(explicit) {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Loads settings from `path`.
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Writes settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> SettingsResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "saved settings");
        Ok(())
    }

    /// Saves to the location [`locate`](Self::locate) picks for `explicit`.
    pub fn save_to(&self, explicit: Option<&Path>) -> SettingsResult<PathBuf> {
        let path = Self::locate(explicit).ok_or(SettingsError::NoConfigDirectory)?;
        self.save(&path)?;
        Ok(path)
    }
}
