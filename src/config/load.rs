//! The main config loading module for tern.
//!
//! Handles loading and deserializing settings from `tern.toml`.
//!
//! Provides the main [Config] struct and the internal [RawConfig] used for parsing, and
//! writes the default config file for `tern --init`.

use crate::config::General;
use crate::utils::{expand_home_path, get_home};

use serde::Deserialize;
use tracing::{debug, warn};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{fs, io};

/// Raw configuration as read from the toml file.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub(crate) struct RawConfig {
    general: General,
    paths: RawPaths,
    commands: BTreeMap<String, String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawPaths {
    data_dir: Option<PathBuf>,
    history: Option<PathBuf>,
    files: Option<PathBuf>,
}

/// Resolved data file locations.
#[derive(Debug, Clone)]
pub(crate) struct Paths {
    data_dir: PathBuf,
    history: PathBuf,
    files: PathBuf,
}

impl Paths {
    fn resolve(raw: RawPaths) -> Self {
        let expand = |p: PathBuf| expand_home_path(&p);
        let data_dir = raw.data_dir.map(expand).unwrap_or_else(default_data_dir);
        Paths {
            history: raw
                .history
                .map(expand)
                .unwrap_or_else(|| data_dir.join("history")),
            files: raw
                .files
                .map(expand)
                .unwrap_or_else(|| data_dir.join("files")),
            data_dir,
        }
    }

    #[inline]
    pub(crate) fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[inline]
    pub(crate) fn history(&self) -> &Path {
        &self.history
    }

    #[inline]
    pub(crate) fn files(&self) -> &Path {
        &self.files
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(data) = dirs::data_dir() {
        return data.join("tern");
    }
    if let Some(home) = get_home() {
        return home.join(".local/share/tern");
    }
    PathBuf::from(".tern")
}

/// Main configuration struct for tern.
#[derive(Debug)]
pub(crate) struct Config {
    general: General,
    paths: Paths,
    commands: BTreeMap<String, String>,
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        Self {
            general: raw.general,
            paths: Paths::resolve(raw.paths),
            commands: raw.commands,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

impl Config {
    /// Load configuration from the default path.
    /// If the file does not exist or fails to parse, returns the default configuration.
    pub(crate) fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    pub(crate) fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no config file at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("reading config {}: {e}", path.display());
                eprintln!("Error reading config: {e}");
                return Self::default();
            }
        };

        match toml::from_str::<RawConfig>(&content) {
            Ok(raw) => raw.into(),
            Err(e) => {
                warn!("parsing config {}: {e}", path.display());
                eprintln!("Error parsing config: {e}");
                Self::default()
            }
        }
    }

    // Getters

    #[inline]
    pub(crate) fn general(&self) -> &General {
        &self.general
    }

    #[inline]
    pub(crate) fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Named command bodies from `[commands]`, in name order.
    #[inline]
    pub(crate) fn commands(&self) -> &BTreeMap<String, String> {
        &self.commands
    }

    /// Determine the default configuration file path.
    /// Checks the TERN_CONFIG environment variable first,
    /// Checks for XDG_CONFIG_HOME after,
    /// then defaults to ~/.config/tern/tern.toml,
    pub(crate) fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("TERN_CONFIG") {
            return PathBuf::from(path);
        }

        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg_config).join("tern/tern.toml");
        }

        if let Some(home) = get_home() {
            return home.join(".config/tern/tern.toml");
        }
        PathBuf::from("tern.toml")
    }

    /// Generate a default configuration file at the specified path.
    /// If the file already exists, returns an error.
    pub(crate) fn generate_default(path: &Path) -> io::Result<()> {
        if path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("Config file already exists at {:?}", path),
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_TOML)?;
        println!("Default config generated at {:?}", path);
        Ok(())
    }
}

const DEFAULT_TOML: &str = r##"# tern.toml - default configuration for tern
# Commented values are the internal defaults.

[general]
# dircache = true
# period = 0                # seconds between refreshes, 0 disables
# mouse = false
# hidden = false
# dirfirst = true
# sortby = "natural"        # natural, name, size, time, atime, ctime, ext
# reverse = false
# preview = true
# autoquit = false          # ask the shared server to quit when this client quits
# shell = "sh"
# shellopts = []
# move_to_trash = false
# scrolloff = 0

# [paths]
# data_dir = "~/.local/share/tern"
# history = "~/.local/share/tern/history"
# files = "~/.local/share/tern/files"

[commands]
# on-quit = "&notify-send bye"
"##;
