//! JSON options file read once at startup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ClassGame;

/// Fatal startup configuration failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File missing or unreadable.
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// File is not a valid options document.
    #[error("cannot parse {}: {source}", .path.display())]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
    /// Homepage template failed to compile or render.
    #[error("homepage template {}: {message}", .path.display())]
    Template {
        /// Template file.
        path: PathBuf,
        /// Template engine message.
        message: String,
    },
}

/// Site options plus the optional `server` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Options {
    /// Page title.
    pub title: String,
    /// Page description.
    pub description: String,
    /// Site author.
    pub author: String,
    /// Page language code.
    pub language: String,
    /// Displayed site version.
    pub version: String,
    /// Known mission categories.
    #[serde(rename = "classes-game", default)]
    pub classes_game: Vec<ClassGame>,
    /// Paths and listener settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Listener, storage and asset locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind.
    pub listen: String,
    /// SQLite database file.
    pub database: PathBuf,
    /// Static asset root.
    pub static_dir: PathBuf,
    /// Directory holding `index.html`.
    pub template_dir: PathBuf,
    /// Where uploaded reports are archived; served under `/data/`.
    pub archive_dir: PathBuf,
    /// Enables the add endpoint. Off by default.
    pub allow_uploads: bool,
    /// Request body limit for uploads.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:5000".to_string(),
            database: PathBuf::from("data.db"),
            static_dir: PathBuf::from("static"),
            template_dir: PathBuf::from("template"),
            archive_dir: PathBuf::from("static/data"),
            allow_uploads: false,
            max_upload_bytes: 32 * 1024 * 1024,
        }
    }
}

impl Options {
    /// Reads and parses the options file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let blob = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&blob).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
