//! Settings for server launch and grammar discovery
//!
//! A small TOML file. Every field is optional, so an absent file behaves
//! identically to an empty one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level settings file contents.
///
/// ```toml
/// [server]
/// path = "/opt/ctrmml/bin/ctrmml-lsp"
/// args = ["--log-level", "debug"]
///
/// [server.env]
/// CTRMML_LOG = "trace"
///
/// [grammar]
/// path = "/opt/ctrmml/lib/ctrmml.so"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub grammar: GrammarSettings,
}

/// How the language server is located and launched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Explicit server binary. When set, provisioning is bypassed entirely
    /// and the path must exist.
    pub path: Option<PathBuf>,
    /// Extra arguments appended to the server command line.
    pub args: Vec<String>,
    /// Extra environment for the server process, layered over the inherited
    /// environment.
    pub env: BTreeMap<String, String>,
}

/// Where the tree-sitter grammar library lives.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GrammarSettings {
    /// Explicit grammar shared-library path, overriding the storage-root
    /// default.
    pub path: Option<PathBuf>,
}

impl Settings {
    /// Load settings from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    err,
                })
            }
        };
        toml::from_str(&text).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            err,
        })
    }
}
