//! Error taxonomy for provisioning, configuration, and grammar loading

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while acquiring the language-server binary.
///
/// `Network`, `AssetNotFound`, `Download`, and `Extract` are recoverable:
/// when a previously installed binary exists, the provisioner logs the error
/// and falls back to it. The remaining variants abort provisioning outright.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Host OS/architecture outside the set with published server builds.
    #[error("unsupported platform: {os} {arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// Release metadata could not be fetched (transport failure or a
    /// non-2xx response).
    #[error("release lookup failed: {0}")]
    Network(String),

    /// The latest release carries no asset for this platform.
    #[error("no release asset named {0}")]
    AssetNotFound(String),

    /// The matched asset could not be downloaded.
    #[error("download failed: {0}")]
    Download(String),

    /// The downloaded archive could not be unpacked.
    #[error("extraction failed: {0}")]
    Extract(String),

    /// Extraction succeeded but the expected binary is absent. The archive
    /// does not match its advertised layout, so a cached binary must not
    /// mask it.
    #[error("server binary not found after extracting {asset}")]
    MissingBinaryAfterExtract { asset: String },

    /// A configured server path points at nothing. Explicit overrides never
    /// fall back to provisioning.
    #[error("language server not found at configured path {}", path.display())]
    ServerPathNotFound { path: PathBuf },

    /// Storage-root or permission I/O that provisioning cannot work around.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading the tree-sitter grammar shared library.
#[derive(Debug, Error)]
pub enum GrammarError {
    /// No grammar library at the expected path. Highlighting stays off
    /// until one is installed.
    #[error("no grammar library at {}", path.display())]
    Missing { path: PathBuf },

    /// The library exists but could not be opened, or lacks the expected
    /// language constructor.
    #[error("failed to load grammar: {0}")]
    Load(String),

    /// The grammar was compiled against a tree-sitter ABI this build does
    /// not speak.
    #[error("grammar ABI version {found} outside supported range {min}..={max}")]
    Incompatible { found: usize, min: usize, max: usize },
}

/// Errors raised while reading the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {err}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error("failed to parse {}: {err}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        err: toml::de::Error,
    },
}
