//! Core library for ctrmml-ide
//!
//! Editor-side integration for the ctrmml music macro language: provisions
//! the `ctrmml-lsp` binary from GitHub releases, launches it for a protocol
//! client, and derives semantic highlighting from a tree-sitter parse tree.

pub mod archive;
pub mod cache;
pub mod config;
pub mod error;
pub mod github;
pub mod highlight;
pub mod launcher;
pub mod platform;
pub mod provision;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::Settings;
pub use error::{ConfigError, GrammarError, ProvisionError};
pub use github::{GithubReleases, ReleaseSource};
pub use highlight::{Highlighter, TokenKind};
pub use platform::PlatformAssetInfo;
pub use provision::{ensure_server_binary, resolve_server_binary};

/// Identifier of the language server. Names the binary, release assets, and
/// version directories under the storage root.
pub const SERVER_ID: &str = "ctrmml-lsp";

/// GitHub repository that publishes server releases.
pub const SERVER_REPO: &str = "ulalume/language-server-ctrmml";

/// User agent sent with every request to the release endpoint.
pub const USER_AGENT: &str = "ctrmml-ide";
