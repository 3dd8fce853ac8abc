//! ctrmml-ide - editor integration for the ctrmml music macro language
//!
//! Provisions the ctrmml-lsp binary from GitHub releases, launches it for a
//! protocol client, and dumps semantic-highlight tokens for debugging
//! grammar installs.

mod commands;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ctrmml_ide_core::config::Settings;

/// Editor integration for the ctrmml music macro language
#[derive(Parser)]
#[command(name = "ctrmml-ide")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Storage directory for server binaries and grammars
    #[arg(long, global = true, value_name = "DIR")]
    storage_dir: Option<PathBuf>,

    /// Settings file (default: <config-dir>/ctrmml-ide/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download or refresh the language server and print its path
    Ensure {
        /// Only print the path; log errors alone
        #[arg(short, long)]
        quiet: bool,
    },
    /// Show cached server versions and update-check state
    Status,
    /// Run the language server with stdio passed through
    Launch {
        /// Extra arguments appended to the server command line
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print semantic tokens for a ctrmml file
    Highlight {
        /// File to highlight
        file: PathBuf,
        /// Grammar shared library (default: <storage>/grammars/ctrmml.<ext>)
        #[arg(long, value_name = "FILE")]
        grammar: Option<PathBuf>,
        /// Emit LSP semantic-token quintuples as JSON
        #[arg(long)]
        lsp: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let quiet = matches!(cli.command, Commands::Ensure { quiet: true });
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let storage = match &cli.storage_dir {
        Some(dir) => dir.clone(),
        None => default_storage_dir()?,
    };
    let settings = load_settings(cli.config.as_deref())?;
    debug!("storage root {}", storage.display());

    match cli.command {
        Commands::Ensure { .. } => commands::ensure(&storage, &settings).await,
        Commands::Status => commands::status(&storage, &settings).await,
        Commands::Launch { args } => commands::launch(&storage, &settings, args).await,
        Commands::Highlight { file, grammar, lsp } => {
            commands::highlight(&storage, &settings, &file, grammar, lsp)
        }
    }
}

/// Default storage root for server binaries and grammars.
fn default_storage_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("no data directory on this platform")?;
    Ok(base.join("ctrmml-ide"))
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match dirs::config_dir() {
            Some(base) => base.join("ctrmml-ide").join("config.toml"),
            None => return Ok(Settings::default()),
        },
    };
    Settings::load(&path).with_context(|| format!("loading settings from {}", path.display()))
}
