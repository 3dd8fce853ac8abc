//! Subcommand implementations

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::debug;

use ctrmml_ide_core::cache::{
    cached_binaries, last_update_check, latest_cached_binary, update_check_due,
};
use ctrmml_ide_core::config::Settings;
use ctrmml_ide_core::github::GithubReleases;
use ctrmml_ide_core::highlight::grammar::Grammar;
use ctrmml_ide_core::highlight::Highlighter;
use ctrmml_ide_core::launcher::run_server;
use ctrmml_ide_core::platform::PlatformAssetInfo;
use ctrmml_ide_core::provision::resolve_server_binary;

pub async fn ensure(storage: &Path, settings: &Settings) -> Result<()> {
    let platform = PlatformAssetInfo::detect()?;
    let source = GithubReleases::new()?;
    let path = resolve_server_binary(settings, storage, platform, &source).await?;
    println!("{}", path.display());
    Ok(())
}

pub async fn status(storage: &Path, settings: &Settings) -> Result<()> {
    let platform = PlatformAssetInfo::detect()?;

    // The starred row is the binary the provisioner itself would pick.
    let newest = latest_cached_binary(storage, &platform).await;
    let mut binaries = cached_binaries(storage, &platform).await;
    if binaries.is_empty() {
        println!("no cached server binaries under {}", storage.display());
    } else {
        binaries.sort_by_key(|binary| std::cmp::Reverse(binary.modified));
        println!("cached server binaries under {}:", storage.display());
        for binary in &binaries {
            let starred = newest.as_ref().is_some_and(|pick| pick.path == binary.path);
            let marker = if starred { "*" } else { " " };
            println!(
                "  {marker} {} (modified {})",
                binary.path.display(),
                rough_age(binary.modified)
            );
        }
    }

    match last_update_check(storage).await {
        None => println!("last update check: never"),
        Some(last) => {
            let now_ms = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|since| since.as_millis() as i64)
                .unwrap_or(0);
            let elapsed = Duration::from_millis((now_ms - last).max(0) as u64);
            let due = update_check_due(storage).await;
            println!("{}", stamp_summary(elapsed, due));
        }
    }

    let grammar_path = grammar_path(storage, settings, None);
    if grammar_path.is_file() {
        println!("grammar library: {}", grammar_path.display());
    } else {
        println!("grammar library: {} (not installed)", grammar_path.display());
    }
    Ok(())
}

pub async fn launch(storage: &Path, settings: &Settings, extra_args: Vec<String>) -> Result<()> {
    let platform = PlatformAssetInfo::detect()?;
    let source = GithubReleases::new()?;
    let binary = resolve_server_binary(settings, storage, platform, &source).await?;

    let mut server = settings.server.clone();
    server.args.extend(extra_args);
    debug!("server args: {:?}", server.args);

    let status = run_server(&binary, &server)
        .await
        .with_context(|| format!("launching {}", binary.display()))?;
    std::process::exit(status.code().unwrap_or(1))
}

pub fn highlight(
    storage: &Path,
    settings: &Settings,
    file: &Path,
    grammar_override: Option<PathBuf>,
    lsp: bool,
) -> Result<()> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let highlighter = Highlighter::new(Grammar::new(grammar_path(
        storage,
        settings,
        grammar_override,
    )));

    if lsp {
        let tokens = highlighter.tokens(&source)?;
        println!("{}", serde_json::to_string_pretty(&tokens)?);
    } else {
        for span in highlighter.spans(&source)? {
            println!(
                "{}:{}..{}:{} {}",
                span.start.row,
                span.start.column,
                span.end.row,
                span.end.column,
                span.kind.as_str()
            );
        }
    }
    Ok(())
}

/// CLI flag, then settings file, then the storage-root default.
fn grammar_path(storage: &Path, settings: &Settings, overriding: Option<PathBuf>) -> PathBuf {
    overriding
        .or_else(|| settings.grammar.path.clone())
        .unwrap_or_else(|| Grammar::default_path(storage))
}

/// Status line for the update stamp; `due` comes from [`update_check_due`],
/// not a second reading of the interval rule.
fn stamp_summary(elapsed: Duration, due: bool) -> String {
    let ago = format_duration(elapsed);
    if due {
        format!("last update check: {ago} ago (next check due)")
    } else {
        format!("last update check: {ago} ago (within check interval)")
    }
}

fn rough_age(modified: SystemTime) -> String {
    match modified.elapsed() {
        Ok(age) => format!("{} ago", format_duration(age)),
        Err(_) => "just now".to_string(),
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86_400)
    }
}
