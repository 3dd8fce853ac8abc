//! Acquisition state machine for the language-server binary
//!
//! One entry point, [`ensure_server_binary`], walks cache discovery,
//! staleness, release lookup, download, and extraction. Whenever a
//! recoverable step fails and a previously installed binary exists, the
//! provisioner logs the failure and falls back to it; a cold start
//! propagates the error instead.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::archive::extract_archive;
use crate::cache::{
    latest_cached_binary, make_executable, record_update_check, update_check_due, CachedBinary,
};
use crate::config::Settings;
use crate::error::ProvisionError;
use crate::github::ReleaseSource;
use crate::platform::{ArchiveKind, PlatformAssetInfo};
use crate::SERVER_ID;

/// Ensure a runnable server binary exists under `storage` and return its
/// path. Safe to call on every editor session: a fresh cache short-circuits
/// before any network traffic, and an already-installed version is never
/// downloaded twice.
pub async fn ensure_server_binary(
    storage: &Path,
    platform: PlatformAssetInfo,
    source: &dyn ReleaseSource,
) -> Result<PathBuf, ProvisionError> {
    fs::create_dir_all(storage).await?;

    let cached = latest_cached_binary(storage, &platform).await;
    let check_due = cached.is_none() || update_check_due(storage).await;
    if let Some(cached) = &cached {
        if !check_due {
            debug!("update check not due, using {}", cached.path.display());
            make_executable(&cached.path).await?;
            return Ok(cached.path.clone());
        }
    }

    let release = match source.latest_release().await {
        Ok(release) => {
            record_update_check(storage).await;
            release
        }
        Err(err) => {
            if cached.is_some() {
                // A failed lookup still counts against the throttle window,
                // otherwise an unreachable endpoint gets hammered on every
                // session.
                record_update_check(storage).await;
            }
            return cached_fallback(cached, err).await;
        }
    };

    let version = release
        .tag_name
        .strip_prefix('v')
        .unwrap_or(&release.tag_name);
    let asset_name = platform.asset_name(SERVER_ID, version);
    let Some(asset) = release.assets.iter().find(|asset| asset.name == asset_name) else {
        return cached_fallback(cached, ProvisionError::AssetNotFound(asset_name)).await;
    };

    let version_dir = storage.join(format!("{SERVER_ID}-{}", release.tag_name));
    let binary = version_dir.join(platform.binary_name(SERVER_ID));
    if fs::metadata(&binary).await.is_ok() {
        debug!("{} already installed", release.tag_name);
        make_executable(&binary).await?;
        return Ok(binary);
    }

    fs::create_dir_all(&version_dir).await?;
    let archive_path = version_dir.join(&asset_name);
    if let Err(err) = install(
        source,
        &asset.browser_download_url,
        &archive_path,
        &version_dir,
        platform.ext,
    )
    .await
    {
        return cached_fallback(cached, err).await;
    }

    if fs::metadata(&binary).await.is_err() {
        // The archive unpacked cleanly but held no server binary. Falling
        // back here would pin users to a stale version forever.
        return Err(ProvisionError::MissingBinaryAfterExtract { asset: asset_name });
    }

    info!("installed {SERVER_ID} {}", release.tag_name);
    make_executable(&binary).await?;
    Ok(binary)
}

/// Resolve the server binary an editor should launch: a configured path
/// wins outright, otherwise the storage cache and provisioner supply one.
pub async fn resolve_server_binary(
    settings: &Settings,
    storage: &Path,
    platform: PlatformAssetInfo,
    source: &dyn ReleaseSource,
) -> Result<PathBuf, ProvisionError> {
    if let Some(path) = settings.server.path.as_ref() {
        return if fs::metadata(path).await.is_ok() {
            Ok(path.clone())
        } else {
            Err(ProvisionError::ServerPathNotFound { path: path.clone() })
        };
    }
    ensure_server_binary(storage, platform, source).await
}

/// Download the asset into its version directory and unpack it in place.
/// The archive itself is removed once extraction succeeds.
async fn install(
    source: &dyn ReleaseSource,
    url: &str,
    archive_path: &Path,
    version_dir: &Path,
    kind: ArchiveKind,
) -> Result<(), ProvisionError> {
    source.download(url, archive_path).await?;
    extract_archive(archive_path, version_dir, kind).await?;
    if let Err(err) = fs::remove_file(archive_path).await {
        debug!("failed to remove downloaded archive: {err}");
    }
    Ok(())
}

async fn cached_fallback(
    cached: Option<CachedBinary>,
    err: ProvisionError,
) -> Result<PathBuf, ProvisionError> {
    match cached {
        Some(binary) => {
            warn!("{err}; falling back to cached server at {}", binary.path.display());
            make_executable(&binary.path).await?;
            Ok(binary.path)
        }
        None => Err(err),
    }
}
