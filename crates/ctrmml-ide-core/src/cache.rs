//! Cached-binary discovery and update-check throttling
//!
//! The storage root accumulates one `<id>-<tag>` directory per installed
//! server version. The scanner treats the most recently modified binary as
//! current; nothing is ever deleted. A flat stamp file beside the version
//! directories throttles release lookups to one per interval.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tokio::fs;
use tracing::{debug, warn};

use crate::platform::PlatformAssetInfo;
use crate::SERVER_ID;

/// Minimum time between release lookups.
pub const UPDATE_CHECK_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Stamp file holding the time of the last release lookup, as milliseconds
/// since the epoch.
pub const UPDATE_CHECK_FILENAME: &str = ".ctrmml-lsp-last-check";

/// A previously installed server binary.
#[derive(Debug, Clone)]
pub struct CachedBinary {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Every cached binary under `storage`, in directory order.
///
/// A version directory counts only when it holds the platform's binary
/// filename. Unreadable entries are skipped; a missing storage root yields
/// an empty list.
pub async fn cached_binaries(storage: &Path, platform: &PlatformAssetInfo) -> Vec<CachedBinary> {
    let binary_name = platform.binary_name(SERVER_ID);
    let prefix = format!("{SERVER_ID}-");
    let mut found = Vec::new();

    let mut entries = match fs::read_dir(storage).await {
        Ok(entries) => entries,
        Err(_) => return found,
    };
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                debug!("stopped scanning {}: {err}", storage.display());
                break;
            }
        };
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(&prefix) {
            continue;
        }
        match entry.file_type().await {
            Ok(kind) if kind.is_dir() => {}
            _ => continue,
        }
        let candidate = entry.path().join(&binary_name);
        let metadata = match fs::metadata(&candidate).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => continue,
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        found.push(CachedBinary {
            path: candidate,
            modified,
        });
    }
    found
}

/// Most recently modified cached binary. Version directories are named by
/// tag, so recency comes from the filesystem rather than the name.
pub async fn latest_cached_binary(
    storage: &Path,
    platform: &PlatformAssetInfo,
) -> Option<CachedBinary> {
    cached_binaries(storage, platform)
        .await
        .into_iter()
        .max_by_key(|binary| binary.modified)
}

/// Milliseconds since the epoch recorded at the last release lookup, if the
/// stamp file exists and parses.
pub async fn last_update_check(storage: &Path) -> Option<i64> {
    let path = storage.join(UPDATE_CHECK_FILENAME);
    let text = fs::read_to_string(&path).await.ok()?;
    text.trim().parse::<i64>().ok()
}

/// Whether enough time has passed since the last release lookup. Absent or
/// unreadable stamps count as due.
pub async fn update_check_due(storage: &Path) -> bool {
    match last_update_check(storage).await {
        None => true,
        Some(last) => {
            let elapsed = Utc::now().timestamp_millis() - last;
            elapsed >= UPDATE_CHECK_INTERVAL.as_millis() as i64
        }
    }
}

/// Overwrite the stamp with the current time. Best-effort: a stamp that
/// cannot be written must not fail a provisioning run that otherwise
/// succeeded.
pub async fn record_update_check(storage: &Path) {
    let path = storage.join(UPDATE_CHECK_FILENAME);
    let now = Utc::now().timestamp_millis().to_string();
    if let Err(err) = fs::write(&path, now).await {
        warn!("failed to record update check: {err}");
    }
}

/// Set the permission bits a server binary needs before launch. Windows has
/// no executable bit, so this is a no-op there.
pub async fn make_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path).await?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).await?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
