//! Archive extraction for downloaded release assets

use std::path::Path;

use flate2::read::GzDecoder;
use tar::Archive;

use crate::error::ProvisionError;
use crate::platform::ArchiveKind;

/// Extract `archive` into `dest`. Decompression is blocking work and runs
/// off the async threads.
pub async fn extract_archive(
    archive: &Path,
    dest: &Path,
    kind: ArchiveKind,
) -> Result<(), ProvisionError> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || match kind {
        ArchiveKind::Zip => extract_zip(&archive, &dest),
        ArchiveKind::TarGz => extract_tar_gz(&archive, &dest),
    })
    .await
    .map_err(|err| ProvisionError::Extract(err.to_string()))?
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<(), ProvisionError> {
    let file = std::fs::File::open(archive).map_err(extract_err)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|err| ProvisionError::Extract(err.to_string()))?;
    zip.extract(dest)
        .map_err(|err| ProvisionError::Extract(err.to_string()))
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<(), ProvisionError> {
    let file = std::fs::File::open(archive).map_err(extract_err)?;
    let mut tar = Archive::new(GzDecoder::new(file));
    tar.unpack(dest).map_err(extract_err)
}

fn extract_err(err: std::io::Error) -> ProvisionError {
    ProvisionError::Extract(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    use crate::testutil::{tar_gz_archive, zip_archive};

    #[tokio::test]
    async fn test_extract_tar_gz() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("asset.tar.gz");
        let dest = dir.path().join("out");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(
            &archive_path,
            tar_gz_archive(&[("ctrmml-lsp", b"#!/bin/sh\nexit 0\n")]),
        )
        .unwrap();

        extract_archive(&archive_path, &dest, ArchiveKind::TarGz)
            .await
            .unwrap();

        let extracted = std::fs::read(dest.join("ctrmml-lsp")).unwrap();
        assert_eq!(extracted, b"#!/bin/sh\nexit 0\n");
    }

    #[tokio::test]
    async fn test_extract_zip() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("asset.zip");
        let dest = dir.path().join("out");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(
            &archive_path,
            zip_archive(&[("ctrmml-lsp.exe", b"MZ binary".as_slice())]),
        )
        .unwrap();

        extract_archive(&archive_path, &dest, ArchiveKind::Zip)
            .await
            .unwrap();

        let extracted = std::fs::read(dest.join("ctrmml-lsp.exe")).unwrap();
        assert_eq!(extracted, b"MZ binary");
    }

    #[tokio::test]
    async fn test_corrupt_archive_reports_extract_error() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("asset.tar.gz");
        std::fs::write(&archive_path, b"this is not gzip data").unwrap();

        let err = extract_archive(&archive_path, dir.path(), ArchiveKind::TarGz)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Extract(_)));
    }

    #[tokio::test]
    async fn test_missing_archive_reports_extract_error() {
        let dir = TempDir::new().unwrap();
        let err = extract_archive(&dir.path().join("absent.zip"), dir.path(), ArchiveKind::Zip)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Extract(_)));
    }
}
