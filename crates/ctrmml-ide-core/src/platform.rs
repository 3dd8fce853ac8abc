//! Platform detection for release-asset selection
//!
//! Server releases publish one archive per supported OS/architecture pair,
//! named `<id>-<version>-<os>-<arch>.<ext>`. This module maps the host
//! environment onto that naming scheme.

use std::fmt;

use crate::error::ProvisionError;

/// Operating systems with published server builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Macos,
    Linux,
    Windows,
}

impl HostOs {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostOs::Macos => "macos",
            HostOs::Linux => "linux",
            HostOs::Windows => "windows",
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU architectures with published server builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostArch {
    Arm64,
    X64,
}

impl HostArch {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostArch::Arm64 => "arm64",
            HostArch::X64 => "x64",
        }
    }
}

impl fmt::Display for HostArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Archive format a release asset ships in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    /// Filename extension, without a leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::TarGz => "tar.gz",
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Asset-naming triple derived from the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformAssetInfo {
    pub os: HostOs,
    pub arch: HostArch,
    pub ext: ArchiveKind,
}

impl PlatformAssetInfo {
    /// Resolve the triple for the current process.
    pub fn detect() -> Result<Self, ProvisionError> {
        Self::from_parts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Resolve a triple from explicit OS/architecture names, in the
    /// vocabulary of `std::env::consts`.
    pub fn from_parts(os: &str, arch: &str) -> Result<Self, ProvisionError> {
        let host_os = match os {
            "macos" => HostOs::Macos,
            "linux" => HostOs::Linux,
            "windows" => HostOs::Windows,
            _ => return Err(unsupported(os, arch)),
        };
        let host_arch = match arch {
            "aarch64" => HostArch::Arm64,
            "x86_64" => HostArch::X64,
            _ => return Err(unsupported(os, arch)),
        };
        let ext = match host_os {
            HostOs::Windows => ArchiveKind::Zip,
            _ => ArchiveKind::TarGz,
        };
        Ok(Self {
            os: host_os,
            arch: host_arch,
            ext,
        })
    }

    /// Release-asset filename for `version` (the release tag with its
    /// leading `v` stripped).
    pub fn asset_name(&self, id: &str, version: &str) -> String {
        format!("{id}-{version}-{}-{}.{}", self.os, self.arch, self.ext)
    }

    /// Filename of the server binary inside a version directory.
    pub fn binary_name(&self, id: &str) -> String {
        match self.os {
            HostOs::Windows => format!("{id}.exe"),
            _ => id.to_string(),
        }
    }
}

fn unsupported(os: &str, arch: &str) -> ProvisionError {
    ProvisionError::UnsupportedPlatform {
        os: os.to_string(),
        arch: arch.to_string(),
    }
}
