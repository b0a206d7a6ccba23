//! Platform targets and supported-OS validation.
//!
//! A packaging run is parameterized by one [`PlatformTarget`], supplied by
//! the CLI and immutable for the duration of the run. Validation must pass
//! before any path computation or file operation happens.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::PackagingError;

/// Operating system a package can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Windows,
    Linux,
}

impl Os {
    /// Lowercase name as used in build-output paths.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Os::Windows => "windows",
            Os::Linux => "linux",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Os {
    type Err = PackagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "windows" => Ok(Os::Windows),
            "linux" => Ok(Os::Linux),
            other => Err(PackagingError::config(format!(
                "unsupported os '{other}' (expected 'windows' or 'linux')"
            ))),
        }
    }
}

/// Build configuration flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    Debug,
    Release,
}

impl BuildType {
    /// Lowercase name as used in build-output paths.
    pub const fn as_str(&self) -> &'static str {
        match self {
            BuildType::Debug => "debug",
            BuildType::Release => "release",
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BuildType {
    type Err = PackagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(BuildType::Debug),
            "release" => Ok(BuildType::Release),
            other => Err(PackagingError::config(format!(
                "unsupported build type '{other}' (expected 'debug' or 'release')"
            ))),
        }
    }
}

/// The (os, arch, build-type) tuple one packaging run targets.
///
/// The architecture is kept as a free-form token because build farms name
/// architectures inconsistently; it is the only path component that keeps
/// its original casing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformTarget {
    pub os: Os,
    pub arch: String,
    pub build_type: BuildType,
}

impl PlatformTarget {
    pub fn new(os: Os, arch: impl Into<String>, build_type: BuildType) -> Self {
        Self {
            os,
            arch: arch.into(),
            build_type,
        }
    }
}

/// Toolchain dimensions reported by the caller's build environment.
///
/// These feed identity normalization only; nothing in path resolution
/// depends on them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerInfo {
    pub name: String,
    pub version: String,
    pub libcxx: String,
}

/// Check a requested OS against a package's declared supported-OS set.
///
/// An empty set is a packaging-definition bug and fails with
/// [`PackagingError::InvalidConfiguration`] naming the set; a non-member OS
/// fails with [`PackagingError::UnsupportedPlatform`]. Side-effect-free.
pub fn validate_os(
    package: &str,
    requested: Os,
    supported: &BTreeSet<Os>,
) -> Result<(), PackagingError> {
    if supported.is_empty() {
        return Err(PackagingError::config(format!(
            "'{package}' declares an empty supported-os set; it must contain 'windows', 'linux', or both"
        )));
    }

    if !supported.contains(&requested) {
        return Err(PackagingError::UnsupportedPlatform {
            package: package.to_string(),
            requested: requested.to_string(),
            supported: supported_set_display(supported),
        });
    }

    Ok(())
}

fn supported_set_display(supported: &BTreeSet<Os>) -> String {
    supported
        .iter()
        .map(Os::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
