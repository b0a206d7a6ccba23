//! Build-output layout resolution.
//!
//! Pure path computation: given a package kind and a platform target, derive
//! where the build tree keeps its outputs. No I/O happens here, which keeps
//! the whole convention testable without a filesystem.
//!
//! The generic convention is `build/<os>/<arch>/<build-type>` (all lowercase
//! except the architecture token). Binary-only packages fetch pre-built
//! outputs from a shared build farm whose top-level folder names do not
//! follow that convention; those names live in [`FarmFolders`] so more
//! platforms can be added as data rather than code.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::platform::{BuildType, Os, PlatformTarget};
use crate::recipe::PackageKind;

/// Farm-specific top-level build folders used by binary-only packages.
///
/// Windows farms split by architecture, Linux farms by build type. The
/// defaults match the farm this project historically published to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FarmFolders {
    pub windows_x86_64: String,
    pub windows_x86: String,
    pub linux_debug: String,
    pub linux_release: String,
}

impl Default for FarmFolders {
    fn default() -> Self {
        Self {
            windows_x86_64: "bfvs".to_string(),
            windows_x86: "bfvs32".to_string(),
            linux_debug: "bfD".to_string(),
            linux_release: "bfR".to_string(),
        }
    }
}

impl FarmFolders {
    /// Farm folder for a target: (os, arch) on Windows, (os, build-type)
    /// on Linux.
    pub fn folder_for(&self, target: &PlatformTarget) -> &str {
        match target.os {
            Os::Windows => {
                if target.arch == "x86_64" {
                    &self.windows_x86_64
                } else {
                    &self.windows_x86
                }
            }
            Os::Linux => match target.build_type {
                BuildType::Debug => &self.linux_debug,
                BuildType::Release => &self.linux_release,
            },
        }
    }
}

/// Where one platform/configuration's build outputs live, relative to the
/// packaging run's working root.
///
/// Invariant: `lib_dir == config_dir/lib` and `bin_dir == config_dir/bin`.
/// Recomputed every run; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutputLayout {
    pub config_dir: PathBuf,
    pub lib_dir: PathBuf,
    pub bin_dir: PathBuf,
}

impl BuildOutputLayout {
    fn from_config_dir(config_dir: PathBuf) -> Self {
        let lib_dir = config_dir.join("lib");
        let bin_dir = config_dir.join("bin");
        Self {
            config_dir,
            lib_dir,
            bin_dir,
        }
    }
}

/// Resolve the build-output layout for a package kind and target.
///
/// Main and headers-only packages use the generic relative path directly.
/// Binary-only packages are prefixed by `<source_indirection>/build/<farm>`
/// because their artifacts were produced by the build farm, not a local
/// build. Deterministic for any given inputs.
pub fn resolve(
    kind: PackageKind,
    target: &PlatformTarget,
    source_indirection: &Path,
    farm: &FarmFolders,
) -> BuildOutputLayout {
    let generic = Path::new("build")
        .join(target.os.as_str())
        .join(&target.arch)
        .join(target.build_type.as_str());

    let config_dir = match kind {
        PackageKind::Main | PackageKind::HeadersOnly => generic,
        PackageKind::BinaryOnly => source_indirection
            .join("build")
            .join(farm.folder_for(target))
            .join(generic),
    };

    BuildOutputLayout::from_config_dir(config_dir)
}
