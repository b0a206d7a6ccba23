//! The external build-tool collaborator.
//!
//! The pipeline only needs "build succeeded, artifacts exist under the
//! resolved layout" or a failure; it never interprets or retries build
//! errors. The trait seam keeps the assembler testable with a stub tool.

use std::fs;
use std::path::Path;
use std::process::Command;

use crate::error::PackagingError;

/// Configure-and-build collaborator. `source_root` is the `tools/` subtree
/// of the (exported) project source; outputs must land under `build_root`.
pub trait BuildTool {
    fn build(&self, source_root: &Path, build_root: &Path) -> Result<(), PackagingError>;
}

/// CMake-based implementation: configure then build, blocking until done.
#[derive(Debug, Default)]
pub struct CmakeBuildTool;

impl CmakeBuildTool {
    /// Verify the build tool exists before attempting a build, so a missing
    /// host tool fails with a direct message instead of a spawn error.
    pub fn preflight() -> Result<(), PackagingError> {
        which::which("cmake").map_err(|_| {
            PackagingError::Build("cmake not found on PATH (install cmake)".to_string())
        })?;
        Ok(())
    }
}

impl BuildTool for CmakeBuildTool {
    fn build(&self, source_root: &Path, build_root: &Path) -> Result<(), PackagingError> {
        Self::preflight()?;

        if !source_root.is_dir() {
            return Err(PackagingError::Build(format!(
                "build source root not found: {}",
                source_root.display()
            )));
        }
        fs::create_dir_all(build_root)?;

        let configure = Command::new("cmake")
            .arg("-S")
            .arg(source_root)
            .arg("-B")
            .arg(build_root)
            .status()?;
        if !configure.success() {
            return Err(PackagingError::Build(format!(
                "cmake configure failed with {configure} (source {})",
                source_root.display()
            )));
        }

        let build = Command::new("cmake")
            .arg("--build")
            .arg(build_root)
            .status()?;
        if !build.success() {
            return Err(PackagingError::Build(format!(
                "cmake build failed with {build} (build dir {})",
                build_root.display()
            )));
        }

        Ok(())
    }
}
