//! Copy rule sets: which files belong in which package variant.
//!
//! Rules are plain data. Each (kind, context) pair maps to one ordered rule
//! list; the staging engine in [`crate::staging`] executes them. The same
//! source rule set runs twice in a package's lifecycle — once when the
//! source tree is snapshotted at export time, once when the final package is
//! assembled from that snapshot — with only the source root differing, so
//! the context is an explicit parameter instead of two near-duplicate
//! functions.

use std::path::{Path, PathBuf};

use crate::layout::BuildOutputLayout;
use crate::platform::{BuildType, Os, PlatformTarget};
use crate::recipe::PackageKind;

/// Which root a rule set reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyContext {
    /// Reading the original project tree; roots are prefixed with the
    /// recipe's source indirection.
    FromLocalSource,
    /// Reading an already-exported snapshot; roots are relative to it.
    FromStagedExport,
}

/// Destination subdirectory inside the package being assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstDir {
    Root,
    Lib,
    Bin,
    Include,
}

impl DstDir {
    pub fn apply(&self, package_root: &Path) -> PathBuf {
        match self {
            DstDir::Root => package_root.to_path_buf(),
            DstDir::Lib => package_root.join("lib"),
            DstDir::Bin => package_root.join("bin"),
            DstDir::Include => package_root.join("include"),
        }
    }
}

/// One file-selection rule: copy everything matching `pattern` under
/// `src_root` into the `dst` subdirectory, optionally flattening paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRule {
    pub pattern: String,
    pub src_root: PathBuf,
    pub dst: DstDir,
    pub flatten: bool,
}

impl CopyRule {
    fn rooted(pattern: &str, src_root: &Path) -> Self {
        Self {
            pattern: pattern.to_string(),
            src_root: src_root.to_path_buf(),
            dst: DstDir::Root,
            flatten: false,
        }
    }

    fn flattened(pattern: String, src_root: &Path, dst: DstDir) -> Self {
        Self {
            pattern,
            src_root: src_root.to_path_buf(),
            dst,
            flatten: true,
        }
    }
}

/// Artifact staging rules plus the one file that must already exist at the
/// resolved path when they run. A missing build is never silently packaged
/// as empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRules {
    /// Relative path of the artifact whose absence fails the run.
    pub required: PathBuf,
    pub rules: Vec<CopyRule>,
}

/// Source-file rules for a (kind, context) pair.
///
/// Headers-only packages take the documentation files and `include/` and
/// nothing else; the main package additionally takes `src/`, `tools/`, and
/// formatting/ignore metadata; binary-only packages take no source at all
/// regardless of context.
pub fn source_rules(
    kind: PackageKind,
    context: CopyContext,
    source_indirection: &Path,
) -> Vec<CopyRule> {
    let root = match context {
        CopyContext::FromLocalSource => source_indirection.to_path_buf(),
        CopyContext::FromStagedExport => PathBuf::new(),
    };

    match kind {
        PackageKind::BinaryOnly => Vec::new(),
        PackageKind::HeadersOnly => vec![
            CopyRule::rooted("README.md", &root),
            CopyRule::rooted("LICENSE", &root),
            CopyRule::rooted("include/*", &root),
        ],
        PackageKind::Main => vec![
            CopyRule::rooted("README.md", &root),
            CopyRule::rooted("LICENSE", &root),
            CopyRule::rooted("include/*", &root),
            CopyRule::rooted("src/*", &root),
            CopyRule::rooted("tools/*", &root),
            CopyRule::rooted(".clang-format", &root),
            CopyRule::rooted(".gitignore", &root),
        ],
    }
}

/// Library output rules for `lib_name` (base name, no extension).
///
/// The platform library (`.lib` on Windows, `.a` on Linux) is required; on
/// Windows the dynamic-link companion comes along, plus debug symbols for
/// debug builds. Everything lands flattened in the package's `lib/`.
pub fn lib_output_rules(
    target: &PlatformTarget,
    layout: &BuildOutputLayout,
    lib_name: &str,
) -> ArtifactRules {
    let lib_file = match target.os {
        Os::Windows => format!("{lib_name}.lib"),
        Os::Linux => format!("{lib_name}.a"),
    };

    let mut rules = vec![CopyRule::flattened(
        lib_file.clone(),
        &layout.lib_dir,
        DstDir::Lib,
    )];

    if target.os == Os::Windows {
        rules.push(CopyRule::flattened(
            format!("{lib_name}.dll"),
            &layout.lib_dir,
            DstDir::Lib,
        ));
        if target.build_type == BuildType::Debug {
            rules.push(CopyRule::flattened(
                "*.pdb".to_string(),
                &layout.lib_dir,
                DstDir::Lib,
            ));
        }
    }

    ArtifactRules {
        required: layout.lib_dir.join(lib_file),
        rules,
    }
}

/// Executable output rules for `exec_name`.
///
/// On Windows `.exe` is appended unless the name already carries an
/// extension (kernel modules ship as `<name>.ko`); Linux executables have
/// none. Shared-library companions are copied from `lib/` into the same
/// `bin/` destination since an executable's runtime dependencies are
/// assumed colocated with it.
pub fn exec_output_rules(
    target: &PlatformTarget,
    layout: &BuildOutputLayout,
    exec_name: &str,
) -> ArtifactRules {
    let exec_file = match target.os {
        Os::Windows => {
            if Path::new(exec_name).extension().is_some() {
                exec_name.to_string()
            } else {
                format!("{exec_name}.exe")
            }
        }
        Os::Linux => exec_name.to_string(),
    };

    let mut rules = vec![CopyRule::flattened(
        exec_file.clone(),
        &layout.bin_dir,
        DstDir::Bin,
    )];

    match target.os {
        Os::Windows => {
            rules.push(CopyRule::flattened(
                "*.dll".to_string(),
                &layout.lib_dir,
                DstDir::Bin,
            ));
            if target.build_type == BuildType::Debug {
                rules.push(CopyRule::flattened(
                    "*.pdb".to_string(),
                    &layout.lib_dir,
                    DstDir::Bin,
                ));
            }
        }
        Os::Linux => {
            rules.push(CopyRule::flattened(
                "*.so*".to_string(),
                &layout.lib_dir,
                DstDir::Bin,
            ));
        }
    }

    ArtifactRules {
        required: layout.bin_dir.join(exec_file),
        rules,
    }
}

/// Deploy rules: pull `lib/*` and `bin/*` out of an assembled package, plus
/// `include/*` for headers-only packages.
pub fn deploy_rules(kind: PackageKind) -> Vec<CopyRule> {
    let root = PathBuf::new();
    let mut rules = vec![
        CopyRule::flattened("lib/*".to_string(), &root, DstDir::Lib),
        CopyRule::flattened("bin/*".to_string(), &root, DstDir::Bin),
    ];
    if kind == PackageKind::HeadersOnly {
        rules.push(CopyRule::flattened(
            "include/*".to_string(),
            &root,
            DstDir::Include,
        ));
    }
    rules
}
