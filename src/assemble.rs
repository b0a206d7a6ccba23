//! The packaging pipeline: validate → export → build → package → deploy.
//!
//! Stages run linearly with no branching back. The layout is computed once
//! per run and threaded through as an immutable value, never stored as
//! shared mutable state. The package stage takes an advisory lock on the
//! destination tree; concurrent runs against the same destination are a
//! caller bug and fail fast instead of interleaving.

use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::buildtool::BuildTool;
use crate::error::PackagingError;
use crate::identity::{normalize, PackageIdentity};
use crate::layout::{resolve, BuildOutputLayout};
use crate::platform::{validate_os, CompilerInfo, PlatformTarget};
use crate::recipe::{PackageKind, PackageMetadata, PackageRecipe};
use crate::rules::{deploy_rules, exec_output_rules, lib_output_rules, source_rules, CopyContext};
use crate::staging::stage_rules;

/// Manifest file written at the root of every assembled package.
pub const MANIFEST_FILE: &str = ".package.json";

/// Working directories for one run. Callers should hand out fresh
/// directories each run; nothing here deletes pre-existing content.
#[derive(Debug, Clone)]
pub struct WorkDirs {
    pub export_dir: PathBuf,
    pub package_dir: PathBuf,
}

/// Result of a completed run: where the package is and what went into it.
#[derive(Debug, Clone)]
pub struct AssembledPackage {
    pub package_dir: PathBuf,
    pub layout: BuildOutputLayout,
    pub identity: PackageIdentity,
    pub staged_files: usize,
    pub exported: bool,
    pub built: bool,
}

#[derive(Serialize)]
struct PackageManifest<'a> {
    name: &'a str,
    version: &'a str,
    kind: &'a str,
    identity: &'a PackageIdentity,
    cache_key: String,
    staged_files: usize,
    #[serde(flatten)]
    metadata: &'a PackageMetadata,
}

/// Drives one packaging run for one recipe and one platform target.
pub struct Assembler<'a> {
    recipe: &'a PackageRecipe,
    target: PlatformTarget,
    /// Directory the run is anchored at (the recipe's directory); the
    /// recipe's source indirection is resolved against it.
    project_root: PathBuf,
    compiler: CompilerInfo,
}

impl<'a> Assembler<'a> {
    pub fn new(
        recipe: &'a PackageRecipe,
        target: PlatformTarget,
        project_root: impl Into<PathBuf>,
        compiler: CompilerInfo,
    ) -> Self {
        Self {
            recipe,
            target,
            project_root: project_root.into(),
            compiler,
        }
    }

    fn name(&self) -> &str {
        &self.recipe.definition.name
    }

    fn kind(&self) -> PackageKind {
        self.recipe.definition.kind
    }

    /// Init → Validated. Must pass before any path computation or file
    /// operation; every public stage re-checks it.
    pub fn validate(&self) -> Result<(), PackagingError> {
        validate_os(
            self.name(),
            self.target.os,
            &self.recipe.definition.supported_os,
        )
    }

    fn should_export(&self) -> bool {
        match self.kind() {
            PackageKind::BinaryOnly => false,
            PackageKind::HeadersOnly => true,
            PackageKind::Main => self.recipe.definition.exports_source,
        }
    }

    /// Snapshot the project source into `export_dir`. Skipped (returns 0)
    /// for binary-only packages, which never carry source.
    pub fn export_source(&self, export_dir: &Path) -> Result<usize, PackagingError> {
        self.validate()?;

        if self.kind() == PackageKind::BinaryOnly {
            println!("[pkg:{}] export skipped (binary-only package)", self.name());
            return Ok(0);
        }

        let rules = source_rules(
            self.kind(),
            CopyContext::FromLocalSource,
            &self.recipe.definition.source_indirection,
        );
        let exported = stage_rules(&rules, &self.project_root, export_dir)?;
        println!(
            "[pkg:{}] exported {} source files to {}",
            self.name(),
            exported,
            export_dir.display()
        );
        Ok(exported)
    }

    /// Run the full pipeline and return the assembled package.
    pub fn assemble(
        &self,
        tool: &dyn BuildTool,
        dirs: &WorkDirs,
    ) -> Result<AssembledPackage, PackagingError> {
        self.validate()?;

        // Export stage.
        let exported = if self.should_export() {
            self.export_source(&dirs.export_dir)?;
            true
        } else {
            if self.kind() != PackageKind::BinaryOnly {
                println!("[pkg:{}] export skipped (not requested)", self.name());
            }
            false
        };

        // The root the staged source (and, for main packages, the build
        // outputs) live under for the rest of the run.
        let staged_root = if exported {
            dirs.export_dir.clone()
        } else {
            self.project_root
                .join(&self.recipe.definition.source_indirection)
        };

        let layout = resolve(
            self.kind(),
            &self.target,
            &self.recipe.definition.source_indirection,
            &self.recipe.farm,
        );

        // Build stage. Binary-only and headers-only artifacts are produced
        // externally; only the main package builds.
        let built = match self.kind() {
            PackageKind::BinaryOnly | PackageKind::HeadersOnly => {
                println!(
                    "[pkg:{}] build skipped ({} package)",
                    self.name(),
                    self.kind().as_str()
                );
                false
            }
            PackageKind::Main => {
                let build_root = staged_root.join(&layout.config_dir);
                println!(
                    "[pkg:{}] building tools/ into {}",
                    self.name(),
                    build_root.display()
                );
                tool.build(&staged_root.join("tools"), &build_root)?;
                true
            }
        };

        // Package stage.
        let staged_files = self.package(&layout, &staged_root, &dirs.package_dir)?;

        let identity = normalize(self.kind(), &self.target, &self.compiler);
        self.write_manifest(&dirs.package_dir, &identity, staged_files)?;

        println!(
            "[pkg:{}] staged {} files into {} (cache key {})",
            self.name(),
            staged_files,
            dirs.package_dir.display(),
            identity.cache_key()
        );

        Ok(AssembledPackage {
            package_dir: dirs.package_dir.clone(),
            layout,
            identity,
            staged_files,
            exported,
            built,
        })
    }

    fn package(
        &self,
        layout: &BuildOutputLayout,
        staged_root: &Path,
        package_dir: &Path,
    ) -> Result<usize, PackagingError> {
        fs::create_dir_all(package_dir)?;
        let _lock = DestinationLock::acquire(package_dir)?;

        let mut staged = stage_rules(
            &source_rules(
                self.kind(),
                CopyContext::FromStagedExport,
                &self.recipe.definition.source_indirection,
            ),
            staged_root,
            package_dir,
        )?;

        // Binary outputs resolve against the run anchor for binary-only
        // packages (the layout already carries the farm indirection) and
        // against the staged tree otherwise.
        let artifact_root = match self.kind() {
            PackageKind::BinaryOnly => self.project_root.as_path(),
            PackageKind::Main | PackageKind::HeadersOnly => staged_root,
        };

        if let Some(lib_name) = &self.recipe.lib_name {
            let out = lib_output_rules(&self.target, layout, lib_name);
            self.require_artifact(artifact_root, &out.required)?;
            staged += stage_rules(&out.rules, artifact_root, package_dir)?;
        }

        if let Some(exec_name) = &self.recipe.exec_name {
            let out = exec_output_rules(&self.target, layout, exec_name);
            self.require_artifact(artifact_root, &out.required)?;
            staged += stage_rules(&out.rules, artifact_root, package_dir)?;
        }

        Ok(staged)
    }

    fn require_artifact(&self, root: &Path, required: &Path) -> Result<(), PackagingError> {
        let resolved = root.join(required);
        if resolved.is_file() {
            return Ok(());
        }
        let absolute = if resolved.is_absolute() {
            resolved
        } else {
            std::env::current_dir()?.join(resolved)
        };
        Err(PackagingError::MissingArtifact { path: absolute })
    }

    fn write_manifest(
        &self,
        package_dir: &Path,
        identity: &PackageIdentity,
        staged_files: usize,
    ) -> Result<(), PackagingError> {
        let manifest = PackageManifest {
            name: self.name(),
            version: &self.recipe.definition.version,
            kind: self.kind().as_str(),
            identity,
            cache_key: identity.cache_key(),
            staged_files,
            metadata: &self.recipe.metadata,
        };
        let bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| PackagingError::config(format!("encoding package manifest: {e}")))?;
        fs::write(package_dir.join(MANIFEST_FILE), bytes)?;
        Ok(())
    }

    /// Deploy stage: copy `lib/*` and `bin/*` (and `include/*` for
    /// headers-only packages) out of an assembled package.
    pub fn deploy(&self, package_dir: &Path, deploy_dir: &Path) -> Result<usize, PackagingError> {
        self.validate()?;
        let deployed = stage_rules(&deploy_rules(self.kind()), package_dir, deploy_dir)?;
        println!(
            "[pkg:{}] deployed {} files to {}",
            self.name(),
            deployed,
            deploy_dir.display()
        );
        Ok(deployed)
    }
}

/// RAII guard for exclusive ownership of a package destination.
struct DestinationLock {
    _file: File,
    path: PathBuf,
}

impl DestinationLock {
    fn acquire(package_dir: &Path) -> Result<Self, PackagingError> {
        let path = package_dir.join(".lock");
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(PackagingError::Io(io::Error::new(
                io::ErrorKind::WouldBlock,
                format!(
                    "package destination is locked by another run: {}",
                    path.display()
                ),
            )));
        }

        Ok(Self { _file: file, path })
    }
}

impl Drop for DestinationLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{BuildType, Os};
    use crate::recipe::{PackageDefinition, PackageKind};
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn touch(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn recipe(
        kind: PackageKind,
        indirection: &str,
        exports_source: bool,
        lib_name: Option<&str>,
        exec_name: Option<&str>,
        oses: &[Os],
    ) -> PackageRecipe {
        PackageRecipe {
            definition: PackageDefinition {
                name: "pkg".to_string(),
                version: "0.0.1".to_string(),
                supported_os: oses.iter().copied().collect::<BTreeSet<_>>(),
                source_indirection: PathBuf::from(indirection),
                kind,
                exports_source,
            },
            metadata: Default::default(),
            farm: Default::default(),
            lib_name: lib_name.map(str::to_string),
            exec_name: exec_name.map(str::to_string),
        }
    }

    /// Writes the named files under the build root, like a real build would.
    struct FakeBuild {
        outputs: Vec<&'static str>,
        calls: RefCell<Vec<(PathBuf, PathBuf)>>,
    }

    impl FakeBuild {
        fn producing(outputs: &[&'static str]) -> Self {
            Self {
                outputs: outputs.to_vec(),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn none() -> Self {
            Self::producing(&[])
        }
    }

    impl BuildTool for FakeBuild {
        fn build(&self, source_root: &Path, build_root: &Path) -> Result<(), PackagingError> {
            self.calls
                .borrow_mut()
                .push((source_root.to_path_buf(), build_root.to_path_buf()));
            for out in &self.outputs {
                touch(&build_root.join(out), "bin");
            }
            Ok(())
        }
    }

    /// Project tree shaped like the kernel-module repo: recipe anchored in
    /// `tools/`, source one level up.
    fn project_tree(tmp: &TempDir) -> PathBuf {
        let project = tmp.path().join("project");
        touch(&project.join("README.md"), "readme");
        touch(&project.join("LICENSE"), "license");
        touch(&project.join("include/driver.h"), "h");
        touch(&project.join("include/interface/ioctl.h"), "h");
        touch(&project.join("src/module.c"), "c");
        touch(&project.join("tools/CMakeLists.txt"), "cmake");
        project
    }

    fn work_dirs(tmp: &TempDir) -> WorkDirs {
        WorkDirs {
            export_dir: tmp.path().join("export"),
            package_dir: tmp.path().join("package"),
        }
    }

    #[test]
    fn main_package_end_to_end_on_linux_release() {
        let tmp = TempDir::new().unwrap();
        let project = project_tree(&tmp);
        let recipe = recipe(PackageKind::Main, "..", true, Some("foo"), None, &[Os::Linux]);
        let target = PlatformTarget::new(Os::Linux, "x86_64", BuildType::Release);
        let tool = FakeBuild::producing(&["lib/foo.a"]);
        let dirs = work_dirs(&tmp);

        let assembler = Assembler::new(
            &recipe,
            target,
            project.join("tools"),
            CompilerInfo::default(),
        );
        let assembled = assembler.assemble(&tool, &dirs).unwrap();

        assert!(assembled.exported);
        assert!(assembled.built);
        let pkg = &dirs.package_dir;
        for staged in [
            "README.md",
            "LICENSE",
            "include/driver.h",
            "include/interface/ioctl.h",
            "src/module.c",
            "tools/CMakeLists.txt",
            "lib/foo.a",
        ] {
            assert!(pkg.join(staged).is_file(), "missing {staged}");
        }

        // Build ran against the exported snapshot's tools/ subtree.
        let calls = tool.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, dirs.export_dir.join("tools"));
        assert_eq!(
            calls[0].1,
            dirs.export_dir.join("build/linux/x86_64/release")
        );

        assert_eq!(assembled.identity.arch, "x86_64");
        assert_eq!(assembled.identity.compiler, "any");
    }

    #[test]
    fn missing_library_fails_naming_the_resolved_path() {
        let tmp = TempDir::new().unwrap();
        let project = project_tree(&tmp);
        let recipe = recipe(PackageKind::Main, "..", true, Some("foo"), None, &[Os::Linux]);
        let target = PlatformTarget::new(Os::Linux, "x86_64", BuildType::Release);
        let dirs = work_dirs(&tmp);

        let assembler = Assembler::new(
            &recipe,
            target,
            project.join("tools"),
            CompilerInfo::default(),
        );
        let err = assembler.assemble(&FakeBuild::none(), &dirs).unwrap_err();

        match err {
            PackagingError::MissingArtifact { path } => {
                assert_eq!(
                    path,
                    dirs.export_dir.join("build/linux/x86_64/release/lib/foo.a")
                );
            }
            other => panic!("expected MissingArtifact, got {other:?}"),
        }
    }

    #[test]
    fn binary_only_windows_x86_debug_stages_exe_dll_pdb_and_no_source() {
        let tmp = TempDir::new().unwrap();
        let project = project_tree(&tmp);
        // The recipe's directory must exist for `..` components to resolve.
        fs::create_dir_all(project.join("tools/bin_pkg")).unwrap();
        // Farm outputs: 32-bit debug folder, two levels above the recipe dir.
        let farm_cfg = project.join("build/bfvs32/build/windows/x86/debug");
        touch(&farm_cfg.join("bin/bar.exe"), "exe");
        touch(&farm_cfg.join("lib/helper.dll"), "dll");
        touch(&farm_cfg.join("lib/helper.pdb"), "pdb");

        let recipe = recipe(
            PackageKind::BinaryOnly,
            "../..",
            false,
            None,
            Some("bar"),
            &[Os::Windows],
        );
        let target = PlatformTarget::new(Os::Windows, "x86", BuildType::Debug);
        let tool = FakeBuild::none();
        let dirs = work_dirs(&tmp);

        let assembler = Assembler::new(
            &recipe,
            target,
            project.join("tools/bin_pkg"),
            CompilerInfo::default(),
        );
        let assembled = assembler.assemble(&tool, &dirs).unwrap();

        assert!(!assembled.exported);
        assert!(!assembled.built);
        assert!(tool.calls.borrow().is_empty());

        let pkg = &dirs.package_dir;
        assert!(pkg.join("bin/bar.exe").is_file());
        assert!(pkg.join("bin/helper.dll").is_file());
        assert!(pkg.join("bin/helper.pdb").is_file());
        assert!(!pkg.join("README.md").exists());
        assert!(!pkg.join("src").exists());
        assert!(!pkg.join("tools").exists());
    }

    #[test]
    fn headers_only_packages_headers_without_build_or_source() {
        let tmp = TempDir::new().unwrap();
        let project = project_tree(&tmp);
        let recipe = recipe(PackageKind::HeadersOnly, "..", false, None, None, &[Os::Linux]);
        let target = PlatformTarget::new(Os::Linux, "x86_64", BuildType::Debug);
        let tool = FakeBuild::none();
        let dirs = work_dirs(&tmp);

        let assembler = Assembler::new(
            &recipe,
            target,
            project.join("tools"),
            CompilerInfo::default(),
        );
        let assembled = assembler.assemble(&tool, &dirs).unwrap();

        // Headers-only always exports, never builds.
        assert!(assembled.exported);
        assert!(!assembled.built);
        assert!(tool.calls.borrow().is_empty());

        let pkg = &dirs.package_dir;
        assert!(pkg.join("README.md").is_file());
        assert!(pkg.join("include/driver.h").is_file());
        assert!(!pkg.join("src").exists());
        assert!(!pkg.join("tools").exists());

        assert_eq!(assembled.identity.arch, "any");
        assert_eq!(assembled.identity.build_type, "any");
    }

    #[test]
    fn unsupported_platform_aborts_before_any_file_operation() {
        let tmp = TempDir::new().unwrap();
        let project = project_tree(&tmp);
        let recipe = recipe(PackageKind::Main, "..", true, None, None, &[Os::Linux]);
        let target = PlatformTarget::new(Os::Windows, "x86_64", BuildType::Release);
        let dirs = work_dirs(&tmp);

        let assembler = Assembler::new(
            &recipe,
            target,
            project.join("tools"),
            CompilerInfo::default(),
        );
        let err = assembler.assemble(&FakeBuild::none(), &dirs).unwrap_err();
        assert!(matches!(err, PackagingError::UnsupportedPlatform { .. }));
        assert!(!dirs.export_dir.exists());
        assert!(!dirs.package_dir.exists());
    }

    #[test]
    fn manifest_records_identity_and_counts() {
        let tmp = TempDir::new().unwrap();
        let project = project_tree(&tmp);
        let recipe = recipe(PackageKind::HeadersOnly, "..", false, None, None, &[Os::Linux]);
        let target = PlatformTarget::new(Os::Linux, "x86_64", BuildType::Release);
        let dirs = work_dirs(&tmp);

        let assembler = Assembler::new(
            &recipe,
            target,
            project.join("tools"),
            CompilerInfo::default(),
        );
        let assembled = assembler.assemble(&FakeBuild::none(), &dirs).unwrap();

        let manifest: serde_json::Value =
            serde_json::from_slice(&fs::read(dirs.package_dir.join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(manifest["name"], "pkg");
        assert_eq!(manifest["kind"], "headers");
        assert_eq!(manifest["identity"]["arch"], "any");
        assert_eq!(
            manifest["staged_files"].as_u64().unwrap() as usize,
            assembled.staged_files
        );
    }

    #[test]
    fn deploy_pulls_lib_bin_and_headers_for_headers_packages() {
        let tmp = TempDir::new().unwrap();
        let pkg = tmp.path().join("pkg");
        touch(&pkg.join("lib/foo.a"), "a");
        touch(&pkg.join("bin/bar"), "b");
        touch(&pkg.join("include/driver.h"), "h");

        let deploy_dir = tmp.path().join("deploy");
        let headers = recipe(PackageKind::HeadersOnly, "..", false, None, None, &[Os::Linux]);
        let assembler = Assembler::new(
            &headers,
            PlatformTarget::new(Os::Linux, "x86_64", BuildType::Release),
            tmp.path(),
            CompilerInfo::default(),
        );

        let n = assembler.deploy(&pkg, &deploy_dir).unwrap();
        assert_eq!(n, 3);
        assert!(deploy_dir.join("lib/foo.a").is_file());
        assert!(deploy_dir.join("bin/bar").is_file());
        assert!(deploy_dir.join("include/driver.h").is_file());
    }

    #[test]
    fn locked_destination_rejects_a_second_run() {
        let tmp = TempDir::new().unwrap();
        let project = project_tree(&tmp);
        let recipe = recipe(PackageKind::HeadersOnly, "..", false, None, None, &[Os::Linux]);
        let dirs = work_dirs(&tmp);

        fs::create_dir_all(&dirs.package_dir).unwrap();
        let held = DestinationLock::acquire(&dirs.package_dir).unwrap();

        let assembler = Assembler::new(
            &recipe,
            PlatformTarget::new(Os::Linux, "x86_64", BuildType::Release),
            project.join("tools"),
            CompilerInfo::default(),
        );
        let err = assembler.assemble(&FakeBuild::none(), &dirs).unwrap_err();
        assert!(matches!(err, PackagingError::Io(_)));
        drop(held);
    }
}
