use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use kmod_packager::assemble::{Assembler, WorkDirs};
use kmod_packager::buildtool::CmakeBuildTool;
use kmod_packager::platform::{BuildType, CompilerInfo, Os, PlatformTarget};
use kmod_packager::recipe::{load_recipe, PackageRecipe};

fn usage() -> &'static str {
    "Usage:\n  kmod-packager package <recipe.toml> <windows|linux> <arch> <debug|release> <work_dir>\n  kmod-packager export <recipe.toml> <windows|linux> <arch> <debug|release> <export_dir>\n  kmod-packager deploy <recipe.toml> <windows|linux> <arch> <debug|release> <package_dir> <deploy_dir>\n  kmod-packager identity <recipe.toml> <windows|linux> <arch> <debug|release>"
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.as_slice() {
        [cmd, recipe, os, arch, build_type, work_dir] if cmd == "package" => {
            let (recipe, root) = load(recipe)?;
            let target = parse_target(os, arch, build_type)?;
            run_package(&recipe, target, &root, Path::new(work_dir))
        }
        [cmd, recipe, os, arch, build_type, export_dir] if cmd == "export" => {
            let (recipe, root) = load(recipe)?;
            let target = parse_target(os, arch, build_type)?;
            let assembler = Assembler::new(&recipe, target, root, CompilerInfo::default());
            assembler
                .export_source(Path::new(export_dir))
                .context("exporting source snapshot")?;
            Ok(())
        }
        [cmd, recipe, os, arch, build_type, package_dir, deploy_dir] if cmd == "deploy" => {
            let (recipe, root) = load(recipe)?;
            let target = parse_target(os, arch, build_type)?;
            let assembler = Assembler::new(&recipe, target, root, CompilerInfo::default());
            assembler
                .deploy(Path::new(package_dir), Path::new(deploy_dir))
                .context("deploying package contents")?;
            Ok(())
        }
        [cmd, recipe, os, arch, build_type] if cmd == "identity" => {
            let (recipe, _root) = load(recipe)?;
            let target = parse_target(os, arch, build_type)?;
            print_identity(&recipe, &target)
        }
        _ => bail!(usage()),
    }
}

/// Load a recipe and anchor the run at the recipe's directory, so source
/// indirections resolve the same way no matter where the tool is invoked.
fn load(recipe_path: &str) -> Result<(PackageRecipe, PathBuf)> {
    let path = Path::new(recipe_path);
    let recipe =
        load_recipe(path).with_context(|| format!("loading recipe '{}'", path.display()))?;
    let root = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    Ok((recipe, root))
}

fn parse_target(os: &str, arch: &str, build_type: &str) -> Result<PlatformTarget> {
    let os: Os = os.parse()?;
    let build_type: BuildType = build_type.parse()?;
    if arch.trim().is_empty() {
        bail!("architecture must not be empty");
    }
    Ok(PlatformTarget::new(os, arch, build_type))
}

fn run_package(
    recipe: &PackageRecipe,
    target: PlatformTarget,
    root: &Path,
    work_dir: &Path,
) -> Result<()> {
    let dirs = WorkDirs {
        export_dir: work_dir.join("export"),
        package_dir: work_dir.join("package"),
    };

    let assembler = Assembler::new(recipe, target, root, CompilerInfo::default());
    let assembled = assembler
        .assemble(&CmakeBuildTool, &dirs)
        .with_context(|| format!("assembling '{}'", recipe.definition.name))?;

    println!(
        "[pkg:{}] package ready at {}",
        recipe.definition.name,
        assembled.package_dir.display()
    );
    Ok(())
}

fn print_identity(recipe: &PackageRecipe, target: &PlatformTarget) -> Result<()> {
    let identity = kmod_packager::identity::normalize(
        recipe.definition.kind,
        target,
        &CompilerInfo::default(),
    );
    println!("{}", serde_json::to_string_pretty(&identity)?);
    println!("cache key: {}", identity.cache_key());
    println!("digest:    {}", identity.digest());
    Ok(())
}
