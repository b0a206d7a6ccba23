//! Package recipes: the declarative definition of one package variant.
//!
//! A recipe is a TOML file living next to the project it packages. It names
//! the package, declares which operating systems it supports, which variant
//! it is (main, binary-only, headers-only), and where the project source
//! tree sits relative to the recipe. Everything in here is plain data; the
//! pipeline in [`crate::assemble`] interprets it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PackagingError;
use crate::layout::FarmFolders;
use crate::platform::Os;

/// Packaging variant. Determines which pipeline stages run and which copy
/// rules apply. Fixed once a recipe is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageKind {
    /// Full package: source plus locally built outputs.
    Main,
    /// Pre-built outputs fetched from the build farm; no source, no build.
    BinaryOnly,
    /// Interface headers only; no build, no binary dependency.
    HeadersOnly,
}

impl PackageKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PackageKind::Main => "main",
            PackageKind::BinaryOnly => "binary",
            PackageKind::HeadersOnly => "headers",
        }
    }
}

/// The read-only definition driving one packaging run.
#[derive(Debug, Clone)]
pub struct PackageDefinition {
    pub name: String,
    pub version: String,
    pub supported_os: BTreeSet<Os>,
    /// Relative path from the recipe directory to the project source tree
    /// (the folder holding `src/`, `include/`, `tools/`).
    pub source_indirection: PathBuf,
    pub kind: PackageKind,
    pub exports_source: bool,
}

/// Descriptive recipe fields. Pure data; carried into the package manifest
/// but never interpreted by the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageMetadata {
    pub license: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub topics: Vec<String>,
}

/// A fully loaded recipe: definition, artifact names, metadata, and the
/// farm-folder table (defaulted unless the recipe overrides it).
#[derive(Debug, Clone)]
pub struct PackageRecipe {
    pub definition: PackageDefinition,
    pub metadata: PackageMetadata,
    pub farm: FarmFolders,
    /// Library base name (no extension); enables the library output rules.
    pub lib_name: Option<String>,
    /// Executable base name; enables the executable output rules.
    pub exec_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecipeToml {
    package: PackageToml,
    #[serde(default)]
    metadata: PackageMetadata,
    #[serde(default)]
    farm: Option<FarmFolders>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackageToml {
    name: String,
    version: String,
    kind: String,
    supported_os: Vec<String>,
    source_dir: Option<String>,
    export_source: Option<bool>,
    lib_name: Option<String>,
    exec_name: Option<String>,
}

/// Load and validate a recipe file.
///
/// Parse failures, unknown fields, unknown kinds, and unknown OS names are
/// all configuration errors naming the file, so a broken recipe fails before
/// any path computation.
pub fn load_recipe(path: &Path) -> Result<PackageRecipe, PackagingError> {
    let raw = fs::read_to_string(path)?;
    let parsed: RecipeToml = toml::from_str(&raw).map_err(|e| {
        PackagingError::config(format!("parsing recipe '{}': {e}", path.display()))
    })?;

    recipe_from_toml(parsed, path)
}

fn recipe_from_toml(parsed: RecipeToml, path: &Path) -> Result<PackageRecipe, PackagingError> {
    let pkg = parsed.package;

    let kind = match pkg.kind.trim().to_ascii_lowercase().as_str() {
        "main" => PackageKind::Main,
        "binary" | "bin" => PackageKind::BinaryOnly,
        "headers" => PackageKind::HeadersOnly,
        other => {
            return Err(PackagingError::config(format!(
                "recipe '{}': unknown package kind '{}' (expected 'main', 'binary', or 'headers')",
                path.display(),
                other
            )))
        }
    };

    if pkg.name.trim().is_empty() {
        return Err(PackagingError::config(format!(
            "recipe '{}': package name must not be empty",
            path.display()
        )));
    }

    let mut supported_os = BTreeSet::new();
    for os in &pkg.supported_os {
        supported_os.insert(os.parse::<Os>().map_err(|e| {
            PackagingError::config(format!("recipe '{}': {e}", path.display()))
        })?);
    }
    if supported_os.is_empty() {
        return Err(PackagingError::config(format!(
            "recipe '{}': supported_os must contain 'windows', 'linux', or both",
            path.display()
        )));
    }

    let source_indirection = PathBuf::from(pkg.source_dir.unwrap_or_else(|| "..".to_string()));

    Ok(PackageRecipe {
        definition: PackageDefinition {
            name: pkg.name,
            version: pkg.version,
            supported_os,
            source_indirection,
            kind,
            exports_source: pkg.export_source.unwrap_or(false),
        },
        metadata: parsed.metadata,
        farm: parsed.farm.unwrap_or_default(),
        lib_name: pkg.lib_name,
        exec_name: pkg.exec_name,
    })
}
