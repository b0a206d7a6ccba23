//! Packaging resolver for kernel-module build artifacts.
//!
//! This crate decides where build outputs live, which files belong in which
//! package variant, and what cache identity an assembled package gets. The
//! heavy lifting (compiling, storing packages, copying across machines) is
//! done by external collaborators; this crate owns the conventions.
//!
//! - **Platform validation** - requested OS vs. a recipe's supported set
//! - **Layout resolution** - canonical `build/<os>/<arch>/<build-type>`
//!   tree, with farm-folder prefixes for binary-only packages
//! - **Copy rule sets** - per-kind, per-context file selection
//! - **Assembly pipeline** - validate → export → build → package → deploy
//! - **Identity normalization** - erasing dimensions that don't affect
//!   binary compatibility so equivalent packages share one cache entry
//!
//! # Architecture
//!
//! ```text
//! recipe (TOML) ──> PackageRecipe ─────────────┐
//!                                              │
//! PlatformTarget ──> validate_os               │
//!                        │                     ▼
//!                        └──> Assembler ──> package tree + manifest
//!                              │   │   │
//!            layout::resolve ──┘   │   └── identity::normalize
//!            rules + staging ──────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use kmod_packager::assemble::{Assembler, WorkDirs};
//! use kmod_packager::buildtool::CmakeBuildTool;
//! use kmod_packager::platform::{BuildType, CompilerInfo, Os, PlatformTarget};
//! use kmod_packager::recipe::load_recipe;
//!
//! let recipe = load_recipe("tools/package.toml".as_ref())?;
//! let target = PlatformTarget::new(Os::Linux, "x86_64", BuildType::Release);
//! let assembler = Assembler::new(&recipe, target, "tools", CompilerInfo::default());
//! assembler.assemble(&CmakeBuildTool, &WorkDirs {
//!     export_dir: "work/export".into(),
//!     package_dir: "work/package".into(),
//! })?;
//! ```

pub mod assemble;
pub mod buildtool;
pub mod error;
pub mod identity;
pub mod layout;
pub mod platform;
pub mod recipe;
pub mod rules;
pub mod staging;

pub use assemble::{AssembledPackage, Assembler, WorkDirs};
pub use error::PackagingError;
pub use identity::{normalize, PackageIdentity};
pub use layout::{BuildOutputLayout, FarmFolders};
pub use platform::{BuildType, CompilerInfo, Os, PlatformTarget};
pub use recipe::{load_recipe, PackageKind, PackageRecipe};
