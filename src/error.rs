//! Error types for packaging runs.
//!
//! Every error here is terminal for the current run: there is no retry
//! policy, and partially staged destinations are not rolled back. Callers
//! package into a fresh destination and re-invoke after fixing the cause.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving, staging, or assembling a package.
#[derive(Debug, Error)]
pub enum PackagingError {
    /// The requested OS is not in the package's supported set.
    #[error("platform '{requested}' is not supported by '{package}' (supported: {supported})")]
    UnsupportedPlatform {
        package: String,
        requested: String,
        supported: String,
    },

    /// The packaging definition itself is malformed (e.g. an empty
    /// supported-OS set, an unknown package kind, a bad copy pattern).
    #[error("invalid packaging configuration: {0}")]
    InvalidConfiguration(String),

    /// An expected library/executable file is absent at package time.
    /// Carries the full resolved path for operator diagnosis.
    #[error("expected build artifact missing: {}", path.display())]
    MissingArtifact { path: PathBuf },

    /// Propagated verbatim from the external build tool.
    #[error("build tool failed: {0}")]
    Build(String),

    /// Propagated from file staging; fatal to the current stage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackagingError {
    /// Convenience constructor for configuration diagnostics.
    pub fn config(msg: impl Into<String>) -> Self {
        PackagingError::InvalidConfiguration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PackagingError>;
