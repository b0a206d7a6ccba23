//! Package identity normalization.
//!
//! The identity is the lookup key the external package storage uses to
//! decide whether two packages are interchangeable. Dimensions that do not
//! affect binary compatibility for this project are deliberately erased to
//! the wildcard value so functionally equivalent packages collapse to one
//! cache entry: toolchain dimensions always (the artifacts are
//! compiler-independent), plus arch and build type for headers-only
//! packages (header content has no binary dependency on either).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::platform::{CompilerInfo, PlatformTarget};
use crate::recipe::PackageKind;

/// Wildcard value for an erased identity dimension.
pub const ANY: &str = "any";

/// Normalized identity dimensions of one assembled package.
///
/// Serialized as JSON for the storage collaborator; the compact form is
/// [`PackageIdentity::cache_key`] / [`PackageIdentity::digest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub os: String,
    pub arch: String,
    pub build_type: String,
    pub compiler: String,
    pub compiler_version: String,
    pub compiler_libcxx: String,
}

/// Compute the normalized identity for a packaging run.
///
/// Pure: the compiler info is accepted (it is part of the caller's build
/// environment) and discarded wholesale, which is the point.
pub fn normalize(
    kind: PackageKind,
    target: &PlatformTarget,
    _compiler: &CompilerInfo,
) -> PackageIdentity {
    let (arch, build_type) = match kind {
        PackageKind::HeadersOnly => (ANY.to_string(), ANY.to_string()),
        PackageKind::Main | PackageKind::BinaryOnly => {
            (target.arch.clone(), target.build_type.to_string())
        }
    };

    PackageIdentity {
        os: target.os.to_string(),
        arch,
        build_type,
        compiler: ANY.to_string(),
        compiler_version: ANY.to_string(),
        compiler_libcxx: ANY.to_string(),
    }
}

impl PackageIdentity {
    /// Stable single-line key, one `dim=value` pair per dimension.
    pub fn cache_key(&self) -> String {
        format!(
            "os={}/arch={}/build_type={}/compiler={}/compiler_version={}/compiler_libcxx={}",
            self.os,
            self.arch,
            self.build_type,
            self.compiler,
            self.compiler_version,
            self.compiler_libcxx
        )
    }

    /// Hex sha256 of the cache key, for storage systems that want
    /// fixed-width identifiers.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.cache_key().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
