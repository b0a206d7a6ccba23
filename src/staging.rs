//! File staging: glob-pattern copy with optional path flattening.
//!
//! This is the copy primitive the rule sets in [`crate::rules`] are executed
//! with. Patterns match relative paths under the source root, and `*`
//! crosses directory separators (so `include/*` picks up nested headers).
//! A pattern that matches nothing copies nothing and is not an error;
//! required-artifact checks are enforced separately by the assembler.

use globset::Glob;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::PackagingError;
use crate::rules::CopyRule;

/// Copy every file under `src_root` whose relative path matches `pattern`
/// into `dst_root`. With `flatten`, files land directly under `dst_root` by
/// file name; otherwise their relative paths are preserved. Returns the
/// number of files copied.
pub fn copy_glob(
    pattern: &str,
    src_root: &Path,
    dst_root: &Path,
    flatten: bool,
) -> Result<usize, PackagingError> {
    let matcher = Glob::new(pattern)
        .map_err(|e| PackagingError::config(format!("invalid copy pattern '{pattern}': {e}")))?
        .compile_matcher();

    if !src_root.is_dir() {
        return Ok(0);
    }

    let mut copied = 0usize;
    for entry in WalkDir::new(src_root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = match entry.path().strip_prefix(src_root) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        if !matcher.is_match(rel) {
            continue;
        }

        let dst = if flatten {
            match rel.file_name() {
                Some(name) => dst_root.join(name),
                None => continue,
            }
        } else {
            dst_root.join(rel)
        };

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &dst)?;
        copied += 1;
    }

    Ok(copied)
}

/// Execute an ordered rule list: each rule's source root is resolved against
/// `work_root`, its destination against `package_root`. Returns the total
/// number of files staged.
pub fn stage_rules(
    rules: &[CopyRule],
    work_root: &Path,
    package_root: &Path,
) -> Result<usize, PackagingError> {
    let mut staged = 0usize;
    for rule in rules {
        let src = resolve_root(work_root, &rule.src_root);
        let dst = rule.dst.apply(package_root);
        staged += copy_glob(&rule.pattern, &src, &dst, rule.flatten)?;
    }
    Ok(staged)
}

fn resolve_root(work_root: &Path, rule_root: &Path) -> std::path::PathBuf {
    if rule_root.as_os_str().is_empty() {
        work_root.to_path_buf()
    } else {
        work_root.join(rule_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::DstDir;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn exact_file_name_copies_one_file() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        touch(&src.join("README.md"));
        touch(&src.join("LICENSE"));

        let n = copy_glob("README.md", &src, &dst, false).unwrap();
        assert_eq!(n, 1);
        assert!(dst.join("README.md").exists());
        assert!(!dst.join("LICENSE").exists());
    }

    #[test]
    fn star_crosses_directory_separators() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        touch(&src.join("include/driver.h"));
        touch(&src.join("include/interface/ioctl.h"));
        touch(&src.join("src/module.c"));

        let n = copy_glob("include/*", &src, &dst, false).unwrap();
        assert_eq!(n, 2);
        assert!(dst.join("include/driver.h").exists());
        assert!(dst.join("include/interface/ioctl.h").exists());
        assert!(!dst.join("src/module.c").exists());
    }

    #[test]
    fn flatten_drops_directory_structure() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        touch(&src.join("deep/nested/libfoo.so.1"));

        let n = copy_glob("*.so*", &src, &dst, true).unwrap();
        assert_eq!(n, 1);
        assert!(dst.join("libfoo.so.1").exists());
        assert!(!dst.join("deep").exists());
    }

    #[test]
    fn missing_source_root_copies_nothing() {
        let tmp = TempDir::new().unwrap();
        let n = copy_glob("*", &tmp.path().join("nope"), &tmp.path().join("dst"), false).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn bad_pattern_is_a_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let err = copy_glob("a{b", tmp.path(), &tmp.path().join("dst"), false).unwrap_err();
        assert!(matches!(err, PackagingError::InvalidConfiguration(_)));
    }

    #[test]
    fn stage_rules_resolves_roots_and_destinations() {
        let tmp = TempDir::new().unwrap();
        let work = tmp.path().join("work");
        let pkg = tmp.path().join("pkg");
        touch(&work.join("project/README.md"));
        touch(&work.join("project/out/lib/foo.a"));

        let rules = vec![
            CopyRule {
                pattern: "README.md".to_string(),
                src_root: PathBuf::from("project"),
                dst: DstDir::Root,
                flatten: false,
            },
            CopyRule {
                pattern: "foo.a".to_string(),
                src_root: PathBuf::from("project/out/lib"),
                dst: DstDir::Lib,
                flatten: true,
            },
        ];

        let staged = stage_rules(&rules, &work, &pkg).unwrap();
        assert_eq!(staged, 2);
        assert!(pkg.join("README.md").exists());
        assert!(pkg.join("lib/foo.a").exists());
    }

    #[test]
    fn empty_rule_root_reads_the_work_root_itself() {
        let tmp = TempDir::new().unwrap();
        let work = tmp.path().join("work");
        let pkg = tmp.path().join("pkg");
        touch(&work.join("LICENSE"));

        let rules = vec![CopyRule {
            pattern: "LICENSE".to_string(),
            src_root: PathBuf::new(),
            dst: DstDir::Root,
            flatten: false,
        }];

        assert_eq!(stage_rules(&rules, &work, &pkg).unwrap(), 1);
        assert!(pkg.join("LICENSE").exists());
    }
}
