//! Path normalization utilities
//!
//! Dependency paths are the identity key of fingerprints in both the artifact
//! cache and the snapshot store, so they are normalized the same way
//! everywhere: made absolute and lexically cleaned. Symlinks are not resolved;
//! canonicalization would fail for outputs that have not been built yet.

use std::path::{Component, Path, PathBuf};

/// Default build-state directory name
pub const STATE_DIR: &str = ".cpdigest";

/// Normalize a path to use '/' as separator (for cross-platform consistency)
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Make a path relative to the root directory
pub fn make_relative(path: &Path, root: &Path) -> Option<String> {
    path.strip_prefix(root).ok().map(normalize_path)
}

/// Resolve `path` against `base` and collapse `.` and `..` components
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                if !out.pop() && !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Normalize a dependency path against the current working directory
pub fn normalize_dependency_path(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(absolutize(path, Path::new("/")));
    }
    let cwd = std::env::current_dir()?;
    Ok(absolutize(path, &cwd))
}

/// Get the state directory for a given root
pub fn state_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        let path = Path::new("com/acme/Foo.class");
        assert_eq!(normalize_path(path), "com/acme/Foo.class");
    }

    #[test]
    fn test_make_relative() {
        let root = Path::new("/project/target/classes");
        let path = Path::new("/project/target/classes/com/acme/Foo.class");
        assert_eq!(
            make_relative(path, root),
            Some("com/acme/Foo.class".to_string())
        );
    }

    #[test]
    fn test_make_relative_not_under_root() {
        let root = Path::new("/project");
        let path = Path::new("/other/file.rs");
        assert_eq!(make_relative(path, root), None);
    }

    #[test]
    fn test_absolutize_relative() {
        let base = Path::new("/work/module");
        assert_eq!(
            absolutize(Path::new("target/classes"), base),
            PathBuf::from("/work/module/target/classes")
        );
    }

    #[test]
    fn test_absolutize_collapses_dots() {
        let base = Path::new("/work/module");
        assert_eq!(
            absolutize(Path::new("./../other/./lib.jar"), base),
            PathBuf::from("/work/other/lib.jar")
        );
    }

    #[test]
    fn test_absolutize_parent_of_root() {
        let base = Path::new("/");
        assert_eq!(absolutize(Path::new("/../lib.jar"), base), PathBuf::from("/lib.jar"));
    }

    #[test]
    fn test_equivalent_spellings_normalize_equal() {
        let a = normalize_dependency_path(Path::new("/out/./lib.jar")).unwrap();
        let b = normalize_dependency_path(Path::new("/out/x/../lib.jar")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, PathBuf::from("/out/lib.jar"));
    }

    #[test]
    fn test_relative_becomes_absolute() {
        let p = normalize_dependency_path(Path::new("lib.jar")).unwrap();
        assert!(p.is_absolute());
        assert!(p.ends_with("lib.jar"));
    }

    #[test]
    fn test_state_dir() {
        let root = Path::new("/project");
        assert_eq!(state_dir(root), PathBuf::from("/project/.cpdigest"));
    }
}
