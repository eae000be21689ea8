//! Path normalization.
//!
//! Every path reaching a [`FileSystem`](crate::FileSystem) is absolute and
//! normalized: no repeated separators, no `.` or `..` components.

use std::path::{Component, Path, PathBuf};

use crate::error::{Errno, Error, Result};

/// Normalize a path for lookups.
///
/// Collapses repeated separators, drops `.`, resolves `..` lexically (never
/// above `/`) and anchors relative paths at `/`.
///
/// Fails with `EINVAL` on an empty path or one containing a NUL byte.
pub fn normalize(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let raw = path.as_os_str();
    if raw.is_empty() {
        return Err(Error::new(Errno::EINVAL, "path must not be empty"));
    }
    if raw.as_encoded_bytes().contains(&0) {
        return Err(
            Error::new(Errno::EINVAL, "path must not contain null bytes").at(path),
        );
    }

    let mut result = PathBuf::from("/");
    for component in path.components() {
        match component {
            Component::Normal(name) => result.push(name),
            Component::ParentDir => {
                result.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    Ok(result)
}

/// Parent directory of a normalized path. The parent of `/` is `/`.
pub fn dirname(path: &Path) -> &Path {
    path.parent().unwrap_or(Path::new("/"))
}

/// Final component of a normalized path, `""` for `/`.
pub fn basename(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

/// True for `/`.
pub fn is_root(path: &Path) -> bool {
    path.parent().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/a//b/./c").unwrap(), PathBuf::from("/a/b/c"));
        assert_eq!(normalize("/a/b/../c").unwrap(), PathBuf::from("/a/c"));
        assert_eq!(normalize("/../..").unwrap(), PathBuf::from("/"));
        assert_eq!(normalize("a/b").unwrap(), PathBuf::from("/a/b"));
        assert_eq!(normalize("/a/").unwrap(), PathBuf::from("/a"));
        assert_eq!(normalize("//").unwrap(), PathBuf::from("/"));
    }

    #[test]
    fn test_normalize_rejects() {
        assert!(normalize("").unwrap_err().is(Errno::EINVAL));
        assert!(normalize("/a\0b").unwrap_err().is(Errno::EINVAL));
    }

    #[test]
    fn test_components() {
        let p = normalize("/a/b.txt").unwrap();
        assert_eq!(dirname(&p), Path::new("/a"));
        assert_eq!(basename(&p), "b.txt");
        assert_eq!(dirname(Path::new("/")), Path::new("/"));
        assert_eq!(basename(Path::new("/")), "");
        assert!(is_root(Path::new("/")));
        assert!(!is_root(&p));
    }
}
