//! Key codec: maps filesystem paths under a root to canonical keys and back.
//!
//! Keys are root-relative and always use `/` as the separator, so the same
//! tree produces the same keys on every platform. All functions here are pure
//! apart from [`to_path`], which reads the current directory for relative
//! arguments.

use std::path::{Component, Path, PathBuf};

use crate::error::KeyError;
use crate::types::ObjectKey;

/// Key separator, independent of the host platform.
pub const SEPARATOR: char = '/';

/// Strip `root` from `path` and join the remaining components with `/`.
///
/// Both arguments are expected to be absolute and normalized (see
/// [`to_path`]). The root itself has no key.
pub fn to_key(path: &Path, root: &Path) -> Result<ObjectKey, KeyError> {
    let outside = || KeyError::OutsideRoot {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    };
    let relative = path.strip_prefix(root).map_err(|_| outside())?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| KeyError::NonUtf8 {
                    path: path.to_path_buf(),
                })?;
                segments.push(part);
            }
            _ => return Err(outside()),
        }
    }

    if segments.is_empty() {
        return Err(KeyError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(ObjectKey(segments.join("/")))
}

/// Resolve a user-supplied path argument to an absolute, normalized path.
///
/// Relative arguments are joined onto the current directory. `.` and `..`
/// are removed lexically; symlinks are not resolved.
pub fn to_path(arg: &Path) -> Result<PathBuf, KeyError> {
    if arg.as_os_str().is_empty() {
        return Err(KeyError::EmptyPath);
    }
    let absolute = if arg.is_absolute() {
        arg.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(KeyError::CurrentDir)?
            .join(arg)
    };
    Ok(normalize(&absolute))
}

/// Lexically remove `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Inverse of [`to_key`]: the local path a key occupies under `root`.
///
/// Keys that would land outside `root` (absolute, `..`, `.`, empty
/// segments) are rejected.
pub fn resolve(root: &Path, key: &ObjectKey) -> Result<PathBuf, KeyError> {
    let unsafe_key = || KeyError::UnsafeKey {
        key: key.0.clone(),
    };
    if key.0.is_empty() {
        return Err(unsafe_key());
    }

    let mut path = root.to_path_buf();
    for segment in key.0.split(SEPARATOR) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => path.push(segment),
            _ => return Err(unsafe_key()),
        }
    }
    Ok(path)
}

/// Keys ending in `/` are folder placeholders, not files.
pub fn is_directory_marker(key: &str) -> bool {
    key.ends_with(SEPARATOR)
}
