//! Local enumerator: the key → file mapping of a directory tree.
//!
//! Only regular files are recorded; directories are traversed, symlinks are
//! neither followed nor recorded. The first entry that cannot be visited
//! aborts the walk so a partial tree is never mirrored.

use std::io::ErrorKind;
use std::path::Path;

use walkdir::WalkDir;

use s3mirror_core::{key, LocalFile, LocalFiles};

use crate::error::{io_err, SyncError};

/// Walk `root` and key every regular file below it.
///
/// `root` should already be absolute and normalized ([`key::to_path`]).
pub fn enumerate(root: &Path) -> Result<LocalFiles, SyncError> {
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(SyncError::NotADirectory {
                path: root.to_path_buf(),
            })
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(SyncError::RootNotFound {
                path: root.to_path_buf(),
            })
        }
        Err(err) => return Err(io_err(root, err)),
    }

    let mut files = LocalFiles::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|source| walk_err(root, source))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let size = entry
            .metadata()
            .map_err(|source| walk_err(root, source))?
            .len();
        let key = key::to_key(entry.path(), root)?;
        files.insert(
            key,
            LocalFile {
                path: entry.into_path(),
                size,
            },
        );
    }

    tracing::debug!("{} local file(s) under {}", files.len(), root.display());
    Ok(files)
}

fn walk_err(root: &Path, source: walkdir::Error) -> SyncError {
    let path = source
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    tracing::error!("error visiting '{}', aborting walk", path.display());
    SyncError::Walk { path, source }
}
