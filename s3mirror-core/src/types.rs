//! Domain types shared by both sides of a mirror.
//!
//! Local paths are always `PathBuf`; keys are always [`ObjectKey`].

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Canonical, root-relative identifier shared by local files and remote
/// objects. Segments are always separated by `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(pub String);

impl ObjectKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ObjectKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ObjectKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ObjectKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A regular file found under the local root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Absolute, normalized path on disk.
    pub path: PathBuf,
    /// Size in bytes at enumeration time.
    pub size: u64,
}

/// An object found in the bucket. No content hash is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteObject {
    pub key: ObjectKey,
    pub size: u64,
}

/// Key mapping for the local side of one run.
pub type LocalFiles = HashMap<ObjectKey, LocalFile>;

/// Key mapping for the remote side of one run.
pub type RemoteFiles = HashMap<ObjectKey, RemoteObject>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
