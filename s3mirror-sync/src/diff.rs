//! Key-presence set difference between the two sides of a mirror.
//!
//! Only presence matters: a key found on both sides lands in neither output,
//! whatever its content.

use std::collections::HashMap;

use s3mirror_core::ObjectKey;

/// Outcome of [`diff`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDiff<L, R> {
    /// Keys present locally but not remotely.
    pub local_only: HashMap<ObjectKey, L>,
    /// Keys present remotely but not locally.
    pub remote_only: HashMap<ObjectKey, R>,
    /// Number of keys present on both sides.
    pub in_both: usize,
}

impl<L, R> KeyDiff<L, R> {
    /// True when both sides already hold the same key set.
    pub fn is_empty(&self) -> bool {
        self.local_only.is_empty() && self.remote_only.is_empty()
    }
}

/// Split two mappings into their one-sided parts.
///
/// Linear in `local.len() + remote.len()`: every key costs one hash lookup.
pub fn diff<L, R>(
    local: HashMap<ObjectKey, L>,
    remote: HashMap<ObjectKey, R>,
) -> KeyDiff<L, R> {
    let (local_only, shared): (HashMap<_, _>, HashMap<_, _>) = local
        .into_iter()
        .partition(|(key, _)| !remote.contains_key(key));
    let remote_only = remote
        .into_iter()
        .filter(|(key, _)| !shared.contains_key(key))
        .collect();

    KeyDiff {
        local_only,
        remote_only,
        in_both: shared.len(),
    }
}
