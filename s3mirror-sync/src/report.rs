//! Outcome of a push or pull run.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use s3mirror_core::ObjectKey;

use crate::error::SyncError;

/// Keys listed in [`SyncError::Incomplete`] before eliding the rest.
const PREVIEW_LIMIT: usize = 5;

/// Which side a run mirrors onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Local tree → bucket.
    Push,
    /// Bucket → local tree.
    Pull,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Push => write!(f, "push"),
            Direction::Pull => write!(f, "pull"),
        }
    }
}

/// A single per-key mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Upload,
    Download,
    DeleteRemote,
    DeleteLocal,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Upload => write!(f, "upload"),
            Op::Download => write!(f, "download"),
            Op::DeleteRemote => write!(f, "delete remote"),
            Op::DeleteLocal => write!(f, "delete local"),
        }
    }
}

/// What happened to one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionResult {
    /// The operation completed.
    Applied { op: Op, key: ObjectKey },
    /// `--dry-run` mode: the operation *would* have been performed.
    WouldApply { op: Op, key: ObjectKey },
}

impl ActionResult {
    pub fn op(&self) -> Op {
        match self {
            ActionResult::Applied { op, .. } | ActionResult::WouldApply { op, .. } => *op,
        }
    }

    pub fn key(&self) -> &ObjectKey {
        match self {
            ActionResult::Applied { key, .. } | ActionResult::WouldApply { key, .. } => key,
        }
    }
}

/// A key whose operation failed; the run carried on without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyFailure {
    pub op: Op,
    pub key: ObjectKey,
    pub error: String,
}

/// Summary of one push or pull.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub direction: Direction,
    pub bucket: String,
    pub root: PathBuf,
    pub dry_run: bool,
    pub bucket_created: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u128,
    pub local_count: usize,
    pub remote_count: usize,
    /// Keys present on both sides, left untouched.
    pub unchanged: usize,
    pub actions: Vec<ActionResult>,
    pub failures: Vec<KeyFailure>,
}

impl RunReport {
    pub(crate) fn new(direction: Direction, bucket: &str, root: PathBuf, dry_run: bool) -> Self {
        Self {
            direction,
            bucket: bucket.to_string(),
            root,
            dry_run,
            bucket_created: false,
            started_at: Utc::now(),
            duration_ms: 0,
            local_count: 0,
            remote_count: 0,
            unchanged: 0,
            actions: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Number of actions (applied or planned) of kind `op`.
    pub fn count(&self, op: Op) -> usize {
        self.actions.iter().filter(|a| a.op() == op).count()
    }

    /// Nothing was (or would be) changed and nothing failed.
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty() && self.failures.is_empty()
    }

    /// Turn isolated per-key failures into a run-level error.
    pub fn ensure_complete(&self) -> Result<(), SyncError> {
        if self.failures.is_empty() {
            return Ok(());
        }
        let mut preview: Vec<String> = self
            .failures
            .iter()
            .take(PREVIEW_LIMIT)
            .map(|f| format!("{} '{}'", f.op, f.key))
            .collect();
        if self.failures.len() > PREVIEW_LIMIT {
            preview.push(format!("+{} more", self.failures.len() - PREVIEW_LIMIT));
        }
        Err(SyncError::Incomplete {
            failed: self.failures.len(),
            attempted: self.failures.len() + self.actions.len(),
            preview: preview.join(", "),
        })
    }
}
