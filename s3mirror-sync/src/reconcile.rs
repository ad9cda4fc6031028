//! Reconciler: bucket check, enumeration, diff, then deletions and transfers.
//!
//! ## Run protocol
//!
//! 1. Ensure the bucket exists (create it when absent).
//! 2. Enumerate the local tree and the bucket concurrently.
//! 3. Diff the two key sets.
//! 4. Delete everything only present on the target side.
//! 5. Transfer everything only present on the source side.
//!
//! Steps 4 and 5 run each key through a bounded pool. A failing key is
//! recorded in the [`RunReport`] and the remaining keys still run.
//!
//! The per-operation deadline bounds request setup and the gap between body
//! chunks, never a whole transfer.

use std::collections::HashMap;
use std::ffi::OsString;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use s3mirror_core::{key, Config, LocalFile, LocalFiles, ObjectKey, RemoteFiles};
use s3mirror_store::{CannedAcl, ObjectBody, ObjectStore, PutOptions};

use crate::diff::diff;
use crate::error::{io_err, SyncError};
use crate::guard::OpGuard;
use crate::report::{ActionResult, Direction, KeyFailure, Op, RunReport};
use crate::{local, remote};

/// Read buffer for streamed downloads.
const CHUNK_SIZE: usize = 64 * 1024;

/// Knobs for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Upper bound on in-flight per-key operations.
    pub concurrency: usize,
    /// Deadline for each storage call.
    pub op_timeout: Duration,
    /// Plan only; mutate nothing.
    pub dry_run: bool,
}

impl SyncOptions {
    pub fn from_config(config: &Config, dry_run: bool) -> Self {
        Self {
            concurrency: config.concurrency,
            op_timeout: config.op_timeout(),
            dry_run,
        }
    }
}

/// Bucket status after [`Reconciler::ensure_bucket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketState {
    Existing,
    Created,
    /// Absent and left absent (dry-run).
    Missing,
}

/// One line of `list` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedObject {
    pub key: ObjectKey,
    pub size: u64,
    pub url: String,
}

pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    options: SyncOptions,
    guard: OpGuard,
    tmp_seq: AtomicU64,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        options: SyncOptions,
        cancel: CancellationToken,
    ) -> Self {
        let guard = OpGuard::new(cancel, options.op_timeout);
        Self {
            store,
            bucket: bucket.into(),
            options,
            guard,
            tmp_seq: AtomicU64::new(0),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Create the bucket if it does not exist; a no-op otherwise.
    pub async fn ensure_bucket(&self) -> Result<BucketState, SyncError> {
        let exists = self
            .guard
            .run("bucket_exists", self.store.bucket_exists(&self.bucket))
            .await?;
        if exists {
            tracing::info!("bucket '{}' exists", self.bucket);
            return Ok(BucketState::Existing);
        }

        tracing::info!("bucket '{}' does not exist", self.bucket);
        if self.options.dry_run {
            tracing::info!("[dry-run] would create bucket '{}'", self.bucket);
            return Ok(BucketState::Missing);
        }
        self.guard
            .run("create_bucket", self.store.create_bucket(&self.bucket))
            .await?;
        tracing::info!("bucket '{}' created", self.bucket);
        Ok(BucketState::Created)
    }

    /// Make the bucket's key set equal to the local tree's.
    pub async fn push(&self, root: &Path) -> Result<RunReport, SyncError> {
        let started = Instant::now();
        let root = key::to_path(root)?;
        let mut report = RunReport::new(
            Direction::Push,
            &self.bucket,
            root.clone(),
            self.options.dry_run,
        );

        let (local, remote) = self.enumerate(&root, &mut report).await?;
        let diff = diff(local, remote);
        report.unchanged = diff.in_both;
        tracing::info!(
            "push plan: {} to delete remotely, {} to upload, {} unchanged",
            diff.remote_only.len(),
            diff.local_only.len(),
            diff.in_both
        );

        self.apply(Op::DeleteRemote, diff.remote_only, &mut report, |key, _| {
            self.delete_remote(key)
        })
        .await?;
        self.apply(Op::Upload, diff.local_only, &mut report, |key, file| {
            self.upload(key, file)
        })
        .await?;

        report.duration_ms = started.elapsed().as_millis();
        Ok(report)
    }

    /// Make the local tree's key set equal to the bucket's.
    pub async fn pull(&self, root: &Path) -> Result<RunReport, SyncError> {
        let started = Instant::now();
        let root = key::to_path(root)?;
        let mut report = RunReport::new(
            Direction::Pull,
            &self.bucket,
            root.clone(),
            self.options.dry_run,
        );

        let (local, mut remote) = self.enumerate(&root, &mut report).await?;
        remote.retain(|key, _| {
            let marker = key::is_directory_marker(key.as_str());
            if marker {
                tracing::debug!("folder marker '{key}' has no local file");
            }
            !marker
        });
        let diff = diff(local, remote);
        report.unchanged = diff.in_both;
        tracing::info!(
            "pull plan: {} to delete locally, {} to download, {} unchanged",
            diff.local_only.len(),
            diff.remote_only.len(),
            diff.in_both
        );

        self.apply(Op::DeleteLocal, diff.local_only, &mut report, |key, file| {
            self.delete_local(&root, key, file)
        })
        .await?;
        self.apply(Op::Download, diff.remote_only, &mut report, |key, _| {
            self.download(&root, key)
        })
        .await?;

        report.duration_ms = started.elapsed().as_millis();
        Ok(report)
    }

    /// Every object in the bucket with its public URL, sorted by key.
    pub async fn list(&self) -> Result<Vec<ListedObject>, SyncError> {
        if self.ensure_bucket().await? == BucketState::Missing {
            return Ok(Vec::new());
        }
        let objects = remote::enumerate(self.store.as_ref(), &self.bucket, &self.guard).await?;

        let mut listed: Vec<ListedObject> = objects
            .into_values()
            .map(|object| ListedObject {
                url: self.store.object_url(&self.bucket, &object.key),
                key: object.key,
                size: object.size,
            })
            .collect();
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listed)
    }

    // -----------------------------------------------------------------------
    // Enumeration
    // -----------------------------------------------------------------------

    async fn enumerate(
        &self,
        root: &Path,
        report: &mut RunReport,
    ) -> Result<(LocalFiles, RemoteFiles), SyncError> {
        let state = self.ensure_bucket().await?;
        report.bucket_created = state == BucketState::Created;

        let local = {
            let root = root.to_path_buf();
            async move {
                tokio::task::spawn_blocking(move || local::enumerate(&root))
                    .await
                    .map_err(|e| SyncError::Join(e.to_string()))?
            }
        };
        let remote = async {
            if state == BucketState::Missing {
                return Ok(RemoteFiles::new());
            }
            remote::enumerate(self.store.as_ref(), &self.bucket, &self.guard).await
        };

        let (local, remote) = tokio::try_join!(local, remote)?;
        report.local_count = local.len();
        report.remote_count = remote.len();
        Ok((local, remote))
    }

    // -----------------------------------------------------------------------
    // Apply
    // -----------------------------------------------------------------------

    async fn apply<T, F, Fut>(
        &self,
        op: Op,
        items: HashMap<ObjectKey, T>,
        report: &mut RunReport,
        run: F,
    ) -> Result<(), SyncError>
    where
        F: Fn(ObjectKey, T) -> Fut,
        Fut: Future<Output = Result<(), SyncError>>,
    {
        let mut items: Vec<(ObjectKey, T)> = items.into_iter().collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));

        if self.options.dry_run {
            for (key, _) in items {
                tracing::info!("[dry-run] would {op} '{key}'");
                report.actions.push(ActionResult::WouldApply { op, key });
            }
            return Ok(());
        }

        let mut outcomes: Vec<(ObjectKey, Result<(), SyncError>)> = stream::iter(items)
            .map(|(key, item)| {
                let fut = run(key.clone(), item);
                async move { (key, fut.await) }
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, outcome) in outcomes {
            match outcome {
                Ok(()) => report.actions.push(ActionResult::Applied { op, key }),
                Err(SyncError::Cancelled) => {}
                Err(err) => {
                    tracing::warn!("{op} of '{key}' failed: {err}");
                    report.failures.push(KeyFailure {
                        op,
                        key,
                        error: err.to_string(),
                    });
                }
            }
        }

        if self.guard.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    fn next_tmp_path(&self, target: &Path) -> PathBuf {
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        tmp_path(target, seq)
    }

    async fn upload(&self, key: ObjectKey, file: LocalFile) -> Result<(), SyncError> {
        let meta = tokio::fs::metadata(&file.path)
            .await
            .map_err(|e| io_err(&file.path, e))?;
        let options = PutOptions {
            content_length: meta.len(),
            acl: CannedAcl::PublicRead,
        };

        tracing::info!("uploading '{key}' ({} bytes)", options.content_length);
        // Stalls are bounded by the store's connect/read limits.
        self.guard
            .cancellable(
                self.store
                    .put_object(&self.bucket, &key, &file.path, &options),
            )
            .await?;
        tracing::info!("uploaded '{key}'");
        Ok(())
    }

    async fn delete_remote(&self, key: ObjectKey) -> Result<(), SyncError> {
        tracing::info!("remote '{key}' scheduled for deletion");
        self.guard
            .run("delete_object", self.store.delete_object(&self.bucket, &key))
            .await?;
        tracing::info!("deleted remote '{key}'");
        Ok(())
    }

    async fn delete_local(
        &self,
        root: &Path,
        key: ObjectKey,
        file: LocalFile,
    ) -> Result<(), SyncError> {
        if self.guard.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        tracing::info!("local '{key}' scheduled for deletion");
        match tokio::fs::remove_file(&file.path).await {
            Ok(()) => tracing::info!("deleted local '{key}'"),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("local '{key}' already gone");
            }
            Err(err) => return Err(io_err(&file.path, err)),
        }
        prune_empty_parents(root, &file.path).await;
        Ok(())
    }

    async fn download(&self, root: &Path, key: ObjectKey) -> Result<(), SyncError> {
        let target = key::resolve(root, &key)?;
        let tmp = self.next_tmp_path(&target);

        tracing::info!("downloading '{key}'");
        let result = async {
            let mut body = self
                .guard
                .run("get_object", self.store.get_object(&self.bucket, &key))
                .await?;
            self.write_body(&target, &tmp, &mut body).await
        }
        .await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        result?;

        tracing::info!("downloaded '{key}'");
        Ok(())
    }

    /// Stream `body` into `tmp`, then rename over `target`.
    ///
    /// Each read is guarded separately: the deadline is an idle limit.
    async fn write_body(
        &self,
        target: &Path,
        tmp: &Path,
        body: &mut ObjectBody,
    ) -> Result<(), SyncError> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(tmp)
            .await
            .map_err(|e| io_err(tmp, e))?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let read = self
                .guard
                .run("read_body", async {
                    body.read(&mut buf).await.map_err(|e| io_err(target, e))
                })
                .await?;
            if read == 0 {
                break;
            }
            file.write_all(&buf[..read])
                .await
                .map_err(|e| io_err(tmp, e))?;
        }
        file.flush().await.map_err(|e| io_err(tmp, e))?;
        drop(file);

        replace_empty_dir(target).await?;
        tokio::fs::rename(tmp, target)
            .await
            .map_err(|e| io_err(target, e))?;
        Ok(())
    }
}

/// Hidden sibling a download is streamed into before the rename.
///
/// `.{name}.{pid}.{seq}.s3mirror.tmp`; unique per download within a run.
fn tmp_path(target: &Path, seq: u64) -> PathBuf {
    let mut name = OsString::from(".");
    if let Some(file_name) = target.file_name() {
        name.push(file_name);
    }
    name.push(format!(".{}.{seq}.s3mirror.tmp", std::process::id()));
    target.with_file_name(name)
}

/// Remove an empty directory sitting where a file is about to land.
async fn replace_empty_dir(target: &Path) -> Result<(), SyncError> {
    match tokio::fs::symlink_metadata(target).await {
        Ok(meta) if meta.is_dir() => {
            tracing::debug!("replacing empty directory {}", target.display());
            tokio::fs::remove_dir(target)
                .await
                .map_err(|e| io_err(target, e))
        }
        _ => Ok(()),
    }
}

/// Remove directories emptied by deleting `file`, up to (not including) `root`.
async fn prune_empty_parents(root: &Path, file: &Path) {
    let mut dir = file.parent();
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        if tokio::fs::remove_dir(current).await.is_err() {
            break;
        }
        tracing::debug!("removed empty directory {}", current.display());
        dir = current.parent();
    }
}
