use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use s3mirror_core::ObjectKey;
use s3mirror_store::{ListPage, MemoryStore, ObjectBody, ObjectStore, PutOptions, StoreError};
use s3mirror_sync::{ActionResult, Op, Reconciler, SyncError, SyncOptions};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const BUCKET: &str = "default";

fn options(dry_run: bool) -> SyncOptions {
    SyncOptions {
        concurrency: 4,
        op_timeout: Duration::from_secs(5),
        dry_run,
    }
}

fn reconciler(store: Arc<dyn ObjectStore>, dry_run: bool) -> Reconciler {
    Reconciler::new(store, BUCKET, options(dry_run), CancellationToken::new())
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn local_keys(root: &Path) -> HashSet<String> {
    s3mirror_sync::local::enumerate(root)
        .unwrap()
        .into_keys()
        .map(|k| k.0)
        .collect()
}

fn remote_keys(store: &MemoryStore) -> HashSet<String> {
    store.keys(BUCKET).into_iter().collect()
}

#[tokio::test]
async fn push_into_missing_bucket_creates_it_and_uploads_everything() {
    let store = Arc::new(MemoryStore::new());
    let root = TempDir::new().unwrap();
    write(root.path(), "a.txt", "A");
    write(root.path(), "sub/b.txt", "BB");

    let report = reconciler(store.clone(), false).push(root.path()).await.unwrap();

    assert!(report.bucket_created);
    assert_eq!(store.buckets_created(), 1);
    assert_eq!(remote_keys(&store), local_keys(root.path()));
    assert_eq!(store.object(BUCKET, "sub/b.txt").unwrap().data, b"BB");
    assert_eq!(report.count(Op::Upload), 2);
    assert!(report.ensure_complete().is_ok());
}

#[tokio::test]
async fn push_deletes_remote_only_and_uploads_local_only() {
    let store = Arc::new(MemoryStore::new());
    store.insert(BUCKET, "y.txt", "remote-y");
    store.insert(BUCKET, "z.txt", "remote-z");
    let root = TempDir::new().unwrap();
    write(root.path(), "x.txt", "x");
    write(root.path(), "y.txt", "local-y");

    let report = reconciler(store.clone(), false).push(root.path()).await.unwrap();

    assert_eq!(
        report.actions,
        vec![
            ActionResult::Applied {
                op: Op::DeleteRemote,
                key: ObjectKey::from("z.txt"),
            },
            ActionResult::Applied {
                op: Op::Upload,
                key: ObjectKey::from("x.txt"),
            },
        ]
    );
    assert_eq!(report.unchanged, 1);
    // Presence only: the shared key keeps its remote content.
    assert_eq!(store.object(BUCKET, "y.txt").unwrap().data, b"remote-y");
    assert_eq!(remote_keys(&store), local_keys(root.path()));
}

#[tokio::test]
async fn pull_deletes_local_only_and_downloads_remote_only() {
    let store = Arc::new(MemoryStore::new());
    store.insert(BUCKET, "q.txt", "q");
    store.insert(BUCKET, "deep/nested/r.txt", "r");
    let root = TempDir::new().unwrap();
    write(root.path(), "p.txt", "p");
    write(root.path(), "q.txt", "local-q");

    let report = reconciler(store.clone(), false).pull(root.path()).await.unwrap();

    assert!(!root.path().join("p.txt").exists());
    assert_eq!(
        fs::read_to_string(root.path().join("deep/nested/r.txt")).unwrap(),
        "r"
    );
    assert_eq!(fs::read_to_string(root.path().join("q.txt")).unwrap(), "local-q");
    assert_eq!(report.count(Op::DeleteLocal), 1);
    assert_eq!(report.count(Op::Download), 1);
    assert_eq!(local_keys(root.path()), remote_keys(&store));
}

#[tokio::test]
async fn second_push_is_a_noop() {
    let store = Arc::new(MemoryStore::with_page_size(2));
    let root = TempDir::new().unwrap();
    for i in 0..5 {
        write(root.path(), &format!("f{i}.txt"), "x");
    }
    let r = reconciler(store.clone(), false);

    r.push(root.path()).await.unwrap();
    let again = r.push(root.path()).await.unwrap();

    assert!(again.is_noop());
    assert!(!again.bucket_created);
    assert_eq!(again.unchanged, 5);
}

#[tokio::test]
async fn second_pull_is_a_noop() {
    let store = Arc::new(MemoryStore::new());
    store.insert(BUCKET, "a/b/c.txt", "c");
    let root = TempDir::new().unwrap();
    let r = reconciler(store, false);

    r.pull(root.path()).await.unwrap();
    let again = r.pull(root.path()).await.unwrap();
    assert!(again.is_noop());
}

#[tokio::test]
async fn dry_run_push_changes_nothing() {
    let store = Arc::new(MemoryStore::new());
    store.insert(BUCKET, "stale.txt", "s");
    let root = TempDir::new().unwrap();
    write(root.path(), "fresh.txt", "f");

    let report = reconciler(store.clone(), true).push(root.path()).await.unwrap();

    assert_eq!(remote_keys(&store), HashSet::from(["stale.txt".to_string()]));
    assert_eq!(report.count(Op::DeleteRemote), 1);
    assert_eq!(report.count(Op::Upload), 1);
    assert!(report
        .actions
        .iter()
        .all(|a| matches!(a, ActionResult::WouldApply { .. })));
}

#[tokio::test]
async fn dry_run_pull_changes_nothing() {
    let store = Arc::new(MemoryStore::new());
    store.insert(BUCKET, "remote.txt", "r");
    let root = TempDir::new().unwrap();
    write(root.path(), "local.txt", "l");

    let report = reconciler(store, true).pull(root.path()).await.unwrap();

    assert_eq!(local_keys(root.path()), HashSet::from(["local.txt".to_string()]));
    assert_eq!(report.actions.len(), 2);
}

#[tokio::test]
async fn list_on_missing_bucket_creates_it_and_is_empty() {
    let store = Arc::new(MemoryStore::new());
    let listed = reconciler(store.clone(), false).list().await.unwrap();
    assert!(listed.is_empty());
    assert!(store.has_bucket(BUCKET));
}

#[tokio::test]
async fn missing_root_fails_before_any_mutation() {
    let store = Arc::new(MemoryStore::new());
    store.insert(BUCKET, "keep.txt", "k");
    let dir = TempDir::new().unwrap();

    let err = reconciler(store.clone(), false)
        .push(&dir.path().join("absent"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::RootNotFound { .. }), "got: {err}");
    assert_eq!(remote_keys(&store), HashSet::from(["keep.txt".to_string()]));
}

/// Delegates to a [`MemoryStore`] but rejects uploads of chosen keys.
struct FlakyStore {
    inner: MemoryStore,
    reject: HashSet<String>,
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        self.inner.bucket_exists(bucket).await
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.inner.create_bucket(bucket).await
    }

    async fn list_page(
        &self,
        bucket: &str,
        continuation: Option<String>,
    ) -> Result<ListPage, StoreError> {
        self.inner.list_page(bucket, continuation).await
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &ObjectKey,
        source: &Path,
        options: &PutOptions,
    ) -> Result<(), StoreError> {
        if self.reject.contains(key.as_str()) {
            return Err(StoreError::Request {
                op: "put_object",
                message: "access denied".into(),
            });
        }
        self.inner.put_object(bucket, key, source, options).await
    }

    async fn get_object(&self, bucket: &str, key: &ObjectKey) -> Result<ObjectBody, StoreError> {
        self.inner.get_object(bucket, key).await
    }

    async fn delete_object(&self, bucket: &str, key: &ObjectKey) -> Result<(), StoreError> {
        self.inner.delete_object(bucket, key).await
    }

    fn object_url(&self, bucket: &str, key: &ObjectKey) -> String {
        self.inner.object_url(bucket, key)
    }
}

#[tokio::test]
async fn one_failed_upload_does_not_stop_the_rest() {
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new(),
        reject: HashSet::from(["b.txt".to_string()]),
    });
    let root = TempDir::new().unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        write(root.path(), name, name);
    }

    let report = reconciler(store.clone(), false).push(root.path()).await.unwrap();

    assert_eq!(report.count(Op::Upload), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key.as_str(), "b.txt");
    assert!(report.failures[0].error.contains("access denied"));

    let mut keys = store.inner.keys(BUCKET);
    keys.sort();
    assert_eq!(keys, ["a.txt", "c.txt"]);

    let err = report.ensure_complete().unwrap_err();
    assert!(matches!(err, SyncError::Incomplete { failed: 1, attempted: 3, .. }));
}

/// Claims a truncated listing but never hands out a token.
struct BrokenPager;

#[async_trait]
impl ObjectStore for BrokenPager {
    async fn bucket_exists(&self, _bucket: &str) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn create_bucket(&self, _bucket: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_page(
        &self,
        _bucket: &str,
        _continuation: Option<String>,
    ) -> Result<ListPage, StoreError> {
        Ok(ListPage {
            objects: Vec::new(),
            is_truncated: true,
            next_token: None,
        })
    }

    async fn put_object(
        &self,
        _bucket: &str,
        _key: &ObjectKey,
        _source: &Path,
        _options: &PutOptions,
    ) -> Result<(), StoreError> {
        panic!("no mutation expected");
    }

    async fn get_object(&self, _bucket: &str, _key: &ObjectKey) -> Result<ObjectBody, StoreError> {
        panic!("no mutation expected");
    }

    async fn delete_object(&self, _bucket: &str, _key: &ObjectKey) -> Result<(), StoreError> {
        panic!("no mutation expected");
    }

    fn object_url(&self, bucket: &str, key: &ObjectKey) -> String {
        format!("broken://{bucket}/{key}")
    }
}

#[tokio::test]
async fn truncated_page_without_token_aborts_the_run() {
    let root = TempDir::new().unwrap();
    write(root.path(), "a.txt", "a");

    let err = reconciler(Arc::new(BrokenPager), false)
        .push(root.path())
        .await
        .unwrap_err();
    assert!(
        matches!(err, SyncError::MissingContinuation { page: 1, .. }),
        "got: {err}"
    );
}

#[tokio::test]
async fn cancelled_run_stops_before_touching_the_bucket() {
    let store = Arc::new(MemoryStore::new());
    let root = TempDir::new().unwrap();
    write(root.path(), "a.txt", "a");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = Reconciler::new(store.clone(), BUCKET, options(false), cancel)
        .push(root.path())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Cancelled));
    assert!(!store.has_bucket(BUCKET));
}

#[tokio::test]
async fn push_removes_folder_markers_and_list_shows_them_first() {
    let store = Arc::new(MemoryStore::new());
    store.insert(BUCKET, "photos/", "");
    let root = TempDir::new().unwrap();
    write(root.path(), "x.txt", "x");
    let r = reconciler(store.clone(), false);

    let listed: Vec<_> = r.list().await.unwrap().into_iter().map(|o| o.key.0).collect();
    assert_eq!(listed, ["photos/"]);

    let report = r.push(root.path()).await.unwrap();
    assert_eq!(report.count(Op::DeleteRemote), 1);
    assert_eq!(remote_keys(&store), HashSet::from(["x.txt".to_string()]));
}

#[tokio::test]
async fn pull_ignores_folder_markers() {
    let store = Arc::new(MemoryStore::new());
    store.insert(BUCKET, "photos/", "");
    store.insert(BUCKET, "photos/a.jpg", "jpg");
    let root = TempDir::new().unwrap();
    let r = reconciler(store, false);

    let first = r.pull(root.path()).await.unwrap();
    assert_eq!(first.count(Op::Download), 1);
    assert!(first.failures.is_empty());
    assert_eq!(local_keys(root.path()), HashSet::from(["photos/a.jpg".to_string()]));

    let again = r.pull(root.path()).await.unwrap();
    assert!(again.is_noop());
}

#[tokio::test]
async fn pull_replaces_a_directory_emptied_by_deletion_with_a_file() {
    let store = Arc::new(MemoryStore::new());
    store.insert(BUCKET, "a", "now a file");
    let root = TempDir::new().unwrap();
    write(root.path(), "a/b", "nested");

    let report = pull_into(&store, root.path()).await;

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert!(root.path().join("a").is_file());
    assert_eq!(fs::read_to_string(root.path().join("a")).unwrap(), "now a file");
    assert_eq!(local_keys(root.path()), remote_keys(&store));
}

#[tokio::test]
async fn pull_replaces_a_preexisting_empty_directory() {
    let store = Arc::new(MemoryStore::new());
    store.insert(BUCKET, "c", "c");
    let root = TempDir::new().unwrap();
    fs::create_dir(root.path().join("c")).unwrap();

    let report = pull_into(&store, root.path()).await;

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert!(root.path().join("c").is_file());
}

#[tokio::test]
async fn pull_deletion_prunes_emptied_directories() {
    let store = Arc::new(MemoryStore::new());
    store.create_bucket(BUCKET).await.unwrap();
    let root = TempDir::new().unwrap();
    write(root.path(), "old/deep/x.txt", "x");

    pull_into(&store, root.path()).await;

    assert!(file_names(root.path()).is_empty());
}

#[tokio::test]
async fn keys_shaped_like_temp_files_download_independently() {
    let store = Arc::new(MemoryStore::new());
    store.insert(BUCKET, "a", "plain");
    store.insert(BUCKET, "a.s3mirror.tmp", "lookalike");
    let root = TempDir::new().unwrap();

    let report = pull_into(&store, root.path()).await;

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(fs::read_to_string(root.path().join("a")).unwrap(), "plain");
    assert_eq!(
        fs::read_to_string(root.path().join("a.s3mirror.tmp")).unwrap(),
        "lookalike"
    );
    assert_eq!(file_names(root.path()), ["a", "a.s3mirror.tmp"]);
}

async fn pull_into(store: &Arc<MemoryStore>, root: &Path) -> s3mirror_sync::RunReport {
    reconciler(store.clone(), false).pull(root).await.unwrap()
}

/// Serves every object body in `chunks` pieces, `gap` apart; with `stall`
/// set, the body stops after the first piece without ending.
struct SlowBodyStore {
    inner: MemoryStore,
    chunks: usize,
    gap: Duration,
    stall: bool,
}

#[async_trait]
impl ObjectStore for SlowBodyStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        self.inner.bucket_exists(bucket).await
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.inner.create_bucket(bucket).await
    }

    async fn list_page(
        &self,
        bucket: &str,
        continuation: Option<String>,
    ) -> Result<ListPage, StoreError> {
        self.inner.list_page(bucket, continuation).await
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &ObjectKey,
        source: &Path,
        options: &PutOptions,
    ) -> Result<(), StoreError> {
        self.inner.put_object(bucket, key, source, options).await
    }

    async fn get_object(&self, bucket: &str, key: &ObjectKey) -> Result<ObjectBody, StoreError> {
        let data = self
            .inner
            .object(bucket, key.as_str())
            .map(|o| o.data)
            .unwrap_or_default();
        let (mut tx, rx) = tokio::io::duplex(64 * 1024);
        let (chunks, gap, stall) = (self.chunks, self.gap, self.stall);
        tokio::spawn(async move {
            let size = data.len().div_ceil(chunks).max(1);
            for (i, piece) in data.chunks(size).enumerate() {
                if i > 0 {
                    tokio::time::sleep(gap).await;
                }
                if tx.write_all(piece).await.is_err() {
                    return;
                }
                if stall {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
            }
        });
        Ok(Box::pin(rx))
    }

    async fn delete_object(&self, bucket: &str, key: &ObjectKey) -> Result<(), StoreError> {
        self.inner.delete_object(bucket, key).await
    }

    fn object_url(&self, bucket: &str, key: &ObjectKey) -> String {
        self.inner.object_url(bucket, key)
    }
}

fn slow_reconciler(store: Arc<SlowBodyStore>, op_timeout: Duration) -> Reconciler {
    let options = SyncOptions {
        concurrency: 2,
        op_timeout,
        dry_run: false,
    };
    Reconciler::new(store, BUCKET, options, CancellationToken::new())
}

#[tokio::test]
async fn slow_download_that_keeps_moving_completes() {
    let inner = MemoryStore::new();
    inner.insert(BUCKET, "big.bin", vec![7u8; 4000]);
    let store = Arc::new(SlowBodyStore {
        inner,
        chunks: 4,
        gap: Duration::from_millis(150),
        stall: false,
    });
    let root = TempDir::new().unwrap();

    // 450ms of transfer against a 300ms limit.
    let report = slow_reconciler(store, Duration::from_millis(300))
        .pull(root.path())
        .await
        .unwrap();

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(fs::read(root.path().join("big.bin")).unwrap(), vec![7u8; 4000]);
}

#[tokio::test]
async fn stalled_download_times_out_and_leaves_nothing_behind() {
    let inner = MemoryStore::new();
    inner.insert(BUCKET, "stuck.bin", vec![1u8; 100]);
    let store = Arc::new(SlowBodyStore {
        inner,
        chunks: 2,
        gap: Duration::from_millis(10),
        stall: true,
    });
    let root = TempDir::new().unwrap();

    let report = slow_reconciler(store, Duration::from_millis(200))
        .pull(root.path())
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].error.contains("timed out"), "{:?}", report.failures);
    assert!(file_names(root.path()).is_empty());
}
