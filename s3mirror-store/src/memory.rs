//! In-process [`ObjectStore`] with real pagination semantics.

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::ops::Bound;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use s3mirror_core::{ObjectKey, RemoteObject};

use crate::error::{io_err, StoreError};
use crate::traits::{CannedAcl, ListPage, ObjectBody, ObjectStore, PutOptions};

pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// An object as held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub acl: CannedAcl,
    pub content_length: u64,
}

type Buckets = HashMap<String, BTreeMap<String, StoredObject>>;

pub struct MemoryStore {
    buckets: Mutex<Buckets>,
    page_size: usize,
    buckets_created: AtomicUsize,
    pages_served: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// A store whose listings return at most `page_size` objects per page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            page_size: page_size.max(1),
            buckets_created: AtomicUsize::new(0),
            pages_served: AtomicUsize::new(0),
        }
    }

    /// Seed an object directly, creating the bucket if needed.
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        let data = data.into();
        let object = StoredObject {
            content_length: data.len() as u64,
            data,
            acl: CannedAcl::Private,
        };
        self.lock()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), object);
    }

    /// Sorted keys of `bucket`; empty when it does not exist.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.lock().get(bucket).and_then(|objects| objects.get(key).cloned())
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.lock().contains_key(bucket)
    }

    /// How many times `create_bucket` actually created a bucket.
    pub fn buckets_created(&self) -> usize {
        self.buckets_created.load(Ordering::SeqCst)
    }

    /// How many listing pages have been served.
    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Buckets> {
        self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn missing_bucket(bucket: &str) -> StoreError {
    StoreError::BucketNotFound {
        bucket: bucket.to_string(),
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        Ok(self.has_bucket(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let mut buckets = self.lock();
        if !buckets.contains_key(bucket) {
            buckets.insert(bucket.to_string(), BTreeMap::new());
            self.buckets_created.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn list_page(
        &self,
        bucket: &str,
        continuation: Option<String>,
    ) -> Result<ListPage, StoreError> {
        let buckets = self.lock();
        let objects = buckets.get(bucket).ok_or_else(|| missing_bucket(bucket))?;

        // The token is the last key of the previous page.
        let lower = match &continuation {
            Some(token) => Bound::Excluded(token.as_str()),
            None => Bound::Unbounded,
        };
        let mut remaining = objects.range::<str, _>((lower, Bound::Unbounded));
        let page: Vec<RemoteObject> = remaining
            .by_ref()
            .take(self.page_size)
            .map(|(key, object)| RemoteObject {
                key: ObjectKey::from(key.as_str()),
                size: object.data.len() as u64,
            })
            .collect();
        let is_truncated = remaining.next().is_some();
        self.pages_served.fetch_add(1, Ordering::SeqCst);

        Ok(ListPage {
            next_token: is_truncated
                .then(|| page.last().map(|o| o.key.to_string()))
                .flatten(),
            objects: page,
            is_truncated,
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &ObjectKey,
        source: &Path,
        options: &PutOptions,
    ) -> Result<(), StoreError> {
        let data = tokio::fs::read(source)
            .await
            .map_err(|e| io_err(source, e))?;
        let mut buckets = self.lock();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| missing_bucket(bucket))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                data,
                acl: options.acl,
                content_length: options.content_length,
            },
        );
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &ObjectKey) -> Result<ObjectBody, StoreError> {
        let buckets = self.lock();
        let objects = buckets.get(bucket).ok_or_else(|| missing_bucket(bucket))?;
        let object = objects
            .get(key.as_str())
            .ok_or_else(|| StoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        Ok(Box::pin(Cursor::new(object.data.clone())))
    }

    async fn delete_object(&self, bucket: &str, key: &ObjectKey) -> Result<(), StoreError> {
        let mut buckets = self.lock();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| missing_bucket(bucket))?;
        objects.remove(key.as_str());
        Ok(())
    }

    fn object_url(&self, bucket: &str, key: &ObjectKey) -> String {
        format!("memory://{bucket}/{key}")
    }
}
