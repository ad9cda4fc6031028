use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use s3mirror_core::{ObjectKey, RemoteObject};

use crate::error::StoreError;

/// Streamed object content.
pub type ObjectBody = Pin<Box<dyn AsyncRead + Send>>;

/// Canned access policy attached to uploaded objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannedAcl {
    Private,
    PublicRead,
}

/// Metadata sent along with an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    pub content_length: u64,
    pub acl: CannedAcl,
}

/// One page of a bucket listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<RemoteObject>,
    /// The provider has more objects after this page.
    pub is_truncated: bool,
    /// Token to pass to the next `list_page` call when truncated.
    pub next_token: Option<String>,
}

/// Remote operations used by a mirror run.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError>;

    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError>;

    /// Fetch one page. `continuation` is `None` for the first page.
    async fn list_page(
        &self,
        bucket: &str,
        continuation: Option<String>,
    ) -> Result<ListPage, StoreError>;

    /// Upload the file at `source` under `key`.
    async fn put_object(
        &self,
        bucket: &str,
        key: &ObjectKey,
        source: &Path,
        options: &PutOptions,
    ) -> Result<(), StoreError>;

    async fn get_object(&self, bucket: &str, key: &ObjectKey) -> Result<ObjectBody, StoreError>;

    /// Deleting a key that does not exist succeeds.
    async fn delete_object(&self, bucket: &str, key: &ObjectKey) -> Result<(), StoreError>;

    /// Public URL of an object. Pure; performs no request.
    fn object_url(&self, bucket: &str, key: &ObjectKey) -> String;
}
