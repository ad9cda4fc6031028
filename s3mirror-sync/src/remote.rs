//! Remote enumerator: the key → object mapping of a bucket.
//!
//! [`pages`] is a finite stream of listing pages; the continuation token
//! lives inside the stream, so each call starts a fresh listing.
//! [`enumerate`] folds every page into one mapping.

use futures::stream::{self, Stream, TryStreamExt};

use s3mirror_core::RemoteFiles;
use s3mirror_store::{ListPage, ObjectStore};

use crate::error::SyncError;
use crate::guard::OpGuard;

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Every page of `bucket`, in provider order, until one is not truncated.
pub fn pages<'a>(
    store: &'a dyn ObjectStore,
    bucket: &'a str,
    guard: &'a OpGuard,
) -> impl Stream<Item = Result<ListPage, SyncError>> + 'a {
    stream::try_unfold((Cursor::Start, 0usize), move |(cursor, served)| async move {
        let token = match cursor {
            Cursor::Done => return Ok(None),
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
        };

        let page = guard.run("list_page", store.list_page(bucket, token)).await?;
        let served = served + 1;
        tracing::debug!(
            "listed page {served} of '{bucket}' ({} object(s))",
            page.objects.len()
        );

        let next = match (page.is_truncated, &page.next_token) {
            (false, _) => Cursor::Done,
            (true, Some(token)) => Cursor::Next(token.clone()),
            (true, None) => {
                return Err(SyncError::MissingContinuation {
                    bucket: bucket.to_string(),
                    page: served,
                })
            }
        };
        Ok::<_, SyncError>(Some((page, (next, served))))
    })
}

/// Fold the full listing of `bucket` into one mapping.
///
/// Folder placeholder keys (trailing `/`) are kept: they are objects, so
/// push deletes them and list prints them.
pub async fn enumerate(
    store: &dyn ObjectStore,
    bucket: &str,
    guard: &OpGuard,
) -> Result<RemoteFiles, SyncError> {
    let objects = pages(store, bucket, guard)
        .try_fold(RemoteFiles::new(), |mut acc, page| async move {
            for object in page.objects {
                acc.insert(object.key.clone(), object);
            }
            Ok(acc)
        })
        .await?;

    tracing::debug!("{} remote object(s) in '{bucket}'", objects.len());
    Ok(objects)
}
