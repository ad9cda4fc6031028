//! [`ObjectStore`] backed by the AWS SDK.
//!
//! Works against AWS itself or any S3-compatible endpoint configured through
//! [`Config::endpoint`].

use std::path::Path;

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration, ObjectCannedAcl};
use aws_sdk_s3::Client;

use s3mirror_core::{Config, ObjectKey, RemoteObject};

use crate::error::StoreError;
use crate::traits::{CannedAcl, ListPage, ObjectBody, ObjectStore, PutOptions};
use crate::url::{public_url, LEGACY_REGION};

pub struct S3Store {
    client: Client,
    region: String,
    endpoint: Option<String>,
    path_style: bool,
}

impl S3Store {
    /// Build a client from the default credential/region chain, with region,
    /// endpoint and addressing style taken from `config`.
    pub async fn connect(config: &Config) -> Self {
        // Connect and per-read limits only; no whole-operation deadline.
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(config.op_timeout())
            .read_timeout(config.op_timeout())
            .build();
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).timeout_config(timeouts);
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;
        let region = shared
            .region()
            .map(|r| r.as_ref().to_string())
            .unwrap_or_else(|| LEGACY_REGION.to_string());

        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        tracing::debug!(
            "s3 client ready (region {region}, endpoint {})",
            config.endpoint.as_deref().unwrap_or("aws")
        );

        Self {
            client: Client::from_conf(builder.build()),
            region,
            endpoint: config.endpoint.clone(),
            path_style: config.path_style,
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let not_found = err.as_service_error().is_some_and(|e| e.is_not_found())
                    || err
                        .raw_response()
                        .is_some_and(|r| r.status().as_u16() == 404);
                if not_found {
                    Ok(false)
                } else {
                    Err(request_err("head_bucket", err))
                }
            }
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if self.endpoint.is_none() && self.region != LEGACY_REGION {
            let location = CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build();
            request = request.create_bucket_configuration(location);
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_bucket_already_owned_by_you()) =>
            {
                tracing::debug!("bucket '{bucket}' already owned, treating as created");
                Ok(())
            }
            Err(err) => Err(request_err("create_bucket", err)),
        }
    }

    async fn list_page(
        &self,
        bucket: &str,
        continuation: Option<String>,
    ) -> Result<ListPage, StoreError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_no_such_bucket()) {
                    StoreError::BucketNotFound {
                        bucket: bucket.to_string(),
                    }
                } else {
                    request_err("list_objects_v2", err)
                }
            })?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                object.key().map(|key| RemoteObject {
                    key: ObjectKey::from(key),
                    size: u64::try_from(object.size().unwrap_or(0)).unwrap_or(0),
                })
            })
            .collect();

        Ok(ListPage {
            objects,
            is_truncated: output.is_truncated().unwrap_or(false),
            next_token: output.next_continuation_token().map(str::to_owned),
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &ObjectKey,
        source: &Path,
        options: &PutOptions,
    ) -> Result<(), StoreError> {
        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| StoreError::Request {
                op: "put_object",
                message: format!("cannot stream {}: {e}", source.display()),
            })?;
        let content_length =
            i64::try_from(options.content_length).map_err(|_| StoreError::Request {
                op: "put_object",
                message: format!("{} is too large", source.display()),
            })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key.as_str())
            .body(body)
            .content_length(content_length)
            .acl(canned_acl(options.acl))
            .send()
            .await
            .map_err(|err| request_err("put_object", err))?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &ObjectKey) -> Result<ObjectBody, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    StoreError::ObjectNotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    request_err("get_object", err)
                }
            })?;
        Ok(Box::pin(output.body.into_async_read()))
    }

    async fn delete_object(&self, bucket: &str, key: &ObjectKey) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|err| request_err("delete_object", err))?;
        Ok(())
    }

    fn object_url(&self, bucket: &str, key: &ObjectKey) -> String {
        public_url(
            self.endpoint.as_deref(),
            &self.region,
            bucket,
            key.as_str(),
            self.path_style,
        )
    }
}

fn canned_acl(acl: CannedAcl) -> ObjectCannedAcl {
    match acl {
        CannedAcl::Private => ObjectCannedAcl::Private,
        CannedAcl::PublicRead => ObjectCannedAcl::PublicRead,
    }
}

fn request_err<E: std::error::Error>(op: &'static str, err: E) -> StoreError {
    StoreError::Request {
        op,
        message: DisplayErrorContext(err).to_string(),
    }
}
