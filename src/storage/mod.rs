//! Object storage for resource bodies.
//!
//! Blobs are addressed by bucket + key, where the key is the resource name.
//! Every operation is a single round trip; existence probes are point-in-time
//! and callers must tolerate the object changing between a probe and the
//! following read or delete.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use md5::{Digest, Md5};

use crate::error::AppError;

#[cfg(test)]
pub mod memory;
pub mod s3;

pub use s3::S3BlobStore;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Headers and user metadata written alongside an object.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectMetadata {
    pub content_type: String,
    pub content_length: usize,
    /// Base64 MD5 digest, checked by the store on write.
    pub content_md5: String,
    pub user_metadata: Vec<(String, String)>,
}

impl ObjectMetadata {
    pub fn for_resource(name: &str, resource_id: i64, content_type: &str, data: &[u8]) -> Self {
        let digest = Md5::digest(data);
        Self {
            content_type: content_type.to_string(),
            content_length: data.len(),
            content_md5: general_purpose::STANDARD.encode(digest),
            user_metadata: vec![
                ("name".to_string(), name.to_string()),
                ("resource-id".to_string(), resource_id.to_string()),
            ],
        }
    }
}

/// A fully buffered object read back from the store.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, AppError>;

    async fn create_bucket(&self, bucket: &str) -> Result<(), AppError>;

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, AppError>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<(), AppError>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, AppError>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), AppError>;
}
