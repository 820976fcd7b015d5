//! In-process `BlobStore` used by tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{BlobStore, ObjectMetadata, StoredObject};
use crate::error::AppError;

#[derive(Default)]
pub struct MemoryBlobStore {
    buckets: Mutex<HashMap<String, HashMap<String, (StoredObject, ObjectMetadata)>>>,
    create_bucket_calls: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn with_bucket(bucket: &str) -> Self {
        let store = Self::default();
        store.buckets.lock().unwrap().insert(bucket.to_string(), HashMap::new());
        store
    }

    pub fn create_bucket_calls(&self) -> usize {
        self.create_bucket_calls.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Drops an object behind the service's back.
    pub fn remove(&self, bucket: &str, key: &str) {
        if let Some(objects) = self.buckets.lock().unwrap().get_mut(bucket) {
            objects.remove(key);
        }
    }

    pub fn metadata(&self, bucket: &str, key: &str) -> Option<ObjectMetadata> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|(_, meta)| meta.clone())
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets.lock().unwrap().get(bucket).map(|o| o.len()).unwrap_or(0)
    }
}

fn no_such_bucket(bucket: &str) -> AppError {
    AppError::unexpected(format!("no such bucket: {}", bucket))
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, AppError> {
        Ok(self.buckets.lock().unwrap().contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), AppError> {
        self.create_bucket_calls.fetch_add(1, Ordering::SeqCst);
        self.buckets.lock().unwrap().entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, AppError> {
        let buckets = self.buckets.lock().unwrap();
        let objects = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        Ok(objects.contains_key(key))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::unexpected("put_object failed: connection reset"));
        }
        let mut buckets = self.buckets.lock().unwrap();
        let objects = buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        let object = StoredObject {
            data,
            content_type: metadata.content_type.clone(),
        };
        objects.insert(key.to_string(), (object, metadata.clone()));
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, AppError> {
        let buckets = self.buckets.lock().unwrap();
        buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|(object, _)| object.clone())
            .ok_or_else(|| AppError::unexpected(format!("get_object failed: no such key {}", key)))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), AppError> {
        let mut buckets = self.buckets.lock().unwrap();
        let objects = buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        objects.remove(key);
        Ok(())
    }
}
