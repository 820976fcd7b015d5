//! Coordinates the metadata store, the blob store and the event channel.
//!
//! None of the three share a transaction. Create writes the row, then the
//! blob, then queues the event; delete removes the rows before it touches any
//! blob. A failure part way through leaves whatever was already written in
//! place.

use log::{debug, error, info};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::error::AppError;
use crate::event::{EventChannel, ResourceEvent};
use crate::repo;
use crate::response::{RecordId, RecordIds};
use crate::storage::{BlobStore, ObjectMetadata};

/// A resource body read back for download.
#[derive(Debug, PartialEq)]
pub struct Download {
    pub data: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
}

pub struct ResourceService {
    db: DatabaseConnection,
    blobs: Arc<dyn BlobStore>,
    events: EventChannel,
    bucket: String,
}

impl ResourceService {
    pub fn new(
        db: DatabaseConnection,
        blobs: Arc<dyn BlobStore>,
        events: EventChannel,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            db,
            blobs,
            events,
            bucket: bucket.into(),
        }
    }

    pub async fn create(
        &self,
        data: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<RecordId, AppError> {
        self.ensure_bucket().await?;

        let resource = repo::insert(&self.db, file_name).await?;

        let metadata = ObjectMetadata::for_resource(file_name, resource.id, content_type, &data);
        if let Err(err) = self.blobs.put_object(&self.bucket, file_name, data, &metadata).await {
            error!(
                "storing {} failed, resource {} has no object: {}",
                file_name, resource.id, err
            );
            return Err(AppError::unexpected(err.to_string()));
        }

        self.events.publish(&ResourceEvent { resource_id: resource.id });
        info!(
            "created resource {} ({}, {} bytes)",
            resource.id, file_name, metadata.content_length
        );
        Ok(RecordId { id: resource.id })
    }

    pub async fn fetch(&self, id: i64) -> Result<Download, AppError> {
        let resource = repo::find_by_id(&self.db, id)
            .await?
            .ok_or_else(|| AppError::not_found("Music not found"))?;
        self.ensure_bucket().await?;
        self.ensure_object(&resource.name).await?;

        let object = self.blobs.get_object(&self.bucket, &resource.name).await?;
        debug!("fetched resource {} ({} bytes)", id, object.data.len());
        Ok(Download {
            data: object.data,
            content_type: object.content_type,
            file_name: resource.name,
        })
    }

    /// Rows are deleted before any blob. A missing blob aborts the call with
    /// the rows already gone and earlier blobs already removed.
    pub async fn delete(&self, ids: &[i64]) -> Result<RecordIds, AppError> {
        self.ensure_bucket().await?;

        let resources = repo::find_all_by_ids(&self.db, ids).await?;
        if resources.len() < ids.len() {
            debug!("{} of {} ids have no resource", ids.len() - resources.len(), ids.len());
        }
        let resolved: Vec<i64> = resources.iter().map(|r| r.id).collect();
        repo::delete_all_by_ids(&self.db, &resolved).await?;

        let mut res = RecordIds::default();
        for resource in resources {
            self.ensure_object(&resource.name).await?;
            self.blobs.delete_object(&self.bucket, &resource.name).await?;
            res.add_element(resource.id);
        }
        info!("deleted resources {:?}", res.ids);
        Ok(res)
    }

    /// Metadata only; the blob is not probed.
    pub async fn exists(&self, id: i64) -> Result<bool, AppError> {
        Ok(repo::find_by_id(&self.db, id).await?.is_some())
    }

    // check-then-create, not atomic
    async fn ensure_bucket(&self) -> Result<(), AppError> {
        if !self.blobs.bucket_exists(&self.bucket).await? {
            info!("bucket {} missing, creating", self.bucket);
            self.blobs.create_bucket(&self.bucket).await?;
        }
        Ok(())
    }

    async fn ensure_object(&self, key: &str) -> Result<(), AppError> {
        if !self.blobs.object_exists(&self.bucket, key).await? {
            return Err(AppError::not_found("File not found"));
        }
        Ok(())
    }
}
