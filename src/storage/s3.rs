use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client as S3Client;
use log::{error, info};

use super::{BlobStore, ObjectMetadata, StoredObject, DEFAULT_CONTENT_TYPE};
use crate::config::AppConfig;
use crate::error::AppError;

pub struct S3BlobStore {
    client: S3Client,
    region: String,
}

impl S3BlobStore {
    pub async fn from_config(config: &AppConfig) -> Self {
        let region_provider = RegionProviderChain::first_try(Region::new(config.s3_region.clone()));
        let mut loader =
            aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region_provider);
        if let (Some(access_key), Some(secret_key)) =
            (&config.s3_access_key, &config.s3_secret_key)
        {
            let creds = aws_sdk_s3::config::Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "static",
            );
            loader = loader.credentials_provider(creds);
        }
        if let Some(endpoint) = &config.s3_endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        // self-hosted endpoints rarely resolve virtual-host style bucket names
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.s3_endpoint.is_some())
            .build();

        Self {
            client: S3Client::from_conf(s3_config),
            region: config.s3_region.clone(),
        }
    }
}

fn is_status<E>(err: &SdkError<E>, status: u16) -> bool {
    err.raw_response()
        .map(|resp| resp.status().as_u16() == status)
        .unwrap_or(false)
}

fn sdk_failure<E: std::error::Error + 'static>(op: &str, err: SdkError<E>) -> AppError {
    let detail = aws_sdk_s3::error::DisplayErrorContext(&err).to_string();
    error!("s3 {} failed: {}", op, detail);
    AppError::unexpected(format!("{} failed: {}", op, err))
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, AppError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let missing = err.as_service_error().map(|e| e.is_not_found()).unwrap_or(false)
                    || is_status(&err, 404);
                if missing {
                    Ok(false)
                } else {
                    Err(sdk_failure("head_bucket", err))
                }
            }
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), AppError> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if self.region != "us-east-1" {
            let location = CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build();
            request = request.create_bucket_configuration(location);
        }
        match request.send().await {
            Ok(_) => {
                info!("created bucket {}", bucket);
                Ok(())
            }
            // a concurrent bootstrap got there first
            Err(err)
                if err
                    .as_service_error()
                    .map(|e| e.is_bucket_already_owned_by_you())
                    .unwrap_or(false) =>
            {
                Ok(())
            }
            Err(err) => Err(sdk_failure("create_bucket", err)),
        }
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, AppError> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let missing = err.as_service_error().map(|e| e.is_not_found()).unwrap_or(false)
                    || is_status(&err, 404);
                if missing {
                    Ok(false)
                } else {
                    Err(sdk_failure("head_object", err))
                }
            }
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<(), AppError> {
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(&metadata.content_type)
            .content_length(metadata.content_length as i64)
            .content_md5(&metadata.content_md5)
            .body(ByteStream::from(data));
        for (name, value) in &metadata.user_metadata {
            request = request.metadata(name, value);
        }
        request
            .send()
            .await
            .map_err(|err| sdk_failure("put_object", err))?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, AppError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| sdk_failure("get_object", err))?;
        let content_type = output
            .content_type()
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let data = output
            .body
            .collect()
            .await
            .map_err(|err| AppError::unexpected(format!("reading object body failed: {}", err)))?
            .into_bytes()
            .to_vec();
        Ok(StoredObject { data, content_type })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| sdk_failure("delete_object", err))?;
        Ok(())
    }
}
