use anyhow::Result;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::AppConfig;

pub const IMAGE_FOLDER: &str = "products";
pub const VIDEO_FOLDER: &str = "videos";

const DEFAULT_EXTENSION: &str = ".jpg";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A binary payload waiting to be handed to object storage.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl Upload {
    pub fn content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

/// Stores a payload under a logical folder and returns its public URL.
/// Implementations do not retry; the first transport failure is returned.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn store(&self, upload: Upload, folder: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct S3ObjectStorage {
    client: Client,
    bucket: String,
    region: String,
    public_endpoint: Option<String>,
}

impl S3ObjectStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let region_provider = RegionProviderChain::first_try(Region::new(config.s3_region.clone()));
        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut s3_builder =
            aws_sdk_s3::config::Builder::from(&shared_config).region(shared_config.region().cloned());
        if let Some(endpoint) = &config.s3_endpoint {
            s3_builder = s3_builder.endpoint_url(endpoint.clone()).force_path_style(true);
        }
        if let Some(provider) = shared_config.credentials_provider() {
            s3_builder = s3_builder.credentials_provider(provider);
        }
        let s3_config = s3_builder.build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.s3_bucket.clone(),
            region: config.s3_region.clone(),
            public_endpoint: config.s3_public_endpoint.clone(),
        })
    }

    fn public_url(&self, key: &str) -> String {
        public_url(&self.bucket, &self.region, self.public_endpoint.as_deref(), key)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStorage {
    async fn store(&self, upload: Upload, folder: &str) -> Result<String> {
        let key = object_key(folder, upload.file_name.as_deref(), OffsetDateTime::now_utc());
        let content_type = upload.content_type().to_string();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(upload.bytes))
            .send()
            .await?;

        tracing::debug!(key = %key, "object stored");
        Ok(self.public_url(&key))
    }
}

/// `{folder}/{uuid}_{unix millis}{ext}`, keeping the extension of the
/// submitted file name.
pub fn object_key(folder: &str, file_name: Option<&str>, now: OffsetDateTime) -> String {
    let extension = file_name
        .and_then(|name| name.rfind('.').map(|idx| &name[idx..]))
        .filter(|ext| ext.len() > 1)
        .unwrap_or(DEFAULT_EXTENSION);
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    format!("{}/{}_{}{}", folder, Uuid::new_v4(), millis, extension)
}

fn public_url(bucket: &str, region: &str, public_endpoint: Option<&str>, key: &str) -> String {
    match public_endpoint {
        Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    }
}
