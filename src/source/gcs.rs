use anyhow::{Context, Result};
use async_trait::async_trait;
use csv::StringRecord;
use google_cloud_storage::{
    client::{Client, ClientConfig},
    http::objects::{download::Range, get::GetObjectRequest},
};
use tracing::info;

use super::{parse_csv, RowSource};

/// CSV object in a Google Cloud Storage bucket.
pub struct GcsSource {
    client: Client,
    bucket: String,
    object: String,
}

impl GcsSource {
    /// Authenticate with application default credentials and bind to one object.
    pub async fn new(bucket: impl Into<String>, object: impl Into<String>) -> Result<Self> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .context("authenticating to GCS")?;

        Ok(Self {
            client: Client::new(config),
            bucket: bucket.into(),
            object: object.into(),
        })
    }
}

#[async_trait]
impl RowSource for GcsSource {
    fn location(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.object)
    }

    async fn fetch_rows(&self) -> Result<Vec<StringRecord>> {
        let request = GetObjectRequest {
            bucket: self.bucket.clone(),
            object: self.object.clone(),
            ..Default::default()
        };

        let bytes = self
            .client
            .download_object(&request, &Range::default())
            .await
            .with_context(|| format!("downloading {}", self.location()))?;
        info!(bytes = bytes.len(), location = %self.location(), "downloaded source object");

        parse_csv(&bytes).with_context(|| format!("parsing {}", self.location()))
    }
}
