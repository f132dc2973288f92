use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use google_cloud_bigquery::{
    client::{Client, ClientConfig},
    http::tabledata::insert_all::{InsertAllRequest, InsertAllResponse, Row},
};
use tracing::debug;

use super::{RowSink, TargetTable};
use crate::record::TradeRecord;

/// Streaming-insert sink. One client is built at startup and shared by all rows.
pub struct BigQuerySink {
    client: Client,
}

impl BigQuerySink {
    pub async fn new() -> Result<Self> {
        let (config, _project) = ClientConfig::new_with_auth()
            .await
            .context("authenticating BigQuery client")?;
        let client = Client::new(config)
            .await
            .context("creating BigQuery client")?;
        Ok(Self { client })
    }
}

/// Single-row insert request; `insert_id` lets BigQuery drop replays.
fn insert_request(insert_id: &str, record: &TradeRecord) -> InsertAllRequest<TradeRecord> {
    InsertAllRequest {
        rows: vec![Row {
            insert_id: Some(insert_id.to_string()),
            json: record.clone(),
        }],
        ..Default::default()
    }
}

/// A 200 response can still carry per-row rejections.
fn check_response(response: InsertAllResponse, target: &TargetTable, insert_id: &str) -> Result<()> {
    match response.insert_errors {
        Some(errors) if !errors.is_empty() => Err(anyhow!(
            "{} rejected row {}: {:?}",
            target,
            insert_id,
            errors
        )),
        _ => Ok(()),
    }
}

#[async_trait]
impl RowSink for BigQuerySink {
    async fn insert(
        &self,
        target: &TargetTable,
        insert_id: &str,
        record: &TradeRecord,
    ) -> Result<()> {
        let request = insert_request(insert_id, record);

        let response = self
            .client
            .tabledata()
            .insert(&target.project, &target.dataset, &target.table, &request)
            .await
            .with_context(|| format!("inserting row {} into {}", insert_id, target))?;
        check_response(response, target, insert_id)?;

        debug!(%target, insert_id, "row inserted");
        Ok(())
    }
}
