// src/config.rs

use anyhow::{bail, Result};
use clap::Args;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::info;

use crate::{
    cursor::{CursorStore, MemoryCursorStore, ParquetCursorStore},
    pipeline::{Pipeline, PipelineSettings},
    sink::BigQuerySink,
    source::{GcsSource, LocalFileSource, RowSource},
};

/// Options shared by the HTTP service and the one-shot runner.
/// Every flag can also be supplied through its environment variable.
#[derive(Args, Debug, Clone)]
pub struct EtlConfig {
    /// Log level directive used when `RUST_LOG` is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// GCS bucket holding the source CSV
    #[arg(long, env = "SOURCE_BUCKET", default_value = "for_s204_xgrid")]
    pub source_bucket: String,

    /// Object name of the source CSV
    #[arg(long, env = "SOURCE_OBJECT", default_value = "covid-csv-s204.csv")]
    pub source_object: String,

    /// Read the CSV from a local file instead of GCS
    #[arg(long, env = "SOURCE_FILE")]
    pub source_file: Option<PathBuf>,

    /// Data rows processed per invocation
    #[arg(long, env = "PAGE_SIZE", default_value_t = 100)]
    pub page_size: usize,

    /// Upper bound on a single row insert
    #[arg(long, env = "INSERT_TIMEOUT_SECS", default_value_t = 30)]
    pub insert_timeout_secs: u64,

    /// Upper bound on downloading the source CSV
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 120)]
    pub fetch_timeout_secs: u64,

    /// Persist cursors as Parquet files in this directory; memory only when unset
    #[arg(long, env = "CURSOR_DIR")]
    pub cursor_dir: Option<PathBuf>,
}

impl EtlConfig {
    pub fn settings(&self) -> Result<PipelineSettings> {
        if self.page_size == 0 {
            bail!("page size must be at least 1");
        }
        Ok(PipelineSettings {
            page_size: self.page_size,
            insert_timeout: Duration::from_secs(self.insert_timeout_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
        })
    }

    pub fn cursor_store(&self) -> Result<Arc<dyn CursorStore>> {
        let store: Arc<dyn CursorStore> = match &self.cursor_dir {
            Some(dir) => {
                info!(dir = %dir.display(), "using durable cursor store");
                Arc::new(ParquetCursorStore::new(dir)?)
            }
            None => {
                info!("using in-memory cursor store");
                Arc::new(MemoryCursorStore::new())
            }
        };
        Ok(store)
    }

    pub async fn source(&self) -> Result<Arc<dyn RowSource>> {
        let source: Arc<dyn RowSource> = match &self.source_file {
            Some(path) => Arc::new(LocalFileSource::new(path)),
            None => Arc::new(GcsSource::new(&self.source_bucket, &self.source_object).await?),
        };
        Ok(source)
    }

    /// Build the clients once, at startup.
    pub async fn build_pipeline(&self) -> Result<Pipeline> {
        let settings = self.settings()?;
        let cursor = self.cursor_store()?;
        let source = self.source().await?;
        let sink = Arc::new(BigQuerySink::new().await?);

        info!(
            source = %source.location(),
            page_size = settings.page_size,
            "pipeline ready"
        );
        Ok(Pipeline::new(source, sink, cursor, settings))
    }
}
