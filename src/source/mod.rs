// src/source/mod.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord};

pub mod gcs;
pub mod local;

pub use self::gcs::GcsSource;
pub use self::local::LocalFileSource;

/// Where the rows come from. Every fetch returns the whole file, header included.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Human-readable location, e.g. `gs://bucket/object`. Also used to key
    /// the cursor, so it must be stable across restarts.
    fn location(&self) -> String;

    async fn fetch_rows(&self) -> Result<Vec<StringRecord>>;
}

/// Parse raw CSV bytes into records without interpreting a header.
///
/// Records may have differing lengths; shape is validated per row later so
/// one short line does not fail the whole file.
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<StringRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    reader
        .records()
        .enumerate()
        .map(|(i, record)| record.with_context(|| format!("parsing CSV record {}", i)))
        .collect()
}
