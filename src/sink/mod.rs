// src/sink/mod.rs

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use crate::record::TradeRecord;

pub mod bigquery;

pub use self::bigquery::BigQuerySink;

/// Destination table coordinates supplied per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetTable {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TargetTable {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TargetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Loads one row into a table.
#[async_trait]
pub trait RowSink: Send + Sync {
    /// `insert_id` identifies the row across replays so the store can drop
    /// duplicates on a best-effort basis.
    async fn insert(&self, target: &TargetTable, insert_id: &str, record: &TradeRecord)
        -> Result<()>;
}
