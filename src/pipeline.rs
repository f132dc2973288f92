// src/pipeline.rs

use serde::Serialize;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{sync::Mutex, time::timeout};
use tracing::{debug, info, instrument, warn};

use crate::{
    cursor::{CursorStore, Page, FIRST_DATA_ROW},
    record::TradeRecord,
    sink::{RowSink, TargetTable},
    source::RowSource,
};

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_INSERT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Failures that abort a whole invocation. Per-row problems are reported in
/// [`PageOutcome`] instead.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("failed to fetch source rows: {0:#}")]
    Source(anyhow::Error),
    #[error("failed to access cursor: {0:#}")]
    Cursor(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Shape,
    Insert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub row: usize,
    pub kind: FailureKind,
    pub reason: String,
}

/// What one invocation did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageOutcome {
    pub start: usize,
    pub end: usize,
    pub next_start: usize,
    pub total_rows: usize,
    pub inserted: usize,
    pub transformed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// No rows were left to process.
    pub exhausted: bool,
    pub failures: Vec<RowFailure>,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub page_size: usize,
    pub insert_timeout: Duration,
    /// Upper bound on downloading the source, which runs under the page lock.
    pub fetch_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            insert_timeout: DEFAULT_INSERT_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Reads the next page from the source, applies the Sunday rule, and loads
/// every row into the target table.
pub struct Pipeline {
    source: Arc<dyn RowSource>,
    sink: Arc<dyn RowSink>,
    cursor: Arc<dyn CursorStore>,
    settings: PipelineSettings,
    /// Held for a whole page so concurrent invocations never share a slice.
    page_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn RowSource>,
        sink: Arc<dyn RowSink>,
        cursor: Arc<dyn CursorStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            sink,
            cursor,
            settings,
            page_lock: Mutex::new(()),
        }
    }

    pub fn source_location(&self) -> String {
        self.source.location()
    }

    fn cursor_key(&self, target: &TargetTable) -> String {
        format!("{} -> {}", self.source.location(), target)
    }

    #[instrument(level = "info", skip(self, target), fields(target = %target))]
    pub async fn process_next_page(&self, target: &TargetTable) -> Result<PageOutcome, PageError> {
        let _guard = self.page_lock.lock().await;

        let rows = match timeout(self.settings.fetch_timeout, self.source.fetch_rows()).await {
            Ok(rows) => rows.map_err(PageError::Source)?,
            Err(_) => {
                return Err(PageError::Source(anyhow::anyhow!(
                    "fetching {} timed out after {:?}",
                    self.source.location(),
                    self.settings.fetch_timeout
                )))
            }
        };
        let key = self.cursor_key(target);
        let start = self
            .cursor
            .load(&key)
            .await
            .map_err(PageError::Cursor)?
            .unwrap_or(FIRST_DATA_ROW);

        let page = Page::next(start, self.settings.page_size, rows.len());
        info!(
            start = page.start,
            end = page.end,
            total_rows = rows.len(),
            "processing page"
        );

        let mut outcome = PageOutcome {
            start: page.start,
            end: page.end,
            next_start: page.next_start(),
            total_rows: rows.len(),
            exhausted: page.is_empty(),
            ..Default::default()
        };

        let location = self.source.location();
        for (row, raw) in rows[page.start..page.end].iter().enumerate() {
            let row = page.start + row;

            let mut record = match TradeRecord::from_record(raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!(row, error = %e, "skipping malformed row");
                    outcome.skipped += 1;
                    outcome.failures.push(RowFailure {
                        row,
                        kind: FailureKind::Shape,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if record.apply_sunday_rule() {
                outcome.transformed += 1;
                debug!(row, ?record, "transformed Sunday row");
            }

            let insert_id = format!("{}#{}", location, row);
            let result = match timeout(
                self.settings.insert_timeout,
                self.sink.insert(target, &insert_id, &record),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!(
                    "insert timed out after {:?}",
                    self.settings.insert_timeout
                )),
            };

            match result {
                Ok(()) => outcome.inserted += 1,
                Err(e) => {
                    let reason = format!("{e:#}");
                    warn!(row, error = %reason, "failed to load row");
                    outcome.failed += 1;
                    outcome.failures.push(RowFailure {
                        row,
                        kind: FailureKind::Insert,
                        reason,
                    });
                }
            }
        }

        self.cursor
            .store(&key, outcome.next_start)
            .await
            .map_err(PageError::Cursor)?;

        info!(
            inserted = outcome.inserted,
            transformed = outcome.transformed,
            skipped = outcome.skipped,
            failed = outcome.failed,
            next_start = outcome.next_start,
            "page done"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use anyhow::{anyhow, bail, Result};
    use async_trait::async_trait;
    use csv::StringRecord;
    use std::{collections::HashSet, sync::Mutex, time::Duration};

    use crate::{
        record::TradeRecord,
        sink::{RowSink, TargetTable},
        source::{parse_csv, RowSource},
    };

    pub const HEADER: &str =
        "Direction,Year,Date,Weekday,Country,Commodity,Transport_Mode,Measure,Value,Cumulative";

    /// CSV text with a header and `n` data rows. Every seventh row is a Sunday.
    pub fn csv_with_rows(n: usize) -> String {
        let mut csv = String::from(HEADER);
        csv.push('\n');
        for i in 1..=n {
            let weekday = if i % 7 == 0 { "Sunday" } else { "Monday" };
            csv.push_str(&format!(
                "Exports,2020,{i:02}/01/2020,{weekday},All,All,Sea,$,{i},{}\n",
                i * 10
            ));
        }
        csv
    }

    pub struct StaticSource {
        pub csv: Mutex<String>,
        pub fail: Mutex<bool>,
        pub hang: Mutex<bool>,
    }

    impl StaticSource {
        pub fn new(csv: impl Into<String>) -> Self {
            Self {
                csv: Mutex::new(csv.into()),
                fail: Mutex::new(false),
                hang: Mutex::new(false),
            }
        }
    }

    #[async_trait]
    impl RowSource for StaticSource {
        fn location(&self) -> String {
            "mem://trade.csv".to_string()
        }

        async fn fetch_rows(&self) -> Result<Vec<StringRecord>> {
            let hang = *self.hang.lock().unwrap();
            if hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if *self.fail.lock().unwrap() {
                bail!("object not found");
            }
            let csv = self.csv.lock().unwrap().clone();
            parse_csv(csv.as_bytes())
        }
    }

    /// Records every inserted row; rows whose insert id ends with one of
    /// `failing` are rejected, rows in `hanging` never complete.
    #[derive(Default)]
    pub struct RecordingSink {
        pub inserted: Mutex<Vec<(TargetTable, String, TradeRecord)>>,
        pub failing: HashSet<usize>,
        pub hanging: HashSet<usize>,
    }

    impl RecordingSink {
        pub fn rows(&self) -> Vec<usize> {
            self.inserted
                .lock()
                .unwrap()
                .iter()
                .map(|(_, id, _)| row_of(id))
                .collect()
        }
    }

    fn row_of(insert_id: &str) -> usize {
        insert_id
            .rsplit('#')
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap()
    }

    #[async_trait]
    impl RowSink for RecordingSink {
        async fn insert(
            &self,
            target: &TargetTable,
            insert_id: &str,
            record: &TradeRecord,
        ) -> Result<()> {
            let row = row_of(insert_id);
            if self.hanging.contains(&row) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.failing.contains(&row) {
                return Err(anyhow!("table rejected row {}", row));
            }
            // yield so concurrent pages get a chance to interleave
            tokio::task::yield_now().await;
            self.inserted.lock().unwrap().push((
                target.clone(),
                insert_id.to_string(),
                record.clone(),
            ));
            Ok(())
        }
    }

    pub fn target() -> TargetTable {
        TargetTable::new("proj", "trade", "covid")
    }
}
