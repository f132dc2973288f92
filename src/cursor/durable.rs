use anyhow::{anyhow, bail, Context, Result};
use arrow::{
    array::{Array, ArrayRef, StringArray, TimestampMicrosecondArray, UInt64Array},
    datatypes::{DataType as ArrowDataType, Field, Schema as ArrowSchema, TimeUnit},
    record_batch::RecordBatch,
};
use async_trait::async_trait;
use chrono::Utc;
use parquet::arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter};
use sha2::{Digest, Sha256};
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::task;
use tracing::debug;

use super::CursorStore;

/// Durable cursor backed by one single-row Parquet file per key.
///
/// Files are named `<prefix>-<sha256>.parquet`, where the prefix is a
/// readable slice of the key. Every write goes to `<stem>.parquet.tmp` first
/// and is renamed into place, so a crash mid-write leaves the previous
/// position intact.
pub struct ParquetCursorStore {
    dir: PathBuf,
}

impl ParquetCursorStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating cursor directory `{}`", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.parquet", safe_file_stem(key)))
    }
}

#[async_trait]
impl CursorStore for ParquetCursorStore {
    async fn load(&self, key: &str) -> Result<Option<usize>> {
        let path = self.path_for(key);
        let key = key.to_string();
        task::spawn_blocking(move || read_cursor_file(&path, &key)).await?
    }

    async fn store(&self, key: &str, next_start: usize) -> Result<()> {
        let path = self.path_for(key);
        let key = key.to_string();
        task::spawn_blocking(move || write_cursor_file(&path, &key, next_start)).await?
    }
}

/// Characters of the key kept in the file name; the hash keeps it unique.
const STEM_PREFIX_LEN: usize = 64;

/// Fixed-length file stem, well under NAME_MAX for any key length.
fn safe_file_stem(key: &str) -> String {
    let prefix: String = key
        .chars()
        .take(STEM_PREFIX_LEN)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{}-{:x}", prefix, hasher.finalize())
}

fn cursor_schema() -> ArrowSchema {
    ArrowSchema::new(vec![
        Field::new("cursor_key", ArrowDataType::Utf8, false),
        Field::new("next_row", ArrowDataType::UInt64, false),
        Field::new(
            "updated_at",
            ArrowDataType::Timestamp(TimeUnit::Microsecond, None),
            false,
        ),
    ])
}

fn read_cursor_file(path: &Path, key: &str) -> Result<Option<usize>> {
    if !path.is_file() {
        return Ok(None);
    }

    let file = File::open(path).with_context(|| format!("failed to open `{}`", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("failed to read parquet metadata of `{}`", path.display()))?
        .build()
        .with_context(|| format!("failed to build reader for `{}`", path.display()))?;

    let mut position = None;
    for batch in reader {
        let batch = batch.with_context(|| format!("reading batch from `{}`", path.display()))?;
        if batch.num_rows() == 0 {
            continue;
        }

        let keys = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| anyhow!("`cursor_key` column of `{}` is not Utf8", path.display()))?;
        let rows = batch
            .column(1)
            .as_any()
            .downcast_ref::<UInt64Array>()
            .ok_or_else(|| anyhow!("`next_row` column of `{}` is not UInt64", path.display()))?;

        let last = batch.num_rows() - 1;
        if keys.value(last) != key {
            bail!(
                "cursor file `{}` belongs to key `{}`, not `{}`",
                path.display(),
                keys.value(last),
                key
            );
        }
        position = Some(usize::try_from(rows.value(last))?);
    }

    debug!(path = %path.display(), ?position, "loaded cursor");
    Ok(position)
}

fn write_cursor_file(path: &Path, key: &str, next_start: usize) -> Result<()> {
    let schema = Arc::new(cursor_schema());
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(vec![key.to_string()])),
        Arc::new(UInt64Array::from(vec![next_start as u64])),
        Arc::new(TimestampMicrosecondArray::from(vec![
            Utc::now().timestamp_micros()
        ])),
    ];
    let batch =
        RecordBatch::try_new(schema.clone(), columns).context("building cursor record batch")?;

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);

    let tmp_file = File::create(&tmp_path)
        .with_context(|| format!("could not create temporary file `{}`", tmp_path.display()))?;
    let mut writer = ArrowWriter::try_new(BufWriter::new(tmp_file), schema, None)
        .context("creating ArrowWriter for cursor file")?;
    writer.write(&batch).context("writing cursor batch")?;
    writer.close().context("closing cursor writer")?;

    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "failed to rename `{}` to `{}`",
            tmp_path.display(),
            path.display()
        )
    })?;

    debug!(path = %path.display(), next_start, "stored cursor");
    Ok(())
}
