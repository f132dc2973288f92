use anyhow::{Context, Result};
use async_trait::async_trait;
use csv::StringRecord;
use std::path::PathBuf;
use tokio::fs;

use super::{parse_csv, RowSource};

/// CSV file on local disk, for running the service without GCS access.
pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RowSource for LocalFileSource {
    fn location(&self) -> String {
        format!("file://{}", self.path.display())
    }

    async fn fetch_rows(&self) -> Result<Vec<StringRecord>> {
        let bytes = fs::read(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;
        parse_csv(&bytes).with_context(|| format!("parsing {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_reads_whole_file() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "h1,h2\nx,y\n").unwrap();

        let source = LocalFileSource::new(tmp.path());
        let rows = source.fetch_rows().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(source.location().starts_with("file://"));
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let source = LocalFileSource::new("/definitely/not/here.csv");
        assert!(source.fetch_rows().await.is_err());
    }
}
