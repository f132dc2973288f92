// src/cursor/mod.rs

use anyhow::Result;
use async_trait::async_trait;

pub mod memory;
pub mod durable;

pub use self::memory::MemoryCursorStore;
pub use self::durable::ParquetCursorStore;

/// Index of the first data row. Row 0 is always treated as the header.
pub const FIRST_DATA_ROW: usize = 1;

/// Persists, per key, the index of the next row to process.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Returns `None` when nothing has been stored for `key` yet.
    async fn load(&self, key: &str) -> Result<Option<usize>>;

    async fn store(&self, key: &str, next_start: usize) -> Result<()>;
}

/// Half-open slice `[start, end)` of the full row list, header included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub start: usize,
    pub end: usize,
}

impl Page {
    /// Compute the page beginning at `start`, clamped to `total_rows`.
    ///
    /// A `start` at or past the end of the data yields an empty page at
    /// `total_rows`, never a panic.
    pub fn next(start: usize, page_size: usize, total_rows: usize) -> Self {
        let start = start.max(FIRST_DATA_ROW).min(total_rows);
        let end = start.saturating_add(page_size).min(total_rows);
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Cursor value to store once this page has been processed.
    pub fn next_start(&self) -> usize {
        self.end.max(FIRST_DATA_ROW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(total_rows: usize, page_size: usize, count: usize) -> Vec<(usize, usize)> {
        let mut start = FIRST_DATA_ROW;
        let mut out = Vec::new();
        for _ in 0..count {
            let page = Page::next(start, page_size, total_rows);
            out.push((page.start, page.end));
            start = page.next_start();
        }
        out
    }

    #[test]
    fn test_successive_pages_are_contiguous() {
        // 250 data rows + header
        assert_eq!(
            pages(251, 100, 4),
            vec![(1, 101), (101, 201), (201, 251), (251, 251)]
        );
    }

    #[test]
    fn test_small_dataset_is_exhausted_in_one_page() {
        let first = Page::next(FIRST_DATA_ROW, 100, 6);
        assert_eq!((first.start, first.end), (1, 6));
        assert_eq!(first.len(), 5);

        let second = Page::next(first.next_start(), 100, 6);
        assert!(second.is_empty());
        assert_eq!(second.next_start(), 6);
    }

    #[test]
    fn test_start_past_end_is_clamped() {
        let page = Page::next(500, 100, 42);
        assert_eq!((page.start, page.end), (42, 42));
        assert_eq!(page.next_start(), 42);
    }

    #[test]
    fn test_empty_and_header_only_datasets() {
        let empty = Page::next(FIRST_DATA_ROW, 100, 0);
        assert!(empty.is_empty());
        assert_eq!(empty.next_start(), FIRST_DATA_ROW);

        let header_only = Page::next(FIRST_DATA_ROW, 100, 1);
        assert!(header_only.is_empty());
        assert_eq!(header_only.next_start(), FIRST_DATA_ROW);
    }

    #[test]
    fn test_start_never_reads_header() {
        let page = Page::next(0, 10, 50);
        assert_eq!((page.start, page.end), (1, 11));
    }
}
