//! In-memory paged result set.

use anyhow::{bail, Result};

use super::types::{PagedResultSet, ResultPage, Row};

/// A fully materialized result set served in fixed-size pages.
///
/// Used for fixture data and tests. Live adapters should fetch each page on
/// demand instead.
#[derive(Clone, Debug)]
pub struct MemoryResultSet {
    rows: Vec<Row>,
    page_size: usize,
}

impl MemoryResultSet {
    /// # Panics
    ///
    /// Panics if `page_size` is zero.
    pub fn new(rows: Vec<Row>, page_size: usize) -> Self {
        assert!(page_size > 0, "page size must be positive");
        Self { rows, page_size }
    }
}

impl PagedResultSet for MemoryResultSet {
    type Row = Row;

    fn total_row_count(&self) -> usize {
        self.rows.len()
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn page_count(&self) -> usize {
        self.rows.len().div_ceil(self.page_size)
    }

    fn page(&self, index: usize) -> Result<ResultPage<Row>> {
        if index >= self.page_count() {
            bail!(
                "page {} out of range ({} pages)",
                index,
                self.page_count()
            );
        }
        let start = index * self.page_size;
        let end = (start + self.page_size).min(self.rows.len());
        Ok(ResultPage {
            index,
            rows: self.rows[start..end].to_vec(),
        })
    }
}
