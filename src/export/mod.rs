//! Tabular export of paged query results.
//!
//! This module turns a lazily paged result set and a list of declared columns
//! into a CSV document suitable for attaching to a notification.

mod csv;
mod memory;
mod types;

pub use self::csv::{export_csv, ExportBuilder};
pub use memory::MemoryResultSet;
pub use types::{
    Cell, Column, ColumnKey, ExportDocument, ExportReport, ExportWarning, PagedResultSet,
    RawValue, ResultPage, ResultRow, Row, Summary,
};
