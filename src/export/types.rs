//! Export data model.
//!
//! Columns, cells, rows and pages as produced by a saved query, plus the
//! document and warnings returned by a finished export.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::NULL_TOKEN;

/// Aggregation applied to a column by a summary query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Summary {
    Group,
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Summary {
    pub fn as_str(&self) -> &'static str {
        match self {
            Summary::Group => "group",
            Summary::Count => "count",
            Summary::Sum => "sum",
            Summary::Avg => "avg",
            Summary::Min => "min",
            Summary::Max => "max",
        }
    }
}

/// Identity of a column: name, relation qualifier and summary kind.
///
/// Two columns with the same name but a different join or summary are
/// different columns.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnKey {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

impl ColumnKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            join: None,
            summary: None,
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(join) = &self.join {
            write!(f, "{}.", join)?;
        }
        f.write_str(&self.name)?;
        if let Some(summary) = self.summary {
            write!(f, "({})", summary.as_str())?;
        }
        Ok(())
    }
}

/// A declared output column.
///
/// The label only affects the header text; identity is the [`ColumnKey`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    #[serde(flatten)]
    pub key: ColumnKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            key: ColumnKey::new(name),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_join(mut self, join: impl Into<String>) -> Self {
        self.key.join = Some(join.into());
        self
    }

    pub fn with_summary(mut self, summary: Summary) -> Self {
        self.key.summary = Some(summary);
        self
    }

    /// Header text: the label when present, otherwise the column name.
    pub fn header(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.key.name)
    }
}

/// A raw cell value as stored by the source system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Bool(b) => write!(f, "{}", b),
            RawValue::Integer(i) => write!(f, "{}", i),
            RawValue::Decimal(d) => write!(f, "{}", d),
            RawValue::Text(s) => f.write_str(s),
        }
    }
}

/// One cell: the raw value and its display text.
///
/// Display text is preferred on output because coded fields (lists,
/// references) only carry a readable label there.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub raw: Option<RawValue>,
    #[serde(default)]
    pub display: Option<String>,
}

impl Cell {
    pub fn new(raw: Option<RawValue>, display: Option<String>) -> Self {
        Self { raw, display }
    }

    /// Cell with only display text.
    pub fn text(display: impl Into<String>) -> Self {
        Self {
            raw: None,
            display: Some(display.into()),
        }
    }

    /// Cell with only a raw value.
    pub fn raw(raw: RawValue) -> Self {
        Self {
            raw: Some(raw),
            display: None,
        }
    }

    /// Display text, else the raw value, else `null`.
    pub fn render(&self) -> String {
        match (&self.display, &self.raw) {
            (Some(display), _) => display.clone(),
            (None, Some(raw)) => raw.to_string(),
            (None, None) => NULL_TOKEN.to_string(),
        }
    }
}

/// Access to the cells of one result row.
///
/// Adapters over live query results may fail per cell; those failures are
/// recoverable and never abort an export.
pub trait ResultRow {
    /// Returns the cell for `key`. A column the row does not carry is an
    /// empty cell, not an error.
    fn cell(&self, key: &ColumnKey) -> anyhow::Result<Cell>;
}

/// A materialized result row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    cells: HashMap<ColumnKey, Cell>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: ColumnKey, cell: Cell) -> Self {
        self.cells.insert(key, cell);
        self
    }

    /// Pairs `cells` with `columns` positionally. Extra cells are dropped and
    /// missing trailing cells stay empty.
    pub fn from_cells(columns: &[Column], cells: Vec<Cell>) -> Self {
        let cells = columns
            .iter()
            .zip(cells)
            .map(|(column, cell)| (column.key.clone(), cell))
            .collect();
        Self { cells }
    }
}

impl ResultRow for Row {
    fn cell(&self, key: &ColumnKey) -> anyhow::Result<Cell> {
        Ok(self.cells.get(key).cloned().unwrap_or_default())
    }
}

/// One page of results.
#[derive(Clone, Debug)]
pub struct ResultPage<R = Row> {
    pub index: usize,
    pub rows: Vec<R>,
}

/// A read-only, lazily paged query result.
///
/// Pages are requested one at a time in increasing index order. Retries and
/// timeouts for fetching a page belong to the implementation.
pub trait PagedResultSet {
    type Row: ResultRow;

    fn total_row_count(&self) -> usize;

    fn page_size(&self) -> usize;

    fn page_count(&self) -> usize;

    fn page(&self, index: usize) -> anyhow::Result<ResultPage<Self::Row>>;
}

/// A finished export, ready to attach.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportDocument {
    name: String,
    content_type: String,
    content: Vec<u8>,
}

impl ExportDocument {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            content,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }
}

/// A cell that could not be read and was written as `null`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportWarning {
    pub page_index: usize,
    /// Zero-based position of the row in the whole result set
    pub row_index: usize,
    pub column: ColumnKey,
    pub message: String,
}

/// Result of a successful export.
#[derive(Clone, Debug)]
pub struct ExportReport {
    pub document: ExportDocument,
    pub warnings: Vec<ExportWarning>,
    pub pages_processed: usize,
    pub rows_written: usize,
}
