//! Tests for the CSV export through the public API.

use anyhow::{bail, Result};
use invoice_group_notify::export::{
    export_csv, Cell, Column, ColumnKey, ExportBuilder, MemoryResultSet, PagedResultSet,
    RawValue, ResultPage, ResultRow, Row, Summary,
};
use invoice_group_notify::{ExportError, QuoteStyle};

fn id_rows(columns: &[Column], n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| Row::from_cells(columns, vec![Cell::raw(RawValue::Integer(i as i64))]))
        .collect()
}

/// Serves rows from memory but fails on one page.
struct BrokenPage {
    inner: MemoryResultSet,
    broken: usize,
}

impl PagedResultSet for BrokenPage {
    type Row = Row;

    fn total_row_count(&self) -> usize {
        self.inner.total_row_count()
    }

    fn page_size(&self) -> usize {
        self.inner.page_size()
    }

    fn page_count(&self) -> usize {
        self.inner.page_count()
    }

    fn page(&self, index: usize) -> Result<ResultPage<Row>> {
        if index == self.broken {
            bail!("search timed out");
        }
        self.inner.page(index)
    }
}

/// A row whose `amount` cell cannot be read.
struct UnreadableAmount;

impl ResultRow for UnreadableAmount {
    fn cell(&self, key: &ColumnKey) -> Result<Cell> {
        if key.name == "amount" {
            bail!("field is not readable");
        }
        Ok(Cell::text("ok"))
    }
}

struct OnePage;

impl PagedResultSet for OnePage {
    type Row = UnreadableAmount;

    fn total_row_count(&self) -> usize {
        1
    }

    fn page_size(&self) -> usize {
        10
    }

    fn page_count(&self) -> usize {
        1
    }

    fn page(&self, index: usize) -> Result<ResultPage<UnreadableAmount>> {
        Ok(ResultPage {
            index,
            rows: vec![UnreadableAmount],
        })
    }
}

#[test]
fn test_documented_scenario() {
    let columns = vec![Column::new("id"), Column::new("amount")];
    let rows = vec![Row::from_cells(
        &columns,
        vec![
            Cell::raw(RawValue::Integer(1001)),
            Cell::new(Some(RawValue::Decimal(10.0)), Some("$10.00".to_string())),
        ],
    )];

    let report = export_csv(&columns, &MemoryResultSet::new(rows, 1000)).unwrap();
    assert_eq!(report.document.name(), "Invoice Details.csv");
    assert_eq!(report.document.content_type(), "text/csv");
    assert_eq!(
        report.document.text(),
        "\"id\",\"amount\"\r\n\"1001\",\"$10.00\"\r\n"
    );
}

#[test]
fn test_empty_result_is_header_only() {
    let columns = vec![Column::new("id").with_label("Invoice #")];
    let report = export_csv(&columns, &MemoryResultSet::new(Vec::new(), 50)).unwrap();
    assert_eq!(report.document.text(), "\"Invoice #\"\r\n");
    assert_eq!(report.rows_written, 0);
    assert_eq!(report.pages_processed, 0);
}

#[test]
fn test_rows_span_pages_in_order() {
    let columns = vec![Column::new("id")];
    let set = MemoryResultSet::new(id_rows(&columns, 23), 5);
    let report = export_csv(&columns, &set).unwrap();

    let text = report.document.text();
    let lines: Vec<&str> = text.split_terminator("\r\n").collect();
    assert_eq!(lines.len(), 24);
    assert_eq!(lines[1], "\"0\"");
    assert_eq!(lines[23], "\"22\"");
    assert_eq!(report.pages_processed, 5);
}

#[test]
fn test_joined_and_summary_columns_are_distinct() {
    let plain = Column::new("amount");
    let summed = Column::new("amount")
        .with_join("line")
        .with_summary(Summary::Sum)
        .with_label("Line Total");
    let columns = vec![plain.clone(), summed.clone()];
    let row = Row::new()
        .with(plain.key.clone(), Cell::text("1"))
        .with(summed.key.clone(), Cell::text("99"));

    let report = export_csv(&columns, &MemoryResultSet::new(vec![row], 10)).unwrap();
    assert_eq!(
        report.document.text(),
        "\"amount\",\"Line Total\"\r\n\"1\",\"99\"\r\n"
    );
}

#[test]
fn test_unreadable_cell_becomes_null_with_warning() {
    let columns = vec![Column::new("id"), Column::new("amount")];
    let report = export_csv(&columns, &OnePage).unwrap();
    assert_eq!(
        report.document.text(),
        "\"id\",\"amount\"\r\n\"ok\",\"null\"\r\n"
    );
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].column.name, "amount");
    assert!(report.warnings[0].message.contains("not readable"));
}

#[test]
fn test_failed_page_aborts_with_progress() {
    let columns = vec![Column::new("id")];
    let source = BrokenPage {
        inner: MemoryResultSet::new(id_rows(&columns, 25), 10),
        broken: 1,
    };

    match export_csv(&columns, &source) {
        Err(ExportError::PageFetch {
            page_index,
            pages_processed,
            rows_written,
            first_row,
            last_row,
            ..
        }) => {
            assert_eq!(page_index, 1);
            assert_eq!(pages_processed, 1);
            assert_eq!(rows_written, 10);
            assert_eq!((first_row, last_row), (10, 19));
        }
        other => panic!("expected PageFetch, got {:?}", other.map(|r| r.rows_written)),
    }
}

#[test]
fn test_empty_columns_rejected() {
    let set = MemoryResultSet::new(Vec::new(), 10);
    assert!(matches!(
        export_csv(&[], &set),
        Err(ExportError::EmptyColumns)
    ));
}

#[test]
fn test_resume_skips_header_and_written_pages() {
    let columns = vec![Column::new("id")];
    let source = BrokenPage {
        inner: MemoryResultSet::new(id_rows(&columns, 25), 10),
        broken: 0,
    };

    let report = ExportBuilder::default()
        .start_page(1)
        .build(&columns, &source)
        .unwrap();
    let text = report.document.text();
    assert!(text.starts_with("\"10\"\r\n"));
    assert_eq!(text.split_terminator("\r\n").count(), 15);
}

#[test]
fn test_standard_quoting_escapes_quotes() {
    let columns = vec![Column::new("memo")];
    let rows = vec![Row::from_cells(&columns, vec![Cell::text("12\" pipe")])];
    let set = MemoryResultSet::new(rows, 10);

    let naive = export_csv(&columns, &set).unwrap();
    assert_eq!(naive.document.text(), "\"memo\"\r\n\"12\" pipe\"\r\n");

    let standard = ExportBuilder::default()
        .quote_style(QuoteStyle::Standard)
        .build(&columns, &set)
        .unwrap();
    assert_eq!(standard.document.text(), "\"memo\"\r\n\"12\"\" pipe\"\r\n");
}
