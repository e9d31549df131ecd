//! CSV export functionality.
//!
//! Streams a paged result set into a quoted, CRLF-terminated CSV document.
//! One header line is followed by one line per row, in page order and then
//! in-page order. Only one page is held in memory at a time.

use csv::WriterBuilder;
use log::{debug, info, warn};

use crate::config::{QuoteStyle, CSV_CONTENT_TYPE, DETAILS_CSV_NAME, NULL_TOKEN};
use crate::error_handling::ExportError;

use super::types::{
    Column, ExportDocument, ExportReport, ExportWarning, PagedResultSet, ResultRow,
};

/// Builds CSV documents from paged result sets.
///
/// # Examples
///
/// ```
/// use invoice_group_notify::export::{Cell, Column, ExportBuilder, MemoryResultSet, RawValue, Row};
///
/// let columns = vec![Column::new("id"), Column::new("amount")];
/// let row = Row::from_cells(
///     &columns,
///     vec![
///         Cell::text("1001"),
///         Cell::new(Some(RawValue::Decimal(10.0)), Some("$10.00".into())),
///     ],
/// );
/// let source = MemoryResultSet::new(vec![row], 1000);
///
/// let report = ExportBuilder::new("details.csv").build(&columns, &source).unwrap();
/// assert_eq!(report.document.text(), "\"id\",\"amount\"\r\n\"1001\",\"$10.00\"\r\n");
/// ```
#[derive(Clone, Debug)]
pub struct ExportBuilder {
    file_name: String,
    content_type: String,
    quote_style: QuoteStyle,
    start_page: usize,
}

impl Default for ExportBuilder {
    fn default() -> Self {
        Self::new(DETAILS_CSV_NAME)
    }
}

impl ExportBuilder {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: CSV_CONTENT_TYPE.to_string(),
            quote_style: QuoteStyle::Naive,
            start_page: 0,
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn quote_style(mut self, quote_style: QuoteStyle) -> Self {
        self.quote_style = quote_style;
        self
    }

    /// Resumes an interrupted export at `page`.
    ///
    /// A resumed export omits the header line: its output continues a document
    /// whose earlier pages were already written.
    pub fn start_page(mut self, page: usize) -> Self {
        self.start_page = page;
        self
    }

    /// Exports `source` under `columns`.
    ///
    /// Cells that fail to render are written as `null` and reported in
    /// [`ExportReport::warnings`]. A page that fails to load aborts the export.
    ///
    /// # Errors
    ///
    /// - [`ExportError::EmptyColumns`] if `columns` is empty (no page is fetched)
    /// - [`ExportError::PageCountMismatch`] if the source's page count does not
    ///   match its row count and page size
    /// - [`ExportError::PageFetch`] if a page cannot be fetched
    /// - [`ExportError::PageRowCount`] if a page holds more or fewer rows than
    ///   the row count and page size imply
    /// - [`ExportError::Write`] if the standard CSV writer fails
    pub fn build<S>(&self, columns: &[Column], source: &S) -> Result<ExportReport, ExportError>
    where
        S: PagedResultSet + ?Sized,
    {
        if columns.is_empty() {
            return Err(ExportError::EmptyColumns);
        }

        let total_rows = source.total_row_count();
        let page_size = source.page_size();
        let page_count = source.page_count();
        check_page_count(total_rows, page_size, page_count)?;

        debug!(
            "Exporting {} rows in {} pages of {} to {} (starting at page {})",
            total_rows, page_count, page_size, self.file_name, self.start_page
        );

        let mut out = LineWriter::new(self.quote_style);
        if self.start_page == 0 {
            let header: Vec<String> = columns.iter().map(|c| c.header().to_string()).collect();
            out.write_line(&header)?;
        }

        let mut warnings = Vec::new();
        let mut rows_written = 0;
        let mut fields = Vec::with_capacity(columns.len());

        for page_index in self.start_page..page_count {
            let first_row = page_index * page_size;
            let page = source.page(page_index).map_err(|source| ExportError::PageFetch {
                page_index,
                pages_processed: page_index - self.start_page,
                rows_written,
                first_row,
                last_row: (first_row + page_size).min(total_rows).saturating_sub(1),
                source,
            })?;

            if page.index != page_index {
                warn!(
                    "Result set returned page {} when asked for page {} of {}",
                    page.index, page_index, self.file_name
                );
            }
            let expected = page_size.min(total_rows.saturating_sub(first_row));
            if page.rows.len() != expected {
                return Err(ExportError::PageRowCount {
                    page_index,
                    expected,
                    actual: page.rows.len(),
                    rows_written,
                });
            }

            for (offset, row) in page.rows.iter().enumerate() {
                fields.clear();
                for column in columns {
                    let value = match row.cell(&column.key) {
                        Ok(cell) => cell.render(),
                        Err(e) => {
                            let row_index = first_row + offset;
                            warn!(
                                "Failed to render column {} of row {} in {}: {:#}",
                                column.key, row_index, self.file_name, e
                            );
                            warnings.push(ExportWarning {
                                page_index,
                                row_index,
                                column: column.key.clone(),
                                message: format!("{:#}", e),
                            });
                            NULL_TOKEN.to_string()
                        }
                    };
                    fields.push(value);
                }
                out.write_line(&fields)?;
                rows_written += 1;
            }
        }

        let content = out.finish()?;
        let pages_processed = page_count.saturating_sub(self.start_page);
        info!(
            "Exported {} rows ({} pages, {} bytes) to {}",
            rows_written,
            pages_processed,
            content.len(),
            self.file_name
        );
        if !warnings.is_empty() {
            warn!(
                "{} cells in {} could not be rendered and were written as {}",
                warnings.len(),
                self.file_name,
                NULL_TOKEN
            );
        }

        Ok(ExportReport {
            document: ExportDocument::new(&self.file_name, &self.content_type, content),
            warnings,
            pages_processed,
            rows_written,
        })
    }
}

/// Exports `source` with the default builder (naive quoting, `Invoice Details.csv`).
pub fn export_csv<S>(columns: &[Column], source: &S) -> Result<ExportReport, ExportError>
where
    S: PagedResultSet + ?Sized,
{
    ExportBuilder::default().build(columns, source)
}

fn check_page_count(
    total_rows: usize,
    page_size: usize,
    declared: usize,
) -> Result<(), ExportError> {
    let expected = if page_size == 0 {
        0
    } else {
        total_rows.div_ceil(page_size)
    };
    if declared != expected || (page_size == 0 && total_rows > 0) {
        return Err(ExportError::PageCountMismatch {
            declared,
            expected,
            total_rows,
            page_size,
        });
    }
    Ok(())
}

/// Output buffer for one export.
enum LineWriter {
    /// Quote each field verbatim
    Naive(Vec<u8>),
    Standard(csv::Writer<Vec<u8>>),
}

impl LineWriter {
    fn new(style: QuoteStyle) -> Self {
        match style {
            QuoteStyle::Naive => LineWriter::Naive(Vec::new()),
            QuoteStyle::Standard => LineWriter::Standard(
                WriterBuilder::new()
                    .quote_style(csv::QuoteStyle::Always)
                    .terminator(csv::Terminator::CRLF)
                    .flexible(true)
                    .from_writer(Vec::new()),
            ),
        }
    }

    fn write_line(&mut self, fields: &[String]) -> Result<(), ExportError> {
        match self {
            LineWriter::Naive(buf) => {
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        buf.push(b',');
                    }
                    buf.push(b'"');
                    buf.extend_from_slice(field.as_bytes());
                    buf.push(b'"');
                }
                buf.extend_from_slice(b"\r\n");
            }
            LineWriter::Standard(writer) => writer.write_record(fields)?,
        }
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        match self {
            LineWriter::Naive(buf) => Ok(buf),
            LineWriter::Standard(writer) => writer
                .into_inner()
                .map_err(|e| ExportError::Write(e.into_error().into())),
        }
    }
}
