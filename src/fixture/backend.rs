//! JSON fixture backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::PDF_CONTENT_TYPE;
use crate::export::{Cell, Column, MemoryResultSet, Row};
use crate::notify::{
    Attachment, Collaborators, Customer, CustomerDirectory, CustomerId, DetailResultSet,
    DetailSource, GroupId, InvoiceGroup, InvoiceGroupSource, InvoiceId, InvoiceRenderer, Mailer,
};

/// One invoice belonging to a group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixtureInvoice {
    pub id: InvoiceId,
    pub group_id: GroupId,
    /// Document number printed on the PDF and used as its file name
    pub number: String,
    /// Pre-rendered PDF, relative to the fixture file. A one-page PDF is
    /// generated when absent.
    #[serde(default)]
    pub pdf_path: Option<PathBuf>,
}

/// A detail row tagged with the group it belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixtureRow {
    pub group_id: GroupId,
    /// Cells in column order
    pub cells: Vec<Cell>,
}

/// A saved query: its columns and every row it can return.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixtureQuery {
    pub id: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<FixtureRow>,
}

/// The fixture document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureData {
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub groups: Vec<InvoiceGroup>,
    #[serde(default)]
    pub invoices: Vec<FixtureInvoice>,
    #[serde(default)]
    pub queries: Vec<FixtureQuery>,
}

/// Serves every read-side collaborator from a [`FixtureData`].
#[derive(Clone, Debug)]
pub struct FixtureBackend {
    data: FixtureData,
    base_dir: PathBuf,
}

impl FixtureBackend {
    /// Wraps `data`; relative PDF paths resolve against `base_dir`.
    pub fn new(data: FixtureData, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            data,
            base_dir: base_dir.into(),
        }
    }

    /// Reads a fixture file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid fixture.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        let data: FixtureData = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse fixture {}", path.display()))?;
        info!(
            "Loaded fixture {}: {} customers, {} groups, {} invoices, {} queries",
            path.display(),
            data.customers.len(),
            data.groups.len(),
            data.invoices.len(),
            data.queries.len()
        );
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(Self::new(data, base_dir))
    }

    pub fn data(&self) -> &FixtureData {
        &self.data
    }

    /// Collaborators backed by this fixture, delivering through `mailer`.
    pub fn collaborators(self: Arc<Self>, mailer: Arc<dyn Mailer>) -> Collaborators {
        Collaborators {
            groups: self.clone(),
            customers: self.clone(),
            renderer: self.clone(),
            details: self,
            mailer,
        }
    }

    fn query(&self, query_id: &str) -> Result<&FixtureQuery> {
        self.data
            .queries
            .iter()
            .find(|q| q.id == query_id)
            .ok_or_else(|| anyhow!("Saved query {} does not exist", query_id))
    }
}

#[async_trait]
impl InvoiceGroupSource for FixtureBackend {
    async fn load_group(&self, group_id: GroupId) -> Result<InvoiceGroup> {
        self.data
            .groups
            .iter()
            .find(|g| g.id == group_id)
            .cloned()
            .ok_or_else(|| anyhow!("Invoice group {} does not exist", group_id))
    }

    async fn grouped_invoices(&self, group_id: GroupId) -> Result<Vec<InvoiceId>> {
        let mut ids: Vec<InvoiceId> = self
            .data
            .invoices
            .iter()
            .filter(|i| i.group_id == group_id)
            .map(|i| i.id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn finalized_groups(&self) -> Result<Vec<GroupId>> {
        Ok(self
            .data
            .groups
            .iter()
            .filter(|g| g.finalized)
            .map(|g| g.id)
            .collect())
    }
}

#[async_trait]
impl CustomerDirectory for FixtureBackend {
    async fn lookup(&self, customer_id: CustomerId) -> Result<Option<Customer>> {
        Ok(self
            .data
            .customers
            .iter()
            .find(|c| c.id == customer_id)
            .cloned())
    }
}

#[async_trait]
impl InvoiceRenderer for FixtureBackend {
    async fn render_pdf(&self, invoice_id: InvoiceId) -> Result<Attachment> {
        let Some(invoice) = self.data.invoices.iter().find(|i| i.id == invoice_id) else {
            bail!("Invoice {} does not exist", invoice_id);
        };
        let name = format!("{}.pdf", invoice.number);

        let content = match &invoice.pdf_path {
            Some(path) => {
                let path = self.base_dir.join(path);
                debug!("Reading invoice {} from {}", invoice_id, path.display());
                tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?
            }
            None => placeholder_pdf(&format!("Invoice {}", invoice.number)),
        };
        Ok(Attachment::new(name, PDF_CONTENT_TYPE, content))
    }
}

#[async_trait]
impl DetailSource for FixtureBackend {
    async fn columns(&self, query_id: &str) -> Result<Vec<Column>> {
        Ok(self.query(query_id)?.columns.clone())
    }

    async fn run(
        &self,
        query_id: &str,
        group_id: GroupId,
        page_size: usize,
    ) -> Result<DetailResultSet> {
        if page_size == 0 {
            bail!("Page size must be positive");
        }
        let query = self.query(query_id)?;
        let rows: Vec<Row> = query
            .rows
            .iter()
            .filter(|r| r.group_id == group_id)
            .map(|r| Row::from_cells(&query.columns, r.cells.clone()))
            .collect();
        debug!(
            "Query {} returned {} rows for invoice group {}",
            query_id,
            rows.len(),
            group_id
        );
        Ok(Box::new(MemoryResultSet::new(rows, page_size)))
    }
}

/// A minimal single-page PDF showing `text`.
fn placeholder_pdf(text: &str) -> Vec<u8> {
    let escaped: String = text
        .chars()
        .filter(char::is_ascii)
        .flat_map(|c| match c {
            '(' | ')' | '\\' => vec!['\\', c],
            _ => vec![c],
        })
        .collect();
    let stream = format!("BT /F1 18 Tf 72 720 Td ({}) Tj ET", escaped);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", stream.len(), stream),
    ];

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }
    let xref = out.len();
    out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        out.push_str(&format!("{:010} 00000 n \n", offset));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref
    ));
    out.into_bytes()
}
