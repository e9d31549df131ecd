//! Collaborator traits.
//!
//! The pipeline reaches every external system through one of these traits:
//! the record store, the customer directory, the PDF renderer, the detail
//! query runner and the mail transport. Implementations own their own
//! retries and timeouts, except for `Mailer` whose sends are retried by the
//! pipeline.

use anyhow::Result;
use async_trait::async_trait;

use crate::export::{Column, PagedResultSet, Row};

use super::types::{Attachment, Customer, CustomerId, GroupId, InvoiceGroup, InvoiceId, OutgoingMessage};

/// Paged detail rows for one invoice group.
pub type DetailResultSet = Box<dyn PagedResultSet<Row = Row> + Send>;

/// Invoice group records.
#[async_trait]
pub trait InvoiceGroupSource: Send + Sync {
    async fn load_group(&self, group_id: GroupId) -> Result<InvoiceGroup>;

    /// Invoices grouped into `group_id`, each listed once.
    async fn grouped_invoices(&self, group_id: GroupId) -> Result<Vec<InvoiceId>>;

    /// Every finalized group, notified or not. The ledger decides which still
    /// need mail.
    async fn finalized_groups(&self) -> Result<Vec<GroupId>>;
}

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn lookup(&self, customer_id: CustomerId) -> Result<Option<Customer>>;
}

#[async_trait]
pub trait InvoiceRenderer: Send + Sync {
    /// Renders one invoice as a PDF attachment.
    async fn render_pdf(&self, invoice_id: InvoiceId) -> Result<Attachment>;
}

/// Runs the saved query that produces line-item detail.
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn columns(&self, query_id: &str) -> Result<Vec<Column>>;

    /// Runs `query_id` filtered to `group_id`, paged by `page_size`.
    async fn run(
        &self,
        query_id: &str,
        group_id: GroupId,
        page_size: usize,
    ) -> Result<DetailResultSet>;
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers `message`. `Ok` means the transport accepted it.
    async fn send(&self, message: &OutgoingMessage) -> Result<()>;
}
