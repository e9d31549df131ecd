//! Invoice group notification.
//!
//! This module provides:
//! - Collaborator traits for the record store, directory, renderer, detail
//!   query and mail transport
//! - Message composition and attachment assembly
//! - The staged pipeline for one group and the batch sweep over all groups

mod attachments;
mod collaborators;
mod message;
mod pipeline;
mod sweep;
mod types;

pub use attachments::{build_archive, check_total_size, render_invoice_archive};
pub use collaborators::{
    CustomerDirectory, DetailResultSet, DetailSource, InvoiceGroupSource, InvoiceRenderer, Mailer,
};
pub use message::{compose_message, format_currency, format_date, ComposedMessage};
pub use pipeline::{Collaborators, NotificationOutcome, Notifier};
pub use sweep::SweepReport;
pub use types::{
    Attachment, Customer, CustomerId, GroupId, InvoiceGroup, InvoiceId, OutgoingMessage,
    SkipReason,
};
