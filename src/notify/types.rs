//! Records exchanged with the collaborators of the notification pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type GroupId = u64;
pub type CustomerId = u64;
pub type InvoiceId = u64;

/// An invoice group as loaded from the source system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceGroup {
    pub id: GroupId,
    /// Customer-facing group number
    pub number: String,
    pub customer_id: CustomerId,
    /// Customer display name
    pub customer_name: String,
    pub subsidiary: String,
    #[serde(default)]
    pub amount_due: f64,
    /// ISO 4217 code
    pub currency: String,
    pub due_date: NaiveDate,
    pub tran_date: NaiveDate,
    #[serde(default)]
    pub finalized: bool,
}

/// A customer and the addresses invoice mail goes to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    #[serde(default)]
    pub invoice_emails: Vec<String>,
}

impl Customer {
    /// Non-blank recipient addresses.
    pub fn recipients(&self) -> Vec<String> {
        self.invoice_emails
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// A file attached to an outgoing message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            content,
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl From<crate::export::ExportDocument> for Attachment {
    fn from(doc: crate::export::ExportDocument) -> Self {
        Attachment {
            name: doc.name().to_string(),
            content_type: doc.content_type().to_string(),
            content: doc.into_content(),
        }
    }
}

/// Everything the mailer needs to deliver one notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Employee the message is sent as
    pub author_id: u64,
    pub recipients: Vec<String>,
    pub subject: String,
    /// HTML body
    pub body: String,
    pub attachments: Vec<Attachment>,
    /// Group the sent message is linked to
    pub related_group: GroupId,
}

/// Why a group was not notified, without it being an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The group is not finalized yet
    NotFinalized,
    /// The customer has no invoice email addresses
    NoRecipients,
    /// The customer record does not exist
    UnknownCustomer,
    /// Another trigger is sending this group right now
    InProgress,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SkipReason::NotFinalized => "group is not finalized",
            SkipReason::NoRecipients => "customer has no invoice emails",
            SkipReason::UnknownCustomer => "customer not found",
            SkipReason::InProgress => "another notification is in progress",
        })
    }
}
