//! File-backed collaborators for running the pipeline without live systems.
//!
//! A fixture is one JSON document holding customers, invoice groups, invoices
//! and the saved detail queries. Outgoing mail is written to an outbox
//! directory instead of being delivered.

mod backend;
mod outbox;

pub use backend::{FixtureBackend, FixtureData, FixtureInvoice, FixtureQuery, FixtureRow};
pub use outbox::OutboxMailer;
