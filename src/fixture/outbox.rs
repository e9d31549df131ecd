//! Mailer that writes each message to a directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use serde::Serialize;

use crate::notify::{Mailer, OutgoingMessage};

#[derive(Serialize)]
struct AttachmentEntry<'a> {
    name: &'a str,
    content_type: &'a str,
    bytes: usize,
}

#[derive(Serialize)]
struct Envelope<'a> {
    author_id: u64,
    recipients: &'a [String],
    subject: &'a str,
    related_group: u64,
    queued_at: String,
    attachments: Vec<AttachmentEntry<'a>>,
}

/// Writes every message to `<outbox>/group-<id>-<millis>/`.
///
/// The directory holds `message.json` (envelope and attachment list),
/// `body.html` and each attachment under its own name.
#[derive(Clone, Debug)]
pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        let now = chrono::Utc::now();
        let target = self.dir.join(format!(
            "group-{}-{}",
            message.related_group,
            now.timestamp_millis()
        ));
        tokio::fs::create_dir_all(&target)
            .await
            .with_context(|| format!("Failed to create {}", target.display()))?;

        let envelope = Envelope {
            author_id: message.author_id,
            recipients: &message.recipients,
            subject: &message.subject,
            related_group: message.related_group,
            queued_at: now.to_rfc3339(),
            attachments: message
                .attachments
                .iter()
                .map(|a| AttachmentEntry {
                    name: &a.name,
                    content_type: &a.content_type,
                    bytes: a.len(),
                })
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&envelope).context("Failed to encode envelope")?;
        write_file(&target.join("message.json"), &json).await?;
        write_file(&target.join("body.html"), message.body.as_bytes()).await?;
        for attachment in &message.attachments {
            write_file(&target.join(&attachment.name), &attachment.content).await?;
        }

        info!(
            "Queued invoice group {} for {} in {}",
            message.related_group,
            message.recipients.join(", "),
            target.display()
        );
        Ok(())
    }
}

async fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
