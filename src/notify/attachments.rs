//! Attachment assembly: the invoice PDF archive and the size check.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use anyhow::{bail, Context, Result};
use log::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::{INVOICE_ARCHIVE_NAME, ZIP_CONTENT_TYPE};

use super::collaborators::InvoiceRenderer;
use super::types::{Attachment, InvoiceId};

/// Renders every invoice and bundles the PDFs into one ZIP attachment.
///
/// Invoices are rendered one at a time, in the order given.
pub async fn render_invoice_archive(
    renderer: &dyn InvoiceRenderer,
    invoice_ids: &[InvoiceId],
) -> Result<Attachment> {
    if invoice_ids.is_empty() {
        warn!("No invoices to render, attaching an empty {}", INVOICE_ARCHIVE_NAME);
    }

    let mut files = Vec::with_capacity(invoice_ids.len());
    for &invoice_id in invoice_ids {
        let pdf = renderer
            .render_pdf(invoice_id)
            .await
            .with_context(|| format!("Failed to render invoice {}", invoice_id))?;
        debug!("Rendered invoice {} ({} bytes)", invoice_id, pdf.len());
        files.push(pdf);
    }

    build_archive(INVOICE_ARCHIVE_NAME, &files)
}

/// Writes `files` into a deflated ZIP named `name`.
///
/// Repeated file names get a ` (n)` suffix before the extension, since a ZIP
/// cannot hold two entries with the same name.
pub fn build_archive(name: &str, files: &[Attachment]) -> Result<Attachment> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut used = HashSet::new();
    for file in files {
        let entry = unique_name(&file.name, &mut used);
        zip.start_file(entry.as_str(), options)
            .with_context(|| format!("Failed to create {} in {}", entry, name))?;
        zip.write_all(&file.content)
            .with_context(|| format!("Failed to write {} in {}", entry, name))?;
    }

    let cursor = zip
        .finish()
        .with_context(|| format!("Failed to finalize {}", name))?;
    Ok(Attachment::new(name, ZIP_CONTENT_TYPE, cursor.into_inner()))
}

/// Fails if the attachments together exceed `max_bytes`.
pub fn check_total_size(attachments: &[Attachment], max_bytes: usize) -> Result<usize> {
    let total: usize = attachments.iter().map(Attachment::len).sum();
    if total > max_bytes {
        let sizes: Vec<String> = attachments
            .iter()
            .map(|a| format!("{} = {} bytes", a.name, a.len()))
            .collect();
        bail!(
            "Attachments total {} bytes, above the {} byte limit ({})",
            total,
            max_bytes,
            sizes.join(", ")
        );
    }
    Ok(total)
}

fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(i) if i > 0 => (&name[..i], &name[i..]),
        _ => (name, ""),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{} ({}){}", stem, n, ext);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
