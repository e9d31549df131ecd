//! Subject and body of an invoice group notification.

use chrono::NaiveDate;

use super::types::InvoiceGroup;

/// Subject and HTML body for one group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposedMessage {
    pub subject: String,
    pub body: String,
}

/// Builds the message for `group`, closing with `signature`.
///
/// `signature` is inserted as-is and may contain HTML; every value taken from
/// the group is escaped.
pub fn compose_message(group: &InvoiceGroup, signature: &str) -> ComposedMessage {
    let subject = format!(
        "Invoice #{} for {} - {}",
        group.number,
        group.customer_name,
        format_date(group.tran_date)
    );

    let amount = format_currency(group.amount_due, &group.currency);
    let body = format!(
        "<p>Hello,</p>\n\
         <p>Attached you'll find a PDF file containing your {subsidiary} invoice group \
         <strong>{number}</strong>. The amount outstanding, {amount} {currency}, is due on {due}.</p>\n\
         <p><b><span style=\"color:red\">Note</span></b>: Please confirm receipt of this email by \
         responding with the word \u{201c}received\u{201d} in the subject line. This is unnecessary \
         if your account will automatically reply once you have read this email.</p>\n\
         <p>Thank you and have a good day.</p>\n\
         <p><b>Best Regards,</b></p>\n\
         <p>{signature}</p>\n",
        subsidiary = escape_html(&group.subsidiary),
        number = escape_html(&group.number),
        amount = escape_html(&amount),
        currency = escape_html(&group.currency),
        due = format_date(group.due_date),
        signature = signature,
    );

    ComposedMessage { subject, body }
}

/// Formats a date the way the billing system prints it (`3/7/2025`).
pub fn format_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}

/// Formats `amount` with thousands separators and the currency's symbol.
///
/// Unknown currencies are prefixed with their code.
pub fn format_currency(amount: f64, currency: &str) -> String {
    let (symbol, decimals) = match currency.to_ascii_uppercase().as_str() {
        "USD" => ("$", 2),
        "CAD" => ("CA$", 2),
        "AUD" => ("A$", 2),
        "EUR" => ("\u{20ac}", 2),
        "GBP" => ("\u{a3}", 2),
        "JPY" => ("\u{a5}", 0),
        _ => ("", 2),
    };

    let fixed = format!("{:.*}", decimals, amount.abs());
    let (whole, fraction) = match fixed.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(fraction) = fraction {
        grouped.push('.');
        grouped.push_str(fraction);
    }

    let sign = if amount < 0.0 && grouped.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    if symbol.is_empty() {
        format!("{}{} {}", sign, currency, grouped)
    } else {
        format!("{}{}{}", sign, symbol, grouped)
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
