//! Email addresses and envelopes
//!
//! Header values are free text written by template authors, so address
//! extraction is lenient: the RFC 2822 grammar is tried first, then an
//! `<...>` pair, then any whitespace separated token containing `@`.

use std::sync::LazyLock;

use chumsky::Parser;
use regex::Regex;

pub use self::envelope::Envelope;

mod envelope;
mod parsers;

static ANGLE_ADDR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>").expect("valid regex"));
static LIST_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*,\s*").expect("valid regex"));

fn bare((_, (user, domain)): parsers::Mailbox) -> String {
    format!("{}@{}", user.trim(), domain.trim())
}

/// Extracts the bare address out of a single header value
///
/// ```
/// # use courier::address::extract_address;
/// assert_eq!(extract_address("Ops <ops@example.com>").as_deref(), Some("ops@example.com"));
/// assert_eq!(extract_address("ops@example.com").as_deref(), Some("ops@example.com"));
/// assert_eq!(extract_address("nobody"), None);
/// ```
pub fn extract_address(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(mailbox) = parsers::mailbox().parse(raw) {
        return Some(bare(mailbox));
    }

    if let Some(captures) = ANGLE_ADDR.captures(raw) {
        let addr = captures[1].trim();
        if !addr.is_empty() {
            return Some(addr.to_owned());
        }
    }

    raw.split_whitespace()
        .map(|token| token.trim_matches(|c: char| matches!(c, '"' | '\'' | ',' | ';')))
        .find(|token| token.contains('@'))
        .map(str::to_owned)
}

/// Extracts the bare addresses out of a comma separated header value
///
/// Entries without any recognizable address are dropped.
///
/// ```
/// # use courier::address::address_list;
/// assert_eq!(
///     address_list("\"Doe, J\" <j@example.com>, k@example.com"),
///     ["j@example.com", "k@example.com"]
/// );
/// ```
pub fn address_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    if let Ok(mailboxes) = parsers::mailbox_list().parse(raw) {
        return mailboxes.into_iter().map(bare).collect();
    }

    LIST_SEPARATOR
        .split(raw)
        .filter_map(extract_address)
        .collect()
}

/// Splits a rendered recipient header into envelope addresses
///
/// Unlike [`address_list`], an entry without a recognizable address is kept
/// as written, so the relay gets to reject it.
pub fn recipient_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    if let Ok(mailboxes) = parsers::mailbox_list().parse(raw) {
        return mailboxes.into_iter().map(bare).collect();
    }

    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| extract_address(entry).unwrap_or_else(|| entry.to_owned()))
        .collect()
}
