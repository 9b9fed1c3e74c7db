//! Order identifier extraction from the label email subject.
//!
//! Subjects follow a fixed upstream format, e.g.
//! `Bordereau d'envoi Vinted pour ABC-123 - Jeans taille 38`.

use std::sync::LazyLock;

use regex::Regex;

/// Placeholder when the subject carries no identifier.
pub const UNKNOWN_ID: &str = "UNKNOWN";

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"pour ([A-Za-z0-9-]+) -").unwrap());

/// Extract the identifier between `pour ` and ` -`, or [`UNKNOWN_ID`].
pub fn extract_id(subject: &str) -> String {
    ID_PATTERN
        .captures(subject)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN_ID.to_string())
}

/// Whether an identifier is the placeholder.
pub fn is_unknown(id: &str) -> bool {
    id == UNKNOWN_ID
}
