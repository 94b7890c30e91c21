//! Shared text clean-up utilities used by the extractor and the renderers.

use once_cell::sync::Lazy;
use regex::Regex;

/// Escaped carriage return as it appears in RPVA exports.
const ESCAPED_CR: &str = "&#xD;";

static HORIZONTAL_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static ANY_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Turn every line-break encoding found in exports (`&#xD;` left verbatim,
/// decoded `\r\n` or lone `\r`) into `\n`.
pub fn normalize_line_breaks(text: &str) -> String {
    text.replace(ESCAPED_CR, "\n")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

/// Clean a message body: line breaks normalised, runs of spaces and tabs
/// collapsed to one space, newlines preserved, outer whitespace trimmed.
///
/// Applying it twice gives the same result as applying it once.
///
/// ```
/// use optimxmlpreview::clean_body_text;
///
/// let once = clean_body_text("Bonjour&#xD;&#xD;Cordialement");
/// assert_eq!(once, "Bonjour\n\nCordialement");
/// assert_eq!(clean_body_text(&once), once);
/// ```
pub fn clean_body_text(text: &str) -> String {
    let normalized = normalize_line_breaks(text);
    HORIZONTAL_WHITESPACE
        .replace_all(&normalized, " ")
        .trim()
        .to_string()
}

/// Collapse every whitespace run (newlines included) into one space and trim.
pub fn squash_whitespace(text: &str) -> String {
    ANY_WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Returns `true` for a non-empty string made only of ASCII digits.
pub fn is_numeric(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// Truncate to `max` characters, appending `...` when something was cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
