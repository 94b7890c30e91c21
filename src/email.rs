use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Result;

// ── EmailRecord ──────────────────────────────────────────────────────────────

/// One email recovered from an RPVA XML export.
///
/// Returned by [`crate::MetadataExtractor::extract`]. A record is built fresh
/// for every input document and consumed by the renderers; the HTML page, the
/// PDF and the optional JSON sidecar on disk are the only things that persist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Subject, or the configured default subject. Never empty.
    pub subject: String,

    /// Sender, or the configured default sender. Never empty.
    pub from: String,

    /// Recipient, empty when absent.
    pub to: String,

    /// Date exactly as found in the envelope; formatting happens at render
    /// time.
    pub date: String,

    /// Reconstructed message text with `\n` line breaks; may be empty.
    /// Always plain text, never markup.
    pub body: String,

    /// Addresses recovered from an envelope that only carried a
    /// semicolon-separated address list. When non-empty, `body` is empty.
    #[serde(default)]
    pub participants: Vec<String>,

    /// Attachment file names in discovery order, without duplicates.
    pub attachments: Vec<String>,
}

impl EmailRecord {
    /// Returns `true` when the message was rebuilt as a list of email
    /// addresses rather than plain text.
    pub fn has_participant_list(&self) -> bool {
        !self.participants.is_empty()
    }

    /// Returns `true` when at least one attachment name was found.
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Write the record as pretty JSON to `path`.
    pub async fn save_sidecar<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Read a record previously written by [`save_sidecar`](Self::save_sidecar).
    pub async fn load_sidecar<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Returns the lowercase extension of an attachment name, or `None` when it
/// has none.
///
/// ```
/// # use optimxmlpreview::attachment_extension;
/// assert_eq!(attachment_extension("Conclusions.PDF").as_deref(), Some("pdf"));
/// assert_eq!(attachment_extension("readme"), None);
/// ```
pub fn attachment_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> EmailRecord {
        EmailRecord {
            subject: "Notification RPVA".into(),
            from: "greffe@justice.fr".into(),
            to: "avocat@barreau.fr".into(),
            date: "2025-05-26T13:30:00.000+01:00".into(),
            body: "Bonjour\n\nCordialement".into(),
            participants: Vec::new(),
            attachments: vec!["conclusions.pdf".into()],
        }
    }

    #[test]
    fn markup_in_body_is_not_a_participant_list() {
        assert!(!record().has_participant_list());
        let forged = EmailRecord {
            body: r#"<div class="participants-list"><ul></ul></div>"#.into(),
            ..record()
        };
        assert!(!forged.has_participant_list());
        let list = EmailRecord {
            body: String::new(),
            participants: vec!["a@barreau.fr".into(), "b@barreau.fr".into()],
            ..record()
        };
        assert!(list.has_participant_list());
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(attachment_extension("pieces.ZIP").as_deref(), Some("zip"));
        assert_eq!(attachment_extension("sans_extension"), None);
    }

    #[tokio::test]
    async fn sidecar_survives_a_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mail.json");

        record().save_sidecar(&path).await.unwrap();
        assert_eq!(EmailRecord::load_sidecar(&path).await.unwrap(), record());
    }

    #[tokio::test]
    async fn sidecar_without_participants_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.json");
        std::fs::write(
            &path,
            r#"{"subject":"S","from":"f","to":"","date":"","body":"b","attachments":[]}"#,
        )
        .unwrap();

        let record = EmailRecord::load_sidecar(&path).await.unwrap();
        assert!(record.participants.is_empty());
        assert_eq!(record.body, "b");
    }
}
