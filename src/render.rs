//! HTML page generation for one [`EmailRecord`].

use crate::email::attachment_extension;
use crate::text_utils::truncate_chars;
use crate::{ConverterConfig, EmailRecord};
use chrono::DateTime;
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write;
use std::path::Path;
use tracing::warn;

pub(crate) const FONT_AWESOME_CSS: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css";

/// Subjects longer than this are cut in the page title.
const TITLE_SUBJECT_MAX: usize = 50;

const FALLBACK_CSS: &str = "
body { font-family: Arial, sans-serif; margin: 2rem; }
.container { max-width: 1024px; margin: 0 auto; }
.email-container { background: white; padding: 1rem; border: 1px solid #ddd; }
.email-header { border-bottom: 1px solid #ccc; padding: 1rem; }
.email-body { padding: 1rem; }
.footer { text-align: center; padding: 1rem; color: #666; }
";

/// Turns an [`EmailRecord`] into a complete HTML document.
pub trait PageRenderer {
    fn render(&self, record: &EmailRecord) -> String;
}

/// The standard email page: header, message body, attachment list, footer.
#[derive(Debug, Clone)]
pub struct EmailPageTemplate {
    app_title: String,
    footer_text: String,
    stylesheet: String,
}

impl EmailPageTemplate {
    /// Build the template, inlining the configured stylesheet or the minimal
    /// built-in one when it cannot be read.
    pub fn from_config(config: &ConverterConfig) -> Self {
        Self {
            app_title: config.app_title.clone(),
            footer_text: config.footer_text.clone(),
            stylesheet: load_stylesheet(config.email_viewer_css.as_deref()),
        }
    }

    fn page_title(&self, subject: &str) -> String {
        format!("{} - {}", truncate_chars(subject, TITLE_SUBJECT_MAX), self.app_title)
    }

    fn write_header(&self, out: &mut String, record: &EmailRecord) {
        let date = format_date(&record.date);
        let rows = [("De", record.from.as_str()), ("À", record.to.as_str()), ("Date", date.as_str())];

        out.push_str(r#"<div class="email-header"><div class="email-header-h2"><h2>"#);
        out.push_str(&encode_text(&record.subject));
        out.push_str("</h2></div>\n");

        for (label, value) in rows.iter().filter(|(_, value)| !value.is_empty()) {
            let _ = writeln!(
                out,
                r#"<div class="header-detail"><span class="header-label">{label}:</span><span class="header-value">{}</span></div>"#,
                encode_text(value)
            );
        }

        out.push_str("</div>\n");
    }

    fn write_body(&self, out: &mut String, record: &EmailRecord) {
        out.push_str(r#"<div class="message-section"><h3 class="section-title">Corps du message</h3><div class="email-body">"#);

        if record.has_participant_list() {
            write_participants(out, &record.participants);
        } else if record.body.trim().is_empty() {
            out.push_str(
                r#"<div class="no-content-message"><i class="fas fa-info-circle"></i><span>Contenu du message non disponible dans ce fichier XML</span></div>"#,
            );
        } else {
            out.push_str(&encode_text(&record.body).replace('\n', "<br>\n"));
        }

        out.push_str("</div></div>\n");
    }

    fn write_attachments(&self, out: &mut String, record: &EmailRecord) {
        if !record.has_attachments() {
            return;
        }

        let _ = writeln!(
            out,
            r#"<div class="attachments"><h3 class="section-title">Pièces jointes ({})</h3>"#,
            record.attachments.len()
        );

        for name in &record.attachments {
            let _ = writeln!(
                out,
                r#"<div class="attachment"><i class="attachment-icon {}"></i><span class="attachment-name">{}</span></div>"#,
                file_icon(name),
                encode_text(name)
            );
        }

        out.push_str("</div>\n");
    }
}

impl PageRenderer for EmailPageTemplate {
    fn render(&self, record: &EmailRecord) -> String {
        let mut out = String::with_capacity(4096 + self.stylesheet.len() + record.body.len());

        let _ = write!(
            out,
            r#"<!DOCTYPE html>
<html lang="fr">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<link rel="stylesheet" href="{fa}" crossorigin="anonymous" referrerpolicy="no-referrer">
<style>{css}</style>
</head>
<body>
<div class="container">
<div class="email-container">
"#,
            title = encode_text(&self.page_title(&record.subject)),
            fa = encode_double_quoted_attribute(FONT_AWESOME_CSS),
            css = self.stylesheet,
        );

        self.write_header(&mut out, record);
        self.write_body(&mut out, record);
        self.write_attachments(&mut out, record);

        let _ = write!(
            out,
            r#"</div>
<div class="footer"><div class="footer-content"><span class="footer-text">{}</span></div></div>
</div>
</body>
</html>
"#,
            encode_text(&self.footer_text)
        );

        out
    }
}

fn write_participants(out: &mut String, addresses: &[String]) {
    out.push_str(r#"<div class="participants-list"><h4>Adresses email concernées :</h4><ul>"#);
    for address in addresses {
        let _ = write!(
            out,
            r#"<li><i class="fas fa-envelope"></i> {}</li>"#,
            encode_text(address)
        );
    }
    out.push_str("</ul></div>");
}

fn load_stylesheet(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return FALLBACK_CSS.to_string();
    };

    match std::fs::read_to_string(path) {
        Ok(css) => css,
        Err(e) => {
            warn!("cannot load stylesheet {}: {e}, using the built-in one", path.display());
            FALLBACK_CSS.to_string()
        }
    }
}

/// `dd/mm/yyyy hh:mm:ss` for RFC 3339 dates, the raw text otherwise.
pub(crate) fn format_date(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(date) => date.format("%d/%m/%Y %H:%M:%S").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Font Awesome class matching an attachment's extension.
pub(crate) fn file_icon(name: &str) -> &'static str {
    match attachment_extension(name).as_deref() {
        Some("pdf") => "fas fa-file-pdf",
        Some("doc" | "docx") => "fas fa-file-word",
        Some("jpg" | "jpeg" | "png" | "gif") => "fas fa-file-image",
        Some("xml" | "xeml") => "fas fa-file-code",
        Some("txt") => "fas fa-file-alt",
        Some("zip" | "rar") => "fas fa-file-archive",
        Some("xls" | "xlsx") => "fas fa-file-excel",
        Some("ppt" | "pptx") => "fas fa-file-powerpoint",
        _ => "fas fa-file",
    }
}
