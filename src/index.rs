//! Navigation page listing every converted email.
//!
//! [`render_index`] is a pure function of the known output files;
//! [`scan_output_dir`] and [`write_index`] do the filesystem side.

use crate::email::EmailRecord;
use crate::render::FONT_AWESOME_CSS;
use crate::text_utils::truncate_chars;
use crate::{ConverterConfig, Result};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const INDEX_FILE_NAME: &str = "index.html";
const TITLE_MAX: usize = 50;

const INDEX_CSS: &str = "
body { font-family: Arial, sans-serif; margin: 0; background: #f5f6fa; }
header { background: #2c3e50; color: white; padding: 1rem 2rem; }
.email-count { font-size: 0.9rem; opacity: 0.8; }
.email-list { max-width: 960px; margin: 1rem auto; }
.email-section-header h3 { color: #2c3e50; }
.email-item { display: flex; gap: 1rem; align-items: center; background: white; padding: 0.75rem 1rem; margin-bottom: 0.5rem; border-radius: 4px; }
.email-item.recent { border-left: 4px solid #27ae60; }
.email-item a { color: inherit; text-decoration: none; }
.email-title { flex: 1; }
";

/// One converted email known to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// The generated HTML page.
    pub html_path: PathBuf,
    /// Link target of the page, relative to the index.
    pub href: String,
    /// Link target of the matching PDF, relative to the index.
    pub pdf_href: String,
    /// The sidecar record, when one was written.
    pub record: Option<EmailRecord>,
}

impl IndexEntry {
    /// Entry linking `html_path` and `pdf/<name>.pdf` as given.
    pub fn new(html_path: PathBuf, record: Option<EmailRecord>) -> Self {
        let href = path_href(&html_path);
        let pdf_href = format!("pdf/{}.pdf", crate::pipeline::base_name(&html_path));
        Self {
            html_path,
            href,
            pdf_href,
            record,
        }
    }

    /// Subject from the sidecar, else the page's base name; both cut at 50
    /// characters.
    pub fn title(&self) -> String {
        match &self.record {
            Some(record) => truncate_chars(&record.subject, TITLE_MAX),
            None => truncate_chars(&crate::pipeline::base_name(&self.html_path), TITLE_MAX),
        }
    }

    fn is_in(&self, recent: &[PathBuf]) -> bool {
        let name = self.html_path.file_name();
        recent.iter().any(|p| p.file_name() == name)
    }
}

/// List the pages of `dir` (except a previous index) with their sidecars,
/// sorted by file name.
pub async fn scan_output_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<IndexEntry>> {
    let dir = dir.as_ref();
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut pages = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_page = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("html"));
        if !is_page || path.file_name().is_some_and(|n| n == INDEX_FILE_NAME) {
            continue;
        }
        pages.push(path);
    }
    pages.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut index = Vec::with_capacity(pages.len());
    for html in pages {
        let sidecar = html.with_extension("json");
        let record = match EmailRecord::load_sidecar(&sidecar).await {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("no usable sidecar {}: {e}", sidecar.display());
                None
            }
        };
        index.push(IndexEntry::new(html, record));
    }

    Ok(index)
}

/// Build the navigation page. Entries whose page appears in `recent` are
/// listed first under "Nouveaux emails".
pub fn render_index(entries: &[IndexEntry], recent: &[PathBuf]) -> String {
    let (new, old): (Vec<&IndexEntry>, Vec<&IndexEntry>) =
        entries.iter().partition(|e| e.is_in(recent));

    let count = if new.is_empty() {
        format!("{} emails", entries.len())
    } else {
        format!("{} nouveaux / {} emails", new.len(), entries.len())
    };

    let mut out = String::with_capacity(2048 + entries.len() * 512);
    let _ = write!(
        out,
        r#"<!DOCTYPE html>
<html lang="fr">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>OptimXmlPreview - Navigation</title>
<link rel="stylesheet" href="{}">
<style>{INDEX_CSS}</style>
</head>
<body>
<header><h1>OptimXmlPreview</h1><span class="email-count">{count}</span></header>
<main class="email-list">
"#,
        encode_double_quoted_attribute(FONT_AWESOME_CSS)
    );

    if !new.is_empty() {
        write_section(&mut out, "fas fa-plus-circle", "Nouveaux emails", &new, true);
    }
    if !old.is_empty() {
        write_section(&mut out, "fas fa-archive", "Emails précédents", &old, false);
    }
    if entries.is_empty() {
        out.push_str("<p class=\"empty\">Aucun email converti.</p>\n");
    }

    out.push_str("</main>\n</body>\n</html>\n");
    out
}

fn write_section(out: &mut String, icon: &str, heading: &str, entries: &[&IndexEntry], recent: bool) {
    let _ = writeln!(
        out,
        r#"<div class="email-section-header"><h3><i class="{icon}"></i> {heading} ({})</h3></div>"#,
        entries.len()
    );

    for entry in entries {
        let star = if recent {
            r#" <i class="fas fa-star recent-star" title="Nouveau fichier"></i>"#
        } else {
            ""
        };
        let _ = writeln!(
            out,
            r#"<div class="email-item{}"><i class="fas fa-envelope"></i><a class="email-title" href="{}">{}{star}</a><a class="open-pdf" href="{}" title="Ouvrir le PDF"><i class="fas fa-file-pdf"></i></a></div>"#,
            if recent { " recent" } else { "" },
            encode_double_quoted_attribute(&entry.href),
            encode_text(&entry.title()),
            encode_double_quoted_attribute(&entry.pdf_href),
        );
    }
}

/// Scan `output_dir` and write the index to [`ConverterConfig::index_path`],
/// with links relative to the index location.
pub async fn write_index<P: AsRef<Path>>(
    config: &ConverterConfig,
    output_dir: P,
    recent: &[PathBuf],
) -> Result<PathBuf> {
    let index_dir = config
        .index_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let mut entries = scan_output_dir(output_dir).await?;
    for entry in &mut entries {
        let pdf = config
            .pdf_output_dir
            .join(format!("{}.pdf", crate::pipeline::base_name(&entry.html_path)));
        entry.href = relative_href(&entry.html_path, &index_dir);
        entry.pdf_href = relative_href(&pdf, &index_dir);
    }

    if !index_dir.as_os_str().is_empty() {
        tokio::fs::create_dir_all(&index_dir).await?;
    }
    tokio::fs::write(&config.index_path, render_index(&entries, recent)).await?;
    info!(
        "navigation index written to {} ({} email(s))",
        config.index_path.display(),
        entries.len()
    );

    Ok(config.index_path.clone())
}

fn relative_href(target: &Path, base: &Path) -> String {
    match target.strip_prefix(base) {
        Ok(relative) => path_href(relative),
        Err(_) => path_href(target),
    }
}

fn path_href(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
