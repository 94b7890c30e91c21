//! # optimxmlpreview
//!
//! Converts RPVA email exports (XML envelopes sent by the French bar's
//! electronic exchange network) into readable HTML pages and PDF documents.
//!
//! ## What this crate does
//!
//! 1. **Extract** — reads one XML export and recovers an [`EmailRecord`]
//!    (subject, sender, recipient, date, body, attachments), even when the
//!    XML is malformed or the body has to be reconstructed from the envelope.
//! 2. **Render** — turns the record into an HTML page and, when a headless
//!    browser command is configured, into a PDF next to it.
//! 3. **Batch** — converts a whole input directory five files at a time and
//!    reports how many conversions succeeded or failed.
//! 4. **Index** — writes a navigation page listing every converted email.
//!
//! ## Quick example
//!
//! ```no_run
//! use optimxmlpreview::{BatchConverter, ConverterConfig};
//!
//! # async fn run() -> optimxmlpreview::Result<()> {
//! let config = ConverterConfig::load(None)?;
//! let converter = BatchConverter::new(&config);
//!
//! let result = converter.convert_directory("./Data", "./Output").await?;
//! println!("{} successes, {} failures", result.success_count, result.failure_count);
//! # Ok(())
//! # }
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

mod email;
mod extractor;
mod file_discovery;
pub mod index;
mod pdf;
mod pipeline;
mod render;
mod text_utils;
mod validator;
pub mod xml_tree;

pub use email::{attachment_extension, EmailRecord};
pub use extractor::MetadataExtractor;
pub use file_discovery::{clear_input_dir, discover_inputs, is_supported, ClearReport};
pub use pdf::{CommandPdfRenderer, PdfRenderer};
pub use pipeline::{BatchConverter, ConversionBatchResult, FileOutcome};
pub use render::{EmailPageTemplate, PageRenderer};
pub use text_utils::clean_body_text;
// PdfValidator stays internal; CommandPdfRenderer runs it on every PDF it produces.

// ── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration shared by the extractor, the renderers and the
/// batch pipeline.
///
/// Built once at process start (see [`ConverterConfig::load`]) and passed by
/// reference everywhere else.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Input file extensions accepted by discovery, compared
    /// case-insensitively (e.g. `".xml"`).
    pub supported_extensions: Vec<String>,

    /// Extension given to every generated page.
    pub output_file_extension: String,

    /// Directory receiving the generated PDF files.
    pub pdf_output_dir: PathBuf,

    /// Number of files converted concurrently before the next group starts.
    pub batch_size: usize,

    /// Upper bound, in seconds, for a single PDF render.
    pub render_timeout_secs: u64,

    /// Subject used when the envelope has no `Subject` element.
    pub default_subject: String,

    /// Sender used when the envelope has no `From` element.
    pub default_sender: String,

    /// Residual envelope text must be strictly longer than this many
    /// characters to be kept as a message body.
    pub min_residual_body_len: usize,

    /// Envelope children tried, in order, when the document has no `body`.
    pub alternative_body_tags: Vec<String>,

    /// External command producing a PDF from an HTML file. `{html}` and
    /// `{pdf}` are replaced by the input and output paths. `None` disables
    /// PDF generation.
    pub pdf_command: Option<String>,

    /// Stylesheet inlined into every page. Falls back to a minimal built-in
    /// stylesheet when missing or unreadable.
    pub email_viewer_css: Option<PathBuf>,

    /// Application name appended to page titles.
    pub app_title: String,

    /// Text displayed in the footer of every page.
    pub footer_text: String,

    /// Write the navigation index after each directory run.
    pub generate_index: bool,

    /// Location of the navigation index.
    pub index_path: PathBuf,

    /// Write `<name>.json` next to each page with the extracted record.
    pub write_sidecar: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            supported_extensions: vec![".xml".into(), ".xeml".into()],
            output_file_extension: ".html".into(),
            pdf_output_dir: PathBuf::from("./pdf"),
            batch_size: 5,
            render_timeout_secs: 60,
            default_subject: "Sans objet".into(),
            default_sender: "Expéditeur inconnu".into(),
            min_residual_body_len: 5,
            alternative_body_tags: ["Message", "Content", "Text", "MessageBody", "mail-body"]
                .into_iter()
                .map(String::from)
                .collect(),
            pdf_command: None,
            email_viewer_css: Some(PathBuf::from("assets/css/email-viewer.css")),
            app_title: "OptimXmlPreview".into(),
            footer_text: "OptimXmlPreview v2.0 - Visualisation d'emails eBarreau".into(),
            generate_index: true,
            index_path: PathBuf::from("./index.html"),
            write_sidecar: true,
        }
    }
}

impl ConverterConfig {
    /// Build the configuration: the TOML file at `path` when given (defaults
    /// otherwise), then `OPTIMXML_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document. Missing keys keep their default value.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Recognised keys: `OPTIMXML_PDF_OUTPUT_DIR`, `OPTIMXML_BATCH_SIZE`,
    /// `OPTIMXML_RENDER_TIMEOUT` (seconds) and `OPTIMXML_PDF_COMMAND`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("OPTIMXML_PDF_OUTPUT_DIR") {
            self.pdf_output_dir = PathBuf::from(dir);
        }

        if let Some(size) = lookup("OPTIMXML_BATCH_SIZE") {
            self.batch_size = size.trim().parse().map_err(|_| {
                ConvertError::InvalidConfig(format!("OPTIMXML_BATCH_SIZE is not a number: {size}"))
            })?;
        }

        if let Some(secs) = lookup("OPTIMXML_RENDER_TIMEOUT") {
            self.render_timeout_secs = secs.trim().parse().map_err(|_| {
                ConvertError::InvalidConfig(format!(
                    "OPTIMXML_RENDER_TIMEOUT is not a number of seconds: {secs}"
                ))
            })?;
        }

        if let Some(cmd) = lookup("OPTIMXML_PDF_COMMAND") {
            self.pdf_command = Some(cmd).filter(|c| !c.trim().is_empty());
        }

        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ConvertError::InvalidConfig("batch_size must be at least 1".into()));
        }

        if self.supported_extensions.is_empty() {
            return Err(ConvertError::InvalidConfig(
                "supported_extensions must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// [`render_timeout_secs`](Self::render_timeout_secs) as a [`Duration`].
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Every error that this crate can produce.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// A filesystem I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The document has no `envelope` element: nothing identifies it as an
    /// email, so it is skipped.
    #[error("no envelope element found in the XML document")]
    NoEnvelope,

    /// The input directory of a batch run is missing or cannot be listed.
    #[error("cannot read input directory {}: {}", .0.display(), .1)]
    InputDirUnreadable(PathBuf, #[source] std::io::Error),

    /// The output directory cannot be created.
    #[error("cannot create output directory {}: {}", .0.display(), .1)]
    OutputDirUnavailable(PathBuf, #[source] std::io::Error),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file is not valid TOML.
    #[error("cannot parse configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The PDF renderer did not finish within the configured timeout.
    #[error("PDF rendering of {} timed out after {:?}", .0.display(), .1)]
    RenderTimeout(PathBuf, Duration),

    /// The external PDF renderer failed.
    #[error("PDF rendering failed: {0}")]
    PdfRender(String),

    /// The rendered PDF is structurally incomplete.
    #[error("invalid PDF: {0}")]
    InvalidPdf(String),

    /// The rendered PDF could not be parsed at all.
    #[error("PDF parse error: {0}")]
    PdfParse(#[from] lopdf::Error),

    /// The record sidecar could not be (de)serialized.
    #[error("sidecar record error: {0}")]
    Sidecar(#[from] serde_json::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ConvertError>;
