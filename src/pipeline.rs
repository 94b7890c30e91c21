//! Directory and single-file conversion driving the extractor and both
//! renderers.

use crate::index;
use crate::{
    CommandPdfRenderer, ConvertError, ConverterConfig, EmailPageTemplate, MetadataExtractor,
    PageRenderer, PdfRenderer, Result,
};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

// ── Outcomes ─────────────────────────────────────────────────────────────────

/// Result of converting one input file.
#[derive(Debug)]
pub enum FileOutcome {
    /// The HTML page was written. `pdf` is `None` when PDF generation is
    /// disabled or failed.
    Converted {
        input: PathBuf,
        html: PathBuf,
        pdf: Option<PathBuf>,
    },
    /// Nothing was written for this input.
    Failed { input: PathBuf, error: ConvertError },
}

impl FileOutcome {
    pub fn input(&self) -> &Path {
        match self {
            FileOutcome::Converted { input, .. } | FileOutcome::Failed { input, .. } => input,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, FileOutcome::Converted { .. })
    }
}

/// Aggregate of every [`FileOutcome`] of a run.
#[derive(Debug, Default)]
pub struct ConversionBatchResult {
    pub success_count: usize,
    pub failure_count: usize,
    /// HTML pages written, in input order.
    pub output_paths: Vec<PathBuf>,
    /// PDF files written, in input order.
    pub pdf_paths: Vec<PathBuf>,
    /// Inputs that could not be converted.
    pub failed_inputs: Vec<PathBuf>,
}

impl ConversionBatchResult {
    /// Returns `true` when no input failed.
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }

    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Converted { html, pdf, .. } => {
                self.success_count += 1;
                self.output_paths.push(html);
                self.pdf_paths.extend(pdf);
            }
            FileOutcome::Failed { input, .. } => {
                self.failure_count += 1;
                self.failed_inputs.push(input);
            }
        }
    }
}

// ── BatchConverter ───────────────────────────────────────────────────────────

/// Converts XML exports into HTML pages (and PDFs when enabled).
///
/// Directory runs process [`ConverterConfig::batch_size`] files concurrently
/// and wait for the whole group to settle before starting the next one, so
/// at most `batch_size` conversions are ever in flight.
pub struct BatchConverter<'a, R = EmailPageTemplate, P = CommandPdfRenderer> {
    config: &'a ConverterConfig,
    extractor: MetadataExtractor<'a>,
    page: R,
    pdf: P,
}

impl<'a> BatchConverter<'a> {
    /// Converter using [`EmailPageTemplate`] and [`CommandPdfRenderer`],
    /// both built from `config`.
    pub fn new(config: &'a ConverterConfig) -> Self {
        Self::with_renderers(
            config,
            EmailPageTemplate::from_config(config),
            CommandPdfRenderer::from_config(config),
        )
    }
}

impl<'a, R: PageRenderer, P: PdfRenderer> BatchConverter<'a, R, P> {
    pub fn with_renderers(config: &'a ConverterConfig, page: R, pdf: P) -> Self {
        Self {
            config,
            extractor: MetadataExtractor::new(config),
            page,
            pdf,
        }
    }

    /// Convert one input file into `output_dir`. Never fails: errors are
    /// logged with the offending path and returned as
    /// [`FileOutcome::Failed`].
    pub async fn convert_file(&self, input: &Path, output_dir: &Path) -> FileOutcome {
        match self.try_convert_file(input, output_dir).await {
            Ok((html, pdf)) => {
                info!("converted {} -> {}", input.display(), html.display());
                FileOutcome::Converted {
                    input: input.to_path_buf(),
                    html,
                    pdf,
                }
            }
            Err(error) => {
                error!("failed to convert {}: {error}", input.display());
                FileOutcome::Failed {
                    input: input.to_path_buf(),
                    error,
                }
            }
        }
    }

    async fn try_convert_file(
        &self,
        input: &Path,
        output_dir: &Path,
    ) -> Result<(PathBuf, Option<PathBuf>)> {
        let xml = tokio::fs::read(input).await?;
        let record = self.extractor.extract(&String::from_utf8_lossy(&xml))?;

        let base = base_name(input);
        let html_path = output_dir.join(format!("{base}{}", self.config.output_file_extension));
        tokio::fs::write(&html_path, self.page.render(&record)).await?;

        if self.config.write_sidecar {
            let sidecar = output_dir.join(format!("{base}.json"));
            if let Err(e) = record.save_sidecar(&sidecar).await {
                warn!("cannot write {}: {e}", sidecar.display());
            }
        }

        let pdf = match self.pdf.render_pdf(&html_path, &self.config.pdf_output_dir).await {
            Ok(pdf) => pdf,
            Err(e) => {
                warn!("PDF not generated for {}: {e}", html_path.display());
                None
            }
        };

        Ok((html_path, pdf))
    }

    /// Convert every supported file of `input_dir` into `output_dir`.
    ///
    /// The output directory is created first; failing to create it, or to
    /// list `input_dir`, aborts the whole run. Per-file failures are only
    /// counted. The navigation index is refreshed afterwards when
    /// [`ConverterConfig::generate_index`] is set.
    pub async fn convert_directory<I, O>(&self, input_dir: I, output_dir: O) -> Result<ConversionBatchResult>
    where
        I: AsRef<Path>,
        O: AsRef<Path>,
    {
        let (input_dir, output_dir) = (input_dir.as_ref(), output_dir.as_ref());
        ensure_output_dir(output_dir).await?;

        let inputs = crate::discover_inputs(input_dir, self.config).await?;
        let mut result = ConversionBatchResult::default();

        if inputs.is_empty() {
            warn!("no file to convert in {}", input_dir.display());
        } else {
            info!(
                "converting {} file(s) from {} in groups of {}",
                inputs.len(),
                input_dir.display(),
                self.config.batch_size
            );
        }

        for (n, group) in inputs.chunks(self.config.batch_size.max(1)).enumerate() {
            info!("batch {}: {} file(s)", n + 1, group.len());
            let outcomes = join_all(group.iter().map(|input| self.convert_file(input, output_dir))).await;
            for outcome in outcomes {
                result.record(outcome);
            }
        }

        info!(
            "Conversion finished: {} successes, {} failures",
            result.success_count, result.failure_count
        );

        if self.config.generate_index {
            if let Err(e) = index::write_index(self.config, output_dir, &result.output_paths).await {
                warn!("navigation index not updated: {e}");
            }
        }

        Ok(result)
    }

    /// Convert exactly one file. A missing or unreadable file is reported
    /// as a failed conversion, not as an error.
    pub async fn convert_source_file<I, O>(&self, input: I, output_dir: O) -> Result<ConversionBatchResult>
    where
        I: AsRef<Path>,
        O: AsRef<Path>,
    {
        let (input, output_dir) = (input.as_ref(), output_dir.as_ref());
        ensure_output_dir(output_dir).await?;

        let mut result = ConversionBatchResult::default();
        result.record(self.convert_file(input, output_dir).await);
        Ok(result)
    }
}

async fn ensure_output_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ConvertError::OutputDirUnavailable(dir.to_path_buf(), e))
}

/// File name without its last extension.
pub(crate) fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "email".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<envelope><Subject>Audience</Subject><From>greffe@justice.fr</From></envelope>
<body>Bonjour&#xD;Cordialement</body>"#;

    fn config() -> ConverterConfig {
        ConverterConfig {
            email_viewer_css: None,
            generate_index: false,
            ..Default::default()
        }
    }

    #[test]
    fn base_name_drops_last_extension() {
        assert_eq!(base_name(Path::new("Data/mail.2025.xml")), "mail.2025");
    }

    #[tokio::test]
    async fn single_file_writes_page_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("audience.xml");
        std::fs::write(&input, SAMPLE).unwrap();
        let out = dir.path().join("Output");

        let config = config();
        let result = BatchConverter::new(&config)
            .convert_source_file(&input, &out)
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.output_paths, vec![out.join("audience.html")]);
        assert!(result.pdf_paths.is_empty());
        let record = crate::EmailRecord::load_sidecar(out.join("audience.json")).await.unwrap();
        assert_eq!(record.body, "Bonjour\nCordialement");
    }

    #[tokio::test]
    async fn missing_source_file_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let result = BatchConverter::new(&config)
            .convert_source_file(dir.path().join("absent.xml"), dir.path())
            .await
            .unwrap();

        assert_eq!(result.failure_count, 1);
        assert_eq!(result.failed_inputs, vec![dir.path().join("absent.xml")]);
    }

    #[tokio::test]
    async fn unreadable_input_dir_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let err = BatchConverter::new(&config)
            .convert_directory(dir.path().join("absent"), dir.path().join("Output"))
            .await
            .unwrap_err();

        assert!(matches!(err, ConvertError::InputDirUnreadable(..)));
        // created before discovery
        assert!(dir.path().join("Output").is_dir());
    }
}
