//! PDF generation through an external headless browser.

use crate::validator::PdfValidator;
use crate::{ConvertError, ConverterConfig, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tracing::debug;

/// Produces `<pdf_dir>/<name>.pdf` from `<name>.html`.
pub trait PdfRenderer {
    /// Render `html_path` into `pdf_dir`.
    ///
    /// Returns `Ok(None)` when PDF generation is disabled, otherwise the path
    /// of the written PDF.
    fn render_pdf(
        &self,
        html_path: &Path,
        pdf_dir: &Path,
    ) -> impl Future<Output = Result<Option<PathBuf>>>;
}

/// Runs a shell command template such as
/// `chromium --headless --no-pdf-header-footer --print-to-pdf={pdf} {html}`.
///
/// `{html}` is replaced by the absolute path of the page and `{pdf}` by the
/// target file, both shell-quoted. The command is killed when it runs longer
/// than the configured timeout, and its output is checked to be a
/// structurally valid PDF.
#[derive(Debug, Clone)]
pub struct CommandPdfRenderer {
    command: Option<String>,
    timeout: Duration,
}

impl CommandPdfRenderer {
    pub fn new<S: Into<String>>(command: S, timeout: Duration) -> Self {
        Self {
            command: Some(command.into()),
            timeout,
        }
    }

    /// A renderer that never produces anything.
    pub fn disabled() -> Self {
        Self {
            command: None,
            timeout: Duration::ZERO,
        }
    }

    /// Use [`ConverterConfig::pdf_command`] and
    /// [`ConverterConfig::render_timeout`].
    pub fn from_config(config: &ConverterConfig) -> Self {
        match &config.pdf_command {
            Some(command) => Self::new(command.clone(), config.render_timeout()),
            None => Self::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.command.is_some()
    }

    async fn run(&self, template: &str, html_path: &Path, pdf_path: &Path) -> Result<()> {
        let html_abs = tokio::fs::canonicalize(html_path)
            .await
            .unwrap_or_else(|_| html_path.to_path_buf());

        let command_line = template
            .replace("{html}", &shell_quote(&html_abs))
            .replace("{pdf}", &shell_quote(pdf_path));
        debug!("running PDF renderer: {command_line}");

        let mut cmd = shell_command(&command_line);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ConvertError::RenderTimeout(html_path.to_path_buf(), self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::PdfRender(format!(
                "renderer exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

impl PdfRenderer for CommandPdfRenderer {
    async fn render_pdf(&self, html_path: &Path, pdf_dir: &Path) -> Result<Option<PathBuf>> {
        let template = match &self.command {
            Some(template) => template,
            None => return Ok(None),
        };

        tokio::fs::create_dir_all(pdf_dir).await?;
        let pdf_path = pdf_dir.join(pdf_file_name(html_path));

        self.run(template, html_path, &pdf_path).await?;
        PdfValidator::validate_file(&pdf_path)?;

        Ok(Some(pdf_path))
    }
}

/// `<name>.pdf` for `<dir>/<name>.html`.
pub(crate) fn pdf_file_name(html_path: &Path) -> String {
    let stem = html_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".into());
    format!("{stem}.pdf")
}

fn shell_command(command_line: &str) -> tokio::process::Command {
    let windows = cfg!(target_os = "windows");
    let (shell, arg) = if windows { ("cmd", "/C") } else { ("sh", "-c") };

    let mut cmd = tokio::process::Command::new(shell);
    cmd.arg(arg).arg(command_line);
    cmd
}

fn shell_quote(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if cfg!(target_os = "windows") {
        format!("\"{raw}\"")
    } else {
        format!("'{}'", raw.replace('\'', r"'\''"))
    }
}
