use crate::{ConvertError, ConverterConfig, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Returns `true` when `path` ends with one of the configured input
/// extensions (case-insensitive).
///
/// ```
/// use optimxmlpreview::{is_supported, ConverterConfig};
///
/// let config = ConverterConfig::default();
/// assert!(is_supported("Data/notification.XEML", &config));
/// assert!(!is_supported("Data/notes.txt", &config));
/// ```
pub fn is_supported<P: AsRef<Path>>(path: P, config: &ConverterConfig) -> bool {
    let ext = match path.as_ref().extension().and_then(|e| e.to_str()) {
        Some(ext) => format!(".{}", ext.to_ascii_lowercase()),
        None => return false,
    };

    config
        .supported_extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
}

/// List the convertible files of `dir`, sorted by file name.
///
/// Sub-directories are ignored. A missing or unreadable directory is
/// reported as [`ConvertError::InputDirUnreadable`].
pub async fn discover_inputs<P: AsRef<Path>>(dir: P, config: &ConverterConfig) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let unreadable = |e| ConvertError::InputDirUnreadable(dir.to_path_buf(), e);

    let mut entries = tokio::fs::read_dir(dir).await.map_err(unreadable)?;
    let mut inputs = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        let path = entry.path();
        if !is_supported(&path, config) {
            continue;
        }
        match entry.file_type().await {
            Ok(kind) if kind.is_file() => inputs.push(path),
            Ok(_) => {}
            Err(e) => warn!("skipping {}: {e}", path.display()),
        }
    }

    inputs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(inputs)
}

/// Outcome of [`clear_input_dir`].
#[derive(Debug, Default)]
pub struct ClearReport {
    /// Files removed.
    pub deleted: usize,
    /// Files that could not be removed.
    pub failed: Vec<PathBuf>,
}

impl ClearReport {
    /// Returns `true` when every matching file was removed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete every convertible file of `dir`, leaving other files alone.
///
/// A missing directory counts as already cleared. Files that cannot be
/// removed are listed in the report instead of aborting the operation.
pub async fn clear_input_dir<P: AsRef<Path>>(dir: P, config: &ConverterConfig) -> Result<ClearReport> {
    let dir = dir.as_ref();

    let inputs = match discover_inputs(dir, config).await {
        Ok(inputs) => inputs,
        Err(ConvertError::InputDirUnreadable(_, e)) if e.kind() == ErrorKind::NotFound => {
            warn!("input directory {} does not exist, nothing to clear", dir.display());
            return Ok(ClearReport::default());
        }
        Err(e) => return Err(e),
    };

    if inputs.is_empty() {
        info!("no input file to delete in {}", dir.display());
        return Ok(ClearReport::default());
    }

    info!("deleting {} input file(s) from {}", inputs.len(), dir.display());

    let mut report = ClearReport::default();
    for path in inputs {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("deleted {}", path.display());
                report.deleted += 1;
            }
            Err(e) => {
                error!("cannot delete {}: {e}", path.display());
                report.failed.push(path);
            }
        }
    }

    if report.is_complete() {
        info!("input directory cleared ({} file(s) deleted)", report.deleted);
    } else {
        warn!(
            "input directory partially cleared ({}/{} file(s) deleted)",
            report.deleted,
            report.deleted + report.failed.len()
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_match_ignores_case() {
        let config = ConverterConfig::default();
        assert!(is_supported("a.xml", &config));
        assert!(is_supported("a.XML", &config));
        assert!(is_supported("a.Xeml", &config));
        assert!(!is_supported("a.xml.bak", &config));
        assert!(!is_supported("xml", &config));
    }

    #[tokio::test]
    async fn discovery_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.xml", "a.XEML", "notes.txt"] {
            std::fs::write(dir.path().join(name), "<envelope/>").unwrap();
        }
        std::fs::create_dir(dir.path().join("archive.xml")).unwrap();

        let found = discover_inputs(dir.path(), &ConverterConfig::default())
            .await
            .unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.XEML", "b.xml"]);
    }

    #[tokio::test]
    async fn discovery_of_missing_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_inputs(dir.path().join("absent"), &ConverterConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::InputDirUnreadable(..)));
    }
}
