//! CLI entry point for optimxmlpreview.
//!
//! Converts one XML export (`--source-file`) or a whole directory
//! (`--input-dir`) and prints `CONVERSION_SUCCESS` on stdout when every
//! conversion succeeded.

use clap::{ArgGroup, Parser};
use optimxmlpreview::{clear_input_dir, BatchConverter, ConversionBatchResult, ConverterConfig, Result};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "optimxmlpreview", version)]
#[command(about = "Convert RPVA email XML exports into HTML pages and PDF documents")]
#[command(group(ArgGroup::new("source").required(true).args(["source_file", "input_dir"])))]
struct Cli {
    /// Output directory for the HTML pages
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Convert exactly this file
    #[arg(short = 's', long)]
    source_file: Option<PathBuf>,

    /// Convert every .xml/.xeml file of this directory
    #[arg(short = 'i', long)]
    input_dir: Option<PathBuf>,

    /// Remove the source file after a successful conversion
    #[arg(long)]
    delete_source: bool,

    /// Remove every input file from the input directory after a fully
    /// successful run
    #[arg(long)]
    clear_data_folder: bool,

    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            process::exit(usage_exit_code(&e));
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(result) if result.is_success() => {
            println!("CONVERSION_SUCCESS");
        }
        Ok(_) => process::exit(1),
        Err(e) => {
            error!("fatal error: {e}");
            process::exit(1);
        }
    }
}

/// `--help` and `--version` end the process normally; any other parse
/// failure is a usage error.
fn usage_exit_code(e: &clap::Error) -> i32 {
    if e.use_stderr() {
        1
    } else {
        0
    }
}

async fn run(cli: Cli) -> Result<ConversionBatchResult> {
    let config = ConverterConfig::load(cli.config.as_deref())?;
    let converter = BatchConverter::new(&config);

    if let Some(source) = cli.source_file {
        info!("converting {}", source.display());
        let result = converter.convert_source_file(&source, &cli.output).await?;
        if cli.delete_source {
            delete_source_after(&result, &source).await;
        }
        return Ok(result);
    }

    // Guaranteed by the required "source" argument group.
    let Some(input_dir) = cli.input_dir else {
        return Ok(ConversionBatchResult::default());
    };

    if cli.delete_source {
        warn!("--delete-source only applies to --source-file, ignored in directory mode");
    }

    let result = converter.convert_directory(&input_dir, &cli.output).await?;
    if cli.clear_data_folder {
        clear_after(&result, &input_dir, &config).await?;
    }

    Ok(result)
}

/// Remove `source` when its conversion succeeded. Returns whether it was
/// removed.
async fn delete_source_after(result: &ConversionBatchResult, source: &Path) -> bool {
    if !result.is_success() {
        warn!("source file {} kept: conversion failed", source.display());
        return false;
    }

    match tokio::fs::remove_file(source).await {
        Ok(()) => {
            info!("deleted source file {}", source.display());
            true
        }
        Err(e) => {
            warn!("cannot delete source file {}: {e}", source.display());
            false
        }
    }
}

/// Clear `input_dir` only after a run with no failure and at least one
/// page written. Returns whether clearing was attempted.
async fn clear_after(
    result: &ConversionBatchResult,
    input_dir: &Path,
    config: &ConverterConfig,
) -> Result<bool> {
    if !result.is_success() || result.success_count == 0 {
        warn!("input directory kept: the run did not fully succeed");
        return Ok(false);
    }

    let report = clear_input_dir(input_dir, config).await?;
    if !report.is_complete() {
        warn!("{} input file(s) could not be deleted", report.failed.len());
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("optimxmlpreview").chain(args.iter().copied()))
    }

    fn result(success_count: usize, failure_count: usize) -> ConversionBatchResult {
        ConversionBatchResult {
            success_count,
            failure_count,
            ..Default::default()
        }
    }

    #[test]
    fn one_source_and_output_are_accepted() {
        let cli = parse(&["-s", "Data/a.xml", "-o", "Output", "--delete-source"]).unwrap();
        assert_eq!(cli.source_file, Some(PathBuf::from("Data/a.xml")));
        assert!(cli.delete_source);

        let cli = parse(&["--input-dir", "Data", "--output", "Output", "--clear-data-folder"]).unwrap();
        assert_eq!(cli.input_dir, Some(PathBuf::from("Data")));
        assert!(cli.clear_data_folder);
    }

    #[test]
    fn both_sources_are_a_usage_error() {
        let err = parse(&["-s", "a.xml", "-i", "Data", "-o", "Output"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), 1);
    }

    #[test]
    fn missing_source_is_a_usage_error() {
        let err = parse(&["-o", "Output"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), 1);
    }

    #[test]
    fn missing_output_is_a_usage_error() {
        let err = parse(&["-i", "Data"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), 1);
    }

    #[test]
    fn help_exits_cleanly() {
        let err = parse(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        assert_eq!(usage_exit_code(&err), 0);
    }

    #[tokio::test]
    async fn source_kept_when_conversion_failed() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.xml");
        std::fs::write(&source, "<message/>").unwrap();

        assert!(!delete_source_after(&result(0, 1), &source).await);
        assert!(source.exists());

        assert!(delete_source_after(&result(1, 0), &source).await);
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn clear_skipped_unless_run_fully_succeeded() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.xml");
        std::fs::write(&input, "<envelope/>").unwrap();
        let config = ConverterConfig::default();

        assert!(!clear_after(&result(2, 1), dir.path(), &config).await.unwrap());
        assert!(!clear_after(&result(0, 0), dir.path(), &config).await.unwrap());
        assert!(input.exists());

        assert!(clear_after(&result(1, 0), dir.path(), &config).await.unwrap());
        assert!(!input.exists());
    }

    #[tokio::test]
    async fn single_file_run_deletes_source_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.xml");
        std::fs::write(&source, "<envelope><Subject>S</Subject></envelope>").unwrap();
        let output = dir.path().join("Output");

        let cli = Cli {
            output: output.clone(),
            source_file: Some(source.clone()),
            input_dir: None,
            delete_source: true,
            clear_data_folder: false,
            config: None,
        };
        let result = run(cli).await.unwrap();

        assert!(result.is_success());
        assert!(output.join("a.html").exists());
        assert!(!source.exists());
    }
}
