//! Export pipeline: validated config in, HEIC file out.

use crate::heif_writer::{HeifWriter, SourceImage};
use anyhow::{Context, Result};
use export_utils::option_validator::{ExportConfig, ExportMode};
use export_utils::size_limited::{ProduceReport, SizeLimitedProducer};
use export_utils::types::FileSize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub quality: f64,
    pub size: FileSize,
    pub bit_depth: u8,
    /// Present for size-limited exports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<ProduceReport>,
}

fn create_trial_spinner(show: bool) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if !show {
        spinner.set_draw_target(ProgressDrawTarget::hidden());
        return spinner;
    }
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("🔍 Searching quality...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Runs one export. `config` must already have been validated into `mode`.
pub fn run_export(config: &ExportConfig, mode: ExportMode, show_progress: bool) -> Result<ExportReport> {
    let input = config
        .input_file
        .as_deref()
        .context("Missing input file")?;
    let output = config.output_file.as_path();

    let source = SourceImage::open(input)?;
    let ten_bit = config.force_10bit || source.wants_10bit();
    let mut writer = HeifWriter::new(&source, ten_bit)
        .with_context(|| format!("Failed to prepare {} for encoding", input.display()))?;
    let bit_depth = if writer.is_10bit() { 10 } else { 8 };

    match mode {
        ExportMode::FixedQuality(quality) => {
            writer
                .write(quality, output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            let size = FileSize::of_file(output)
                .with_context(|| format!("Failed to stat {}", output.display()))?;
            info!(output = ?output, quality, size = size.bytes(), "Exported HEIC");
            Ok(ExportReport {
                input: input.to_path_buf(),
                output: output.to_path_buf(),
                quality,
                size,
                bit_depth,
                search: None,
            })
        }
        ExportMode::SizeLimited { target, range } => {
            let mut producer = SizeLimitedProducer::new();
            if let Some(dir) = config.temp_dir.as_deref() {
                producer = producer.with_temp_dir(dir);
            }

            let spinner = create_trial_spinner(show_progress);
            let limit = FileSize::new(target.max_size());
            let result = producer.produce_observed(&mut writer, output, target, range, |idx, trial| {
                spinner.set_message(format!(
                    "🔍 Trial {} | quality {:.4} | {} / {}",
                    idx + 1,
                    trial.quality,
                    FileSize::new(trial.size),
                    limit
                ));
            });
            spinner.finish_and_clear();

            let report = result.map_err(|e| anyhow::anyhow!(e.user_message()))?;
            Ok(ExportReport {
                input: input.to_path_buf(),
                output: output.to_path_buf(),
                quality: report.quality,
                size: report.size,
                bit_depth,
                search: Some(report),
            })
        }
    }
}

/// One-line human summary.
pub fn summary_line(report: &ExportReport) -> String {
    let mut line = format!(
        "{} → {} | quality {:.4} | {} | {}-bit",
        display_name(&report.input),
        display_name(&report.output),
        report.quality,
        report.size,
        report.bit_depth
    );
    if let Some(search) = &report.search {
        let fit = if search.within_limit() { "✅" } else { "⚠️ over limit" };
        let percent = search
            .size
            .percent_of(search.limit)
            .map(|p| format!(" ({:.0}%)", p))
            .unwrap_or_default();
        line.push_str(&format!(
            " | limit {}{} {} | {} trials",
            search.limit, percent, fit, search.evaluations
        ));
    }
    line
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use export_utils::quality_search::SearchStop;
    use export_utils::size_limited::OutputSource;

    fn report(search: Option<ProduceReport>) -> ExportReport {
        ExportReport {
            input: PathBuf::from("/photos/in.png"),
            output: PathBuf::from("/out/in.heic"),
            quality: 0.5,
            size: FileSize::new(2048),
            bit_depth: 8,
            search,
        }
    }

    #[test]
    fn test_summary_fixed_quality() {
        assert_eq!(
            summary_line(&report(None)),
            "in.png → in.heic | quality 0.5000 | 2.00 KB | 8-bit"
        );
    }

    #[test]
    fn test_summary_size_limited() {
        let search = ProduceReport {
            destination: PathBuf::from("/out/in.heic"),
            quality: 0.5,
            size: FileSize::new(2048),
            limit: FileSize::new(4096),
            evaluations: 3,
            stop: SearchStop::Corridor,
            source: OutputSource::PromotedTrial,
            trials: Vec::new(),
        };
        let line = summary_line(&report(Some(search)));
        assert!(line.ends_with("| limit 4.00 KB (50%) ✅ | 3 trials"), "{}", line);
    }

    #[test]
    fn test_report_json_omits_search_for_fixed_quality() {
        let json = serde_json::to_value(report(None)).unwrap();
        assert_eq!(json["size"], 2048);
        assert!(json.get("search").is_none());
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let config = ExportConfig {
            input_file: Some(PathBuf::from("/definitely/not/here.png")),
            output_file: PathBuf::from("/tmp/never.heic"),
            quality: Some(0.5),
            ..Default::default()
        };
        assert!(run_export(&config, ExportMode::FixedQuality(0.5), false).is_err());
    }
}
