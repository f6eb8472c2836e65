use anyhow::Context;
use clap::Parser;
use console::style;
use export_utils::logging::{init_logging, LogConfig};
use export_utils::option_validator::{validate_config, ExportConfig};
use img_heic::export::{run_export, summary_line};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "img-heic")]
#[command(version, about = "Export an image file as HEIC, optionally under a file size limit", long_about = None)]
struct Cli {
    /// Path to input image file
    #[arg(long = "input-file", value_name = "PATH")]
    input_file: Option<PathBuf>,

    /// Compression quality between 0.0-1.0
    #[arg(long)]
    quality: Option<f64>,

    /// Largest acceptable output size in bytes; searches for the quality
    #[arg(long, value_name = "BYTES")]
    size_limit: Option<u64>,

    /// Lowest quality the size search may pick
    #[arg(long, default_value_t = 0.0)]
    min_quality: f64,

    /// Highest quality the size search may pick
    #[arg(long, default_value_t = 1.0)]
    max_quality: f64,

    /// Stop early once the size is within [limit * accuracy, limit]
    #[arg(long, default_value_t = 0.8)]
    size_accuracy: f64,

    /// Directory for trial encodes (default: system temp dir)
    #[arg(long, value_name = "PATH")]
    temp_dir: Option<PathBuf>,

    /// Encode 10-bit even for 8-bit input
    #[arg(long)]
    force_10bit: bool,

    /// Print the export report as JSON on stdout
    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    verbose: bool,

    /// Also write the log to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Path to where the output file will be placed
    #[arg(value_name = "OUTPUT_FILE")]
    output_file: PathBuf,
}

impl Cli {
    fn export_config(&self) -> ExportConfig {
        ExportConfig {
            input_file: self.input_file.clone(),
            output_file: self.output_file.clone(),
            quality: self.quality,
            size_limit: self.size_limit,
            min_quality: self.min_quality,
            max_quality: self.max_quality,
            size_accuracy: self.size_accuracy,
            temp_dir: self.temp_dir.clone(),
            force_10bit: self.force_10bit,
        }
    }

    fn log_config(&self) -> LogConfig {
        let level = if self.verbose { Level::DEBUG } else { Level::WARN };
        let config = LogConfig::new().with_level(level);
        match &self.log_file {
            Some(path) => config.with_log_file(path),
            None => config,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_logging("img_heic", cli.log_config()) {
        eprintln!("⚠️  Logging disabled: {:#}", e);
    }

    let config = cli.export_config();
    let mode = validate_config(&config).map_err(|errors| anyhow::anyhow!("❌ {}", errors))?;
    tracing::info!(mode = %mode, output = ?config.output_file, "Export requested");

    let show_progress = !cli.json && std::io::stderr().is_terminal();
    let report = run_export(&config, mode, show_progress)?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", json);
    } else {
        let within = report.search.as_ref().map_or(true, |s| s.within_limit());
        let line = summary_line(&report);
        if within {
            eprintln!("{} {}", style("✅").green(), line);
        } else {
            eprintln!("{} {}", style("⚠️").yellow(), style(line).yellow());
        }
    }

    Ok(())
}
