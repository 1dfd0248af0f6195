use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use webcache::exporter::{CacheExporter, EntrySummary, ExportConfig};
use webcache::readers::CacheReader;
use webcache::utils::ProgressState;

#[derive(Parser)]
#[command(
    name = "webcache",
    about = "Recover cached web resources from a browser block-file cache",
    version,
    long_about = "Reads <ROOT>/Application Cache/Cache/index and the data_N / f_XXXXXX files next to it, \
                  and writes every recovered body and header block to a tree bucketed by content type."
)]
struct Cli {
    /// Browser profile root directory
    root: PathBuf,

    /// Output directory (default: out)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// JSON export configuration file
    #[arg(short, long, env = "WEBCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Write bodies exactly as stored, even when a content encoding is declared
    #[arg(long)]
    no_decompress: bool,

    /// Do not write <hash>.header sidecar files
    #[arg(long)]
    no_headers: bool,

    /// Maximum number of entries followed in one hash bucket chain
    #[arg(long)]
    max_chain: Option<usize>,

    /// Print one JSON line per entry instead of exporting
    #[arg(short, long)]
    list: bool,

    /// Log level (overrides RUST_LOG)
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

fn log_progress(state: &mut ProgressState) -> bool {
    info!("{}: {}/{} entries", state.state_id, state.current + 1, state.total);
    false
}

fn build_config(cli: &Cli) -> webcache::Result<ExportConfig> {
    let mut config = match &cli.config {
        Some(path) => ExportConfig::from_json_file(path)?,
        None => ExportConfig::default(),
    };
    if let Some(out) = &cli.out {
        config.output_dir = out.clone();
    }
    if cli.no_decompress {
        config.decompress = false;
    }
    if cli.no_headers {
        config.write_headers = false;
    }
    if let Some(max_chain) = cli.max_chain {
        config.max_chain_length = max_chain;
    }
    Ok(config)
}

fn run(cli: &Cli) -> webcache::Result<()> {
    let config = build_config(cli)?;
    let cache = CacheReader::open(&cli.root)?.with_max_chain_length(config.max_chain_length);

    if cli.list {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for entry in cache.walk()? {
            serde_json::to_writer(&mut out, &EntrySummary::from(&entry))?;
            writeln!(out)?;
        }
        return Ok(());
    }

    let exporter = CacheExporter::new(config).with_progress_reporter(log_progress);
    let report = exporter.export_cache(&cache)?;
    println!(
        "{} entries, {} files, {} header files written to {}",
        report.entries,
        report.payload_files,
        report.header_files,
        exporter.config().output_dir.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = cli.log_level {
        logger.filter_level(level.into());
    }
    logger.init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("webcache: {}", e);
            ExitCode::FAILURE
        }
    }
}
