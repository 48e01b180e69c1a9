use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

mod commands;
mod elapsed;
mod input;
mod output;

/// Tag paths with start/end elevation, climb and descent
#[derive(Parser)]
#[command(name = "elevtag")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding downloaded and cached elevation sources
    #[arg(long, env = "ELEVTAG_DATA_DIR", default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Source catalog (defaults to <data-dir>/sources.json)
    #[arg(long, env = "ELEVTAG_CATALOG", global = true)]
    catalog: Option<PathBuf>,

    /// Worker threads (defaults to the number of logical CPUs)
    #[arg(short = 'j', long, env = "ELEVTAG_CONCURRENCY", global = true)]
    concurrency: Option<usize>,

    /// SRTM tile URL template used when no catalog source covers the paths
    #[arg(long, env = "ELEVTAG_SRTM_URL", global = true)]
    srtm_url: Option<String>,

    /// Log verbosity; RUST_LOG is used when not given
    #[arg(long, value_enum, ignore_case = true, global = true)]
    log: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    #[value(alias = "warn")]
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Profile every path in a file and write one TSV row per path
    Tag {
        /// Input file (GeoJSON, or text with one `x1,y1,x2,y2,...` path per row)
        input_file: PathBuf,

        /// Directory the input file is read from
        #[arg(long, default_value = "input")]
        input_dir: PathBuf,

        /// Directory the TSV output is written to
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
    },

    /// Elevation of a single coordinate from the source that covers it
    Query {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Output result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List catalog sources and what is cached for them
    Sources,
}

fn init_logging(level: Option<LogLevel>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level.directive()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log);

    let started = Instant::now();
    let settings = commands::Settings {
        data_dir: cli.data_dir,
        catalog: cli.catalog,
        concurrency: cli.concurrency,
        srtm_url: cli.srtm_url,
    };

    let result: Result<()> = match cli.command {
        Commands::Tag {
            input_file,
            input_dir,
            output_dir,
        } => commands::tag::run(&settings, &input_dir, &input_file, &output_dir),
        Commands::Query { lat, lon, json } => commands::query::run(&settings, lat, lon, json),
        Commands::Sources => commands::sources::run(&settings),
    };

    match result {
        Ok(()) => {
            tracing::info!("Run complete in {}", elapsed::format_elapsed(started.elapsed()));
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_args_reach_config() {
        let cli = Cli::try_parse_from([
            "elevtag",
            "--data-dir",
            "/tmp/dem",
            "--srtm-url",
            "https://tiles.example.com/{filename}.hgt.zip",
            "sources",
            "-j",
            "3",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Sources));

        let settings = commands::Settings {
            data_dir: cli.data_dir,
            catalog: cli.catalog,
            concurrency: cli.concurrency,
            srtm_url: cli.srtm_url,
        };
        let config = settings.config().unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/dem"));
        assert_eq!(config.concurrency, 3);
        assert_eq!(
            config.srtm_url_template.as_deref(),
            Some("https://tiles.example.com/{filename}.hgt.zip")
        );
    }

    #[test]
    fn test_log_level_names() {
        let cli = Cli::try_parse_from(["elevtag", "--log", "critical", "sources"]).unwrap();
        assert_eq!(cli.log.map(LogLevel::directive), Some("error"));
        let cli = Cli::try_parse_from(["elevtag", "--log", "WARN", "sources"]).unwrap();
        assert_eq!(cli.log.map(LogLevel::directive), Some("warn"));
    }
}
