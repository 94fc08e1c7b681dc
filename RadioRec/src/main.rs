//! `radiorec` -- record internet radio streams for a fixed time.
//!
//! - `radiorec record <station> <duration> [name]` -- record a configured station
//! - `radiorec list` -- show the configured stations

use anyhow::Context;
use clap::{Args, CommandFactory, Parser, Subcommand};
use pmoconfig::Config;
use pmoradiorec::{
    CaptureEngine, CaptureRequest, CaptureSupervisor, RadioRecConfigExt, Reporter, reporter_for,
    resolve_stream_url,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Time the engine gets to close its files once the capture is cancelled
const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

/// Record internet radio streams.
#[derive(Parser, Debug)]
#[command(name = "radiorec", about = "Record internet radio streams", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record a radio station.
    Record(RecordArgs),

    /// List the configured stations.
    List {
        /// Directory containing settings.yaml.
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// Name of the radio station (see `radiorec list`).
    station: String,

    /// Recording time in minutes.
    #[arg(value_parser = parse_duration)]
    duration: u32,

    /// Optional name for the recording.
    name: Option<String>,

    /// Make the audio file writable by everyone (Linux only).
    #[arg(short, long)]
    public: bool,

    /// Print stream headers, metadata and progress.
    #[arg(short, long)]
    verbose: bool,

    /// Directory containing settings.yaml.
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Request ICY metadata and save it next to the recording.
    #[arg(long)]
    icy: bool,
}

fn parse_duration(value: &str) -> Result<u32, String> {
    value
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|minutes| *minutes > 0)
        .ok_or_else(|| "Duration must be a positive integer.".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        std::process::exit(1);
    };

    let verbose = matches!(&command, Commands::Record(args) if args.verbose);
    let default_filter = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match command {
        Commands::Record(args) => record(args).await,
        Commands::List { settings } => list(settings),
    }
}

fn list(settings: Option<PathBuf>) -> anyhow::Result<()> {
    let config = Config::load_config(settings.as_deref())?;
    for (name, _) in config.get_stations()? {
        println!("{}", name);
    }
    Ok(())
}

async fn record(args: RecordArgs) -> anyhow::Result<()> {
    let config = Config::load_config(args.settings.as_deref())?;
    let station_url = config.get_station_url(&args.station)?;
    let target_dir = config
        .get_target_dir()
        .context("Cannot prepare the recording directory")?;

    let reporter = reporter_for(args.verbose);
    let engine = CaptureEngine::builder().reporter(reporter.clone()).build()?;

    let stream_url = resolve_stream_url(engine.http_client(), &station_url).await?;
    if args.verbose {
        reporter.report(&format!("stream url: {}", stream_url));
    }

    let mut request = CaptureRequest::new(stream_url, target_dir, &args.station, args.duration)?
        .with_icy_metadata(args.icy)
        .with_public_permissions(args.public)
        .with_verbose(args.verbose);
    if let Some(name) = args.name {
        request = request.with_name(name);
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping the recording");
            interrupt.cancel();
        }
    });

    let outcome = CaptureSupervisor::new(engine)
        .run_with_token(request, cancel)
        .await;

    match outcome.settle(TEARDOWN_GRACE).await {
        Some(Ok(summary)) => {
            info!(
                path = %summary.audio_path.display(),
                bytes = summary.audio_bytes,
                state = ?summary.final_state,
                "Recording saved"
            );
            Ok(())
        }
        Some(Err(pmoradiorec::Error::Cancelled)) => {
            info!("Stopped before the recording started");
            Ok(())
        }
        Some(Err(e)) => Err(e.into()),
        None => {
            warn!(grace = ?TEARDOWN_GRACE, "Recording did not stop in time, exiting anyway");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_must_be_positive() {
        assert_eq!(parse_duration("30"), Ok(30));
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("-5").is_err());
        assert_eq!(
            parse_duration("ten"),
            Err("Duration must be a positive integer.".to_string())
        );
    }

    #[test]
    fn test_record_arguments() {
        let cli = Cli::try_parse_from([
            "radiorec", "record", "jazz", "60", "evening", "-p", "-v", "--icy", "-s", "/tmp/rr",
        ])
        .unwrap();
        let Some(Commands::Record(args)) = cli.command else {
            panic!("expected record");
        };
        assert_eq!(args.station, "jazz");
        assert_eq!(args.duration, 60);
        assert_eq!(args.name.as_deref(), Some("evening"));
        assert!(args.public && args.verbose && args.icy);
        assert_eq!(args.settings, Some(PathBuf::from("/tmp/rr")));
    }

    #[test]
    fn test_record_rejects_zero_duration() {
        assert!(Cli::try_parse_from(["radiorec", "record", "jazz", "0"]).is_err());
    }

    #[test]
    fn test_no_arguments() {
        let cli = Cli::try_parse_from(["radiorec"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }
}
