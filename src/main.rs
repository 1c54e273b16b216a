//! Command-line front end for dataset-dl
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use dataset_dl::config::TransferBackend;
use dataset_dl::{BatchReport, Config, Dispatcher, dataset};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
/// Download and unpack dataset archives, in parallel and with retries
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch URLs or local files into a directory
    Fetch(FetchArgs),
    /// Download the Objects365 v2 release
    Objects365(Objects365Args),
}

/// Options shared by every subcommand
#[derive(Args, Debug)]
struct CommonArgs {
    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use the curl binary instead of the built-in HTTP client
    #[arg(long)]
    curl: bool,
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Directory files are written to
    dest: PathBuf,

    /// URLs or local paths
    #[arg(required = true)]
    sources: Vec<String>,

    /// Concurrent downloads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Extra attempts after a failed transfer
    #[arg(short, long)]
    retries: Option<u32>,

    /// Leave archives packed
    #[arg(long)]
    no_unzip: bool,

    /// Keep archives after extracting them
    #[arg(long)]
    keep: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct Objects365Args {
    /// Dataset root
    #[arg(default_value = "object365")]
    root: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

fn load_config(common: &CommonArgs) -> dataset_dl::Result<Config> {
    let mut config = match &common.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if common.curl {
        config.download.transfer = TransferBackend::Curl;
    }
    Ok(config)
}

async fn fetch(args: FetchArgs) -> dataset_dl::Result<BatchReport> {
    let mut config = load_config(&args.common)?;
    if let Some(workers) = args.workers {
        config.download.workers = workers;
    }
    if let Some(retries) = args.retries {
        config.retry.max_retries = retries;
    }
    if args.no_unzip {
        config.download.unzip = false;
    }
    if args.keep {
        config.download.delete_after = false;
    }

    let dispatcher = Dispatcher::new(config)?;
    let options = dispatcher.default_options().clone();
    dispatcher.dispatch(args.sources, &args.dest, &options).await
}

async fn objects365(args: Objects365Args) -> dataset_dl::Result<BatchReport> {
    let dispatcher = Dispatcher::new(load_config(&args.common)?)?;
    let plan = dataset::objects365(&args.root)?;
    plan.run(&dispatcher).await
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let report = match cli.command {
        Command::Fetch(args) => fetch(args).await?,
        Command::Objects365(args) => objects365(args).await?,
    };

    println!(
        "{} of {} sources retrieved, {} archives extracted",
        report.succeeded(),
        report.total(),
        report.extracted()
    );
    if report.failed() > 0 {
        for source in report.failed_sources() {
            println!("failed: {}", source);
        }
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
