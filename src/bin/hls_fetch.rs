use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use hls_fetch::app::{self, App};
use hls_fetch::catalog::CmrHttpClient;
use hls_fetch::config::{Config, ConfigLoader};
use hls_fetch::credentials::{ChainedCredentials, CredentialProvider};
use hls_fetch::domain::RunReport;
use hls_fetch::error::HlsError;
use hls_fetch::fetch::{CancelToken, HttpDownloadClient};
use hls_fetch::output::{ConsoleOutput, ConsoleProgress, JsonOutput, OutputMode};
use hls_fetch::session::EarthdataSession;
use hls_fetch::store::OutputStore;

/// Exit code for a run that finished but could not fetch every file.
const EXIT_PARTIAL: u8 = 4;

#[derive(Parser)]
#[command(name = "hls-fetch")]
#[command(about = "Download HLS Sentinel-2 band files for one tile and date range")]
#[command(version, author)]
struct Cli {
    /// Never prompt; print machine-readable JSON instead of console output.
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Search the catalog and download matching band files")]
    Fetch(FetchArgs),
    #[command(about = "List files already in the output directory")]
    List(ListArgs),
}

#[derive(Args, Clone)]
struct FetchArgs {
    #[arg(long)]
    config: Option<String>,

    /// MGRS tile id: `T`, two digits, three letters (e.g. T11SLS). The
    /// leading `T` is optional and case is ignored.
    #[arg(long)]
    tile: Option<String>,

    /// First acquisition day (YYYY-MM-DD)
    #[arg(long)]
    start: Option<String>,

    /// Last acquisition day (YYYY-MM-DD)
    #[arg(long)]
    end: Option<String>,

    /// Band to download; repeat for several (default: B04, B8A, Fmask)
    #[arg(long = "band")]
    bands: Vec<String>,

    #[arg(long)]
    output: Option<String>,

    #[arg(long)]
    max_files: Option<usize>,

    #[arg(long)]
    workers: Option<usize>,

    /// Minimum delay between requests in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Clone)]
struct ListArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    output: Option<String>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<HlsError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &HlsError) -> u8 {
    match error {
        HlsError::InvalidTile(_)
        | HlsError::InvalidBand(_)
        | HlsError::InvalidDate(_)
        | HlsError::InvalidDateRange { .. }
        | HlsError::MissingConfig(_)
        | HlsError::ConfigRead(_)
        | HlsError::ConfigParse(_)
        | HlsError::MissingParameter(_) => 2,
        HlsError::CatalogHttp(_)
        | HlsError::CatalogStatus { .. }
        | HlsError::CatalogParse(_)
        | HlsError::MissingCredentials(_)
        | HlsError::CredentialPrompt(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hls_fetch=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::Json
    } else {
        OutputMode::Console
    };

    match cli.command {
        Commands::Fetch(args) => run_fetch(args, output_mode),
        Commands::List(args) => run_list(args, output_mode),
    }
}

fn fetch_overrides(args: &FetchArgs) -> Config {
    Config {
        tile: args.tile.clone(),
        start_date: args.start.clone(),
        end_date: args.end.clone(),
        bands: (!args.bands.is_empty()).then(|| args.bands.clone()),
        output_dir: args.output.clone(),
        max_files: args.max_files,
        request_interval_ms: args.interval_ms,
        workers: args.workers,
        ..Config::default()
    }
}

fn run_fetch(args: FetchArgs, output_mode: OutputMode) -> miette::Result<ExitCode> {
    let config = ConfigLoader::load(args.config.as_deref())?.apply(fetch_overrides(&args));
    let resolved = ConfigLoader::resolve(config)?;

    // The catalog is public; only downloads need an Earthdata login.
    let credentials = if args.dry_run {
        None
    } else {
        let provider = ChainedCredentials::for_mode(matches!(output_mode, OutputMode::Console));
        Some(provider.credentials()?)
    };
    let session = EarthdataSession::new(resolved.fetch.timeout, credentials)?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            std::process::exit(130);
        }
        eprintln!("\ninterrupt received, stopping after current transfers (press again to quit)");
        handler_token.cancel();
    })
    .into_diagnostic()?;

    let app = App::new(
        CmrHttpClient::new(session.clone(), resolved.catalog.clone()),
        HttpDownloadClient::new(session),
        resolved.fetch.clone(),
    )
    .with_cancel(cancel);

    if args.dry_run {
        return match output_mode {
            OutputMode::Json => {
                let plan = app.plan(
                    &resolved.request,
                    &resolved.output_dir,
                    resolved.max_files,
                    &JsonOutput,
                )?;
                JsonOutput::print_plan(&plan).into_diagnostic()?;
                Ok(ExitCode::SUCCESS)
            }
            OutputMode::Console => {
                let plan = app.plan(
                    &resolved.request,
                    &resolved.output_dir,
                    resolved.max_files,
                    &ConsoleProgress,
                )?;
                ConsoleOutput::print_plan(&plan);
                Ok(ExitCode::SUCCESS)
            }
        };
    }

    let result = match output_mode {
        OutputMode::Json => app.run(
            &resolved.request,
            &resolved.output_dir,
            resolved.max_files,
            &JsonOutput,
        ),
        OutputMode::Console => {
            ConsoleOutput::print_banner();
            app.run(
                &resolved.request,
                &resolved.output_dir,
                resolved.max_files,
                &ConsoleProgress,
            )
        }
    };

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            // Nothing was fetched; still report the zero counts before failing.
            let empty =
                RunReport::empty(OutputStore::new(&resolved.output_dir).absolute_root());
            match output_mode {
                OutputMode::Json => JsonOutput::print_report(&empty).into_diagnostic()?,
                OutputMode::Console => ConsoleOutput::print_report(&empty),
            }
            return Err(err.into());
        }
    };

    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Console => ConsoleOutput::print_report(&report),
    }
    if report.failed > 0 {
        return Ok(ExitCode::from(EXIT_PARTIAL));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_list(args: ListArgs, output_mode: OutputMode) -> miette::Result<ExitCode> {
    let config = ConfigLoader::load(args.config.as_deref())?.apply(Config {
        output_dir: args.output,
        ..Config::default()
    });
    let result = app::list(&config.output_dir())?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_list(&result).into_diagnostic()?,
        OutputMode::Console => ConsoleOutput::print_list(&result),
    }
    Ok(ExitCode::SUCCESS)
}
