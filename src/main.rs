use clap::{ArgAction, Args, Parser, Subcommand};
use log::{error, info, LevelFilter};
use spoolslice::capture_library::libpcap::Libpcap;
use spoolslice::capture_library::types::OutputTarget;
use spoolslice::configuration::ServerConfig;
use spoolslice::event_decoding::decoder_chain::DecoderChain;
use spoolslice::extraction::request::run_request;
use spoolslice::extraction::types::{ExtractRequest, EXIT_FAILURE, EXIT_SUCCESS};
use spoolslice::spool::purge::{run_once, run_periodic, PurgeOptions, RetentionPolicy};
use spoolslice::time_resolver::types::Timeval;
use spoolslice::web_interface::WebServer;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spoolslice")]
#[command(version)]
#[command(about = "Extract packets from a rotating spool of capture files")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the packets of a time window, optionally filtered, to a file or stdout
    Extract(ExtractArgs),
    /// Serve extractions over HTTP
    Server(ServerArgs),
    /// Delete the oldest capture files of a spool
    Purge(PurgeArgs),
}

#[derive(Args)]
struct ExtractArgs {
    /// Spool directory
    #[arg(short, long)]
    directory: PathBuf,

    /// File name prefix of the capture files
    #[arg(short, long)]
    prefix: String,

    /// Start of the window: absolute time, or a relative offset such as 5m
    #[arg(long, allow_hyphen_values = true)]
    start: Option<String>,

    /// End of the window: absolute time, or a relative offset such as 5m
    #[arg(long, allow_hyphen_values = true)]
    end: Option<String>,

    /// Zone offset for times that carry none, e.g. -0600
    #[arg(long, allow_hyphen_values = true)]
    tz_offset: Option<String>,

    /// Output file, or - for stdout
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Write nothing to stdout when no packets match
    #[arg(long)]
    no_empty_stream: bool,

    /// Alert line, EVE JSON record or capture filter
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    event: Vec<String>,
}

#[derive(Args)]
struct ServerArgs {
    /// Server configuration file
    #[arg(short, long, env = "SPOOLSLICE_CONFIG")]
    config: PathBuf,

    /// Override the configured port
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args)]
struct PurgeArgs {
    /// Spool directory
    #[arg(short, long)]
    directory: PathBuf,

    /// Only consider files starting with this prefix
    #[arg(short, long)]
    prefix: Option<String>,

    /// Keep the newest N files
    #[arg(long, conflicts_with = "max_size")]
    keep_files: Option<usize>,

    /// Keep the newest files up to a total size (10G, 500M, 4K or bytes)
    #[arg(long)]
    max_size: Option<String>,

    /// Actually delete; without it only reports what would be deleted
    #[arg(long)]
    force: bool,

    /// Repeat every N minutes
    #[arg(long)]
    interval: Option<u64>,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_target(false)
        .init();
}

fn extract(args: ExtractArgs) -> i32 {
    let event = (!args.event.is_empty()).then(|| args.event.join(" "));
    let request = ExtractRequest {
        directory: args.directory,
        prefix: args.prefix,
        start: args.start,
        end: args.end,
        tz_offset: args.tz_offset,
        event,
        target: OutputTarget::from_arg(&args.output),
        empty_stream_header: !args.no_empty_stream,
    };

    match run_request(&Libpcap, &DecoderChain::default(), &request, Timeval::now()) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            error!("{}", e);
            EXIT_FAILURE
        }
    }
}

async fn server(args: ServerArgs) -> i32 {
    let config = match ServerConfig::from_file(&args.config) {
        Ok(config) => config.with_port(args.port),
        Err(e) => {
            error!("Unable to import configuration from file: {}", e);
            return EXIT_FAILURE;
        }
    };
    let server = match WebServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            error!("Unable to create the web server: {}", e);
            return EXIT_FAILURE;
        }
    };
    match server.start().await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            error!("{}", e);
            EXIT_FAILURE
        }
    }
}

async fn purge(args: PurgeArgs) -> i32 {
    let policy = match RetentionPolicy::from_options(args.keep_files, args.max_size.as_deref()) {
        Ok(policy) => policy,
        Err(e) => {
            error!("{}", e);
            return EXIT_FAILURE;
        }
    };
    let options = PurgeOptions {
        directory: args.directory,
        prefix: args.prefix,
        policy,
        force: args.force,
    };

    match args.interval {
        Some(minutes) => {
            tokio::select! {
                _ = run_periodic(options, minutes) => {}
                _ = tokio::signal::ctrl_c() => info!("Interrupted, stopping purge"),
            }
            EXIT_SUCCESS
        }
        None => match tokio::task::spawn_blocking(move || run_once(&options)).await {
            Ok(Ok(_)) => EXIT_SUCCESS,
            Ok(Err(e)) => {
                error!("{}", e);
                EXIT_FAILURE
            }
            Err(e) => {
                error!("Purge task failed: {}", e);
                EXIT_FAILURE
            }
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match cli.command {
        Command::Extract(args) => extract(args),
        Command::Server(args) => server(args).await,
        Command::Purge(args) => purge(args).await,
    };
    std::process::exit(code);
}
