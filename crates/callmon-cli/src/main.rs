//! callmon - diagnostics for the call monitor

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use callmon_core::classifier::{classify_message, Classified};
use callmon_core::logging::{log_welcome, setup_logging};
use callmon_core::number::{split_alternate, AreaCodeTable, NormalizedNumber, NumberNormalizer};
use callmon_core::resolver::{NotFoundStore, ProbeSequence};
use callmon_core::{CallMonConfig, EventHub, EventListener};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "callmon", author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "CALLMON_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to the call monitor and print every classified event
    Listen {
        /// Override the configured `host:port`
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Show how a number would be normalized and probed
    Probe {
        number: String,
        /// Area code of the line
        #[arg(long)]
        area_code: String,
    },
    /// List the numbers known to have no name
    NotFound,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("callmon: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    // Diagnostics do not need device credentials, so the file is parsed
    // without the startup validation.
    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            CallMonConfig::from_toml_str(&text)?
        }
        None => CallMonConfig::default(),
    };
    let _guard = setup_logging(&config.logging)?;
    log_welcome("callmon", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Listen { endpoint } => listen(&config, endpoint).await,
        Command::Probe { number, area_code } => probe(&config, &number, &area_code).await,
        Command::NotFound => not_found(&config).await,
    }
}

async fn listen(config: &CallMonConfig, endpoint: Option<String>) -> Result<()> {
    let hub = Arc::new(EventHub::new());
    let mut queue = hub.subscribe();

    let gateway = &config.gateway;
    let listener = EventListener::with_endpoint(
        endpoint.unwrap_or_else(|| gateway.monitor_endpoint()),
        gateway.connect_timeout(),
        gateway.reconnect_backoff(),
        hub,
    );
    let task = listener.spawn();

    loop {
        tokio::select! {
            message = queue.recv() => {
                let Some(message) = message else { break };
                match classify_message(&message) {
                    Classified::Event(event) => println!("{}", event),
                    Classified::Control(control) => println!("-- {}", control),
                    Classified::Skipped => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    task.abort();
    Ok(())
}

async fn probe(config: &CallMonConfig, number: &str, area_code: &str) -> Result<()> {
    let table = AreaCodeTable::load(&config.resolver.area_code_file).await?;
    let normalizer = NumberNormalizer::new(area_code);

    let (primary, alternate) = split_alternate(number);
    if primary.is_none() && alternate.is_none() {
        anyhow::bail!("'{}' contains no digits", number);
    }

    for digits in primary.into_iter().chain(alternate) {
        match normalizer.normalize(&digits) {
            Some(NormalizedNumber::International(number)) => {
                println!("{}: international, never looked up", number);
            }
            Some(NormalizedNumber::National { original, full, .. }) => {
                let prefix_len = table.prefix_len(&full);
                println!("{} -> {} (prefix length {})", original, full, prefix_len);
                for (i, candidate) in ProbeSequence::new(&full, prefix_len).enumerate() {
                    println!("  {}. {}", i + 1, candidate);
                }
            }
            None => println!("{}: not a searchable number", digits),
        }
    }
    Ok(())
}

async fn not_found(config: &CallMonConfig) -> Result<()> {
    let store = NotFoundStore::load(&config.resolver.not_found_file).await?;
    for number in store.snapshot().await {
        println!("{}", number);
    }
    Ok(())
}
