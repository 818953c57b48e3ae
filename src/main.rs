//! Arctic: mirrors an agent server's state and keeps it in sync.
//!
//! `watch` bootstraps the store and then follows server events delivered on
//! the local event socket. `status` prints a one-shot summary. The remaining
//! subcommands edit local settings.

use arctic::config::{FeedbackStore, SettingsStore};
use arctic::http::DEFAULT_SERVER_URL;
use arctic::{HttpApi, StoreStatus, SyncClient};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "arctic", about = "Arctic sync client")]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Base URL of the agent server
    #[arg(long, env = "ARCTIC_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    url: String,

    /// Event socket path (defaults to the temp dir)
    #[arg(long)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Bootstrap, then apply server events from the event socket until killed (default)
    Watch,
    /// Bootstrap and print a summary of the server state
    Status,
    /// Turn permission bypass on or off
    Bypass {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Turn telemetry on or off
    Telemetry {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Print this install's device id
    DeviceId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn enabled(self) -> bool {
        self == Toggle::On
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_env("ARCTIC_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_target(false).init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command.unwrap_or(Command::Watch) {
        Command::Bypass { state } => settings(|s| s.set_permission_bypass_enabled(state.enabled())),
        Command::Telemetry { state } => settings(|s| s.set_telemetry_enabled(state.enabled())),
        Command::DeviceId => settings(|s| {
            println!("{}", s.device_id()?);
            Ok(())
        }),
        Command::Watch => run_async(watch(cli.url, cli.socket)),
        Command::Status => run_async(status(cli.url)),
    };

    if let Err(e) = result {
        error!(error = %e, "arctic failed");
        eprintln!("arctic: {e}");
        std::process::exit(1);
    }
}

fn settings(f: impl FnOnce(&mut SettingsStore) -> arctic::Result<()>) -> arctic::Result<()> {
    let mut store = SettingsStore::open_default()?;
    debug!(path = %store.path().display(), "settings");
    f(&mut store)
}

fn run_async(fut: impl std::future::Future<Output = arctic::Result<()>>) -> arctic::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(fut)
}

/// Note the first run of each day while telemetry is on. Settings errors are
/// not fatal here.
fn heartbeat() {
    let result = SettingsStore::open_default().and_then(|mut settings| {
        if settings.claim_heartbeat(&arctic::time::today())? {
            info!(device_id = %settings.device_id()?, "daily heartbeat");
        }
        Ok(())
    });
    if let Err(e) = result {
        warn!(error = %e, "heartbeat skipped");
    }
}

async fn watch(url: String, socket: Option<PathBuf>) -> arctic::Result<()> {
    let client = SyncClient::new(HttpApi::new(url)?);
    heartbeat();

    let mut changes = client.subscribe();
    tokio::spawn(async move {
        while let Some(change) = changes.recv().await {
            debug!(?change, "store changed");
        }
    });

    let enrichment = client.bootstrap().await?;
    tokio::spawn(async move {
        match enrichment.await {
            Ok(Ok(())) => info!("store complete"),
            Ok(Err(e)) => warn!(error = %e, "store left partial"),
            Err(e) => warn!(error = %e, "enrichment task aborted"),
        }
    });

    match socket {
        Some(path) => arctic::server::serve(&path, client).await,
        None => arctic::server::start(client).await,
    }
    Ok(())
}

async fn status(url: String) -> arctic::Result<()> {
    let client = SyncClient::new(HttpApi::new(url)?);
    let enrichment = client.bootstrap().await?;
    if let Ok(Err(e)) = enrichment.await {
        warn!(error = %e, "enrichment incomplete");
    }

    client.read(|store| {
        let state = match store.status() {
            StoreStatus::Loading => "loading",
            StoreStatus::Partial => "partial",
            StoreStatus::Complete => "complete",
        };
        println!("store:     {state}");
        println!("providers: {}", store.providers().len());
        println!("agents:    {}", store.agents().len());
        println!("commands:  {}", store.commands().len());
        if let Some(vcs) = store.vcs() {
            println!("branch:    {}", vcs.branch);
        }
        println!("bypass:    {}", store.permission_bypass_enabled());
        println!("ptys:      {} running", store.running_ptys().count());
        println!("sessions:  {}", store.sessions().len());
        for session in store.sessions() {
            let activity = store.derived_status(&session.id);
            println!("  {}  {:?}  {}", session.id, activity, session.title);
        }
    });

    let mut settings = SettingsStore::open_default()?;
    println!("telemetry: {}", settings.telemetry_enabled());
    println!(
        "bypass on start: {}",
        settings.permission_bypass_enabled()
    );

    let feedback = FeedbackStore::open_default()?;
    let session_count = client.read(|store| store.sessions().len());
    if feedback.should_show_feedback(session_count) {
        println!();
        println!("Enjoying arctic? Tell us how it is going.");
        feedback.mark_feedback_shown()?;
    }
    Ok(())
}
