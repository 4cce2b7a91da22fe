//! BroadView OVSDB daemon
//!
//! Starts the OVSDB plugin, registers it with a redirector and logs every
//! BST trigger and configuration change until interrupted.

use anyhow::Context;
use bview_ovsdb::{BviewConfig, Endpoint, OvsdbPlugin, DEFAULT_CONFIG_PATH};
use bview_redirector::Redirector;
use bview_types::BstEvent;
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// BroadView BST agent backed by OVSDB
#[derive(Parser, Debug)]
#[command(name = "bviewd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Database endpoint, overrides the configuration file
    #[arg(short = 'e', long)]
    endpoint: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    info!("bviewd: Starting BroadView OVSDB agent");

    match run_daemon(args).await {
        Ok(()) => {
            info!("bviewd: Daemon exiting normally");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "bviewd: Daemon exiting with error");
            Err(e)
        }
    }
}

/// `RUST_LOG` wins over `--log-level`.
fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to set logger")?;
    Ok(())
}

async fn run_daemon(args: Args) -> anyhow::Result<()> {
    let mut config = BviewConfig::load_or_default(&args.config)?;
    if let Some(endpoint) = args.endpoint {
        Endpoint::parse(&endpoint)?;
        config.ovsdb.endpoint = endpoint;
    }
    config.validate()?;

    let plugin = OvsdbPlugin::start(&config)
        .await
        .context("Failed to start OVSDB plugin")?;

    let redirector = Redirector::new();
    let slot = redirector.register(plugin.plugin())?;
    info!(slot, plugin = bview_ovsdb::PLUGIN_NAME, "bviewd: Plugin registered");
    log_capabilities(&redirector);

    let events = tokio::spawn(log_events(plugin.subscribe()));
    let cancel = plugin.sync().cancel_token();
    let join = plugin.join();
    tokio::pin!(join);

    let result = tokio::select! {
        _ = shutdown_signal() => {
            info!("bviewd: Received shutdown signal");
            cancel.cancel();
            join.await
        }
        result = &mut join => result,
    };
    events.abort();

    result.context("Sync engine stopped")?;
    info!("bviewd: Graceful shutdown complete");
    Ok(())
}

fn log_capabilities(redirector: &Redirector) {
    let units = match redirector.num_units() {
        Ok(units) => units,
        Err(e) => {
            warn!(error = %e, "bviewd: Failed to read unit count");
            return;
        }
    };
    for unit in 0..units as u32 {
        match redirector.unit_capabilities(unit) {
            Ok(caps) => info!(
                unit,
                ports = caps.num_ports,
                uc_queues = caps.num_unicast_queues,
                service_pools = caps.num_service_pools,
                "bviewd: ASIC capabilities"
            ),
            Err(e) => warn!(unit, error = %e, "bviewd: Failed to read capabilities"),
        }
    }
}

async fn log_events(mut events: broadcast::Receiver<BstEvent>) {
    loop {
        match events.recv().await {
            Ok(BstEvent::Trigger { asic, info }) => info!(
                asic,
                realm = %info.realm,
                counter = %info.counter,
                port = info.port,
                queue = info.queue,
                "bviewd: BST trigger"
            ),
            Ok(BstEvent::ConfigChanged { asic, change }) => {
                info!(asic, ?change, "bviewd: BST configuration changed")
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "bviewd: Event log lagging")
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal as unix_signal, SignalKind};
        match unix_signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "bviewd: SIGTERM handler unavailable");
                let _ = signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
}
