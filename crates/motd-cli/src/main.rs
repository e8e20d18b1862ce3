//! motd-operator — keeps the MOTD service declared in the workload
//! container's Pebble and reports the unit's status.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use motd_core::{CharmConfig, Error, LogLevel, OperatorConfig, UnitStatus};
use motd_operator::{
    declaration, Dispatcher, FileReporter, HookEvent, HookToolReporter, Reconciler,
    StatusReporter,
};
use motd_pebble::{PebbleClient, Supervisor};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "motd-operator", version, about = "MOTD service operator")]
struct Cli {
    /// Pebble socket (default: /charm/containers/<container>/pebble.socket).
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Charm options file (JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write status to this JSON file instead of calling `status-set`.
    #[arg(long, global = true)]
    status_file: Option<PathBuf>,

    /// Workload container name.
    #[arg(long, global = true)]
    container: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Handle one host event (the default).
    Dispatch {
        /// Event name; defaults to JUJU_DISPATCH_PATH.
        #[arg(long)]
        event: Option<String>,
    },
    /// Print the layer this operator declares.
    Layer,
    /// Print the supervisor's current plan.
    Plan,
}

fn init_tracing(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.filter_directive())),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn operator_config(cli: &Cli) -> OperatorConfig {
    let mut config = OperatorConfig::from_env();
    if let Some(container) = &cli.container {
        config = config.with_container(container.clone());
    }
    if let Some(socket) = &cli.socket {
        config.pebble_socket = socket.clone();
    }
    if let Some(path) = &cli.config {
        config.charm_config_path = Some(path.clone());
    }
    config
}

fn pebble_client(config: &OperatorConfig) -> PebbleClient {
    PebbleClient::new(config.pebble_socket.clone()).with_change_timeout(config.change_timeout)
}

async fn dispatch(cli: &Cli, config: OperatorConfig, event: Option<&str>) -> anyhow::Result<()> {
    let event = match event {
        Some(name) => HookEvent::parse(name)?,
        None => HookEvent::from_env()?,
    };

    let reporter: Arc<dyn StatusReporter> = match &cli.status_file {
        Some(path) => Arc::new(FileReporter::new(path.clone())),
        None => Arc::new(HookToolReporter::new()),
    };

    let charm_config = match config.charm_config() {
        Ok(charm_config) => charm_config,
        Err(e @ Error::InvalidConfig(_)) => {
            // Nothing can be reconciled until the options are fixed.
            warn!(event = %event, error = %e, "Charm options rejected");
            let mut reconciler = Reconciler::new(CharmConfig::default(), reporter);
            reconciler.report(UnitStatus::from_error(&e)).await;
            return Ok(());
        }
        Err(e) => return Err(e).context("loading charm options"),
    };

    let reconciler = Reconciler::new(charm_config, reporter);
    let connect_config = config.clone();
    let dispatcher = Dispatcher::new(config.container.clone(), reconciler, move |container| {
        debug!(
            container,
            socket = %connect_config.pebble_socket.display(),
            "Connecting to Pebble"
        );
        Arc::new(pebble_client(&connect_config)) as Arc<dyn Supervisor>
    });

    match dispatcher
        .dispatch(&event)
        .await
        .with_context(|| format!("handling {event}"))?
    {
        Some(status) => info!(event = %event, status = %status, "Event handled"),
        None => debug!(event = %event, "Nothing to do"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = operator_config(&cli);

    // An invalid level is reported as a blocked status by the reconciler;
    // logging just falls back to info.
    let level = config
        .charm_config()
        .ok()
        .and_then(|c| c.log_level().ok())
        .unwrap_or(LogLevel::Info);
    init_tracing(level);

    match &cli.command {
        None => dispatch(&cli, config, None).await,
        Some(Command::Dispatch { event }) => dispatch(&cli, config, event.as_deref()).await,
        Some(Command::Layer) => {
            print!("{}", declaration::motd_layer().to_yaml()?);
            Ok(())
        }
        Some(Command::Plan) => {
            let plan = pebble_client(&config).plan().await?;
            print!("{}", plan.to_yaml()?);
            Ok(())
        }
    }
}
