//! remote-tail CLI
//!
//! Follows the same file (or glob) on many hosts over SSH and prints every
//! line, tagged with its origin, as one merged stream. Lines can also be
//! forwarded to a storage driver.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, FromArgMatches, Parser};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use remote_tail::{banner, logging};
use rt_core::config::{load_config, TailConfig};
use rt_engine::{ConsoleOutput, OperatorOutput, Orchestrator};
use rt_sinks::SinkRegistry;
use rt_ssh::SshConnector;

#[derive(Parser)]
#[command(name = "remote-tail")]
#[command(author, version, about = "Follow log files on many hosts over SSH")]
struct Cli {
    /// File or glob to follow, e.g. "/home/data/logs/**/*.log"
    #[arg(long)]
    file: Option<String>,

    /// Hosts to connect to, e.g. "root@192.168.1.225,root@192.168.1.226:2222"
    #[arg(long)]
    hosts: Option<String>,

    /// Path to a TOML configuration file
    #[arg(long)]
    conf: Option<PathBuf>,

    /// Storage driver to forward lines to (empty for none)
    #[arg(long, alias = "storage_driver")]
    storage_driver: Option<String>,

    /// Broker addresses for the storage driver, comma separated
    #[arg(long)]
    kafka_brokers: Option<String>,

    /// Topic for the storage driver
    #[arg(long)]
    kafka_topic: Option<String>,

    /// Enable verbose logging (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Command definition with the registered drivers listed in the help text
fn command(registry: &SinkRegistry) -> clap::Command {
    let drivers = registry.list_names().join(", ");
    Cli::command().mut_arg("storage_driver", |arg| {
        arg.help(format!(
            "Storage driver to forward lines to. Empty means none. Options are: <empty>, {}",
            drivers
        ))
    })
}

fn parse_cli(registry: &SinkRegistry) -> Cli {
    let matches = command(registry).get_matches();
    Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

fn usage_and_exit(registry: &SinkRegistry) -> ! {
    eprint!("{}", banner::usage_header());
    eprintln!("{}", command(registry).render_help());
    std::process::exit(1);
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Cancel `cancel` on Ctrl+C or SIGTERM
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, stopping all tails...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, stopping all tails...");
            }
        }

        cancel.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let registry = SinkRegistry::with_builtin();
    let cli = parse_cli(&registry);

    let mut config = match (&cli.conf, non_empty(&cli.file), non_empty(&cli.hosts)) {
        (Some(path), _, _) => load_config::<TailConfig>(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        (None, Some(file), Some(hosts)) => {
            TailConfig::from_hosts(file, hosts).context("Invalid --hosts value")?
        }
        _ => usage_and_exit(&registry),
    };

    if let Some(driver) = &cli.storage_driver {
        config.storage_driver = driver.clone();
    }
    if let Some(brokers) = &cli.kafka_brokers {
        config.kafka_brokers = brokers.clone();
    }
    if let Some(topic) = &cli.kafka_topic {
        config.kafka_topic = topic.clone();
    }

    // Setup logging based on verbosity
    let log_level = logging::level_for(cli.verbose, config.log_level);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let targets = config.targets().context("Invalid server configuration")?;
    let output = Arc::new(ConsoleOutput::new());
    output.notice(&banner::render(&config));

    let sink = match registry.create(&config.storage_driver, &config.sink_settings()) {
        Ok(sink) => sink,
        Err(e) => {
            tracing::error!("{}, continuing without storage", e);
            None
        }
    };
    if sink.is_some() {
        tracing::info!(driver = %config.storage_driver, "Forwarding lines to storage");
    }

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let summary = Orchestrator::new(
        targets,
        Arc::new(SshConnector::new(config.connect_timeout)),
        output,
    )
    .with_sink(sink, config.sink_timeout)
    .run(cancel)
    .await;

    tracing::info!(
        tasks = summary.tasks.len(),
        failed = summary.failed(),
        "remote-tail finished"
    );
    Ok(())
}
