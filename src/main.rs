//! homelink entry point
//!
//! Wires configuration, logging, signal handling and the session together,
//! then hands control to the cooperative loop.

use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use homelink::agent::TelemetryAgent;
use homelink::clock::SystemClock;
use homelink::config::AppConfig;
use homelink::link::{self, TcpLinkProbe};
use homelink::logging::init_default_logging;
use homelink::scheduler::{SimulatedSensor, TelemetryScheduler};
use homelink::session::rumqtt::{RumqttSession, SessionOptions};
use homelink::supervisor::ReconnectSupervisor;

/// Resilient MQTT telemetry client
#[derive(Parser)]
#[command(name = "homelink")]
#[command(about = "Publishes periodic readings over MQTT and survives broker outages")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the telemetry loop
    Run,
    /// Validate configuration
    Config {
        /// Show the resolved configuration
        #[arg(long)]
        show: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    init_default_logging();
    info!("starting homelink v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run(config),
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("command failed: {e}");
        process::exit(1);
    }

    info!("shutdown complete");
}

fn load_configuration(config_path: &Option<PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("loading configuration from {}", path.display());
            Ok(AppConfig::load_from_file(path)?)
        }
        None => {
            for path_str in ["homelink.toml", "config/homelink.toml"] {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("loading configuration from {}", path.display());
                    return Ok(AppConfig::load_from_file(&path)?);
                }
            }
            error!("no configuration file found; pass one with -c/--config or create homelink.toml");
            process::exit(1);
        }
    }
}

fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = config.broker.endpoint()?;
    let clock = SystemClock::new();

    // SIGINT/SIGTERM flip a flag the loop observes between iterations.
    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, shutdown.clone())?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, shutdown.clone())?;

    // Without a route to the broker nothing can progress; block here until
    // the link is up.
    let probe = TcpLinkProbe::new(endpoint.host.clone(), endpoint.port);
    link::await_link(&probe, &clock);

    let session = RumqttSession::new(
        SessionOptions {
            host: endpoint.host,
            port: endpoint.port,
            keep_alive: config.broker.keep_alive(),
            connect_timeout: config.broker.connect_timeout(),
        },
        Box::new(on_message),
    );

    let supervisor = ReconnectSupervisor::new(
        config.broker.client_id_prefix.clone(),
        config.subscriptions.topics.clone(),
        config.broker.retry_delay(),
    );

    let scheduler = TelemetryScheduler::new(
        config.telemetry.topic.clone(),
        config.telemetry.interval_ms,
        SimulatedSensor::new(config.telemetry.min_value, config.telemetry.max_value),
    );

    let mut agent = TelemetryAgent::new(session, supervisor, scheduler, clock);
    agent.run(&shutdown);
    Ok(())
}

/// Console boundary for inbound messages.
fn on_message(topic: &str, payload: &[u8]) {
    info!(
        topic = %topic,
        payload = %String::from_utf8_lossy(payload),
        "message received"
    );
}

fn handle_config_command(config: AppConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{}", toml::to_string_pretty(&config)?);
    }
    info!("configuration is valid");
    Ok(())
}
