//! mcrelay: relays chat commands to a Minecraft server over RCON.
//!
//! Loads the layered configuration, sets up logging, then serves commands
//! read from the console gateway until the input closes or a termination
//! signal arrives.

mod cli;
mod config;
mod console;
mod logging;
mod serve;
mod signals;

use anyhow::{Context, Result};
use cli::CliArgs;
use config::AppConfig;
use console::ConsoleGateway;
use relay_core::{CommandRelay, RelayConfig};
use signals::ShutdownSignals;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Main application struct.
pub struct Application {
    config: AppConfig,
    relay_config: RelayConfig,
    sources: Vec<PathBuf>,
}

impl Application {
    /// Loads and validates the configuration and applies CLI overrides.
    /// Logging is not set up yet at this point.
    pub async fn new(args: &CliArgs) -> Result<Self> {
        let (mut config, sources) = AppConfig::load(args.config_path.as_deref())
            .await
            .context("failed to load configuration")?;

        if let Some(log_level) = &args.log_level {
            config.logging.level = log_level.clone();
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        let relay_config = config.to_relay_config()?;

        Ok(Self {
            config,
            relay_config,
            sources,
        })
    }

    /// Human-readable description of the effective configuration, used by
    /// `--check-config`.
    pub fn summary(&self) -> String {
        let sources = if self.sources.is_empty() {
            "built-in defaults only".to_string()
        } else {
            self.sources
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };

        [
            "Configuration OK".to_string(),
            format!("  sources: {}", sources),
            format!("  command prefix: {}", self.relay_config.command_prefix),
            format!("  RCON endpoint: {}", self.relay_config.rcon.endpoint()),
            format!(
                "  restart: {} container {} (timeout {}s)",
                self.config.restart.executable,
                self.config.restart.container_name,
                self.config.restart.timeout_secs
            ),
            format!("  log level: {}", self.config.logging.level),
        ]
        .join("\n")
    }

    /// Serves the console gateway until stdin closes or a signal arrives.
    pub async fn run(self) -> Result<()> {
        logging::setup_logging(&self.config.logging)?;

        let version = env!("CARGO_PKG_VERSION");
        info!("mcrelay v{} starting", version);
        for source in &self.sources {
            info!("Merged configuration from {}", source.display());
        }
        info!(
            "Relaying commands prefixed with [{}] to RCON endpoint {}",
            self.relay_config.command_prefix,
            self.relay_config.rcon.endpoint()
        );

        let mut signals =
            ShutdownSignals::install().context("failed to install signal handlers")?;
        let mut gateway = ConsoleGateway::stdio(self.relay_config.command_prefix.clone());
        let relay = Arc::new(CommandRelay::from_config(self.relay_config));

        let shutdown = async move {
            signals.recv().await;
        };

        let answered = serve::serve(&mut gateway, relay, shutdown).await;
        info!("mcrelay stopped after answering {} command(s)", answered);
        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let args = CliArgs::parse();

    let app = match Application::new(&args).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to start mcrelay: {e:#}");
            std::process::exit(1);
        }
    };

    if args.check_config {
        println!("{}", app.summary());
        return;
    }

    if let Err(e) = app.run().await {
        error!("Application error: {:#}", e);
        eprintln!("mcrelay failed: {e:#}");
        std::process::exit(1);
    }
}
