//! slavesim binary

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use common::logging::{self, LogConfig};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use slavesim::cli::{Cli, Commands};
use slavesim::{Simulator, SimulatorDocument, SimulatorSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = SimulatorSettings::load(cli.settings.as_deref())
        .context("Failed to load settings")?;

    let mut log_config = LogConfig {
        service_name: "slavesim".to_string(),
        log_dir: settings.logging.dir.clone(),
        level: settings.logging.level.clone(),
        enable_json: settings.logging.json,
        ..Default::default()
    };
    if let Some(level) = &cli.log_level {
        log_config.level = level.clone();
    }
    if let Err(e) = logging::init_with_config(log_config) {
        bail!("Failed to initialize logging: {}", e);
    }

    match cli.command {
        Commands::Run {
            config,
            save_on_exit,
        } => run(&settings, &config, save_on_exit).await,
        Commands::Validate { config } => validate(&config),
        Commands::Init { path, force } => init(&path, force),
    }
}

async fn run(settings: &SimulatorSettings, path: &Path, save_on_exit: bool) -> anyhow::Result<()> {
    let document = SimulatorDocument::load(path)?;
    let mut simulator = Simulator::new(settings);
    simulator.load_document(document).await?;

    let mut notifications = simulator.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(n) => println!("{} {}", n.at.format("%H:%M:%S%.3f"), n),
                Err(RecvError::Lagged(missed)) => warn!("{} status messages dropped", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let failed = simulator.start_all().await;
    if failed > 0 {
        warn!("{} of {} slaves failed to start", failed, simulator.len());
    }
    for line in simulator.status_lines() {
        info!("{}", line);
    }

    let refresh = simulator.document_settings().clone();
    let shutdown = common::shutdown_token();
    if refresh.auto_refresh {
        let mut ticker = tokio::time::interval(Duration::from_millis(refresh.refresh_interval.max(100)));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = simulator.refresh_all() {
                        warn!("Refresh failed: {}", e);
                    }
                },
            }
        }
    } else {
        shutdown.cancelled().await;
    }

    info!("Stopping {} slaves", simulator.len());
    if save_on_exit {
        match simulator.to_document() {
            Ok(doc) => {
                if let Err(e) = doc.save(path) {
                    error!("Save failed: {}", e);
                }
            },
            Err(e) => error!("Refresh before save failed: {}", e),
        }
    }
    simulator.stop_all().await;
    drop(simulator);
    printer.abort();
    Ok(())
}

fn validate(path: &Path) -> anyhow::Result<()> {
    let mut document = SimulatorDocument::load(path)?;
    document
        .normalize()
        .with_context(|| format!("{} is invalid", path.display()))?;

    for slave in &document.slaves {
        println!(
            "{}: unit {} on {}, {} registers",
            slave.name,
            slave.unit_id,
            slave.transport.summary(),
            slave.registers.len()
        );
    }
    println!("{} OK", path.display());
    Ok(())
}

fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} exists, use --force to overwrite", path.display());
    }
    SimulatorDocument::sample().save(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
