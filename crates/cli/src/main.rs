mod metrics;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avpackager_core::{
    config::Config,
    delivery::S3ObjectStore,
    load_config, load_config_from_env,
    media::{FfmpegTool, MediaTool},
    notifier::SnsNotifier,
    registrar::ArchivesSpaceRegistrar,
    validate_config, Collaborators, PackagingOrchestrator, SanitizedConfig, ShutdownHandle,
};

/// Exit code for configuration and startup errors.
const EXIT_FATAL: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "avpackager", version, about = "Package digitized AV bundles for access and preservation")]
struct Cli {
    /// Configuration file. Environment variables override its values.
    #[arg(long, short, global = true, env = "AVPACKAGER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan the source root once and process every eligible bundle.
    Run {
        /// Override processor.max_concurrent_bundles.
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Publish completion events that could not be published earlier.
    ReplayNotifications,
    /// Print the effective configuration with secrets removed.
    ShowConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            EXIT_FATAL
        }
    };
    std::process::exit(code);
}

fn init_logging() {
    let json = std::env::var("AVPACKAGER_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,aws_config=warn,aws_smithy_runtime=warn".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = load(cli.config.as_deref())?;

    match cli.command {
        Command::ShowConfig => {
            let sanitized = SanitizedConfig::from(&config);
            println!("{}", serde_json::to_string_pretty(&sanitized)?);
            Ok(0)
        }
        Command::Run { concurrency } => {
            if let Some(concurrency) = concurrency {
                config.processor.max_concurrent_bundles = concurrency;
            }
            validate_config(&config).context("Configuration validation failed")?;

            let orchestrator = build_orchestrator(&config).await?;
            let shutdown = orchestrator.shutdown_handle();
            tokio::spawn(watch_signals(shutdown));

            let summary = orchestrator.run().await.context("Packaging run failed")?;
            print!("{}", summary);
            write_metrics(&config);
            Ok(summary.exit_code())
        }
        Command::ReplayNotifications => {
            validate_config(&config).context("Configuration validation failed")?;

            let orchestrator = build_orchestrator(&config).await?;
            let summary = orchestrator
                .replay_pending_notifications()
                .await
                .context("Notification replay failed")?;
            println!(
                "{} published, {} still pending",
                summary.published.len(),
                summary.failed.len()
            );
            write_metrics(&config);
            Ok(summary.exit_code())
        }
    }
}

/// Loads from the file when one is given or present, else from the environment.
fn load(path: Option<&Path>) -> Result<Config> {
    let default_path = PathBuf::from("avpackager.toml");
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None if default_path.exists() => Some(default_path),
        None => None,
    };

    let config = match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => {
            info!("No configuration file, loading from environment");
            load_config_from_env().context("Failed to load config from environment")?
        }
    };

    let sanitized = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(sanitized.as_bytes()));
    info!(
        "Configuration loaded (environment={}, hash={})",
        config.environment,
        &config_hash[..16]
    );
    Ok(config)
}

async fn build_orchestrator(config: &Config) -> Result<PackagingOrchestrator> {
    let media = FfmpegTool::new(config.media.clone());
    media
        .validate()
        .await
        .context("Media tool is not usable")?;
    info!("Using media tool: {}", media.name());

    let object_store = S3ObjectStore::from_config(&config.aws).await;
    let notifier = SnsNotifier::from_config(&config.aws, &config.notifier).await;
    let registrar = ArchivesSpaceRegistrar::new(&config.archivesspace)
        .context("Failed to create ArchivesSpace client")?;
    info!("Registering with ArchivesSpace at {}", config.archivesspace.base_url);

    Ok(PackagingOrchestrator::new(
        config,
        Collaborators {
            media: Arc::new(media),
            object_store: Arc::new(object_store),
            registrar: Arc::new(registrar),
            notifier: Arc::new(notifier),
        },
    ))
}

fn write_metrics(config: &Config) {
    let Some(path) = &config.metrics.textfile_path else {
        return;
    };
    match metrics::write_textfile(path) {
        Ok(()) => info!("Metrics written to {:?}", path),
        Err(e) => warn!("Failed to write metrics: {:#}", e),
    }
}

/// Stops new bundles from starting on Ctrl+C or SIGTERM.
async fn watch_signals(shutdown: ShutdownHandle) {
    shutdown_signal().await;
    info!("Shutdown signal received, finishing in-flight bundles");
    shutdown.trigger();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
