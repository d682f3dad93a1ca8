//! Main entry point for the match director service
//!
//! This is the production entry point that initializes and runs the
//! ticket ingestion loop, the director and the metrics endpoints with proper
//! error handling, logging, and graceful shutdown.

use anyhow::Result;
use clap::Parser;
use match_director::config::{validate_config, AppConfig};
use match_director::profile::ProfileGenerator;
use match_director::service::{AppState, HealthCheck, HealthStatus, ServiceContext};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Match Director - skill-window matchmaking over simulated players
#[derive(Parser)]
#[command(
    name = "match-director",
    version,
    about = "A matchmaking director that groups tickets into skill-window matches",
    long_about = "Match Director generates match profiles from a region and game mode scenario, \
                 synthesizes tickets from simulated clients, groups pooled tickets into matches \
                 by skill window or exhaustively, and assigns each match a game server."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Perform health check and exit
    #[arg(long, help = "Perform a health check and exit with status code")]
    health_check: bool,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Metrics port override
    #[arg(long, value_name = "PORT", help = "Override metrics server port")]
    metrics_port: Option<u16>,

    /// Seed for the simulated client stream
    #[arg(long, value_name = "SEED", help = "Seed the ticket and server address generators")]
    seed: Option<u64>,

    /// Grouping policy override
    #[arg(long, value_name = "POLICY", help = "Grouping policy (skill, exhaustive)")]
    policy: Option<String>,

    /// Simulation mode override
    #[arg(long, value_name = "MODE", help = "Simulation mode (all, only_skill)")]
    simulation: Option<String>,

    /// Disable the ticket ingestion loop
    #[arg(long, help = "Run the director without creating simulated tickets")]
    no_ingestion: bool,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Print the generated match profiles and exit
    #[arg(long, help = "Print the generated match profiles as JSON and exit")]
    profiles: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Perform health check and return appropriate exit code.
///
/// The service is not started, so only component checks are considered.
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    let app_state = AppState::new(config).await?;
    let context = app_state.context();

    match HealthCheck::check(&context).await {
        Ok(health) => {
            println!("Health Check: {}", health.status);
            for check in &health.checks {
                match &check.message {
                    Some(message) => println!("  {}: {} ({})", check.name, check.status, message),
                    None => println!("  {}: {}", check.name, check.status),
                }
            }
            println!("  Profiles: {}", health.stats.profiles);

            let components_ok = health
                .checks
                .iter()
                .filter(|check| check.name != "service_running")
                .all(|check| check.status != HealthStatus::Unhealthy);
            std::process::exit(if components_ok { 0 } else { 1 });
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print every generated profile as pretty JSON
fn print_profiles(config: &AppConfig) -> Result<()> {
    let generator = ProfileGenerator::new(config.matchmaking.scenario.clone())?;
    let profiles = generator.generate();
    println!("{}", serde_json::to_string_pretty(&profiles)?);
    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Run periodic health checks
async fn health_check_task(context: Arc<ServiceContext>) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));

    while context.is_running().await {
        interval.tick().await;

        match HealthCheck::check(&context).await {
            Ok(health) => {
                info!(
                    "Health check: {} - {} pending tickets, {} assigned",
                    health.status, health.stats.tickets_pending, health.stats.tickets_assigned
                );
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
            }
        }
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🚀 Match Director");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Metrics port: {}", config.service.metrics_port);
    info!("   Grouping policy: {}", config.matchmaking.grouping_policy);
    info!("   Simulation: {}", config.simulation.mode);
    info!(
        "   Regions: {}",
        config.matchmaking.scenario.regions.join(", ")
    );
    info!("   Poll interval: {:?}", config.poll_interval());
    match config.simulation.rng_seed {
        Some(seed) => info!("   Seed: {}", seed),
        None => info!("   Seed: random"),
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    // Start with environment-based config
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(metrics_port) = args.metrics_port {
        config.service.metrics_port = metrics_port;
    }

    if let Some(seed) = args.seed {
        config.simulation.rng_seed = Some(seed);
    }

    if let Some(policy) = &args.policy {
        config.matchmaking.grouping_policy = policy.parse()?;
    }

    if let Some(mode) = &args.simulation {
        config.simulation.mode = mode.parse()?;
    }

    if args.no_ingestion {
        config.frontend.enabled = false;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if args.profiles {
        return print_profiles(&config);
    }

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    // Handle special modes
    if args.health_check {
        return perform_health_check(config).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    // Display startup information
    display_startup_banner(&config);

    // Initialize application state
    info!("Initializing service components...");
    let mut app_state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    // Start the service
    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    // Start health check monitoring
    let health_task = tokio::spawn(health_check_task(app_state.context()));

    info!("✅ Match Director is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    // Wait for shutdown signal
    wait_for_shutdown_signal().await;

    // Begin graceful shutdown
    info!("🛑 Shutdown signal received, beginning graceful shutdown...");

    // Cancel health check task
    health_task.abort();

    // Shutdown with timeout
    info!("Stopping service components...");
    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => {
            info!("✅ Graceful shutdown completed successfully");
        }
        Ok(Err(e)) => {
            error!("Shutdown failed: {}", e);
        }
        Err(_) => {
            warn!("⚠️  Shutdown timeout exceeded, forcing exit");
        }
    }

    info!("🛑 Match Director stopped");
    Ok(())
}
