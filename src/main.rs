use clap::Parser;
use pond_monitor::classifier::{ensure_model, EnvelopeModel};
use pond_monitor::config::Config;
use pond_monitor::context::PipelineContext;
use pond_monitor::db::{CropStore, Repository};
use pond_monitor::generator::LogGenerator;
use pond_monitor::scheduler::Scheduler;
use pond_monitor::trigger::{AbnormalTrigger, FileTrigger, NoTrigger};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pond-monitor")]
#[command(about = "Shrimp pond water-quality simulation and health reporting")]
#[command(version)]
struct Cli {
    /// Refresh health reports from the stored logs once, then exit
    #[arg(long)]
    report_once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pond_monitor=debug,sqlx=warn")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Pond monitoring service starting...");

    let config = Config::load("config/config.yaml").map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration: {}\n\n\
             Make sure:\n\
             1. config/config.yaml exists\n\
             2. All required environment variables are set (check .env.example)\n\
             3. Create a .env file if needed",
            e
        )
    })?;
    info!("Configuration loaded");

    let model = ensure_model(&config.model)
        .map_err(|e| anyhow::anyhow!("Failed to prepare health model: {}", e))?;

    let connection_string = config.database.connection_string();
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&connection_string)
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to connect to database: {}\n\n\
                 Host: {}:{}\n\
                 Database: {}\n\
                 User: {}\n\n\
                 Common fixes:\n\
                 1. Ensure PostgreSQL is running\n\
                 2. Check username/password are correct (DB_USER, DB_PASSWORD)\n\
                 3. Verify database exists: createdb {}\n\
                 4. Check host and port (DB_HOST, DB_PORT)",
                e,
                config.database.host,
                config.database.port,
                config.database.name,
                config.database.user,
                config.database.name
            )
        })?;

    info!(
        "Connected to database: {}@{}:{}/{}",
        config.database.user, config.database.host, config.database.port, config.database.name
    );

    let repository = Arc::new(Repository::new(pool));
    let result = run(&config, repository.clone(), model, cli.report_once).await;

    repository.close().await;
    info!("Pond monitoring service shutting down");
    result
}

async fn run(
    config: &Config,
    repository: Arc<Repository>,
    model: EnvelopeModel,
    report_once: bool,
) -> anyhow::Result<()> {
    repository.run_migrations().await?;

    let context = PipelineContext::from_store(repository.clone(), Arc::new(model));

    let trigger: Arc<dyn AbnormalTrigger> = match &config.simulation.trigger_file {
        Some(path) => {
            info!(
                "To force an unhealthy reading, create the file {}",
                path.display()
            );
            Arc::new(FileTrigger::new(path))
        }
        None => Arc::new(NoTrigger),
    };
    let generator = LogGenerator::new(&config.simulation, trigger);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut scheduler = Scheduler::new(
        config.scheduler.clone(),
        config.report.clone(),
        context,
        generator,
        shutdown_rx,
    );

    if report_once {
        let crop_ids = repository.eligible_crop_ids().await?;
        let reports = scheduler.refresh_reports(&crop_ids).await?;
        info!("Report run finished with {} reports", reports);
        return Ok(());
    }

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    if let Err(e) = scheduler.run().await {
        error!("Scheduler error: {}", e);
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags() {
        assert!(!Cli::try_parse_from(["pond-monitor"]).unwrap().report_once);
        assert!(
            Cli::try_parse_from(["pond-monitor", "--report-once"])
                .unwrap()
                .report_once
        );
    }

    #[test]
    fn test_cli_rejects_unknown_flags() {
        assert!(Cli::try_parse_from(["pond-monitor", "--report_once"]).is_err());
        assert!(Cli::try_parse_from(["pond-monitor", "extra"]).is_err());
    }
}
