//! guru-ia - Machine Image Analysis Microservice
//!
//! Accepts image submissions over HTTP, classifies them through a
//! multi-stage vision-model pipeline in the background, persists the
//! outcome, and delivers it to the submitter's webhook.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use guru_common::config::{ConfigOverrides, GuruConfig};
use guru_ia::services::{
    job_queue, AzureChatModel, ClassificationPipeline, JobQueue, PromptLibrary, ReferenceTables,
    ResultSink,
};
use guru_ia::AppState;

#[derive(Debug, Parser)]
#[command(name = "guru-ia", about = "Machine image analysis service")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP listen port (overrides environment and config file)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    info!("Starting guru-ia (Machine Image Analysis) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve configuration once; components receive it explicitly
    let config = GuruConfig::resolve(ConfigOverrides {
        config_path: cli.config,
        port: cli.port,
    })?;

    // Database
    info!("Database: {}", config.database_path.display());
    let db_pool = guru_ia::db::init_database_pool(&config.database_path).await?;
    info!("Database connection established");

    // Shared immutable resources, loaded once for the process lifetime
    let prompts = Arc::new(PromptLibrary::load(&config.prompts_dir)?);
    let reference = Arc::new(ReferenceTables::load(&config.reference_dir)?);
    let model = Arc::new(
        AzureChatModel::new(&config.model)
            .map_err(|e| anyhow::anyhow!("Failed to initialize model gateway: {}", e))?,
    );

    let pipeline = Arc::new(ClassificationPipeline::new(model, prompts, reference)?);
    let sink = Arc::new(ResultSink::new(db_pool.clone(), config.callback.clone())?);

    // Job queue + worker pool
    let (jobs, job_rx) = JobQueue::new(job_queue::QUEUE_CAPACITY);
    let state = AppState::new(db_pool, jobs);
    job_queue::spawn_workers(
        config.workers,
        job_rx,
        pipeline,
        sink,
        state.last_error.clone(),
    );
    info!("Started {} analysis workers", config.workers);

    // Build router
    let app = guru_ia::build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("Listening on http://0.0.0.0:{}", config.port);
    info!("Health check: http://127.0.0.1:{}/health", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
