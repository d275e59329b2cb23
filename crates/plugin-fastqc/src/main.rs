//! `seqstack-plugin-fastqc` -- FastQC analysis worker.
//!
//! Consumes jobs from `dispatcher_fastqc`, runs FastQC over the job's
//! sample directory, stores the result envelope, and reports the stored
//! result's id back to the dispatcher.
//!
//! # Environment variables
//!
//! See [`seqstack_dispatch::Settings`] for the full table: `PG_DB_*`
//! for the shared database, `AMQP_*` for the broker, `DOWNLOAD_PATH`
//! for the sample tree, and an optional `PLUGIN_NAME` override.

use seqstack_dispatch::{listener, Settings};
use seqstack_plugin_fastqc::handler::FastqcHandler;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Queue-facing name of this plugin unless `PLUGIN_NAME` overrides it.
const DEFAULT_PLUGIN_NAME: &str = "fastqc";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seqstack_plugin_fastqc=info,seqstack_dispatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid worker configuration");
        std::process::exit(1);
    });

    let plugin_name = settings
        .plugin_name
        .clone()
        .unwrap_or_else(|| DEFAULT_PLUGIN_NAME.to_string());

    tracing::info!(
        plugin = %plugin_name,
        version = env!("CARGO_PKG_VERSION"),
        download_path = %settings.download_path.display(),
        "Starting FastQC worker",
    );

    let pool = seqstack_db::create_pool(&settings.database_url())
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to create database pool");
            std::process::exit(1);
        });

    if let Err(e) = seqstack_db::health_check(&pool).await {
        tracing::error!(error = %e, "Database health check failed");
        std::process::exit(1);
    }
    tracing::info!("Database connection established");

    let handler = FastqcHandler::new(plugin_name, settings.download_path.clone());

    listener::run(&settings.amqp_url(), &pool, &handler).await;
}
