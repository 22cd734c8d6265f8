use anyhow::Result;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use study_pal::{
    api::{create_router, AppState},
    config::{Config, LoggingConfig},
    log_system_event, ContentClient, Database, SchedulingEngine, StudyService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let _guard = setup_logging(&config.logging)?;
    config.validate()?;

    log_system_event!(startup, component = "server", "Starting StudyPal scheduling engine");

    let db = Database::new(&config.database.url).await?;
    info!("Database initialized successfully");

    let engine = SchedulingEngine::new(config.engine_config()?);
    let mut study_service = StudyService::new(db, engine);

    if let Some(url) = &config.content.url {
        let client = ContentClient::new(url.clone(), config.content.timeout())?;
        study_service = study_service.with_content_generator(Arc::new(client));
        info!(content_service = %url, "Content service client configured");
    }

    let state = AppState { study_service };

    let app = create_router(state).layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    log_system_event!(shutdown, component = "server", "Server stopped");
    Ok(())
}

fn setup_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::fmt;

    let env_filter = EnvFilter::try_new(&config.level)
        .unwrap_or_else(|_| EnvFilter::new("info,study_pal=debug"));

    let console_layer = config.console_enabled.then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(true)
            .boxed()
    });

    // Daily rotated file output without ANSI colors
    let (file_layer, guard) = if config.file_enabled {
        std::fs::create_dir_all(&config.log_directory).unwrap_or_else(|e| {
            eprintln!("Warning: Could not create logs directory: {}", e);
        });
        let file_appender = tracing_appender::rolling::daily(&config.log_directory, "study-pal.log");
        let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
        let layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(non_blocking_file)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!(
        directory = %config.log_directory,
        file_enabled = config.file_enabled,
        "Logging initialized"
    );

    Ok(guard)
}
