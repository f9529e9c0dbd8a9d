// Weather Monitor v0.1
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod errors;
mod routes;
mod services;

use config::AppConfig;
use db::store::{SqliteSummaryStore, SummaryStore};
use services::cycle::{CycleOrchestrator, CycleSettings};
use services::fetcher::{ReadingFetcher, WeatherProvider};
use services::openweather::OpenWeatherClient;
use services::scheduler::Scheduler;

/// OpenAPI document for the Weather Monitor API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weather Monitor API",
        version = "0.1.0",
        description = "Periodically samples current weather for a fixed set of cities \
            from OpenWeatherMap, raises threshold alerts, and stores a daily rollup \
            (average/max/min temperature, dominant condition) after every collection cycle.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Cities", description = "Monitored cities"),
        (name = "Summaries", description = "Persisted daily rollups"),
        (name = "Scheduler", description = "Collection scheduler status"),
    ),
    paths(
        routes::health::health_check,
        routes::cities::list_cities,
        routes::summaries::list_summaries,
        routes::summaries::get_summary,
        routes::scheduler::get_scheduler_status,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            config::City,
            routes::summaries::SummaryResponse,
            services::scheduler::SchedulerStatus,
            services::cycle::CycleReport,
            services::cycle::CityFetchStatus,
            services::threshold::Alert,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_monitor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().expect("Invalid configuration");

    // Open the database and run migrations
    let pool = db::store::connect(&config.database_url)
        .await
        .expect("Failed to open database");

    // Wire the collection pipeline with explicit dependencies
    let provider: Arc<dyn WeatherProvider> = Arc::new(
        OpenWeatherClient::new(&config.owm_api_key, &config.owm_base_url, config.owm_units)
            .expect("Failed to build OpenWeatherMap client"),
    );
    let store: Arc<dyn SummaryStore> = Arc::new(SqliteSummaryStore::new(pool.clone()));
    let fetcher = ReadingFetcher::new(provider, config.cities.clone());
    let orchestrator = Arc::new(CycleOrchestrator::new(
        fetcher,
        store,
        CycleSettings {
            threshold_c: config.alert_threshold_c,
            consecutive_breaches: config.alert_consecutive_breaches,
            scope: config.summary_scope,
            max_retries: config.fetch_max_retries,
        },
    ));

    let mut scheduler = Scheduler::new(orchestrator);
    scheduler
        .start(Duration::from_secs(config.poll_interval_minutes * 60))
        .await
        .expect("Failed to start scheduler");
    tracing::info!(
        "Weather monitoring started for {} cities, fetching every {} minutes",
        config.cities.len(),
        config.poll_interval_minutes
    );

    // CORS: read-only API, restrict methods to GET
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET])
        .allow_headers(Any);

    // Build router
    let summary_routes = Router::new()
        .route("/api/v1/summaries", get(routes::summaries::list_summaries))
        .route("/api/v1/summaries/:id", get(routes::summaries::get_summary))
        .with_state(pool.clone());

    let health_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .with_state(routes::health::HealthState {
            pool: pool.clone(),
            scheduler: scheduler.status(),
        });

    let city_routes = Router::new()
        .route("/api/v1/cities", get(routes::cities::list_cities))
        .with_state(Arc::new(config.cities.clone()));

    let scheduler_routes = Router::new()
        .route(
            "/api/v1/scheduler/status",
            get(routes::scheduler::get_scheduler_status),
        )
        .with_state(scheduler.status());

    let app = Router::new()
        .merge(health_routes)
        .merge(city_routes)
        .merge(summary_routes)
        .merge(scheduler_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Serve until interrupted
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server terminated unexpectedly");

    // Never leave a cycle half-executed
    if let Err(e) = scheduler.stop().await {
        tracing::error!("Failed to stop scheduler: {}", e);
    }
    pool.close().await;
    tracing::info!("Shutdown complete");
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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

    tracing::info!("Shutdown signal received, stopping scheduler");
}
