use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lead_capture_api::config::Config;
use lead_capture_api::db::Database;
use lead_capture_api::handlers::{self, AppState};
use lead_capture_api::services::{EmailGeneratorService, NotificationService};
use lead_capture_api::session::SessionStore;
use lead_capture_api::storage::LeadStorage;
use lead_capture_api::submission::SubmissionGuard;

/// Main entry point for the application.
///
/// Initializes logging, configuration, the database pool, external service
/// clients, session state, and the HTTP routes with their middleware, then
/// starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_capture_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    let storage = LeadStorage::new(db.pool.clone());
    let generator = EmailGeneratorService::new(&config);
    let notifier = NotificationService::new(&config);
    let sessions = SessionStore::new();
    let guard = SubmissionGuard::new();
    tracing::info!("Session store and submission guard initialized");

    // Build application state
    let app_state = Arc::new(AppState {
        config: config.clone(),
        storage,
        generator,
        notifier,
        sessions,
        guard,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        .route("/api/v1/leads", post(handlers::submit_lead))
        .route("/api/v1/sessions/:session_id", get(handlers::get_session))
        .layer(
            ServiceBuilder::new()
                // Request size limit: lead forms are small
                .layer(RequestBodyLimitLayer::new(64 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
