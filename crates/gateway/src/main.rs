//! DocVault API Gateway
//!
//! The single HTTP entry point. Handles:
//! - Bearer-token authentication (the gate binds a principal per request)
//! - Document upload, listing, retrieval and administration
//! - Question answering over documents
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use docvault_common::{
    auth::JwtManager,
    config::{AppConfig, ObservabilityConfig},
    db::{DbPool, Repository},
    intelligence::{HttpIntelligenceClient, IntelligenceClient},
    metrics::{self, COLLABORATOR_BUCKETS, LATENCY_BUCKETS, METRICS_PREFIX},
    services::{ChatService, DocumentQueryService, DocumentService, EnrichmentService},
    storage::{BlobStore, LocalBlobStore},
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, sync::Notify};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::middleware::{auth_gate, track_requests, AuthGate};

/// Multipart framing allowance on top of the configured file size limit
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Repository,
    pub documents: DocumentService,
    pub queries: DocumentQueryService,
    pub chat: ChatService,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        repo: Repository,
        blobs: Arc<dyn BlobStore>,
        intelligence: Arc<dyn IntelligenceClient>,
    ) -> Self {
        let enrichment = EnrichmentService::new(repo.clone(), intelligence.clone());

        Self {
            documents: DocumentService::new(
                repo.clone(),
                blobs,
                enrichment,
                config.storage.max_upload_bytes,
            ),
            queries: DocumentQueryService::new(repo.clone()),
            chat: ChatService::new(
                repo.clone(),
                intelligence,
                config.intelligence.max_context_chars,
            ),
            repo,
            config,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.observability);
    info!("Starting DocVault API Gateway v{}", docvault_common::VERSION);

    init_metrics(&config.observability)?;

    let jwt_secret = config
        .auth
        .jwt_secret
        .clone()
        .filter(|s| !s.trim().is_empty())
        .context("auth.jwt_secret must be set (APP__AUTH__JWT_SECRET)")?;

    let config = Arc::new(config);

    info!("Connecting to database...");
    let pool = DbPool::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    let repo = Repository::new(pool);

    let blobs: Arc<dyn BlobStore> = Arc::new(
        LocalBlobStore::new(&config.storage.upload_dir)
            .await
            .context("Failed to prepare upload directory")?,
    );
    let intelligence: Arc<dyn IntelligenceClient> = Arc::new(
        HttpIntelligenceClient::new(&config.intelligence)
            .context("Failed to build intelligence client")?,
    );

    let gate = AuthGate {
        jwt: Arc::new(JwtManager::new(&jwt_secret, config.auth.jwt_expiration_secs)),
        reject_invalid_tokens: config.auth.reject_invalid_tokens,
    };
    let state = AppState::new(config.clone(), repo, blobs, intelligence);

    let app = create_router(state, gate);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let stop = Arc::new(Notify::new());
    let server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown({
                let stop = stop.clone();
                async move { stop.notified().await }
            })
            .into_future(),
    );

    shutdown_signal().await;
    stop.notify_one();

    // In-flight requests get at most the configured drain time
    match tokio::time::timeout(config.shutdown_timeout(), server).await {
        Ok(joined) => joined.context("Server task panicked")??,
        Err(_) => warn!(
            timeout_secs = config.server.shutdown_timeout_secs,
            "Shutdown timed out with requests still in flight"
        ),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Install the Prometheus exporter unless the port is 0
fn init_metrics(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if config.metrics_port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    let histogram = |name: &str| Matcher::Full(format!("{}_{}", METRICS_PREFIX, name));

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .set_buckets_for_metric(histogram("request_duration_seconds"), LATENCY_BUCKETS)?
        .set_buckets_for_metric(histogram("listing_duration_seconds"), LATENCY_BUCKETS)?
        .set_buckets_for_metric(histogram("chat_duration_seconds"), COLLABORATOR_BUCKETS)?
        .set_buckets_for_metric(histogram("enrichment_duration_seconds"), COLLABORATOR_BUCKETS)?
        .install()
        .context("Failed to install Prometheus exporter")?;

    metrics::register_metrics();
    info!(port = config.metrics_port, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState, gate: AuthGate) -> Router {
    use handlers::{auth, chat, documents, health, images};

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let body_limit = state.config.storage.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    // API routes
    let api_routes = Router::new()
        // Health endpoints (no principal needed)
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))

        .route("/auth/me", get(auth::me))

        // Document endpoints
        .route("/documents", get(documents::list_documents))
        .route("/documents/upload", post(documents::upload))
        .route("/documents/search", post(chat::global_search))
        .route(
            "/documents/{id}",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/documents/{id}/download", get(documents::download_document))
        .route("/documents/{id}/view", get(documents::view_document))
        .route("/documents/{id}/status", put(documents::update_status))
        .route("/documents/{id}/reprocess", post(documents::reprocess_document))
        .route("/documents/{id}/chat", post(chat::ask))

        // Image endpoints
        .route("/documents/{id}/images", get(images::list_images))
        .route("/documents/{id}/images/search", get(images::search_images))
        .route("/documents/{id}/images/{image_id}", get(images::get_image))

        // Collaborator passthrough
        .route("/ai-service/translate", post(chat::translate))

        // Administration
        .route("/admin/documents", get(documents::list_all_documents))
        .route_layer(from_fn(track_requests));

    // Compose the app
    Router::new()
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn_with_state(gate, auth_gate))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
