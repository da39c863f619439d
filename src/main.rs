mod core;
mod features;
mod shared;

use crate::core::config::{Config, SimilarityBackendKind};
use crate::core::openapi::{ApiDoc, SwaggerInfoModifier};
use crate::core::{database, middleware};
use crate::features::analytics::{routes as analytics_routes, AnalyticsService};
use crate::features::auth;
use crate::features::issues::services::IssueStore;
use crate::features::issues::{
    routes as issues_routes, PgIssueStore, PriorityRefresher, ReportService, ReportSettings,
};
use crate::features::officers::{routes as officers_routes, OfficerService};
use crate::features::prioritization::{
    ArtifactSeverityModel, EmbeddingSimilarity, OllamaEmbedder, SeverityClassifier,
    SeverityModel, SimilarityBackend, SimilarityMatcher, TfidfSimilarity,
};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

fn main() -> anyhow::Result<()> {
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(worker_threads * 4)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(worker_threads))
}

async fn async_main(worker_threads: usize) -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        "System info: tokio_worker_threads={}, pid={}",
        worker_threads,
        std::process::id()
    );
    tracing::info!("Configuration loaded successfully");

    let pool = database::create_pool(&config.database).await?;
    tracing::info!("Database connection pool created");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
    tracing::info!("Database migrations completed successfully");

    let jwt_validator = Arc::new(auth::JwtValidator::new(
        &config.auth.jwt_secret,
        &config.auth.issuer,
        &config.auth.audience,
        config.auth.jwt_leeway,
    ));
    tracing::info!("Auth configuration initialized");

    // A missing or corrupt model must stop startup, not the first request
    let prioritization = &config.prioritization;
    let artifact_model = ArtifactSeverityModel::new(prioritization.model_artifact_dir.clone());
    artifact_model
        .ensure_loaded()
        .map_err(|e| anyhow::anyhow!("Failed to load severity model: {}", e))?;
    let severity_model: Arc<dyn SeverityModel> = Arc::new(artifact_model);

    let similarity_backend: Arc<dyn SimilarityBackend> = match prioritization.similarity_backend
    {
        SimilarityBackendKind::Tfidf => Arc::new(TfidfSimilarity),
        SimilarityBackendKind::Embedding => {
            let base_url = prioritization
                .ollama_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("OLLAMA_URL is required for embeddings"))?;
            let embedder = OllamaEmbedder::new(
                base_url,
                &prioritization.embedding_model,
                prioritization.embedding_timeout,
            )
            .map_err(|e| anyhow::anyhow!("Failed to create embedding client: {}", e))?;
            Arc::new(EmbeddingSimilarity::new(Arc::new(embedder)))
        }
    };
    tracing::info!(
        backend = ?prioritization.similarity_backend,
        threshold = prioritization.match_threshold,
        "Similarity matcher initialized"
    );

    let store: Arc<dyn IssueStore> = Arc::new(PgIssueStore::new(pool.clone()));
    let report_service = Arc::new(ReportService::new(
        Arc::clone(&store),
        SeverityClassifier::new(
            Arc::clone(&severity_model),
            prioritization.emergency_keywords.clone(),
        ),
        SimilarityMatcher::new(similarity_backend, prioritization.match_threshold),
        ReportSettings::from(prioritization),
    ));
    let officer_service = Arc::new(OfficerService::new(
        Arc::clone(&store),
        Arc::clone(&report_service),
    ));
    let analytics_service = Arc::new(AnalyticsService::new(
        Arc::clone(&store),
        Arc::clone(&severity_model),
    ));
    tracing::info!("Issue services initialized");

    if prioritization.refresh_interval_secs > 0 {
        let refresher = PriorityRefresher::new(
            Arc::clone(&report_service),
            Duration::from_secs(prioritization.refresh_interval_secs),
        );
        tokio::spawn(async move {
            refresher.run().await;
        });
        tracing::info!(
            "Priority refresher spawned (every {}s)",
            prioritization.refresh_interval_secs
        );
    } else {
        tracing::info!("Priority refresher disabled");
    }

    let swagger_modifier = SwaggerInfoModifier {
        title: config.swagger.title.clone(),
        version: config.swagger.version.clone(),
        description: config.swagger.description.clone(),
    };

    let mut openapi = ApiDoc::openapi();
    swagger_modifier.modify(&mut openapi);

    let swagger = if let Some(credentials) = config.swagger.credentials() {
        tracing::info!("Swagger UI basic auth enabled");
        Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
            .layer(axum::middleware::from_fn_with_state(
                Arc::new(credentials),
                middleware::basic_auth_middleware,
            ))
    } else {
        tracing::info!("Swagger UI basic auth disabled (no credentials configured)");
        Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
    };

    // Protected routes (require JWT authentication)
    let protected_routes = Router::new()
        .merge(issues_routes::routes(Arc::clone(&report_service)))
        .merge(officers_routes::routes(officer_service))
        .merge(analytics_routes::routes(analytics_service))
        .route_layer(axum::middleware::from_fn_with_state(
            jwt_validator,
            middleware::auth_middleware,
        ));

    async fn health_check() -> axum::http::StatusCode {
        axum::http::StatusCode::OK
    }
    let health_route = Router::new().route("/health", axum::routing::get(health_check));

    let app = Router::new()
        .merge(swagger)
        .merge(protected_routes)
        .merge(health_route)
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        // Propagate X-Request-Id to response headers
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Generate X-Request-Id using UUID v7 (or use client-provided one)
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid));

    let addr = config.app.server_address();
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    let socket = socket2::Socket::new(
        socket2::Domain::for_address(socket_addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nodelay(true)?;

    socket.set_recv_buffer_size(256 * 1024)?;
    socket.set_send_buffer_size(256 * 1024)?;

    #[cfg(target_os = "linux")]
    {
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(Duration::from_secs(60))
            .with_interval(Duration::from_secs(10))
            .with_retries(3);
        socket.set_tcp_keepalive(&keepalive)?;
    }
    #[cfg(not(target_os = "linux"))]
    {
        let keepalive = socket2::TcpKeepalive::new().with_time(Duration::from_secs(60));
        socket.set_tcp_keepalive(&keepalive)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(1024)?;

    let listener = tokio::net::TcpListener::from_std(socket.into())?;
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
