//! verband-service - Verband membership lifecycle and billing API
//!
//! Long-running HTTP service that:
//! - Registers dojo and individual memberships with sequential numbers
//! - Issues invoices, SEPA mandates and keeps the audit trail
//! - Serves the admin area and the public registration form

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use verband_service::adapters::auth::{JwtConfig, JwtSessionValidator};
use verband_service::adapters::http::{
    set_verbose_errors, verband_router, TrustedProxy, VerbandAppState,
};
use verband_service::adapters::memory::{InMemoryDojoStats, InMemorySettings, InMemoryVerbandStore};
use verband_service::adapters::postgres::{
    PostgresDojoStats, PostgresMembershipReader, PostgresSettings, PostgresVerbandStore,
};
use verband_service::application::{AuditTrail, CachingSettingsResolver, SettingsStore};
use verband_service::config::{AppConfig, AuthConfig, DatabaseConfig};
use verband_service::ports::{DojoStatsProvider, MembershipReader, VerbandStore};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        audit_policy = ?config.audit.policy,
        "Starting verband-service"
    );

    set_verbose_errors(config.features.verbose_errors && !config.is_production());

    let state = build_state(&config).await?;
    let app = apply_layers(verband_router(state), &config);

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("verband-service listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("verband-service stopped");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn build_state(config: &AppConfig) -> Result<VerbandAppState, BoxError> {
    let (store, reader, settings_store, dojo_stats): (
        Arc<dyn VerbandStore>,
        Arc<dyn MembershipReader>,
        Arc<dyn SettingsStore>,
        Arc<dyn DojoStatsProvider>,
    ) = if config.database.is_in_memory() {
        tracing::warn!("Using the in-memory store; all data is lost on shutdown");
        let store = Arc::new(InMemoryVerbandStore::new());
        (
            store.clone(),
            store,
            Arc::new(InMemorySettings::with_defaults()),
            Arc::new(InMemoryDojoStats::new()),
        )
    } else {
        let pool = connect(&config.database).await?;
        (
            Arc::new(PostgresVerbandStore::new(pool.clone())),
            Arc::new(PostgresMembershipReader::new(pool.clone())),
            Arc::new(PostgresSettings::new(pool.clone())),
            Arc::new(PostgresDojoStats::new(pool)),
        )
    };

    let settings = Arc::new(CachingSettingsResolver::new(
        settings_store,
        config.settings.cache_ttl(),
    ));

    Ok(VerbandAppState {
        audit: Arc::new(AuditTrail::new(store.clone(), config.audit.policy)),
        store,
        reader,
        settings: settings.clone(),
        settings_repository: settings,
        dojo_stats,
        session_validator: Arc::new(JwtSessionValidator::new(jwt_config(&config.auth))),
        trusted_proxy: TrustedProxy(config.server.trust_forwarded_for),
    })
}

async fn connect(database: &DatabaseConfig) -> Result<sqlx::PgPool, BoxError> {
    let pool = PgPoolOptions::new()
        .min_connections(database.min_connections)
        .max_connections(database.max_connections)
        .acquire_timeout(database.acquire_timeout())
        .idle_timeout(database.idle_timeout())
        .max_lifetime(database.max_lifetime())
        .connect(&database.url)
        .await?;
    tracing::info!(max_connections = database.max_connections, "Connected to PostgreSQL");

    if database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }
    Ok(pool)
}

fn jwt_config(auth: &AuthConfig) -> JwtConfig {
    let mut jwt = JwtConfig::new(auth.jwt_secret.clone());
    if let Some(issuer) = &auth.issuer {
        jwt = jwt.with_issuer(issuer);
    }
    if let Some(audience) = &auth.audience {
        jwt = jwt.with_audience(audience);
    }
    jwt
}

fn apply_layers(router: axum::Router, config: &AppConfig) -> axum::Router {
    let mut app = router
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(cors_layer(config));

    if config.features.enable_tracing {
        app = app.layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        }));
    }

    app.layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins_list()
        .into_iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        if config.is_production() {
            return CorsLayer::new();
        }
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, draining connections");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, draining connections");
        },
    }
}
