//! Read-only HTTP surface over the store: composite snapshots, metric
//! rows, history, regimes, alerts, and PXI analytics. Responses are
//! JSON, rate limited, CORS-controlled, and optionally cached in-process
//! with a TTL. Read handlers never mutate pipeline state.

mod alert_routes;
mod analytics_routes;
mod cache;
mod pxi_routes;
mod regime_routes;

pub use cache::ResponseCache;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use pxi_store::Store;
use serde::Serialize;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub database_url: String,
    pub db_pool_min: u32,
    pub db_pool_max: u32,
    pub host: String,
    pub port: u16,
    pub cors_origins: String,
    pub cache_enabled: bool,
    pub cache_ttl_seconds: u64,
    pub rate_limit_max: u32,
    pub rate_limit_window_seconds: u64,
    pub stale_threshold_ms: i64,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL not set")?,
            db_pool_min: std::env::var("DB_POOL_MIN")
                .unwrap_or_else(|_| "1".to_string())
                .parse()?,
            db_pool_max: std::env::var("DB_POOL_MAX")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            cors_origins: std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()),
            cache_enabled: std::env::var("CACHE_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            cache_ttl_seconds: std::env::var("CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()?,
            rate_limit_max: std::env::var("RATE_LIMIT_MAX")
                .unwrap_or_else(|_| "120".to_string())
                .parse()?,
            rate_limit_window_seconds: std::env::var("RATE_LIMIT_WINDOW")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            stale_threshold_ms: std::env::var("STALE_THRESHOLD_MS")
                .unwrap_or_else(|_| "300000".to_string())
                .parse()?,
        };

        if !config.database_url.starts_with("postgres://")
            && !config.database_url.starts_with("postgresql://")
        {
            bail!("DATABASE_URL must be a postgres(ql):// DSN");
        }
        if config.rate_limit_max == 0 || config.rate_limit_window_seconds == 0 {
            bail!("RATE_LIMIT_MAX and RATE_LIMIT_WINDOW must be positive");
        }
        Ok(config)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub cache: Arc<ResponseCache>,
    pub stale_threshold_ms: i64,
}

/// Uniform response envelope.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
}

/// Read-side failures. An unavailable composite is the only condition
/// surfaced with its own message; everything else collapses to a generic
/// 500 after logging.
pub enum AppError {
    BadRequest(String),
    Unavailable(String),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Unavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
            AppError::Internal(error) => {
                tracing::error!("request failed: {:#}", error);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        let body = Json(ApiResponse::<()> { success: false, data: None, error: Some(message) });
        (status, body).into_response()
    }
}

impl From<pxi_core::PxiError> for AppError {
    fn from(e: pxi_core::PxiError) -> Self {
        AppError::Internal(e.into())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(e)
    }
}

/// Fetch-through helper for cacheable JSON payloads.
pub(crate) async fn cached_json<F, Fut>(
    state: &AppState,
    key: &str,
    compute: F,
) -> Result<serde_json::Value, AppError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<serde_json::Value, AppError>>,
{
    if let Some(hit) = state.cache.get(key) {
        return Ok(hit);
    }
    let value = compute().await?;
    state.cache.put(key, value.clone());
    Ok(value)
}

async fn healthz(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(e) => {
            tracing::warn!("health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "store unavailable").into_response()
        }
    }
}

fn cors_layer(origins: &str) -> CorsLayer {
    if origins.trim() == "*" {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }
    let list: Vec<http::HeaderValue> = origins
        .split(',')
        .filter_map(|origin| {
            origin
                .trim()
                .parse()
                .map_err(|_| tracing::warn!("ignoring bad CORS origin {:?}", origin))
                .ok()
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(list))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn build_router(state: AppState, config: &ApiConfig) -> Result<Router> {
    let period = Duration::from_secs_f64(
        config.rate_limit_window_seconds as f64 / config.rate_limit_max as f64,
    );
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .period(period)
            .burst_size(config.rate_limit_max)
            .finish()
            .context("invalid rate limit configuration")?,
    );

    let router = Router::new()
        .route("/healthz", get(healthz))
        .merge(pxi_routes::routes())
        .merge(regime_routes::routes())
        .merge(alert_routes::routes())
        .merge(analytics_routes::routes())
        .layer(GovernorLayer { config: governor_config })
        .layer(cors_layer(&config.cors_origins))
        .with_state(state);

    Ok(router)
}

pub async fn run_server() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
            |_| {
                tracing_subscriber::EnvFilter::new(
                    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                )
            },
        ))
        .init();

    let config = ApiConfig::from_env()?;
    let store = Store::connect(&config.database_url, config.db_pool_min, config.db_pool_max)
        .await
        .context("store connection failed")?;
    store.ping().await.context("store ping failed")?;
    tracing::info!("Store connection OK");

    let cache = Arc::new(ResponseCache::new(
        config.cache_enabled,
        Duration::from_secs(config.cache_ttl_seconds),
    ));

    // Bounded-timer eviction alongside eviction-on-access.
    {
        let cache = Arc::clone(&cache);
        let period = cache.purge_period();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                cache.purge_expired();
            }
        });
    }

    let state = AppState {
        store,
        cache,
        stale_threshold_ms: config.stale_threshold_ms,
    };

    let router = build_router(state, &config)?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("bad HOST/PORT")?;

    tracing::info!("PXI read API listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
