//! API server setup.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    compress_handler, convert_handler, download_handler, from_image_handler, health_handler,
    index_handler, merge_handler, stats_handler, to_image_handler,
};
use super::types::AppState;
use crate::core::config::TahweelConfig;
use crate::core::orchestrator::Orchestrator;
use crate::error::{Result, TahweelError};
use crate::sweeper::RetentionSweeper;

pub use super::types::ApiSizeLimits;

/// Body limit from the environment, falling back to the configured value.
fn size_limits_from_env(config: &TahweelConfig) -> ApiSizeLimits {
    if let Ok(value) = std::env::var("TAHWEEL_MAX_UPLOAD_SIZE_MB") {
        match value.parse::<usize>() {
            Ok(mb) if mb > 0 => {
                tracing::info!("upload size limit from environment: {} MB", mb);
                return ApiSizeLimits::from_mb(mb);
            }
            _ => {
                tracing::warn!(
                    "ignoring invalid TAHWEEL_MAX_UPLOAD_SIZE_MB='{}' (must be a positive integer)",
                    value
                );
            }
        }
    }

    ApiSizeLimits::from_mb(config.max_upload_mb)
}

/// CORS from `TAHWEEL_CORS_ORIGINS` (comma-separated), permissive otherwise.
fn cors_layer_from_env() -> CorsLayer {
    if let Ok(origins_str) = std::env::var("TAHWEEL_CORS_ORIGINS") {
        let origins: Vec<_> = origins_str
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();

        if !origins.is_empty() {
            tracing::info!("CORS configured with {} explicit allowed origin(s)", origins.len());
            return CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any);
        }
        tracing::warn!("TAHWEEL_CORS_ORIGINS set but empty/invalid, falling back to permissive CORS");
    } else {
        tracing::warn!(
            "CORS allows all origins (default); set TAHWEEL_CORS_ORIGINS for production"
        );
    }

    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the API router with all routes configured.
///
/// Public so the router can be embedded in a larger application.
pub fn create_router(state: AppState, limits: ApiSizeLimits) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/convert", post(convert_handler))
        .route("/convert/to-image", post(to_image_handler))
        .route("/convert/from-image", post(from_image_handler))
        .route("/merge", post(merge_handler))
        .route("/compress", post(compress_handler))
        .route("/download/{filename}", get(download_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .layer(DefaultBodyLimit::max(limits.max_request_body_bytes))
        .layer(RequestBodyLimitLayer::new(limits.max_request_body_bytes))
        .layer(cors_layer_from_env())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the API server with config file discovery.
///
/// Searches for `tahweel.toml` in the current and parent directories; uses
/// defaults when none is found.
pub async fn serve(host: impl AsRef<str>, port: u16) -> Result<()> {
    let config = match TahweelConfig::discover()? {
        Some(config) => {
            tracing::info!("loaded configuration from discovered tahweel.toml");
            config
        }
        None => {
            tracing::info!("no config file found, using defaults");
            TahweelConfig::default()
        }
    };

    serve_with_config(host, port, config).await
}

/// Start the API server with an explicit config.
///
/// Wires up the orchestrator (probing engines once) and the retention
/// sweeper, then serves until the listener is closed.
pub async fn serve_with_config(
    host: impl AsRef<str>,
    port: u16,
    config: TahweelConfig,
) -> Result<()> {
    config.validate()?;

    let ip: IpAddr = host
        .as_ref()
        .parse()
        .map_err(|e| TahweelError::validation(format!("invalid host address: {}", e)))?;

    let limits = size_limits_from_env(&config);
    let config = Arc::new(config);

    let orchestrator = Arc::new(Orchestrator::from_config(config.clone()).await?);

    let sweeper = RetentionSweeper::start(
        vec![orchestrator.uploads().clone(), orchestrator.outputs().clone()],
        config.retention(),
        config.sweep_interval(),
    );

    let state = AppState {
        orchestrator,
        started_at: Instant::now(),
    };
    let app = create_router(state, limits);

    let addr = SocketAddr::new(ip, port);
    tracing::info!("starting Tahweel API server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(TahweelError::Io)?;

    let served = axum::serve(listener, app)
        .await
        .map_err(|e| TahweelError::Other(e.to_string()));

    sweeper.stop().await;
    served
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{NullCacheBackend, ResultCache};
    use crate::engine::EngineCatalog;
    use crate::stats::StatsAggregator;
    use crate::store::{ArtifactStore, LocalArtifactStore};
    use std::collections::HashMap;

    fn test_state(dir: &std::path::Path) -> AppState {
        let mut config = TahweelConfig::default();
        config.upload_dir = dir.join("uploads");
        config.output_dir = dir.join("converted");
        let config = Arc::new(config);

        let uploads: Arc<dyn ArtifactStore> =
            Arc::new(LocalArtifactStore::new(&config.upload_dir).unwrap());
        let outputs: Arc<dyn ArtifactStore> =
            Arc::new(LocalArtifactStore::new(&config.output_dir).unwrap());
        let backend = Arc::new(NullCacheBackend);
        let cache = ResultCache::new(backend.clone(), config.cache_ttl());
        let stats = Arc::new(StatsAggregator::new(backend));
        let catalog = EngineCatalog::new(HashMap::new(), HashMap::new());

        AppState {
            orchestrator: Arc::new(Orchestrator::new(
                config, uploads, outputs, cache, catalog, stats,
            )),
            started_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_create_router() {
        let dir = tempfile::tempdir().unwrap();
        let _router = create_router(test_state(dir.path()), ApiSizeLimits::default());
    }

    #[test]
    #[serial_test::serial]
    fn test_size_limits_default_from_config() {
        std::env::remove_var("TAHWEEL_MAX_UPLOAD_SIZE_MB");
        let limits = size_limits_from_env(&TahweelConfig::default());
        assert_eq!(limits.max_request_body_bytes, 32 * 1024 * 1024);
    }

    #[test]
    #[serial_test::serial]
    fn test_size_limits_env_override() {
        std::env::set_var("TAHWEEL_MAX_UPLOAD_SIZE_MB", "100");
        let limits = size_limits_from_env(&TahweelConfig::default());
        std::env::remove_var("TAHWEEL_MAX_UPLOAD_SIZE_MB");
        assert_eq!(limits.max_request_body_bytes, 100 * 1024 * 1024);
    }

    #[test]
    #[serial_test::serial]
    fn test_size_limits_invalid_env_falls_back() {
        std::env::set_var("TAHWEEL_MAX_UPLOAD_SIZE_MB", "lots");
        let limits = size_limits_from_env(&TahweelConfig::default());
        std::env::remove_var("TAHWEEL_MAX_UPLOAD_SIZE_MB");
        assert_eq!(limits.max_request_body_bytes, 32 * 1024 * 1024);
    }
}
