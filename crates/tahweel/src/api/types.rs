//! API request and response types.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::core::orchestrator::Orchestrator;
use crate::stats::StatsSnapshot;

/// API server size limit configuration.
#[derive(Debug, Clone, Copy)]
pub struct ApiSizeLimits {
    /// Maximum size of the entire request body in bytes.
    pub max_request_body_bytes: usize,
}

impl Default for ApiSizeLimits {
    fn default() -> Self {
        Self::from_mb(32)
    }
}

impl ApiSizeLimits {
    pub fn new(max_request_body_bytes: usize) -> Self {
        Self {
            max_request_body_bytes,
        }
    }

    pub fn from_mb(max_request_body_mb: usize) -> Self {
        Self {
            max_request_body_bytes: max_request_body_mb * 1024 * 1024,
        }
    }
}

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub started_at: Instant,
}

/// Response to a document conversion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub success: bool,
    pub message: String,
    /// Name of the produced artifact.
    pub filename: String,
    /// The engine that actually ran; differs from the requested engine
    /// after a fallback.
    pub engine_used: String,
    pub download_url: String,
    pub cached: bool,
    /// Wall-clock processing time, omitted for cache hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<String>,
}

/// Response to the uncached operations (to-image, from-image, merge,
/// compress).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub download_url: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Standard conversion engine availability.
    pub standard: bool,
    /// High-quality conversion engine availability.
    pub high_quality: bool,
    /// mutool-backed operations availability.
    pub pdf_tools: bool,
}

/// Usage statistics response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub conversion_stats: StatsSnapshot,
    pub cache_available: bool,
    pub uptime_secs: u64,
}

/// Service info response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    pub message: String,
    pub version: String,
    pub health: String,
    pub stats: String,
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: u16,
}
