//! API request handlers.

use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;

use super::error::ApiError;
use super::types::{
    AppState, ConvertResponse, HealthResponse, InfoResponse, OperationResponse, StatsResponse,
};
use crate::core::orchestrator::UploadedFile;
use crate::engine::{EngineKind, Operation};

/// Uploaded files plus the selected engine, pulled out of a multipart body.
struct ConversionForm {
    files: Vec<UploadedFile>,
    engine: EngineKind,
}

async fn read_multipart(mut multipart: Multipart) -> Result<ConversionForm, ApiError> {
    let mut files = Vec::new();
    let mut engine = EngineKind::Standard;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("invalid multipart body: {}", e)))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" | "files" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("unreadable upload: {}", e)))?;
                files.push(UploadedFile::new(file_name, data.to_vec()));
            }
            "engine" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation(format!("unreadable engine field: {}", e)))?;
                // Unknown values fall back to the standard tier.
                engine = EngineKind::parse(value.trim()).unwrap_or(EngineKind::Standard);
            }
            _ => {}
        }
    }

    Ok(ConversionForm { files, engine })
}

/// POST /convert
pub async fn convert_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ConvertResponse>, ApiError> {
    let form = read_multipart(multipart).await?;
    let Some(upload) = form.files.into_iter().next() else {
        // A request with no file still counts against the stats.
        state
            .orchestrator
            .stats()
            .record(false, "unknown", std::time::Duration::ZERO);
        return Err(ApiError::validation("no file was provided"));
    };

    let outcome = state.orchestrator.convert(upload, form.engine).await?;

    let message = if outcome.cached {
        "Conversion completed successfully (served from cache)".to_string()
    } else {
        "Conversion completed successfully".to_string()
    };

    Ok(Json(ConvertResponse {
        success: true,
        message,
        download_url: format!("/download/{}", outcome.artifact),
        engine_used: outcome.engine_used.as_str().to_string(),
        cached: outcome.cached,
        processing_time: if outcome.cached {
            None
        } else {
            Some(format!("{:.2}s", outcome.elapsed.as_secs_f64()))
        },
        filename: outcome.artifact,
    }))
}

async fn run_operation(
    state: AppState,
    op: Operation,
    multipart: Multipart,
    message: &str,
) -> Result<Json<OperationResponse>, ApiError> {
    let form = read_multipart(multipart).await?;
    let outcome = state.orchestrator.run_operation(op, form.files).await?;

    Ok(Json(OperationResponse {
        success: true,
        message: message.to_string(),
        download_url: format!("/download/{}", outcome.artifact),
        filename: outcome.artifact,
    }))
}

/// POST /convert/to-image
pub async fn to_image_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OperationResponse>, ApiError> {
    run_operation(
        state,
        Operation::ToImage,
        multipart,
        "Document rendered to images successfully",
    )
    .await
}

/// POST /convert/from-image
pub async fn from_image_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OperationResponse>, ApiError> {
    run_operation(
        state,
        Operation::FromImage,
        multipart,
        "Images combined into a PDF successfully",
    )
    .await
}

/// POST /merge
pub async fn merge_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OperationResponse>, ApiError> {
    run_operation(
        state,
        Operation::Merge,
        multipart,
        "Documents merged successfully",
    )
    .await
}

/// POST /compress
pub async fn compress_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OperationResponse>, ApiError> {
    run_operation(
        state,
        Operation::Compress,
        multipart,
        "Document compressed successfully",
    )
    .await
}

/// GET /download/{filename}
pub async fn download_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = state
        .orchestrator
        .outputs()
        .read(&filename)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;

    let content_type = content_type_for(&filename);
    let disposition = format!("attachment; filename=\"{}\"", filename);

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

fn content_type_for(filename: &str) -> &'static str {
    match crate::store::extension_of(filename).as_deref() {
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let availability = state.orchestrator.availability();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        standard: availability.standard,
        high_quality: availability.high_quality,
        pdf_tools: state.orchestrator.pdf_tools_available(),
    })
}

/// GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        conversion_stats: state.orchestrator.stats().snapshot(),
        cache_available: state.orchestrator.config().cache.enabled,
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// GET /
pub async fn index_handler() -> Json<InfoResponse> {
    Json(InfoResponse {
        message: "Tahweel conversion service is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        health: "/health".to_string(),
        stats: "/stats".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for_known_extensions() {
        assert_eq!(content_type_for("a.pdf"), "application/pdf");
        assert_eq!(content_type_for("a.zip"), "application/zip");
        assert_eq!(content_type_for("a.PNG"), "image/png");
        assert!(content_type_for("a.docx").contains("wordprocessingml"));
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }
}
