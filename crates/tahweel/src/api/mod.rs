//! REST API server for the conversion service.
//!
//! An Axum-based HTTP server exposing the pipeline:
//!
//! - `POST /convert` — convert an uploaded document (multipart `file`,
//!   optional `engine` = `standard` | `high_quality`)
//! - `POST /convert/to-image` — rasterize a PDF into a zip of page images
//! - `POST /convert/from-image` — assemble uploaded images into one PDF
//! - `POST /merge` — merge two or more PDFs
//! - `POST /compress` — rewrite a PDF with garbage collection and deflation
//! - `GET /download/{filename}` — download a produced artifact
//! - `GET /health` — engine availability
//! - `GET /stats` — usage statistics
//! - `GET /` — service info
//!
//! # Examples
//!
//! ```bash
//! # Convert with the default engine
//! curl -F "file=@document.pdf" http://localhost:8000/convert
//!
//! # Request the high-quality engine
//! curl -F "file=@document.pdf" -F "engine=high_quality" http://localhost:8000/convert
//!
//! # Merge
//! curl -F "file=@a.pdf" -F "file=@b.pdf" http://localhost:8000/merge
//!
//! # Fetch the result
//! curl -O http://localhost:8000/download/document_3fa9c1d2.docx
//! ```

mod error;
mod handlers;
mod server;
mod types;

pub use error::ApiError;
pub use server::{create_router, serve, serve_with_config, ApiSizeLimits};
pub use types::{
    AppState, ConvertResponse, ErrorResponse, HealthResponse, InfoResponse, OperationResponse,
    StatsResponse,
};
