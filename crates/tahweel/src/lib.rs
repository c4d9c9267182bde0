//! Tahweel — document conversion orchestration and caching.
//!
//! Tahweel accepts user-submitted documents, converts them between formats
//! using one of several interchangeable external engines, and returns a
//! downloadable artifact. The crate owns the pipeline around the engines:
//!
//! - **Fingerprint + result cache**: conversions are keyed on content, so
//!   identical bytes under any name hit the cache instead of the engine.
//! - **Engine selection with fallback**: a pure decision over availability
//!   flags probed once at startup; the response always names the engine
//!   that actually ran.
//! - **RTL post-processing**: generated DOCX files get right-aligned
//!   paragraphs and Arabic presentation-form reshaping, best-effort.
//! - **Stats**: thread-safe counters with a durable total that survives
//!   restarts.
//! - **Retention**: a background sweeper deletes stored files past their
//!   retention window.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use tahweel::api::serve;
//!
//! #[tokio::main]
//! async fn main() -> tahweel::Result<()> {
//!     serve("127.0.0.1", 8000).await
//! }
//! ```
//!
//! Or drive the pipeline directly:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tahweel::{EngineKind, Orchestrator, TahweelConfig, UploadedFile};
//!
//! # async fn example() -> tahweel::Result<()> {
//! let config = Arc::new(TahweelConfig::default());
//! let orchestrator = Orchestrator::from_config(config).await?;
//!
//! let upload = UploadedFile::new("report.pdf", std::fs::read("report.pdf")?);
//! let outcome = orchestrator.convert(upload, EngineKind::Standard).await?;
//! println!("artifact: {} (cached: {})", outcome.artifact, outcome.cached);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod cache;
pub mod core;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod postprocess;
pub mod stats;
pub mod store;
pub mod sweeper;

#[cfg(feature = "api")]
pub mod api;

pub use error::{Result, TahweelError};

pub use crate::core::config::{CacheConfig, EngineConfig, PostProcessConfig, TahweelConfig};
pub use crate::core::orchestrator::{ConversionOutcome, OperationOutcome, Orchestrator, UploadedFile};

pub use cache::{CacheBackend, DiskCacheBackend, NullCacheBackend, ResultCache};
pub use engine::{
    select_engine, ConversionEngine, EngineAvailability, EngineCatalog, EngineError, EngineKind,
    EngineOptions, Operation, Selection,
};
pub use fingerprint::{fingerprint_bytes, fingerprint_file, Fingerprint};
pub use postprocess::{ReshapePolicy, RtlPostProcessor};
pub use stats::{StatsAggregator, StatsSnapshot};
pub use store::{ArtifactStore, LocalArtifactStore};
pub use sweeper::{sweep_once, RetentionSweeper};
