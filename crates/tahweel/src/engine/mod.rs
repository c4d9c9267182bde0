//! Conversion engines.
//!
//! Engines are external collaborators behind the narrow [`ConversionEngine`]
//! trait: they take staged input paths and must leave a finished artifact at
//! the output path. The [`EngineCatalog`] is built once at startup by
//! probing which tool binaries exist; availability is read-only afterwards,
//! which is what makes [`selector::select_engine`] a pure function.
//!
//! The stable:
//! - `Convert` standard tier: LibreOffice (`soffice --headless`)
//! - `Convert` high-quality tier: the `pdf2docx` CLI
//! - `ToImage` / `FromImage` / `Merge` / `Compress`: `mutool` (MuPDF)

pub mod convert;
pub mod error;
pub mod external;
pub mod pdftools;
pub mod selector;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::config::EngineConfig;

pub use error::EngineError;
pub use external::ExternalTool;
pub use selector::{select_engine, Selection};

/// Quality tier of the document conversion operation.
///
/// Orthogonal to [`Operation`]; only `Operation::Convert` carries a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Standard,
    HighQuality,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Standard => "standard",
            EngineKind::HighQuality => "high_quality",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "standard" => Some(EngineKind::Standard),
            "high_quality" => Some(EngineKind::HighQuality),
            _ => None,
        }
    }

    /// The other tier, used for fallback.
    pub fn alternative(&self) -> Self {
        match self {
            EngineKind::Standard => EngineKind::HighQuality,
            EngineKind::HighQuality => EngineKind::Standard,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Convert,
    ToImage,
    FromImage,
    Merge,
    Compress,
}

impl Operation {
    /// Name under which the operation is counted in usage stats. `Convert`
    /// is counted per engine tier instead.
    pub fn stat_name(&self) -> &'static str {
        match self {
            Operation::Convert => "convert",
            Operation::ToImage => "pdf_to_image",
            Operation::FromImage => "image_to_pdf",
            Operation::Merge => "merge_pdf",
            Operation::Compress => "compress_pdf",
        }
    }
}

/// Per-invocation knobs passed through to an engine.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Target container format for document conversion (default "docx").
    pub target_format: Option<String>,
    /// Render resolution for page rasterization.
    pub render_dpi: Option<u32>,
}

/// A pluggable component performing the actual format conversion.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    /// Stable identifier used in logs and error messages.
    fn id(&self) -> &'static str;

    /// Convert `inputs` into a finished artifact at `output`.
    ///
    /// Single-input operations receive a one-element slice; `Merge` and
    /// `FromImage` receive all staged inputs in request order.
    async fn convert(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        options: &EngineOptions,
    ) -> Result<(), EngineError>;
}

/// Availability flags for the quality-tiered conversion engines, computed
/// once at process start and treated as read-only afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineAvailability {
    pub standard: bool,
    pub high_quality: bool,
}

impl EngineAvailability {
    pub fn has(&self, kind: EngineKind) -> bool {
        match kind {
            EngineKind::Standard => self.standard,
            EngineKind::HighQuality => self.high_quality,
        }
    }

    pub fn any(&self) -> bool {
        self.standard || self.high_quality
    }
}

/// Dispatch table from engine kind / operation to engine implementation.
pub struct EngineCatalog {
    convert: HashMap<EngineKind, Arc<dyn ConversionEngine>>,
    operations: HashMap<Operation, Arc<dyn ConversionEngine>>,
    availability: EngineAvailability,
}

impl EngineCatalog {
    /// Assemble a catalog from explicit engine maps. Availability is derived
    /// from which convert tiers are present.
    pub fn new(
        convert: HashMap<EngineKind, Arc<dyn ConversionEngine>>,
        operations: HashMap<Operation, Arc<dyn ConversionEngine>>,
    ) -> Self {
        let availability = EngineAvailability {
            standard: convert.contains_key(&EngineKind::Standard),
            high_quality: convert.contains_key(&EngineKind::HighQuality),
        };
        Self {
            convert,
            operations,
            availability,
        }
    }

    /// Probe tool binaries and build the catalog of everything that is
    /// actually runnable on this host.
    pub async fn probe(config: &EngineConfig) -> Self {
        let run_timeout = Duration::from_secs(config.timeout_secs);
        let mut convert: HashMap<EngineKind, Arc<dyn ConversionEngine>> = HashMap::new();
        let mut operations: HashMap<Operation, Arc<dyn ConversionEngine>> = HashMap::new();

        match probe_tool(
            config.soffice_path.as_deref(),
            &["soffice", "libreoffice"],
            &["TAHWEEL_SOFFICE_PATH", "SOFFICE_PATH"],
            &["--version"],
            run_timeout,
        )
        .await
        {
            Ok(tool) => {
                tracing::info!(
                    "standard conversion engine available: {}",
                    tool.binary().display()
                );
                convert.insert(
                    EngineKind::Standard,
                    Arc::new(convert::SofficeEngine::new(tool)) as Arc<dyn ConversionEngine>,
                );
            }
            Err(e) => tracing::warn!("standard conversion engine unavailable: {}", e),
        }

        match probe_tool(
            config.pdf2docx_path.as_deref(),
            &["pdf2docx"],
            &["TAHWEEL_PDF2DOCX_PATH"],
            &["--version"],
            run_timeout,
        )
        .await
        {
            Ok(tool) => {
                tracing::info!(
                    "high-quality conversion engine available: {}",
                    tool.binary().display()
                );
                convert.insert(
                    EngineKind::HighQuality,
                    Arc::new(convert::Pdf2docxEngine::new(tool)) as Arc<dyn ConversionEngine>,
                );
            }
            Err(e) => tracing::warn!("high-quality conversion engine unavailable: {}", e),
        }

        match probe_tool(
            config.mutool_path.as_deref(),
            &["mutool"],
            &["TAHWEEL_MUTOOL_PATH"],
            &["-v"],
            run_timeout,
        )
        .await
        {
            Ok(tool) => {
                tracing::info!("PDF tool engines available: {}", tool.binary().display());
                operations.insert(
                    Operation::ToImage,
                    Arc::new(pdftools::PdfToImageEngine::new(tool.clone()))
                        as Arc<dyn ConversionEngine>,
                );
                operations.insert(
                    Operation::FromImage,
                    Arc::new(pdftools::ImageToPdfEngine::new(tool.clone())),
                );
                operations.insert(
                    Operation::Merge,
                    Arc::new(pdftools::MergePdfEngine::new(tool.clone())),
                );
                operations.insert(
                    Operation::Compress,
                    Arc::new(pdftools::CompressPdfEngine::new(tool)),
                );
            }
            Err(e) => tracing::warn!("PDF tool engines unavailable: {}", e),
        }

        Self::new(convert, operations)
    }

    pub fn availability(&self) -> EngineAvailability {
        self.availability
    }

    pub fn convert_engine(&self, kind: EngineKind) -> Option<Arc<dyn ConversionEngine>> {
        self.convert.get(&kind).cloned()
    }

    pub fn operation_engine(&self, op: Operation) -> Option<Arc<dyn ConversionEngine>> {
        self.operations.get(&op).cloned()
    }

    pub fn pdf_tools_available(&self) -> bool {
        !self.operations.is_empty()
    }
}

/// Locate a tool and check it actually runs.
async fn probe_tool(
    configured: Option<&std::path::Path>,
    names: &[&str],
    env_vars: &[&str],
    probe_args: &[&str],
    run_timeout: Duration,
) -> std::result::Result<ExternalTool, EngineError> {
    let tool = ExternalTool::locate(configured, names, env_vars, run_timeout)?;
    if tool.probe(probe_args).await {
        Ok(tool)
    } else {
        Err(EngineError::NotFound(format!(
            "{} failed its startup probe",
            tool.binary().display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_round_trip() {
        assert_eq!(EngineKind::parse("standard"), Some(EngineKind::Standard));
        assert_eq!(
            EngineKind::parse("high_quality"),
            Some(EngineKind::HighQuality)
        );
        assert_eq!(EngineKind::parse("turbo"), None);
        assert_eq!(EngineKind::Standard.as_str(), "standard");
    }

    #[test]
    fn test_alternative_flips() {
        assert_eq!(EngineKind::Standard.alternative(), EngineKind::HighQuality);
        assert_eq!(EngineKind::HighQuality.alternative(), EngineKind::Standard);
    }

    #[test]
    fn test_operation_stat_names_match_usage_keys() {
        assert_eq!(Operation::ToImage.stat_name(), "pdf_to_image");
        assert_eq!(Operation::FromImage.stat_name(), "image_to_pdf");
        assert_eq!(Operation::Merge.stat_name(), "merge_pdf");
        assert_eq!(Operation::Compress.stat_name(), "compress_pdf");
    }

    #[test]
    fn test_catalog_availability_from_convert_map() {
        let catalog = EngineCatalog::new(HashMap::new(), HashMap::new());
        assert!(!catalog.availability().any());
        assert!(!catalog.pdf_tools_available());
        assert!(catalog.convert_engine(EngineKind::Standard).is_none());
    }
}
