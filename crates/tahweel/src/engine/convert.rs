//! Document conversion engines (quality-tiered).
//!
//! The standard tier drives LibreOffice in headless mode; the high-quality
//! tier drives the `pdf2docx` CLI, which reconstructs text flow and tables
//! more faithfully for PDFs but is slower and a heavier install.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::error::EngineError;
use super::external::{ensure_output, ExternalTool, ScratchDir};
use super::{ConversionEngine, EngineOptions};

/// LibreOffice headless conversion (`soffice --headless --convert-to`).
pub struct SofficeEngine {
    tool: ExternalTool,
}

impl SofficeEngine {
    pub fn new(tool: ExternalTool) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl ConversionEngine for SofficeEngine {
    fn id(&self) -> &'static str {
        "soffice"
    }

    async fn convert(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        options: &EngineOptions,
    ) -> Result<(), EngineError> {
        let input = inputs
            .first()
            .ok_or_else(|| EngineError::Failed("no input file".to_string()))?;
        let target = options.target_format.as_deref().unwrap_or("docx");

        // soffice picks its own output name inside --outdir, so convert into
        // a scratch directory and move the result to where it belongs.
        let scratch = ScratchDir::new("soffice").await?;

        let args = vec![
            OsString::from("--headless"),
            OsString::from("--convert-to"),
            OsString::from(target),
            OsString::from("--outdir"),
            scratch.path().as_os_str().to_os_string(),
            input.as_os_str().to_os_string(),
        ];
        self.tool.run(args).await?;

        let stem = input
            .file_stem()
            .ok_or_else(|| EngineError::Failed("input has no file stem".to_string()))?;
        let produced = scratch
            .path()
            .join(format!("{}.{}", stem.to_string_lossy(), target));
        ensure_output(&produced, self.id())?;

        // Scratch lives under the system temp dir, which may be a different
        // filesystem than the artifact store, so rename is not an option.
        tokio::fs::copy(&produced, output).await?;
        ensure_output(output, self.id())
    }
}

/// `pdf2docx` CLI conversion (PDF to DOCX only).
pub struct Pdf2docxEngine {
    tool: ExternalTool,
}

impl Pdf2docxEngine {
    pub fn new(tool: ExternalTool) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl ConversionEngine for Pdf2docxEngine {
    fn id(&self) -> &'static str {
        "pdf2docx"
    }

    async fn convert(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        _options: &EngineOptions,
    ) -> Result<(), EngineError> {
        let input = inputs
            .first()
            .ok_or_else(|| EngineError::Failed("no input file".to_string()))?;

        let args = vec![
            OsString::from("convert"),
            input.as_os_str().to_os_string(),
            output.as_os_str().to_os_string(),
        ];
        self.tool.run(args).await?;
        ensure_output(output, self.id())
    }
}
