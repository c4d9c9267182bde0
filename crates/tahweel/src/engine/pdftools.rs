//! PDF tool engines backed by `mutool` (MuPDF).
//!
//! One binary covers all four uncached operations: page rasterization,
//! image-to-PDF assembly, merging, and compaction. Page images are bundled
//! into a zip because the boundary returns a single downloadable artifact.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use zip::write::SimpleFileOptions;

use super::error::EngineError;
use super::external::{ensure_output, ExternalTool, ScratchDir};
use super::{ConversionEngine, EngineOptions};

const DEFAULT_RENDER_DPI: u32 = 144;

/// Rasterize every page of a PDF and bundle the images into a zip.
pub struct PdfToImageEngine {
    tool: ExternalTool,
}

impl PdfToImageEngine {
    pub fn new(tool: ExternalTool) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl ConversionEngine for PdfToImageEngine {
    fn id(&self) -> &'static str {
        "mutool-draw"
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
        let dpi = options.render_dpi.unwrap_or(DEFAULT_RENDER_DPI);

        let scratch = ScratchDir::new("draw").await?;
        let pattern = scratch.path().join("page_%d.png");

        let args = vec![
            OsString::from("draw"),
            OsString::from("-r"),
            OsString::from(dpi.to_string()),
            OsString::from("-o"),
            pattern.as_os_str().to_os_string(),
            input.as_os_str().to_os_string(),
        ];
        self.tool.run(args).await?;

        let pages = collect_pages(scratch.path())?;
        if pages.is_empty() {
            return Err(EngineError::EmptyOutput(format!(
                "{} rendered no pages",
                self.id()
            )));
        }

        let archive = bundle_pages(&pages)?;
        tokio::fs::write(output, archive).await?;
        ensure_output(output, self.id())
    }
}

/// Page files in page order. mutool numbers without zero padding, so the
/// names need a numeric sort, not a lexicographic one.
fn collect_pages(dir: &Path) -> Result<Vec<(u32, PathBuf)>, EngineError> {
    let mut pages = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(number) = name
            .strip_prefix("page_")
            .and_then(|rest| rest.strip_suffix(".png"))
            .and_then(|digits| digits.parse::<u32>().ok())
        else {
            continue;
        };
        pages.push((number, entry.path()));
    }
    pages.sort_by_key(|(number, _)| *number);
    Ok(pages)
}

fn bundle_pages(pages: &[(u32, PathBuf)]) -> Result<Vec<u8>, EngineError> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let zip_options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (number, path) in pages {
        let bytes = std::fs::read(path)?;
        writer
            .start_file(format!("page_{}.png", number), zip_options)
            .map_err(|e| EngineError::Failed(format!("zip write failed: {}", e)))?;
        writer.write_all(&bytes)?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| EngineError::Failed(format!("zip finish failed: {}", e)))?;
    Ok(cursor.into_inner())
}

/// Assemble one PDF out of a sequence of images (`mutool convert`).
pub struct ImageToPdfEngine {
    tool: ExternalTool,
}

impl ImageToPdfEngine {
    pub fn new(tool: ExternalTool) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl ConversionEngine for ImageToPdfEngine {
    fn id(&self) -> &'static str {
        "mutool-convert"
    }

    async fn convert(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        _options: &EngineOptions,
    ) -> Result<(), EngineError> {
        if inputs.is_empty() {
            return Err(EngineError::Failed("no input files".to_string()));
        }

        let mut args = vec![
            OsString::from("convert"),
            OsString::from("-o"),
            output.as_os_str().to_os_string(),
        ];
        args.extend(inputs.iter().map(|p| p.as_os_str().to_os_string()));

        self.tool.run(args).await?;
        ensure_output(output, self.id())
    }
}

/// Concatenate PDFs in request order (`mutool merge`).
pub struct MergePdfEngine {
    tool: ExternalTool,
}

impl MergePdfEngine {
    pub fn new(tool: ExternalTool) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl ConversionEngine for MergePdfEngine {
    fn id(&self) -> &'static str {
        "mutool-merge"
    }

    async fn convert(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        _options: &EngineOptions,
    ) -> Result<(), EngineError> {
        if inputs.len() < 2 {
            return Err(EngineError::Failed(
                "merging needs at least two inputs".to_string(),
            ));
        }

        let mut args = vec![
            OsString::from("merge"),
            OsString::from("-o"),
            output.as_os_str().to_os_string(),
        ];
        args.extend(inputs.iter().map(|p| p.as_os_str().to_os_string()));

        self.tool.run(args).await?;
        ensure_output(output, self.id())
    }
}

/// Rewrite a PDF with maximum garbage collection and stream deflation
/// (`mutool clean -gggg -z`).
pub struct CompressPdfEngine {
    tool: ExternalTool,
}

impl CompressPdfEngine {
    pub fn new(tool: ExternalTool) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl ConversionEngine for CompressPdfEngine {
    fn id(&self) -> &'static str {
        "mutool-clean"
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
            OsString::from("clean"),
            OsString::from("-gggg"),
            OsString::from("-z"),
            input.as_os_str().to_os_string(),
            output.as_os_str().to_os_string(),
        ];
        self.tool.run(args).await?;
        ensure_output(output, self.id())
    }
}
