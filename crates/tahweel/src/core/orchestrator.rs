//! Conversion orchestration.
//!
//! One [`Orchestrator`] instance drives every request end to end:
//! validate → fingerprint → cache check → engine invoke → post-process →
//! cache store → input cleanup. The uncached operations (to-image,
//! from-image, merge, compress) share the validate → process → cleanup
//! shape but skip fingerprinting — they are cheap enough, or
//! input-count-variable enough, that caching adds no value.
//!
//! Invariants the orchestrator owns:
//! - stats are recorded exactly once per request, success and failure
//!   alike, cache hits included;
//! - staged inputs are deleted on every exit path once staging happened;
//! - a failing engine never leaves a partial artifact behind;
//! - post-processing and cache stores are best-effort and cannot fail the
//!   request.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{CacheBackend, DiskCacheBackend, NullCacheBackend, ResultCache};
use crate::core::config::TahweelConfig;
use crate::engine::{
    select_engine, ConversionEngine, EngineAvailability, EngineCatalog, EngineKind, EngineOptions,
    Operation,
};
use crate::error::{Result, TahweelError};
use crate::fingerprint::fingerprint_file;
use crate::postprocess::RtlPostProcessor;
use crate::stats::StatsAggregator;
use crate::store::{self, ArtifactStore, LocalArtifactStore};

/// An uploaded file as received at the boundary. Lives for the duration of
/// one orchestrated request; the orchestrator deletes its staged copy before
/// returning.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(original_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            original_name: original_name.into(),
            bytes,
        }
    }
}

/// Result of a document conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    /// Name of the artifact in the output store.
    pub artifact: String,
    /// The engine that actually ran (or whose cached result was served) —
    /// after fallback this differs from the requested engine.
    pub engine_used: EngineKind,
    /// True when the artifact came from the result cache.
    pub cached: bool,
    pub elapsed: Duration,
}

/// Result of an uncached operation.
#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub artifact: String,
    pub elapsed: Duration,
}

/// Drives conversion requests end to end.
pub struct Orchestrator {
    config: Arc<TahweelConfig>,
    uploads: Arc<dyn ArtifactStore>,
    outputs: Arc<dyn ArtifactStore>,
    cache: ResultCache,
    catalog: EngineCatalog,
    stats: Arc<StatsAggregator>,
    postprocessor: RtlPostProcessor,
}

impl Orchestrator {
    pub fn new(
        config: Arc<TahweelConfig>,
        uploads: Arc<dyn ArtifactStore>,
        outputs: Arc<dyn ArtifactStore>,
        cache: ResultCache,
        catalog: EngineCatalog,
        stats: Arc<StatsAggregator>,
    ) -> Self {
        let postprocessor = RtlPostProcessor::new(config.postprocess.reshape);
        Self {
            config,
            uploads,
            outputs,
            cache,
            catalog,
            stats,
            postprocessor,
        }
    }

    /// Build the production wiring: local stores, disk cache (degrading to
    /// the null backend if unavailable), probed engine catalog.
    pub async fn from_config(config: Arc<TahweelConfig>) -> Result<Self> {
        let uploads: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::new(&config.upload_dir)?);
        let outputs: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::new(&config.output_dir)?);

        let backend: Arc<dyn CacheBackend> = if config.cache.enabled {
            match DiskCacheBackend::new(config.cache_dir()) {
                Ok(backend) => Arc::new(backend),
                Err(e) => {
                    tracing::warn!(
                        "cache backend unavailable, every request will recompute: {}",
                        e
                    );
                    Arc::new(NullCacheBackend)
                }
            }
        } else {
            tracing::info!("result cache disabled by configuration");
            Arc::new(NullCacheBackend)
        };

        let cache = ResultCache::new(backend.clone(), config.cache_ttl());
        let stats = Arc::new(StatsAggregator::new(backend));

        let catalog = EngineCatalog::probe(&config.engines).await;
        if !catalog.availability().any() {
            tracing::warn!("no document conversion engine available; conversion requests will be rejected");
        }

        Ok(Self::new(config, uploads, outputs, cache, catalog, stats))
    }

    pub fn config(&self) -> &Arc<TahweelConfig> {
        &self.config
    }

    pub fn stats(&self) -> &Arc<StatsAggregator> {
        &self.stats
    }

    pub fn availability(&self) -> EngineAvailability {
        self.catalog.availability()
    }

    pub fn pdf_tools_available(&self) -> bool {
        self.catalog.pdf_tools_available()
    }

    pub fn uploads(&self) -> &Arc<dyn ArtifactStore> {
        &self.uploads
    }

    pub fn outputs(&self) -> &Arc<dyn ArtifactStore> {
        &self.outputs
    }

    /// Convert a document with the requested engine tier (or its fallback).
    pub async fn convert(
        &self,
        upload: UploadedFile,
        requested: EngineKind,
    ) -> Result<ConversionOutcome> {
        let started = Instant::now();

        // Until an engine is selected, failures are counted as "unknown".
        let mut stat_op: &'static str = "unknown";
        let result = self.convert_inner(upload, requested, &mut stat_op).await;
        let elapsed = started.elapsed();

        self.stats.record(result.is_ok(), stat_op, elapsed);

        result.map(|(artifact, engine_used, cached)| ConversionOutcome {
            artifact,
            engine_used,
            cached,
            elapsed,
        })
    }

    async fn convert_inner(
        &self,
        upload: UploadedFile,
        requested: EngineKind,
        stat_op: &mut &'static str,
    ) -> Result<(String, EngineKind, bool)> {
        validate_convert_upload(&upload, &self.config)?;

        // Availability is fixed for the process lifetime, so selection can
        // run before the cache check and the cache key carries the engine
        // that would actually run.
        let selection = select_engine(requested, self.catalog.availability())?;
        *stat_op = selection.engine.as_str();
        if selection.fallback {
            tracing::warn!(
                "requested engine '{}' unavailable, falling back to '{}'",
                requested,
                selection.engine
            );
        }

        let input_name = store::unique_name(&upload.original_name);
        self.uploads.write(&input_name, &upload.bytes).await?;

        let result = self.convert_staged(&input_name, selection.engine).await;

        // Input cleanup is unconditional once staging happened: the upload
        // is never retained beyond this request, success or failure.
        if let Err(e) = self.uploads.delete(&input_name).await {
            tracing::warn!("failed to remove staged input {}: {}", input_name, e);
        }

        result
    }

    async fn convert_staged(
        &self,
        input_name: &str,
        engine: EngineKind,
    ) -> Result<(String, EngineKind, bool)> {
        let input_path = self.uploads.path_of(input_name)?;
        let fingerprint = fingerprint_file(&input_path).await?;

        if let Some(artifact) = self
            .cache
            .lookup(fingerprint, engine, self.outputs.as_ref())
            .await
        {
            tracing::info!("cache hit for {} via {}", fingerprint, engine);
            return Ok((artifact, engine, true));
        }

        // Identical content already being converted by another request:
        // wait briefly for its result instead of duplicating the work.
        // Recomputing after the wait is still safe — the cache store is
        // last-writer-wins.
        if self.cache.is_processing(fingerprint, engine) {
            if let Some(artifact) = self
                .cache
                .wait_for(fingerprint, engine, self.outputs.as_ref())
                .await
            {
                tracing::info!("joined in-flight conversion of {} via {}", fingerprint, engine);
                return Ok((artifact, engine, true));
            }
        }

        let _processing = self.cache.begin(fingerprint, engine);

        let output_name = replace_extension(input_name, "docx");
        let output_path = self.outputs.path_of(&output_name)?;
        let engine_impl = self
            .catalog
            .convert_engine(engine)
            .ok_or(TahweelError::NoEngineAvailable)?;

        tracing::info!(
            "converting {} with engine '{}'",
            input_name,
            engine
        );

        if let Err(e) = engine_impl
            .convert(&[input_path], &output_path, &EngineOptions::default())
            .await
        {
            // Never leave a partial artifact behind.
            if self.outputs.exists(&output_name).await {
                let _ = self.outputs.delete(&output_name).await;
            }
            return Err(TahweelError::engine_failure(engine.as_str(), e));
        }

        if self.config.postprocess.enabled {
            if let Err(e) = self.postprocessor.apply(&output_path).await {
                tracing::warn!(
                    "post-processing failed for {}, keeping artifact as produced: {}",
                    output_name,
                    e
                );
            }
        }

        self.cache.store(fingerprint, engine, &output_name);

        Ok((output_name, engine, false))
    }

    /// Run one of the uncached operations over the uploaded files.
    pub async fn run_operation(
        &self,
        op: Operation,
        uploads: Vec<UploadedFile>,
    ) -> Result<OperationOutcome> {
        let started = Instant::now();
        let result = self.operation_inner(op, uploads).await;
        let elapsed = started.elapsed();

        self.stats.record(result.is_ok(), op.stat_name(), elapsed);

        result.map(|artifact| OperationOutcome { artifact, elapsed })
    }

    async fn operation_inner(&self, op: Operation, uploads: Vec<UploadedFile>) -> Result<String> {
        validate_operation_uploads(op, &uploads)?;

        let engine = self
            .catalog
            .operation_engine(op)
            .ok_or(TahweelError::NoEngineAvailable)?;

        let mut staged = Vec::with_capacity(uploads.len());
        let mut stage_err = None;
        for upload in &uploads {
            let name = store::unique_name(&upload.original_name);
            match self.uploads.write(&name, &upload.bytes).await {
                Ok(()) => staged.push(name),
                Err(e) => {
                    stage_err = Some(e);
                    break;
                }
            }
        }

        let result = match stage_err {
            Some(e) => Err(e),
            None => self.run_staged_operation(op, engine, &staged).await,
        };

        // Cleanup covers every staged input on both success and failure.
        for name in &staged {
            if let Err(e) = self.uploads.delete(name).await {
                tracing::warn!("failed to remove staged input {}: {}", name, e);
            }
        }

        result
    }

    async fn run_staged_operation(
        &self,
        op: Operation,
        engine: Arc<dyn ConversionEngine>,
        staged: &[String],
    ) -> Result<String> {
        let inputs = staged
            .iter()
            .map(|name| self.uploads.path_of(name))
            .collect::<Result<Vec<PathBuf>>>()?;

        let output_name = operation_output_name(op, staged);
        let output_path = self.outputs.path_of(&output_name)?;

        let options = EngineOptions {
            render_dpi: Some(self.config.engines.render_dpi),
            ..EngineOptions::default()
        };

        tracing::info!("running {} over {} input(s)", op.stat_name(), staged.len());

        if let Err(e) = engine.convert(&inputs, &output_path, &options).await {
            if self.outputs.exists(&output_name).await {
                let _ = self.outputs.delete(&output_name).await;
            }
            return Err(TahweelError::engine_failure(engine.id(), e));
        }

        Ok(output_name)
    }
}

fn validate_convert_upload(upload: &UploadedFile, config: &TahweelConfig) -> Result<()> {
    if upload.bytes.is_empty() {
        return Err(TahweelError::validation("no file content provided"));
    }

    let Some(ext) = store::extension_of(&upload.original_name) else {
        return Err(TahweelError::UnsupportedFormat(
            "file has no extension".to_string(),
        ));
    };
    if !config.accepts_extension(&ext) {
        return Err(TahweelError::UnsupportedFormat(ext));
    }

    Ok(())
}

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

fn validate_operation_uploads(op: Operation, uploads: &[UploadedFile]) -> Result<()> {
    if uploads.is_empty() {
        return Err(TahweelError::validation("no files provided"));
    }
    if uploads.iter().any(|u| u.bytes.is_empty()) {
        return Err(TahweelError::validation("no file content provided"));
    }

    let require_ext = |upload: &UploadedFile, accepted: &[&str]| -> Result<()> {
        match store::extension_of(&upload.original_name) {
            Some(ext) if accepted.contains(&ext.as_str()) => Ok(()),
            Some(ext) => Err(TahweelError::UnsupportedFormat(ext)),
            None => Err(TahweelError::UnsupportedFormat(
                "file has no extension".to_string(),
            )),
        }
    };

    match op {
        Operation::Convert => Err(TahweelError::validation(
            "document conversion is a separate request",
        )),
        Operation::ToImage | Operation::Compress => {
            if uploads.len() != 1 {
                return Err(TahweelError::validation("exactly one PDF file is required"));
            }
            require_ext(&uploads[0], &["pdf"])
        }
        Operation::Merge => {
            if uploads.len() < 2 {
                return Err(TahweelError::validation(
                    "merging requires at least two PDF files",
                ));
            }
            uploads.iter().try_for_each(|u| require_ext(u, &["pdf"]))
        }
        Operation::FromImage => uploads
            .iter()
            .try_for_each(|u| require_ext(u, &IMAGE_EXTENSIONS)),
    }
}

fn replace_extension(name: &str, ext: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, _)) => format!("{}.{}", stem, ext),
        None => format!("{}.{}", name, ext),
    }
}

fn short_suffix() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

fn operation_output_name(op: Operation, staged: &[String]) -> String {
    match op {
        Operation::Convert => replace_extension(&staged[0], "docx"),
        Operation::ToImage => replace_extension(&staged[0], "zip"),
        Operation::FromImage => format!("images_merged_{}.pdf", short_suffix()),
        Operation::Merge => format!("merged_{}.pdf", short_suffix()),
        Operation::Compress => format!("compressed_{}", staged[0]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::engine::EngineError;

    struct MockEngine {
        payload: Vec<u8>,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl MockEngine {
        fn new(payload: &[u8]) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Arc::new(Self {
                    payload: payload.to_vec(),
                    fail: false,
                    calls: calls.clone(),
                }),
                calls,
            )
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                payload: Vec::new(),
                fail: true,
                calls: Arc::new(AtomicUsize::new(0)),
            })
        }
    }

    #[async_trait]
    impl ConversionEngine for MockEngine {
        fn id(&self) -> &'static str {
            "mock"
        }

        async fn convert(
            &self,
            _inputs: &[PathBuf],
            output: &Path,
            _options: &EngineOptions,
        ) -> std::result::Result<(), EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EngineError::Failed("mock failure".to_string()));
            }
            std::fs::write(output, &self.payload)?;
            Ok(())
        }
    }

    struct Fixture {
        orchestrator: Orchestrator,
        _dir: tempfile::TempDir,
    }

    fn fixture_with(
        convert: HashMap<EngineKind, Arc<dyn ConversionEngine>>,
        operations: HashMap<Operation, Arc<dyn ConversionEngine>>,
        postprocess_enabled: bool,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();

        let mut config = TahweelConfig::default();
        config.upload_dir = dir.path().join("uploads");
        config.output_dir = dir.path().join("converted");
        config.postprocess.enabled = postprocess_enabled;
        let config = Arc::new(config);

        let uploads: Arc<dyn ArtifactStore> =
            Arc::new(LocalArtifactStore::new(&config.upload_dir).unwrap());
        let outputs: Arc<dyn ArtifactStore> =
            Arc::new(LocalArtifactStore::new(&config.output_dir).unwrap());

        let backend: Arc<dyn CacheBackend> =
            Arc::new(DiskCacheBackend::new(dir.path().join("cache")).unwrap());
        let cache = ResultCache::new(backend.clone(), config.cache_ttl());
        let stats = Arc::new(StatsAggregator::new(backend));

        let catalog = EngineCatalog::new(convert, operations);
        let orchestrator = Orchestrator::new(config, uploads, outputs, cache, catalog, stats);

        Fixture {
            orchestrator,
            _dir: dir,
        }
    }

    fn standard_only(engine: Arc<dyn ConversionEngine>) -> HashMap<EngineKind, Arc<dyn ConversionEngine>> {
        let mut map: HashMap<EngineKind, Arc<dyn ConversionEngine>> = HashMap::new();
        map.insert(EngineKind::Standard, engine);
        map
    }

    fn upload(name: &str, bytes: &[u8]) -> UploadedFile {
        UploadedFile::new(name, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_convert_success_cleans_input_and_records_success() {
        let (engine, _) = MockEngine::new(b"converted output");
        let fx = fixture_with(standard_only(engine), HashMap::new(), false);

        let outcome = fx
            .orchestrator
            .convert(upload("report.pdf", b"%PDF-1.4 content"), EngineKind::Standard)
            .await
            .unwrap();

        assert!(!outcome.cached);
        assert_eq!(outcome.engine_used, EngineKind::Standard);
        assert!(outcome.artifact.ends_with(".docx"));

        // Artifact round-trips byte-identically.
        let bytes = fx.orchestrator.outputs().read(&outcome.artifact).await.unwrap();
        assert_eq!(bytes, b"converted output");

        // The staged input is gone.
        let leftover = fx.orchestrator.uploads().list_with_age().await.unwrap();
        assert!(leftover.is_empty());

        let snapshot = fx.orchestrator.stats().snapshot();
        assert_eq!(snapshot.total_conversions, 1);
        assert_eq!(snapshot.successful_conversions, 1);
        assert_eq!(snapshot.operation_usage["standard"], 1);
    }

    #[tokio::test]
    async fn test_second_identical_upload_is_cache_hit() {
        let (engine, calls) = MockEngine::new(b"converted output");
        let fx = fixture_with(standard_only(engine), HashMap::new(), false);

        let first = fx
            .orchestrator
            .convert(upload("one.pdf", b"same bytes"), EngineKind::Standard)
            .await
            .unwrap();
        assert!(!first.cached);

        // Same content under a different name: caching is keyed on content.
        let second = fx
            .orchestrator
            .convert(upload("two.pdf", b"same bytes"), EngineKind::Standard)
            .await
            .unwrap();
        assert!(second.cached);
        assert_eq!(second.artifact, first.artifact);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Cache hits still count as successes.
        let snapshot = fx.orchestrator.stats().snapshot();
        assert_eq!(snapshot.successful_conversions, 2);
    }

    #[tokio::test]
    async fn test_deleted_artifact_turns_hit_into_miss() {
        let (engine, calls) = MockEngine::new(b"converted output");
        let fx = fixture_with(standard_only(engine), HashMap::new(), false);

        let first = fx
            .orchestrator
            .convert(upload("one.pdf", b"same bytes"), EngineKind::Standard)
            .await
            .unwrap();

        // Simulate the sweeper removing the artifact under the cache entry.
        fx.orchestrator.outputs().delete(&first.artifact).await.unwrap();

        let second = fx
            .orchestrator
            .convert(upload("one.pdf", b"same bytes"), EngineKind::Standard)
            .await
            .unwrap();
        assert!(!second.cached);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fallback_reports_effective_engine() {
        let (engine, _) = MockEngine::new(b"converted output");
        let fx = fixture_with(standard_only(engine), HashMap::new(), false);

        let outcome = fx
            .orchestrator
            .convert(upload("report.pdf", b"%PDF"), EngineKind::HighQuality)
            .await
            .unwrap();

        assert_eq!(outcome.engine_used, EngineKind::Standard);
        let snapshot = fx.orchestrator.stats().snapshot();
        assert_eq!(snapshot.operation_usage["standard"], 1);
    }

    #[tokio::test]
    async fn test_no_engine_available() {
        let fx = fixture_with(HashMap::new(), HashMap::new(), false);

        let err = fx
            .orchestrator
            .convert(upload("report.pdf", b"%PDF"), EngineKind::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, TahweelError::NoEngineAvailable));

        let snapshot = fx.orchestrator.stats().snapshot();
        assert_eq!(snapshot.failed_conversions, 1);
        assert_eq!(snapshot.operation_usage["unknown"], 1);
    }

    #[tokio::test]
    async fn test_engine_failure_cleans_input_and_records_failure() {
        let fx = fixture_with(standard_only(MockEngine::failing()), HashMap::new(), false);

        let err = fx
            .orchestrator
            .convert(upload("report.pdf", b"%PDF"), EngineKind::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, TahweelError::Engine { .. }));

        // No staged input, no partial artifact.
        assert!(fx.orchestrator.uploads().list_with_age().await.unwrap().is_empty());
        assert!(fx.orchestrator.outputs().list_with_age().await.unwrap().is_empty());

        let snapshot = fx.orchestrator.stats().snapshot();
        assert_eq!(snapshot.failed_conversions, 1);
        assert_eq!(snapshot.operation_usage["standard"], 1);
    }

    #[tokio::test]
    async fn test_empty_submission_rejected() {
        let (engine, calls) = MockEngine::new(b"x");
        let fx = fixture_with(standard_only(engine), HashMap::new(), false);

        let err = fx
            .orchestrator
            .convert(upload("report.pdf", b""), EngineKind::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, TahweelError::Validation { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsupported_extension_rejected() {
        let (engine, _) = MockEngine::new(b"x");
        let fx = fixture_with(standard_only(engine), HashMap::new(), false);

        let err = fx
            .orchestrator
            .convert(upload("malware.exe", b"MZ"), EngineKind::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, TahweelError::UnsupportedFormat(_)));

        let snapshot = fx.orchestrator.stats().snapshot();
        assert_eq!(snapshot.operation_usage["unknown"], 1);
    }

    #[tokio::test]
    async fn test_postprocess_failure_does_not_fail_conversion() {
        // The mock writes bytes that are not a DOCX container, so the
        // post-processor fails; the conversion must still succeed with the
        // unprocessed artifact.
        let (engine, _) = MockEngine::new(b"not a zip container");
        let fx = fixture_with(standard_only(engine), HashMap::new(), true);

        let outcome = fx
            .orchestrator
            .convert(upload("report.pdf", b"%PDF"), EngineKind::Standard)
            .await
            .unwrap();

        let bytes = fx.orchestrator.outputs().read(&outcome.artifact).await.unwrap();
        assert_eq!(bytes, b"not a zip container");
    }

    #[tokio::test]
    async fn test_merge_requires_two_files() {
        let (engine, calls) = MockEngine::new(b"merged pdf");
        let mut operations: HashMap<Operation, Arc<dyn ConversionEngine>> = HashMap::new();
        operations.insert(Operation::Merge, engine);
        let fx = fixture_with(HashMap::new(), operations, false);

        let err = fx
            .orchestrator
            .run_operation(Operation::Merge, vec![upload("only.pdf", b"%PDF")])
            .await
            .unwrap_err();
        assert!(matches!(err, TahweelError::Validation { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // No artifact created, failure recorded under the operation name.
        assert!(fx.orchestrator.outputs().list_with_age().await.unwrap().is_empty());
        let snapshot = fx.orchestrator.stats().snapshot();
        assert_eq!(snapshot.successful_conversions, 0);
        assert_eq!(snapshot.operation_usage["merge_pdf"], 1);
    }

    #[tokio::test]
    async fn test_merge_success_cleans_all_inputs() {
        let (engine, _) = MockEngine::new(b"merged pdf");
        let mut operations: HashMap<Operation, Arc<dyn ConversionEngine>> = HashMap::new();
        operations.insert(Operation::Merge, engine);
        let fx = fixture_with(HashMap::new(), operations, false);

        let outcome = fx
            .orchestrator
            .run_operation(
                Operation::Merge,
                vec![upload("a.pdf", b"%PDF a"), upload("b.pdf", b"%PDF b")],
            )
            .await
            .unwrap();

        assert!(outcome.artifact.starts_with("merged_"));
        assert!(outcome.artifact.ends_with(".pdf"));
        assert!(fx.orchestrator.outputs().exists(&outcome.artifact).await);
        assert!(fx.orchestrator.uploads().list_with_age().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_from_image_rejects_non_image() {
        let (engine, _) = MockEngine::new(b"pdf");
        let mut operations: HashMap<Operation, Arc<dyn ConversionEngine>> = HashMap::new();
        operations.insert(Operation::FromImage, engine);
        let fx = fixture_with(HashMap::new(), operations, false);

        let err = fx
            .orchestrator
            .run_operation(Operation::FromImage, vec![upload("doc.pdf", b"%PDF")])
            .await
            .unwrap_err();
        assert!(matches!(err, TahweelError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_operation_without_engine_is_unavailable() {
        let fx = fixture_with(HashMap::new(), HashMap::new(), false);

        let err = fx
            .orchestrator
            .run_operation(Operation::Compress, vec![upload("a.pdf", b"%PDF")])
            .await
            .unwrap_err();
        assert!(matches!(err, TahweelError::NoEngineAvailable));
    }

    #[tokio::test]
    async fn test_operation_failure_cleans_inputs() {
        let mut operations: HashMap<Operation, Arc<dyn ConversionEngine>> = HashMap::new();
        operations.insert(Operation::Compress, MockEngine::failing() as Arc<dyn ConversionEngine>);
        let fx = fixture_with(HashMap::new(), operations, false);

        let err = fx
            .orchestrator
            .run_operation(Operation::Compress, vec![upload("a.pdf", b"%PDF")])
            .await
            .unwrap_err();
        assert!(matches!(err, TahweelError::Engine { .. }));
        assert!(fx.orchestrator.uploads().list_with_age().await.unwrap().is_empty());
    }

    #[test]
    fn test_replace_extension() {
        assert_eq!(replace_extension("a_1b2c3d4.pdf", "docx"), "a_1b2c3d4.docx");
        assert_eq!(replace_extension("noext", "zip"), "noext.zip");
    }

    #[test]
    fn test_operation_output_names() {
        let staged = vec!["doc_ab12cd34.pdf".to_string()];
        assert_eq!(
            operation_output_name(Operation::ToImage, &staged),
            "doc_ab12cd34.zip"
        );
        assert_eq!(
            operation_output_name(Operation::Compress, &staged),
            "compressed_doc_ab12cd34.pdf"
        );
        assert!(operation_output_name(Operation::Merge, &staged).starts_with("merged_"));
        assert!(
            operation_output_name(Operation::FromImage, &staged).starts_with("images_merged_")
        );
    }
}
