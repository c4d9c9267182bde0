//! Configuration loading and management.
//!
//! [`TahweelConfig`] can be created programmatically, loaded from an
//! explicit TOML file, or discovered as `tahweel.toml` in the current
//! directory or any of its ancestors. Every field has a default so a bare
//! `[cache]`-less file (or none at all) yields a working service.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TahweelError};
use crate::postprocess::ReshapePolicy;

/// File name searched for by [`TahweelConfig::discover`].
const CONFIG_FILE_NAME: &str = "tahweel.toml";

/// Main service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TahweelConfig {
    /// Directory for staged uploads.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Directory for produced artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Accepted upload extensions (lowercase, without the dot).
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,

    /// How long stored files live before the sweeper removes them.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// How often the sweeper runs.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub engines: EngineConfig,

    #[serde(default)]
    pub postprocess: PostProcessConfig,
}

/// Result cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache directory; defaults to `.tahweel/cache` under the current
    /// directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Entry time-to-live in seconds.
    ///
    /// Kept in step with `retention_secs` by configuration: an entry that
    /// outlives its artifact is only ever a wasted lookup (the store
    /// cross-check turns it into a miss), but a TTL far above the retention
    /// window means most entries are dead weight.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

/// External engine binaries and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Explicit path to the LibreOffice binary (otherwise env/PATH lookup).
    #[serde(default)]
    pub soffice_path: Option<PathBuf>,

    /// Explicit path to the pdf2docx CLI.
    #[serde(default)]
    pub pdf2docx_path: Option<PathBuf>,

    /// Explicit path to mutool.
    #[serde(default)]
    pub mutool_path: Option<PathBuf>,

    /// Per-invocation timeout in seconds.
    #[serde(default = "default_engine_timeout_secs")]
    pub timeout_secs: u64,

    /// Render resolution for PDF-to-image.
    #[serde(default = "default_render_dpi")]
    pub render_dpi: u32,
}

/// Post-processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostProcessConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub reshape: ReshapePolicy,
}

fn default_true() -> bool {
    true
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("data/uploads")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/converted")
}

fn default_allowed_extensions() -> Vec<String> {
    ["pdf", "png", "jpg", "jpeg"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_max_upload_mb() -> usize {
    32
}

fn default_retention_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    600
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_engine_timeout_secs() -> u64 {
    300
}

fn default_render_dpi() -> u32 {
    144
}

impl Default for TahweelConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
            allowed_extensions: default_allowed_extensions(),
            max_upload_mb: default_max_upload_mb(),
            retention_secs: default_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            cache: CacheConfig::default(),
            engines: EngineConfig::default(),
            postprocess: PostProcessConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            soffice_path: None,
            pdf2docx_path: None,
            mutool_path: None,
            timeout_secs: default_engine_timeout_secs(),
            render_dpi: default_render_dpi(),
        }
    }
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reshape: ReshapePolicy::default(),
        }
    }
}

impl TahweelConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            TahweelError::validation(format!("invalid config file {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Search for `tahweel.toml` in the current directory and its ancestors.
    pub fn discover() -> Result<Option<Self>> {
        let mut dir = std::env::current_dir()?;
        loop {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Ok(Some(Self::from_toml_file(candidate)?));
            }
            if !dir.pop() {
                return Ok(None);
            }
        }
    }

    /// Sanity-check values and warn about clock skew between the cache TTL
    /// and the retention window.
    pub fn validate(&self) -> Result<()> {
        if self.allowed_extensions.is_empty() {
            return Err(TahweelError::validation(
                "allowed_extensions must not be empty",
            ));
        }
        if self.max_upload_mb == 0 {
            return Err(TahweelError::validation("max_upload_mb must be > 0"));
        }
        if self.retention_secs == 0 || self.sweep_interval_secs == 0 {
            return Err(TahweelError::validation(
                "retention_secs and sweep_interval_secs must be > 0",
            ));
        }

        if self.cache.ttl_secs > self.retention_secs {
            tracing::warn!(
                "cache TTL ({}s) exceeds artifact retention ({}s); entries will outlive their artifacts",
                self.cache.ttl_secs,
                self.retention_secs
            );
        }

        Ok(())
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }

    /// Effective cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".tahweel").join("cache"))
    }

    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.allowed_extensions.iter().any(|e| e == ext)
    }
}
