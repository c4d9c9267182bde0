//! Plumbing for engines that run as external processes.
//!
//! Every concrete engine in this crate drives a command-line tool: binaries
//! are located through environment overrides and `PATH`, probed once at
//! startup, and invoked headless with a timeout. Engine internals stay out
//! of process, which keeps this pipeline's contract with them narrow.

use std::collections::HashSet;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use super::error::EngineError;

/// How much captured process output to keep in an error message.
const MAX_DIAGNOSTIC_BYTES: usize = 2048;

/// A located external tool plus its invocation timeout.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    binary: PathBuf,
    timeout: Duration,
}

impl ExternalTool {
    /// Locate a tool by candidate binary names.
    ///
    /// Candidates are collected in order from an explicit configured path,
    /// environment variable overrides, and every `PATH` directory; the first
    /// existing regular file wins.
    pub fn locate(
        configured: Option<&Path>,
        names: &[&str],
        env_vars: &[&str],
        run_timeout: Duration,
    ) -> Result<Self, EngineError> {
        for candidate in candidates(configured, names, env_vars) {
            if candidate.is_file() {
                return Ok(Self {
                    binary: candidate,
                    timeout: run_timeout,
                });
            }
        }
        Err(EngineError::NotFound(names.join("/")))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Check the located binary actually runs. Exit status is ignored: some
    /// tools (mutool) exit non-zero when printing usage, and availability
    /// only means "the process can be spawned".
    pub async fn probe(&self, args: &[&str]) -> bool {
        Command::new(&self.binary)
            .args(args)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .output()
            .await
            .is_ok()
    }

    /// Run the tool to completion under the configured timeout.
    pub async fn run(&self, args: Vec<OsString>) -> Result<(), EngineError> {
        let child = Command::new(&self.binary)
            .args(&args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(EngineError::Io(e)),
            Err(_) => return Err(EngineError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if !stderr.trim().is_empty() { stderr } else { stdout };
            let mut detail = detail.trim().to_string();
            if detail.len() > MAX_DIAGNOSTIC_BYTES {
                let mut end = MAX_DIAGNOSTIC_BYTES;
                while !detail.is_char_boundary(end) {
                    end -= 1;
                }
                detail.truncate(end);
            }
            return Err(EngineError::Failed(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status.code().unwrap_or(-1),
                detail
            )));
        }

        Ok(())
    }
}

fn candidates(configured: Option<&Path>, names: &[&str], env_vars: &[&str]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    let mut push_candidate = |path: PathBuf| {
        if seen.insert(path.clone()) {
            candidates.push(path);
        }
    };

    if let Some(path) = configured {
        push_candidate(path.to_path_buf());
    }

    for var in env_vars {
        if let Some(value) = env::var_os(var) {
            if !value.is_empty() {
                push_candidate(PathBuf::from(value));
            }
        }
    }

    if let Some(path_env) = env::var_os("PATH") {
        for dir in env::split_paths(&path_env) {
            for name in names {
                push_candidate(dir.join(name));
                if cfg!(target_os = "windows") {
                    push_candidate(dir.join(format!("{}.exe", name)));
                }
            }
        }
    }

    candidates
}

/// Require a non-empty file at `path` after a tool claims success.
pub fn ensure_output(path: &Path, tool: &str) -> Result<(), EngineError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => Err(EngineError::EmptyOutput(format!(
            "{} did not produce {}",
            tool,
            path.display()
        ))),
    }
}

/// RAII guard for a scratch directory used during one engine invocation.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub async fn new(prefix: &str) -> Result<Self, EngineError> {
        let path = env::temp_dir().join(format!("tahweel_{}_{}", prefix, uuid::Uuid::new_v4().simple()));
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        // Best-effort cleanup; Drop cannot be async.
        let path = self.path.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = tokio::fs::remove_dir_all(&path).await;
            });
        } else {
            let _ = std::fs::remove_dir_all(&path);
        }
    }
}
