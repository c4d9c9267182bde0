//! Artifact storage.
//!
//! The pipeline reads and writes files through the [`ArtifactStore`] trait:
//! uploaded inputs go into one store, produced artifacts into another, and
//! the retention sweeper works purely on `list_with_age` timestamps. The
//! filesystem-backed [`LocalArtifactStore`] is the production implementation;
//! tests substitute their own.
//!
//! Names handed to a store are bare file names. Anything that looks like a
//! path (separators, parent references) is rejected, so a crafted download
//! request can never escape the store's root directory.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::error::{Result, TahweelError};

/// Durable holder of uploaded inputs and produced outputs.
///
/// `path_of` exposes the on-disk location of an entry so external engine
/// processes can be pointed at it; stores that cannot provide one reject the
/// call.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<()>;
    async fn read(&self, name: &str) -> Result<Vec<u8>>;
    async fn exists(&self, name: &str) -> bool;
    async fn delete(&self, name: &str) -> Result<()>;
    /// All entries paired with their age (now minus last modification).
    async fn list_with_age(&self) -> Result<Vec<(String, Duration)>>;
    /// Filesystem path of an entry, for handing to external processes.
    fn path_of(&self, name: &str) -> Result<PathBuf>;
}

/// Filesystem-backed artifact store rooted at a single directory.
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_of(name)?;
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_of(name)?;
        Ok(tokio::fs::read(&path).await?)
    }

    async fn exists(&self, name: &str) -> bool {
        let Ok(path) = self.path_of(name) else {
            return false;
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.is_file(),
            Err(_) => false,
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_of(name)?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }

    async fn list_with_age(&self) -> Result<Vec<(String, Duration)>> {
        let now = SystemTime::now();
        let mut entries = Vec::new();

        let mut read_dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };

            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or(Duration::ZERO);

            entries.push((name, age));
        }

        Ok(entries)
    }

    fn path_of(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

/// Reject names that are empty or could traverse out of the store root.
fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
        || name == "."
        || name == "..";
    if bad {
        return Err(TahweelError::validation(format!(
            "invalid artifact name: {:?}",
            name
        )));
    }
    Ok(())
}

/// Reduce an untrusted client filename to a safe bare name.
///
/// Takes the final path component and keeps only ASCII alphanumerics, dash,
/// underscore and dot; everything else becomes an underscore.
pub fn sanitize_filename(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original)
        .trim();

    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Build a collision-resistant storage name from a client filename.
///
/// Concurrent uploads of files that share a name (or identical content under
/// different names) must never overwrite each other before the cache
/// establishes content-based sharing, so every upload gets an 8-character
/// unique suffix: `report.pdf` becomes `report_3fa9c1d2.pdf`.
pub fn unique_name(original: &str) -> String {
    let sanitized = sanitize_filename(original);
    let (stem, ext) = match sanitized.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => (stem, ext.to_ascii_lowercase()),
        _ => (sanitized.as_str(), "pdf".to_string()),
    };
    let stem = if stem.is_empty() { "document" } else { stem };

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}.{}", stem, &suffix[..8], ext)
}

/// Lowercased extension of a client filename, if any.
pub fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path()).unwrap();

        store.write("out.docx", b"converted bytes").await.unwrap();
        let read_back = store.read("out.docx").await.unwrap();
        assert_eq!(read_back, b"converted bytes");
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path()).unwrap();

        assert!(!store.exists("gone.pdf").await);
        store.write("gone.pdf", b"x").await.unwrap();
        assert!(store.exists("gone.pdf").await);

        store.delete("gone.pdf").await.unwrap();
        assert!(!store.exists("gone.pdf").await);
    }

    #[tokio::test]
    async fn test_list_with_age_reports_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path()).unwrap();

        store.write("a.pdf", b"a").await.unwrap();
        store.write("b.pdf", b"b").await.unwrap();

        let mut names: Vec<String> = store
            .list_with_age()
            .await
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path()).unwrap();

        assert!(store.path_of("../escape.pdf").is_err());
        assert!(store.path_of("a/b.pdf").is_err());
        assert!(store.path_of("..").is_err());
        assert!(store.path_of("").is_err());
        assert!(store.read("../../etc/passwd").await.is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report final.pdf"), "report_final.pdf");
        assert_eq!(sanitize_filename("/tmp/../x/report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("ملف.pdf"), "___.pdf");
    }

    #[test]
    fn test_unique_name_shape() {
        let name = unique_name("report.PDF");
        assert!(name.starts_with("report_"));
        assert!(name.ends_with(".pdf"));
        assert_ne!(unique_name("report.pdf"), unique_name("report.pdf"));
    }

    #[test]
    fn test_unique_name_defaults() {
        let name = unique_name("");
        assert!(name.starts_with("document_"));
        assert!(name.ends_with(".pdf"));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.PDF").as_deref(), Some("pdf"));
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("trailing."), None);
    }
}
