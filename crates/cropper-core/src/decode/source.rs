//! Image sources.
//!
//! The engine never opens files or pickers on its own: hosts inject a
//! [`SourceResolver`] that turns a reference string into encoded bytes and
//! optionally advertises where images can come from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::DecodeError;

/// A place the host can offer to pick an image from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOption {
    /// Reference passed back to [`SourceResolver::open`].
    pub reference: String,
    /// Human readable label.
    pub label: String,
}

/// Resolves image references to encoded bytes.
pub trait SourceResolver: Send + Sync {
    /// Sources the host may present. Zero options is valid; how they were
    /// discovered is up to the resolver.
    fn source_options(&self) -> Vec<SourceOption> {
        Vec::new()
    }

    /// Read the encoded image behind `reference`.
    fn open(&self, reference: &str) -> Result<Arc<[u8]>, DecodeError>;
}

/// Reads images from the file system.
///
/// With a root directory, relative references resolve against it and
/// [`source_options`](SourceResolver::source_options) lists the JPEG and PNG
/// files it contains.
#[derive(Debug, Clone, Default)]
pub struct FsResolver {
    root: Option<PathBuf>,
}

impl FsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, reference: &str) -> PathBuf {
        let path = Path::new(reference);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

impl SourceResolver for FsResolver {
    fn source_options(&self) -> Vec<SourceOption> {
        let Some(root) = &self.root else {
            return Vec::new();
        };
        let Ok(entries) = std::fs::read_dir(root) else {
            debug!(root = %root.display(), "source directory not readable");
            return Vec::new();
        };
        let mut options: Vec<SourceOption> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_supported_image(path))
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                Some(SourceOption {
                    reference: name.clone(),
                    label: name,
                })
            })
            .collect();
        options.sort_by(|a, b| a.reference.cmp(&b.reference));
        options
    }

    fn open(&self, reference: &str) -> Result<Arc<[u8]>, DecodeError> {
        let path = self.resolve(reference);
        let bytes = std::fs::read(&path)?;
        debug!(path = %path.display(), bytes = bytes.len(), "source read");
        Ok(bytes.into())
    }
}

/// Keeps encoded images in memory under string keys.
#[derive(Debug, Default)]
pub struct MemoryResolver {
    entries: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` under `reference`, replacing any previous entry.
    pub fn insert(&self, reference: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(reference.into(), bytes.into());
        }
    }

    pub fn remove(&self, reference: &str) -> bool {
        self.entries
            .write()
            .map(|mut entries| entries.remove(reference).is_some())
            .unwrap_or(false)
    }
}

impl SourceResolver for MemoryResolver {
    fn source_options(&self) -> Vec<SourceOption> {
        let Ok(entries) = self.entries.read() else {
            return Vec::new();
        };
        let mut options: Vec<SourceOption> = entries
            .keys()
            .map(|key| SourceOption {
                reference: key.clone(),
                label: key.clone(),
            })
            .collect();
        options.sort_by(|a, b| a.reference.cmp(&b.reference));
        options
    }

    fn open(&self, reference: &str) -> Result<Arc<[u8]>, DecodeError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| DecodeError::IoError(e.to_string()))?;
        entries
            .get(reference)
            .cloned()
            .ok_or_else(|| DecodeError::SourceUnavailable(reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_resolver() {
        let resolver = MemoryResolver::new();
        assert!(resolver.source_options().is_empty());

        resolver.insert("b", vec![2u8, 3]);
        resolver.insert("a", vec![1u8]);
        let options = resolver.source_options();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].reference, "a");
        assert_eq!(&resolver.open("b").unwrap()[..], &[2, 3]);

        assert!(resolver.remove("a"));
        assert!(matches!(
            resolver.open("a"),
            Err(DecodeError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn test_fs_resolver_lists_and_opens() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("photo.JPG"), [0xFF, 0xD8]).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip").unwrap();
        std::fs::write(dir.path().join("scan.png"), [0x89, 0x50]).unwrap();

        let resolver = FsResolver::with_root(dir.path());
        let options = resolver.source_options();
        let references: Vec<&str> = options.iter().map(|o| o.reference.as_str()).collect();
        assert_eq!(references, vec!["photo.JPG", "scan.png"]);

        assert_eq!(&resolver.open("scan.png").unwrap()[..], &[0x89, 0x50]);
    }

    #[test]
    fn test_fs_resolver_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsResolver::with_root(dir.path());
        assert!(matches!(
            resolver.open("missing.jpg"),
            Err(DecodeError::SourceUnavailable(_))
        ));
        assert!(FsResolver::new().source_options().is_empty());
    }
}
