//! Template loaders.
//!
//! A loader turns a template identifier into its complete text. Absence is
//! reported as `Ok(None)`; read failures as `TemplateError::Load`. A loader
//! never returns partially read text.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{TemplateError, TemplateResult};

/// Source of raw template text
#[async_trait]
pub trait TemplateLoader: Send + Sync {
    /// Load the full text for `id`, or `None` if it does not exist
    async fn load(&self, id: &str) -> TemplateResult<Option<String>>;

    /// Loader name used in log fields
    fn name(&self) -> &'static str;
}

/// Loads templates from the local filesystem, decoded as UTF-8.
///
/// Identifiers are paths, resolved against `root` when one is set.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    root: Option<PathBuf>,
}

impl FileLoader {
    /// Loader that treats identifiers as paths relative to the working directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader that resolves identifiers under `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, id: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(id),
            None => Path::new(id).to_path_buf(),
        }
    }
}

#[async_trait]
impl TemplateLoader for FileLoader {
    async fn load(&self, id: &str) -> TemplateResult<Option<String>> {
        let path = self.resolve(id);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TemplateError::load(id, e)),
        };

        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| TemplateError::load(id, io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// In-memory loader for embedded templates.
///
/// Counts every `load` call, which makes it handy for observing cache hits.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    templates: DashMap<String, String>,
    loads: AtomicUsize,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration
    pub fn with_template(self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(id, text);
        self
    }

    /// Register or replace a template
    pub fn insert(&self, id: impl Into<String>, text: impl Into<String>) {
        self.templates.insert(id.into(), text.into());
    }

    /// Unregister a template
    pub fn remove(&self, id: &str) -> bool {
        self.templates.remove(id).is_some()
    }

    /// Number of `load` calls so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TemplateLoader for MemoryLoader {
    async fn load(&self, id: &str) -> TemplateResult<Option<String>> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(self.templates.get(id).map(|t| t.value().clone()))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
