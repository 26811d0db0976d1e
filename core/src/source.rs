//! Collaborators the engine consumes but does not implement: content
//! extraction and enumeration of the documents to (re)index.

use crate::metadata::DocumentMeta;
use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Turns stored content into plain text. An `Err` means the content is
/// unextractable (unsupported, oversized, corrupt or gone).
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, path: &str, mime_type: &str) -> Result<String>;
}

/// Documents enumerated by a [`DocumentSource`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub documents: Vec<DocumentMeta>,
    /// Entries the source saw but could not describe. Counted as rebuild failures.
    pub skipped: usize,
}

/// Enumerates documents for bulk re-indexing and reports whether their
/// backing content still exists.
pub trait DocumentSource: Send + Sync {
    /// All documents, or only those of `tenant`. An `Err` means nothing could
    /// be listed at all; individual bad entries go to [`Listing::skipped`].
    fn documents(&self, tenant: Option<&str>) -> Result<Listing>;
    fn exists(&self, meta: &DocumentMeta) -> bool;
}

/// In-memory corpus serving as both extractor and source, keyed by path.
#[derive(Debug, Default)]
pub struct MemoryCorpus {
    entries: RwLock<HashMap<String, (DocumentMeta, Option<String>)>>,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, meta: DocumentMeta, content: impl Into<String>) {
        let path = meta.path.clone();
        self.entries.write().insert(path, (meta, Some(content.into())));
    }

    /// Register a document whose content cannot be extracted.
    pub fn insert_unextractable(&self, meta: DocumentMeta) {
        let path = meta.path.clone();
        self.entries.write().insert(path, (meta, None));
    }

    pub fn remove(&self, path: &str) -> bool {
        self.entries.write().remove(path).is_some()
    }
}

impl ContentExtractor for MemoryCorpus {
    fn extract(&self, path: &str, _mime_type: &str) -> Result<String> {
        match self.entries.read().get(path) {
            Some((_, Some(text))) => Ok(text.clone()),
            Some((_, None)) => Err(anyhow!("content at {path} is not extractable")),
            None => Err(anyhow!("no content at {path}")),
        }
    }
}

impl DocumentSource for MemoryCorpus {
    fn documents(&self, tenant: Option<&str>) -> Result<Listing> {
        let mut docs: Vec<DocumentMeta> = self
            .entries
            .read()
            .values()
            .map(|(meta, _)| meta)
            .filter(|meta| tenant.map_or(true, |t| meta.tenant_id == t))
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(Listing { documents: docs, skipped: 0 })
    }

    fn exists(&self, meta: &DocumentMeta) -> bool {
        self.entries.read().contains_key(&meta.path)
    }
}
