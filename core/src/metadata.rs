use crate::{DocId, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;

/// Attributes of one document. Used for filtering and display, never for ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: DocId,
    pub tenant_id: TenantId,
    pub folder_id: Option<String>,
    pub owner_id: String,
    /// Location of the backing content, handed to the content extractor.
    pub path: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub checksum: String,
}

impl DocumentMeta {
    /// A record with empty optional attributes and both timestamps set to now.
    pub fn new(id: impl Into<DocId>, tenant_id: impl Into<TenantId>, path: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            folder_id: None,
            owner_id: String::new(),
            path: path.into(),
            mime_type: "text/plain".to_string(),
            size_bytes: 0,
            created_at: now,
            updated_at: now,
            checksum: String::new(),
        }
    }
}

/// One record per document id, independent of term data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataStore {
    records: HashMap<DocId, DocumentMeta>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the replaced record, if any.
    pub fn upsert(&mut self, meta: DocumentMeta) -> Option<DocumentMeta> {
        self.records.insert(meta.id.clone(), meta)
    }

    pub fn remove(&mut self, id: &str) -> Option<DocumentMeta> {
        self.records.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&DocumentMeta> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn ids_for_tenant(&self, tenant: &str) -> Vec<DocId> {
        self.records
            .values()
            .filter(|m| m.tenant_id == tenant)
            .map(|m| m.id.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentMeta> {
        self.records.values()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&DocumentMeta) -> bool) {
        self.records.retain(|_, m| keep(m));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
