//! Caller-facing engine.
//!
//! The index and the metadata store sit behind separate read/write locks.
//! Every mutation holds both for its whole duration, always index first, then
//! metadata. Readers take one at a time, so a query may rank a document whose
//! metadata it then finds missing; such documents are filtered out rather
//! than reported.

use crate::config::EngineConfig;
use crate::filter::SearchFilters;
use crate::highlight::Highlighter;
use crate::index::InvertedIndex;
use crate::metadata::{DocumentMeta, MetadataStore};
use crate::persist::{self, SnapshotBackend, SnapshotKind};
use crate::query::{fuzzy_scores, sort_scored, BooleanQuery, SearchBudget};
use crate::scoring;
use crate::source::{ContentExtractor, DocumentSource};
use crate::suggest;
use crate::tokenizer::Tokenizer;
use crate::DocId;
use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: DocId,
    pub score: f64,
    pub snippet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultPage {
    pub hits: Vec<SearchHit>,
    /// Matches after filtering, before paging.
    pub total: usize,
    /// Set when a fuzzy search ran out of budget; hits are partial.
    pub aborted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub doc_count: usize,
    pub term_count: usize,
    pub avg_doc_length: f64,
    pub index_size_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub indexed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OptimizeReport {
    /// Documents whose backing content has gone.
    pub missing_content: usize,
    /// Postings without metadata, or metadata without postings.
    pub orphans: usize,
}

pub struct SearchEngine {
    config: EngineConfig,
    tokenizer: Tokenizer,
    highlighter: Highlighter,
    index: RwLock<InvertedIndex>,
    metadata: RwLock<MetadataStore>,
    backend: Arc<dyn SnapshotBackend>,
    extractor: Arc<dyn ContentExtractor>,
    source: Arc<dyn DocumentSource>,
}

impl SearchEngine {
    /// Load both snapshots from `backend`; missing or unparsable ones start empty.
    pub fn open(
        config: EngineConfig,
        backend: Arc<dyn SnapshotBackend>,
        extractor: Arc<dyn ContentExtractor>,
        source: Arc<dyn DocumentSource>,
    ) -> Self {
        let index: InvertedIndex = persist::load_or_default(backend.as_ref(), SnapshotKind::Index);
        let metadata: MetadataStore = persist::load_or_default(backend.as_ref(), SnapshotKind::Metadata);
        info!(docs = index.doc_count(), terms = index.term_count(), records = metadata.len(), "engine opened");
        let tokenizer = Tokenizer::default();
        Self {
            highlighter: Highlighter::new(tokenizer.clone(), config.snippet_window),
            config,
            tokenizer,
            index: RwLock::new(index),
            metadata: RwLock::new(metadata),
            backend,
            extractor,
            source,
        }
    }

    /// Swap the tokenizer. Existing postings were built with the old one, so
    /// call this before indexing or follow it with a rebuild.
    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.highlighter = Highlighter::new(tokenizer.clone(), self.config.snippet_window);
        self.tokenizer = tokenizer;
        self
    }

    /// Index already-extracted text for `meta`, replacing any previous version.
    /// Returns false, and logs, when the document is rejected.
    pub fn index_document(&self, meta: DocumentMeta, content: &str) -> bool {
        if meta.id.trim().is_empty() || meta.tenant_id.trim().is_empty() {
            warn!(doc_id = %meta.id, tenant = %meta.tenant_id, "document without id or tenant rejected");
            return false;
        }
        let limit = self.config.max_content_bytes;
        if content.len() as u64 > limit {
            warn!(doc_id = %meta.id, bytes = content.len(), limit, "content too large, not indexed");
            return false;
        }

        let terms = self.tokenizer.tokenize(content);
        let id = meta.id.clone();
        {
            let mut index = self.index.write();
            let mut metadata = self.metadata.write();
            index.add_document(&id, &terms);
            metadata.upsert(meta);
        }
        debug!(doc_id = %id, terms = terms.len(), "indexed document");
        true
    }

    /// Extract content through the extractor, then index it.
    pub fn index_from_source(&self, meta: DocumentMeta) -> bool {
        match self.extractor.extract(&meta.path, &meta.mime_type) {
            Ok(text) => self.index_document(meta, &text),
            Err(e) => {
                warn!(doc_id = %meta.id, path = %meta.path, error = %format!("{e:#}"), "extraction failed");
                false
            }
        }
    }

    pub fn remove_document(&self, id: &str) -> bool {
        let mut index = self.index.write();
        let mut metadata = self.metadata.write();
        let had_postings = index.remove_document(id);
        let had_metadata = metadata.remove(id).is_some();
        had_postings || had_metadata
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.read().contains(id)
    }

    pub fn document(&self, id: &str) -> Option<DocumentMeta> {
        self.metadata.read().get(id).cloned()
    }

    /// Documents containing the index term `term` (already tokenized).
    pub fn document_frequency(&self, term: &str) -> usize {
        self.index.read().document_frequency(term)
    }

    /// BM25-ranked search within the filters' tenant.
    pub fn search(&self, query: &str, filters: &SearchFilters, limit: usize, offset: usize) -> ResultPage {
        let terms = self.tokenizer.tokenize(query);
        if terms.is_empty() {
            return ResultPage::default();
        }
        let scores = {
            let index = self.index.read();
            scoring::bm25_scores(&index, &terms, &self.config.bm25)
        };
        let highlight: HashSet<String> = terms.into_iter().collect();
        self.page(scores, &highlight, filters, limit, offset, false)
    }

    /// Flat AND/OR/NOT search. Scores are summed raw term counts and do not
    /// compare with [`search`](Self::search) scores.
    pub fn boolean_search(&self, query: &str, filters: &SearchFilters, limit: usize, offset: usize) -> ResultPage {
        let parsed = BooleanQuery::parse(query, &self.tokenizer);
        if parsed.is_empty() {
            return ResultPage::default();
        }
        let scores = {
            let index = self.index.read();
            parsed.evaluate(&index)
        };
        let highlight: HashSet<String> = parsed.scoring_terms().cloned().collect();
        self.page(scores, &highlight, filters, limit, offset, false)
    }

    /// Edit-distance search bounded by the configured fuzzy timeout.
    pub fn fuzzy_search(
        &self,
        query: &str,
        max_distance: usize,
        filters: &SearchFilters,
        limit: usize,
        offset: usize,
    ) -> ResultPage {
        let budget = self.config.fuzzy_budget();
        self.fuzzy_search_with_budget(query, max_distance, filters, limit, offset, &budget)
    }

    /// Edit-distance search that stops early, returning partial hits flagged
    /// `aborted`, once `budget` is exhausted.
    pub fn fuzzy_search_with_budget(
        &self,
        query: &str,
        max_distance: usize,
        filters: &SearchFilters,
        limit: usize,
        offset: usize,
        budget: &SearchBudget,
    ) -> ResultPage {
        let terms = self.tokenizer.tokenize(query);
        if terms.is_empty() {
            return ResultPage::default();
        }
        let outcome = {
            let index = self.index.read();
            fuzzy_scores(&index, &terms, max_distance, budget, self.config.fuzzy_check_interval)
        };
        if outcome.aborted {
            debug!(query, matched = outcome.scores.len(), "fuzzy search aborted");
        }
        let highlight: HashSet<String> = outcome.matched_terms.into_iter().collect();
        self.page(outcome.scores, &highlight, filters, limit, offset, outcome.aborted)
    }

    /// Completions from the whole vocabulary, across every tenant. Use
    /// [`suggest_for_tenant`](Self::suggest_for_tenant) when callers must not
    /// learn terms from other tenants' documents.
    pub fn suggest(&self, prefix: &str, limit: usize) -> Vec<String> {
        suggest::suggest(&self.index.read(), prefix, limit)
    }

    /// Completions drawn only from `tenant`'s documents, ranked by their
    /// occurrences within that tenant.
    pub fn suggest_for_tenant(&self, prefix: &str, tenant: &str, limit: usize) -> Vec<String> {
        let index = self.index.read();
        let owned: HashSet<DocId> = self.metadata.read().ids_for_tenant(tenant).into_iter().collect();
        suggest::suggest_within(&index, prefix, limit, |id| owned.contains(id))
    }

    /// Rank, filter, then page. Snippets are built for the returned page only,
    /// with no lock held while content is extracted.
    fn page(
        &self,
        scores: HashMap<DocId, f64>,
        highlight: &HashSet<String>,
        filters: &SearchFilters,
        limit: usize,
        offset: usize,
        aborted: bool,
    ) -> ResultPage {
        let ranked = sort_scored(scores);
        let (total, selected) = {
            let metadata = self.metadata.read();
            let mut total = 0usize;
            let mut selected: Vec<(DocId, f64, DocumentMeta)> = Vec::new();
            for (id, score) in ranked {
                let Some(meta) = metadata.get(&id).filter(|m| filters.matches(m)) else {
                    continue;
                };
                if total >= offset && selected.len() < limit {
                    selected.push((id, score, meta.clone()));
                }
                total += 1;
            }
            (total, selected)
        };

        let hits = selected
            .into_iter()
            .map(|(id, score, meta)| {
                let content = self.extractor.extract(&meta.path, &meta.mime_type).ok();
                let snippet = self.highlighter.snippet(content.as_deref(), highlight);
                SearchHit { id, score, snippet }
            })
            .collect();
        ResultPage { hits, total, aborted }
    }

    /// Clear and repopulate from the document source, for one tenant or all.
    /// Individual extraction failures are counted, not fatal.
    pub fn rebuild_index(&self, tenant: Option<&str>) -> Result<RebuildReport> {
        let listing = self
            .source
            .documents(tenant)
            .with_context(|| format!("listing documents for rebuild (tenant {tenant:?})"))?;

        {
            let mut index = self.index.write();
            let mut metadata = self.metadata.write();
            match tenant {
                Some(t) => {
                    for id in metadata.ids_for_tenant(t) {
                        index.remove_document(&id);
                        metadata.remove(&id);
                    }
                }
                None => {
                    index.clear();
                    metadata.clear();
                }
            }
        }

        if listing.skipped > 0 {
            warn!(tenant = ?tenant, skipped = listing.skipped, "source entries could not be listed");
        }
        let mut report = RebuildReport { indexed: 0, failed: listing.skipped };
        for meta in listing.documents {
            if tenant.is_some_and(|t| meta.tenant_id != t) {
                continue;
            }
            if self.index_from_source(meta) {
                report.indexed += 1;
            } else {
                report.failed += 1;
            }
        }
        info!(tenant = ?tenant, indexed = report.indexed, failed = report.failed, "rebuild complete");
        Ok(report)
    }

    /// Drop documents whose content is gone, reconcile the two stores, and
    /// recompute corpus statistics.
    pub fn optimize_index(&self) -> OptimizeReport {
        let records: Vec<DocumentMeta> = self.metadata.read().iter().cloned().collect();
        let gone: HashSet<DocId> = records
            .into_iter()
            .filter(|m| !self.source.exists(m))
            .map(|m| m.id)
            .collect();

        let mut report = OptimizeReport { missing_content: gone.len(), orphans: 0 };
        let mut index = self.index.write();
        let mut metadata = self.metadata.write();
        for id in &gone {
            index.remove_document(id);
            metadata.remove(id);
        }

        let orphan_postings: Vec<DocId> = index.doc_ids().filter(|id| !metadata.contains(id)).cloned().collect();
        for id in &orphan_postings {
            index.remove_document(id);
        }
        let before = metadata.len();
        metadata.retain(|m| index.contains(&m.id));
        report.orphans = orphan_postings.len() + (before - metadata.len());

        index.recompute_statistics();
        let docs = index.doc_count();
        info!(missing = report.missing_content, orphans = report.orphans, docs, "optimize complete");
        report
    }

    pub fn stats(&self) -> IndexStats {
        let index = self.index.read();
        IndexStats {
            doc_count: index.doc_count(),
            term_count: index.term_count(),
            avg_doc_length: index.average_document_length(),
            index_size_bytes: persist::encoded_len(&*index),
        }
    }

    /// Write both snapshots. Encoding happens under shared locks, I/O under none.
    /// On error the in-memory state is untouched and stays queryable.
    pub fn save(&self) -> Result<()> {
        let index_bytes = persist::encode(SnapshotKind::Index, &*self.index.read())?;
        let metadata_bytes = persist::encode(SnapshotKind::Metadata, &*self.metadata.read())?;
        self.backend
            .write(SnapshotKind::Index, &index_bytes)
            .context("saving index snapshot")?;
        self.backend
            .write(SnapshotKind::Metadata, &metadata_bytes)
            .context("saving metadata snapshot")?;
        info!(index_bytes = index_bytes.len(), metadata_bytes = metadata_bytes.len(), "snapshots saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::persist::MemoryBackend;
    use crate::source::MemoryCorpus;

    fn engine_with(corpus: Arc<MemoryCorpus>) -> SearchEngine {
        SearchEngine::open(EngineConfig::default(), Arc::new(MemoryBackend::new()), corpus.clone(), corpus)
    }

    fn acme() -> SearchFilters {
        SearchFilters::for_tenant("acme").unwrap()
    }

    fn meta(id: &str, tenant: &str) -> DocumentMeta {
        DocumentMeta::new(id, tenant, format!("{tenant}/{id}.txt"))
    }

    #[test]
    fn paging_applies_after_filtering() {
        let corpus = Arc::new(MemoryCorpus::new());
        let engine = engine_with(corpus);
        for i in 0..5 {
            let mut m = meta(&format!("d{i}"), "acme");
            m.size_bytes = i * 100;
            assert!(engine.index_document(m, "kernel scheduler"));
        }
        let filters = acme().with(Filter::size_range(Some(100), None).unwrap()).unwrap();
        let page = engine.search("kernel", &filters, 2, 1);
        assert_eq!(page.total, 4);
        let ids: Vec<_> = page.hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["d2", "d3"]);
    }

    #[test]
    fn oversized_content_rejected() {
        let corpus = Arc::new(MemoryCorpus::new());
        let config = EngineConfig { max_content_bytes: 8, ..Default::default() };
        let engine = SearchEngine::open(config, Arc::new(MemoryBackend::new()), corpus.clone(), corpus);
        assert!(!engine.index_document(meta("d1", "acme"), "far too long for the limit"));
        assert!(!engine.contains("d1"));
        assert!(engine.document("d1").is_none());
    }

    #[test]
    fn snippet_comes_from_extracted_content() {
        let corpus = Arc::new(MemoryCorpus::new());
        corpus.insert(meta("d1", "acme"), "The storage engine keeps snapshots.");
        let engine = engine_with(corpus);
        assert!(engine.index_from_source(meta("d1", "acme")));
        let page = engine.search("snapshots", &acme(), 10, 0);
        assert_eq!(page.hits[0].snippet, "…storage engine keeps <em>snapshots.</em>…");
    }

    #[test]
    fn unextractable_content_is_not_indexed() {
        let corpus = Arc::new(MemoryCorpus::new());
        corpus.insert_unextractable(meta("d1", "acme"));
        let engine = engine_with(corpus);
        assert!(!engine.index_from_source(meta("d1", "acme")));
        assert_eq!(engine.stats().doc_count, 0);
    }

    #[test]
    fn optimize_reconciles_orphans() {
        let corpus = Arc::new(MemoryCorpus::new());
        corpus.insert(meta("d1", "acme"), "alpha");
        let engine = engine_with(corpus);
        assert!(engine.index_from_source(meta("d1", "acme")));
        // postings without a metadata record
        engine.index.write().add_document("stray", &["alpha".to_string()]);
        let report = engine.optimize_index();
        assert_eq!(report, OptimizeReport { missing_content: 0, orphans: 1 });
        assert_eq!(engine.stats().doc_count, 1);
        assert_eq!(engine.index.read().document_frequency("alpha"), 1);
    }
}
