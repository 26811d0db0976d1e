//! Multi-tenant full-text indexing and retrieval.
//!
//! Plain text flows through the [`tokenizer`] into the [`index`], document
//! attributes live in the [`metadata`] store, and the [`engine`] ties both
//! together behind ranked, boolean, fuzzy and autocomplete queries.

pub mod config;
pub mod engine;
pub mod filter;
pub mod highlight;
pub mod index;
pub mod metadata;
pub mod persist;
pub mod query;
pub mod scoring;
pub mod source;
pub mod suggest;
pub mod tokenizer;

pub type DocId = String;
pub type TenantId = String;

pub use config::EngineConfig;
pub use engine::{IndexStats, OptimizeReport, RebuildReport, ResultPage, SearchEngine, SearchHit};
pub use filter::{Filter, FilterError, SearchFilters};
pub use index::InvertedIndex;
pub use metadata::{DocumentMeta, MetadataStore};
pub use persist::{FileBackend, MemoryBackend, SnapshotBackend, SnapshotKind};
pub use query::{BooleanQuery, SearchBudget};
pub use scoring::Bm25Params;
pub use source::{ContentExtractor, DocumentSource, Listing, MemoryCorpus};
pub use tokenizer::{SnowballStemmer, Stemmer, SuffixStripper, Tokenizer};
