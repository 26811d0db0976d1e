mod fs_source;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docsearch_core::{EngineConfig, FileBackend, Filter, SearchEngine, SearchFilters};
use fs_source::FsCorpus;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, query and maintain a multi-tenant document index", long_about = None)]
struct Cli {
    /// Directory holding the index and metadata snapshots
    #[arg(long, default_value = "index")]
    index: PathBuf,
    /// Document tree laid out as <root>/<tenant>/<folders>/<file>
    #[arg(long, default_value = "docs")]
    root: PathBuf,
    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FilterArgs {
    #[arg(long)]
    tenant: String,
    #[arg(long)]
    folder: Option<String>,
    /// Accepted content types; repeat for several
    #[arg(long)]
    mime: Vec<String>,
    /// Earliest update time, RFC 3339
    #[arg(long)]
    from: Option<String>,
    /// Latest update time, RFC 3339
    #[arg(long)]
    to: Option<String>,
    #[arg(long)]
    min_size: Option<u64>,
    #[arg(long)]
    max_size: Option<u64>,
    #[arg(long, default_value_t = 10)]
    limit: usize,
    #[arg(long, default_value_t = 0)]
    offset: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-index every document under the root, or one tenant's
    Rebuild {
        #[arg(long)]
        tenant: Option<String>,
    },
    /// BM25-ranked search
    Search {
        query: String,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Search with AND / OR / NOT operators
    Boolean {
        query: String,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Typo-tolerant search
    Fuzzy {
        query: String,
        #[arg(long, default_value_t = 2)]
        max_distance: usize,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Complete a prefix from the index vocabulary
    Suggest {
        prefix: String,
        /// Only draw completions from this tenant's documents
        #[arg(long)]
        tenant: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    Stats,
    /// Drop documents whose files are gone and recompute statistics
    Optimize,
    Remove {
        id: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let corpus = Arc::new(FsCorpus::new(&cli.root, config.max_content_bytes));
    let backend = Arc::new(FileBackend::new(&cli.index));
    let engine = SearchEngine::open(config, backend, corpus.clone(), corpus);

    match cli.command {
        Commands::Rebuild { tenant } => {
            let report = engine.rebuild_index(tenant.as_deref())?;
            engine.save()?;
            print_json(&report)
        }
        Commands::Search { query, filters } => {
            let page = engine.search(&query, &filters.build()?, filters.limit, filters.offset);
            print_json(&page)
        }
        Commands::Boolean { query, filters } => {
            let page = engine.boolean_search(&query, &filters.build()?, filters.limit, filters.offset);
            print_json(&page)
        }
        Commands::Fuzzy { query, max_distance, filters } => {
            let page = engine.fuzzy_search(&query, max_distance, &filters.build()?, filters.limit, filters.offset);
            print_json(&page)
        }
        Commands::Suggest { prefix, tenant, limit } => {
            let terms = match tenant {
                Some(t) => engine.suggest_for_tenant(&prefix, &t, limit),
                None => engine.suggest(&prefix, limit),
            };
            print_json(&terms)
        }
        Commands::Stats => print_json(&engine.stats()),
        Commands::Optimize => {
            let report = engine.optimize_index();
            engine.save()?;
            print_json(&report)
        }
        Commands::Remove { id } => {
            let removed = engine.remove_document(&id);
            if removed {
                engine.save()?;
            } else {
                tracing::warn!(doc_id = %id, "no such document");
            }
            print_json(&removed)
        }
    }
}

impl FilterArgs {
    fn build(&self) -> Result<SearchFilters> {
        let mut filters = SearchFilters::for_tenant(self.tenant.as_str())?;
        if let Some(folder) = &self.folder {
            filters = filters.with(Filter::folder(folder.as_str())?)?;
        }
        if !self.mime.is_empty() {
            filters = filters.with(Filter::mime(self.mime.iter().cloned())?)?;
        }
        if self.from.is_some() || self.to.is_some() {
            let from = self.from.as_deref().map(parse_time).transpose()?;
            let to = self.to.as_deref().map(parse_time).transpose()?;
            filters = filters.with(Filter::date_range(from, to)?)?;
        }
        if self.min_size.is_some() || self.max_size.is_some() {
            filters = filters.with(Filter::size_range(self.min_size, self.max_size)?)?;
        }
        Ok(filters)
    }
}

fn parse_time(raw: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339).with_context(|| format!("invalid RFC 3339 time {raw:?}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
