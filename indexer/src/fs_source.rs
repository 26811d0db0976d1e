//! Directory tree as a document source: `<root>/<tenant>/<folders..>/<file>`.

use anyhow::{bail, Context, Result};
use docsearch_core::{ContentExtractor, DocumentMeta, DocumentSource, Listing};
use sha1::{Digest, Sha1};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

pub struct FsCorpus {
    root: PathBuf,
    max_bytes: u64,
}

impl FsCorpus {
    pub fn new<P: AsRef<Path>>(root: P, max_bytes: u64) -> Self {
        Self { root: root.as_ref().to_path_buf(), max_bytes }
    }

    /// Metadata for the file at `path`, or None if it sits outside a tenant directory.
    fn describe(&self, path: &Path) -> Result<Option<DocumentMeta>> {
        let rel = path
            .strip_prefix(&self.root)
            .with_context(|| format!("{} outside {}", path.display(), self.root.display()))?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.len() < 2 {
            return Ok(None);
        }

        let stat = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
        let modified = stat
            .modified()
            .map(OffsetDateTime::from)
            .unwrap_or_else(|_| OffsetDateTime::now_utc());
        let created = stat.created().map(OffsetDateTime::from).unwrap_or(modified);

        let mut meta = DocumentMeta::new(parts.join("/"), parts[0].clone(), path.to_string_lossy());
        meta.folder_id = (parts.len() > 2).then(|| parts[1..parts.len() - 1].join("/"));
        meta.mime_type = mime_for(path).to_string();
        meta.size_bytes = stat.len();
        meta.created_at = created;
        meta.updated_at = modified;
        meta.checksum = checksum(path)?;
        Ok(Some(meta))
    }

    /// Describe every path, counting the ones that fail instead of aborting.
    fn describe_all(&self, paths: &[PathBuf]) -> Listing {
        let mut listing = Listing::default();
        for path in paths {
            match self.describe(path) {
                Ok(Some(meta)) => listing.documents.push(meta),
                Ok(None) => debug!(path = %path.display(), "file outside tenant directory skipped"),
                Err(e) => {
                    warn!(path = %path.display(), error = %format!("{e:#}"), "unreadable file skipped");
                    listing.skipped += 1;
                }
            }
        }
        listing
    }
}

/// SHA-1 hex of the file contents, streamed.
fn checksum(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha1::new();
    io::copy(&mut BufReader::new(file), &mut hasher).with_context(|| format!("hashing {}", path.display()))?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|s| s.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("txt" | "text" | "log") => "text/plain",
        Some("md" | "markdown") => "text/markdown",
        Some("html" | "htm") => "text/html",
        Some("csv") => "text/csv",
        Some("json" | "jsonl") => "application/json",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn is_textual(mime: &str) -> bool {
    mime.starts_with("text/") || mime == "application/json"
}

impl DocumentSource for FsCorpus {
    fn documents(&self, tenant: Option<&str>) -> Result<Listing> {
        let start = match tenant {
            Some(t) => self.root.join(t),
            None => self.root.clone(),
        };
        if !start.is_dir() {
            debug!(path = %start.display(), "nothing to list");
            return Ok(Listing::default());
        }

        let mut paths = Vec::new();
        let mut unwalkable = 0usize;
        let walker = WalkDir::new(&start)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => paths.push(entry.into_path()),
                Ok(_) => {}
                Err(e) => {
                    warn!(root = %start.display(), error = %e, "entry could not be walked, skipped");
                    unwalkable += 1;
                }
            }
        }

        let mut listing = self.describe_all(&paths);
        listing.skipped += unwalkable;
        Ok(listing)
    }

    fn exists(&self, meta: &DocumentMeta) -> bool {
        Path::new(&meta.path).is_file()
    }
}

impl ContentExtractor for FsCorpus {
    fn extract(&self, path: &str, mime_type: &str) -> Result<String> {
        if !is_textual(mime_type) {
            bail!("unsupported content type {mime_type}");
        }
        let size = fs::metadata(path).with_context(|| format!("stat {path}"))?.len();
        if size > self.max_bytes {
            bail!("{path} is {size} bytes, limit {}", self.max_bytes);
        }
        fs::read_to_string(path).with_context(|| format!("reading {path}"))
    }
}
