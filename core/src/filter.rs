//! Post-scoring metadata predicates.
//!
//! Every query is bound to exactly one tenant through [`SearchFilters`]; the
//! remaining predicates are optional and combined with AND.

use crate::metadata::DocumentMeta;
use crate::TenantId;
use std::collections::BTreeSet;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("tenant id must not be empty")]
    EmptyTenant,
    #[error("folder id must not be empty")]
    EmptyFolder,
    #[error("mime filter needs at least one type")]
    EmptyMimeSet,
    #[error("range filter needs at least one bound")]
    UnboundedRange,
    #[error("date range starts after it ends ({from} > {to})")]
    InvertedDateRange { from: OffsetDateTime, to: OffsetDateTime },
    #[error("size range minimum {min} exceeds maximum {max}")]
    InvertedSizeRange { min: u64, max: u64 },
    #[error("query is already bound to tenant {0}")]
    TenantAlreadyBound(TenantId),
}

/// A single predicate over [`DocumentMeta`]. Construct through the checked
/// constructors so malformed ranges never reach query time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Tenant(TenantId),
    Folder(String),
    /// Inclusive bounds on `updated_at`.
    DateRange {
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    },
    Mime(BTreeSet<String>),
    /// Inclusive bounds on `size_bytes`.
    SizeRange { min: Option<u64>, max: Option<u64> },
}

impl Filter {
    pub fn tenant(id: impl Into<TenantId>) -> Result<Self, FilterError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(FilterError::EmptyTenant);
        }
        Ok(Filter::Tenant(id))
    }

    pub fn folder(id: impl Into<String>) -> Result<Self, FilterError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(FilterError::EmptyFolder);
        }
        Ok(Filter::Folder(id))
    }

    pub fn date_range(from: Option<OffsetDateTime>, to: Option<OffsetDateTime>) -> Result<Self, FilterError> {
        match (from, to) {
            (None, None) => Err(FilterError::UnboundedRange),
            (Some(from), Some(to)) if from > to => Err(FilterError::InvertedDateRange { from, to }),
            _ => Ok(Filter::DateRange { from, to }),
        }
    }

    pub fn mime<I, S>(types: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = types
            .into_iter()
            .map(|s| s.into().trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if set.is_empty() {
            return Err(FilterError::EmptyMimeSet);
        }
        Ok(Filter::Mime(set))
    }

    pub fn size_range(min: Option<u64>, max: Option<u64>) -> Result<Self, FilterError> {
        match (min, max) {
            (None, None) => Err(FilterError::UnboundedRange),
            (Some(min), Some(max)) if min > max => Err(FilterError::InvertedSizeRange { min, max }),
            _ => Ok(Filter::SizeRange { min, max }),
        }
    }

    pub fn matches(&self, meta: &DocumentMeta) -> bool {
        match self {
            Filter::Tenant(id) => meta.tenant_id == *id,
            Filter::Folder(id) => meta.folder_id.as_deref() == Some(id.as_str()),
            Filter::DateRange { from, to } => {
                from.map_or(true, |f| meta.updated_at >= f) && to.map_or(true, |t| meta.updated_at <= t)
            }
            Filter::Mime(types) => types.contains(&meta.mime_type.to_ascii_lowercase()),
            Filter::SizeRange { min, max } => {
                min.map_or(true, |m| meta.size_bytes >= m) && max.map_or(true, |m| meta.size_bytes <= m)
            }
        }
    }
}

/// Tenant binding plus optional predicates, applied after ranking and before paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilters {
    tenant: TenantId,
    rest: Vec<Filter>,
}

impl SearchFilters {
    pub fn for_tenant(tenant: impl Into<TenantId>) -> Result<Self, FilterError> {
        let tenant = tenant.into();
        if tenant.trim().is_empty() {
            return Err(FilterError::EmptyTenant);
        }
        Ok(Self { tenant, rest: Vec::new() })
    }

    /// Add a predicate. A second tenant binding is rejected unless it names the same tenant.
    pub fn with(mut self, filter: Filter) -> Result<Self, FilterError> {
        if let Filter::Tenant(other) = &filter {
            if *other != self.tenant {
                return Err(FilterError::TenantAlreadyBound(self.tenant));
            }
            return Ok(self);
        }
        self.rest.push(filter);
        Ok(self)
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn filters(&self) -> &[Filter] {
        &self.rest
    }

    pub fn matches(&self, meta: &DocumentMeta) -> bool {
        meta.tenant_id == self.tenant && self.rest.iter().all(|f| f.matches(meta))
    }
}
