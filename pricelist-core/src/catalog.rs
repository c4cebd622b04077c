//! Catalog query surface
//!
//! Ties the pieces together for a consumer:
//!
//! ```text
//! Fetcher ──► bytes cache ──► normalize ──► snapshot cache
//!                                                │
//!              list / get / roles / search ◄─────┘
//! ```
//!
//! Both cache layers use the configured TTL and are keyed independently. The
//! all-categories view is rebuilt per global search and never cached.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{Clock, SingleFlightCache, SystemClock};
use crate::classify::{classify, ColumnRole};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::fetch::{Fetcher, HttpTransport, WorkbookBytes};
use crate::search::{aggregate_all, search, SearchQuery, SearchResult, SearchScope};
use crate::workbook::{normalize, CategorySheet, WorkbookSnapshot};

/// Downloaded bytes and when they arrived
#[derive(Clone)]
struct FetchedWorkbook {
    bytes: WorkbookBytes,
    fetched_at: DateTime<Utc>,
}

/// Snapshot cache key: source URL and banner row count
type SnapshotKey = (String, usize);

pub struct Catalog {
    config: CatalogConfig,
    url: String,
    fetcher: Arc<Fetcher>,
    bytes_cache: SingleFlightCache<String, FetchedWorkbook>,
    snapshot_cache: SingleFlightCache<SnapshotKey, Arc<WorkbookSnapshot>>,
}

impl Catalog {
    /// Build a catalog that downloads over HTTP with the system clock
    pub fn new(config: CatalogConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::new(config.fetch.clone())?;
        Self::from_parts(config, fetcher, Arc::new(SystemClock))
    }

    /// Build a catalog over a custom transport and clock
    pub fn with_transport(
        config: CatalogConfig,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::with_transport(transport, config.fetch.clone());
        Self::from_parts(config, fetcher, clock)
    }

    fn from_parts(config: CatalogConfig, fetcher: Fetcher, clock: Arc<dyn Clock>) -> Result<Self> {
        let url = config.resolved_url()?;
        Ok(Self {
            config,
            url,
            fetcher: Arc::new(fetcher),
            bytes_cache: SingleFlightCache::with_clock(Arc::clone(&clock)),
            snapshot_cache: SingleFlightCache::with_clock(clock),
        })
    }

    pub fn source_url(&self) -> &str {
        &self.url
    }

    fn snapshot_key(&self) -> SnapshotKey {
        (self.url.clone(), self.config.banner_rows)
    }

    /// Current snapshot, fetching and parsing when the cached one is stale
    pub async fn snapshot(&self) -> Result<Arc<WorkbookSnapshot>> {
        let ttl = self.config.cache_ttl();
        let banner_rows = self.config.banner_rows;
        let url = self.url.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let bytes_cache = self.bytes_cache.clone();

        self.snapshot_cache
            .get_or_compute(self.snapshot_key(), ttl, move || async move {
                let download_url = url.clone();
                let fetched = bytes_cache
                    .get_or_compute(url, ttl, move || async move {
                        let bytes = fetcher.fetch(&download_url).await?;
                        Ok(FetchedWorkbook {
                            bytes,
                            fetched_at: Utc::now(),
                        })
                    })
                    .await?;

                let snapshot = tokio::task::spawn_blocking(move || {
                    normalize(&fetched.bytes, fetched.fetched_at, banner_rows)
                })
                .await
                .map_err(|e| CatalogError::Internal(format!("Normalization task failed: {e}")))??;

                info!(
                    "Loaded {} categories ({} rows)",
                    snapshot.categories.len(),
                    snapshot.total_rows()
                );
                Ok(Arc::new(snapshot))
            })
            .await
    }

    /// Last good snapshot regardless of age, without any I/O
    pub fn cached_snapshot(&self) -> Option<Arc<WorkbookSnapshot>> {
        self.snapshot_cache.peek(&self.snapshot_key())
    }

    /// Expire both cache layers so the next access fetches again
    pub fn refresh(&self) {
        debug!("Invalidating cached workbook for {}", self.url);
        self.bytes_cache.invalidate(&self.url);
        self.snapshot_cache.invalidate(&self.snapshot_key());
    }

    /// Category names in workbook order
    pub async fn list_categories(&self) -> Result<Vec<String>> {
        Ok(self.snapshot().await?.category_names())
    }

    /// Category names containing `filter`, case-insensitively, in workbook order
    pub async fn find_categories(&self, filter: &str) -> Result<Vec<String>> {
        let filter = filter.to_lowercase();
        Ok(self
            .list_categories()
            .await?
            .into_iter()
            .filter(|name| name.to_lowercase().contains(&filter))
            .collect())
    }

    pub async fn get_category(&self, name: &str) -> Result<CategorySheet> {
        let snapshot = self.snapshot().await?;
        snapshot
            .category(name)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    pub async fn get_column_roles(&self, name: &str) -> Result<IndexMap<String, ColumnRole>> {
        let snapshot = self.snapshot().await?;
        let sheet = snapshot
            .category(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;
        Ok(classify(sheet))
    }

    pub async fn run_search(&self, query: &SearchQuery) -> Result<SearchResult> {
        let snapshot = self.snapshot().await?;

        let (columns, rows) = match &query.scope {
            SearchScope::SingleCategory(name) => {
                let sheet = snapshot
                    .category(name)
                    .ok_or_else(|| CatalogError::NotFound(name.clone()))?;
                let rows: Vec<_> = search(&sheet.rows, &sheet.columns, &query.text)
                    .into_iter()
                    .cloned()
                    .collect();
                (sheet.columns.clone(), rows)
            }
            SearchScope::AllCategories => {
                let view = aggregate_all(&snapshot);
                let rows: Vec<_> = search(&view.rows, &view.columns, &query.text)
                    .into_iter()
                    .cloned()
                    .collect();
                (view.columns, rows)
            }
        };

        let result = SearchResult {
            query: query.clone(),
            columns,
            rows,
        };
        debug!("Search {:?} matched {} rows", query, result.count());
        Ok(result)
    }
}
