// src/services/catalog.rs

//! Rate-limited catalog fetcher.
//!
//! Walks the paginated plugin/theme catalog one page at a time. Throttled
//! pages are retried with exponential backoff; any other failure response
//! ends the walk early and keeps what was already fetched.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{CatalogConfig, CatalogEntry, EntryKind};
use crate::utils::http::truncate_body;

/// What the catalog said about a single page request.
#[derive(Debug, Clone)]
pub enum PageResponse {
    /// A page of entries plus the server-reported page count
    Page {
        entries: Vec<CatalogEntry>,
        total_pages: u32,
    },
    /// HTTP 429 or equivalent
    Throttled,
    /// Any other non-success response
    Failed { status: u16, body: String },
}

/// Entries gathered for one kind.
#[derive(Debug, Clone, Default)]
pub struct CatalogFetch {
    pub entries: Vec<CatalogEntry>,
    /// Why the walk stopped before the last reported page, if it did
    pub incomplete: Option<String>,
}

enum PageStep {
    Entries(Vec<CatalogEntry>, u32),
    Stopped(String),
}

/// A paginated source of catalog entries.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch one page (1-based) of the given kind.
    async fn fetch_page(&self, kind: EntryKind, page: u32) -> Result<PageResponse>;
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(default)]
    pages: u32,
}

#[derive(Debug, Deserialize)]
struct PluginsPage {
    info: PageInfo,
    #[serde(default)]
    plugins: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct ThemesPage {
    info: PageInfo,
    #[serde(default)]
    themes: Vec<CatalogEntry>,
}

/// The wordpress.org plugin and theme info API.
pub struct WordPressCatalog {
    client: Client,
    config: CatalogConfig,
}

impl WordPressCatalog {
    pub fn new(client: Client, config: CatalogConfig) -> Self {
        Self { client, config }
    }

    fn request(&self, kind: EntryKind, page: u32) -> RequestBuilder {
        match kind {
            EntryKind::Plugin => self.client.get(&self.config.plugins_url).query(&[
                ("action", "query_plugins".to_string()),
                ("per_page", self.config.plugins_per_page.to_string()),
                ("page", page.to_string()),
            ]),
            EntryKind::Theme => self.client.get(&self.config.themes_url).query(&[
                ("action", "query_themes".to_string()),
                ("request[browse]", "popular".to_string()),
                ("request[fields][active_installs]", "1".to_string()),
                ("request[fields][downloadlink]", "1".to_string()),
                ("request[per_page]", self.config.themes_per_page.to_string()),
                ("request[page]", page.to_string()),
            ]),
        }
    }

    /// Map an HTTP status and body to a page response.
    pub fn page_response(
        kind: EntryKind,
        status: StatusCode,
        body: &[u8],
    ) -> Result<PageResponse> {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(PageResponse::Throttled);
        }
        if status != StatusCode::OK {
            return Ok(PageResponse::Failed {
                status: status.as_u16(),
                body: String::from_utf8_lossy(body).into_owned(),
            });
        }
        Self::parse_page(kind, body)
    }

    /// Decode a successful page body for the given kind.
    pub fn parse_page(kind: EntryKind, body: &[u8]) -> Result<PageResponse> {
        let (entries, total_pages) = match kind {
            EntryKind::Plugin => {
                let page: PluginsPage = serde_json::from_slice(body)?;
                (page.plugins, page.info.pages)
            }
            EntryKind::Theme => {
                let page: ThemesPage = serde_json::from_slice(body)?;
                (page.themes, page.info.pages)
            }
        };
        Ok(PageResponse::Page {
            entries,
            total_pages,
        })
    }
}

#[async_trait]
impl CatalogSource for WordPressCatalog {
    async fn fetch_page(&self, kind: EntryKind, page: u32) -> Result<PageResponse> {
        let response = self.request(kind, page).send().await?;
        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) if status == StatusCode::OK => return Err(e.into()),
            Err(_) => Default::default(),
        };
        Self::page_response(kind, status, &body)
    }
}

/// Exponential backoff schedule: `base`, `2*base`, `4*base`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max_attempts: u32,
}

impl Backoff {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(
            Duration::from_millis(config.backoff_base_ms),
            config.max_attempts,
        )
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base.saturating_mul(factor)
    }
}

/// Walks every page of a kind through a [`CatalogSource`].
#[derive(Clone)]
pub struct CatalogFetcher {
    source: Arc<dyn CatalogSource>,
    backoff: Backoff,
}

impl CatalogFetcher {
    pub fn new(source: Arc<dyn CatalogSource>, backoff: Backoff) -> Self {
        Self { source, backoff }
    }

    /// Fetch all entries of a kind.
    ///
    /// Page `n + 1` is requested only while the reported page count exceeds
    /// `n`. A non-throttle failure response stops the walk; the entries
    /// gathered so far are returned with [`CatalogFetch::incomplete`] set.
    /// Persistent throttling on any page returns
    /// [`AppError::RateLimitExceeded`].
    pub async fn fetch_catalog(&self, kind: EntryKind) -> Result<CatalogFetch> {
        let mut fetch = CatalogFetch::default();
        let mut page = 1;

        loop {
            log::info!("Fetching {} info page {}...", kind, page);
            match self.fetch_page_with_backoff(kind, page).await? {
                PageStep::Entries(batch, total_pages) => {
                    fetch.entries.extend(batch);
                    if page >= total_pages {
                        break;
                    }
                    page += 1;
                }
                PageStep::Stopped(reason) => {
                    fetch.incomplete = Some(reason);
                    break;
                }
            }
        }

        log::info!(
            "Fetched {} {} across {} page(s)",
            fetch.entries.len(),
            kind,
            page
        );
        Ok(fetch)
    }

    async fn fetch_page_with_backoff(
        &self,
        kind: EntryKind,
        page: u32,
    ) -> Result<PageStep> {
        let mut attempt = 1;
        loop {
            match self.source.fetch_page(kind, page).await? {
                PageResponse::Page {
                    entries,
                    total_pages,
                } => return Ok(PageStep::Entries(entries, total_pages)),
                PageResponse::Failed { status, body } => {
                    log::error!(
                        "{} page {} failed with status {}: {}",
                        kind,
                        page,
                        status,
                        truncate_body(&body, 500)
                    );
                    return Ok(PageStep::Stopped(format!(
                        "page {page} returned HTTP {status}"
                    )));
                }
                PageResponse::Throttled => {
                    if attempt >= self.backoff.max_attempts {
                        return Err(AppError::RateLimitExceeded {
                            kind: kind.to_string(),
                            page,
                            attempts: attempt,
                        });
                    }
                    let delay = self.backoff.delay(attempt);
                    log::warn!(
                        "{} page {} throttled (attempt {}/{}), retrying in {:?}",
                        kind,
                        page,
                        attempt,
                        self.backoff.max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
