//! Grant catalog loader.
//!
//! Fetches grant records from a paginated list endpoint shaped like
//! `{ meta: { total_results }, result: { grants: [...] } }`, normalizes each
//! record into a [`Grant`], and assembles the full collection in page order.

mod filter;

use std::sync::Arc;
use std::time::Duration;

use grantlens_shared::{BatchPolicy, CatalogConfig, Grant, GrantLensError, Result, normalize};
use reqwest::Client;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub use filter::{PageView, search};

/// Page size for the single-request probe mode.
const PROBE_PAGE_SIZE: u32 = 1;

/// User-Agent string for catalog requests.
const USER_AGENT: &str = concat!("GrantLens/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for the catalog loader.
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    /// Page size when fetching every page.
    pub per_page: u32,
    /// Timeout for each HTTP request in seconds.
    pub timeout_secs: u64,
    /// What to do when one of the concurrent page requests fails.
    pub batch_policy: BatchPolicy,
    /// Cap on in-flight page requests; `None` means unbounded.
    pub max_concurrency: Option<usize>,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self::from(&CatalogConfig::default())
    }
}

impl From<&CatalogConfig> for CatalogOptions {
    fn from(config: &CatalogConfig) -> Self {
        Self {
            per_page: config.per_page.max(1),
            timeout_secs: config.request_timeout_secs,
            batch_policy: config.batch_policy,
            max_concurrency: (config.max_concurrency > 0).then_some(config.max_concurrency),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// The consumed subset of one page body.
#[derive(Debug, Clone, Default)]
pub struct PageResponse {
    /// `meta.total_results`, or 0 when missing or not numeric.
    pub total_results: u64,
    /// Normalized `result.grants`, in upstream order.
    pub grants: Vec<Grant>,
}

impl PageResponse {
    /// Extract the total and normalized grants from a parsed page body.
    pub fn from_body(body: &Value) -> Self {
        let total_results = match body.pointer("/meta/total_results") {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        };
        let total_results = if total_results.is_finite() && total_results > 0.0 {
            total_results.ceil() as u64
        } else {
            0
        };

        let grants = body
            .pointer("/result/grants")
            .and_then(Value::as_array)
            .map(|raw| raw.iter().map(normalize).collect())
            .unwrap_or_default();

        Self {
            total_results,
            grants,
        }
    }
}

/// A page that failed under [`BatchPolicy::Partial`].
#[derive(Debug)]
pub struct PageFailure {
    /// 1-based page number.
    pub page: u32,
    /// Why the page failed.
    pub error: GrantLensError,
}

/// Outcome of a full catalog fetch.
#[derive(Debug, Default)]
pub struct CatalogFetch {
    /// Normalized grants in ascending page order.
    pub grants: Vec<Grant>,
    /// Pages that failed (always empty under [`BatchPolicy::Abort`]).
    pub failures: Vec<PageFailure>,
    /// Number of page requests issued.
    pub pages_requested: u32,
}

// ---------------------------------------------------------------------------
// CatalogClient
// ---------------------------------------------------------------------------

/// HTTP client for the paginated grants endpoint.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    options: CatalogOptions,
}

impl CatalogClient {
    /// Create a new client with the given options.
    pub fn new(options: CatalogOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()
            .map_err(|e| GrantLensError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, options })
    }

    /// Options this client was built with.
    pub fn options(&self) -> &CatalogOptions {
        &self.options
    }

    /// Fetch one page and return its parsed JSON body.
    pub async fn fetch_page(&self, base_uri: &Url, page: u32, per_page: u32) -> Result<Value> {
        fetch_page_with(&self.client, base_uri, page, per_page).await
    }

    /// Fetch grants from `base_uri`.
    ///
    /// With `paginate == false` a single one-item page is requested. With
    /// `paginate == true` every page is fetched; page failures are handled
    /// per the configured [`BatchPolicy`] and, under `Partial`, logged and
    /// dropped. Use [`CatalogClient::fetch_report`] to inspect them.
    pub async fn fetch_all(&self, base_uri: &Url, paginate: bool) -> Result<Vec<Grant>> {
        let report = self.fetch_report(base_uri, paginate).await?;
        for failure in &report.failures {
            warn!(page = failure.page, error = %failure.error, "page dropped from catalog");
        }
        Ok(report.grants)
    }

    /// Like [`CatalogClient::fetch_all`], but also returns per-page failures.
    #[instrument(skip_all, fields(base_uri = %base_uri, paginate = paginate))]
    pub async fn fetch_report(&self, base_uri: &Url, paginate: bool) -> Result<CatalogFetch> {
        if !paginate {
            let body = self.fetch_page(base_uri, 1, PROBE_PAGE_SIZE).await?;
            let first = PageResponse::from_body(&body);
            debug!(grants = first.grants.len(), "single-page fetch complete");
            return Ok(CatalogFetch {
                grants: first.grants,
                failures: Vec::new(),
                pages_requested: 1,
            });
        }

        let per_page = self.options.per_page.max(1);
        let body = self.fetch_page(base_uri, 1, per_page).await?;
        let first = PageResponse::from_body(&body);
        let pages = total_pages(first.total_results, per_page);

        info!(
            total_results = first.total_results,
            per_page,
            pages,
            "catalog size learned from first page"
        );

        let mut report = CatalogFetch {
            grants: first.grants,
            failures: Vec::new(),
            pages_requested: 1,
        };
        if pages == 1 {
            return Ok(report);
        }

        let semaphore = self.options.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
        let mut handles: Vec<(u32, JoinHandle<Result<Vec<Grant>>>)> = Vec::new();

        for page in 2..=pages {
            let client = self.client.clone();
            let base = base_uri.clone();
            let sem = semaphore.clone();

            handles.push((
                page,
                tokio::spawn(async move {
                    let _permit = match sem {
                        Some(sem) => Some(sem.acquire_owned().await.map_err(|e| {
                            GrantLensError::Network(format!("page {page}: {e}"))
                        })?),
                        None => None,
                    };
                    let body = fetch_page_with(&client, &base, page, per_page).await?;
                    Ok::<_, GrantLensError>(PageResponse::from_body(&body).grants)
                }),
            ));
        }
        report.pages_requested = pages;

        // Await in page order so grants stay in ascending page order.
        let mut handles = handles.into_iter();
        while let Some((page, handle)) = handles.next() {
            let outcome = handle
                .await
                .map_err(|e| GrantLensError::Network(format!("page {page} task failed: {e}")))
                .and_then(|r| r);

            match outcome {
                Ok(grants) => report.grants.extend(grants),
                Err(error) => match self.options.batch_policy {
                    BatchPolicy::Abort => {
                        for (_, pending) in handles.by_ref() {
                            pending.abort();
                        }
                        warn!(page, error = %error, "page failed, aborting catalog fetch");
                        return Err(error);
                    }
                    BatchPolicy::Partial => {
                        warn!(page, error = %error, "page failed, continuing");
                        report.failures.push(PageFailure { page, error });
                    }
                },
            }
        }

        info!(
            grants = report.grants.len(),
            failed_pages = report.failures.len(),
            "catalog fetch complete"
        );

        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Convenience entry point
// ---------------------------------------------------------------------------

/// Fetch grants from `base_uri` with default options.
pub async fn fetch_grants(base_uri: &str, paginate: bool) -> Result<Vec<Grant>> {
    let url = Url::parse(base_uri)
        .map_err(|e| GrantLensError::validation(format!("invalid base URI '{base_uri}': {e}")))?;
    CatalogClient::new(CatalogOptions::default())?
        .fetch_all(&url, paginate)
        .await
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Number of pages needed for `total` results, never less than one.
pub fn total_pages(total: u64, per_page: u32) -> u32 {
    let per_page = u64::from(per_page.max(1));
    let pages = total.div_ceil(per_page).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// `base_uri` with `page` and `per_page` set, other query parameters kept.
pub fn page_url(base_uri: &Url, page: u32, per_page: u32) -> Url {
    let kept: Vec<(String, String)> = base_uri
        .query_pairs()
        .filter(|(k, _)| k != "page" && k != "per_page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = base_uri.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("page", &page.to_string())
        .append_pair("per_page", &per_page.to_string());
    url
}

async fn fetch_page_with(client: &Client, base_uri: &Url, page: u32, per_page: u32) -> Result<Value> {
    let url = page_url(base_uri, page, per_page);
    debug!(%url, "fetching grants page");

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| GrantLensError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(GrantLensError::Request {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| GrantLensError::parse(format!("{url}: invalid JSON body: {e}")))
}
