//! Fetch gate: one cached payload, reused while fresh.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::types::{FetchError, UsagePayload, UsageResponse};

/// Default request timeout for the HTTP source
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where usage statistics come from
pub trait UsageSource: Send + Sync + 'static {
    /// Fetch the raw response for `endpoint`
    fn fetch(&self, endpoint: &str) -> impl Future<Output = Result<UsageResponse, FetchError>> + Send;
}

/// HTTP source resolving endpoint paths against a base URL
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    /// Create a source for the dashboard at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Join base URL and endpoint, passing absolute endpoints through
    fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

impl UsageSource for HttpSource {
    async fn fetch(&self, endpoint: &str) -> Result<UsageResponse, FetchError> {
        let url = self.url_for(endpoint);
        debug!("Usage fetch: GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<UsageResponse>()
            .await?;
        Ok(response)
    }
}

/// Source reading the response JSON from a local file on every fetch
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl UsageSource for FileSource {
    async fn fetch(&self, _endpoint: &str) -> Result<UsageResponse, FetchError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// The single cache slot
#[derive(Debug, Clone)]
struct CacheEntry {
    endpoint: String,
    fetched_at: Instant,
    payload: Arc<UsagePayload>,
}

/// Coalesces refresh requests within a freshness window.
///
/// No lock is held across the network call: overlapping refreshes each
/// fetch and the last one to finish owns the slot. Readers always see a
/// complete entry because the slot is swapped as a whole.
pub struct FetchGate<S> {
    source: Arc<S>,
    slot: RwLock<Option<CacheEntry>>,
}

impl<S: UsageSource> FetchGate<S> {
    /// Create a gate with an empty cache
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            slot: RwLock::new(None),
        }
    }

    /// Cached payload for `endpoint` if it is younger than `freshness`.
    ///
    /// An entry fetched from another endpoint is never served.
    pub fn cached(&self, endpoint: &str, freshness: Duration) -> Option<Arc<UsagePayload>> {
        let slot = self.slot.read();
        slot.as_ref()
            .filter(|entry| entry.endpoint == endpoint)
            .filter(|entry| entry.fetched_at.elapsed() < freshness)
            .map(|entry| entry.payload.clone())
    }

    /// Return fresh data, hitting the source only when the cache is stale.
    ///
    /// Failures are logged and yield `None`; the previous entry is kept.
    pub async fn fetch(&self, endpoint: &str, freshness: Duration) -> Option<Arc<UsagePayload>> {
        if let Some(payload) = self.cached(endpoint, freshness) {
            debug!("Usage fetch: serving cached payload");
            return Some(payload);
        }

        let result = self
            .source
            .fetch(endpoint)
            .await
            .and_then(UsageResponse::into_payload);

        match result {
            Ok(payload) => {
                let payload = Arc::new(payload);
                *self.slot.write() = Some(CacheEntry {
                    endpoint: endpoint.to_string(),
                    fetched_at: Instant::now(),
                    payload: payload.clone(),
                });
                debug!("Usage fetch: cached {} cycle(s)", payload.len());
                Some(payload)
            }
            Err(e) => {
                warn!("Usage fetch failed, keeping previous data: {}", e);
                None
            }
        }
    }

    /// Drop the cached entry so the next fetch hits the source
    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }
}
