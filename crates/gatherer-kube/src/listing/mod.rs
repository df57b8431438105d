//! Paginated listing with retry and error classification
//!
//! `Lister::list` turns one collection into a lazy stream of raw objects.
//! Pages are fetched strictly in sequence, each request carrying the
//! previous page's continuation token. Failures end the stream with a
//! single `ListError` item:
//!
//! - 403/404: the kind is unavailable here, logged at warn level
//! - 429/5xx and transport errors: retried with exponential backoff, then
//!   reported as exhausted at error level
//! - anything else: terminal, logged at error level, no retry

mod mock;

pub use mock::MockTransport;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use gatherer_core::{KindSpec, RetryConfig};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ListMeta;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// One page of a list response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub metadata: ListMeta,
}

impl ListPage {
    pub fn new(items: Vec<Value>, continue_token: Option<String>) -> Self {
        Self {
            items,
            metadata: ListMeta {
                continue_: continue_token,
                ..Default::default()
            },
        }
    }

    /// Continuation token, if the server reported more pages
    pub fn continue_token(&self) -> Option<&str> {
        self.metadata.continue_.as_deref().filter(|t| !t.is_empty())
    }
}

/// Failure of a single page request
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { code, .. } => matches!(code, 429 | 500 | 502 | 503 | 504),
            FetchError::Transport(_) => true,
        }
    }
}

/// Source of list pages
#[async_trait]
pub trait ListTransport: Send + Sync {
    /// GET `path` (collection path plus query) and decode a list page
    async fn get_page(&self, path: &str) -> Result<ListPage, FetchError>;
}

/// Transport backed by a live API server
#[derive(Clone)]
pub struct KubeTransport {
    client: kube::Client,
}

impl KubeTransport {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ListTransport for KubeTransport {
    async fn get_page(&self, path: &str) -> Result<ListPage, FetchError> {
        let request = http::Request::get(path)
            .body(Vec::new())
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        self.client
            .request::<ListPage>(request)
            .await
            .map_err(|e| match e {
                kube::Error::Api(resp) => FetchError::Status {
                    code: resp.code,
                    message: resp.message,
                },
                other => FetchError::Transport(other.to_string()),
            })
    }
}

/// Why a listing stopped early
#[derive(Debug, Clone, Error)]
pub enum ListError {
    /// Access denied or resource type not served (403/404)
    #[error("kind not available (HTTP {status})")]
    Unavailable { status: u16 },

    /// Retryable failures persisted past the retry ceiling
    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    /// Non-retryable failure
    #[error("request failed (HTTP {status}): {message}")]
    Terminal { status: u16, message: String },
}

impl ListError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ListError::Unavailable { .. })
    }
}

/// Exponential backoff settings for page requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Stream-producing listing client
pub struct Lister<T> {
    transport: Arc<T>,
    retry: RetryPolicy,
    page_size: u32,
}

impl<T> Clone for Lister<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            retry: self.retry,
            page_size: self.page_size,
        }
    }
}

enum Cursor {
    Start,
    Continue(String),
    Done,
}

impl<T: ListTransport + 'static> Lister<T> {
    pub fn new(transport: T, retry: RetryPolicy, page_size: u32) -> Self {
        Self {
            transport: Arc::new(transport),
            retry,
            page_size,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Lazily list every object of `spec`, optionally within one namespace.
    ///
    /// The stream is not resumable: after an `Err` item it ends, and a new
    /// listing starts from the first page.
    pub fn list(
        &self,
        spec: &KindSpec,
        namespace: Option<&str>,
    ) -> BoxStream<'static, Result<Value, ListError>> {
        let base = spec.collection_path(namespace);
        let transport = Arc::clone(&self.transport);
        let retry = self.retry;
        let page_size = self.page_size;

        stream::unfold(Cursor::Start, move |cursor| {
            let transport = Arc::clone(&transport);
            let base = base.clone();
            async move {
                let token = match cursor {
                    Cursor::Done => return None,
                    Cursor::Start => None,
                    Cursor::Continue(token) => Some(token),
                };
                let path = page_path(&base, page_size, token.as_deref());

                match fetch_page(transport.as_ref(), &path, &retry).await {
                    Ok(page) => {
                        let next = match page.continue_token() {
                            Some(token) => Cursor::Continue(token.to_string()),
                            None => Cursor::Done,
                        };
                        let items: Vec<Result<Value, ListError>> =
                            page.items.into_iter().map(Ok).collect();
                        Some((items, next))
                    }
                    Err(e) => Some((vec![Err(e)], Cursor::Done)),
                }
            }
        })
        .flat_map(stream::iter)
        .boxed()
    }
}

/// Request path for one page
pub fn page_path(base: &str, page_size: u32, token: Option<&str>) -> String {
    let mut path = format!("{}?limit={}", base, page_size);
    if let Some(token) = token {
        path.push_str("&continue=");
        path.extend(url::form_urlencoded::byte_serialize(token.as_bytes()));
    }
    path
}

async fn fetch_page<T: ListTransport + ?Sized>(
    transport: &T,
    path: &str,
    retry: &RetryPolicy,
) -> Result<ListPage, ListError> {
    let mut attempt = 0;
    loop {
        let err = match transport.get_page(path).await {
            Ok(page) => return Ok(page),
            Err(e) => e,
        };

        if let FetchError::Status { code: status @ (403 | 404), .. } = err {
            tracing::warn!(path, status, "kind not available, skipping");
            return Err(ListError::Unavailable { status });
        }

        if !err.is_retryable() {
            tracing::error!(path, error = %err, "list request failed");
            let (status, message) = match err {
                FetchError::Status { code, message } => (code, message),
                FetchError::Transport(message) => (0, message),
            };
            return Err(ListError::Terminal { status, message });
        }

        if attempt >= retry.max_retries {
            tracing::error!(path, attempts = attempt + 1, error = %err, "retries exhausted");
            return Err(ListError::RetriesExhausted {
                attempts: attempt + 1,
                last: err.to_string(),
            });
        }

        let delay = retry.delay(attempt);
        tracing::warn!(
            path,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "list request failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
