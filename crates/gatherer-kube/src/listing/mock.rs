//! Scripted transport for testing
//!
//! Serves canned pages per collection path without an API server. Page `i`
//! carries the continuation token `page-{i+1}` unless it is the last one.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{FetchError, ListPage, ListTransport};

#[derive(Debug, Clone)]
enum Script {
    Pages(Vec<Vec<Value>>),
    Status(u16),
}

/// In-memory list transport for testing
#[derive(Clone, Default)]
pub struct MockTransport {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    /// Remaining injected failures per collection path
    failures: Arc<Mutex<HashMap<String, (u16, usize)>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    /// Create a transport that answers 404 for every path
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `pages` for the collection at `path`
    pub fn with_pages(self, path: &str, pages: Vec<Vec<Value>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(path.to_string(), Script::Pages(pages));
        self
    }

    /// Answer every request for `path` with HTTP `code`
    pub fn with_status(self, path: &str, code: u16) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(path.to_string(), Script::Status(code));
        self
    }

    /// Fail the first `times` requests for `path` with HTTP `code`
    pub fn fail_first(self, path: &str, code: u16, times: usize) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(path.to_string(), (code, times));
        self
    }

    /// All request paths seen so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ListTransport for MockTransport {
    async fn get_page(&self, path: &str) -> Result<ListPage, FetchError> {
        self.requests.lock().unwrap().push(path.to_string());

        let (base, query) = path.split_once('?').unwrap_or((path, ""));

        if let Some((code, remaining)) = self.failures.lock().unwrap().get_mut(base) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(FetchError::Status {
                    code: *code,
                    message: "injected failure".to_string(),
                });
            }
        }

        let script = self.scripts.lock().unwrap().get(base).cloned();
        let pages = match script {
            Some(Script::Pages(pages)) => pages,
            Some(Script::Status(code)) => {
                return Err(FetchError::Status {
                    code,
                    message: format!("scripted status for {}", base),
                });
            }
            None => {
                return Err(FetchError::Status {
                    code: 404,
                    message: format!("no script for {}", base),
                });
            }
        };

        let index = url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "continue")
            .and_then(|(_, token)| {
                token
                    .strip_prefix("page-")
                    .and_then(|i| i.parse::<usize>().ok())
            })
            .unwrap_or(0);

        let items = pages.get(index).cloned().unwrap_or_default();
        let token = (index + 1 < pages.len()).then(|| format!("page-{}", index + 1));
        Ok(ListPage::new(items, token))
    }
}
