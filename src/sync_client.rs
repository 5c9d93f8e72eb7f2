//! Sync client for the remote quote source.
//!
//! This module provides the client side of the quote sync, allowing this
//! store to:
//! - Pull quotes from a REST-style `/posts` endpoint and merge them
//! - Push local quotes back to the endpoint
//!
//! Remote failures are never fatal: a failed fetch leaves the store untouched
//! and only shows up as the status message of the `SyncResult`.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{RemoteConfig, RemoteMapping};
use crate::error::{QuoteError, QuoteResult};
use crate::models::Quote;
use crate::store::QuoteStore;

/// Category given to remote posts under [`RemoteMapping::TitleOnly`]
pub const SERVER_CATEGORY: &str = "Server";

/// User id sent with every posted quote
const POST_USER_ID: u64 = 1;

/// Result of a sync operation
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    pub success: bool,
    pub added: usize,
    pub updated: usize,
    pub pushed: usize,
    pub conflicts: usize,
    /// Short message for the user, e.g. "2 conflicts detected. Server data took precedence."
    pub status: String,
    pub errors: Vec<String>,
}

impl SyncResult {
    pub fn success() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            status: error.clone(),
            errors: vec![error],
            ..Default::default()
        }
    }

    fn summarize(&mut self) {
        self.success = self.errors.is_empty();
        if !self.status.is_empty() {
            return;
        }
        self.status = if self.conflicts > 0 {
            format!(
                "{} conflicts detected. Server data took precedence.",
                self.conflicts
            )
        } else if self.added == 0 && self.updated == 0 {
            "Quotes are up to date.".to_string()
        } else {
            format!(
                "Synced with server: {} added, {} updated.",
                self.added, self.updated
            )
        };
    }
}

/// A source of remote quotes.
///
/// Implementations report failures as `QuoteError::Remote`; callers decide
/// whether that is fatal.
pub trait RemoteQuoteSource: Send + Sync {
    /// Fetch the current remote quotes
    fn fetch_quotes(&self) -> impl Future<Output = QuoteResult<Vec<Quote>>> + Send;

    /// Publish one quote. Returns the identifier the remote assigned.
    fn post_quote(&self, quote: &Quote) -> impl Future<Output = QuoteResult<String>> + Send;
}

/// A post as served by the remote endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePost {
    pub id: u64,
    #[serde(rename = "userId", default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// Body of a POST request
#[derive(Debug, Serialize)]
struct NewPost<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(rename = "userId")]
    user_id: u64,
}

/// Response to a POST request
#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: serde_json::Value,
}

/// Map a remote post onto a quote. Posts without usable text are skipped.
pub fn map_post(post: &RemotePost, mapping: RemoteMapping) -> Option<Quote> {
    let (text, category) = match mapping {
        RemoteMapping::TitleOnly => (post.title.as_str(), SERVER_CATEGORY),
        RemoteMapping::TitleAsCategory => (post.body.as_str(), post.title.as_str()),
    };

    if text.trim().is_empty() {
        return None;
    }
    Some(Quote::from_server(post.id, text, category))
}

/// HTTP implementation of [`RemoteQuoteSource`]
pub struct HttpQuoteSource {
    client: Client,
    base_url: String,
    fetch_limit: u32,
    mapping: RemoteMapping,
}

impl HttpQuoteSource {
    pub fn new(remote: &RemoteConfig) -> QuoteResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(remote.request_timeout_secs))
            .build()
            .map_err(|e| QuoteError::remote(e.to_string()))?;

        Ok(Self {
            client,
            base_url: remote.base_url.trim_end_matches('/').to_string(),
            fetch_limit: remote.fetch_limit,
            mapping: remote.mapping,
        })
    }

    fn posts_url(&self) -> String {
        format!("{}/posts", self.base_url)
    }
}

impl RemoteQuoteSource for HttpQuoteSource {
    async fn fetch_quotes(&self) -> QuoteResult<Vec<Quote>> {
        let url = format!("{}?_limit={}", self.posts_url(), self.fetch_limit);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(QuoteError::remote(format!(
                "Fetch failed with status {}",
                response.status()
            )));
        }

        let posts: Vec<RemotePost> = response
            .json()
            .await
            .map_err(|e| QuoteError::remote(format!("Failed to parse posts: {}", e)))?;

        tracing::debug!("GET {} returned {} posts", url, posts.len());

        Ok(posts
            .iter()
            .filter_map(|post| map_post(post, self.mapping))
            .collect())
    }

    async fn post_quote(&self, quote: &Quote) -> QuoteResult<String> {
        let request = NewPost {
            title: &quote.text,
            body: &quote.category,
            user_id: POST_USER_ID,
        };

        let response = self
            .client
            .post(self.posts_url())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QuoteError::remote(format!(
                "Post failed with status {}",
                response.status()
            )));
        }

        let created: CreatedPost = response
            .json()
            .await
            .map_err(|e| QuoteError::remote(format!("Failed to parse post response: {}", e)))?;

        Ok(match created.id {
            serde_json::Value::String(id) => id,
            other => other.to_string(),
        })
    }
}

/// Sync client
pub struct SyncClient<S> {
    store: Arc<Mutex<QuoteStore>>,
    source: S,
    push_local: bool,
}

impl SyncClient<HttpQuoteSource> {
    /// Create a client for the HTTP source described by `remote`
    pub fn from_config(store: Arc<Mutex<QuoteStore>>, remote: &RemoteConfig) -> QuoteResult<Self> {
        let source = HttpQuoteSource::new(remote)?;
        Ok(Self::new(store, source, remote.push_local))
    }
}

impl<S: RemoteQuoteSource> SyncClient<S> {
    pub fn new(store: Arc<Mutex<QuoteStore>>, source: S, push_local: bool) -> Self {
        Self {
            store,
            source,
            push_local,
        }
    }

    /// The shared store this client merges into
    pub fn store(&self) -> Arc<Mutex<QuoteStore>> {
        Arc::clone(&self.store)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch, merge, and (if configured) push local quotes
    pub async fn sync_once(&self) -> SyncResult {
        let mut result = self.pull().await;
        // No push when the remote could not be read
        if !result.success {
            return result;
        }

        if self.push_local {
            let pushed = self.push().await;
            result.pushed = pushed.pushed;
            result.errors.extend(pushed.errors);
        }

        result.summarize();
        result
    }

    /// Fetch remote quotes and merge them into the store (one-way)
    pub async fn pull(&self) -> SyncResult {
        let remote = match self.source.fetch_quotes().await {
            Ok(quotes) => quotes,
            Err(e) => {
                tracing::warn!("Error fetching from server: {}", e);
                return SyncResult::failure(format!("Could not fetch quotes from server: {}", e));
            }
        };

        let mut result = SyncResult::success();
        if remote.is_empty() {
            result.status = "Nothing to merge.".to_string();
            return result;
        }

        let merged = self
            .lock_store()
            .and_then(|mut store| store.merge_remote(&remote));

        match merged {
            Ok(outcome) => {
                result.added = outcome.added;
                result.updated = outcome.updated;
                result.conflicts = outcome.conflicts.len();
            }
            Err(e) => {
                tracing::error!("Failed to merge remote quotes: {}", e);
                result.errors.push(format!("Merge failed: {}", e));
            }
        }

        result.summarize();
        result
    }

    /// Post every local quote to the remote (one-way)
    pub async fn push(&self) -> SyncResult {
        let local = match self.lock_store() {
            Ok(store) => store.local_quotes(),
            Err(e) => return SyncResult::failure(e.to_string()),
        };

        let mut result = SyncResult::success();
        for quote in &local {
            match self.source.post_quote(quote).await {
                Ok(remote_id) => {
                    tracing::trace!("Posted {} as remote id {}", quote.id, remote_id);
                    result.pushed += 1;
                }
                Err(e) => {
                    tracing::warn!("Error posting to server: {}", e);
                    result.errors.push(format!("Push failed: {}", e));
                    break;
                }
            }
        }

        if result.errors.is_empty() {
            tracing::info!("Pushed {} quotes to server", result.pushed);
        }
        result.success = result.errors.is_empty();
        result.status = format!("Pushed {} of {} quotes.", result.pushed, local.len());
        result
    }

    /// Add a quote locally and publish it. The local add stands even if
    /// publishing fails.
    pub async fn add_and_publish(&self, text: &str, category: &str) -> QuoteResult<(Quote, Option<String>)> {
        let quote = self.lock_store()?.add(text, category)?;

        match self.source.post_quote(&quote).await {
            Ok(remote_id) => Ok((quote, Some(remote_id))),
            Err(e) => {
                tracing::warn!("Quote {} saved locally but not published: {}", quote.id, e);
                Ok((quote, None))
            }
        }
    }

    fn lock_store(&self) -> QuoteResult<MutexGuard<'_, QuoteStore>> {
        self.store
            .lock()
            .map_err(|_| QuoteError::Other("quote store lock poisoned".to_string()))
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// In-process source serving a scripted quote list
    #[derive(Default)]
    pub struct MockQuoteSource {
        /// None makes every fetch fail
        pub quotes: Mutex<Option<Vec<Quote>>>,
        pub posted: Mutex<Vec<Quote>>,
        pub fail_posts: bool,
        pub fetch_calls: AtomicUsize,
    }

    impl MockQuoteSource {
        pub fn serving(quotes: Vec<Quote>) -> Self {
            Self {
                quotes: Mutex::new(Some(quotes)),
                ..Default::default()
            }
        }

        pub fn failing() -> Self {
            Self::default()
        }

        pub fn fetches(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }
    }

    impl RemoteQuoteSource for MockQuoteSource {
        async fn fetch_quotes(&self) -> QuoteResult<Vec<Quote>> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.quotes
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| QuoteError::remote("connection refused"))
        }

        async fn post_quote(&self, quote: &Quote) -> QuoteResult<String> {
            if self.fail_posts {
                return Err(QuoteError::remote("HTTP 500"));
            }
            let mut posted = self.posted.lock().unwrap();
            posted.push(quote.clone());
            Ok((100 + posted.len()).to_string())
        }
    }
}
