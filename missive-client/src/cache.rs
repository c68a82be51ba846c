//! Keyed result cache
//!
//! One entry per (query, variables) key, holding the lifecycle state and the
//! last result. Each entry is a `watch` channel: subscribers receive every
//! snapshot, and each update replaces the previous snapshot as a whole.
//!
//! Lifecycle per key: `Idle → Loading → {Success | Failed}`. A re-fetch goes
//! back to `Loading` while the previous result stays visible.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::error::CombinedError;
use crate::operation::OperationResult;

/// Lifecycle state of one cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Loading,
    Success,
    Failed,
}

impl QueryState {
    /// `Success` and `Failed` stay until an explicit re-fetch
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryState::Success | QueryState::Failed)
    }
}

/// What subscribers observe for a key
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub state: QueryState,
    /// Last completed result, kept while a re-fetch is loading
    pub result: Option<Arc<OperationResult>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::idle()
    }
}

impl Snapshot {
    pub fn idle() -> Self {
        Self {
            state: QueryState::Idle,
            result: None,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        self.result.as_ref().and_then(|r| r.data.as_ref())
    }

    pub fn error(&self) -> Option<&CombinedError> {
        self.result.as_ref().and_then(|r| r.error.as_ref())
    }

    pub fn is_loading(&self) -> bool {
        self.state == QueryState::Loading
    }
}

/// Cache key: the query text plus canonical variables
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    query: String,
    variables: String,
}

impl CacheKey {
    /// Variables are canonicalized so key order does not matter
    pub fn new(query: &str, variables: &Map<String, Value>) -> Self {
        let variables = canonical(&Value::Object(variables.clone()));
        Self {
            query: query.to_string(),
            variables: variables.to_string(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonical(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

/// Outcome of [`QueryCache::begin`]
#[derive(Debug)]
pub enum Begin {
    /// A usable result is cached; no fetch needed
    Cached(Arc<OperationResult>),
    /// Another caller is fetching this key; wait for its outcome
    Wait(watch::Receiver<Snapshot>),
    /// The caller must fetch and complete the guard
    Fetch(LoadingGuard),
}

/// Process-lifetime store of cache entries
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<CacheKey, Arc<watch::Sender<Snapshot>>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &CacheKey) -> Arc<watch::Sender<Snapshot>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(watch::channel(Snapshot::idle()).0))
            .clone()
    }

    /// Current snapshot of `key`; `Idle` for keys never executed
    pub fn snapshot(&self, key: &CacheKey) -> Snapshot {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .map(|sender| sender.borrow().clone())
            .unwrap_or_default()
    }

    /// Receive every snapshot of `key` from now on
    pub fn subscribe(&self, key: &CacheKey) -> watch::Receiver<Snapshot> {
        self.entry(key).subscribe()
    }

    /// Number of keys with an entry
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decide how a caller gets a result for `key`
    ///
    /// The decision and the move to `Loading` happen in one update of the
    /// entry, so two callers never both fetch the same key. With `force`, a
    /// terminal entry is fetched again.
    pub fn begin(&self, key: &CacheKey, force: bool) -> Begin {
        let sender = self.entry(key);

        let mut begin = None;
        sender.send_if_modified(|snapshot| {
            match (snapshot.state, &snapshot.result) {
                (QueryState::Success | QueryState::Failed, Some(result)) if !force => {
                    begin = Some(Begin::Cached(result.clone()));
                    false
                }
                (QueryState::Loading, Some(result)) if !force => {
                    begin = Some(Begin::Cached(result.clone()));
                    false
                }
                (QueryState::Loading, _) => false,
                _ => {
                    let previous = snapshot.clone();
                    snapshot.state = QueryState::Loading;
                    begin = Some(Begin::Fetch(LoadingGuard {
                        sender: sender.clone(),
                        previous: Some(previous),
                    }));
                    true
                }
            }
        });

        begin.unwrap_or_else(|| Begin::Wait(sender.subscribe()))
    }
}

/// Held by the caller fetching a key
///
/// Completing it stores the result; dropping it without completing puts
/// the entry back to what it was before the fetch began.
#[derive(Debug)]
pub struct LoadingGuard {
    sender: Arc<watch::Sender<Snapshot>>,
    previous: Option<Snapshot>,
}

impl LoadingGuard {
    /// Replace the entry with the fetched result and return what was stored
    ///
    /// A failed result without usable data keeps the data cached before the
    /// fetch, so it stays visible next to the error.
    pub fn complete(mut self, mut result: OperationResult) -> Arc<OperationResult> {
        let previous = self.previous.take();
        if result.is_error() && !result.data.as_ref().is_some_and(has_data) {
            if let Some(data) = previous.as_ref().and_then(|p| p.data()).filter(|d| has_data(d)) {
                result.data = Some(data.clone());
            }
        }

        // partial data with field errors still counts as failed
        let state = if result.is_error() {
            QueryState::Failed
        } else {
            QueryState::Success
        };
        let result = Arc::new(result);
        self.sender.send_replace(Snapshot {
            state,
            result: Some(result.clone()),
        });
        result
    }
}

/// Whether `data` has at least one non-null root field
fn has_data(data: &Value) -> bool {
    match data {
        Value::Object(fields) => fields.values().any(|v| !v.is_null()),
        Value::Null => false,
        _ => true,
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            tracing::debug!("fetch abandoned, restoring previous cache entry");
            self.sender.send_replace(previous);
        }
    }
}
