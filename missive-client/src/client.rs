//! Client fetch layer
//!
//! [`Client`] answers operations from its [`QueryCache`] and goes to the
//! [`Transport`] only for keys that have no usable result yet. Concurrent
//! callers for one key share a single request.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{Begin, CacheKey, LoadingGuard, QueryCache, QueryState, Snapshot};
use crate::error::{ClientError, TransportError};
use crate::operation::{Operation, OperationResult};
use crate::transport::Transport;

/// Bound on a single request when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Caching GraphQL client
///
/// Cloning is cheap; clones share the transport and the cache.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    cache: Arc<QueryCache>,
    timeout: Duration,
}

impl Client {
    /// Create a client with an empty cache
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            cache: Arc::new(QueryCache::new()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Result for `(query, variables)`, fetched at most once per key
    ///
    /// A cached result is returned as the same `Arc` every time. While a
    /// re-fetch is in flight the previous result is returned.
    pub async fn execute(&self, query: &str, variables: &Map<String, Value>) -> Arc<OperationResult> {
        self.run(query, variables, false).await
    }

    /// Fetch `(query, variables)` again even if a result is cached
    ///
    /// Subscribers keep seeing the previous result until the new one lands.
    pub async fn refetch(&self, query: &str, variables: &Map<String, Value>) -> Arc<OperationResult> {
        self.run(query, variables, true).await
    }

    /// Like [`Client::execute`], giving up when `token` is cancelled
    ///
    /// A cancelled fetch leaves the cache entry as it was before the call.
    pub async fn execute_with_cancel(
        &self,
        query: &str,
        variables: &Map<String, Value>,
        token: &CancellationToken,
    ) -> Result<Arc<OperationResult>, ClientError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("operation cancelled");
                Err(ClientError::Cancelled)
            }
            result = self.execute(query, variables) => Ok(result),
        }
    }

    /// Observe every snapshot of `(query, variables)`
    pub fn subscribe(&self, query: &str, variables: &Map<String, Value>) -> watch::Receiver<Snapshot> {
        self.cache.subscribe(&CacheKey::new(query, variables))
    }

    /// Current snapshot of `(query, variables)`
    pub fn snapshot(&self, query: &str, variables: &Map<String, Value>) -> Snapshot {
        self.cache.snapshot(&CacheKey::new(query, variables))
    }

    async fn run(&self, query: &str, variables: &Map<String, Value>, force: bool) -> Arc<OperationResult> {
        let key = CacheKey::new(query, variables);
        loop {
            match self.cache.begin(&key, force) {
                Begin::Cached(result) => return result,
                Begin::Fetch(guard) => return self.fetch(guard, query, variables).await,
                Begin::Wait(mut rx) => {
                    let finished = match rx.wait_for(|s| s.state != QueryState::Loading).await {
                        Ok(snapshot) if snapshot.state.is_terminal() => snapshot.result.clone(),
                        _ => None,
                    };
                    // None: the other fetch was abandoned, so try again
                    if let Some(result) = finished {
                        return result;
                    }
                }
            }
        }
    }

    async fn fetch(
        &self,
        guard: LoadingGuard,
        query: &str,
        variables: &Map<String, Value>,
    ) -> Arc<OperationResult> {
        let operation = Operation::new(query, variables.clone());
        debug!(timeout = ?self.timeout, "fetching operation");

        let result = match tokio::time::timeout(self.timeout, self.transport.send(&operation)).await {
            Ok(Ok(body)) => {
                let result = OperationResult::from(body);
                if let Some(error) = &result.error {
                    warn!(errors = error.graphql.len(), "response carried GraphQL errors");
                }
                result
            }
            Ok(Err(err)) => {
                warn!(error = %err, "request failed");
                OperationResult::network_error(err)
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "request timed out");
                OperationResult::network_error(TransportError::Timeout)
            }
        };

        guard.complete(result)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("entries", &self.cache.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Notify;

    use crate::operation::ResponseBody;

    const QUERY: &str = "{ users { id name messages { body } } }";

    #[derive(Default)]
    struct MockTransport {
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
        fail: bool,
    }

    impl MockTransport {
        fn gated(gate: &Arc<Notify>) -> Self {
            Self {
                gate: Some(gate.clone()),
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, _operation: &Operation) -> Result<ResponseBody, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(TransportError::Http("connection refused".to_string()));
            }
            Ok(ResponseBody {
                data: Some(json!({ "users": [] })),
                errors: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_second_execute_returns_same_result() {
        let transport = Arc::new(MockTransport::default());
        let client = Client::new(transport.clone());
        let vars = Map::new();

        let first = client.execute(QUERY, &vars).await;
        let second = client.execute(QUERY, &vars).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.calls(), 1);
        assert_eq!(client.snapshot(QUERY, &vars).state, QueryState::Success);
    }

    #[tokio::test]
    async fn test_distinct_variables_are_distinct_keys() {
        let transport = Arc::new(MockTransport::default());
        let client = Client::new(transport.clone());

        let mut vars = Map::new();
        client.execute(QUERY, &vars).await;
        vars.insert("first".to_string(), json!(1));
        client.execute(QUERY, &vars).await;

        assert_eq!(transport.calls(), 2);
        assert_eq!(client.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_executes_share_one_request() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(MockTransport::gated(&gate));
        let client = Client::new(transport.clone());
        let vars = Map::new();

        let (a, b, _) = tokio::join!(
            client.execute(QUERY, &vars),
            client.execute(QUERY, &vars),
            async {
                tokio::task::yield_now().await;
                gate.notify_one();
            }
        );

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_is_stored() {
        let transport = Arc::new(MockTransport {
            fail: true,
            ..MockTransport::default()
        });
        let client = Client::new(transport.clone());
        let vars = Map::new();

        let result = client.execute(QUERY, &vars).await;
        assert!(result.data.is_none());
        assert_eq!(
            result.error.as_ref().and_then(|e| e.network.clone()),
            Some(TransportError::Http("connection refused".to_string()))
        );
        assert_eq!(client.snapshot(QUERY, &vars).state, QueryState::Failed);

        // no automatic retry
        client.execute(QUERY, &vars).await;
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_a_network_error() {
        let gate = Arc::new(Notify::new());
        let client = Client::new(Arc::new(MockTransport::gated(&gate)))
            .with_timeout(Duration::from_millis(20));

        let result = client.execute(QUERY, &Map::new()).await;
        assert_eq!(
            result.error.as_ref().and_then(|e| e.network.clone()),
            Some(TransportError::Timeout)
        );
    }

    #[tokio::test]
    async fn test_cancel_restores_entry() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(MockTransport::gated(&gate));
        let client = Client::new(transport.clone());
        let vars = Map::new();
        let token = CancellationToken::new();

        let (result, _) = tokio::join!(client.execute_with_cancel(QUERY, &vars, &token), async {
            tokio::task::yield_now().await;
            token.cancel();
        });

        assert!(matches!(result, Err(ClientError::Cancelled)));
        assert_eq!(transport.calls(), 1);
        let snapshot = client.snapshot(QUERY, &vars);
        assert_eq!(snapshot.state, QueryState::Idle);
        assert!(snapshot.result.is_none());
    }

    #[tokio::test]
    async fn test_refetch_keeps_previous_result_visible() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(MockTransport::gated(&gate));
        let client = Client::new(transport.clone());
        let vars = Map::new();

        gate.notify_one();
        let first = client.execute(QUERY, &vars).await;

        let (second, _) = tokio::join!(client.refetch(QUERY, &vars), async {
            tokio::task::yield_now().await;
            let loading = client.snapshot(QUERY, &vars);
            assert!(loading.is_loading());
            assert!(Arc::ptr_eq(loading.result.as_ref().unwrap(), &first));

            // plain executes are answered from the previous result meanwhile
            assert!(Arc::ptr_eq(&client.execute(QUERY, &vars).await, &first));
            gate.notify_one();
        });

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(transport.calls(), 2);
        assert_eq!(client.snapshot(QUERY, &vars).state, QueryState::Success);
    }
}
