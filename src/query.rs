use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operation names. Together with the parameter tuple they form the cache
/// key, so re-triggering after a parameter change addresses a distinct entry.
pub const OP_LEADS: &str = "leads";
pub const OP_CONNECTION: &str = "connection";
pub const OP_MODELS: &str = "models";

/// Per-operation automatic retry budgets, applied to transport failures
/// only. The numbers are defaults, not invariants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueryConfig {
    pub search_retries: u32,
    pub connection_retries: u32,
    pub model_retries: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            search_retries: 2,
            connection_retries: 1,
            model_retries: 0,
        }
    }
}

/// Cache key: operation name plus every parameter that affects the result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey {
    pub op: String,
    pub params: Vec<String>,
}

impl QueryKey {
    pub fn new(op: &str, params: impl IntoIterator<Item = String>) -> Self {
        Self {
            op: op.to_string(),
            params: params.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Idle,
    Fetching,
    Success,
    Error,
}

/// What the rendering layer sees for one entry. `data` is type-erased JSON:
/// every payload crosses IPC as JSON anyway, and it lets one cache serve
/// leads, diagnostics text, and model catalogs alike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryState {
    pub status: QueryStatus,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub retries_remaining: u32,
    /// Unix ms of the last settle (success or error).
    pub last_fetched_at: Option<i64>,
}

impl QueryState {
    pub fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            retries_remaining: 0,
            last_fetched_at: None,
        }
    }
}

/// Event payload pushed to the frontend on every state transition.
#[derive(Debug, Clone, Serialize)]
pub struct QueryUpdate {
    pub key: QueryKey,
    pub state: QueryState,
}

/// A re-callable boundary fetch. The cache calls it once per attempt, so
/// transparent retries never reuse a spent future.
pub type FetchFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

type Notifier = Arc<dyn Fn(&QueryKey, &QueryState) + Send + Sync>;

struct Entry {
    state: QueryState,
    /// Monotonic id of the in-flight (or last) fetch for this entry. A
    /// completion is committed only if its id still matches, so a late
    /// resolve from a replaced flight can never clobber newer state.
    flight: u64,
}

struct CacheInner {
    entries: HashMap<QueryKey, Entry>,
    /// The key the active view currently addresses, per operation.
    /// Last-key-wins: completions for any other key are discarded.
    active: HashMap<String, QueryKey>,
    next_flight: u64,
}

/// Keyed cache of manually-triggered async operations.
///
/// State machine per entry: idle → fetching → success | error, with
/// fetching re-entered on every manual trigger. There is no automatic
/// trigger of any kind: an entry only leaves idle when a caller asks.
/// Cheap to clone; clones share the same cache.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Mutex<CacheInner>>,
    notifier: Notifier,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_notifier(|_, _| {})
    }

    /// `notify` is called on every state transition (outside the cache
    /// lock), typically wired to a Tauri event emit.
    pub fn with_notifier(notify: impl Fn(&QueryKey, &QueryState) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: HashMap::new(),
                active: HashMap::new(),
                next_flight: 0,
            })),
            notifier: Arc::new(notify),
        }
    }

    /// Trigger the operation behind `key`.
    ///
    /// Returns false (and starts nothing) when the same key is already
    /// fetching, which is the single-flight guarantee. Otherwise the entry enters
    /// `fetching` with a full retry budget and the fetch runs on the async
    /// runtime; triggering works from success and error alike.
    ///
    /// A key change for the same operation supersedes the previous entry:
    /// it is dropped, and its in-flight completion (if any) will be
    /// discarded on arrival. That supersession is the only cancellation
    /// mechanism; there is no client-side timeout.
    pub fn trigger(&self, key: QueryKey, retries: u32, fetch: FetchFn) -> bool {
        let (flight, state) = {
            let mut inner = self.inner.lock().expect("query cache lock poisoned");

            if let Some(prev) = inner.active.get(&key.op).cloned() {
                if prev != key && inner.entries.remove(&prev).is_some() {
                    tracing::debug!(op = %key.op, "superseded previous key");
                }
            }
            inner.active.insert(key.op.clone(), key.clone());

            if inner
                .entries
                .get(&key)
                .is_some_and(|e| e.state.status == QueryStatus::Fetching)
            {
                return false;
            }

            inner.next_flight += 1;
            let flight = inner.next_flight;
            let entry = inner.entries.entry(key.clone()).or_insert(Entry {
                state: QueryState::idle(),
                flight: 0,
            });
            entry.flight = flight;
            entry.state.status = QueryStatus::Fetching;
            entry.state.error = None;
            entry.state.retries_remaining = retries;
            (flight, entry.state.clone())
        };
        (self.notifier)(&key, &state);

        let cache = self.clone();
        let task_key = key;
        tokio::spawn(async move {
            cache.run_flight(task_key, flight, retries, fetch).await;
        });
        true
    }

    /// Remove an entry entirely (e.g. the operator dismissed the result
    /// panel). Re-triggering afterwards starts a fresh idle → fetching
    /// cycle with a full retry budget.
    pub fn dispose(&self, key: &QueryKey) {
        let removed = {
            let mut inner = self.inner.lock().expect("query cache lock poisoned");
            if inner.active.get(&key.op) == Some(key) {
                inner.active.remove(&key.op);
            }
            inner.entries.remove(key).is_some()
        };
        if removed {
            (self.notifier)(key, &QueryState::idle());
        }
    }

    /// Dispose whatever key is currently active for `op`.
    pub fn dispose_op(&self, op: &str) {
        let key = {
            let inner = self.inner.lock().expect("query cache lock poisoned");
            inner.active.get(op).cloned()
        };
        if let Some(key) = key {
            self.dispose(&key);
        }
    }

    /// Snapshot of one entry's state, if the entry exists.
    pub fn state(&self, key: &QueryKey) -> Option<QueryState> {
        let inner = self.inner.lock().expect("query cache lock poisoned");
        inner.entries.get(key).map(|e| e.state.clone())
    }

    /// The active key and state for an operation, if it was ever triggered.
    pub fn op_state(&self, op: &str) -> Option<(QueryKey, QueryState)> {
        let inner = self.inner.lock().expect("query cache lock poisoned");
        let key = inner.active.get(op)?;
        let entry = inner.entries.get(key)?;
        Some((key.clone(), entry.state.clone()))
    }

    async fn run_flight(self, key: QueryKey, flight: u64, retries: u32, fetch: FetchFn) {
        let mut attempt: u32 = 0;
        loop {
            match fetch().await {
                Ok(data) => {
                    self.commit(&key, flight, Ok(data));
                    return;
                }
                Err(err) => {
                    if attempt >= retries {
                        self.commit(&key, flight, Err(err));
                        return;
                    }
                    attempt += 1;
                    // Transparent retry: the entry stays `fetching`. Stop
                    // early if the flight was superseded or disposed.
                    if !self.note_retry(&key, flight) {
                        tracing::debug!(op = %key.op, "abandoning retries for replaced flight");
                        return;
                    }
                    tracing::debug!(op = %key.op, attempt, "transport failure, retrying: {err}");
                }
            }
        }
    }

    /// Decrement the visible retry budget. Returns false when this flight
    /// no longer owns the entry.
    fn note_retry(&self, key: &QueryKey, flight: u64) -> bool {
        let state = {
            let mut inner = self.inner.lock().expect("query cache lock poisoned");
            if inner.active.get(&key.op) != Some(key) {
                return false;
            }
            let Some(entry) = inner.entries.get_mut(key) else {
                return false;
            };
            if entry.flight != flight {
                return false;
            }
            entry.state.retries_remaining = entry.state.retries_remaining.saturating_sub(1);
            entry.state.clone()
        };
        (self.notifier)(key, &state);
        true
    }

    fn commit(&self, key: &QueryKey, flight: u64, result: Result<Value, String>) {
        let state = {
            let mut inner = self.inner.lock().expect("query cache lock poisoned");
            if inner.active.get(&key.op) != Some(key) {
                tracing::debug!(op = %key.op, "discarding completion for superseded key");
                return;
            }
            let Some(entry) = inner.entries.get_mut(key) else {
                tracing::debug!(op = %key.op, "discarding completion for disposed key");
                return;
            };
            if entry.flight != flight {
                tracing::debug!(op = %key.op, "discarding completion for stale flight");
                return;
            }
            entry.state.last_fetched_at = Some(chrono::Utc::now().timestamp_millis());
            match result {
                Ok(data) => {
                    entry.state.status = QueryStatus::Success;
                    entry.state.data = Some(data);
                    entry.state.error = None;
                }
                Err(err) => {
                    entry.state.status = QueryStatus::Error;
                    entry.state.error = Some(err);
                }
            }
            entry.state.clone()
        };
        (self.notifier)(key, &state);
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    fn key(op: &str, params: &[&str]) -> QueryKey {
        QueryKey::new(op, params.iter().map(|p| p.to_string()))
    }

    /// Fetch that counts calls and returns `value` immediately.
    fn counting_ok(calls: Arc<AtomicU32>, value: Value) -> FetchFn {
        Arc::new(move || {
            let calls = calls.clone();
            let value = value.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            })
        })
    }

    /// Fetch that counts calls and always fails.
    fn counting_err(calls: Arc<AtomicU32>, msg: &str) -> FetchFn {
        let msg = msg.to_string();
        Arc::new(move || {
            let calls = calls.clone();
            let msg = msg.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(msg)
            })
        })
    }

    /// Fetch that counts calls and blocks until the semaphore has a permit.
    fn gated_ok(calls: Arc<AtomicU32>, gate: Arc<Semaphore>, value: Value) -> FetchFn {
        Arc::new(move || {
            let calls = calls.clone();
            let gate = gate.clone();
            let value = value.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let _permit = gate.acquire_owned().await.map_err(|e| e.to_string())?;
                Ok(value)
            })
        })
    }

    async fn wait_for(cache: &QueryCache, key: &QueryKey, pred: impl Fn(&QueryState) -> bool) {
        for _ in 0..400 {
            if cache.state(key).is_some_and(|s| pred(&s)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition never reached for {key:?}: {:?}", cache.state(key));
    }

    #[tokio::test]
    async fn entries_are_idle_until_triggered() {
        let cache = QueryCache::new();
        assert!(cache.state(&key(OP_MODELS, &["sk"])).is_none());
        assert!(cache.op_state(OP_MODELS).is_none());
    }

    #[tokio::test]
    async fn single_flight_per_key() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicU32::new(0));
        let gate = Arc::new(Semaphore::new(0));
        let k = key(OP_CONNECTION, &[]);

        let fetch = gated_ok(calls.clone(), gate.clone(), json!("pong"));
        assert!(cache.trigger(k.clone(), 0, fetch.clone()));
        wait_for(&cache, &k, |s| s.status == QueryStatus::Fetching).await;
        // Second trigger for the identical key while in flight is a no-op.
        assert!(!cache.trigger(k.clone(), 0, fetch));

        gate.add_permits(4);
        wait_for(&cache, &k, |s| s.status == QueryStatus::Success).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_are_transparent_and_bounded() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicU32::new(0));
        let k = key(OP_LEADS, &["Kyiv", "shoes", "sk", "m"]);

        // Fails twice, then succeeds, within a budget of 2 retries.
        let inner_calls = calls.clone();
        let fetch: FetchFn = Arc::new(move || {
            let calls = inner_calls.clone();
            Box::pin(async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("connection reset".to_string())
                } else {
                    Ok(json!(["lead"]))
                }
            })
        });
        assert!(cache.trigger(k.clone(), 2, fetch));
        wait_for(&cache, &k, |s| s.status == QueryStatus::Success).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let state = cache.state(&k).unwrap();
        assert!(state.error.is_none());
        assert!(state.last_fetched_at.is_some());
    }

    #[tokio::test]
    async fn exhausted_budget_surfaces_the_error() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicU32::new(0));
        let k = key(OP_CONNECTION, &[]);

        assert!(cache.trigger(k.clone(), 1, counting_err(calls.clone(), "backend down")));
        wait_for(&cache, &k, |s| s.status == QueryStatus::Error).await;
        // One initial attempt plus one retry.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.state(&k).unwrap().error.as_deref(), Some("backend down"));
    }

    #[tokio::test]
    async fn manual_refetch_resets_the_budget() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicU32::new(0));
        let k = key(OP_CONNECTION, &[]);
        let fetch = counting_err(calls.clone(), "down");

        assert!(cache.trigger(k.clone(), 1, fetch.clone()));
        wait_for(&cache, &k, |s| s.status == QueryStatus::Error).await;
        // Re-trigger from error: allowed, with a full fresh budget.
        assert!(cache.trigger(k.clone(), 1, fetch));
        wait_for(&cache, &k, |s| s.status == QueryStatus::Error).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn refetch_from_success_forces_refresh() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicU32::new(0));
        let k = key(OP_MODELS, &["sk"]);
        let fetch = counting_ok(calls.clone(), json!([{ "id": "m" }]));

        assert!(cache.trigger(k.clone(), 0, fetch.clone()));
        wait_for(&cache, &k, |s| s.status == QueryStatus::Success).await;
        assert!(cache.trigger(k.clone(), 0, fetch));
        wait_for(&cache, &k, |s| s.status == QueryStatus::Success).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn late_completion_of_superseded_key_is_discarded() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicU32::new(0));
        let gate = Arc::new(Semaphore::new(0));
        let old = key(OP_LEADS, &["Kyiv", "shoes", "old-key", "m"]);
        let new = key(OP_LEADS, &["Kyiv", "shoes", "new-key", "m"]);

        // Old key hangs at the boundary.
        assert!(cache.trigger(old.clone(), 0, gated_ok(calls.clone(), gate.clone(), json!("old"))));
        wait_for(&cache, &old, |s| s.status == QueryStatus::Fetching).await;

        // Changing the api key re-addresses a distinct entry.
        assert!(cache.trigger(new.clone(), 0, counting_ok(calls.clone(), json!("new"))));
        wait_for(&cache, &new, |s| s.status == QueryStatus::Success).await;

        // The old flight resolves late; its result must not be committed.
        gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.state(&old).is_none());
        let (active, state) = cache.op_state(OP_LEADS).unwrap();
        assert_eq!(active, new);
        assert_eq!(state.data, Some(json!("new")));
    }

    #[tokio::test]
    async fn empty_result_is_a_success_not_an_error() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicU32::new(0));
        let k = key(OP_LEADS, &["Nowhere", "shoes", "sk", "m"]);

        assert!(cache.trigger(k.clone(), 2, counting_ok(calls.clone(), json!([]))));
        wait_for(&cache, &k, |s| s.status == QueryStatus::Success).await;
        let state = cache.state(&k).unwrap();
        assert_eq!(state.data, Some(json!([])));
        assert!(state.error.is_none());
        // Empty data never consumes the retry budget.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dispose_removes_the_entry_and_restores_the_full_budget() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicU32::new(0));
        let k = key(OP_CONNECTION, &[]);
        let fetch = counting_err(calls.clone(), "down");

        assert!(cache.trigger(k.clone(), 1, fetch.clone()));
        wait_for(&cache, &k, |s| s.status == QueryStatus::Error).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cache.dispose(&k);
        assert!(cache.state(&k).is_none());

        // Fresh cycle after disposal: full budget of 1 retry again.
        assert!(cache.trigger(k.clone(), 1, fetch));
        wait_for(&cache, &k, |s| s.status == QueryStatus::Error).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn notifier_sees_every_transition() {
        let seen: Arc<Mutex<Vec<QueryStatus>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let cache = QueryCache::with_notifier(move |_, state| {
            sink.lock().unwrap().push(state.status);
        });
        let calls = Arc::new(AtomicU32::new(0));
        let k = key(OP_MODELS, &["sk"]);

        cache.trigger(k.clone(), 0, counting_ok(calls, json!([])));
        wait_for(&cache, &k, |s| s.status == QueryStatus::Success).await;
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, vec![QueryStatus::Fetching, QueryStatus::Success]);
    }
}
