use super::entry::{QueryEntry, QueryStatus, RequestToken};
use super::retry::RetryPolicy;
use super::store::{Observation, QueryStore, Settlement};
use crate::domain::errors::DashboardError;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Fetcher invoked with the key it should load.
pub type QueryFn<K, V> =
    Arc<dyn Fn(K) -> BoxFuture<'static, Result<V, DashboardError>> + Send + Sync>;

/// Wrap an async closure as a `QueryFn`.
pub fn query_fn<K, V, F, Fut>(f: F) -> QueryFn<K, V>
where
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, DashboardError>> + Send + 'static,
{
    Arc::new(move |key| Box::pin(f(key)))
}

/// Read-only view of every cached entry, republished after each transition.
pub type Snapshot<K, V> = HashMap<K, QueryEntry<V>>;

#[derive(Debug, Clone)]
pub struct QueryCacheConfig {
    /// How long a successful result is served without refetching.
    pub stale_time: Duration,
    /// How long an unobserved entry survives before eviction.
    pub gc_time: Duration,
    pub gc_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(30),
            gc_time: Duration::from_secs(300),
            gc_interval: Duration::from_secs(60),
            retry: RetryPolicy::none(),
        }
    }
}

enum QueryCommand<K, V> {
    Subscribe {
        key: K,
        fetcher: QueryFn<K, V>,
        ack: oneshot::Sender<()>,
    },
    Unsubscribe {
        key: K,
    },
    Invalidate {
        key: K,
    },
    Refetch {
        key: K,
    },
    /// Acknowledged once every command sent before it has been applied.
    Sync {
        ack: oneshot::Sender<()>,
    },
    Shutdown,
}

struct FetchOutcome<K, V> {
    key: K,
    token: RequestToken,
    result: Result<V, DashboardError>,
}

/// Owns the store. All writes to cache state happen on this task.
struct QueryCacheWorker<K, V> {
    store: QueryStore<K, V>,
    observers: HashMap<K, usize>,
    fetchers: HashMap<K, QueryFn<K, V>>,
    snapshot_tx: watch::Sender<Snapshot<K, V>>,
    cmd_rx: mpsc::UnboundedReceiver<QueryCommand<K, V>>,
    outcome_tx: mpsc::UnboundedSender<FetchOutcome<K, V>>,
    outcome_rx: mpsc::UnboundedReceiver<FetchOutcome<K, V>>,
    config: QueryCacheConfig,
}

impl<K, V> QueryCacheWorker<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn run(mut self) {
        info!(
            "QueryCache: worker started (stale_time={:?}, gc_time={:?})",
            self.config.stale_time, self.config.gc_time
        );
        let mut gc_interval = tokio::time::interval(self.config.gc_interval);
        gc_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe_cmd = self.cmd_rx.recv() => {
                    match maybe_cmd {
                        Some(QueryCommand::Shutdown) | None => break,
                        Some(cmd) => self.handle_command(cmd),
                    }
                }
                Some(outcome) = self.outcome_rx.recv() => {
                    self.handle_outcome(outcome);
                }
                _ = gc_interval.tick() => {
                    self.collect_garbage();
                }
            }
        }

        info!("QueryCache: worker stopped");
    }

    fn handle_command(&mut self, cmd: QueryCommand<K, V>) {
        let now = Instant::now();
        match cmd {
            QueryCommand::Subscribe { key, fetcher, ack } => {
                *self.observers.entry(key.clone()).or_insert(0) += 1;
                self.fetchers.insert(key.clone(), fetcher);
                match self.store.observe(&key, now) {
                    Observation::Fetch(token) => self.start_fetch(key.clone(), token),
                    Observation::Attached => {
                        debug!(key = ?key, "QueryCache: attached to in-flight fetch");
                    }
                    Observation::Fresh => {
                        debug!(key = ?key, "QueryCache: served from cache");
                    }
                }
                self.publish(&key);
                let _ = ack.send(());
            }
            QueryCommand::Unsubscribe { key } => {
                if let Some(count) = self.observers.get_mut(&key) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        self.observers.remove(&key);
                        self.store.touch(&key, now);
                    }
                }
            }
            QueryCommand::Invalidate { key } => {
                if !self.store.invalidate(&key) {
                    return;
                }
                if self.observers.contains_key(&key) {
                    debug!(key = ?key, "QueryCache: invalidated observed key, refetching");
                    self.refetch(key.clone(), now);
                } else {
                    debug!(key = ?key, "QueryCache: invalidated unobserved key");
                }
                self.publish(&key);
            }
            QueryCommand::Refetch { key } => {
                self.refetch(key.clone(), now);
                self.publish(&key);
            }
            QueryCommand::Sync { ack } => {
                let _ = ack.send(());
            }
            QueryCommand::Shutdown => {}
        }
    }

    fn refetch(&mut self, key: K, now: Instant) {
        if !self.fetchers.contains_key(&key) {
            warn!(key = ?key, "QueryCache: no fetcher registered, cannot refetch");
            return;
        }
        let token = self.store.begin_fetch(&key, now);
        self.start_fetch(key, token);
    }

    fn start_fetch(&self, key: K, token: RequestToken) {
        let Some(fetcher) = self.fetchers.get(&key).cloned() else {
            warn!(key = ?key, %token, "QueryCache: no fetcher registered for key");
            return;
        };
        debug!(key = ?key, %token, "QueryCache: issuing fetch");

        let retry = self.config.retry.clone();
        let outcome_tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let result = retry.run(|| fetcher(key.clone())).await;
            // The worker may already be gone during shutdown.
            let _ = outcome_tx.send(FetchOutcome { key, token, result });
        });
    }

    fn handle_outcome(&mut self, outcome: FetchOutcome<K, V>) {
        let FetchOutcome { key, token, result } = outcome;
        let failed = result.as_ref().err().cloned();

        match self.store.settle(&key, token, result, Instant::now()) {
            Settlement::Committed => {
                match failed {
                    Some(e) => warn!(key = ?key, %token, "QueryCache: fetch failed: {}", e),
                    None => debug!(key = ?key, %token, "QueryCache: fetch committed"),
                }
                self.publish(&key);
            }
            Settlement::Superseded => {
                debug!(key = ?key, %token, "QueryCache: discarded superseded result");
            }
            Settlement::Unknown => {
                debug!(key = ?key, %token, "QueryCache: discarded result for evicted key");
            }
        }
    }

    fn collect_garbage(&mut self) {
        let observers = &self.observers;
        let evicted = self.store.collect_garbage(Instant::now(), self.config.gc_time, |key| {
            observers.contains_key(key)
        });
        if evicted.is_empty() {
            return;
        }

        debug!("QueryCache: evicted {} unobserved entries", evicted.len());
        for key in &evicted {
            self.fetchers.remove(key);
        }
        self.snapshot_tx.send_modify(|snapshot| {
            for key in &evicted {
                snapshot.remove(key);
            }
        });
    }

    fn publish(&self, key: &K) {
        let entry = self.store.entry(key).cloned();
        self.snapshot_tx.send_modify(|snapshot| match entry {
            Some(entry) => {
                snapshot.insert(key.clone(), entry);
            }
            None => {
                snapshot.remove(key);
            }
        });
    }
}

/// Handle to the query cache. Cheap to clone; every clone talks to the same
/// worker task.
pub struct QueryClient<K, V> {
    cmd_tx: mpsc::UnboundedSender<QueryCommand<K, V>>,
    snapshot_rx: watch::Receiver<Snapshot<K, V>>,
}

impl<K, V> Clone for QueryClient<K, V> {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            snapshot_rx: self.snapshot_rx.clone(),
        }
    }
}

impl<K, V> QueryClient<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Start the cache worker on the current runtime.
    pub fn spawn(config: QueryCacheConfig) -> Self {
        Self::spawn_on(&tokio::runtime::Handle::current(), config)
    }

    /// Start the cache worker on `runtime`, callable from outside it (e.g. the UI thread).
    pub fn spawn_on(runtime: &tokio::runtime::Handle, config: QueryCacheConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::new());

        let worker = QueryCacheWorker {
            store: QueryStore::new(config.stale_time),
            observers: HashMap::new(),
            fetchers: HashMap::new(),
            snapshot_tx,
            cmd_rx,
            outcome_tx,
            outcome_rx,
            config,
        };
        runtime.spawn(worker.run());

        Self {
            cmd_tx,
            snapshot_rx,
        }
    }

    /// Observe `key`, fetching it with `fetcher` unless a fresh result is
    /// cached or a fetch is already in flight. Never blocks.
    pub fn subscribe(&self, key: K, fetcher: QueryFn<K, V>) -> QueryObserver<K, V> {
        let (ack_tx, ack_rx) = oneshot::channel();
        let sent = self
            .cmd_tx
            .send(QueryCommand::Subscribe {
                key: key.clone(),
                fetcher,
                ack: ack_tx,
            })
            .is_ok();
        if !sent {
            warn!(key = ?key, "QueryCache: worker stopped, subscription ignored");
        }

        QueryObserver {
            key,
            client: self.clone(),
            snapshot_rx: self.snapshot_rx.clone(),
            ack: Some(ack_rx),
        }
    }

    /// Mark `key` stale. Observed keys refetch immediately while keeping their
    /// data visible; unobserved keys refetch on their next subscription.
    pub fn invalidate(&self, key: &K) {
        let _ = self
            .cmd_tx
            .send(QueryCommand::Invalidate { key: key.clone() });
    }

    /// Issue a new fetch for `key`, superseding any outstanding one.
    pub fn refetch(&self, key: &K) {
        let _ = self.cmd_tx.send(QueryCommand::Refetch { key: key.clone() });
    }

    /// Latest published entry for `key`, if cached.
    pub fn entry(&self, key: &K) -> Option<QueryEntry<V>> {
        self.snapshot_rx.borrow().get(key).cloned()
    }

    pub fn cached_keys(&self) -> Vec<K> {
        self.snapshot_rx.borrow().keys().cloned().collect()
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(QueryCommand::Shutdown);
    }
}

/// Live subscription to one key. Dropping it releases the observation; the
/// entry stays cached until garbage-collected.
pub struct QueryObserver<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    key: K,
    client: QueryClient<K, V>,
    snapshot_rx: watch::Receiver<Snapshot<K, V>>,
    ack: Option<oneshot::Receiver<()>>,
}

impl<K, V> QueryObserver<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Current entry for rendering. A key the worker has not registered yet
    /// reads as `Loading`.
    pub fn current(&self) -> QueryEntry<V> {
        self.client.entry(&self.key).unwrap_or_else(QueryEntry::loading)
    }

    /// Wait until the key has no fetch in flight and holds a settled result.
    ///
    /// Commands issued before the call (subscription, invalidation, refetch)
    /// are applied first, so the result never predates them.
    pub async fn settled(&mut self) -> QueryEntry<V> {
        let ack = match self.ack.take() {
            Some(ack) => ack,
            None => {
                let (ack_tx, ack_rx) = oneshot::channel();
                let _ = self.client.cmd_tx.send(QueryCommand::Sync { ack: ack_tx });
                ack_rx
            }
        };
        let _ = ack.await;

        let key = self.key.clone();
        let settled = self.snapshot_rx.wait_for(|snapshot| {
            snapshot
                .get(&key)
                .is_some_and(|e| e.in_flight.is_none() && e.status.is_settled())
        });
        match settled.await {
            Ok(snapshot) => snapshot.get(&key).cloned().unwrap_or_else(QueryEntry::loading),
            Err(_) => QueryEntry {
                error: Some(DashboardError::network("query cache stopped")),
                status: QueryStatus::Error,
                ..QueryEntry::idle()
            },
        }
    }

    pub fn refetch(&self) {
        self.client.refetch(&self.key);
    }
}

impl<K, V> Drop for QueryObserver<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let _ = self.client.cmd_tx.send(QueryCommand::Unsubscribe {
            key: self.key.clone(),
        });
    }
}
