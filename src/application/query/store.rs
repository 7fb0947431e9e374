//! Cache state machine.
//!
//! Every transition of a `QueryEntry` goes through this type: observing a key,
//! starting a fetch, committing a settlement, invalidating and evicting. It
//! holds no channels and takes the current instant as a parameter, so the
//! worker that owns it stays the only writer and the transitions can be tested
//! without a runtime.

use super::entry::{QueryEntry, QueryStatus, RequestToken};
use crate::domain::errors::DashboardError;
use chrono::Utc;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// What the caller must do after a key was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Issue a fetch carrying this token.
    Fetch(RequestToken),
    /// A fetch is already outstanding; share its result.
    Attached,
    /// Cached data is fresh; nothing to do.
    Fresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Committed,
    /// A newer fetch owns the entry; the result was dropped.
    Superseded,
    /// The key is no longer cached.
    Unknown,
}

struct Record<V> {
    entry: QueryEntry<V>,
    fetched_at: Option<Instant>,
    last_observed: Instant,
    /// Newest token that was in flight when the key was invalidated. Its
    /// result, and any older one, commits as stale.
    stale_through: Option<RequestToken>,
}

pub struct QueryStore<K, V> {
    records: HashMap<K, Record<V>>,
    next_token: u64,
    stale_time: Duration,
}

impl<K, V> QueryStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(stale_time: Duration) -> Self {
        Self {
            records: HashMap::new(),
            next_token: 0,
            stale_time,
        }
    }

    pub fn entry(&self, key: &K) -> Option<&QueryEntry<V>> {
        self.records.get(key).map(|r| &r.entry)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Register interest in `key`, creating the entry on first sight.
    pub fn observe(&mut self, key: &K, now: Instant) -> Observation {
        let stale_time = self.stale_time;
        let needs_fetch = match self.records.get_mut(key) {
            None => true,
            Some(record) => {
                record.last_observed = now;
                match record.entry.in_flight {
                    Some(token) if record.stale_through.is_some_and(|t| token <= t) => true,
                    Some(_) => return Observation::Attached,
                    None => {
                        let fresh = record.entry.status == QueryStatus::Success
                            && !record.entry.is_stale
                            && record
                                .fetched_at
                                .is_some_and(|at| now.saturating_duration_since(at) < stale_time);
                        !fresh
                    }
                }
            }
        };

        if needs_fetch {
            Observation::Fetch(self.begin_fetch(key, now))
        } else {
            Observation::Fresh
        }
    }

    /// Move `key` to `Loading` under a new token, superseding any outstanding
    /// request. Previous data stays visible until the new result commits.
    pub fn begin_fetch(&mut self, key: &K, now: Instant) -> RequestToken {
        self.next_token += 1;
        let token = RequestToken(self.next_token);

        let record = self.records.entry(key.clone()).or_insert_with(|| Record {
            entry: QueryEntry::idle(),
            fetched_at: None,
            last_observed: now,
            stale_through: None,
        });
        record.entry.status = QueryStatus::Loading;
        record.entry.error = None;
        record.entry.in_flight = Some(token);
        token
    }

    /// Single commit path for fetch results.
    pub fn settle(
        &mut self,
        key: &K,
        token: RequestToken,
        result: Result<V, DashboardError>,
        now: Instant,
    ) -> Settlement {
        let Some(record) = self.records.get_mut(key) else {
            return Settlement::Unknown;
        };
        if record.entry.in_flight != Some(token) {
            return Settlement::Superseded;
        }

        let entry = &mut record.entry;
        match result {
            Ok(data) => {
                entry.status = QueryStatus::Success;
                entry.data = Some(data);
                entry.error = None;
            }
            Err(error) => {
                entry.status = QueryStatus::Error;
                entry.data = None;
                entry.error = Some(error);
            }
        }
        entry.in_flight = None;
        entry.is_stale = record.stale_through.is_some_and(|t| token <= t);
        record.stale_through = None;
        entry.last_fetched_at = Some(Utc::now());
        record.fetched_at = Some(now);
        Settlement::Committed
    }

    /// Mark `key` stale so the next observation refetches. A fetch already in
    /// flight does not clear the mark when it settles. Returns whether the key
    /// was cached.
    pub fn invalidate(&mut self, key: &K) -> bool {
        match self.records.get_mut(key) {
            Some(record) => {
                record.entry.is_stale = true;
                if let Some(token) = record.entry.in_flight {
                    record.stale_through = Some(token);
                }
                true
            }
            None => false,
        }
    }

    /// Refresh the observation clock of `key` (e.g. when its last observer leaves).
    pub fn touch(&mut self, key: &K, now: Instant) {
        if let Some(record) = self.records.get_mut(key) {
            record.last_observed = now;
        }
    }

    /// Evict entries that nobody observes, have nothing in flight, and were
    /// last observed more than `gc_time` ago. Returns the evicted keys.
    pub fn collect_garbage(
        &mut self,
        now: Instant,
        gc_time: Duration,
        is_observed: impl Fn(&K) -> bool,
    ) -> Vec<K> {
        let expired: Vec<K> = self
            .records
            .iter()
            .filter(|(key, record)| {
                record.entry.in_flight.is_none()
                    && !is_observed(key)
                    && now.saturating_duration_since(record.last_observed) >= gc_time
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.records.remove(key);
        }
        expired
    }
}
