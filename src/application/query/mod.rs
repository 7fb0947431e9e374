//! Keyed query cache.
//!
//! A single worker task owns every `QueryEntry` and is the only writer; the
//! rest of the process talks to it through `QueryClient` commands and reads the
//! published snapshot. Concurrent subscriptions to one key share one fetch,
//! and results from superseded fetches are dropped by request token.

pub mod client;
pub mod entry;
pub mod retry;
pub mod store;

pub use client::{QueryCacheConfig, QueryClient, QueryFn, QueryObserver, Snapshot, query_fn};
pub use entry::{QueryEntry, QueryStatus, RequestToken};
pub use retry::RetryPolicy;
