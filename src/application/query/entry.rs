use crate::domain::errors::DashboardError;
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

impl QueryStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, QueryStatus::Success | QueryStatus::Error)
    }
}

/// Identity of one issued fetch. Only the token currently recorded on an
/// entry may commit a result; any other settlement is a superseded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(pub(crate) u64);

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-key cache record as seen by observers.
///
/// `status == Success` implies `data` is present and `error` absent;
/// `status == Error` implies the reverse. While `Loading`, `data` may still
/// hold the previous result (stale-while-revalidate).
#[derive(Debug, Clone, PartialEq)]
pub struct QueryEntry<V> {
    pub status: QueryStatus,
    pub data: Option<V>,
    pub error: Option<DashboardError>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub in_flight: Option<RequestToken>,
    /// Marked by invalidation; cleared by the next commit.
    pub is_stale: bool,
}

impl<V> QueryEntry<V> {
    pub fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            last_fetched_at: None,
            in_flight: None,
            is_stale: false,
        }
    }

    /// Placeholder for a key whose subscription the cache has not processed yet.
    pub fn loading() -> Self {
        Self {
            status: QueryStatus::Loading,
            ..Self::idle()
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Loading while still showing a previous result.
    pub fn is_revalidating(&self) -> bool {
        self.is_loading() && self.data.is_some()
    }
}

impl<V> Default for QueryEntry<V> {
    fn default() -> Self {
        Self::idle()
    }
}
