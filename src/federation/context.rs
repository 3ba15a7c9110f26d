//! Per-query context
//!
//! Created when optimization starts and shared (via `Arc`) with every stage
//! and every probe task of that query.

use super::endpoint::Endpoint;
use super::registry::{DatasetRestriction, EndpointRegistry};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::debug;

static NEXT_QUERY_ID: AtomicU64 = AtomicU64::new(1);

/// Query identifier, unique within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(pub u64);

impl QueryId {
    fn next() -> Self {
        QueryId(NEXT_QUERY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// State of one top-level query
pub struct QueryContext {
    id: QueryId,
    /// No deadline when `None`
    deadline: Option<Instant>,
    aborted: watch::Sender<bool>,
    registry: Arc<EndpointRegistry>,
    dataset: DatasetRestriction,
}

impl QueryContext {
    /// Create a context whose budget starts now
    pub fn new(
        registry: Arc<EndpointRegistry>,
        dataset: DatasetRestriction,
        max_query_time: Option<Duration>,
    ) -> Self {
        let id = QueryId::next();
        debug!("Created query context {} (budget {:?})", id, max_query_time);
        Self {
            id,
            deadline: max_query_time.map(|budget| Instant::now() + budget),
            aborted: watch::Sender::new(false),
            registry,
            dataset,
        }
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    /// Time left before the deadline; `None` when the query has no deadline
    pub fn remaining_time_budget(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Mark the query aborted and wake every task waiting in [`aborted`].
    ///
    /// [`aborted`]: QueryContext::aborted
    pub fn abort(&self) {
        if !self.aborted.send_replace(true) {
            debug!("Query {} aborted", self.id);
        }
    }

    pub fn is_aborted(&self) -> bool {
        *self.aborted.borrow()
    }

    /// Resolves once the query is aborted, immediately if it already is
    pub async fn aborted(&self) {
        let mut rx = self.aborted.subscribe();
        let _ = rx.wait_for(|aborted| *aborted).await;
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    pub fn dataset(&self) -> &DatasetRestriction {
        &self.dataset
    }

    /// Federation members visible to this query
    pub fn members(&self) -> Vec<Arc<dyn Endpoint>> {
        self.registry.members(&self.dataset)
    }
}
