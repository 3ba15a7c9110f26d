//! In-process federation member backed by a [`QuadStore`]

use super::context::QueryContext;
use super::endpoint::{Endpoint, EndpointId, ProbeError, ProbeResult, SourceKind};
use crate::algebra::StatementPattern;
use crate::rdf::{GraphMatch, Quad, QuadStore, QuadStoreResult, RdfTerm};
use async_trait::async_trait;
use parking_lot::RwLock;

/// Local endpoint holding its data in memory
pub struct MemoryEndpoint {
    id: EndpointId,
    name: String,
    url: Option<String>,
    store: RwLock<QuadStore>,
}

impl MemoryEndpoint {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id: EndpointId::new(id),
            url: None,
            store: RwLock::new(QuadStore::new()),
        }
    }

    /// Make the endpoint addressable as a `SERVICE` target
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn insert(&self, quad: Quad) -> QuadStoreResult<()> {
        self.store.write().insert(quad)
    }

    /// Insert many quads, skipping duplicates
    pub fn extend(&self, quads: impl IntoIterator<Item = Quad>) {
        let mut store = self.store.write();
        for quad in quads {
            let _ = store.insert(quad);
        }
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }
}

#[async_trait]
impl Endpoint for MemoryEndpoint {
    fn id(&self) -> &EndpointId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    async fn probe(&self, pattern: &StatementPattern, ctx: &QueryContext) -> ProbeResult<bool> {
        if ctx.is_aborted() {
            return Err(ProbeError::Cancelled);
        }

        let predicate = match &pattern.predicate.value {
            None => None,
            Some(RdfTerm::NamedNode(p)) => Some(p),
            // only IRIs can be predicates
            Some(_) => return Ok(false),
        };
        let graph = match &pattern.context {
            None => GraphMatch::Any,
            Some(var) => match &var.value {
                None => GraphMatch::AnyNamed,
                Some(RdfTerm::NamedNode(g)) => GraphMatch::Named(g.clone()),
                Some(_) => return Ok(false),
            },
        };

        let store = self.store.read();
        Ok(store.contains_match(
            pattern.subject.value.as_ref(),
            predicate,
            pattern.object.value.as_ref(),
            &graph,
        ))
    }
}
