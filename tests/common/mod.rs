//! Shared fixtures for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use samyama_federation::{
    Endpoint, EndpointId, EndpointRegistry, MemoryEndpoint, NamedNode, ProbeError, ProbeResult,
    Quad, QueryContext, RdfTerm, StatementPattern,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn iri(s: &str) -> NamedNode {
    NamedNode::new(s).unwrap()
}

/// Number of probes running at once, shared between endpoints
#[derive(Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Endpoint answering probes from a fixed predicate list, with optional
/// latency and failure
pub struct ScriptedEndpoint {
    id: EndpointId,
    predicates: HashSet<String>,
    delay: Option<Duration>,
    failure: Option<ProbeError>,
    probes: AtomicUsize,
    gauge: Arc<Gauge>,
}

impl ScriptedEndpoint {
    pub fn new(id: &str, predicates: &[&str]) -> Self {
        Self {
            id: EndpointId::new(id),
            predicates: predicates.iter().map(|p| p.to_string()).collect(),
            delay: None,
            failure: None,
            probes: AtomicUsize::new(0),
            gauge: Arc::new(Gauge::default()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self, error: ProbeError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn with_gauge(mut self, gauge: Arc<Gauge>) -> Self {
        self.gauge = gauge;
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Endpoint for ScriptedEndpoint {
    fn id(&self) -> &EndpointId {
        &self.id
    }

    fn name(&self) -> &str {
        self.id.as_str()
    }

    async fn probe(&self, pattern: &StatementPattern, _ctx: &QueryContext) -> ProbeResult<bool> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.gauge.enter();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.gauge.leave();

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(match &pattern.predicate.value {
            None => !self.predicates.is_empty(),
            Some(RdfTerm::NamedNode(p)) => self.predicates.contains(p.as_str()),
            Some(_) => false,
        })
    }
}

pub fn member<E: Endpoint + 'static>(endpoint: &Arc<E>) -> Arc<dyn Endpoint> {
    endpoint.clone()
}

/// Registry over the given endpoints, in order
pub fn registry(endpoints: Vec<Arc<dyn Endpoint>>) -> Arc<EndpointRegistry> {
    let registry = EndpointRegistry::new();
    for endpoint in endpoints {
        registry.add(endpoint);
    }
    Arc::new(registry)
}

/// In-memory endpoint holding `(s, p, o)` IRI triples
pub fn memory(id: &str, triples: &[(&str, &str, &str)]) -> MemoryEndpoint {
    let endpoint = MemoryEndpoint::new(id);
    for (s, p, o) in triples {
        endpoint.insert(Quad::new(iri(s), iri(p), iri(o))).unwrap();
    }
    endpoint
}
