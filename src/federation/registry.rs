//! Endpoint registry
//!
//! Owned by the federation, shared with every query context. Registration
//! order is preserved and defines the order sources are reported in.

use super::endpoint::{Endpoint, EndpointId};
use crate::rdf::NamedNode;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Dataset restriction of a query
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DatasetRestriction {
    /// Restrict the federation to these members (all members when `None`)
    pub endpoints: Option<Vec<EndpointId>>,
    /// FROM graphs
    pub default_graphs: Vec<NamedNode>,
    /// FROM NAMED graphs
    pub named_graphs: Vec<NamedNode>,
}

impl DatasetRestriction {
    /// Restrict to the given members
    pub fn with_endpoints(mut self, endpoints: Vec<EndpointId>) -> Self {
        self.endpoints = Some(endpoints);
        self
    }
}

/// Registry of federation members
#[derive(Default)]
pub struct EndpointRegistry {
    endpoints: RwLock<IndexMap<EndpointId, Arc<dyn Endpoint>>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a member
    pub fn add(&self, endpoint: Arc<dyn Endpoint>) {
        debug!("Registering endpoint {} ({})", endpoint.id(), endpoint.name());
        self.endpoints
            .write()
            .insert(endpoint.id().clone(), endpoint);
    }

    /// Remove a member, keeping the order of the others
    pub fn remove(&self, id: &EndpointId) -> Option<Arc<dyn Endpoint>> {
        let removed = self.endpoints.write().shift_remove(id);
        if removed.is_some() {
            debug!("Removed endpoint {}", id);
        }
        removed
    }

    pub fn get(&self, id: &EndpointId) -> Option<Arc<dyn Endpoint>> {
        self.endpoints.read().get(id).cloned()
    }

    /// Find the member behind a `SERVICE` IRI, by URL first, then by id
    pub fn resolve(&self, iri: &str) -> Option<Arc<dyn Endpoint>> {
        let endpoints = self.endpoints.read();
        endpoints
            .values()
            .find(|e| e.endpoint_url() == Some(iri))
            .or_else(|| endpoints.get(&EndpointId::new(iri)))
            .cloned()
    }

    /// Members visible to a query
    pub fn members(&self, dataset: &DatasetRestriction) -> Vec<Arc<dyn Endpoint>> {
        let endpoints = self.endpoints.read();
        match &dataset.endpoints {
            None => endpoints.values().cloned().collect(),
            Some(ids) => ids
                .iter()
                .filter_map(|id| {
                    let endpoint = endpoints.get(id).cloned();
                    if endpoint.is_none() {
                        warn!("Dataset names unknown endpoint {}", id);
                    }
                    endpoint
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::StatementPattern;
    use crate::federation::{ProbeResult, QueryContext, SourceKind};
    use async_trait::async_trait;

    struct Fixed {
        id: EndpointId,
        url: Option<String>,
    }

    #[async_trait]
    impl Endpoint for Fixed {
        fn id(&self) -> &EndpointId {
            &self.id
        }

        fn name(&self) -> &str {
            self.id.as_str()
        }

        fn endpoint_url(&self) -> Option<&str> {
            self.url.as_deref()
        }

        fn kind(&self) -> SourceKind {
            SourceKind::Remote
        }

        async fn probe(&self, _: &StatementPattern, _: &QueryContext) -> ProbeResult<bool> {
            Ok(true)
        }
    }

    fn fixed(id: &str, url: Option<&str>) -> Arc<dyn Endpoint> {
        Arc::new(Fixed {
            id: EndpointId::new(id),
            url: url.map(str::to_string),
        })
    }

    #[test]
    fn test_members_follow_registration_order() {
        let registry = EndpointRegistry::new();
        registry.add(fixed("b", None));
        registry.add(fixed("a", None));
        registry.add(fixed("c", None));

        let ids: Vec<String> = registry
            .members(&DatasetRestriction::default())
            .iter()
            .map(|e| e.id().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);

        registry.remove(&EndpointId::new("a"));
        let ids: Vec<String> = registry
            .members(&DatasetRestriction::default())
            .iter()
            .map(|e| e.id().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_members_respect_restriction() {
        let registry = EndpointRegistry::new();
        registry.add(fixed("a", None));
        registry.add(fixed("b", None));

        let dataset = DatasetRestriction::default()
            .with_endpoints(vec![EndpointId::new("b"), EndpointId::new("missing")]);
        let members = registry.members(&dataset);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id().as_str(), "b");
    }

    #[test]
    fn test_resolve_by_url_or_id() {
        let registry = EndpointRegistry::new();
        registry.add(fixed("dbpedia", Some("http://dbpedia.org/sparql")));

        assert!(registry.resolve("http://dbpedia.org/sparql").is_some());
        assert!(registry.resolve("dbpedia").is_some());
        assert!(registry.resolve("http://unknown/sparql").is_none());
        assert_eq!(registry.len(), 1);
    }
}
