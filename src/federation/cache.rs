//! Source-selection cache
//!
//! Remembers probe outcomes per (pattern signature, endpoint). Shared by all
//! queries of a federation and never rolled back: knowledge gathered by a
//! query that later fails is still valid.

use super::endpoint::EndpointId;
use crate::algebra::StatementPattern;
use crate::rdf::RdfTerm;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use tracing::trace;

/// What the cache knows about an endpoint for a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAssurance {
    /// A probe (or supplied statistics) said yes
    ConfirmedPresent,
    /// Unknown, needs a live probe
    PossiblyPresent,
    /// A probe said no, for this pattern or a more general one
    ConfirmedAbsent,
}

/// Graph scope of a signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GraphSignature {
    /// No GRAPH clause
    Unscoped,
    /// `GRAPH ?g`
    AnyNamed,
    /// `GRAPH <g>`
    Named(RdfTerm),
}

/// Canonical cache key of a statement pattern: constants are kept,
/// variables become wildcards (`None`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternSignature {
    pub subject: Option<RdfTerm>,
    pub predicate: Option<RdfTerm>,
    pub object: Option<RdfTerm>,
    pub graph: GraphSignature,
}

impl PatternSignature {
    pub fn of(pattern: &StatementPattern) -> Self {
        let graph = match &pattern.context {
            None => GraphSignature::Unscoped,
            Some(var) => match &var.value {
                Some(term) => GraphSignature::Named(term.clone()),
                None => GraphSignature::AnyNamed,
            },
        };
        Self {
            subject: pattern.subject.value.clone(),
            predicate: pattern.predicate.value.clone(),
            object: pattern.object.value.clone(),
            graph,
        }
    }

    /// Every strictly more general signature: each non-empty subset of the
    /// bound subject/predicate/object positions replaced by a wildcard.
    pub fn generalisations(&self) -> Vec<PatternSignature> {
        let positions = [
            self.subject.is_some(),
            self.predicate.is_some(),
            self.object.is_some(),
        ];
        let mut result = Vec::new();
        for mask in 1u8..8 {
            let clears = |bit: usize| mask & (1 << bit) != 0;
            if (0..3).any(|bit| clears(bit) && !positions[bit]) {
                continue;
            }
            result.push(PatternSignature {
                subject: if clears(0) { None } else { self.subject.clone() },
                predicate: if clears(1) { None } else { self.predicate.clone() },
                object: if clears(2) { None } else { self.object.clone() },
                graph: self.graph.clone(),
            });
        }
        result
    }
}

/// Bounded cache of probe outcomes
pub struct SourceSelectionCache {
    entries: Mutex<LruCache<(PatternSignature, EndpointId), bool>>,
}

impl SourceSelectionCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn lookup(&self, signature: &PatternSignature, endpoint: &EndpointId) -> SourceAssurance {
        let mut entries = self.entries.lock();
        match entries.get(&(signature.clone(), endpoint.clone())) {
            Some(false) => return SourceAssurance::ConfirmedAbsent,
            Some(true) => return SourceAssurance::ConfirmedPresent,
            None => {}
        }
        for general in signature.generalisations() {
            if let Some(false) = entries.get(&(general, endpoint.clone())) {
                return SourceAssurance::ConfirmedAbsent;
            }
        }
        SourceAssurance::PossiblyPresent
    }

    /// Record an observed outcome. Presence also holds for every more
    /// general pattern.
    pub fn update(&self, signature: &PatternSignature, endpoint: &EndpointId, has_results: bool) {
        trace!("Cache update {:?} @{} -> {}", signature, endpoint, has_results);
        let mut entries = self.entries.lock();
        if has_results {
            for general in signature.generalisations() {
                entries.put((general, endpoint.clone()), true);
            }
        }
        entries.put((signature.clone(), endpoint.clone()), has_results);
    }

    /// Drop everything
    pub fn invalidate(&self) {
        self.entries.lock().clear();
    }

    /// Drop what is known about one endpoint
    pub fn invalidate_endpoint(&self, endpoint: &EndpointId) {
        let mut entries = self.entries.lock();
        let stale: Vec<(PatternSignature, EndpointId)> = entries
            .iter()
            .filter(|((_, id), _)| id == endpoint)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            entries.pop(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
