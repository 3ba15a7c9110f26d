//! In-memory quad store
//!
//! Backs in-process federation members. The store only needs to answer
//! "does anything match this pattern", so it keeps one index per position
//! and scans the smallest candidate list.

use super::types::{NamedNode, Quad, RdfTerm};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Quad store errors
#[derive(Error, Debug)]
pub enum QuadStoreError {
    /// Duplicate quad
    #[error("Duplicate quad: {0}")]
    DuplicateQuad(String),
}

pub type QuadStoreResult<T> = Result<T, QuadStoreError>;

/// Graph restriction used when matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphMatch {
    /// Any graph, default or named
    Any,
    /// Any named graph (graph position is an unbound variable)
    AnyNamed,
    /// Exactly this named graph
    Named(NamedNode),
}

/// Quad store with subject, predicate and object indices
#[derive(Clone, Default)]
pub struct QuadStore {
    /// All quads (primary storage)
    quads: Vec<Quad>,

    /// Duplicate detection
    seen: HashSet<Quad>,

    /// Subject -> positions in `quads`
    subject_index: HashMap<RdfTerm, Vec<usize>>,

    /// Predicate -> positions in `quads`
    predicate_index: HashMap<NamedNode, Vec<usize>>,

    /// Object -> positions in `quads`
    object_index: HashMap<RdfTerm, Vec<usize>>,
}

impl QuadStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a quad into the store
    pub fn insert(&mut self, quad: Quad) -> QuadStoreResult<()> {
        if self.seen.contains(&quad) {
            return Err(QuadStoreError::DuplicateQuad(quad.to_string()));
        }

        let position = self.quads.len();
        self.subject_index
            .entry(quad.subject.clone())
            .or_default()
            .push(position);
        self.predicate_index
            .entry(quad.predicate.clone())
            .or_default()
            .push(position);
        self.object_index
            .entry(quad.object.clone())
            .or_default()
            .push(position);

        self.seen.insert(quad.clone());
        self.quads.push(quad);
        Ok(())
    }

    /// Number of stored quads
    pub fn len(&self) -> usize {
        self.quads.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    /// Check whether at least one quad matches the given constant positions
    pub fn contains_match(
        &self,
        subject: Option<&RdfTerm>,
        predicate: Option<&NamedNode>,
        object: Option<&RdfTerm>,
        graph: &GraphMatch,
    ) -> bool {
        let mut candidates: Option<&Vec<usize>> = None;

        // Pick the most selective index among the bound positions
        let lists = [
            subject.map(|s| self.subject_index.get(s)),
            predicate.map(|p| self.predicate_index.get(p)),
            object.map(|o| self.object_index.get(o)),
        ];
        for list in lists.into_iter().flatten() {
            match list {
                None => return false,
                Some(list) => {
                    if candidates.map_or(true, |c| list.len() < c.len()) {
                        candidates = Some(list);
                    }
                }
            }
        }

        let matches = |quad: &Quad| {
            subject.map_or(true, |s| &quad.subject == s)
                && predicate.map_or(true, |p| &quad.predicate == p)
                && object.map_or(true, |o| &quad.object == o)
                && match graph {
                    GraphMatch::Any => true,
                    GraphMatch::AnyNamed => quad.graph.is_some(),
                    GraphMatch::Named(g) => quad.graph.as_ref() == Some(g),
                }
        };

        match candidates {
            Some(positions) => positions.iter().any(|&i| matches(&self.quads[i])),
            None => self.quads.iter().any(matches),
        }
    }
}
