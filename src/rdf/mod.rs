//! RDF support for the federation engine
//!
//! This module provides the RDF terms used in query patterns and filter
//! constants, plus a small indexed quad store for in-process endpoints.
//!
//! # Example
//!
//! ```rust
//! use samyama_federation::rdf::{GraphMatch, Literal, NamedNode, Quad, QuadStore, RdfTerm};
//!
//! let mut store = QuadStore::new();
//! let alice = NamedNode::new("http://example.org/alice").unwrap();
//! let name = NamedNode::new("http://xmlns.com/foaf/0.1/name").unwrap();
//! store.insert(Quad::new(alice.clone(), name.clone(), Literal::new_simple_literal("Alice"))).unwrap();
//!
//! let subject: RdfTerm = alice.into();
//! assert!(store.contains_match(Some(&subject), Some(&name), None, &GraphMatch::Any));
//! ```

mod store;
mod types;

pub use types::{BlankNode, Literal, NamedNode, Quad, RdfError, RdfResult, RdfTerm};

pub use store::{GraphMatch, QuadStore, QuadStoreError, QuadStoreResult};
