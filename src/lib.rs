//! Samyama Federation
//!
//! Federation-aware query optimizer for SPARQL queries over a set of
//! independent RDF endpoints.
//!
//! # Architecture
//!
//! - [`rdf`]: RDF terms and the in-memory quad store behind local endpoints
//! - [`algebra`]: operator tree, statement patterns, filter expressions and
//!   the SPARQL front end
//! - [`federation`]: endpoints, registry, per-query context, configuration
//!   and the source-selection cache
//! - [`optimizer`]: source selection, exclusive grouping, join ordering and
//!   the rewrite passes, driven by [`FederationOptimizer`]
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use samyama_federation::{
//!     parse_query, DatasetRestriction, EndpointRegistry, FederationConfig,
//!     FederationOptimizer, MemoryEndpoint, NamedNode, Quad,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let people = MemoryEndpoint::new("people");
//! people.insert(Quad::new(
//!     NamedNode::new("http://example.org/alice")?,
//!     NamedNode::new("http://xmlns.com/foaf/0.1/name")?,
//!     NamedNode::new("http://example.org/name/alice")?,
//! ))?;
//!
//! let registry = EndpointRegistry::new();
//! registry.add(Arc::new(people));
//!
//! let optimizer = FederationOptimizer::new(FederationConfig::default());
//! let ctx = optimizer.query_context(Arc::new(registry), DatasetRestriction::default());
//! let query = parse_query("SELECT ?n WHERE { ?p <http://xmlns.com/foaf/0.1/name> ?n }")?;
//! let plan = optimizer.optimize(query.plan, &ctx).await?;
//! println!("{}", plan);
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod algebra;
pub mod federation;
pub mod optimizer;
pub mod rdf;

// Re-export main types for convenience
pub use algebra::{
    parse_query, AlgebraError, AlgebraResult, CompareOp, ExclusiveGroup, ExclusiveStatement,
    ParsedQuery, PlanNode, QueryForm, StatementPattern, ValueExpr, Var,
};

pub use federation::{
    ConfigError, ConfigResult, DatasetRestriction, Endpoint, EndpointId, EndpointRegistry,
    FederationConfig, MemoryEndpoint, ProbeError, ProbeResult, QueryContext, QueryId,
    SourceAssurance, SourceKind, SourceSelectionCache, StatementSource,
};

pub use optimizer::{
    CostModel, DefaultCostModel, FederationOptimizer, OptimizerError, OptimizerResult,
};

pub use rdf::{BlankNode, Literal, NamedNode, Quad, RdfError, RdfResult, RdfTerm};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
