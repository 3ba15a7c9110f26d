//! Federation members and shared federation state
//!
//! This module holds everything the optimizer consumes from the federation:
//! the [`Endpoint`] trait and its [`EndpointRegistry`], the per-query
//! [`QueryContext`], the shared [`SourceSelectionCache`] and the
//! [`FederationConfig`]. [`MemoryEndpoint`] is an in-process member used by
//! the demo and the tests.

mod cache;
mod config;
mod context;
mod endpoint;
mod memory;
mod registry;

pub use cache::{GraphSignature, PatternSignature, SourceAssurance, SourceSelectionCache};
pub use config::{ConfigError, ConfigResult, FederationConfig};
pub use context::{QueryContext, QueryId};
pub use endpoint::{Endpoint, EndpointId, ProbeError, ProbeResult, SourceKind, StatementSource};
pub use memory::MemoryEndpoint;
pub use registry::{DatasetRestriction, EndpointRegistry};
