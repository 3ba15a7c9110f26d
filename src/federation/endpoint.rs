//! Federation members
//!
//! An endpoint is one autonomous data source. The optimizer only needs it to
//! answer a yes/no existence probe for a statement pattern; fetching matches
//! belongs to the evaluator.

use super::context::QueryContext;
use crate::algebra::StatementPattern;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque endpoint identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EndpointId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Where a source is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Reached over the network
    Remote,
    /// In-process store
    Local,
}

/// An endpoint that may contribute matches for a leaf
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementSource {
    pub endpoint: EndpointId,
    pub kind: SourceKind,
}

impl StatementSource {
    pub fn new(endpoint: EndpointId, kind: SourceKind) -> Self {
        Self { endpoint, kind }
    }
}

impl fmt::Display for StatementSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint)
    }
}

/// Probe errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    /// Endpoint could not be reached
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),

    /// Endpoint answered with something that is not a boolean result
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The owning query was aborted while probing
    #[error("Probe cancelled")]
    Cancelled,
}

pub type ProbeResult<T> = Result<T, ProbeError>;

/// A federation member
#[async_trait]
pub trait Endpoint: Send + Sync {
    fn id(&self) -> &EndpointId;

    /// Human readable name
    fn name(&self) -> &str;

    /// Service URL, used to resolve `SERVICE <url>` targets
    fn endpoint_url(&self) -> Option<&str> {
        None
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Remote
    }

    /// Whether the pattern may have matches at this endpoint. Implementations
    /// should return [`ProbeError::Cancelled`] once `ctx` is aborted.
    async fn probe(&self, pattern: &StatementPattern, ctx: &QueryContext) -> ProbeResult<bool>;
}
