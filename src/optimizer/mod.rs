//! Federation-aware query optimizer
//!
//! Stages, in pipeline order:
//!
//! 1. [`info`]: collects per-query facts and flattens joins
//! 2. [`source_selection`]: finds the relevant endpoints of every statement
//! 3. [`service`]: collapses `SERVICE` calls into exclusive statements
//! 4. [`union`]: flattens nested unions
//! 5. [`grouping`]: forms exclusive groups and orders joins with a [`CostModel`]
//! 6. [`limit`]: pushes the outer limit into a single leaf
//! 7. [`filter`]: pushes filter conjuncts towards the leaves
//!
//! [`FederationOptimizer`] runs them in that order.

pub mod cost;
pub mod filter;
pub mod grouping;
pub mod info;
pub mod limit;
pub mod pipeline;
pub mod service;
pub mod source_selection;
pub mod union;

use crate::algebra::UnsupportedPlanShape;
use std::time::Duration;
use thiserror::Error;

pub use cost::{BoundVars, CostModel, DefaultCostModel};
pub use info::{collect_query_info, QueryInfo};
pub use pipeline::FederationOptimizer;
pub use source_selection::{ProbePool, SourceSelection, SourceSelector};

/// Optimization errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizerError {
    /// Probe wait exceeded the remaining query budget
    #[error("Source selection timed out after {budget:?}")]
    OptimizationTimeout { budget: Duration },

    /// First probe failure observed for the query
    #[error("Probe of endpoint {endpoint} failed: {message}")]
    ProbeFailure { endpoint: String, message: String },

    /// A node reached a computation that has no rule for it
    #[error("Unsupported plan shape: {0}")]
    UnsupportedPlanShape(String),

    /// The query context was aborted
    #[error("Query aborted")]
    Aborted,
}

impl From<UnsupportedPlanShape> for OptimizerError {
    fn from(err: UnsupportedPlanShape) -> Self {
        OptimizerError::UnsupportedPlanShape(err.0)
    }
}

pub type OptimizerResult<T> = Result<T, OptimizerError>;
