//! Logical query algebra
//!
//! The optimizer works on an owned operator tree ([`PlanNode`]). Leaves start
//! out as raw [`StatementPattern`]s and are replaced by sourced, exclusive or
//! grouped statements as the pipeline learns which endpoints can answer them.
//!
//! [`sparql::parse_query`] builds such a tree from SPARQL text.

mod expr;
mod node;
mod pattern;
pub mod sparql;

pub use expr::{CompareOp, ValueExpr};
pub use node::{
    BindingsTable, ExclusiveGroup, ExclusiveStatement, FilterHints, ModifierKind, OptionalJoin,
    PlanNode, Projection, RemoteSubQuery, SingleSourceQuery, SourcedStatement,
    UnsupportedPlanShape,
};
pub use pattern::{PathLength, PatternId, StatementPattern, Var};
pub use sparql::{parse_query, AlgebraError, AlgebraResult, ParsedQuery, QueryForm};
