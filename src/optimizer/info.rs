//! Info collector
//!
//! One depth-first pass that gathers what the later stages need to know
//! about a query and normalizes its shape: nested joins become one n-ary
//! join, statements get their ids, and optional joins and service calls
//! are tagged with the owning query.

use crate::algebra::{PatternId, PlanNode, StatementPattern};
use crate::federation::QueryId;

/// Facts about one query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryInfo {
    pub has_union: bool,
    pub has_filter: bool,
    pub has_remote_sub_query: bool,
    pub has_optional: bool,
    pub has_path: bool,
    /// Limit of the outermost query
    pub limit: Option<u64>,
    /// Statement patterns in depth-first order
    pub statements: Vec<StatementPattern>,
}

impl QueryInfo {
    pub fn has_limit(&self) -> bool {
        self.limit.is_some()
    }
}

/// Collect query facts, rewriting `plan` in place
pub fn collect_query_info(plan: &mut PlanNode, query: QueryId) -> QueryInfo {
    let mut collector = InfoCollector {
        info: QueryInfo::default(),
        query,
        projection_depth: 0,
    };
    collector.visit(plan);
    collector.info
}

struct InfoCollector {
    info: QueryInfo,
    query: QueryId,
    /// Number of enclosing projections. The outer query's slice sits
    /// above its projection, a sub-select's slice below the outer one.
    projection_depth: usize,
}

impl InfoCollector {
    fn visit(&mut self, node: &mut PlanNode) {
        match node {
            PlanNode::Statement(pattern) => {
                pattern.id = PatternId(self.info.statements.len());
                self.info.has_path |= pattern.is_path();
                self.info.statements.push(pattern.clone());
            }
            PlanNode::NJoin(args) => {
                for arg in args.iter_mut() {
                    self.visit(arg);
                }
                // children are already flat, one level of splicing suffices
                if args.iter().any(|a| matches!(a, PlanNode::NJoin(_))) {
                    let mut flat = Vec::with_capacity(args.len());
                    for arg in args.drain(..) {
                        match arg {
                            PlanNode::NJoin(inner) => flat.extend(inner),
                            other => flat.push(other),
                        }
                    }
                    *args = flat;
                }
            }
            PlanNode::NUnion(branches) => {
                self.info.has_union = true;
                for branch in branches.iter_mut() {
                    self.visit(branch);
                }
            }
            PlanNode::Filter { arg, .. } => {
                self.info.has_filter = true;
                self.visit(arg);
            }
            PlanNode::OptionalJoin(opt) => {
                self.info.has_optional = true;
                opt.query = Some(self.query);
                self.visit(&mut opt.left);
                self.visit(&mut opt.right);
            }
            PlanNode::RemoteSubQuery(service) => {
                // the body is handled by the service rewrite
                self.info.has_remote_sub_query = true;
                service.query = Some(self.query);
            }
            PlanNode::Projection(proj) => {
                self.projection_depth += 1;
                self.visit(&mut proj.arg);
                self.projection_depth -= 1;
            }
            PlanNode::Slice { arg, limit, .. } => {
                let over_subquery = matches!(&**arg, PlanNode::Projection(p) if p.subquery);
                if self.projection_depth == 0 && !over_subquery && self.info.limit.is_none() {
                    self.info.limit = limit.filter(|l| *l > 0);
                }
                self.visit(arg);
            }
            other => {
                for child in other.children_mut() {
                    self.visit(child);
                }
            }
        }
    }
}
