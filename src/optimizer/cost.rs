//! Heuristic cost model
//!
//! Costs are not cardinality estimates. They only rank join arguments so
//! that selective, single-endpoint work runs first and late-bound service
//! calls run last.

use super::OptimizerResult;
use crate::algebra::{ExclusiveGroup, PlanNode, UnsupportedPlanShape};
use rustc_hash::FxHashSet;

/// Variables bound by the join arguments chosen so far
pub type BoundVars = FxHashSet<String>;

/// Cost function used by the join-order optimizer. Must be pure: the same
/// node and bound set always give the same cost.
pub trait CostModel: Send + Sync {
    fn estimate_cost(&self, node: &PlanNode, bound: &BoundVars) -> OptimizerResult<f64>;
}

/// Default federation heuristics
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCostModel;

impl DefaultCostModel {
    pub fn new() -> Self {
        Self
    }
}

fn unbound_count(vars: &[String], bound: &BoundVars) -> usize {
    vars.iter().filter(|v| !bound.contains(*v)).count()
}

impl CostModel for DefaultCostModel {
    fn estimate_cost(&self, node: &PlanNode, bound: &BoundVars) -> OptimizerResult<f64> {
        let cost = match node {
            PlanNode::ExclusiveStatement(stmt) => {
                let free = stmt.free_vars();
                let base = if free.len() <= 1 && bound.is_empty() { 3 } else { 100 };
                (base + unbound_count(&free, bound)) as f64
            }
            PlanNode::StatementSources(stmt) => {
                let free = stmt.free_vars();
                (100 + unbound_count(&free, bound)) as f64
            }
            PlanNode::ExclusiveGroup(group) => group_cost(group, bound),
            PlanNode::RemoteSubQuery(service) => {
                let mut cost = 0.0;
                // the target may only be known at run time
                if service.target.is_free() {
                    cost += 1000.0;
                }
                let free = node.free_vars()?;
                if service.body.statement_count() <= 1 {
                    cost += if bound.is_empty() && free.len() <= 1 { 3.0 } else { 100.0 };
                }
                cost + free.len() as f64
            }
            PlanNode::NJoin(args) => match args.first() {
                Some(first) => self.estimate_cost(first, bound)? + (args.len() - 1) as f64,
                None => 0.0,
            },
            PlanNode::NUnion(branches) => {
                let mut cheapest: Option<f64> = None;
                for branch in branches {
                    let cost = self.estimate_cost(branch, bound)?;
                    cheapest = Some(cheapest.map_or(cost, |c| c.min(cost)));
                }
                cheapest.unwrap_or(0.0) + branches.len().saturating_sub(1) as f64
            }
            PlanNode::Projection(proj) => proj.variables.len() as f64,
            PlanNode::BindingsTable(_)
            | PlanNode::Extension { .. }
            | PlanNode::EmptyResult
            | PlanNode::TrueResult => 0.0,
            PlanNode::OptionalJoin(opt) => self.estimate_cost(&opt.left, bound)?,
            PlanNode::Difference { left, .. } => self.estimate_cost(left, bound)?,
            PlanNode::Filter { arg, .. }
            | PlanNode::Slice { arg, .. }
            | PlanNode::Modifier { arg, .. } => self.estimate_cost(arg, bound)?,
            PlanNode::Statement(_) | PlanNode::SingleSourceQuery(_) => {
                return Err(UnsupportedPlanShape(node.kind_name().to_string()).into())
            }
        };
        Ok(cost)
    }
}

fn group_cost(group: &ExclusiveGroup, bound: &BoundVars) -> f64 {
    let members = group.members.len().max(1) as f64;
    let free = group.free_vars();

    if !bound.is_empty() {
        return 100.0 + unbound_count(&free, bound) as f64 / members;
    }

    // groups sharing one subject are star-shaped and cheap to evaluate
    let first_subject = group.members.first().map(|m| &m.pattern.subject);
    let star = group
        .members
        .iter()
        .all(|m| Some(&m.pattern.subject) == first_subject && !m.pattern.is_path());
    let additional = if star { 0.0 } else { 0.5 };

    let selective = group.members.iter().any(|m| m.free_vars().len() <= 1);
    let penalty = if selective { 0.0 } else { 4.0 };

    additional + penalty + free.len() as f64 / members
}
