//! Exclusive grouping and join ordering
//!
//! Runs bottom-up over the plan. In every n-ary join, exclusive statements
//! and groups owned by the same endpoint are merged into one
//! [`ExclusiveGroup`] whose members keep their encounter order, then the
//! remaining arguments are ordered greedily by the [`CostModel`]. Empty and
//! trivially true arguments are resolved on the way up, so an empty leaf
//! empties its whole join even when a filter or modifier wraps it.

use super::cost::{BoundVars, CostModel};
use super::union::flatten_union;
use super::OptimizerResult;
use crate::algebra::{ExclusiveGroup, FilterHints, PlanNode};
use tracing::trace;

/// Group and order every join and union of the plan
pub fn optimize_joins(plan: &mut PlanNode, cost_model: &dyn CostModel) -> OptimizerResult<()> {
    for child in plan.children_mut() {
        optimize_joins(child, cost_model)?;
    }

    match plan {
        PlanNode::Filter { arg, .. }
        | PlanNode::Extension { arg, .. }
        | PlanNode::Modifier { arg, .. }
        | PlanNode::Slice { arg, .. }
            if arg.is_empty_result() =>
        {
            plan.replace_with(PlanNode::EmptyResult);
        }
        PlanNode::NJoin(args) => {
            let args = std::mem::take(args);
            let rewritten = group_join(args, cost_model)?;
            plan.replace_with(rewritten);
        }
        PlanNode::NUnion(branches) => {
            let branches = std::mem::take(branches);
            let rewritten = match flatten_union(branches) {
                PlanNode::NUnion(branches) => PlanNode::NUnion(order_branches(branches, cost_model)?),
                other => other,
            };
            plan.replace_with(rewritten);
        }
        PlanNode::OptionalJoin(opt) => {
            if opt.left.is_empty_result() {
                plan.replace_with(PlanNode::EmptyResult);
            } else if opt.right.is_empty_result() {
                let left = opt.left.take();
                plan.replace_with(left);
            }
        }
        PlanNode::Difference { left, right } => {
            if left.is_empty_result() {
                plan.replace_with(PlanNode::EmptyResult);
            } else if right.is_empty_result() {
                let left = left.take();
                plan.replace_with(left);
            }
        }
        _ => {}
    }
    Ok(())
}

/// Merge same-owner exclusive arguments and order the result
fn group_join(args: Vec<PlanNode>, cost_model: &dyn CostModel) -> OptimizerResult<PlanNode> {
    if args.iter().any(PlanNode::is_empty_result) {
        return Ok(PlanNode::EmptyResult);
    }

    let mut remaining: Vec<PlanNode> = args.into_iter().filter(|a| !a.is_true_result()).collect();
    let mut grouped = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let first = remaining.remove(0);
        let Some(owner) = first.exclusive_owner().cloned() else {
            grouped.push(first);
            continue;
        };

        let mut merged = vec![first];
        let mut i = 0;
        while i < remaining.len() {
            if remaining[i].exclusive_owner() == Some(&owner) {
                merged.push(remaining.remove(i));
            } else {
                i += 1;
            }
        }

        if merged.len() == 1 {
            grouped.extend(merged);
            continue;
        }

        let mut members = Vec::new();
        let mut filters = FilterHints::default();
        let mut limit = None;
        for node in merged {
            match node {
                PlanNode::ExclusiveStatement(stmt) => members.push(stmt),
                PlanNode::ExclusiveGroup(group) => {
                    members.extend(group.members);
                    filters.bound.extend(group.filters.bound);
                    filters.conditions.extend(group.filters.conditions);
                    limit = limit.or(group.limit);
                }
                _ => {}
            }
        }
        trace!("Grouping {} statements for {}", members.len(), owner);
        let mut group = ExclusiveGroup::new(members, owner);
        group.filters = filters;
        group.limit = limit;
        grouped.push(PlanNode::ExclusiveGroup(group));
    }

    Ok(match grouped.len() {
        0 => PlanNode::TrueResult,
        1 => grouped.remove(0),
        _ => PlanNode::NJoin(order_join_args(grouped, cost_model)?),
    })
}

/// Greedy left-deep ordering: repeatedly take the cheapest remaining
/// argument given the variables bound so far. Ties keep input order.
pub fn order_join_args(
    args: Vec<PlanNode>,
    cost_model: &dyn CostModel,
) -> OptimizerResult<Vec<PlanNode>> {
    let mut remaining = args;
    let mut ordered = Vec::with_capacity(remaining.len());
    let mut bound = BoundVars::default();

    while !remaining.is_empty() {
        let mut best = 0;
        let mut best_cost = f64::INFINITY;
        for (index, arg) in remaining.iter().enumerate() {
            let cost = cost_model.estimate_cost(arg, &bound)?;
            if cost < best_cost {
                best = index;
                best_cost = cost;
            }
        }
        let chosen = remaining.remove(best);
        bound.extend(chosen.free_vars()?);
        ordered.push(chosen);
    }
    Ok(ordered)
}

/// Union branches do not bind variables for each other; order them by
/// their own cost, keeping input order between equal costs.
fn order_branches(
    branches: Vec<PlanNode>,
    cost_model: &dyn CostModel,
) -> OptimizerResult<Vec<PlanNode>> {
    let bound = BoundVars::default();
    let mut costed = Vec::with_capacity(branches.len());
    for branch in branches {
        costed.push((cost_model.estimate_cost(&branch, &bound)?, branch));
    }
    costed.sort_by(|(a, _), (b, _)| a.total_cmp(b));
    Ok(costed.into_iter().map(|(_, branch)| branch).collect())
}
