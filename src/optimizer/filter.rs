//! Filter pushdown
//!
//! Splits each filter into its top-level conjuncts and moves every conjunct
//! it can down to the leaf or group that binds all of its variables.
//! `?v = <iri>` becomes a bound value on the target, anything else a
//! condition evaluated next to it. What cannot move stays on the filter.

use crate::algebra::{FilterHints, PlanNode, ValueExpr};
use tracing::trace;

/// Push filter conjuncts into the plan, bottom-up
pub fn push_filters(plan: &mut PlanNode) {
    for child in plan.children_mut() {
        push_filters(child);
    }

    if !matches!(plan, PlanNode::Filter { .. }) {
        return;
    }
    let PlanNode::Filter { condition, mut arg } = plan.take() else {
        return;
    };
    if arg.is_empty_result() {
        return;
    }

    let assigned = arg.assigned_vars();
    let mut kept = Vec::new();
    for conjunct in condition.into_conjuncts() {
        let vars = conjunct.vars();
        let pushable = conjunct.is_pushable()
            && !vars.is_empty()
            && !vars.iter().any(|v| assigned.contains(v));
        if pushable && accepts(&arg, &vars) {
            trace!("Pushing {} below filter", conjunct);
            attach(&mut arg, conjunct);
        } else {
            kept.push(conjunct);
        }
    }

    let rewritten = match ValueExpr::conjoin(kept) {
        Some(condition) => PlanNode::Filter { condition, arg },
        None => *arg,
    };
    plan.replace_with(rewritten);
}

/// Whether some target below `node` binds every one of `vars`
fn accepts(node: &PlanNode, vars: &[String]) -> bool {
    let covers = |free: Vec<String>| vars.iter().all(|v| free.contains(v));
    match node {
        PlanNode::StatementSources(stmt) => !stmt.pattern.is_path() && covers(stmt.free_vars()),
        PlanNode::ExclusiveStatement(stmt) => !stmt.pattern.is_path() && covers(stmt.free_vars()),
        PlanNode::ExclusiveGroup(group) => covers(group.free_vars()),
        PlanNode::NJoin(args) => args.iter().any(|a| accepts(a, vars)),
        PlanNode::NUnion(branches) => {
            !branches.is_empty() && branches.iter().all(|b| accepts(b, vars))
        }
        PlanNode::Filter { arg, .. } | PlanNode::Extension { arg, .. } => accepts(arg, vars),
        _ => false,
    }
}

/// Attach a conjunct to the first accepting target, or to every branch of
/// a union. Callers check [`accepts`] first.
fn attach(node: &mut PlanNode, conjunct: ValueExpr) {
    match node {
        PlanNode::StatementSources(stmt) => add_hint(&mut stmt.filters, conjunct),
        PlanNode::ExclusiveStatement(stmt) => add_hint(&mut stmt.filters, conjunct),
        PlanNode::ExclusiveGroup(group) => add_hint(&mut group.filters, conjunct),
        PlanNode::NJoin(args) => {
            let vars = conjunct.vars();
            if let Some(target) = args.iter_mut().find(|a| accepts(a, &vars)) {
                attach(target, conjunct);
            }
        }
        PlanNode::NUnion(branches) => {
            for branch in branches.iter_mut() {
                attach(branch, conjunct.clone());
            }
        }
        PlanNode::Filter { arg, .. } | PlanNode::Extension { arg, .. } => attach(arg, conjunct),
        _ => {}
    }
}

fn add_hint(hints: &mut FilterHints, conjunct: ValueExpr) {
    let binding = conjunct
        .as_var_equals_iri()
        .map(|(name, iri)| (name.to_string(), iri.clone()));
    match binding {
        Some((name, iri)) => hints.bind(name, iri),
        None => hints.add_condition(conjunct),
    }
}
