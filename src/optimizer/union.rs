//! Union flattening

use crate::algebra::PlanNode;

/// Flatten every union of the plan, bottom-up
pub fn flatten_unions(plan: &mut PlanNode) {
    for child in plan.children_mut() {
        flatten_unions(child);
    }
    if let PlanNode::NUnion(branches) = plan {
        let branches = std::mem::take(branches);
        plan.replace_with(flatten_union(branches));
    }
}

/// Splice nested unions into one branch list and drop branches known to be
/// empty. No branches left gives `EmptyResult`, a single branch replaces
/// the union.
pub fn flatten_union(branches: Vec<PlanNode>) -> PlanNode {
    let mut flat = Vec::with_capacity(branches.len());
    collect_branches(branches, &mut flat);
    match flat.len() {
        0 => PlanNode::EmptyResult,
        1 => flat.remove(0),
        _ => PlanNode::NUnion(flat),
    }
}

fn collect_branches(branches: Vec<PlanNode>, into: &mut Vec<PlanNode>) {
    for branch in branches {
        match branch {
            PlanNode::NUnion(inner) => collect_branches(inner, into),
            PlanNode::EmptyResult => {}
            other => into.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::{StatementPattern, Var};

    fn leaf(name: &str) -> PlanNode {
        PlanNode::Statement(StatementPattern::new(
            Var::variable("s"),
            Var::variable(name),
            Var::variable("o"),
        ))
    }

    #[test]
    fn test_nested_unions_are_spliced_in_order() {
        let nested = PlanNode::union(
            PlanNode::union(leaf("a"), PlanNode::union(leaf("b"), leaf("c"))),
            leaf("d"),
        );
        let PlanNode::NUnion(branches) = nested else {
            unreachable!()
        };
        let flat = flatten_union(branches);
        assert_eq!(
            flat,
            PlanNode::NUnion(vec![leaf("a"), leaf("b"), leaf("c"), leaf("d")])
        );
    }

    #[test]
    fn test_flattening_is_idempotent() {
        let branches = vec![leaf("a"), leaf("b"), leaf("c")];
        let once = flatten_union(branches.clone());
        assert_eq!(once, PlanNode::NUnion(branches));
        let PlanNode::NUnion(again) = once.clone() else {
            unreachable!()
        };
        assert_eq!(flatten_union(again), once);
    }

    #[test]
    fn test_empty_branches_are_dropped() {
        assert_eq!(
            flatten_union(vec![PlanNode::EmptyResult, leaf("a")]),
            leaf("a")
        );
        assert_eq!(
            flatten_union(vec![PlanNode::EmptyResult, PlanNode::EmptyResult]),
            PlanNode::EmptyResult
        );
    }

    #[test]
    fn test_flatten_unions_in_plan() {
        let mut plan = PlanNode::join(
            leaf("x"),
            PlanNode::union(PlanNode::union(leaf("a"), PlanNode::EmptyResult), leaf("b")),
        );
        flatten_unions(&mut plan);
        assert_eq!(
            plan,
            PlanNode::join(leaf("x"), PlanNode::NUnion(vec![leaf("a"), leaf("b")]))
        );
    }
}
