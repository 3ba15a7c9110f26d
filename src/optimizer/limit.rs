//! Limit pushdown

use crate::algebra::PlanNode;
use tracing::trace;

/// Attach the outer limit as an upper-bound hint when the query is a plain
/// projection over one leaf or group with no offset. The slice itself stays
/// in place; the hint only lets the evaluator stop fetching early.
///
/// Returns whether a hint was attached.
pub fn push_limit(plan: &mut PlanNode) -> bool {
    let PlanNode::Slice {
        arg,
        offset: 0,
        limit: Some(limit),
    } = plan
    else {
        return false;
    };
    let limit = *limit;
    let PlanNode::Projection(proj) = arg.as_mut() else {
        return false;
    };
    if proj.subquery {
        return false;
    }

    let hint = match proj.arg.as_mut() {
        PlanNode::StatementSources(stmt) => &mut stmt.limit,
        PlanNode::ExclusiveStatement(stmt) => &mut stmt.limit,
        PlanNode::ExclusiveGroup(group) => &mut group.limit,
        _ => return false,
    };
    trace!("Pushing limit {} into leaf", limit);
    *hint = Some(limit);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::{ExclusiveStatement, Projection, StatementPattern, Var};
    use crate::federation::{EndpointId, SourceKind, StatementSource};

    fn leaf() -> PlanNode {
        PlanNode::ExclusiveStatement(ExclusiveStatement::new(
            StatementPattern::new(Var::variable("s"), Var::variable("p"), Var::variable("o")),
            StatementSource::new(EndpointId::new("a"), SourceKind::Remote),
        ))
    }

    fn sliced(arg: PlanNode, offset: u64, limit: Option<u64>, subquery: bool) -> PlanNode {
        PlanNode::Slice {
            arg: Box::new(PlanNode::Projection(Projection {
                arg: Box::new(arg),
                variables: vec!["s".to_string()],
                subquery,
            })),
            offset,
            limit,
        }
    }

    fn leaf_limit(plan: &PlanNode) -> Option<u64> {
        match plan {
            PlanNode::ExclusiveStatement(stmt) => stmt.limit,
            other => other.children().into_iter().find_map(leaf_limit),
        }
    }

    #[test]
    fn test_limit_pushed_onto_single_leaf() {
        let mut plan = sliced(leaf(), 0, Some(5), false);
        assert!(push_limit(&mut plan));
        assert_eq!(leaf_limit(&plan), Some(5));
        // the slice is kept
        assert!(matches!(plan, PlanNode::Slice { limit: Some(5), .. }));
    }

    #[test]
    fn test_limit_not_pushed() {
        let cases = vec![
            sliced(PlanNode::join(leaf(), leaf()), 0, Some(5), false),
            sliced(leaf(), 2, Some(5), false),
            sliced(leaf(), 0, None, false),
            sliced(leaf(), 0, Some(5), true),
        ];
        for mut plan in cases {
            assert!(!push_limit(&mut plan));
            assert_eq!(leaf_limit(&plan), None);
        }
    }
}
