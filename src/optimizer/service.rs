//! `SERVICE` rewrite
//!
//! A service call whose target is a known member is probed locally. When
//! its body turns out to be one exclusive statement, or a join of
//! exclusive statements, the call is replaced by that statement or by an
//! exclusive group, and takes part in grouping like any other leaf.
//! Everything else stays an opaque remote call.

use super::info::collect_query_info;
use super::source_selection::{ProbePool, SourceSelector};
use super::OptimizerResult;
use crate::algebra::{ExclusiveGroup, PlanNode, RemoteSubQuery};
use crate::federation::{QueryContext, SourceSelectionCache};
use crate::rdf::RdfTerm;
use std::sync::Arc;
use tracing::{debug, trace};

/// Rewrite every service call of the plan's top scope
pub async fn rewrite_services(
    plan: &mut PlanNode,
    cache: &Arc<SourceSelectionCache>,
    pool: &ProbePool,
    ctx: &Arc<QueryContext>,
) -> OptimizerResult<()> {
    let mut services = Vec::new();
    collect_services(plan, &mut services);

    for node in services {
        let PlanNode::RemoteSubQuery(service) = &*node else {
            continue;
        };
        if let Some(rewritten) = rewrite_service(service, cache, pool, ctx).await? {
            debug!("Service {} collapsed into {}", service.target, rewritten.kind_name());
            node.replace_with(rewritten);
        }
    }
    Ok(())
}

fn collect_services<'a>(node: &'a mut PlanNode, out: &mut Vec<&'a mut PlanNode>) {
    if matches!(node, PlanNode::RemoteSubQuery(_)) {
        out.push(node);
        return;
    }
    for child in node.children_mut() {
        collect_services(child, out);
    }
}

async fn rewrite_service(
    service: &RemoteSubQuery,
    cache: &Arc<SourceSelectionCache>,
    pool: &ProbePool,
    ctx: &Arc<QueryContext>,
) -> OptimizerResult<Option<PlanNode>> {
    let Some(RdfTerm::NamedNode(target)) = &service.target.value else {
        trace!("Service target {} is not a constant IRI", service.target);
        return Ok(None);
    };
    let Some(endpoint) = ctx.registry().resolve(target.as_str()) else {
        trace!("Service target {} is not a federation member", target);
        return Ok(None);
    };

    let mut body = service.body.as_ref().clone();
    let info = collect_query_info(&mut body, ctx.id());
    if info.has_remote_sub_query {
        return Ok(None);
    }

    let selector = SourceSelector::new(vec![endpoint], cache, pool, ctx);
    let selection = selector.select_sources(&info.statements).await?;
    selection.apply(&mut body);
    Ok(collapse(body))
}

fn collapse(body: PlanNode) -> Option<PlanNode> {
    match body {
        PlanNode::ExclusiveStatement(_) => Some(body),
        PlanNode::NJoin(args) => {
            let owner = args.first()?.exclusive_owner()?.clone();
            let mut members = Vec::with_capacity(args.len());
            for arg in args {
                match arg {
                    PlanNode::ExclusiveStatement(stmt) if stmt.owner == owner => members.push(stmt),
                    _ => return None,
                }
            }
            Some(PlanNode::ExclusiveGroup(ExclusiveGroup::new(members, owner)))
        }
        _ => None,
    }
}
