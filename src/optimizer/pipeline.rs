//! Optimizer pipeline
//!
//! [`FederationOptimizer`] owns the state shared by all queries of a
//! federation (the source-selection cache, the probe pool, the cost model)
//! and runs the stages of one query in order.

use super::cost::{CostModel, DefaultCostModel};
use super::filter::push_filters;
use super::grouping::optimize_joins;
use super::info::collect_query_info;
use super::limit::push_limit;
use super::service::rewrite_services;
use super::source_selection::{ProbePool, SourceSelector};
use super::union::flatten_unions;
use super::{OptimizerError, OptimizerResult};
use crate::algebra::{PlanNode, SingleSourceQuery};
use crate::federation::{
    DatasetRestriction, EndpointId, EndpointRegistry, FederationConfig, QueryContext,
    SourceSelectionCache,
};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Federation query optimizer
pub struct FederationOptimizer {
    config: FederationConfig,
    cache: Arc<SourceSelectionCache>,
    pool: ProbePool,
    cost_model: Arc<dyn CostModel>,
}

impl FederationOptimizer {
    pub fn new(config: FederationConfig) -> Self {
        info!(
            "Federation optimizer: {} probe workers, cache capacity {}",
            config.probe_worker_threads, config.source_selection_cache_capacity
        );
        Self {
            cache: Arc::new(SourceSelectionCache::new(
                config.source_selection_cache_capacity,
            )),
            pool: ProbePool::new(config.probe_worker_threads),
            cost_model: Arc::new(DefaultCostModel),
            config,
        }
    }

    /// Replace the default cost heuristics
    pub fn with_cost_model(mut self, cost_model: Arc<dyn CostModel>) -> Self {
        self.cost_model = cost_model;
        self
    }

    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<SourceSelectionCache> {
        &self.cache
    }

    pub fn pool(&self) -> &ProbePool {
        &self.pool
    }

    /// New query context with the configured time budget
    pub fn query_context(
        &self,
        registry: Arc<EndpointRegistry>,
        dataset: DatasetRestriction,
    ) -> Arc<QueryContext> {
        Arc::new(QueryContext::new(
            registry,
            dataset,
            self.config.max_query_time(),
        ))
    }

    /// Drop cached knowledge about an endpoint that left the federation
    pub fn forget_endpoint(&self, id: &EndpointId) {
        self.cache.invalidate_endpoint(id);
    }

    /// Optimize one query. On error no partial plan is returned.
    pub async fn optimize(
        &self,
        mut plan: PlanNode,
        ctx: &Arc<QueryContext>,
    ) -> OptimizerResult<PlanNode> {
        if ctx.is_aborted() {
            return Err(OptimizerError::Aborted);
        }
        trace!("Query {} before optimization:\n{}", ctx.id(), plan);

        let info = collect_query_info(&mut plan, ctx.id());
        debug!(
            "Query {}: {} statements, union={} filter={} service={} limit={:?}",
            ctx.id(),
            info.statements.len(),
            info.has_union,
            info.has_filter,
            info.has_remote_sub_query,
            info.limit
        );

        let members = ctx.members();
        let selector = SourceSelector::new(members, &self.cache, &self.pool, ctx);
        let selection = selector.select_sources(&info.statements).await?;

        let relevant = selection.relevant_endpoints();
        if relevant.len() == 1 && !info.has_remote_sub_query {
            let endpoint = relevant[0].clone();
            debug!("Query {}: single relevant endpoint {}", ctx.id(), endpoint);
            let single = PlanNode::SingleSourceQuery(SingleSourceQuery {
                plan: Box::new(plan),
                endpoint,
                dataset: ctx.dataset().clone(),
            });
            self.log_plan(ctx, &single);
            return Ok(single);
        }

        selection.apply(&mut plan);

        if info.has_remote_sub_query {
            debug!("Query {}: rewriting services", ctx.id());
            rewrite_services(&mut plan, &self.cache, &self.pool, ctx).await?;
        }

        if info.has_union {
            debug!("Query {}: flattening unions", ctx.id());
            flatten_unions(&mut plan);
        }

        debug!("Query {}: grouping and join ordering", ctx.id());
        optimize_joins(&mut plan, self.cost_model.as_ref())?;

        if info.has_limit() && push_limit(&mut plan) {
            debug!("Query {}: pushed limit {:?}", ctx.id(), info.limit);
        }

        if info.has_filter {
            debug!("Query {}: pushing filters", ctx.id());
            push_filters(&mut plan);
        }

        self.log_plan(ctx, &plan);
        Ok(plan)
    }

    fn log_plan(&self, ctx: &QueryContext, plan: &PlanNode) {
        if self.config.log_query_plan {
            debug!("Optimized plan of query {}:\n{}", ctx.id(), plan);
        } else {
            trace!("Query {} after optimization:\n{}", ctx.id(), plan);
        }
    }
}

impl Default for FederationOptimizer {
    fn default() -> Self {
        Self::new(FederationConfig::default())
    }
}
