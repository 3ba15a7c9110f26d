//! Source selection
//!
//! For each statement, asks the cache about every federation member and
//! probes the members the cache is unsure about. Probes of all statements
//! of a query run concurrently on the shared [`ProbePool`]; the call waits
//! for all of them, for the first failure, or for the query deadline.
//! Once a query is aborted its probes give their pool slots back at once.
//! A probe still running then finishes outside the pool and only updates
//! the cache.

use super::{OptimizerError, OptimizerResult};
use crate::algebra::{
    ExclusiveStatement, PathLength, PatternId, PlanNode, SourcedStatement, StatementPattern, Var,
};
use crate::federation::{
    Endpoint, EndpointId, PatternSignature, ProbeError, QueryContext, SourceAssurance,
    SourceSelectionCache, StatementSource,
};
use indexmap::IndexSet;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, trace, warn};

/// Bounded pool of probe slots, shared by all queries of a federation
#[derive(Clone)]
pub struct ProbePool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl ProbePool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots not held by a running probe
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Sources found for one statement, tagged with the member index so the
/// final list follows registration order
type SourceSlot = Arc<Mutex<Vec<(usize, StatementSource)>>>;

/// Outcome reported by a probe task
type ProbeReport = Result<(), (EndpointId, ProbeError)>;

/// Source selection over a fixed member list
pub struct SourceSelector<'a> {
    members: Vec<Arc<dyn Endpoint>>,
    cache: &'a Arc<SourceSelectionCache>,
    pool: &'a ProbePool,
    ctx: &'a Arc<QueryContext>,
}

impl<'a> SourceSelector<'a> {
    pub fn new(
        members: Vec<Arc<dyn Endpoint>>,
        cache: &'a Arc<SourceSelectionCache>,
        pool: &'a ProbePool,
        ctx: &'a Arc<QueryContext>,
    ) -> Self {
        Self {
            members,
            cache,
            pool,
            ctx,
        }
    }

    /// Determine the sources of every statement
    pub async fn select_sources(
        &self,
        statements: &[StatementPattern],
    ) -> OptimizerResult<SourceSelection> {
        let slots: Vec<SourceSlot> = statements
            .iter()
            .map(|_| Arc::new(Mutex::new(Vec::new())))
            .collect();
        let mut pending: Vec<ProbeTask> = Vec::new();
        // one probe per (signature, member), shared by equivalent statements
        let mut queued: HashMap<(PatternSignature, usize), usize> = HashMap::new();

        for (index, statement) in statements.iter().enumerate() {
            // zero-length paths match every node of every member
            if statement.path == Some(PathLength::ZeroOrMore) {
                let mut slot = slots[index].lock();
                for (member_index, member) in self.members.iter().enumerate() {
                    slot.push((member_index, source_of(member)));
                }
                continue;
            }

            let probe = probe_pattern(statement);
            let signature = PatternSignature::of(&probe);
            for (member_index, member) in self.members.iter().enumerate() {
                match self.cache.lookup(&signature, member.id()) {
                    SourceAssurance::ConfirmedPresent => {
                        slots[index].lock().push((member_index, source_of(member)));
                    }
                    SourceAssurance::ConfirmedAbsent => {}
                    SourceAssurance::PossiblyPresent => {
                        let key = (signature.clone(), member_index);
                        if let Some(&task) = queued.get(&key) {
                            pending[task].slots.push(slots[index].clone());
                            continue;
                        }
                        queued.insert(key, pending.len());
                        pending.push(ProbeTask {
                            slots: vec![slots[index].clone()],
                            member_index,
                            endpoint: member.clone(),
                            pattern: probe.clone(),
                            signature: signature.clone(),
                        });
                    }
                }
            }
        }

        if !pending.is_empty() {
            debug!(
                "Query {}: {} probes for {} statements",
                self.ctx.id(),
                pending.len(),
                statements.len()
            );
            self.run_probes(pending).await?;
        }

        let mut sources = HashMap::with_capacity(statements.len());
        let mut relevant = IndexSet::new();
        for (statement, slot) in statements.iter().zip(slots) {
            let mut found = std::mem::take(&mut *slot.lock());
            found.sort_by_key(|(member_index, _)| *member_index);
            let found: Vec<StatementSource> = found.into_iter().map(|(_, s)| s).collect();
            for source in &found {
                relevant.insert(source.endpoint.clone());
            }
            trace!("Statement {} has {} sources", statement, found.len());
            sources.insert(statement.id, found);
        }

        Ok(SourceSelection { sources, relevant })
    }

    async fn run_probes(&self, tasks: Vec<ProbeTask>) -> OptimizerResult<()> {
        let budget = self.ctx.remaining_time_budget();
        if budget == Some(Duration::ZERO) {
            self.ctx.abort();
            return Err(OptimizerError::OptimizationTimeout {
                budget: Duration::ZERO,
            });
        }

        let total = tasks.len();
        let (tx, mut rx) = mpsc::channel::<ProbeReport>(total);
        for task in tasks {
            let tx = tx.clone();
            let permits = self.pool.permits.clone();
            let cache = self.cache.clone();
            let ctx = self.ctx.clone();
            tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = ctx.aborted() => return,
                    permit = permits.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                };
                let id = task.endpoint.id().clone();
                let probe = task.endpoint.probe(&task.pattern, &ctx);
                tokio::pin!(probe);
                let finished = tokio::select! {
                    outcome = &mut probe => Some(outcome),
                    _ = ctx.aborted() => None,
                };
                // the slot goes back to the pool before any late result
                drop(permit);
                let outcome = match finished {
                    Some(outcome) => outcome,
                    None => probe.await,
                };
                match outcome {
                    Ok(has_results) => {
                        cache.update(&task.signature, &id, has_results);
                        if ctx.is_aborted() {
                            debug!("Discarding late probe result of {} for query {}", id, ctx.id());
                            return;
                        }
                        if has_results {
                            for slot in &task.slots {
                                slot.lock().push((task.member_index, source_of(&task.endpoint)));
                            }
                        }
                        let _ = tx.send(Ok(())).await;
                    }
                    Err(err) => {
                        if ctx.is_aborted() {
                            debug!("Ignoring probe error of {} after abort: {}", id, err);
                            return;
                        }
                        warn!("Probe of {} for query {} failed: {}", id, ctx.id(), err);
                        let _ = tx.send(Err((id, err))).await;
                    }
                }
            });
        }
        drop(tx);

        let ctx = self.ctx.clone();
        let wait = async move {
            let mut done = 0;
            while done < total {
                let report = tokio::select! {
                    report = rx.recv() => report,
                    _ = ctx.aborted() => return Err(OptimizerError::Aborted),
                };
                match report {
                    Some(Ok(())) => done += 1,
                    Some(Err((endpoint, err))) => {
                        ctx.abort();
                        return Err(OptimizerError::ProbeFailure {
                            endpoint: endpoint.to_string(),
                            message: err.to_string(),
                        });
                    }
                    // every task has ended, some without reporting
                    None if ctx.is_aborted() => return Err(OptimizerError::Aborted),
                    None => {
                        ctx.abort();
                        return Err(OptimizerError::ProbeFailure {
                            endpoint: "unknown".to_string(),
                            message: "probe task ended without reporting".to_string(),
                        });
                    }
                }
            }
            Ok(())
        };

        match budget {
            None => wait.await,
            Some(budget) => match tokio::time::timeout(budget, wait).await {
                Ok(result) => result,
                Err(_) => {
                    self.ctx.abort();
                    warn!("Query {}: source selection exceeded {:?}", self.ctx.id(), budget);
                    Err(OptimizerError::OptimizationTimeout { budget })
                }
            },
        }
    }
}

struct ProbeTask {
    slots: Vec<SourceSlot>,
    member_index: usize,
    endpoint: Arc<dyn Endpoint>,
    pattern: StatementPattern,
    signature: PatternSignature,
}

fn source_of(endpoint: &Arc<dyn Endpoint>) -> StatementSource {
    StatementSource::new(endpoint.id().clone(), endpoint.kind())
}

/// Paths are probed through their predicate alone
fn probe_pattern(statement: &StatementPattern) -> StatementPattern {
    if !statement.is_path() {
        return statement.clone();
    }
    let mut probe = StatementPattern::new(
        Var::variable("s"),
        statement.predicate.clone(),
        Var::variable("o"),
    );
    probe.id = statement.id;
    probe.context = statement.context.clone();
    probe
}

/// Result of source selection for one query
#[derive(Debug, Clone, Default)]
pub struct SourceSelection {
    sources: HashMap<PatternId, Vec<StatementSource>>,
    relevant: IndexSet<EndpointId>,
}

impl SourceSelection {
    /// Sources of a statement, in member order
    pub fn sources(&self, id: PatternId) -> &[StatementSource] {
        self.sources.get(&id).map(|s| s.as_slice()).unwrap_or(&[])
    }

    /// Endpoints that are a source of at least one statement
    pub fn relevant_endpoints(&self) -> Vec<EndpointId> {
        self.relevant.iter().cloned().collect()
    }

    /// Replace every raw statement by its source-annotated form
    pub fn apply(&self, plan: &mut PlanNode) {
        if let PlanNode::Statement(pattern) = plan {
            let Some(sources) = self.sources.get(&pattern.id) else {
                return;
            };
            let pattern = pattern.clone();
            let replacement = match sources.len() {
                0 => PlanNode::EmptyResult,
                _ if pattern.is_ground() && !pattern.is_path() => PlanNode::TrueResult,
                1 => PlanNode::ExclusiveStatement(ExclusiveStatement::new(
                    pattern,
                    sources[0].clone(),
                )),
                _ => PlanNode::StatementSources(SourcedStatement::new(pattern, sources.clone())),
            };
            plan.replace_with(replacement);
            return;
        }
        for child in plan.children_mut() {
            self.apply(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::{DatasetRestriction, EndpointRegistry, MemoryEndpoint, SourceKind};
    use crate::rdf::{NamedNode, Quad, RdfTerm};

    fn iri(s: &str) -> NamedNode {
        NamedNode::new(s).unwrap()
    }

    fn pattern(id: usize, predicate: &str) -> StatementPattern {
        let mut p = StatementPattern::new(
            Var::variable("s"),
            Var::constant(iri(predicate)),
            Var::variable("o"),
        );
        p.id = PatternId(id);
        p
    }

    fn registry() -> Arc<EndpointRegistry> {
        let registry = EndpointRegistry::new();
        let a = MemoryEndpoint::new("a");
        a.insert(Quad::new(iri("urn:x"), iri("urn:p"), iri("urn:y"))).unwrap();
        let b = MemoryEndpoint::new("b");
        b.insert(Quad::new(iri("urn:x"), iri("urn:p"), iri("urn:z"))).unwrap();
        b.insert(Quad::new(iri("urn:x"), iri("urn:q"), iri("urn:z"))).unwrap();
        registry.add(Arc::new(a));
        registry.add(Arc::new(b));
        Arc::new(registry)
    }

    fn context(registry: Arc<EndpointRegistry>) -> Arc<QueryContext> {
        Arc::new(QueryContext::new(registry, DatasetRestriction::default(), None))
    }

    #[tokio::test]
    async fn test_select_sources_and_apply() {
        let ctx = context(registry());
        let cache = Arc::new(SourceSelectionCache::new(100));
        let pool = ProbePool::new(4);
        let selector = SourceSelector::new(ctx.members(), &cache, &pool, &ctx);

        let statements = vec![pattern(0, "urn:p"), pattern(1, "urn:q"), pattern(2, "urn:r")];
        let selection = selector.select_sources(&statements).await.unwrap();

        let ids = |id| -> Vec<String> {
            selection
                .sources(PatternId(id))
                .iter()
                .map(|s| s.endpoint.to_string())
                .collect()
        };
        assert_eq!(ids(0), vec!["a", "b"]);
        assert_eq!(ids(1), vec!["b"]);
        assert!(ids(2).is_empty());
        assert_eq!(selection.relevant_endpoints().len(), 2);
        assert_eq!(selection.sources(PatternId(0))[0].kind, SourceKind::Local);
        // slots are returned and every probe outcome is cached
        assert_eq!(pool.available(), 4);
        assert!(cache.len() >= 6);

        let mut plan = PlanNode::NJoin(statements.into_iter().map(PlanNode::Statement).collect());
        selection.apply(&mut plan);
        let PlanNode::NJoin(args) = &plan else {
            panic!("expected join");
        };
        assert!(matches!(&args[0], PlanNode::StatementSources(s) if s.sources.len() == 2));
        assert!(matches!(&args[1], PlanNode::ExclusiveStatement(s) if s.owner.endpoint.as_str() == "b"));
        assert!(args[2].is_empty_result());
    }

    #[tokio::test]
    async fn test_ground_statement_becomes_true_result() {
        let ctx = context(registry());
        let cache = Arc::new(SourceSelectionCache::new(100));
        let pool = ProbePool::new(2);
        let selector = SourceSelector::new(ctx.members(), &cache, &pool, &ctx);

        let mut ground = StatementPattern::new(
            Var::constant(iri("urn:x")),
            Var::constant(iri("urn:q")),
            Var::constant(RdfTerm::from(iri("urn:z"))),
        );
        ground.id = PatternId(0);
        let selection = selector.select_sources(&[ground.clone()]).await.unwrap();

        let mut plan = PlanNode::Statement(ground);
        selection.apply(&mut plan);
        assert!(plan.is_true_result());
    }

    #[tokio::test]
    async fn test_paths_probe_predicate_and_zero_length_takes_all() {
        let ctx = context(registry());
        let cache = Arc::new(SourceSelectionCache::new(100));
        let pool = ProbePool::new(2);
        let selector = SourceSelector::new(ctx.members(), &cache, &pool, &ctx);

        let mut one_or_more = pattern(0, "urn:q").with_path(PathLength::OneOrMore);
        one_or_more.subject = Var::constant(iri("urn:nowhere"));
        let zero_or_more = pattern(1, "urn:missing").with_path(PathLength::ZeroOrMore);

        let selection = selector
            .select_sources(&[one_or_more, zero_or_more])
            .await
            .unwrap();
        assert_eq!(selection.sources(PatternId(0)).len(), 1);
        assert_eq!(selection.sources(PatternId(1)).len(), 2);
    }
}
