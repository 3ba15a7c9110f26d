//! Probe phase under deadlines, failures and pool pressure

mod common;

use common::{member, registry, Gauge, ScriptedEndpoint};
use samyama_federation::federation::PatternSignature;
use samyama_federation::{
    parse_query, DatasetRestriction, Endpoint, EndpointId, FederationConfig, FederationOptimizer,
    OptimizerError, ProbeError, QueryContext, SourceAssurance, StatementPattern, Var,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn context(members: Vec<Arc<dyn Endpoint>>, budget: Option<Duration>) -> Arc<QueryContext> {
    Arc::new(QueryContext::new(
        registry(members),
        DatasetRestriction::default(),
        budget,
    ))
}

fn two_statements() -> samyama_federation::PlanNode {
    parse_query("SELECT * WHERE { ?s <urn:p> ?o . ?o <urn:q> ?z }")
        .unwrap()
        .plan
}

#[tokio::test]
async fn test_zero_budget_times_out_without_probing() {
    let a = Arc::new(ScriptedEndpoint::new("a", &["urn:p", "urn:q"]));
    let ctx = context(vec![member(&a)], Some(Duration::ZERO));
    let optimizer = FederationOptimizer::default();

    let result = optimizer.optimize(two_statements(), &ctx).await;
    assert_eq!(
        result,
        Err(OptimizerError::OptimizationTimeout {
            budget: Duration::ZERO
        })
    );
    assert_eq!(a.probe_count(), 0);
    assert!(ctx.is_aborted());
}

#[tokio::test]
async fn test_first_probe_failure_aborts_query() {
    let a = Arc::new(ScriptedEndpoint::new("a", &["urn:p", "urn:q"]));
    let b = Arc::new(
        ScriptedEndpoint::new("b", &["urn:p"])
            .failing(ProbeError::Unreachable("connection refused".to_string())),
    );
    let ctx = context(vec![member(&a), member(&b)], None);
    let optimizer = FederationOptimizer::default();

    let result = optimizer.optimize(two_statements(), &ctx).await;
    match result {
        Err(OptimizerError::ProbeFailure { endpoint, message }) => {
            assert_eq!(endpoint, "b");
            assert!(message.contains("connection refused"));
        }
        other => panic!("expected probe failure, got {:?}", other),
    }
    assert!(ctx.is_aborted());
}

#[tokio::test]
async fn test_slow_probe_exceeds_budget() {
    let slow = Arc::new(
        ScriptedEndpoint::new("slow", &["urn:p"]).with_delay(Duration::from_secs(5)),
    );
    let ctx = context(vec![member(&slow)], Some(Duration::from_millis(50)));
    let optimizer = FederationOptimizer::default();

    let started = Instant::now();
    let result = optimizer.optimize(two_statements(), &ctx).await;
    assert!(started.elapsed() < Duration::from_secs(5));
    match result {
        Err(OptimizerError::OptimizationTimeout { budget }) => {
            assert!(budget <= Duration::from_millis(50));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(ctx.is_aborted());
    // the hung probe no longer occupies the pool
    wait_for_idle_pool(&optimizer).await;
    assert!(started.elapsed() < Duration::from_secs(5));
}

/// Wait until every pool slot is free, failing well before any slow probe returns
async fn wait_for_idle_pool(optimizer: &FederationOptimizer) {
    let size = optimizer.pool().size();
    tokio::time::timeout(Duration::from_secs(1), async {
        while optimizer.pool().available() < size {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("pool slots were not released");
}

#[tokio::test]
async fn test_timed_out_query_does_not_starve_the_next() {
    let hung = Arc::new(
        ScriptedEndpoint::new("hung", &["urn:p"]).with_delay(Duration::from_secs(3)),
    );
    let optimizer = FederationOptimizer::new(FederationConfig::default().with_probe_worker_threads(1));

    let ctx = context(vec![member(&hung)], Some(Duration::from_millis(50)));
    let result = optimizer.optimize(two_statements(), &ctx).await;
    assert!(matches!(result, Err(OptimizerError::OptimizationTimeout { .. })));
    wait_for_idle_pool(&optimizer).await;

    let a = Arc::new(ScriptedEndpoint::new("a", &["urn:p"]));
    let b = Arc::new(ScriptedEndpoint::new("b", &["urn:q"]));
    let ctx = context(vec![member(&a), member(&b)], Some(Duration::from_millis(500)));
    let plan = optimizer.optimize(two_statements(), &ctx).await.unwrap();
    assert_eq!(plan.statement_count(), 2);
    assert_eq!(optimizer.pool().available(), 1);
}

#[tokio::test]
async fn test_external_abort_discards_late_results() {
    let slow = Arc::new(
        ScriptedEndpoint::new("slow", &["urn:p"]).with_delay(Duration::from_millis(100)),
    );
    let ctx = context(vec![member(&slow)], None);
    let optimizer = FederationOptimizer::default();

    let aborter = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ctx.abort();
        })
    };
    let started = Instant::now();
    let plan = parse_query("SELECT * WHERE { ?s <urn:p> ?o }").unwrap().plan;
    let result = optimizer.optimize(plan, &ctx).await;
    aborter.await.unwrap();

    assert_eq!(result, Err(OptimizerError::Aborted));
    assert!(started.elapsed() < Duration::from_millis(100));
    wait_for_idle_pool(&optimizer).await;

    // the probe still completes in the background and teaches the cache
    let statement = StatementPattern::new(
        Var::variable("s"),
        Var::constant(common::iri("urn:p")),
        Var::variable("o"),
    );
    let signature = PatternSignature::of(&statement);
    tokio::time::timeout(Duration::from_secs(1), async {
        while optimizer.cache().lookup(&signature, &EndpointId::new("slow"))
            != SourceAssurance::ConfirmedPresent
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("late outcome was not cached");
    assert_eq!(slow.probe_count(), 1);
}

#[tokio::test]
async fn test_probe_pool_bounds_concurrency() {
    let gauge = Arc::new(Gauge::default());
    let endpoints: Vec<Arc<ScriptedEndpoint>> = (0..6)
        .map(|i| {
            Arc::new(
                ScriptedEndpoint::new(&format!("e{}", i), &["urn:p"])
                    .with_delay(Duration::from_millis(20))
                    .with_gauge(gauge.clone()),
            )
        })
        .collect();
    let ctx = context(endpoints.iter().map(member).collect(), None);
    let optimizer = FederationOptimizer::new(FederationConfig::default().with_probe_worker_threads(2));

    let plan = optimizer.optimize(two_statements(), &ctx).await.unwrap();
    // urn:q has no source anywhere
    assert!(plan.statement_count() == 0);
    assert!(gauge.peak() <= 2, "peak {}", gauge.peak());
    for endpoint in &endpoints {
        assert_eq!(endpoint.probe_count(), 2);
    }
    assert_eq!(optimizer.pool().available(), 2);
}

#[tokio::test]
async fn test_cache_keeps_outcomes_of_failed_query() {
    let a = Arc::new(ScriptedEndpoint::new("a", &["urn:p"]));
    let b = Arc::new(
        ScriptedEndpoint::new("b", &["urn:p"])
            .with_delay(Duration::from_millis(100))
            .failing(ProbeError::Protocol("bad response".to_string())),
    );
    let ctx = context(vec![member(&a), member(&b)], None);
    let optimizer = FederationOptimizer::default();

    let plan = parse_query("SELECT * WHERE { ?s <urn:p> ?o }").unwrap().plan;
    assert!(optimizer.optimize(plan, &ctx).await.is_err());

    let statement = StatementPattern::new(
        Var::variable("s"),
        Var::constant(common::iri("urn:p")),
        Var::variable("o"),
    );
    assert_eq!(
        optimizer
            .cache()
            .lookup(&PatternSignature::of(&statement), &EndpointId::new("a")),
        SourceAssurance::ConfirmedPresent
    );
}

#[tokio::test]
async fn test_concurrent_queries_share_the_pool() {
    let a = Arc::new(ScriptedEndpoint::new("a", &["urn:p"]).with_delay(Duration::from_millis(10)));
    let b = Arc::new(ScriptedEndpoint::new("b", &["urn:q"]).with_delay(Duration::from_millis(10)));
    let optimizer = FederationOptimizer::new(FederationConfig::default().with_probe_worker_threads(1));

    let (a_ref, b_ref, optimizer_ref) = (&a, &b, &optimizer);
    let run = move || async move {
        let ctx = context(vec![member(a_ref), member(b_ref)], Some(Duration::from_secs(10)));
        optimizer_ref.optimize(two_statements(), &ctx).await
    };
    let (first, second, third) = tokio::join!(run(), run(), run());
    for result in [first, second, third] {
        let plan = result.unwrap();
        assert_eq!(plan.statement_count(), 2);
    }
    // concurrent queries may probe the same pattern before the cache knows it
    assert!(a.probe_count() >= 2 && a.probe_count() <= 6);
    assert_eq!(optimizer.pool().available(), 1);
}
