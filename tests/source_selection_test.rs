//! Source selection against scripted endpoints

mod common;

use common::{iri, member, registry, ScriptedEndpoint};
use samyama_federation::algebra::{PatternId, StatementPattern, Var};
use samyama_federation::federation::PatternSignature;
use samyama_federation::optimizer::{ProbePool, SourceSelector};
use samyama_federation::{
    DatasetRestriction, EndpointId, QueryContext, SourceAssurance, SourceSelectionCache,
};
use std::sync::Arc;
use std::time::Duration;

fn pattern(id: usize, subject: Option<&str>, predicate: &str) -> StatementPattern {
    let subject = match subject {
        Some(s) => Var::constant(iri(s)),
        None => Var::variable("s"),
    };
    let mut p = StatementPattern::new(subject, Var::constant(iri(predicate)), Var::variable("o"));
    p.id = PatternId(id);
    p
}

fn context(members: Vec<Arc<dyn samyama_federation::Endpoint>>) -> Arc<QueryContext> {
    Arc::new(QueryContext::new(
        registry(members),
        DatasetRestriction::default(),
        Some(Duration::from_secs(10)),
    ))
}

fn endpoint_ids(selection: &samyama_federation::optimizer::SourceSelection, id: usize) -> Vec<String> {
    selection
        .sources(PatternId(id))
        .iter()
        .map(|s| s.endpoint.to_string())
        .collect()
}

#[tokio::test]
async fn test_cache_assurance_combines_with_probes() {
    // every endpoint could answer, the cache decides who gets probed
    let a = Arc::new(ScriptedEndpoint::new("a", &["urn:p"]));
    let b = Arc::new(ScriptedEndpoint::new("b", &["urn:p"]));
    let c = Arc::new(ScriptedEndpoint::new("c", &["urn:p"]));
    let ctx = context(vec![member(&a), member(&b), member(&c)]);

    let statement = pattern(0, None, "urn:p");
    let signature = PatternSignature::of(&statement);
    let cache = Arc::new(SourceSelectionCache::new(100));
    cache.update(&signature, &EndpointId::new("a"), true);
    cache.update(&signature, &EndpointId::new("b"), false);

    let pool = ProbePool::new(4);
    let selector = SourceSelector::new(ctx.members(), &cache, &pool, &ctx);
    let selection = selector.select_sources(&[statement]).await.unwrap();

    assert_eq!(endpoint_ids(&selection, 0), vec!["a", "c"]);
    assert_eq!(a.probe_count(), 0);
    assert_eq!(b.probe_count(), 0);
    assert_eq!(c.probe_count(), 1);
    assert_eq!(
        cache.lookup(&signature, &EndpointId::new("c")),
        SourceAssurance::ConfirmedPresent
    );
}

#[tokio::test]
async fn test_probe_outcomes_are_reused() {
    let a = Arc::new(ScriptedEndpoint::new("a", &["urn:p"]));
    let b = Arc::new(ScriptedEndpoint::new("b", &["urn:q"]));
    let cache = Arc::new(SourceSelectionCache::new(100));
    let pool = ProbePool::new(4);

    for _ in 0..3 {
        let ctx = context(vec![member(&a), member(&b)]);
        let selector = SourceSelector::new(ctx.members(), &cache, &pool, &ctx);
        let selection = selector
            .select_sources(&[pattern(0, None, "urn:p"), pattern(1, None, "urn:q")])
            .await
            .unwrap();
        assert_eq!(endpoint_ids(&selection, 0), vec!["a"]);
        assert_eq!(endpoint_ids(&selection, 1), vec!["b"]);
    }
    // first round only: two statements on two endpoints each
    assert_eq!(a.probe_count(), 2);
    assert_eq!(b.probe_count(), 2);
}

#[tokio::test]
async fn test_generalised_knowledge() {
    let a = Arc::new(ScriptedEndpoint::new("a", &["urn:p"]));
    let cache = Arc::new(SourceSelectionCache::new(100));
    let pool = ProbePool::new(2);

    // a specific match implies the general pattern matches
    let ctx = context(vec![member(&a)]);
    let selector = SourceSelector::new(ctx.members(), &cache, &pool, &ctx);
    selector
        .select_sources(&[pattern(0, Some("urn:x"), "urn:p")])
        .await
        .unwrap();
    let selection = selector
        .select_sources(&[pattern(0, None, "urn:p")])
        .await
        .unwrap();
    assert_eq!(endpoint_ids(&selection, 0), vec!["a"]);
    assert_eq!(a.probe_count(), 1);

    // a general miss implies every specific pattern misses
    let selection = selector.select_sources(&[pattern(0, None, "urn:q")]).await.unwrap();
    assert!(endpoint_ids(&selection, 0).is_empty());
    let selection = selector
        .select_sources(&[pattern(0, Some("urn:x"), "urn:q")])
        .await
        .unwrap();
    assert!(endpoint_ids(&selection, 0).is_empty());
    assert_eq!(a.probe_count(), 2);
}

#[tokio::test]
async fn test_sources_follow_member_order() {
    let slow = Arc::new(ScriptedEndpoint::new("slow", &["urn:p"]).with_delay(Duration::from_millis(50)));
    let fast = Arc::new(ScriptedEndpoint::new("fast", &["urn:p"]));
    let ctx = context(vec![member(&slow), member(&fast)]);
    let cache = Arc::new(SourceSelectionCache::new(100));
    let pool = ProbePool::new(4);

    let selector = SourceSelector::new(ctx.members(), &cache, &pool, &ctx);
    let selection = selector.select_sources(&[pattern(0, None, "urn:p")]).await.unwrap();
    assert_eq!(endpoint_ids(&selection, 0), vec!["slow", "fast"]);
    assert_eq!(
        selection.relevant_endpoints(),
        vec![EndpointId::new("slow"), EndpointId::new("fast")]
    );
}

#[tokio::test]
async fn test_dataset_restricts_members() {
    let a = Arc::new(ScriptedEndpoint::new("a", &["urn:p"]));
    let b = Arc::new(ScriptedEndpoint::new("b", &["urn:p"]));
    let ctx = Arc::new(QueryContext::new(
        registry(vec![member(&a), member(&b)]),
        DatasetRestriction::default().with_endpoints(vec![EndpointId::new("b")]),
        None,
    ));
    let cache = Arc::new(SourceSelectionCache::new(100));
    let pool = ProbePool::new(4);

    let selector = SourceSelector::new(ctx.members(), &cache, &pool, &ctx);
    let selection = selector.select_sources(&[pattern(0, None, "urn:p")]).await.unwrap();
    assert_eq!(endpoint_ids(&selection, 0), vec!["b"]);
    assert_eq!(a.probe_count(), 0);
}

#[tokio::test]
async fn test_equivalent_statements_share_one_probe() {
    let a = Arc::new(ScriptedEndpoint::new("a", &["urn:p"]));
    let b = Arc::new(ScriptedEndpoint::new("b", &["urn:q"]));
    let ctx = context(vec![member(&a), member(&b)]);
    let cache = Arc::new(SourceSelectionCache::new(100));
    let pool = ProbePool::new(4);

    let selector = SourceSelector::new(ctx.members(), &cache, &pool, &ctx);
    let selection = selector
        .select_sources(&[pattern(0, None, "urn:p"), pattern(1, None, "urn:p")])
        .await
        .unwrap();
    assert_eq!(endpoint_ids(&selection, 0), vec!["a"]);
    assert_eq!(endpoint_ids(&selection, 1), vec!["a"]);
    assert_eq!(a.probe_count(), 1);
    assert_eq!(b.probe_count(), 1);
}
