use samyama_federation::{
    parse_query, DatasetRestriction, EndpointRegistry, FederationConfig, FederationOptimizer,
    Literal, MemoryEndpoint, NamedNode, Quad,
};
use std::sync::Arc;

const FOAF: &str = "http://xmlns.com/foaf/0.1/";
const EX: &str = "http://example.org/";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("Samyama Federation v{}", samyama_federation::version());
    println!("==========================================");
    println!();

    let config = match std::env::args().nth(1) {
        Some(path) => FederationConfig::from_yaml_file(&path)?,
        None => FederationConfig::default(),
    };
    let registry = Arc::new(build_federation()?);
    let optimizer = FederationOptimizer::new(config);

    let queries = [
        (
            "Exclusive group",
            "PREFIX foaf: <http://xmlns.com/foaf/0.1/> \
             SELECT ?name ?mbox WHERE { ?p foaf:name ?name . ?p foaf:mbox ?mbox }",
        ),
        (
            "Cross-endpoint join",
            "PREFIX foaf: <http://xmlns.com/foaf/0.1/> \
             PREFIX ex: <http://example.org/> \
             SELECT * WHERE { ?p foaf:name ?name . ?p ex:worksOn ?project . ?project ex:title ?title }",
        ),
        (
            "Filter pushdown",
            "PREFIX ex: <http://example.org/> \
             SELECT * WHERE { ?p ex:worksOn ?project . ?project ex:title ?title \
             FILTER(?project = ex:apollo) }",
        ),
        (
            "Union and limit",
            "PREFIX foaf: <http://xmlns.com/foaf/0.1/> \
             PREFIX ex: <http://example.org/> \
             SELECT * WHERE { { ?x foaf:name ?label } UNION { ?x ex:title ?label } } LIMIT 10",
        ),
        (
            "Unknown predicate",
            "SELECT * WHERE { ?s <http://example.org/missing> ?o . ?s ?p ?o }",
        ),
    ];

    for (title, text) in queries {
        println!("=== {} ===", title);
        println!("{}", text);
        let parsed = parse_query(text)?;
        let ctx = optimizer.query_context(registry.clone(), DatasetRestriction::default());
        match optimizer.optimize(parsed.plan, &ctx).await {
            Ok(plan) => println!("\n{}", plan),
            Err(e) => println!("\nOptimization failed: {}\n", e),
        }
    }

    println!("Source selection cache: {} entries", optimizer.cache().len());
    Ok(())
}

fn iri(local: &str, base: &str) -> anyhow::Result<NamedNode> {
    Ok(NamedNode::new(&format!("{}{}", base, local))?)
}

/// Two people endpoints and one project endpoint
fn build_federation() -> anyhow::Result<EndpointRegistry> {
    let people = MemoryEndpoint::new("people").with_url("http://people.example/sparql");
    for (who, mbox) in [("alice", "mailto:alice@example.org"), ("bob", "mailto:bob@example.org")] {
        let person = iri(who, EX)?;
        people.insert(Quad::new(
            person.clone(),
            iri("name", FOAF)?,
            Literal::new_simple_literal(who),
        ))?;
        people.insert(Quad::new(person, iri("mbox", FOAF)?, NamedNode::new(mbox)?))?;
    }

    let staff = MemoryEndpoint::new("staff").with_url("http://staff.example/sparql");
    let carol = iri("carol", EX)?;
    staff.insert(Quad::new(
        carol.clone(),
        iri("name", FOAF)?,
        Literal::new_simple_literal("carol"),
    ))?;
    staff.insert(Quad::new(carol, iri("worksOn", EX)?, iri("apollo", EX)?))?;

    let projects = MemoryEndpoint::new("projects").with_url("http://projects.example/sparql");
    projects.insert(Quad::new(
        iri("apollo", EX)?,
        iri("title", EX)?,
        Literal::new_simple_literal("Apollo"),
    ))?;

    let registry = EndpointRegistry::new();
    registry.add(Arc::new(people));
    registry.add(Arc::new(staff));
    registry.add(Arc::new(projects));
    println!("Federation with {} endpoints", registry.len());
    Ok(registry)
}
