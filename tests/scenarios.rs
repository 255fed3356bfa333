//! End-to-end counting through units-of-work

use relcount::{
    AttachedStore, CachedCounter, Counter, Direction, EdgeRecord, MemoryGraph, RelcountConfig, RelcountError,
    RelcountModule, Shape, VertexId,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn follows(id: u128, src: VertexId, dst: VertexId, strength: i64) -> EdgeRecord {
    EdgeRecord::new(id, src, dst, "FOLLOWS").with_property("strength", strength)
}

/// Vertex 1 follows five vertices: three with strength 1, two with strength 2
fn five_follows(module: &mut RelcountModule) -> MemoryGraph {
    let mut graph = MemoryGraph::new();
    let mut tx = graph.begin();
    for v in 1..=6 {
        tx.create_vertex(v);
    }
    for (i, strength) in [1, 1, 1, 2, 2].into_iter().enumerate() {
        let i = i as u128;
        tx.create_edge(follows(100 + i, 1, 2 + i, strength));
    }
    graph.commit(tx, module).unwrap();
    graph
}

fn out() -> Shape {
    Shape::wildcard("FOLLOWS", Direction::Outgoing)
}

#[test]
fn test_cached_agrees_with_naive_before_compaction() {
    init_logging();
    let mut module = RelcountModule::new(RelcountConfig::new()).unwrap();
    let graph = five_follows(&mut module);

    let naive = module.naive_counter();
    let cached = module.cached_counter();
    for (query, expected) in [
        (out(), 5),
        (out().with("strength", "1"), 3),
        (out().with("strength", "2"), 2),
    ] {
        assert_eq!(naive.count(&graph, 1, &query).unwrap(), expected, "naive {}", query);
        assert_eq!(cached.count(&graph, 1, &query).unwrap(), expected, "cached {}", query);
    }
    assert_eq!(module.cache().entries(&graph, 1).unwrap().len(), 2);
}

#[test]
fn test_threshold_one_generalizes_strength() {
    init_logging();
    let mut module = RelcountModule::new(RelcountConfig::new().with_threshold(1)).unwrap();
    let graph = five_follows(&mut module);

    let entries = module.cache().entries(&graph, 1).unwrap();
    assert_eq!(entries.len(), 1);
    let merged = Shape::literal("FOLLOWS", Direction::Outgoing).with_any("strength");
    assert_eq!(entries.get(&merged), Some(&5));

    let cached = module.cached_counter();
    assert_eq!(cached.count(&graph, 1, &out().with("strength", "1")).unwrap(), 5);
    assert_eq!(cached.count(&graph, 1, &out()).unwrap(), 5);

    // precise counting gives up on the merged entry and walks the edges
    let precise = module.falling_back_counter().precise();
    assert_eq!(precise.count(&graph, 1, &out().with("strength", "1")).unwrap(), 3);
}

#[test]
fn test_decrement_on_unpopulated_vertex() {
    init_logging();
    let mut graph = MemoryGraph::new();
    let mut tx = graph.begin();
    tx.create_vertex(1).create_vertex(2);
    tx.create_edge(follows(10, 1, 2, 1));
    graph.commit(tx, &mut relcount::graph::NoEvents).unwrap();

    let mut module = RelcountModule::new(RelcountConfig::new()).unwrap();
    let mut cache = relcount::ShapeCache::new(module.config()).unwrap();
    let shape = Shape::literal("FOLLOWS", Direction::Outgoing).with("strength", "1");

    let result = cache.apply_delta(&mut graph, 1, &shape, -1);
    assert!(matches!(result, Err(RelcountError::Desynchronized { vertex: 1, .. })));
    assert_eq!(CachedCounter::new(&cache).count(&graph, 1, &out()).unwrap(), 0);
    assert!(cache.entries(&graph, 1).unwrap().is_empty());

    // the module repairs instead of failing the unit-of-work
    let mut tx = graph.begin();
    tx.delete_edge(10);
    graph.commit(tx, &mut module).unwrap();
    assert_eq!(module.cached_counter().count(&graph, 1, &out()).unwrap(), 0);
    assert!(module.audit(&graph, &[1, 2]).unwrap().is_consistent());
}

#[test]
fn test_deletes_and_vertex_removal() {
    init_logging();
    let mut module = RelcountModule::new(RelcountConfig::new()).unwrap();
    let mut graph = five_follows(&mut module);

    let mut tx = graph.begin();
    tx.delete_edge(100).delete_edge(103);
    graph.commit(tx, &mut module).unwrap();
    assert_eq!(module.count(&graph, 1, &out().with("strength", "1")).unwrap(), 2);
    assert_eq!(module.count(&graph, 1, &out().with("strength", "2")).unwrap(), 1);

    let mut tx = graph.begin();
    tx.delete_vertex(1);
    graph.commit(tx, &mut module).unwrap();
    let incoming = Shape::new("FOLLOWS", Direction::Incoming);
    for v in 2..=6 {
        assert_eq!(module.count(&graph, v, &incoming).unwrap(), 0);
    }
    assert!(module.audit(&graph, &[2, 3, 4, 5, 6]).unwrap().is_consistent());
}

#[test]
fn test_batch_equivalent_to_individual_events() {
    init_logging();
    let config = RelcountConfig::new().with_threshold(2);

    let mut individual = RelcountModule::new(config.clone()).unwrap();
    let individual_graph = five_follows(&mut individual);

    let mut batched = RelcountModule::new(config).unwrap();
    batched.start_batch().unwrap();
    let mut batched_graph = five_follows(&mut batched);
    assert!(matches!(batched.start_batch(), Err(RelcountError::BatchState(_))));
    batched.end_batch(&mut batched_graph).unwrap();
    assert!(matches!(batched.end_batch(&mut batched_graph), Err(RelcountError::BatchState(_))));

    for v in 1..=6 {
        assert_eq!(
            individual.cache().entries(&individual_graph, v).unwrap(),
            batched.cache().entries(&batched_graph, v).unwrap()
        );
    }
}

#[test]
fn test_initialize_existing_graph() {
    init_logging();
    let mut bootstrap = RelcountModule::new(RelcountConfig::new().with_id("old")).unwrap();
    let mut graph = five_follows(&mut bootstrap);

    let mut module = RelcountModule::new(RelcountConfig::new().with_id("new")).unwrap();
    assert!(!module.is_complete(&graph, 1).unwrap());
    assert_eq!(module.initialize(&mut graph).unwrap(), 6);

    assert_eq!(module.cached_counter().count(&graph, 1, &out().with("strength", "1")).unwrap(), 3);
    // both instances keep separate entries on the same vertex
    assert_eq!(
        module.cache().entries(&graph, 1).unwrap(),
        bootstrap.cache().entries(&graph, 1).unwrap()
    );
}

#[test]
fn test_weighted_self_loops() {
    init_logging();
    let strategies = relcount::Strategies::default().with_weighing(relcount::strategy::PropertyWeight::new("strength"));
    let mut module = RelcountModule::with_strategies(RelcountConfig::new(), strategies).unwrap();

    let mut graph = MemoryGraph::new();
    let mut tx = graph.begin();
    tx.create_vertex(1).create_vertex(2);
    tx.create_edge(follows(10, 1, 1, 4)).create_edge(follows(11, 1, 2, 2));
    graph.commit(tx, &mut module).unwrap();

    assert_eq!(module.count(&graph, 1, &Shape::new("FOLLOWS", Direction::Outgoing)).unwrap(), 6);
    assert_eq!(module.count(&graph, 1, &Shape::new("FOLLOWS", Direction::Incoming)).unwrap(), 4);
    assert_eq!(module.count(&graph, 2, &Shape::new("FOLLOWS", Direction::Both)).unwrap(), 2);
    assert_eq!(
        module.naive_counter().count(&graph, 1, &Shape::new("FOLLOWS", Direction::Both)).unwrap(),
        6
    );
}

#[test]
fn test_failed_commit_during_batch_discards_its_counts() {
    init_logging();
    let mut module = RelcountModule::new(RelcountConfig::new()).unwrap();
    module.start_batch().unwrap();
    let mut graph = five_follows(&mut module);

    let mut tx = graph.begin();
    tx.create_edge(follows(200, 1, 2, 3));
    tx.delete_edge(100);
    tx.create_edge(EdgeRecord::new(201, 1, 3, "FOLLOWS").with_property("note", "a#b"));
    assert!(matches!(graph.commit(tx, &mut module), Err(RelcountError::InvalidShape(_))));

    // buffered counts read during the batch already match the graph
    assert_eq!(module.cached_counter().count(&graph, 1, &out()).unwrap(), 5);
    module.end_batch(&mut graph).unwrap();

    assert_eq!(graph.edge_count(), 5);
    let naive = module.naive_counter();
    let cached = module.cached_counter();
    for query in [out(), out().with("strength", "1"), out().with("strength", "3")] {
        assert_eq!(
            cached.count(&graph, 1, &query).unwrap(),
            naive.count(&graph, 1, &query).unwrap(),
            "query {}",
            query
        );
    }
    assert!(module.audit(&graph, &[1, 2, 3, 4, 5, 6]).unwrap().is_consistent());
}

#[test]
fn test_vertex_deleted_during_batch_keeps_no_counts() {
    init_logging();
    let mut module = RelcountModule::new(RelcountConfig::new()).unwrap();
    let mut graph = MemoryGraph::new();
    let mut tx = graph.begin();
    tx.create_vertex(1).create_vertex(2);
    graph.commit(tx, &mut module).unwrap();

    module.start_batch().unwrap();
    let mut tx = graph.begin();
    tx.create_edge(follows(10, 1, 2, 1));
    graph.commit(tx, &mut module).unwrap();

    let mut tx = graph.begin();
    tx.delete_vertex(2);
    graph.commit(tx, &mut module).unwrap();
    module.end_batch(&mut graph).unwrap();

    assert!(graph.attached_keys(2, "").unwrap().is_empty());
    assert_eq!(module.count(&graph, 1, &out()).unwrap(), 0);

    let mut tx = graph.begin();
    tx.create_vertex(2);
    graph.commit(tx, &mut module).unwrap();

    let incoming = Shape::new("FOLLOWS", Direction::Incoming);
    assert!(module.is_complete(&graph, 2).unwrap());
    assert_eq!(module.count(&graph, 2, &incoming).unwrap(), 0);
    assert_eq!(module.naive_counter().count(&graph, 2, &incoming).unwrap(), 0);
}

#[test]
fn test_failed_vertex_deletion_during_batch_restores_counts() {
    init_logging();
    let mut module = RelcountModule::new(RelcountConfig::new()).unwrap();
    module.start_batch().unwrap();
    let mut graph = five_follows(&mut module);

    let mut tx = graph.begin();
    tx.delete_vertex(2).create_edge(follows(200, 1, 99, 1));
    assert!(matches!(graph.commit(tx, &mut module), Err(RelcountError::VertexNotFound(99))));
    module.end_batch(&mut graph).unwrap();

    let incoming = Shape::new("FOLLOWS", Direction::Incoming);
    assert_eq!(module.count(&graph, 2, &incoming).unwrap(), 1);
    assert_eq!(module.count(&graph, 1, &out()).unwrap(), 5);
    assert!(module.audit(&graph, &[1, 2, 3, 4, 5, 6]).unwrap().is_consistent());
}
