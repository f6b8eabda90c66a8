use heroine_graph::graph::{EdgeData, GraphData, GraphStore, NodeData};
use heroine_graph::{Color, GraphError};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn node(id: &str) -> NodeData {
    NodeData::new(id)
}

fn edge(a: &str, b: &str) -> EdgeData {
    EdgeData::new(a, b)
}

fn chain(n: usize) -> GraphData {
    let nodes = (0..n).map(|i| node(&format!("n{i}"))).collect();
    let edges = (1..n).map(|i| edge(&format!("n{}", i - 1), &format!("n{i}"))).collect();
    GraphData { nodes, edges }
}

// ── Loading ───────────────────────────────────────────────────────────────────

#[test]
fn load_counts_nodes_and_edges() {
    let mut store = GraphStore::new();
    store.load(chain(5)).unwrap();
    assert_eq!(store.node_count(), 5);
    assert_eq!(store.edge_count(), 4);
}

#[test]
fn every_edge_endpoint_resolves_after_load() {
    let mut store = GraphStore::new();
    store.load(chain(10)).unwrap();
    for e in store.edges() {
        assert!(store.id_of(e.source).is_some());
        assert!(store.id_of(e.target).is_some());
    }
}

#[test]
fn self_loops_are_silently_dropped() {
    let mut store = GraphStore::new();
    let mut data = chain(3);
    data.edges.push(edge("n1", "n1"));
    store.load(data).unwrap();
    assert_eq!(store.edge_count(), 2);
    assert_eq!(store.self_loops_dropped(), 1);
}

#[test]
fn duplicate_edges_are_retained() {
    let mut store = GraphStore::new();
    let mut data = chain(2);
    data.edges.push(edge("n0", "n1"));
    data.edges.push(edge("n0", "n1"));
    store.load(data).unwrap();
    assert_eq!(store.edge_count(), 3);
}

#[test]
fn unknown_edge_endpoint_rejects_load_and_preserves_state() {
    let mut store = GraphStore::new();
    store.load(chain(3)).unwrap();

    let mut bad = chain(2);
    bad.edges.push(edge("n0", "ghost"));
    match store.load(bad) {
        Err(GraphError::InvalidTopology { id }) => assert_eq!(id, "ghost"),
        other => panic!("expected InvalidTopology, got {other:?}"),
    }
    // Prior graph intact.
    assert_eq!(store.node_count(), 3);
    assert_eq!(store.edge_count(), 2);
}

#[test]
fn invalid_color_rejects_load() {
    let mut store = GraphStore::new();
    let mut data = chain(2);
    data.nodes[0].color = Some("#nope".into());
    assert!(matches!(store.load(data), Err(GraphError::InvalidColor { .. })));
}

#[test]
fn degrees_count_incident_edges() {
    let mut store = GraphStore::new();
    store.load(chain(4)).unwrap();
    let deg: Vec<u32> = store.degrees().to_vec();
    assert_eq!(deg, vec![1, 2, 2, 1]);
}

// ── Initial placement ─────────────────────────────────────────────────────────

#[test]
fn placement_is_deterministic_for_a_node_count() {
    let mut a = GraphStore::new();
    let mut b = GraphStore::new();
    a.load(chain(50)).unwrap();
    b.load(chain(50)).unwrap();
    assert_eq!(a.states(), b.states());
}

#[test]
fn placement_stays_on_the_sqrt_n_disc() {
    let mut store = GraphStore::new();
    store.load(chain(100)).unwrap();
    let radius = (100.0f32).sqrt() + 1e-3;
    for s in store.states() {
        let r = (s[0] * s[0] + s[1] * s[1]).sqrt();
        assert!(r <= radius, "node at distance {r} outside disc radius {radius}");
    }
}

#[test]
fn explicit_positions_are_honoured() {
    let mut store = GraphStore::new();
    let mut data = chain(2);
    data.nodes[0].x = Some(42.0);
    data.nodes[0].y = Some(-17.0);
    store.load(data).unwrap();
    assert_eq!(store.states()[0][0], 42.0);
    assert_eq!(store.states()[0][1], -17.0);
}

// ── Interning & attributes ────────────────────────────────────────────────────

#[test]
fn indices_are_dense_and_ids_round_trip() {
    let mut store = GraphStore::new();
    store.load(chain(6)).unwrap();
    for i in 0..6u32 {
        let id = store.id_of(i).unwrap().to_string();
        assert_eq!(store.index_of(&id), Some(i));
    }
}

#[test]
fn attribute_setters_update_styles() {
    let mut store = GraphStore::new();
    store.load(chain(2)).unwrap();
    assert!(store.set_node_radius("n0", 9.5));
    assert!(store.set_node_color("n0", Color::rgba(1.0, 0.0, 0.0, 1.0)));
    assert!(store.set_node_importance("n0", 2.0)); // clamped
    assert!(store.set_node_pinned("n0", true));
    let style = store.styles()[0];
    assert_eq!(style.radius, 9.5);
    assert_eq!(style.color, [1.0, 0.0, 0.0, 1.0]);
    assert_eq!(style.importance, 1.0);
    assert_eq!(style.flags & heroine_graph::graph::NODE_PINNED, 1);

    assert!(!store.set_node_radius("ghost", 1.0));
}

// ── Removal & compaction ──────────────────────────────────────────────────────

#[test]
fn removal_drops_incident_edges_and_updates_degrees() {
    let mut store = GraphStore::new();
    store.load(chain(4)).unwrap();
    assert!(store.remove_by_id("n1"));
    assert_eq!(store.node_count(), 3);
    assert_eq!(store.edge_count(), 1); // only n2–n3 survives
    assert!(store.index_of("n1").is_none());

    let n2 = store.index_of("n2").unwrap();
    assert_eq!(store.degrees()[n2 as usize], 1);
}

#[test]
fn removing_unknown_id_is_a_noop() {
    let mut store = GraphStore::new();
    store.load(chain(2)).unwrap();
    assert!(!store.remove_by_id("ghost"));
    assert_eq!(store.node_count(), 2);
}

#[test]
fn heavy_removal_compacts_to_dense_indices() {
    let mut store = GraphStore::new();
    store.load(chain(8)).unwrap();
    for id in ["n0", "n2", "n4", "n6"] {
        assert!(store.remove_by_id(id));
    }
    // Over 25% tombstones forces compaction: the slot table shrinks below
    // the original 8 even though one tombstone may remain afterwards.
    assert_eq!(store.node_count(), 4);
    assert!(store.slot_count() <= 5, "slots = {}", store.slot_count());
    for e in store.edges() {
        assert!(store.id_of(e.source).is_some());
        assert!(store.id_of(e.target).is_some());
    }
    // Survivors keep their ids.
    for id in ["n1", "n3", "n5", "n7"] {
        assert!(store.index_of(id).is_some(), "{id} lost in compaction");
    }
}

#[test]
fn add_nodes_and_edges_extend_the_graph() {
    let mut store = GraphStore::new();
    store.load(chain(2)).unwrap();
    store.add_nodes(&[node("x")]).unwrap();
    store.add_edges(&[edge("n1", "x")]).unwrap();
    assert_eq!(store.node_count(), 3);
    assert_eq!(store.edge_count(), 2);

    assert!(matches!(
        store.add_edges(&[edge("x", "ghost")]),
        Err(GraphError::InvalidTopology { .. })
    ));
}

#[test]
fn bbox_tracks_live_nodes_only() {
    let mut store = GraphStore::new();
    let mut data = GraphData::default();
    for (i, (x, y)) in [(0.0, 0.0), (10.0, 0.0), (0.0, 20.0)].iter().enumerate() {
        let mut n = node(&format!("n{i}"));
        n.x = Some(*x);
        n.y = Some(*y);
        data.nodes.push(n);
    }
    store.load(data).unwrap();
    let (min, max) = store.positions_bbox().unwrap();
    assert_eq!((min.x, min.y), (0.0, 0.0));
    assert_eq!((max.x, max.y), (10.0, 20.0));
}
