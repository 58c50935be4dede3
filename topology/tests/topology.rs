use geom::Pt2D;
use topology::{merge, TopoError, Topology, UNIVERSAL_FACE};

fn pts(list: &[(f64, f64)]) -> Vec<Pt2D> {
    list.iter().map(|(x, y)| Pt2D::new(*x, *y)).collect()
}

fn add(t: &mut Topology, id: i64, line: &[(f64, f64)]) {
    t.add_linestring(id, pts(line), 0.0).unwrap();
    t.commit();
    t.validate().unwrap();
}

fn bounded_faces(t: &Topology) -> usize {
    t.live_faces().filter(|f| f.id != UNIVERSAL_FACE).count()
}

#[test]
fn single_edge() {
    let mut t = Topology::new(0);
    add(&mut t, 1, &[(0.0, 0.0), (10.0, 10.0)]);

    assert_eq!(t.live_nodes().count(), 2);
    assert_eq!(t.live_edges().count(), 1);
    assert_eq!(bounded_faces(&t), 0);
    assert_eq!(t.count(), 1);
}

#[test]
fn t_intersection_splits_the_crossbar() {
    let mut t = Topology::new(0);
    add(&mut t, 1, &[(0.0, 0.0), (10.0, 0.0)]);
    add(&mut t, 2, &[(5.0, 0.0), (5.0, 5.0)]);

    assert_eq!(t.live_nodes().count(), 4);
    assert_eq!(t.live_edges().count(), 3);
    assert_eq!(bounded_faces(&t), 0);
    // The first line is now covered by the two halves of the split edge
    assert_eq!(t.topogeom_edges(1).len(), 2);
    assert_eq!(t.topogeom_edges(2).len(), 1);
}

#[test]
fn crossing_makes_five_nodes() {
    let mut t = Topology::new(0);
    add(&mut t, 1, &[(0.0, 0.0), (10.0, 10.0)]);
    add(&mut t, 2, &[(0.0, 10.0), (10.0, 0.0)]);

    assert_eq!(t.live_nodes().count(), 5);
    assert_eq!(t.live_edges().count(), 4);
    assert_eq!(bounded_faces(&t), 0);
}

#[test]
fn closed_square_makes_a_face() {
    let mut t = Topology::new(0);
    add(&mut t, 1, &[(0.0, 0.0), (1.0, 0.0)]);
    add(&mut t, 2, &[(1.0, 0.0), (1.0, 1.0)]);
    add(&mut t, 3, &[(1.0, 1.0), (0.0, 1.0)]);
    add(&mut t, 4, &[(0.0, 1.0), (0.0, 0.0)]);

    assert_eq!(t.live_nodes().count(), 4);
    assert_eq!(t.live_edges().count(), 4);
    assert_eq!(bounded_faces(&t), 1);

    // Every side has the bounded face on one side and the universal face on
    // the other.
    let face = t.live_faces().find(|f| f.id != UNIVERSAL_FACE).unwrap().id;
    for e in t.live_edges() {
        assert_ne!(e.left_face, e.right_face);
        assert!(e.left_face == face || e.right_face == face);
        assert!(e.left_face == UNIVERSAL_FACE || e.right_face == UNIVERSAL_FACE);
    }
    for n in t.live_nodes() {
        assert_eq!(n.containing_face, None);
    }
}

#[test]
fn chord_splits_a_face() {
    let mut t = Topology::new(0);
    add(&mut t, 1, &[(0.0, 0.0), (1.0, 0.0)]);
    add(&mut t, 2, &[(1.0, 0.0), (1.0, 1.0)]);
    add(&mut t, 3, &[(1.0, 1.0), (0.0, 1.0)]);
    add(&mut t, 4, &[(0.0, 1.0), (0.0, 0.0)]);
    add(&mut t, 5, &[(0.0, 0.0), (1.0, 1.0)]);

    assert_eq!(t.live_nodes().count(), 4);
    assert_eq!(t.live_edges().count(), 5);
    assert_eq!(bounded_faces(&t), 2);

    // The diagonal separates the two bounded faces
    let diagonal = t
        .live_edges()
        .find(|e| t.topogeom_edges(5).contains(&e.id))
        .unwrap();
    assert_ne!(diagonal.left_face, UNIVERSAL_FACE);
    assert_ne!(diagonal.right_face, UNIVERSAL_FACE);
    assert_ne!(diagonal.left_face, diagonal.right_face);
}

#[test]
fn tolerance_snaps_a_nearby_endpoint() {
    let mut t = Topology::new(0);
    add(&mut t, 1, &[(0.0, 0.0), (10.0, 0.0)]);
    t.add_linestring(2, pts(&[(5.0000001, 0.0000001), (5.0, 5.0)]), 1e-4)
        .unwrap();
    t.commit();
    t.validate().unwrap();

    // Same shape as the T-intersection: the second line's start landed on
    // the first edge and split it.
    assert_eq!(t.live_nodes().count(), 4);
    assert_eq!(t.live_edges().count(), 3);
    assert!(t
        .live_nodes()
        .any(|n| n.pt.approx_eq(Pt2D::new(5.0, 0.0), 1e-4)));
}

#[test]
fn degenerate_input_is_rejected() {
    let mut t = Topology::new(0);
    match t.add_linestring(1, pts(&[(3.0, 3.0), (3.0, 3.0)]), 0.0) {
        Err(TopoError::InvalidInput(_)) => {}
        other => panic!("expected InvalidInput, got {:?}", other.map(|_| ())),
    }
    t.rollback();
    assert_eq!(t.live_nodes().count(), 0);
    assert_eq!(t.live_edges().count(), 0);
}

#[test]
fn rollback_restores_the_exact_prior_state() {
    let mut t = Topology::new(0);
    add(&mut t, 1, &[(0.0, 0.0), (1.0, 0.0)]);
    add(&mut t, 2, &[(1.0, 0.0), (1.0, 1.0)]);
    add(&mut t, 3, &[(1.0, 1.0), (0.0, 1.0)]);
    add(&mut t, 4, &[(0.0, 1.0), (0.0, 0.0)]);

    let before = bincode::serialize(&t).unwrap();

    // A staged line that splits edges and a face, then gets rolled back
    t.add_linestring(5, pts(&[(0.5, -1.0), (0.5, 2.0)]), 0.0)
        .unwrap();
    assert!(t.in_transaction());
    t.rollback();

    let after = bincode::serialize(&t).unwrap();
    assert_eq!(before, after);
    t.validate().unwrap();
}

#[test]
fn readding_the_same_line_adds_no_edges() {
    let mut t = Topology::new(0);
    add(&mut t, 1, &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
    let edges_before = t.live_edges().count();
    let nodes_before = t.live_nodes().count();

    add(&mut t, 2, &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
    assert_eq!(t.live_edges().count(), edges_before);
    assert_eq!(t.live_nodes().count(), nodes_before);
    // Both lines map onto the same primitives
    assert_eq!(t.topogeom_edges(1), t.topogeom_edges(2));
}

#[test]
fn merge_is_a_disjoint_union() {
    let mut t1 = Topology::new(0);
    add(&mut t1, 1, &[(0.0, 0.0), (5.0, 5.0)]);
    add(&mut t1, 2, &[(1.0, 0.0), (6.0, 0.0)]);

    let mut t2 = Topology::new(1);
    add(&mut t2, 3, &[(100.0, 100.0), (105.0, 105.0)]);

    let nodes = t1.live_nodes().count() + t2.live_nodes().count();
    let edges = t1.live_edges().count() + t2.live_edges().count();
    let faces = t1.live_faces().count() + t2.live_faces().count();
    let groups = t1.relation_groups().count() + t2.relation_groups().count();

    merge(&mut t1, &mut t2);
    t1.rebuild_indexes();
    t1.validate().unwrap();

    assert_eq!(t1.live_nodes().count(), nodes);
    assert_eq!(t1.live_edges().count(), edges);
    // The universal face is shared
    assert_eq!(t1.live_faces().count(), faces - 1);
    assert_eq!(t1.relation_groups().count(), groups);
    assert_eq!(t1.count(), 3);

    // t2 is empty and unusable for further merging
    assert_eq!(t2.live_nodes().count(), 0);
    assert_eq!(t2.count(), 0);

    // The renumbered edge is still reachable through its line
    assert_eq!(t1.topogeom_edges(3).len(), 1);
}

#[test]
fn adding_across_a_merge_connects_the_halves() {
    let mut t1 = Topology::new(0);
    add(&mut t1, 1, &[(0.0, 5.0), (9.0, 5.0)]);
    let mut t2 = Topology::new(1);
    add(&mut t2, 2, &[(11.0, 5.0), (20.0, 5.0)]);

    merge(&mut t1, &mut t2);
    t1.rebuild_indexes();

    // The straddling line bridges the gap, collapsing onto both existing
    // edges at its ends
    add(&mut t1, 3, &[(9.0, 5.0), (11.0, 5.0)]);
    assert_eq!(t1.live_edges().count(), 3);
    assert_eq!(t1.live_nodes().count(), 4);
    assert_eq!(t1.count(), 3);
}
