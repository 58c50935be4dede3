use crate::{Topology, ELEMENT_TYPE_EDGE, ELEMENT_TYPE_FACE};

/// Union two disjoint topologies by renumbering everything in `t2` into
/// `t1`'s id space and appending. The universal face is shared; every other
/// primitive gets the next free id, preserving tombstones so the id maps
/// stay flat. `t2` is emptied and must not be reused.
///
/// Both transaction logs must be empty, and the two topologies must not
/// geometrically overlap.
pub fn merge(t1: &mut Topology, t2: &mut Topology) {
    if t1.in_transaction() || t2.in_transaction() {
        error!(
            "merging topologies #{} and #{} with a transaction still staged",
            t1.zone_id(),
            t2.zone_id()
        );
    }
    assert!(!t1.in_transaction());
    assert!(!t2.in_transaction());

    let mut node_map: Vec<i64> = vec![-1; t2.nodes.len()];
    let mut edge_map: Vec<i64> = vec![-1; t2.edges.len()];
    let mut face_map: Vec<i64> = vec![-1; t2.faces.len()];
    let mut relation_map: Vec<i64> = vec![-1; t2.relations.len()];

    // The universal face stays the same even after merge.
    if !face_map.is_empty() {
        face_map[0] = 0;
    }

    let first_new_edge = t1.edges.len() as i64;

    let mut next_node_id = t1.nodes.len() as i64;
    for slot in t2.nodes.drain(1..) {
        let slot = slot.map(|mut n| {
            node_map[n.id as usize] = next_node_id;
            n.id = next_node_id;
            n
        });
        t1.nodes.push(slot);
        next_node_id += 1;
    }

    let mut next_edge_id = t1.edges.len() as i64;
    for slot in t2.edges.drain(1..) {
        let slot = slot.map(|mut e| {
            edge_map[e.id as usize] = next_edge_id;
            e.id = next_edge_id;
            e
        });
        t1.edges.push(slot);
        next_edge_id += 1;
    }

    let mut next_face_id = t1.faces.len() as i64;
    for slot in t2.faces.drain(1..) {
        let slot = slot.map(|mut f| {
            face_map[f.id as usize] = next_face_id;
            f.id = next_face_id;
            f
        });
        t1.faces.push(slot);
        next_face_id += 1;
    }

    let mut next_topogeo_id = t1.relations.len() as i64;
    for (topogeo_id, slot) in t2.relations.drain(1..).enumerate() {
        relation_map[topogeo_id + 1] = next_topogeo_id;
        let slot = slot.map(|mut rels| {
            for r in &mut rels {
                r.topogeo_id = next_topogeo_id;
                match r.element_type {
                    ELEMENT_TYPE_EDGE => {
                        r.element_id = edge_map[r.element_id as usize];
                    }
                    ELEMENT_TYPE_FACE => {
                        r.element_id = face_map[r.element_id as usize];
                    }
                    other => panic!("relation with unknown element type {}", other),
                }
            }
            rels
        });
        t1.relations.push(slot);
        next_topogeo_id += 1;
    }

    for (line_id, topogeo_id) in std::mem::take(&mut t2.topogeom) {
        t1.topogeom
            .insert(line_id, relation_map[topogeo_id as usize]);
    }

    // Patch cross-references on everything that just came over. Ring
    // pointers keep their traversal sign.
    for i in first_new_edge..t1.edges.len() as i64 {
        let Some(e) = t1.edges[i as usize].as_mut() else {
            continue;
        };
        e.start_node = node_map[e.start_node as usize];
        e.end_node = node_map[e.end_node as usize];

        e.next_left_edge = if e.next_left_edge < 0 {
            -edge_map[(-e.next_left_edge) as usize]
        } else {
            edge_map[e.next_left_edge as usize]
        };
        e.next_right_edge = if e.next_right_edge < 0 {
            -edge_map[(-e.next_right_edge) as usize]
        } else {
            edge_map[e.next_right_edge as usize]
        };
        e.abs_next_left_edge = e.next_left_edge.abs();
        e.abs_next_right_edge = e.next_right_edge.abs();

        e.prev_left_edge = if e.prev_left_edge < 0 {
            -edge_map[(-e.prev_left_edge) as usize]
        } else {
            edge_map[e.prev_left_edge as usize]
        };
        e.prev_right_edge = if e.prev_right_edge < 0 {
            -edge_map[(-e.prev_right_edge) as usize]
        } else {
            edge_map[e.prev_right_edge as usize]
        };

        e.left_face = face_map[e.left_face as usize];
        e.right_face = face_map[e.right_face as usize];
    }

    let mut remapped_nodes = 0;
    for i in (t1.nodes.len() - (node_map.len().saturating_sub(1)))..t1.nodes.len() {
        if let Some(n) = t1.nodes[i].as_mut() {
            if let Some(f) = n.containing_face {
                n.containing_face = Some(face_map[f as usize]);
            }
            remapped_nodes += 1;
        }
    }

    info!(
        "merged topology for zone #{} into #{}: {} nodes came over",
        t2.zone_id(),
        t1.zone_id(),
        remapped_nodes
    );

    *t2 = Topology::new(t2.zone_id());
    t1.orphan_count = -1;
    // The quadtrees only cover the old extent; force a rebuild before the
    // next lookup.
    t1.invalidate_indexes();
}
