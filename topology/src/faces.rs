use std::collections::BTreeSet;

use geom::{Bounds, Pt2D, Ring};

use crate::{TopoError, Topology, ELEMENT_TYPE_FACE, UNIVERSAL_FACE};

impl Topology {
    /// Follow next pointers from a signed starting edge until the walk comes
    /// back around. The result holds the start only at position 0.
    pub(crate) fn walk_ring(&self, start: i64) -> Result<Vec<i64>, TopoError> {
        let mut seq = vec![start];
        let mut cur = self.next_in_ring(start)?;
        while cur != start {
            seq.push(cur);
            if seq.len() > 2 * self.edges.len() + 2 {
                return Err(TopoError::Corrupt(format!(
                    "ring from edge {} never closes",
                    start
                )));
            }
            cur = self.next_in_ring(cur)?;
        }
        Ok(seq)
    }

    fn next_in_ring(&self, signed: i64) -> Result<i64, TopoError> {
        let e = self
            .edge(signed.abs())
            .ok_or_else(|| TopoError::Corrupt(format!("ring pointer to dead edge {}", signed)))?;
        Ok(if signed > 0 {
            e.next_left_edge
        } else {
            e.next_right_edge
        })
    }

    /// The boundary geometry of a ring walk.
    pub(crate) fn ring_geometry(&self, walk: &[i64]) -> Result<Ring, TopoError> {
        let mut pts: Vec<Pt2D> = Vec::new();
        for signed in walk {
            let e = self.edge(signed.abs()).unwrap();
            let mut piece = e.geom.points().clone();
            if *signed < 0 {
                piece.reverse();
            }
            if pts.is_empty() {
                pts.extend(piece);
            } else {
                pts.extend(piece.into_iter().skip(1));
            }
        }
        Ring::maybe_new(pts).ok_or_else(|| {
            TopoError::Corrupt(format!("ring walk {:?} has degenerate geometry", walk))
        })
    }

    /// If this freshly linked edge closed a ring on one of its sides, split
    /// the face it lies in: a new face for the enclosed side, with ring
    /// edges, enclosed geometry, and relations all updated.
    pub(crate) fn maybe_split_face(&mut self, edge_id: i64, face: i64) -> Result<(), TopoError> {
        let left_walk = self.walk_ring(edge_id)?;
        if left_walk.contains(&-edge_id) {
            // Both sides of the edge are on the same ring; nothing encloses.
            return Ok(());
        }
        let left_ring = self.ring_geometry(&left_walk)?;
        if left_ring.is_ccw() {
            return self.split_face(&left_walk, left_ring, face);
        }
        let right_walk = self.walk_ring(-edge_id)?;
        let right_ring = self.ring_geometry(&right_walk)?;
        if right_ring.is_ccw() {
            return self.split_face(&right_walk, right_ring, face);
        }
        Err(TopoError::Corrupt(format!(
            "edge {} closed a ring but neither side encloses area",
            edge_id
        )))
    }

    fn split_face(&mut self, walk: &[i64], ring: Ring, old_face: i64) -> Result<(), TopoError> {
        let new_face = self.create_face(ring.get_bounds());

        let on_ring: BTreeSet<i64> = walk.iter().copied().collect();
        for signed in &on_ring {
            let e = self.edge(signed.abs()).unwrap();
            let labeled = if *signed > 0 { e.left_face } else { e.right_face };
            if labeled != old_face {
                return Err(TopoError::Corrupt(format!(
                    "ring edge {} is labeled face {}, expected {}",
                    signed, labeled, old_face
                )));
            }
            let forward = *signed > 0;
            self.edit_edge(signed.abs(), |e| {
                if forward {
                    e.left_face = new_face;
                } else {
                    e.right_face = new_face;
                }
            });
        }

        // Geometry strictly inside the new ring moves into the new face.
        let inside_ids: Vec<i64> = self
            .live_edges()
            .filter(|e| {
                !on_ring.contains(&e.id)
                    && !on_ring.contains(&-e.id)
                    && (e.left_face == old_face || e.right_face == old_face)
            })
            .map(|e| e.id)
            .collect();
        for eid in inside_ids {
            let e = self.edge(eid).unwrap();
            let rep = midpoint_of_first_segment(&e.geom);
            if ring.contains_pt(rep) {
                let flip_left = e.left_face == old_face;
                let flip_right = e.right_face == old_face;
                self.edit_edge(eid, |e| {
                    if flip_left {
                        e.left_face = new_face;
                    }
                    if flip_right {
                        e.right_face = new_face;
                    }
                });
            }
        }

        let node_ids: Vec<i64> = self
            .live_nodes()
            .filter(|n| n.containing_face == Some(old_face) && ring.contains_pt(n.pt))
            .map(|n| n.id)
            .collect();
        for nid in node_ids {
            self.edit_node(nid, |n| {
                n.containing_face = Some(new_face);
            });
        }

        if old_face != UNIVERSAL_FACE {
            let mut mbr = Bounds::new();
            let mut any = false;
            for e in self.live_edges() {
                if e.left_face == old_face || e.right_face == old_face {
                    mbr.union(&e.get_bounds());
                    any = true;
                }
            }
            if any {
                self.edit_face(old_face, |f| {
                    f.mbr = Some(mbr);
                });
            }
        }

        // Topogeometries covering the split face keep covering all of it.
        let groups: Vec<i64> = self
            .relation_groups()
            .filter(|rels| {
                rels.iter()
                    .any(|r| r.element_type == ELEMENT_TYPE_FACE && r.element_id == old_face)
            })
            .map(|rels| rels[0].topogeo_id)
            .collect();
        for tg in groups {
            self.add_relation(tg, new_face, ELEMENT_TYPE_FACE);
        }

        Ok(())
    }

    /// Every distinct boundary ring of a face.
    pub(crate) fn face_rings(&self, face: i64) -> Vec<Ring> {
        let mut sides: BTreeSet<i64> = BTreeSet::new();
        for e in self.live_edges() {
            if e.left_face == face {
                sides.insert(e.id);
            }
            if e.right_face == face {
                sides.insert(-e.id);
            }
        }
        let mut rings = Vec::new();
        let mut visited: BTreeSet<i64> = BTreeSet::new();
        for side in sides.clone() {
            if visited.contains(&side) {
                continue;
            }
            let Ok(walk) = self.walk_ring(side) else {
                continue;
            };
            for s in &walk {
                visited.insert(*s);
            }
            if let Ok(ring) = self.ring_geometry(&walk) {
                rings.push(ring);
            }
        }
        rings
    }

    /// The smallest bounded face containing this point, or the universal
    /// face.
    pub(crate) fn face_of_point(&self, pt: Pt2D) -> i64 {
        let mut best: Option<(f64, i64)> = None;
        for f in self.live_faces() {
            if f.id == UNIVERSAL_FACE {
                continue;
            }
            if let Some(ref mbr) = f.mbr {
                if !mbr.contains(pt) {
                    continue;
                }
            }
            // The shell is the ring enclosing the most area.
            let shell = self
                .face_rings(f.id)
                .into_iter()
                .max_by(|a, b| {
                    a.signed_area()
                        .abs()
                        .partial_cmp(&b.signed_area().abs())
                        .unwrap()
                });
            if let Some(shell) = shell {
                let area = shell.signed_area().abs();
                if shell.contains_pt(pt) && best.map(|(ba, _)| area < ba).unwrap_or(true) {
                    best = Some((area, f.id));
                }
            }
        }
        best.map(|(_, id)| id).unwrap_or(UNIVERSAL_FACE)
    }
}

fn midpoint_of_first_segment(pl: &geom::PolyLine) -> Pt2D {
    let pts = pl.points();
    Pt2D::new(
        (pts[0].x() + pts[1].x()) / 2.0,
        (pts[0].y() + pts[1].y()) / 2.0,
    )
}
