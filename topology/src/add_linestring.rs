use std::collections::BTreeMap;

use geom::{min_tolerance, Angle, Bounds, PolyLine, Pt2D, EPSILON_DIST};

use crate::{TopoError, Topology, ELEMENT_TYPE_EDGE};

impl Topology {
    /// Extend the topology so this linestring is represented as a walk of
    /// existing and new edges, with every intersection materialized as a
    /// node. Leaves the mutations staged: the caller decides `commit` or
    /// `rollback`.
    ///
    /// Returns the topogeo id now covering the line.
    pub fn add_linestring(
        &mut self,
        line_id: i64,
        pts: Vec<Pt2D>,
        tolerance: f64,
    ) -> Result<i64, TopoError> {
        let pts = Pt2D::approx_dedupe(pts, EPSILON_DIST);
        if pts.len() < 2 {
            return Err(TopoError::InvalidInput(format!(
                "line {} has fewer than 2 distinct points",
                line_id
            )));
        }
        let tolerance = if tolerance > 0.0 {
            tolerance
        } else {
            min_tolerance(&pts)
        };
        let mut line = PolyLine::new(pts);

        // Snap vertices onto existing nodes, and pull in nodes the line
        // passes close to.
        line = self.snap_line_to_nodes(&line, tolerance);
        line = self.reject_degenerate(line, line_id)?;

        // Endpoints landing near (but not on) an existing edge split that
        // edge and take the new node's position.
        line = self.anchor_endpoints(line, tolerance)?;

        // Fold nearby edge shapes into the line, so coincident stretches
        // match vertex for vertex.
        for eid in self.edges_within(&line.get_bounds().expand(tolerance)) {
            let geom = self.edge(eid).unwrap().geom.clone();
            if line.dwithin(&geom, tolerance) {
                line = line.snap_to(&geom, tolerance);
            }
        }
        line = self.reject_degenerate(line, line_id)?;

        // Everywhere the line meets existing geometry becomes a node and a
        // cut point; crossings in the interior of an edge split it.
        let mut cuts: Vec<Pt2D> = Vec::new();
        for nid in self.nodes_within(&line.get_bounds().expand(EPSILON_DIST)) {
            let pt = self.node(nid).unwrap().pt;
            if line.contains_pt(pt, EPSILON_DIST) {
                cuts.push(pt);
            }
        }
        cuts.extend(line.self_touch_points());

        for eid in self.edges_within(&line.get_bounds().expand(EPSILON_DIST)) {
            let geom = self.edge(eid).unwrap().geom.clone();
            for pt in line.crossings(&geom, EPSILON_DIST) {
                if self.node_at(pt).is_some() {
                    // Already a node; the scan above cut there.
                    continue;
                }
                // In the middle of a shared stretch the two walks are
                // locally identical; no node belongs there. Nodes go where
                // they cross, touch, or diverge.
                if directions_at(&line, pt) == directions_at(&geom, pt) {
                    continue;
                }
                let nid = self.materialize_node(pt)?;
                cuts.push(self.node(nid).unwrap().pt);
            }
        }

        // Insert the fragments, reusing edges the line collapses onto.
        let mut walk: Vec<i64> = Vec::new();
        for frag in line.split_at(&cuts, EPSILON_DIST) {
            if let Some(eid) = self.find_equal_edge(&frag) {
                walk.push(eid);
            } else {
                walk.push(self.add_edge(frag)?);
            }
        }
        if walk.is_empty() {
            return Err(TopoError::InvalidInput(format!(
                "line {} collapsed to nothing under tolerance {}",
                line_id, tolerance
            )));
        }

        let topogeo = self.create_relation_group();
        for eid in &walk {
            self.add_relation(topogeo, *eid, ELEMENT_TYPE_EDGE);
        }
        self.map_topogeom(line_id, topogeo);
        Ok(topogeo)
    }

    fn reject_degenerate(&self, line: PolyLine, line_id: i64) -> Result<PolyLine, TopoError> {
        PolyLine::maybe_new(line.into_points()).ok_or_else(|| {
            TopoError::InvalidInput(format!("line {} degenerates after snapping", line_id))
        })
    }

    /// Move each vertex onto the closest node within the tolerance, and fold
    /// in any node the line merely passes close to.
    fn snap_line_to_nodes(&mut self, line: &PolyLine, tolerance: f64) -> PolyLine {
        let mut targets: Vec<Pt2D> = Vec::new();
        for nid in self.nodes_within(&line.get_bounds().expand(tolerance)) {
            targets.push(self.node(nid).unwrap().pt);
        }
        if targets.is_empty() {
            return line.clone();
        }
        line.snap_to_points(&targets, tolerance)
    }

    /// An endpoint close to an existing edge projects onto it and splits it
    /// there, so the new line attaches to the network instead of dangling a
    /// hair's width away.
    fn anchor_endpoints(
        &mut self,
        line: PolyLine,
        tolerance: f64,
    ) -> Result<PolyLine, TopoError> {
        let mut pts = line.into_points();
        for idx in [0, 1] {
            let i = if idx == 0 { 0 } else { pts.len() - 1 };
            let pt = pts[i];
            if self.node_at(pt).is_some() {
                continue;
            }
            if let Some(eid) = self.closest_edge_within(pt, tolerance) {
                let cut = self.edge(eid).unwrap().geom.project_pt(pt);
                let nid = self.materialize_node(cut)?;
                pts[i] = self.node(nid).unwrap().pt;
            }
        }
        PolyLine::maybe_new(pts)
            .ok_or_else(|| TopoError::InvalidInput("line collapses onto the network".to_string()))
    }

    /// The node at this point, creating it by splitting the edge it lies on
    /// if needed.
    fn materialize_node(&mut self, pt: Pt2D) -> Result<i64, TopoError> {
        if let Some(nid) = self.node_at(pt) {
            return Ok(nid);
        }
        for eid in self.edges_within(&Bounds::from(&[pt]).expand(EPSILON_DIST)) {
            if self.edge(eid).unwrap().geom.contains_pt(pt, EPSILON_DIST) {
                let (nid, _, _) = self.split_edge_at(eid, pt)?;
                return Ok(nid);
            }
        }
        // Interior to the new line only; it becomes a node when the
        // fragments on either side are inserted.
        Ok(self.create_node(pt, None))
    }

    fn find_equal_edge(&mut self, frag: &PolyLine) -> Option<i64> {
        for eid in self.edges_within(&frag.get_bounds()) {
            if self.edge(eid).unwrap().geom.same_path(frag, EPSILON_DIST) {
                return Some(eid);
            }
        }
        None
    }

    /// Replace an edge with two halves meeting at a new node. Ring pointers
    /// of everything incident to the three nodes are recomputed; face labels
    /// carry over; relations covering the old edge now cover both halves.
    pub(crate) fn split_edge_at(
        &mut self,
        eid: i64,
        pt: Pt2D,
    ) -> Result<(i64, i64, i64), TopoError> {
        let old = self.edge(eid).unwrap().clone();
        if old.geom.first_pt().approx_eq(pt, EPSILON_DIST) {
            return Ok((old.start_node, eid, eid));
        }
        if old.geom.last_pt().approx_eq(pt, EPSILON_DIST) {
            return Ok((old.end_node, eid, eid));
        }
        let halves = old.geom.split_at(&[pt], EPSILON_DIST);
        if halves.len() != 2 {
            return Err(TopoError::Corrupt(format!(
                "splitting edge {} at {} produced {} pieces",
                eid,
                pt,
                halves.len()
            )));
        }

        let nid = self.create_node(pt, None);
        self.destroy_edge(eid);
        let e1 = self.create_edge(
            halves[0].clone(),
            old.start_node,
            nid,
            old.left_face,
            old.right_face,
        );
        let e2 = self.create_edge(
            halves[1].clone(),
            nid,
            old.end_node,
            old.left_face,
            old.right_face,
        );
        self.relink_node(old.start_node)?;
        self.relink_node(nid)?;
        if old.end_node != old.start_node {
            self.relink_node(old.end_node)?;
        }

        // Any topogeometry carried by the old edge is now carried by both
        // halves, in its place in the walk.
        let groups: Vec<i64> = self
            .relation_groups()
            .filter(|rels| {
                rels.iter()
                    .any(|r| r.element_type == ELEMENT_TYPE_EDGE && r.element_id == eid)
            })
            .map(|rels| rels[0].topogeo_id)
            .collect();
        for tg in groups {
            let mut rewritten = Vec::new();
            for r in self.relations[tg as usize].as_ref().unwrap() {
                if r.element_type == ELEMENT_TYPE_EDGE && r.element_id == eid {
                    let mut a = *r;
                    a.element_id = e1;
                    let mut b = *r;
                    b.element_id = e2;
                    rewritten.push(a);
                    rewritten.push(b);
                } else {
                    rewritten.push(*r);
                }
            }
            self.replace_relations(tg, rewritten);
        }

        Ok((nid, e1, e2))
    }

    /// Insert a brand-new edge: endpoints become nodes, ring pointers around
    /// both endpoints are rewired by azimuth order, and if the edge closes a
    /// ring, the containing face is split.
    fn add_edge(&mut self, geom: PolyLine) -> Result<i64, TopoError> {
        let start_pt = geom.first_pt();
        let end_pt = geom.last_pt();
        let start_az = geom.points()[0].angle_to(geom.points()[1]);
        let end_az = geom
            .last_pt()
            .angle_to(geom.points()[geom.points().len() - 2]);

        // Figure out which face the edge lies in, from every endpoint that
        // can tell us.
        let mut face_votes: Vec<i64> = Vec::new();
        for (pt, az) in [(start_pt, start_az), (end_pt, end_az)] {
            if let Some(nid) = self.node_at(pt) {
                if !self.incident_edges(nid).is_empty() {
                    face_votes.push(self.wedge_face(nid, az)?);
                } else if let Some(f) = self.node(nid).unwrap().containing_face {
                    face_votes.push(f);
                }
            }
        }
        let face = match face_votes.as_slice() {
            [] => self.face_of_point(start_pt),
            [f] => *f,
            [a, b] => {
                if a != b {
                    return Err(TopoError::Corrupt(format!(
                        "new edge endpoints disagree on the containing face: {} vs {}",
                        a, b
                    )));
                }
                *a
            }
            _ => unreachable!(),
        };

        let start_node = match self.node_at(start_pt) {
            Some(n) => n,
            None => self.create_node(start_pt, None),
        };
        let end_node = match self.node_at(end_pt) {
            Some(n) => n,
            None => self.create_node(end_pt, None),
        };
        // An endpoint node stops being isolated now.
        for nid in [start_node, end_node] {
            if self.node(nid).unwrap().containing_face.is_some() {
                self.edit_node(nid, |n| {
                    n.containing_face = None;
                });
            }
        }

        let id = self.create_edge(geom, start_node, end_node, face, face);
        self.relink_node(start_node)?;
        if end_node != start_node {
            self.relink_node(end_node)?;
        }

        self.maybe_split_face(id, face)?;
        Ok(id)
    }

    /// Every edge-end at this node, as (azimuth pointing away from the node,
    /// signed departing traversal), sorted counterclockwise.
    pub(crate) fn edge_ends_at(&self, node_id: i64) -> Vec<(Angle, i64)> {
        let mut ends: Vec<(Angle, i64)> = Vec::new();
        for eid in self.incident_edges(node_id) {
            let e = self.edge(eid).unwrap();
            if e.start_node == node_id {
                let pts = e.geom.points();
                ends.push((pts[0].angle_to(pts[1]), eid));
            }
            if e.end_node == node_id {
                let pts = e.geom.points();
                ends.push((pts[pts.len() - 1].angle_to(pts[pts.len() - 2]), -eid));
            }
        }
        ends.sort_by(|a, b| {
            (a.0.normalized_radians(), a.1)
                .partial_cmp(&(b.0.normalized_radians(), b.1))
                .unwrap()
        });
        ends
    }

    /// Recompute next/prev ring pointers for every edge-end at this node
    /// from the azimuth order. An edge-end's ring successor is the first
    /// departing direction clockwise from its own azimuth.
    pub(crate) fn relink_node(&mut self, node_id: i64) -> Result<(), TopoError> {
        let ends = self.edge_ends_at(node_id);
        let k = ends.len();
        if k == 0 {
            return Ok(());
        }
        for i in 0..k {
            for j in (i + 1)..k {
                if ends[i].0.approx_eq(ends[j].0, 1e-9) {
                    return Err(TopoError::Corrupt(format!(
                        "two edges leave node {} at the same azimuth",
                        node_id
                    )));
                }
            }
        }

        // Batch updates per edge so each gets one journal entry.
        #[derive(Default)]
        struct Update {
            next_left: Option<i64>,
            next_right: Option<i64>,
            prev_left: Option<i64>,
            prev_right: Option<i64>,
        }
        let mut updates: BTreeMap<i64, Update> = BTreeMap::new();

        for i in 0..k {
            let departing = ends[i].1;
            let arriving = -departing;
            // next(arriving) = the departing end one step clockwise
            let next = ends[(i + k - 1) % k].1;
            let u = updates.entry(departing.abs()).or_default();
            if arriving > 0 {
                u.next_left = Some(next);
            } else {
                u.next_right = Some(next);
            }
            // prev(departing) = the arriving end one step counterclockwise
            let prev = -ends[(i + 1) % k].1;
            let u = updates.entry(departing.abs()).or_default();
            if departing > 0 {
                u.prev_left = Some(prev);
            } else {
                u.prev_right = Some(prev);
            }
        }

        for (eid, u) in updates {
            self.edit_edge(eid, |e| {
                if let Some(v) = u.next_left {
                    e.next_left_edge = v;
                }
                if let Some(v) = u.next_right {
                    e.next_right_edge = v;
                }
                if let Some(v) = u.prev_left {
                    e.prev_left_edge = v;
                }
                if let Some(v) = u.prev_right {
                    e.prev_right_edge = v;
                }
            });
        }
        Ok(())
    }

    /// The face of the wedge a new edge-end with this azimuth would land in:
    /// the face to the left of the existing departing direction
    /// counterclockwise-below it.
    fn wedge_face(&self, node_id: i64, azimuth: Angle) -> Result<i64, TopoError> {
        let ends = self.edge_ends_at(node_id);
        if ends.is_empty() {
            error!("wedge face queried at node {} with no incident edges", node_id);
        }
        assert!(!ends.is_empty());
        let a = azimuth.normalized_radians();
        let mut below: Option<&(Angle, i64)> = None;
        for end in &ends {
            if end.0.approx_eq(azimuth, 1e-9) {
                return Err(TopoError::Corrupt(format!(
                    "new edge coincides with an existing edge at node {}",
                    node_id
                )));
            }
            if end.0.normalized_radians() < a {
                below = Some(end);
            }
        }
        // Wrap around to the highest azimuth if nothing is below.
        let (_, departing) = below.unwrap_or_else(|| ends.last().unwrap());
        let e = self.edge(departing.abs()).unwrap();
        Ok(if *departing > 0 {
            e.left_face
        } else {
            e.right_face
        })
    }
}

/// The distinct directions a walk leaves this point in, as rounded angle
/// keys. Two shapes with the same direction set at a point pass through it
/// identically.
fn directions_at(pl: &PolyLine, pt: Pt2D) -> Vec<i64> {
    let mut dirs: Vec<i64> = Vec::new();
    let mut push = |angle: geom::Angle| {
        let key = (angle.normalized_radians() * 1e7).round() as i64;
        if !dirs.contains(&key) {
            dirs.push(key);
        }
    };

    let pts = pl.points();
    let mut at_vertex = false;
    for (i, v) in pts.iter().enumerate() {
        if v.approx_eq(pt, EPSILON_DIST) {
            at_vertex = true;
            if i > 0 {
                push(v.angle_to(pts[i - 1]));
            }
            if i + 1 < pts.len() {
                push(v.angle_to(pts[i + 1]));
            }
        }
    }
    if !at_vertex {
        for l in pl.lines() {
            if l.contains_pt(pt, EPSILON_DIST) {
                push(l.angle());
                push(l.angle().opposite());
            }
        }
    }
    dirs.sort_unstable();
    dirs
}
