use std::collections::{BTreeMap, BTreeSet, HashMap};

use aabb_quadtree::QuadTree;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use geom::{Bounds, PolyLine, Pt2D, EPSILON_DIST};

use crate::objects::{Edge, Face, Node, Relation, ELEMENT_TYPE_EDGE, ELEMENT_TYPE_FACE};
use crate::UNIVERSAL_FACE;

/// A planar graph of nodes, edges and faces, plus the relation table mapping
/// external line ids onto it. All cross-references are dense integer ids; id
/// 0 is reserved (the universal face). Removed slots are tombstoned, never
/// compacted, which is what lets the merger renumber by simple appends.
#[derive(Serialize, Deserialize)]
pub struct Topology {
    zone_id: i64,
    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) edges: Vec<Option<Edge>>,
    pub(crate) faces: Vec<Option<Face>>,
    /// Indexed by topogeo id; each entry is the set of primitives that
    /// together represent one input line.
    pub(crate) relations: Vec<Option<Vec<Relation>>>,
    /// External line id to topogeo id.
    pub(crate) topogeom: BTreeMap<i64, i64>,

    /// How many boundary-straddling lines were folded in after the merge
    /// producing this topology. -1 means unknown (a pre-versioning
    /// checkpoint), which forces recomputation.
    #[serde(skip, default = "unknown_orphans")]
    pub orphan_count: i64,

    #[serde(skip)]
    journal: Vec<UndoOp>,
    #[serde(skip)]
    node_index: Option<QuadTree<i64>>,
    #[serde(skip)]
    edge_index: Option<QuadTree<i64>>,
    #[serde(skip)]
    node_edges: HashMap<i64, BTreeSet<i64>>,
}

fn unknown_orphans() -> i64 {
    -1
}

/// The quadtree stores f32 rects; pad every box past the worst-case rounding
/// error for its magnitude so a touching candidate can't get rounded out.
fn index_pad(bounds: &Bounds) -> Bounds {
    let magnitude = bounds
        .min_x
        .abs()
        .max(bounds.max_x.abs())
        .max(bounds.min_y.abs())
        .max(bounds.max_y.abs());
    bounds.expand(1e-6 * (1.0 + magnitude))
}

enum UndoOp {
    CreateNode,
    CreateEdge,
    CreateFace,
    CreateRelationGroup,
    EditNode(i64, Node),
    EditEdge(i64, Edge),
    EditFace(i64, Face),
    DestroyEdge(i64, Edge),
    EditRelationGroup(i64, Vec<Relation>),
    MapTopogeom(i64, Option<i64>),
}

impl Topology {
    pub fn new(zone_id: i64) -> Topology {
        let mut t = Topology {
            zone_id,
            nodes: vec![None],
            edges: vec![None],
            faces: vec![None],
            relations: vec![None],
            topogeom: BTreeMap::new(),
            orphan_count: -1,
            journal: Vec::new(),
            node_index: None,
            edge_index: None,
            node_edges: HashMap::new(),
        };
        t.faces[0] = Some(Face {
            id: UNIVERSAL_FACE,
            mbr: None,
        });
        t
    }

    pub fn zone_id(&self) -> i64 {
        self.zone_id
    }

    pub fn set_zone_id(&mut self, id: i64) {
        self.zone_id = id;
    }

    /// How many input lines this topology represents.
    pub fn count(&self) -> usize {
        self.topogeom.len()
    }

    pub fn node(&self, id: i64) -> Option<&Node> {
        self.nodes.get(id as usize).and_then(|slot| slot.as_ref())
    }

    pub fn edge(&self, id: i64) -> Option<&Edge> {
        self.edges.get(id as usize).and_then(|slot| slot.as_ref())
    }

    pub fn face(&self, id: i64) -> Option<&Face> {
        self.faces.get(id as usize).and_then(|slot| slot.as_ref())
    }

    pub fn live_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter_map(|slot| slot.as_ref())
    }

    pub fn live_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter_map(|slot| slot.as_ref())
    }

    pub fn live_faces(&self) -> impl Iterator<Item = &Face> {
        self.faces.iter().filter_map(|slot| slot.as_ref())
    }

    pub fn relation_groups(&self) -> impl Iterator<Item = &Vec<Relation>> {
        self.relations.iter().filter_map(|slot| slot.as_ref())
    }

    /// The edges making up one input line, in the order they were recorded.
    pub fn topogeom_edges(&self, line_id: i64) -> Vec<i64> {
        let Some(tg) = self.topogeom.get(&line_id) else {
            return Vec::new();
        };
        self.relations[*tg as usize]
            .as_ref()
            .map(|rels| {
                rels.iter()
                    .filter(|r| r.element_type == ELEMENT_TYPE_EDGE)
                    .map(|r| r.element_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn in_transaction(&self) -> bool {
        !self.journal.is_empty()
    }

    pub fn commit(&mut self) {
        self.journal.clear();
    }

    /// Undo every staged mutation, restoring the exact state before the
    /// transaction began.
    pub fn rollback(&mut self) {
        while let Some(op) = self.journal.pop() {
            match op {
                UndoOp::CreateNode => {
                    let n = self.nodes.pop().unwrap().unwrap();
                    self.node_edges.remove(&n.id);
                }
                UndoOp::CreateEdge => {
                    let e = self.edges.pop().unwrap().unwrap();
                    self.detach_edge_ends(&e);
                }
                UndoOp::CreateFace => {
                    self.faces.pop().unwrap().unwrap();
                }
                UndoOp::CreateRelationGroup => {
                    self.relations.pop().unwrap();
                }
                UndoOp::EditNode(id, prev) => {
                    self.nodes[id as usize] = Some(prev);
                }
                UndoOp::EditEdge(id, prev) => {
                    self.edges[id as usize] = Some(prev);
                }
                UndoOp::EditFace(id, prev) => {
                    self.faces[id as usize] = Some(prev);
                }
                UndoOp::DestroyEdge(id, prev) => {
                    self.attach_edge_ends(&prev);
                    self.edges[id as usize] = Some(prev);
                }
                UndoOp::EditRelationGroup(id, prev) => {
                    self.relations[id as usize] = Some(prev);
                }
                UndoOp::MapTopogeom(line_id, prev) => match prev {
                    Some(tg) => {
                        self.topogeom.insert(line_id, tg);
                    }
                    None => {
                        self.topogeom.remove(&line_id);
                    }
                },
            }
        }
    }

    // Mutations. Each one journals enough to restore the pre-image exactly.

    pub(crate) fn create_node(&mut self, pt: Pt2D, containing_face: Option<i64>) -> i64 {
        let id = self.nodes.len() as i64;
        self.nodes.push(Some(Node {
            id,
            pt,
            containing_face,
        }));
        self.node_edges.insert(id, BTreeSet::new());
        self.journal.push(UndoOp::CreateNode);
        if let Some(ref mut index) = self.node_index {
            index.insert_with_box(id, index_pad(&Bounds::from(&[pt])).as_bbox());
        }
        id
    }

    pub(crate) fn create_edge(
        &mut self,
        geom: PolyLine,
        start_node: i64,
        end_node: i64,
        left_face: i64,
        right_face: i64,
    ) -> i64 {
        let id = self.edges.len() as i64;
        let e = Edge {
            id,
            start_node,
            end_node,
            // Self-referential until the endpoints are relinked
            next_left_edge: -id,
            next_right_edge: id,
            abs_next_left_edge: id,
            abs_next_right_edge: id,
            prev_left_edge: id,
            prev_right_edge: -id,
            left_face,
            right_face,
            geom,
        };
        let bbox = index_pad(&e.get_bounds()).as_bbox();
        self.attach_edge_ends(&e);
        self.edges.push(Some(e));
        self.journal.push(UndoOp::CreateEdge);
        if let Some(ref mut index) = self.edge_index {
            index.insert_with_box(id, bbox);
        }
        id
    }

    pub(crate) fn create_face(&mut self, mbr: Bounds) -> i64 {
        let id = self.faces.len() as i64;
        self.faces.push(Some(Face { id, mbr: Some(mbr) }));
        self.journal.push(UndoOp::CreateFace);
        id
    }

    pub(crate) fn destroy_edge(&mut self, id: i64) {
        let e = self.edges[id as usize].take().unwrap();
        self.detach_edge_ends(&e);
        self.journal.push(UndoOp::DestroyEdge(id, e));
        // The spatial index keeps a stale entry; queries filter on liveness.
    }

    pub(crate) fn edit_node(&mut self, id: i64, edit: impl FnOnce(&mut Node)) {
        let prev = self.nodes[id as usize].clone().unwrap();
        self.journal.push(UndoOp::EditNode(id, prev));
        edit(self.nodes[id as usize].as_mut().unwrap());
    }

    pub(crate) fn edit_edge(&mut self, id: i64, edit: impl FnOnce(&mut Edge)) {
        let prev = self.edges[id as usize].clone().unwrap();
        self.journal.push(UndoOp::EditEdge(id, prev));
        let e = self.edges[id as usize].as_mut().unwrap();
        edit(e);
        e.abs_next_left_edge = e.next_left_edge.abs();
        e.abs_next_right_edge = e.next_right_edge.abs();
    }

    pub(crate) fn edit_face(&mut self, id: i64, edit: impl FnOnce(&mut Face)) {
        let prev = self.faces[id as usize].clone().unwrap();
        self.journal.push(UndoOp::EditFace(id, prev));
        edit(self.faces[id as usize].as_mut().unwrap());
    }

    pub(crate) fn create_relation_group(&mut self) -> i64 {
        let id = self.relations.len() as i64;
        self.relations.push(Some(Vec::new()));
        self.journal.push(UndoOp::CreateRelationGroup);
        id
    }

    pub(crate) fn add_relation(&mut self, topogeo_id: i64, element_id: i64, element_type: i32) {
        let prev = self.relations[topogeo_id as usize].clone().unwrap();
        self.journal
            .push(UndoOp::EditRelationGroup(topogeo_id, prev));
        self.relations[topogeo_id as usize]
            .as_mut()
            .unwrap()
            .push(Relation {
                topogeo_id,
                layer_id: 1,
                element_id,
                element_type,
            });
    }

    pub(crate) fn replace_relations(&mut self, topogeo_id: i64, rels: Vec<Relation>) {
        let prev = self.relations[topogeo_id as usize].clone().unwrap();
        self.journal
            .push(UndoOp::EditRelationGroup(topogeo_id, prev));
        self.relations[topogeo_id as usize] = Some(rels);
    }

    pub(crate) fn map_topogeom(&mut self, line_id: i64, topogeo_id: i64) {
        let prev = self.topogeom.insert(line_id, topogeo_id);
        self.journal.push(UndoOp::MapTopogeom(line_id, prev));
    }

    fn attach_edge_ends(&mut self, e: &Edge) {
        self.node_edges.entry(e.start_node).or_default().insert(e.id);
        self.node_edges.entry(e.end_node).or_default().insert(e.id);
    }

    fn detach_edge_ends(&mut self, e: &Edge) {
        if let Some(set) = self.node_edges.get_mut(&e.start_node) {
            set.remove(&e.id);
        }
        if let Some(set) = self.node_edges.get_mut(&e.end_node) {
            set.remove(&e.id);
        }
    }

    pub(crate) fn incident_edges(&self, node_id: i64) -> BTreeSet<i64> {
        self.node_edges.get(&node_id).cloned().unwrap_or_default()
    }

    // Spatial lookups. The f32 quadtree only produces candidates; everything
    // is re-verified against live f64 geometry, so stale or padded entries
    // are harmless.

    /// Throw away and re-derive the spatial indexes and the per-node incident
    /// edge sets. Call after merging or deserializing.
    pub fn rebuild_indexes(&mut self) {
        let mut everything = Bounds::new();
        everything.update(Pt2D::new(0.0, 0.0));
        for n in self.live_nodes() {
            everything.update(n.pt);
        }
        for e in self.live_edges() {
            everything.union(&e.get_bounds());
        }
        let everything = everything.expand(1.0 + (everything.width() + everything.height()) / 2.0);

        let mut node_index = QuadTree::default(everything.as_bbox());
        for n in self.live_nodes() {
            node_index.insert_with_box(n.id, index_pad(&Bounds::from(&[n.pt])).as_bbox());
        }
        let mut edge_index = QuadTree::default(everything.as_bbox());
        for e in self.live_edges() {
            edge_index.insert_with_box(e.id, index_pad(&e.get_bounds()).as_bbox());
        }
        self.node_index = Some(node_index);
        self.edge_index = Some(edge_index);

        self.node_edges.clear();
        let ids: Vec<i64> = self.live_edges().map(|e| e.id).collect();
        for id in ids {
            let e = self.edges[id as usize].take().unwrap();
            self.attach_edge_ends(&e);
            self.edges[id as usize] = Some(e);
        }
        for n in self.nodes.iter().flatten() {
            self.node_edges.entry(n.id).or_default();
        }
    }

    pub(crate) fn ensure_indexes(&mut self) {
        if self.node_index.is_none() || self.edge_index.is_none() {
            self.rebuild_indexes();
        }
    }

    pub(crate) fn invalidate_indexes(&mut self) {
        self.node_index = None;
        self.edge_index = None;
    }

    /// Live nodes whose point falls in these bounds, ascending by id.
    pub(crate) fn nodes_within(&mut self, bounds: &Bounds) -> Vec<i64> {
        self.ensure_indexes();
        let mut hits = BTreeSet::new();
        for &(id, _, _) in &self
            .node_index
            .as_ref()
            .unwrap()
            .query(index_pad(bounds).as_bbox())
        {
            if let Some(n) = self.node(*id) {
                if bounds.contains(n.pt) {
                    hits.insert(*id);
                }
            }
        }
        hits.into_iter().collect()
    }

    /// Live edges whose envelope intersects these bounds, ascending by id.
    pub(crate) fn edges_within(&mut self, bounds: &Bounds) -> Vec<i64> {
        self.ensure_indexes();
        let mut hits = BTreeSet::new();
        for &(id, _, _) in &self
            .edge_index
            .as_ref()
            .unwrap()
            .query(index_pad(bounds).as_bbox())
        {
            if let Some(e) = self.edge(*id) {
                if bounds.intersects(&e.get_bounds()) {
                    hits.insert(*id);
                }
            }
        }
        hits.into_iter().collect()
    }

    /// The node sitting exactly (within epsilon) at this point, if any.
    pub(crate) fn node_at(&mut self, pt: Pt2D) -> Option<i64> {
        self.nodes_within(&Bounds::from(&[pt]).expand(EPSILON_DIST))
            .into_iter()
            .find(|id| self.node(*id).unwrap().pt.approx_eq(pt, EPSILON_DIST))
    }

    /// Closest node within the tolerance. Ties keep the first candidate in
    /// id order.
    pub(crate) fn closest_node_within(&mut self, pt: Pt2D, tolerance: f64) -> Option<i64> {
        let mut best: Option<(f64, i64)> = None;
        for id in self.nodes_within(&Bounds::from(&[pt]).expand(tolerance)) {
            let d = self.node(id).unwrap().pt.dist_to(pt);
            if d <= tolerance && best.map(|(bd, _)| d < bd).unwrap_or(true) {
                best = Some((d, id));
            }
        }
        best.map(|(_, id)| id)
    }

    /// Closest edge within the tolerance of this point. Ties keep the first
    /// candidate in id order.
    pub(crate) fn closest_edge_within(&mut self, pt: Pt2D, tolerance: f64) -> Option<i64> {
        let mut best: Option<(f64, i64)> = None;
        for id in self.edges_within(&Bounds::from(&[pt]).expand(tolerance)) {
            let d = self.edge(id).unwrap().geom.dist_to_pt(pt);
            if d <= tolerance && best.map(|(bd, _)| d < bd).unwrap_or(true) {
                best = Some((d, id));
            }
        }
        best.map(|(_, id)| id)
    }

    pub fn log_stats(&self) {
        info!(
            "topology for zone #{}: {} lines, {} nodes, {} edges, {} faces",
            self.zone_id,
            self.count(),
            self.live_nodes().count(),
            self.live_edges().count(),
            self.live_faces().count()
        );
    }

    /// Every structural invariant that must hold at a commit boundary.
    pub fn validate(&self) -> Result<()> {
        if self.face(UNIVERSAL_FACE).is_none() {
            bail!("universal face missing");
        }
        if self.face(UNIVERSAL_FACE).unwrap().mbr.is_some() {
            bail!("universal face has geometry");
        }

        for e in self.live_edges() {
            let start = self
                .node(e.start_node)
                .ok_or_else(|| anyhow::anyhow!("edge {} start node {} dead", e.id, e.start_node))?;
            let end = self
                .node(e.end_node)
                .ok_or_else(|| anyhow::anyhow!("edge {} end node {} dead", e.id, e.end_node))?;
            if !start.pt.approx_eq(e.geom.first_pt(), EPSILON_DIST) {
                bail!("edge {} geometry doesn't start at its start node", e.id);
            }
            if !end.pt.approx_eq(e.geom.last_pt(), EPSILON_DIST) {
                bail!("edge {} geometry doesn't end at its end node", e.id);
            }
            if e.abs_next_left_edge != e.next_left_edge.abs()
                || e.abs_next_right_edge != e.next_right_edge.abs()
            {
                bail!("edge {} abs shortcuts disagree with signed pointers", e.id);
            }
            for next in [e.next_left_edge, e.next_right_edge] {
                if self.edge(next.abs()).is_none() {
                    bail!("edge {} ring pointer {} is dead", e.id, next);
                }
            }
            for face in [e.left_face, e.right_face] {
                if self.face(face).is_none() {
                    bail!("edge {} references dead face {}", e.id, face);
                }
            }
        }

        // Rings: following next pointers from each side of each edge must
        // cycle back, with a consistent face label the whole way around.
        for e in self.live_edges() {
            for (start, face) in [(e.id, e.left_face), (-e.id, e.right_face)] {
                let mut cur = start;
                for _ in 0..=self.edges.len() * 2 {
                    let c = self.edge(cur.abs()).unwrap();
                    let f = if cur > 0 { c.left_face } else { c.right_face };
                    if f != face {
                        bail!(
                            "ring through edge {} flips from face {} to {}",
                            e.id,
                            face,
                            f
                        );
                    }
                    cur = if cur > 0 {
                        c.next_left_edge
                    } else {
                        c.next_right_edge
                    };
                    if cur == start {
                        break;
                    }
                }
                if cur != start {
                    bail!("ring from edge {} side {} never closes", e.id, start);
                }
            }
        }

        let mut endpoint_nodes: BTreeSet<i64> = BTreeSet::new();
        for e in self.live_edges() {
            endpoint_nodes.insert(e.start_node);
            endpoint_nodes.insert(e.end_node);
        }
        for n in self.live_nodes() {
            if let Some(f) = n.containing_face {
                if self.face(f).is_none() {
                    bail!("node {} contained by dead face {}", n.id, f);
                }
                if endpoint_nodes.contains(&n.id) {
                    bail!("node {} has edges but claims to be isolated", n.id);
                }
            }
        }

        // Planarity: edges only meet at shared endpoint nodes.
        let edges: Vec<&Edge> = self.live_edges().collect();
        for (i, e1) in edges.iter().enumerate() {
            for e2 in &edges[i + 1..] {
                if !e1.get_bounds().intersects(&e2.get_bounds()) {
                    continue;
                }
                for pt in e1.geom.crossings(&e2.geom, EPSILON_DIST) {
                    let at_shared_node = [e1.start_node, e1.end_node].iter().any(|n| {
                        [e2.start_node, e2.end_node].contains(n)
                            && self.node(*n).unwrap().pt.approx_eq(pt, EPSILON_DIST)
                    });
                    if !at_shared_node {
                        bail!(
                            "edges {} and {} meet away from a shared node, at {}",
                            e1.id,
                            e2.id,
                            pt
                        );
                    }
                }
            }
        }

        for rels in self.relation_groups() {
            for r in rels {
                let live = match r.element_type {
                    ELEMENT_TYPE_EDGE => self.edge(r.element_id).is_some(),
                    ELEMENT_TYPE_FACE => self.face(r.element_id).is_some(),
                    _ => false,
                };
                if !live {
                    bail!(
                        "relation for topogeo {} references dead element {} (type {})",
                        r.topogeo_id,
                        r.element_id,
                        r.element_type
                    );
                }
            }
        }
        for (line_id, tg) in &self.topogeom {
            if self
                .relations
                .get(*tg as usize)
                .and_then(|slot| slot.as_ref())
                .is_none()
            {
                bail!("line {} maps to dead topogeo {}", line_id, tg);
            }
        }

        Ok(())
    }
}
