use serde::{Deserialize, Serialize};

use geom::{Bounds, PolyLine, Pt2D};

pub const ELEMENT_TYPE_EDGE: i32 = 2;
pub const ELEMENT_TYPE_FACE: i32 = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    pub pt: Pt2D,
    /// The face an isolated node sits in; None once the node is an endpoint
    /// of some edge.
    pub containing_face: Option<i64>,
}

/// A simple linestring between two (not necessarily distinct) nodes. Two
/// edges only ever meet at shared endpoint nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: i64,
    pub geom: PolyLine,
    pub start_node: i64,
    pub end_node: i64,
    /// Signed: the magnitude is the neighboring edge id, the sign is the
    /// direction it's traversed in the ring (negative = backward).
    pub next_left_edge: i64,
    pub next_right_edge: i64,
    pub abs_next_left_edge: i64,
    pub abs_next_right_edge: i64,
    // convenience
    pub prev_left_edge: i64,
    pub prev_right_edge: i64,
    pub left_face: i64,
    pub right_face: i64,
}

impl Edge {
    pub fn get_bounds(&self) -> Bounds {
        self.geom.get_bounds()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub id: i64,
    /// Cached bounding rectangle; the universal face has none.
    pub mbr: Option<Bounds>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub topogeo_id: i64,
    pub layer_id: i64,
    pub element_id: i64,
    pub element_type: i32,
}
