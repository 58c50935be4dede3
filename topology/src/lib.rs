//! An incremental planar topology: nodes, edges and faces built up one
//! linestring at a time, with snapping, edge splitting and face maintenance.

#[macro_use]
extern crate log;

mod add_linestring;
mod faces;
mod merge;
mod objects;
mod topology;

pub use crate::merge::merge;
pub use crate::objects::{Edge, Face, Node, Relation, ELEMENT_TYPE_EDGE, ELEMENT_TYPE_FACE};
pub use crate::topology::Topology;

/// The universal (unbounded) face. It exists in every topology and is never
/// deleted.
pub const UNIVERSAL_FACE: i64 = 0;

#[derive(thiserror::Error, Debug)]
pub enum TopoError {
    /// The line can't be represented: empty, degenerate, or collapsing under
    /// the tolerance. Roll back and move on to the next line.
    #[error("invalid input line: {0}")]
    InvalidInput(String),
    /// A structural invariant broke mid-operation. Roll back and abandon the
    /// whole topology.
    #[error("topology corrupt: {0}")]
    Corrupt(String),
}
