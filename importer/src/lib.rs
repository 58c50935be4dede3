//! Builds a planar road topology out of a big pile of linestrings: carve the
//! world into zones, build each zone's topology in parallel, then merge
//! neighboring topologies pairwise until one remains. Everything checkpoints,
//! so a crashed run resumes where it left off.

#[macro_use]
extern crate log;

pub mod checkpoint;
pub mod driver;
pub mod logger;
pub mod merge;
pub mod pool;
pub mod source;
pub mod zones;

/// Passing 0 makes the builder derive the tightest tolerance double
/// precision supports for the line's magnitude.
pub const DEFAULT_TOLERANCE: f64 = 0.0;
