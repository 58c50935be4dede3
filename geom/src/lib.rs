mod angle;
mod bounds;
mod line;
mod polyline;
mod pt;
mod ring;

pub use crate::angle::Angle;
pub use crate::bounds::Bounds;
pub use crate::line::Line;
pub use crate::polyline::PolyLine;
pub use crate::pt::{HashablePt2D, Pt2D};
pub use crate::ring::Ring;

/// Below this distance, two points are the same point.
pub const EPSILON_DIST: f64 = 1e-9;

/// The smallest absolute tolerance that's meaningful for coordinates of this
/// magnitude, given 52 bits of mantissa. Callers passing a tighter tolerance
/// than this get this instead.
pub fn min_tolerance(pts: &[Pt2D]) -> f64 {
    let mut max_coord: f64 = 1.0;
    for pt in pts {
        max_coord = max_coord.max(pt.x().abs()).max(pt.y().abs());
    }
    3.6 * 2.0_f64.powi(-(52 - max_coord.log2().ceil() as i32))
}
