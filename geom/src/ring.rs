use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Bounds, Pt2D, EPSILON_DIST};

// Maybe a misnomer, but like a PolyLine, but closed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    // first equals last
    pts: Vec<Pt2D>,
}

impl Ring {
    pub fn maybe_new(pts: Vec<Pt2D>) -> Option<Ring> {
        let mut pts = Pt2D::approx_dedupe(pts, EPSILON_DIST);
        if pts.len() < 3 {
            return None;
        }
        if !pts[0].approx_eq(*pts.last().unwrap(), EPSILON_DIST) {
            return None;
        }
        // Normalize the closing point to exactly match
        let first = pts[0];
        *pts.last_mut().unwrap() = first;
        if pts.len() < 4 {
            return None;
        }
        Some(Ring { pts })
    }

    pub fn points(&self) -> &Vec<Pt2D> {
        &self.pts
    }

    pub fn get_bounds(&self) -> Bounds {
        Bounds::from(&self.pts)
    }

    /// Shoelace. Positive means counter-clockwise, meaning a finite interior
    /// lies to the left of the walk.
    pub fn signed_area(&self) -> f64 {
        let mut sum = 0.0;
        for pair in self.pts.windows(2) {
            sum += pair[0].x() * pair[1].y() - pair[1].x() * pair[0].y();
        }
        sum / 2.0
    }

    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    // Algorithm from https://wrf.ecse.rpi.edu//Research/Short_Notes/pnpoly.html
    pub fn contains_pt(&self, pt: Pt2D) -> bool {
        let (x, y) = (pt.x(), pt.y());
        let mut inside = false;
        for pair in self.pts.windows(2) {
            let (x1, y1) = (pair[0].x(), pair[0].y());
            let (x2, y2) = (pair[1].x(), pair[1].y());
            let intersect = ((y1 > y) != (y2 > y)) && (x < (x2 - x1) * (y - y1) / (y2 - y1) + x1);
            if intersect {
                inside = !inside;
            }
        }
        inside
    }
}

impl fmt::Display for Ring {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Ring::new(vec![")?;
        for pt in &self.pts {
            writeln!(f, "  Pt2D::new({}, {}),", pt.x(), pt.y())?;
        }
        write!(f, "])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Ring {
        Ring::maybe_new(vec![
            Pt2D::new(0.0, 0.0),
            Pt2D::new(1.0, 0.0),
            Pt2D::new(1.0, 1.0),
            Pt2D::new(0.0, 1.0),
            Pt2D::new(0.0, 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn orientation() {
        let r = square();
        assert_eq!(r.signed_area(), 1.0);
        assert!(r.is_ccw());

        let mut rev = r.points().clone();
        rev.reverse();
        let r = Ring::maybe_new(rev).unwrap();
        assert!(!r.is_ccw());
    }

    #[test]
    fn containment() {
        let r = square();
        assert!(r.contains_pt(Pt2D::new(0.5, 0.5)));
        assert!(!r.contains_pt(Pt2D::new(1.5, 0.5)));
    }
}
