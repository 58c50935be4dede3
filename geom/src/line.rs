use std::fmt;

use geo::ClosestPoint;
use serde::{Deserialize, Serialize};

use crate::{Angle, Pt2D, EPSILON_DIST};

// Segment, technically. Should rename.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Line(Pt2D, Pt2D);

impl Line {
    pub fn new(pt1: Pt2D, pt2: Pt2D) -> Line {
        let len = pt1.dist_to(pt2);
        if len < EPSILON_DIST {
            panic!("Tiny line with length {}", len);
        }
        Line(pt1, pt2)
    }

    pub fn maybe_new(pt1: Pt2D, pt2: Pt2D) -> Option<Line> {
        if pt1 == pt2 {
            return None;
        }
        Some(Line(pt1, pt2))
    }

    pub fn pt1(&self) -> Pt2D {
        self.0
    }

    pub fn pt2(&self) -> Pt2D {
        self.1
    }

    pub fn length(&self) -> f64 {
        self.pt1().dist_to(self.pt2())
    }

    pub fn angle(&self) -> Angle {
        self.pt1().angle_to(self.pt2())
    }

    pub fn reverse(&self) -> Line {
        Line(self.pt2(), self.pt1())
    }

    /// A crossing in the interior of both segments. Endpoint touches and
    /// collinear overlaps return None; callers detect those through
    /// vertex-on-segment checks.
    pub fn intersection(&self, other: &Line) -> Option<Pt2D> {
        // From http://bryceboe.com/2006/10/23/line-segment-intersection-algorithm/
        if is_counter_clockwise(self.pt1(), other.pt1(), other.pt2())
            == is_counter_clockwise(self.pt2(), other.pt1(), other.pt2())
            || is_counter_clockwise(self.pt1(), self.pt2(), other.pt1())
                == is_counter_clockwise(self.pt1(), self.pt2(), other.pt2())
        {
            return None;
        }

        let hit = self.infinite_intersection(other)?;
        if self.dist_to_pt(hit) < EPSILON_DIST && other.dist_to_pt(hit) < EPSILON_DIST {
            Some(hit)
        } else {
            None
        }
    }

    // https://stackoverflow.com/a/565282
    fn infinite_intersection(&self, other: &Line) -> Option<Pt2D> {
        fn cross(a: (f64, f64), b: (f64, f64)) -> f64 {
            a.0 * b.1 - a.1 * b.0
        }

        let p = self.0;
        let q = other.0;
        let r = (self.1.x() - self.0.x(), self.1.y() - self.0.y());
        let s = (other.1.x() - other.0.x(), other.1.y() - other.0.y());

        let r_cross_s = cross(r, s);
        if r_cross_s == 0.0 {
            // Parallel
            return None;
        }
        let q_minus_p = (q.x() - p.x(), q.y() - p.y());
        let t = cross(q_minus_p, (s.0 / r_cross_s, s.1 / r_cross_s));
        Some(Pt2D::new(p.x() + t * r.0, p.y() + t * r.1))
    }

    /// The closest point on the segment.
    pub fn project_pt(&self, pt: Pt2D) -> Pt2D {
        let line: geo::LineString = vec![
            geo::Coord {
                x: self.0.x(),
                y: self.0.y(),
            },
            geo::Coord {
                x: self.1.x(),
                y: self.1.y(),
            },
        ]
        .into();
        match line.closest_point(&geo::Point::new(pt.x(), pt.y())) {
            geo::Closest::Intersection(hit) | geo::Closest::SinglePoint(hit) => {
                Pt2D::new(hit.x(), hit.y())
            }
            geo::Closest::Indeterminate => unreachable!(),
        }
    }

    pub fn dist_to_pt(&self, pt: Pt2D) -> f64 {
        self.project_pt(pt).dist_to(pt)
    }

    pub fn contains_pt(&self, pt: Pt2D, epsilon: f64) -> bool {
        self.dist_to_pt(pt) <= epsilon
    }

    /// Distance from pt1 to where this point sits on the segment, if it does.
    pub fn dist_along_of_point(&self, pt: Pt2D, epsilon: f64) -> Option<f64> {
        if !self.contains_pt(pt, epsilon) {
            return None;
        }
        Some(self.pt1().dist_to(pt))
    }

    pub fn dist_to_line(&self, other: &Line) -> f64 {
        if self.intersection(other).is_some() {
            return 0.0;
        }
        self.dist_to_pt(other.pt1())
            .min(self.dist_to_pt(other.pt2()))
            .min(other.dist_to_pt(self.pt1()))
            .min(other.dist_to_pt(self.pt2()))
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Line::new(")?;
        writeln!(f, "  Pt2D::new({}, {}),", self.0.x(), self.0.y())?;
        writeln!(f, "  Pt2D::new({}, {}),", self.1.x(), self.1.y())?;
        write!(f, ")")
    }
}

fn is_counter_clockwise(pt1: Pt2D, pt2: Pt2D, pt3: Pt2D) -> bool {
    (pt3.y() - pt1.y()) * (pt2.x() - pt1.x()) > (pt2.y() - pt1.y()) * (pt3.x() - pt1.x())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing() {
        let l1 = Line::new(Pt2D::new(0.0, 0.0), Pt2D::new(10.0, 0.0));
        let l2 = Line::new(Pt2D::new(5.0, -5.0), Pt2D::new(5.0, 5.0));
        let hit = l1.intersection(&l2).unwrap();
        assert!(hit.approx_eq(Pt2D::new(5.0, 0.0), 1e-9));
    }

    #[test]
    fn touch_is_not_a_crossing() {
        let l1 = Line::new(Pt2D::new(0.0, 0.0), Pt2D::new(10.0, 0.0));
        let l2 = Line::new(Pt2D::new(5.0, 0.0), Pt2D::new(5.0, 5.0));
        assert!(l1.intersection(&l2).is_none());
    }

    #[test]
    fn projection() {
        let l = Line::new(Pt2D::new(0.0, 0.0), Pt2D::new(10.0, 0.0));
        assert!(l
            .project_pt(Pt2D::new(3.0, 4.0))
            .approx_eq(Pt2D::new(3.0, 0.0), 1e-9));
        assert_eq!(l.dist_to_pt(Pt2D::new(3.0, 4.0)), 4.0);
    }
}
