use std::f64;

use aabb_quadtree::geom::{Point, Rect};
use serde::{Deserialize, Serialize};

use crate::Pt2D;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new() -> Bounds {
        Bounds {
            min_x: f64::MAX,
            min_y: f64::MAX,
            max_x: f64::MIN,
            max_y: f64::MIN,
        }
    }

    pub fn from(pts: &[Pt2D]) -> Bounds {
        let mut b = Bounds::new();
        for pt in pts {
            b.update(*pt);
        }
        b
    }

    pub fn update(&mut self, pt: Pt2D) {
        self.min_x = self.min_x.min(pt.x());
        self.max_x = self.max_x.max(pt.x());
        self.min_y = self.min_y.min(pt.y());
        self.max_y = self.max_y.max(pt.y());
    }

    pub fn union(&mut self, other: &Bounds) {
        self.update(Pt2D::new(other.min_x, other.min_y));
        self.update(Pt2D::new(other.max_x, other.max_y));
    }

    pub fn contains(&self, pt: Pt2D) -> bool {
        pt.x() >= self.min_x && pt.x() <= self.max_x && pt.y() >= self.min_y && pt.y() <= self.max_y
    }

    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Grow (or shrink, with a negative argument) by a margin on all sides.
    pub fn expand(&self, margin: f64) -> Bounds {
        Bounds {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Pt2D {
        Pt2D::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// The four quadrants, in NW, NE, SW, SE order. North is +y.
    pub fn quadrants(&self) -> [Bounds; 4] {
        let c = self.center();
        [
            Bounds {
                min_x: self.min_x,
                min_y: c.y(),
                max_x: c.x(),
                max_y: self.max_y,
            },
            Bounds {
                min_x: c.x(),
                min_y: c.y(),
                max_x: self.max_x,
                max_y: self.max_y,
            },
            Bounds {
                min_x: self.min_x,
                min_y: self.min_y,
                max_x: c.x(),
                max_y: c.y(),
            },
            Bounds {
                min_x: c.x(),
                min_y: self.min_y,
                max_x: self.max_x,
                max_y: c.y(),
            },
        ]
    }

    pub fn as_bbox(&self) -> Rect {
        Rect {
            top_left: Point {
                x: self.min_x as f32,
                y: self.min_y as f32,
            },
            bottom_right: Point {
                x: self.max_x as f32,
                y: self.max_y as f32,
            },
        }
    }

    pub fn get_corners(&self) -> Vec<Pt2D> {
        vec![
            Pt2D::new(self.min_x, self.min_y),
            Pt2D::new(self.max_x, self.min_y),
            Pt2D::new(self.max_x, self.max_y),
            Pt2D::new(self.min_x, self.max_y),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadrants_tile_the_parent() {
        let b = Bounds {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 20.0,
            max_y: 10.0,
        };
        let [nw, ne, sw, se] = b.quadrants();
        assert_eq!(nw.max_x, ne.min_x);
        assert_eq!(sw.max_y, nw.min_y);
        assert_eq!(se.min_x, sw.max_x);
        let mut u = Bounds::new();
        for q in [&nw, &ne, &sw, &se] {
            u.union(q);
        }
        assert_eq!(u, b);
    }

    #[test]
    fn intersects_touching_edge() {
        let a = Bounds {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 10.0,
            max_y: 10.0,
        };
        let b = Bounds {
            min_x: 10.0,
            min_y: 0.0,
            max_x: 20.0,
            max_y: 10.0,
        };
        assert!(a.intersects(&b));
        assert!(!a.intersects(&b.expand(-0.1)));
    }
}
