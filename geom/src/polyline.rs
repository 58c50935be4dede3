use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Bounds, Line, Pt2D, EPSILON_DIST};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolyLine {
    pts: Vec<Pt2D>,
}

impl PolyLine {
    pub fn new(pts: Vec<Pt2D>) -> PolyLine {
        assert!(pts.len() >= 2);
        PolyLine { pts }
    }

    pub fn maybe_new(pts: Vec<Pt2D>) -> Option<PolyLine> {
        let pts = Pt2D::approx_dedupe(pts, EPSILON_DIST);
        if pts.len() < 2 {
            return None;
        }
        Some(PolyLine { pts })
    }

    pub fn points(&self) -> &Vec<Pt2D> {
        &self.pts
    }

    pub fn into_points(self) -> Vec<Pt2D> {
        self.pts
    }

    pub fn first_pt(&self) -> Pt2D {
        self.pts[0]
    }

    pub fn last_pt(&self) -> Pt2D {
        *self.pts.last().unwrap()
    }

    pub fn reversed(&self) -> PolyLine {
        let mut pts = self.pts.clone();
        pts.reverse();
        PolyLine::new(pts)
    }

    pub fn lines(&self) -> impl Iterator<Item = Line> + '_ {
        self.pts.windows(2).map(|pair| Line::new(pair[0], pair[1]))
    }

    pub fn length(&self) -> f64 {
        self.lines().map(|l| l.length()).sum()
    }

    pub fn get_bounds(&self) -> Bounds {
        Bounds::from(&self.pts)
    }

    pub fn is_loop(&self) -> bool {
        self.first_pt() == self.last_pt()
    }

    pub fn dist_to_pt(&self, pt: Pt2D) -> f64 {
        let mut best = f64::MAX;
        for l in self.lines() {
            best = best.min(l.dist_to_pt(pt));
        }
        best
    }

    /// The closest point on the polyline.
    pub fn project_pt(&self, pt: Pt2D) -> Pt2D {
        let mut best = self.first_pt();
        let mut best_dist = f64::MAX;
        for l in self.lines() {
            let candidate = l.project_pt(pt);
            let d = candidate.dist_to(pt);
            if d < best_dist {
                best = candidate;
                best_dist = d;
            }
        }
        best
    }

    pub fn contains_pt(&self, pt: Pt2D, epsilon: f64) -> bool {
        self.dist_to_pt(pt) <= epsilon
    }

    /// Arclength from the start to where this point sits on the polyline.
    pub fn dist_of_point(&self, pt: Pt2D, epsilon: f64) -> Option<f64> {
        let mut so_far = 0.0;
        for l in self.lines() {
            if let Some(d) = l.dist_along_of_point(pt, epsilon) {
                return Some(so_far + d);
            }
            so_far += l.length();
        }
        None
    }

    pub fn dist_to_polyline(&self, other: &PolyLine) -> f64 {
        let mut best = f64::MAX;
        for l1 in self.lines() {
            for l2 in other.lines() {
                best = best.min(l1.dist_to_line(&l2));
                if best == 0.0 {
                    return 0.0;
                }
            }
        }
        best
    }

    pub fn dwithin(&self, other: &PolyLine, tolerance: f64) -> bool {
        self.dist_to_polyline(other) <= tolerance
    }

    /// Vertex-wise equality in this direction.
    pub fn approx_eq(&self, other: &PolyLine, epsilon: f64) -> bool {
        self.pts.len() == other.pts.len()
            && self
                .pts
                .iter()
                .zip(other.pts.iter())
                .all(|(a, b)| a.approx_eq(*b, epsilon))
    }

    /// The same walk, either direction.
    pub fn same_path(&self, other: &PolyLine, epsilon: f64) -> bool {
        self.approx_eq(other, epsilon) || self.approx_eq(&other.reversed(), epsilon)
    }

    /// Fold a nearby target shape into this one: vertices within the
    /// tolerance of a target vertex move onto it, and target vertices within
    /// the tolerance of one of our segments get inserted. The result's
    /// vertices coincide exactly with every target vertex they approach.
    pub fn snap_to(&self, target: &PolyLine, tolerance: f64) -> PolyLine {
        self.snap_to_points(target.points(), tolerance)
    }

    pub fn snap_to_points(&self, targets: &[Pt2D], tolerance: f64) -> PolyLine {
        let mut pts = self.pts.clone();

        for pt in &mut pts {
            let mut best: Option<(f64, Pt2D)> = None;
            for v in targets {
                let d = pt.dist_to(*v);
                if d <= tolerance && best.map(|(bd, _)| d < bd).unwrap_or(true) {
                    best = Some((d, *v));
                }
            }
            if let Some((_, v)) = best {
                *pt = v;
            }
        }

        // (segment index, distance along segment, vertex to insert)
        let mut insertions: Vec<(usize, f64, Pt2D)> = Vec::new();
        for v in targets {
            if pts.iter().any(|pt| pt.approx_eq(*v, EPSILON_DIST)) {
                continue;
            }
            let mut best: Option<(usize, f64, f64)> = None;
            for (idx, pair) in pts.windows(2).enumerate() {
                if let Some(l) = Line::maybe_new(pair[0], pair[1]) {
                    let d = l.dist_to_pt(*v);
                    if d <= tolerance && best.map(|(_, _, bd)| d < bd).unwrap_or(true) {
                        best = Some((idx, l.project_pt(*v).dist_to(pair[0]), d));
                    }
                }
            }
            if let Some((idx, along, _)) = best {
                insertions.push((idx, along, *v));
            }
        }
        insertions.sort_by(|a, b| (a.0, a.1).partial_cmp(&(b.0, b.1)).unwrap());
        for (idx, _, v) in insertions.into_iter().rev() {
            pts.insert(idx + 1, v);
        }

        PolyLine::maybe_new(pts).unwrap_or_else(|| self.clone())
    }

    /// Cut into fragments at each of these points, in traversal order. A
    /// point the walk passes twice cuts twice. Cuts not on the polyline (or
    /// at its very ends) are ignored.
    pub fn split_at(&self, cuts: &[Pt2D], epsilon: f64) -> Vec<PolyLine> {
        let total = self.length();
        let mut ordered: Vec<(f64, Pt2D)> = Vec::new();
        for cut in cuts {
            let mut so_far = 0.0;
            for l in self.lines() {
                if let Some(d) = l.dist_along_of_point(*cut, epsilon) {
                    let at = so_far + d;
                    if at > epsilon && at < total - epsilon {
                        ordered.push((at, *cut));
                    }
                }
                so_far += l.length();
            }
        }
        ordered.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        ordered.dedup_by(|a, b| (a.0 - b.0).abs() <= epsilon.max(EPSILON_DIST));

        if ordered.is_empty() {
            return vec![self.clone()];
        }

        let mut fragments = Vec::new();
        let mut current = vec![self.first_pt()];
        let mut so_far = 0.0;
        let mut next_cut = 0;
        for l in self.lines() {
            let seg_len = l.length();
            while next_cut < ordered.len() && ordered[next_cut].0 <= so_far + seg_len + epsilon {
                let cut = ordered[next_cut].1;
                if l.contains_pt(cut, epsilon.max(EPSILON_DIST)) {
                    current.push(cut);
                    if let Some(frag) = PolyLine::maybe_new(current) {
                        fragments.push(frag);
                    }
                    current = vec![cut];
                    next_cut += 1;
                } else {
                    break;
                }
            }
            current.push(l.pt2());
            so_far += seg_len;
        }
        if let Some(frag) = PolyLine::maybe_new(current) {
            fragments.push(frag);
        }
        fragments
    }

    /// Every point where the two walks meet: interior crossings, plus each
    /// one's vertices lying on the other. Collinear overlaps show up through
    /// their endpoint vertices, which is all the caller needs once both
    /// shapes are snapped.
    pub fn crossings(&self, other: &PolyLine, epsilon: f64) -> Vec<Pt2D> {
        let mut found: Vec<Pt2D> = Vec::new();
        let mut push = |pt: Pt2D| {
            if !found.iter().any(|f| f.approx_eq(pt, EPSILON_DIST)) {
                found.push(pt);
            }
        };

        for l1 in self.lines() {
            for l2 in other.lines() {
                if let Some(hit) = l1.intersection(&l2) {
                    push(hit);
                }
            }
        }
        for v in self.points() {
            if other.contains_pt(*v, epsilon) {
                push(other.project_pt(*v));
            }
        }
        for v in other.points() {
            if self.contains_pt(*v, epsilon) {
                push(*v);
            }
        }
        found
    }

    /// Points where the walk passes through the same coordinate twice:
    /// repeated vertices, or a vertex landing on a non-adjacent segment.
    pub fn self_touch_points(&self) -> Vec<Pt2D> {
        let mut found: Vec<Pt2D> = Vec::new();
        let mut push = |pt: Pt2D| {
            if !found.iter().any(|f| f.approx_eq(pt, EPSILON_DIST)) {
                found.push(pt);
            }
        };

        for (i, pt) in self.pts.iter().enumerate() {
            for other in &self.pts[i + 1..self.pts.len()] {
                if pt.approx_eq(*other, EPSILON_DIST) {
                    push(*pt);
                }
            }
            for (j, pair) in self.pts.windows(2).enumerate() {
                if j + 1 == i || j == i {
                    continue;
                }
                if let Some(l) = Line::maybe_new(pair[0], pair[1]) {
                    if l.contains_pt(*pt, EPSILON_DIST) {
                        push(*pt);
                    }
                }
            }
        }
        found
    }
}

impl fmt::Display for PolyLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "PolyLine::new(vec![")?;
        for pt in &self.pts {
            writeln!(f, "  Pt2D::new({}, {}),", pt.x(), pt.y())?;
        }
        write!(f, "])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_in_order() {
        let pl = PolyLine::new(vec![Pt2D::new(0.0, 0.0), Pt2D::new(10.0, 0.0)]);
        let frags = pl.split_at(&[Pt2D::new(7.0, 0.0), Pt2D::new(3.0, 0.0)], 1e-9);
        assert_eq!(frags.len(), 3);
        assert_eq!(frags[0].last_pt(), Pt2D::new(3.0, 0.0));
        assert_eq!(frags[1].last_pt(), Pt2D::new(7.0, 0.0));
        assert_eq!(frags[2].last_pt(), Pt2D::new(10.0, 0.0));
    }

    #[test]
    fn split_ignores_endpoints_and_strays() {
        let pl = PolyLine::new(vec![Pt2D::new(0.0, 0.0), Pt2D::new(10.0, 0.0)]);
        let frags = pl.split_at(
            &[Pt2D::new(0.0, 0.0), Pt2D::new(10.0, 0.0), Pt2D::new(5.0, 3.0)],
            1e-9,
        );
        assert_eq!(frags.len(), 1);
    }

    #[test]
    fn snap_moves_vertices_and_inserts() {
        let subject = PolyLine::new(vec![Pt2D::new(0.01, 0.0), Pt2D::new(10.0, 0.1)]);
        let target = PolyLine::new(vec![
            Pt2D::new(0.0, 0.0),
            Pt2D::new(5.0, 0.02),
            Pt2D::new(10.0, 0.0),
        ]);
        let snapped = subject.snap_to(&target, 0.5);
        assert_eq!(snapped.points().len(), 3);
        assert_eq!(snapped.first_pt(), Pt2D::new(0.0, 0.0));
        assert_eq!(snapped.points()[1], Pt2D::new(5.0, 0.02));
        assert_eq!(snapped.last_pt(), Pt2D::new(10.0, 0.0));
    }

    #[test]
    fn crossings_cover_crossing_and_touch() {
        let a = PolyLine::new(vec![Pt2D::new(0.0, 0.0), Pt2D::new(10.0, 0.0)]);
        let b = PolyLine::new(vec![Pt2D::new(5.0, -5.0), Pt2D::new(5.0, 5.0)]);
        let hits = a.crossings(&b, 1e-9);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].approx_eq(Pt2D::new(5.0, 0.0), 1e-9));

        let c = PolyLine::new(vec![Pt2D::new(5.0, 0.0), Pt2D::new(5.0, 5.0)]);
        let hits = a.crossings(&c, 1e-9);
        assert_eq!(hits.len(), 1);
    }
}
