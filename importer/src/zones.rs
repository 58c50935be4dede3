use serde::{Deserialize, Serialize};

use geom::Bounds;

use crate::source::LineSource;

/// Leaves stop subdividing under this many lines. A density knob, not a
/// hard limit.
pub const TARGET_LINES_PER_ZONE: usize = 20;
pub const MAX_DEPTH: usize = 10;

/// An axis-aligned tile of the world with a stable id and the number of
/// source lines inside it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: i64,
    pub envelope: Bounds,
    pub count: usize,
}

/// Four zones forming the quadrants of one parent, at some subdivision
/// level. Deeper groups merge first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepthGroup {
    pub depth: usize,
    pub zones: [i64; 4],
}

/// Recursively subdivide the world into quadrants until each leaf holds at
/// most `target` lines (or the depth cap is hit). Leaf ids are assigned in
/// creation order; each subdivision records its four children as a group.
/// Groups come back sorted deepest-first, ready for bottom-up merging.
///
/// The whole thing is deterministic: the same world extent and line counts
/// produce the same zones and groups every run.
pub fn prepare_zones(source: &dyn LineSource, target: usize) -> (Vec<Zone>, Vec<DepthGroup>) {
    let world = source.world_bounds();
    let mut zones = Vec::new();
    let mut groups = Vec::new();
    subdivide(source, &world, 0, target, &mut zones, &mut groups);
    // Deepest first; merges proceed bottom-up.
    groups.sort_by(|a, b| b.depth.cmp(&a.depth));
    (zones, groups)
}

/// Returns the canonical zone id for this region: a leaf's own id, or the
/// canonical id of its first (NW) child. A merged zone reuses this id, which
/// is what keeps checkpoint identity stable across restarts.
fn subdivide(
    source: &dyn LineSource,
    env: &Bounds,
    depth: usize,
    target: usize,
    zones: &mut Vec<Zone>,
    groups: &mut Vec<DepthGroup>,
) -> i64 {
    let count = source.count_lines(env);
    if count <= target || depth == MAX_DEPTH {
        let id = zones.len() as i64;
        zones.push(Zone {
            id,
            envelope: env.clone(),
            count,
        });
        return id;
    }

    let quadrants = env.quadrants();
    let mut children = [0; 4];
    for (i, q) in quadrants.iter().enumerate() {
        children[i] = subdivide(source, q, depth + 1, target, zones, groups);
    }
    groups.push(DepthGroup {
        depth: depth + 1,
        zones: children,
    });
    children[0]
}

/// Pop the maximal prefix of groups sharing the current deepest level: one
/// round of independent merges.
pub fn next_groups(groups: &mut Vec<DepthGroup>) -> Vec<DepthGroup> {
    if groups.is_empty() {
        error!("asked for the next merge round of an empty schedule");
    }
    assert!(!groups.is_empty());
    let depth = groups[0].depth;
    let split = groups
        .iter()
        .position(|g| g.depth != depth)
        .unwrap_or(groups.len());
    groups.drain(..split).collect()
}

/// Spread zones over workers: biggest zones first, each to the currently
/// least-loaded worker. Load grows with count cubed, so a huge zone
/// effectively claims a worker for itself.
pub fn assign_zones(zones: &[Zone], workers: usize) -> Vec<Vec<Zone>> {
    let mut by_size: Vec<&Zone> = zones.iter().collect();
    by_size.sort_by(|a, b| b.count.cmp(&a.count).then(a.id.cmp(&b.id)));

    let mut loads: Vec<u128> = vec![0; workers.max(1)];
    let mut assignments: Vec<Vec<Zone>> = vec![Vec::new(); workers.max(1)];
    for z in by_size {
        let min = loads
            .iter()
            .enumerate()
            .min_by_key(|(_, load)| **load)
            .map(|(i, _)| i)
            .unwrap();
        loads[min] += (z.count as u128).pow(3);
        assignments[min].push(z.clone());
    }
    assignments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use geom::Pt2D;

    fn grid_source() -> MemorySource {
        // A 4x4 grid of short lines, denser in the NE
        let mut lines = Vec::new();
        let mut id = 0;
        for x in 0..4 {
            for y in 0..4 {
                let n = if x >= 2 && y >= 2 { 4 } else { 1 };
                for k in 0..n {
                    id += 1;
                    let base = Pt2D::new(x as f64 * 10.0 + k as f64, y as f64 * 10.0);
                    lines.push((id, vec![base, Pt2D::new(base.x() + 0.5, base.y() + 0.5)]));
                }
            }
        }
        MemorySource::new(lines)
    }

    #[test]
    fn deterministic() {
        let source = grid_source();
        let (z1, g1) = prepare_zones(&source, 5);
        let (z2, g2) = prepare_zones(&source, 5);
        assert_eq!(z1, z2);
        assert_eq!(g1, g2);
        assert!(!g1.is_empty());
    }

    #[test]
    fn groups_come_deepest_first() {
        let source = grid_source();
        let (_, mut groups) = prepare_zones(&source, 5);
        let mut last = usize::MAX;
        while !groups.is_empty() {
            let round = next_groups(&mut groups);
            let depth = round[0].depth;
            assert!(round.iter().all(|g| g.depth == depth));
            assert!(depth <= last);
            last = depth;
        }
    }

    #[test]
    fn cubic_load_assignment() {
        let zones: Vec<Zone> = [100, 10, 9, 8, 7]
            .iter()
            .enumerate()
            .map(|(i, count)| Zone {
                id: i as i64,
                envelope: Bounds::from(&[Pt2D::new(0.0, 0.0)]),
                count: *count,
            })
            .collect();
        let assignments = assign_zones(&zones, 2);
        // The giant zone gets a worker to itself
        assert_eq!(assignments[0].len(), 1);
        assert_eq!(assignments[0][0].count, 100);
        assert_eq!(assignments[1].len(), 4);
    }
}
