use geom::{Bounds, Pt2D};
use topology::Topology;

use importer::checkpoint::CheckpointStore;
use importer::driver::{self, Options};
use importer::merge;
use importer::source::{LineSource, MemorySource};
use importer::zones::Zone;

fn line(id: i64, pts: &[(f64, f64)]) -> (i64, Vec<Pt2D>) {
    (id, pts.iter().map(|(x, y)| Pt2D::new(*x, *y)).collect())
}

fn bounds(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Bounds {
    Bounds {
        min_x,
        min_y,
        max_x,
        max_y,
    }
}

fn options(dir: &std::path::Path, output: &str) -> Options {
    Options {
        merge_only: false,
        merge_restore: true,
        first_merge_step: 0,
        workers: 2,
        output: dir.join(output),
    }
}

/// A dataset big enough to subdivide two levels deep: clusters of short
/// disjoint lines in each of the 16 cells of a [0,40]^2 world, pinned so the
/// world bounds come out exactly, plus a few lines deliberately straddling
/// merge boundaries.
fn grid_dataset() -> Vec<(i64, Vec<Pt2D>)> {
    let mut lines = Vec::new();
    let mut id = 0;
    // Pins fixing the world extent to [0,40]^2
    id += 1;
    lines.push(line(id, &[(0.0, 0.0), (0.2, 0.2)]));
    id += 1;
    lines.push(line(id, &[(39.8, 39.8), (40.0, 40.0)]));

    for cx in 0..4 {
        for cy in 0..4 {
            // 6 short lines bunched near each cell center
            for k in 0..6 {
                id += 1;
                let x = cx as f64 * 10.0 + 3.0 + 0.5 * k as f64;
                let y = cy as f64 * 10.0 + 5.0;
                lines.push(line(id, &[(x, y), (x + 0.3, y + 0.3)]));
            }
        }
    }

    // Orphans: one straddling a depth-2 cell boundary, one straddling the
    // x=20 quadrant boundary away from the center
    id += 1;
    lines.push(line(id, &[(8.0, 2.0), (12.0, 2.0)]));
    id += 1;
    lines.push(line(id, &[(18.0, 32.0), (22.0, 32.0)]));
    lines
}

#[test]
fn cross_tile_orphan() {
    let source = MemorySource::new(vec![
        line(1, &[(1.0, 1.0), (9.0, 1.0)]),
        line(2, &[(11.0, 1.0), (19.0, 1.0)]),
        line(3, &[(5.0, 5.0), (15.0, 5.0)]),
    ]);
    let z1 = Zone {
        id: 0,
        envelope: bounds(0.0, 0.0, 10.0, 10.0),
        count: 1,
    };
    let z2 = Zone {
        id: 1,
        envelope: bounds(10.0, 0.0, 20.0, 10.0),
        count: 1,
    };
    // Line 3 belongs to neither zone
    assert_eq!(source.get_lines(&z1.envelope).len(), 1);
    assert_eq!(source.get_lines(&z2.envelope).len(), 1);
    assert_eq!(source.get_common_lines(&z1.envelope, &z2.envelope).len(), 1);

    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path()).unwrap();

    let mut t1 = Topology::new(0);
    for (id, pts) in source.get_lines(&z1.envelope) {
        t1.add_linestring(id, pts, 0.0).unwrap();
        t1.commit();
    }
    let mut t2 = Topology::new(1);
    for (id, pts) in source.get_lines(&z2.envelope) {
        t2.add_linestring(id, pts, 0.0).unwrap();
        t2.commit();
    }

    let (t, merged, orphans) = merge::merge_pair(&source, &store, t1, &z1, t2, &z2, true).unwrap();
    assert_eq!(orphans, 1);
    assert_eq!(merged.id, 0);
    assert_eq!(merged.count, 3);
    assert_eq!(t.count(), 3);
    assert_eq!(t.live_edges().count(), 3);
    assert_eq!(t.live_nodes().count(), 6);
    t.validate().unwrap();

    // The merged result is checkpointed under the merged zone identity, and
    // a rerun restores it instead of remerging
    assert!(store.has_topology(&merged));
    let restored = store.restore_topology(&merged).unwrap().unwrap();
    assert_eq!(restored.count(), 3);
    assert_eq!(restored.orphan_count, 1);
}

#[test]
fn single_zone_world() {
    let source = MemorySource::new(vec![line(1, &[(0.0, 0.0), (10.0, 10.0)])]);
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("ckpt")).unwrap();

    driver::run(&source, &store, &options(dir.path(), "topology.ser")).unwrap();

    let raw = std::fs::read(dir.path().join("topology.ser")).unwrap();
    let root: Topology = bincode::deserialize(&raw).unwrap();
    assert_eq!(root.count(), 1);
    assert_eq!(root.live_nodes().count(), 2);
    assert_eq!(root.live_edges().count(), 1);
    root.validate().unwrap();
}

#[test]
fn full_pipeline_covers_every_line() {
    let dataset = grid_dataset();
    let total = dataset.len();
    let source = MemorySource::new(dataset);
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("ckpt")).unwrap();

    driver::run(&source, &store, &options(dir.path(), "topology.ser")).unwrap();

    let raw = std::fs::read(dir.path().join("topology.ser")).unwrap();
    let root: Topology = bincode::deserialize(&raw).unwrap();
    assert_eq!(root.count(), total);
    // All the little lines are disjoint; only the pins and orphans add any
    // wrinkle, and none of them touch each other.
    assert_eq!(root.live_edges().count(), total);
    root.validate().unwrap();
}

#[test]
fn resume_reproduces_the_same_root() {
    let source = MemorySource::new(grid_dataset());
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("ckpt")).unwrap();

    driver::run(&source, &store, &options(dir.path(), "full.ser")).unwrap();
    let full = std::fs::read(dir.path().join("full.ser")).unwrap();

    // Resume after round 1: the zone list must be reconstructed purely from
    // checkpoints and the deterministic schedule.
    let mut opts = options(dir.path(), "resumed.ser");
    opts.merge_only = true;
    opts.first_merge_step = 1;
    driver::run(&source, &store, &opts).unwrap();
    let resumed = std::fs::read(dir.path().join("resumed.ser")).unwrap();
    assert_eq!(full, resumed);

    // Recomputing every merge from the leaf checkpoints (no restore) lands
    // on the identical topology too.
    let mut opts = options(dir.path(), "recomputed.ser");
    opts.merge_only = true;
    opts.merge_restore = false;
    driver::run(&source, &store, &opts).unwrap();
    let recomputed = std::fs::read(dir.path().join("recomputed.ser")).unwrap();
    assert_eq!(full, recomputed);
}
