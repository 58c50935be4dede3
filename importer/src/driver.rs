use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use instant::Instant;

use topology::{TopoError, Topology};

use crate::checkpoint::{self, CheckpointStore};
use crate::pool::parallelize;
use crate::source::LineSource;
use crate::zones::{self, DepthGroup, Zone, TARGET_LINES_PER_ZONE};
use crate::{merge, DEFAULT_TOLERANCE};

pub struct Options {
    /// Skip the leaf phase; every leaf checkpoint must already exist.
    pub merge_only: bool,
    /// Short-circuit merges whose result is already checkpointed.
    pub merge_restore: bool,
    /// Resume at this merge round, rebuilding zone state from the
    /// deterministic schedule.
    pub first_merge_step: usize,
    pub workers: usize,
    pub output: PathBuf,
}

/// The whole pipeline: partition, build leaves, merge rounds, write the
/// root.
pub fn run(source: &dyn LineSource, store: &CheckpointStore, opts: &Options) -> Result<()> {
    let line_count = source.line_count();
    info!("{} lines total", line_count);

    let (leaf_zones, mut groups) = match store.restore_zones()? {
        Some(pair) => pair,
        None => {
            let pair = zones::prepare_zones(source, TARGET_LINES_PER_ZONE);
            store.save_zones(&pair.0, &pair.1)?;
            pair
        }
    };
    if leaf_zones.is_empty() {
        error!("the partitioner produced no zones");
    }
    assert!(!leaf_zones.is_empty());

    if !opts.merge_only {
        build_leaves(source, store, &leaf_zones, opts.workers, line_count)?;
    }

    let mut zones: BTreeMap<i64, Zone> = leaf_zones.iter().map(|z| (z.id, z.clone())).collect();
    let mut merge_step = 0;
    let mut total_orphans = 0;

    while zones.len() > 1 {
        if groups.is_empty() {
            error!(
                "{} zones remain but the merge schedule is exhausted",
                zones.len()
            );
        }
        assert!(!groups.is_empty());
        let round = zones::next_groups(&mut groups);

        if merge_step < opts.first_merge_step {
            // Reconstruct this round's merged zones without redoing the
            // work, so zone state lines up with the checkpoints.
            info!("skipping merge step {}", merge_step);
            for g in &round {
                let merged = merged_zone_for(store, &zones, g)?;
                for id in g.zones {
                    zones.remove(&id);
                }
                zones.insert(merged.id, merged);
            }
            merge_step += 1;
            continue;
        }

        let start = Instant::now();
        info!(
            "merge step {} (zone count: {}, group count: {})",
            merge_step,
            zones.len(),
            round.len()
        );

        let workers = opts.workers.max(1);
        let mut buckets: Vec<(usize, Vec<DepthGroup>)> =
            (0..workers).map(|w| (w, Vec::new())).collect();
        for (i, g) in round.iter().enumerate() {
            buckets[i % workers].1.push(g.clone());
        }
        let zones_snapshot = zones.clone();
        let results: Vec<Result<Vec<(DepthGroup, Zone, usize)>>> =
            parallelize(opts.workers, buckets, |(worker, gs)| {
                let total = gs.len();
                let mut out = Vec::new();
                for (i, g) in gs.into_iter().enumerate() {
                    let (zone, orphans) =
                        merge::merge_group(source, store, &zones_snapshot, &g, opts.merge_restore)
                            .with_context(|| {
                                format!("worker {} merging group {:?}", worker, g.zones)
                            })?;
                    info!("[{}] progress: {}%", worker, (i + 1) * 100 / total);
                    out.push((g, zone, orphans));
                }
                Ok(out)
            });

        // Gather, then register results in group order so every run agrees
        // on the zone list.
        let mut by_first: BTreeMap<i64, (DepthGroup, Zone, usize)> = BTreeMap::new();
        for worker_result in results {
            for item in worker_result? {
                by_first.insert(item.0.zones[0], item);
            }
        }
        for g in &round {
            let Some((g, zone, orphans)) = by_first.remove(&g.zones[0]) else {
                error!(
                    "no merge result came back for the group starting at zone #{}",
                    g.zones[0]
                );
                panic!("a merge group vanished mid-round");
            };
            for id in g.zones {
                zones.remove(&id);
            }
            total_orphans += orphans;
            zones.insert(zone.id, zone);
        }

        info!(
            "merge step {} done in {:.1}s",
            merge_step,
            start.elapsed().as_secs_f64()
        );
        merge_step += 1;
    }

    info!("{} total orphans added", total_orphans);
    let root_zone = zones.values().next().unwrap().clone();
    info!("total processed lines: {}", root_zone.count);

    let root = store
        .restore_topology(&root_zone)?
        .ok_or_else(|| anyhow!("root topology missing from the checkpoint store"))?;
    root.log_stats();
    checkpoint::write_root(&opts.output, &root)?;
    info!("wrote {}", opts.output.display());
    Ok(())
}

/// The zone a skipped round would have produced. The envelope and id follow
/// from the schedule; the count comes from the checkpoint when one exists.
fn merged_zone_for(
    store: &CheckpointStore,
    zones: &BTreeMap<i64, Zone>,
    g: &DepthGroup,
) -> Result<Zone> {
    let mut envelope: Option<geom::Bounds> = None;
    let mut count = 0;
    for id in g.zones {
        let z = zones
            .get(&id)
            .ok_or_else(|| anyhow!("skipped group references unknown zone #{}", id))?;
        count += z.count;
        match envelope {
            Some(ref mut env) => env.union(&z.envelope),
            None => envelope = Some(z.envelope.clone()),
        }
    }
    let mut merged = Zone {
        id: g.zones[0],
        envelope: envelope.unwrap(),
        count,
    };
    if let Some(meta) = store.restore_zone_meta(&merged)? {
        merged.count = meta.count;
    }
    Ok(merged)
}

fn build_leaves(
    source: &dyn LineSource,
    store: &CheckpointStore,
    leaves: &[Zone],
    workers: usize,
    line_count: usize,
) -> Result<()> {
    let assignments: Vec<(usize, Vec<Zone>)> = zones::assign_zones(leaves, workers)
        .into_iter()
        .enumerate()
        .collect();
    let processing: usize = leaves.iter().map(|z| z.count).sum();
    info!(
        "will process {} lines across {} zones, leaving roughly {} for orphan insertion",
        processing,
        leaves.len(),
        line_count.saturating_sub(processing)
    );

    let results: Vec<Result<()>> = parallelize(workers, assignments, |(worker, zs)| {
        for z in zs {
            build_zone(source, store, &z, worker)?;
        }
        Ok(())
    });
    for r in results {
        r?;
    }
    Ok(())
}

fn build_zone(
    source: &dyn LineSource,
    store: &CheckpointStore,
    zone: &Zone,
    worker: usize,
) -> Result<()> {
    if let Some(t) = store.restore_topology(zone)? {
        info!(
            "[{}] topology for zone #{} ({} lines) has been restored from a checkpoint",
            worker,
            zone.id,
            t.count()
        );
        return Ok(());
    }

    let start = Instant::now();
    let lines = source.get_lines(&zone.envelope);
    info!(
        "[{}] processing zone #{} ({} lines)",
        worker,
        zone.id,
        lines.len()
    );

    let mut t = Topology::new(zone.id);
    for (line_id, pts) in lines {
        match t.add_linestring(line_id, pts, DEFAULT_TOLERANCE) {
            Ok(_) => t.commit(),
            Err(TopoError::InvalidInput(err)) => {
                warn!("[{}] line #{}: {}", worker, line_id, err);
                t.rollback();
            }
            Err(TopoError::Corrupt(err)) => {
                error!("[{}] line #{}: {}", worker, line_id, err);
                error!("[{}] cannot complete topology for zone #{}", worker, zone.id);
                t.rollback();
                t = Topology::new(zone.id);
                break;
            }
        }
    }
    store.save_topology(zone, &t)?;
    info!(
        "[{}] finished zone #{} in {:.1}s",
        worker,
        zone.id,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
