use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};

use topology::{TopoError, Topology};

use crate::checkpoint::CheckpointStore;
use crate::source::LineSource;
use crate::zones::{DepthGroup, Zone};
use crate::DEFAULT_TOLERANCE;

/// Merge one 4-group: the first pair, the second pair, then the pair of
/// pairs. Every stage checkpoints, so a crashed round redoes at most one
/// stage per group.
pub fn merge_group(
    source: &dyn LineSource,
    store: &CheckpointStore,
    zones: &BTreeMap<i64, Zone>,
    group: &DepthGroup,
    restore: bool,
) -> Result<(Zone, usize)> {
    let mut z = Vec::new();
    for id in group.zones {
        z.push(
            zones
                .get(&id)
                .cloned()
                .ok_or_else(|| anyhow!("group references unknown zone #{}", id))?,
        );
    }

    let (ta, za, o1) = merge_checkpointed(source, store, &z[0], &z[1], restore)?;
    let (tb, zb, o2) = merge_checkpointed(source, store, &z[2], &z[3], restore)?;
    // Exactly a pair of pairs feeds the final merge.
    let temporaries = [za, zb];
    let (_, merged, o3) = merge_pair(
        source,
        store,
        ta,
        &temporaries[0],
        tb,
        &temporaries[1],
        restore,
    )?;
    Ok((merged, o1 + o2 + o3))
}

fn merge_checkpointed(
    source: &dyn LineSource,
    store: &CheckpointStore,
    z1: &Zone,
    z2: &Zone,
    restore: bool,
) -> Result<(Topology, Zone, usize)> {
    let t1 = store
        .restore_topology(z1)?
        .ok_or_else(|| anyhow!("topology for zone #{} could not be restored", z1.id))?;
    let t2 = store
        .restore_topology(z2)?
        .ok_or_else(|| anyhow!("topology for zone #{} could not be restored", z2.id))?;
    merge_pair(source, store, t1, z1, t2, z2, restore)
}

/// Union two topologies into one, fold in the lines straddling their shared
/// boundary, and checkpoint the result under the merged zone. A checkpoint
/// from an earlier run short-circuits everything except (for pre-versioning
/// checkpoints) the orphan pass.
pub fn merge_pair(
    source: &dyn LineSource,
    store: &CheckpointStore,
    mut t1: Topology,
    z1: &Zone,
    mut t2: Topology,
    z2: &Zone,
    restore: bool,
) -> Result<(Topology, Zone, usize)> {
    let mut envelope = z1.envelope.clone();
    envelope.union(&z2.envelope);
    let mut merged_zone = Zone {
        id: z1.id,
        envelope,
        count: 0,
    };

    let restored = if restore {
        store.restore_topology(&merged_zone)?
    } else {
        None
    };
    let mut t = match restored {
        Some(t) => {
            info!(
                "merged topology for zone #{} has been restored from a checkpoint",
                merged_zone.id
            );
            t
        }
        None => {
            info!("will merge topologies #{} and #{}", z1.id, z2.id);
            topology::merge(&mut t1, &mut t2);
            t1
        }
    };

    let mut orphan_count = t.orphan_count;
    if orphan_count < 0 {
        let orphans = source.get_common_lines(&z1.envelope, &z2.envelope);
        orphan_count = orphans.len() as i64;
        if !orphans.is_empty() {
            info!(
                "adding {} boundary lines to topology #{}",
                orphans.len(),
                merged_zone.id
            );
            t.rebuild_indexes();
        }
        for (line_id, pts) in orphans {
            match t.add_linestring(line_id, pts, DEFAULT_TOLERANCE) {
                Ok(_) => t.commit(),
                Err(TopoError::InvalidInput(err)) => {
                    warn!("orphan line #{}: {}", line_id, err);
                    t.rollback();
                }
                Err(err @ TopoError::Corrupt(_)) => {
                    t.rollback();
                    return Err(anyhow!(err)).with_context(|| {
                        format!(
                            "orphan line #{} broke merged topology #{}",
                            line_id, merged_zone.id
                        )
                    });
                }
            }
        }
        t.orphan_count = orphan_count;
    }

    merged_zone.count = z1.count + z2.count + orphan_count as usize;
    t.set_zone_id(merged_zone.id);
    store.save_topology(&merged_zone, &t)?;
    t.log_stats();
    Ok((t, merged_zone, orphan_count as usize))
}
