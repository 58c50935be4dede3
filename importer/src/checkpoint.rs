use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use topology::Topology;

use crate::zones::{DepthGroup, Zone};

/// Version 0 predates the orphan count; restoring one leaves it unknown
/// (-1), forcing the next merge to recompute orphans.
pub const CHECKPOINT_VERSION: u8 = 1;

/// On-disk topologies keyed by stable zone identity (id plus envelope; the
/// id alone collides, since a merged zone reuses its first child's id).
/// Writes go through a temp file and a rename, so concurrent workers can
/// share the directory as long as no two of them own the same zone.
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<CheckpointStore> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("can't create checkpoint directory {}", dir.display()))?;
        Ok(CheckpointStore { dir })
    }

    fn topology_path(&self, zone: &Zone) -> PathBuf {
        self.dir
            .join(format!("topology-{}-{:016x}.bin", zone.id, zone_key(zone)))
    }

    pub fn has_topology(&self, zone: &Zone) -> bool {
        self.topology_path(zone).exists()
    }

    /// A self-describing sequence: version, zone, topology, orphan count.
    pub fn save_topology(&self, zone: &Zone, topology: &Topology) -> Result<()> {
        let path = self.topology_path(zone);
        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            bincode::serialize_into(&mut writer, &CHECKPOINT_VERSION)?;
            bincode::serialize_into(&mut writer, zone)?;
            bincode::serialize_into(&mut writer, topology)?;
            bincode::serialize_into(&mut writer, &topology.orphan_count)?;
        }
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// None if no checkpoint exists for this zone identity.
    pub fn restore_topology(&self, zone: &Zone) -> Result<Option<Topology>> {
        let path = self.topology_path(zone);
        if !path.exists() {
            return Ok(None);
        }
        let mut reader = BufReader::new(File::open(&path)?);
        let version: u8 = bincode::deserialize_from(&mut reader)?;
        let stored_zone: Zone = bincode::deserialize_from(&mut reader)?;
        if stored_zone.id != zone.id {
            bail!(
                "checkpoint {} holds zone #{}, expected #{}",
                path.display(),
                stored_zone.id,
                zone.id
            );
        }
        let mut topology: Topology = bincode::deserialize_from(&mut reader)?;
        topology.orphan_count = match version {
            0 => -1,
            CHECKPOINT_VERSION => bincode::deserialize_from(&mut reader)?,
            other => bail!("checkpoint {} has unknown version {}", path.display(), other),
        };
        topology.rebuild_indexes();
        Ok(Some(topology))
    }

    /// Just the zone metadata from a checkpoint, without deserializing the
    /// topology.
    pub fn restore_zone_meta(&self, zone: &Zone) -> Result<Option<Zone>> {
        let path = self.topology_path(zone);
        if !path.exists() {
            return Ok(None);
        }
        let mut reader = BufReader::new(File::open(&path)?);
        let _version: u8 = bincode::deserialize_from(&mut reader)?;
        let stored: Zone = bincode::deserialize_from(&mut reader)?;
        Ok(Some(stored))
    }

    pub fn save_zones(&self, zones: &[Zone], groups: &[DepthGroup]) -> Result<()> {
        let path = self.dir.join("zones.bin");
        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            bincode::serialize_into(&mut writer, &zones.to_vec())?;
            bincode::serialize_into(&mut writer, &groups.to_vec())?;
        }
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn restore_zones(&self) -> Result<Option<(Vec<Zone>, Vec<DepthGroup>)>> {
        let path = self.dir.join("zones.bin");
        if !path.exists() {
            return Ok(None);
        }
        let mut reader = BufReader::new(File::open(&path)?);
        let zones: Vec<Zone> = bincode::deserialize_from(&mut reader)?;
        let groups: Vec<DepthGroup> = bincode::deserialize_from(&mut reader)?;
        Ok(Some((zones, groups)))
    }
}

/// A stable fold of the envelope bits. Hashers with per-process seeds would
/// break resumption, so this is explicit.
fn zone_key(zone: &Zone) -> u64 {
    let mut h: u64 = zone.id as u64;
    for v in [
        zone.envelope.min_x,
        zone.envelope.min_y,
        zone.envelope.max_x,
        zone.envelope.max_y,
    ] {
        h = (h.rotate_left(17) ^ v.to_bits()).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    }
    h
}

/// The final output: one binary serialization of the root topology.
pub fn write_root<P: AsRef<Path>>(path: P, topology: &Topology) -> Result<()> {
    let path = path.as_ref();
    let tmp = path.with_extension("tmp");
    {
        let writer = BufWriter::new(File::create(&tmp)?);
        bincode::serialize_into(writer, topology)?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom::{Bounds, Pt2D};

    fn zone() -> Zone {
        let mut envelope = Bounds::new();
        envelope.update(Pt2D::new(0.0, 0.0));
        envelope.update(Pt2D::new(10.0, 10.0));
        Zone {
            id: 3,
            envelope,
            count: 1,
        }
    }

    fn topology() -> Topology {
        let mut t = Topology::new(3);
        t.add_linestring(1, vec![Pt2D::new(0.0, 0.0), Pt2D::new(5.0, 5.0)], 0.0)
            .unwrap();
        t.commit();
        t
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();
        let zone = zone();
        let mut t = topology();
        t.orphan_count = 7;

        assert!(!store.has_topology(&zone));
        store.save_topology(&zone, &t).unwrap();
        assert!(store.has_topology(&zone));

        let restored = store.restore_topology(&zone).unwrap().unwrap();
        assert_eq!(restored.zone_id(), 3);
        assert_eq!(restored.count(), 1);
        assert_eq!(restored.orphan_count, 7);
        assert_eq!(
            store.restore_zone_meta(&zone).unwrap().unwrap().count,
            zone.count
        );
    }

    #[test]
    fn version_zero_means_orphans_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();
        let zone = zone();
        let t = topology();

        // A file from before the orphan count existed
        let path = store.topology_path(&zone);
        let mut writer = BufWriter::new(File::create(&path).unwrap());
        bincode::serialize_into(&mut writer, &0u8).unwrap();
        bincode::serialize_into(&mut writer, &zone).unwrap();
        bincode::serialize_into(&mut writer, &t).unwrap();
        drop(writer);

        let restored = store.restore_topology(&zone).unwrap().unwrap();
        assert_eq!(restored.orphan_count, -1);
    }

    #[test]
    fn same_id_different_envelope_is_a_different_zone() {
        let zone1 = zone();
        let mut zone2 = zone1.clone();
        zone2.envelope.update(Pt2D::new(20.0, 10.0));
        assert_ne!(zone_key(&zone1), zone_key(&zone2));
    }
}
