use anyhow::{bail, Context, Result};
use geojson::GeoJson;

use geom::{Bounds, Pt2D};

/// Where the linestrings come from. The real deployment reads a spatial
/// database; everything the pipeline needs is these five queries.
pub trait LineSource: Send + Sync {
    fn line_count(&self) -> usize;
    /// The union of every line's bounding box.
    fn world_bounds(&self) -> Bounds;
    /// How many lines' bounding boxes intersect this envelope.
    fn count_lines(&self, env: &Bounds) -> usize;
    /// Lines whose bounding box is contained in this envelope (touching the
    /// border is fine), in id order.
    fn get_lines(&self, env: &Bounds) -> Vec<(i64, Vec<Pt2D>)>;
    /// Lines straddling the boundary between two envelopes: the bounding box
    /// intersects both but is contained in neither.
    fn get_common_lines(&self, e1: &Bounds, e2: &Bounds) -> Vec<(i64, Vec<Pt2D>)>;
}

pub struct MemorySource {
    // Sorted by id, so query results have a stable order.
    lines: Vec<(i64, Vec<Pt2D>, Bounds)>,
}

impl MemorySource {
    pub fn new(mut lines: Vec<(i64, Vec<Pt2D>)>) -> MemorySource {
        lines.sort_by_key(|(id, _)| *id);
        MemorySource {
            lines: lines
                .into_iter()
                .map(|(id, pts)| {
                    let bounds = Bounds::from(&pts);
                    (id, pts, bounds)
                })
                .collect(),
        }
    }
}

impl LineSource for MemorySource {
    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn world_bounds(&self) -> Bounds {
        let mut world = Bounds::new();
        for (_, _, bounds) in &self.lines {
            world.union(bounds);
        }
        world
    }

    fn count_lines(&self, env: &Bounds) -> usize {
        self.lines
            .iter()
            .filter(|(_, _, bounds)| env.intersects(bounds))
            .count()
    }

    fn get_lines(&self, env: &Bounds) -> Vec<(i64, Vec<Pt2D>)> {
        self.lines
            .iter()
            .filter(|(_, _, bounds)| env.contains_bounds(bounds))
            .map(|(id, pts, _)| (*id, pts.clone()))
            .collect()
    }

    fn get_common_lines(&self, e1: &Bounds, e2: &Bounds) -> Vec<(i64, Vec<Pt2D>)> {
        self.lines
            .iter()
            .filter(|(_, _, bounds)| {
                e1.intersects(bounds)
                    && e2.intersects(bounds)
                    && !e1.contains_bounds(bounds)
                    && !e2.contains_bounds(bounds)
            })
            .map(|(id, pts, _)| (*id, pts.clone()))
            .collect()
    }
}

/// A GeoJSON FeatureCollection of LineStrings, held in memory. Feature ids
/// come from the `id` member, an `id` property, or failing both, file order.
pub struct GeoJsonSource {
    inner: MemorySource,
}

impl GeoJsonSource {
    pub fn open(path: &str) -> Result<GeoJsonSource> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("can't read line dataset {}", path))?;
        let geojson: GeoJson = raw
            .parse()
            .with_context(|| format!("{} isn't GeoJSON", path))?;
        let GeoJson::FeatureCollection(collection) = geojson else {
            bail!("{} isn't a FeatureCollection", path);
        };

        let mut lines = Vec::new();
        for (idx, feature) in collection.features.into_iter().enumerate() {
            let id = match feature.id {
                Some(geojson::feature::Id::Number(ref n)) if n.as_i64().is_some() => {
                    n.as_i64().unwrap()
                }
                _ => feature
                    .property("id")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(idx as i64 + 1),
            };
            let Some(ref geometry) = feature.geometry else {
                continue;
            };
            if let geojson::Value::LineString(ref coords) = geometry.value {
                let pts: Vec<Pt2D> = coords.iter().map(|c| Pt2D::new(c[0], c[1])).collect();
                if pts.len() >= 2 {
                    lines.push((id, pts));
                } else {
                    warn!("skipping feature {}: fewer than 2 coordinates", id);
                }
            }
        }
        if lines.is_empty() {
            bail!("{} has no LineString features", path);
        }
        info!("loaded {} lines from {}", lines.len(), path);
        Ok(GeoJsonSource {
            inner: MemorySource::new(lines),
        })
    }
}

impl LineSource for GeoJsonSource {
    fn line_count(&self) -> usize {
        self.inner.line_count()
    }
    fn world_bounds(&self) -> Bounds {
        self.inner.world_bounds()
    }
    fn count_lines(&self, env: &Bounds) -> usize {
        self.inner.count_lines(env)
    }
    fn get_lines(&self, env: &Bounds) -> Vec<(i64, Vec<Pt2D>)> {
        self.inner.get_lines(env)
    }
    fn get_common_lines(&self, e1: &Bounds, e2: &Bounds) -> Vec<(i64, Vec<Pt2D>)> {
        self.inner.get_common_lines(e1, e2)
    }
}
