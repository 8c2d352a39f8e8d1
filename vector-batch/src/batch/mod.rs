//! Per geometry kind accumulation of feature coordinates.
//!
//! A [`GeometryBatch`] never allocates GPU resources. It flattens the geometries of features into
//! coordinate arrays which the batch renderers turn into render instructions.

use std::{collections::BTreeMap, sync::Arc};

use geo_types::{Coord, Geometry, LineString, Polygon};

use crate::{
    error::{Error, Result},
    feature::{geometry_kind, Feature, FeatureId, GeometryKind},
};

pub mod mixed;

pub use mixed::MixedGeometryBatch;

/// Coordinates of a single geometry as `[x0, y0, x1, y1, ...]`.
///
/// `ends` holds the exclusive end of every ring (or line) counted in vertices. Closed rings do
/// not repeat their first vertex.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlatGeometry {
    pub coordinates: Vec<f64>,
    pub ends: Vec<usize>,
    pub closed: bool,
}

impl FlatGeometry {
    pub fn vertex_count(&self) -> usize {
        self.coordinates.len() / 2
    }

    pub fn vertex(&self, index: usize) -> [f64; 2] {
        [self.coordinates[index * 2], self.coordinates[index * 2 + 1]]
    }

    /// Iterates over `(start, end)` vertex ranges of the rings.
    pub fn rings(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let starts = std::iter::once(0).chain(self.ends.iter().copied());
        starts.zip(self.ends.iter().copied())
    }

    fn push_ring(&mut self, ring: &LineString<f64>) {
        let mut coords: &[Coord<f64>] = &ring.0;
        if self.closed && coords.len() > 1 && ring.is_closed() {
            coords = &coords[..coords.len() - 1];
        }
        for coord in coords {
            self.coordinates.push(coord.x);
            self.coordinates.push(coord.y);
        }
        self.ends.push(self.vertex_count());
    }

    fn polygon(polygon: &Polygon<f64>) -> Option<Self> {
        if polygon.exterior().0.is_empty() {
            return None;
        }
        let mut flat = FlatGeometry {
            closed: true,
            ..Default::default()
        };
        flat.push_ring(polygon.exterior());
        for interior in polygon.interiors() {
            if !interior.0.is_empty() {
                flat.push_ring(interior);
            }
        }
        Some(flat)
    }

    fn line(line: &LineString<f64>, closed: bool) -> Option<Self> {
        if line.0.len() < 2 {
            return None;
        }
        let mut flat = FlatGeometry {
            closed,
            ..Default::default()
        };
        flat.push_ring(line);
        Some(flat)
    }
}

/// Flattens `geometry` for a batch of `kind`.
pub(crate) fn flatten(geometry: &Geometry<f64>, kind: GeometryKind) -> Result<Vec<FlatGeometry>> {
    let found = geometry_kind(geometry).map_err(Error::UnsupportedGeometry)?;
    if found != kind {
        return Err(Error::GeometryKindMismatch {
            expected: kind,
            found,
        });
    }

    let flat = match geometry {
        Geometry::Polygon(polygon) => FlatGeometry::polygon(polygon).into_iter().collect(),
        Geometry::MultiPolygon(polygons) => {
            polygons.iter().filter_map(FlatGeometry::polygon).collect()
        }
        Geometry::Rect(rect) => FlatGeometry::polygon(&rect.to_polygon())
            .into_iter()
            .collect(),
        Geometry::Triangle(triangle) => FlatGeometry::polygon(&triangle.to_polygon())
            .into_iter()
            .collect(),
        Geometry::LineString(line) => FlatGeometry::line(line, false).into_iter().collect(),
        Geometry::MultiLineString(lines) => lines
            .iter()
            .filter_map(|line| FlatGeometry::line(line, false))
            .collect(),
        Geometry::Line(line) => {
            FlatGeometry::line(&LineString::from(vec![line.start, line.end]), false)
                .into_iter()
                .collect()
        }
        Geometry::Point(point) => vec![FlatGeometry {
            coordinates: vec![point.x(), point.y()],
            ends: vec![1],
            closed: false,
        }],
        Geometry::MultiPoint(points) if points.0.is_empty() => vec![],
        Geometry::MultiPoint(points) => vec![FlatGeometry {
            coordinates: points.iter().flat_map(|p| [p.x(), p.y()]).collect(),
            ends: vec![points.0.len()],
            closed: false,
        }],
        Geometry::GeometryCollection(_) => {
            return Err(Error::UnsupportedGeometry("GeometryCollection"))
        }
    };
    Ok(flat)
}

/// Every ring of the polygons in `geometry` as a closed line.
pub(crate) fn polygon_outlines(geometry: &Geometry<f64>) -> Vec<FlatGeometry> {
    let polygons: Vec<Polygon<f64>> = match geometry {
        Geometry::Polygon(polygon) => vec![polygon.clone()],
        Geometry::MultiPolygon(polygons) => polygons.0.clone(),
        Geometry::Rect(rect) => vec![rect.to_polygon()],
        Geometry::Triangle(triangle) => vec![triangle.to_polygon()],
        _ => return vec![],
    };

    polygons
        .iter()
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
        .filter_map(|ring| FlatGeometry::line(ring, true))
        .collect()
}

/// One feature within a [`GeometryBatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryBatchItem {
    pub feature: Arc<Feature>,
    pub geometries: Vec<FlatGeometry>,
}

impl GeometryBatchItem {
    pub fn vertices_count(&self) -> usize {
        self.geometries.iter().map(FlatGeometry::vertex_count).sum()
    }

    pub fn rings_count(&self) -> usize {
        self.geometries.iter().map(|g| g.ends.len()).sum()
    }
}

/// Maps feature identities to their flattened geometries of a single [`GeometryKind`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryBatch {
    kind: GeometryKind,
    entries: BTreeMap<FeatureId, GeometryBatchItem>,
    vertices_count: usize,
    geometries_count: usize,
    rings_count: usize,
}

impl GeometryBatch {
    pub fn new(kind: GeometryKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
            vertices_count: 0,
            geometries_count: 0,
            rings_count: 0,
        }
    }

    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    /// Inserts or replaces the entry of `feature`.
    ///
    /// Geometries of another kind are rejected and leave the batch untouched. A feature without
    /// geometry removes its entry.
    pub fn add_or_update(&mut self, feature: Arc<Feature>) -> Result<()> {
        let Some(geometry) = feature.geometry() else {
            self.remove(feature.id());
            return Ok(());
        };
        let geometries = flatten(geometry, self.kind)?;
        self.insert(feature, geometries);
        Ok(())
    }

    pub(crate) fn insert(&mut self, feature: Arc<Feature>, geometries: Vec<FlatGeometry>) {
        let id = feature.id();
        self.remove(id);
        if geometries.is_empty() {
            return;
        }

        let item = GeometryBatchItem {
            feature,
            geometries,
        };
        self.vertices_count += item.vertices_count();
        self.geometries_count += item.geometries.len();
        self.rings_count += item.rings_count();
        self.entries.insert(id, item);
    }

    pub fn remove(&mut self, id: FeatureId) -> Option<GeometryBatchItem> {
        let item = self.entries.remove(&id)?;
        self.vertices_count -= item.vertices_count();
        self.geometries_count -= item.geometries.len();
        self.rings_count -= item.rings_count();
        Some(item)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.vertices_count = 0;
        self.geometries_count = 0;
        self.rings_count = 0;
    }

    pub fn get(&self, id: FeatureId) -> Option<&GeometryBatchItem> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: FeatureId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Items in ascending feature id order.
    pub fn iter(&self) -> impl Iterator<Item = &GeometryBatchItem> + '_ {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total vertices of all geometries.
    pub fn vertices_count(&self) -> usize {
        self.vertices_count
    }

    pub fn geometries_count(&self) -> usize {
        self.geometries_count
    }

    pub fn rings_count(&self) -> usize {
        self.rings_count
    }
}
