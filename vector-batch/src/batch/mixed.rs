use std::sync::Arc;

use crate::{
    batch::{flatten, polygon_outlines, GeometryBatch},
    error::{Error, Result},
    feature::{geometry_kind, Feature, FeatureId, GeometryKind},
};

/// Routes features of any geometry type to the polygon, line string and point batches.
///
/// The rings of polygons are also added to the line string batch so their outlines get stroked.
#[derive(Debug, Clone, PartialEq)]
pub struct MixedGeometryBatch {
    polygon: GeometryBatch,
    line_string: GeometryBatch,
    point: GeometryBatch,
    revision: u64,
}

impl Default for MixedGeometryBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl MixedGeometryBatch {
    pub fn new() -> Self {
        Self {
            polygon: GeometryBatch::new(GeometryKind::Polygon),
            line_string: GeometryBatch::new(GeometryKind::LineString),
            point: GeometryBatch::new(GeometryKind::Point),
            revision: 0,
        }
    }

    /// Adds `feature` or replaces every entry it had before, its geometry may have changed kind.
    ///
    /// Features with an unsupported geometry are excluded and reported.
    pub fn add_or_update(&mut self, feature: impl Into<Arc<Feature>>) -> Result<()> {
        let feature = feature.into();
        self.remove_entries(feature.id());
        self.revision += 1;

        let Some(geometry) = feature.geometry() else {
            return Ok(());
        };

        match geometry_kind(geometry).map_err(Error::UnsupportedGeometry)? {
            GeometryKind::Polygon => {
                let outlines = polygon_outlines(geometry);
                self.polygon
                    .insert(feature.clone(), flatten(geometry, GeometryKind::Polygon)?);
                self.line_string.insert(feature, outlines);
            }
            GeometryKind::LineString => {
                let lines = flatten(geometry, GeometryKind::LineString)?;
                self.line_string.insert(feature, lines);
            }
            GeometryKind::Point => {
                let points = flatten(geometry, GeometryKind::Point)?;
                self.point.insert(feature, points);
            }
        }
        Ok(())
    }

    /// Returns whether the feature was part of any batch.
    pub fn remove(&mut self, id: FeatureId) -> bool {
        let removed = self.remove_entries(id);
        if removed {
            self.revision += 1;
        }
        removed
    }

    fn remove_entries(&mut self, id: FeatureId) -> bool {
        let polygon = self.polygon.remove(id).is_some();
        let line_string = self.line_string.remove(id).is_some();
        let point = self.point.remove(id).is_some();
        polygon || line_string || point
    }

    pub fn clear(&mut self) {
        self.polygon.clear();
        self.line_string.clear();
        self.point.clear();
        self.revision += 1;
    }

    pub fn batch(&self, kind: GeometryKind) -> &GeometryBatch {
        match kind {
            GeometryKind::Polygon => &self.polygon,
            GeometryKind::LineString => &self.line_string,
            GeometryKind::Point => &self.point,
        }
    }

    pub fn polygon_batch(&self) -> &GeometryBatch {
        &self.polygon
    }

    pub fn line_string_batch(&self) -> &GeometryBatch {
        &self.line_string
    }

    pub fn point_batch(&self) -> &GeometryBatch {
        &self.point
    }

    /// Incremented on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_empty(&self) -> bool {
        self.polygon.is_empty() && self.line_string.is_empty() && self.point.is_empty()
    }
}
