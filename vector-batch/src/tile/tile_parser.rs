//! Decodes Mapbox vector tiles into features in Web Mercator coordinates.

use std::collections::HashMap;

use geozero::{
    error::Result as GeoResult,
    geo_types::GeoWriter,
    mvt::{Message, Tile},
    ColumnValue, FeatureProcessor, GeomProcessor, GeozeroDatasource, PropertyProcessor,
};

use crate::{
    coords::{WorldTileCoords, EXTENT_UINT},
    error::{Error, Result},
    feature::{Feature, PropertyValue},
};

/// Name of the property holding the source layer of a decoded feature.
pub const LAYER_PROPERTY: &str = "$layer";

pub struct TileParser;

impl TileParser {
    /// Decodes all features of the tile, or only those of `layers` if given. Feature ids are
    /// assigned in decoding order.
    #[tracing::instrument(skip_all)]
    pub fn parse(
        coords: WorldTileCoords,
        data: &[u8],
        layers: Option<&[String]>,
    ) -> Result<Vec<Feature>> {
        let decode_error = |reason: String| Error::TileDecode { coords, reason };

        let mut tile = Tile::decode(data).map_err(|e| decode_error(e.to_string()))?;
        let mut collector = FeatureCollector::new(coords);

        for layer in tile.layers.iter_mut() {
            if let Some(layers) = layers {
                if !layers.iter().any(|name| *name == layer.name) {
                    continue;
                }
            }
            collector.begin_layer(layer.name.clone(), layer.extent.unwrap_or(EXTENT_UINT));
            layer
                .process(&mut collector)
                .map_err(|e| decode_error(e.to_string()))?;
        }

        log::debug!(
            "decoded {} features of tile {coords}",
            collector.features.len()
        );
        Ok(collector.features)
    }
}

/// Collects geo-types geometries of tile features, projected from tile pixels to world
/// coordinates.
struct FeatureCollector {
    writer: GeoWriter,
    origin: [f64; 2],
    tile_size: f64,
    scale: f64,
    layer_name: String,
    properties: HashMap<String, PropertyValue>,
    features: Vec<Feature>,
}

impl FeatureCollector {
    fn new(coords: WorldTileCoords) -> Self {
        let extent = coords.extent();
        Self {
            writer: GeoWriter::new(),
            origin: [extent.min_x, extent.max_y],
            tile_size: coords.size(),
            scale: coords.size() / EXTENT_UINT as f64,
            layer_name: String::new(),
            properties: HashMap::new(),
            features: Vec::new(),
        }
    }

    fn begin_layer(&mut self, name: String, extent: u32) {
        self.layer_name = name;
        self.scale = self.tile_size / extent as f64;
    }
}

fn property_value(value: &ColumnValue) -> PropertyValue {
    match *value {
        ColumnValue::Bool(value) => PropertyValue::Bool(value),
        ColumnValue::Byte(value) => PropertyValue::Number(value as f64),
        ColumnValue::UByte(value) => PropertyValue::Number(value as f64),
        ColumnValue::Short(value) => PropertyValue::Number(value as f64),
        ColumnValue::UShort(value) => PropertyValue::Number(value as f64),
        ColumnValue::Int(value) => PropertyValue::Number(value as f64),
        ColumnValue::UInt(value) => PropertyValue::Number(value as f64),
        ColumnValue::Long(value) => PropertyValue::Number(value as f64),
        ColumnValue::ULong(value) => PropertyValue::Number(value as f64),
        ColumnValue::Float(value) => PropertyValue::Number(value as f64),
        ColumnValue::Double(value) => PropertyValue::Number(value),
        ColumnValue::String(value) | ColumnValue::Json(value) | ColumnValue::DateTime(value) => {
            PropertyValue::String(value.to_owned())
        }
        _ => PropertyValue::Null,
    }
}

impl GeomProcessor for FeatureCollector {
    fn xy(&mut self, x: f64, y: f64, idx: usize) -> GeoResult<()> {
        // Tile pixels grow southwards.
        let world_x = self.origin[0] + x * self.scale;
        let world_y = self.origin[1] - y * self.scale;
        self.writer.xy(world_x, world_y, idx)
    }
    fn point_begin(&mut self, idx: usize) -> GeoResult<()> {
        self.writer.point_begin(idx)
    }
    fn point_end(&mut self, idx: usize) -> GeoResult<()> {
        self.writer.point_end(idx)
    }
    fn multipoint_begin(&mut self, size: usize, idx: usize) -> GeoResult<()> {
        self.writer.multipoint_begin(size, idx)
    }
    fn multipoint_end(&mut self, idx: usize) -> GeoResult<()> {
        self.writer.multipoint_end(idx)
    }
    fn linestring_begin(&mut self, tagged: bool, size: usize, idx: usize) -> GeoResult<()> {
        self.writer.linestring_begin(tagged, size, idx)
    }
    fn linestring_end(&mut self, tagged: bool, idx: usize) -> GeoResult<()> {
        self.writer.linestring_end(tagged, idx)
    }
    fn multilinestring_begin(&mut self, size: usize, idx: usize) -> GeoResult<()> {
        self.writer.multilinestring_begin(size, idx)
    }
    fn multilinestring_end(&mut self, idx: usize) -> GeoResult<()> {
        self.writer.multilinestring_end(idx)
    }
    fn polygon_begin(&mut self, tagged: bool, size: usize, idx: usize) -> GeoResult<()> {
        self.writer.polygon_begin(tagged, size, idx)
    }
    fn polygon_end(&mut self, tagged: bool, idx: usize) -> GeoResult<()> {
        self.writer.polygon_end(tagged, idx)
    }
    fn multipolygon_begin(&mut self, size: usize, idx: usize) -> GeoResult<()> {
        self.writer.multipolygon_begin(size, idx)
    }
    fn multipolygon_end(&mut self, idx: usize) -> GeoResult<()> {
        self.writer.multipolygon_end(idx)
    }
}

impl PropertyProcessor for FeatureCollector {
    fn property(&mut self, _idx: usize, name: &str, value: &ColumnValue) -> GeoResult<bool> {
        self.properties.insert(name.to_owned(), property_value(value));
        // `true` would abort the processing of further properties.
        Ok(false)
    }
}

impl FeatureProcessor for FeatureCollector {
    fn feature_begin(&mut self, _idx: u64) -> GeoResult<()> {
        self.properties.clear();
        Ok(())
    }

    fn feature_end(&mut self, _idx: u64) -> GeoResult<()> {
        let mut properties = std::mem::take(&mut self.properties);
        properties.insert(
            LAYER_PROPERTY.to_owned(),
            PropertyValue::String(self.layer_name.clone()),
        );

        let id = self.features.len() as u64;
        let feature = match self.writer.take_geometry() {
            Some(geometry) => Feature::new(id, geometry),
            None => Feature::without_geometry(id),
        };
        self.features.push(feature.with_properties(properties));
        Ok(())
    }
}
