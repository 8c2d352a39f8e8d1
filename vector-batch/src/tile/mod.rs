//! Per-tile geometry for vector tile layers.

pub mod representation_cache;
pub mod tile_geometry;
pub mod tile_parser;

pub use representation_cache::RepresentationCache;
pub use tile_geometry::{ReadinessPolicy, TileData, TileGeometryRepresentation, TileState};
pub use tile_parser::TileParser;
