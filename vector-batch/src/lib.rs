//! # vector-batch
//!
//! Turns vector map features into GPU buffers and keeps them in sync with their source.
//!
//! Features are collected per geometry kind in [`batch::GeometryBatch`]es. A
//! [`render::BatchRenderer`] generates flat render instructions from a batch on the calling
//! thread and hands them to a [`io::worker::BufferWorker`], which tessellates polygons with
//! Lyon and expands lines and points into quads. Finished buffers replace the current ones
//! only if no later rebuild was requested in the meantime.
//!
//! Two layer renderers drive this pipeline: [`layer::VectorLayerRenderer`] for a mutable
//! feature source and [`layer::VectorTileLayerRenderer`] for Mapbox vector tiles, which keeps
//! a bounded cache of per-tile buffers. Compiling programs and issuing draw calls is up to the
//! embedding application through the [`render::DrawHelper`] trait.

pub mod batch;
pub mod coords;
pub mod error;
pub mod feature;
pub mod io;
pub mod layer;
pub mod render;
pub mod tessellation;
pub mod tile;
pub mod util;

// Used for benchmarking
pub mod benchmarking;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
pub use feature::{Feature, FeatureId, GeometryKind, PropertyValue};
