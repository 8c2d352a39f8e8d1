//! Layer renderers drawing a vector source or a vector tile source.

pub mod frame_state;
pub mod options;
pub mod source;
pub mod vector_layer;
pub mod vector_tile_layer;

pub use frame_state::{FrameState, ViewHints, ViewState};
pub use options::{ShaderProgram, VectorLayerOptions, VectorTileLayerOptions};
pub use source::SourceEvent;
pub use vector_layer::VectorLayerRenderer;
pub use vector_tile_layer::VectorTileLayerRenderer;
