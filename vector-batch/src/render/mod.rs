//! Turns geometry batches into GPU buffers and draws them through a [`DrawHelper`].

pub mod attributes;
pub mod batch_renderer;
pub mod helper;
pub mod instructions;
pub mod shaders;
pub mod transform;
pub mod uniforms;

pub use batch_renderer::{
    BatchBuffers, BatchRenderer, BatchRenderers, LayerBuffers, RebuildOutcome, DRAW_ORDER,
};
pub use helper::DrawHelper;
pub use transform::Transform;
