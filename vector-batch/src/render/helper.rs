//! The draw helper compiles programs, owns GPU buffers and issues draw calls. It is provided by
//! the embedding application.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    layer::frame_state::FrameState,
    render::{attributes::AttributeDescription, uniforms::UniformValue},
};

#[derive(Error, Debug)]
pub enum HelperError {
    #[error("compiling shader program failed: {0}")]
    Compile(String),
    #[error("uploading buffer failed: {0}")]
    Upload(String),
    #[error("drawing failed: {0}")]
    Draw(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BufferTarget {
    Vertex,
    Index,
}

/// A post-processing pass applied by the helper after all draws of a frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PostProcess {
    pub fragment_shader: Option<String>,
    pub scale_ratio: Option<f32>,
    #[serde(default)]
    pub uniforms: BTreeMap<String, UniformValue>,
}

pub trait DrawHelper {
    type Program: Clone;
    type Buffer;
    /// What a frame is rendered into.
    type Target;

    fn compile_program(
        &mut self,
        vertex_shader: &str,
        fragment_shader: &str,
    ) -> Result<Self::Program, HelperError>;

    fn create_buffer(
        &mut self,
        target: BufferTarget,
        data: &[u8],
    ) -> Result<Self::Buffer, HelperError>;

    fn delete_buffer(&mut self, buffer: Self::Buffer);

    fn set_post_processes(&mut self, passes: &[PostProcess]);

    /// Clears the target before the layer draws a frame.
    fn prepare_draw(&mut self, frame: &FrameState);

    fn use_program(&mut self, program: &Self::Program);

    fn bind_buffer(&mut self, target: BufferTarget, buffer: &Self::Buffer);

    fn enable_attributes(&mut self, layout: &[AttributeDescription]);

    fn set_uniform(&mut self, name: &str, value: &UniformValue);

    /// Draws the triangles of the bound index buffer in `start..end`.
    fn draw_elements(&mut self, start: usize, end: usize) -> Result<(), HelperError>;

    /// Applies post processes and returns the target the frame was drawn into.
    fn finalize_draw(&mut self, frame: &FrameState) -> Self::Target;
}
