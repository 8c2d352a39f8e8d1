//! Turns render instructions into indexed vertex buffers.
//!
//! This runs on the buffer worker, away from the render thread.

use crate::{
    error::Result,
    feature::GeometryKind,
    render::{
        attributes::{AttributeDescription, CustomAttribute},
        instructions::RenderInstructions,
    },
};

pub mod line_string;
pub mod point;
pub mod polygon;

/// Vertex buffers index data type.
pub type IndexDataType = u32;

/// Interleaved vertices and triangle indices ready for upload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeneratedBuffers {
    pub vertices: Vec<f32>,
    pub indices: Vec<IndexDataType>,
    /// Components per vertex.
    pub stride: usize,
}

impl GeneratedBuffers {
    pub fn with_capacity(stride: usize, vertices: usize, indices: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices * stride),
            indices: Vec::with_capacity(indices),
            stride,
        }
    }

    pub fn vertex_count(&self) -> usize {
        if self.stride == 0 {
            return 0;
        }
        self.vertices.len() / self.stride
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex(&self, index: usize) -> &[f32] {
        &self.vertices[index * self.stride..(index + 1) * self.stride]
    }

    fn next_index(&self) -> IndexDataType {
        self.vertex_count() as IndexDataType
    }
}

/// Generates the buffers for `instructions` of any kind.
#[tracing::instrument(skip_all)]
pub fn generate_buffers(instructions: &RenderInstructions) -> Result<GeneratedBuffers> {
    match instructions.kind {
        GeometryKind::Polygon => polygon::generate_buffers(instructions),
        GeometryKind::LineString => Ok(line_string::generate_buffers(instructions)),
        GeometryKind::Point => Ok(point::generate_buffers(instructions)),
    }
}

/// Number of components per vertex which precede the custom attributes.
pub fn vertex_header_size(kind: GeometryKind) -> usize {
    match kind {
        GeometryKind::Polygon => polygon::HEADER_SIZE,
        GeometryKind::LineString => line_string::HEADER_SIZE,
        GeometryKind::Point => point::HEADER_SIZE,
    }
}

/// Attribute layout of the vertex buffers of `kind`.
pub fn vertex_layout(
    kind: GeometryKind,
    attributes: &[CustomAttribute],
) -> Vec<AttributeDescription> {
    let mut layout = match kind {
        GeometryKind::Polygon => vec![AttributeDescription::new("a_position", 2)],
        GeometryKind::LineString => vec![
            AttributeDescription::new("a_segmentStart", 2),
            AttributeDescription::new("a_segmentEnd", 2),
            AttributeDescription::new("a_joinAngles", 2),
            AttributeDescription::new("a_corner", 1),
        ],
        GeometryKind::Point => vec![
            AttributeDescription::new("a_position", 2),
            AttributeDescription::new("a_corner", 1),
        ],
    };
    layout.extend(
        attributes
            .iter()
            .map(|attribute| AttributeDescription::new(attribute.shader_name(), attribute.size())),
    );
    layout
}
