//! Points are drawn as quads centered on their position.

use crate::{
    render::instructions::{RenderInstructions, POSITION_COMPONENTS},
    tessellation::GeneratedBuffers,
};

/// `[x, y, corner]`
pub const HEADER_SIZE: usize = 3;

/// Four vertices per point, indexed as two triangles `[0, 1, 3, 1, 2, 3]`.
pub fn generate_buffers(instructions: &RenderInstructions) -> GeneratedBuffers {
    let attributes_size = instructions.stride - POSITION_COMPONENTS;
    let mut buffers = GeneratedBuffers::with_capacity(
        HEADER_SIZE + attributes_size,
        instructions.rows() * 4,
        instructions.rows() * 6,
    );

    for row in 0..instructions.rows() {
        let [x, y] = instructions.position(row);
        let attributes = instructions.attributes(row);
        let base = buffers.next_index();
        for corner in 0..4 {
            buffers.vertices.extend_from_slice(&[x, y, corner as f32]);
            buffers.vertices.extend_from_slice(attributes);
        }
        buffers
            .indices
            .extend([0, 1, 3, 1, 2, 3].map(|offset| base + offset));
    }

    buffers
}
