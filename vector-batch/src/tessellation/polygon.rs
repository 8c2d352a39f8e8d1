//! Fill triangulation of polygons with holes.

use lyon::{
    math::point,
    path::Path,
    tessellation::{
        BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, FillVertexConstructor,
        VertexBuffers,
    },
};

use crate::{
    error::Result,
    render::instructions::RenderInstructions,
    tessellation::{GeneratedBuffers, IndexDataType},
};

/// `[x, y]`
pub const HEADER_SIZE: usize = 2;

struct PositionConstructor;

impl FillVertexConstructor<[f32; 2]> for PositionConstructor {
    fn new_vertex(&mut self, vertex: FillVertex) -> [f32; 2] {
        vertex.position().to_array()
    }
}

/// Vertex rows `[x, y, attributes...]`. Holes are cut out with the even-odd rule.
pub fn generate_buffers(instructions: &RenderInstructions) -> Result<GeneratedBuffers> {
    // Instruction rows already have the vertex layout.
    let mut buffers = GeneratedBuffers::with_capacity(
        instructions.stride,
        instructions.rows(),
        instructions.rows() * 3,
    );

    let mut tessellator = FillTessellator::new();
    let options = FillOptions::default().with_fill_rule(FillRule::EvenOdd);
    let mut geometry: VertexBuffers<[f32; 2], IndexDataType> = VertexBuffers::new();

    for group in &instructions.groups {
        let mut builder = Path::builder();
        for (start, end) in group.rings() {
            if end - start < 3 {
                continue;
            }
            let [x, y] = instructions.position(start);
            builder.begin(point(x, y));
            for row in start + 1..end {
                let [x, y] = instructions.position(row);
                builder.line_to(point(x, y));
            }
            builder.end(true);
        }
        let path = builder.build();

        geometry.vertices.clear();
        geometry.indices.clear();
        tessellator.tessellate_path(
            &path,
            &options,
            &mut BuffersBuilder::new(&mut geometry, PositionConstructor),
        )?;

        let attributes = instructions.attributes(group.start);
        let base = buffers.next_index();
        for position in &geometry.vertices {
            buffers.vertices.extend_from_slice(position);
            buffers.vertices.extend_from_slice(attributes);
        }
        buffers
            .indices
            .extend(geometry.indices.iter().map(|index| base + index));
    }

    Ok(buffers)
}
