//! Stroked lines: every segment becomes a quad which the stroke shader extrudes by the line
//! width, using the join angles at both ends to place miter or bevel corners.

use std::f64::consts::PI;

use crate::{
    render::instructions::{RenderInstructions, POSITION_COMPONENTS},
    tessellation::GeneratedBuffers,
};

/// `[start.x, start.y, end.x, end.y, join_angle_start, join_angle_end, corner]`
pub const HEADER_SIZE: usize = 7;

/// Join angle of an open line end.
pub const NO_JOIN: f32 = -1.0;

/// Angle in `[0, 2π)` between the directions from `p0` to `pa` and from `p0` to `pb`.
pub fn angle_between(p0: [f32; 2], pa: [f32; 2], pb: [f32; 2]) -> f32 {
    let direction = |p: [f32; 2]| {
        let (dx, dy) = ((p[0] - p0[0]) as f64, (p[1] - p0[1]) as f64);
        let length = dx.hypot(dy);
        (length, [dx / length, dy / length])
    };
    let (length_a, tangent_a) = direction(pa);
    let (length_b, tangent_b) = direction(pb);
    let ortho_a = [-tangent_a[1], tangent_a[0]];

    let angle = if length_a == 0.0 || length_b == 0.0 {
        0.0
    } else {
        (tangent_b[0] * tangent_a[0] + tangent_b[1] * tangent_a[1])
            .clamp(-1.0, 1.0)
            .acos()
    };
    let clockwise = tangent_b[0] * ortho_a[0] + tangent_b[1] * ortho_a[1] > 0.0;
    let angle = if clockwise { angle } else { 2.0 * PI - angle };
    (angle % (2.0 * PI)) as f32
}

/// Four vertices per segment, indexed as two triangles `[0, 1, 2, 1, 3, 2]`.
pub fn generate_buffers(instructions: &RenderInstructions) -> GeneratedBuffers {
    let attributes_size = instructions.stride - POSITION_COMPONENTS;
    let mut buffers = GeneratedBuffers::with_capacity(
        HEADER_SIZE + attributes_size,
        instructions.rows() * 4,
        instructions.rows() * 6,
    );

    for group in &instructions.groups {
        for (start, end) in group.rings() {
            let count = end - start;
            if count < 2 {
                continue;
            }
            let segments = if group.closed { count } else { count - 1 };
            let position = |offset: usize| instructions.position(start + offset % count);

            for segment in 0..segments {
                let p0 = position(segment);
                let p1 = position(segment + 1);

                let before = if group.closed {
                    Some(position(segment + count - 1))
                } else {
                    segment.checked_sub(1).map(position)
                };
                let after = if group.closed || segment + 2 < count {
                    Some(position(segment + 2))
                } else {
                    None
                };

                let join_start = before.map_or(NO_JOIN, |before| angle_between(p0, p1, before));
                let join_end = after.map_or(NO_JOIN, |after| angle_between(p1, p0, after));
                let attributes = instructions.attributes(start + segment);

                let base = buffers.next_index();
                for corner in 0..4 {
                    buffers.vertices.extend_from_slice(&[
                        p0[0],
                        p0[1],
                        p1[0],
                        p1[1],
                        join_start,
                        join_end,
                        corner as f32,
                    ]);
                    buffers.vertices.extend_from_slice(attributes);
                }
                buffers
                    .indices
                    .extend([0, 1, 2, 1, 3, 2].map(|offset| base + offset));
            }
        }
    }

    buffers
}
