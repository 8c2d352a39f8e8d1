//! Render instructions are the flat intermediate representation of a batch.
//!
//! Every row is `[x, y, custom attributes...]` with the position already transformed. The worker
//! turns them into vertex and index buffers.

use crate::{
    batch::GeometryBatch,
    feature::GeometryKind,
    render::{
        attributes::{attributes_size, push_custom_attributes, CustomAttribute},
        transform::Transform,
    },
};

/// Number of position components at the start of every row.
pub const POSITION_COMPONENTS: usize = 2;

/// Rows which belong to one polygon or one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionGroup {
    pub start: usize,
    /// Exclusive end row of every ring.
    pub ends: Vec<usize>,
    pub closed: bool,
}

impl InstructionGroup {
    pub fn rings(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        std::iter::once(self.start)
            .chain(self.ends.iter().copied())
            .zip(self.ends.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderInstructions {
    pub kind: GeometryKind,
    pub stride: usize,
    pub data: Vec<f32>,
    /// Empty for points, every row is a point.
    pub groups: Vec<InstructionGroup>,
}

impl RenderInstructions {
    pub fn empty(kind: GeometryKind) -> Self {
        Self {
            kind,
            stride: POSITION_COMPONENTS,
            data: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.data.len() / self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self, index: usize) -> &[f32] {
        &self.data[index * self.stride..(index + 1) * self.stride]
    }

    pub fn position(&self, index: usize) -> [f32; 2] {
        let row = self.row(index);
        [row[0], row[1]]
    }

    /// Custom attribute components of a row.
    pub fn attributes(&self, index: usize) -> &[f32] {
        &self.row(index)[POSITION_COMPONENTS..]
    }
}

/// Writes one row per vertex of `batch`. `recycled` is reused as storage for the rows.
#[tracing::instrument(skip_all)]
pub fn generate_render_instructions(
    batch: &GeometryBatch,
    transform: &Transform,
    attributes: &[CustomAttribute],
    recycled: Vec<f32>,
) -> RenderInstructions {
    let attribute_slots = attributes_size(attributes);
    let stride = POSITION_COMPONENTS + attribute_slots;
    let mut data = recycled;
    data.clear();
    data.resize(batch.vertices_count() * stride, 0.0);

    let mut groups = Vec::with_capacity(match batch.kind() {
        GeometryKind::Point => 0,
        _ => batch.geometries_count(),
    });

    // Attribute values of the current feature, shared by all of its vertices.
    let mut values = vec![0.0; attribute_slots];
    let mut row = 0;
    for item in batch.iter() {
        let written = push_custom_attributes(attributes, &item.feature, &mut values, 0);
        debug_assert_eq!(written, attribute_slots);

        for geometry in &item.geometries {
            let start = row;
            for vertex in 0..geometry.vertex_count() {
                let [x, y] = transform.apply(geometry.vertex(vertex));
                let index = row * stride;
                data[index] = x as f32;
                data[index + 1] = y as f32;
                data[index + POSITION_COMPONENTS..index + stride].copy_from_slice(&values);
                row += 1;
            }

            if batch.kind() != GeometryKind::Point {
                groups.push(InstructionGroup {
                    start,
                    ends: geometry.ends.iter().map(|end| start + end).collect(),
                    closed: geometry.closed,
                });
            }
        }
    }

    RenderInstructions {
        kind: batch.kind(),
        stride,
        data,
        groups,
    }
}
