//! Fixtures for measuring the pipeline without a GPU.

use geo_types::{line_string, point, polygon};
use geozero::mvt::{tile, Message, Tile};

use crate::{
    coords::EXTENT_UINT,
    feature::Feature,
    layer::frame_state::FrameState,
    render::{
        attributes::AttributeDescription,
        helper::{BufferTarget, DrawHelper, HelperError, PostProcess},
        uniforms::UniformValue,
    },
};

/// A [`DrawHelper`] which accepts everything and draws nothing.
#[derive(Debug, Default)]
pub struct NullHelper {
    next_buffer: u32,
    /// Bytes uploaded so far.
    pub uploaded: usize,
    pub draws: usize,
}

impl DrawHelper for NullHelper {
    type Program = ();
    type Buffer = u32;
    type Target = usize;

    fn compile_program(
        &mut self,
        _vertex_shader: &str,
        _fragment_shader: &str,
    ) -> Result<(), HelperError> {
        Ok(())
    }

    fn create_buffer(&mut self, _target: BufferTarget, data: &[u8]) -> Result<u32, HelperError> {
        self.next_buffer += 1;
        self.uploaded += data.len();
        Ok(self.next_buffer)
    }

    fn delete_buffer(&mut self, _buffer: u32) {}

    fn set_post_processes(&mut self, _passes: &[PostProcess]) {}

    fn prepare_draw(&mut self, _frame: &FrameState) {
        self.draws = 0;
    }

    fn use_program(&mut self, _program: &()) {}

    fn bind_buffer(&mut self, _target: BufferTarget, _buffer: &u32) {}

    fn enable_attributes(&mut self, _layout: &[AttributeDescription]) {}

    fn set_uniform(&mut self, _name: &str, _value: &UniformValue) {}

    fn draw_elements(&mut self, _start: usize, _end: usize) -> Result<(), HelperError> {
        self.draws += 1;
        Ok(())
    }

    fn finalize_draw(&mut self, _frame: &FrameState) -> usize {
        self.draws
    }
}

/// A polygon with a hole, a line string and a point for every cell of a `size` x `size` grid
/// of 100 meter cells.
pub fn grid_features(size: u32) -> Vec<Feature> {
    let mut features = Vec::with_capacity((size * size * 3) as usize);
    for row in 0..size {
        for column in 0..size {
            let x = column as f64 * 100.0;
            let y = row as f64 * 100.0;
            let id = features.len() as u64;
            features.push(Feature::new(
                id,
                polygon!(
                    exterior: [
                        (x: x, y: y),
                        (x: x + 80.0, y: y),
                        (x: x + 80.0, y: y + 80.0),
                        (x: x, y: y + 80.0),
                    ],
                    interiors: [[
                        (x: x + 20.0, y: y + 20.0),
                        (x: x + 60.0, y: y + 20.0),
                        (x: x + 60.0, y: y + 60.0),
                        (x: x + 20.0, y: y + 60.0),
                    ]],
                ),
            ));
            features.push(Feature::new(
                id + 1,
                line_string![
                    (x: x, y: y + 90.0),
                    (x: x + 30.0, y: y + 95.0),
                    (x: x + 60.0, y: y + 90.0),
                    (x: x + 90.0, y: y + 95.0),
                ],
            ));
            features.push(Feature::new(id + 2, point!(x: x + 90.0, y: y + 10.0)));
        }
    }
    features
}

/// Zigzag encoding of MVT parameter integers.
pub fn zigzag(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// An MVT command integer.
pub fn command(id: u32, count: u32) -> u32 {
    (id & 0x7) | (count << 3)
}

/// Encodes a tile with one layer holding a square and a point for every cell of a
/// `size` x `size` grid.
pub fn encode_grid_tile(size: u32) -> Vec<u8> {
    let cell = (EXTENT_UINT / size) as i32;
    let side = cell / 2;
    let mut features = Vec::new();
    for row in 0..size as i32 {
        for column in 0..size as i32 {
            let (x, y) = (column * cell, row * cell);
            features.push(tile::Feature {
                id: Some(features.len() as u64),
                tags: vec![],
                r#type: Some(tile::GeomType::Polygon as i32),
                geometry: vec![
                    command(1, 1),
                    zigzag(x),
                    zigzag(y),
                    command(2, 3),
                    zigzag(side),
                    zigzag(0),
                    zigzag(0),
                    zigzag(side),
                    zigzag(-side),
                    zigzag(0),
                    command(7, 1),
                ],
            });
            features.push(tile::Feature {
                id: Some(features.len() as u64),
                tags: vec![],
                r#type: Some(tile::GeomType::Point as i32),
                geometry: vec![command(1, 1), zigzag(x + side + 1), zigzag(y + side + 1)],
            });
        }
    }

    Tile {
        layers: vec![tile::Layer {
            version: 2,
            name: "grid".to_owned(),
            features,
            keys: vec![],
            values: vec![],
            extent: Some(EXTENT_UINT),
        }],
    }
    .encode_to_vec()
}
