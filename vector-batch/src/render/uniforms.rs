//! Uniforms shared by all programs of a layer.

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    layer::frame_state::FrameState,
    render::{helper::DrawHelper, transform::Transform},
    util::math::Extent,
};

pub const PROJECTION_MATRIX: &str = "u_projectionMatrix";
pub const OFFSET_SCALE_MATRIX: &str = "u_offsetScaleMatrix";
pub const OFFSET_ROTATION_MATRIX: &str = "u_offsetRotateMatrix";
pub const TIME: &str = "u_time";
pub const ZOOM: &str = "u_zoom";
pub const RESOLUTION: &str = "u_resolution";
pub const RENDER_EXTENT: &str = "u_renderExtent";
pub const GLOBAL_ALPHA: &str = "u_globalAlpha";
pub const VIEWPORT_SIZE_PX: &str = "u_viewportSizePx";
pub const PIXEL_RATIO: &str = "u_pixelRatio";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4([f32; 16]),
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(value: [f32; 2]) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        UniformValue::Vec4(value)
    }
}

pub type UniformCallback = Arc<dyn Fn(&FrameState) -> UniformValue + Send + Sync>;

/// A user uniform, either constant or computed for every frame.
#[derive(Clone)]
pub enum Uniform {
    Value(UniformValue),
    Dynamic(UniformCallback),
}

impl fmt::Debug for Uniform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uniform::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Uniform::Dynamic(_) => f.write_str("Dynamic"),
        }
    }
}

impl Uniform {
    pub fn dynamic<F>(callback: F) -> Self
    where
        F: Fn(&FrameState) -> UniformValue + Send + Sync + 'static,
    {
        Uniform::Dynamic(Arc::new(callback))
    }

    pub fn resolve(&self, frame: &FrameState) -> UniformValue {
        match self {
            Uniform::Value(value) => value.clone(),
            Uniform::Dynamic(callback) => callback(frame),
        }
    }
}

impl From<UniformValue> for Uniform {
    fn from(value: UniformValue) -> Self {
        Uniform::Value(value)
    }
}

pub type Uniforms = BTreeMap<String, Uniform>;

/// Every uniform value of a draw except the projection matrix, which depends on the buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUniforms {
    values: Vec<(String, UniformValue)>,
}

impl FrameUniforms {
    /// `elapsed` is the time since the first frame of the layer in seconds.
    pub fn new(
        frame: &FrameState,
        elapsed: f32,
        render_extent: &Extent,
        global_alpha: f32,
        uniforms: &Uniforms,
    ) -> Self {
        let view = &frame.view;
        let [width, height] = frame.size;
        let offset_scale = Transform::scale(2.0 / width, 2.0 / height);
        let offset_rotation = Transform::rotation(-view.rotation);

        let mut values = vec![
            (OFFSET_SCALE_MATRIX.to_owned(), UniformValue::Mat4(offset_scale.to_mat4())),
            (OFFSET_ROTATION_MATRIX.to_owned(), UniformValue::Mat4(offset_rotation.to_mat4())),
            (TIME.to_owned(), UniformValue::Float(elapsed)),
            (ZOOM.to_owned(), UniformValue::Float(view.zoom as f32)),
            (RESOLUTION.to_owned(), UniformValue::Float(view.resolution as f32)),
            (RENDER_EXTENT.to_owned(), UniformValue::Vec4(render_extent.to_array())),
            (GLOBAL_ALPHA.to_owned(), UniformValue::Float(global_alpha)),
            (
                VIEWPORT_SIZE_PX.to_owned(),
                UniformValue::Vec2([width as f32, height as f32]),
            ),
            (PIXEL_RATIO.to_owned(), UniformValue::Float(frame.pixel_ratio as f32)),
        ];
        values.extend(
            uniforms
                .iter()
                .map(|(name, uniform)| (name.clone(), uniform.resolve(frame))),
        );
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values
            .iter()
            .find(|(uniform, _)| uniform == name)
            .map(|(_, value)| value)
    }

    pub fn apply<H: DrawHelper>(&self, helper: &mut H) {
        for (name, value) in &self.values {
            helper.set_uniform(name, value);
        }
    }
}
