//! Default shader programs and the attributes they read.

use crate::{
    feature::GeometryKind,
    render::attributes::{pack_color, AttributeValue, CustomAttribute, StyleCallback},
};

pub const FILL_VERTEX_SHADER: &str = include_str!("fill.vertex.glsl");
pub const FILL_FRAGMENT_SHADER: &str = include_str!("fill.fragment.glsl");
pub const STROKE_VERTEX_SHADER: &str = include_str!("stroke.vertex.glsl");
pub const STROKE_FRAGMENT_SHADER: &str = include_str!("stroke.fragment.glsl");
pub const POINT_VERTEX_SHADER: &str = include_str!("point.vertex.glsl");
pub const POINT_FRAGMENT_SHADER: &str = include_str!("point.fragment.glsl");

pub const DEFAULT_FILL_COLOR: &str = "#ddd";
pub const DEFAULT_STROKE_COLOR: &str = "#eee";
pub const DEFAULT_STROKE_WIDTH: f32 = 1.5;
pub const DEFAULT_POINT_COLOR: &str = "#eee";
pub const DEFAULT_POINT_SIZE: f32 = 9.0;

/// Vertex and fragment shader of the default program for `kind`.
pub fn default_sources(kind: GeometryKind) -> (&'static str, &'static str) {
    match kind {
        GeometryKind::Polygon => (FILL_VERTEX_SHADER, FILL_FRAGMENT_SHADER),
        GeometryKind::LineString => (STROKE_VERTEX_SHADER, STROKE_FRAGMENT_SHADER),
        GeometryKind::Point => (POINT_VERTEX_SHADER, POINT_FRAGMENT_SHADER),
    }
}

/// Attributes of the default programs: `color`, then `width` for strokes or `size` for points,
/// then `opacity`. `color` and `width` are evaluated per feature.
pub fn default_attributes(
    kind: GeometryKind,
    color: &StyleCallback<csscolorparser::Color>,
    width: &StyleCallback<f32>,
) -> Vec<CustomAttribute> {
    let color = color.clone();
    let mut attributes = vec![CustomAttribute::new("color", 2, move |feature| {
        AttributeValue::from(pack_color(&color(feature)))
    })];
    let width = width.clone();
    match kind {
        GeometryKind::Polygon => {}
        GeometryKind::LineString => {
            attributes.push(CustomAttribute::scalar("width", move |feature| width(feature)));
        }
        GeometryKind::Point => {
            attributes.push(CustomAttribute::scalar("size", move |feature| width(feature)));
        }
    }
    attributes.push(CustomAttribute::scalar("opacity", |_| 1.0));
    attributes
}
