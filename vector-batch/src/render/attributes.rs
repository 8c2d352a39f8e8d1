//! Custom attributes interleave per feature values into the vertex data.

use std::{fmt, sync::Arc};

use crate::feature::Feature;

pub type AttributeCallback = Arc<dyn Fn(&Feature) -> AttributeValue + Send + Sync>;
/// Per feature style value read by the default programs.
pub type StyleCallback<T> = Arc<dyn Fn(&Feature) -> T + Send + Sync>;

/// Value returned by the callback of a [`CustomAttribute`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Scalar(f32),
    Array(Vec<f32>),
}

impl AttributeValue {
    pub fn components(&self) -> &[f32] {
        match self {
            AttributeValue::Scalar(value) => std::slice::from_ref(value),
            AttributeValue::Array(values) => values,
        }
    }
}

impl From<f32> for AttributeValue {
    fn from(value: f32) -> Self {
        AttributeValue::Scalar(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Scalar(value as f32)
    }
}

impl<const N: usize> From<[f32; N]> for AttributeValue {
    fn from(values: [f32; N]) -> Self {
        AttributeValue::Array(values.to_vec())
    }
}

impl From<Vec<f32>> for AttributeValue {
    fn from(values: Vec<f32>) -> Self {
        AttributeValue::Array(values)
    }
}

/// A named vertex attribute with 1 to 4 components whose value is computed per feature.
#[derive(Clone)]
pub struct CustomAttribute {
    name: String,
    size: usize,
    callback: AttributeCallback,
}

impl fmt::Debug for CustomAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomAttribute")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl CustomAttribute {
    /// # Panics
    ///
    /// If `size` is not within `1..=4`.
    pub fn new<F>(name: impl Into<String>, size: usize, callback: F) -> Self
    where
        F: Fn(&Feature) -> AttributeValue + Send + Sync + 'static,
    {
        let name = name.into();
        if !(1..=4).contains(&size) {
            panic!("custom attribute {name} has size {size}, only 1 to 4 components are supported");
        }
        Self {
            name,
            size,
            callback: Arc::new(callback),
        }
    }

    /// A single component attribute.
    pub fn scalar<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&Feature) -> f32 + Send + Sync + 'static,
    {
        Self::new(name, 1, move |feature| AttributeValue::Scalar(callback(feature)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Name of the attribute within the shaders.
    pub fn shader_name(&self) -> String {
        format!("a_{}", self.name)
    }

    pub fn value(&self, feature: &Feature) -> AttributeValue {
        (self.callback)(feature)
    }
}

/// Number of components all `attributes` occupy in a row.
pub fn attributes_size(attributes: &[CustomAttribute]) -> usize {
    attributes.iter().map(CustomAttribute::size).sum()
}

/// Writes the values of all `attributes` for `feature` into `out` starting at `index`.
/// Returns the number of slots written.
///
/// # Panics
///
/// If a callback returns a component count different from the declared size.
pub fn push_custom_attributes(
    attributes: &[CustomAttribute],
    feature: &Feature,
    out: &mut [f32],
    index: usize,
) -> usize {
    let mut cursor = index;
    for attribute in attributes {
        let value = attribute.value(feature);
        let components = value.components();
        if components.len() != attribute.size {
            panic!(
                "custom attribute {} declares {} components but returned {} for feature {}",
                attribute.name,
                attribute.size,
                components.len(),
                feature.id()
            );
        }
        out[cursor..cursor + components.len()].copy_from_slice(components);
        cursor += components.len();
    }
    cursor - index
}

/// Layout entry of an interleaved vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescription {
    pub name: String,
    pub size: usize,
}

impl AttributeDescription {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Packs a color into two floats: `[256 * r + g, 256 * b + round(255 * a)]`.
pub fn pack_color(color: &csscolorparser::Color) -> [f32; 2] {
    let [r, g, b, _] = color.to_rgba8();
    let a = (color.a.clamp(0.0, 1.0) * 255.0).round() as f32;
    [
        256.0 * r as f32 + g as f32,
        256.0 * b as f32 + a,
    ]
}
