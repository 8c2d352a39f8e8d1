//! Features are owned by the application. Batches only keep shared snapshots of them.

use std::{collections::HashMap, fmt};

use geo_types::Geometry;
use serde::{Deserialize, Serialize};

/// Stable identity of a [`Feature`] within its source.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct FeatureId(pub u64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for FeatureId {
    fn from(id: u64) -> Self {
        FeatureId(id)
    }
}

/// The three kinds of geometries which are rendered by separate batch renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryKind {
    Polygon,
    LineString,
    Point,
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GeometryKind::Polygon => "polygon",
            GeometryKind::LineString => "line string",
            GeometryKind::Point => "point",
        })
    }
}

/// Returns the batch kind a geometry belongs to, or the name of the geometry type if it can not
/// be batched.
pub fn geometry_kind(geometry: &Geometry<f64>) -> Result<GeometryKind, &'static str> {
    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => Ok(GeometryKind::Point),
        Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
            Ok(GeometryKind::LineString)
        }
        Geometry::Polygon(_)
        | Geometry::MultiPolygon(_)
        | Geometry::Rect(_)
        | Geometry::Triangle(_) => Ok(GeometryKind::Polygon),
        Geometry::GeometryCollection(_) => Err("GeometryCollection"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl PropertyValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(number) => Some(*number),
            PropertyValue::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
            PropertyValue::String(value) => value.parse().ok(),
            PropertyValue::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => PropertyValue::Null,
            serde_json::Value::Bool(value) => PropertyValue::Bool(value),
            serde_json::Value::Number(number) => {
                number.as_f64().map_or(PropertyValue::Null, PropertyValue::Number)
            }
            serde_json::Value::String(value) => PropertyValue::String(value),
            other => PropertyValue::String(other.to_string()),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_owned())
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

/// A map feature: identity, optional geometry and style relevant properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feature {
    id: FeatureId,
    geometry: Option<Geometry<f64>>,
    properties: HashMap<String, PropertyValue>,
}

impl Feature {
    pub fn new(id: u64, geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            id: FeatureId(id),
            geometry: Some(geometry.into()),
            properties: HashMap::new(),
        }
    }

    pub fn without_geometry(id: u64) -> Self {
        Self {
            id: FeatureId(id),
            geometry: None,
            properties: HashMap::new(),
        }
    }

    pub fn with_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: HashMap<String, PropertyValue>) -> Self {
        self.properties = properties;
        self
    }

    pub fn id(&self) -> FeatureId {
        self.id
    }

    pub fn geometry(&self) -> Option<&Geometry<f64>> {
        self.geometry.as_ref()
    }

    pub fn properties(&self) -> &HashMap<String, PropertyValue> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}
