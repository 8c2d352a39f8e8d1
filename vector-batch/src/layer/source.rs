//! Mutations of a vector source, as delivered to
//! [`VectorLayerRenderer`](crate::layer::VectorLayerRenderer).

use crate::feature::{Feature, FeatureId};

#[derive(Debug, Clone)]
pub enum SourceEvent {
    Added(Feature),
    Changed(Feature),
    Deleted(FeatureId),
    Cleared,
}
