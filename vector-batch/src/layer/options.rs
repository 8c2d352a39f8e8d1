//! Construction options of the layer renderers.

use std::{fmt, sync::Arc};

use crate::{
    error::Result,
    feature::{Feature, GeometryKind},
    io::worker::BufferWorker,
    render::{
        attributes::{CustomAttribute, StyleCallback},
        batch_renderer::{BatchRenderer, BatchRenderers},
        helper::{DrawHelper, PostProcess},
        shaders::{
            default_attributes, default_sources, DEFAULT_FILL_COLOR, DEFAULT_POINT_COLOR,
            DEFAULT_POINT_SIZE, DEFAULT_STROKE_COLOR, DEFAULT_STROKE_WIDTH,
        },
        uniforms::{Uniform, Uniforms},
    },
    tile::tile_geometry::ReadinessPolicy,
};

/// The program drawing one geometry kind.
#[derive(Clone)]
pub enum ShaderProgram {
    /// The built-in shaders with per feature style callbacks. `width` is the stroke width for
    /// strokes and the point size for points, it is ignored for fills.
    Default {
        color: StyleCallback<csscolorparser::Color>,
        width: StyleCallback<f32>,
    },
    Custom {
        vertex_shader: String,
        fragment_shader: String,
        attributes: Vec<CustomAttribute>,
    },
}

impl fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderProgram::Default { .. } => f.debug_struct("Default").finish_non_exhaustive(),
            ShaderProgram::Custom { attributes, .. } => f
                .debug_struct("Custom")
                .field("attributes", attributes)
                .finish_non_exhaustive(),
        }
    }
}

impl ShaderProgram {
    pub fn default_for(kind: GeometryKind) -> Self {
        let (color, width) = match kind {
            GeometryKind::Polygon => (DEFAULT_FILL_COLOR, 0.0),
            GeometryKind::LineString => (DEFAULT_STROKE_COLOR, DEFAULT_STROKE_WIDTH),
            GeometryKind::Point => (DEFAULT_POINT_COLOR, DEFAULT_POINT_SIZE),
        };
        Self::constant(csscolorparser::parse(color).unwrap_or_default(), width)
    }

    /// Default shaders with the same color and width for every feature.
    pub fn constant(color: csscolorparser::Color, width: f32) -> Self {
        Self::styled(move |_| color.clone(), move |_| width)
    }

    /// Default shaders styled by feature.
    pub fn styled<C, W>(color: C, width: W) -> Self
    where
        C: Fn(&Feature) -> csscolorparser::Color + Send + Sync + 'static,
        W: Fn(&Feature) -> f32 + Send + Sync + 'static,
    {
        ShaderProgram::Default {
            color: Arc::new(color),
            width: Arc::new(width),
        }
    }

    pub fn custom(
        vertex_shader: impl Into<String>,
        fragment_shader: impl Into<String>,
        attributes: Vec<CustomAttribute>,
    ) -> Self {
        ShaderProgram::Custom {
            vertex_shader: vertex_shader.into(),
            fragment_shader: fragment_shader.into(),
            attributes,
        }
    }

    /// Compiles the program and creates the renderer of `kind` for it. Custom programs get
    /// the `shared` attributes appended to their own.
    pub fn build<H: DrawHelper>(
        &self,
        helper: &mut H,
        kind: GeometryKind,
        worker: Arc<dyn BufferWorker>,
        shared: &[CustomAttribute],
    ) -> Result<BatchRenderer<H::Program>> {
        match self {
            ShaderProgram::Default { color, width } => {
                let (vertex_shader, fragment_shader) = default_sources(kind);
                BatchRenderer::new(
                    helper,
                    kind,
                    vertex_shader,
                    fragment_shader,
                    default_attributes(kind, color, width),
                    worker,
                )
            }
            ShaderProgram::Custom {
                vertex_shader,
                fragment_shader,
                attributes,
            } => BatchRenderer::new(
                helper,
                kind,
                vertex_shader,
                fragment_shader,
                attributes.iter().chain(shared).cloned().collect(),
                worker,
            ),
        }
    }
}

/// Programs of the three geometry kinds of a layer.
#[derive(Debug, Clone)]
pub struct LayerPrograms {
    pub fill: ShaderProgram,
    pub stroke: ShaderProgram,
    pub point: ShaderProgram,
}

impl Default for LayerPrograms {
    fn default() -> Self {
        Self {
            fill: ShaderProgram::default_for(GeometryKind::Polygon),
            stroke: ShaderProgram::default_for(GeometryKind::LineString),
            point: ShaderProgram::default_for(GeometryKind::Point),
        }
    }
}

impl LayerPrograms {
    pub fn build<H: DrawHelper>(
        &self,
        helper: &mut H,
        worker: &Arc<dyn BufferWorker>,
        shared: &[CustomAttribute],
    ) -> Result<BatchRenderers<H::Program>> {
        Ok(BatchRenderers {
            fill: self
                .fill
                .build(helper, GeometryKind::Polygon, worker.clone(), shared)?,
            stroke: self
                .stroke
                .build(helper, GeometryKind::LineString, worker.clone(), shared)?,
            point: self
                .point
                .build(helper, GeometryKind::Point, worker.clone(), shared)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct VectorLayerOptions {
    pub programs: LayerPrograms,
    /// Attributes available to every custom program of the layer.
    pub attributes: Vec<CustomAttribute>,
    pub uniforms: Uniforms,
    pub post_processes: Vec<PostProcess>,
}

impl VectorLayerOptions {
    pub fn with_fill(mut self, program: ShaderProgram) -> Self {
        self.programs.fill = program;
        self
    }

    pub fn with_stroke(mut self, program: ShaderProgram) -> Self {
        self.programs.stroke = program;
        self
    }

    pub fn with_point(mut self, program: ShaderProgram) -> Self {
        self.programs.point = program;
        self
    }

    pub fn with_attribute(mut self, attribute: CustomAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_uniform(mut self, name: impl Into<String>, uniform: impl Into<Uniform>) -> Self {
        self.uniforms.insert(name.into(), uniform.into());
        self
    }

    pub fn with_post_process(mut self, pass: PostProcess) -> Self {
        self.post_processes.push(pass);
        self
    }
}

pub const DEFAULT_CACHE_SIZE: usize = 512;
/// Fade-in duration of new tiles in milliseconds.
pub const DEFAULT_TRANSITION: f64 = 250.0;

#[derive(Debug, Clone)]
pub struct VectorTileLayerOptions {
    pub programs: LayerPrograms,
    /// Attributes available to every custom program of the layer.
    pub attributes: Vec<CustomAttribute>,
    pub uniforms: Uniforms,
    pub post_processes: Vec<PostProcess>,
    /// Number of tile representations kept around when they are not needed by a frame.
    pub cache_size: usize,
    /// Fade-in duration in milliseconds, `0` disables fading.
    pub transition: f64,
    pub readiness: ReadinessPolicy,
    /// Names of the MVT layers to decode, all layers if `None`.
    pub source_layers: Option<Vec<String>>,
}

impl Default for VectorTileLayerOptions {
    fn default() -> Self {
        Self {
            programs: LayerPrograms::default(),
            attributes: Vec::new(),
            uniforms: Uniforms::new(),
            post_processes: Vec::new(),
            cache_size: DEFAULT_CACHE_SIZE,
            transition: DEFAULT_TRANSITION,
            readiness: ReadinessPolicy::default(),
            source_layers: None,
        }
    }
}

impl VectorTileLayerOptions {
    pub fn with_fill(mut self, program: ShaderProgram) -> Self {
        self.programs.fill = program;
        self
    }

    pub fn with_stroke(mut self, program: ShaderProgram) -> Self {
        self.programs.stroke = program;
        self
    }

    pub fn with_point(mut self, program: ShaderProgram) -> Self {
        self.programs.point = program;
        self
    }

    pub fn with_attribute(mut self, attribute: CustomAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_uniform(mut self, name: impl Into<String>, uniform: impl Into<Uniform>) -> Self {
        self.uniforms.insert(name.into(), uniform.into());
        self
    }

    pub fn with_post_process(mut self, pass: PostProcess) -> Self {
        self.post_processes.push(pass);
        self
    }

    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    pub fn with_transition(mut self, transition: f64) -> Self {
        self.transition = transition;
        self
    }

    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn with_source_layers(mut self, layers: Vec<String>) -> Self {
        self.source_layers = Some(layers);
        self
    }
}
