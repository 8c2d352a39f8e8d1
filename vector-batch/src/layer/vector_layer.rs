//! Draws the features of a single vector source.

use std::sync::Arc;

use crate::{
    batch::mixed::MixedGeometryBatch,
    coords::HALF_WORLD_SIZE,
    error::Result,
    feature::GeometryKind,
    io::worker::BufferWorker,
    layer::{frame_state::FrameState, options::VectorLayerOptions, source::SourceEvent},
    render::{
        batch_renderer::{BatchRenderers, LayerBuffers, RebuildOutcome, DRAW_ORDER},
        helper::DrawHelper,
        transform::Transform,
        uniforms::FrameUniforms,
    },
    util::{math::Extent, ChangeObserver},
};

/// Keeps the buffers of a vector source in sync with its features and draws them.
///
/// Source mutations only touch the batches. Buffers are rebuilt while preparing a frame, once
/// the view is idle, so panning and zooming reuse the current buffers with an updated
/// projection.
pub struct VectorLayerRenderer<H: DrawHelper> {
    helper: H,
    options: VectorLayerOptions,
    worker: Arc<dyn BufferWorker>,
    renderers: BatchRenderers<H::Program>,
    batch: MixedGeometryBatch,
    buffers: LayerBuffers<H::Buffer>,
    extent: ChangeObserver<Extent>,
    /// Batch revision of the last rebuild.
    rebuilt_revision: Option<u64>,
    /// Time of the first rendered frame in milliseconds.
    start_time: Option<f64>,
}

impl<H: DrawHelper> VectorLayerRenderer<H> {
    pub fn new(
        mut helper: H,
        options: VectorLayerOptions,
        worker: Arc<dyn BufferWorker>,
    ) -> Result<Self> {
        let renderers = options
            .programs
            .build(&mut helper, &worker, &options.attributes)?;
        helper.set_post_processes(&options.post_processes);
        Ok(Self {
            helper,
            options,
            worker,
            renderers,
            batch: MixedGeometryBatch::new(),
            buffers: LayerBuffers::default(),
            extent: ChangeObserver::default(),
            rebuilt_revision: None,
            start_time: None,
        })
    }

    pub fn helper(&self) -> &H {
        &self.helper
    }

    pub fn helper_mut(&mut self) -> &mut H {
        &mut self.helper
    }

    pub fn options(&self) -> &VectorLayerOptions {
        &self.options
    }

    pub fn batch(&self) -> &MixedGeometryBatch {
        &self.batch
    }

    pub fn buffers(&self) -> &LayerBuffers<H::Buffer> {
        &self.buffers
    }

    /// Applies a mutation of the source. The buffers are rebuilt by the next idle frame.
    pub fn handle_source_event(&mut self, event: SourceEvent) -> Result<()> {
        match event {
            SourceEvent::Added(feature) | SourceEvent::Changed(feature) => {
                self.batch.add_or_update(feature)?;
            }
            SourceEvent::Deleted(id) => {
                self.batch.remove(id);
            }
            SourceEvent::Cleared => self.batch.clear(),
        }
        Ok(())
    }

    /// Whether the batches changed since the last rebuild.
    pub fn is_stale(&self) -> bool {
        self.rebuilt_revision != Some(self.batch.revision())
    }

    /// Rebuilds the buffers if the source or the extent changed and the view is idle, then
    /// picks up finished buffers.
    ///
    /// Returns whether new buffers became current, in which case another frame should be
    /// rendered.
    #[tracing::instrument(skip_all)]
    pub fn prepare_frame(&mut self, frame: &FrameState) -> Result<bool> {
        *self.extent = frame.extent;
        let extent_changed = self.extent.did_change(frame.view.resolution / 2.0);

        if frame.is_idle() && (self.is_stale() || extent_changed) {
            self.rebuild(frame)?;
        }
        Ok(self.buffers.poll(&mut self.helper))
    }

    fn rebuild(&mut self, frame: &FrameState) -> Result<()> {
        let transform = Transform::projection(frame);
        for kind in DRAW_ORDER {
            self.renderers.get(kind).rebuild(
                self.buffers.get_mut(kind),
                self.batch.batch(kind),
                &transform,
                move |outcome| {
                    if let RebuildOutcome::Failed(e) = outcome {
                        log::warn!("keeping previous {kind} buffers: {e}");
                    }
                },
            )?;
        }
        self.rebuilt_revision = Some(self.batch.revision());
        self.extent.update_reference();
        Ok(())
    }

    /// Draws fills, then strokes, then points, once per visible world copy.
    #[tracing::instrument(skip_all)]
    pub fn render_frame(&mut self, frame: &FrameState) -> Result<H::Target> {
        let start_time = *self.start_time.get_or_insert(frame.time);
        let elapsed = ((frame.time - start_time) / 1000.0) as f32;
        let uniforms = FrameUniforms::new(
            frame,
            elapsed,
            &frame.extent,
            frame.opacity,
            &self.options.uniforms,
        );

        self.helper.prepare_draw(frame);
        for kind in DRAW_ORDER {
            self.renderers
                .get(kind)
                .pre_render(self.buffers.get_mut(kind), frame);
        }

        let world_width = 2.0 * HALF_WORLD_SIZE;
        for world in frame.worlds() {
            let offset_x = world as f64 * world_width;
            for kind in DRAW_ORDER {
                self.renderers.get(kind).render(
                    &mut self.helper,
                    self.buffers.get(kind),
                    &uniforms,
                    offset_x,
                )?;
            }
        }
        Ok(self.helper.finalize_draw(frame))
    }

    /// Whether the buffers of the latest rebuild are current for all geometry kinds.
    pub fn ready(&self) -> bool {
        self.buffers.is_ready()
    }

    /// Number of triangles currently drawn for `kind`.
    pub fn primitive_count(&self, kind: GeometryKind) -> usize {
        self.buffers.get(kind).primitive_count()
    }

    /// Recompiles the programs with new options and rebuilds all buffers on the next frame.
    pub fn reset(&mut self, options: VectorLayerOptions) -> Result<()> {
        self.buffers.release(&mut self.helper);
        self.renderers = options
            .programs
            .build(&mut self.helper, &self.worker, &options.attributes)?;
        self.helper.set_post_processes(&options.post_processes);
        self.options = options;
        self.rebuilt_revision = None;
        self.extent.reset_reference();
        Ok(())
    }

    /// Releases all buffers and hands the helper back.
    pub fn dispose(mut self) -> H {
        self.buffers.release(&mut self.helper);
        self.helper
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use geo_types::{line_string, point, polygon};

    use crate::{
        coords::HALF_WORLD_SIZE,
        feature::{Feature, FeatureId, GeometryKind},
        io::worker::InlineWorker,
        layer::{
            frame_state::{FrameState, ViewHints, ViewState},
            options::{ShaderProgram, VectorLayerOptions},
            source::SourceEvent,
            vector_layer::VectorLayerRenderer,
        },
        render::uniforms::{UniformValue, PROJECTION_MATRIX, TIME},
        testing::{ManualWorker, RecordingHelper},
    };

    fn layer() -> VectorLayerRenderer<RecordingHelper> {
        VectorLayerRenderer::new(
            RecordingHelper::default(),
            VectorLayerOptions::default(),
            Arc::new(InlineWorker),
        )
        .unwrap()
    }

    fn frame() -> FrameState {
        FrameState::new(ViewState::new([0.0, 0.0], 1.0, 0.0, 2.0), [200.0, 100.0])
    }

    fn add_features(layer: &mut VectorLayerRenderer<RecordingHelper>) {
        let features = [
            Feature::new(
                1,
                polygon![(x: 0., y: 0.), (x: 10., y: 0.), (x: 10., y: 10.), (x: 0., y: 10.)],
            ),
            Feature::new(2, line_string![(x: -20., y: 0.), (x: -10., y: 5.), (x: 0., y: 20.)]),
            Feature::new(3, point!(x: 5.0, y: -5.0)),
        ];
        for feature in features {
            layer
                .handle_source_event(SourceEvent::Added(feature))
                .unwrap();
        }
    }

    #[test]
    fn test_draw_order() {
        let mut layer = layer();
        add_features(&mut layer);

        assert!(layer.prepare_frame(&frame()).unwrap());
        assert!(layer.ready());
        let draws = layer.render_frame(&frame()).unwrap();

        let programs: Vec<_> = draws.iter().map(|draw| draw.program).collect();
        assert_eq!(programs, vec![0, 1, 2]);
        assert_eq!(layer.primitive_count(GeometryKind::Polygon), 2);
        // Polygon outline (4 segments) and the line string (2 segments).
        assert_eq!(layer.primitive_count(GeometryKind::LineString), 12);
        assert_eq!(layer.primitive_count(GeometryKind::Point), 2);
    }

    #[test]
    fn test_rebuild_only_when_idle_and_changed() {
        let mut layer = layer();
        add_features(&mut layer);

        let animating = frame().with_hints(ViewHints {
            animating: true,
            interacting: false,
        });
        assert!(!layer.prepare_frame(&animating).unwrap());
        assert_eq!(layer.buffers().get(GeometryKind::Point).generation(), 0);

        layer.prepare_frame(&frame()).unwrap();
        layer.prepare_frame(&frame()).unwrap();
        assert_eq!(layer.buffers().get(GeometryKind::Point).generation(), 1);

        // Panning changes the extent.
        let panned = FrameState::new(ViewState::new([50.0, 0.0], 1.0, 0.0, 2.0), [200.0, 100.0]);
        layer.prepare_frame(&panned).unwrap();
        assert_eq!(layer.buffers().get(GeometryKind::Point).generation(), 2);

        layer
            .handle_source_event(SourceEvent::Deleted(FeatureId(3)))
            .unwrap();
        assert!(layer.is_stale());
        layer.prepare_frame(&panned).unwrap();
        assert_eq!(layer.primitive_count(GeometryKind::Point), 0);
    }

    #[test]
    fn test_buffers_follow_the_view() {
        let mut layer = layer();
        layer
            .handle_source_event(SourceEvent::Added(Feature::new(1, point!(x: 50.0, y: 0.0))))
            .unwrap();
        layer.prepare_frame(&frame()).unwrap();

        let zoomed = frame()
            .with_hints(ViewHints {
                animating: true,
                interacting: false,
            })
            .with_time(500.0);
        layer.prepare_frame(&zoomed).unwrap();
        let zoomed = FrameState {
            view: ViewState::new([0.0, 0.0], 0.5, 0.0, 3.0),
            ..zoomed
        };
        let draws = layer.render_frame(&zoomed).unwrap();

        let UniformValue::Mat4(matrix) = draws[0].uniform(PROJECTION_MATRIX)
        else {
            panic!("projection matrix missing");
        };
        // Half the resolution doubles the scale.
        assert!((matrix[0] - 2.0).abs() < 1e-6);
        assert_eq!(layer.buffers().get(GeometryKind::Point).generation(), 1);
    }

    #[test]
    fn test_wrap_x_draws_every_world() {
        let mut layer = layer();
        add_features(&mut layer);

        let view = ViewState::new([HALF_WORLD_SIZE, 0.0], HALF_WORLD_SIZE / 100.0, 0.0, 0.0);
        let frame = FrameState::new(view, [100.0, 100.0]).with_wrap_x(true);
        assert_eq!(frame.worlds(), 0..=1);

        layer.prepare_frame(&frame).unwrap();
        let draws = layer.render_frame(&frame).unwrap();
        assert_eq!(draws.len(), 6);
        assert_eq!(draws[0].program, draws[3].program);
        assert_ne!(
            draws[0].uniform(PROJECTION_MATRIX),
            draws[3].uniform(PROJECTION_MATRIX)
        );
    }

    #[test]
    fn test_elapsed_time_uniform() {
        let mut layer = layer();
        add_features(&mut layer);
        layer.prepare_frame(&frame()).unwrap();

        layer.render_frame(&frame().with_time(1000.0)).unwrap();
        let draws = layer.render_frame(&frame().with_time(3000.0)).unwrap();
        assert_eq!(draws[0].float(TIME), 2.0);
    }

    #[test]
    fn test_clear_while_rebuilding() {
        let worker = ManualWorker::default();
        let mut layer = VectorLayerRenderer::new(
            RecordingHelper::default(),
            VectorLayerOptions::default(),
            Arc::new(worker.clone()),
        )
        .unwrap();
        add_features(&mut layer);
        layer.prepare_frame(&frame()).unwrap();
        assert_eq!(worker.len(), 3);

        layer.handle_source_event(SourceEvent::Cleared).unwrap();
        layer.prepare_frame(&frame()).unwrap();
        worker.run_all();
        layer.prepare_frame(&frame()).unwrap();

        assert!(layer.ready());
        assert!(layer.render_frame(&frame()).unwrap().is_empty());
        assert_eq!(layer.helper().live_buffers(), 0);
    }

    #[test]
    fn test_reset() {
        let mut layer = layer();
        add_features(&mut layer);
        layer.prepare_frame(&frame()).unwrap();
        assert!(layer.ready());

        let options = VectorLayerOptions::default().with_point(ShaderProgram::custom(
            "void main() {}",
            "void main() {}",
            vec![],
        ));
        layer.reset(options).unwrap();
        assert!(!layer.ready());
        assert_eq!(layer.helper().programs.len(), 6);
        assert_eq!(layer.helper().live_buffers(), 0);

        layer.prepare_frame(&frame()).unwrap();
        assert!(layer.ready());
        let draws = layer.render_frame(&frame()).unwrap();
        let programs: Vec<_> = draws.iter().map(|draw| draw.program).collect();
        assert_eq!(programs, vec![3, 4, 5]);
        assert!(draws[2].layout.iter().all(|attribute| attribute.name != "a_color"));

        let helper = layer.dispose();
        assert_eq!(helper.live_buffers(), 0);
    }
}
