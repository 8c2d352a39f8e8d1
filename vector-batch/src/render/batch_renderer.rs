//! Renders one [`GeometryBatch`] of a single geometry kind.
//!
//! Rebuilding is split in two steps. The render instructions are generated synchronously from
//! the batch, the buffers are generated by a [`BufferWorker`] and picked up by
//! [`BatchBuffers::poll`]. Only the most recently requested rebuild can replace the current
//! buffers.

use std::{
    fmt,
    sync::{
        mpsc::{channel, Receiver, Sender},
        Arc,
    },
};

use crate::{
    batch::{GeometryBatch, GeometryBatchItem},
    error::{Error, Result},
    feature::GeometryKind,
    io::worker::{BufferJob, BufferMessage, BufferWorker},
    layer::frame_state::FrameState,
    render::{
        attributes::{self, AttributeDescription, CustomAttribute},
        helper::{BufferTarget, DrawHelper},
        instructions::{self, RenderInstructions},
        transform::Transform,
        uniforms::{FrameUniforms, UniformValue, PROJECTION_MATRIX},
    },
    tessellation::{vertex_layout, GeneratedBuffers},
};

/// How a rebuild ended. Delivered exactly once per rebuild.
#[derive(Debug)]
pub enum RebuildOutcome {
    /// The buffers of the rebuild are current.
    Applied,
    /// A later rebuild was requested before this one completed.
    Superseded,
    /// The previous buffers stay current.
    Failed(Error),
}

impl RebuildOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, RebuildOutcome::Applied)
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, RebuildOutcome::Superseded)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RebuildOutcome::Failed(_))
    }
}

pub type RebuildCallback = Box<dyn FnOnce(RebuildOutcome)>;

struct PendingRebuild {
    generation: u64,
    transform: Transform,
    on_complete: RebuildCallback,
}

/// GPU buffers of one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedBuffers<B> {
    pub vertex: B,
    pub index: B,
    pub index_count: usize,
}

/// Output slot of a batch: the current buffers and the rebuild which may replace them.
pub struct BatchBuffers<B> {
    kind: GeometryKind,
    /// Latest requested generation.
    generation: u64,
    applied_generation: u64,
    pending: Option<PendingRebuild>,
    current: Option<UploadedBuffers<B>>,
    /// Transform the positions of the current buffers are expressed in.
    buffers_transform: Transform,
    inverse_buffers_transform: Transform,
    frame_projection: Transform,
    /// Buffers replaced without a helper at hand, deleted on the next poll.
    retired: Vec<B>,
    recycled: Vec<f32>,
    sender: Sender<BufferMessage>,
    receiver: Receiver<BufferMessage>,
}

impl<B: fmt::Debug> fmt::Debug for BatchBuffers<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchBuffers")
            .field("kind", &self.kind)
            .field("generation", &self.generation)
            .field("applied_generation", &self.applied_generation)
            .field("pending", &self.pending.as_ref().map(|p| p.generation))
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl<B> BatchBuffers<B> {
    pub fn new(kind: GeometryKind) -> Self {
        let (sender, receiver) = channel();
        Self {
            kind,
            generation: 0,
            applied_generation: 0,
            pending: None,
            current: None,
            buffers_transform: Transform::identity(),
            inverse_buffers_transform: Transform::identity(),
            frame_projection: Transform::identity(),
            retired: Vec::new(),
            recycled: Vec::new(),
            sender,
            receiver,
        }
    }

    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn applied_generation(&self) -> u64 {
        self.applied_generation
    }

    /// A rebuild was requested and the latest one is current.
    pub fn is_ready(&self) -> bool {
        self.generation > 0 && self.applied_generation == self.generation
    }

    /// No rebuild is in flight.
    pub fn is_settled(&self) -> bool {
        self.pending.is_none()
    }

    pub fn current(&self) -> Option<&UploadedBuffers<B>> {
        self.current.as_ref()
    }

    /// Triangles drawn by [`BatchRenderer::render`].
    pub fn primitive_count(&self) -> usize {
        self.current.as_ref().map_or(0, |buffers| buffers.index_count / 3)
    }

    pub fn buffers_transform(&self) -> &Transform {
        &self.buffers_transform
    }

    /// Maps the buffer positions to clip space for the last pre-rendered frame, shifted by
    /// `offset_x` world units.
    pub fn current_transform(&self, offset_x: f64) -> Transform {
        self.frame_projection
            .translate(offset_x, 0.0)
            .multiply(&self.inverse_buffers_transform)
    }

    fn set_buffers_transform(&mut self, transform: Transform) {
        self.inverse_buffers_transform = transform.invert().unwrap_or_else(|| {
            log::warn!("buffer transform {transform:?} is not invertible");
            Transform::identity()
        });
        self.buffers_transform = transform;
    }

    /// Starts a new generation and supersedes the pending one.
    fn begin(&mut self) -> u64 {
        if let Some(pending) = self.pending.take() {
            log::debug!("{} rebuild {} superseded", self.kind, pending.generation);
            (pending.on_complete)(RebuildOutcome::Superseded);
        }
        self.generation += 1;
        self.generation
    }

    /// Makes a generation without any primitives current.
    fn apply_empty(&mut self, generation: u64, transform: Transform) {
        if let Some(old) = self.current.take() {
            self.retired.push(old.vertex);
            self.retired.push(old.index);
        }
        self.set_buffers_transform(transform);
        self.applied_generation = generation;
    }

    fn recycle(&mut self, data: Vec<f32>) {
        if data.capacity() > self.recycled.capacity() {
            self.recycled = data;
        }
    }

    /// Receives finished buffers, uploads the ones of the pending generation and deletes
    /// replaced buffers. Returns whether new buffers became current.
    #[tracing::instrument(skip_all)]
    pub fn poll<H>(&mut self, helper: &mut H) -> bool
    where
        H: DrawHelper<Buffer = B>,
    {
        for buffer in self.retired.drain(..) {
            helper.delete_buffer(buffer);
        }

        let mut applied = false;
        while let Ok(message) = self.receiver.try_recv() {
            let BufferMessage {
                generation,
                instructions,
                result,
            } = message;
            self.recycle(instructions.data);

            let pending = match self.pending.take() {
                Some(pending) if pending.generation == generation => pending,
                other => {
                    log::debug!("dropping {} buffers of stale generation {generation}", self.kind);
                    self.pending = other;
                    continue;
                }
            };

            let outcome = match result.and_then(|buffers| upload(helper, &buffers)) {
                Ok(uploaded) => {
                    if let Some(old) = self.current.replace(uploaded) {
                        helper.delete_buffer(old.vertex);
                        helper.delete_buffer(old.index);
                    }
                    self.set_buffers_transform(pending.transform);
                    self.applied_generation = generation;
                    applied = true;
                    RebuildOutcome::Applied
                }
                Err(e) => {
                    log::error!("{} rebuild {generation} failed: {e}", self.kind);
                    RebuildOutcome::Failed(e)
                }
            };
            (pending.on_complete)(outcome);
        }
        applied
    }

    /// Deletes all buffers. A pending rebuild is superseded.
    pub fn release<H>(&mut self, helper: &mut H)
    where
        H: DrawHelper<Buffer = B>,
    {
        if let Some(pending) = self.pending.take() {
            (pending.on_complete)(RebuildOutcome::Superseded);
        }
        if let Some(old) = self.current.take() {
            helper.delete_buffer(old.vertex);
            helper.delete_buffer(old.index);
        }
        for buffer in self.retired.drain(..) {
            helper.delete_buffer(buffer);
        }
        // Generations keep counting so late replies of released jobs stay stale.
        self.applied_generation = 0;
    }
}

fn upload<H: DrawHelper>(
    helper: &mut H,
    buffers: &GeneratedBuffers,
) -> Result<UploadedBuffers<H::Buffer>> {
    let vertices = bytemuck::cast_slice(&buffers.vertices);
    let vertex = helper.create_buffer(BufferTarget::Vertex, vertices)?;
    let indices = bytemuck::cast_slice(&buffers.indices);
    let index = match helper.create_buffer(BufferTarget::Index, indices) {
        Ok(index) => index,
        Err(e) => {
            helper.delete_buffer(vertex);
            return Err(e.into());
        }
    };
    Ok(UploadedBuffers {
        vertex,
        index,
        index_count: buffers.indices.len(),
    })
}

/// Draws batches of one [`GeometryKind`] with one program.
pub struct BatchRenderer<P> {
    kind: GeometryKind,
    program: P,
    attributes: Vec<CustomAttribute>,
    layout: Vec<AttributeDescription>,
    worker: Arc<dyn BufferWorker>,
}

impl<P> BatchRenderer<P> {
    pub fn new<H>(
        helper: &mut H,
        kind: GeometryKind,
        vertex_shader: &str,
        fragment_shader: &str,
        attributes: Vec<CustomAttribute>,
        worker: Arc<dyn BufferWorker>,
    ) -> Result<Self>
    where
        H: DrawHelper<Program = P>,
    {
        let program = helper.compile_program(vertex_shader, fragment_shader)?;
        Ok(Self {
            kind,
            program,
            layout: vertex_layout(kind, &attributes),
            attributes,
            worker,
        })
    }

    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn attributes(&self) -> &[CustomAttribute] {
        &self.attributes
    }

    pub fn layout(&self) -> &[AttributeDescription] {
        &self.layout
    }

    pub fn generate_render_instructions(
        &self,
        batch: &GeometryBatch,
        transform: &Transform,
        recycled: Vec<f32>,
    ) -> RenderInstructions {
        instructions::generate_render_instructions(batch, transform, &self.attributes, recycled)
    }

    /// Writes the custom attributes of `item` at `index`, returns the number of slots written.
    pub fn push_custom_attributes(
        &self,
        item: &GeometryBatchItem,
        out: &mut [f32],
        index: usize,
    ) -> usize {
        attributes::push_custom_attributes(&self.attributes, &item.feature, out, index)
    }

    /// Regenerates the buffers of `slot` from `batch`, with positions expressed in `transform`.
    ///
    /// The current buffers of `slot` stay in use until the new ones are picked up by
    /// [`BatchBuffers::poll`]. `on_complete` is called exactly once, immediately if the batch
    /// is empty or the job could not be scheduled.
    pub fn rebuild<B>(
        &self,
        slot: &mut BatchBuffers<B>,
        batch: &GeometryBatch,
        transform: &Transform,
        on_complete: impl FnOnce(RebuildOutcome) + 'static,
    ) -> Result<u64> {
        if batch.kind() != self.kind || slot.kind != self.kind {
            return Err(Error::GeometryKindMismatch {
                expected: self.kind,
                found: if batch.kind() != self.kind {
                    batch.kind()
                } else {
                    slot.kind
                },
            });
        }

        let generation = slot.begin();
        let recycled = std::mem::take(&mut slot.recycled);
        let instructions = self.generate_render_instructions(batch, transform, recycled);

        if instructions.is_empty() {
            slot.recycle(instructions.data);
            slot.apply_empty(generation, *transform);
            on_complete(RebuildOutcome::Applied);
            return Ok(generation);
        }

        slot.pending = Some(PendingRebuild {
            generation,
            transform: *transform,
            on_complete: Box::new(on_complete),
        });
        let job = BufferJob::new(generation, instructions, slot.sender.clone());
        if let Err(e) = self.worker.post(job) {
            log::error!("scheduling {} rebuild {generation} failed: {e}", self.kind);
            if let Some(pending) = slot.pending.take() {
                (pending.on_complete)(RebuildOutcome::Failed(e.into()));
            }
        }
        Ok(generation)
    }

    /// Updates the frame projection of `slot` before rendering `frame`.
    pub fn pre_render<B>(&self, slot: &mut BatchBuffers<B>, frame: &FrameState) {
        slot.frame_projection = Transform::projection(frame);
    }

    /// Draws the current buffers of `slot`. Does nothing if there are none.
    pub fn render<H>(
        &self,
        helper: &mut H,
        slot: &BatchBuffers<H::Buffer>,
        uniforms: &FrameUniforms,
        offset_x: f64,
    ) -> Result<()>
    where
        H: DrawHelper<Program = P>,
    {
        let Some(buffers) = slot.current() else {
            return Ok(());
        };
        if buffers.index_count == 0 {
            return Ok(());
        }

        helper.use_program(&self.program);
        helper.bind_buffer(BufferTarget::Vertex, &buffers.vertex);
        helper.bind_buffer(BufferTarget::Index, &buffers.index);
        helper.enable_attributes(&self.layout);
        uniforms.apply(helper);
        helper.set_uniform(
            PROJECTION_MATRIX,
            &UniformValue::Mat4(slot.current_transform(offset_x).to_mat4()),
        );
        helper.draw_elements(0, buffers.index_count)?;
        Ok(())
    }
}

/// Draw order of the geometry kinds: fills below strokes below points.
pub const DRAW_ORDER: [GeometryKind; 3] = [
    GeometryKind::Polygon,
    GeometryKind::LineString,
    GeometryKind::Point,
];

/// The fill, stroke and point renderers of a layer.
pub struct BatchRenderers<P> {
    pub fill: BatchRenderer<P>,
    pub stroke: BatchRenderer<P>,
    pub point: BatchRenderer<P>,
}

impl<P> BatchRenderers<P> {
    pub fn get(&self, kind: GeometryKind) -> &BatchRenderer<P> {
        match kind {
            GeometryKind::Polygon => &self.fill,
            GeometryKind::LineString => &self.stroke,
            GeometryKind::Point => &self.point,
        }
    }
}

/// One [`BatchBuffers`] slot per geometry kind.
pub struct LayerBuffers<B> {
    polygon: BatchBuffers<B>,
    line_string: BatchBuffers<B>,
    point: BatchBuffers<B>,
}

impl<B> Default for LayerBuffers<B> {
    fn default() -> Self {
        Self {
            polygon: BatchBuffers::new(GeometryKind::Polygon),
            line_string: BatchBuffers::new(GeometryKind::LineString),
            point: BatchBuffers::new(GeometryKind::Point),
        }
    }
}

impl<B> LayerBuffers<B> {
    pub fn get(&self, kind: GeometryKind) -> &BatchBuffers<B> {
        match kind {
            GeometryKind::Polygon => &self.polygon,
            GeometryKind::LineString => &self.line_string,
            GeometryKind::Point => &self.point,
        }
    }

    pub fn get_mut(&mut self, kind: GeometryKind) -> &mut BatchBuffers<B> {
        match kind {
            GeometryKind::Polygon => &mut self.polygon,
            GeometryKind::LineString => &mut self.line_string,
            GeometryKind::Point => &mut self.point,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BatchBuffers<B>> + '_ {
        DRAW_ORDER.into_iter().map(|kind| self.get(kind))
    }

    /// Polls all slots, returns whether any new buffers became current.
    pub fn poll<H>(&mut self, helper: &mut H) -> bool
    where
        H: DrawHelper<Buffer = B>,
    {
        let polygon = self.polygon.poll(helper);
        let line_string = self.line_string.poll(helper);
        let point = self.point.poll(helper);
        polygon || line_string || point
    }

    pub fn release<H>(&mut self, helper: &mut H)
    where
        H: DrawHelper<Buffer = B>,
    {
        self.polygon.release(helper);
        self.line_string.release(helper);
        self.point.release(helper);
    }

    pub fn is_ready(&self) -> bool {
        self.iter().all(BatchBuffers::is_ready)
    }

    pub fn is_settled(&self) -> bool {
        self.iter().all(BatchBuffers::is_settled)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc, sync::Arc};

    use geo_types::polygon;

    use crate::{
        batch::GeometryBatch,
        error::Error,
        feature::{Feature, GeometryKind},
        io::{
            scheduler::NopScheduler,
            worker::{InlineWorker, ScheduledWorker},
        },
        layer::frame_state::{FrameState, ViewState},
        render::{
            attributes::{AttributeValue, CustomAttribute},
            batch_renderer::{BatchBuffers, BatchRenderer, RebuildOutcome},
            transform::Transform,
            uniforms::{FrameUniforms, UniformValue, Uniforms, PROJECTION_MATRIX},
        },
        testing::{ManualWorker, RecordingHelper},
        util::math::Extent,
    };

    type Outcomes = Rc<RefCell<Vec<(u64, &'static str)>>>;

    fn record(outcomes: &Outcomes, generation: u64) -> impl FnOnce(RebuildOutcome) + 'static {
        let outcomes = outcomes.clone();
        move |outcome| {
            let name = if outcome.is_applied() {
                "applied"
            } else if outcome.is_superseded() {
                "superseded"
            } else {
                assert!(outcome.is_failed());
                "failed"
            };
            outcomes.borrow_mut().push((generation, name));
        }
    }

    fn square(id: u64, x: f64) -> Feature {
        Feature::new(
            id,
            polygon![(x: x, y: 0.), (x: x + 1., y: 0.), (x: x + 1., y: 1.), (x: x, y: 1.)],
        )
    }

    fn renderer(
        helper: &mut RecordingHelper,
        worker: Arc<dyn crate::io::worker::BufferWorker>,
    ) -> BatchRenderer<usize> {
        let color = CustomAttribute::new("color", 2, |_| AttributeValue::Array(vec![1.0, 1.0]));
        BatchRenderer::new(
            helper,
            GeometryKind::Polygon,
            "vertex",
            "fragment",
            vec![color],
            worker,
        )
        .unwrap()
    }

    fn frame() -> FrameState {
        FrameState::new(ViewState::new([0.0, 0.0], 1.0, 0.0, 0.0), [100.0, 100.0])
    }

    #[test]
    fn test_superseded_rebuild_never_wins() {
        let mut helper = RecordingHelper::default();
        let worker = ManualWorker::default();
        let renderer = renderer(&mut helper, Arc::new(worker.clone()));
        let mut slot = BatchBuffers::new(GeometryKind::Polygon);
        let outcomes = Outcomes::default();

        let mut batch = GeometryBatch::new(GeometryKind::Polygon);
        batch.add_or_update(square(1, 0.0).into()).unwrap();
        let a = renderer
            .rebuild(&mut slot, &batch, &Transform::identity(), record(&outcomes, 1))
            .unwrap();
        batch.add_or_update(square(2, 5.0).into()).unwrap();
        let b = renderer
            .rebuild(&mut slot, &batch, &Transform::identity(), record(&outcomes, 2))
            .unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(outcomes.borrow().as_slice(), &[(1, "superseded")]);

        // B resolves first, A afterwards.
        worker.run_last();
        worker.run_last();
        assert!(slot.poll(&mut helper));

        assert_eq!(slot.applied_generation(), 2);
        assert_eq!(slot.primitive_count(), 4);
        assert!(slot.is_ready());
        assert_eq!(
            outcomes.borrow().as_slice(),
            &[(1, "superseded"), (2, "applied")]
        );
    }

    #[test]
    fn test_stale_result_does_not_clear_pending() {
        let mut helper = RecordingHelper::default();
        let worker = ManualWorker::default();
        let renderer = renderer(&mut helper, Arc::new(worker.clone()));
        let mut slot = BatchBuffers::new(GeometryKind::Polygon);
        let outcomes = Outcomes::default();

        let mut batch = GeometryBatch::new(GeometryKind::Polygon);
        batch.add_or_update(square(1, 0.0).into()).unwrap();
        renderer
            .rebuild(&mut slot, &batch, &Transform::identity(), record(&outcomes, 1))
            .unwrap();
        renderer
            .rebuild(&mut slot, &batch, &Transform::identity(), record(&outcomes, 2))
            .unwrap();

        worker.run(0);
        assert!(!slot.poll(&mut helper));
        assert!(!slot.is_settled());
        assert!(slot.current().is_none());

        worker.run(0);
        assert!(slot.poll(&mut helper));
        assert_eq!(slot.primitive_count(), 2);
    }

    #[test]
    fn test_idempotent_rebuild() {
        let mut helper = RecordingHelper::default();
        let worker = ManualWorker::default();
        let renderer = renderer(&mut helper, Arc::new(worker.clone()));
        let mut slot = BatchBuffers::<u32>::new(GeometryKind::Polygon);

        let mut batch = GeometryBatch::new(GeometryKind::Polygon);
        batch.add_or_update(square(1, 0.0).into()).unwrap();
        batch.add_or_update(square(2, 3.0).into()).unwrap();
        let transform = Transform::compose(1.0, 1.0, 0.1, 0.1, 0.4, -2.0, 0.0);
        renderer
            .rebuild(&mut slot, &batch, &transform, |_| {})
            .unwrap();
        renderer
            .rebuild(&mut slot, &batch, &transform, |_| {})
            .unwrap();

        assert_eq!(worker.generations(), vec![1, 2]);
        let first = worker.with_job(0, |job| job.instructions.clone());
        worker.with_job(1, |job| assert_eq!(job.instructions, first));
    }

    #[test]
    fn test_clear_mid_rebuild() {
        let mut helper = RecordingHelper::default();
        let worker = ManualWorker::default();
        let renderer = renderer(&mut helper, Arc::new(worker.clone()));
        let mut slot = BatchBuffers::new(GeometryKind::Polygon);
        let outcomes = Outcomes::default();

        let mut batch = GeometryBatch::new(GeometryKind::Polygon);
        batch.add_or_update(square(1, 0.0).into()).unwrap();
        renderer
            .rebuild(&mut slot, &batch, &Transform::identity(), record(&outcomes, 1))
            .unwrap();

        batch.clear();
        renderer
            .rebuild(&mut slot, &batch, &Transform::identity(), record(&outcomes, 2))
            .unwrap();
        assert_eq!(
            outcomes.borrow().as_slice(),
            &[(1, "superseded"), (2, "applied")]
        );

        worker.run_all();
        assert!(!slot.poll(&mut helper));
        assert_eq!(slot.primitive_count(), 0);

        let uniforms =
            FrameUniforms::new(&frame(), 0.0, &Extent::infinite(), 1.0, &Uniforms::new());
        renderer.pre_render(&mut slot, &frame());
        renderer.render(&mut helper, &slot, &uniforms, 0.0).unwrap();
        assert!(helper.draws.is_empty());
        assert_eq!(helper.live_buffers(), 0);
    }

    #[test]
    fn test_failed_upload_keeps_buffers() {
        let mut helper = RecordingHelper::default();
        let renderer = renderer(&mut helper, Arc::new(InlineWorker));
        let mut slot = BatchBuffers::new(GeometryKind::Polygon);
        let outcomes = Outcomes::default();

        let mut batch = GeometryBatch::new(GeometryKind::Polygon);
        batch.add_or_update(square(1, 0.0).into()).unwrap();
        renderer
            .rebuild(&mut slot, &batch, &Transform::identity(), record(&outcomes, 1))
            .unwrap();
        assert!(slot.poll(&mut helper));
        let before = slot.current().cloned();

        helper.fail_uploads = true;
        batch.add_or_update(square(2, 2.0).into()).unwrap();
        renderer
            .rebuild(&mut slot, &batch, &Transform::identity(), record(&outcomes, 2))
            .unwrap();
        assert!(!slot.poll(&mut helper));

        assert_eq!(slot.current().cloned(), before);
        assert_eq!(slot.applied_generation(), 1);
        assert!(!slot.is_ready());
        assert!(slot.is_settled());
        assert_eq!(helper.live_buffers(), 2);
        assert_eq!(
            outcomes.borrow().as_slice(),
            &[(1, "applied"), (2, "failed")]
        );
    }

    #[test]
    fn test_render_uses_transform_delta() {
        let mut helper = RecordingHelper::default();
        let renderer = renderer(&mut helper, Arc::new(InlineWorker));
        let mut slot = BatchBuffers::new(GeometryKind::Polygon);

        let mut batch = GeometryBatch::new(GeometryKind::Polygon);
        batch.add_or_update(square(1, 0.0).into()).unwrap();
        let first = frame();
        let rebuild_transform = Transform::projection(&first);
        renderer
            .rebuild(&mut slot, &batch, &rebuild_transform, |_| {})
            .unwrap();
        slot.poll(&mut helper);

        let panned = FrameState::new(ViewState::new([10.0, 0.0], 1.0, 0.0, 0.0), [100.0, 100.0]);
        renderer.pre_render(&mut slot, &panned);
        let uniforms = FrameUniforms::new(&panned, 0.0, &Extent::infinite(), 1.0, &Uniforms::new());
        renderer.render(&mut helper, &slot, &uniforms, 0.0).unwrap();

        assert_eq!(helper.draws.len(), 1);
        let draw = &helper.draws[0];
        assert_eq!((draw.start, draw.end), (0, 6));
        let UniformValue::Mat4(matrix) = draw.uniform(PROJECTION_MATRIX) else {
            panic!("projection is not a matrix");
        };
        // Buffers were expressed in the clip space of the first frame, panning shifts them left.
        assert!((matrix[0] - 1.0).abs() < 1e-6);
        assert!((matrix[12] + 0.2).abs() < 1e-6);
        assert_eq!(draw.layout.last().unwrap().name, "a_color");
    }

    #[test]
    fn test_release() {
        let mut helper = RecordingHelper::default();
        let worker = ManualWorker::default();
        let renderer = renderer(&mut helper, Arc::new(worker.clone()));
        let mut slot = BatchBuffers::new(GeometryKind::Polygon);
        let outcomes = Outcomes::default();

        let mut batch = GeometryBatch::new(GeometryKind::Polygon);
        batch.add_or_update(square(1, 0.0).into()).unwrap();
        renderer
            .rebuild(&mut slot, &batch, &Transform::identity(), |_| {})
            .unwrap();
        worker.run_all();
        slot.poll(&mut helper);
        renderer
            .rebuild(&mut slot, &batch, &Transform::identity(), record(&outcomes, 2))
            .unwrap();

        slot.release(&mut helper);
        assert_eq!(helper.live_buffers(), 0);
        assert_eq!(outcomes.borrow().as_slice(), &[(2, "superseded")]);

        worker.run_all();
        assert!(!slot.poll(&mut helper));
        assert!(slot.current().is_none());
    }

    #[test]
    fn test_kind_mismatch() {
        let mut helper = RecordingHelper::default();
        let renderer = renderer(&mut helper, Arc::new(InlineWorker));
        let mut slot = BatchBuffers::<u32>::new(GeometryKind::Polygon);
        let batch = GeometryBatch::new(GeometryKind::Point);
        let result = renderer.rebuild(&mut slot, &batch, &Transform::identity(), |_| {});
        assert!(matches!(
            result,
            Err(Error::GeometryKindMismatch {
                found: GeometryKind::Point,
                ..
            })
        ));
        assert_eq!(slot.generation(), 0);
    }

    #[test]
    fn test_lost_job_fails() {
        let mut helper = RecordingHelper::default();
        let worker = ManualWorker::default();
        let renderer = renderer(&mut helper, Arc::new(worker.clone()));
        let mut slot = BatchBuffers::new(GeometryKind::Polygon);
        let outcomes = Outcomes::default();

        let mut batch = GeometryBatch::new(GeometryKind::Polygon);
        batch.add_or_update(square(1, 0.0).into()).unwrap();
        renderer
            .rebuild(&mut slot, &batch, &Transform::identity(), record(&outcomes, 1))
            .unwrap();
        worker.run_all();
        assert!(slot.poll(&mut helper));
        let before = slot.current().cloned();

        batch.add_or_update(square(2, 2.0).into()).unwrap();
        renderer
            .rebuild(&mut slot, &batch, &Transform::scale(2.0, 2.0), record(&outcomes, 2))
            .unwrap();
        worker.discard(0);
        assert!(!slot.poll(&mut helper));

        assert_eq!(slot.current().cloned(), before);
        assert_eq!(slot.buffers_transform(), &Transform::identity());
        assert!(slot.is_settled());
        assert_eq!(slot.applied_generation(), 1);
        assert_eq!(
            outcomes.borrow().as_slice(),
            &[(1, "applied"), (2, "failed")]
        );
    }

    #[test]
    fn test_unschedulable_rebuild_fails() {
        let mut helper = RecordingHelper::default();
        let inline = renderer(&mut helper, Arc::new(InlineWorker));
        let unscheduled = renderer(&mut helper, Arc::new(ScheduledWorker::new(NopScheduler)));
        let mut slot = BatchBuffers::new(GeometryKind::Polygon);
        let outcomes = Outcomes::default();

        let mut batch = GeometryBatch::new(GeometryKind::Polygon);
        batch.add_or_update(square(1, 0.0).into()).unwrap();
        inline
            .rebuild(&mut slot, &batch, &Transform::identity(), record(&outcomes, 1))
            .unwrap();
        assert!(slot.poll(&mut helper));
        let before = slot.current().cloned();

        let generation = unscheduled
            .rebuild(&mut slot, &batch, &Transform::scale(2.0, 2.0), record(&outcomes, 2))
            .unwrap();
        assert_eq!(generation, 2);
        assert_eq!(
            outcomes.borrow().as_slice(),
            &[(1, "applied"), (2, "failed")]
        );

        // The reply of the dropped job arrives without a pending rebuild.
        assert!(!slot.poll(&mut helper));
        assert_eq!(outcomes.borrow().len(), 2);
        assert_eq!(slot.current().cloned(), before);
        assert_eq!(slot.buffers_transform(), &Transform::identity());
        assert!(slot.is_settled());
        assert!(!slot.is_ready());
    }
}
