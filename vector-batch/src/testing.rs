//! Test doubles for the draw helper and the buffer worker.

use std::{
    cell::RefCell,
    collections::{BTreeMap, VecDeque},
    rc::Rc,
};

use geozero::mvt::{tile, Message, Tile};

use crate::{
    benchmarking::{command, zigzag},
    io::{
        scheduler::ScheduleError,
        worker::{BufferJob, BufferWorker},
    },
    layer::frame_state::FrameState,
    render::{
        attributes::AttributeDescription,
        helper::{BufferTarget, DrawHelper, HelperError, PostProcess},
        uniforms::UniformValue,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub program: usize,
    pub vertex_buffer: u32,
    pub index_buffer: u32,
    pub layout: Vec<AttributeDescription>,
    pub uniforms: BTreeMap<String, UniformValue>,
    pub start: usize,
    pub end: usize,
}

impl DrawCall {
    pub fn uniform(&self, name: &str) -> &UniformValue {
        &self.uniforms[name]
    }

    pub fn float(&self, name: &str) -> f32 {
        match self.uniform(name) {
            UniformValue::Float(value) => *value,
            other => panic!("{name} is not a float: {other:?}"),
        }
    }
}

/// Records everything a layer asks the GPU to do.
#[derive(Debug, Default)]
pub struct RecordingHelper {
    pub programs: Vec<(String, String)>,
    pub buffers: BTreeMap<u32, (BufferTarget, Vec<u8>)>,
    pub deleted: Vec<u32>,
    pub draws: Vec<DrawCall>,
    pub post_processes: Vec<PostProcess>,
    pub frames: usize,
    pub fail_uploads: bool,
    next_buffer: u32,
    program: Option<usize>,
    bound: BTreeMap<BufferTarget, u32>,
    layout: Vec<AttributeDescription>,
    uniforms: BTreeMap<String, UniformValue>,
    frame_start: usize,
}

impl RecordingHelper {
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn vertices(&self, buffer: u32) -> Vec<f32> {
        self.buffers[&buffer]
            .1
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }
}

impl DrawHelper for RecordingHelper {
    type Program = usize;
    type Buffer = u32;
    type Target = Vec<DrawCall>;

    fn compile_program(
        &mut self,
        vertex_shader: &str,
        fragment_shader: &str,
    ) -> Result<Self::Program, HelperError> {
        if vertex_shader.is_empty() || fragment_shader.is_empty() {
            return Err(HelperError::Compile("empty shader source".to_owned()));
        }
        self.programs
            .push((vertex_shader.to_owned(), fragment_shader.to_owned()));
        Ok(self.programs.len() - 1)
    }

    fn create_buffer(
        &mut self,
        target: BufferTarget,
        data: &[u8],
    ) -> Result<Self::Buffer, HelperError> {
        if self.fail_uploads {
            return Err(HelperError::Upload("out of memory".to_owned()));
        }
        self.next_buffer += 1;
        self.buffers
            .insert(self.next_buffer, (target, data.to_vec()));
        Ok(self.next_buffer)
    }

    fn delete_buffer(&mut self, buffer: Self::Buffer) {
        assert!(
            self.buffers.remove(&buffer).is_some(),
            "buffer {buffer} deleted twice"
        );
        self.deleted.push(buffer);
    }

    fn set_post_processes(&mut self, passes: &[PostProcess]) {
        self.post_processes = passes.to_vec();
    }

    fn prepare_draw(&mut self, _frame: &FrameState) {
        self.frame_start = self.draws.len();
    }

    fn use_program(&mut self, program: &Self::Program) {
        self.program = Some(*program);
        self.uniforms.clear();
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: &Self::Buffer) {
        self.bound.insert(target, *buffer);
    }

    fn enable_attributes(&mut self, layout: &[AttributeDescription]) {
        self.layout = layout.to_vec();
    }

    fn set_uniform(&mut self, name: &str, value: &UniformValue) {
        self.uniforms.insert(name.to_owned(), value.clone());
    }

    fn draw_elements(&mut self, start: usize, end: usize) -> Result<(), HelperError> {
        let (Some(program), Some(vertex_buffer), Some(index_buffer)) = (
            self.program,
            self.bound.get(&BufferTarget::Vertex).copied(),
            self.bound.get(&BufferTarget::Index).copied(),
        ) else {
            return Err(HelperError::Draw("nothing bound".to_owned()));
        };
        self.draws.push(DrawCall {
            program,
            vertex_buffer,
            index_buffer,
            layout: self.layout.clone(),
            uniforms: self.uniforms.clone(),
            start,
            end,
        });
        Ok(())
    }

    fn finalize_draw(&mut self, _frame: &FrameState) -> Self::Target {
        self.frames += 1;
        self.draws[self.frame_start..].to_vec()
    }
}

/// Queues jobs until the test runs them, in any order.
#[derive(Clone, Default)]
pub struct ManualWorker {
    jobs: Rc<RefCell<VecDeque<BufferJob>>>,
}

impl ManualWorker {
    pub fn len(&self) -> usize {
        self.jobs.borrow().len()
    }

    pub fn generations(&self) -> Vec<u64> {
        self.jobs.borrow().iter().map(|job| job.generation).collect()
    }

    pub fn with_job<R>(&self, index: usize, f: impl FnOnce(&BufferJob) -> R) -> R {
        f(&self.jobs.borrow()[index])
    }

    pub fn run(&self, index: usize) {
        let job = self.jobs.borrow_mut().remove(index);
        job.expect("no such job").run();
    }

    /// Drops a job without running it, as a cancelled task would.
    pub fn discard(&self, index: usize) {
        let job = self.jobs.borrow_mut().remove(index);
        drop(job.expect("no such job"));
    }

    pub fn run_last(&self) {
        let job = self.jobs.borrow_mut().pop_back();
        job.expect("no job queued").run();
    }

    pub fn run_all(&self) {
        loop {
            let job = self.jobs.borrow_mut().pop_front();
            match job {
                Some(job) => job.run(),
                None => break,
            }
        }
    }
}

impl BufferWorker for ManualWorker {
    fn post(&self, job: BufferJob) -> Result<(), ScheduleError> {
        self.jobs.borrow_mut().push_back(job);
        Ok(())
    }
}

/// Encodes a tile with a point in layer "pois" and a square polygon in layer "parks".
pub fn encode_tile() -> Vec<u8> {
    let point = tile::Feature {
        id: Some(10),
        tags: vec![0, 0],
        r#type: Some(tile::GeomType::Point as i32),
        geometry: vec![command(1, 1), zigzag(2048), zigzag(1024)],
    };
    // Square of the upper left quarter.
    let polygon = tile::Feature {
        id: Some(11),
        tags: vec![],
        r#type: Some(tile::GeomType::Polygon as i32),
        geometry: vec![
            command(1, 1),
            zigzag(0),
            zigzag(0),
            command(2, 3),
            zigzag(2048),
            zigzag(0),
            zigzag(0),
            zigzag(2048),
            zigzag(-2048),
            zigzag(0),
            command(7, 1),
        ],
    };
    let tile = Tile {
        layers: vec![
            tile::Layer {
                version: 2,
                name: "pois".to_owned(),
                features: vec![point],
                keys: vec!["name".to_owned()],
                values: vec![tile::Value {
                    string_value: Some("fountain".to_owned()),
                    ..Default::default()
                }],
                extent: Some(4096),
            },
            tile::Layer {
                version: 2,
                name: "parks".to_owned(),
                features: vec![polygon],
                keys: vec![],
                values: vec![],
                extent: Some(4096),
            },
        ],
    };
    tile.encode_to_vec()
}
