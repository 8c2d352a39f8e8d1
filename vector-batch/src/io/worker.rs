//! The buffer worker turns render instructions into vertex and index buffers off the render
//! thread. Results travel back over the channel of the requesting
//! [`BatchBuffers`](crate::render::batch_renderer::BatchBuffers).

use std::sync::mpsc::Sender;

use crate::{
    error::{Error, Result},
    io::scheduler::{ScheduleError, Scheduler},
    render::instructions::RenderInstructions,
    tessellation::{generate_buffers, GeneratedBuffers},
};

/// A request to generate buffers for one rebuild.
///
/// A job always replies once. If it is dropped before [`BufferJob::run`] completed, for example
/// because its task was cancelled or buffer generation panicked, it replies with
/// [`Error::JobLost`].
pub struct BufferJob {
    pub generation: u64,
    pub instructions: RenderInstructions,
    reply: Option<Sender<BufferMessage>>,
}

/// Reply to a [`BufferJob`]. The instructions are sent back so their allocation can be reused.
#[derive(Debug)]
pub struct BufferMessage {
    pub generation: u64,
    pub instructions: RenderInstructions,
    pub result: Result<GeneratedBuffers>,
}

impl BufferJob {
    pub fn new(
        generation: u64,
        instructions: RenderInstructions,
        reply: Sender<BufferMessage>,
    ) -> Self {
        Self {
            generation,
            instructions,
            reply: Some(reply),
        }
    }

    pub fn run(mut self) {
        let result = generate_buffers(&self.instructions);
        if let Err(e) = &result {
            log::error!("generating buffers of generation {} failed: {e}", self.generation);
        }
        self.reply(result);
    }

    fn reply(&mut self, result: Result<GeneratedBuffers>) {
        let Some(reply) = self.reply.take() else {
            return;
        };
        let empty = RenderInstructions::empty(self.instructions.kind);
        let message = BufferMessage {
            generation: self.generation,
            instructions: std::mem::replace(&mut self.instructions, empty),
            result,
        };
        // The receiving side is gone if its representation was dropped.
        if reply.send(message).is_err() {
            log::debug!("buffers of generation {} were dropped", self.generation);
        }
    }
}

impl Drop for BufferJob {
    fn drop(&mut self) {
        if self.reply.is_some() {
            log::error!("buffer job of generation {} was lost", self.generation);
            self.reply(Err(Error::JobLost(self.generation)));
        }
    }
}

pub trait BufferWorker {
    fn post(&self, job: BufferJob) -> std::result::Result<(), ScheduleError>;
}

/// Generates buffers on the calling thread. The reply is still only seen on the next poll.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineWorker;

impl BufferWorker for InlineWorker {
    fn post(&self, job: BufferJob) -> std::result::Result<(), ScheduleError> {
        job.run();
        Ok(())
    }
}

/// Generates buffers in tasks of a [`Scheduler`].
pub struct ScheduledWorker<S> {
    scheduler: S,
}

impl<S: Scheduler> ScheduledWorker<S> {
    pub fn new(scheduler: S) -> Self {
        Self { scheduler }
    }
}

impl<S: Scheduler> BufferWorker for ScheduledWorker<S> {
    fn post(&self, job: BufferJob) -> std::result::Result<(), ScheduleError> {
        self.scheduler.schedule(move || async move { job.run() })
    }
}
