//! Scheduling.

use std::future::Future;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("scheduling work failed")]
    Scheduling(Box<dyn std::error::Error + Send + Sync>),
    #[error("scheduler is not implemented on this platform")]
    NotImplemented,
}

/// Async/await scheduler.
/// Can schedule a task from a future factory.
pub trait Scheduler: 'static {
    fn schedule<T>(
        &self,
        future_factory: impl (FnOnce() -> T) + Send + 'static,
    ) -> Result<(), ScheduleError>
    where
        T: Future<Output = ()> + Send + 'static;
}

pub struct NopScheduler;

impl Scheduler for NopScheduler {
    fn schedule<T>(
        &self,
        _future_factory: impl FnOnce() -> T + Send + 'static,
    ) -> Result<(), ScheduleError>
    where
        T: Future<Output = ()> + Send + 'static,
    {
        Err(ScheduleError::NotImplemented)
    }
}

#[cfg(feature = "tokio-scheduler")]
pub use tokio_scheduler::TokioScheduler;

#[cfg(feature = "tokio-scheduler")]
mod tokio_scheduler {
    use std::future::Future;

    use tokio::runtime::Handle;

    use crate::io::scheduler::{ScheduleError, Scheduler};

    /// Multi-threading with Tokio.
    pub struct TokioScheduler {
        handle: Handle,
    }

    impl TokioScheduler {
        pub fn new(handle: Handle) -> Self {
            Self { handle }
        }

        /// Uses the runtime of the calling context.
        pub fn current() -> Result<Self, ScheduleError> {
            Handle::try_current()
                .map(Self::new)
                .map_err(|e| ScheduleError::Scheduling(Box::new(e)))
        }
    }

    impl Scheduler for TokioScheduler {
        fn schedule<T>(
            &self,
            future_factory: impl FnOnce() -> T + Send + 'static,
        ) -> Result<(), ScheduleError>
        where
            T: Future<Output = ()> + Send + 'static,
        {
            self.handle.spawn((future_factory)());
            Ok(())
        }
    }
}
