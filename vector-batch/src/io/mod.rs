//! Handles asynchronous buffer generation.

pub mod scheduler;
pub mod worker;
