//! Asynchronous execution for the runtime.
//!
//! This module contains the one concurrent construct of the crate:
//! - [`Stage`](stage::Stage) and [`ConcurrentStage`](stage::ConcurrentStage) for running independent
//!   tasks on one shared input and joining their results

pub mod stage;
