//! State module for tracking batch progress
//!
//! # Components
//!
//! - `BatchState`: the orchestrator's state machine for one batch

mod batch_state;

pub use batch_state::BatchState;
