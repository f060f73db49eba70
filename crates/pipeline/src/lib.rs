//! Streaming transformation pipeline.
//!
//! Raw integration messages flow in on a shared main channel; a pool of
//! identical workers competes for them. Each worker looks up the winning
//! hook in its own broadcast state, executes the hook body against the
//! message payload, and routes the outcome: transformed messages to the
//! success channel, failures to the dead-letter channel, unmatched
//! messages are dropped. One bad message never takes down a worker.

pub mod cache;
pub mod transform;
pub mod worker;

pub use cache::ScriptCache;
pub use transform::{TransformOutcome, TransformStage};
pub use worker::{TransformWorker, WorkerChannels};
