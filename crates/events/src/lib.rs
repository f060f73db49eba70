//! Control plane for hook distribution.
//!
//! This crate provides the building blocks that carry hook changes from the
//! registry to every pipeline worker:
//!
//! - [`ControlBus`] — broadcast (fan-out to all workers) channel of
//!   [`ControlRecord`](intake_core::control::ControlRecord)s.
//! - [`BroadcastState`] — a worker's in-memory replica of the live hook
//!   set, rebuilt incrementally from control records.
//! - [`ControlConsumer`] — the long-lived task that feeds one worker's
//!   state from the bus.
//! - [`HookRegistry`] — the durable catalog: validate, persist, publish.

pub mod bus;
pub mod consumer;
pub mod registry;
pub mod state;

pub use bus::ControlBus;
pub use consumer::ControlConsumer;
pub use registry::{HookRegistry, RegistryError};
pub use state::BroadcastState;
