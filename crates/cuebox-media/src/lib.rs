//! Reference implementations of the cuebox collaborator traits.
//!
//! Real decoding is out of scope. These implementations are small but
//! behave like the real thing from the coordinator's point of view: items
//! have a frame count and a seekable position, sinks accept or pace frames,
//! and the engine is a working value stack.

mod engine;
mod factory;
mod item;
mod store;

pub use engine::StackEngine;
pub use factory::{MediaFactory, is_uri};
pub use item::{DEFAULT_FPS, DEFAULT_TEST_FRAMES, SyntheticItem, SyntheticKind};
pub use store::{ClockStore, NullStore};
