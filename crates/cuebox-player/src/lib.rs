//! Playout coordinator.
//!
//! A [`Player`] owns the playlist, the current item, the bounded history,
//! the playout speed and any pending seek. All of it sits behind one lock.
//! A dedicated run-loop thread advances playback and delivers frames to the
//! attached stores; callers on any thread mutate state through the handle
//! and are woken through a shared condition variable.

mod cancel;
mod player;
mod run_loop;

pub use cancel::CancelToken;
pub use player::{ControlGuard, Player, PlayerSnapshot};
