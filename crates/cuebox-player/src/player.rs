//! The coordinator handle and its lock-guarded state.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use cuebox_types::backend::{ItemRef, Store};
use cuebox_types::config::PlayerConfig;
use cuebox_types::error::{CueError, Result};

use crate::cancel::CancelToken;
use crate::run_loop;

/// Everything the coordinator owns. Only touched under `Shared::state`.
#[derive(Debug)]
pub(crate) struct PlayerState {
    pub(crate) current: Option<ItemRef>,
    pub(crate) playlist: VecDeque<ItemRef>,
    pub(crate) history: VecDeque<ItemRef>,
    pub(crate) speed: i64,
    pub(crate) seek_target: Option<i64>,
    /// Last observed position of `current`, -1 before the first play.
    pub(crate) position: i64,
    pub(crate) generation: u64,
    pub(crate) controllers: usize,
    pub(crate) next_pending: bool,
    pub(crate) prev_pending: bool,
}

impl PlayerState {
    fn new() -> Self {
        Self {
            current: None,
            playlist: VecDeque::new(),
            history: VecDeque::new(),
            speed: 1,
            seek_target: None,
            position: -1,
            generation: 0,
            controllers: 0,
            next_pending: false,
            prev_pending: false,
        }
    }

    pub(crate) fn bump(&mut self) {
        self.generation += 1;
    }
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<PlayerState>,
    pub(crate) cond: Condvar,
    pub(crate) cancel: CancelToken,
    pub(crate) stores: Mutex<Vec<Box<dyn Store>>>,
    pub(crate) config: PlayerConfig,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock_stores(&self) -> MutexGuard<'_, Vec<Box<dyn Store>>> {
        self.stores.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bounded wait on the condition variable.
    pub(crate) fn wait<'a>(
        &self,
        guard: MutexGuard<'a, PlayerState>,
        timeout: Duration,
    ) -> MutexGuard<'a, PlayerState> {
        match self.cond.wait_timeout(guard, timeout) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        }
    }
}

/// Point-in-time copy of the coordinator state.
#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub current: Option<ItemRef>,
    pub playlist: Vec<ItemRef>,
    pub history: Vec<ItemRef>,
    pub speed: i64,
    pub position: i64,
    pub generation: u64,
    pub seek_pending: bool,
    pub controllers: usize,
}

/// Handle to a playout coordinator. Clones share the same coordinator.
#[derive(Clone)]
pub struct Player {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock_state();
        f.debug_struct("Player")
            .field("generation", &state.generation)
            .field("playlist", &state.playlist.len())
            .field("history", &state.history.len())
            .field("speed", &state.speed)
            .finish()
    }
}

impl Player {
    /// Create a coordinator without any stores.
    pub fn new(config: PlayerConfig) -> Self {
        Self::with_stores(config, Vec::new())
    }

    /// Create a coordinator delivering frames to `stores`.
    ///
    /// The run loop does not start until [`Player::start`] is called.
    pub fn with_stores(config: PlayerConfig, stores: Vec<Box<dyn Store>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PlayerState::new()),
                cond: Condvar::new(),
                cancel: CancelToken::new(),
                stores: Mutex::new(stores),
                config,
                thread: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.shared.config
    }

    /// Spawn the run-loop thread. Calling it again is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut thread = self
            .shared
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if thread.is_some() {
            log::debug!("playout loop already running");
            return Ok(());
        }
        if self.shared.cancel.is_cancelled() {
            return Err(CueError::Config("player has been shut down".to_string()));
        }
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("cuebox-playout".to_string())
            .spawn(move || run_loop::run(shared))?;
        *thread = Some(handle);
        Ok(())
    }

    /// Cancel the run loop and wait for it to exit.
    pub fn shutdown(&self) {
        self.cancel();
        let handle = self
            .shared
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            log::error!("playout loop panicked");
        }
    }

    fn cancel(&self) {
        self.shared.cancel.cancel();
        // Take the lock so a waiter cannot miss the wakeup between its
        // cancellation check and its wait.
        let _state = self.shared.lock_state();
        self.shared.cond.notify_all();
    }

    /// Whether the run loop is allowed to continue.
    pub fn is_active(&self) -> bool {
        !self.shared.cancel.is_cancelled()
    }

    /// Token observed by the run loop.
    pub fn cancel_token(&self) -> CancelToken {
        self.shared.cancel.clone()
    }

    // -- Controller registration --

    pub fn control_start(&self) {
        let mut state = self.shared.lock_state();
        state.controllers += 1;
    }

    /// Unregister a controller. The last one out cancels the run loop.
    pub fn control_end(&self) {
        let remaining = {
            let mut state = self.shared.lock_state();
            state.controllers = state.controllers.saturating_sub(1);
            self.shared.cond.notify_all();
            state.controllers
        };
        if remaining == 0 {
            log::info!("last controller detached, stopping playout");
            self.cancel();
        }
    }

    /// Register a controller for the lifetime of the returned guard.
    pub fn control(&self) -> ControlGuard {
        self.control_start();
        ControlGuard {
            player: self.clone(),
        }
    }

    // -- Playlist operations --

    /// Replace the playlist with `item` and switch to it immediately.
    pub fn set(&self, item: ItemRef) {
        let mut state = self.shared.lock_state();
        state.playlist.clear();
        state.playlist.push_back(item);
        state.speed = 1;
        state.next_pending = true;
        state.bump();
        self.shared.cond.notify_all();
    }

    /// Append `item` to the playlist.
    pub fn add(&self, item: ItemRef) {
        let mut state = self.shared.lock_state();
        state.playlist.push_back(item);
        state.bump();
        self.shared.cond.notify_all();
    }

    /// Insert at `index`, or append when out of range.
    pub fn insert(&self, index: i64, item: ItemRef) {
        let mut state = self.shared.lock_state();
        match usize::try_from(index) {
            Ok(i) if i < state.playlist.len() => state.playlist.insert(i, item),
            _ => state.playlist.push_back(item),
        }
        state.bump();
        self.shared.cond.notify_all();
    }

    /// Remove and return by position.
    ///
    /// `0..N-1` are playlist entries, `-1` is the current item (left in
    /// place) and `-2, -3, ...` are history entries from the most recent.
    pub fn grab(&self, index: i64) -> Option<ItemRef> {
        let mut state = self.shared.lock_state();
        let result = if index >= 0 {
            let i = usize::try_from(index).ok()?;
            state.playlist.remove(i)
        } else if index == -1 {
            return state.current.clone();
        } else {
            let back = usize::try_from(-(index + 2)).ok()?;
            let len = state.history.len();
            if back < len {
                state.history.remove(len - 1 - back)
            } else {
                None
            }
        };
        if result.is_some() {
            state.bump();
        }
        result
    }

    /// Request the run loop move to the next playlist entry.
    pub fn next(&self) {
        let mut state = self.shared.lock_state();
        if !state.playlist.is_empty() && !state.next_pending {
            state.next_pending = true;
            state.bump();
            self.shared.cond.notify_all();
        }
    }

    /// Request the run loop return to the most recent history entry.
    pub fn prev(&self) {
        let mut state = self.shared.lock_state();
        if !state.history.is_empty() && !state.prev_pending {
            state.prev_pending = true;
            state.bump();
            self.shared.cond.notify_all();
        }
    }

    // -- Transport --

    pub fn set_speed(&self, speed: i64) {
        let mut state = self.shared.lock_state();
        if state.speed != speed {
            state.speed = speed;
            state.bump();
        }
        self.shared.cond.notify_all();
    }

    pub fn speed(&self) -> i64 {
        self.shared.lock_state().speed
    }

    /// Seek the current item to `position` (negative counts from the end).
    ///
    /// Blocks until the run loop applies the target or the configured seek
    /// timeout expires. On timeout the target stays recorded and is applied
    /// by the next playback step.
    pub fn seek(&self, position: i64) -> Result<()> {
        let mut state = self.shared.lock_state();
        let Some(current) = state.current.clone() else {
            return Ok(());
        };
        let frames = current.frames();
        let target = if position >= 0 {
            position
        } else {
            frames + position
        };
        state.seek_target = Some(target.clamp(0, (frames - 1).max(0)));
        state.bump();
        self.shared.cond.notify_all();

        let deadline = Instant::now() + self.shared.config.seek_timeout();
        while state.seek_target.is_some() {
            let now = Instant::now();
            if now >= deadline || self.shared.cancel.is_cancelled() {
                return Err(CueError::Timeout("seek acknowledgement".to_string()));
            }
            state = self.shared.wait(state, deadline - now);
        }
        Ok(())
    }

    /// Last observed position of the current item.
    pub fn position(&self) -> i64 {
        self.shared.lock_state().position
    }

    pub fn generation(&self) -> u64 {
        self.shared.lock_state().generation
    }

    pub fn current(&self) -> Option<ItemRef> {
        self.shared.lock_state().current.clone()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let state = self.shared.lock_state();
        PlayerSnapshot {
            current: state.current.clone(),
            playlist: state.playlist.iter().cloned().collect(),
            history: state.history.iter().cloned().collect(),
            speed: state.speed,
            position: state.position,
            generation: state.generation,
            seek_pending: state.seek_target.is_some(),
            controllers: state.controllers,
        }
    }

    /// Block until the generation differs from `seen` or `timeout` expires.
    ///
    /// Returns the generation observed last.
    pub fn wait_for_change(&self, seen: u64, timeout: Duration) -> u64 {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.lock_state();
        while state.generation == seen && !self.shared.cancel.is_cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            state = self.shared.wait(state, deadline - now);
        }
        state.generation
    }

    // -- Stores --

    /// Assign a property on the first store.
    pub fn set_store_property(&self, name: &str, value: &str) -> bool {
        let mut stores = self.shared.lock_stores();
        match stores.first_mut() {
            Some(store) => store.set_property(name, value),
            None => false,
        }
    }

    pub fn store_count(&self) -> usize {
        self.shared.lock_stores().len()
    }
}

/// Keeps a controller registered until dropped.
#[derive(Debug)]
pub struct ControlGuard {
    player: Player,
}

impl Drop for ControlGuard {
    fn drop(&mut self) {
        self.player.control_end();
    }
}
