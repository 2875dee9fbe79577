//! The playout run loop.
//!
//! The loop owns "advance playback". Calls into the current item and the
//! stores happen without the state lock held; every other access to the
//! coordinator state happens under it.

use std::sync::Arc;

use cuebox_types::backend::{Frame, ItemRef};

use crate::player::Shared;

/// How playback of one item ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Played through and the playlist has more entries.
    Completed,
    /// A next/prev request arrived.
    Interrupted,
    /// A store rejected a frame.
    Failed,
    Cancelled,
}

pub(crate) fn run(shared: Arc<Shared>) {
    log::info!("playout loop started");
    let mut stores_ready = false;

    while let Some(item) = next_item(&shared) {
        if !stores_ready {
            stores_ready = init_stores(&shared);
        }
        log::debug!("playing {} ({} frames)", item.uri(), item.frames());
        match play(&shared, &item) {
            Outcome::Completed => {
                for store in shared.lock_stores().iter_mut() {
                    store.complete();
                }
            },
            Outcome::Interrupted => log::debug!("playback of {} interrupted", item.uri()),
            Outcome::Failed => {
                log::warn!("store rejected a frame of {}, abandoning item", item.uri());
                stores_ready = false;
            },
            Outcome::Cancelled => break,
        }
    }

    log::info!("playout loop stopped");
}

fn init_stores(shared: &Shared) -> bool {
    let mut ready = true;
    for store in shared.lock_stores().iter_mut() {
        if !store.init() {
            log::warn!("store failed to initialise");
            ready = false;
        }
    }
    ready
}

/// Wait for work, retire the outgoing item and promote the next one.
///
/// Returns `None` once cancelled.
fn next_item(shared: &Shared) -> Option<ItemRef> {
    let idle = shared.config.idle_wait();
    let capacity = shared.config.history_capacity;
    let mut state = shared.lock_state();

    loop {
        while !shared.cancel.is_cancelled()
            && state.playlist.is_empty()
            && !state.next_pending
            && !state.prev_pending
        {
            state = shared.wait(state, idle);
        }
        if shared.cancel.is_cancelled() {
            return None;
        }

        if state.prev_pending {
            if let Some(outgoing) = state.current.take() {
                state.playlist.push_front(outgoing);
                if let Some(previous) = state.history.pop_back() {
                    state.playlist.push_front(previous);
                }
            }
        } else if let Some(outgoing) = state.current.take() {
            state.history.push_back(outgoing);
        }
        while state.history.len() > capacity {
            state.history.pop_front();
        }
        state.next_pending = false;
        state.prev_pending = false;

        let Some(item) = state.playlist.pop_front() else {
            // Nothing to promote; the outgoing item (if any) was retired.
            state.position = -1;
            state.bump();
            shared.cond.notify_all();
            continue;
        };

        item.seek(0, false);
        state.current = Some(Arc::clone(&item));
        state.position = item.position();
        state.bump();
        shared.cond.notify_all();
        return Some(item);
    }
}

fn deliver(shared: &Shared, frame: &Frame) -> bool {
    let mut ok = true;
    for store in shared.lock_stores().iter_mut() {
        ok &= store.push(frame);
    }
    ok
}

fn play(shared: &Shared, item: &ItemRef) -> Outcome {
    let idle = shared.config.idle_wait();

    loop {
        if shared.cancel.is_cancelled() {
            return Outcome::Cancelled;
        }
        {
            let state = shared.lock_state();
            if state.next_pending || state.prev_pending {
                return Outcome::Interrupted;
            }
        }

        let Some(frame) = item.fetch() else {
            return Outcome::Completed;
        };
        if !deliver(shared, &frame) {
            return Outcome::Failed;
        }

        let mut state = shared.lock_state();
        let position = item.position();
        let frames = item.frames();
        let speed = state.speed;
        let mut moved = true;
        let mut end_of_item = false;

        if let Some(target) = state.seek_target.take() {
            item.seek(target, false);
        } else if speed != 0
            && position
                .checked_add(speed)
                .is_some_and(|next| (0..frames).contains(&next))
        {
            item.seek(speed, true);
        } else if speed > 0 && !state.playlist.is_empty() {
            end_of_item = true;
        } else {
            moved = false;
        }

        state.position = item.position();
        shared.cond.notify_all();

        if end_of_item {
            return Outcome::Completed;
        }
        if !moved {
            // Paused, or holding the last frame until more work arrives.
            let _state = shared.wait(state, idle);
        }
    }
}
