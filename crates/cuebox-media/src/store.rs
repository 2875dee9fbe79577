//! Frame sinks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use cuebox_types::backend::{Frame, Store};

/// Accepts every frame and counts them.
#[derive(Debug, Default)]
pub struct NullStore {
    pushed: Arc<AtomicU64>,
    completed: Arc<AtomicU64>,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared counter of frames pushed into this store.
    pub fn pushed(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.pushed)
    }

    /// Shared counter of completed items.
    pub fn completed(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.completed)
    }
}

impl Store for NullStore {
    fn init(&mut self) -> bool {
        true
    }

    fn push(&mut self, _frame: &Frame) -> bool {
        self.pushed.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn complete(&mut self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    fn set_property(&mut self, _name: &str, _value: &str) -> bool {
        false
    }
}

/// Delivers frames at a fixed rate by sleeping until each frame is due.
#[derive(Debug)]
pub struct ClockStore {
    fps: u32,
    next_due: Option<Instant>,
    delivered: u64,
}

impl ClockStore {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            next_due: None,
            delivered: 0,
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    fn frame_duration(&self) -> Duration {
        Duration::from_secs(1) / self.fps
    }
}

impl Store for ClockStore {
    fn init(&mut self) -> bool {
        self.next_due = None;
        true
    }

    fn push(&mut self, _frame: &Frame) -> bool {
        let now = Instant::now();
        let due = self.next_due.unwrap_or(now);
        if due > now {
            std::thread::sleep(due - now);
        }
        // Resynchronise after a stall instead of bursting to catch up.
        let base = if due + self.frame_duration() < now {
            now
        } else {
            due
        };
        self.next_due = Some(base + self.frame_duration());
        self.delivered += 1;
        true
    }

    fn complete(&mut self) {
        log::debug!("clock store completed item after {} frames", self.delivered);
    }

    fn set_property(&mut self, name: &str, value: &str) -> bool {
        match name {
            "fps" => match value.parse::<u32>() {
                Ok(fps) if fps > 0 => {
                    self.fps = fps;
                    self.next_due = None;
                    true
                },
                _ => {
                    log::warn!("ignoring invalid fps value {value}");
                    false
                },
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(position: i64) -> Frame {
        Frame {
            position,
            source: "test:".to_string(),
        }
    }

    #[test]
    fn null_store_counts() {
        let mut store = NullStore::new();
        let pushed = store.pushed();
        let completed = store.completed();
        assert!(store.init());
        assert!(store.push(&frame(0)));
        assert!(store.push(&frame(1)));
        store.complete();
        assert_eq!(pushed.load(Ordering::Relaxed), 2);
        assert_eq!(completed.load(Ordering::Relaxed), 1);
        assert!(!store.set_property("fps", "25"));
    }

    #[test]
    fn clock_store_paces_delivery() {
        let mut store = ClockStore::new(100);
        store.init();
        let start = Instant::now();
        for i in 0..5 {
            assert!(store.push(&frame(i)));
        }
        // Four full frame periods elapse between the first and fifth frame.
        assert!(start.elapsed() >= Duration::from_millis(35));
        assert_eq!(store.delivered(), 5);
    }

    #[test]
    fn clock_store_fps_property() {
        let mut store = ClockStore::new(25);
        assert!(store.set_property("fps", "50"));
        assert_eq!(store.fps(), 50);
        assert!(!store.set_property("fps", "0"));
        assert!(!store.set_property("fps", "fast"));
        assert!(!store.set_property("volume", "1"));
        assert_eq!(store.fps(), 50);
    }

    #[test]
    fn zero_fps_is_clamped() {
        assert_eq!(ClockStore::new(0).fps(), 1);
    }
}
