//! Synthetic media items.

use std::sync::{Mutex, MutexGuard, PoisonError};

use cuebox_types::backend::{Frame, Item, Properties};
use cuebox_types::error::{CueError, Result};

/// Frame count of a fresh `test:` item.
pub const DEFAULT_TEST_FRAMES: i64 = 250;

/// Nominal frame rate reported by synthetic items.
pub const DEFAULT_FPS: i64 = 25;

/// Which generator backs a synthetic item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticKind {
    /// Test pattern, `test:`.
    TestPattern,
    /// Solid colour, `colour:` / `color:`.
    Colour,
}

#[derive(Debug)]
struct ItemState {
    position: i64,
    frames: i64,
    properties: Properties,
}

/// An item whose frames are generated on demand.
#[derive(Debug)]
pub struct SyntheticItem {
    uri: String,
    kind: SyntheticKind,
    state: Mutex<ItemState>,
}

impl SyntheticItem {
    pub fn new(uri: impl Into<String>, kind: SyntheticKind) -> Self {
        let frames = match kind {
            SyntheticKind::TestPattern => DEFAULT_TEST_FRAMES,
            SyntheticKind::Colour => 1,
        };
        let mut properties = Properties::new();
        properties.insert("frames".to_string(), frames.to_string());
        properties.insert("fps".to_string(), DEFAULT_FPS.to_string());
        if kind == SyntheticKind::Colour {
            properties.insert("colour".to_string(), "black".to_string());
        }
        Self {
            uri: uri.into(),
            kind,
            state: Mutex::new(ItemState {
                position: 0,
                frames,
                properties,
            }),
        }
    }

    /// A `test:` item with `frames` frames.
    pub fn test_pattern(frames: i64) -> Self {
        let item = Self::new("test:", SyntheticKind::TestPattern);
        {
            let frames = frames.max(0);
            let mut state = item.lock();
            state.frames = frames;
            state
                .properties
                .insert("frames".to_string(), frames.to_string());
        }
        item
    }

    pub fn kind(&self) -> SyntheticKind {
        self.kind
    }

    fn lock(&self) -> MutexGuard<'_, ItemState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Item for SyntheticItem {
    fn uri(&self) -> String {
        self.uri.clone()
    }

    fn fetch(&self) -> Option<Frame> {
        let state = self.lock();
        (state.position >= 0 && state.position < state.frames).then(|| Frame {
            position: state.position,
            source: self.uri.clone(),
        })
    }

    fn seek(&self, position: i64, relative: bool) {
        let mut state = self.lock();
        let target = if relative {
            state.position.saturating_add(position)
        } else {
            position
        };
        let last = (state.frames - 1).max(0);
        state.position = target.clamp(0, last);
    }

    fn position(&self) -> i64 {
        self.lock().position
    }

    fn frames(&self) -> i64 {
        self.lock().frames
    }

    fn is_thread_safe(&self) -> bool {
        true
    }

    fn properties(&self) -> Properties {
        self.lock().properties.clone()
    }

    fn set_property(&self, name: &str, value: &str) -> Result<()> {
        let mut state = self.lock();
        match name {
            "frames" => {
                let frames: i64 = value
                    .parse()
                    .map_err(|_| CueError::Media(format!("invalid frame count: {value}")))?;
                if frames < 0 {
                    return Err(CueError::Media(format!("invalid frame count: {value}")));
                }
                state.frames = frames;
                let last = (frames - 1).max(0);
                state.position = state.position.min(last);
            },
            "fps" => {
                let fps: i64 = value
                    .parse()
                    .map_err(|_| CueError::Media(format!("invalid frame rate: {value}")))?;
                if fps <= 0 {
                    return Err(CueError::Media(format!("invalid frame rate: {value}")));
                }
            },
            "colour" if self.kind == SyntheticKind::Colour => {},
            _ if name.starts_with('@') => {},
            _ => {
                return Err(CueError::Media(format!("unknown property: {name}")));
            },
        }
        state.properties.insert(name.to_string(), value.to_string());
        Ok(())
    }
}
