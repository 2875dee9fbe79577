//! Collaborator contracts.
//!
//! The interpreter forwards unrecognized words to an [`Engine`]; the playout
//! coordinator pulls [`Frame`]s from an [`Item`] and delivers them to every
//! attached [`Store`]. Concrete media handling lives behind these traits.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Result value reported by an engine after a successful push.
pub const ENGINE_OK: &str = "OK";

/// Named properties of an item, sorted by key.
pub type Properties = BTreeMap<String, String>;

/// Shared handle to a media item.
///
/// Items move between the engine stack, the playlist, the history, and the
/// run loop, so they are reference counted and use interior mutability.
pub type ItemRef = Arc<dyn Item>;

/// One unit of media moving from an item to a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Position of the frame within its item.
    pub position: i64,
    /// URI of the item that produced the frame.
    pub source: String,
}

/// An opaque, seekable, frame-producing media handle.
pub trait Item: Send + Sync + fmt::Debug {
    /// The URI the item was opened from.
    fn uri(&self) -> String;

    /// Produce the frame at the current position.
    fn fetch(&self) -> Option<Frame>;

    /// Move to `position`, or by `position` frames when `relative`.
    fn seek(&self, position: i64, relative: bool);

    /// Current frame position.
    fn position(&self) -> i64;

    /// Total number of frames (0 for items that cannot be played).
    fn frames(&self) -> i64;

    /// Whether frames may be fetched from a worker thread.
    fn is_thread_safe(&self) -> bool;

    /// Snapshot of the item's properties.
    fn properties(&self) -> Properties;

    /// Assign a property from its textual form.
    fn set_property(&self, name: &str, value: &str) -> Result<()>;
}

/// Destination for frames.
pub trait Store: Send {
    /// Prepare the store. Returns `false` if it cannot accept frames.
    fn init(&mut self) -> bool;

    /// Deliver one frame. Returns `false` on failure.
    fn push(&mut self, frame: &Frame) -> bool;

    /// Called once an item has been played through without error.
    fn complete(&mut self);

    /// Assign a property. Returns `false` if the store has no such property.
    fn set_property(&mut self, name: &str, value: &str) -> bool;
}

/// A value held in an engine slot.
#[derive(Debug, Clone)]
pub enum Value {
    Literal(String),
    Item(ItemRef),
}

impl Value {
    /// The item, if this value is one.
    pub fn as_item(&self) -> Option<&ItemRef> {
        match self {
            Self::Item(item) => Some(item),
            Self::Literal(_) => None,
        }
    }

    /// Textual form: literals verbatim, items by URI.
    pub fn text(&self) -> String {
        match self {
            Self::Literal(text) => text.clone(),
            Self::Item(item) => item.uri(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// The value-stack machine that unrecognized words are forwarded to.
///
/// A push never fails directly: the outcome is inspected through
/// [`Engine::result`], which reads [`ENGINE_OK`] on success.
pub trait Engine: Send {
    /// Submit one token.
    fn push(&mut self, token: &str);

    /// Place an already-built value on top of the stack.
    fn push_value(&mut self, value: Value);

    /// Outcome of the most recent push.
    fn result(&self) -> &str;

    /// Drain text written by the engine since the last call.
    fn take_stdout(&mut self) -> String;

    /// The value most recently popped by a pop word.
    fn fetch_slot(&mut self) -> Option<Value>;

    /// Words understood natively by the engine.
    fn dictionary(&self) -> Vec<String>;
}
