//! Command language and dispatch.
//!
//! Lines are split by the [`tokenize`] function and dispatched token by
//! token. A [`Dispatcher`] recognizes the words that drive the shared
//! [`cuebox_player::Player`]; everything else goes through the
//! [`Interpreter`] to the value-stack engine.

mod dispatcher;
mod interpreter;
mod tokenizer;
mod words;

/// Dispatch state and the recognized-word trait.
pub use dispatcher::{ArgState, Dispatcher, Interpretation, PendingWord, Signal, Word};
/// Engine driver collecting output lines.
pub use interpreter::{DEFAULT_POP_WORD, Interpreter};
/// Line splitting and its inverse.
pub use tokenizer::{join_tokens, tokenize};
/// Textual forms of stack values.
pub use words::{render_item, render_value};
