//! Word interpreter: forwards tokens to an [`Engine`] and checks results.

use cuebox_types::backend::{ENGINE_OK, Engine, Value};
use cuebox_types::error::{CueError, Result};

use crate::tokenizer::tokenize;

/// Word pushed by [`Interpreter::pop`] unless configured otherwise.
pub const DEFAULT_POP_WORD: &str = ".";

/// Drives one engine instance and collects the text it produces.
pub struct Interpreter {
    engine: Box<dyn Engine>,
    pop_word: String,
    output: Vec<String>,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("pop_word", &self.pop_word)
            .field("pending_output", &self.output.len())
            .finish_non_exhaustive()
    }
}

impl Interpreter {
    pub fn new(engine: Box<dyn Engine>) -> Self {
        Self {
            engine,
            pop_word: DEFAULT_POP_WORD.to_string(),
            output: Vec::new(),
        }
    }

    /// Change the word used by [`Interpreter::pop`].
    pub fn set_pop_word(&mut self, word: impl Into<String>) {
        self.pop_word = word.into();
    }

    pub fn pop_word(&self) -> &str {
        &self.pop_word
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// Forward one token to the engine.
    ///
    /// Engine text is collected as output lines before the result is
    /// checked, so a failing word still reports what it printed.
    pub fn push(&mut self, token: &str) -> Result<()> {
        self.engine.push(token);
        self.drain_stdout();
        self.check(token)
    }

    /// Place an already-built value on the engine stack.
    pub fn push_value(&mut self, value: Value) -> Result<()> {
        let label = value.text();
        self.engine.push_value(value);
        self.drain_stdout();
        self.check(&label)
    }

    /// Pop the top of the engine stack through the pop word.
    pub fn pop(&mut self) -> Result<Value> {
        let word = self.pop_word.clone();
        self.push(&word)?;
        self.engine
            .fetch_slot()
            .ok_or_else(|| CueError::command(word, "nothing to pop"))
    }

    /// Tokenize `line` and push every token in turn.
    pub fn define(&mut self, line: &str) -> Result<()> {
        for token in tokenize(line)? {
            self.push(&token)?;
        }
        Ok(())
    }

    /// Append text to the output, one entry per line.
    pub fn output(&mut self, text: &str) {
        if text.is_empty() {
            self.output.push(String::new());
        } else {
            self.output.extend(text.lines().map(str::to_string));
        }
    }

    /// Drain the output collected so far.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    fn drain_stdout(&mut self) {
        let text = self.engine.take_stdout();
        if !text.is_empty() {
            self.output.extend(text.lines().map(str::to_string));
        }
    }

    fn check(&self, token: &str) -> Result<()> {
        match self.engine.result() {
            ENGINE_OK => Ok(()),
            message => Err(CueError::command(token, message)),
        }
    }
}
