//! Word table, dispatch logic and the argument state machine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cuebox_media::StackEngine;
use cuebox_player::Player;
use cuebox_types::backend::{Engine, ItemRef, Value};
use cuebox_types::error::{CueError, Result};

use crate::interpreter::Interpreter;
use crate::tokenizer::tokenize;
use crate::words;

/// Word the dispatcher pops with. It must not print, so values taken off the
/// stack by recognized words never leak into the output.
const POP_WORD: &str = "dot";

/// Terminates the argument list collected by `store`.
const STORE_END: &str = ".";

/// Deepest chain of nested `include`s.
const MAX_INCLUDE_DEPTH: usize = 16;

/// A recognized word.
pub trait Word: Send + Sync {
    /// The word as typed.
    fn name(&self) -> &str;

    /// One-line description for `help`.
    fn description(&self) -> &str;

    /// Stack effect, e.g. `(item index --)`.
    fn usage(&self) -> &str;

    /// Run the word against the dispatcher that recognized it.
    fn execute(&self, dispatcher: &mut Dispatcher) -> Result<()>;
}

/// What [`Dispatcher::interpret`] did with a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpretation {
    /// A recognized word (or a pending word's argument) consumed it.
    Handled,
    /// The token went to the engine.
    Forwarded,
}

/// A word waiting for further tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWord {
    /// `include`: the next token is a script path.
    Include,
    /// `store`: collects `name=value` tokens until `.`.
    Store { props: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ArgState {
    #[default]
    Idle,
    AwaitingArgument(PendingWord),
}

/// Requests the dispatcher cannot act on by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Start the connection multiplexer on `port` (auxiliary on `port + 1`).
    StartServer { port: u16 },
    /// Leave the shell or close the connection.
    Exit,
}

/// An interpreter bound to a shared [`Player`] with a table of recognized
/// words.
///
/// Every shell and every network connection owns one dispatcher. Engines
/// are never shared; the player is.
pub struct Dispatcher {
    interpreter: Interpreter,
    player: Player,
    words: HashMap<String, Arc<dyn Word>>,
    arg_state: ArgState,
    signals: Vec<Signal>,
    include_dirs: Vec<PathBuf>,
    include_depth: usize,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("words", &self.words.len())
            .field("arg_state", &self.arg_state)
            .field("signals", &self.signals)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher driving `engine` against `player`.
    pub fn new(player: Player, engine: Box<dyn Engine>) -> Self {
        let mut interpreter = Interpreter::new(engine);
        interpreter.set_pop_word(POP_WORD);
        let mut dispatcher = Self {
            interpreter,
            player,
            words: HashMap::new(),
            arg_state: ArgState::Idle,
            signals: Vec::new(),
            include_dirs: Vec::new(),
            include_depth: 0,
        };
        words::register_words(&mut dispatcher);
        dispatcher
    }

    /// Create a dispatcher with the reference [`StackEngine`].
    pub fn with_stack_engine(player: Player) -> Self {
        Self::new(player, Box::new(StackEngine::default()))
    }

    /// Register a word. Replaces any existing word with the same name.
    pub fn register(&mut self, word: Arc<dyn Word>) {
        self.words.insert(word.name().to_string(), word);
    }

    /// Directories searched by `include` for relative paths.
    pub fn set_include_dirs(&mut self, dirs: Vec<PathBuf>) {
        self.include_dirs = dirs;
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn arg_state(&self) -> &ArgState {
        &self.arg_state
    }

    pub(crate) fn set_arg_state(&mut self, state: ArgState) {
        self.arg_state = state;
    }

    /// Drop a word still waiting for arguments, returning it.
    pub fn cancel_pending(&mut self) -> Option<PendingWord> {
        match std::mem::take(&mut self.arg_state) {
            ArgState::Idle => None,
            ArgState::AwaitingArgument(pending) => Some(pending),
        }
    }

    /// Recognized words, sorted by name.
    pub fn words(&self) -> Vec<Arc<dyn Word>> {
        let mut words: Vec<_> = self.words.values().cloned().collect();
        words.sort_by(|a, b| a.name().cmp(b.name()));
        words
    }

    /// Dispatch one token.
    pub fn interpret(&mut self, token: &str) -> Result<Interpretation> {
        if let ArgState::AwaitingArgument(pending) = std::mem::take(&mut self.arg_state) {
            self.feed(pending, token)?;
            return Ok(Interpretation::Handled);
        }
        if let Some(word) = self.words.get(token).cloned() {
            log::trace!("word {token}");
            word.execute(self)?;
            return Ok(Interpretation::Handled);
        }
        self.interpreter.push(token)?;
        Ok(Interpretation::Forwarded)
    }

    /// Dispatch one token, discarding how it was handled.
    pub fn push(&mut self, token: &str) -> Result<()> {
        self.interpret(token).map(|_| ())
    }

    /// Place a value on the engine stack.
    pub fn push_value(&mut self, value: Value) -> Result<()> {
        self.interpreter.push_value(value)
    }

    /// Push a textual value as a literal.
    pub fn push_literal(&mut self, text: impl Into<String>) -> Result<()> {
        self.interpreter.push_value(Value::Literal(text.into()))
    }

    /// Pop the top of the engine stack.
    pub fn pop(&mut self) -> Result<Value> {
        self.interpreter.pop()
    }

    /// Pop an integer on behalf of `word`.
    pub fn pop_int(&mut self, word: &str) -> Result<i64> {
        let value = self.pop()?;
        let text = value.text();
        text.trim()
            .parse::<i64>()
            .map_err(|_| CueError::command(word, format!("expected an integer, got {text}")))
    }

    /// Pop a number on behalf of `word`.
    pub fn pop_float(&mut self, word: &str) -> Result<f64> {
        let value = self.pop()?;
        let text = value.text();
        text.trim()
            .parse::<f64>()
            .map_err(|_| CueError::command(word, format!("expected a number, got {text}")))
    }

    /// Pop an item on behalf of `word`.
    pub fn pop_item(&mut self, word: &str) -> Result<ItemRef> {
        match self.pop()? {
            Value::Item(item) => Ok(item),
            Value::Literal(text) => Err(CueError::command(word, format!("not an item: {text}"))),
        }
    }

    /// Tokenize `line` and dispatch every token.
    ///
    /// The first failing token aborts the rest of the line and resets any
    /// pending word.
    pub fn define(&mut self, line: &str) -> Result<()> {
        log::debug!("define: {line}");
        let result = tokenize(line).and_then(|tokens| {
            tokens
                .iter()
                .try_for_each(|token| self.interpret(token).map(|_| ()))
        });
        if result.is_err() {
            self.arg_state = ArgState::Idle;
        }
        result
    }

    /// Append text to the output.
    pub fn output(&mut self, text: &str) {
        self.interpreter.output(text);
    }

    /// Drain the output produced since the last call.
    pub fn take_output(&mut self) -> Vec<String> {
        self.interpreter.take_output()
    }

    pub(crate) fn signal(&mut self, signal: Signal) {
        self.signals.push(signal);
    }

    /// Drain the signals raised since the last call.
    pub fn take_signals(&mut self) -> Vec<Signal> {
        std::mem::take(&mut self.signals)
    }

    // -- Pending words --

    fn feed(&mut self, pending: PendingWord, token: &str) -> Result<()> {
        match pending {
            PendingWord::Include => self.include(token),
            PendingWord::Store { mut props } => {
                if token == STORE_END {
                    self.apply_store(props)
                } else {
                    props.push(token.to_string());
                    self.arg_state = ArgState::AwaitingArgument(PendingWord::Store { props });
                    Ok(())
                }
            },
        }
    }

    fn apply_store(&mut self, props: Vec<String>) -> Result<()> {
        for prop in props {
            let Some((name, value)) = prop.split_once('=') else {
                return Err(CueError::command("store", format!("expected name=value, got {prop}")));
            };
            let value = if value.contains("%s") {
                let replacement = self.pop()?.text();
                value.replace("%s", &replacement)
            } else {
                value.to_string()
            };
            if !self.player.set_store_property(name, &value) {
                log::warn!("store has no property {name}, ignoring");
            }
        }
        Ok(())
    }

    /// Locate a script: as given, then relative to each include directory.
    pub fn resolve_include(&self, name: &str) -> Option<PathBuf> {
        let direct = Path::new(name);
        if direct.exists() {
            return Some(direct.to_path_buf());
        }
        if direct.is_absolute() {
            return None;
        }
        self.include_dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|path| path.exists())
    }

    /// Define every line of the script `name`.
    pub fn include(&mut self, name: &str) -> Result<()> {
        let path = self
            .resolve_include(name)
            .ok_or_else(|| CueError::command("include", format!("Unable to locate {name}")))?;
        if self.include_depth >= MAX_INCLUDE_DEPTH {
            return Err(CueError::command("include", "includes nested too deeply"));
        }
        let script = std::fs::read_to_string(&path)?;
        log::info!("including {}", path.display());

        self.include_depth += 1;
        let result = script
            .lines()
            .enumerate()
            .try_for_each(|(index, line)| {
                self.define(line).inspect_err(|e| {
                    log::warn!("{}:{}: {e}", path.display(), index + 1);
                })
            });
        self.include_depth -= 1;
        result
    }
}
