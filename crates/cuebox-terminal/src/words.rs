//! Recognized words.
//!
//! Stack effects in `usage` follow the `(before -- after)` convention.

use std::sync::Arc;

use cuebox_types::backend::{ItemRef, Value};
use cuebox_types::error::{CueError, Result};

use crate::dispatcher::{ArgState, Dispatcher, PendingWord, Signal, Word};
use crate::tokenizer::join_tokens;

/// Register every recognized word into a dispatcher.
pub fn register_words(d: &mut Dispatcher) {
    // Transport and playlist.
    d.register(Arc::new(DotWord));
    d.register(Arc::new(AddWord));
    d.register(Arc::new(GrabWord));
    d.register(Arc::new(InsertWord));
    d.register(Arc::new(NextWord));
    d.register(Arc::new(PrevWord));
    d.register(Arc::new(SeekWord));
    d.register(Arc::new(SpeedWord));
    d.register(Arc::new(SpeedQueryWord));
    d.register(Arc::new(PositionQueryWord));
    d.register(Arc::new(StatusQueryWord));
    d.register(Arc::new(GenerationQueryWord));
    // Inspection.
    d.register(Arc::new(PlayingWord));
    d.register(Arc::new(PlaylistWord));
    d.register(Arc::new(PreviousWord));
    d.register(Arc::new(RenderWord));
    d.register(Arc::new(PropsWord));
    d.register(Arc::new(CloneWord));
    // Words collecting arguments.
    d.register(Arc::new(StoreWord));
    d.register(Arc::new(IncludeWord));
    // Shell.
    d.register(Arc::new(HelpWord));
    d.register(Arc::new(LogLevelWord));
    d.register(Arc::new(ServerWord));
    d.register(Arc::new(ExitWord));
    // Math.
    d.register(Arc::new(PowWord));
    d.register(Arc::new(TrigWord::Sin));
    d.register(Arc::new(TrigWord::Cos));
    d.register(Arc::new(TrigWord::Tan));
}

/// Render an item as a line that defines it again.
pub fn render_item(item: &ItemRef) -> String {
    let mut tokens = vec![item.uri()];
    tokens.extend(
        item.properties()
            .into_iter()
            .map(|(name, value)| format!("{name}={value}")),
    );
    join_tokens(&tokens)
}

/// Render any value: literals verbatim, items via [`render_item`].
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Literal(text) => text.clone(),
        Value::Item(item) => render_item(item),
    }
}

// ---------------------------------------------------------------------------
// .
// ---------------------------------------------------------------------------

struct DotWord;
impl Word for DotWord {
    fn name(&self) -> &str {
        "."
    }
    fn description(&self) -> &str {
        "Play the top of stack now, or print it if it has no frames"
    }
    fn usage(&self) -> &str {
        "(x --)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        match d.pop()? {
            Value::Item(item) if item.frames() > 0 => d.player().set(item),
            value => {
                let text = render_value(&value);
                if !text.is_empty() {
                    d.output(&text);
                }
            },
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// add
// ---------------------------------------------------------------------------

struct AddWord;
impl Word for AddWord {
    fn name(&self) -> &str {
        "add"
    }
    fn description(&self) -> &str {
        "Append an item to the playlist"
    }
    fn usage(&self) -> &str {
        "(item --)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        let item = d.pop_item(self.name())?;
        if item.frames() > 0 {
            d.player().add(item);
        } else {
            log::debug!("not queueing {}: no frames", item.uri());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// grab
// ---------------------------------------------------------------------------

struct GrabWord;
impl Word for GrabWord {
    fn name(&self) -> &str {
        "grab"
    }
    fn description(&self) -> &str {
        "Take an item from the playlist (0..), current (-1) or history (-2..)"
    }
    fn usage(&self) -> &str {
        "(index -- item?)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        let index = d.pop_int(self.name())?;
        match d.player().grab(index) {
            Some(item) => d.push_value(Value::Item(item)),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// insert
// ---------------------------------------------------------------------------

struct InsertWord;
impl Word for InsertWord {
    fn name(&self) -> &str {
        "insert"
    }
    fn description(&self) -> &str {
        "Insert an item into the playlist (appends when out of range)"
    }
    fn usage(&self) -> &str {
        "(item index --)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        let index = d.pop_int(self.name())?;
        let item = d.pop_item(self.name())?;
        d.player().insert(index, item);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// next / prev
// ---------------------------------------------------------------------------

struct NextWord;
impl Word for NextWord {
    fn name(&self) -> &str {
        "next"
    }
    fn description(&self) -> &str {
        "Move to the next playlist entry"
    }
    fn usage(&self) -> &str {
        "(--)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        d.player().next();
        Ok(())
    }
}

struct PrevWord;
impl Word for PrevWord {
    fn name(&self) -> &str {
        "prev"
    }
    fn description(&self) -> &str {
        "Return to the most recently played item"
    }
    fn usage(&self) -> &str {
        "(--)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        d.player().prev();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// seek
// ---------------------------------------------------------------------------

struct SeekWord;
impl Word for SeekWord {
    fn name(&self) -> &str {
        "seek"
    }
    fn description(&self) -> &str {
        "Seek the current item (negative counts from the end)"
    }
    fn usage(&self) -> &str {
        "(position --)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        let position = d.pop_int(self.name())?;
        match d.player().seek(position) {
            Err(CueError::Timeout(what)) => {
                // The target stays recorded and is applied on the next step.
                log::warn!("timed out waiting for {what}, seek to {position} still pending");
                Ok(())
            },
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// speed / speed?
// ---------------------------------------------------------------------------

struct SpeedWord;
impl Word for SpeedWord {
    fn name(&self) -> &str {
        "speed"
    }
    fn description(&self) -> &str {
        "Set the playout speed (0 pauses, negative plays backwards)"
    }
    fn usage(&self) -> &str {
        "(n --)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        let speed = d.pop_int(self.name())?;
        d.player().set_speed(speed);
        Ok(())
    }
}

struct SpeedQueryWord;
impl Word for SpeedQueryWord {
    fn name(&self) -> &str {
        "speed?"
    }
    fn description(&self) -> &str {
        "Push the playout speed"
    }
    fn usage(&self) -> &str {
        "(-- n)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        let speed = d.player().speed();
        d.push_literal(speed.to_string())
    }
}

// ---------------------------------------------------------------------------
// position?
// ---------------------------------------------------------------------------

struct PositionQueryWord;
impl Word for PositionQueryWord {
    fn name(&self) -> &str {
        "position?"
    }
    fn description(&self) -> &str {
        "Push the position of the current item (-1 before the first play)"
    }
    fn usage(&self) -> &str {
        "(-- n)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        let position = d.player().position();
        d.push_literal(position.to_string())
    }
}

// ---------------------------------------------------------------------------
// status?
// ---------------------------------------------------------------------------

struct StatusQueryWord;
impl Word for StatusQueryWord {
    fn name(&self) -> &str {
        "status?"
    }
    fn description(&self) -> &str {
        "Print speed, position and frame count of the current item"
    }
    fn usage(&self) -> &str {
        "(--)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        let snapshot = d.player().snapshot();
        let (frames, position, speed) = match &snapshot.current {
            Some(item) => (item.frames(), snapshot.position, snapshot.speed),
            None => (0, 0, 0),
        };
        for value in [frames, position, speed] {
            d.push_literal(value.to_string())?;
        }
        for _ in 0..3 {
            d.push(".")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// generation?
// ---------------------------------------------------------------------------

struct GenerationQueryWord;
impl Word for GenerationQueryWord {
    fn name(&self) -> &str {
        "generation?"
    }
    fn description(&self) -> &str {
        "Push the coordinator's change counter"
    }
    fn usage(&self) -> &str {
        "(-- n)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        let generation = d.player().generation();
        d.push_literal(generation.to_string())
    }
}

// ---------------------------------------------------------------------------
// playing / playlist / previous
// ---------------------------------------------------------------------------

struct PlayingWord;
impl Word for PlayingWord {
    fn name(&self) -> &str {
        "playing"
    }
    fn description(&self) -> &str {
        "Print the current item"
    }
    fn usage(&self) -> &str {
        "(--)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        if let Some(item) = d.player().current() {
            d.output(&render_item(&item));
        }
        Ok(())
    }
}

struct PlaylistWord;
impl Word for PlaylistWord {
    fn name(&self) -> &str {
        "playlist"
    }
    fn description(&self) -> &str {
        "Print the queued items"
    }
    fn usage(&self) -> &str {
        "(--)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        for item in d.player().snapshot().playlist {
            d.output(&render_item(&item));
        }
        Ok(())
    }
}

struct PreviousWord;
impl Word for PreviousWord {
    fn name(&self) -> &str {
        "previous"
    }
    fn description(&self) -> &str {
        "Print the recently played items, oldest first"
    }
    fn usage(&self) -> &str {
        "(--)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        for item in d.player().snapshot().history {
            d.output(&render_item(&item));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// render / props
// ---------------------------------------------------------------------------

struct RenderWord;
impl Word for RenderWord {
    fn name(&self) -> &str {
        "render"
    }
    fn description(&self) -> &str {
        "Print the top of stack without removing it"
    }
    fn usage(&self) -> &str {
        "(x -- x)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        let value = d.pop()?;
        d.output(&render_value(&value));
        d.push_value(value)
    }
}

struct PropsWord;
impl Word for PropsWord {
    fn name(&self) -> &str {
        "props"
    }
    fn description(&self) -> &str {
        "Print the properties of the top item as JSON"
    }
    fn usage(&self) -> &str {
        "(item -- item)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        let item = d.pop_item(self.name())?;
        let json = serde_json::to_string(&item.properties())?;
        d.output(&json);
        d.push_value(Value::Item(item))
    }
}

// ---------------------------------------------------------------------------
// clone
// ---------------------------------------------------------------------------

/// Reopens the top item from its URI and properties. Queuing the same item
/// twice shares one read position; a clone has its own.
struct CloneWord;
impl Word for CloneWord {
    fn name(&self) -> &str {
        "clone"
    }
    fn description(&self) -> &str {
        "Push an independent copy of the top item"
    }
    fn usage(&self) -> &str {
        "(item -- item copy)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        let item = d.pop_item(self.name())?;
        let uri = item.uri();
        let properties = item.properties();
        d.push_value(Value::Item(item))?;
        d.push(&uri)?;
        for (name, value) in properties {
            d.push(&format!("{name}={value}"))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// store
// ---------------------------------------------------------------------------

struct StoreWord;
impl Word for StoreWord {
    fn name(&self) -> &str {
        "store"
    }
    fn description(&self) -> &str {
        "Collect name=value tokens until '.' and apply them to the first store"
    }
    fn usage(&self) -> &str {
        "store name=value ... ."
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        d.set_arg_state(ArgState::AwaitingArgument(PendingWord::Store {
            props: Vec::new(),
        }));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// include
// ---------------------------------------------------------------------------

struct IncludeWord;
impl Word for IncludeWord {
    fn name(&self) -> &str {
        "include"
    }
    fn description(&self) -> &str {
        "Run each line of a script"
    }
    fn usage(&self) -> &str {
        "include <path>"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        d.set_arg_state(ArgState::AwaitingArgument(PendingWord::Include));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// help
// ---------------------------------------------------------------------------

struct HelpWord;
impl Word for HelpWord {
    fn name(&self) -> &str {
        "help"
    }
    fn description(&self) -> &str {
        "List engine words and shell extensions"
    }
    fn usage(&self) -> &str {
        "(--)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        let dictionary = d.interpreter().engine().dictionary().join(", ");
        d.output(&dictionary);
        d.output("");
        d.output("Shell extensions:");
        let lines: Vec<String> = d
            .words()
            .iter()
            .map(|w| format!("  {:<12} {:<22} {}", w.name(), w.usage(), w.description()))
            .collect();
        for line in lines {
            d.output(&line);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// log_level
// ---------------------------------------------------------------------------

fn level_filter(level: i64) -> Option<log::LevelFilter> {
    use log::LevelFilter;
    match level {
        0 => Some(LevelFilter::Off),
        1 => Some(LevelFilter::Error),
        2 => Some(LevelFilter::Warn),
        3 => Some(LevelFilter::Info),
        4 => Some(LevelFilter::Debug),
        5 => Some(LevelFilter::Trace),
        _ => None,
    }
}

struct LogLevelWord;
impl Word for LogLevelWord {
    fn name(&self) -> &str {
        "log_level"
    }
    fn description(&self) -> &str {
        "Set the log level (0 off, 1 error .. 5 trace)"
    }
    fn usage(&self) -> &str {
        "(n --)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        let level = d.pop_int(self.name())?;
        let filter = level_filter(level)
            .ok_or_else(|| CueError::command(self.name(), format!("no log level {level}")))?;
        log::set_max_level(filter);
        log::info!("log level set to {filter}");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// server / exit
// ---------------------------------------------------------------------------

struct ServerWord;
impl Word for ServerWord {
    fn name(&self) -> &str {
        "server"
    }
    fn description(&self) -> &str {
        "Start the network server on a port (auxiliary endpoint on port + 1)"
    }
    fn usage(&self) -> &str {
        "(port --)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        let port = d.pop_int(self.name())?;
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| CueError::command(self.name(), format!("invalid port {port}")))?;
        d.signal(Signal::StartServer { port });
        Ok(())
    }
}

struct ExitWord;
impl Word for ExitWord {
    fn name(&self) -> &str {
        "exit"
    }
    fn description(&self) -> &str {
        "Leave the shell or close the connection"
    }
    fn usage(&self) -> &str {
        "(--)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        d.signal(Signal::Exit);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ** / sin / cos / tan
// ---------------------------------------------------------------------------

struct PowWord;
impl Word for PowWord {
    fn name(&self) -> &str {
        "**"
    }
    fn description(&self) -> &str {
        "Raise x to the power y"
    }
    fn usage(&self) -> &str {
        "(x y -- x**y)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        let y = d.pop_float(self.name())?;
        let x = d.pop_float(self.name())?;
        d.push_literal(x.powf(y).to_string())
    }
}

enum TrigWord {
    Sin,
    Cos,
    Tan,
}

impl Word for TrigWord {
    fn name(&self) -> &str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
        }
    }
    fn description(&self) -> &str {
        match self {
            Self::Sin => "Sine of x (radians)",
            Self::Cos => "Cosine of x (radians)",
            Self::Tan => "Tangent of x (radians)",
        }
    }
    fn usage(&self) -> &str {
        "(x -- y)"
    }
    fn execute(&self, d: &mut Dispatcher) -> Result<()> {
        let x = d.pop_float(self.name())?;
        let y = match self {
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Tan => x.tan(),
        };
        d.push_literal(y.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use cuebox_media::NullStore;
    use cuebox_player::Player;
    use cuebox_types::config::PlayerConfig;

    use super::*;

    fn dispatcher() -> Dispatcher {
        Dispatcher::with_stack_engine(Player::new(PlayerConfig::default()))
    }

    fn run(d: &mut Dispatcher, line: &str) -> Vec<String> {
        d.define(line).unwrap();
        d.take_output()
    }

    fn queued_frames(d: &Dispatcher) -> Vec<i64> {
        d.player()
            .snapshot()
            .playlist
            .iter()
            .map(|item| item.frames())
            .collect()
    }

    #[test]
    fn dot_plays_items_with_frames() {
        let mut d = dispatcher();
        d.define("test: frames=5 add 3 speed").unwrap();
        d.define("test: frames=8 .").unwrap();
        assert_eq!(queued_frames(&d), vec![8]);
        assert_eq!(d.player().speed(), 1);
    }

    #[test]
    fn dot_prints_everything_else() {
        let mut d = dispatcher();
        assert_eq!(run(&mut d, "hello ."), vec!["hello"]);
        assert_eq!(run(&mut d, "test: frames=0 ."), vec!["test: fps=25 frames=0"]);
        assert!(queued_frames(&d).is_empty());
    }

    #[test]
    fn add_skips_empty_items() {
        let mut d = dispatcher();
        d.define("test: frames=0 add test: frames=4 add").unwrap();
        assert_eq!(queued_frames(&d), vec![4]);
    }

    #[test]
    fn add_rejects_literals() {
        let mut d = dispatcher();
        let err = d.define("5 add").unwrap_err();
        assert_eq!(err.to_string(), "not an item: 5 (add)");
    }

    #[test]
    fn grab_and_insert_reorder() {
        let mut d = dispatcher();
        d.define("test: frames=1 add test: frames=2 add test: frames=3 add")
            .unwrap();
        d.define("1 grab 0 insert").unwrap();
        assert_eq!(queued_frames(&d), vec![2, 1, 3]);
        d.define("test: frames=4 99 insert").unwrap();
        assert_eq!(queued_frames(&d), vec![2, 1, 3, 4]);
    }

    #[test]
    fn grab_out_of_range_pushes_nothing() {
        let mut d = dispatcher();
        d.define("7 grab").unwrap();
        assert!(d.pop().is_err());
    }

    #[test]
    fn speed_round_trip() {
        let mut d = dispatcher();
        assert_eq!(run(&mut d, "-2 speed speed? ."), vec!["-2"]);
        assert_eq!(d.player().speed(), -2);
    }

    #[test]
    fn queries_when_idle() {
        let mut d = dispatcher();
        assert_eq!(run(&mut d, "position? ."), vec!["-1"]);
        assert_eq!(run(&mut d, "status?"), vec!["0", "0", "0"]);
        let generation = run(&mut d, "generation? .");
        assert_eq!(generation, vec![d.player().generation().to_string()]);
    }

    #[test]
    fn seek_without_current_item() {
        let mut d = dispatcher();
        d.define("10 seek").unwrap();
        assert!(!d.player().snapshot().seek_pending);
    }

    #[test]
    fn status_reports_current_item() {
        let player = Player::with_stores(
            PlayerConfig {
                idle_wait_ms: 5,
                ..Default::default()
            },
            vec![Box::new(NullStore::new())],
        );
        player.start().unwrap();
        let mut d = Dispatcher::with_stack_engine(player.clone());
        d.define("test: frames=5 add").unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while player.position() != 4 {
            assert!(Instant::now() < deadline, "item never reached its last frame");
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(run(&mut d, "status?"), vec!["1", "4", "5"]);
        assert_eq!(run(&mut d, "playing"), vec!["test: fps=25 frames=5"]);
        player.shutdown();
    }

    #[test]
    fn listings_render_items() {
        let mut d = dispatcher();
        d.define("test: frames=3 add colour: add").unwrap();
        assert_eq!(
            run(&mut d, "playlist"),
            vec!["test: fps=25 frames=3", "colour: colour=black fps=25 frames=1"]
        );
        assert!(run(&mut d, "previous").is_empty());
        assert!(run(&mut d, "playing").is_empty());
    }

    #[test]
    fn rendered_item_defines_the_same_item() {
        let mut d = dispatcher();
        d.define(r#"test: frames=12 "@title=two words" render"#).unwrap();
        let line = d.take_output().remove(0);
        d.define("drop").unwrap();
        d.define(&format!("{line} add")).unwrap();
        let item = d.player().snapshot().playlist[0].clone();
        assert_eq!(item.frames(), 12);
        assert_eq!(item.properties()["@title"], "two words");
    }

    #[test]
    fn render_keeps_value() {
        let mut d = dispatcher();
        assert_eq!(run(&mut d, "hello render ."), vec!["hello", "hello"]);
    }

    #[test]
    fn props_prints_json() {
        let mut d = dispatcher();
        let output = run(&mut d, "test: frames=7 props");
        let props: serde_json::Value = serde_json::from_str(&output[0]).unwrap();
        assert_eq!(props["frames"], "7");
        assert_eq!(props["fps"], "25");
        d.define("add").unwrap();
        assert_eq!(queued_frames(&d), vec![7]);
    }

    #[test]
    fn clone_has_its_own_position() {
        let mut d = dispatcher();
        d.define("test: frames=40 clone").unwrap();
        let copy = d.pop_item("test").unwrap();
        let original = d.pop_item("test").unwrap();
        assert!(!Arc::ptr_eq(&copy, &original));
        assert_eq!(copy.uri(), original.uri());
        assert_eq!(copy.properties(), original.properties());

        original.seek(12, false);
        assert_eq!(original.position(), 12);
        assert_eq!(copy.position(), 0);
    }

    #[test]
    fn clone_can_queue_the_same_media_twice() {
        let mut d = dispatcher();
        d.define("colour:red frames=3 clone add add").unwrap();
        let playlist = d.player().snapshot().playlist;
        assert_eq!(playlist.len(), 2);
        assert!(!Arc::ptr_eq(&playlist[0], &playlist[1]));
        assert_eq!(render_item(&playlist[0]), render_item(&playlist[1]));
    }

    #[test]
    fn clone_needs_an_item() {
        let mut d = dispatcher();
        let err = d.define("5 clone").unwrap_err();
        assert_eq!(err.to_string(), "not an item: 5 (clone)");
    }

    #[test]
    fn props_needs_an_item() {
        let mut d = dispatcher();
        let err = d.define("5 props").unwrap_err();
        assert_eq!(err.to_string(), "not an item: 5 (props)");
    }

    #[test]
    fn help_lists_both_dictionaries() {
        let mut d = dispatcher();
        let output = run(&mut d, "help");
        assert!(output[0].contains("dup"));
        assert!(output.iter().any(|l| l.trim_start().starts_with("status?")));
        assert!(output.iter().any(|l| l.trim_start().starts_with("include")));
    }

    #[test]
    fn log_level_bounds() {
        assert_eq!(level_filter(0), Some(log::LevelFilter::Off));
        assert_eq!(level_filter(5), Some(log::LevelFilter::Trace));
        assert_eq!(level_filter(6), None);

        let mut d = dispatcher();
        let err = d.define("9 log_level").unwrap_err();
        assert_eq!(err.to_string(), "no log level 9 (log_level)");
    }

    #[test]
    fn math_words() {
        let mut d = dispatcher();
        assert_eq!(run(&mut d, "2 10 ** ."), vec!["1024"]);
        assert_eq!(run(&mut d, "0 sin ."), vec!["0"]);
        assert_eq!(run(&mut d, "0 cos ."), vec!["1"]);
        assert_eq!(run(&mut d, "0 tan ."), vec!["0"]);
        assert!(d.define("x sin").is_err());
    }

    #[test]
    fn server_validates_port() {
        let mut d = dispatcher();
        assert!(d.define("70000 server").is_err());
        assert!(d.define("0 server").is_err());
        assert!(d.take_signals().is_empty());
        d.define("55378 server").unwrap();
        assert_eq!(d.take_signals(), vec![Signal::StartServer { port: 55378 }]);
    }
}
