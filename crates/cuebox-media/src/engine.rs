//! A minimal value-stack engine.
//!
//! Tokens are classified in order: native words, numbers, `name=value`
//! property assignments on the top item, URIs opened through the
//! [`MediaFactory`], and finally plain literals.

use cuebox_types::backend::{ENGINE_OK, Engine, Value};

use crate::factory::{MediaFactory, is_uri};

/// Words understood natively, in `dict` order.
const WORDS: &[&str] = &[
    ".", "dot", "dup", "drop", "swap", "over", "clear", "depth", "dict", "+", "-", "*", "/",
];

type Step = std::result::Result<(), String>;

/// Value stack with a single fetch slot and a text output channel.
#[derive(Debug)]
pub struct StackEngine {
    factory: MediaFactory,
    stack: Vec<Value>,
    slot: Option<Value>,
    result: String,
    stdout: String,
}

impl StackEngine {
    pub fn new(factory: MediaFactory) -> Self {
        Self {
            factory,
            stack: Vec::new(),
            slot: None,
            result: ENGINE_OK.to_string(),
            stdout: String::new(),
        }
    }

    /// Number of values on the stack.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Top of stack without removing it.
    pub fn peek(&self) -> Option<&Value> {
        self.stack.last()
    }

    fn pop(&mut self) -> std::result::Result<Value, String> {
        self.stack.pop().ok_or_else(|| "stack underflow".to_string())
    }

    fn pop_number(&mut self) -> std::result::Result<f64, String> {
        let value = self.pop()?;
        value
            .text()
            .parse::<f64>()
            .map_err(|_| format!("not a number: {value}"))
    }

    fn print(&mut self, text: &str) {
        self.stdout.push_str(text);
        if !text.ends_with('\n') {
            self.stdout.push('\n');
        }
    }

    fn execute(&mut self, token: &str) -> Step {
        match token {
            "." => {
                let value = self.pop()?;
                self.print(&value.text());
                self.slot = Some(value);
            },
            "dot" => {
                let value = self.pop()?;
                self.slot = Some(value);
            },
            "dup" => {
                let top = self.stack.last().cloned().ok_or("stack underflow")?;
                self.stack.push(top);
            },
            "drop" => {
                self.pop()?;
            },
            "swap" => {
                let len = self.stack.len();
                if len < 2 {
                    return Err("stack underflow".to_string());
                }
                self.stack.swap(len - 1, len - 2);
            },
            "over" => {
                let len = self.stack.len();
                if len < 2 {
                    return Err("stack underflow".to_string());
                }
                self.stack.push(self.stack[len - 2].clone());
            },
            "clear" => self.stack.clear(),
            "depth" => self
                .stack
                .push(Value::Literal(self.stack.len().to_string())),
            "dict" => {
                let words = WORDS.join(", ");
                self.print(&words);
            },
            "+" | "-" | "*" | "/" => self.arithmetic(token)?,
            _ => self.literal(token)?,
        }
        Ok(())
    }

    fn arithmetic(&mut self, op: &str) -> Step {
        let rhs = self.pop_number()?;
        let lhs = self.pop_number()?;
        let value = match op {
            "+" => lhs + rhs,
            "-" => lhs - rhs,
            "*" => lhs * rhs,
            _ => {
                if rhs == 0.0 {
                    return Err("division by zero".to_string());
                }
                lhs / rhs
            },
        };
        self.stack.push(Value::Literal(format_number(value)));
        Ok(())
    }

    fn literal(&mut self, token: &str) -> Step {
        if token.parse::<f64>().is_ok() {
            self.stack.push(Value::Literal(token.to_string()));
            return Ok(());
        }
        if let Some((name, value)) = token.split_once('=')
            && !name.is_empty()
        {
            let item = match self.stack.last() {
                Some(Value::Item(item)) => item,
                _ => return Err("top of stack is not an item".to_string()),
            };
            return item.set_property(name, value).map_err(|e| e.to_string());
        }
        if is_uri(token) {
            let item = self.factory.open(token).map_err(|e| e.to_string())?;
            self.stack.push(Value::Item(item));
            return Ok(());
        }
        self.stack.push(Value::Literal(token.to_string()));
        Ok(())
    }
}

impl Default for StackEngine {
    fn default() -> Self {
        Self::new(MediaFactory::new())
    }
}

/// Integral values print without a fractional part.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

impl Engine for StackEngine {
    fn push(&mut self, token: &str) {
        self.result = match self.execute(token) {
            Ok(()) => ENGINE_OK.to_string(),
            Err(message) => message,
        };
    }

    fn push_value(&mut self, value: Value) {
        self.stack.push(value);
        self.result = ENGINE_OK.to_string();
    }

    fn result(&self) -> &str {
        &self.result
    }

    fn take_stdout(&mut self) -> String {
        std::mem::take(&mut self.stdout)
    }

    fn fetch_slot(&mut self) -> Option<Value> {
        self.slot.take()
    }

    fn dictionary(&self) -> Vec<String> {
        WORDS.iter().map(|w| w.to_string()).collect()
    }
}
