//! Line tokenizer for the command language.
//!
//! Pieces are separated by single spaces. A piece starting with `#` begins a
//! trailing comment. A piece is glued onto the previous token while that
//! token has an unbalanced `"` or ends in a continuation backslash, which is
//! how quoted arguments containing spaces survive the split.

use cuebox_types::error::{CueError, Result};

fn quote_count(token: &str) -> usize {
    token.matches('"').count()
}

fn continues(token: &str) -> bool {
    quote_count(token) % 2 != 0 || token.ends_with('\\')
}

fn is_wrapped(token: &str, quote: char) -> bool {
    token.len() >= 2 && token.starts_with(quote) && token.ends_with(quote)
}

/// Strip one layer of matching quotes, or clean up an unquoted token.
fn finish(token: String) -> String {
    if is_wrapped(&token, '"') || is_wrapped(&token, '\'') {
        token[1..token.len() - 1].to_string()
    } else {
        token.replace('\\', "").replace('"', "'")
    }
}

/// Split a command line into tokens.
///
/// Returns [`CueError::Parse`] when the line ends inside a double-quoted
/// token.
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut merged: Vec<String> = Vec::new();

    for piece in line.split(' ') {
        if piece.starts_with('#') {
            break;
        }
        match merged.last_mut() {
            Some(last) if continues(last) => {
                last.push(' ');
                last.push_str(piece);
            },
            _ if !piece.is_empty() => merged.push(piece.to_string()),
            _ => {},
        }
    }

    if let Some(last) = merged.last()
        && quote_count(last) % 2 != 0
    {
        return Err(CueError::Parse(format!("unterminated quote in {last}")));
    }

    Ok(merged.into_iter().map(finish).collect())
}

/// Whether `token` reads back unchanged when written bare.
fn is_bare(token: &str) -> bool {
    !token.is_empty()
        && !token.starts_with('#')
        && !is_wrapped(token, '\'')
        && !token.contains([' ', '"', '\\'])
}

/// Join tokens into a line that [`tokenize`] splits back into the same
/// tokens.
pub fn join_tokens<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|token| {
            let token = token.as_ref();
            if is_bare(token) {
                token.to_string()
            } else if token.contains('"') {
                format!("'{token}'")
            } else {
                format!("\"{token}\"")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
