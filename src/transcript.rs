//! Offline reconstruction of stored answers.
//!
//! A stored answer is one string or a list of chunk strings, in the same
//! `data: {...}` wire format the live path consumes. Reconstruction follows
//! the live interpreter except that a malformed frame keeps its raw line.

use crate::error::{AssemblerError, Result};
use crate::interpreter::{EventInterpreter, LineEffect};
use crate::wire::{StoredAnswer, DATA_PREFIX};

/// Decode the JSON form of a stored answer: a string or an array of strings.
pub fn parse_stored(json: &str) -> Result<StoredAnswer> {
    serde_json::from_str(json).map_err(|e| AssemblerError::Transcript(e.to_string()))
}

/// Rebuild the logical text the streaming path would have produced.
pub fn normalize_transcript(answer: &StoredAnswer) -> String {
    match answer {
        StoredAnswer::Single(text) => normalize_text(text),
        StoredAnswer::Chunks(chunks) => normalize_chunks(chunks),
    }
}

fn has_frames(text: &str) -> bool {
    text.lines().any(|line| line.trim_start().starts_with(DATA_PREFIX))
}

fn fold_lines(interp: &mut EventInterpreter, text: &str, out: &mut String) {
    for line in text.lines() {
        if let LineEffect::Append(delta) = interp.interpret(line) {
            out.push_str(&delta);
        }
    }
}

/// A string without any `data: ` line is plain stored markdown and is kept
/// verbatim.
pub fn normalize_text(text: &str) -> String {
    if !has_frames(text) {
        return text.to_string();
    }
    let mut interp = EventInterpreter::historical();
    let mut out = String::new();
    fold_lines(&mut interp, text, &mut out);
    out
}

/// Framed chunks are interpreted line by line; unframed chunks are raw
/// fragments and concatenate verbatim.
pub fn normalize_chunks(chunks: &[String]) -> String {
    let mut interp = EventInterpreter::historical();
    let mut out = String::new();
    for chunk in chunks {
        if has_frames(chunk) {
            fold_lines(&mut interp, chunk, &mut out);
        } else {
            out.push_str(chunk);
        }
    }
    out
}
