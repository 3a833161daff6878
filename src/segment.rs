//! Segment parser: turns accumulated answer text into typed segments.
//!
//! Fences are found with an explicit scan rather than a backtracking
//! pattern. An opening fence is three backticks, an optional language word,
//! optional blanks and a newline; the body runs to the first following
//! three-backtick marker. Only the special language becomes a code segment.
//! Every other fenced block is demoted to text with its markers stripped.
//!
//! In streaming mode an unterminated block consumes the rest of the input as
//! a tail; in final mode it stays literal text. Prose between blocks is split
//! on runs of three or more underscores into logic blocks. Fenced bodies are
//! never split.

use serde::Serialize;

use crate::block_id::assign_ids;
use crate::config::{language_matches, AssemblerConfig};

const FENCE: &str = "```";

/// One node of a parsed answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Text {
        content: String,
    },
    /// A complete fenced block in the special language.
    Code {
        language: String,
        content: String,
        id: String,
    },
    /// A special-language block whose closing fence has not arrived yet.
    StreamingCode {
        language: String,
        content: String,
        id: String,
    },
}

impl Segment {
    pub fn text(content: impl Into<String>) -> Self {
        Segment::Text { content: content.into() }
    }

    pub fn content(&self) -> &str {
        match self {
            Segment::Text { content }
            | Segment::Code { content, .. }
            | Segment::StreamingCode { content, .. } => content,
        }
    }

    pub fn language(&self) -> Option<&str> {
        match self {
            Segment::Text { .. } => None,
            Segment::Code { language, .. } | Segment::StreamingCode { language, .. } => {
                Some(language)
            }
        }
    }

    /// Block ID of a code segment. Empty until ids have been assigned.
    pub fn id(&self) -> Option<&str> {
        match self {
            Segment::Text { .. } => None,
            Segment::Code { id, .. } | Segment::StreamingCode { id, .. } => Some(id),
        }
    }

    pub fn is_code(&self) -> bool {
        !matches!(self, Segment::Text { .. })
    }
}

/// A span separated from its neighbours by an underscore rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogicBlock {
    pub segments: Vec<Segment>,
}

/// Collapse non-breaking spaces and normalize CRLF / lone CR to LF.
pub fn normalize(content: &str) -> String {
    content
        .replace('\u{a0}', " ")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

/// Parse `content` into segments without logic-block splitting.
///
/// Code segments come back with empty ids; see [`crate::block_id`].
pub fn parse_segments(content: &str, is_streaming: bool, special_language: &str) -> Vec<Segment> {
    let normalized = normalize(content);
    scan(&normalized, is_streaming)
        .into_iter()
        .map(|piece| piece.into_segment(special_language))
        .collect()
}

/// Parse `content` into logic blocks. Empty blocks are dropped.
pub fn parse_logic_blocks(
    content: &str,
    is_streaming: bool,
    special_language: &str,
) -> Vec<LogicBlock> {
    let normalized = normalize(content);

    let mut grouped: Vec<Vec<Piece>> = vec![Vec::new()];
    for piece in scan(&normalized, is_streaming) {
        match piece {
            Piece::Prose(text) => {
                for (i, part) in split_on_rules(&text).into_iter().enumerate() {
                    if i > 0 {
                        grouped.push(Vec::new());
                    }
                    if !part.is_empty() {
                        push_piece(&mut grouped, Piece::Prose(part.to_string()));
                    }
                }
            }
            fenced => push_piece(&mut grouped, fenced),
        }
    }

    grouped
        .into_iter()
        .map(|pieces| LogicBlock {
            segments: pieces
                .into_iter()
                .map(|p| p.into_segment(special_language))
                .collect(),
        })
        .filter(|block| !block.segments.is_empty())
        .collect()
}

/// Parse one message into logic blocks with block ids assigned.
pub fn parse_message(
    message_id: &str,
    content: &str,
    is_streaming: bool,
    config: &AssemblerConfig,
) -> Vec<LogicBlock> {
    let mut blocks = parse_logic_blocks(content, is_streaming, &config.special_language);
    assign_ids(
        message_id,
        blocks.iter_mut().flat_map(|b| b.segments.iter_mut()),
        config.id_scheme,
    );
    blocks
}

fn push_piece(grouped: &mut [Vec<Piece>], piece: Piece) {
    if let Some(last) = grouped.last_mut() {
        last.push(piece);
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Prose(String),
    Fenced { language: String, body: String, closed: bool },
}

impl Piece {
    fn into_segment(self, special_language: &str) -> Segment {
        match self {
            Piece::Prose(content) => Segment::Text { content },
            Piece::Fenced { language, body, closed } => {
                let content = body.trim_matches('\n').to_string();
                if !language_matches(&language, special_language) {
                    return Segment::Text { content };
                }
                let id = String::new();
                if closed {
                    Segment::Code { language, content, id }
                } else {
                    Segment::StreamingCode { language, content, id }
                }
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Opening {
    /// Complete opening line; the body starts at `body_start`.
    Line { language: String, body_start: usize },
    NotAFence,
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn read_opening(s: &str, at: usize) -> Opening {
    let bytes = s.as_bytes();
    let lang_start = at + FENCE.len();
    let mut p = lang_start;
    while p < bytes.len() && is_word_byte(bytes[p]) {
        p += 1;
    }
    let language = s[lang_start..p].to_string();
    while p < bytes.len() && (bytes[p] == b' ' || bytes[p] == b'\t') {
        p += 1;
    }

    // an opening line still being typed stays literal until its newline
    if p < bytes.len() && bytes[p] == b'\n' {
        Opening::Line { language, body_start: p + 1 }
    } else {
        Opening::NotAFence
    }
}

fn scan(s: &str, streaming: bool) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut text_start = 0;
    let mut search = 0;

    while let Some(rel) = s[search..].find(FENCE) {
        let open = search + rel;
        match read_opening(s, open) {
            Opening::Line { language, body_start } => match s[body_start..].find(FENCE) {
                Some(rel_close) => {
                    let close = body_start + rel_close;
                    push_prose(&mut pieces, &s[text_start..open]);
                    pieces.push(Piece::Fenced {
                        language,
                        body: s[body_start..close].to_string(),
                        closed: true,
                    });
                    text_start = close + FENCE.len();
                    search = text_start;
                }
                None if streaming => {
                    push_prose(&mut pieces, &s[text_start..open]);
                    pieces.push(Piece::Fenced {
                        language,
                        body: s[body_start..].to_string(),
                        closed: false,
                    });
                    return pieces;
                }
                // no later marker exists, so nothing further can match
                None => break,
            },
            Opening::NotAFence => search = open + 1,
        }
    }

    push_prose(&mut pieces, &s[text_start..]);
    pieces
}

fn push_prose(pieces: &mut Vec<Piece>, text: &str) {
    if !text.is_empty() {
        pieces.push(Piece::Prose(text.to_string()));
    }
}

/// Split on runs of three or more underscores, dropping the runs.
fn split_on_rules(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' {
            let run_start = i;
            while i < bytes.len() && bytes[i] == b'_' {
                i += 1;
            }
            if i - run_start >= 3 {
                parts.push(&text[start..run_start]);
                start = i;
            }
        } else {
            i += 1;
        }
    }
    parts.push(&text[start..]);
    parts
}
