//! Per-message stream buffer and the sequential read loop that feeds it.

use std::pin::pin;

use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::error::{AssemblerError, Result};
use crate::frame::FrameDecoder;
use crate::interpreter::{EventInterpreter, LineEffect, ToolActivity};
use crate::message::ChatMessage;

/// Something a chunk contributed, reported to the caller in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    /// Text appended to the accumulated content.
    Delta(String),
    Tool(ToolActivity),
}

/// Accumulated state of one in-flight assistant message.
///
/// `accumulated_content` only ever grows while the stream runs.
#[derive(Debug, Clone)]
pub struct StreamBuffer {
    message_id: String,
    accumulated: String,
    decoder: FrameDecoder,
    interpreter: EventInterpreter,
}

impl StreamBuffer {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            accumulated: String::new(),
            decoder: FrameDecoder::new(),
            interpreter: EventInterpreter::default(),
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn accumulated_content(&self) -> &str {
        &self.accumulated
    }

    pub fn pending_partial_line(&self) -> String {
        self.decoder.pending_partial_line()
    }

    /// Fold one raw chunk into the buffer.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<StreamUpdate> {
        let lines = self.decoder.push(chunk);
        lines.iter().filter_map(|line| self.apply_line(line)).collect()
    }

    /// Flush a trailing unterminated line once the source is exhausted.
    pub fn finish(&mut self) -> Vec<StreamUpdate> {
        match self.decoder.finish() {
            Some(line) => self.apply_line(&line).into_iter().collect(),
            None => Vec::new(),
        }
    }

    fn apply_line(&mut self, line: &str) -> Option<StreamUpdate> {
        match self.interpreter.interpret(line) {
            LineEffect::Append(text) => {
                self.accumulated.push_str(&text);
                Some(StreamUpdate::Delta(text))
            }
            LineEffect::Tool(activity) => Some(StreamUpdate::Tool(activity)),
            LineEffect::Separator | LineEffect::Skipped => None,
        }
    }

    /// Final assistant message carrying the accumulated content.
    pub fn into_message(self) -> ChatMessage {
        ChatMessage::assistant(self.message_id, self.accumulated)
    }
}

/// Drive `chunks` to exhaustion, folding each chunk into `buffer` before the
/// next is polled.
///
/// `on_update` sees the buffer after every contribution. A transport error
/// ends the loop; content accumulated up to that point stays in `buffer`.
pub async fn read_stream<S, B, E, F>(buffer: &mut StreamBuffer, chunks: S, mut on_update: F) -> Result<()>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<AssemblerError>,
    F: FnMut(&StreamBuffer, &StreamUpdate),
{
    let mut chunks = pin!(chunks);
    let mut chunk_count = 0usize;
    info!(message_id = %buffer.message_id(), "answer stream started");

    while let Some(chunk) = chunks.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let e = e.into();
                warn!(message_id = %buffer.message_id(), error = %e, "answer stream failed");
                return Err(e);
            }
        };
        chunk_count += 1;
        for update in buffer.push_chunk(chunk.as_ref()) {
            on_update(buffer, &update);
        }
    }

    for update in buffer.finish() {
        on_update(buffer, &update);
    }
    debug!(message_id = %buffer.message_id(), chunks = chunk_count, "byte source exhausted");
    info!(
        message_id = %buffer.message_id(),
        bytes = buffer.accumulated_content().len(),
        "answer stream finished"
    );
    Ok(())
}
