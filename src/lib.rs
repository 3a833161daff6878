//! Streaming answer assembler for agent chat backends.
//!
//! An agent streams `data: {"type": ..., "data": ...}` lines whose chunk
//! boundaries can fall anywhere. This crate folds those chunks into one
//! growing answer, re-parses the answer from scratch into text and code
//! segments on every update, and tracks which code blocks the user has
//! collapsed or expanded across re-parses.
//!
//! Pipeline, leaves first:
//!
//! 1. [`frame`] splits raw chunks into complete lines.
//! 2. [`interpreter`] turns each line into a content delta.
//! 3. [`segment`] parses accumulated text into segments and logic blocks.
//! 4. [`block_id`] assigns block ids to code segments.
//! 5. [`toggle`] resolves collapse state per block id.
//! 6. [`transcript`] rebuilds stored answers offline.

pub mod block_id;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod frame;
pub mod interpreter;
pub mod message;
pub mod render;
pub mod segment;
pub mod session;
pub mod stream;
pub mod toggle;
pub mod transcript;
pub mod wire;

pub use block_id::{assign_ids, IdScheme};
pub use client::{AgentClient, AnswerSource, ScriptedSource};
pub use config::AssemblerConfig;
pub use error::{AssemblerError, Result};
pub use frame::{split_lines, FrameDecoder};
pub use interpreter::{EventInterpreter, LineEffect, MalformedPolicy, ToolActivity};
pub use message::{ChatMessage, Role};
pub use render::{render_message, RenderedMessage};
pub use segment::{parse_logic_blocks, parse_message, parse_segments, LogicBlock, Segment};
pub use session::{ChatSession, SessionEvent};
pub use stream::{read_stream, StreamBuffer, StreamUpdate};
pub use toggle::{CollapseReconciler, SharedToggleStore, ToggleStore, Visibility};
pub use transcript::normalize_transcript;
pub use wire::{AgentRequest, StoredAnswer, WireFrame};
