//! Event interpreter: decides what each complete wire line contributes to the
//! accumulated answer.
//!
//! The interpreter is maximally forgiving. A malformed frame never aborts a
//! response: the live path drops it, the historical path keeps the raw line
//! because it is the only record left.

use tracing::debug;

use crate::wire::{FrameKind, WireFrame, DATA_PREFIX};

/// Alt text of the synthesized image reference.
pub const IMAGE_ALT: &str = "Generated Image";

/// Markdown reference embedding a base64 PNG, surrounded by newlines.
pub fn image_markdown(b64: &str) -> String {
    format!("\n![{IMAGE_ALT}](data:image/png;base64,{b64})\n")
}

/// What to do with a `data: ` line whose payload is not valid JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    #[default]
    Discard,
    KeepRawLine,
}

/// Agent tool activity announced on the wire. Never part of the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolActivity {
    Started { tool: String, description: Option<String> },
    Finished { tool: String },
}

/// The effect of one line on the accumulated content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEffect {
    /// Append this text verbatim.
    Append(String),
    Tool(ToolActivity),
    /// Blank line terminating a `data:` event.
    Separator,
    /// Malformed or unknown frame; nothing appended.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Previous {
    Nothing,
    Frame,
    RawText,
}

#[derive(Debug, Clone)]
pub struct EventInterpreter {
    policy: MalformedPolicy,
    previous: Previous,
}

impl Default for EventInterpreter {
    fn default() -> Self {
        Self::new(MalformedPolicy::Discard)
    }
}

impl EventInterpreter {
    pub fn new(policy: MalformedPolicy) -> Self {
        Self { policy, previous: Previous::Nothing }
    }

    /// Interpreter for stored transcripts: malformed frames keep their raw line.
    pub fn historical() -> Self {
        Self::new(MalformedPolicy::KeepRawLine)
    }

    pub fn interpret(&mut self, line: &str) -> LineEffect {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            return match self.previous {
                Previous::RawText => LineEffect::Append("\n".to_string()),
                Previous::Frame | Previous::Nothing => LineEffect::Separator,
            };
        }

        let Some(payload) = trimmed.strip_prefix(DATA_PREFIX) else {
            self.previous = Previous::RawText;
            let mut text = line.trim_end().to_string();
            text.push('\n');
            return LineEffect::Append(text);
        };

        self.previous = Previous::Frame;
        match serde_json::from_str::<WireFrame>(payload) {
            Ok(WireFrame::ToolStart { tool, description }) => {
                LineEffect::Tool(ToolActivity::Started { tool, description })
            }
            Ok(WireFrame::ToolEnd { tool }) => LineEffect::Tool(ToolActivity::Finished { tool }),
            Ok(frame) => match frame.into_content() {
                Some(content) => match content.kind {
                    FrameKind::Text => LineEffect::Append(content.payload),
                    FrameKind::Image => LineEffect::Append(image_markdown(&content.payload)),
                },
                None => {
                    debug!(frame = %payload, "ignoring frame with unknown type");
                    LineEffect::Skipped
                }
            },
            Err(e) => match self.policy {
                MalformedPolicy::Discard => {
                    debug!(error = %e, "skipping malformed frame");
                    LineEffect::Skipped
                }
                MalformedPolicy::KeepRawLine => {
                    debug!(error = %e, "keeping malformed stored frame as raw text");
                    let mut text = line.trim_end().to_string();
                    text.push('\n');
                    LineEffect::Append(text)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn fold(interp: &mut EventInterpreter, lines: &[&str]) -> String {
        let mut out = String::new();
        for line in lines {
            if let LineEffect::Append(text) = interp.interpret(line) {
                out.push_str(&text);
            }
        }
        out
    }

    #[test]
    fn test_text_frame_appends_verbatim() {
        let mut i = EventInterpreter::default();
        assert_eq!(
            i.interpret(r#"data: {"type":"text","data":"  two spaces"}"#),
            LineEffect::Append("  two spaces".to_string())
        );
    }

    #[test]
    fn test_malformed_frame_survival() {
        let mut i = EventInterpreter::default();
        let out = fold(
            &mut i,
            &[
                r#"data: {"type":"text","data":"A"}"#,
                "data: not-json",
                r#"data: {"type":"text","data":"B"}"#,
            ],
        );
        assert_eq!(out, "AB");
    }

    #[test]
    fn test_malformed_kept_on_historical_path() {
        let mut i = EventInterpreter::historical();
        assert_eq!(
            i.interpret("data: not-json"),
            LineEffect::Append("data: not-json\n".to_string())
        );
    }

    #[test]
    fn test_image_frame_embeds_markdown() {
        let mut i = EventInterpreter::default();
        let LineEffect::Append(text) = i.interpret(r#"data: {"type":"image","data":"QUJD"}"#) else {
            panic!("expected append");
        };
        assert!(text.contains("![Generated Image](data:image/png;base64,QUJD)"));
        assert!(text.starts_with('\n') && text.ends_with('\n'));
    }

    #[test]
    fn test_unknown_type_skipped() {
        let mut i = EventInterpreter::default();
        assert_eq!(i.interpret(r#"data: {"type":"usage","tokens":3}"#), LineEffect::Skipped);
    }

    #[test]
    fn test_tool_frames_are_not_content() {
        let mut i = EventInterpreter::default();
        assert_eq!(
            i.interpret(r#"data: {"type":"tool_start","tool":"ml_agent","description":"fit"}"#),
            LineEffect::Tool(ToolActivity::Started {
                tool: "ml_agent".to_string(),
                description: Some("fit".to_string()),
            })
        );
        assert_eq!(
            i.interpret(r#"data: {"type":"tool_end","tool":"ml_agent"}"#),
            LineEffect::Tool(ToolActivity::Finished { tool: "ml_agent".to_string() })
        );
    }

    #[test]
    fn test_blank_after_frame_is_separator() {
        let mut i = EventInterpreter::default();
        let out = fold(
            &mut i,
            &[r#"data: {"type":"text","data":"Hel"}"#, "", r#"data: {"type":"text","data":"lo"}"#, ""],
        );
        assert_eq!(out, "Hello");
    }

    #[test]
    fn test_raw_text_keeps_paragraph_breaks() {
        let mut i = EventInterpreter::default();
        let out = fold(&mut i, &["# Title", "", "- item", "    indented"]);
        assert_eq!(out, "# Title\n\n- item\n    indented\n");
    }

    #[rstest]
    #[case("data: {\"type\":\"text\",\"data\":\"x\"}\r", "x")]
    #[case("   data: {\"type\":\"text\",\"data\":\"y\"}   ", "y")]
    #[case("data: {\"type\":\"text\",\"data\":\"line\\nbreak\"}", "line\nbreak")]
    fn test_frame_line_is_trimmed(#[case] line: &str, #[case] expected: &str) {
        let mut i = EventInterpreter::default();
        assert_eq!(i.interpret(line), LineEffect::Append(expected.to_string()));
    }

    #[test]
    fn test_done_sentinel_is_skipped() {
        let mut i = EventInterpreter::default();
        assert_eq!(i.interpret("data: [DONE]"), LineEffect::Skipped);
    }
}
