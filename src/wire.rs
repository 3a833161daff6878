use serde::{Deserialize, Serialize};

/// Prefix of every structured line on the wire.
pub const DATA_PREFIX: &str = "data: ";

// -- Agent event frames ------------------------------------------------------

/// JSON payload carried after the `data: ` prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireFrame {
    Text {
        data: String,
    },
    /// Base64-encoded PNG bytes.
    Image {
        data: String,
    },
    ToolStart {
        tool: String,
        #[serde(default)]
        description: Option<String>,
    },
    ToolEnd {
        tool: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Image,
}

/// One decoded content event, consumed immediately by the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFrame {
    pub kind: FrameKind,
    pub payload: String,
}

impl WireFrame {
    /// The content carried by this frame, if it contributes any.
    pub fn into_content(self) -> Option<ContentFrame> {
        match self {
            WireFrame::Text { data } => Some(ContentFrame { kind: FrameKind::Text, payload: data }),
            WireFrame::Image { data } => Some(ContentFrame { kind: FrameKind::Image, payload: data }),
            _ => None,
        }
    }
}

// -- Agent endpoint request --------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentRequest {
    pub question: String,
    pub file_names: Vec<String>,
    pub data_summaries: String,
    /// Base64-encoded CSV payloads.
    pub data: Vec<String>,
}

impl AgentRequest {
    pub fn question(question: impl Into<String>) -> Self {
        Self { question: question.into(), ..Default::default() }
    }
}

// -- Stored transcripts ------------------------------------------------------

/// A previously stored answer: either one string or the list of raw chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredAnswer {
    Single(String),
    Chunks(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_frame_deserializes() {
        let f: WireFrame = serde_json::from_str(r#"{"type":"text","data":"Hi"}"#).expect("deser");
        assert_eq!(f, WireFrame::Text { data: "Hi".to_string() });
    }

    #[test]
    fn test_image_frame_into_content() {
        let f: WireFrame = serde_json::from_str(r#"{"type":"image","data":"iVBOR"}"#).expect("deser");
        let c = f.into_content().expect("content");
        assert_eq!(c.kind, FrameKind::Image);
        assert_eq!(c.payload, "iVBOR");
    }

    #[test]
    fn test_unknown_type_is_unknown() {
        let f: WireFrame = serde_json::from_str(r#"{"type":"progress","pct":40}"#).expect("deser");
        assert_eq!(f, WireFrame::Unknown);
        assert!(f.into_content().is_none());
    }

    #[test]
    fn test_tool_start_without_description() {
        let f: WireFrame = serde_json::from_str(r#"{"type":"tool_start","tool":"ml_agent"}"#).expect("deser");
        assert_eq!(
            f,
            WireFrame::ToolStart { tool: "ml_agent".to_string(), description: None }
        );
    }

    #[test]
    fn test_text_frame_missing_data_is_error() {
        assert!(serde_json::from_str::<WireFrame>(r#"{"type":"text"}"#).is_err());
    }

    #[test]
    fn test_agent_request_serializes_all_fields() {
        let req = AgentRequest::question("plot usage");
        let parsed: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&req).expect("ser")).expect("parse");
        assert_eq!(parsed["question"], "plot usage");
        assert!(parsed["file_names"].as_array().expect("array").is_empty());
        assert_eq!(parsed["data_summaries"], "");
    }

    #[test]
    fn test_stored_answer_string_and_array() {
        let s: StoredAnswer = serde_json::from_str(r#""hello""#).expect("deser");
        assert_eq!(s, StoredAnswer::Single("hello".to_string()));
        let a: StoredAnswer = serde_json::from_str(r#"["a","b"]"#).expect("deser");
        assert_eq!(a, StoredAnswer::Chunks(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_stored_answer_rejects_object() {
        assert!(serde_json::from_str::<StoredAnswer>(r#"{"a":1}"#).is_err());
    }
}
