//! Frame decoder: reshapes arbitrarily split byte chunks into complete lines.
//!
//! A chunk boundary may fall anywhere: inside the `data: ` prefix, inside a
//! JSON object, exactly on a `\n`, or between the bytes of one UTF-8
//! character. Only `\n`-terminated lines leave the decoder; the unterminated
//! remainder waits for the next chunk.

/// Split `leftover + chunk` into complete lines and a new leftover.
///
/// Every piece before the last `\n` is a complete line. When the
/// concatenation ends with `\n` the new leftover is empty; otherwise the
/// trailing piece is carried over.
pub fn split_lines(leftover: &str, chunk: &str) -> (Vec<String>, String) {
    let mut joined = String::with_capacity(leftover.len() + chunk.len());
    joined.push_str(leftover);
    joined.push_str(chunk);

    match joined.rfind('\n') {
        Some(last_nl) => {
            let rest = joined[last_nl + 1..].to_string();
            let lines = joined[..last_nl].split('\n').map(str::to_string).collect();
            (lines, rest)
        }
        None => (Vec::new(), joined),
    }
}

/// Incremental byte-level decoder.
///
/// Partial lines are buffered as bytes so a multi-byte character split across
/// two chunks is decoded only once it is whole.
#[derive(Debug, Default, Clone)]
pub struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the lines it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let Some(last_nl) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_nl + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        // drop the final terminator; every piece before it is a whole line
        complete[..complete.len() - 1]
            .split(|&b| b == b'\n')
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// Flush the unterminated remainder once the byte source is exhausted.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    /// The not-yet-terminated fragment, decoded lossily for inspection.
    pub fn pending_partial_line(&self) -> String {
        String::from_utf8_lossy(&self.pending).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines_no_newline_is_all_leftover() {
        let (lines, rest) = split_lines("", "data: {\"ty");
        assert!(lines.is_empty());
        assert_eq!(rest, "data: {\"ty");
    }

    #[test]
    fn test_split_lines_joins_leftover() {
        let (lines, rest) = split_lines("data: {\"ty", "pe\":\"text\"}\nda");
        assert_eq!(lines, vec!["data: {\"type\":\"text\"}"]);
        assert_eq!(rest, "da");
    }

    #[test]
    fn test_split_lines_trailing_newline_clears_leftover() {
        let (lines, rest) = split_lines("", "a\nb\n");
        assert_eq!(lines, vec!["a", "b"]);
        assert_eq!(rest, "");
    }

    #[test]
    fn test_split_lines_keeps_blank_lines() {
        let (lines, rest) = split_lines("", "a\n\nb\n\n");
        assert_eq!(lines, vec!["a", "", "b", ""]);
        assert_eq!(rest, "");
    }

    #[test]
    fn test_split_lines_chunk_is_only_newline() {
        let (lines, rest) = split_lines("data: x", "\n");
        assert_eq!(lines, vec!["data: x"]);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_decoder_split_inside_prefix() {
        let mut d = FrameDecoder::new();
        assert!(d.push(b"da").is_empty());
        assert_eq!(d.pending_partial_line(), "da");
        assert_eq!(d.push(b"ta: 1\n"), vec!["data: 1"]);
        assert_eq!(d.pending_partial_line(), "");
    }

    #[test]
    fn test_decoder_split_inside_utf8_char() {
        let bytes = "é\n".as_bytes();
        let mut d = FrameDecoder::new();
        assert!(d.push(&bytes[..1]).is_empty());
        assert_eq!(d.push(&bytes[1..]), vec!["é"]);
    }

    #[test]
    fn test_decoder_many_lines_in_one_chunk() {
        let mut d = FrameDecoder::new();
        assert_eq!(d.push(b"a\nb\nc"), vec!["a", "b"]);
        assert_eq!(d.finish().as_deref(), Some("c"));
        assert_eq!(d.finish(), None);
    }

    #[test]
    fn test_decoder_finish_empty() {
        let mut d = FrameDecoder::new();
        d.push(b"x\n");
        assert_eq!(d.finish(), None);
    }
}
