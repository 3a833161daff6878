//! Block IDs: `"{message_id}-{ordinal}"` keys for collapse state.
//!
//! With [`IdScheme::SegmentOrdinal`] the ordinal is the segment's position in
//! the whole parsed list, text included. A text segment appearing earlier in
//! a later parse therefore shifts every following code id. IDs are only
//! guaranteed meaningful within one parse pass.
//!
//! [`IdScheme::CodeOrdinal`] numbers code segments among themselves, which
//! keeps a block's id stable while prose around it re-segments.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::segment::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdScheme {
    #[default]
    SegmentOrdinal,
    CodeOrdinal,
}

pub fn block_id(message_id: &str, ordinal: usize) -> String {
    format!("{message_id}-{ordinal}")
}

/// Assign ids to the code segments of one message, in order.
///
/// Pass the segments of every logic block of the message in sequence; the
/// ordinal runs across blocks.
pub fn assign_ids<'a, I>(message_id: &str, segments: I, scheme: IdScheme)
where
    I: IntoIterator<Item = &'a mut Segment>,
{
    let mut code_ordinal = 0;
    for (ordinal, segment) in segments.into_iter().enumerate() {
        match segment {
            Segment::Text { .. } => {}
            Segment::Code { id, .. } | Segment::StreamingCode { id, .. } => {
                let n = match scheme {
                    IdScheme::SegmentOrdinal => ordinal,
                    IdScheme::CodeOrdinal => code_ordinal,
                };
                *id = block_id(message_id, n);
                code_ordinal += 1;
            }
        }
    }
}
