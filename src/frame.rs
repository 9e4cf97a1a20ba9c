//! ==============================================================================
//! frame.rs - radar sentence parser
//! ==============================================================================
//!
//! purpose:
//!     turns a raw chunk read from the uart into at most one SensorReading.
//!
//! wire format:
//!     $DFDMD,<motion>,<x>,<distance>,<y>,<z>\r\n
//!
//!     - field[0] is the fixed 6 character tag
//!     - field[1] is the motion flag, "1" means active
//!     - field[3] is the distance in meters as decimal text, may be empty
//!     - at least 6 fields, extra fields are ignored
//!
//! known limitations:
//!     - only the first valid sentence in a chunk is used, the rest of the
//!       chunk is dropped
//!     - a sentence split across two reads is not reassembled; both halves
//!       are discarded
//!
//! ==============================================================================

use crate::domain::SensorReading;
use crate::error::FrameError;
use tokio::time::Instant;

pub const SENTENCE_TAG: &str = "$DFDMD";
pub const SENTENCE_DELIMITER: &str = "\r\n";
pub const FIELD_DELIMITER: char = ',';
pub const MIN_FIELDS: usize = 6;

const MOTION_FIELD: usize = 1;
const DISTANCE_FIELD: usize = 3;
const MOTION_ACTIVE: &str = "1";

/// parse a chunk of serial bytes
///
/// returns the first valid sentence in the chunk. undecodable chunks and
/// malformed lines produce `None`; nothing is ever partially filled in.
pub fn parse(chunk: &[u8], observed_at: Instant) -> Option<SensorReading> {
    let text = match std::str::from_utf8(chunk) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("dropping chunk: {}", FrameError::from(e));
            return None;
        }
    };

    for line in text.split(SENTENCE_DELIMITER) {
        match parse_sentence(line, observed_at) {
            Ok(reading) => return Some(reading),
            // untagged lines are noise or sentence fragments
            Err(FrameError::MissingTag) => {}
            Err(e) => tracing::debug!("malformed line {:?}: {}", line, e),
        }
    }

    None
}

/// parse a single line without its delimiter
pub fn parse_sentence(line: &str, observed_at: Instant) -> Result<SensorReading, FrameError> {
    if !line.starts_with(SENTENCE_TAG) {
        return Err(FrameError::MissingTag);
    }

    let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    if fields.len() < MIN_FIELDS {
        return Err(FrameError::TooFewFields {
            found: fields.len(),
            required: MIN_FIELDS,
        });
    }

    let motion_detected = fields[MOTION_FIELD].trim() == MOTION_ACTIVE;
    let distance_meters = parse_distance(fields[DISTANCE_FIELD]);

    Ok(SensorReading {
        motion_detected,
        distance_meters,
        observed_at,
    })
}

fn parse_distance(field: &str) -> Option<f64> {
    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    field.parse::<f64>().ok().filter(|d| d.is_finite())
}
