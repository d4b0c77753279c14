use super::message::{Command, Event};
use thiserror::Error;

/// A line that could not be parsed as a protocol event.
///
/// Framing errors are recovered locally: the caller drops the line and
/// keeps reading. They must never abort the stream, because the worker may
/// write unrelated diagnostic text to the same stream.
#[derive(Error, Debug)]
pub enum FramingError {
    #[error("blank line")]
    Blank,

    #[error("malformed protocol line: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decode one line of worker output into an [`Event`].
///
/// Leading/trailing whitespace is trimmed before parsing.
pub fn decode(line: &str) -> Result<Event, FramingError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(FramingError::Blank);
    }
    Ok(serde_json::from_str(trimmed)?)
}

/// Encode a [`Command`] as one JSON object line with a trailing newline.
///
/// The encoder is stateless and never fails for well-formed commands:
/// `Command` is a closed set of string/integer fields that serde_json can
/// always serialize.
pub fn encode(command: &Command) -> String {
    let mut line =
        serde_json::to_string(command).expect("command serialization is infallible");
    line.push('\n');
    line
}
