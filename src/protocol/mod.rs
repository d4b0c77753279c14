//! Wire protocol between the controller and the scan worker.
//!
//! The protocol is line-delimited UTF-8 text: one JSON object per line,
//! commands flowing to the worker's stdin and events flowing back on its
//! stdout. [`message`] defines the closed sum types for both directions,
//! [`framing`] handles the per-line encode/decode.
//!
//! The framing layer is deliberately forgiving on the inbound side: a
//! worker may write unrelated diagnostic text to stdout, so a line that
//! fails to parse is dropped by the caller, never treated as fatal.

pub mod framing;
pub mod message;

pub use framing::{FramingError, decode, encode};
pub use message::{Command, Event, KILLED_EXIT_CODE};
