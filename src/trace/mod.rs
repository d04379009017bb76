//! Trace event records and the file-backed event source.
//!
//! Decoding of the binary trace format happens upstream; this module only
//! deals with already-typed events.

pub mod event;
pub mod source;

pub use event::{Event, FieldValue, Fields};
pub use source::JsonLinesSource;
