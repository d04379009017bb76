//! Structured error types for tracetop
//!
//! Per-event failures are recoverable: the router reports them and the ingest
//! loop moves on to the next event.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("{event}: missing {field} field")]
    MissingField { event: String, field: String },

    #[error("{event}: field {field} is not {expected}")]
    WrongKind {
        event: String,
        field: String,
        expected: &'static str,
    },

    #[error("{event}: field {field} value {value} is out of range")]
    OutOfRange {
        event: String,
        field: String,
        value: i128,
    },

    #[error("{event}: missing cpu_id")]
    MissingCpu { event: String },
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("line {line}: invalid trace record: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("empty probe spec")]
    Empty,

    #[error("invalid probe offset `{0}`")]
    InvalidOffset(String),

    #[error("invalid probe `{0}`: expected symbol, symbol+offset or address")]
    Invalid(String),
}
