//! Parsers for loosely-structured remote command output
//!
//! Remote CLI output formats are not guaranteed stable across versions, so
//! every parser here is defensive: missing columns, missing rows or
//! malformed numerics degrade to an explicit [`ParseError`], never to a
//! silently wrong value. Each parser is a pure function paired with an
//! explicit `recognizes` predicate so format detection is testable on its
//! own.

pub mod cpuinfo;
pub mod engine_status;
pub mod memory;
pub mod process_table;
pub mod qcache;
pub mod top;
pub mod variables;

/// Result type alias for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors produced when typed records cannot be extracted from raw text
#[derive(Debug)]
pub enum ParseError {
    /// The text does not have the expected overall shape
    UnexpectedFormat(String),

    /// The shape was recognized but a required column or field is absent
    MissingField(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::UnexpectedFormat(msg) => write!(f, "unexpected output format: {msg}"),
            ParseError::MissingField(field) => write!(f, "missing required field: {field}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Extract the first pid from `pidof` output.
pub fn first_pid(raw: &str) -> ParseResult<u32> {
    raw.split_whitespace()
        .next()
        .ok_or_else(|| ParseError::UnexpectedFormat("empty pidof output".into()))?
        .parse()
        .map_err(|_| ParseError::UnexpectedFormat(format!("non-numeric pidof output: {raw:?}")))
}
