//! Error types for the allocation engine

use std::fmt;

/// Errors surfaced by the engine.
///
/// The set is intentionally small: decode failures are swallowed by the
/// driver (malformed messages are dropped, not propagated), a full bundle is
/// signalled by a `bool` return, and a missing task during path evaluation is
/// skipped. Only configuration problems and explicit codec calls report
/// errors to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Rejected configuration value
    InvalidConfig(String),
    /// A message byte blob did not parse
    MalformedMessage,
    /// Configuration file could not be read or parsed
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Error::MalformedMessage => write!(f, "malformed consensus message"),
            Error::Io(msg) => write!(f, "io error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
