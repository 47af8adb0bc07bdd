//! Error types shared by every format reader.

use thiserror::Error;

/// Failure of a single bounded read or field decode.
///
/// Tag-stream readers catch these per tag and keep what they already
/// decoded; the block map builder and the admission gates propagate them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A read would cross the end of the buffer.
    #[error("read of {len} bytes at {offset:#x} crosses end of buffer ({end:#x})")]
    OutOfBounds { offset: usize, len: usize, end: usize },

    /// The bytes are in range but do not mean anything valid.
    #[error("malformed data at {offset:#x}: {reason}")]
    Malformed { offset: usize, reason: String },
}

impl ParseError {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            offset,
            reason: reason.into(),
        }
    }
}

/// A NUL-terminated decimal that did not end cleanly.
///
/// `partial` holds the digits parsed before the problem, which some callers
/// still use (e.g. a year field reading "1995/2013").
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error} (parsed {partial} before failing)")]
pub struct BadNumber {
    pub partial: u32,
    #[source]
    pub error: ParseError,
}

/// Top-level error for opening and identifying a file.
#[derive(Debug, Error)]
pub enum Error {
    /// No format admitted the input.
    #[error("not a recognized format")]
    Rejected,

    /// The input is a compressed container we recognize but do not unpack.
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
