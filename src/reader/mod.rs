pub mod cursor;
pub mod source;

pub use cursor::CursorReader;
pub use source::ByteSource;

use std::fmt;

/// Saved cursor state: line number plus byte offset into the decoded
/// stream.
///
/// A checkpoint is only meaningful if it came out of
/// [`CursorReader::position`] (or a read error) for the same file;
/// [`CursorReader::seek_to`] restores it without any validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    line: u64,
    offset: u64,
}

impl Checkpoint {
    pub(crate) fn new(line: u64, offset: u64) -> Self {
        Self { line, offset }
    }

    /// Zero-based line number the cursor sits on.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Byte offset of the cursor in the decoded stream.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

/// Direction of the read that last moved the cursor.
///
/// A forward read leaves the cursor after the record it returned, a
/// backward read leaves it before. Whoever resumes from a stored
/// checkpoint needs this bit to know whether the first read in the
/// opposite direction would re-produce the same record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorBias {
    JustAdvanced,
    JustRetreated,
}

/// Error reading a record from the stream.
#[derive(Debug)]
pub enum ReadError {
    /// A line that is not valid UTF-8 or not valid JSON. Recoverable:
    /// the cursor is left at the start of the offending line, so the
    /// caller can retry, or `seek_to(resume_after)` to skip past it.
    Malformed {
        /// Zero-based line number of the offending line.
        line: u64,
        /// The offending line's text (lossy-decoded if not UTF-8).
        raw: String,
        /// Cursor state just past the offending line.
        resume_after: Checkpoint,
        /// Parser's description of what went wrong.
        reason: String,
    },

    /// I/O failure on the underlying file. Fatal; the session cannot
    /// continue.
    Io(std::io::Error),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Malformed { line, reason, .. } => {
                write!(f, "malformed record on line {}: {}", line + 1, reason)
            }
            ReadError::Io(source) => write!(f, "I/O error reading log file: {}", source),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::Io(source) => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReadError {
    fn from(err: std::io::Error) -> Self {
        ReadError::Io(err)
    }
}
