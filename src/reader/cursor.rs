use super::source::ByteSource;
use super::{Checkpoint, ReadError};
use memchr::{memchr, memchr_iter};
use serde_json::Value;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Default scan chunk size in bytes.
///
/// Purely a syscall-count vs over-read tradeoff: lines longer than one
/// chunk just make the scan loops iterate further. Correctness never
/// depends on it.
const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Bidirectional lazy reader over a newline-delimited JSON stream.
///
/// Keeps a cursor of (line number, byte offset) and can step one record
/// forward or backward from it using bounded seeks, so files of any
/// size can be walked without ever holding more than a few chunks in
/// memory. Backward steps undo forward steps exactly: after
/// `read_next` returns a record, `read_prev` returns that same record
/// and leaves the cursor where it was before the record was first
/// read.
///
/// Reads return `Ok(Some(record))`, or `Ok(None)` once the stream is
/// exhausted in that direction.
pub struct CursorReader {
    src: ByteSource,
    line: u64,
    offset: u64,
    chunk_size: usize,
}

impl CursorReader {
    /// Open a log file and position the cursor at line 0, offset 0.
    pub fn open<P: AsRef<Path>>(path: P, gzip: bool) -> Result<Self, ReadError> {
        let src = ByteSource::open(path, gzip)?;
        Ok(Self {
            src,
            line: 0,
            offset: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Override the scan chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be non-zero");
        self.chunk_size = chunk_size;
        self
    }

    /// Current cursor state, usable with [`seek_to`](Self::seek_to).
    pub fn position(&self) -> Checkpoint {
        Checkpoint::new(self.line, self.offset)
    }

    /// Restore a previously observed cursor state.
    ///
    /// Trusted jump: the checkpoint must have been issued by this
    /// reader for the same file. Nothing is validated here.
    pub fn seek_to(&mut self, checkpoint: Checkpoint) {
        self.line = checkpoint.line();
        self.offset = checkpoint.offset();
    }

    /// Read the record at the cursor and advance past it.
    ///
    /// Returns `Ok(None)` (cursor untouched) when no data remains or
    /// when the next line is blank; a blank line marks the end of the
    /// stream. A line that fails UTF-8 or JSON decoding leaves the
    /// cursor at its start, so the call can be retried or skipped via
    /// the error's `resume_after` checkpoint.
    pub fn read_next(&mut self) -> Result<Option<Value>, ReadError> {
        let start = self.offset;
        self.src.seek(SeekFrom::Start(start))?;

        // Scan forward one chunk at a time until a terminator or the
        // end of the data.
        let mut buf: Vec<u8> = Vec::new();
        let mut chunk = vec![0u8; self.chunk_size];
        let mut terminated = false;
        loop {
            let n = self.src.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            match memchr(b'\n', &chunk[..n]) {
                Some(i) => {
                    buf.extend_from_slice(&chunk[..i]);
                    terminated = true;
                    break;
                }
                None => buf.extend_from_slice(&chunk[..n]),
            }
        }

        if buf.is_empty() && !terminated {
            return Ok(None);
        }
        let consumed = buf.len() as u64 + u64::from(terminated);

        let text = match std::str::from_utf8(&buf) {
            Ok(text) => text.trim(),
            Err(_) => {
                let raw = String::from_utf8_lossy(&buf).into_owned();
                return Err(self.malformed(raw, "invalid UTF-8", consumed));
            }
        };
        if text.is_empty() {
            // Blank line: no more data.
            return Ok(None);
        }

        match serde_json::from_str(text) {
            Ok(value) => {
                self.line += 1;
                self.offset = start + consumed;
                Ok(Some(value))
            }
            Err(err) => Err(self.malformed(text.to_string(), &err.to_string(), consumed)),
        }
    }

    /// Read the record immediately preceding the cursor and move the
    /// cursor to its start.
    ///
    /// Returns `Ok(None)` when the cursor is at offset 0. Decode
    /// failures are reported as in [`read_next`](Self::read_next), with
    /// the cursor left at the start of the offending (returned) line.
    pub fn read_prev(&mut self) -> Result<Option<Value>, ReadError> {
        let start = self.offset;
        if start == 0 {
            return Ok(None);
        }

        // Grow a backward buffer chunk by chunk until it holds at
        // least three terminators or reaches offset 0. The final
        // fragment is a remainder of the line already consumed going
        // forward, so two full terminators are needed behind the
        // cursor to isolate the line before it; the third guards
        // against the first fragment being a partial read.
        let mut buf: Vec<u8> = Vec::new();
        let mut newlines = 0usize;
        let mut pos = start;
        loop {
            if newlines >= 3 {
                break;
            }
            let before = pos;
            pos = pos.saturating_sub(self.chunk_size as u64);
            self.src.seek(SeekFrom::Start(pos))?;
            let span = (before - pos) as usize;
            let mut chunk = vec![0u8; span];
            self.src.read_exact(&mut chunk)?;
            newlines += memchr_iter(b'\n', &chunk).count();
            chunk.extend_from_slice(&buf);
            buf = chunk;
            if pos == 0 {
                break;
            }
        }

        let ends_terminated = buf.last() == Some(&b'\n');
        let pieces: Vec<&[u8]> = buf.split(|&b| b == b'\n').collect();
        // With a trailing terminator the last piece is the (possibly
        // empty) remainder of the already-consumed line and the piece
        // before it is the record; without one (unterminated final
        // line) the last piece is itself the record.
        let prev_idx = if ends_terminated {
            pieces.len() - 2
        } else {
            pieces.len() - 1
        };

        if pos == 0 && prev_idx == 0 {
            // No complete line precedes the candidate: it is the first
            // line of the file.
            self.line = 0;
            self.offset = 0;
            return self.parse_prev(pieces[0], start);
        }

        let prev = pieces[prev_idx];
        let rewound = prev.len() as u64 + u64::from(ends_terminated);
        debug_assert!(self.line > 0, "cursor line desynchronized from offset");
        self.offset = start - rewound;
        self.line = self.line.saturating_sub(1);
        self.parse_prev(prev, start)
    }

    fn parse_prev(&mut self, raw: &[u8], start: u64) -> Result<Option<Value>, ReadError> {
        let consumed = start - self.offset;
        let text = match std::str::from_utf8(raw) {
            Ok(text) => text.trim(),
            Err(_) => {
                let raw = String::from_utf8_lossy(raw).into_owned();
                return Err(self.malformed(raw, "invalid UTF-8", consumed));
            }
        };
        match serde_json::from_str(text) {
            Ok(value) => Ok(Some(value)),
            Err(err) => Err(self.malformed(text.to_string(), &err.to_string(), consumed)),
        }
    }

    /// Build a `Malformed` error for the line starting at the cursor
    /// and spanning `consumed` bytes.
    fn malformed(&self, raw: String, reason: &str, consumed: u64) -> ReadError {
        ReadError::Malformed {
            line: self.line,
            raw,
            resume_after: Checkpoint::new(self.line + 1, self.offset + consumed),
            reason: reason.to_string(),
        }
    }
}
