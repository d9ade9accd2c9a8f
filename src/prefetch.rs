use crate::reader::{CursorBias, CursorReader, ReadError};
use crate::window::{LoadedRecord, SlidingWindow};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How close to `capacity` a side may shrink before a tick refills it.
const DEFAULT_LOW_WATER: usize = 20;

/// Fixed prefetch tick period.
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct PrefetchConfig {
    /// Refill a side once fewer than `capacity - low_water` records
    /// remain on it.
    pub low_water: usize,
    /// Period of the background tick. Focus moves also wake the
    /// prefetcher immediately, so this is only the idle cadence.
    pub tick_interval: Duration,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            low_water: DEFAULT_LOW_WATER,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// Handle to the background prefetch thread.
///
/// The thread owns the reader cursor outright (nothing else ever
/// calls `read_next`/`read_prev`/`seek_to`) and keeps both sides of
/// the shared window topped up to its capacity. Fatal reader errors
/// are delivered on the channel returned by [`spawn`](Self::spawn).
pub struct Prefetcher {
    stop: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Prefetcher {
    /// Pre-fill the window from the reader's current position, then
    /// hand the reader to a background thread that refills the window
    /// on a fixed tick and on every wake.
    pub fn spawn<T: Send + 'static>(
        mut reader: CursorReader,
        window: Arc<Mutex<SlidingWindow<T>>>,
        config: PrefetchConfig,
    ) -> Result<(Self, Receiver<ReadError>), ReadError> {
        initial_fill(&mut reader, &window)?;

        let stop = Arc::new(AtomicBool::new(false));
        let (wake_tx, wake_rx) = mpsc::channel();
        let (err_tx, err_rx) = mpsc::channel();

        let handle = {
            let stop = stop.clone();
            thread::spawn(move || run(reader, window, config, stop, wake_rx, err_tx))
        };

        Ok((
            Self {
                stop,
                wake_tx,
                handle: Some(handle),
            },
            err_rx,
        ))
    }

    /// Nudge the prefetcher ahead of its next tick. Called after focus
    /// moves so eviction shortfalls are refilled without polling
    /// latency.
    pub fn wake(&self) {
        let _ = self.wake_tx.send(());
    }

    /// Signal the thread to stop and wait for its in-flight tick to
    /// finish. The reader (and the file handle under it) is dropped by
    /// the thread on the way out.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.wake_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<T>(
    mut reader: CursorReader,
    window: Arc<Mutex<SlidingWindow<T>>>,
    config: PrefetchConfig,
    stop: Arc<AtomicBool>,
    wake_rx: Receiver<()>,
    err_tx: Sender<ReadError>,
) {
    while !stop.load(Ordering::Relaxed) {
        if let Err(err) = tick(&mut reader, &window, &config) {
            // Only I/O errors escape a tick; the session is over.
            let _ = err_tx.send(err);
            break;
        }
        match wake_rx.recv_timeout(config.tick_interval) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Load up to one side's capacity of records starting at the cursor.
fn initial_fill<T>(
    reader: &mut CursorReader,
    window: &Arc<Mutex<SlidingWindow<T>>>,
) -> Result<(), ReadError> {
    let mut w = window.lock().unwrap();
    while w.len() < w.capacity() {
        match next_forward(reader)? {
            Some(rec) => {
                if !w.append(rec) {
                    break;
                }
            }
            None => break,
        }
    }
    Ok(())
}

/// One prefetch pass: top up below the focus, then above it.
fn tick<T>(
    reader: &mut CursorReader,
    window: &Arc<Mutex<SlidingWindow<T>>>,
    config: &PrefetchConfig,
) -> Result<(), ReadError> {
    fill_forward(reader, window, config)?;
    fill_backward(reader, window, config)?;
    Ok(())
}

fn fill_forward<T>(
    reader: &mut CursorReader,
    window: &Arc<Mutex<SlidingWindow<T>>>,
    config: &PrefetchConfig,
) -> Result<(), ReadError> {
    let boundary = {
        let w = window.lock().unwrap();
        let below = w.len() - w.focus();
        if w.is_empty() || below + config.low_water >= w.capacity() {
            return Ok(());
        }
        w.tail().expect("non-empty window has a tail")
    };

    reader.seek_to(boundary.checkpoint);
    // A checkpoint taken after a backward read sits *before* its
    // record; the first forward read from it would re-produce the tail
    // record. Burn that one read.
    if boundary.bias == CursorBias::JustRetreated && next_forward(reader)?.is_none() {
        return Ok(());
    }

    loop {
        let Some(rec) = next_forward(reader)? else {
            break; // end of file
        };
        let mut w = window.lock().unwrap();
        if !w.append(rec) {
            // An eviction moved the tail since we read it; the next
            // tick resumes from the new boundary.
            break;
        }
        if w.len() - w.focus() >= w.capacity() {
            break;
        }
    }
    Ok(())
}

fn fill_backward<T>(
    reader: &mut CursorReader,
    window: &Arc<Mutex<SlidingWindow<T>>>,
    config: &PrefetchConfig,
) -> Result<(), ReadError> {
    let boundary = {
        let w = window.lock().unwrap();
        if w.is_empty() || w.first_line() == Some(0) {
            return Ok(());
        }
        let above = w.focus();
        if above + config.low_water >= w.capacity() {
            return Ok(());
        }
        w.head().expect("non-empty window has a head")
    };

    reader.seek_to(boundary.checkpoint);
    // A checkpoint taken after a forward read sits *after* its record;
    // the first backward read from it would re-produce the head
    // record. Burn that one read.
    if boundary.bias == CursorBias::JustAdvanced && next_backward(reader)?.is_none() {
        return Ok(());
    }

    loop {
        let Some(rec) = next_backward(reader)? else {
            break; // beginning of file
        };
        let mut w = window.lock().unwrap();
        if !w.prepend(rec) {
            break;
        }
        if w.focus() >= w.capacity() {
            break;
        }
    }
    Ok(())
}

/// One forward read. A malformed line becomes a raw-string record at
/// its line number (keeping the window contiguous) and the cursor is
/// skipped past it; only I/O errors propagate.
fn next_forward(reader: &mut CursorReader) -> Result<Option<LoadedRecord>, ReadError> {
    match reader.read_next() {
        Ok(Some(value)) => {
            let checkpoint = reader.position();
            Ok(Some(LoadedRecord {
                line: checkpoint.line() - 1,
                value,
                checkpoint,
                bias: CursorBias::JustAdvanced,
            }))
        }
        Ok(None) => Ok(None),
        Err(ReadError::Malformed {
            line,
            raw,
            resume_after,
            ..
        }) => {
            reader.seek_to(resume_after);
            Ok(Some(LoadedRecord {
                line,
                value: Value::String(raw),
                checkpoint: resume_after,
                bias: CursorBias::JustAdvanced,
            }))
        }
        Err(err) => Err(err),
    }
}

/// One backward read, with the same malformed-line fallback as
/// [`next_forward`]. `read_prev` already leaves the cursor at the
/// start of the offending line, which is exactly the resume state a
/// backward fetch needs.
fn next_backward(reader: &mut CursorReader) -> Result<Option<LoadedRecord>, ReadError> {
    match reader.read_prev() {
        Ok(Some(value)) => {
            let checkpoint = reader.position();
            Ok(Some(LoadedRecord {
                line: checkpoint.line(),
                value,
                checkpoint,
                bias: CursorBias::JustRetreated,
            }))
        }
        Ok(None) => Ok(None),
        Err(ReadError::Malformed { line, raw, .. }) => Ok(Some(LoadedRecord {
            line,
            value: Value::String(raw),
            checkpoint: reader.position(),
            bias: CursorBias::JustRetreated,
        })),
        Err(err) => Err(err),
    }
}
