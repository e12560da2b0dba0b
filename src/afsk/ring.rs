//! Sample ring buffer for the AFSK receiver.
//!
//! A fixed-capacity ring of signed 8-bit audio samples with frame
//! semantics: the capture side appends samples and marks frame
//! boundaries, the decode side replays the committed frame as many
//! times as it wants (the demodulator runs several filter passes over
//! the same samples).
//!
//! The ring is deliberately lock-free. There is exactly one producer
//! and one consumer, and the split into [`FrameWriter`] and
//! [`FrameReader`] makes those roles explicit in the type system - a
//! second producer cannot appear by accident. The only safety rule is
//! that the write cursor never advances into the start of the frame
//! being written; on collision the sample is dropped silently. The
//! producer never blocks, so sustained overload loses the tail of a
//! frame rather than stalling the sampling clock.

use std::sync::atomic::{AtomicI8, AtomicUsize, Ordering};
use std::sync::Arc;

/// Default ring capacity: 200k samples hold about 20 seconds of
/// transmission at the 9600 Hz sampling rate.
pub const DEFAULT_CAPACITY: usize = 200_000;

/// Ring buffer allocation failed at init.
///
/// The receiver treats this as "RX unavailable" and keeps running
/// without the AFSK path rather than aborting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingAllocError {
    /// Requested capacity in samples.
    pub capacity: usize,
}

impl std::fmt::Display for RingAllocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed to allocate sample ring ({} samples)",
            self.capacity
        )
    }
}

impl std::error::Error for RingAllocError {}

struct Shared {
    buf: Box<[AtomicI8]>,
    /// Write cursor.
    wpos: AtomicUsize,
    /// Start of the frame currently being written.
    wstart: AtomicUsize,
    /// Length of the frame currently being written.
    wlen: AtomicUsize,
}

impl Shared {
    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn wrap(&self, pos: usize) -> usize {
        if pos + 1 == self.buf.len() {
            0
        } else {
            pos + 1
        }
    }
}

/// Sample ring buffer, created once at startup and split into its
/// producer and consumer halves.
pub struct SampleRing;

impl SampleRing {
    /// Allocate a ring of `capacity` samples and split it.
    ///
    /// Allocation failure is reported instead of aborting so that the
    /// caller can disable the RX subsystem and continue.
    pub fn with_capacity(capacity: usize) -> Result<(FrameWriter, FrameReader), RingAllocError> {
        let mut v: Vec<AtomicI8> = Vec::new();
        if capacity == 0 || v.try_reserve_exact(capacity).is_err() {
            return Err(RingAllocError { capacity });
        }
        v.resize_with(capacity, || AtomicI8::new(0));
        let shared = Arc::new(Shared {
            buf: v.into_boxed_slice(),
            wpos: AtomicUsize::new(0),
            wstart: AtomicUsize::new(0),
            wlen: AtomicUsize::new(0),
        });
        let writer = FrameWriter {
            shared: shared.clone(),
        };
        let reader = FrameReader {
            shared,
            rpos: 0,
            start: 0,
            len: 0,
        };
        Ok((writer, reader))
    }
}

/// Producer half: owned by the capture loop.
pub struct FrameWriter {
    shared: Arc<Shared>,
}

impl FrameWriter {
    /// Begin a new candidate frame at the current write position.
    pub fn next_frame(&mut self) {
        let s = &self.shared;
        s.wstart.store(s.wpos.load(Ordering::Relaxed), Ordering::Relaxed);
        s.wlen.store(0, Ordering::Relaxed);
    }

    /// Append one sample. Returns false if the write cursor would
    /// collide with the start of the frame under writing; the sample
    /// is then dropped (a frame holds at most capacity-1 samples).
    pub fn put(&mut self, sample: i8) -> bool {
        let s = &self.shared;
        let wpos = s.wpos.load(Ordering::Relaxed);
        if s.wrap(wpos) == s.wstart.load(Ordering::Relaxed) {
            return false;
        }
        s.buf[wpos].store(sample, Ordering::Relaxed);
        s.wlen.fetch_add(1, Ordering::Relaxed);
        s.wpos.store(s.wrap(wpos), Ordering::Release);
        true
    }

    /// Number of samples in the frame under writing.
    pub fn provisional_len(&self) -> usize {
        self.shared.wlen.load(Ordering::Relaxed)
    }

    /// Ring capacity in samples.
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

/// Consumer half: owned by the decode task.
pub struct FrameReader {
    shared: Arc<Shared>,
    rpos: usize,
    start: usize,
    len: usize,
}

impl FrameReader {
    /// Commit the last written frame and rewind to its start. This is
    /// the hand-off point between capture and decode.
    pub fn read_last(&mut self) {
        let s = &self.shared;
        self.start = s.wstart.load(Ordering::Acquire);
        self.len = s.wlen.load(Ordering::Acquire);
        self.rpos = self.start;
    }

    /// Read the next sample, advancing with wraparound.
    pub fn get(&mut self) -> i8 {
        let s = &self.shared;
        let x = s.buf[self.rpos].load(Ordering::Relaxed);
        self.rpos = s.wrap(self.rpos);
        x
    }

    /// True once the committed frame is exhausted: nothing committed,
    /// the read cursor caught the write cursor, or it wrapped into the
    /// region of a newer frame still being written.
    pub fn eof(&self) -> bool {
        let s = &self.shared;
        self.len == 0
            || self.rpos == s.wpos.load(Ordering::Acquire)
            || (self.rpos != self.start && self.rpos == s.wstart.load(Ordering::Relaxed))
    }

    /// Rewind to the start of the committed frame. Replay is
    /// non-destructive and may be repeated.
    pub fn reset(&mut self) {
        self.rpos = self.start;
    }

    /// Length of the committed frame in samples.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no frame has been committed or the frame is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
