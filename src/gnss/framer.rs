// src/gnss/framer.rs

//! Interrupt-side NMEA line framer.
//!
//! The receive interrupt feeds bytes one at a time into a [`LineFramer`]. The
//! framer keeps its in-progress buffer to itself and copies each complete
//! sentence of the wanted type into a shared [`FrameSlot`]. The copy happens
//! inside a critical section, so the task that reads the slot always sees
//! one whole sentence, never a mix of two.
//!
//! ```ignore
//! static SLOT: FrameSlot = FrameSlot::new();
//! static FRAMER: Mutex<RefCell<Option<LineFramer<'static>>>> = Mutex::new(RefCell::new(None));
//!
//! #[interrupt]
//! fn UART0_IRQ() {
//!     critical_section::with(|cs| {
//!         if let Some(framer) = FRAMER.borrow_ref_mut(cs).as_mut() {
//!             framer.on_interrupt(&mut uart_rx());
//!         }
//!     });
//! }
//! ```

use crate::common::{hal_traits::ByteSource, timing::SENTENCE_CAPACITY};
use core::cell::RefCell;
use critical_section::Mutex;
use heapless::Vec;

/// First byte of every NMEA sentence.
pub const START_DELIMITER: u8 = b'$';
/// Last byte of every NMEA sentence.
pub const TERMINATOR: u8 = b'\n';
/// Sentence type published by default.
pub const DEFAULT_MARKER: &[u8] = b"GGA";

/// Upper bound on bytes consumed per interrupt (one hardware FIFO).
const MAX_BYTES_PER_INTERRUPT: usize = 32;

/// One complete sentence, `$` through `\n`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentenceFrame<const N: usize = SENTENCE_CAPACITY> {
    bytes: Vec<u8, N>,
}

impl<const N: usize> SentenceFrame<N> {
    pub const fn new() -> Self {
        SentenceFrame { bytes: Vec::new() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug)]
struct Published<const N: usize> {
    frame: SentenceFrame<N>,
    generation: u32,
}

/// Latest complete sentence, shared between the receive interrupt (sole
/// writer) and the telemetry task (sole reader).
///
/// Every publish bumps a generation counter; readers compare generations to
/// tell a new sentence from one they have already seen.
pub struct FrameSlot<const N: usize = SENTENCE_CAPACITY> {
    inner: Mutex<RefCell<Published<N>>>,
}

impl<const N: usize> FrameSlot<N> {
    pub const fn new() -> Self {
        FrameSlot {
            inner: Mutex::new(RefCell::new(Published {
                frame: SentenceFrame::new(),
                generation: 0,
            })),
        }
    }

    /// Replaces the published sentence. `bytes` never exceeds `N` because it
    /// comes from a buffer of the same capacity.
    fn publish(&self, bytes: &[u8]) {
        critical_section::with(|cs| {
            let mut published = self.inner.borrow_ref_mut(cs);
            published.frame.bytes.clear();
            // Same capacity as the capture buffer, cannot overflow.
            let _ = published.frame.bytes.extend_from_slice(bytes);
            // 0 is reserved for "nothing published yet".
            published.generation = published.generation.wrapping_add(1).max(1);
        });
    }

    /// Copy of the latest sentence and its generation, or `None` before the
    /// first publish.
    pub fn latest(&self) -> Option<(u32, SentenceFrame<N>)> {
        critical_section::with(|cs| {
            let published = self.inner.borrow_ref(cs);
            if published.generation == 0 {
                None
            } else {
                Some((published.generation, published.frame.clone()))
            }
        })
    }

    /// Number of sentences published so far. Wraps from `u32::MAX` to 1.
    pub fn generation(&self) -> u32 {
        critical_section::with(|cs| self.inner.borrow_ref(cs).generation)
    }
}

impl<const N: usize> Default for FrameSlot<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum FramerState {
    /// Discarding input until `$`.
    Idle,
    /// Accumulating a sentence.
    Capturing,
}

/// Byte-at-a-time sentence extractor. Runs in interrupt context only.
///
/// Never blocks, never allocates, and drops whatever does not fit: a line
/// longer than `N` bytes is discarded, never partially published.
pub struct LineFramer<'a, const N: usize = SENTENCE_CAPACITY> {
    slot: &'a FrameSlot<N>,
    buffer: Vec<u8, N>,
    state: FramerState,
    marker: &'static [u8],
}

impl<'a, const N: usize> LineFramer<'a, N> {
    pub const fn new(slot: &'a FrameSlot<N>) -> Self {
        LineFramer {
            slot,
            buffer: Vec::new(),
            state: FramerState::Idle,
            marker: DEFAULT_MARKER,
        }
    }

    /// Publishes sentences containing `marker` instead of `GGA`.
    pub fn with_marker(mut self, marker: &'static [u8]) -> Self {
        self.marker = marker;
        self
    }

    pub fn is_capturing(&self) -> bool {
        self.state == FramerState::Capturing
    }

    /// Bytes captured of the sentence in progress.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Feeds one received byte.
    pub fn push_byte(&mut self, byte: u8) {
        if byte == START_DELIMITER {
            // Anything captured so far belonged to a broken sentence.
            self.buffer.clear();
            self.state = FramerState::Capturing;
        }

        if self.state != FramerState::Capturing {
            return;
        }

        if self.buffer.push(byte).is_err() {
            // Full. The terminator will be dropped too, so this line is never published.
            return;
        }

        if byte == TERMINATOR {
            if self.matches_marker() {
                self.slot.publish(&self.buffer);
            }
            self.state = FramerState::Idle;
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push_byte(byte);
        }
    }

    /// Receive-interrupt entry point: drains what the UART has buffered.
    ///
    /// A receive error (framing, overrun) means a byte was lost, so the
    /// sentence in progress is abandoned. Returns the number of bytes consumed.
    pub fn on_interrupt<S: ByteSource>(&mut self, rx: &mut S) -> usize {
        let mut consumed = 0;
        while consumed < MAX_BYTES_PER_INTERRUPT {
            match rx.read_byte() {
                Ok(byte) => {
                    self.push_byte(byte);
                    consumed += 1;
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(_)) => {
                    self.buffer.clear();
                    self.state = FramerState::Idle;
                    break;
                }
            }
        }
        consumed
    }

    fn matches_marker(&self) -> bool {
        self.marker.is_empty()
            || self
                .buffer
                .windows(self.marker.len())
                .any(|window| window == self.marker)
    }
}
