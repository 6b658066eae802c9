//! Firmware log console.
//!
//! Every line goes to defmt (RTT) and is also framed with `\r\n` and queued for
//! the USB CDC task on core 1. The queue never blocks a writer: when the host is
//! not reading, the oldest queued line is discarded to make room and the loss
//! is counted.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use heapless::Vec;
use pico_core::sink::{LineSink, MAX_LINE_LEN, SinkError};
use portable_atomic::{AtomicU32, Ordering};

/// Lines waiting for the USB host.
pub const CONSOLE_QUEUE_DEPTH: usize = 16;

/// One framed console line.
pub type ConsoleFrame = Vec<u8, { MAX_LINE_LEN + 2 }>;
pub type ConsoleQueue = Channel<CriticalSectionRawMutex, ConsoleFrame, CONSOLE_QUEUE_DEPTH>;

/// Frames drained by the USB task.
pub static LINE_QUEUE: ConsoleQueue = Channel::new();
/// Lines discarded because the USB host was not keeping up.
pub static DROPPED_LINES: AtomicU32 = AtomicU32::new(0);

pub struct ConsoleSink<'q> {
    queue: &'q ConsoleQueue,
    dropped: &'q AtomicU32,
}

impl<'q> ConsoleSink<'q> {
    pub const fn new(queue: &'q ConsoleQueue, dropped: &'q AtomicU32) -> Self {
        Self { queue, dropped }
    }

    fn enqueue(&self, frame: ConsoleFrame) {
        let Err(TrySendError::Full(frame)) = self.queue.try_send(frame) else {
            return;
        };
        // Make room by dropping the oldest line.
        if self.queue.try_receive().is_ok() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        if self.queue.try_send(frame).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl LineSink for ConsoleSink<'_> {
    fn append_line(&mut self, line: &str) -> Result<(), SinkError> {
        #[cfg(target_os = "none")]
        defmt::info!("{=str}", line);

        self.enqueue(frame(line));
        Ok(())
    }
}

/// Copies `line` into a frame and terminates it with `\r\n`.
pub fn frame(line: &str) -> ConsoleFrame {
    let mut frame = ConsoleFrame::new();
    let bytes = line.as_bytes();
    let len = bytes.len().min(MAX_LINE_LEN);
    // Capacity is MAX_LINE_LEN + 2, so neither push can fail.
    let _ = frame.extend_from_slice(&bytes[..len]);
    let _ = frame.extend_from_slice(b"\r\n");
    frame
}
