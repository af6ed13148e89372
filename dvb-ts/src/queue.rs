//! Bounded give-one/get-one exchange queue.
//!
//! A pool of reusable buffers circulates between two channels: "empty"
//! (reader to writer) and "filled" (writer to reader). Each side exchanges
//! the buffer it holds for one from the other side, so no allocation
//! happens after construction and a slow consumer blocks the producer.
//!
//! Every buffer is owned by exactly one side at a time; the exchange moves
//! ownership through the channel.

use std::mem;
use std::sync::mpsc::{self, Receiver, SyncSender};

use crate::error::{Error, Result};
use crate::psi::Section;
use crate::ts::{ArrayPacket, PacketReplacer};

/// Creates a queue with `len` preallocated buffers built by `make`.
///
/// # Panics
/// If `len` is zero.
pub fn queue<T, F>(len: usize, mut make: F) -> (QueueWriter<T>, QueueReader<T>)
where
    F: FnMut() -> T,
{
    assert!(len > 0, "queue length must be greater than zero");
    let (empty_tx, empty_rx) = mpsc::sync_channel(len);
    let (filled_tx, filled_rx) = mpsc::sync_channel(len);
    for _ in 0..len {
        // Cannot block: the channel has room for exactly `len` buffers.
        let _ = empty_tx.try_send(make());
    }
    (
        QueueWriter {
            empty: empty_rx,
            filled: filled_tx,
            len,
        },
        QueueReader {
            empty: empty_tx,
            filled: filled_rx,
            len,
        },
    )
}

/// Packet queue: both ends implement [`PacketReplacer`].
pub fn packet_queue(len: usize) -> (PacketQueueWriter, PacketQueueReader) {
    queue(len, || Box::new(ArrayPacket::new()))
}

/// Section queue with buffers of `section_cap` bytes each.
pub fn section_queue(len: usize, section_cap: usize) -> (SectionQueueWriter, SectionQueueReader) {
    queue(len, || Section::new(section_cap))
}

pub type PacketQueueWriter = QueueWriter<Box<ArrayPacket>>;
pub type PacketQueueReader = QueueReader<Box<ArrayPacket>>;
pub type SectionQueueWriter = QueueWriter<Section>;
pub type SectionQueueReader = QueueReader<Section>;

/// Write end of a queue.
///
/// Dropping it (or calling [`QueueWriter::close`]) closes the queue: the
/// reader drains the filled buffers and then gets [`Error::EndOfStream`].
#[derive(Debug)]
pub struct QueueWriter<T> {
    empty: Receiver<T>,
    filled: SyncSender<T>,
    len: usize,
}

impl<T> QueueWriter<T> {
    /// Hands the filled buffer in `slot` to the reader and puts an empty
    /// one in its place. Blocks while no empty buffer is available.
    ///
    /// Returns [`Error::EndOfStream`] if the read end is gone; the filled
    /// buffer is dropped then.
    pub fn exchange(&mut self, slot: &mut T) -> Result<()> {
        let empty = self.empty.recv().map_err(|_| Error::EndOfStream)?;
        let filled = mem::replace(slot, empty);
        self.filled.send(filled).map_err(|_| Error::EndOfStream)
    }

    /// Number of buffers in the pool.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Closes the write end.
    pub fn close(self) {}
}

/// Read end of a queue.
#[derive(Debug)]
pub struct QueueReader<T> {
    empty: SyncSender<T>,
    filled: Receiver<T>,
    len: usize,
}

impl<T> QueueReader<T> {
    /// Gives the buffer in `slot` back to the writer and replaces it with
    /// the next filled one. Blocks while nothing has been written.
    ///
    /// Returns [`Error::EndOfStream`] once the write end is closed and all
    /// filled buffers have been consumed; `slot` is left untouched then.
    pub fn exchange(&mut self, slot: &mut T) -> Result<()> {
        let filled = self.filled.recv().map_err(|_| Error::EndOfStream)?;
        let empty = mem::replace(slot, filled);
        // Full only after the writer has gone, the buffer is dropped then.
        let _ = self.empty.try_send(empty);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl PacketReplacer for PacketQueueReader {
    fn replace_packet(&mut self, pkt: &mut Box<ArrayPacket>) -> Result<()> {
        self.exchange(pkt)
    }
}

impl PacketReplacer for PacketQueueWriter {
    fn replace_packet(&mut self, pkt: &mut Box<ArrayPacket>) -> Result<()> {
        self.exchange(pkt)
    }
}
