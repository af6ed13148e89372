//! Byte stream to packet synchronizer.

use std::io::Read;

use log::{debug, warn};

use crate::error::{Error, Result};

use super::io::PacketReader;
use super::packet::{PacketMut, SYNC_BYTE, TS_PACKET_SIZE};

/// Number of consecutive sync bytes required to accept a packet phase.
const SYNC_CHECK_PACKETS: usize = 3;
const SYNC_BUF_LEN: usize = SYNC_CHECK_PACKETS * TS_PACKET_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    /// Nothing buffered yet.
    Fresh,
    /// The first packet of the sync buffer holds a packet that failed the
    /// sync byte check.
    Lost,
    /// The last search failed; the next one slides the window by a packet.
    Retry,
    /// Synchronized, packets are served from the sync buffer at this offset.
    Buffered(usize),
    /// Synchronized, packets are read directly from the source.
    InSync,
}

/// Reads packets from any byte stream.
///
/// Reading may start at any point of the stream. While synchronized every
/// packet is read straight into the caller's buffer. When the sync byte is
/// missing, [`Error::Sync`] is returned and the next read searches for
/// three sync bytes spaced 188 bytes apart within a three-packet window.
/// If no such point exists the window slides by one packet per call and
/// [`Error::Sync`] is returned again; the caller decides how many times to
/// retry.
///
/// No memory is allocated after construction.
pub struct PacketStream<R> {
    inner: R,
    sync_buf: [u8; SYNC_BUF_LEN],
    state: SyncState,
    sync_losses: u64,
}

impl<R: Read> PacketStream<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            sync_buf: [0u8; SYNC_BUF_LEN],
            state: SyncState::Fresh,
            sync_losses: 0,
        }
    }

    /// Replaces the byte source; forces resynchronization.
    pub fn set_reader(&mut self, inner: R) {
        self.inner = inner;
        self.state = SyncState::Fresh;
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Number of times synchronization was lost after being acquired.
    pub fn sync_losses(&self) -> u64 {
        self.sync_losses
    }

    fn fill(&mut self, from: usize) -> Result<()> {
        self.inner
            .read_exact(&mut self.sync_buf[from..])
            .map_err(Error::from_read)
    }

    fn synchronize(&mut self) -> Result<()> {
        match self.state {
            SyncState::Fresh => {
                self.state = SyncState::Retry;
                self.fill(0)?;
            }
            SyncState::Lost => {
                self.state = SyncState::Retry;
                self.fill(TS_PACKET_SIZE)?;
            }
            _ => {
                self.sync_buf.copy_within(TS_PACKET_SIZE.., 0);
                self.fill(SYNC_BUF_LEN - TS_PACKET_SIZE)?;
            }
        }

        match find_sync_offset(&self.sync_buf) {
            Some(off) => {
                if off > 0 {
                    self.sync_buf.copy_within(off.., 0);
                    self.fill(SYNC_BUF_LEN - off)?;
                }
                debug!("[PacketStream] Synchronized, dropped {} bytes", off);
                self.state = SyncState::Buffered(0);
                Ok(())
            }
            None => {
                debug!(
                    "[PacketStream] No sync point in {} bytes, sliding window",
                    SYNC_BUF_LEN
                );
                Err(Error::Sync)
            }
        }
    }
}

/// Finds the first offset within one packet length where
/// [`SYNC_CHECK_PACKETS`] sync bytes follow each other at packet spacing.
fn find_sync_offset(buf: &[u8]) -> Option<usize> {
    (0..TS_PACKET_SIZE).find(|&start| {
        (0..SYNC_CHECK_PACKETS).all(|k| {
            buf.get(start + k * TS_PACKET_SIZE)
                .map_or(false, |&b| b == SYNC_BYTE)
        })
    })
}

impl<R: Read> PacketReader for PacketStream<R> {
    fn read_packet(&mut self, pkt: &mut dyn PacketMut) -> Result<()> {
        if matches!(
            self.state,
            SyncState::Fresh | SyncState::Lost | SyncState::Retry
        ) {
            self.synchronize()?;
        }
        if let SyncState::Buffered(off) = self.state {
            let end = off + TS_PACKET_SIZE;
            pkt.bytes_mut().copy_from_slice(&self.sync_buf[off..end]);
            self.state = if end == SYNC_BUF_LEN {
                SyncState::InSync
            } else {
                SyncState::Buffered(end)
            };
            return Ok(());
        }

        if let Err(e) = self.inner.read_exact(pkt.bytes_mut()) {
            let e = Error::from_read(e);
            if matches!(e, Error::Overflow) {
                warn!("[PacketStream] Device buffer overflow, data lost");
            }
            return Err(e);
        }
        if !pkt.sync_ok() {
            warn!("[PacketStream] Lost MPEG-TS synchronization");
            self.sync_losses += 1;
            self.sync_buf[..TS_PACKET_SIZE].copy_from_slice(pkt.bytes());
            self.state = SyncState::Lost;
            return Err(Error::Sync);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::packet::{ArrayPacket, Packet};

    fn packets(n: usize) -> Vec<u8> {
        let mut data = Vec::new();
        for i in 0..n {
            let mut p = ArrayPacket::null();
            p.set_pid(0x100 + i as u16);
            data.extend_from_slice(&p.0);
        }
        data
    }

    /// Reads until end of stream, retrying on sync errors.
    fn read_all<R: Read>(s: &mut PacketStream<R>) -> (Vec<u16>, usize) {
        let mut pids = Vec::new();
        let mut sync_errors = 0;
        let mut pkt = ArrayPacket::new();
        loop {
            match s.read_packet(&mut pkt) {
                Ok(()) => {
                    assert!(pkt.sync_ok());
                    pids.push(pkt.pid());
                }
                Err(Error::Sync) => sync_errors += 1,
                Err(Error::EndOfStream) => return (pids, sync_errors),
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
    }

    #[test]
    fn test_aligned_stream() {
        let data = packets(5);
        let mut s = PacketStream::new(&data[..]);
        let (pids, errors) = read_all(&mut s);
        assert_eq!(pids, (0x100..0x105).collect::<Vec<_>>());
        assert_eq!(errors, 0);
    }

    #[test]
    fn test_garbage_prefix() {
        for &k in &[1usize, 7, 100, 187, 188, 300, 1000] {
            let mut data = vec![0u8; k];
            data.extend_from_slice(&packets(8));
            let mut s = PacketStream::new(&data[..]);
            let (pids, _) = read_all(&mut s);
            assert_eq!(pids, (0x100..0x108).collect::<Vec<_>>(), "k = {}", k);
        }
    }

    #[test]
    fn test_sync_loss_mid_stream() {
        let all = packets(6);
        let mut data = all[..2 * TS_PACKET_SIZE].to_vec();
        data.extend_from_slice(&[0u8; 5]);
        data.extend_from_slice(&all[2 * TS_PACKET_SIZE..]);

        let mut s = PacketStream::new(&data[..]);
        let (pids, errors) = read_all(&mut s);
        assert_eq!(pids, (0x100..0x106).collect::<Vec<_>>());
        assert_eq!(errors, 1);
        assert_eq!(s.sync_losses(), 1);
    }

    #[test]
    fn test_no_sync_point() {
        let data = vec![0x47u8; 100];
        let mut s = PacketStream::new(&data[..]);
        let mut pkt = ArrayPacket::new();
        assert!(matches!(
            s.read_packet(&mut pkt),
            Err(Error::EndOfStream)
        ));
    }

    #[test]
    fn test_find_sync_offset() {
        let mut buf = [0u8; SYNC_BUF_LEN];
        assert_eq!(find_sync_offset(&buf), None);
        for k in 0..SYNC_CHECK_PACKETS {
            buf[10 + k * TS_PACKET_SIZE] = SYNC_BYTE;
        }
        assert_eq!(find_sync_offset(&buf), Some(10));
    }
}
