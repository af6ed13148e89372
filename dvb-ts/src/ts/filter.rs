//! PID filtering of a packet source.

use crate::error::Result;

use super::io::PacketReader;
use super::packet::{PacketMut, ANY_PID};

/// Passes only packets whose PID is in the list.
///
/// [`ANY_PID`] (8192) in the list passes every packet, mirroring the kernel
/// demux convention for "whole transport stream".
#[derive(Debug)]
pub struct PidFilter<R> {
    inner: R,
    pids: Vec<u16>,
    any: bool,
}

impl<R: PacketReader> PidFilter<R> {
    pub fn new(inner: R, pids: &[u16]) -> Self {
        let mut pids = pids.to_vec();
        pids.sort_unstable();
        pids.dedup();
        let any = pids.binary_search(&ANY_PID).is_ok();
        Self { inner, pids, any }
    }

    pub fn matches(&self, pid: u16) -> bool {
        self.any || self.pids.binary_search(&pid).is_ok()
    }

    pub fn pids(&self) -> &[u16] {
        &self.pids
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: PacketReader> PacketReader for PidFilter<R> {
    /// Reads packets until one passes the filter. Errors from the inner
    /// reader are returned immediately.
    fn read_packet(&mut self, pkt: &mut dyn PacketMut) -> Result<()> {
        loop {
            self.inner.read_packet(pkt)?;
            if self.matches(pkt.pid()) {
                return Ok(());
            }
        }
    }
}
