//! Section packetization.

use log::trace;

use crate::error::Result;
use crate::ts::{
    ArrayPacket, Packet, PacketFlags, PacketMut, PacketReplacer, PacketWriter, WriteReplacer,
};

use super::section::SectionView;

/// Payload bytes of a packet without adaptation field.
const PAYLOAD_LEN: usize = 184;
const STUFFING: u8 = 0xFF;

/// Encodes sections into packets of one PID.
///
/// One packet is buffered: a section that ends inside a packet leaves it
/// there, so the head of the next section can share it. Call
/// [`SectionEncoder::flush`] after the last section to emit the buffered
/// packet padded with 0xFF.
///
/// The continuity counter is incremented by one for every emitted packet.
pub struct SectionEncoder<W> {
    dst: W,
    pid: u16,
    cc: u8,
    pkt: Box<ArrayPacket>,
    /// Used payload bytes of `pkt`; zero means nothing is buffered.
    offset: usize,
}

impl<W: PacketWriter> SectionEncoder<WriteReplacer<W>> {
    /// Encoder writing packets to a [`PacketWriter`].
    pub fn from_writer(dst: W, pid: u16) -> Self {
        SectionEncoder::new(WriteReplacer(dst), pid)
    }
}

impl<W: PacketReplacer> SectionEncoder<W> {
    /// # Panics
    /// If `pid > 0x1FFF`.
    pub fn new(dst: W, pid: u16) -> Self {
        let mut e = Self {
            dst,
            pid,
            cc: 0,
            pkt: Box::new(ArrayPacket::new()),
            offset: 0,
        };
        e.setup_header();
        e
    }

    pub fn pid(&self) -> u16 {
        self.pid
    }

    /// Continuity counter of the next packet.
    pub fn cc(&self) -> u8 {
        self.cc
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.dst
    }

    pub fn into_inner(self) -> W {
        self.dst
    }

    fn setup_header(&mut self) {
        let mut flags = PacketFlags::default();
        flags.set_contains_payload(true);
        self.pkt.set_sync();
        self.pkt.set_pid(self.pid);
        self.pkt.set_flags(flags);
        self.pkt.set_cc(self.cc);
    }

    /// Emits the buffered packet and prepares the next one. The continuity
    /// counter only advances if the packet was accepted, so a failed packet
    /// leaves no gap.
    fn emit(&mut self) -> Result<()> {
        self.offset = 0;
        let res = self.dst.replace_packet(&mut self.pkt);
        if res.is_ok() {
            self.cc = (self.cc + 1) & 0x0F;
        }
        self.setup_header();
        res
    }

    fn payload(&mut self) -> &mut [u8] {
        &mut self.pkt.0[4..]
    }

    /// Writes the buffered packet, if any, padding it with 0xFF.
    pub fn flush(&mut self) -> Result<()> {
        if self.offset == 0 {
            return Ok(());
        }
        let off = self.offset;
        for b in &mut self.payload()[off..] {
            *b = STUFFING;
        }
        self.emit()
    }

    /// Encodes one section into one or more packets.
    ///
    /// # Panics
    /// If the section length is invalid or the section does not fit in
    /// its buffer.
    pub fn write_section<S: SectionView + ?Sized>(&mut self, s: &S) -> Result<()> {
        let mut rest = s.bytes();

        if self.offset > 0 {
            if self.pkt.payload_start() || self.offset > PAYLOAD_LEN - 2 {
                // A section already starts here, or no room for a pointer
                // and at least one byte.
                self.flush()?;
            } else {
                // The buffered packet ends the previous section; insert a
                // pointer_field in front of it and append our head.
                let off = self.offset;
                let p = self.payload();
                p.copy_within(0..off, 1);
                p[0] = off as u8;
                let n = rest.len().min(PAYLOAD_LEN - 1 - off);
                p[1 + off..1 + off + n].copy_from_slice(&rest[..n]);
                self.offset = 1 + off + n;
                self.pkt.set_payload_start(true);
                rest = &rest[n..];
                trace!(
                    "[SectionEncoder] PID {}: section head of {} bytes shares a packet",
                    self.pid,
                    n
                );
                self.flush()?;
            }
        }

        if self.offset == 0 && rest.len() == s.bytes().len() {
            self.pkt.set_payload_start(true);
            self.payload()[0] = 0;
            self.offset = 1;
        }

        while !rest.is_empty() {
            let off = self.offset;
            let n = rest.len().min(PAYLOAD_LEN - off);
            self.payload()[off..off + n].copy_from_slice(&rest[..n]);
            self.offset += n;
            rest = &rest[n..];
            if self.offset == PAYLOAD_LEN {
                self.emit()?;
            }
        }
        Ok(())
    }
}
