//! MPEG-TS packet views.
//!
//! A packet is 188 bytes starting with the sync byte 0x47. The [`Packet`]
//! and [`PacketMut`] traits provide direct-on-buffer access to every header
//! field; the backing storage is either an owned array ([`ArrayPacket`]) or
//! a slice borrowed from a larger buffer ([`SlicePacket`],
//! [`SlicePacketMut`]).

use crate::error::{Error, Result};

use super::adaptation::{AdaptationField, AdaptationFieldMut};
use super::flags::{PacketFlags, ScramblingControl};

/// TS packet size in bytes.
pub const TS_PACKET_SIZE: usize = 188;

/// TS sync byte (0x47).
pub const SYNC_BYTE: u8 = 0x47;

/// Null packet PID (stuffing).
pub const NULL_PID: u16 = 0x1FFF;

/// PID filter sentinel matching any packet.
pub const ANY_PID: u16 = 0x2000;

/// Largest adaptation_field_length when a payload follows.
const AF_MAX_LEN_WITH_PAYLOAD: usize = 182;
/// adaptation_field_length required when there is no payload.
const AF_LEN_WITHOUT_PAYLOAD: usize = 183;

/// Parsed TS packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsHeader {
    /// Transport error indicator.
    pub transport_error: bool,
    /// Payload unit start indicator.
    pub payload_unit_start: bool,
    /// Transport priority.
    pub transport_priority: bool,
    /// Packet Identifier (13 bits).
    pub pid: u16,
    /// Transport scrambling control.
    pub scrambling_control: ScramblingControl,
    /// Adaptation field control (2 bits).
    pub adaptation_field_control: u8,
    /// Continuity counter (4 bits).
    pub continuity_counter: u8,
}

impl TsHeader {
    /// Check if packet has adaptation field.
    pub fn has_adaptation_field(&self) -> bool {
        self.adaptation_field_control & 0x02 != 0
    }

    /// Check if packet has payload.
    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control & 0x01 != 0
    }

    /// Check if packet is scrambled.
    pub fn is_scrambled(&self) -> bool {
        self.scrambling_control != ScramblingControl::NotScrambled
    }
}

/// Read access to a 188-byte TS packet.
pub trait Packet {
    /// Raw packet bytes; always exactly [`TS_PACKET_SIZE`] long.
    fn bytes(&self) -> &[u8];

    fn sync_ok(&self) -> bool {
        self.bytes()[0] == SYNC_BYTE
    }

    fn pid(&self) -> u16 {
        let b = self.bytes();
        ((b[1] as u16 & 0x1F) << 8) | b[2] as u16
    }

    /// Continuity counter.
    fn cc(&self) -> u8 {
        self.bytes()[3] & 0x0F
    }

    fn flags(&self) -> PacketFlags {
        let b = self.bytes();
        PacketFlags((b[1] & 0xE0) | (b[3] >> 4))
    }

    fn contains_error(&self) -> bool {
        self.flags().contains_error()
    }

    fn payload_start(&self) -> bool {
        self.flags().payload_start()
    }

    fn priority(&self) -> bool {
        self.flags().priority()
    }

    fn scrambling_control(&self) -> ScramblingControl {
        self.flags().scrambling_control()
    }

    fn contains_af(&self) -> bool {
        self.flags().contains_af()
    }

    fn contains_payload(&self) -> bool {
        self.flags().contains_payload()
    }

    fn header(&self) -> TsHeader {
        let b = self.bytes();
        TsHeader {
            transport_error: self.contains_error(),
            payload_unit_start: self.payload_start(),
            transport_priority: self.priority(),
            pid: self.pid(),
            scrambling_control: self.scrambling_control(),
            adaptation_field_control: (b[3] >> 4) & 0x03,
            continuity_counter: self.cc(),
        }
    }

    /// Adaptation field content.
    ///
    /// Returns an empty field if the packet has none, and
    /// [`Error::MalformedAdaptationField`] if adaptation_field_length does
    /// not agree with the adaptation_field_control bits.
    fn adaptation_field(&self) -> Result<AdaptationField<'_>> {
        af_range(self.bytes()).map(|r| AdaptationField::new(&self.bytes()[r]))
    }

    /// Payload bytes.
    ///
    /// Returns an empty slice if the packet carries no payload, and
    /// [`Error::MalformedAdaptationField`] if the payload position cannot
    /// be determined.
    fn payload(&self) -> Result<&[u8]> {
        payload_offset(self.bytes()).map(|off| &self.bytes()[off..])
    }
}

/// Write access to a 188-byte TS packet.
pub trait PacketMut: Packet {
    fn bytes_mut(&mut self) -> &mut [u8];

    fn set_sync(&mut self) {
        self.bytes_mut()[0] = SYNC_BYTE;
    }

    /// # Panics
    /// If `pid > 0x1FFF`.
    fn set_pid(&mut self, pid: u16) {
        assert!(pid <= NULL_PID, "bad PID: {}", pid);
        let b = self.bytes_mut();
        b[1] = (b[1] & 0xE0) | (pid >> 8) as u8;
        b[2] = pid as u8;
    }

    fn set_cc(&mut self, cc: u8) {
        let b = self.bytes_mut();
        b[3] = (b[3] & 0xF0) | (cc & 0x0F);
    }

    fn inc_cc(&mut self) {
        let cc = self.cc().wrapping_add(1);
        self.set_cc(cc);
    }

    fn set_flags(&mut self, f: PacketFlags) {
        let b = self.bytes_mut();
        b[1] = (b[1] & 0x1F) | (f.0 & 0xE0);
        b[3] = (b[3] & 0x0F) | (f.0 << 4);
    }

    fn set_payload_start(&mut self, v: bool) {
        let mut f = self.flags();
        f.set_payload_start(v);
        self.set_flags(f);
    }

    fn set_contains_error(&mut self, v: bool) {
        let mut f = self.flags();
        f.set_contains_error(v);
        self.set_flags(f);
    }

    fn set_priority(&mut self, v: bool) {
        let mut f = self.flags();
        f.set_priority(v);
        self.set_flags(f);
    }

    fn set_scrambling_control(&mut self, sc: ScramblingControl) {
        let mut f = self.flags();
        f.set_scrambling_control(sc);
        self.set_flags(f);
    }

    fn set_contains_af(&mut self, v: bool) {
        let mut f = self.flags();
        f.set_contains_af(v);
        self.set_flags(f);
    }

    fn set_contains_payload(&mut self, v: bool) {
        let mut f = self.flags();
        f.set_contains_payload(v);
        self.set_flags(f);
    }

    fn adaptation_field_mut(&mut self) -> Result<AdaptationFieldMut<'_>> {
        let r = af_range(self.bytes())?;
        Ok(AdaptationFieldMut::new(&mut self.bytes_mut()[r]))
    }

    fn payload_mut(&mut self) -> Result<&mut [u8]> {
        let off = payload_offset(self.bytes())?;
        Ok(&mut self.bytes_mut()[off..])
    }

    /// Copies the whole content of `src`.
    fn copy_from(&mut self, src: &dyn Packet) {
        self.bytes_mut().copy_from_slice(src.bytes());
    }
}

fn af_range(b: &[u8]) -> Result<std::ops::Range<usize>> {
    let f = PacketFlags((b[1] & 0xE0) | (b[3] >> 4));
    if !f.contains_af() {
        return Ok(5..5);
    }
    let alen = b[4] as usize;
    let ok = if f.contains_payload() {
        alen <= AF_MAX_LEN_WITH_PAYLOAD
    } else {
        alen == AF_LEN_WITHOUT_PAYLOAD
    };
    if !ok {
        return Err(Error::MalformedAdaptationField);
    }
    Ok(5..5 + alen)
}

fn payload_offset(b: &[u8]) -> Result<usize> {
    let f = PacketFlags((b[1] & 0xE0) | (b[3] >> 4));
    if !f.contains_payload() {
        return Ok(TS_PACKET_SIZE);
    }
    if !f.contains_af() {
        return Ok(4);
    }
    af_range(b).map(|r| r.end)
}

/// Packet stored in an owned array.
#[derive(Clone, PartialEq, Eq)]
pub struct ArrayPacket(pub [u8; TS_PACKET_SIZE]);

impl ArrayPacket {
    /// A zeroed packet (sync byte not set).
    pub fn new() -> Self {
        ArrayPacket([0u8; TS_PACKET_SIZE])
    }

    /// A null packet: sync, PID 0x1FFF, payload only, payload filled with 0xFF.
    pub fn null() -> Self {
        let mut p = ArrayPacket([0xFF; TS_PACKET_SIZE]);
        p.0[..4].copy_from_slice(&[SYNC_BYTE, 0x1F, 0xFF, 0x10]);
        p
    }

    pub fn as_slice(&self) -> SlicePacket<'_> {
        SlicePacket(&self.0)
    }
}

impl Default for ArrayPacket {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ArrayPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayPacket")
            .field("header", &self.header())
            .finish()
    }
}

impl Packet for ArrayPacket {
    fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl PacketMut for ArrayPacket {
    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// Packet borrowed from a larger buffer.
#[derive(Debug, Clone, Copy)]
pub struct SlicePacket<'a>(&'a [u8]);

impl<'a> SlicePacket<'a> {
    /// Treats the beginning of `buf` as a packet.
    ///
    /// # Panics
    /// If `buf` is shorter than [`TS_PACKET_SIZE`].
    pub fn new(buf: &'a [u8]) -> Self {
        assert!(
            buf.len() >= TS_PACKET_SIZE,
            "buffer too small to be treated as MPEG-TS packet"
        );
        SlicePacket(&buf[..TS_PACKET_SIZE])
    }

    /// Parse a TS packet from raw bytes, checking length and sync byte.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < TS_PACKET_SIZE || data[0] != SYNC_BYTE {
            return Err(Error::Sync);
        }
        Ok(SlicePacket(&data[..TS_PACKET_SIZE]))
    }

    pub fn to_owned(&self) -> ArrayPacket {
        let mut p = ArrayPacket::new();
        p.copy_from(self);
        p
    }
}

impl Packet for SlicePacket<'_> {
    fn bytes(&self) -> &[u8] {
        self.0
    }
}

/// Mutable packet borrowed from a larger buffer.
#[derive(Debug)]
pub struct SlicePacketMut<'a>(&'a mut [u8]);

impl<'a> SlicePacketMut<'a> {
    /// # Panics
    /// If `buf` is shorter than [`TS_PACKET_SIZE`].
    pub fn new(buf: &'a mut [u8]) -> Self {
        assert!(
            buf.len() >= TS_PACKET_SIZE,
            "buffer too small to be treated as MPEG-TS packet"
        );
        SlicePacketMut(&mut buf[..TS_PACKET_SIZE])
    }
}

impl Packet for SlicePacketMut<'_> {
    fn bytes(&self) -> &[u8] {
        self.0
    }
}

impl PacketMut for SlicePacketMut<'_> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.0
    }
}

/// Iterator over the packets of a byte buffer such as a UDP datagram.
///
/// A packet is accepted where a sync byte is followed, 188 bytes later, by
/// another sync byte or by the end of the buffer. Other bytes are skipped
/// up to the next sync byte and counted by [`SlicePacketIter::skipped`]. A
/// trailing partial packet is left unconsumed.
pub struct SlicePacketIter<'a> {
    data: &'a [u8],
    pos: usize,
    skipped: usize,
}

impl<'a> SlicePacketIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            skipped: 0,
        }
    }

    /// Bytes consumed so far, skipped ones included.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<'a> Iterator for SlicePacketIter<'a> {
    type Item = SlicePacket<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rest = &self.data[self.pos..];
            if rest.len() < TS_PACKET_SIZE {
                return None;
            }
            let next = rest.get(TS_PACKET_SIZE).copied();
            if rest[0] == SYNC_BYTE && next.map_or(true, |b| b == SYNC_BYTE) {
                self.pos += TS_PACKET_SIZE;
                return Some(SlicePacket(&rest[..TS_PACKET_SIZE]));
            }
            let n = rest[1..]
                .iter()
                .position(|&b| b == SYNC_BYTE)
                .map_or(rest.len(), |i| i + 1);
            self.pos += n;
            self.skipped += n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcr::Pcr;

    #[test]
    fn test_parse_null_packet() {
        let packet = ArrayPacket::null();
        assert!(packet.sync_ok());
        assert_eq!(packet.pid(), NULL_PID);
        assert!(!packet.contains_error());
        assert!(packet.contains_payload());
        assert!(!packet.contains_af());
        assert_eq!(packet.payload().unwrap().len(), 184);
    }

    #[test]
    fn test_header_setters() {
        let mut p = ArrayPacket::new();
        p.set_sync();
        p.set_pid(0x1234);
        p.set_cc(15);
        p.inc_cc();
        p.set_payload_start(true);
        p.set_contains_payload(true);
        p.set_priority(true);

        let h = p.header();
        assert_eq!(h.pid, 0x1234);
        assert_eq!(h.continuity_counter, 0);
        assert!(h.payload_unit_start);
        assert!(h.transport_priority);
        assert!(h.has_payload());
        assert!(!h.has_adaptation_field());
        assert!(!h.is_scrambled());
        assert_eq!(&p.0[..4], &[0x47, 0x72, 0x34, 0x10]);
    }

    #[test]
    #[should_panic]
    fn test_set_pid_out_of_range() {
        ArrayPacket::new().set_pid(0x2000);
    }

    #[test]
    fn test_af_absent_vs_malformed() {
        let mut p = ArrayPacket::null();
        // control bit clear: absent, not an error
        assert!(p.adaptation_field().unwrap().is_empty());

        p.set_contains_af(true);
        p.0[4] = 190;
        assert!(matches!(
            p.adaptation_field(),
            Err(Error::MalformedAdaptationField)
        ));
        assert!(matches!(p.payload(), Err(Error::MalformedAdaptationField)));

        // AF without payload must be exactly 183 bytes
        p.set_contains_payload(false);
        p.0[4] = 182;
        assert!(p.adaptation_field().is_err());
        p.0[4] = 183;
        assert_eq!(p.adaptation_field().unwrap().bytes().len(), 183);
        assert!(p.payload().unwrap().is_empty());
    }

    #[test]
    fn test_af_with_pcr_and_payload() {
        let mut p = ArrayPacket::null();
        p.set_pid(0x100);
        p.set_contains_af(true);
        p.0[4] = 7;
        p.0[5] = 0x10;
        p.adaptation_field_mut()
            .unwrap()
            .set_pcr(Pcr::from_parts(900_000, 150))
            .unwrap();

        assert_eq!(
            p.adaptation_field().unwrap().pcr().unwrap(),
            Pcr::from_parts(900_000, 150)
        );
        assert_eq!(p.payload().unwrap().len(), 184 - 8);
    }

    #[test]
    fn test_slice_packet_views() {
        let mut buf = vec![0u8; TS_PACKET_SIZE * 2];
        buf[..TS_PACKET_SIZE].copy_from_slice(&ArrayPacket::null().0);
        {
            let mut p = SlicePacketMut::new(&mut buf[TS_PACKET_SIZE..]);
            p.set_sync();
            p.set_pid(0x11);
            p.set_contains_payload(true);
        }
        let p = SlicePacket::new(&buf[TS_PACKET_SIZE..]);
        assert_eq!(p.pid(), 0x11);
        assert!(p.sync_ok());
        assert_eq!(p.to_owned().pid(), 0x11);
    }

    #[test]
    fn test_invalid_sync_byte() {
        let packet = [0u8; 188];
        assert!(matches!(SlicePacket::parse(&packet), Err(Error::Sync)));
    }

    #[test]
    fn test_iterator_skips_garbage() {
        let mut data = vec![0x00, 0x01, 0x02];
        data.extend_from_slice(&ArrayPacket::null().0);
        // a stray sync byte that does not start a packet
        data.push(0x47);
        let mut p = ArrayPacket::null();
        p.set_pid(0x100);
        data.extend_from_slice(&p.0);
        data.extend_from_slice(&[0x47; 20]);

        let mut it = SlicePacketIter::new(&data);
        assert_eq!(it.next().unwrap().pid(), NULL_PID);
        assert_eq!(it.skipped(), 3);
        assert_eq!(it.next().unwrap().pid(), 0x100);
        assert_eq!(it.skipped(), 4);
        assert!(it.next().is_none());
        assert_eq!(it.position(), data.len() - 20);
    }
}
