//! Section reassembly from a packet stream.

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::table_id::STUFFING;
use crate::ts::{ArrayPacket, Packet, PacketReader, PacketReplacer, ReadReplacer};

use super::reader::SectionReader;
use super::section::{declared_len, Section, SectionView, SectionViewMut, SECTION_BUF_MIN};

/// Decodes sections from packets of one PID.
///
/// The decoder keeps the last packet it read. When a section ends inside a
/// packet that also starts the next one, the position of that start is
/// remembered and the next [`SectionDecoder::read_section`] call continues
/// from it.
pub struct SectionDecoder<R> {
    src: R,
    pkt: Box<ArrayPacket>,
    /// Payload offset of a section start in `pkt` not decoded yet.
    pending: Option<usize>,
    check_crc: bool,
}

impl<R: PacketReader> SectionDecoder<ReadReplacer<R>> {
    /// Decoder reading packets from a [`PacketReader`].
    pub fn from_reader(src: R, check_crc: bool) -> Self {
        SectionDecoder::new(ReadReplacer(src), check_crc)
    }
}

impl<R: PacketReplacer> SectionDecoder<R> {
    pub fn new(src: R, check_crc: bool) -> Self {
        Self {
            src,
            pkt: Box::new(ArrayPacket::new()),
            pending: None,
            check_crc,
        }
    }

    /// Replaces the packet source. Buffered data of the old source is kept.
    pub fn set_source(&mut self, src: R) {
        self.src = src;
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.src
    }

    pub fn into_inner(self) -> R {
        self.src
    }

    /// Discards a buffered section start.
    pub fn reset(&mut self) {
        self.pending = None;
    }

    /// Reads the next packet with a non-empty payload. Returns false for a
    /// packet with a malformed adaptation field.
    fn next_payload_packet(&mut self) -> Result<bool> {
        loop {
            self.src.replace_packet(&mut self.pkt)?;
            match self.pkt.payload() {
                Ok(p) if p.is_empty() => continue,
                Ok(_) => return Ok(true),
                Err(_) => return Ok(false),
            }
        }
    }

    /// Offset of the first section start in the current packet.
    fn seek_start(&mut self) -> Result<usize> {
        if let Some(off) = self.pending.take() {
            return Ok(off);
        }
        loop {
            if !self.next_payload_packet()? {
                trace!("[SectionDecoder] Skipping packet with malformed adaptation field");
                continue;
            }
            if !self.pkt.payload_start() {
                continue;
            }
            let p = self.pkt.payload()?;
            let off = p[0] as usize + 1;
            if off >= p.len() {
                debug!("[SectionDecoder] pointer_field {} past payload end", p[0]);
                return Err(Error::SectionPointer);
            }
            return Ok(off);
        }
    }

    /// Remembers `off` as the next section start if a section (not
    /// stuffing) begins there.
    fn keep_start(&mut self, off: usize) {
        self.pending = match self.pkt.payload() {
            Ok(p) if off < p.len() && p[off] != STUFFING => Some(off),
            _ => None,
        };
    }

    fn decode(&mut self, buf: &mut [u8]) -> Result<()> {
        let cap = buf.len();
        let mut from = self.seek_start()?;
        // Start of the next section in the current packet, known only when
        // the packet continues a section and has a pointer_field.
        let mut boundary: Option<usize> = None;
        let mut n = 0;
        let mut total = 3;
        let mut header_done = false;

        loop {
            let p = self.pkt.payload()?;
            let end = boundary.unwrap_or(p.len());
            let k = (end - from).min(total - n);
            buf[n..n + k].copy_from_slice(&p[from..from + k]);
            n += k;
            from += k;

            if !header_done && n == 3 {
                header_done = true;
                total = match declared_len(buf) {
                    Some(l) => l,
                    None => {
                        self.keep_boundary(boundary);
                        debug!("[SectionDecoder] Incorrect section_length");
                        return Err(Error::SectionLength);
                    }
                };
                if total > cap {
                    self.keep_boundary(boundary);
                    debug!(
                        "[SectionDecoder] Section of {} bytes does not fit in {}",
                        total, cap
                    );
                    return Err(Error::SectionSpace { need: total, have: cap });
                }
                continue;
            }
            if n == total {
                break;
            }
            if let Some(b) = boundary {
                // Next section starts before this one is complete.
                self.keep_start(b);
                debug!(
                    "[SectionDecoder] Section truncated at {} of {} bytes",
                    n, total
                );
                return Err(Error::SectionData);
            }

            // Continue in the next packet.
            if !self.next_payload_packet()? {
                debug!("[SectionDecoder] Malformed packet inside section");
                return Err(Error::SectionData);
            }
            let p = self.pkt.payload()?;
            if self.pkt.payload_start() {
                let b = p[0] as usize + 1;
                if b >= p.len() {
                    debug!("[SectionDecoder] pointer_field {} past payload end", p[0]);
                    return Err(Error::SectionPointer);
                }
                from = 1;
                boundary = Some(b);
            } else {
                from = 0;
                boundary = None;
            }
        }

        if self.pkt.payload_start() {
            self.keep_start(boundary.unwrap_or(from));
        }
        Ok(())
    }

    fn keep_boundary(&mut self, boundary: Option<usize>) {
        match boundary {
            Some(b) => self.keep_start(b),
            None => self.pending = None,
        }
    }
}

impl<R: PacketReplacer> SectionReader for SectionDecoder<R> {
    /// Decodes one section.
    ///
    /// The whole section must fit in `s`; otherwise [`Error::SectionSpace`]
    /// is returned. With CRC checking enabled, a mismatch gives
    /// [`Error::SectionCrc`] after the section has been consumed.
    ///
    /// # Panics
    /// If the buffer of `s` is shorter than 8 bytes.
    fn read_section(&mut self, s: &mut Section) -> Result<()> {
        assert!(
            s.capacity() >= SECTION_BUF_MIN,
            "section buffer should be at least {} bytes",
            SECTION_BUF_MIN
        );
        self.decode(s.buf_mut())?;
        if self.check_crc && !s.check_crc() {
            debug!("[SectionDecoder] CRC mismatch, table_id 0x{:02X}", s.table_id());
            return Err(Error::SectionCrc);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::{PacketMut, PacketStream, TS_PACKET_SIZE};

    fn section(table_id: u8, ext: u16, data_len: usize) -> Section {
        let mut s = Section::with_header(4096, table_id, true, true);
        s.set_table_id_ext(ext);
        for (i, b) in s.alloc(data_len).iter_mut().enumerate() {
            *b = i as u8;
        }
        s.make_crc();
        s
    }

    /// Builds a packet with `payload` (padded with 0xFF).
    fn packet(pusi: bool, cc: u8, payload: &[u8]) -> ArrayPacket {
        let mut p = ArrayPacket::null();
        p.set_pid(0x20);
        p.set_cc(cc);
        p.set_payload_start(pusi);
        p.payload_mut().unwrap()[..payload.len()].copy_from_slice(payload);
        p
    }

    fn stream(pkts: &[ArrayPacket]) -> Vec<u8> {
        let mut data = Vec::with_capacity(pkts.len() * TS_PACKET_SIZE);
        for p in pkts {
            data.extend_from_slice(&p.0);
        }
        data
    }

    #[test]
    fn test_two_sections_in_one_packet() {
        let a = section(0x42, 1, 10);
        let b = section(0x42, 2, 20);
        let mut payload = vec![0u8];
        payload.extend_from_slice(a.bytes());
        payload.extend_from_slice(b.bytes());
        let data = stream(&[packet(true, 0, &payload)]);

        let mut d = SectionDecoder::from_reader(PacketStream::new(&data[..]), true);
        let mut s = Section::new(1024);
        d.read_section(&mut s).unwrap();
        assert_eq!(s.bytes(), a.bytes());
        d.read_section(&mut s).unwrap();
        assert_eq!(s.bytes(), b.bytes());
        // stuffing follows, nothing pending
        assert!(matches!(d.read_section(&mut s), Err(Error::EndOfStream)));
    }

    #[test]
    fn test_section_across_packets_with_pointer() {
        let a = section(0x42, 1, 300);
        let b = section(0x42, 2, 5);
        let ab = a.bytes();
        // packet 0: start of a, packet 1: rest of a then b
        let mut p0 = vec![0u8];
        p0.extend_from_slice(&ab[..183]);
        let tail = &ab[183..];
        let mut p1 = vec![tail.len() as u8];
        p1.extend_from_slice(tail);
        p1.extend_from_slice(b.bytes());
        let data = stream(&[packet(true, 0, &p0), packet(true, 1, &p1)]);

        let mut d = SectionDecoder::from_reader(PacketStream::new(&data[..]), true);
        let mut s = Section::new(1024);
        d.read_section(&mut s).unwrap();
        assert_eq!(s.bytes(), ab);
        d.read_section(&mut s).unwrap();
        assert_eq!(s.bytes(), b.bytes());
    }

    #[test]
    fn test_truncated_section_keeps_next_start() {
        let a = section(0x42, 1, 300);
        let b = section(0x42, 2, 5);
        let mut p0 = vec![0u8];
        p0.extend_from_slice(&a.bytes()[..183]);
        // pointer says only 10 bytes of a follow
        let mut p1 = vec![10u8];
        p1.extend_from_slice(&a.bytes()[183..193]);
        p1.extend_from_slice(b.bytes());
        let data = stream(&[packet(true, 0, &p0), packet(true, 1, &p1)]);

        let mut d = SectionDecoder::from_reader(PacketStream::new(&data[..]), true);
        let mut s = Section::new(1024);
        assert!(matches!(d.read_section(&mut s), Err(Error::SectionData)));
        d.read_section(&mut s).unwrap();
        assert_eq!(s.bytes(), b.bytes());
    }

    #[test]
    fn test_bad_pointer_and_crc() {
        let a = section(0x42, 1, 10);
        let mut bad = a.clone();
        bad.buf_mut()[9] ^= 0x01;

        let mut p1 = vec![0u8];
        p1.extend_from_slice(bad.bytes());
        let mut p2 = vec![0u8];
        p2.extend_from_slice(a.bytes());
        let data = stream(&[
            packet(true, 0, &[200]),
            packet(true, 1, &p1),
            packet(true, 2, &p2),
        ]);

        let mut d = SectionDecoder::from_reader(PacketStream::new(&data[..]), true);
        let mut s = Section::new(1024);
        assert!(matches!(d.read_section(&mut s), Err(Error::SectionPointer)));
        assert!(matches!(d.read_section(&mut s), Err(Error::SectionCrc)));
        d.read_section(&mut s).unwrap();
        assert_eq!(s.bytes(), a.bytes());
    }

    #[test]
    fn test_no_space() {
        let a = section(0x42, 1, 100);
        let mut p = vec![0u8];
        p.extend_from_slice(a.bytes());
        let data = stream(&[packet(true, 0, &p)]);

        let mut d = SectionDecoder::from_reader(PacketStream::new(&data[..]), true);
        let mut s = Section::new(64);
        assert!(matches!(
            d.read_section(&mut s),
            Err(Error::SectionSpace { need: 112, have: 64 })
        ));
    }

    #[test]
    fn test_skips_until_payload_start() {
        let a = section(0x42, 7, 10);
        let mut p = vec![0u8];
        p.extend_from_slice(a.bytes());
        let mut af_only = ArrayPacket::null();
        af_only.set_contains_payload(false);
        af_only.set_contains_af(true);
        af_only.0[4] = 183;
        af_only.0[5] = 0;
        let data = stream(&[
            packet(false, 0, &[1, 2, 3]),
            af_only,
            packet(true, 1, &p),
        ]);

        let mut d = SectionDecoder::from_reader(PacketStream::new(&data[..]), false);
        let mut s = Section::new(1024);
        d.read_section(&mut s).unwrap();
        assert_eq!(s.table_id_ext(), 7);
    }

    #[test]
    fn test_header_split_across_packets() {
        let a = section(0x42, 3, 400);
        let ab = a.bytes();
        // the first packet holds only 2 bytes of the section
        let mut p0 = vec![181u8];
        p0.extend_from_slice(&[0xAA; 181]);
        p0.extend_from_slice(&ab[..2]);
        let mut pkts = vec![packet(true, 0, &p0)];
        let mut rest = &ab[2..];
        let mut cc = 1;
        while !rest.is_empty() {
            let n = rest.len().min(184);
            pkts.push(packet(false, cc, &rest[..n]));
            rest = &rest[n..];
            cc += 1;
        }
        let data = stream(&pkts);

        let mut d = SectionDecoder::from_reader(PacketStream::new(&data[..]), true);
        let mut s = Section::new(1024);
        d.read_section(&mut s).unwrap();
        assert_eq!(s.bytes(), ab);
    }

    /// Packet 0 of a 300-byte-data section followed by `next` and a packet
    /// carrying a complete section with extension 9.
    fn interrupted(next: ArrayPacket) -> Vec<u8> {
        let a = section(0x42, 1, 300);
        let b = section(0x42, 9, 5);
        let mut p0 = vec![0u8];
        p0.extend_from_slice(&a.bytes()[..183]);
        let mut p2 = vec![0u8];
        p2.extend_from_slice(b.bytes());
        stream(&[packet(true, 0, &p0), next, packet(true, 2, &p2)])
    }

    #[test]
    fn test_malformed_af_inside_section() {
        let mut bad = packet(false, 1, &[0x55; 100]);
        bad.set_contains_af(true);
        bad.0[4] = 190;
        let data = interrupted(bad);

        let mut d = SectionDecoder::from_reader(PacketStream::new(&data[..]), true);
        let mut s = Section::new(1024);
        assert!(matches!(d.read_section(&mut s), Err(Error::SectionData)));
        d.read_section(&mut s).unwrap();
        assert_eq!(s.table_id_ext(), 9);
    }

    #[test]
    fn test_bad_pointer_inside_section() {
        let data = interrupted(packet(true, 1, &[200]));

        let mut d = SectionDecoder::from_reader(PacketStream::new(&data[..]), true);
        let mut s = Section::new(1024);
        assert!(matches!(d.read_section(&mut s), Err(Error::SectionPointer)));
        d.read_section(&mut s).unwrap();
        assert_eq!(s.table_id_ext(), 9);
    }
}
