//! PES packet header.
//!
//! A PES packet starts in the payload of a packet with
//! payload_unit_start_indicator set:
//!
//! ```text
//! 00 00 01 | stream_id | PES_packet_length (16) | flags (16) |
//! PES_header_data_length (8) | PTS (40) | DTS (40) | ...
//! ```
//!
//! The flags and the optional fields are absent for the stream ids
//! rejected by [`has_optional_header`].

use std::fmt;
use std::time::Duration;

use nom::bits::{bits, complete::take};
use nom::sequence::tuple;
use nom::IResult;

use crate::error::{Error, Result};
use crate::pcr::Pcr;

use super::flags::PesFlags;

/// Length of the fixed part: start code prefix, stream_id, packet length.
pub const PES_PREFIX_LEN: usize = 6;

/// Fixed part plus flags and PES_header_data_length.
pub const PES_HEADER_MIN_LEN: usize = 9;

/// Length of an encoded PTS or DTS.
pub const PES_TIMESTAMP_LEN: usize = 5;

/// stream_id values.
pub mod stream_id {
    pub const PROGRAM_STREAM_MAP: u8 = 0xBC;
    pub const PRIVATE_STREAM_1: u8 = 0xBD;
    pub const PADDING: u8 = 0xBE;
    pub const PRIVATE_STREAM_2: u8 = 0xBF;
    /// First MPEG audio stream id (0xC0..=0xDF).
    pub const AUDIO: u8 = 0xC0;
    /// First MPEG video stream id (0xE0..=0xEF).
    pub const VIDEO: u8 = 0xE0;
    pub const ECM: u8 = 0xF0;
    pub const EMM: u8 = 0xF1;
    pub const DSMCC: u8 = 0xF2;
    pub const H222_1_TYPE_E: u8 = 0xF8;
    pub const PROGRAM_STREAM_DIRECTORY: u8 = 0xFF;
}

/// 4-bit prefix of a PTS when no DTS follows.
pub const PTS_ONLY_PREFIX: u8 = 0b0010;
/// 4-bit prefix of a PTS followed by a DTS.
pub const PTS_PREFIX: u8 = 0b0011;
/// 4-bit prefix of a DTS.
pub const DTS_PREFIX: u8 = 0b0001;

const TIMESTAMP_LIMIT: u64 = 1 << 33;

/// Presentation or decoding timestamp: 90 kHz ticks, 33 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PesTimestamp(u64);

type TimestampFields = (u8, u64, u8, u64, u8, u64, u8);

fn timestamp_fields(input: &[u8]) -> IResult<&[u8], TimestampFields> {
    bits::<_, _, nom::error::Error<(&[u8], usize)>, _, _>(tuple((
        take(4usize),
        take(3usize),
        take(1usize),
        take(15usize),
        take(1usize),
        take(15usize),
        take(1usize),
    )))(input)
}

impl PesTimestamp {
    /// Wraps `ticks` into the 33-bit range.
    pub fn new(ticks: u64) -> Self {
        PesTimestamp(ticks % TIMESTAMP_LIMIT)
    }

    pub fn ticks(self) -> u64 {
        self.0
    }

    /// Decodes 5 bytes of PTS/DTS, checking the 4-bit prefix and the three
    /// marker bits.
    pub fn decode(b: &[u8], prefix: u8) -> Result<Self> {
        if b.len() < PES_TIMESTAMP_LEN {
            return Err(Error::PesHeader);
        }
        let (_, (p, hi, m0, mid, m1, lo, m2)) =
            timestamp_fields(&b[..PES_TIMESTAMP_LEN]).map_err(|_| Error::PesTimestamp)?;
        if p != prefix || m0 & m1 & m2 != 1 {
            return Err(Error::PesTimestamp);
        }
        Ok(PesTimestamp(hi << 30 | mid << 15 | lo))
    }

    /// Encodes into the first 5 bytes of `b` with the given 4-bit prefix.
    ///
    /// # Panics
    /// If `b` is shorter than 5 bytes.
    pub fn encode(self, prefix: u8, b: &mut [u8]) {
        assert!(b.len() >= PES_TIMESTAMP_LEN, "buffer too short for PES timestamp");
        let t = self.0;
        b[0] = (prefix & 0x0F) << 4 | ((t >> 29) as u8 & 0x0E) | 1;
        b[1] = (t >> 22) as u8;
        b[2] = ((t >> 14) as u8 & 0xFE) | 1;
        b[3] = (t >> 7) as u8;
        b[4] = ((t << 1) as u8 & 0xFE) | 1;
    }

    /// The same instant on the 27 MHz system clock.
    pub fn to_pcr(self) -> Pcr {
        Pcr::from_parts(self.0, 0)
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_nanos((self.0 * 100_000 + 4) / 9)
    }
}

impl fmt::Display for PesTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.as_duration();
        write!(f, "{}.{:06}", d.as_secs(), d.subsec_micros())
    }
}

/// True if PES packets with this stream id carry the flags and optional
/// header fields.
pub fn has_optional_header(sid: u8) -> bool {
    use self::stream_id::*;
    !matches!(
        sid,
        PROGRAM_STREAM_MAP
            | PRIVATE_STREAM_2
            | PADDING
            | ECM
            | EMM
            | DSMCC
            | H222_1_TYPE_E
            | PROGRAM_STREAM_DIRECTORY
    )
}

/// PES header borrowed from the payload of a unit-start packet.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PesHeader<'a>(&'a [u8]);

impl<'a> PesHeader<'a> {
    /// Checks the start code prefix and, for stream ids with an optional
    /// header, the '10' marker, the PTS_DTS_flags value and that
    /// PES_header_data_length covers the timestamps and fits in `payload`.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        if payload.len() < PES_PREFIX_LEN || payload[..3] != [0x00, 0x00, 0x01] {
            return Err(Error::PesHeader);
        }
        let h = PesHeader(payload);
        if !h.has_optional_header() {
            return Ok(h);
        }
        if payload.len() < PES_HEADER_MIN_LEN {
            return Err(Error::PesHeader);
        }
        let f = h.flags();
        let need = match (f.contains_pts(), f.contains_dts()) {
            (false, false) => 0,
            (true, false) => PES_TIMESTAMP_LEN,
            (true, true) => 2 * PES_TIMESTAMP_LEN,
            // PTS_DTS_flags '01' is forbidden
            (false, true) => return Err(Error::PesHeader),
        };
        let opt = payload[8] as usize;
        if !f.marker_ok() || opt < need || payload.len() < PES_HEADER_MIN_LEN + opt {
            return Err(Error::PesHeader);
        }
        Ok(h)
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.0
    }

    pub fn stream_id(&self) -> u8 {
        self.0[3]
    }

    /// PES_packet_length: bytes following this field, 0 if unbounded.
    pub fn packet_len(&self) -> u16 {
        u16::from_be_bytes([self.0[4], self.0[5]])
    }

    pub fn has_optional_header(&self) -> bool {
        has_optional_header(self.stream_id())
    }

    /// Flags of the optional header; all clear if there is none.
    pub fn flags(&self) -> PesFlags {
        if !self.has_optional_header() {
            return PesFlags(0);
        }
        PesFlags(u16::from_be_bytes([self.0[6], self.0[7]]))
    }

    /// Offset of the PES packet data in the payload.
    pub fn header_len(&self) -> usize {
        if !self.has_optional_header() {
            return PES_PREFIX_LEN;
        }
        PES_HEADER_MIN_LEN + self.0[8] as usize
    }

    pub fn pts(&self) -> Result<Option<PesTimestamp>> {
        let f = self.flags();
        if !f.contains_pts() {
            return Ok(None);
        }
        let prefix = if f.contains_dts() {
            PTS_PREFIX
        } else {
            PTS_ONLY_PREFIX
        };
        PesTimestamp::decode(&self.0[PES_HEADER_MIN_LEN..], prefix).map(Some)
    }

    pub fn dts(&self) -> Result<Option<PesTimestamp>> {
        if !self.flags().contains_dts() {
            return Ok(None);
        }
        let off = PES_HEADER_MIN_LEN + PES_TIMESTAMP_LEN;
        PesTimestamp::decode(&self.0[off..], DTS_PREFIX).map(Some)
    }
}

impl fmt::Debug for PesHeader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PesHeader")
            .field("stream_id", &format_args!("0x{:02X}", self.stream_id()))
            .field("packet_len", &self.packet_len())
            .field("flags", &self.flags())
            .finish()
    }
}
