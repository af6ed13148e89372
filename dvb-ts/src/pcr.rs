//! PCR/OPCR timestamp codec.
//!
//! On the wire a PCR occupies 6 bytes: a 33-bit base (90 kHz), 6 reserved
//! bits and a 9-bit extension (27 MHz, always < 300).

use std::fmt;
use std::time::Duration;

use nom::bits::{bits, complete::take};
use nom::sequence::tuple;
use nom::IResult;

use crate::error::{Error, Result};

/// Number of bytes of an encoded PCR or OPCR.
pub const PCR_LEN: usize = 6;

/// PCR counts modulo this value.
pub const PCR_MODULO: u64 = (1 << 33) * 300;

/// PCR clock frequency in Hz.
pub const PCR_FREQ: u64 = 27_000_000;

const BASE_LIMIT: u64 = 1 << 33;
const RESERVED_BITS: u8 = 0x7E;

/// Program Clock Reference: number of ticks of the 27 MHz system clock,
/// always in `0..PCR_MODULO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pcr(u64);

fn pcr_fields(input: &[u8]) -> IResult<&[u8], (u64, u8, u16)> {
    bits::<_, _, nom::error::Error<(&[u8], usize)>, _, _>(tuple((
        take(33usize),
        take(6usize),
        take(9usize),
    )))(input)
}

impl Pcr {
    /// Builds a PCR from its base and extension.
    ///
    /// # Panics
    /// If `base >= 2^33` or `ext >= 300`.
    pub fn from_parts(base: u64, ext: u16) -> Self {
        assert!(base < BASE_LIMIT, "PCR base out of range: {}", base);
        assert!(ext < 300, "PCR extension out of range: {}", ext);
        Pcr(base * 300 + ext as u64)
    }

    /// Builds a PCR from a tick count, wrapping it into range.
    pub fn from_ticks(ticks: u64) -> Self {
        Pcr(ticks % PCR_MODULO)
    }

    pub fn ticks(self) -> u64 {
        self.0
    }

    /// 90 kHz part.
    pub fn base(self) -> u64 {
        self.0 / 300
    }

    /// 27 MHz remainder.
    pub fn ext(self) -> u16 {
        (self.0 % 300) as u16
    }

    /// Decodes 6 bytes of PCR/OPCR. Reserved bits are ignored.
    pub fn decode(b: &[u8]) -> Result<Self> {
        if b.len() < PCR_LEN {
            return Err(Error::AdaptationFieldTooShort);
        }
        let (_, (base, _reserved, ext)) =
            pcr_fields(&b[..PCR_LEN]).map_err(|_| Error::AdaptationFieldTooShort)?;
        if ext >= 300 {
            return Err(Error::BadPcr(ext));
        }
        Ok(Pcr(base * 300 + ext as u64))
    }

    /// Encodes into the first 6 bytes of `b`, setting reserved bits to 1.
    ///
    /// # Panics
    /// If `b` is shorter than 6 bytes.
    pub fn encode(self, b: &mut [u8]) {
        assert!(b.len() >= PCR_LEN, "buffer too short for PCR");
        let base = self.base();
        let ext = self.ext();
        b[0] = (base >> 25) as u8;
        b[1] = (base >> 17) as u8;
        b[2] = (base >> 9) as u8;
        b[3] = (base >> 1) as u8;
        b[4] = ((base << 7) as u8 & 0x80) | RESERVED_BITS | (ext >> 8) as u8;
        b[5] = ext as u8;
    }

    /// Time represented by the tick count.
    pub fn as_duration(self) -> Duration {
        Duration::from_nanos((self.0 * 1000 + 13) / 27)
    }

    /// Adds `d`, wrapping modulo [`PCR_MODULO`].
    pub fn add(self, d: Duration) -> Self {
        let ticks = (d.as_nanos() * 27 + 500) / 1000;
        Pcr(((self.0 as u128 + ticks) % PCR_MODULO as u128) as u64)
    }

    /// Subtracts `d`, wrapping modulo [`PCR_MODULO`].
    pub fn sub(self, d: Duration) -> Self {
        let ticks = ((d.as_nanos() * 27 + 500) / 1000 % PCR_MODULO as u128) as u64;
        Pcr((self.0 + PCR_MODULO - ticks) % PCR_MODULO)
    }

    /// Ticks elapsed from `earlier` to `self`, accounting for one wrap.
    pub fn since(self, earlier: Pcr) -> Duration {
        let ticks = (self.0 + PCR_MODULO - earlier.0) % PCR_MODULO;
        Pcr(ticks).as_duration()
    }
}

impl fmt::Display for Pcr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:03}", self.base(), self.ext())
    }
}
