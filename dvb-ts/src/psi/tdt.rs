//! TDT and TOT (Time and Date / Time Offset Tables).
//!
//! Both are single sections with short syntax on PID 0x0014. The TDT holds
//! only the current UTC time and has no CRC; the TOT adds a descriptor loop
//! (local time offsets) and a CRC.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::table_id;
use crate::time::{decode_mjd_utc, encode_mjd_utc, MJD_UTC_LEN};

use super::descriptor::{DescriptorList, DescriptorListBuf};
use super::section::{
    Section, SectionView, SectionViewMut, CRC_LEN, SHORT_HEADER_LEN, SECTION_MAX_LEN,
};
use super::table::{loop_at, put_loop_len};

/// Length of a TDT section.
pub const TDT_LEN: usize = SHORT_HEADER_LEN + MJD_UTC_LEN;

/// Shortest TOT section: header, time, loop length and CRC.
const TOT_MIN_LEN: usize = SHORT_HEADER_LEN + MJD_UTC_LEN + 2 + CRC_LEN;

/// Decodes the UTC time of a TDT section.
pub fn decode_tdt<S: SectionView + ?Sized>(s: &S) -> Result<DateTime<Utc>> {
    if s.table_id() != table_id::TDT || s.generic_syntax() || s.len() != Some(TDT_LEN) {
        return Err(Error::TimeSyntax("TDT"));
    }
    let b = s.buf();
    if b.len() < TDT_LEN {
        return Err(Error::TimeSyntax("TDT"));
    }
    decode_mjd_utc(&b[SHORT_HEADER_LEN..TDT_LEN])
}

/// Builds a TDT section carrying `t`.
pub fn encode_tdt(t: &DateTime<Utc>) -> Result<Section> {
    let mut s = Section::new(TDT_LEN);
    let b = s.buf_mut();
    b[0] = table_id::TDT;
    // reserved_future_use and reserved bits
    b[1] = 0x70;
    encode_mjd_utc(t, &mut b[SHORT_HEADER_LEN..])?;
    s.set_len_field(TDT_LEN);
    Ok(s)
}

/// TOT borrowed from its section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tot<'a> {
    utc: DateTime<Utc>,
    descriptors: DescriptorList<'a>,
}

impl<'a> Tot<'a> {
    /// Parses a TOT section, checking its CRC if `check_crc` is set.
    ///
    /// A descriptor loop that does not exactly fill the section, or a
    /// truncated descriptor inside it, gives [`Error::TimeSyntax`].
    pub fn parse<S: SectionView + ?Sized>(s: &'a S, check_crc: bool) -> Result<Tot<'a>> {
        if check_crc && !s.check_crc() {
            return Err(Error::SectionCrc);
        }
        if s.table_id() != table_id::TOT || s.generic_syntax() {
            return Err(Error::TimeSyntax("TOT"));
        }
        let data = match (s.len(), s.try_data()) {
            (Some(l), Some(d)) if l >= TOT_MIN_LEN => d,
            _ => return Err(Error::TimeSyntax("TOT")),
        };
        let utc = decode_mjd_utc(&data[..MJD_UTC_LEN])?;
        let rest = &data[MJD_UTC_LEN..];
        let descriptors = match loop_at(rest, 0) {
            Some(l) if l.len() + 2 == rest.len() => DescriptorList::new(l),
            _ => return Err(Error::TimeSyntax("TOT")),
        };
        let parsed: usize = descriptors.into_iter().map(|d| d.bytes().len()).sum();
        if parsed != descriptors.bytes().len() {
            return Err(Error::TimeSyntax("TOT"));
        }
        Ok(Tot { utc, descriptors })
    }

    pub fn utc(&self) -> DateTime<Utc> {
        self.utc
    }

    /// Descriptor loop, usually local_time_offset descriptors.
    pub fn descriptors(&self) -> DescriptorList<'a> {
        self.descriptors
    }
}

/// Builds a TOT section carrying `t` and `descriptors`.
///
/// # Panics
/// If the descriptors don't fit in one section.
pub fn encode_tot(t: &DateTime<Utc>, descriptors: &DescriptorListBuf) -> Result<Section> {
    let mut s = Section::with_header(SECTION_MAX_LEN, table_id::TOT, false, true);
    encode_mjd_utc(t, s.alloc(MJD_UTC_LEN))?;
    put_loop_len(s.alloc(2), descriptors.len());
    s.alloc(descriptors.len()).copy_from_slice(descriptors.bytes());
    s.make_crc();
    Ok(Section::from_bytes(s.bytes()))
}
