//! MJD + BCD date-time codec (ETSI EN 300 468 annex C).
//!
//! UTC time is carried in 5 bytes: a 16-bit Modified Julian Date followed
//! by hour, minute and second as 2-digit BCD.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use nom::number::complete::{be_u16, u8 as byte};
use nom::sequence::tuple;
use nom::IResult;

use crate::error::{Error, Result};

/// Number of bytes of an encoded UTC time.
pub const MJD_UTC_LEN: usize = 5;

fn mjd_epoch() -> NaiveDate {
    // MJD 0
    NaiveDate::from_ymd_opt(1858, 11, 17).expect("valid constant date")
}

/// Decodes one BCD byte (two decimal digits).
pub fn bcd_to_bin(bcd: u8) -> Result<u8> {
    let hi = bcd >> 4;
    let lo = bcd & 0x0F;
    if hi > 9 || lo > 9 {
        return Err(Error::BadBcd(bcd));
    }
    Ok(hi * 10 + lo)
}

/// Encodes a value in `0..=99` as BCD.
///
/// # Panics
/// If `v > 99`.
pub fn bin_to_bcd(v: u8) -> u8 {
    assert!(v <= 99, "value {} does not fit in two BCD digits", v);
    (v / 10) << 4 | (v % 10)
}

fn mjd_utc_fields(input: &[u8]) -> IResult<&[u8], (u16, u8, u8, u8)> {
    tuple((be_u16, byte, byte, byte))(input)
}

/// Decodes 5 bytes of MJD + BCD into a UTC time.
pub fn decode_mjd_utc(b: &[u8]) -> Result<DateTime<Utc>> {
    let (_, (mjd, h, m, s)) = mjd_utc_fields(b).map_err(|_| Error::BadDate)?;
    let time = NaiveTime::from_hms_opt(
        bcd_to_bin(h)? as u32,
        bcd_to_bin(m)? as u32,
        bcd_to_bin(s)? as u32,
    )
    .ok_or(Error::BadDate)?;
    let date = mjd_epoch() + Duration::days(mjd as i64);
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

/// Encodes `t` (truncated to whole seconds) into the first 5 bytes of `b`.
///
/// Returns [`Error::BadDate`] if the date is outside the 16-bit MJD range.
///
/// # Panics
/// If `b` is shorter than 5 bytes.
pub fn encode_mjd_utc(t: &DateTime<Utc>, b: &mut [u8]) -> Result<()> {
    assert!(b.len() >= MJD_UTC_LEN, "buffer too short for MJD UTC time");
    let days = t.date_naive().signed_duration_since(mjd_epoch()).num_days();
    if !(0..=u16::MAX as i64).contains(&days) {
        return Err(Error::BadDate);
    }
    b[0..2].copy_from_slice(&(days as u16).to_be_bytes());
    b[2] = bin_to_bcd(t.hour() as u8);
    b[3] = bin_to_bcd(t.minute() as u8);
    b[4] = bin_to_bcd(t.second().min(59) as u8);
    Ok(())
}
