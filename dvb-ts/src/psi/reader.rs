//! Section sources.

use std::io::Read;

use log::debug;

use crate::error::{Error, Result};
use crate::queue::SectionQueueReader;

use super::section::{declared_len, Section, SectionView, SectionViewMut, SECTION_BUF_MIN};

/// Reads one section at a time.
///
/// The buffer should hold [`SECTION_MAX_LEN`](super::SECTION_MAX_LEN)
/// bytes, or [`ISO_SECTION_MAX_LEN`](super::ISO_SECTION_MAX_LEN) for
/// standard tables. A smaller buffer (but not below 8 bytes) works when
/// the sections are known to fit. When an error with
/// [`Error::is_temporary`] is returned the next call may succeed.
pub trait SectionReader {
    fn read_section(&mut self, s: &mut Section) -> Result<()>;
}

impl<R: SectionReader + ?Sized> SectionReader for &mut R {
    fn read_section(&mut self, s: &mut Section) -> Result<()> {
        (**self).read_section(s)
    }
}

impl<R: SectionReader + ?Sized> SectionReader for Box<R> {
    fn read_section(&mut self, s: &mut Section) -> Result<()> {
        (**self).read_section(s)
    }
}

/// Reads sections placed back to back in a byte stream, as delivered by a
/// kernel section filter.
#[derive(Debug)]
pub struct SectionStreamReader<R> {
    inner: R,
    check_crc: bool,
}

impl<R: Read> SectionStreamReader<R> {
    pub fn new(inner: R, check_crc: bool) -> Self {
        Self { inner, check_crc }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> SectionReader for SectionStreamReader<R> {
    /// # Panics
    /// If the section buffer is shorter than 8 bytes.
    fn read_section(&mut self, s: &mut Section) -> Result<()> {
        let cap = s.capacity();
        assert!(
            cap >= SECTION_BUF_MIN,
            "section buffer should be at least {} bytes",
            SECTION_BUF_MIN
        );
        let buf = s.buf_mut();
        self.inner
            .read_exact(&mut buf[..3])
            .map_err(Error::from_read)?;
        let l = declared_len(buf).ok_or(Error::SectionLength)?;
        if l > cap {
            debug!("[SectionStreamReader] Section of {} bytes, buffer {}", l, cap);
            return Err(Error::SectionSpace { need: l, have: cap });
        }
        self.inner
            .read_exact(&mut buf[3..l])
            .map_err(Error::from_read)?;
        if self.check_crc && !s.check_crc() {
            return Err(Error::SectionCrc);
        }
        Ok(())
    }
}

impl SectionReader for SectionQueueReader {
    /// Swaps `s` for the next queued section.
    fn read_section(&mut self, s: &mut Section) -> Result<()> {
        self.exchange(s)
    }
}
