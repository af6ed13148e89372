//! PMT (Program Map Table).
//!
//! A PMT always fits in one section. It names the PCR PID of a program,
//! its program descriptors and the elementary streams it is made of.

use crate::error::{Error, Result};
use crate::table_id;

use super::descriptor::DescriptorList;
use super::reader::SectionReader;
use super::section::{Section, SectionView, ISO_SECTION_MAX_LEN};

/// Program Map Table held in one section buffer.
#[derive(Debug)]
pub struct Pmt {
    section: Section,
    valid: bool,
}

impl Default for Pmt {
    fn default() -> Self {
        Self::new()
    }
}

fn check(s: &Section) -> Result<()> {
    if s.table_id() != table_id::PMT
        || !s.generic_syntax()
        || s.private_syntax()
        || s.number() != 0
        || s.last_number() != 0
    {
        return Err(Error::TableSyntax);
    }
    match s.try_data() {
        Some(d) if d.len() >= 4 && 4 + prog_info_len(d) <= d.len() => Ok(()),
        _ => Err(Error::TableData("PMT")),
    }
}

fn prog_info_len(data: &[u8]) -> usize {
    (u16::from_be_bytes([data[2], data[3]]) & 0x0FFF) as usize
}

impl Pmt {
    pub fn new() -> Self {
        Self {
            section: Section::new(ISO_SECTION_MAX_LEN),
            valid: false,
        }
    }

    /// Wraps an already read section.
    pub fn from_section(section: Section) -> Result<Self> {
        check(&section)?;
        Ok(Self {
            section,
            valid: true,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Reads the next section from `r` and checks that it is a PMT.
    ///
    /// On error the PMT is left invalid; sections of other tables give
    /// [`Error::TableSyntax`].
    pub fn update<R: SectionReader + ?Sized>(&mut self, r: &mut R) -> Result<()> {
        self.valid = false;
        r.read_section(&mut self.section)?;
        check(&self.section)?;
        self.valid = true;
        Ok(())
    }

    fn s(&self) -> &Section {
        assert!(self.valid, "PMT doesn't contain valid data");
        &self.section
    }

    /// # Panics
    /// If the PMT is not valid. The same holds for every other getter.
    pub fn section(&self) -> &Section {
        self.s()
    }

    pub fn program_number(&self) -> u16 {
        self.s().table_id_ext()
    }

    pub fn version(&self) -> u8 {
        self.s().version()
    }

    pub fn current(&self) -> bool {
        self.s().current()
    }

    pub fn pcr_pid(&self) -> u16 {
        let d = self.s().data();
        u16::from_be_bytes([d[0], d[1]]) & 0x1FFF
    }

    pub fn program_descriptors(&self) -> DescriptorList<'_> {
        let d = self.s().data();
        DescriptorList::new(&d[4..4 + prog_info_len(d)])
    }

    pub fn es_info(&self) -> EsInfoList<'_> {
        let d = self.s().data();
        EsInfoList(&d[4 + prog_info_len(d)..])
    }
}

/// Elementary stream entry of a PMT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EsInfo<'a>(&'a [u8]);

impl<'a> EsInfo<'a> {
    pub fn stream_type(&self) -> u8 {
        self.0[0]
    }

    pub fn pid(&self) -> u16 {
        u16::from_be_bytes([self.0[1], self.0[2]]) & 0x1FFF
    }

    pub fn descriptors(&self) -> DescriptorList<'a> {
        DescriptorList::new(&self.0[5..])
    }
}

/// Elementary stream loop of a PMT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EsInfoList<'a>(&'a [u8]);

impl<'a> EsInfoList<'a> {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First entry and the remaining list. A truncated entry gives `None`
    /// and a non-empty list.
    pub fn pop(self) -> (Option<EsInfo<'a>>, EsInfoList<'a>) {
        if self.0.len() < 5 {
            return (None, self);
        }
        let l = (u16::from_be_bytes([self.0[3], self.0[4]]) & 0x0FFF) as usize + 5;
        if self.0.len() < l {
            return (None, self);
        }
        (Some(EsInfo(&self.0[..l])), EsInfoList(&self.0[l..]))
    }
}

impl<'a> Iterator for EsInfoList<'a> {
    type Item = EsInfo<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (i, rest) = self.pop();
        *self = if i.is_some() { rest } else { EsInfoList::default() };
        i
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psi::SectionViewMut;
    use crate::queue::section_queue;
    use crate::{descriptor_tag, stream_type};

    fn pmt_section(es: &[u8]) -> Section {
        let mut s = Section::with_header(ISO_SECTION_MAX_LEN, table_id::PMT, true, false);
        s.set_table_id_ext(0x0400);
        s.set_version(2);
        // PCR PID 0x1FF, program info with one descriptor
        s.alloc(4).copy_from_slice(&[0xE1, 0xFF, 0xF0, 3]);
        s.alloc(3).copy_from_slice(&[descriptor_tag::STREAM_IDENTIFIER, 1, 0x10]);
        s.alloc(es.len()).copy_from_slice(es);
        s.make_crc();
        s
    }

    const ES: [u8; 13] = [
        stream_type::MPEG2_VIDEO, 0xE1, 0x11, 0xF0, 3, 0x52, 1, 0x00,
        stream_type::AAC, 0xE1, 0x12, 0xF0, 0,
    ];

    #[test]
    fn test_pmt_view() {
        let pmt = Pmt::from_section(pmt_section(&ES)).unwrap();
        assert_eq!(pmt.program_number(), 0x0400);
        assert_eq!(pmt.version(), 2);
        assert_eq!(pmt.pcr_pid(), 0x1FF);
        let d = pmt.program_descriptors().find(descriptor_tag::STREAM_IDENTIFIER);
        assert_eq!(d.unwrap().data(), &[0x10]);

        let es: Vec<(u8, u16, usize)> = pmt
            .es_info()
            .map(|i| (i.stream_type(), i.pid(), i.descriptors().bytes().len()))
            .collect();
        assert_eq!(
            es,
            vec![(stream_type::MPEG2_VIDEO, 0x111, 3), (stream_type::AAC, 0x112, 0)]
        );
    }

    #[test]
    fn test_truncated_es_entry() {
        let pmt = Pmt::from_section(pmt_section(&ES[..11])).unwrap();
        let (first, rest) = pmt.es_info().pop();
        assert_eq!(first.unwrap().pid(), 0x111);
        let (second, rest) = rest.pop();
        assert!(second.is_none());
        assert!(!rest.is_empty());
        assert_eq!(pmt.es_info().count(), 1);
    }

    #[test]
    fn test_update_rejects_other_tables() {
        let (mut w, mut r) = section_queue(4, ISO_SECTION_MAX_LEN);
        let mut other = pmt_section(&ES);
        other.set_table_id(table_id::PAT);
        other.make_crc();
        w.exchange(&mut other).unwrap();
        let mut good = pmt_section(&ES);
        w.exchange(&mut good).unwrap();

        let mut pmt = Pmt::new();
        assert!(matches!(pmt.update(&mut r), Err(Error::TableSyntax)));
        assert!(!pmt.is_valid());
        pmt.update(&mut r).unwrap();
        assert_eq!(pmt.es_info().count(), 2);
    }

    #[test]
    fn test_program_info_overrun() {
        let mut s = Section::with_header(64, table_id::PMT, true, false);
        s.alloc(4).copy_from_slice(&[0xE1, 0xFF, 0xF0, 9]);
        s.make_crc();
        assert!(matches!(Pmt::from_section(s), Err(Error::TableData("PMT"))));
    }

    #[test]
    #[should_panic]
    fn test_invalid_getter_panics() {
        Pmt::new().pcr_pid();
    }
}
