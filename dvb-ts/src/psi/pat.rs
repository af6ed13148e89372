//! PAT (Program Association Table).
//!
//! The PAT is transmitted on PID 0x0000 and maps program numbers to the
//! PIDs of their PMTs. Program number 0 carries the NIT PID instead.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::table_id;

use super::reader::SectionReader;
use super::section::{Section, ISO_SECTION_MAX_LEN};
use super::table::{Table, TableConfig};

const ENTRY_LEN: usize = 4;

const PAT_CONFIG: TableConfig = TableConfig {
    table_id: table_id::PAT,
    generic: true,
    private: false,
    max_len: ISO_SECTION_MAX_LEN,
    head: Vec::new(),
};

/// A single PAT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatEntry {
    /// Program number (0 = NIT).
    pub program_number: u16,
    /// PID of the PMT for this program (or NIT PID if program_number = 0).
    pub pid: u16,
}

/// Program Association Table backed by its sections.
#[derive(Debug, Default)]
pub struct Pat {
    table: Table,
}

impl Pat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn reset(&mut self) {
        self.table.reset();
    }

    pub fn sections(&self) -> &[Section] {
        self.table.sections()
    }

    /// Reads sections from `r` until a complete PAT with the given
    /// current_next_indicator is collected.
    ///
    /// Returns [`Error::TableData`] if a section's data part is not a whole
    /// number of entries.
    pub fn update<R: SectionReader + ?Sized>(&mut self, r: &mut R, current: bool) -> Result<()> {
        self.table
            .update(r, table_id::PAT, false, current, ISO_SECTION_MAX_LEN)?;
        if self.table.data().any(|d| d.len() % ENTRY_LEN != 0) {
            self.table.reset();
            return Err(Error::TableData("PAT"));
        }
        Ok(())
    }

    /// # Panics
    /// If the PAT is empty. The same holds for the other header getters.
    pub fn transport_stream_id(&self) -> u16 {
        self.table.table_id_ext()
    }

    pub fn version(&self) -> u8 {
        self.table.version()
    }

    pub fn current(&self) -> bool {
        self.table.current()
    }

    /// All entries in section order, the NIT entry included.
    pub fn entries(&self) -> impl Iterator<Item = PatEntry> + '_ {
        self.table
            .data()
            .flat_map(|d| d.chunks_exact(ENTRY_LEN))
            .map(|c| PatEntry {
                program_number: u16::from_be_bytes([c[0], c[1]]),
                pid: u16::from_be_bytes([c[2], c[3]]) & 0x1FFF,
            })
    }

    /// Program number to PMT PID, without the NIT entry.
    pub fn program_map(&self) -> BTreeMap<u16, u16> {
        self.entries()
            .filter(|e| e.program_number != 0)
            .map(|e| (e.program_number, e.pid))
            .collect()
    }

    pub fn pmt_pid(&self, program_number: u16) -> Option<u16> {
        if program_number == 0 {
            return None;
        }
        self.entries()
            .find(|e| e.program_number == program_number)
            .map(|e| e.pid)
    }

    pub fn nit_pid(&self) -> Option<u16> {
        self.entries()
            .find(|e| e.program_number == 0)
            .map(|e| e.pid)
    }

    /// Appends an entry, starting a new section when the last one is full.
    ///
    /// # Panics
    /// If `pid > 0x1FFF`.
    pub fn append_program(&mut self, program_number: u16, pid: u16) {
        assert!(pid <= 0x1FFF, "PID {} out of range", pid);
        let b = self.table.alloc(&PAT_CONFIG, ENTRY_LEN);
        b[0..2].copy_from_slice(&program_number.to_be_bytes());
        b[2..4].copy_from_slice(&(0xE000 | pid).to_be_bytes());
    }

    /// Finishes a PAT built with [`Pat::append_program`].
    ///
    /// # Panics
    /// If no entry was appended or `version > 31`.
    pub fn close(&mut self, transport_stream_id: u16, version: u8, current: bool) {
        self.table.close(transport_stream_id, version, current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psi::{SectionDecoder, SectionEncoder, SectionView, SectionViewMut};
    use crate::queue::section_queue;
    use crate::ts::{PacketStream, PacketStreamWriter};

    fn pat_section(entries: &[(u16, u16)], version: u8) -> Section {
        let mut s = Section::with_header(ISO_SECTION_MAX_LEN, table_id::PAT, true, false);
        s.set_table_id_ext(0x7FE0);
        s.set_version(version);
        for &(n, pid) in entries {
            let b = s.alloc(4);
            b[0..2].copy_from_slice(&n.to_be_bytes());
            b[2..4].copy_from_slice(&(0xE000 | pid).to_be_bytes());
        }
        s.make_crc();
        s
    }

    #[test]
    fn test_pat_from_packets() {
        let s = pat_section(&[(1, 100), (2, 200)], 3);
        let mut e = SectionEncoder::from_writer(PacketStreamWriter::new(Vec::new()), 0);
        e.write_section(&s).unwrap();
        e.flush().unwrap();
        let ts = e.into_inner().0.into_inner();

        let mut d = SectionDecoder::from_reader(PacketStream::new(&ts[..]), true);
        let mut pat = Pat::new();
        pat.update(&mut d, true).unwrap();

        let expected: BTreeMap<u16, u16> = [(1, 100), (2, 200)].into_iter().collect();
        assert_eq!(pat.program_map(), expected);
        assert_eq!(pat.version(), 3);
        assert!(pat.current());
        assert_eq!(pat.transport_stream_id(), 0x7FE0);
        assert_eq!(pat.pmt_pid(2), Some(200));
        assert_eq!(pat.nit_pid(), None);
    }

    #[test]
    fn test_nit_entry() {
        let (mut w, mut r) = section_queue(2, ISO_SECTION_MAX_LEN);
        let mut s = pat_section(&[(0, 0x10), (0x400, 0x1F0)], 0);
        w.exchange(&mut s).unwrap();

        let mut pat = Pat::new();
        pat.update(&mut r, true).unwrap();
        assert_eq!(pat.nit_pid(), Some(0x10));
        assert_eq!(pat.pmt_pid(0), None);
        assert_eq!(pat.program_map().len(), 1);
        assert_eq!(pat.entries().count(), 2);
    }

    #[test]
    fn test_odd_data_length() {
        let (mut w, mut r) = section_queue(2, ISO_SECTION_MAX_LEN);
        let mut s = pat_section(&[(1, 100)], 0);
        s.alloc(1)[0] = 0xFF;
        s.make_crc();
        w.exchange(&mut s).unwrap();

        let mut pat = Pat::new();
        assert!(matches!(
            pat.update(&mut r, true),
            Err(Error::TableData("PAT"))
        ));
        assert!(pat.is_empty());
    }

    #[test]
    fn test_build_multi_section() {
        let mut pat = Pat::new();
        for n in 1..=300u16 {
            pat.append_program(n, 0x100 + n);
        }
        pat.close(0x10, 7, true);
        // (1024 - 12) / 4 entries per section
        assert_eq!(pat.sections().len(), 2);
        assert!(pat.sections().iter().all(|s| s.check_crc()));

        let (mut w, mut r) = section_queue(4, ISO_SECTION_MAX_LEN);
        for s in pat.sections().iter().rev() {
            let mut s = s.clone();
            w.exchange(&mut s).unwrap();
        }
        let mut decoded = Pat::new();
        decoded.update(&mut r, true).unwrap();
        let map = decoded.program_map();
        assert_eq!(map.len(), 300);
        assert_eq!(map[&300], 0x100 + 300);
        assert_eq!(decoded.version(), 7);
    }
}
