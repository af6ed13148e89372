//! Multi-section tables.
//!
//! A table is a set of up to 256 sections with the same table_id,
//! table_id_extension and version_number, each carrying a slice of one
//! logical record list. [`TableTracker`] decides when such a set is
//! complete; [`Table`] owns the section buffers and reuses them between
//! updates.

use log::debug;

use crate::error::{Error, Result};

use super::descriptor::{Descriptor, DescriptorList};
use super::reader::SectionReader;
use super::section::{Section, SectionView, SectionViewMut};

/// Outcome of [`TableTracker::track`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    /// Another table, the other current_next_indicator value, or a section
    /// already seen in this generation.
    Skipped,
    /// New section accepted, more are missing.
    Added,
    /// New section accepted and every section of the table is now present.
    Complete,
}

/// Tracks which sections of one table have been seen.
///
/// A tracker follows one table_id and one current_next_indicator value;
/// sections with the other indicator value are skipped before any state is
/// touched. A change of version_number, table_id_extension or
/// last_section_number starts a new generation: everything collected so
/// far is forgotten, since the provider may change content without
/// bumping the version and the old set would never complete.
#[derive(Debug, Clone)]
pub struct TableTracker {
    table_id: u8,
    private: bool,
    current: bool,
    seen: [u64; 4],
    count: usize,
    version: u8,
    ext: u16,
    last: u8,
}

impl TableTracker {
    pub fn new(table_id: u8, private: bool, current: bool) -> Self {
        Self {
            table_id,
            private,
            current,
            seen: [0; 4],
            count: 0,
            version: 0,
            ext: 0,
            last: 0,
        }
    }

    /// Forgets all sections seen.
    pub fn reset(&mut self) {
        self.seen = [0; 4];
        self.count = 0;
    }

    /// Number of sections accepted in the current generation.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn table_id_ext(&self) -> u16 {
        self.ext
    }

    fn is_seen(&self, n: u8) -> bool {
        self.seen[n as usize / 64] & (1 << (n % 64)) != 0
    }

    fn mark(&mut self, n: u8) {
        self.seen[n as usize / 64] |= 1 << (n % 64);
        self.count += 1;
    }

    /// Takes one section into account.
    ///
    /// Returns [`Error::TableSyntax`] for a section of the tracked table
    /// without generic syntax or with the wrong private indicator, and
    /// [`Error::TableSectionNumber`] if section_number exceeds
    /// last_section_number.
    pub fn track<S: SectionView + ?Sized>(&mut self, s: &S) -> Result<Track> {
        if s.table_id() != self.table_id {
            return Ok(Track::Skipped);
        }
        if s.current() != self.current {
            return Ok(Track::Skipped);
        }
        if !s.generic_syntax() || s.private_syntax() != self.private {
            return Err(Error::TableSyntax);
        }
        if s.try_data().is_none() {
            return Err(Error::TableSyntax);
        }
        let (n, last) = (s.number(), s.last_number());
        if n > last {
            return Err(Error::TableSectionNumber { number: n, last });
        }

        let (version, ext) = (s.version(), s.table_id_ext());
        if self.count > 0 && (version != self.version || ext != self.ext || last != self.last) {
            debug!(
                "[TableTracker] table 0x{:02X}: new generation (version {} -> {}, ext {} -> {}, last {} -> {})",
                self.table_id, self.version, version, self.ext, ext, self.last, last
            );
            self.reset();
        }
        if self.count == 0 {
            self.version = version;
            self.ext = ext;
            self.last = last;
        }
        if self.is_seen(n) {
            return Ok(Track::Skipped);
        }
        self.mark(n);
        if self.count == last as usize + 1 {
            Ok(Track::Complete)
        } else {
            Ok(Track::Added)
        }
    }
}

/// Shape of the sections built with [`Table::alloc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub table_id: u8,
    pub generic: bool,
    pub private: bool,
    /// Largest section length, CRC included.
    pub max_len: usize,
    /// Bytes copied to the start of the data part of every new section.
    pub head: Vec<u8>,
}

/// Sections of one table.
#[derive(Debug, Default)]
pub struct Table {
    sections: Vec<Section>,
    used: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the content; buffers are kept for reuse.
    pub fn reset(&mut self) {
        self.used = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Number of sections.
    pub fn len(&self) -> usize {
        self.used
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections[..self.used]
    }

    fn first(&self) -> &Section {
        self.sections()
            .first()
            .expect("table doesn't contain valid data")
    }

    /// # Panics
    /// If the table is empty. The same holds for the other header getters.
    pub fn table_id(&self) -> u8 {
        self.first().table_id()
    }

    pub fn version(&self) -> u8 {
        self.first().version()
    }

    pub fn current(&self) -> bool {
        self.first().current()
    }

    pub fn table_id_ext(&self) -> u16 {
        self.first().table_id_ext()
    }

    /// Data parts of all sections in section_number order.
    pub fn data(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.sections().iter().map(|s| s.data())
    }

    /// Reads sections from `r` until a complete, version-coherent table is
    /// collected. Sections are ordered by section_number on return.
    ///
    /// Any error from `r` or the tracker is returned as is and leaves the
    /// table empty; call again to restart.
    pub fn update<R: SectionReader + ?Sized>(
        &mut self,
        r: &mut R,
        table_id: u8,
        private: bool,
        current: bool,
        max_len: usize,
    ) -> Result<()> {
        self.reset();
        let mut tracker = TableTracker::new(table_id, private, current);
        let mut slot = 0;
        loop {
            if slot == self.sections.len() {
                self.sections.push(Section::new(max_len));
            }
            r.read_section(&mut self.sections[slot])?;
            let res = tracker.track(&self.sections[slot])?;
            if res == Track::Skipped {
                continue;
            }
            // after a generation reset the accepted section moves to the front
            let pos = tracker.count() - 1;
            if pos != slot {
                self.sections.swap(pos, slot);
            }
            slot = pos + 1;
            if res == Track::Complete {
                break;
            }
        }
        self.used = slot;
        self.sections[..self.used].sort_by_key(|s| s.number());
        Ok(())
    }

    /// Appends `n` bytes to the data part of the last section and returns
    /// them for writing. A new section is started when the last one has no
    /// room left; its data part begins with `cfg.head`.
    ///
    /// # Panics
    /// If `n` bytes can never fit in one section of `cfg.max_len` bytes, or
    /// the table would exceed 256 sections.
    pub fn alloc(&mut self, cfg: &TableConfig, n: usize) -> &mut [u8] {
        let need_new = match self.sections[..self.used].last() {
            Some(s) => s.free() < n,
            None => true,
        };
        if need_new {
            assert!(self.used < 256, "table can't have more than 256 sections");
            let mut s = Section::with_header(cfg.max_len, cfg.table_id, cfg.generic, cfg.private);
            s.alloc(cfg.head.len()).copy_from_slice(&cfg.head);
            assert!(
                s.free() >= n,
                "{} bytes never fit in a section of {} bytes",
                n,
                cfg.max_len
            );
            if self.used < self.sections.len() {
                self.sections[self.used] = s;
            } else {
                self.sections.push(s);
            }
            self.used += 1;
        }
        self.sections[self.used - 1].alloc(n)
    }

    pub(crate) fn sections_mut(&mut self) -> &mut [Section] {
        &mut self.sections[..self.used]
    }

    /// Mutable access to the section being filled by [`Table::alloc`].
    pub fn last_mut(&mut self) -> Option<&mut Section> {
        self.sections[..self.used].last_mut()
    }

    /// Numbers the sections and sets the common header fields and CRCs.
    ///
    /// # Panics
    /// If the table is empty or `version > 31`.
    pub fn close(&mut self, table_id_ext: u16, version: u8, current: bool) {
        assert!(self.used > 0, "table doesn't contain valid data");
        let last = (self.used - 1) as u8;
        for (i, s) in self.sections[..self.used].iter_mut().enumerate() {
            s.set_table_id_ext(table_id_ext);
            s.set_version(version);
            s.set_current(current);
            s.set_number(i as u8);
            s.set_last_number(last);
            s.make_crc();
        }
    }

    /// Descriptor loops spread over sections, each starting with a 12-bit
    /// length at `offset` in the data part.
    pub fn descriptors(&self, offset: usize) -> TableDescriptors<'_> {
        TableDescriptors {
            sections: self.sections(),
            list: DescriptorList::default(),
            offset,
        }
    }
}

/// Cursor over the descriptor loop of every section of a table, such as
/// the network descriptors of a NIT.
#[derive(Debug, Clone, Copy)]
pub struct TableDescriptors<'a> {
    sections: &'a [Section],
    list: DescriptorList<'a>,
    offset: usize,
}

impl<'a> TableDescriptors<'a> {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.list.is_empty()
    }

    /// Next descriptor and the remaining cursor. A loop length that
    /// overruns its section ends the cursor.
    pub fn pop(mut self) -> (Option<Descriptor<'a>>, TableDescriptors<'a>) {
        while self.list.is_empty() {
            let (s, rest) = match self.sections.split_first() {
                Some(v) => v,
                None => return (None, self),
            };
            self.sections = rest;
            match loop_at(s.data(), self.offset) {
                Some(l) => self.list = DescriptorList::new(l),
                None => {
                    self.sections = &[];
                    return (None, self);
                }
            }
        }
        let (d, rest) = self.list.pop();
        self.list = rest;
        if d.is_none() {
            self.sections = &[];
        }
        (d, self)
    }
}

impl<'a> Iterator for TableDescriptors<'a> {
    type Item = Descriptor<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (d, rest) = self.pop();
        *self = rest;
        d
    }
}

/// Loop of `data` whose 12-bit length is at `offset`, if it fits.
pub(crate) fn loop_at(data: &[u8], offset: usize) -> Option<&[u8]> {
    let lb = data.get(offset..offset + 2)?;
    let l = (u16::from_be_bytes([lb[0], lb[1]]) & 0x0FFF) as usize;
    data.get(offset + 2..offset + 2 + l)
}

/// Writes a 12-bit loop length with the 4 reserved bits set.
pub(crate) fn put_loop_len(b: &mut [u8], l: usize) {
    assert!(l <= 0x0FFF, "loop length {} does not fit in 12 bits", l);
    b[0] = 0xF0 | (l >> 8) as u8;
    b[1] = l as u8;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::section_queue;

    fn section(version: u8, ext: u16, number: u8, last: u8, current: bool) -> Section {
        let mut s = Section::with_header(64, 0x42, true, true);
        s.set_version(version);
        s.set_table_id_ext(ext);
        s.set_number(number);
        s.set_last_number(last);
        s.set_current(current);
        s.alloc(2).copy_from_slice(&[version, number]);
        s.make_crc();
        s
    }

    struct Sections(std::vec::IntoIter<Section>);

    impl SectionReader for Sections {
        fn read_section(&mut self, s: &mut Section) -> Result<()> {
            match self.0.next() {
                Some(n) => {
                    *s = n;
                    Ok(())
                }
                None => Err(Error::EndOfStream),
            }
        }
    }

    #[test]
    fn test_tracker_completes() {
        let mut t = TableTracker::new(0x42, true, true);
        assert_eq!(t.track(&section(1, 1, 1, 2, true)).unwrap(), Track::Added);
        assert_eq!(t.track(&section(1, 1, 1, 2, true)).unwrap(), Track::Skipped);
        assert_eq!(t.track(&section(1, 1, 0, 2, false)).unwrap(), Track::Skipped);
        assert_eq!(t.track(&section(1, 1, 0, 2, true)).unwrap(), Track::Added);
        assert_eq!(t.track(&section(1, 1, 2, 2, true)).unwrap(), Track::Complete);
    }

    #[test]
    fn test_tracker_errors() {
        let mut t = TableTracker::new(0x42, false, true);
        assert!(matches!(
            t.track(&section(1, 1, 0, 0, true)),
            Err(Error::TableSyntax)
        ));
        let mut t = TableTracker::new(0x42, true, true);
        assert!(matches!(
            t.track(&section(1, 1, 3, 2, true)),
            Err(Error::TableSectionNumber { number: 3, last: 2 })
        ));
        let mut other = section(1, 1, 0, 0, true);
        other.set_table_id(0x46);
        assert_eq!(t.track(&other).unwrap(), Track::Skipped);
    }

    #[test]
    fn test_tracker_full_256_sections() {
        let mut t = TableTracker::new(0x42, true, true);
        for n in 0..255u8 {
            assert_eq!(t.track(&section(0, 0, n, 255, true)).unwrap(), Track::Added);
        }
        assert_eq!(t.track(&section(0, 0, 255, 255, true)).unwrap(), Track::Complete);
    }

    #[test]
    fn test_update_version_bump_mid_scan() {
        let input = vec![
            section(1, 5, 0, 2, true),
            section(1, 5, 1, 2, true),
            // content changes: version 2
            section(2, 5, 2, 2, true),
            section(2, 5, 0, 2, true),
            section(2, 5, 0, 2, true),
            section(2, 5, 1, 2, true),
        ];
        let mut r = Sections(input.into_iter());
        let mut t = Table::new();
        t.update(&mut r, 0x42, true, true, 64).unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.version(), 2);
        let numbers: Vec<u8> = t.sections().iter().map(|s| s.number()).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
        assert!(t.data().all(|d| d[0] == 2));
    }

    #[test]
    fn test_update_extension_change() {
        let input = vec![
            section(1, 5, 0, 1, true),
            section(1, 6, 1, 1, true),
            section(1, 6, 0, 1, true),
        ];
        let mut r = Sections(input.into_iter());
        let mut t = Table::new();
        t.update(&mut r, 0x42, true, true, 64).unwrap();
        assert_eq!(t.table_id_ext(), 6);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_update_incomplete_is_error() {
        let input = vec![section(1, 5, 0, 1, true)];
        let mut r = Sections(input.into_iter());
        let mut t = Table::new();
        assert!(matches!(
            t.update(&mut r, 0x42, true, true, 64),
            Err(Error::EndOfStream)
        ));
        assert!(t.is_empty());
    }

    #[test]
    fn test_update_from_queue() {
        let (mut w, mut r) = section_queue(4, 64);
        for n in [1u8, 0] {
            let mut s = section(3, 1, n, 1, true);
            w.exchange(&mut s).unwrap();
        }
        let mut t = Table::new();
        t.update(&mut r, 0x42, true, true, 64).unwrap();
        assert_eq!(t.sections()[0].number(), 0);
        assert_eq!(t.version(), 3);
    }

    #[test]
    fn test_alloc_and_close() {
        let cfg = TableConfig {
            table_id: 0x42,
            generic: true,
            private: true,
            max_len: 32,
            head: vec![0xAA, 0xBB],
        };
        let mut t = Table::new();
        // 32 - 8 - 4 - 2 = 18 bytes of payload per section
        for i in 0..5u8 {
            t.alloc(&cfg, 6).fill(i);
        }
        t.close(0x1234, 4, true);
        assert_eq!(t.len(), 2);
        for (i, s) in t.sections().iter().enumerate() {
            assert!(s.check_crc());
            assert_eq!(s.number(), i as u8);
            assert_eq!(s.last_number(), 1);
            assert_eq!(s.table_id_ext(), 0x1234);
            assert_eq!(s.version(), 4);
            assert_eq!(&s.data()[..2], &[0xAA, 0xBB]);
        }
        assert_eq!(t.sections()[0].data().len(), 20);
        assert_eq!(t.sections()[1].data().len(), 14);
    }

    #[test]
    #[should_panic]
    fn test_alloc_too_large() {
        let cfg = TableConfig {
            table_id: 0x42,
            generic: true,
            private: true,
            max_len: 32,
            head: Vec::new(),
        };
        Table::new().alloc(&cfg, 21);
    }

    #[test]
    fn test_table_descriptors() {
        let mut a = Section::with_header(64, 0x40, true, false);
        a.alloc(6).copy_from_slice(&[0xF0, 4, 0x40, 2, b'a', b'b']);
        a.make_crc();
        let mut b = Section::with_header(64, 0x40, true, false);
        b.set_number(1);
        b.alloc(5).copy_from_slice(&[0xF0, 3, 0x41, 1, 9]);
        b.make_crc();

        let mut t = Table::new();
        t.sections = vec![a, b];
        t.used = 2;

        let tags: Vec<u8> = t.descriptors(0).map(|d| d.tag()).collect();
        assert_eq!(tags, vec![0x40, 0x41]);
    }
}
