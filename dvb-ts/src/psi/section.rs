//! PSI section layout.
//!
//! ```text
//! byte 0      table_id
//! byte 1      section_syntax_indicator(1) private_indicator(1) reserved(2)
//!             section_length[11:8]
//! byte 2      section_length[7:0]
//! --- generic syntax only ---
//! bytes 3-4   table_id_extension
//! byte 5      reserved(2) version_number(5) current_next_indicator(1)
//! byte 6      section_number
//! byte 7      last_section_number
//! ---
//! data
//! CRC_32      (4 bytes)
//! ```

use std::fmt;

use crate::crc::crc32_mpeg2;

/// Largest section in general (private tables).
pub const SECTION_MAX_LEN: usize = 4096;

/// Largest section of ISO/IEC 13818-1 and EN 300 468 tables.
pub const ISO_SECTION_MAX_LEN: usize = 1024;

/// Shortest valid section: header plus CRC.
pub const SECTION_MIN_LEN: usize = 3 + 4;

/// Header length of a section with generic syntax.
pub const GENERIC_HEADER_LEN: usize = 8;

/// Header length of a section without generic syntax.
pub const SHORT_HEADER_LEN: usize = 3;

pub const CRC_LEN: usize = 4;

/// Buffers passed to section readers must hold at least this many bytes.
pub const SECTION_BUF_MIN: usize = 8;

/// Reserved bits of byte 1.
const RESERVED_B1: u8 = 0x30;
/// Reserved bits of byte 5.
const RESERVED_B5: u8 = 0xC0;

/// Total section length declared by the section_length field, if valid.
pub(crate) fn declared_len(buf: &[u8]) -> Option<usize> {
    let l = (((buf[1] as usize) & 0x0F) << 8 | buf[2] as usize) + 3;
    if (SECTION_MIN_LEN..=SECTION_MAX_LEN).contains(&l) {
        Some(l)
    } else {
        None
    }
}

/// Read access to a section stored in a byte buffer.
///
/// Accessors of the generic syntax fields (bytes 3 to 7) read the buffer
/// regardless of [`SectionView::generic_syntax`].
pub trait SectionView {
    /// Whole buffer, possibly longer than the section.
    fn buf(&self) -> &[u8];

    fn table_id(&self) -> u8 {
        self.buf()[0]
    }

    fn generic_syntax(&self) -> bool {
        self.buf()[1] & 0x80 != 0
    }

    fn private_syntax(&self) -> bool {
        self.buf()[1] & 0x40 != 0
    }

    /// Whole section length (section_length + 3), or `None` if
    /// section_length holds a value outside `4..=4093`.
    fn len(&self) -> Option<usize> {
        declared_len(self.buf())
    }

    fn table_id_ext(&self) -> u16 {
        let b = self.buf();
        u16::from_be_bytes([b[3], b[4]])
    }

    fn version(&self) -> u8 {
        (self.buf()[5] >> 1) & 0x1F
    }

    fn current(&self) -> bool {
        self.buf()[5] & 0x01 != 0
    }

    fn number(&self) -> u8 {
        self.buf()[6]
    }

    fn last_number(&self) -> u8 {
        self.buf()[7]
    }

    fn header_len(&self) -> usize {
        if self.generic_syntax() {
            GENERIC_HEADER_LEN
        } else {
            SHORT_HEADER_LEN
        }
    }

    /// The section itself, without the unused part of the buffer.
    ///
    /// # Panics
    /// If section_length is invalid or the section does not fit in the
    /// buffer.
    fn bytes(&self) -> &[u8] {
        let b = self.buf();
        match declared_len(b) {
            Some(l) if l <= b.len() => &b[..l],
            _ => panic!("section_length has incorrect value or section does not fit in buffer"),
        }
    }

    /// Data part: bytes between the header and the CRC.
    ///
    /// # Panics
    /// If section_length is invalid, the section does not fit in the
    /// buffer or it is too short to hold its header.
    fn data(&self) -> &[u8] {
        match self.try_data() {
            Some(d) => d,
            None => panic!("section is too short for its header or does not fit in buffer"),
        }
    }

    /// Like [`SectionView::data`] but returns `None` instead of panicking.
    fn try_data(&self) -> Option<&[u8]> {
        let b = self.buf();
        let hl = self.header_len();
        match declared_len(b) {
            Some(l) if l <= b.len() && l >= hl + CRC_LEN => Some(&b[hl..l - CRC_LEN]),
            _ => None,
        }
    }

    /// CRC_32 field value.
    fn crc(&self) -> u32 {
        let s = self.bytes();
        let c = &s[s.len() - CRC_LEN..];
        u32::from_be_bytes([c[0], c[1], c[2], c[3]])
    }

    /// True if section_length is valid, the section fits in the buffer and
    /// its CRC_32 matches.
    fn check_crc(&self) -> bool {
        let b = self.buf();
        match declared_len(b) {
            Some(l) if l <= b.len() => crc32_mpeg2(&b[..l - CRC_LEN]) == self.crc(),
            _ => false,
        }
    }
}

/// Write access to a section stored in a byte buffer.
pub trait SectionViewMut: SectionView {
    fn buf_mut(&mut self) -> &mut [u8];

    fn set_table_id(&mut self, id: u8) {
        self.buf_mut()[0] = id;
    }

    fn set_generic_syntax(&mut self, v: bool) {
        set_bit(&mut self.buf_mut()[1], 0x80, v);
    }

    fn set_private_syntax(&mut self, v: bool) {
        set_bit(&mut self.buf_mut()[1], 0x40, v);
    }

    /// Sets section_length to `l - 3`.
    ///
    /// # Panics
    /// If `l` is outside `7..=4096`.
    fn set_len_field(&mut self, l: usize) {
        assert!(
            (SECTION_MIN_LEN..=SECTION_MAX_LEN).contains(&l),
            "incorrect value for section_length field: {}",
            l
        );
        let f = l - 3;
        let b = self.buf_mut();
        b[1] = (b[1] & 0xF0) | ((f >> 8) as u8 & 0x0F);
        b[2] = f as u8;
    }

    fn set_table_id_ext(&mut self, ext: u16) {
        self.buf_mut()[3..5].copy_from_slice(&ext.to_be_bytes());
    }

    /// # Panics
    /// If `v > 31`.
    fn set_version(&mut self, v: u8) {
        assert!(v <= 31, "value for version_number field is too large: {}", v);
        let b = self.buf_mut();
        b[5] = (b[5] & 0xC1) | (v << 1);
    }

    fn set_current(&mut self, v: bool) {
        set_bit(&mut self.buf_mut()[5], 0x01, v);
    }

    fn set_number(&mut self, n: u8) {
        self.buf_mut()[6] = n;
    }

    fn set_last_number(&mut self, n: u8) {
        self.buf_mut()[7] = n;
    }

    /// Mutable data part.
    ///
    /// # Panics
    /// Same as [`SectionView::data`].
    fn data_mut(&mut self) -> &mut [u8] {
        let hl = self.header_len();
        let l = self.bytes().len();
        assert!(l >= hl + CRC_LEN, "section is too short for its header");
        &mut self.buf_mut()[hl..l - CRC_LEN]
    }

    /// Computes CRC_32 over the section and stores it in the trailer.
    ///
    /// # Panics
    /// If section_length is invalid or the section does not fit in the
    /// buffer.
    fn make_crc(&mut self) {
        let l = self.bytes().len();
        let b = self.buf_mut();
        let crc = crc32_mpeg2(&b[..l - CRC_LEN]);
        b[l - CRC_LEN..l].copy_from_slice(&crc.to_be_bytes());
    }
}

fn set_bit(b: &mut u8, mask: u8, v: bool) {
    if v {
        *b |= mask;
    } else {
        *b &= !mask;
    }
}

/// Section with its own buffer.
///
/// The buffer has a fixed capacity chosen at construction and is reused
/// by section readers; the section occupies its first [`SectionView::len`]
/// bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Section {
    buf: Box<[u8]>,
}

impl Section {
    /// Zeroed buffer of `cap` bytes.
    ///
    /// # Panics
    /// If `cap < 8`.
    pub fn new(cap: usize) -> Self {
        assert!(
            cap >= SECTION_BUF_MIN,
            "section buffer should be at least {} bytes",
            SECTION_BUF_MIN
        );
        Section {
            buf: vec![0u8; cap].into_boxed_slice(),
        }
    }

    /// Section with an empty data part, ready for [`Section::alloc`].
    ///
    /// Reserved bits are set to 1 and, with generic syntax, the section
    /// is marked current.
    pub fn with_header(cap: usize, table_id: u8, generic: bool, private: bool) -> Self {
        let mut s = Section::new(cap);
        s.buf[0] = table_id;
        s.buf[1] = RESERVED_B1;
        s.set_generic_syntax(generic);
        s.set_private_syntax(private);
        if generic {
            s.buf[5] = RESERVED_B5 | 0x01;
        }
        let hl = s.header_len();
        s.set_len_field(hl + CRC_LEN);
        s
    }

    /// Copies `bytes` into a buffer of the same length.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut s = Section::new(bytes.len().max(SECTION_BUF_MIN));
        s.buf[..bytes.len()].copy_from_slice(bytes);
        s
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes that [`Section::alloc`] can still add.
    pub fn free(&self) -> usize {
        let max = self.buf.len().min(SECTION_MAX_LEN);
        self.len().map_or(0, |l| max.saturating_sub(l))
    }

    /// Extends the data part by `n` bytes and returns them for writing.
    /// The CRC becomes stale until [`SectionViewMut::make_crc`] is called.
    ///
    /// # Panics
    /// If the section length is invalid or there is no room for `n` more
    /// bytes.
    pub fn alloc(&mut self, n: usize) -> &mut [u8] {
        let l = self.bytes().len();
        assert!(
            n <= self.free(),
            "no room in section for {} bytes ({} free)",
            n,
            self.free()
        );
        self.set_len_field(l + n);
        let start = l - CRC_LEN;
        &mut self.buf[start..start + n]
    }

    pub fn as_section_ref(&self) -> SectionRef<'_> {
        SectionRef(&self.buf)
    }
}

impl SectionView for Section {
    fn buf(&self) -> &[u8] {
        &self.buf
    }
}

impl SectionViewMut for Section {
    fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_section(self, f, "Section")
    }
}

/// Section borrowed from a larger buffer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SectionRef<'a>(&'a [u8]);

impl<'a> SectionRef<'a> {
    /// # Panics
    /// If `buf` is shorter than 8 bytes, the end of the generic header.
    pub fn new(buf: &'a [u8]) -> Self {
        assert!(
            buf.len() >= SECTION_BUF_MIN,
            "section buffer should be at least {} bytes",
            SECTION_BUF_MIN
        );
        SectionRef(buf)
    }

    /// Data part with the lifetime of the underlying buffer.
    pub fn data_ref(&self) -> &'a [u8] {
        let s = match declared_len(self.0) {
            Some(l) if l <= self.0.len() => &self.0[..l],
            _ => panic!("section_length has incorrect value or section does not fit in buffer"),
        };
        let hl = self.header_len();
        assert!(s.len() >= hl + CRC_LEN, "section is too short for its header");
        &s[hl..s.len() - CRC_LEN]
    }
}

impl SectionView for SectionRef<'_> {
    fn buf(&self) -> &[u8] {
        self.0
    }
}

impl fmt::Debug for SectionRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_section(self, f, "SectionRef")
    }
}

fn debug_section(s: &dyn SectionView, f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    let mut d = f.debug_struct(name);
    d.field("table_id", &format_args!("0x{:02X}", s.table_id()))
        .field("len", &s.len());
    if s.generic_syntax() && s.buf().len() >= GENERIC_HEADER_LEN {
        d.field("ext", &s.table_id_ext())
            .field("version", &s.version())
            .field("current", &s.current())
            .field("number", &s.number())
            .field("last", &s.last_number());
    }
    d.finish()
}
