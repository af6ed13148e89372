//! NIT (Network Information Table).
//!
//! The NIT is transmitted on PID 0x0010. Every section's data part holds
//! a network descriptor loop followed by a transport stream loop, both
//! preceded by a 12-bit length.

use crate::error::{Error, Result};
use crate::table_id;

use super::descriptor::{Descriptor, DescriptorList, DescriptorListBuf};
use super::reader::SectionReader;
use super::section::{Section, SectionView, SectionViewMut, ISO_SECTION_MAX_LEN};
use super::table::{loop_at, put_loop_len, Table, TableConfig, TableDescriptors};

const MUX_HEAD_LEN: usize = 6;

fn nit_config() -> TableConfig {
    TableConfig {
        table_id: table_id::NIT_ACTUAL,
        generic: true,
        private: true,
        max_len: ISO_SECTION_MAX_LEN,
        // both loops empty
        head: vec![0xF0, 0x00, 0xF0, 0x00],
    }
}

/// Transport stream loop of a NIT section's data part.
fn ts_loop(data: &[u8]) -> Option<&[u8]> {
    let net = loop_at(data, 0)?;
    loop_at(data, 2 + net.len())
}

/// Network Information Table backed by its sections.
#[derive(Debug, Default)]
pub struct Nit {
    table: Table,
}

impl Nit {
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

    /// Reads the next complete NIT of the actual (`actual == true`) or of
    /// another network.
    ///
    /// Returns [`Error::TableData`] if a loop length overruns its section.
    pub fn update<R: SectionReader + ?Sized>(
        &mut self,
        r: &mut R,
        actual: bool,
        current: bool,
    ) -> Result<()> {
        let id = if actual {
            table_id::NIT_ACTUAL
        } else {
            table_id::NIT_OTHER
        };
        self.table
            .update(r, id, true, current, ISO_SECTION_MAX_LEN)?;
        if self.table.data().any(|d| ts_loop(d).is_none()) {
            self.table.reset();
            return Err(Error::TableData("NIT"));
        }
        Ok(())
    }

    /// # Panics
    /// If the NIT is empty. The same holds for the other header getters.
    pub fn network_id(&self) -> u16 {
        self.table.table_id_ext()
    }

    pub fn version(&self) -> u8 {
        self.table.version()
    }

    pub fn current(&self) -> bool {
        self.table.current()
    }

    pub fn is_actual(&self) -> bool {
        self.table.table_id() == table_id::NIT_ACTUAL
    }

    /// Network descriptors of all sections, in order.
    pub fn network_descriptors(&self) -> TableDescriptors<'_> {
        self.table.descriptors(0)
    }

    pub fn mux_info(&self) -> MuxInfoList<'_> {
        MuxInfoList {
            sections: self.table.sections(),
            data: &[],
        }
    }

    /// Appends a network descriptor.
    ///
    /// # Panics
    /// If a transport stream entry was already appended to the last
    /// section.
    pub fn append_network_descriptor(&mut self, d: Descriptor<'_>) {
        let d = d.bytes();
        self.table.alloc(&nit_config(), d.len()).copy_from_slice(d);
        if let Some(s) = self.table.last_mut() {
            let data = s.data_mut();
            let net_len = loop_at(data, 0).map_or(0, |l| l.len());
            let ts_off = 2 + net_len;
            assert!(
                data[ts_off..ts_off + 2] == [0xF0, 0x00],
                "network descriptors must be appended before transport stream entries"
            );
            // move the empty transport stream loop behind the new descriptor
            data[ts_off..].rotate_left(2);
            put_loop_len(&mut data[0..2], net_len + d.len());
        }
    }

    /// Appends a transport stream entry.
    ///
    /// # Panics
    /// If the entry can't fit in one section.
    pub fn append_mux_info(&mut self, mux: &MuxEntry) {
        let desc = mux.descriptors.bytes();
        let n = MUX_HEAD_LEN + desc.len();
        let b = self.table.alloc(&nit_config(), n);
        b[0..2].copy_from_slice(&mux.transport_stream_id.to_be_bytes());
        b[2..4].copy_from_slice(&mux.original_network_id.to_be_bytes());
        put_loop_len(&mut b[4..6], desc.len());
        b[MUX_HEAD_LEN..].copy_from_slice(desc);
        if let Some(s) = self.table.last_mut() {
            let data = s.data_mut();
            let ts_off = 2 + loop_at(data, 0).map_or(0, |l| l.len());
            let ts_len = data.len() - ts_off - 2;
            put_loop_len(&mut data[ts_off..ts_off + 2], ts_len);
        }
    }

    /// Finishes a NIT built with the append methods.
    ///
    /// # Panics
    /// If nothing was appended or `version > 31`.
    pub fn close(&mut self, network_id: u16, actual: bool, version: u8, current: bool) {
        if !actual {
            for s in self.table.sections_mut() {
                s.set_table_id(table_id::NIT_OTHER);
            }
        }
        self.table.close(network_id, version, current);
    }
}

/// Transport stream entry to append to a NIT.
#[derive(Debug, Clone, Default)]
pub struct MuxEntry {
    pub transport_stream_id: u16,
    pub original_network_id: u16,
    pub descriptors: DescriptorListBuf,
}

/// Transport stream entry borrowed from a NIT section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxInfo<'a>(&'a [u8]);

impl<'a> MuxInfo<'a> {
    pub fn transport_stream_id(&self) -> u16 {
        u16::from_be_bytes([self.0[0], self.0[1]])
    }

    pub fn original_network_id(&self) -> u16 {
        u16::from_be_bytes([self.0[2], self.0[3]])
    }

    pub fn descriptors(&self) -> DescriptorList<'a> {
        DescriptorList::new(&self.0[MUX_HEAD_LEN..])
    }
}

/// Cursor over the transport stream loops of all NIT sections.
#[derive(Debug, Clone, Copy)]
pub struct MuxInfoList<'a> {
    sections: &'a [Section],
    data: &'a [u8],
}

impl<'a> MuxInfoList<'a> {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.data.is_empty()
    }

    /// First entry and the remaining list. A truncated entry or loop gives
    /// `None` and a non-empty list.
    pub fn pop(mut self) -> (Option<MuxInfo<'a>>, MuxInfoList<'a>) {
        while self.data.is_empty() {
            let (s, rest) = match self.sections.split_first() {
                Some(v) => v,
                None => return (None, self),
            };
            match s.try_data().and_then(ts_loop) {
                Some(l) => {
                    self.sections = rest;
                    self.data = l;
                }
                None => return (None, self),
            }
        }
        if self.data.len() < MUX_HEAD_LEN {
            return (None, self);
        }
        let l = (u16::from_be_bytes([self.data[4], self.data[5]]) & 0x0FFF) as usize
            + MUX_HEAD_LEN;
        if self.data.len() < l {
            return (None, self);
        }
        let info = MuxInfo(&self.data[..l]);
        self.data = &self.data[l..];
        (Some(info), self)
    }
}

impl<'a> Iterator for MuxInfoList<'a> {
    type Item = MuxInfo<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (i, rest) = self.pop();
        *self = rest;
        if i.is_none() {
            self.sections = &[];
            self.data = &[];
        }
        i
    }
}
