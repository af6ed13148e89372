//! SDT (Service Description Table).
//!
//! The SDT is transmitted on PID 0x0011 and describes the services of a
//! transport stream. Every section's data part starts with the
//! original_network_id, followed by the service loop.

use crate::error::{Error, Result};
use crate::table_id;

use super::descriptor::{DescriptorList, DescriptorListBuf};
use super::reader::SectionReader;
use super::section::{Section, SectionView, SectionViewMut, ISO_SECTION_MAX_LEN};
use super::table::{Table, TableConfig};

/// original_network_id and a reserved byte.
const SDT_HEAD_LEN: usize = 3;
const SERVICE_HEAD_LEN: usize = 5;

/// running_status of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunningStatus {
    #[default]
    Undefined,
    NotRunning,
    StartsInFewSeconds,
    Pausing,
    Running,
    OffAir,
    Reserved(u8),
}

impl From<u8> for RunningStatus {
    fn from(v: u8) -> Self {
        match v & 0x07 {
            0 => RunningStatus::Undefined,
            1 => RunningStatus::NotRunning,
            2 => RunningStatus::StartsInFewSeconds,
            3 => RunningStatus::Pausing,
            4 => RunningStatus::Running,
            5 => RunningStatus::OffAir,
            v => RunningStatus::Reserved(v),
        }
    }
}

impl From<RunningStatus> for u8 {
    fn from(s: RunningStatus) -> u8 {
        match s {
            RunningStatus::Undefined => 0,
            RunningStatus::NotRunning => 1,
            RunningStatus::StartsInFewSeconds => 2,
            RunningStatus::Pausing => 3,
            RunningStatus::Running => 4,
            RunningStatus::OffAir => 5,
            RunningStatus::Reserved(v) => v & 0x07,
        }
    }
}

impl RunningStatus {
    pub fn name(&self) -> &'static str {
        match self {
            RunningStatus::Undefined => "Undefined",
            RunningStatus::NotRunning => "Not running",
            RunningStatus::StartsInFewSeconds => "Starts in a few seconds",
            RunningStatus::Pausing => "Pausing",
            RunningStatus::Running => "Running",
            RunningStatus::OffAir => "Service off-air",
            RunningStatus::Reserved(_) => "Reserved",
        }
    }
}

/// Service Description Table backed by its sections.
#[derive(Debug, Default)]
pub struct Sdt {
    table: Table,
}

impl Sdt {
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

    /// Reads the next complete SDT of the actual (`actual == true`) or of
    /// another transport stream.
    ///
    /// Returns [`Error::TableData`] if a section is too short to hold the
    /// original_network_id.
    pub fn update<R: SectionReader + ?Sized>(
        &mut self,
        r: &mut R,
        actual: bool,
        current: bool,
    ) -> Result<()> {
        let id = if actual {
            table_id::SDT_ACTUAL
        } else {
            table_id::SDT_OTHER
        };
        self.table
            .update(r, id, true, current, ISO_SECTION_MAX_LEN)?;
        if self.table.data().any(|d| d.len() < SDT_HEAD_LEN) {
            self.table.reset();
            return Err(Error::TableData("SDT"));
        }
        Ok(())
    }

    /// # Panics
    /// If the SDT is empty. The same holds for the other header getters.
    pub fn transport_stream_id(&self) -> u16 {
        self.table.table_id_ext()
    }

    pub fn version(&self) -> u8 {
        self.table.version()
    }

    pub fn current(&self) -> bool {
        self.table.current()
    }

    pub fn is_actual(&self) -> bool {
        self.table.table_id() == table_id::SDT_ACTUAL
    }

    pub fn original_network_id(&self) -> u16 {
        let d = self.table.sections()[0].data();
        u16::from_be_bytes([d[0], d[1]])
    }

    pub fn services(&self) -> ServiceInfoList<'_> {
        ServiceInfoList {
            sections: self.table.sections(),
            data: &[],
        }
    }

    /// Appends a service entry, starting a new section when the last one
    /// is full.
    ///
    /// # Panics
    /// If the entry can't fit in one section.
    pub fn append_service(&mut self, original_network_id: u16, service: &ServiceEntry) {
        let onid = original_network_id.to_be_bytes();
        let cfg = TableConfig {
            table_id: table_id::SDT_ACTUAL,
            generic: true,
            private: true,
            max_len: ISO_SECTION_MAX_LEN,
            head: vec![onid[0], onid[1], 0xFF],
        };
        let desc = service.descriptors.bytes();
        let b = self.table.alloc(&cfg, SERVICE_HEAD_LEN + desc.len());
        service.write_head(b, desc.len());
        b[SERVICE_HEAD_LEN..].copy_from_slice(desc);
    }

    /// Finishes an SDT built with [`Sdt::append_service`].
    ///
    /// # Panics
    /// If no service was appended or `version > 31`.
    pub fn close(&mut self, transport_stream_id: u16, actual: bool, version: u8, current: bool) {
        if !actual {
            for s in self.table.sections_mut() {
                s.set_table_id(table_id::SDT_OTHER);
            }
        }
        self.table.close(transport_stream_id, version, current);
    }
}

/// Service entry to append to an SDT.
#[derive(Debug, Clone, Default)]
pub struct ServiceEntry {
    pub service_id: u16,
    pub eit_schedule: bool,
    pub eit_present_following: bool,
    pub running_status: RunningStatus,
    pub free_ca_mode: bool,
    pub descriptors: DescriptorListBuf,
}

impl ServiceEntry {
    fn write_head(&self, b: &mut [u8], desc_len: usize) {
        assert!(desc_len <= 0x0FFF, "service descriptors too long");
        b[0..2].copy_from_slice(&self.service_id.to_be_bytes());
        b[2] = 0xFC | (self.eit_schedule as u8) << 1 | self.eit_present_following as u8;
        b[3] = u8::from(self.running_status) << 5
            | (self.free_ca_mode as u8) << 4
            | (desc_len >> 8) as u8;
        b[4] = desc_len as u8;
    }
}

/// Service entry borrowed from an SDT section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceInfo<'a>(&'a [u8]);

impl<'a> ServiceInfo<'a> {
    /// Service ID (program number).
    pub fn service_id(&self) -> u16 {
        u16::from_be_bytes([self.0[0], self.0[1]])
    }

    pub fn eit_schedule(&self) -> bool {
        self.0[2] & 0x02 != 0
    }

    pub fn eit_present_following(&self) -> bool {
        self.0[2] & 0x01 != 0
    }

    pub fn running_status(&self) -> RunningStatus {
        RunningStatus::from(self.0[3] >> 5)
    }

    /// free_CA_mode: some component is scrambled.
    pub fn free_ca_mode(&self) -> bool {
        self.0[3] & 0x10 != 0
    }

    pub fn descriptors(&self) -> DescriptorList<'a> {
        DescriptorList::new(&self.0[SERVICE_HEAD_LEN..])
    }
}

/// Cursor over the service loops of all SDT sections.
#[derive(Debug, Clone, Copy)]
pub struct ServiceInfoList<'a> {
    sections: &'a [Section],
    data: &'a [u8],
}

impl<'a> ServiceInfoList<'a> {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.data.is_empty()
    }

    /// First service entry and the remaining list. A truncated entry gives
    /// `None` and a non-empty list.
    pub fn pop(mut self) -> (Option<ServiceInfo<'a>>, ServiceInfoList<'a>) {
        while self.data.is_empty() {
            let (s, rest) = match self.sections.split_first() {
                Some(v) => v,
                None => return (None, self),
            };
            self.sections = rest;
            match s.try_data() {
                Some(d) if d.len() >= SDT_HEAD_LEN => self.data = &d[SDT_HEAD_LEN..],
                _ => return (None, self),
            }
        }
        if self.data.len() < SERVICE_HEAD_LEN {
            return (None, self);
        }
        let l = (u16::from_be_bytes([self.data[3], self.data[4]]) & 0x0FFF) as usize
            + SERVICE_HEAD_LEN;
        if self.data.len() < l {
            return (None, self);
        }
        let info = ServiceInfo(&self.data[..l]);
        self.data = &self.data[l..];
        (Some(info), self)
    }
}

impl<'a> Iterator for ServiceInfoList<'a> {
    type Item = ServiceInfo<'a>;

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
