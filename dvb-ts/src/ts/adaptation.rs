//! Adaptation field views.

use crate::error::{Error, Result};
use crate::pcr::{Pcr, PCR_LEN};

use super::flags::AfFlags;

/// Read-only view of adaptation field content (the bytes following
/// adaptation_field_length). Empty if the packet carries no adaptation
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdaptationField<'a>(&'a [u8]);

impl<'a> AdaptationField<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        AdaptationField(data)
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adaptation field flags; all false for an empty field.
    pub fn flags(&self) -> AfFlags {
        self.0.first().map(|&b| AfFlags(b)).unwrap_or_default()
    }

    pub fn pcr(&self) -> Result<Pcr> {
        let off = pcr_offset(self.flags())?;
        decode_at(self.0, off)
    }

    pub fn opcr(&self) -> Result<Pcr> {
        let off = opcr_offset(self.flags())?;
        decode_at(self.0, off)
    }

    /// splice_countdown, signed.
    pub fn splice_countdown(&self) -> Result<i8> {
        let off = splice_offset(self.flags())?;
        self.0
            .get(off)
            .map(|&b| b as i8)
            .ok_or(Error::AdaptationFieldTooShort)
    }
}

/// Mutable view of adaptation field content.
#[derive(Debug)]
pub struct AdaptationFieldMut<'a>(&'a mut [u8]);

impl<'a> AdaptationFieldMut<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        AdaptationFieldMut(data)
    }

    pub fn view(&self) -> AdaptationField<'_> {
        AdaptationField(&*self.0)
    }

    /// Overwrites the flags byte.
    pub fn set_flags(&mut self, f: AfFlags) -> Result<()> {
        let b = self.0.first_mut().ok_or(Error::AdaptationFieldTooShort)?;
        *b = f.0;
        Ok(())
    }

    pub fn set_pcr(&mut self, pcr: Pcr) -> Result<()> {
        let off = pcr_offset(self.view().flags())?;
        encode_at(self.0, off, pcr)
    }

    pub fn set_opcr(&mut self, pcr: Pcr) -> Result<()> {
        let off = opcr_offset(self.view().flags())?;
        encode_at(self.0, off, pcr)
    }

    pub fn set_splice_countdown(&mut self, n: i8) -> Result<()> {
        let off = splice_offset(self.view().flags())?;
        let b = self.0.get_mut(off).ok_or(Error::AdaptationFieldTooShort)?;
        *b = n as u8;
        Ok(())
    }
}

fn pcr_offset(f: AfFlags) -> Result<usize> {
    if !f.contains_pcr() {
        return Err(Error::NotInAdaptationField);
    }
    Ok(1)
}

fn opcr_offset(f: AfFlags) -> Result<usize> {
    if !f.contains_opcr() {
        return Err(Error::NotInAdaptationField);
    }
    Ok(if f.contains_pcr() { 1 + PCR_LEN } else { 1 })
}

fn splice_offset(f: AfFlags) -> Result<usize> {
    if !f.splicing_point() {
        return Err(Error::NotInAdaptationField);
    }
    let mut off = 1;
    if f.contains_pcr() {
        off += PCR_LEN;
    }
    if f.contains_opcr() {
        off += PCR_LEN;
    }
    Ok(off)
}

fn decode_at(af: &[u8], off: usize) -> Result<Pcr> {
    af.get(off..off + PCR_LEN)
        .ok_or(Error::AdaptationFieldTooShort)
        .and_then(Pcr::decode)
}

fn encode_at(af: &mut [u8], off: usize, pcr: Pcr) -> Result<()> {
    let b = af
        .get_mut(off..off + PCR_LEN)
        .ok_or(Error::AdaptationFieldTooShort)?;
    pcr.encode(b);
    Ok(())
}
