//! Packet and adaptation-field flag words.

use std::fmt;

/// Packet header flags packed in one byte:
///
/// ```text
/// bit 7      transport_error_indicator
/// bit 6      payload_unit_start_indicator
/// bit 5      transport_priority
/// bits 3..2  transport_scrambling_control
/// bit 1      adaptation field present
/// bit 0      payload present
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketFlags(pub u8);

macro_rules! flag {
    ($get:ident, $set:ident, $mask:expr) => {
        pub fn $get(self) -> bool {
            self.0 & $mask != 0
        }

        pub fn $set(&mut self, b: bool) {
            if b {
                self.0 |= $mask;
            } else {
                self.0 &= !$mask;
            }
        }
    };
}

impl PacketFlags {
    flag!(contains_error, set_contains_error, 0x80);
    flag!(payload_start, set_payload_start, 0x40);
    flag!(priority, set_priority, 0x20);
    flag!(contains_af, set_contains_af, 0x02);
    flag!(contains_payload, set_contains_payload, 0x01);

    pub fn scrambling_control(self) -> ScramblingControl {
        ScramblingControl::from_bits(self.0 >> 2)
    }

    pub fn set_scrambling_control(&mut self, sc: ScramblingControl) {
        self.0 = (self.0 & 0xF3) | ((sc as u8) << 2);
    }
}

/// transport_scrambling_control values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScramblingControl {
    NotScrambled = 0,
    Scrambled1 = 1,
    Scrambled2 = 2,
    Scrambled3 = 3,
}

impl ScramblingControl {
    fn from_bits(b: u8) -> Self {
        match b & 0x03 {
            0 => ScramblingControl::NotScrambled,
            1 => ScramblingControl::Scrambled1,
            2 => ScramblingControl::Scrambled2,
            _ => ScramblingControl::Scrambled3,
        }
    }
}

/// First byte of a non-empty adaptation field.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct AfFlags(pub u8);

impl AfFlags {
    flag!(discontinuity, set_discontinuity, 0x80);
    flag!(random_access, set_random_access, 0x40);
    flag!(es_priority, set_es_priority, 0x20);
    flag!(contains_pcr, set_contains_pcr, 0x10);
    flag!(contains_opcr, set_contains_opcr, 0x08);
    flag!(splicing_point, set_splicing_point, 0x04);
    flag!(contains_private_data, set_contains_private_data, 0x02);
    flag!(has_extension, set_has_extension, 0x01);
}

impl fmt::Debug for AfFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AfFlags")
            .field("discontinuity", &self.discontinuity())
            .field("random_access", &self.random_access())
            .field("pcr", &self.contains_pcr())
            .field("opcr", &self.contains_opcr())
            .field("splicing_point", &self.splicing_point())
            .finish()
    }
}

/// PES header flags, bytes 6 and 7 of a PES packet with optional header.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct PesFlags(pub u16);

impl PesFlags {
    flag!(priority, set_priority, 0x0800);
    flag!(data_alignment, set_data_alignment, 0x0400);
    flag!(copyright, set_copyright, 0x0200);
    flag!(original, set_original, 0x0100);
    flag!(contains_pts, set_contains_pts, 0x0080);
    flag!(contains_dts, set_contains_dts, 0x0040);
    flag!(contains_escr, set_contains_escr, 0x0020);
    flag!(contains_es_rate, set_contains_es_rate, 0x0010);
    flag!(dsm_trick_mode, set_dsm_trick_mode, 0x0008);
    flag!(contains_additional_copy_info, set_contains_additional_copy_info, 0x0004);
    flag!(contains_crc, set_contains_crc, 0x0002);
    flag!(has_extension, set_has_extension, 0x0001);

    /// The fixed '10' bits in front of the flags.
    pub fn marker_ok(self) -> bool {
        self.0 >> 14 == 0b10
    }

    pub fn scrambling_control(self) -> ScramblingControl {
        ScramblingControl::from_bits((self.0 >> 12) as u8)
    }
}

impl fmt::Debug for PesFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PesFlags")
            .field("scrambling_control", &self.scrambling_control())
            .field("data_alignment", &self.data_alignment())
            .field("pts", &self.contains_pts())
            .field("dts", &self.contains_dts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_flags() {
        let mut f = PacketFlags::default();
        f.set_payload_start(true);
        f.set_contains_payload(true);
        assert_eq!(f.0, 0x41);
        f.set_scrambling_control(ScramblingControl::Scrambled2);
        assert_eq!(f.scrambling_control(), ScramblingControl::Scrambled2);
        assert_eq!(f.0, 0x49);
        f.set_payload_start(false);
        assert!(!f.payload_start());
        assert!(f.contains_payload());
        assert!(!f.contains_af());
    }

    #[test]
    fn test_af_flags() {
        let f = AfFlags(0x18);
        assert!(f.contains_pcr());
        assert!(f.contains_opcr());
        assert!(!f.splicing_point());
    }

    #[test]
    fn test_pes_flags() {
        let f = PesFlags(0x8580);
        assert!(f.marker_ok());
        assert!(f.data_alignment());
        assert!(f.original());
        assert!(f.contains_pts());
        assert!(!f.contains_dts());
        assert_eq!(f.scrambling_control(), ScramblingControl::NotScrambled);
        assert!(!PesFlags(0x4080).marker_ok());
    }
}
