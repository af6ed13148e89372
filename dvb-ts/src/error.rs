//! Error types for the TS packet and PSI section codecs.

use std::io;

use thiserror::Error;

/// Errors reported by packet sources, the section codec and the table
/// tracker.
///
/// Apart from [`Error::EndOfStream`] and [`Error::Io`] every variant is
/// temporary: the current result is lost but the source stays usable and
/// the caller may simply read again. See [`Error::is_temporary`].
#[derive(Error, Debug)]
pub enum Error {
    /// MPEG-TS synchronization was lost (no sync byte where one was expected).
    #[error("MPEG-TS synchronization error")]
    Sync,

    /// The kernel reported that data was lost between two reads.
    #[error("buffering overflow, some data has been lost")]
    Overflow,

    /// The source is exhausted or the write end of a queue was closed.
    #[error("end of stream")]
    EndOfStream,

    /// Any other I/O error from the underlying byte source or sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// adaptation_field_length is inconsistent with adaptation_field_control.
    #[error("malformed adaptation field")]
    MalformedAdaptationField,

    /// The adaptation field is shorter than its flags require.
    #[error("adaptation field is too short")]
    AdaptationFieldTooShort,

    /// The requested entry is not flagged as present in the adaptation field.
    #[error("no such entry in adaptation field")]
    NotInAdaptationField,

    /// PCR extension out of range.
    #[error("PCR decoding error: extension {0} >= 300")]
    BadPcr(u16),

    /// section_length field holds a value outside the allowed range.
    #[error("incorrect value of section_length field")]
    SectionLength,

    /// pointer_field points past the end of the packet payload.
    #[error("incorrect pointer_field")]
    SectionPointer,

    /// The declared section does not fit into the destination buffer.
    #[error("no free space for section decoding: need {need} bytes, have {have}")]
    SectionSpace { need: usize, have: usize },

    /// The section CRC_32 does not match its content.
    #[error("section has incorrect CRC")]
    SectionCrc,

    /// A new section started before the current one was complete.
    #[error("too few data to decode section")]
    SectionData,

    /// Section syntax does not match what the table requires.
    #[error("incorrect PSI section syntax")]
    TableSyntax,

    /// section_number is greater than last_section_number.
    #[error("incorrect PSI table section number: {number} > {last}")]
    TableSectionNumber { number: u8, last: u8 },

    /// Table data part too short for its fixed fields.
    #[error("incorrect {0} section length")]
    TableData(&'static str),

    /// A BCD digit is greater than 9.
    #[error("incorrect BCD value 0x{0:02X}")]
    BadBcd(u8),

    /// Date or time fields do not form a valid UTC time.
    #[error("date or time out of range")]
    BadDate,

    /// TDT/TOT section has wrong table id, syntax or length.
    #[error("incorrect {0} section syntax")]
    TimeSyntax(&'static str),

    /// PES header prefix, flags or header length are inconsistent.
    #[error("malformed PES header")]
    PesHeader,

    /// PTS or DTS with a wrong prefix or a cleared marker bit.
    #[error("malformed PES timestamp")]
    PesTimestamp,
}

impl Error {
    /// Returns true if reading again may succeed.
    pub fn is_temporary(&self) -> bool {
        !matches!(self, Error::EndOfStream | Error::Io(_))
    }

    /// Returns true for the conditions a packet source signals without
    /// terminating the stream.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Sync | Error::Overflow)
    }

    /// Classifies an I/O error from a byte source.
    ///
    /// Short reads become [`Error::EndOfStream`]; EOVERFLOW from a DVB
    /// device becomes [`Error::Overflow`].
    pub fn from_read(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            return Error::EndOfStream;
        }
        if is_overflow(&err) {
            return Error::Overflow;
        }
        Error::Io(err)
    }
}

#[cfg(unix)]
fn is_overflow(err: &io::Error) -> bool {
    err.raw_os_error() == Some(nix::errno::Errno::EOVERFLOW as i32)
}

#[cfg(not(unix))]
fn is_overflow(_err: &io::Error) -> bool {
    false
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported while loading a [`DemuxConfig`](crate::config::DemuxConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config: {0}")]
    Read(#[from] io::Error),

    /// The configuration text is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is outside its allowed range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_classification() {
        assert!(Error::Sync.is_temporary());
        assert!(Error::Overflow.is_temporary());
        assert!(Error::SectionCrc.is_temporary());
        assert!(Error::TableSyntax.is_temporary());
        assert!(!Error::EndOfStream.is_temporary());
        assert!(!Error::Io(io::Error::new(io::ErrorKind::Other, "x")).is_temporary());
    }

    #[test]
    fn test_from_read() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "short");
        assert!(matches!(Error::from_read(eof), Error::EndOfStream));

        let other = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(Error::from_read(other), Error::Io(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_from_read_overflow() {
        let err = io::Error::from_raw_os_error(nix::errno::Errno::EOVERFLOW as i32);
        assert!(matches!(Error::from_read(err), Error::Overflow));
    }
}
