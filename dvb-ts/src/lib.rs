//! dvbts - MPEG-TS packet model and PSI/SI section codec.
//!
//! This library turns a byte stream of 188-byte transport packets into
//! PSI/SI sections and tables, and packetizes sections back into a
//! transport stream.
//!
//! # Layers
//! - [`ts`]: packet views, adaptation field, byte stream synchronization,
//!   PID filtering, packet I/O adapters (byte streams and UDP datagrams)
//!   and PES headers
//! - [`queue`]: bounded give-one/get-one exchange between two threads
//! - [`psi`]: section decoder and encoder, multi-section tables, and PAT,
//!   PMT, SDT, NIT, TDT and TOT views
//! - [`pcr`], [`crc`], [`time`]: PCR, CRC-32/MPEG-2 and MJD/BCD codecs
//! - [`pipeline`]: a producer thread feeding a packet queue
//!
//! # Usage
//! ```no_run
//! use dvbts::config::DemuxConfig;
//! use dvbts::pipeline::spawn_pump;
//! use dvbts::psi::{Pat, SectionDecoder};
//! use dvbts::ts::PacketStream;
//!
//! let file = std::fs::File::open("capture.ts")?;
//! let config = DemuxConfig {
//!     pids: vec![dvbts::pid::PAT],
//!     ..Default::default()
//! };
//! let (packets, _pump) = spawn_pump(PacketStream::new(file), &config)?;
//! let mut sections = SectionDecoder::new(packets, config.check_crc);
//! let mut pat = Pat::new();
//! pat.update(&mut sections, true)?;
//! for (program, pmt_pid) in pat.program_map() {
//!     println!("program {} -> PMT PID {}", program, pmt_pid);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod crc;
pub mod error;
pub mod pcr;
pub mod pipeline;
pub mod psi;
pub mod queue;
pub mod time;
pub mod ts;

pub use error::{ConfigError, Error, Result};
pub use pcr::Pcr;

/// Well-known PIDs in MPEG-TS.
pub mod pid {
    /// Program Association Table PID.
    pub const PAT: u16 = 0x0000;
    /// Conditional Access Table PID.
    pub const CAT: u16 = 0x0001;
    /// Transport Stream Description Table PID.
    pub const TSDT: u16 = 0x0002;
    /// Network Information Table PID.
    pub const NIT: u16 = 0x0010;
    /// Service Description Table PID.
    pub const SDT: u16 = 0x0011;
    /// Event Information Table PID.
    pub const EIT: u16 = 0x0012;
    /// Time and Date / Time Offset Table PID.
    pub const TDT: u16 = 0x0014;
    /// Null packet PID (stuffing).
    pub const NULL: u16 = 0x1FFF;
}

/// Table IDs for PSI/SI tables.
pub mod table_id {
    /// Program Association Section.
    pub const PAT: u8 = 0x00;
    /// Conditional Access Section.
    pub const CAT: u8 = 0x01;
    /// Program Map Section.
    pub const PMT: u8 = 0x02;
    /// Network Information Section - actual.
    pub const NIT_ACTUAL: u8 = 0x40;
    /// Network Information Section - other.
    pub const NIT_OTHER: u8 = 0x41;
    /// Service Description Section - actual.
    pub const SDT_ACTUAL: u8 = 0x42;
    /// Service Description Section - other.
    pub const SDT_OTHER: u8 = 0x46;
    /// Time and Date Section.
    pub const TDT: u8 = 0x70;
    /// Time Offset Section.
    pub const TOT: u8 = 0x73;
    /// Stuffing; never a valid table id.
    pub const STUFFING: u8 = 0xFF;
}

/// Descriptor tags used in PSI/SI tables.
pub mod descriptor_tag {
    /// Network name descriptor (0x40).
    pub const NETWORK_NAME: u8 = 0x40;
    /// Service list descriptor (0x41).
    pub const SERVICE_LIST: u8 = 0x41;
    /// Satellite delivery system descriptor.
    pub const SATELLITE_DELIVERY: u8 = 0x43;
    /// Cable delivery system descriptor.
    pub const CABLE_DELIVERY: u8 = 0x44;
    /// Service descriptor (0x48).
    pub const SERVICE: u8 = 0x48;
    /// Stream identifier descriptor (0x52).
    pub const STREAM_IDENTIFIER: u8 = 0x52;
    /// Local time offset descriptor (0x58).
    pub const LOCAL_TIME_OFFSET: u8 = 0x58;
    /// Terrestrial delivery system descriptor.
    pub const TERRESTRIAL_DELIVERY: u8 = 0x5A;
}

/// stream_type values of PMT elementary stream entries.
pub mod stream_type {
    pub const MPEG1_VIDEO: u8 = 0x01;
    pub const MPEG2_VIDEO: u8 = 0x02;
    pub const MPEG1_AUDIO: u8 = 0x03;
    pub const MPEG2_AUDIO: u8 = 0x04;
    pub const PRIVATE_SECTIONS: u8 = 0x05;
    pub const PES_PRIVATE: u8 = 0x06;
    pub const AAC: u8 = 0x0F;
    pub const H264: u8 = 0x1B;
    pub const H265: u8 = 0x24;
}
