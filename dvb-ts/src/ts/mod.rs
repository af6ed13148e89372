//! MPEG-TS packet layer.
//!
//! This module provides packet views, adaptation field access, byte stream
//! synchronization, PID filtering, packet I/O adapters and PES headers.

pub mod adaptation;
pub mod filter;
pub mod flags;
pub mod io;
pub mod packet;
pub mod pes;
pub mod stream;

pub use adaptation::{AdaptationField, AdaptationFieldMut};
pub use filter::PidFilter;
pub use flags::{AfFlags, PacketFlags, PesFlags, ScramblingControl};
pub use io::{
    DatagramReader, PacketByteReader, PacketReader, PacketReplacer, PacketStreamWriter,
    PacketWriter, ReadReplacer, RecvDatagram, WriteReplacer,
};
pub use packet::{
    ArrayPacket, Packet, PacketMut, SlicePacket, SlicePacketIter, SlicePacketMut, TsHeader,
    ANY_PID, NULL_PID, SYNC_BYTE, TS_PACKET_SIZE,
};
pub use pes::{PesHeader, PesTimestamp};
pub use stream::PacketStream;
