//! Packet sources and sinks.

use std::io::{self, Read, Write};
use std::net::UdpSocket;

use log::{debug, trace};

use crate::error::{Error, Result};

use super::packet::{
    ArrayPacket, Packet, PacketMut, SlicePacketIter, SlicePacketMut, TS_PACKET_SIZE,
};

/// Packets per datagram in the usual TS-over-UDP framing.
pub const DATAGRAM_PACKETS: usize = 7;

/// Reads one packet at a time into a caller-supplied buffer.
///
/// [`Error::Sync`] and [`Error::Overflow`] are not fatal: the next call may
/// succeed.
pub trait PacketReader {
    fn read_packet(&mut self, pkt: &mut dyn PacketMut) -> Result<()>;
}

/// Writes one packet at a time.
pub trait PacketWriter {
    fn write_packet(&mut self, pkt: &dyn Packet) -> Result<()>;
}

/// Consumes the packet in `pkt` and puts another one in its place.
///
/// This is the give-one/get-one operation used by the exchange queue. On
/// error the slot still holds a valid buffer, though its content may have
/// been modified.
pub trait PacketReplacer {
    fn replace_packet(&mut self, pkt: &mut Box<ArrayPacket>) -> Result<()>;
}

impl<R: PacketReader + ?Sized> PacketReader for &mut R {
    fn read_packet(&mut self, pkt: &mut dyn PacketMut) -> Result<()> {
        (**self).read_packet(pkt)
    }
}

impl<W: PacketWriter + ?Sized> PacketWriter for &mut W {
    fn write_packet(&mut self, pkt: &dyn Packet) -> Result<()> {
        (**self).write_packet(pkt)
    }
}

impl<P: PacketReplacer + ?Sized> PacketReplacer for &mut P {
    fn replace_packet(&mut self, pkt: &mut Box<ArrayPacket>) -> Result<()> {
        (**self).replace_packet(pkt)
    }
}

impl<P: PacketReplacer + ?Sized> PacketReplacer for Box<P> {
    fn replace_packet(&mut self, pkt: &mut Box<ArrayPacket>) -> Result<()> {
        (**self).replace_packet(pkt)
    }
}

/// Uses a [`PacketReader`] as a [`PacketReplacer`] by reading in place.
#[derive(Debug)]
pub struct ReadReplacer<R>(pub R);

impl<R: PacketReader> PacketReplacer for ReadReplacer<R> {
    fn replace_packet(&mut self, pkt: &mut Box<ArrayPacket>) -> Result<()> {
        self.0.read_packet(&mut **pkt)
    }
}

/// Uses a [`PacketWriter`] as a [`PacketReplacer`]; the written buffer is
/// handed back for reuse.
#[derive(Debug)]
pub struct WriteReplacer<W>(pub W);

impl<W: PacketWriter> PacketReplacer for WriteReplacer<W> {
    fn replace_packet(&mut self, pkt: &mut Box<ArrayPacket>) -> Result<()> {
        self.0.write_packet(&**pkt)
    }
}

/// Writes packets to a byte sink.
#[derive(Debug)]
pub struct PacketStreamWriter<W> {
    inner: W,
}

impl<W: Write> PacketStreamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> PacketWriter for PacketStreamWriter<W> {
    fn write_packet(&mut self, pkt: &dyn Packet) -> Result<()> {
        self.inner.write_all(pkt.bytes()).map_err(Error::Io)
    }
}

impl<W: Write> PacketReplacer for PacketStreamWriter<W> {
    fn replace_packet(&mut self, pkt: &mut Box<ArrayPacket>) -> Result<()> {
        self.write_packet(&**pkt)
    }
}

/// Exposes a [`PacketReader`] as an ordinary byte stream.
///
/// A read into a buffer of at least 188 bytes (after draining what is left
/// of a previous packet) reads one packet directly into it; shorter
/// buffers go through one internal packet. Packet read errors are returned
/// as `io::Error` wrapping the crate [`Error`].
///
/// A read error that follows bytes already copied in the same call is kept
/// and returned by the next call.
pub struct PacketByteReader<R> {
    inner: R,
    pkt: ArrayPacket,
    pos: usize,
    pending: Option<Error>,
}

impl<R: PacketReader> PacketByteReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pkt: ArrayPacket::new(),
            pos: TS_PACKET_SIZE,
            pending: None,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn to_io(err: Error) -> io::Error {
    match err {
        Error::Io(e) => e,
        e @ Error::EndOfStream => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

impl<R: PacketReader> Read for PacketByteReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(e) = self.pending.take() {
            return Err(to_io(e));
        }
        let mut n = 0;
        if self.pos != TS_PACKET_SIZE {
            let rest = &self.pkt.0[self.pos..];
            n = rest.len().min(buf.len());
            buf[..n].copy_from_slice(&rest[..n]);
            self.pos += n;
        }
        let buf = &mut buf[n..];
        if buf.len() >= TS_PACKET_SIZE {
            return match self.inner.read_packet(&mut SlicePacketMut::new(buf)) {
                Ok(()) => Ok(n + TS_PACKET_SIZE),
                Err(e) if n > 0 => {
                    self.pending = Some(e);
                    Ok(n)
                }
                Err(e) => Err(to_io(e)),
            };
        }
        if !buf.is_empty() {
            match self.inner.read_packet(&mut self.pkt) {
                Ok(()) => {
                    let m = buf.len();
                    buf.copy_from_slice(&self.pkt.0[..m]);
                    self.pos = m;
                    n += m;
                }
                Err(e) if n > 0 => self.pending = Some(e),
                Err(e) => return Err(to_io(e)),
            }
        }
        Ok(n)
    }
}

/// A source delivering one datagram per call.
pub trait RecvDatagram {
    fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl RecvDatagram for UdpSocket {
    fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf)
    }
}

impl<D: RecvDatagram + ?Sized> RecvDatagram for &mut D {
    fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).recv_datagram(buf)
    }
}

/// Reads packets carried in datagrams, typically TS over UDP.
///
/// Every datagram is split with [`SlicePacketIter`]: garbage between
/// packets is skipped and a trailing partial packet is dropped when the
/// next datagram is received. Empty datagrams are ignored.
pub struct DatagramReader<D> {
    inner: D,
    buf: Box<[u8]>,
    start: usize,
    end: usize,
}

impl<D: RecvDatagram> DatagramReader<D> {
    /// Reader with room for [`DATAGRAM_PACKETS`] packets per datagram.
    pub fn new(inner: D) -> Self {
        Self::with_capacity(inner, DATAGRAM_PACKETS * TS_PACKET_SIZE)
    }

    /// # Panics
    /// If `cap` is smaller than one packet.
    pub fn with_capacity(inner: D, cap: usize) -> Self {
        assert!(cap >= TS_PACKET_SIZE, "datagram buffer smaller than a packet");
        Self {
            inner,
            buf: vec![0u8; cap].into_boxed_slice(),
            start: 0,
            end: 0,
        }
    }

    pub fn get_ref(&self) -> &D {
        &self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }

    fn recv(&mut self) -> Result<()> {
        loop {
            match self.inner.recv_datagram(&mut self.buf) {
                Ok(0) => continue,
                Ok(n) => {
                    self.start = 0;
                    self.end = n;
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::from_read(e)),
            }
        }
    }
}

impl<D: RecvDatagram> PacketReader for DatagramReader<D> {
    fn read_packet(&mut self, pkt: &mut dyn PacketMut) -> Result<()> {
        loop {
            let mut it = SlicePacketIter::new(&self.buf[self.start..self.end]);
            let found = it.next();
            if it.skipped() > 0 {
                debug!("[DatagramReader] Skipped {} bytes between packets", it.skipped());
            }
            if let Some(p) = found {
                pkt.copy_from(&p);
                self.start += it.position();
                return Ok(());
            }
            let rest = self.end - self.start - it.position();
            if rest > 0 {
                trace!("[DatagramReader] Dropped {} trailing bytes", rest);
            }
            self.recv()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::stream::PacketStream;
    use std::collections::VecDeque;

    fn numbered(n: usize) -> Vec<u8> {
        let mut data = Vec::new();
        for i in 0..n {
            let mut p = ArrayPacket::null();
            p.set_pid(i as u16);
            data.extend_from_slice(&p.0);
        }
        data
    }

    #[test]
    fn test_stream_writer() {
        let mut w = PacketStreamWriter::new(Vec::new());
        let mut pkt = Box::new(ArrayPacket::null());
        w.write_packet(&*pkt).unwrap();
        w.replace_packet(&mut pkt).unwrap();
        assert_eq!(w.get_ref().len(), 2 * TS_PACKET_SIZE);
        assert_eq!(pkt.pid(), 0x1FFF);
    }

    #[test]
    fn test_read_replacer() {
        let data = numbered(2);
        let mut r = ReadReplacer(PacketStream::new(&data[..]));
        let mut pkt = Box::new(ArrayPacket::new());
        r.replace_packet(&mut pkt).unwrap();
        assert_eq!(pkt.pid(), 0);
        r.replace_packet(&mut pkt).unwrap();
        assert_eq!(pkt.pid(), 1);
    }

    #[test]
    fn test_byte_reader_small_reads() {
        let data = numbered(4);
        let mut r = PacketByteReader::new(PacketStream::new(&data[..]));
        let mut out = Vec::new();
        let mut buf = [0u8; 100];
        loop {
            match r.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(e) => {
                    assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
                    break;
                }
            }
        }
        assert_eq!(out, data);
    }

    #[test]
    fn test_byte_reader_large_reads() {
        let data = numbered(4);
        let mut r = PacketByteReader::new(PacketStream::new(&data[..]));
        let mut buf = [0u8; 400];
        assert_eq!(r.read(&mut buf[..50]).unwrap(), 50);
        // remainder of packet 0 then packet 1 whole
        let n = r.read(&mut buf).unwrap();
        assert_eq!(n, 138 + TS_PACKET_SIZE);
        assert_eq!(&buf[..n], &data[50..2 * TS_PACKET_SIZE]);
    }

    /// Yields one scripted result per call.
    struct Scripted(VecDeque<Result<u16>>);

    impl PacketReader for Scripted {
        fn read_packet(&mut self, pkt: &mut dyn PacketMut) -> Result<()> {
            let pid = self.0.pop_front().unwrap_or(Err(Error::EndOfStream))?;
            pkt.copy_from(&ArrayPacket::null());
            pkt.set_pid(pid);
            Ok(())
        }
    }

    fn inner_error(e: &io::Error) -> Option<&Error> {
        e.get_ref().and_then(|i| i.downcast_ref::<Error>())
    }

    #[test]
    fn test_byte_reader_keeps_error_after_partial_read() {
        let script = VecDeque::from(vec![Ok(1), Err(Error::Sync), Ok(2), Err(Error::Overflow)]);
        let mut r = PacketByteReader::new(Scripted(script));
        let mut buf = [0u8; 400];

        assert_eq!(r.read(&mut buf[..50]).unwrap(), 50);
        // rest of packet 1, then the failed read
        assert_eq!(r.read(&mut buf).unwrap(), 138);
        let e = r.read(&mut buf).unwrap_err();
        assert!(matches!(inner_error(&e), Some(Error::Sync)));

        // small buffer path
        assert_eq!(r.read(&mut buf[..100]).unwrap(), 100);
        assert_eq!(r.read(&mut buf[..100]).unwrap(), 88);
        assert_eq!(r.read(&mut buf[..10]).unwrap_err().kind(), io::ErrorKind::Other);
        assert_eq!(
            r.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }

    struct Datagrams(VecDeque<Vec<u8>>);

    impl RecvDatagram for Datagrams {
        fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(d) => {
                    let n = d.len().min(buf.len());
                    buf[..n].copy_from_slice(&d[..n]);
                    Ok(n)
                }
                None => Err(io::ErrorKind::UnexpectedEof.into()),
            }
        }
    }

    fn collect_pids<R: PacketReader>(mut r: R) -> Vec<u16> {
        let mut pkt = ArrayPacket::new();
        let mut pids = Vec::new();
        loop {
            match r.read_packet(&mut pkt) {
                Ok(()) => pids.push(pkt.pid()),
                Err(Error::EndOfStream) => return pids,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
    }

    #[test]
    fn test_datagram_reader() {
        let seven = numbered(7);
        let mut odd = vec![0xAA; 5];
        odd.extend_from_slice(&numbered(2));
        // partial packet at the end
        odd.extend_from_slice(&seven[..100]);

        let r = DatagramReader::new(Datagrams(VecDeque::from(vec![
            seven.clone(),
            Vec::new(),
            odd,
            seven,
        ])));
        assert_eq!(
            collect_pids(r),
            vec![0, 1, 2, 3, 4, 5, 6, 0, 1, 0, 1, 2, 3, 4, 5, 6]
        );
    }

    #[test]
    fn test_datagram_reader_udp() {
        let rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        rx.set_read_timeout(Some(std::time::Duration::from_secs(5)))
            .unwrap();
        let tx = UdpSocket::bind("127.0.0.1:0").unwrap();
        tx.connect(rx.local_addr().unwrap()).unwrap();
        let data = numbered(10);
        tx.send(&data[..7 * TS_PACKET_SIZE]).unwrap();
        tx.send(&data[7 * TS_PACKET_SIZE..]).unwrap();

        let mut r = DatagramReader::new(rx);
        let mut pkt = ArrayPacket::new();
        for pid in 0..10 {
            r.read_packet(&mut pkt).unwrap();
            assert_eq!(pkt.pid(), pid);
        }
    }
}
