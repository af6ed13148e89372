//! Packet pump: a producer thread feeding a packet queue.
//!
//! The pump reads packets from any [`PacketReader`], keeps those passing
//! the configured PID filter and hands them to the consumer through a
//! [`packet_queue`]. Synchronization losses and overflows are counted and
//! the read is retried; the queue is closed when the source ends, so the
//! consumer sees [`Error::EndOfStream`] after draining it.

use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::config::DemuxConfig;
use crate::error::{Error, Result};
use crate::queue::{packet_queue, PacketQueueReader};
use crate::ts::{ArrayPacket, PacketReader, PidFilter, ANY_PID};

/// Counters reported by the pump thread when it stops.
#[derive(Debug, Default)]
pub struct PumpStats {
    /// Packets handed to the consumer.
    pub packets: u64,
    /// Reads that failed with [`Error::Sync`].
    pub sync_errors: u64,
    /// Reads that failed with [`Error::Overflow`].
    pub overflows: u64,
    /// Why the pump stopped, if not because the source ended or the
    /// consumer went away.
    pub error: Option<Error>,
}

/// Starts the pump thread.
///
/// Returns the read end of the packet queue and a handle yielding the
/// pump's statistics. The pump stops when the source ends, the queue's
/// read end is dropped, more than `max_sync_retries` consecutive reads
/// fail to synchronize, or the source reports any other error.
///
/// # Panics
/// If `config.queue_len` is zero.
pub fn spawn_pump<R>(
    source: R,
    config: &DemuxConfig,
) -> Result<(PacketQueueReader, JoinHandle<PumpStats>)>
where
    R: PacketReader + Send + 'static,
{
    let pids = if config.passes_all() {
        vec![ANY_PID]
    } else {
        config.pids.clone()
    };
    let max_sync_retries = config.max_sync_retries;
    let (mut writer, reader) = packet_queue(config.queue_len);

    let handle = thread::Builder::new()
        .name("dvbts-pump".to_string())
        .spawn(move || {
            let mut src = PidFilter::new(source, &pids);
            let mut pkt = Box::new(ArrayPacket::new());
            let mut stats = PumpStats::default();
            let mut sync_run = 0u32;
            info!("[Pump] Started, PIDs: {:?}", src.pids());

            loop {
                match src.read_packet(pkt.as_mut()) {
                    Ok(()) => {
                        sync_run = 0;
                        if writer.exchange(&mut pkt).is_err() {
                            debug!("[Pump] Consumer gone");
                            break;
                        }
                        stats.packets += 1;
                    }
                    Err(Error::Sync) => {
                        stats.sync_errors += 1;
                        sync_run += 1;
                        if sync_run > max_sync_retries {
                            warn!(
                                "[Pump] No synchronization after {} attempts, giving up",
                                sync_run
                            );
                            stats.error = Some(Error::Sync);
                            break;
                        }
                    }
                    Err(Error::Overflow) => stats.overflows += 1,
                    Err(Error::EndOfStream) => {
                        debug!("[Pump] End of stream");
                        break;
                    }
                    Err(e) => {
                        warn!("[Pump] Read error: {}", e);
                        stats.error = Some(e);
                        break;
                    }
                }
            }

            writer.close();
            info!(
                "[Pump] Stopped: {} packets, {} sync errors, {} overflows",
                stats.packets, stats.sync_errors, stats.overflows
            );
            stats
        })?;

    Ok((reader, handle))
}
