use std::fmt;

use serde::Serialize;

use crate::buffer::BufferStats;

/// Point-in-time snapshot of a channel's queue and connection counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub open_sockets: usize,
    pub uri: String,
    pub queue_size: usize,
    pub busy_workers: usize,
    pub workers: usize,
    pub draining: bool,
    pub messages: u64,
    pub duplicates: u64,
    pub flushes: u64,
    pub drains: u64,
    pub drain_msec: u64,
    pub slowest_drain_msec: u64,
    pub concurrent_drains: u64,
    pub low_watermark: usize,
    pub high_watermark: usize,
    pub stalled: bool,
    pub failures: u64,
}

impl ChannelStats {
    pub(crate) fn new(uri: &str, open_sockets: usize, workers: usize, buffer: BufferStats) -> Self {
        Self {
            open_sockets,
            uri: uri.to_string(),
            queue_size: buffer.queue_size,
            busy_workers: buffer.busy,
            workers,
            draining: buffer.draining > 0,
            messages: buffer.items,
            duplicates: buffer.duplicates,
            flushes: buffer.flushes,
            drains: buffer.drains,
            drain_msec: buffer.drain_msec,
            slowest_drain_msec: buffer.slowest_drain_msec,
            concurrent_drains: buffer.concurrent_drains,
            low_watermark: buffer.low_watermark,
            high_watermark: buffer.high_watermark,
            stalled: buffer.stalled,
            failures: buffer.failures,
        }
    }
}

impl fmt::Display for ChannelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Open socks: {}  Connected to: {}", self.open_sockets, self.uri)?;
        write!(
            f,
            "Queue size: {}  Busy: {}/{}",
            self.queue_size, self.busy_workers, self.workers
        )?;
        if self.draining {
            f.write_str(" Draining now")?;
        }
        writeln!(f)?;
        writeln!(f, "Messages: {}  Duplicates: {}", self.messages, self.duplicates)?;
        writeln!(f, "Flush count: {}  Drains: {}", self.flushes, self.drains)?;
        writeln!(
            f,
            "Drain time (msec): {}  Slowest (msec): {}  Concurrent: {}",
            self.drain_msec, self.slowest_drain_msec, self.concurrent_drains
        )?;
        writeln!(
            f,
            "Low/High watermarks: {}/{}  Stalled: {}",
            self.low_watermark, self.high_watermark, self.stalled
        )?;
        writeln!(f, "Failed requests: {}", self.failures)
    }
}
