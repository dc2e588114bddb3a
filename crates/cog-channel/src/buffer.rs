use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{ChannelError, ChannelResult};
use crate::message::{Message, MsgKey};

/// Counters kept by the buffer, reported through
/// [`ChannelStats`](crate::ChannelStats).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub queue_size: usize,
    pub busy: usize,
    pub draining: usize,
    pub items: u64,
    pub duplicates: u64,
    pub flushes: u64,
    pub drains: u64,
    pub drain_msec: u64,
    pub slowest_drain_msec: u64,
    pub concurrent_drains: u64,
    pub stalled: bool,
    pub failures: u64,
    pub low_watermark: usize,
    pub high_watermark: usize,
}

struct Queued {
    message: Message,
    ticket: u64,
    origin: u64,
}

/// An item handed to a worker.
pub struct Dispatch {
    pub ticket: u64,
    /// Ticket of the outermost request this one descends from; follow-up
    /// requests queued by reply handlers inherit their parent's origin.
    pub origin: u64,
    pub message: Message,
}

#[derive(Default)]
struct BufferState {
    pending: BTreeMap<MsgKey, Queued>,
    /// Origin of every ticket not yet completed, queued or in flight.
    outstanding: BTreeMap<u64, u64>,
    /// Multiset of the origins in `outstanding`.
    origins: BTreeMap<u64, usize>,
    next_ticket: u64,
    busy: usize,
    serial_in_flight: bool,
    stalling: bool,
    shutdown: bool,

    unreported: usize,
    first_failure: Option<String>,

    items: u64,
    duplicates: u64,
    flushes: u64,
    drains: u64,
    drain_time: Duration,
    slowest_drain: Duration,
    concurrent_drains: u64,
    in_drain: usize,
    failures: u64,
}

impl BufferState {
    fn release_origin(&mut self, origin: u64) {
        if let Some(count) = self.origins.get_mut(&origin) {
            *count -= 1;
            if *count == 0 {
                self.origins.remove(&origin);
            }
        }
    }

    fn retag(&mut self, ticket: u64, from: u64, to: u64) {
        self.release_origin(from);
        *self.origins.entry(to).or_insert(0) += 1;
        self.outstanding.insert(ticket, to);
    }
}

/// The pending-request set shared by producers and the worker pool.
///
/// Items are ordered by [`MsgKey`]: identical idempotent requests collapse
/// into one entry while sequenced requests keep submission order. Every
/// accepted item gets a ticket and an origin; barriers fence on origins, so
/// work queued by a reply handler counts as part of the request that
/// produced it.
pub struct MessageBuffer {
    state: Mutex<BufferState>,
    /// Signalled when work is inserted.
    work: Condvar,
    /// Signalled when a stall is lifted.
    space: Condvar,
    /// Signalled when an item is taken or completed.
    done: Condvar,
    low_watermark: usize,
    high_watermark: usize,
}

impl MessageBuffer {
    pub fn new(low_watermark: usize, high_watermark: usize) -> Self {
        Self {
            state: Mutex::new(BufferState::default()),
            work: Condvar::new(),
            space: Condvar::new(),
            done: Condvar::new(),
            low_watermark,
            high_watermark,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().expect("message buffer lock poisoned")
    }

    /// Queue a message. Returns `false` if it collapsed into an identical
    /// pending one.
    ///
    /// `origin` is the origin of the dispatch whose handler is queueing
    /// this message, if any. With `may_stall` set, blocks while the depth
    /// is above the high watermark until workers bring it back down to the
    /// low watermark.
    pub fn insert(&self, message: Message, origin: Option<u64>, may_stall: bool) -> ChannelResult<bool> {
        let mut state = self.lock();
        if state.shutdown {
            return Err(ChannelError::ShutDown);
        }
        if may_stall && state.pending.len() >= self.high_watermark {
            if !state.stalling {
                debug!(depth = state.pending.len(), "queue above high watermark; stalling producers");
            }
            state.stalling = true;
            while state.stalling && !state.shutdown {
                state = self.space.wait(state).expect("message buffer lock poisoned");
            }
            if state.shutdown {
                return Err(ChannelError::ShutDown);
            }
        }

        let key = message.key();
        if let Some(existing) = state.pending.get(&key).map(|q| (q.ticket, q.origin)) {
            state.duplicates += 1;
            // The survivor must satisfy the earliest fence either copy was under.
            if let Some(origin) = origin.filter(|&o| o < existing.1) {
                state.retag(existing.0, existing.1, origin);
                if let Some(q) = state.pending.get_mut(&key) {
                    q.origin = origin;
                }
            }
            return Ok(false);
        }
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        let origin = origin.unwrap_or(ticket);
        state.outstanding.insert(ticket, origin);
        *state.origins.entry(origin).or_insert(0) += 1;
        state.pending.insert(key, Queued { message, ticket, origin });
        state.items += 1;
        drop(state);
        self.work.notify_one();
        Ok(true)
    }

    /// Block until an item can be dispatched. Returns `None` once the
    /// buffer is shut down and empty.
    ///
    /// Serial items are held back while another serial item is in flight.
    pub fn take(&self) -> Option<Dispatch> {
        let mut state = self.lock();
        loop {
            let serial_busy = state.serial_in_flight;
            let key = state
                .pending
                .iter()
                .find(|(_, q)| !(serial_busy && q.message.is_serial()))
                .map(|(k, _)| k.clone());
            if let Some(key) = key {
                let Some(queued) = state.pending.remove(&key) else {
                    continue;
                };
                state.busy += 1;
                if queued.message.is_serial() {
                    state.serial_in_flight = true;
                }
                if state.stalling && state.pending.len() <= self.low_watermark {
                    state.stalling = false;
                    debug!(depth = state.pending.len(), "queue at low watermark; releasing producers");
                    self.space.notify_all();
                }
                drop(state);
                self.done.notify_all();
                return Some(Dispatch {
                    ticket: queued.ticket,
                    origin: queued.origin,
                    message: queued.message,
                });
            }
            if state.shutdown && state.pending.is_empty() {
                return None;
            }
            state = self.work.wait(state).expect("message buffer lock poisoned");
        }
    }

    /// Mark a taken item finished. `failure` carries the error text when
    /// dispatch or the reply handler failed.
    pub fn complete(&self, ticket: u64, serial: bool, failure: Option<String>) {
        let mut state = self.lock();
        state.busy = state.busy.saturating_sub(1);
        if serial {
            state.serial_in_flight = false;
        }
        if let Some(origin) = state.outstanding.remove(&ticket) {
            state.release_origin(origin);
        }
        if let Some(failure) = failure {
            state.failures += 1;
            state.unreported += 1;
            if state.first_failure.is_none() {
                state.first_failure = Some(failure);
            }
        }
        drop(state);
        // A finished serial item may unblock the next one.
        self.work.notify_all();
        self.done.notify_all();
    }

    /// Block until every item accepted before this call has completed,
    /// together with the follow-up work their handlers queued.
    ///
    /// Background failures recorded since the last barrier are returned
    /// as [`ChannelError::Background`] and then forgotten.
    pub fn barrier(&self) -> ChannelResult<()> {
        let start = Instant::now();
        let mut state = self.lock();
        let fence = state.next_ticket;
        if state.in_drain > 0 {
            state.concurrent_drains += 1;
        }
        state.in_drain += 1;
        while !state.shutdown && state.origins.first_key_value().is_some_and(|(&o, _)| o < fence) {
            state = self.done.wait(state).expect("message buffer lock poisoned");
        }
        state.in_drain -= 1;

        let elapsed = start.elapsed();
        state.drains += 1;
        state.drain_time += elapsed;
        if elapsed > state.slowest_drain {
            state.slowest_drain = elapsed;
        }

        if state.unreported > 0 {
            let count = std::mem::take(&mut state.unreported);
            let first = state.first_failure.take().unwrap_or_default();
            warn!(count, first = %first, "background requests failed before barrier");
            return Err(ChannelError::Background { count, first });
        }
        Ok(())
    }

    /// Block until every item accepted before this call, and any follow-up
    /// already queued for it, has been handed to a worker. Completion is not
    /// awaited.
    pub fn flush(&self) {
        let mut state = self.lock();
        let fence = state.next_ticket;
        while !state.shutdown && state.pending.values().any(|q| q.origin < fence) {
            state = self.done.wait(state).expect("message buffer lock poisoned");
        }
        state.flushes += 1;
    }

    /// Stop accepting work and wake every waiter. Items already queued are
    /// still handed out by [`take`](Self::take).
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.shutdown = true;
        state.stalling = false;
        drop(state);
        self.work.notify_all();
        self.space.notify_all();
        self.done.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> BufferStats {
        let state = self.lock();
        BufferStats {
            queue_size: state.pending.len(),
            busy: state.busy,
            draining: state.in_drain,
            items: state.items,
            duplicates: state.duplicates,
            flushes: state.flushes,
            drains: state.drains,
            drain_msec: state.drain_time.as_millis() as u64,
            slowest_drain_msec: state.slowest_drain.as_millis() as u64,
            concurrent_drains: state.concurrent_drains,
            stalled: state.stalling,
            failures: state.failures,
            low_watermark: self.low_watermark,
            high_watermark: self.high_watermark,
        }
    }

    /// Zero the cumulative counters. Queue contents are untouched.
    pub fn clear_stats(&self) {
        let mut state = self.lock();
        state.items = 0;
        state.duplicates = 0;
        state.flushes = 0;
        state.drains = 0;
        state.drain_time = Duration::ZERO;
        state.slowest_drain = Duration::ZERO;
        state.concurrent_drains = 0;
        state.failures = 0;
    }
}
