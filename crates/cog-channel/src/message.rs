use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ChannelResult;

/// Called once with the server's reply, or with the transport error that
/// prevented one. `Ok(None)` means the request expected no reply.
pub type Continuation = Box<dyn FnOnce(ChannelResult<Option<String>>) -> ChannelResult<()> + Send>;

/// How the buffer treats a request with respect to deduplication.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestClass {
    /// Safe to collapse with an identical pending request.
    Idempotent,
    /// A value increment; every instance counts and order matters.
    Delta,
    /// A server-side barrier marker.
    Barrier,
}

impl RequestClass {
    pub fn of(request: &str) -> Self {
        if request.starts_with("(cog-update-value!") {
            Self::Delta
        } else if request.starts_with("(cog-barrier)") {
            Self::Barrier
        } else {
            Self::Idempotent
        }
    }
}

static SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_sequence() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Buffer key. Idempotent requests key on their text; sequenced ones on
/// a process-wide sequence number, so they never collide.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum MsgKey {
    Content(String),
    Sequence(u64),
}

/// A queued request and what to do with its reply.
pub struct Message {
    request: String,
    sequence: u64,
    serial: bool,
    noreply: bool,
    handler: Option<Continuation>,
}

impl Message {
    pub fn new(request: impl Into<String>, handler: Continuation) -> Self {
        Self::build(request.into(), Some(handler), false)
    }

    /// A request whose reply is never read.
    pub fn noreply(request: impl Into<String>) -> Self {
        Self::build(request.into(), None, true)
    }

    /// Always sequenced, so never collapsed, but not ordered against deltas.
    pub(crate) fn unique(request: impl Into<String>, handler: Continuation) -> Self {
        let mut msg = Self::build(request.into(), Some(handler), false);
        if msg.sequence == 0 {
            msg.sequence = next_sequence();
        }
        msg
    }

    fn build(request: String, handler: Option<Continuation>, noreply: bool) -> Self {
        let class = RequestClass::of(&request);
        let sequence = match class {
            RequestClass::Idempotent => 0,
            RequestClass::Delta | RequestClass::Barrier => next_sequence(),
        };
        Self {
            request,
            sequence,
            serial: class == RequestClass::Delta,
            noreply,
            handler,
        }
    }

    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn class(&self) -> RequestClass {
        RequestClass::of(&self.request)
    }

    /// Zero for idempotent requests.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Deltas are dispatched one at a time in sequence order.
    pub fn is_serial(&self) -> bool {
        self.serial
    }

    pub fn expects_reply(&self) -> bool {
        !self.noreply
    }

    pub(crate) fn key(&self) -> MsgKey {
        if self.sequence == 0 {
            MsgKey::Content(self.request.clone())
        } else {
            MsgKey::Sequence(self.sequence)
        }
    }

    /// Run the continuation, if any.
    pub(crate) fn finish(&mut self, outcome: ChannelResult<Option<String>>) -> ChannelResult<()> {
        match self.handler.take() {
            Some(handler) => handler(outcome),
            None => outcome.map(|_| ()),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("request", &self.request.trim_end())
            .field("sequence", &self.sequence)
            .field("serial", &self.serial)
            .field("noreply", &self.noreply)
            .finish()
    }
}
