//! Request/reply channel between the storage backend and a remote CogServer.
//!
//! Requests are single S-expression lines; each gets one newline-terminated
//! reply. The [`CogChannel`] owns a fixed pool of worker threads, each with
//! its own lazily opened [`Connection`], draining a shared deduplicating
//! [`MessageBuffer`]. Identical idempotent requests that are still pending
//! collapse into one; value deltas and barrier markers carry sequence numbers
//! and are never collapsed.

pub mod buffer;
pub mod channel;
pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use buffer::{BufferStats, Dispatch, MessageBuffer};
pub use channel::CogChannel;
pub use config::{ChannelConfig, Handshake};
pub use connection::{Connection, IDLE_BYTE};
pub use endpoint::{Endpoint, DEFAULT_PORT, URI_SCHEME};
pub use error::{ChannelError, ChannelResult};
pub use message::{Continuation, Message, RequestClass};
pub use stats::ChannelStats;
