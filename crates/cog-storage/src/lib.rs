//! # cog-storage
//!
//! AtomSpace storage backend that talks to a remote CogServer over the
//! s-expression shell. Requests are formatted by [`requests`], sent
//! through a [`cog_channel::CogChannel`], and replies are decoded by
//! [`replies`] back into the local atomspace.
//!
//! ```no_run
//! use cog_storage::CogStorage;
//! use cog_types::{Atom, AtomSpace};
//!
//! # fn main() -> cog_storage::StorageResult<()> {
//! let storage = CogStorage::new("cog://localhost:17001")?;
//! storage.open()?;
//! storage.store_atom(&AtomSpace::new("local").add(Atom::node("ConceptNode", "cat"))?)?;
//! storage.barrier()?;
//! storage.close()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod frames;
pub mod replies;
pub mod requests;
pub mod storage;

#[cfg(test)]
mod mock;

pub use cog_channel::{ChannelConfig, ChannelStats, Handshake};
pub use error::{StorageError, StorageResult};
pub use frames::FrameCache;
pub use storage::{CogStorage, MONITOR_HEADER};
