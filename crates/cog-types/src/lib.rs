//! Foundation types for the CogServer storage backend.
//!
//! This crate provides the small graph model the backend reads from and
//! writes into. Every other `cog-*` crate depends on `cog-types`.
//!
//! # Key Types
//!
//! - [`Atom`]: Immutable node or link, identified by type and content
//! - [`Value`]: Typed datum attachable to an atom under a key atom
//! - [`Handle`]: Shared reference to an atom plus its key/value table
//! - [`AtomSpace`]: In-memory interning table of handles, optionally read-only

pub mod atom;
pub mod error;
pub mod handle;
pub mod space;
pub mod value;

pub use atom::Atom;
pub use error::{TypeError, TypeResult};
pub use handle::Handle;
pub use space::AtomSpace;
pub use value::Value;
