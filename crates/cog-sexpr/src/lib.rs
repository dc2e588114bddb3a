//! S-expression codec for the CogServer wire protocol.
//!
//! Atoms travel as `(ConceptNode "cat")` and `(ListLink (...) (...))`,
//! values as `(FloatValue 1 2 3)` or `(stv 1 0)`, and atomspace frames as
//! nested `(AtomSpace "name" ...)` expressions. The storage backend builds
//! request lines from these encoders and decodes replies with the parsers.

pub mod decode;
pub mod encode;
pub mod error;
pub mod frame;

pub use decode::{decode_atom, decode_value, next_expr, skip_whitespace, NextExpr};
pub use encode::{encode_atom, encode_atom_values, encode_value, quote_string};
pub use error::{SexprError, SexprResult};
pub use frame::{decode_frame, encode_frame, FrameExpr};
