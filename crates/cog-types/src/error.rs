use thiserror::Error;

/// Errors produced by atom and atomspace operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("atomspace {0} is read-only")]
    ReadOnly(String),

    #[error("atom not found: {0}")]
    NotFound(String),

    #[error("atom {atom} still has {count} incoming links")]
    HasIncoming { atom: String, count: usize },
}

pub type TypeResult<T> = Result<T, TypeError>;
