use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SexprError {
    #[error("unexpected end of input at offset {pos}")]
    UnexpectedEnd { pos: usize },

    #[error("expected {expected} at offset {pos}, found {found:?}")]
    Unexpected {
        pos: usize,
        expected: &'static str,
        found: char,
    },

    #[error("bad number {token:?} at offset {pos}")]
    BadNumber { pos: usize, token: String },

    #[error("unterminated string starting at offset {pos}")]
    UnterminatedString { pos: usize },
}

pub type SexprResult<T> = Result<T, SexprError>;
