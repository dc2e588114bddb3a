use cog_channel::ChannelError;
use cog_sexpr::SexprError;
use cog_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage {0} is already open")]
    AlreadyOpen(String),

    #[error("storage {0} is not open")]
    NotOpen(String),

    #[error("frame name {0} is already used by a different atomspace")]
    FrameConflict(String),

    #[error("malformed reply: {0}")]
    Malformed(String),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("s-expression error: {0}")]
    Sexpr(#[from] SexprError),

    #[error("atomspace error: {0}")]
    Types(#[from] TypeError),
}

impl StorageError {
    /// Reply handlers report through the channel's error type.
    pub(crate) fn into_handler(self) -> ChannelError {
        match self {
            Self::Channel(e) => e,
            other => ChannelError::Handler(other.to_string()),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
