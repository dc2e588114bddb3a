use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("unknown URI '{0}'")]
    InvalidUri(String),

    #[error("unknown configuration {0}")]
    UnknownConfig(String),

    #[error("invalid channel configuration: {0}")]
    Config(String),

    #[error("unknown host {host}: {source}")]
    UnknownHost {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("unable to {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("cogserver unexpectedly closed connection")]
    ConnectionClosed,

    #[error("not connected to cogserver")]
    NotConnected,

    #[error("channel is shut down")]
    ShutDown,

    #[error("{0} called from a channel worker would deadlock")]
    Reentrant(&'static str),

    #[error("reply handler failed: {0}")]
    Handler(String),

    #[error("{count} background request(s) failed; first: {first}")]
    Background { count: usize, first: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ChannelError {
    pub(crate) fn transport(context: impl Into<String>, source: io::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source,
        }
    }
}

pub type ChannelResult<T> = Result<T, ChannelError>;
