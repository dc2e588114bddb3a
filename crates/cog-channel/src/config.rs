use serde::{Deserialize, Serialize};

use crate::error::{ChannelError, ChannelResult};

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_LOW_WATERMARK: usize = 256;
pub const DEFAULT_HIGH_WATERMARK: usize = 1024;
pub const DEFAULT_READ_BUFFER: usize = 4096;

/// How a freshly opened connection switches the server into raw
/// S-expression mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handshake {
    /// `sexpr\n`, then discard the banner.
    #[default]
    Sexpr,
    /// `scm hush\n`, discard the prompt, then `(cog-set-server-mode! #t)\n`.
    Scheme,
}

impl Handshake {
    /// Request lines sent, in order; each is followed by one discarded reply.
    pub fn lines(self) -> &'static [&'static str] {
        match self {
            Self::Sexpr => &["sexpr\n"],
            Self::Scheme => &["scm hush\n", "(cog-set-server-mode! #t)\n"],
        }
    }
}

/// Configuration for a [`CogChannel`](crate::CogChannel).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Number of worker threads, each owning one connection.
    pub workers: usize,
    /// Queue depth at which stalled producers are released.
    pub low_watermark: usize,
    /// Queue depth at which producers start to stall.
    pub high_watermark: usize,
    /// Bytes requested per socket read.
    pub read_buffer_size: usize,
    pub handshake: Handshake,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            low_watermark: DEFAULT_LOW_WATERMARK,
            high_watermark: DEFAULT_HIGH_WATERMARK,
            read_buffer_size: DEFAULT_READ_BUFFER,
            handshake: Handshake::default(),
        }
    }
}

impl ChannelConfig {
    pub fn validate(&self) -> ChannelResult<()> {
        if self.workers == 0 {
            return Err(ChannelError::Config("at least one worker is required".into()));
        }
        if self.high_watermark == 0 || self.low_watermark > self.high_watermark {
            return Err(ChannelError::Config(format!(
                "watermarks must satisfy low <= high and high > 0 (low {}, high {})",
                self.low_watermark, self.high_watermark
            )));
        }
        if self.read_buffer_size == 0 {
            return Err(ChannelError::Config("read buffer size must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ChannelConfig::default();
        assert_eq!(c.workers, 4);
        assert_eq!(c.low_watermark, 256);
        assert_eq!(c.high_watermark, 1024);
        assert_eq!(c.read_buffer_size, 4096);
        assert_eq!(c.handshake, Handshake::Sexpr);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn invalid_configs_rejected() {
        let c = ChannelConfig { workers: 0, ..Default::default() };
        assert!(matches!(c.validate(), Err(ChannelError::Config(_))));
        let c = ChannelConfig { low_watermark: 10, high_watermark: 5, ..Default::default() };
        assert!(matches!(c.validate(), Err(ChannelError::Config(_))));
        let c = ChannelConfig { read_buffer_size: 0, ..Default::default() };
        assert!(matches!(c.validate(), Err(ChannelError::Config(_))));
    }

    #[test]
    fn handshake_lines() {
        assert_eq!(Handshake::Sexpr.lines(), &["sexpr\n"]);
        assert_eq!(
            Handshake::Scheme.lines(),
            &["scm hush\n", "(cog-set-server-mode! #t)\n"]
        );
    }

    #[test]
    fn partial_config_from_json() {
        let c: ChannelConfig =
            serde_json::from_str(r#"{"workers": 2, "handshake": "scheme"}"#).unwrap();
        assert_eq!(c.workers, 2);
        assert_eq!(c.handshake, Handshake::Scheme);
        assert_eq!(c.high_watermark, DEFAULT_HIGH_WATERMARK);
    }
}
