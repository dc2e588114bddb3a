use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::config::ChannelConfig;
use crate::endpoint::Endpoint;
use crate::error::{ChannelError, ChannelResult};

/// Keep-alive filler the server may emit around replies.
pub const IDLE_BYTE: u8 = 0x16;

/// One TCP connection to the CogServer, owned by exactly one worker.
pub struct Connection {
    stream: Option<TcpStream>,
    peer: String,
    read_buffer_size: usize,
    open_socks: Arc<AtomicUsize>,
}

impl Connection {
    /// Connect to the first reachable address and run the handshake.
    pub fn open(
        endpoint: &Endpoint,
        addrs: &[SocketAddr],
        config: &ChannelConfig,
        open_socks: Arc<AtomicUsize>,
    ) -> ChannelResult<Self> {
        let stream = TcpStream::connect(addrs)
            .map_err(|e| ChannelError::transport(format!("connect to {endpoint}"), e))?;
        tune_socket(&stream);

        open_socks.fetch_add(1, Ordering::SeqCst);
        let mut conn = Self {
            stream: Some(stream),
            peer: format!("{}:{}", endpoint.host(), endpoint.port()),
            read_buffer_size: config.read_buffer_size,
            open_socks,
        };

        for line in config.handshake.lines() {
            conn.send(line)?;
            let banner = conn.recv(true)?;
            trace!(peer = %conn.peer, line = line.trim_end(), banner = %banner.trim_end(), "handshake");
        }
        debug!(peer = %conn.peer, "connection opened");
        Ok(conn)
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Write one request line.
    pub fn send(&mut self, request: &str) -> ChannelResult<()> {
        let stream = self.stream.as_mut().ok_or(ChannelError::NotConnected)?;
        stream
            .write_all(request.as_bytes())
            .map_err(|e| ChannelError::transport(format!("talk to cogserver at {}", self.peer), e))
    }

    /// Read one reply.
    ///
    /// A banner read returns the first non-idle chunk as-is; otherwise
    /// chunks accumulate until one ends in a newline.
    pub fn recv(&mut self, expect_banner: bool) -> ChannelResult<String> {
        let stream = self.stream.as_mut().ok_or(ChannelError::NotConnected)?;
        let mut buf = vec![0u8; self.read_buffer_size];
        let read = read_reply(stream, &mut buf, expect_banner);
        read.map_err(|e| self.read_failed(e))
    }

    fn read_failed(&mut self, err: ReadError) -> ChannelError {
        match err {
            ReadError::Closed => {
                self.close();
                ChannelError::ConnectionClosed
            }
            ReadError::Io(e) => {
                ChannelError::transport(format!("read from cogserver at {}", self.peer), e)
            }
        }
    }

    /// Shut the socket down; later sends fail with `NotConnected`.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            self.open_socks.fetch_sub(1, Ordering::SeqCst);
            debug!(peer = %self.peer, "connection closed");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

fn tune_socket(stream: &TcpStream) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!(error = %e, "unable to set TCP_NODELAY");
    }
    #[cfg(target_os = "linux")]
    if let Err(e) = socket2::SockRef::from(stream).set_quickack(true) {
        warn!(error = %e, "unable to set TCP_QUICKACK");
    }
}

#[derive(Debug)]
enum ReadError {
    Closed,
    Io(io::Error),
}

fn strip_idle(chunk: &[u8]) -> &[u8] {
    let start = chunk.iter().position(|&b| b != IDLE_BYTE).unwrap_or(chunk.len());
    let end = chunk.iter().rposition(|&b| b != IDLE_BYTE).map_or(start, |p| p + 1);
    &chunk[start..end]
}

fn read_reply<R: Read>(reader: &mut R, buf: &mut [u8], expect_banner: bool) -> Result<String, ReadError> {
    let mut reply: Vec<u8> = Vec::new();
    loop {
        let n = match reader.read(buf) {
            Ok(0) => return Err(ReadError::Closed),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ReadError::Io(e)),
        };
        let chunk = strip_idle(&buf[..n]);
        if chunk.is_empty() {
            continue;
        }
        reply.extend_from_slice(chunk);
        if reply.ends_with(b"\n") || (expect_banner && reply.len() == chunk.len()) {
            return Ok(String::from_utf8_lossy(&reply).into_owned());
        }
    }
}
