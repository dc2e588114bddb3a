use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};

use serde::{Deserialize, Serialize};

use crate::error::{ChannelError, ChannelResult};

pub const URI_SCHEME: &str = "cog://";
pub const DEFAULT_PORT: u16 = 17001;

/// A parsed `cog://host[:port][/name][?arg&arg...]` URI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    uri: String,
    host: String,
    port: u16,
    name: Option<String>,
}

impl Endpoint {
    /// Parse a storage URI.
    ///
    /// Query arguments are split on `&`; none are defined, so any `?`
    /// suffix is rejected, even an empty one.
    pub fn parse(uri: &str) -> ChannelResult<Self> {
        let rest = uri
            .strip_prefix(URI_SCHEME)
            .ok_or_else(|| ChannelError::InvalidUri(uri.to_string()))?;

        let (location, query) = match rest.split_once('?') {
            Some((loc, q)) => (loc, Some(q)),
            None => (rest, None),
        };
        if let Some(query) = query {
            let arg = query.split('&').find(|a| !a.is_empty()).unwrap_or_default();
            return Err(ChannelError::UnknownConfig(arg.to_string()));
        }

        let (authority, name) = match location.split_once('/') {
            Some((auth, name)) if !name.is_empty() => (auth, Some(name.to_string())),
            Some((auth, _)) => (auth, None),
            None => (location, None),
        };

        let (host, port) = split_host_port(authority)
            .ok_or_else(|| ChannelError::InvalidUri(uri.to_string()))?;
        if host.is_empty() {
            return Err(ChannelError::InvalidUri(uri.to_string()));
        }

        Ok(Self {
            uri: uri.to_string(),
            host: host.to_string(),
            port,
            name,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The optional atomspace name following the authority.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Resolve the host to socket addresses.
    pub fn resolve(&self) -> ChannelResult<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| ChannelError::UnknownHost {
                host: self.host.clone(),
                source,
            })?
            .collect();
        if addrs.is_empty() {
            return Err(ChannelError::UnknownHost {
                host: self.host.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"),
            });
        }
        Ok(addrs)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Split `host`, `host:port`, `[v6]` or `[v6]:port`.
fn split_host_port(authority: &str) -> Option<(&str, u16)> {
    if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, rest) = bracketed.split_once(']')?;
        return match rest.strip_prefix(':') {
            Some(port) => Some((host, port.parse().ok()?)),
            None if rest.is_empty() => Some((host, DEFAULT_PORT)),
            None => None,
        };
    }
    match authority.split_once(':') {
        Some((host, port)) => Some((host, port.parse().ok()?)),
        None => Some((authority, DEFAULT_PORT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_only() {
        let e = Endpoint::parse("cog://localhost").unwrap();
        assert_eq!(e.host(), "localhost");
        assert_eq!(e.port(), DEFAULT_PORT);
        assert_eq!(e.name(), None);
        assert_eq!(e.uri(), "cog://localhost");
    }

    #[test]
    fn parse_port_and_name() {
        let e = Endpoint::parse("cog://10.0.0.2:18001/genome").unwrap();
        assert_eq!(e.host(), "10.0.0.2");
        assert_eq!(e.port(), 18001);
        assert_eq!(e.name(), Some("genome"));
    }

    #[test]
    fn parse_name_without_port() {
        let e = Endpoint::parse("cog://example.org/space").unwrap();
        assert_eq!(e.port(), DEFAULT_PORT);
        assert_eq!(e.name(), Some("space"));
    }

    #[test]
    fn parse_ipv6() {
        let e = Endpoint::parse("cog://[::1]:17002").unwrap();
        assert_eq!(e.host(), "::1");
        assert_eq!(e.port(), 17002);
        assert_eq!(Endpoint::parse("cog://[::1]").unwrap().port(), DEFAULT_PORT);
    }

    #[test]
    fn wrong_scheme_rejected() {
        let err = Endpoint::parse("rocks:///tmp/foo").unwrap_err();
        assert!(matches!(err, ChannelError::InvalidUri(_)));
    }

    #[test]
    fn bad_port_rejected() {
        assert!(matches!(
            Endpoint::parse("cog://localhost:http"),
            Err(ChannelError::InvalidUri(_))
        ));
        assert!(matches!(
            Endpoint::parse("cog://:17001"),
            Err(ChannelError::InvalidUri(_))
        ));
    }

    #[test]
    fn query_arguments_rejected() {
        let err = Endpoint::parse("cog://localhost/as?nthreads=8&sync").unwrap_err();
        match err {
            ChannelError::UnknownConfig(arg) => assert_eq!(arg, "nthreads=8"),
            other => panic!("unexpected error: {other}"),
        }
        match Endpoint::parse("cog://localhost?") {
            Err(ChannelError::UnknownConfig(arg)) => assert!(arg.is_empty()),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn resolve_loopback() {
        let e = Endpoint::parse("cog://127.0.0.1:17001").unwrap();
        let addrs = e.resolve().unwrap();
        assert_eq!(addrs[0], "127.0.0.1:17001".parse::<SocketAddr>().unwrap());
    }
}
