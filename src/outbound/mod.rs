//! Outbound connection implementations.
//!
//! `Socks4` dials a SOCKS4 proxy, runs the CONNECT handshake and hands back a
//! connection that behaves like a direct TCP connection to the target.

use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::{Result, Socks4Error};
use crate::protocol::parse_ipv4;

#[cfg(feature = "async")]
use async_trait::async_trait;
#[cfg(feature = "async")]
use tokio::io::{AsyncRead, AsyncWrite};

mod socks4;

pub use socks4::{Socks4, DEFAULT_HANDSHAKE_TIMEOUT};

/// Default dialer timeout
pub const DEFAULT_DIALER_TIMEOUT: Duration = Duration::from_secs(10);

/// Target address with optional DNS resolution info.
#[derive(Debug, Clone)]
pub struct Addr {
    /// Hostname or IP address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Optional DNS resolution result
    pub resolve_info: Option<ResolveInfo>,
}

impl Addr {
    /// Create a new Addr
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            resolve_info: None,
        }
    }

    /// Create an Addr from a SocketAddr, pre-populating resolve info.
    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        let resolve_info = match addr.ip() {
            IpAddr::V4(v4) => ResolveInfo::from_ipv4(v4),
            IpAddr::V6(v6) => ResolveInfo::from_ipv6(v6),
        };
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
            resolve_info: Some(resolve_info),
        }
    }

    /// Create a new Addr with resolve info
    pub fn with_resolve_info(mut self, info: ResolveInfo) -> Self {
        self.resolve_info = Some(info);
        self
    }

    /// The IPv4 address to put on the wire.
    ///
    /// A resolved IPv4 in ResolveInfo wins; otherwise Host must be an IPv4
    /// literal, parsed by the same strict rule as [`parse_ipv4`]. No DNS
    /// lookup is made here.
    pub fn ipv4(&self) -> Result<Ipv4Addr> {
        if let Some(ipv4) = self.resolve_info.as_ref().and_then(|info| info.ipv4) {
            return Ok(ipv4);
        }
        parse_ipv4(&self.host).map_err(|_| {
            Socks4Error::InvalidAddress(format!("SOCKS4 requires an IPv4 target, got {}", self))
        })
    }
}

impl std::fmt::Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// DNS resolution results supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct ResolveInfo {
    /// Resolved IPv4 address, if any
    pub ipv4: Option<Ipv4Addr>,
    /// Resolved IPv6 address, if any
    pub ipv6: Option<Ipv6Addr>,
}

impl ResolveInfo {
    /// Create ResolveInfo from IPv4 address
    pub fn from_ipv4(ipv4: Ipv4Addr) -> Self {
        Self {
            ipv4: Some(ipv4),
            ipv6: None,
        }
    }

    /// Create ResolveInfo from IPv6 address
    pub fn from_ipv6(ipv6: Ipv6Addr) -> Self {
        Self {
            ipv4: None,
            ipv6: Some(ipv6),
        }
    }
}

/// Outbound connection interface.
pub trait Outbound: Send + Sync {
    /// Establish a TCP connection to the given address.
    fn dial_tcp(&self, addr: &mut Addr) -> Result<Box<dyn TcpConn>>;
}

/// Async outbound connection interface.
#[cfg(feature = "async")]
#[async_trait]
pub trait AsyncOutbound: Send + Sync {
    /// Establish an async TCP connection to the given address.
    async fn dial_tcp(&self, addr: &mut Addr) -> Result<Box<dyn AsyncTcpConn>>;
}

/// TCP connection interface.
pub trait TcpConn: Read + Write + Send + Sync {
    /// Get the local address
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Get the peer address (the proxy, for tunneled connections)
    fn peer_addr(&self) -> io::Result<SocketAddr>;

    /// Set read timeout
    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()>;

    /// Set write timeout
    fn set_write_timeout(&self, dur: Option<Duration>) -> io::Result<()>;

    /// Shutdown the connection
    fn shutdown(&self, how: std::net::Shutdown) -> io::Result<()>;
}

/// Async TCP connection interface.
#[cfg(feature = "async")]
pub trait AsyncTcpConn: AsyncRead + AsyncWrite + Send + Sync + Unpin {
    /// Get the local address
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Get the peer address (the proxy, for tunneled connections)
    fn peer_addr(&self) -> io::Result<SocketAddr>;
}

/// Standard TcpStream wrapper implementing TcpConn
pub struct StdTcpConn {
    inner: TcpStream,
}

impl StdTcpConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { inner: stream }
    }
}

impl Read for StdTcpConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for StdTcpConn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl TcpConn for StdTcpConn {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.inner.peer_addr()
    }

    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        self.inner.set_read_timeout(dur)
    }

    fn set_write_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        self.inner.set_write_timeout(dur)
    }

    fn shutdown(&self, how: std::net::Shutdown) -> io::Result<()> {
        self.inner.shutdown(how)
    }
}

/// Tokio TcpStream wrapper implementing AsyncTcpConn
#[cfg(feature = "async")]
pub struct TokioTcpConn {
    inner: tokio::net::TcpStream,
}

#[cfg(feature = "async")]
impl TokioTcpConn {
    pub fn new(stream: tokio::net::TcpStream) -> Self {
        Self { inner: stream }
    }
}

#[cfg(feature = "async")]
impl AsyncRead for TokioTcpConn {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::pin::Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

#[cfg(feature = "async")]
impl AsyncWrite for TokioTcpConn {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<io::Result<usize>> {
        std::pin::Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::pin::Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::pin::Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(feature = "async")]
impl AsyncTcpConn for TokioTcpConn {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.inner.peer_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addr_from_socket_addr_v4() {
        let sock_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)), 8080);
        let addr = Addr::from_socket_addr(sock_addr);

        assert_eq!(addr.host, "192.168.1.1");
        assert_eq!(addr.port, 8080);
        assert_eq!(addr.ipv4().unwrap(), Ipv4Addr::new(192, 168, 1, 1));
    }

    #[test]
    fn test_addr_ipv4_from_literal() {
        let addr = Addr::new("78.47.48.145", 80);
        assert!(addr.resolve_info.is_none());
        assert_eq!(addr.ipv4().unwrap(), Ipv4Addr::new(78, 47, 48, 145));
    }

    #[test]
    fn test_addr_ipv4_prefers_resolve_info() {
        let addr = Addr::new("bithalde.de", 80)
            .with_resolve_info(ResolveInfo::from_ipv4(Ipv4Addr::new(78, 47, 48, 145)));
        assert_eq!(addr.ipv4().unwrap(), Ipv4Addr::new(78, 47, 48, 145));
    }

    #[test]
    fn test_addr_ipv4_rejects_hostname() {
        let addr = Addr::new("example.com", 80);
        match addr.ipv4() {
            Err(Socks4Error::InvalidAddress(msg)) => assert!(msg.contains("example.com:80")),
            other => panic!("expected InvalidAddress, got {:?}", other),
        }
    }

    #[test]
    fn test_addr_ipv4_rejects_ipv6_only() {
        let sock_addr = SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 443);
        let addr = Addr::from_socket_addr(sock_addr);
        assert_eq!(
            addr.resolve_info.as_ref().unwrap().ipv6,
            Some(Ipv6Addr::LOCALHOST)
        );
        assert!(matches!(addr.ipv4(), Err(Socks4Error::InvalidAddress(_))));
    }

    #[test]
    fn test_addr_ipv4_rejects_padded_literal() {
        for host in [" 1.2.3.4 ", "1.2.3.4 ", "\t1.2.3.4"] {
            let addr = Addr::new(host, 80);
            assert!(
                matches!(addr.ipv4(), Err(Socks4Error::InvalidAddress(_))),
                "accepted {:?}",
                host
            );
            assert_eq!(
                addr.ipv4().is_ok(),
                parse_ipv4(host).is_ok(),
                "Addr::ipv4 and parse_ipv4 disagree on {:?}",
                host
            );
        }
    }

    #[test]
    fn test_addr_display() {
        let addr = Addr::new("10.0.0.1", 443);
        assert_eq!(format!("{}", addr), "10.0.0.1:443");
    }
}
