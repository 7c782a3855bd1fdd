//! SOCKS4 proxy outbound implementation.
//!
//! Connects to targets through a SOCKS4 proxy server.

use std::net::{IpAddr, SocketAddr, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, Socks4Error};
use crate::handshake;
use crate::protocol::ConnectRequest;

use super::{Addr, Outbound, StdTcpConn, TcpConn, DEFAULT_DIALER_TIMEOUT};

#[cfg(feature = "async")]
use std::io;

#[cfg(feature = "async")]
use async_trait::async_trait;
#[cfg(feature = "async")]
use tokio::net::{TcpSocket as TokioTcpSocket, TcpStream as TokioTcpStream};
#[cfg(feature = "async")]
use super::{AsyncOutbound, AsyncTcpConn, TokioTcpConn};

/// Default deadline for the request/reply exchange with the proxy.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// SOCKS4 proxy outbound.
///
/// SOCKS4 only carries IPv4 targets. The target is taken from the IPv4 in
/// ResolveInfo if present, otherwise Host must be an IPv4 literal.
pub struct Socks4 {
    /// Proxy server address
    addr: String,
    /// User id sent in the request (empty by default)
    user_id: Vec<u8>,
    /// Local address to bind before connecting to the proxy
    bind_ip: Option<IpAddr>,
    /// Connection timeout
    timeout: Duration,
    /// Read/write deadline while the handshake is in flight
    handshake_timeout: Duration,
}

impl Socks4 {
    /// Create a new SOCKS4 outbound.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            user_id: Vec::new(),
            bind_ip: None,
            timeout: DEFAULT_DIALER_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Set the user id sent to the proxy.
    pub fn with_user_id(mut self, user_id: impl Into<Vec<u8>>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Set connection timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the deadline for the handshake exchange.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Bind the local side of the proxy connection to `ip`.
    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = Some(ip);
        self
    }

    /// Both deadlines must be non-zero.
    fn check_timeouts(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Socks4Error::Config(
                "connection timeout must be non-zero".to_string(),
            ));
        }
        if self.handshake_timeout.is_zero() {
            return Err(Socks4Error::Config(
                "handshake timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    fn proxy_addr(&self) -> Result<SocketAddr> {
        self.addr
            .parse()
            .map_err(|e| Socks4Error::Config(format!("Invalid proxy address {:?}: {}", self.addr, e)))
    }

    /// Local address to bind, checked against the proxy's address family.
    fn bind_addr(&self, proxy: &SocketAddr) -> Result<Option<SocketAddr>> {
        match self.bind_ip {
            None => Ok(None),
            Some(ip) if ip.is_ipv4() == proxy.is_ipv4() => Ok(Some(SocketAddr::new(ip, 0))),
            Some(ip) => Err(Socks4Error::Config(format!(
                "bind address {} does not match proxy address family of {}",
                ip, proxy
            ))),
        }
    }

    fn build_request(&self, addr: &Addr) -> Result<ConnectRequest> {
        let ip = addr.ipv4()?;
        if self.user_id.is_empty() {
            Ok(ConnectRequest::new(ip, addr.port))
        } else {
            ConnectRequest::with_user_id(ip, addr.port, self.user_id.clone())
        }
    }

    /// Connect to the proxy server.
    fn dial(&self) -> Result<TcpStream> {
        let proxy = self.proxy_addr()?;
        let bind = self.bind_addr(&proxy)?;

        let stream = match bind {
            Some(local) => {
                let socket = socket2::Socket::new(
                    socket2::Domain::for_address(proxy),
                    socket2::Type::STREAM,
                    Some(socket2::Protocol::TCP),
                )?;
                socket.bind(&local.into())?;
                socket.connect_timeout(&proxy.into(), self.timeout)?;
                TcpStream::from(socket)
            }
            None => TcpStream::connect_timeout(&proxy, self.timeout)?,
        };

        debug!(proxy = %proxy, "connected to SOCKS4 proxy");
        Ok(stream)
    }

    /// Async: Connect to the proxy server.
    #[cfg(feature = "async")]
    async fn async_dial(&self) -> Result<TokioTcpStream> {
        let proxy = self.proxy_addr()?;
        let bind = self.bind_addr(&proxy)?;

        let stream = tokio::time::timeout(self.timeout, connect_tokio(proxy, bind))
            .await
            .map_err(|_| timed_out("Connection timeout"))??;

        debug!(proxy = %proxy, "connected to SOCKS4 proxy");
        Ok(stream)
    }
}

#[cfg(feature = "async")]
async fn connect_tokio(proxy: SocketAddr, bind: Option<SocketAddr>) -> io::Result<TokioTcpStream> {
    match bind {
        Some(local) => {
            let socket = if proxy.is_ipv4() {
                TokioTcpSocket::new_v4()?
            } else {
                TokioTcpSocket::new_v6()?
            };
            socket.bind(local)?;
            socket.connect(proxy).await
        }
        None => TokioTcpStream::connect(proxy).await,
    }
}

#[cfg(feature = "async")]
fn timed_out(message: &str) -> Socks4Error {
    Socks4Error::Transport(io::Error::new(io::ErrorKind::TimedOut, message.to_string()))
}

impl Outbound for Socks4 {
    fn dial_tcp(&self, addr: &mut Addr) -> Result<Box<dyn TcpConn>> {
        self.check_timeouts()?;
        let request = self.build_request(addr)?;
        let mut stream = self.dial()?;

        stream.set_read_timeout(Some(self.handshake_timeout))?;
        stream.set_write_timeout(Some(self.handshake_timeout))?;

        handshake::exchange(&mut stream, &request)?;

        stream.set_read_timeout(None)?;
        stream.set_write_timeout(None)?;

        Ok(Box::new(StdTcpConn::new(stream)))
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl AsyncOutbound for Socks4 {
    async fn dial_tcp(&self, addr: &mut Addr) -> Result<Box<dyn AsyncTcpConn>> {
        self.check_timeouts()?;
        let request = self.build_request(addr)?;
        let mut stream = self.async_dial().await?;

        tokio::time::timeout(
            self.handshake_timeout,
            handshake::exchange_async(&mut stream, &request),
        )
        .await
        .map_err(|_| timed_out("Handshake timeout"))??;

        Ok(Box::new(TokioTcpConn::new(stream)))
    }
}
