//! SOCKS4 CONNECT handshake over a caller-supplied transport.
//!
//! The exchange is strictly: send request, await the 8-byte reply, then either
//! hand the transport back (granted) or fail. The transport is never closed here
//! and no deadline is imposed; set one on the transport if you need it.

use std::io::{Read, Write};
use std::net::Ipv4Addr;

use tracing::{debug, trace};

use crate::error::Result;
use crate::protocol::{parse_ipv4, ConnectReply, ConnectRequest, REPLY_LEN};

#[cfg(feature = "async")]
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Perform the CONNECT handshake and return the transport, positioned right
/// after the reply.
///
/// Pass `&mut stream` to keep ownership of the stream when the handshake fails.
pub fn perform_handshake<S: Read + Write>(transport: S, address: Ipv4Addr, port: u16) -> Result<S> {
    exchange(transport, &ConnectRequest::new(address, port))
}

/// Same as [`perform_handshake`], sending a non-empty user id.
pub fn perform_handshake_with_user_id<S: Read + Write>(
    transport: S,
    address: Ipv4Addr,
    port: u16,
    user_id: &[u8],
) -> Result<S> {
    let request = ConnectRequest::with_user_id(address, port, user_id)?;
    exchange(transport, &request)
}

/// Works like a direct connect, but through the SOCKS4 proxy already on the
/// other end of `proxy_transport`.
///
/// `target_ip` must be an IPv4 literal; it is checked before any I/O happens.
pub fn connect_via_socks4<S: Read + Write>(
    proxy_transport: S,
    target_ip: &str,
    target_port: u16,
) -> Result<S> {
    let address = parse_ipv4(target_ip)?;
    perform_handshake(proxy_transport, address, target_port)
}

pub(crate) fn exchange<S: Read + Write>(mut transport: S, request: &ConnectRequest) -> Result<S> {
    debug!(
        target_addr = %request.address(),
        target_port = request.port(),
        "sending SOCKS4 CONNECT"
    );

    // write_all/read_exact retry short transfers and EINTR
    transport.write_all(&request.encode())?;
    transport.flush()?;

    let mut reply = [0u8; REPLY_LEN];
    transport.read_exact(&mut reply)?;
    trace!(reply = ?reply, "SOCKS4 reply received");

    check_reply(&reply)?;
    Ok(transport)
}

fn check_reply(reply: &[u8; REPLY_LEN]) -> Result<()> {
    let result = ConnectReply::decode(reply).and_then(ConnectReply::into_result);
    match &result {
        Ok(()) => debug!("SOCKS4 request granted"),
        Err(e) => debug!(error = %e, "SOCKS4 handshake failed"),
    }
    result
}

/// Async: perform the CONNECT handshake and return the transport.
#[cfg(feature = "async")]
pub async fn perform_handshake_async<S>(transport: S, address: Ipv4Addr, port: u16) -> Result<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    exchange_async(transport, &ConnectRequest::new(address, port)).await
}

/// Async: same as [`perform_handshake_async`], sending a non-empty user id.
#[cfg(feature = "async")]
pub async fn perform_handshake_with_user_id_async<S>(
    transport: S,
    address: Ipv4Addr,
    port: u16,
    user_id: &[u8],
) -> Result<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = ConnectRequest::with_user_id(address, port, user_id)?;
    exchange_async(transport, &request).await
}

/// Async: see [`connect_via_socks4`].
#[cfg(feature = "async")]
pub async fn connect_via_socks4_async<S>(
    proxy_transport: S,
    target_ip: &str,
    target_port: u16,
) -> Result<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let address = parse_ipv4(target_ip)?;
    perform_handshake_async(proxy_transport, address, target_port).await
}

#[cfg(feature = "async")]
pub(crate) async fn exchange_async<S>(mut transport: S, request: &ConnectRequest) -> Result<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!(
        target_addr = %request.address(),
        target_port = request.port(),
        "sending SOCKS4 CONNECT"
    );

    transport.write_all(&request.encode()).await?;
    transport.flush().await?;

    let mut reply = [0u8; REPLY_LEN];
    transport.read_exact(&mut reply).await?;
    trace!(reply = ?reply, "SOCKS4 reply received");

    check_reply(&reply)?;
    Ok(transport)
}
