//! socks4-dialer - SOCKS4 CONNECT client for Rust
//!
//! This library tunnels TCP connections through a SOCKS4 proxy:
//! - Request encoding and reply decoding for the SOCKS4 CONNECT exchange
//! - A handshake that runs over any `Read + Write` (or tokio) transport
//! - A `Socks4` outbound that dials the proxy itself
//!
//! Only IPv4 targets are supported; SOCKS4a, SOCKS5 and BIND are not.
//!
//! # Example
//!
//! ```rust
//! use socks4_dialer::encode_connect_request;
//!
//! let request = encode_connect_request("78.47.48.145", 80).unwrap();
//! assert_eq!(request, [0x04, 0x01, 0x00, 0x50, 0x4E, 0x2F, 0x30, 0x91, 0x00]);
//! ```
//!
//! Over an established connection to the proxy:
//!
//! ```no_run
//! use std::io::{Read, Write};
//! use std::net::TcpStream;
//!
//! let proxy = TcpStream::connect("127.0.0.1:1080")?;
//! let mut conn = socks4_dialer::connect_via_socks4(proxy, "78.47.48.145", 80)?;
//! conn.write_all(b"GET / HTTP/1.0\r\nHost: bithalde.de\r\n\r\n")?;
//! let mut buf = [0u8; 42];
//! conn.read(&mut buf)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Errors
//!
//! | Error | Raised when |
//! |-------|-------------|
//! | `InvalidAddress` | Target is not an IPv4 literal (before any I/O) |
//! | `Transport` | The transport failed or closed mid-handshake |
//! | `NotASocksProxy` | Reply's first byte is not `0x00` |
//! | `ConnectionRejected` | Reply status is anything but `0x5A` |

pub mod error;
pub mod handshake;
pub mod outbound;
pub mod protocol;

pub use error::{ErrorKind, Result, Socks4Error};
pub use handshake::{connect_via_socks4, perform_handshake, perform_handshake_with_user_id};
pub use protocol::{encode_connect_request, ConnectReply, ConnectRequest, StatusCode};

#[cfg(feature = "async")]
pub use handshake::{
    connect_via_socks4_async, perform_handshake_async, perform_handshake_with_user_id_async,
};

// Re-export outbound types
pub use outbound::{
    Addr, Outbound, ResolveInfo, Socks4, StdTcpConn, TcpConn, DEFAULT_DIALER_TIMEOUT,
    DEFAULT_HANDSHAKE_TIMEOUT,
};

#[cfg(feature = "async")]
pub use outbound::{AsyncOutbound, AsyncTcpConn, TokioTcpConn};

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Read, Write};
    use std::net::Ipv4Addr;

    struct Scripted {
        reply: Cursor<Vec<u8>>,
        sent: Vec<u8>,
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reply.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.sent.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_full_workflow() {
        let mut reply = ConnectReply::new(StatusCode::Granted).encode().to_vec();
        reply.extend_from_slice(b"HTTP/1.0 200 OK\r\n");
        let conn = Scripted {
            reply: Cursor::new(reply),
            sent: Vec::new(),
        };

        let mut conn = connect_via_socks4(conn, "78.47.48.145", 80).unwrap();

        let request = ConnectRequest::decode(&conn.sent).unwrap();
        assert_eq!(request.address(), Ipv4Addr::new(78, 47, 48, 145));
        assert_eq!(request.port(), 80);

        conn.write_all(b"GET / HTTP/1.0\r\nHost: bithalde.de\r\n\r\n")
            .unwrap();
        let mut status_line = String::new();
        conn.read_to_string(&mut status_line).unwrap();
        assert_eq!(status_line, "HTTP/1.0 200 OK\r\n");
    }
}
