//! SOCKS4 wire format.
//!
//! Request (client to proxy):
//!
//! ```text
//! +----+----+----+----+----+----+----+----+----+----+....+----+
//! | VN | CD | DSTPORT |      DSTIP        | USERID       |NULL|
//! +----+----+----+----+----+----+----+----+----+----+....+----+
//!   1    1      2              4           variable       1
//! ```
//!
//! Reply (proxy to client):
//!
//! ```text
//! +----+----+----+----+----+----+----+----+
//! | VN | CD |  reserved (ignored)         |
//! +----+----+----+----+----+----+----+----+
//!   1    1               6
//! ```

use std::fmt;
use std::net::Ipv4Addr;

use crate::error::{Result, Socks4Error};

pub const SOCKS4_VERSION: u8 = 0x04;
pub const SOCKS4_CMD_CONNECT: u8 = 0x01;
pub const SOCKS4_REPLY_NULL: u8 = 0x00;
pub const SOCKS4_USER_ID_TERMINATOR: u8 = 0x00;

/// Size of a request carrying an empty user id.
pub const MIN_REQUEST_LEN: usize = 9;
/// Fixed size of a reply.
pub const REPLY_LEN: usize = 8;

const SOCKS4_REP_GRANTED: u8 = 0x5A;
const SOCKS4_REP_REJECTED: u8 = 0x5B;
const SOCKS4_REP_IDENTD_UNREACHABLE: u8 = 0x5C;
const SOCKS4_REP_IDENTD_MISMATCH: u8 = 0x5D;

/// Reply status reported by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// 0x5A: request granted
    Granted,
    /// 0x5B: request rejected or failed
    Rejected,
    /// 0x5C: client is not running identd, or it is unreachable from the proxy
    IdentdUnreachable,
    /// 0x5D: identd could not confirm the user id
    IdentdMismatch,
    /// Any other byte; never treated as success
    Unknown(u8),
}

impl StatusCode {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Granted => SOCKS4_REP_GRANTED,
            Self::Rejected => SOCKS4_REP_REJECTED,
            Self::IdentdUnreachable => SOCKS4_REP_IDENTD_UNREACHABLE,
            Self::IdentdMismatch => SOCKS4_REP_IDENTD_MISMATCH,
            Self::Unknown(code) => code,
        }
    }

    pub fn is_granted(self) -> bool {
        self == Self::Granted
    }

    /// Human-readable description of the status.
    pub fn description(self) -> &'static str {
        match self {
            Self::Granted => "request granted",
            Self::Rejected => "request rejected or failed",
            Self::IdentdUnreachable => "identd not running or unreachable",
            Self::IdentdMismatch => "identd could not confirm the user id",
            Self::Unknown(_) => "unrecognized status",
        }
    }
}

impl From<u8> for StatusCode {
    fn from(code: u8) -> Self {
        match code {
            SOCKS4_REP_GRANTED => Self::Granted,
            SOCKS4_REP_REJECTED => Self::Rejected,
            SOCKS4_REP_IDENTD_UNREACHABLE => Self::IdentdUnreachable,
            SOCKS4_REP_IDENTD_MISMATCH => Self::IdentdMismatch,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x} ({})", self.as_u8(), self.description())
    }
}

/// Parse a dotted-quad IPv4 literal. Hostnames are not resolved.
pub fn parse_ipv4(address: &str) -> Result<Ipv4Addr> {
    address
        .parse::<Ipv4Addr>()
        .map_err(|_| Socks4Error::InvalidAddress(format!("not an IPv4 literal: {:?}", address)))
}

/// Encode a CONNECT request with an empty user id.
pub fn encode_connect_request(address: &str, port: u16) -> Result<Vec<u8>> {
    let ip = parse_ipv4(address)?;
    Ok(ConnectRequest::new(ip, port).encode())
}

/// A SOCKS4 CONNECT request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    port: u16,
    address: Ipv4Addr,
    user_id: Vec<u8>,
}

impl ConnectRequest {
    /// Create a request with an empty user id.
    pub fn new(address: Ipv4Addr, port: u16) -> Self {
        Self {
            port,
            address,
            user_id: Vec::new(),
        }
    }

    /// Create a request carrying a user id. The id must not contain a NUL byte.
    pub fn with_user_id(address: Ipv4Addr, port: u16, user_id: impl Into<Vec<u8>>) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.contains(&SOCKS4_USER_ID_TERMINATOR) {
            return Err(Socks4Error::InvalidUserId(
                "user id must not contain a NUL byte".to_string(),
            ));
        }
        Ok(Self {
            port,
            address,
            user_id,
        })
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn user_id(&self) -> &[u8] {
        &self.user_id
    }

    pub fn encoded_len(&self) -> usize {
        MIN_REQUEST_LEN + self.user_id.len()
    }

    /// Encode the request into its wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut req = Vec::with_capacity(self.encoded_len());
        req.push(SOCKS4_VERSION);
        req.push(SOCKS4_CMD_CONNECT);
        req.extend_from_slice(&self.port.to_be_bytes());
        req.extend_from_slice(&self.address.octets());
        req.extend_from_slice(&self.user_id);
        req.push(SOCKS4_USER_ID_TERMINATOR);
        req
    }

    /// Decode a request from its wire form.
    ///
    /// The buffer must hold exactly one request; bytes after the terminator are an error.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < MIN_REQUEST_LEN {
            return Err(Socks4Error::Protocol(format!(
                "request too short: {} bytes",
                buf.len()
            )));
        }
        if buf[0] != SOCKS4_VERSION {
            return Err(Socks4Error::Protocol(format!(
                "unsupported SOCKS version: 0x{:02x}",
                buf[0]
            )));
        }
        if buf[1] != SOCKS4_CMD_CONNECT {
            return Err(Socks4Error::Protocol(format!(
                "unsupported command: 0x{:02x}",
                buf[1]
            )));
        }

        let port = u16::from_be_bytes([buf[2], buf[3]]);
        let address = Ipv4Addr::new(buf[4], buf[5], buf[6], buf[7]);

        let rest = &buf[8..];
        let end = rest
            .iter()
            .position(|&b| b == SOCKS4_USER_ID_TERMINATOR)
            .ok_or_else(|| Socks4Error::Protocol("user id is not terminated".to_string()))?;
        if end + 1 != rest.len() {
            return Err(Socks4Error::Protocol(format!(
                "{} trailing bytes after request",
                rest.len() - end - 1
            )));
        }

        Ok(Self {
            port,
            address,
            user_id: rest[..end].to_vec(),
        })
    }
}

/// A SOCKS4 reply. The reserved bytes are not retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectReply {
    status: StatusCode,
}

impl ConnectReply {
    pub fn new(status: StatusCode) -> Self {
        Self { status }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Decode a reply. Only the first two bytes are inspected.
    pub fn decode(buf: &[u8; REPLY_LEN]) -> Result<Self> {
        if buf[0] != SOCKS4_REPLY_NULL {
            return Err(Socks4Error::NotASocksProxy { first_byte: buf[0] });
        }
        Ok(Self {
            status: StatusCode::from(buf[1]),
        })
    }

    /// Encode the reply with zeroed reserved bytes.
    pub fn encode(&self) -> [u8; REPLY_LEN] {
        let mut buf = [0u8; REPLY_LEN];
        buf[0] = SOCKS4_REPLY_NULL;
        buf[1] = self.status.as_u8();
        buf
    }

    /// `Ok` if the proxy granted the request.
    pub fn into_result(self) -> Result<()> {
        if self.status.is_granted() {
            Ok(())
        } else {
            Err(Socks4Error::ConnectionRejected {
                code: self.status.as_u8(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_example_target() {
        let req = encode_connect_request("78.47.48.145", 80).unwrap();
        assert_eq!(
            req,
            vec![0x04, 0x01, 0x00, 0x50, 0x4E, 0x2F, 0x30, 0x91, 0x00]
        );
    }

    #[test]
    fn test_encode_port_is_big_endian() {
        let req = encode_connect_request("10.0.0.1", 0x1F90).unwrap();
        assert_eq!(req.len(), MIN_REQUEST_LEN);
        assert_eq!(&req[2..4], &[0x1F, 0x90]);
        assert_eq!(&req[4..8], &[10, 0, 0, 1]);
    }

    #[test]
    fn test_encode_port_bounds() {
        let req = encode_connect_request("0.0.0.0", 0).unwrap();
        assert_eq!(req, vec![0x04, 0x01, 0, 0, 0, 0, 0, 0, 0]);

        let req = encode_connect_request("255.255.255.255", u16::MAX).unwrap();
        assert_eq!(req, vec![0x04, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0]);
    }

    #[test]
    fn test_encode_rejects_non_ipv4() {
        for bad in ["example.com", "::1", "1.2.3", "256.1.1.1", "", " 1.2.3.4 ", "1.2.3.4\n"] {
            match encode_connect_request(bad, 80) {
                Err(Socks4Error::InvalidAddress(_)) => {}
                other => panic!("expected InvalidAddress for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_user_id_is_placed_before_terminator() {
        let req = ConnectRequest::with_user_id(Ipv4Addr::new(1, 2, 3, 4), 443, "alice").unwrap();
        let bytes = req.encode();
        assert_eq!(bytes.len(), req.encoded_len());
        assert_eq!(bytes.len(), MIN_REQUEST_LEN + 5);
        assert_eq!(&bytes[8..13], b"alice");
        assert_eq!(bytes[13], 0x00);
    }

    #[test]
    fn test_user_id_with_nul_rejected() {
        let result = ConnectRequest::with_user_id(Ipv4Addr::LOCALHOST, 80, b"a\0b".to_vec());
        assert!(matches!(result, Err(Socks4Error::InvalidUserId(_))));
    }

    #[test]
    fn test_decode_recovers_fields() {
        let addr = Ipv4Addr::new(192, 168, 1, 20);
        for port in [0u16, 1, 80, 255, 256, 8080, 65535] {
            let decoded = ConnectRequest::decode(&ConnectRequest::new(addr, port).encode()).unwrap();
            assert_eq!(decoded.address(), addr);
            assert_eq!(decoded.port(), port);
            assert!(decoded.user_id().is_empty());
        }
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(
            ConnectRequest::decode(&[0x04, 0x01, 0, 80]),
            Err(Socks4Error::Protocol(_))
        ));
        assert!(matches!(
            ConnectRequest::decode(&[0x05, 0x01, 0, 80, 1, 2, 3, 4, 0]),
            Err(Socks4Error::Protocol(_))
        ));
        assert!(matches!(
            ConnectRequest::decode(&[0x04, 0x02, 0, 80, 1, 2, 3, 4, 0]),
            Err(Socks4Error::Protocol(_))
        ));
        assert!(matches!(
            ConnectRequest::decode(&[0x04, 0x01, 0, 80, 1, 2, 3, 4, b'x']),
            Err(Socks4Error::Protocol(_))
        ));
        assert!(matches!(
            ConnectRequest::decode(&[0x04, 0x01, 0, 80, 1, 2, 3, 4, 0, 0]),
            Err(Socks4Error::Protocol(_))
        ));
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(StatusCode::from(0x5A), StatusCode::Granted);
        assert_eq!(StatusCode::from(0x5B), StatusCode::Rejected);
        assert_eq!(StatusCode::from(0x5C), StatusCode::IdentdUnreachable);
        assert_eq!(StatusCode::from(0x5D), StatusCode::IdentdMismatch);
        assert_eq!(StatusCode::from(0x99), StatusCode::Unknown(0x99));
        assert_eq!(StatusCode::Unknown(0x99).as_u8(), 0x99);
        assert!(!StatusCode::Unknown(0x00).is_granted());
    }

    #[test]
    fn test_reply_decode_ignores_reserved_bytes() {
        let reply = ConnectReply::decode(&[0x00, 0x5A, 0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02]).unwrap();
        assert_eq!(reply.status(), StatusCode::Granted);
        assert!(reply.into_result().is_ok());
    }

    #[test]
    fn test_reply_decode_non_null_first_byte() {
        match ConnectReply::decode(&[0x04, 0x5A, 0, 0, 0, 0, 0, 0]) {
            Err(Socks4Error::NotASocksProxy { first_byte }) => assert_eq!(first_byte, 0x04),
            other => panic!("expected NotASocksProxy, got {:?}", other),
        }
    }

    #[test]
    fn test_reply_rejections_carry_raw_code() {
        for code in [0x5B, 0x5C, 0x5D, 0x99, 0x00] {
            let reply = ConnectReply::decode(&[0x00, code, 0, 0, 0, 0, 0, 0]).unwrap();
            match reply.into_result() {
                Err(Socks4Error::ConnectionRejected { code: got }) => assert_eq!(got, code),
                other => panic!("expected ConnectionRejected, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_reply_encode() {
        let buf = ConnectReply::new(StatusCode::IdentdMismatch).encode();
        assert_eq!(buf, [0x00, 0x5D, 0, 0, 0, 0, 0, 0]);
    }
}
