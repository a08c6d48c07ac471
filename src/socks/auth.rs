//! SOCKS5 greeting and method negotiation
//!
//! Parses the client's greeting and builds the method selection reply.
//! Only "no authentication required" is ever selected.

use super::consts::*;
use super::types::ensure_len;
use crate::error::ParseError;

/// Authentication method types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMethod {
    /// No authentication required
    NoAuthenticationRequired,
    /// GSSAPI
    Gssapi,
    /// Username/password authentication
    UsernamePassword,
    /// No acceptable methods
    NoAcceptableMethods,
    /// Any other method code offered by the client
    Other(u8),
}

impl AuthMethod {
    /// Convert to SOCKS5 method byte
    pub fn to_byte(self) -> u8 {
        match self {
            AuthMethod::NoAuthenticationRequired => SOCKS5_AUTH_METHOD_NONE,
            AuthMethod::Gssapi => SOCKS5_AUTH_METHOD_GSSAPI,
            AuthMethod::UsernamePassword => SOCKS5_AUTH_METHOD_PASSWORD,
            AuthMethod::NoAcceptableMethods => SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE,
            AuthMethod::Other(byte) => byte,
        }
    }

    /// Parse from SOCKS5 method byte
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            SOCKS5_AUTH_METHOD_NONE => AuthMethod::NoAuthenticationRequired,
            SOCKS5_AUTH_METHOD_GSSAPI => AuthMethod::Gssapi,
            SOCKS5_AUTH_METHOD_PASSWORD => AuthMethod::UsernamePassword,
            SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE => AuthMethod::NoAcceptableMethods,
            other => AuthMethod::Other(other),
        }
    }
}

/// Client greeting
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 1 to 255 |
/// +----+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Raw version byte; validated by the handshake, not the parser
    pub version: u8,
    /// Offered methods, in the order the client sent them
    pub methods: Vec<AuthMethod>,
}

impl Header {
    /// Whether the client offered `method`
    pub fn offers(&self, method: AuthMethod) -> bool {
        self.methods.contains(&method)
    }

    /// Number of bytes the greeting occupies on the wire
    pub fn encoded_len(&self) -> usize {
        GREETING_HEADER_LEN + self.methods.len()
    }
}

/// Parse a greeting frame
///
/// Bytes after the announced methods are ignored; see
/// [`Header::encoded_len`] to find where they start.
pub fn parse_header(frame: &[u8]) -> Result<Header, ParseError> {
    ensure_len(frame, GREETING_HEADER_LEN)?;

    let version = frame[0];
    let num_methods = frame[1] as usize;
    let end = GREETING_HEADER_LEN + num_methods;
    ensure_len(frame, end)?;

    let methods = frame[GREETING_HEADER_LEN..end]
        .iter()
        .copied()
        .map(AuthMethod::from_byte)
        .collect();

    Ok(Header { version, methods })
}

/// Select the method to use for this greeting
pub fn select_method(header: &Header) -> Option<AuthMethod> {
    if header.offers(AuthMethod::NoAuthenticationRequired) {
        Some(AuthMethod::NoAuthenticationRequired)
    } else {
        None
    }
}

/// Build the two byte method selection reply
pub fn method_selection(method: AuthMethod) -> [u8; 2] {
    [SOCKS5_VERSION, method.to_byte()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_method_bytes() {
        assert_eq!(AuthMethod::NoAuthenticationRequired.to_byte(), 0x00);
        assert_eq!(AuthMethod::UsernamePassword.to_byte(), 0x02);
        assert_eq!(AuthMethod::from_byte(0x00), AuthMethod::NoAuthenticationRequired);
        assert_eq!(AuthMethod::from_byte(0x01), AuthMethod::Gssapi);
        assert_eq!(AuthMethod::from_byte(0x80), AuthMethod::Other(0x80));
        assert_eq!(AuthMethod::Other(0x80).to_byte(), 0x80);
    }

    #[test]
    fn test_parse_header_no_auth() {
        let header = parse_header(&[0x05, 0x01, 0x00]).unwrap();
        assert_eq!(header.version, 5);
        assert_eq!(header.methods, vec![AuthMethod::NoAuthenticationRequired]);
        assert_eq!(header.encoded_len(), 3);
    }

    #[test]
    fn test_parse_header_tolerates_unknown_methods() {
        let header = parse_header(&[0x05, 0x03, 0x80, 0x02, 0x00]).unwrap();
        assert_eq!(
            header.methods,
            vec![
                AuthMethod::Other(0x80),
                AuthMethod::UsernamePassword,
                AuthMethod::NoAuthenticationRequired
            ]
        );
        assert_eq!(select_method(&header), Some(AuthMethod::NoAuthenticationRequired));
    }

    #[test]
    fn test_parse_header_keeps_foreign_version() {
        let header = parse_header(&[0x04, 0x01, 0x00]).unwrap();
        assert_eq!(header.version, 4);
    }

    #[test]
    fn test_parse_header_ignores_trailing_bytes() {
        let frame = [0x05, 0x01, 0x00, 0x05, 0x01];
        let header = parse_header(&frame).unwrap();
        assert_eq!(header.encoded_len(), 3);
        assert_eq!(&frame[header.encoded_len()..], &[0x05, 0x01]);
    }

    #[test]
    fn test_parse_header_truncated() {
        assert_eq!(
            parse_header(&[0x05]),
            Err(ParseError::Truncated {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            parse_header(&[0x05, 0x03, 0x00]),
            Err(ParseError::Truncated {
                expected: 5,
                actual: 3
            })
        );
    }

    #[test]
    fn test_parse_header_zero_methods() {
        let header = parse_header(&[0x05, 0x00]).unwrap();
        assert!(header.methods.is_empty());
        assert_eq!(select_method(&header), None);
    }

    #[test]
    fn test_select_method_requires_no_auth() {
        let header = parse_header(&[0x05, 0x02, 0x01, 0x02]).unwrap();
        assert_eq!(select_method(&header), None);
    }

    #[test]
    fn test_method_selection() {
        assert_eq!(
            method_selection(AuthMethod::NoAuthenticationRequired),
            [0x05, 0x00]
        );
    }
}
