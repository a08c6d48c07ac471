//! SOCKS5 type definitions
//!
//! Defines the core types used in SOCKS5 protocol handling.

use super::consts::*;
use crate::error::ParseError;
use bytes::{BufMut, BytesMut};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// SOCKS protocol versions the engine recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    /// SOCKS4, recognized only to be rejected
    V4,
    /// SOCKS5
    V5,
}

impl ProtocolVersion {
    /// Parse a version byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS4_VERSION => Some(ProtocolVersion::V4),
            SOCKS5_VERSION => Some(ProtocolVersion::V5),
            _ => None,
        }
    }

    /// Convert to version byte
    pub fn to_byte(self) -> u8 {
        match self {
            ProtocolVersion::V4 => SOCKS4_VERSION,
            ProtocolVersion::V5 => SOCKS5_VERSION,
        }
    }
}

/// SOCKS5 command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksCommand {
    /// TCP CONNECT - establish a TCP connection to target
    Connect,
    /// TCP BIND - wait for incoming connection
    Bind,
    /// UDP ASSOCIATE - establish UDP relay
    UdpAssociate,
}

impl SocksCommand {
    /// Parse a command byte into SocksCommand
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_CMD_TCP_CONNECT => Some(SocksCommand::Connect),
            SOCKS5_CMD_TCP_BIND => Some(SocksCommand::Bind),
            SOCKS5_CMD_UDP_ASSOCIATE => Some(SocksCommand::UdpAssociate),
            _ => None,
        }
    }

    /// Convert SocksCommand to byte
    pub fn to_byte(self) -> u8 {
        match self {
            SocksCommand::Connect => SOCKS5_CMD_TCP_CONNECT,
            SocksCommand::Bind => SOCKS5_CMD_TCP_BIND,
            SocksCommand::UdpAssociate => SOCKS5_CMD_UDP_ASSOCIATE,
        }
    }
}

impl fmt::Display for SocksCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksCommand::Connect => write!(f, "CONNECT"),
            SocksCommand::Bind => write!(f, "BIND"),
            SocksCommand::UdpAssociate => write!(f, "UDP ASSOCIATE"),
        }
    }
}

/// Address type field (ATYP)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    /// Four byte IPv4 address
    Ipv4,
    /// Length-prefixed domain name
    DomainName,
    /// Sixteen byte IPv6 address
    Ipv6,
}

impl AddressType {
    /// Parse an address type byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_ADDR_TYPE_IPV4 => Some(AddressType::Ipv4),
            SOCKS5_ADDR_TYPE_DOMAIN => Some(AddressType::DomainName),
            SOCKS5_ADDR_TYPE_IPV6 => Some(AddressType::Ipv6),
            _ => None,
        }
    }

    /// Convert to address type byte
    pub fn to_byte(self) -> u8 {
        match self {
            AddressType::Ipv4 => SOCKS5_ADDR_TYPE_IPV4,
            AddressType::DomainName => SOCKS5_ADDR_TYPE_DOMAIN,
            AddressType::Ipv6 => SOCKS5_ADDR_TYPE_IPV6,
        }
    }
}

/// Target address for SOCKS5 requests
///
/// Represents the destination address in a SOCKS5 request, or the bound
/// address in a reply. Can be an IP address (v4 or v6) or a domain name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetAddr {
    /// IP address with port
    Ip(SocketAddr),
    /// Domain name with port
    Domain(String, u16),
}

impl TargetAddr {
    /// Create a new TargetAddr from an IPv4 address and port
    pub fn ipv4(ip: Ipv4Addr, port: u16) -> Self {
        TargetAddr::Ip(SocketAddr::new(IpAddr::V4(ip), port))
    }

    /// Create a new TargetAddr from an IPv6 address and port
    pub fn ipv6(ip: Ipv6Addr, port: u16) -> Self {
        TargetAddr::Ip(SocketAddr::new(IpAddr::V6(ip), port))
    }

    /// Create a new TargetAddr from a domain name and port
    pub fn domain(domain: impl Into<String>, port: u16) -> Self {
        TargetAddr::Domain(domain.into(), port)
    }

    /// The all-zero IPv4 address used when no bound address is known
    pub fn unspecified() -> Self {
        TargetAddr::ipv4(Ipv4Addr::UNSPECIFIED, 0)
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        match self {
            TargetAddr::Ip(addr) => addr.port(),
            TargetAddr::Domain(_, port) => *port,
        }
    }

    /// Get the address type of this address
    pub fn address_type(&self) -> AddressType {
        match self {
            TargetAddr::Ip(SocketAddr::V4(_)) => AddressType::Ipv4,
            TargetAddr::Ip(SocketAddr::V6(_)) => AddressType::Ipv6,
            TargetAddr::Domain(_, _) => AddressType::DomainName,
        }
    }

    /// Resolve the address to every matching SocketAddr
    ///
    /// For IP addresses, this returns immediately.
    /// For domain names, this performs DNS resolution.
    pub async fn resolve_all(&self) -> std::io::Result<Vec<SocketAddr>> {
        match self {
            TargetAddr::Ip(addr) => Ok(vec![*addr]),
            TargetAddr::Domain(domain, port) => {
                let resolved: Vec<SocketAddr> =
                    tokio::net::lookup_host((domain.as_str(), *port)).await?.collect();
                if resolved.is_empty() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("no addresses found for domain: {}", domain),
                    ));
                }
                Ok(resolved)
            }
        }
    }

    /// Append ATYP, address and port in wire format
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u8(self.address_type().to_byte());
        match self {
            TargetAddr::Ip(SocketAddr::V4(addr)) => buf.put_slice(&addr.ip().octets()),
            TargetAddr::Ip(SocketAddr::V6(addr)) => buf.put_slice(&addr.ip().octets()),
            TargetAddr::Domain(domain, _) => {
                // Domain names longer than a length byte can hold are cut
                let name = &domain.as_bytes()[..domain.len().min(MAX_DOMAIN_LEN)];
                buf.put_u8(name.len() as u8);
                buf.put_slice(name);
            }
        }
        buf.put_u16(self.port());
    }

    /// Decode ATYP, address and port starting at `frame[offset]`
    ///
    /// Returns the address and the offset just past the port.
    pub fn decode(frame: &[u8], offset: usize) -> Result<(Self, usize), ParseError> {
        ensure_len(frame, offset + 1)?;
        let atyp = frame[offset];
        let start = offset + 1;

        match AddressType::from_byte(atyp) {
            Some(AddressType::Ipv4) => {
                let end = start + 4 + 2;
                ensure_len(frame, end)?;
                let mut octets = [0u8; 4];
                octets.copy_from_slice(&frame[start..start + 4]);
                let port = read_port(frame, start + 4);
                Ok((TargetAddr::ipv4(Ipv4Addr::from(octets), port), end))
            }
            Some(AddressType::DomainName) => {
                ensure_len(frame, start + 1)?;
                let len = frame[start] as usize;
                if len == 0 {
                    return Err(ParseError::InvalidDomain);
                }
                let name_start = start + 1;
                let end = name_start + len + 2;
                ensure_len(frame, end)?;
                let domain = std::str::from_utf8(&frame[name_start..name_start + len])
                    .map_err(|_| ParseError::InvalidDomain)?;
                let port = read_port(frame, name_start + len);
                Ok((TargetAddr::domain(domain, port), end))
            }
            Some(AddressType::Ipv6) => {
                let end = start + 16 + 2;
                ensure_len(frame, end)?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&frame[start..start + 16]);
                let port = read_port(frame, start + 16);
                Ok((TargetAddr::ipv6(Ipv6Addr::from(octets), port), end))
            }
            None => Err(ParseError::UnknownAddressType(atyp)),
        }
    }
}

pub(crate) fn ensure_len(frame: &[u8], expected: usize) -> Result<(), ParseError> {
    if frame.len() < expected {
        return Err(ParseError::Truncated {
            expected,
            actual: frame.len(),
        });
    }
    Ok(())
}

fn read_port(frame: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([frame[at], frame[at + 1]])
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ip(addr) => write!(f, "{}", addr),
            TargetAddr::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

impl From<SocketAddr> for TargetAddr {
    fn from(addr: SocketAddr) -> Self {
        TargetAddr::Ip(addr)
    }
}

impl Default for TargetAddr {
    fn default() -> Self {
        TargetAddr::unspecified()
    }
}

/// A parsed client request
///
/// Produced once per session, before any outward connection is dialed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Protocol version of the request frame
    pub version: ProtocolVersion,
    /// Requested command
    pub command: SocksCommand,
    /// Destination address and port
    pub destination: TargetAddr,
}

impl Request {
    /// Create a new request
    pub fn new(command: SocksCommand, destination: TargetAddr) -> Self {
        Request {
            version: ProtocolVersion::V5,
            command,
            destination,
        }
    }

    /// Address type of the destination
    pub fn address_type(&self) -> AddressType {
        self.destination.address_type()
    }

    /// Destination port
    pub fn destination_port(&self) -> u16 {
        self.destination.port()
    }

    /// `host:port` form of the destination, for logging
    pub fn destination_string(&self) -> String {
        self.destination.to_string()
    }
}
