use core::fmt;

use super::{Error, Result};

/// Internet protocol version.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Version {
    Ipv4,
    Ipv6,
}

impl Version {
    /// Return the version of an IP packet stored in the provided buffer.
    ///
    /// Unknown versions and empty buffers result in `Err(Error::Unrecognized)` and
    /// `Err(Error::Truncated)` respectively.
    pub fn of_packet(data: &[u8]) -> Result<Version> {
        match data.first().map(|byte| byte >> 4) {
            Some(4) => Ok(Version::Ipv4),
            Some(6) => Ok(Version::Ipv6),
            Some(_) => Err(Error::Unrecognized),
            None => Err(Error::Truncated),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Version::Ipv4 => write!(f, "IPv4"),
            Version::Ipv6 => write!(f, "IPv6"),
        }
    }
}

enum_with_unknown! {
    /// IP datagram encapsulated protocol.
    pub doc enum Protocol(u8) {
        /// Internet Control Message Protocol
        Icmp      = 0x01,
        /// Transmission Control Protocol
        Tcp       = 0x06,
        /// User Datagram Protocol
        Udp       = 0x11,
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::Icmp        => write!(f, "ICMP"),
            Protocol::Tcp         => write!(f, "TCP"),
            Protocol::Udp         => write!(f, "UDP"),
            Protocol::Unknown(id) => write!(f, "0x{:02x}", id)
        }
    }
}
