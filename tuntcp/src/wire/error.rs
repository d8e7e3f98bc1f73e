use core::fmt;

/// The error type for parsing of datagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The buffer is shorter than the header or length fields claim.
    Truncated,

    /// A checksum did not verify and the datagram was dropped.
    WrongChecksum,

    /// A protocol or message identifier is not one this crate knows of.
    ///
    /// IPv6 datagrams end up here, as does any IPv4 protocol other than ICMP and TCP.
    Unrecognized,

    /// The datagram was recognized but is self-contradictory.
    ///
    /// Examples: an IPv4 header length below 20 octets; a TCP data offset pointing past the end
    /// of the segment.
    Malformed,

    /// Parsing depends on a feature that is not implemented, such as IPv4 fragments.
    Unsupported,
}

/// The result type of the `wire` module.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Truncated     => write!(f, "truncated packet"),
            Error::WrongChecksum => write!(f, "checksum error"),
            Error::Unrecognized  => write!(f, "unrecognized packet"),
            Error::Unsupported   => write!(f, "unsupported option"),
            Error::Malformed     => write!(f, "malformed packet"),
        }
    }
}

impl std::error::Error for Error {}
