//! The process logic of protocol layers.
//!
//! ## Layering
//!
//! Each protocol is split into two parts; the packet logic contained in `wire` and the processing
//! part in this module. An endpoint represents the local state of a protocol and is used to
//! process datagrams of that layer. Endpoints are open to modification between datagrams, similar
//! to reconfiguration on the OS level.
//!
//! * [`icmp`] answers echo requests by rewriting the request in place.
//! * [`tcp`] terminates connections: a table of sessions, each driving one instance of the
//!   connection state machine.
//!
//! ## Sending
//!
//! Layers never own a device. Everything they emit goes through a [`Transmit`] sink handed to
//! them for the duration of one call, together with the current time.
//!
//! [`icmp`]: icmp/index.html
//! [`tcp`]: tcp/index.html
//! [`Transmit`]: ../nic/trait.Transmit.html
use core::fmt;

pub mod icmp;
pub mod tcp;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The operation was not permitted.
    ///
    /// Returned when an endpoint is configured to refuse the operation.
    Illegal,

    /// The buffer provided is too small for the requested datagram.
    BadSize,

    /// There is no endpoint state to deliver the datagram to.
    ///
    /// A TCP segment without SYN for a connection that does not exist ends up here.
    Unreachable,

    /// The action could not be completed because there were not enough resources.
    ///
    /// The session table answers with this when it is at its ceiling.
    Exhausted,

    /// The datagram could not be parsed.
    Wire(crate::wire::Error),
}

/// Can convert from a wire error.
///
/// This indicates some layer tried to operate on a packet but failed.
impl From<crate::wire::Error> for Error {
    fn from(err: crate::wire::Error) -> Self {
        Error::Wire(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Illegal     => write!(f, "operation not permitted"),
            Error::BadSize     => write!(f, "buffer too small"),
            Error::Unreachable => write!(f, "no endpoint for datagram"),
            Error::Exhausted   => write!(f, "resources exhausted"),
            Error::Wire(err)   => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {}
