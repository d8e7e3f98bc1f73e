//! Encapsulates the queues datagrams are exchanged on.
//!
//! A [`Channel`] is one bidirectional queue of raw IPv4 datagrams, such as a single queue of a
//! multi-queue TUN device or the in-memory [`Loopback`]. Reads are non-blocking: a channel with
//! nothing pending answers `Ok(None)` instead of waiting. [`Transmit`] is the send half seen by
//! the connection layers, which never act on delivery failures.
//!
//! [`Channel`]: trait.Channel.html
//! [`Loopback`]: loopback/struct.Loopback.html
//! [`Transmit`]: trait.Transmit.html
use std::io;

pub mod loopback;

#[cfg(feature = "std")]
#[path = "sys/mod.rs"]
mod sys_internal;

#[cfg(feature = "std")]
pub use self::sys_internal::exports as sys;

pub use self::loopback::Loopback;

/// A queue of raw IPv4 datagrams.
pub trait Channel {
    /// Read one datagram into `buffer`, if one is pending.
    ///
    /// Returns the length of the datagram. Datagrams longer than the buffer are truncated.
    fn recv(&mut self, buffer: &mut [u8]) -> io::Result<Option<usize>>;

    /// Write one datagram, returning the number of octets written.
    fn send(&mut self, datagram: &[u8]) -> io::Result<usize>;
}

/// A sink for outgoing datagrams.
///
/// Sending is fire-and-forget: failures are logged and otherwise dropped, the same as a loss on
/// the link would be.
pub trait Transmit {
    fn transmit(&mut self, datagram: &[u8]);
}

impl<C: Channel + ?Sized> Transmit for C {
    fn transmit(&mut self, datagram: &[u8]) {
        match self.send(datagram) {
            Ok(len) if len == datagram.len() => (),
            Ok(len) => net_debug!("short write of {} out of {} octets", len, datagram.len()),
            Err(err) => net_debug!("dropping outgoing datagram: {}", err),
        }
    }
}

impl<C: Channel + ?Sized> Channel for &'_ mut C {
    fn recv(&mut self, buffer: &mut [u8]) -> io::Result<Option<usize>> {
        (**self).recv(buffer)
    }

    fn send(&mut self, datagram: &[u8]) -> io::Result<usize> {
        (**self).send(datagram)
    }
}
