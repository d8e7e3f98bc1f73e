//! Implementation of a software channel backed by memory.
use std::collections::VecDeque;
use std::io;

use super::Channel;

/// An in-memory channel.
///
/// Datagrams injected with [`inject`] are handed out by `recv` in order, datagrams written by
/// `send` are kept until collected with [`pop_sent`]. Tests use it in place of a TUN queue.
///
/// [`inject`]: #method.inject
/// [`pop_sent`]: #method.pop_sent
#[derive(Debug, Default)]
pub struct Loopback {
    inbound: VecDeque<Vec<u8>>,
    outbound: VecDeque<Vec<u8>>,
    closed: bool,
}

impl Loopback {
    pub fn new() -> Self {
        Loopback::default()
    }

    /// Queue a datagram to be received.
    pub fn inject(&mut self, datagram: impl Into<Vec<u8>>) {
        self.inbound.push_back(datagram.into());
    }

    /// Take the oldest datagram that was sent.
    pub fn pop_sent(&mut self) -> Option<Vec<u8>> {
        self.outbound.pop_front()
    }

    /// Take all sent datagrams.
    pub fn drain_sent(&mut self) -> Vec<Vec<u8>> {
        self.outbound.drain(..).collect()
    }

    /// The number of datagrams sent and not yet collected.
    pub fn sent_len(&self) -> usize {
        self.outbound.len()
    }

    /// The number of injected datagrams not yet received.
    pub fn pending_len(&self) -> usize {
        self.inbound.len()
    }

    /// Make every following operation fail, as on a descriptor that was closed.
    pub fn close(&mut self) {
        self.closed = true;
    }

    fn check_open(&self) -> io::Result<()> {
        if self.closed {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "loopback closed"))
        } else {
            Ok(())
        }
    }
}

impl Channel for Loopback {
    fn recv(&mut self, buffer: &mut [u8]) -> io::Result<Option<usize>> {
        self.check_open()?;
        let datagram = match self.inbound.pop_front() {
            Some(datagram) => datagram,
            None => return Ok(None),
        };
        let len = datagram.len().min(buffer.len());
        buffer[..len].copy_from_slice(&datagram[..len]);
        Ok(Some(len))
    }

    fn send(&mut self, datagram: &[u8]) -> io::Result<usize> {
        self.check_open()?;
        self.outbound.push_back(datagram.to_vec());
        Ok(datagram.len())
    }
}
