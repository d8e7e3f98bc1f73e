//! Serves ICMP echo and TCP on a pair of channels.
//!
//! The server owns two channels, conventionally the two queues of one TUN device. Datagrams are
//! accepted on both; echo replies leave on the channel the request arrived on while all TCP
//! segments leave on the [`TX`] channel.
//!
//! [`TX`]: constant.TX.html
use core::mem;

use crate::layer::{icmp, Error, Result};
use crate::layer::tcp::{Config, Handler, Io, Key, NoHandler, SessionTable};
use crate::nic::{Channel, Transmit};
use crate::time::{Expiration, Instant};
use crate::wire::{datagram, Checksum, TcpSeqNumber, Transport};

/// Index of the channel primarily read from.
pub const RX: usize = 0;

/// Index of the channel TCP segments are sent on.
pub const TX: usize = 1;

/// A responder on two channels.
pub struct Server<C, H = NoHandler> {
    channels: [C; 2],

    /// Channels that did not fail yet.
    open: [bool; 2],

    /// Receive buffer of one MTU.
    buffer: Vec<u8>,

    icmp: icmp::Endpoint,

    table: SessionTable,

    handler: H,
}

impl<C: Channel> Server<C> {
    /// Create a server ignoring established connections.
    pub fn new(channels: [C; 2], config: Config) -> Self {
        Server::with_table(channels, SessionTable::new(config), NoHandler)
    }
}

impl<C: Channel, H: Handler> Server<C, H> {
    /// Create a server passing established connections to `handler`.
    pub fn with_handler(channels: [C; 2], config: Config, handler: H) -> Self {
        Server::with_table(channels, SessionTable::new(config), handler)
    }

    /// Create a server around an existing session table.
    pub fn with_table(channels: [C; 2], table: SessionTable, handler: H) -> Self {
        let mtu = table.config().mtu;
        Server {
            channels,
            open: [true; 2],
            buffer: vec![0; mtu],
            icmp: icmp::Endpoint::new(),
            table,
            handler,
        }
    }

    pub fn icmp_mut(&mut self) -> &mut icmp::Endpoint {
        &mut self.icmp
    }

    pub fn table(&self) -> &SessionTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut SessionTable {
        &mut self.table
    }

    pub fn handler(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Access a channel.
    ///
    /// # Panics
    /// This method panics if `index` is neither `RX` nor `TX`.
    pub fn channel(&mut self, index: usize) -> &mut C {
        &mut self.channels[index]
    }

    /// Check if a channel is still read from.
    pub fn is_open(&self, index: usize) -> bool {
        self.open.get(index).cloned().unwrap_or(false)
    }

    /// Handle one datagram that arrived on channel `index`.
    ///
    /// The packet is rewritten in place when it is answered with an echo reply. An error
    /// describes why the datagram was dropped, there is no further reaction to it.
    ///
    /// # Panics
    /// This method panics if `index` is neither `RX` nor `TX`.
    pub fn receive(&mut self, index: usize, packet: &mut [u8], now: Instant) -> Result<()> {
        let parsed = datagram::parse(packet, Checksum::Manual)?;
        let (header_len, total_len) = (parsed.header_len, parsed.total_len);

        match parsed.transport {
            Transport::Icmp(repr) => {
                net_trace!("channel {}: {}", index, repr);
                let len = self.icmp.answer(repr, packet, total_len, header_len)?;
                self.channels[index].transmit(&packet[..len]);
                Ok(())
            },
            Transport::Tcp { repr, payload } => {
                net_trace!("channel {}: {} {}", index, parsed.ip, repr);
                let mut io = Io::new(&mut self.channels[TX], now);
                self.table.receive(&parsed.ip, &repr, payload, &mut io, &mut self.handler)?;
                Ok(())
            },
            Transport::Other(protocol) => {
                net_trace!("channel {}: protocol {} not served", index, protocol);
                Err(Error::Wire(crate::wire::Error::Unsupported))
            },
        }
    }

    /// Fire due timers.
    pub fn poll(&mut self, now: Instant) {
        let mut io = Io::new(&mut self.channels[TX], now);
        self.table.poll(&mut io, &mut self.handler);
    }

    /// Close a connection from the application side.
    pub fn close(&mut self, key: Key, now: Instant) -> Result<()> {
        let mut io = Io::new(&mut self.channels[TX], now);
        self.table.close(key, &mut io, &mut self.handler)
    }

    /// Send payload on a connection from the application side.
    pub fn send(&mut self, key: Key, payload: &[u8], now: Instant) -> Result<Option<TcpSeqNumber>> {
        let mut io = Io::new(&mut self.channels[TX], now);
        self.table.send(key, payload, &mut io, &mut self.handler)
    }

    /// The earliest time at which `poll` has something to do.
    pub fn next_deadline(&self) -> Expiration {
        self.table.next_deadline()
    }

    /// Handle everything pending on both channels, then fire due timers.
    ///
    /// A channel that fails to read is closed for good. Returns the number of datagrams read.
    pub fn dispatch(&mut self, now: Instant) -> usize {
        let mut count = 0;
        for index in [RX, TX].iter().cloned() {
            while self.read(index, now) {
                count += 1;
            }
        }
        self.poll(now);
        count
    }

    /// Read and handle a single datagram, returning whether there was one.
    fn read(&mut self, index: usize, now: Instant) -> bool {
        if !self.open[index] {
            return false;
        }

        let mut buffer = mem::replace(&mut self.buffer, Vec::new());
        let handled = match self.channels[index].recv(&mut buffer) {
            Ok(Some(len)) => {
                if let Err(err) = self.receive(index, &mut buffer[..len], now) {
                    net_trace!("channel {}: dropped datagram, {}", index, err);
                }
                true
            },
            Ok(None) => false,
            Err(err) => {
                net_warn!("channel {}: closed after read error, {}", index, err);
                self.open[index] = false;
                false
            },
        };
        self.buffer = buffer;
        handled
    }
}

#[cfg(feature = "std")]
mod reactor {
    use std::os::unix::io::{AsRawFd, RawFd};

    use crate::nic::Channel;
    use crate::nic::sys::{self, Errno};
    use crate::layer::tcp::Handler;
    use crate::time::Expiration;

    use super::{Server, RX, TX};

    impl<C, H> Server<C, H>
        where C: Channel + AsRawFd, H: Handler
    {
        /// Serve until no channel can be read from anymore.
        ///
        /// Blocks in `select` on both channels, bounded by the next timer deadline. Read errors
        /// close the affected channel, only errors of the clock or `select` itself are returned.
        pub fn run(&mut self) -> Result<(), Errno> {
            loop {
                let now = sys::now()?;
                self.dispatch(now);

                let fds: Vec<RawFd> = [RX, TX].iter()
                    .filter(|&&index| self.is_open(index))
                    .map(|&index| self.channels[index].as_raw_fd())
                    .collect();
                if fds.is_empty() {
                    net_debug!("no channel left, stopping");
                    return Ok(());
                }

                let timeout = match self.next_deadline() {
                    Expiration::When(at) => Some(sys::now()?.until(at)),
                    Expiration::Never => None,
                };

                match sys::wait_any(&fds, timeout) {
                    Ok(_) => (),
                    Err(err) if err.is_interrupted() => (),
                    Err(err) => return Err(err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::tcp::{IsnGenerator, State};
    use crate::nic::Loopback;
    use crate::time::Duration;
    use crate::wire::{Ipv4Address, Ipv4Repr, IpProtocol, TcpFlags, TcpRepr, TcpSeqNumber};

    static ECHO_REQUEST: [u8; 31] =
        [0x45, 0x00, 0x00, 0x1f,
         0x12, 0x34, 0x40, 0x00,
         0x40, 0x01, 0x14, 0xa8,
         0x0a, 0x00, 0x00, 0x02,
         0x0a, 0x00, 0x00, 0x01,
         0x08, 0x00, 0x33, 0x9b,
         0x00, 0x01, 0x00, 0x01,
         0x61, 0x62, 0x63];

    fn server() -> Server<Loopback> {
        let table = SessionTable::with_isn(Config::default(), IsnGenerator::zero());
        Server::with_table([Loopback::new(), Loopback::new()], table, NoHandler)
    }

    fn syn() -> Vec<u8> {
        let ip = Ipv4Repr {
            src_addr: Ipv4Address::new(10, 0, 0, 2),
            dst_addr: Ipv4Address::new(10, 0, 0, 1),
            protocol: IpProtocol::Tcp,
            payload_len: 0,
            hop_limit: 64,
        };
        let tcp = TcpRepr {
            src_port: 5000,
            dst_port: 80,
            flags: TcpFlags::SYN,
            seq_number: TcpSeqNumber(1000),
            ack_number: None,
            window_len: 8192,
            payload_len: 0,
        };
        datagram::serialize(&ip, &tcp, &[])
    }

    #[test]
    fn echo_on_arrival_channel() {
        let mut server = server();
        server.channel(TX).inject(&ECHO_REQUEST[..]);
        assert_eq!(server.dispatch(Instant::from_millis(0)), 1);

        let reply = server.channel(TX).pop_sent().unwrap();
        assert_eq!(&reply[12..16], &[10, 0, 0, 1]);
        assert_eq!(reply[20], 0);
        assert_eq!(server.channel(RX).sent_len(), 0);
    }

    #[test]
    fn echo_denied() {
        let mut server = server();
        server.icmp_mut().deny_echo(true);
        let mut request = ECHO_REQUEST;
        assert_eq!(server.receive(RX, &mut request, Instant::from_millis(0)), Err(Error::Illegal));
        assert_eq!(server.channel(RX).sent_len(), 0);
    }

    #[test]
    fn tcp_answers_on_tx() {
        let mut server = server();
        server.channel(RX).inject(syn());
        server.dispatch(Instant::from_millis(0));

        assert_eq!(server.table().len(), 1);
        assert_eq!(server.channel(RX).sent_len(), 0);
        assert_eq!(server.channel(TX).sent_len(), 1);
    }

    #[test]
    fn malformed_dropped() {
        let mut server = server();
        let mut corrupt = ECHO_REQUEST;
        corrupt[30] ^= 0xff;
        server.channel(RX).inject(&corrupt[..]);
        server.channel(RX).inject(vec![0x60u8, 0, 0, 0]);
        server.channel(RX).inject(Vec::new());
        assert_eq!(server.dispatch(Instant::from_millis(0)), 3);
        assert_eq!(server.channel(RX).sent_len(), 0);
        assert_eq!(server.channel(TX).sent_len(), 0);

        let mut corrupt = ECHO_REQUEST;
        corrupt[30] ^= 0xff;
        let err = server.receive(RX, &mut corrupt, Instant::from_millis(0));
        assert_eq!(err, Err(Error::Wire(crate::wire::Error::WrongChecksum)));
    }

    #[test]
    fn failed_channel_closes() {
        let mut server = server();
        server.channel(RX).close();
        server.channel(TX).inject(&ECHO_REQUEST[..]);
        assert_eq!(server.dispatch(Instant::from_millis(0)), 1);
        assert!(!server.is_open(RX));
        assert!(server.is_open(TX));
    }

    #[test]
    fn timers_through_poll() {
        let mut server = server();
        let start = Instant::from_millis(0);
        server.channel(RX).inject(syn());
        server.dispatch(start);
        server.channel(TX).drain_sent();

        let forced = start + Config::FORCED_CLOSE;
        assert_eq!(server.next_deadline(), Expiration::When(forced));
        server.poll(forced);

        let key = server.table().keys().next().unwrap();
        assert_eq!(server.table().get(key).map(|s| s.state()), Some(State::Closed));
        server.poll(forced + Duration::from_secs(3));
        assert!(server.table().is_empty());
    }
}
