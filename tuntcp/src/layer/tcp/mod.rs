//! The TCP layer, server side only.
//!
//! Connections are passively opened by a peer's SYN and otherwise follow a reduced version of the
//! RFC793 state diagram. There is no retransmission, no reassembly of out-of-order segments and no
//! window management: received payload is acknowledged but not retained, and every segment this
//! side emits advertises the same fixed window.
//!
//! ## Structure
//!
//! * [`state`] is the state machine itself as pure functions over explicit enumerations. It never
//!   touches a packet.
//! * A [`Session`] is one connection. It keeps the sequence numbers, remembers which control
//!   segments still await an acknowledgment, turns incoming segments into at most one machine
//!   event and executes what the machine asks for.
//! * The [`SessionTable`] owns all sessions, keyed by the peer's address and port. It creates
//!   sessions for new SYNs, enforces the session ceiling, and removes closed sessions some time
//!   after they asked for it.
//!
//! Sessions talk back to the table only through [`Signals`], which the table collects after each
//! call into a session returns. A session can thus never be removed from under its own feet.
//!
//! ## Deviations
//!
//! A session that enters `closewait` closes its side on its own after a fixed delay instead of
//! waiting for the application. The same delay bounds how long a connection may stay half-open in
//! `synrcvd` before it is abandoned.
//!
//! [`state`]: state/index.html
//! [`Session`]: struct.Session.html
//! [`SessionTable`]: struct.SessionTable.html
//! [`Signals`]: struct.Signals.html
use core::fmt;

use crate::nic::Transmit;
use crate::time::{Duration, Instant};
use crate::wire::Ipv4Address;

pub mod state;
mod session;
mod siphash;
mod table;

#[cfg(test)]
mod tests;

pub use self::session::Session;
pub use self::siphash::IsnGenerator;
pub use self::state::State;
pub use self::table::{Disposition, SessionTable};

/// Tunables of the tcp layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// The number of sessions at which new connection attempts are refused.
    pub max_sessions: usize,
    /// How long a session lingers in `timewait`.
    pub time_wait: Duration,
    /// Delay after which `closewait` and `synrcvd` are left on our own initiative.
    pub forced_close: Duration,
    /// Delay between a session reaching `closed` and its removal from the table.
    pub removal_delay: Duration,
    /// The window advertised in every segment.
    pub window: u16,
    /// The hop limit of emitted datagrams.
    pub hop_limit: u8,
    /// The largest datagram read from or written to a channel.
    pub mtu: usize,
}

impl Config {
    pub const MAX_SESSIONS: usize = 1024;
    pub const TIME_WAIT: Duration = Duration::from_secs(1);
    pub const FORCED_CLOSE: Duration = Duration::from_secs(1);
    pub const REMOVAL_DELAY: Duration = Duration::from_secs(3);
    pub const DEFAULT_WINDOW: u16 = 1024;
    pub const DEFAULT_MTU: usize = 1500;
    pub const HOP_LIMIT: u8 = 64;
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_sessions: Config::MAX_SESSIONS,
            time_wait: Config::TIME_WAIT,
            forced_close: Config::FORCED_CLOSE,
            removal_delay: Config::REMOVAL_DELAY,
            window: Config::DEFAULT_WINDOW,
            hop_limit: Config::HOP_LIMIT,
            mtu: Config::DEFAULT_MTU,
        }
    }
}

/// Identifies a session by the address and port of the peer.
///
/// Packed as `port << 32 | address` where the address is read as a big-endian integer. The local
/// address and port are not part of the key, a peer port can only be connected to one of ours.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(u64);

impl Key {
    pub fn new(addr: Ipv4Address, port: u16) -> Self {
        Key(u64::from(port) << 32 | u64::from(addr.to_network_integer()))
    }

    pub fn addr(self) -> Ipv4Address {
        Ipv4Address::from_network_integer(self.0 as u32)
    }

    pub fn port(self) -> u16 {
        (self.0 >> 32) as u16
    }
}

impl From<Key> for u64 {
    fn from(Key(key): Key) -> u64 {
        key
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.addr(), self.port())
    }
}

/// Both endpoints of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FourTuple {
    pub local: Ipv4Address,
    pub remote: Ipv4Address,
    pub local_port: u16,
    pub remote_port: u16,
}

impl FourTuple {
    /// The key of the remote side.
    pub fn key(&self) -> Key {
        Key::new(self.remote, self.remote_port)
    }
}

/// Notifications of a session to its owner.
///
/// Raised while the session handles a segment or a timer and collected by the owner afterwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Signals {
    /// The handshake completed.
    pub connected: bool,
    /// The session reached `closed` and wants to be removed.
    pub closed: bool,
}

/// The environment of a call into a session.
///
/// Everything a session emits is handed to `tx`, `now` is the time at which the triggering
/// datagram or timer is processed.
pub struct Io<'a> {
    pub tx: &'a mut dyn Transmit,
    pub now: Instant,
}

impl<'a> Io<'a> {
    pub fn new(tx: &'a mut dyn Transmit, now: Instant) -> Self {
        Io { tx, now }
    }
}

/// Application callbacks of established connections.
pub trait Handler {
    /// Called once a session completed the handshake and entered `estab`.
    ///
    /// The session may be written to or closed right away.
    fn on_connect(&mut self, session: &mut Session, io: &mut Io) {
        let _ = (session, io);
    }
}

/// A handler that ignores all connections.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHandler;

impl Handler for NoHandler { }
