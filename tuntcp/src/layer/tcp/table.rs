use std::collections::BTreeMap;

use crate::layer::{Error, Result};
use crate::time::{Expiration, Instant};
use crate::wire::{Ipv4Repr, TcpRepr, TcpSeqNumber};

use super::{Config, FourTuple, Handler, Io, IsnGenerator, Key, Session};

/// Owns all sessions and routes segments to them.
///
/// A session is created only by a SYN for an unknown key. Sessions are never removed right away:
/// one that reached `closed` stays in the table for `Config::removal_delay` and is dropped by the
/// first `poll` after that. Segments arriving in the meantime still reach it.
#[derive(Debug)]
pub struct SessionTable {
    sessions: BTreeMap<Key, Session>,

    /// Scheduled removals.
    graveyard: BTreeMap<Key, Instant>,

    isn: IsnGenerator,

    config: Config,
}

/// What happened to a segment accepted by the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// A new session was created for the segment.
    Created,
    /// The segment was handed to an existing session.
    Forwarded,
    /// A SYN for a key that already has a session, dropped.
    Ignored,
}

impl SessionTable {
    /// Create an empty table with randomly keyed initial sequence numbers.
    pub fn new(config: Config) -> Self {
        SessionTable::with_isn(config, IsnGenerator::from_std_hash())
    }

    pub fn with_isn(config: Config, isn: IsnGenerator) -> Self {
        SessionTable {
            sessions: BTreeMap::new(),
            graveyard: BTreeMap::new(),
            isn,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle a segment addressed to us.
    ///
    /// `ip` is the header of the enclosing datagram. Answers `Err(Error::Exhausted)` when a new
    /// connection would exceed the session ceiling and `Err(Error::Unreachable)` for a segment
    /// without SYN and without session. In both cases nothing is sent.
    pub fn receive<H>(
        &mut self,
        ip: &Ipv4Repr,
        segment: &TcpRepr,
        payload: &[u8],
        io: &mut Io,
        handler: &mut H,
    ) -> Result<Disposition>
        where H: Handler + ?Sized
    {
        let key = Key::new(ip.src_addr, segment.src_port);

        if self.sessions.contains_key(&key) {
            if segment.flags.syn() {
                net_trace!("{}: SYN for existing session dropped", key);
                return Ok(Disposition::Ignored);
            }

            self.forward(key, io, handler, |session, io| session.on_receive(segment, payload, io));
            return Ok(Disposition::Forwarded);
        }

        if !segment.flags.syn() {
            net_trace!("{}: no session for {}", key, segment);
            return Err(Error::Unreachable);
        }

        if self.sessions.len() >= self.config.max_sessions {
            net_debug!("{}: refused, {} sessions open", key, self.sessions.len());
            return Err(Error::Exhausted);
        }

        let tuple = FourTuple {
            local: ip.dst_addr,
            remote: ip.src_addr,
            local_port: segment.dst_port,
            remote_port: segment.src_port,
        };
        let isn = self.isn.get_isn(tuple, io.now);
        self.sessions.insert(key, Session::new(tuple, isn, segment.seq_number, self.config));
        net_debug!("{}: new session for port {}", key, tuple.local_port);

        self.forward(key, io, handler, |session, io| session.on_receive(segment, payload, io));
        Ok(Disposition::Created)
    }

    /// Close our direction of a connection on behalf of the application.
    ///
    /// A session still in the handshake is abandoned and scheduled for removal. Answers
    /// `Err(Error::Unreachable)` if there is no session for `key`.
    pub fn close<H>(&mut self, key: Key, io: &mut Io, handler: &mut H) -> Result<()>
        where H: Handler + ?Sized
    {
        self.forward(key, io, handler, |session, io| session.close(io))
            .ok_or(Error::Unreachable)
    }

    /// Send payload on a connection on behalf of the application.
    ///
    /// See `Session::send` for when payload is refused, which answers `Ok(None)`.
    pub fn send<H>(&mut self, key: Key, payload: &[u8], io: &mut Io, handler: &mut H)
        -> Result<Option<TcpSeqNumber>>
        where H: Handler + ?Sized
    {
        self.forward(key, io, handler, |session, io| session.send(payload, io))
            .ok_or(Error::Unreachable)
    }

    /// Schedule the removal of a session.
    ///
    /// The session is dropped `Config::removal_delay` after `now`. Scheduling again does not
    /// postpone an earlier removal, and a scheduled removal can not be revoked.
    pub fn delete(&mut self, key: Key, now: Instant) {
        let at = now + self.config.removal_delay;
        self.graveyard.entry(key).or_insert(at);
    }

    /// Fire expired session timers and carry out due removals.
    pub fn poll<H>(&mut self, io: &mut Io, handler: &mut H)
        where H: Handler + ?Sized
    {
        let now = io.now;

        let due: Vec<Key> = self.sessions.iter()
            .filter(|(_, session)| session.next_deadline().is_due(now))
            .map(|(&key, _)| key)
            .collect();
        for key in due {
            self.forward(key, io, handler, |session, io| session.poll(io));
        }

        let expired: Vec<Key> = self.graveyard.iter()
            .filter(|&(_, &at)| at <= now)
            .map(|(&key, _)| key)
            .collect();
        for key in expired {
            self.graveyard.remove(&key);
            if self.sessions.remove(&key).is_some() {
                net_debug!("{}: removed", key);
            }
        }
    }

    /// The earliest time at which `poll` has something to do.
    pub fn next_deadline(&self) -> Expiration {
        let timers = self.sessions.values().map(Session::next_deadline);
        let removals = self.graveyard.values().map(|&at| Expiration::When(at));
        timers.chain(removals).min().unwrap_or(Expiration::Never)
    }

    /// The time at which the session will be removed, if it is scheduled for removal.
    pub fn removal_at(&self, key: Key) -> Option<Instant> {
        self.graveyard.get(&key).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, key: Key) -> Option<&Session> {
        self.sessions.get(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item=Key> + '_ {
        self.sessions.keys().cloned()
    }

    /// Call into a session, then act on the signals it raised.
    ///
    /// Every mutable access to a session goes through here, so no signal is ever left behind.
    fn forward<H, F, R>(&mut self, key: Key, io: &mut Io, handler: &mut H, call: F) -> Option<R>
        where H: Handler + ?Sized, F: FnOnce(&mut Session, &mut Io) -> R
    {
        let session = self.sessions.get_mut(&key)?;
        let result = call(session, io);

        let mut closed = false;
        loop {
            let signals = session.take_signals();
            closed |= signals.closed;
            if !signals.connected {
                break;
            }
            net_debug!("{}: connected", key);
            handler.on_connect(session, io);
        }

        if closed {
            net_debug!("{}: closed, removal scheduled", key);
            self.delete(key, io.now);
        }

        Some(result)
    }
}
