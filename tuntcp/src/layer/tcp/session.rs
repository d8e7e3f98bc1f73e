use core::mem;

use crate::time::{Expiration, Timer};
use crate::wire::{datagram, IpProtocol, Ipv4Repr, TcpFlags, TcpRepr, TcpSeqNumber};
use crate::wire::{IPV4_HEADER_LEN, TCP_HEADER_LEN};

use super::state::{Action, Effect, Event, Machine, State};
use super::{Config, FourTuple, Io, Key, Signals};

/// A single connection.
///
/// Tracks the sequence space of both directions and drives one state machine. The session does
/// not buffer anything: received payload only advances `ack_seq` and is acknowledged, data given
/// to [`send`] is transmitted immediately and never retransmitted.
///
/// [`send`]: #method.send
#[derive(Clone, Debug)]
pub struct Session {
    tuple: FourTuple,

    /// The sequence number of the next octet we send.
    seq: TcpSeqNumber,

    /// The position up to which the peer's stream is acknowledged.
    ack_seq: TcpSeqNumber,

    /// Our SYN awaiting its acknowledgment.
    pending_syn: PendingAck,

    /// Our FIN awaiting its acknowledgment.
    pending_fin: PendingAck,

    machine: Machine,

    /// Ends `timewait`.
    timeout: Timer,

    /// Forced close out of `closewait` and `synrcvd`.
    delay: Timer,

    signals: Signals,

    config: Config,
}

/// A control segment that was sent but not yet acknowledged.
///
/// Holds the sequence number of the control flag. Any acknowledgment beyond it satisfies the
/// pending state once, after which it is disarmed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct PendingAck {
    watermark: Option<TcpSeqNumber>,
}

impl PendingAck {
    fn arm(&mut self, seq: TcpSeqNumber) {
        self.watermark = Some(seq);
    }

    fn acknowledged_by(&mut self, ack: TcpSeqNumber) -> bool {
        match self.watermark {
            Some(mark) if ack > mark => {
                self.watermark = None;
                true
            },
            _ => false,
        }
    }
}

impl Session {
    /// Create a session in `listen`.
    ///
    /// `isn` is our initial sequence number and `peer_seq` the sequence number of the SYN that
    /// opens the connection.
    pub fn new(tuple: FourTuple, isn: TcpSeqNumber, peer_seq: TcpSeqNumber, config: Config) -> Self {
        Session {
            tuple,
            seq: isn,
            ack_seq: peer_seq,
            pending_syn: PendingAck::default(),
            pending_fin: PendingAck::default(),
            machine: Machine::new(),
            timeout: Timer::default(),
            delay: Timer::default(),
            signals: Signals::default(),
            config,
        }
    }

    pub fn key(&self) -> Key {
        self.tuple.key()
    }

    pub fn tuple(&self) -> FourTuple {
        self.tuple
    }

    pub fn state(&self) -> State {
        self.machine.state()
    }

    pub fn seq(&self) -> TcpSeqNumber {
        self.seq
    }

    pub fn ack_seq(&self) -> TcpSeqNumber {
        self.ack_seq
    }

    /// Take the signals raised since the last call.
    pub fn take_signals(&mut self) -> Signals {
        mem::take(&mut self.signals)
    }

    /// The earliest time at which `poll` has something to do.
    pub fn next_deadline(&self) -> Expiration {
        self.timeout.deadline().min(self.delay.deadline())
    }

    /// Process an incoming segment addressed to this session.
    ///
    /// First the acknowledgment position is advanced past the segment. Then the segment is
    /// turned into at most one event, by priority: SYN, FIN, acknowledgment of our SYN,
    /// acknowledgment of our FIN. A segment carrying payload that raises none of these is
    /// acknowledged with a bare ACK.
    pub fn on_receive(&mut self, segment: &TcpRepr, payload: &[u8], io: &mut Io) {
        let flags = segment.flags;

        self.ack_seq = self.ack_seq.later(segment.seq_number);
        if !payload.is_empty() {
            self.ack_seq += payload.len();
        } else if flags.syn() || flags.fin() {
            self.ack_seq += 1;
        }

        let event = if flags.syn() {
            Some(Event::RcvSyn)
        } else if flags.fin() {
            Some(Event::RcvFin)
        } else if let Some(ack) = segment.ack_number {
            if self.pending_syn.acknowledged_by(ack) {
                Some(Event::RcvAckOfSyn)
            } else if self.pending_fin.acknowledged_by(ack) {
                Some(Event::RcvAckOfFin)
            } else {
                None
            }
        } else {
            None
        };

        match event {
            Some(event) => self.fire(event, io),
            None if !payload.is_empty() => {
                self.send_control(TcpFlags::ACK, io);
            },
            None => (),
        }
    }

    /// Send payload on an established connection.
    ///
    /// Only possible in `estab` and `closewait`, and only for non-empty payloads that fit into a
    /// single datagram of the configured MTU. The payload goes out at once as one PSH+ACK segment.
    /// Returns the sequence number of its first octet, or `None` if nothing was sent.
    pub fn send(&mut self, payload: &[u8], io: &mut Io) -> Option<TcpSeqNumber> {
        match self.state() {
            State::Estab | State::CloseWait => (),
            _ => return None,
        }

        if payload.is_empty() {
            return None;
        }

        if IPV4_HEADER_LEN + TCP_HEADER_LEN + payload.len() > self.config.mtu {
            net_debug!("{}: payload of {} octets exceeds the mtu", self.key(), payload.len());
            return None;
        }

        let seq = self.seq;
        self.transmit(TcpFlags::PSH | TcpFlags::ACK, payload, io);
        self.seq += payload.len();
        Some(seq)
    }

    /// Send a segment without payload.
    ///
    /// The acknowledgment number is included if `flags` contains ACK. SYN and FIN each consume one
    /// sequence number. Returns the sequence number the segment was sent with.
    pub fn send_control(&mut self, flags: TcpFlags, io: &mut Io) -> TcpSeqNumber {
        let seq = self.seq;
        self.transmit(flags, &[], io);
        self.seq += flags.sequence_len();
        seq
    }

    /// Close our direction of the connection.
    ///
    /// Ignored in states where there is nothing to close.
    pub fn close(&mut self, io: &mut Io) {
        self.fire(Event::DoClose, io)
    }

    /// Fire expired timers.
    pub fn poll(&mut self, io: &mut Io) {
        if self.timeout.poll(io.now) {
            self.fire(Event::Timeout, io);
        }

        if self.delay.poll(io.now) {
            net_debug!("{}: forced close in {}", self.key(), self.state());
            self.fire(Event::DoClose, io);
        }
    }

    fn fire(&mut self, event: Event, io: &mut Io) {
        let step = match self.machine.fire(event) {
            Some(step) => step,
            None => {
                net_trace!("{}: {:?} ignored in {}", self.key(), event, self.state());
                return;
            },
        };

        net_debug!("{}: {} -> {}", self.key(), step.from, step.to);

        for &effect in step.exit() {
            self.apply(effect, io);
        }

        if let Some(action) = step.action {
            self.perform(action, io);
        }

        for &effect in step.entry() {
            self.apply(effect, io);
        }
    }

    fn perform(&mut self, action: Action, io: &mut Io) {
        match action {
            Action::SendSynAck => {
                let seq = self.send_control(TcpFlags::SYN | TcpFlags::ACK, io);
                self.pending_syn.arm(seq);
            },
            Action::SendFin => {
                let seq = self.send_control(TcpFlags::FIN | TcpFlags::ACK, io);
                self.pending_fin.arm(seq);
            },
            Action::SendAck => {
                self.send_control(TcpFlags::ACK, io);
            },
        }
    }

    fn apply(&mut self, effect: Effect, io: &mut Io) {
        match effect {
            Effect::NotifyConnect => self.signals.connected = true,
            Effect::RequestRemoval => self.signals.closed = true,
            Effect::ArmTimeWait => self.timeout.arm(io.now, self.config.time_wait),
            Effect::ArmForcedClose => self.delay.arm(io.now, self.config.forced_close),
            Effect::CancelForcedClose => self.delay.cancel(),
        }
    }

    fn transmit(&self, flags: TcpFlags, payload: &[u8], io: &mut Io) {
        let ip = Ipv4Repr {
            src_addr: self.tuple.local,
            dst_addr: self.tuple.remote,
            protocol: IpProtocol::Tcp,
            payload_len: 0,
            hop_limit: self.config.hop_limit,
        };

        let tcp = TcpRepr {
            src_port: self.tuple.local_port,
            dst_port: self.tuple.remote_port,
            flags,
            seq_number: self.seq,
            ack_number: if flags.ack() { Some(self.ack_seq) } else { None },
            window_len: self.config.window,
            payload_len: payload.len(),
        };

        net_trace!("{}: {}", self.key(), tcp);
        io.tx.transmit(&datagram::serialize(&ip, &tcp, payload));
    }
}
