//! Tcp layer tests.
//!
//! Drive a session table from the peer's perspective: inject segments, advance the clock and
//! look at what comes out of the loopback.
use super::*;
use crate::layer::Error;
use crate::nic::Loopback;
use crate::time::{Duration, Expiration, Instant};
use crate::wire::{datagram, Checksum, IpProtocol, Ipv4Address, Ipv4Repr, Transport};
use crate::wire::{TcpFlags, TcpRepr, TcpSeqNumber};

const CLIENT: Ipv4Address = Ipv4Address([10, 0, 0, 2]);
const SERVER: Ipv4Address = Ipv4Address([10, 0, 0, 1]);
const CLIENT_PORT: u16 = 5000;
const SERVER_PORT: u16 = 80;

fn client_ip() -> Ipv4Repr {
    Ipv4Repr {
        src_addr: CLIENT,
        dst_addr: SERVER,
        protocol: IpProtocol::Tcp,
        payload_len: 0,
        hop_limit: 64,
    }
}

fn segment(flags: TcpFlags, seq: i32, ack: Option<i32>) -> TcpRepr {
    TcpRepr {
        src_port: CLIENT_PORT,
        dst_port: SERVER_PORT,
        flags,
        seq_number: TcpSeqNumber(seq),
        ack_number: ack.map(TcpSeqNumber),
        window_len: 8192,
        payload_len: 0,
    }
}

fn key() -> Key {
    Key::new(CLIENT, CLIENT_PORT)
}

/// Remembers every connection that completed the handshake.
#[derive(Default)]
struct Recorder {
    connected: Vec<Key>,
}

impl Handler for Recorder {
    fn on_connect(&mut self, session: &mut Session, _: &mut Io) {
        self.connected.push(session.key());
    }
}

/// Greets every new connection.
struct Greeter;

impl Handler for Greeter {
    fn on_connect(&mut self, session: &mut Session, io: &mut Io) {
        assert_eq!(session.send(b"welcome", io), Some(TcpSeqNumber(1)));
    }
}

/// A segment as it was sent by the table.
struct Sent {
    ip: Ipv4Repr,
    tcp: TcpRepr,
    payload: Vec<u8>,
}

struct Harness {
    table: SessionTable,
    nic: Loopback,
    now: Instant,
}

impl Harness {
    fn new() -> Self {
        Harness::with_config(Config::default())
    }

    fn with_config(config: Config) -> Self {
        Harness {
            table: SessionTable::with_isn(config, IsnGenerator::zero()),
            nic: Loopback::new(),
            now: Instant::from_millis(0),
        }
    }

    fn receive(&mut self, tcp: TcpRepr, payload: &[u8]) -> crate::layer::Result<Disposition> {
        self.receive_with(tcp, payload, &mut NoHandler)
    }

    fn receive_with<H: Handler>(&mut self, tcp: TcpRepr, payload: &[u8], handler: &mut H)
        -> crate::layer::Result<Disposition>
    {
        let tcp = TcpRepr { payload_len: payload.len(), ..tcp };
        let mut io = Io::new(&mut self.nic, self.now);
        self.table.receive(&client_ip(), &tcp, payload, &mut io, handler)
    }

    fn advance(&mut self, millis: u64) {
        self.now += Duration::from_millis(millis);
        let mut io = Io::new(&mut self.nic, self.now);
        self.table.poll(&mut io, &mut NoHandler);
    }

    fn close(&mut self) {
        let mut io = Io::new(&mut self.nic, self.now);
        self.table.close(key(), &mut io, &mut NoHandler).expect("session exists");
    }

    fn state(&self) -> Option<State> {
        self.table.get(key()).map(Session::state)
    }

    fn sent(&mut self) -> Sent {
        let bytes = self.nic.pop_sent().expect("a segment was sent");
        let parsed = datagram::parse(&bytes, Checksum::Manual).expect("valid datagram");
        match parsed.transport {
            Transport::Tcp { repr, payload } => Sent {
                ip: parsed.ip,
                tcp: repr,
                payload: payload.to_vec(),
            },
            other => panic!("not a tcp segment: {:?}", other),
        }
    }

    fn nothing_sent(&self) {
        assert_eq!(self.nic.sent_len(), 0, "unexpected segment");
    }

    /// Complete the handshake of a connection with client ISN 1000.
    fn establish(&mut self) {
        assert_eq!(self.receive(segment(TcpFlags::SYN, 1000, None), &[]), Ok(Disposition::Created));
        self.sent();
        assert_eq!(self.receive(segment(TcpFlags::ACK, 1001, Some(1)), &[]), Ok(Disposition::Forwarded));
        assert_eq!(self.state(), Some(State::Estab));
        self.nothing_sent();
    }
}

#[test]
fn key_packing() {
    let key = Key::new(CLIENT, CLIENT_PORT);
    assert_eq!(u64::from(key), 5000 << 32 | 0x0a00_0002);
    assert_eq!(key.addr(), CLIENT);
    assert_eq!(key.port(), CLIENT_PORT);
    assert_eq!(key.to_string(), "10.0.0.2:5000");
}

#[test]
fn handshake() {
    let mut harness = Harness::new();
    let syn = segment(TcpFlags::SYN, 1000, None);
    assert_eq!(harness.receive(syn, &[]), Ok(Disposition::Created));
    assert_eq!(harness.state(), Some(State::SynRcvd));

    let Sent { ip, tcp, payload } = harness.sent();
    assert_eq!(ip.src_addr, SERVER);
    assert_eq!(ip.dst_addr, CLIENT);
    assert_eq!(ip.hop_limit, Config::HOP_LIMIT);
    assert_eq!(tcp.src_port, SERVER_PORT);
    assert_eq!(tcp.dst_port, CLIENT_PORT);
    assert_eq!(tcp.flags, TcpFlags::SYN | TcpFlags::ACK);
    assert_eq!(tcp.seq_number, TcpSeqNumber(0));
    assert_eq!(tcp.ack_number, Some(TcpSeqNumber(1001)));
    assert_eq!(tcp.window_len, Config::DEFAULT_WINDOW);
    assert!(payload.is_empty());
    harness.nothing_sent();

    let session = harness.table.get(key()).unwrap();
    assert_eq!(session.seq(), TcpSeqNumber(1));
    assert_eq!(session.ack_seq(), TcpSeqNumber(1001));

    let mut recorder = Recorder::default();
    let ack = segment(TcpFlags::ACK, 1001, Some(1));
    assert_eq!(harness.receive_with(ack, &[], &mut recorder), Ok(Disposition::Forwarded));
    assert_eq!(harness.state(), Some(State::Estab));
    assert_eq!(recorder.connected, vec![key()]);

    // Only once.
    harness.receive_with(segment(TcpFlags::ACK, 1001, Some(1)), &[], &mut recorder).unwrap();
    assert_eq!(recorder.connected.len(), 1);
    harness.nothing_sent();
}

#[test]
fn ack_below_watermark() {
    let mut harness = Harness::new();
    harness.receive(segment(TcpFlags::SYN, 1000, None), &[]).unwrap();
    harness.sent();

    // Acknowledges nothing beyond our SYN.
    harness.receive(segment(TcpFlags::ACK, 1001, Some(0)), &[]).unwrap();
    assert_eq!(harness.state(), Some(State::SynRcvd));

    harness.receive(segment(TcpFlags::ACK, 1001, Some(1)), &[]).unwrap();
    assert_eq!(harness.state(), Some(State::Estab));
}

#[test]
fn replayed_ack_not_accepted_twice() {
    let mut harness = Harness::new();
    harness.establish();

    // The acknowledgment of our SYN was consumed, replaying it is not an event.
    harness.receive(segment(TcpFlags::ACK, 1001, Some(1)), &[]).unwrap();
    assert_eq!(harness.state(), Some(State::Estab));

    harness.close();
    assert_eq!(harness.state(), Some(State::FinWait1));
    let fin = harness.sent();
    assert_eq!(fin.tcp.flags, TcpFlags::FIN | TcpFlags::ACK);
    assert_eq!(fin.tcp.seq_number, TcpSeqNumber(1));

    // Not beyond our FIN.
    harness.receive(segment(TcpFlags::ACK, 1001, Some(1)), &[]).unwrap();
    assert_eq!(harness.state(), Some(State::FinWait1));

    harness.receive(segment(TcpFlags::ACK, 1001, Some(2)), &[]).unwrap();
    assert_eq!(harness.state(), Some(State::FinWait2));

    harness.receive(segment(TcpFlags::ACK, 1001, Some(2)), &[]).unwrap();
    assert_eq!(harness.state(), Some(State::FinWait2));
    harness.nothing_sent();
}

#[test]
fn data_is_acknowledged() {
    let mut harness = Harness::new();
    harness.establish();

    let data = segment(TcpFlags::PSH | TcpFlags::ACK, 1001, Some(1));
    assert_eq!(harness.receive(data, b"hello"), Ok(Disposition::Forwarded));
    assert_eq!(harness.state(), Some(State::Estab));

    let ack = harness.sent();
    assert_eq!(ack.tcp.flags, TcpFlags::ACK);
    assert_eq!(ack.tcp.seq_number, TcpSeqNumber(1));
    assert_eq!(ack.tcp.ack_number, Some(TcpSeqNumber(1006)));
    assert!(ack.payload.is_empty());
    harness.nothing_sent();
}

#[test]
fn bare_ack_not_answered() {
    let mut harness = Harness::new();
    harness.establish();
    harness.receive(segment(TcpFlags::ACK, 1001, Some(1)), &[]).unwrap();
    harness.nothing_sent();
}

#[test]
fn passive_close_forced() {
    let mut harness = Harness::new();
    harness.establish();

    harness.receive(segment(TcpFlags::FIN | TcpFlags::ACK, 1001, Some(1)), &[]).unwrap();
    assert_eq!(harness.state(), Some(State::CloseWait));
    let ack = harness.sent();
    assert_eq!(ack.tcp.flags, TcpFlags::ACK);
    assert_eq!(ack.tcp.ack_number, Some(TcpSeqNumber(1002)));

    let forced = harness.now + Config::FORCED_CLOSE;
    assert_eq!(harness.table.next_deadline(), Expiration::When(forced));

    harness.advance(999);
    assert_eq!(harness.state(), Some(State::CloseWait));
    harness.nothing_sent();

    harness.advance(1);
    assert_eq!(harness.state(), Some(State::LastAck));
    let fin = harness.sent();
    assert_eq!(fin.tcp.flags, TcpFlags::FIN | TcpFlags::ACK);
    assert_eq!(fin.tcp.seq_number, TcpSeqNumber(1));
    assert_eq!(fin.tcp.ack_number, Some(TcpSeqNumber(1002)));

    // Fires only once.
    harness.advance(1000);
    harness.nothing_sent();

    harness.receive(segment(TcpFlags::ACK, 1002, Some(2)), &[]).unwrap();
    assert_eq!(harness.state(), Some(State::Closed));
    let removal = harness.now + Config::REMOVAL_DELAY;
    assert_eq!(harness.table.removal_at(key()), Some(removal));
    assert_eq!(harness.table.next_deadline(), Expiration::When(removal));

    harness.advance(2999);
    assert_eq!(harness.state(), Some(State::Closed));
    harness.advance(1);
    assert_eq!(harness.state(), None);
    assert!(harness.table.is_empty());
    assert_eq!(harness.table.next_deadline(), Expiration::Never);
}

#[test]
fn application_close_before_forced() {
    let mut harness = Harness::new();
    harness.establish();

    harness.receive(segment(TcpFlags::FIN | TcpFlags::ACK, 1001, Some(1)), &[]).unwrap();
    harness.sent();
    harness.close();
    assert_eq!(harness.state(), Some(State::LastAck));
    harness.sent();

    // The forced close still fires but has no transition left.
    harness.advance(1000);
    assert_eq!(harness.state(), Some(State::LastAck));
    harness.nothing_sent();
}

#[test]
fn time_wait() {
    let mut harness = Harness::new();
    harness.establish();

    harness.close();
    harness.sent();
    harness.receive(segment(TcpFlags::ACK, 1001, Some(2)), &[]).unwrap();
    assert_eq!(harness.state(), Some(State::FinWait2));
    harness.nothing_sent();

    harness.receive(segment(TcpFlags::FIN | TcpFlags::ACK, 1001, Some(2)), &[]).unwrap();
    assert_eq!(harness.state(), Some(State::TimeWait));
    let ack = harness.sent();
    assert_eq!(ack.tcp.flags, TcpFlags::ACK);
    assert_eq!(ack.tcp.seq_number, TcpSeqNumber(2));
    assert_eq!(ack.tcp.ack_number, Some(TcpSeqNumber(1002)));

    harness.advance(999);
    assert_eq!(harness.state(), Some(State::TimeWait));
    harness.advance(1);
    assert_eq!(harness.state(), Some(State::Closed));
    assert_eq!(harness.table.removal_at(key()), Some(harness.now + Config::REMOVAL_DELAY));
    harness.nothing_sent();
}

#[test]
fn simultaneous_close() {
    let mut harness = Harness::new();
    harness.establish();

    harness.close();
    harness.sent();

    // The peer's FIN crosses ours.
    harness.receive(segment(TcpFlags::FIN | TcpFlags::ACK, 1001, Some(1)), &[]).unwrap();
    assert_eq!(harness.state(), Some(State::Closing));
    assert_eq!(harness.sent().tcp.ack_number, Some(TcpSeqNumber(1002)));

    harness.receive(segment(TcpFlags::ACK, 1002, Some(2)), &[]).unwrap();
    assert_eq!(harness.state(), Some(State::TimeWait));
}

#[test]
fn half_open_abandoned() {
    let mut harness = Harness::new();
    harness.receive(segment(TcpFlags::SYN, 1000, None), &[]).unwrap();
    harness.sent();

    harness.advance(1000);
    assert_eq!(harness.state(), Some(State::Closed));
    harness.nothing_sent();

    harness.advance(3000);
    assert_eq!(harness.state(), None);
}

#[test]
fn removal_is_deferred() {
    let mut harness = Harness::new();
    harness.receive(segment(TcpFlags::SYN, 1000, None), &[]).unwrap();
    harness.sent();
    harness.advance(1000);
    assert_eq!(harness.state(), Some(State::Closed));

    // Still reachable while the removal is pending.
    let late = segment(TcpFlags::ACK, 1001, Some(1));
    assert_eq!(harness.receive(late, &[]), Ok(Disposition::Forwarded));

    // A second request does not postpone the removal.
    let now = harness.now;
    harness.table.delete(key(), now + Duration::from_secs(10));
    assert_eq!(harness.table.removal_at(key()), Some(now + Config::REMOVAL_DELAY));

    harness.advance(3000);
    assert!(harness.table.is_empty());
    assert_eq!(harness.table.removal_at(key()), None);
}

#[test]
fn unknown_without_syn() {
    let mut harness = Harness::new();
    let ack = segment(TcpFlags::ACK, 1001, Some(1));
    assert_eq!(harness.receive(ack, &[]), Err(Error::Unreachable));
    assert!(harness.table.is_empty());
    harness.nothing_sent();
}

#[test]
fn repeated_syn_ignored() {
    let mut harness = Harness::new();
    harness.receive(segment(TcpFlags::SYN, 1000, None), &[]).unwrap();
    harness.sent();

    assert_eq!(harness.receive(segment(TcpFlags::SYN, 1000, None), &[]), Ok(Disposition::Ignored));
    assert_eq!(harness.state(), Some(State::SynRcvd));
    assert_eq!(harness.table.len(), 1);
    harness.nothing_sent();
}

#[test]
fn flood_refused() {
    let config = Config { max_sessions: 2, ..Config::default() };
    let mut harness = Harness::with_config(config);

    for &port in [1000u16, 1001].iter() {
        let syn = TcpRepr { src_port: port, ..segment(TcpFlags::SYN, 1000, None) };
        assert_eq!(harness.receive(syn, &[]), Ok(Disposition::Created));
    }
    assert_eq!(harness.nic.drain_sent().len(), 2);

    let syn = TcpRepr { src_port: 1002, ..segment(TcpFlags::SYN, 1000, None) };
    assert_eq!(harness.receive(syn, &[]), Err(Error::Exhausted));
    assert_eq!(harness.table.len(), 2);
    harness.nothing_sent();

    let mut keys: Vec<_> = harness.table.keys().map(Key::port).collect();
    keys.sort();
    assert_eq!(keys, vec![1000, 1001]);
}

#[test]
fn send_on_connect() {
    let mut harness = Harness::new();
    harness.receive(segment(TcpFlags::SYN, 1000, None), &[]).unwrap();
    harness.sent();

    harness.receive_with(segment(TcpFlags::ACK, 1001, Some(1)), &[], &mut Greeter).unwrap();

    let data = harness.sent();
    assert_eq!(data.tcp.flags, TcpFlags::PSH | TcpFlags::ACK);
    assert_eq!(data.tcp.seq_number, TcpSeqNumber(1));
    assert_eq!(data.tcp.ack_number, Some(TcpSeqNumber(1001)));
    assert_eq!(&data.payload[..], b"welcome");
    assert_eq!(harness.table.get(key()).unwrap().seq(), TcpSeqNumber(8));
}

#[test]
fn application_abandons_handshake() {
    let mut harness = Harness::new();
    harness.receive(segment(TcpFlags::SYN, 1000, None), &[]).unwrap();
    harness.sent();

    harness.close();
    assert_eq!(harness.state(), Some(State::Closed));
    harness.nothing_sent();
    let removal = harness.now + Config::REMOVAL_DELAY;
    assert_eq!(harness.table.removal_at(key()), Some(removal));
    assert_eq!(harness.table.next_deadline(), Expiration::When(removal));

    harness.advance(3000);
    assert!(harness.table.is_empty());
}

#[test]
fn application_calls_without_session() {
    let mut harness = Harness::new();
    let mut io = Io::new(&mut harness.nic, harness.now);
    assert_eq!(harness.table.close(key(), &mut io, &mut NoHandler), Err(Error::Unreachable));
    assert_eq!(harness.table.send(key(), b"x", &mut io, &mut NoHandler), Err(Error::Unreachable));
    assert_eq!(harness.nic.sent_len(), 0);
}

#[test]
fn send_outside_established() {
    let mut harness = Harness::new();
    harness.receive(segment(TcpFlags::SYN, 1000, None), &[]).unwrap();
    harness.sent();

    let mut io = Io::new(&mut harness.nic, harness.now);
    assert_eq!(harness.table.send(key(), b"early", &mut io, &mut NoHandler), Ok(None));
    assert_eq!(harness.table.get(key()).unwrap().seq(), TcpSeqNumber(1));
    assert_eq!(harness.nic.sent_len(), 0);
}

#[test]
fn send_limits() {
    let mut harness = Harness::new();
    harness.establish();

    let mut io = Io::new(&mut harness.nic, harness.now);
    let table = &mut harness.table;
    assert_eq!(table.send(key(), b"", &mut io, &mut NoHandler), Ok(None));
    assert_eq!(table.send(key(), &[0; 1461], &mut io, &mut NoHandler), Ok(None));
    assert_eq!(table.send(key(), &[0; 1460], &mut io, &mut NoHandler), Ok(Some(TcpSeqNumber(1))));
    assert_eq!(table.get(key()).unwrap().seq(), TcpSeqNumber(1461));
    assert_eq!(harness.nic.sent_len(), 1);
}

#[test]
fn send_control_sequence() {
    let tuple = FourTuple {
        local: SERVER,
        remote: CLIENT,
        local_port: SERVER_PORT,
        remote_port: CLIENT_PORT,
    };
    let mut session = Session::new(tuple, TcpSeqNumber(-1), TcpSeqNumber(0), Config::default());
    let mut nic = Loopback::new();
    let mut io = Io::new(&mut nic, Instant::from_millis(0));

    // SYN consumes one number, across the wrap.
    assert_eq!(session.send_control(TcpFlags::SYN | TcpFlags::ACK, &mut io), TcpSeqNumber(-1));
    assert_eq!(session.seq(), TcpSeqNumber(0));
    assert_eq!(session.send_control(TcpFlags::ACK, &mut io), TcpSeqNumber(0));
    assert_eq!(session.seq(), TcpSeqNumber(0));
    assert_eq!(session.send_control(TcpFlags::FIN, &mut io), TcpSeqNumber(0));
    assert_eq!(session.seq(), TcpSeqNumber(1));
    assert_eq!(session.state(), State::Listen);
    assert_eq!(session.take_signals(), Signals::default());

    let without_ack = nic.drain_sent().pop().unwrap();
    let parsed = datagram::parse(&without_ack, Checksum::Manual).unwrap();
    match parsed.transport {
        Transport::Tcp { repr, .. } => assert_eq!(repr.ack_number, None),
        other => panic!("not a tcp segment: {:?}", other),
    }
}
