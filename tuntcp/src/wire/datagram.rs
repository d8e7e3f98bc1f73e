//! Whole IPv4 datagrams, as read from and written to a TUN queue.
//!
//! The TUN device delivers bare network layer packets without any link layer header, so a
//! datagram here is an IPv4 header followed directly by its transport payload.
use super::{Checksum, Error, IpProtocol, IpVersion, Result};
use super::{icmpv4_packet, ipv4_packet, tcp_packet, Icmpv4Repr, Ipv4Repr, TcpRepr};

/// A parsed IPv4 datagram.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Datagram<'a> {
    /// The network layer header.
    pub ip: Ipv4Repr,
    /// The length of the IPv4 header including options, in octets.
    pub header_len: usize,
    /// The total length field, in octets.
    pub total_len: usize,
    /// The transport layer content.
    pub transport: Transport<'a>,
}

/// The transport layer content of a datagram.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Transport<'a> {
    Icmp(Icmpv4Repr),
    Tcp {
        repr: TcpRepr,
        payload: &'a [u8],
    },
    /// A protocol without a representation, carried unparsed.
    Other(IpProtocol),
}

/// Parse a raw datagram.
///
/// IPv6 and unknown versions yield `Err(Error::Unrecognized)`. Checksums of both the IPv4 header
/// and the transport are verified according to `checksum`.
pub fn parse(bytes: &[u8], checksum: Checksum) -> Result<Datagram> {
    match IpVersion::of_packet(bytes)? {
        IpVersion::Ipv4 => (),
        IpVersion::Ipv6 => return Err(Error::Unrecognized),
    }

    let packet = ipv4_packet::new_checked(bytes)?;
    let ip = Ipv4Repr::parse(packet, checksum)?;
    let payload = packet.payload_slice();

    let transport = match ip.protocol {
        IpProtocol::Icmp => {
            let icmp = icmpv4_packet::new_checked(payload)?;
            Transport::Icmp(Icmpv4Repr::parse(icmp, checksum)?)
        },
        IpProtocol::Tcp => {
            let segment = tcp_packet::new_checked(payload)?;
            let repr = TcpRepr::parse(segment, ip.src_addr, ip.dst_addr, checksum)?;
            Transport::Tcp { repr, payload: segment.payload_slice() }
        },
        other => Transport::Other(other),
    };

    Ok(Datagram {
        ip,
        header_len: usize::from(packet.header_len()),
        total_len: usize::from(packet.total_len()),
        transport,
    })
}

/// Serialize a TCP segment into a complete datagram with all lengths and checksums filled.
///
/// The payload lengths of `ip` and `tcp` are ignored and derived from `payload` instead.
pub fn serialize(ip: &Ipv4Repr, tcp: &TcpRepr, payload: &[u8]) -> Vec<u8> {
    let tcp = TcpRepr { payload_len: payload.len(), ..*tcp };
    let ip = Ipv4Repr {
        protocol: IpProtocol::Tcp,
        payload_len: tcp.buffer_len(),
        ..*ip
    };

    let mut buffer = vec![0; ip.buffer_len() + ip.payload_len];
    let (header, segment) = buffer.split_at_mut(ip.buffer_len());
    segment[tcp.header_len()..].copy_from_slice(payload);
    tcp.emit(tcp_packet::new_unchecked_mut(segment), ip.src_addr, ip.dst_addr, Checksum::Manual);
    ip.emit(ipv4_packet::new_unchecked_mut(header), Checksum::Manual);
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Icmpv4Repr, Ipv4Address, TcpFlags, TcpSeqNumber};

    static ECHO_REQUEST: [u8; 31] =
        [0x45, 0x00, 0x00, 0x1f,
         0x12, 0x34, 0x40, 0x00,
         0x40, 0x01, 0x14, 0xa8,
         0x0a, 0x00, 0x00, 0x02,
         0x0a, 0x00, 0x00, 0x01,
         0x08, 0x00, 0x33, 0x9b,
         0x00, 0x01, 0x00, 0x01,
         0x61, 0x62, 0x63];

    fn server_ip() -> Ipv4Repr {
        Ipv4Repr {
            src_addr: Ipv4Address::new(10, 0, 0, 1),
            dst_addr: Ipv4Address::new(10, 0, 0, 2),
            protocol: IpProtocol::Tcp,
            payload_len: 0,
            hop_limit: 64,
        }
    }

    #[test]
    fn parse_echo_request() {
        let datagram = parse(&ECHO_REQUEST, Checksum::Manual).unwrap();
        assert_eq!(datagram.header_len, 20);
        assert_eq!(datagram.total_len, 31);
        assert_eq!(datagram.ip.src_addr, Ipv4Address::new(10, 0, 0, 2));
        assert_eq!(datagram.transport, Transport::Icmp(Icmpv4Repr::EchoRequest {
            ident: 1,
            seq_no: 1,
            payload: 3,
        }));
    }

    #[test]
    fn serialize_then_parse_segment() {
        let tcp = TcpRepr {
            src_port: 80,
            dst_port: 5000,
            flags: TcpFlags::PSH,
            seq_number: TcpSeqNumber(77),
            ack_number: Some(TcpSeqNumber(1001)),
            window_len: 1024,
            payload_len: 0,
        };
        let bytes = serialize(&server_ip(), &tcp, b"hello");
        assert_eq!(bytes.len(), 20 + 20 + 5);

        let datagram = parse(&bytes, Checksum::Manual).unwrap();
        assert_eq!(datagram.ip.payload_len, 25);
        match datagram.transport {
            Transport::Tcp { repr, payload } => {
                assert_eq!(repr.flags, TcpFlags::PSH | TcpFlags::ACK);
                assert_eq!(repr.ack_number, Some(TcpSeqNumber(1001)));
                assert_eq!(repr.payload_len, 5);
                assert_eq!(payload, b"hello");
            },
            other => panic!("unexpected transport {:?}", other),
        }
    }

    #[test]
    fn rejects_ipv6_and_garbage() {
        let mut ipv6 = [0u8; 40];
        ipv6[0] = 0x60;
        assert_eq!(parse(&ipv6, Checksum::Manual), Err(Error::Unrecognized));
        assert_eq!(parse(&[], Checksum::Manual), Err(Error::Truncated));
        assert_eq!(parse(&ECHO_REQUEST[..25], Checksum::Manual), Err(Error::Truncated));
    }

    #[test]
    fn other_protocols_pass_through() {
        let mut bytes = ECHO_REQUEST;
        let packet = ipv4_packet::new_unchecked_mut(&mut bytes);
        packet.set_protocol(IpProtocol::Udp);
        packet.fill_checksum();
        let datagram = parse(&bytes, Checksum::Manual).unwrap();
        assert_eq!(datagram.transport, Transport::Other(IpProtocol::Udp));
    }

    #[test]
    fn bad_transport_checksum() {
        let mut bytes = ECHO_REQUEST;
        bytes[30] = b'x';
        assert_eq!(parse(&bytes, Checksum::Manual), Err(Error::WrongChecksum));
        assert!(parse(&bytes, Checksum::Ignored).is_ok());
    }
}
