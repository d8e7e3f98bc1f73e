//! Answers ICMP echo requests.
//!
//! Replies are produced by rewriting the request in place: addresses swapped, the type set to
//! echo reply and both checksums recomputed. Identifier, sequence number, payload and every other
//! header field are left untouched, so the reply is exactly as long as the request.
use crate::layer::{Error, Result};
use crate::wire::checksum::patch_checksum;
use crate::wire::{Icmpv4Message, Icmpv4Repr, IPV4_HEADER_LEN};


/// Offset of the IPv4 header checksum.
const IP_CHECKSUM: usize = 10;
const IP_SRC_ADDR: usize = 12;
const IP_DST_ADDR: usize = 16;
/// Offset of the ICMP checksum relative to the ICMP header.
const ICMP_CHECKSUM: usize = 2;

/// An icmp traffic handler.
#[derive(Debug, Default)]
pub struct Endpoint {
    /// Drops echo requests if enabled.
    ///
    /// This is off by default, as required in RFC1812, but can be enabled to avoid answering echo
    /// requests on some node.
    deny_echo: bool,
}

impl Endpoint {
    /// Create an endpoint that answers every echo request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether echo requests are dropped instead of answered.
    pub fn deny_echo(&mut self, deny: bool) {
        self.deny_echo = deny;
    }

    /// Turn an echo request held in `buffer` into its reply.
    ///
    /// `repr` is the parsed message and the lengths are those of the enclosing datagram. Returns
    /// the length of the reply, which is in `buffer[..total_len]`.
    pub fn answer(
        &self,
        repr: Icmpv4Repr,
        buffer: &mut [u8],
        total_len: usize,
        ip_header_len: usize,
    ) -> Result<usize> {
        match repr {
            Icmpv4Repr::EchoRequest { .. } if self.deny_echo => Err(Error::Illegal),
            Icmpv4Repr::EchoRequest { .. } => {
                if buffer.len() < total_len || total_len <= ip_header_len {
                    return Err(Error::BadSize)
                }
                make_echo_reply(buffer, total_len, ip_header_len);
                Ok(total_len)
            },
            // Replies are not answered.
            Icmpv4Repr::EchoReply { .. } => Err(Error::Illegal),
        }
    }
}

/// Rewrite an echo request datagram into the matching echo reply, in place.
///
/// The datagram occupies `buffer[..total_len]` and its IPv4 header is `ip_header_len` octets
/// long. The message is not validated to actually be an echo request.
///
/// # Panics
/// This function panics unless `total_len > ip_header_len >= 20` and the buffer holds at least
/// `total_len` octets.
pub fn make_echo_reply(buffer: &mut [u8], total_len: usize, ip_header_len: usize) {
    assert!(ip_header_len >= IPV4_HEADER_LEN, "ip header shorter than 20 octets");
    assert!(total_len > ip_header_len, "datagram without icmp header");
    assert!(total_len <= buffer.len(), "datagram exceeds the buffer");

    let (src, dst) = buffer[IP_SRC_ADDR..IP_DST_ADDR + 4].split_at_mut(4);
    src.swap_with_slice(dst);

    buffer[ip_header_len] = Icmpv4Message::EchoReply.into();

    patch_checksum(buffer, 0, ip_header_len, IP_CHECKSUM);
    patch_checksum(buffer, ip_header_len, total_len, ip_header_len + ICMP_CHECKSUM);
}
