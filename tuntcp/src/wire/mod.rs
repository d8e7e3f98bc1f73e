/*! Low-level packet access and construction.

The `wire` module deals with the packet *representation* on two levels.

 * The lowercase byte wrappers, e.g. [`ipv4_packet`] or [`tcp_packet`], extract and insert fields
   of a sequence of octets. After `check_len` succeeded no accessor panics.
 * The `Repr` family, e.g. [`Ipv4Repr`] or [`TcpRepr`], is a compact high-level representation of
   header data that can be parsed from and emitted into such a byte wrapper.

On top of these, the [`datagram`] module parses and serializes complete IPv4 datagrams the way
they are exchanged with a TUN device, and [`checksum`] holds the checksum arithmetic.

In the `Repr` family, `parse()` never panics and `emit()` never panics as long as the buffer is
exactly `buffer_len()` octets long.

[`ipv4_packet`]: struct.ipv4_packet.html
[`tcp_packet`]: struct.tcp_packet.html
[`Ipv4Repr`]: struct.Ipv4Repr.html
[`TcpRepr`]: struct.TcpRepr.html
[`datagram`]: datagram/index.html
[`checksum`]: checksum/index.html

# Examples

Emit an IP header into an octet buffer, and then parse it back:

```rust
use tuntcp::wire::*;
let repr = Ipv4Repr {
    src_addr:    Ipv4Address::new(10, 0, 0, 1),
    dst_addr:    Ipv4Address::new(10, 0, 0, 2),
    protocol:    IpProtocol::Tcp,
    payload_len: 10,
    hop_limit:   64
};
let mut buffer = vec![0; repr.buffer_len() + repr.payload_len];
repr.emit(ipv4_packet::new_unchecked_mut(&mut buffer), Checksum::Manual);

let packet = ipv4_packet::new_checked(&buffer).expect("truncated packet");
let parsed = Ipv4Repr::parse(packet, Checksum::Manual).expect("malformed packet");
assert_eq!(repr, parsed);
```
*/
// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD
//
// Applies to files in this folder unless otherwise noted. These are:
// * `error.rs`
// * `icmpv4.rs`
// * `ip.rs`
// * `ipv4.rs`
// * `tcp.rs`
#![allow(missing_docs)]

mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
}

pub mod checksum;
pub mod datagram;
mod error;
mod icmpv4;
mod ip;
mod ipv4;
mod tcp;

/// Describes how to handle checksums.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Checksum {
    /// Checksum must be computed or checked manually.
    Manual,

    /// The checksum field is filled with zero and never checked.
    Ignored,
}

impl Checksum {
    /// Check if a checksum should be calculated by the library.
    pub fn manual(self) -> bool {
        match self {
            Checksum::Manual => true,
            Checksum::Ignored => false,
        }
    }
}

pub use self::error::{
    Error,
    Result};

pub use self::ip::{
    Version as IpVersion,
    Protocol as IpProtocol};

pub use self::ipv4::{
    ipv4 as ipv4_packet,
    Address as Ipv4Address,
    Repr as Ipv4Repr,
    HEADER_LEN as IPV4_HEADER_LEN};

pub use self::icmpv4::{
    icmpv4 as icmpv4_packet,
    Message as Icmpv4Message,
    Repr as Icmpv4Repr};

pub use self::tcp::{
    tcp as tcp_packet,
    SeqNumber as TcpSeqNumber,
    Repr as TcpRepr,
    Flags as TcpFlags,
    HEADER_LEN as TCP_HEADER_LEN};

pub use self::datagram::{
    Datagram,
    Transport};
