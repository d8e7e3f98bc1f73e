use core::fmt;
use core::str::FromStr;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Checksum, Result};
use super::checksum;

pub(crate) use super::IpProtocol as Protocol;

/// A four-octet IPv4 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 4]);

impl Address {
    /// An unspecified address.
    pub const UNSPECIFIED: Address = Address([0x00; 4]);

    /// Construct an IPv4 address from parts.
    pub const fn new(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address([a0, a1, a2, a3])
    }

    /// Construct an IPv4 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not four octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return an IPv4 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The address as the integer its octets spell in network byte order.
    pub fn to_network_integer(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub fn from_network_integer(num: u32) -> Self {
        Address(num.to_be_bytes())
    }

    /// Check whether the address is a contiguous network mask, like `255.255.255.0`.
    pub fn is_netmask(&self) -> bool {
        let mask = self.to_network_integer();
        mask.leading_ones() + mask.trailing_zeros() == 32
    }
}

impl From<::std::net::Ipv4Addr> for Address {
    fn from(x: ::std::net::Ipv4Addr) -> Address {
        Address(x.octets())
    }
}

impl From<Address> for ::std::net::Ipv4Addr {
    fn from(Address(x): Address) -> ::std::net::Ipv4Addr {
        x.into()
    }
}

impl FromStr for Address {
    type Err = ::std::net::AddrParseError;

    fn from_str(src: &str) -> core::result::Result<Self, Self::Err> {
        src.parse::<::std::net::Ipv4Addr>().map(Address::from)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

byte_wrapper! {
    /// A byte sequence representing an IPv4 packet.
    #[derive(Debug, PartialEq, Eq)]
    pub struct ipv4([u8]);
}

pub(crate) mod field {
    use crate::wire::field::Field;

    pub(crate) const VER_IHL:  usize = 0;
    pub(crate) const DSCP_ECN: usize = 1;
    pub(crate) const LENGTH:   Field = 2..4;
    pub(crate) const IDENT:    Field = 4..6;
    pub(crate) const FLG_OFF:  Field = 6..8;
    pub(crate) const TTL:      usize = 8;
    pub(crate) const PROTOCOL: usize = 9;
    pub(crate) const CHECKSUM: Field = 10..12;
    pub(crate) const SRC_ADDR: Field = 12..16;
    pub(crate) const DST_ADDR: Field = 16..20;
}

/// The length of an IPv4 header without options.
pub const HEADER_LEN: usize = field::DST_ADDR.end;

impl ipv4 {
    /// Imbue a raw octet buffer with IPv4 packet structure.
    pub fn new_unchecked(buffer: &[u8]) -> &ipv4 {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Imbue a mutable octet buffer with IPv4 packet structure.
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut ipv4 {
        Self::__from_macro_new_unchecked_mut(buffer)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&ipv4> {
        let packet = Self::new_unchecked(data);
        packet.check_len()?;
        Ok(packet)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Ensure that no accessor method will panic if called.
    ///
    /// Returns `Err(Error::Truncated)` if the buffer is shorter than the header or the total
    /// length, `Err(Error::Malformed)` if the header length is below the minimum or beyond the
    /// total length.
    pub fn check_len(&self) -> Result<()> {
        let len = self.0.len();
        if len < HEADER_LEN {
            Err(Error::Truncated)
        } else if (self.header_len() as usize) < HEADER_LEN {
            Err(Error::Malformed)
        } else if len < self.header_len() as usize {
            Err(Error::Truncated)
        } else if self.header_len() as u16 > self.total_len() {
            Err(Error::Malformed)
        } else if len < self.total_len() as usize {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    #[inline]
    pub fn version(&self) -> u8 {
        self.0[field::VER_IHL] >> 4
    }

    /// Return the header length, in octets.
    #[inline]
    pub fn header_len(&self) -> u8 {
        (self.0[field::VER_IHL] & 0x0f) * 4
    }

    #[inline]
    pub fn total_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::LENGTH])
    }

    #[inline]
    pub fn ident(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::IDENT])
    }

    #[inline]
    pub fn dont_frag(&self) -> bool {
        NetworkEndian::read_u16(&self.0[field::FLG_OFF]) & 0x4000 != 0
    }

    #[inline]
    pub fn more_frags(&self) -> bool {
        NetworkEndian::read_u16(&self.0[field::FLG_OFF]) & 0x2000 != 0
    }

    /// Return the fragment offset, in octets.
    #[inline]
    pub fn frag_offset(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::FLG_OFF]) << 3
    }

    #[inline]
    pub fn hop_limit(&self) -> u8 {
        self.0[field::TTL]
    }

    #[inline]
    pub fn protocol(&self) -> Protocol {
        Protocol::from(self.0[field::PROTOCOL])
    }

    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    #[inline]
    pub fn src_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::SRC_ADDR])
    }

    #[inline]
    pub fn dst_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::DST_ADDR])
    }

    /// Validate the header checksum.
    pub fn verify_checksum(&self) -> bool {
        checksum::data(&self.0[..self.header_len() as usize]) == !0
    }

    #[inline]
    pub fn set_version(&mut self, value: u8) {
        self.0[field::VER_IHL] = (self.0[field::VER_IHL] & !0xf0) | (value << 4);
    }

    /// Set the header length, in octets.
    #[inline]
    pub fn set_header_len(&mut self, value: u8) {
        self.0[field::VER_IHL] = (self.0[field::VER_IHL] & !0x0f) | ((value / 4) & 0x0f);
    }

    /// Clear DSCP and ECN together.
    #[inline]
    pub fn clear_dscp_ecn(&mut self) {
        self.0[field::DSCP_ECN] = 0;
    }

    #[inline]
    pub fn set_total_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::LENGTH], value)
    }

    #[inline]
    pub fn set_ident(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::IDENT], value)
    }

    /// Write the flags and fragment offset, never fragmented.
    #[inline]
    pub fn set_unfragmented(&mut self, dont_frag: bool) {
        let raw = if dont_frag { 0x4000 } else { 0 };
        NetworkEndian::write_u16(&mut self.0[field::FLG_OFF], raw);
    }

    #[inline]
    pub fn set_hop_limit(&mut self, value: u8) {
        self.0[field::TTL] = value
    }

    #[inline]
    pub fn set_protocol(&mut self, value: Protocol) {
        self.0[field::PROTOCOL] = value.into()
    }

    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    #[inline]
    pub fn set_src_addr(&mut self, value: Address) {
        self.0[field::SRC_ADDR].copy_from_slice(value.as_bytes())
    }

    #[inline]
    pub fn set_dst_addr(&mut self, value: Address) {
        self.0[field::DST_ADDR].copy_from_slice(value.as_bytes())
    }

    /// Compute and fill in the header checksum.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let checksum = !checksum::data(&self.0[..self.header_len() as usize]);
        self.set_checksum(checksum)
    }

    /// Return the payload as a byte slice.
    ///
    /// Bytes beyond the total length, such as link layer padding, are not part of it.
    pub fn payload_slice(&self) -> &[u8] {
        let range = usize::from(self.header_len())..usize::from(self.total_len());
        &self.0[range]
    }
}

impl AsRef<[u8]> for ipv4 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A high-level representation of an Internet Protocol version 4 packet header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// The source of the packet.
    pub src_addr:    Address,
    /// The destination of the packet.
    pub dst_addr:    Address,
    /// The encapsulated protocol identifier.
    pub protocol:    Protocol,
    /// The length of the payload.
    pub payload_len: usize,
    /// The remaining hop limit of the packet.
    pub hop_limit:   u8,
}

impl Repr {
    /// Parse an Internet Protocol version 4 packet and return a high-level representation.
    pub fn parse(packet: &ipv4, checksum: Checksum) -> Result<Repr> {
        packet.check_len()?;
        if packet.version() != 4 { return Err(Error::Malformed) }
        if checksum.manual() && !packet.verify_checksum() { return Err(Error::WrongChecksum) }
        // Reassembly is out of scope.
        if packet.more_frags() || packet.frag_offset() != 0 { return Err(Error::Unsupported) }

        let payload_len = packet.total_len() as usize - packet.header_len() as usize;
        Ok(Repr {
            src_addr:    packet.src_addr(),
            dst_addr:    packet.dst_addr(),
            protocol:    packet.protocol(),
            payload_len,
            hop_limit:   packet.hop_limit()
        })
    }

    /// Return the length of a header that will be emitted from this high-level representation.
    pub fn buffer_len(&self) -> usize {
        // We never emit any options.
        HEADER_LEN
    }

    /// Emit a high-level representation into an Internet Protocol version 4 packet.
    pub fn emit(&self, packet: &mut ipv4, checksum: Checksum) {
        packet.set_version(4);
        packet.set_header_len(HEADER_LEN as u8);
        packet.clear_dscp_ecn();
        packet.set_total_len((HEADER_LEN + self.payload_len) as u16);
        packet.set_ident(0);
        packet.set_unfragmented(true);
        packet.set_hop_limit(self.hop_limit);
        packet.set_protocol(self.protocol);
        packet.set_src_addr(self.src_addr);
        packet.set_dst_addr(self.dst_addr);

        if checksum.manual() {
            packet.fill_checksum();
        } else {
            packet.set_checksum(0);
        }
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IPv4 src={} dst={} proto={}",
               self.src_addr, self.dst_addr, self.protocol)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // Echo request from 10.0.0.2 to 10.0.0.1 carrying "abc".
    static PACKET_BYTES: [u8; 31] =
        [0x45, 0x00, 0x00, 0x1f,
         0x12, 0x34, 0x40, 0x00,
         0x40, 0x01, 0x14, 0xa8,
         0x0a, 0x00, 0x00, 0x02,
         0x0a, 0x00, 0x00, 0x01,
         0x08, 0x00, 0x33, 0x9b,
         0x00, 0x01, 0x00, 0x01,
         0x61, 0x62, 0x63];

    static EMITTED_BYTES: [u8; 20] =
        [0x45, 0x00, 0x00, 0x18,
         0x00, 0x00, 0x40, 0x00,
         0x40, 0x06, 0x26, 0xde,
         0x0a, 0x00, 0x00, 0x01,
         0x0a, 0x00, 0x00, 0x02];

    #[test]
    fn deconstruct() {
        let packet = ipv4::new_checked(&PACKET_BYTES[..]).unwrap();
        assert_eq!(packet.version(), 4);
        assert_eq!(packet.header_len(), 20);
        assert_eq!(packet.total_len(), 31);
        assert_eq!(packet.ident(), 0x1234);
        assert!(packet.dont_frag());
        assert!(!packet.more_frags());
        assert_eq!(packet.hop_limit(), 64);
        assert_eq!(packet.protocol(), Protocol::Icmp);
        assert_eq!(packet.checksum(), 0x14a8);
        assert_eq!(packet.src_addr(), Address::new(10, 0, 0, 2));
        assert_eq!(packet.dst_addr(), Address::new(10, 0, 0, 1));
        assert!(packet.verify_checksum());
        assert_eq!(packet.payload_slice().len(), 11);
    }

    #[test]
    fn parse() {
        let packet = ipv4::new_unchecked(&PACKET_BYTES[..]);
        let repr = Repr::parse(packet, Checksum::Manual).unwrap();
        assert_eq!(repr, Repr {
            src_addr: Address::new(10, 0, 0, 2),
            dst_addr: Address::new(10, 0, 0, 1),
            protocol: Protocol::Icmp,
            payload_len: 11,
            hop_limit: 64,
        });
    }

    #[test]
    fn parse_bad_checksum() {
        let mut bytes = PACKET_BYTES;
        bytes[11] ^= 0x01;
        let packet = ipv4::new_unchecked(&bytes[..]);
        assert_eq!(Repr::parse(packet, Checksum::Manual), Err(Error::WrongChecksum));
        assert!(Repr::parse(packet, Checksum::Ignored).is_ok());
    }

    #[test]
    fn parse_bad_version() {
        let mut bytes = PACKET_BYTES;
        let packet = ipv4::new_unchecked_mut(&mut bytes[..]);
        packet.set_version(5);
        packet.fill_checksum();
        assert_eq!(Repr::parse(packet, Checksum::Manual), Err(Error::Malformed));
    }

    #[test]
    fn check_len() {
        assert_eq!(ipv4::new_checked(&PACKET_BYTES[..19]), Err(Error::Truncated));
        assert_eq!(ipv4::new_checked(&PACKET_BYTES[..30]), Err(Error::Truncated));

        let mut bytes = PACKET_BYTES;
        bytes[0] = 0x44;
        assert_eq!(ipv4::new_checked(&bytes[..]), Err(Error::Malformed));
    }

    #[test]
    fn trailing_padding_ignored() {
        let mut bytes = PACKET_BYTES.to_vec();
        bytes.extend_from_slice(&[0; 9]);
        let packet = ipv4::new_checked(&bytes).unwrap();
        assert_eq!(packet.payload_slice(), &PACKET_BYTES[20..]);
    }

    #[test]
    fn emit() {
        let repr = Repr {
            src_addr: Address::new(10, 0, 0, 1),
            dst_addr: Address::new(10, 0, 0, 2),
            protocol: Protocol::Tcp,
            payload_len: 4,
            hop_limit: 64,
        };
        let mut bytes = vec![0xa5; repr.buffer_len()];
        repr.emit(ipv4::new_unchecked_mut(&mut bytes), Checksum::Manual);
        assert_eq!(&bytes[..], &EMITTED_BYTES[..]);
    }

    #[test]
    fn netmask() {
        assert!(Address::new(255, 255, 255, 0).is_netmask());
        assert!(Address::new(0, 0, 0, 0).is_netmask());
        assert!(!Address::new(255, 0, 255, 0).is_netmask());
        assert_eq!("10.0.0.1".parse::<Address>(), Ok(Address::new(10, 0, 0, 1)));
    }
}
