//! Internet checksums.
//!
//! Two flavours live here. [`checksum`] and [`patch_checksum`] work on arbitrary byte ranges of a
//! datagram buffer and read words in host byte order, which is how replies are patched in place.
//! Because the one's complement sum commutes with byte swapping, storing the result in host order
//! again yields the same bytes on the wire as a network order computation would.
//!
//! [`data`], [`combine`] and [`pseudo_header`] compute RFC 1071 sums in network byte order and
//! are used when emitting or verifying freshly constructed headers.
//!
//! [`checksum`]: fn.checksum.html
//! [`patch_checksum`]: fn.patch_checksum.html
//! [`data`]: fn.data.html
//! [`combine`]: fn.combine.html
//! [`pseudo_header`]: fn.pseudo_header.html
use byteorder::{ByteOrder, NativeEndian, NetworkEndian};

use super::{IpProtocol, Ipv4Address};

fn propagate_carries(word: u32) -> u16 {
    let sum = (word >> 16) + (word & 0xffff);
    ((sum >> 16) as u16) + (sum as u16)
}

/// Compute the complemented one's complement sum of `bytes[begin..end]`.
///
/// Words are read in host byte order. A trailing odd byte is padded with a zero byte following it
/// in memory.
///
/// # Panics
/// This function panics if the range is out of bounds of `bytes`.
pub fn checksum(bytes: &[u8], begin: usize, end: usize) -> u16 {
    let mut data = &bytes[begin..end];
    let mut accum: u32 = 0;

    while data.len() >= 2 {
        accum += u32::from(NativeEndian::read_u16(data));
        // Fold early, a range can be longer than 64KiB.
        if accum > 0xffff_0000 {
            accum = u32::from(propagate_carries(accum));
        }
        data = &data[2..];
    }

    if let Some(&value) = data.first() {
        accum += u32::from(NativeEndian::read_u16(&[value, 0]));
    }

    !propagate_carries(accum)
}

/// Recompute a checksum over `bytes[begin..end]` and store it at `field`.
///
/// The two bytes at `field` are zeroed before summing, so the field may lie inside the range.
/// The value is written in host byte order, mirroring how [`checksum`] reads. The sum verifies
/// afterwards when the field starts an even number of bytes after `begin`, as every header
/// checksum field does.
///
/// [`checksum`]: fn.checksum.html
///
/// # Panics
/// This function panics if the range or the field is out of bounds of `bytes`.
pub fn patch_checksum(bytes: &mut [u8], begin: usize, end: usize, field: usize) {
    bytes[field] = 0;
    bytes[field + 1] = 0;
    let sum = checksum(bytes, begin, end);
    NativeEndian::write_u16(&mut bytes[field..field + 2], sum);
}

/// Compute an RFC 1071 compliant checksum (without the final complement).
pub fn data(mut data: &[u8]) -> u16 {
    let mut accum = 0;

    // For each 32-byte chunk...
    const CHUNK_SIZE: usize = 32;
    while data.len() >= CHUNK_SIZE {
        let mut d = &data[..CHUNK_SIZE];
        // ... take by 2 bytes and sum them.
        while d.len() >= 2 {
            accum += NetworkEndian::read_u16(d) as u32;
            d = &d[2..];
        }

        data = &data[CHUNK_SIZE..];
    }

    while data.len() >= 2 {
        accum += NetworkEndian::read_u16(data) as u32;
        data = &data[2..];
    }

    if let Some(&value) = data.first() {
        accum += (value as u32) << 8;
    }

    propagate_carries(accum)
}

/// Combine several RFC 1071 compliant checksums.
pub fn combine(checksums: &[u16]) -> u16 {
    let mut accum: u32 = 0;
    for &word in checksums {
        accum += word as u32;
    }
    propagate_carries(accum)
}

/// Compute an IPv4 pseudo header checksum.
pub fn pseudo_header(
    src_addr: Ipv4Address,
    dst_addr: Ipv4Address,
    protocol: IpProtocol,
    length: u16,
) -> u16 {
    let mut proto_len = [0u8; 4];
    proto_len[1] = protocol.into();
    NetworkEndian::write_u16(&mut proto_len[2..4], length);

    combine(&[
        data(src_addr.as_bytes()),
        data(dst_addr.as_bytes()),
        data(&proto_len[..]),
    ])
}
