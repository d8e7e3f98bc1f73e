//! A user-space responder for ICMP echo and server-side TCP on a TUN interface.
//!
//! ## Table of contents
//!
//! 1. [Overview](#overview)
//! 2. [The wire module](wire/index.html)
//! 3. [The layers](layer/index.html)
//!    1. [Icmp](layer/icmp/index.html)
//!    1. [Tcp](layer/tcp/index.html)
//!    1. [The state machine](layer/tcp/state/index.html)
//! 4. [Network interfaces](nic/index.html)
//! 5. [The server](server/index.html)
//!
//! ## Overview
//!
//! The crate attaches to a point-to-point TUN device, where the kernel hands over bare IPv4
//! datagrams, and plays the host on the other end of the link. It answers pings and accepts TCP
//! connections on any port. There is no kernel stack involved on this side: the TCP state machine,
//! the sequence number bookkeeping and the checksums are all done here.
//!
//! Processing is single threaded. One datagram or one timer expiry is handled to completion before
//! the next one, so nothing is shared and nothing is locked.
//!
//! ```no_run
//! # #[cfg(feature = "std")] fn main() -> Result<(), tuntcp::nic::sys::Errno> {
//! use tuntcp::layer::tcp::Config;
//! use tuntcp::nic::sys::TunInterface;
//! use tuntcp::server::Server;
//! use tuntcp::wire::Ipv4Address;
//!
//! let config = Config::default();
//! let mut tun = TunInterface::new("tun0", 2)?;
//! let (host, netmask) = (Ipv4Address::new(10, 0, 0, 1), Ipv4Address::new(255, 255, 255, 0));
//! tun.configure(host, netmask, config.mtu)?;
//! tun.up()?;
//!
//! let mut queues = tun.into_queues().into_iter();
//! let (rx, tx) = (queues.next().unwrap(), queues.next().unwrap());
//! Server::new([rx, tx], config).run()
//! # }
//! # #[cfg(not(feature = "std"))] fn main() { }
//! ```

// Must come first, the net_* logging macros are only in textual scope.
#[macro_use] mod macros;

pub mod layer;
pub mod nic;
pub mod server;
pub mod time;
pub mod wire;
