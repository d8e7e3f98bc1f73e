// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use libc;
use super::{Errno, FdResult, IoLenResult, LibcResult, ifreq};
use super::linux::{NetdeviceConfig, TunSetIf};

use crate::nic::Channel;
use crate::wire::Ipv4Address;

/// A multi-queue tun interface.
///
/// Every queue is a separate descriptor attached to the same interface, the kernel spreads
/// outgoing flows across them. The interface exists as long as one queue is open. Network layer
/// configuration of the interface (address, netmask, mtu and link state) is done with ioctls on a
/// transient control socket.
#[derive(Debug)]
pub struct TunInterface {
    ifreq: ifreq,
    queues: Vec<TunQueue>,
}

/// One queue of a tun interface.
///
/// Reads and writes carry exactly one IPv4 or IPv6 datagram, without any packet information
/// header. The descriptor is non-blocking.
#[derive(Debug)]
pub struct TunQueue {
    lower: libc::c_int,
}

static TUN_PATH: &'static [u8] = b"/dev/net/tun\0";

impl TunInterface {
    /// Create or attach to the named interface with `queues` queues.
    ///
    /// See `ioctl` with `TUNSETIFF` for details on errors. This usually requires
    /// `CAP_NET_ADMIN`.
    pub fn new(name: &str, queues: usize) -> Result<Self, Errno> {
        let mut ifreq = ifreq::new(name);
        let queues = (0..queues)
            .map(|_| TunQueue::attach(&mut ifreq))
            .collect::<Result<Vec<_>, _>>()?;

        net_debug!("attached {} queues to {}", queues.len(), ifreq.name());
        Ok(TunInterface { ifreq, queues })
    }

    /// The name of the interface.
    pub fn name(&self) -> String {
        self.ifreq.name()
    }

    /// Assign the address, the netmask and the mtu.
    ///
    /// Fails with `EINVAL` before touching the interface if `netmask` is not contiguous.
    pub fn configure(&mut self, address: Ipv4Address, netmask: Ipv4Address, mtu: usize)
        -> Result<(), Errno>
    {
        if !netmask.is_netmask() {
            return Err(Errno(libc::EINVAL));
        }

        let control = ControlSocket::new()?;
        self.ifreq.set_addr(control.0, address)?;
        self.ifreq.set_netmask(control.0, netmask)?;
        self.ifreq.set_mtu(control.0, mtu as libc::c_int)?;
        net_debug!("configured {} as {} netmask {} mtu {}", self.name(), address, netmask, mtu);
        Ok(())
    }

    /// Bring the link up.
    pub fn up(&mut self) -> Result<(), Errno> {
        let control = ControlSocket::new()?;
        let flags = self.ifreq.get_flags(control.0)?;
        self.ifreq.set_flags(control.0, flags | ifreq::IFF_UP | ifreq::IFF_RUNNING)
    }

    /// Borrow one of the queues.
    pub fn queue(&mut self, index: usize) -> Option<&mut TunQueue> {
        self.queues.get_mut(index)
    }

    /// Take the queues out, the interface disappears when the last one is dropped.
    pub fn into_queues(self) -> Vec<TunQueue> {
        self.queues
    }
}

impl TunQueue {
    fn attach(ifreq: &mut ifreq) -> Result<Self, Errno> {
        let lower = unsafe {
            libc::open(
                TUN_PATH.as_ptr() as *const libc::c_char,
                libc::O_RDWR | libc::O_NONBLOCK)
        };

        FdResult(lower).errno()?;
        let queue = TunQueue { lower };
        ifreq.tun_set_multi_queue(queue.lower)?;
        Ok(queue)
    }
}

impl Channel for TunQueue {
    fn recv(&mut self, buffer: &mut [u8]) -> io::Result<Option<usize>> {
        let len = unsafe {
            libc::read(
                self.lower,
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len())
        };
        match IoLenResult(len).errno() {
            Ok(()) => Ok(Some(len as usize)),
            Err(err) if err.is_would_block() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn send(&mut self, buffer: &[u8]) -> io::Result<usize> {
        let len = unsafe {
            libc::write(
                self.lower,
                buffer.as_ptr() as *const libc::c_void,
                buffer.len())
        };
        IoLenResult(len).errno()?;
        Ok(len as usize)
    }
}

impl AsRawFd for TunQueue {
    fn as_raw_fd(&self) -> RawFd {
        self.lower
    }
}

impl Drop for TunQueue {
    fn drop(&mut self) {
        unsafe { libc::close(self.lower); }
    }
}

/// An `AF_INET` datagram socket for interface ioctls, closed on drop.
struct ControlSocket(libc::c_int);

impl ControlSocket {
    fn new() -> Result<Self, Errno> {
        let sock = unsafe {
            libc::socket(libc::AF_INET, libc::SOCK_DGRAM, libc::IPPROTO_IP)
        };
        FdResult(sock).errno()?;
        Ok(ControlSocket(sock))
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.0); }
    }
}
